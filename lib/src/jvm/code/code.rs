use crate::jvm::code::{BasicBlock, BranchInstruction, SynLabel, SynLabelGenerator};
use crate::util::Offset;
use std::collections::HashMap;
use std::fmt;

/// Semantic representation of a method body
#[derive(Debug, Clone)]
pub struct Code {
    /// Maximum size of locals through the method
    pub max_locals: Offset,

    /// Maximum size of stack through the method
    pub max_stack: Offset,

    /// Basic blocks in the code
    pub blocks: HashMap<SynLabel, BasicBlock>,

    /// Order of basic blocks in the code (elements are unique and exactly match keys of `blocks`)
    pub block_order: Vec<SynLabel>,

    /// Generator to produce the next label
    pub label_generator: SynLabelGenerator,
}

impl Code {
    /// Blocks, in layout order
    pub fn ordered_blocks(&self) -> impl Iterator<Item = (SynLabel, &BasicBlock)> + '_ {
        self.block_order
            .iter()
            .filter_map(move |label| self.blocks.get(label).map(|block| (*label, block)))
    }

    /// Labels which are targets of some jump
    pub fn jump_targets(&self) -> Vec<SynLabel> {
        let mut targets: Vec<SynLabel> = self
            .blocks
            .values()
            .filter_map(|block| block.branch_end.jump_target())
            .collect();
        targets.sort();
        targets.dedup();
        targets
    }

    /// Number of instructions, counting block-ending ones but not fallthroughs
    pub fn instruction_count(&self) -> usize {
        self.blocks
            .values()
            .map(|block| {
                let branch = match block.branch_end {
                    BranchInstruction::FallThrough(_) => 0,
                    _ => 1,
                };
                block.instructions.len() + branch
            })
            .sum()
    }
}

/// Textual listing, one block at a time
///
/// ```text
/// l0:
///     aload 3
///     ifnull l1
/// ```
impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "// max_locals = {}, max_stack = {}",
            self.max_locals.0, self.max_stack.0
        )?;
        for (label, block) in self.ordered_blocks() {
            writeln!(f, "{:?}:", label)?;
            for insn in &block.instructions {
                writeln!(f, "    {}", insn)?;
            }
            if !matches!(block.branch_end, BranchInstruction::FallThrough(_)) {
                writeln!(f, "    {}", block.branch_end)?;
            }
        }
        Ok(())
    }
}
