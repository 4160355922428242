use crate::jvm::class_graph::{ClassGraph, MethodData};
use crate::jvm::code::{
    BasicBlock, BranchInstruction, Code, Instruction, Position, StreamId, SynLabel,
    SynLabelGenerator,
};
use crate::jvm::verifier::*;
use crate::jvm::{Error, RefType, UnqualifiedName};
use crate::util::{Offset, SlotVec};
use std::collections::HashMap;

/// This provides a very slightly simplified interface for building up method bodies. It does
/// internal bookeeping to track frames, labels, reachability, etc.
///
/// ### Constructing verification frames
///
/// Normally, figuring out what the right frame types are is a fixpoint iterative process, since
/// blocks jumping to the same frame need to have their output frames merged and then that
/// information must be propagated further backwards through the CFG. We avoid this and instead
/// compute our final frames right from the start. The tradeoff here is that instead of merging
/// frames, we require the frames be completely identical. This just means we might reject code
/// which isn't incorrect - not that we accept incorrect code.
///
/// ### Tracking reachability
///
/// Labels cannot be placed unless they are reachable (either with a fall-through from above, or
/// there has already been a jump to the label). This is what lets us always find the initial frame
/// of a block. Pushing an instruction while there is no current block (eg. right after a
/// `return`) is an error.
///
/// ### Positions
///
/// Every builder is its own instruction stream with a process-unique [`StreamId`]. A
/// [`Position`] handed out by [`CodeBuilder::mark_position`] can later be checked against the
/// builder with [`CodeBuilder::is_at`], so code emitted "at a position" can't silently end up in
/// some other method or after other instructions.
pub struct CodeBuilder<'g> {
    /// Method code under construction
    code: Code,

    /// Labels which have been referenced in blocks so far, but not placed yet (keys do not overlap
    /// with keys of `block`)
    unplaced_labels: HashMap<SynLabel, VerifierFrame>,

    /// Block currently under construction (label is not in `blocks` _or_ `unplaced_labels`)
    current_block: Option<CurrentBlock>,

    /// Stream identity of this method body
    stream: StreamId,

    /// Class graph
    ///
    /// The verifier that runs during the bytecode building process needs to reason about
    /// assignability, so every class mentioned in the code must be in here.
    pub class_graph: &'g ClassGraph,

    /// Method whose body is being built
    pub method: MethodData,
}

impl<'g> CodeBuilder<'g> {
    /// Create a builder for a new method
    pub fn new(class_graph: &'g ClassGraph, method: MethodData) -> Self {
        // The initial local variables are just the parameters (including maybe "this")
        let mut locals = SlotVec::new();
        if method.name == UnqualifiedName::INIT {
            locals.push(VerificationType::UninitializedThis);
        } else if !method.is_static() {
            locals.push(VerificationType::Object(RefType::Object(method.class.clone())));
        }
        for arg_type in &method.descriptor.parameters {
            locals.push(VerificationType::from(arg_type.clone()));
        }

        let max_locals = locals.offset_len();
        let entry_frame = Frame {
            locals,
            stack: SlotVec::new(),
        };

        let mut label_generator = SynLabelGenerator::new(SynLabel::START);
        let current_block = Some(CurrentBlock::new(
            label_generator.fresh_label(),
            entry_frame,
        ));

        let code = Code {
            max_locals,
            max_stack: Offset(0),
            blocks: HashMap::new(),
            block_order: vec![],
            label_generator,
        };

        let stream = StreamId::fresh();
        log::trace!("New code builder {:?} for {:?}", stream, method);

        CodeBuilder {
            code,
            unplaced_labels: HashMap::new(),
            current_block,
            stream,
            class_graph,
            method,
        }
    }

    /// Turn the builder into the method code
    pub fn result(self) -> Result<Code, Error> {
        // Weed out some error cases early
        if self.current_block.is_some() || !self.unplaced_labels.is_empty() {
            return Err(Error::MethodCodeNotFinished {
                pending_block: self
                    .current_block
                    .as_ref()
                    .map(|current_block| current_block.label),
                unplaced_labels: self.unplaced_labels.keys().cloned().collect(),
            });
        }

        Ok(self.code)
    }

    /// Identity of the instruction stream this builder writes to
    pub fn stream(&self) -> StreamId {
        self.stream
    }

    /// Label of the block under construction, if the code is reachable
    pub fn current_label(&self) -> Option<SynLabel> {
        self.current_block
            .as_ref()
            .map(|current_block| current_block.label)
    }

    /// Mark the current point in the stream
    ///
    /// If the current block is still empty, its label already names this point. Otherwise the
    /// block falls through into a freshly placed label.
    pub fn mark_position(&mut self) -> Result<Position, Error> {
        let label = match self.current_block.as_ref() {
            None => return Err(Error::UnreachableCode(String::from("mark position"))),
            Some(current_block) if current_block.instructions.is_empty() => current_block.label,
            Some(_) => {
                let label = self.fresh_label();
                self.place_label(label)?;
                label
            }
        };
        Ok(Position {
            stream: self.stream,
            label,
        })
    }

    /// Is the builder sitting exactly at the position, with nothing emitted since?
    pub fn is_at(&self, position: &Position) -> bool {
        position.stream == self.stream
            && self.current_block.as_ref().map_or(false, |current_block| {
                current_block.label == position.label && current_block.instructions.is_empty()
            })
    }

    /// Query the expected frame for a label that has already been referred to and possibly even
    /// jumped to
    pub fn lookup_frame(&self, label: SynLabel) -> Option<&VerifierFrame> {
        // The block is already placed
        if let Some(basic_block) = self.code.blocks.get(&label) {
            return Some(&basic_block.frame);
        }

        // The block is only referred to
        if let Some(frame) = self.unplaced_labels.get(&label) {
            return Some(frame);
        }

        // The block is the one we are currently processing
        if let Some(current_block) = self.current_block.as_ref().filter(|b| b.label == label) {
            return Some(&current_block.entry_frame);
        }

        None
    }

    /// Check that the label has a certain frame. If the frame is already being tracked, we can
    /// assert that the frames match. Otherwise, we start tracking the frame (so the next time it
    /// is placed or used, we'll be able to compare frames).
    ///
    /// ### Annoying edge case
    ///
    /// Sometimes we call `assert_frame_for_label` after we've taken the current block out, but
    /// before we've added it back into the general blocks map. This means that we won't find the
    /// current block's frame anywhere (this matters when closing the current block with a jump
    /// back to the start of the block). The work around is to specify that block in
    /// `extra_block`: we'll check that first and skip the other check/update if the extra block's
    /// label matches the assertion label.
    fn assert_frame_for_label(
        &mut self,
        label: SynLabel,
        expected: &VerifierFrame,
        extra_block: Option<(SynLabel, &VerifierFrame)>,
    ) -> Result<(), Error> {
        let found = match extra_block {
            Some((extra_block_label, found)) if extra_block_label == label => Some(found),
            _ => self.lookup_frame(label),
        };

        match found {
            Some(found) if found != expected => Err(Error::IncompatibleFrames(
                label,
                found.clone(),
                expected.clone(),
            )),
            Some(_) => Ok(()),
            None => {
                let _ = self.unplaced_labels.insert(label, expected.clone());
                Ok(())
            }
        }
    }

    /// Generate a fresh label
    pub fn fresh_label(&mut self) -> SynLabel {
        self.code.label_generator.fresh_label()
    }

    /// Push a new instruction to the current block
    pub fn push_instruction(&mut self, insn: Instruction) -> Result<(), Error> {
        let current_block = match self.current_block.as_mut() {
            Some(current_block) => current_block,
            None => return Err(Error::UnreachableCode(insn.to_string())),
        };

        current_block
            .latest_frame
            .verify_instruction(
                &insn,
                self.class_graph,
                &RefType::Object(self.method.class.clone()),
            )
            .map_err(|kind| Error::VerifierError {
                instruction: insn.to_string(),
                kind,
            })?;
        current_block
            .latest_frame
            .update_maximums(&mut self.code.max_locals, &mut self.code.max_stack);

        current_block.instructions.push(insn);
        Ok(())
    }

    /// Push a new branch instruction to close the current block and possibly open a new one
    pub fn push_branch_instruction(
        &mut self,
        insn: BranchInstruction<SynLabel, ()>,
    ) -> Result<(), Error> {
        let mut current_block = match self.current_block.take() {
            Some(current_block) => current_block,
            None => return Err(Error::UnreachableCode(insn.to_string())),
        };

        let insn = insn.map_labels(|lbl| *lbl, |()| self.fresh_label());
        current_block
            .latest_frame
            .verify_branch_instruction(&insn, &self.method.descriptor.return_type, self.class_graph)
            .map_err(|kind| Error::VerifierBranchingError {
                instruction: insn.clone(),
                kind,
            })?;
        current_block
            .latest_frame
            .update_maximums(&mut self.code.max_locals, &mut self.code.max_stack);

        // Check that the jump target (if there is one) has a compatible frame
        if let Some(jump_label) = insn.jump_target() {
            self.assert_frame_for_label(
                jump_label,
                &current_block.latest_frame,
                Some((current_block.label, &current_block.entry_frame)),
            )?;
        }

        // Turn the current block into a regular block, possibly open the next current block
        let (block_label, basic_block, next_curr_block_opt) = current_block.close_block(insn);
        self.insert_block(block_label, basic_block)?;
        self.current_block = next_curr_block_opt;
        Ok(())
    }

    /// Start a new block with the given label, ending the current block (if there is one) with a
    /// fallthrough. This can fail if:
    ///
    ///   * the label was already placed
    ///   * the label was already jumped to from elsewhere, and the frames don't match
    ///   * the label was not ever been jumped to and there is no fallthrough (so we have no way of
    ///     inferring the expected frame)
    ///
    pub fn place_label(&mut self, label: SynLabel) -> Result<(), Error> {
        if self.code.blocks.contains_key(&label) {
            return Err(Error::DuplicateLabel(label));
        }

        if let Some(current_block) = self.current_block.take() {
            // Check that the jump target (if there is one) has a compatible frame
            self.assert_frame_for_label(
                label,
                &current_block.latest_frame,
                Some((current_block.label, &current_block.entry_frame)),
            )?;

            // Turn the current block into a regular block, open the next current block
            let (block_label, basic_block, next_curr_block_opt) =
                current_block.close_block(BranchInstruction::FallThrough(label));
            let _ = self.unplaced_labels.remove(&label);
            self.insert_block(block_label, basic_block)?;
            self.current_block = next_curr_block_opt;
        } else {
            // Find the frame
            let frame: VerifierFrame = self
                .unplaced_labels
                .remove(&label)
                .ok_or(Error::PlacingLabelBeforeReference(label))?;

            self.current_block = Some(CurrentBlock::new(label, frame));
        }

        Ok(())
    }

    /// Get the current frame
    pub fn current_frame(&self) -> Option<&VerifierFrame> {
        self.current_block
            .as_ref()
            .map(|current_block| &current_block.latest_frame)
    }

    fn insert_block(&mut self, label: SynLabel, basic_block: BasicBlock) -> Result<(), Error> {
        if self.code.blocks.insert(label, basic_block).is_some() {
            return Err(Error::DuplicateLabel(label));
        }
        self.code.block_order.push(label);
        Ok(())
    }
}

/// Just like `BasicBlock`, but not closed off yet
struct CurrentBlock {
    label: SynLabel,

    /// State of the frame at the start of `instructions`
    entry_frame: VerifierFrame,

    /// Tracks the state of the frame at the end of `instructions`
    latest_frame: VerifierFrame,

    /// Accumulated instructions
    instructions: Vec<Instruction>,
}

impl CurrentBlock {
    /// New block starting with a given frame
    fn new(label: SynLabel, entry_frame: VerifierFrame) -> CurrentBlock {
        CurrentBlock {
            label,
            latest_frame: entry_frame.clone(),
            entry_frame,
            instructions: vec![],
        }
    }

    /// Seal the current block into a basic block
    fn close_block(
        self,
        branch_end: BranchInstruction<SynLabel, SynLabel>,
    ) -> (SynLabel, BasicBlock, Option<CurrentBlock>) {
        let fallthrough_target: Option<SynLabel> = branch_end.fallthrough_target();

        let basic_block = BasicBlock {
            frame: self.entry_frame,
            instructions: self.instructions,
            branch_end,
        };

        // Construct a next current block only if there is a fall-through
        let next_block = fallthrough_target.map(|label| CurrentBlock::new(label, self.latest_frame));

        (self.label, basic_block, next_block)
    }
}
