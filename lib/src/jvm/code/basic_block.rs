use crate::jvm::code::{BranchInstruction, Instruction, SynLabel};
use crate::jvm::verifier::VerifierFrame;

/// A JVM method code body is made up of a linear sequence of basic blocks.
///
/// Alongside the instructions, we keep the frame on entry to the block. That frame is what every
/// jump into the block was checked against.
#[derive(Debug, PartialEq, Clone)]
pub struct BasicBlock {
    /// Frame at the start of the block
    pub frame: VerifierFrame,

    /// Straight-line instructions in the block
    pub instructions: Vec<Instruction>,

    /// Branch instruction to close the block
    pub branch_end: BranchInstruction<SynLabel, SynLabel>,
}
