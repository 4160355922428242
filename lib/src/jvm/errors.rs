use super::code::{BranchInstruction, SynLabel};
use super::verifier::{VerificationType, VerifierFrame};
use super::{BinaryName, RefType};

#[derive(Debug)]
pub enum Error {
    /// Method body was turned into code while blocks or labels were still open
    MethodCodeNotFinished {
        pending_block: Option<SynLabel>,
        unplaced_labels: Vec<SynLabel>,
    },

    /// Two blocks claim to have the same label (indicates a bug)
    DuplicateLabel(SynLabel),

    /// A label is placed before it has ever been referred to
    ///
    /// This is fixable by making sure you place the block _after_ some jump to it.
    PlacingLabelBeforeReference(SynLabel),

    /// Instructions were pushed while there is no current block (eg. right after a `return`)
    UnreachableCode(String),

    /// Error trying to verify
    VerifierError {
        instruction: String,
        kind: VerifierErrorKind,
    },
    VerifierBranchingError {
        instruction: BranchInstruction<SynLabel, SynLabel>,
        kind: VerifierErrorKind,
    },

    /// A label needs to have incompatible frames
    IncompatibleFrames(SynLabel, VerifierFrame, VerifierFrame),

    MissingClass(String),
    MalformedName(String),
    MalformedDescriptor(std::io::Error),
}

#[derive(Debug)]
pub enum VerifierErrorKind {
    EmptyStack,
    InvalidWidth(usize),
    InvalidIndex,
    InvalidType,
    NotArrayType,
    NotReferenceType(VerificationType<RefType<BinaryName>>),
    IncompatibleTypes(
        VerificationType<RefType<BinaryName>>,
        VerificationType<RefType<BinaryName>>,
    ),
    MissingClass(BinaryName),
}
