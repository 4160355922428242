use crate::jvm;
use crate::jvm::code::Position;
use crate::jvm::{BinaryName, FieldType};

#[derive(Debug)]
pub enum Error {
    BytecodeGen(jvm::Error),
    MalformedName(String),

    /// Parameter types don't line up with the method descriptor
    ParameterCountMismatch {
        expected: usize,
        found: usize,
    },
    ParameterTypeMismatch {
        index: usize,
        expected: FieldType<BinaryName>,
        found: FieldType<BinaryName>,
    },
    ReturnTypeMismatch {
        expected: Option<FieldType<BinaryName>>,
        found: Option<FieldType<BinaryName>>,
    },

    /// Position was marked in some other instruction stream
    ForeignPosition(Position),

    /// Builder has moved on from the position (or was never there)
    NotAtPosition(Position),

    /// The method being built is not the one the redirection describes
    MethodMismatch {
        expected: String,
        found: String,
    },

    /// No conversion from the raw dispatch result to the declared return type
    UnsupportedAdaptation {
        raw: Option<FieldType<BinaryName>>,
        declared: Option<FieldType<BinaryName>>,
    },
}

impl From<jvm::Error> for Error {
    fn from(err: jvm::Error) -> Error {
        Error::BytecodeGen(err)
    }
}
