//! Bytecode verification utilities
//!
//! For any specific instruction inside a method body, the stack and locals should have the same
//! structure, regardless of which control flow was used to reach that instruction. In other words:
//! although the values on the stack and in the locals may obviously be different, the types and
//! order of the stack and local variables cannot. This information is referred to as the _stack
//! map frame_ (represented using [`VerifierFrame`]).
//!
//! Knowing the frame at a point in the code makes it possible to verify that the next instruction
//! makes sense (eg. `ifnull` only makes sense if the top of the stack is a reference, and `aload`
//! only makes sense if the local holds one). The "types" used in verification (represented using
//! [`VerificationType`]) are slightly augmented to take into account initialization and null.
//!
//! Straight-line instructions are checked one at a time (see [`Frame::verify_instruction`]). When
//! an instruction can be reached from multiple locations (eg. it is the target of a jump), the
//! frames from every source must agree exactly. Since all code here is generated front to back,
//! we never need to unify frames, only compare them.

mod frame;
mod types;

pub use frame::*;
pub use types::*;
