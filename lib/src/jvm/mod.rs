//! Model JVM method bodies just far enough to generate and check them
//!
//! ### Simple example
//!
//! Consider the following method:
//!
//! ```java,ignore,no_run
//! public class Calculator {
//!     public int twice(int x) {
//!         return x + x;
//!     }
//! }
//! ```
//!
//! Generating the analogous verified body can be done as follows:
//!
//! ```
//! use hotpatch::jvm::class_graph::*;
//! use hotpatch::jvm::code::{CodeBuilder, CodeBuilderExts, Instruction::*};
//! use hotpatch::jvm::*;
//!
//! # fn generate_method() -> Result<(), Error> {
//! // Setup the class graph, add in Java standard library types
//! let mut class_graph = ClassGraph::new();
//! class_graph.insert_java_library_types();
//!
//! // Declare the class in the class graph
//! let class = BinaryName::from_string(String::from("com/example/Calculator"))
//!     .map_err(Error::MalformedName)?;
//! class_graph.add_class(ClassData::new(
//!     class.clone(),
//!     BinaryName::OBJECT,
//!     ClassAccessFlags::PUBLIC,
//! ));
//! let twice = MethodData {
//!     class,
//!     name: UnqualifiedName::from_string(String::from("twice")).map_err(Error::MalformedName)?,
//!     descriptor: MethodDescriptor::parse("(I)I").map_err(Error::MalformedDescriptor)?,
//!     access_flags: MethodAccessFlags::PUBLIC,
//! };
//!
//! // Generate the method body
//! let mut code = CodeBuilder::new(&class_graph, twice);
//! code.push_instruction(ILoad(1))?;
//! code.push_instruction(ILoad(1))?;
//! code.push_instruction(IAdd)?;
//! code.return_(&Some(FieldType::int()))?;
//!
//! let code = code.result()?;
//! assert_eq!(code.max_stack.0, 2);
//! # Ok(())
//! # }
//! # generate_method().unwrap();
//! ```

mod access_flags;
pub mod class_graph;
pub mod code;
mod descriptors;
mod errors;
mod names;
pub mod verifier;

pub use access_flags::*;
pub use class_graph::ClassGraph;
pub use descriptors::*;
pub use errors::*;
pub use names::*;
