//! Redirect a method to an alternate implementation
//!
//! Instrumenting a method for hot-swap means putting a small prologue in front of its original
//! body:
//!
//! ```text
//! if ($change != null) {
//!     return (int) $change.access$dispatch("compute.(II)I", new Object[] { this, a, b });
//! }
//! original body...
//! ```
//!
//! The pieces are:
//!
//!   - [`redirected_descriptor`] computes the descriptor under which a replacement takes the
//!     method's arguments (the receiver becomes an explicit first parameter)
//!   - [`RedirectionSpec`] is the validated description of _what_ gets redirected and _where_
//!   - [`RedirectionStrategy`] is _how_ the alternate is called, leaving one raw result behind
//!   - [`boxing::adapt_return`] turns that raw result into the declared return type
//!   - [`emit_redirection`] strings the above together into the prologue
//!   - [`instrument`] does the whole method entry, `$change` field load included
//!
//! Nothing here checks at instrumentation time that an alternate returns the right thing: a
//! wrongly typed result shows up as a failed `checkcast` when the prologue runs.

pub mod boxing;
mod descriptor;
mod errors;
pub mod instrument;
mod protocol;
mod settings;
mod spec;
mod strategy;

pub use descriptor::*;
pub use errors::*;
pub use protocol::*;
pub use settings::*;
pub use spec::*;
pub use strategy::*;
