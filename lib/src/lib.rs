//! Hot-swap instrumentation for JVM methods
//!
//! The [`redirect`] module rewrites the entry of a method body so that it first checks for an
//! alternate implementation (the `$change` of incremental hot-swap) and, when one is installed,
//! hands the call over to it and returns its (adapted) result. The [`jvm`] module provides the
//! underlying model of names, descriptors, and verified method bodies.

pub mod jvm;
pub mod redirect;
mod util;
