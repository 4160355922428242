use super::Error;
use crate::jvm::{BinaryName, Name, UnqualifiedName};

/// Runtime names that instrumented code refers to
///
/// These have to agree with whatever runtime ends up installing alternate implementations.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Interface implemented by every alternate implementation, written as `my/runtime/Change`
    pub change_interface: BinaryName,

    /// Static field on each instrumented class holding its alternate implementation (or `null`)
    pub change_field_name: UnqualifiedName,

    /// Generic entry point on `change_interface`
    ///
    /// Has type `(Ljava/lang/String;[Ljava/lang/Object;)Ljava/lang/Object;`: the first argument is
    /// `<name>.<descriptor>` of the redirected method and the second holds the boxed arguments,
    /// receiver first for instance methods.
    pub dispatch_method_name: UnqualifiedName,

    /// Suffix appended to an instrumented class name to get the class holding its static override
    /// methods (eg. `com/example/Calculator$override`)
    pub override_suffix: UnqualifiedName,
}

impl Settings {
    pub fn new() -> Result<Settings, Error> {
        fn make_name<N: Name>(name: impl Into<String>) -> Result<N, Error> {
            N::from_string(name.into()).map_err(Error::MalformedName)
        }

        Ok(Settings {
            change_interface: make_name("com/mogujie/instantrun/IncrementalChange")?,
            change_field_name: make_name("$change")?,
            dispatch_method_name: make_name("access$dispatch")?,
            override_suffix: make_name("$override")?,
        })
    }

    /// Same as the defaults, but with a different change interface
    pub fn with_change_interface(change_interface: String) -> Result<Settings, Error> {
        let mut settings = Settings::new()?;
        settings.change_interface =
            BinaryName::from_string(change_interface).map_err(Error::MalformedName)?;
        Ok(settings)
    }

    /// Class holding the static override methods of `class`
    pub fn override_class(&self, class: &BinaryName) -> BinaryName {
        class.concat(&self.override_suffix)
    }
}
