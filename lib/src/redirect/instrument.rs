//! Glue for instrumenting a whole method entry in one go
//!
//! An instrumented class carries a static `$change` field. On entry, every instrumented method
//! copies that field into a fresh local and emits the redirection prologue checking it.

use super::{emit_redirection, Error, RedirectionSpec, RedirectionStrategy, Settings};
use crate::jvm::class_graph::{ClassData, ClassGraph, FieldData};
use crate::jvm::code::{AccessMode, CodeBuilder, CodeBuilderExts};
use crate::jvm::{BinaryName, ClassAccessFlags, FieldAccessFlags, FieldType};

/// Make the runtime types that instrumented code mentions known to the class graph
///
/// This means the change interface, and the override class companion to `class` (which, like
/// every alternate implementation, implements the change interface).
pub fn register_runtime_types(class_graph: &mut ClassGraph, settings: &Settings, class: &BinaryName) {
    if class_graph.lookup_class(&settings.change_interface).is_none() {
        class_graph.add_class(ClassData::interface(settings.change_interface.clone()));
    }

    let mut override_class = ClassData::new(
        settings.override_class(class),
        BinaryName::OBJECT,
        ClassAccessFlags::PUBLIC | ClassAccessFlags::SYNTHETIC,
    );
    override_class.interfaces.push(settings.change_interface.clone());
    class_graph.add_class(override_class);
}

/// Static field holding the alternate implementation of `class`
pub fn change_field(settings: &Settings, class: &BinaryName) -> FieldData {
    FieldData {
        class: class.clone(),
        name: settings.change_field_name.clone(),
        descriptor: FieldType::object(settings.change_interface.clone()),
        access_flags: FieldAccessFlags::PUBLIC
            | FieldAccessFlags::STATIC
            | FieldAccessFlags::VOLATILE
            | FieldAccessFlags::TRANSIENT
            | FieldAccessFlags::SYNTHETIC,
    }
}

/// Copy the `$change` field of the method's class into a fresh local, returning that local
pub fn load_alternate(code: &mut CodeBuilder, settings: &Settings) -> Result<u16, Error> {
    let local = code.next_local()?;
    let field = change_field(settings, &code.method.class);
    let field_type = field.descriptor.clone();
    code.access_field(field, AccessMode::Read)?;
    code.set_local(local, &field_type)?;
    Ok(local)
}

/// Instrument the entry of the method being built
///
/// Must be called before any of the original body has been emitted. Afterwards, the builder is
/// positioned at the start of the original body.
pub fn instrument_entry(
    code: &mut CodeBuilder,
    settings: &Settings,
    strategy: &RedirectionStrategy,
) -> Result<RedirectionSpec, Error> {
    let alternate_local = load_alternate(code, settings)?;
    let position = code.mark_position()?;
    let spec = RedirectionSpec::for_method(position, &code.method)?;
    emit_redirection(&spec, strategy, code, alternate_local)?;
    Ok(spec)
}
