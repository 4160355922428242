use crate::jvm::{BinaryName, FieldType, MethodDescriptor, RenderDescriptor, UnqualifiedName};

/// Descriptor under which a method's replacement is invoked
///
/// Static methods keep their descriptor. Instance methods get the receiver as an explicit leading
/// parameter, so `compute(II)I` on `com/example/Calculator` becomes
/// `(Lcom/example/Calculator;II)I`.
pub fn redirected_descriptor(
    original: &MethodDescriptor<BinaryName>,
    declaring_type: &BinaryName,
    is_static: bool,
) -> MethodDescriptor<BinaryName> {
    if is_static {
        original.clone()
    } else {
        original.prepend_parameter(FieldType::object(declaring_type.clone()))
    }
}

/// Key identifying a method to a generic dispatcher (eg. `compute.(II)I`)
pub fn method_key(name: &UnqualifiedName, descriptor: &MethodDescriptor<BinaryName>) -> String {
    format!("{}.{}", name, descriptor.render())
}
