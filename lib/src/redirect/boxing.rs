//! Conversions between primitives and their `java/lang` wrapper classes
//!
//! Dispatching through a generic entry point means arguments travel as `Object`s and results come
//! back as one. Boxing uses the `valueOf` factories. Unboxing goes through `java/lang/Number` for
//! all numeric kinds, so an `Integer` result can satisfy a `long` method (matching what a generic
//! dispatcher written in Java would do), while `boolean` and `char` need their exact wrapper.

use super::Error;
use crate::jvm::class_graph::MethodData;
use crate::jvm::code::{CodeBuilder, CodeBuilderExts, Instruction};
use crate::jvm::{
    BaseType, BinaryName, FieldType, MethodAccessFlags, MethodDescriptor, RefType, TypeClass,
    UnqualifiedName,
};

/// Wrapper class of a primitive type
pub fn boxed_class(base_type: BaseType) -> BinaryName {
    match base_type {
        BaseType::Boolean => BinaryName::BOOLEAN,
        BaseType::Char => BinaryName::CHARACTER,
        BaseType::Byte => BinaryName::BYTE,
        BaseType::Short => BinaryName::SHORT,
        BaseType::Int => BinaryName::INTEGER,
        BaseType::Long => BinaryName::LONG,
        BaseType::Float => BinaryName::FLOAT,
        BaseType::Double => BinaryName::DOUBLE,
    }
}

/// Static factory producing the wrapper (eg. `java/lang/Integer.valueOf(I)Ljava/lang/Integer;`)
pub fn box_method(base_type: BaseType) -> MethodData {
    let class = boxed_class(base_type);
    MethodData {
        name: UnqualifiedName::VALUEOF,
        descriptor: MethodDescriptor {
            parameters: vec![FieldType::Base(base_type)],
            return_type: Some(FieldType::object(class.clone())),
        },
        class,
        access_flags: MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
    }
}

/// Class to cast to before unboxing, and the accessor to call on it
///
/// Numeric kinds are read through `java/lang/Number`.
pub fn unbox_method(base_type: BaseType) -> MethodData {
    let name = match base_type {
        BaseType::Boolean => UnqualifiedName::BOOLEANVALUE,
        BaseType::Char => UnqualifiedName::CHARVALUE,
        BaseType::Byte => UnqualifiedName::BYTEVALUE,
        BaseType::Short => UnqualifiedName::SHORTVALUE,
        BaseType::Int => UnqualifiedName::INTVALUE,
        BaseType::Long => UnqualifiedName::LONGVALUE,
        BaseType::Float => UnqualifiedName::FLOATVALUE,
        BaseType::Double => UnqualifiedName::DOUBLEVALUE,
    };
    let class = if base_type.is_numeric() {
        BinaryName::NUMBER
    } else {
        boxed_class(base_type)
    };
    MethodData {
        class,
        name,
        descriptor: MethodDescriptor {
            parameters: vec![],
            return_type: Some(FieldType::Base(base_type)),
        },
        access_flags: MethodAccessFlags::PUBLIC,
    }
}

/// Box the value on top of the stack, if it is a primitive
pub fn box_top(code: &mut CodeBuilder, field_type: &FieldType<BinaryName>) -> Result<(), Error> {
    if let FieldType::Base(base_type) = field_type {
        code.invoke(box_method(*base_type))?;
    }
    Ok(())
}

/// Turn the reference on top of the stack into a primitive
pub fn unbox_top(code: &mut CodeBuilder, base_type: BaseType) -> Result<(), Error> {
    let accessor = unbox_method(base_type);
    code.push_instruction(Instruction::CheckCast(RefType::Object(accessor.class.clone())))?;
    code.invoke(accessor)?;
    Ok(())
}

/// Convert the raw result of a dispatch into the declared return type of the method
///
///   * `void` methods discard whatever the dispatch left behind
///   * matching types are left alone
///   * references become primitives by unboxing, or other references by casting (except for
///     `java/lang/Object`, which needs no cast)
///
/// A primitive never turns into anything else.
pub fn adapt_return(
    code: &mut CodeBuilder,
    raw: &Option<FieldType<BinaryName>>,
    declared: &Option<FieldType<BinaryName>>,
) -> Result<(), Error> {
    if raw == declared {
        return Ok(());
    }

    match (TypeClass::of(raw), TypeClass::of(declared)) {
        (_, TypeClass::Void) => code.pop()?,
        (TypeClass::Reference(_), TypeClass::Primitive(base_type)) => {
            unbox_top(code, base_type)?;
        }
        (TypeClass::Reference(_), TypeClass::Reference(RefType::Object(class)))
            if class == &BinaryName::OBJECT => {}
        (TypeClass::Reference(_), TypeClass::Reference(ref_type)) => {
            code.push_instruction(Instruction::CheckCast(ref_type.clone()))?;
        }
        _ => {
            return Err(Error::UnsupportedAdaptation {
                raw: raw.clone(),
                declared: declared.clone(),
            })
        }
    }
    Ok(())
}
