use crate::jvm::{BaseType, BinaryName, ClassGraph, FieldType, RefType};
use crate::util::Width;

/// These types are from [this hierarchy][0]
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se7/html/jvms-4.html#jvms-4.10.1.2
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub enum VerificationType<Cls> {
    Integer,
    Float,
    Double,
    Long,
    Null,

    /// In the constructor, the `this` parameter starts with this type then turns into an object
    /// type after `<init>` is called
    UninitializedThis,

    /// Object type
    Object(Cls),
}

impl<Cls> VerificationType<Cls> {
    /// Is this type is a reference type?
    pub fn is_reference(&self) -> bool {
        match self {
            VerificationType::Integer
            | VerificationType::Float
            | VerificationType::Double
            | VerificationType::Long => false,

            VerificationType::Null
            | VerificationType::UninitializedThis
            | VerificationType::Object(_) => true,
        }
    }

    pub fn map<Cls2>(&self, map_class: impl Fn(&Cls) -> Cls2) -> VerificationType<Cls2> {
        match self {
            VerificationType::Integer => VerificationType::Integer,
            VerificationType::Float => VerificationType::Float,
            VerificationType::Long => VerificationType::Long,
            VerificationType::Double => VerificationType::Double,
            VerificationType::Null => VerificationType::Null,
            VerificationType::UninitializedThis => VerificationType::UninitializedThis,
            VerificationType::Object(cls) => VerificationType::Object(map_class(cls)),
        }
    }
}

impl<C> From<FieldType<C>> for VerificationType<RefType<C>> {
    fn from(field_type: FieldType<C>) -> Self {
        match field_type {
            FieldType::Base(BaseType::Int)
            | FieldType::Base(BaseType::Char)
            | FieldType::Base(BaseType::Short)
            | FieldType::Base(BaseType::Byte)
            | FieldType::Base(BaseType::Boolean) => VerificationType::Integer,
            FieldType::Base(BaseType::Float) => VerificationType::Float,
            FieldType::Base(BaseType::Long) => VerificationType::Long,
            FieldType::Base(BaseType::Double) => VerificationType::Double,
            FieldType::Ref(ref_type) => VerificationType::Object(ref_type),
        }
    }
}

impl<Cls> Width for VerificationType<Cls> {
    fn width(&self) -> usize {
        match self {
            VerificationType::Double | VerificationType::Long => 2,
            _ => 1,
        }
    }
}

impl VerificationType<RefType<BinaryName>> {
    /// Check if one verification type is assignable to another
    pub fn is_assignable(class_graph: &ClassGraph, sub_type: &Self, super_type: &Self) -> bool {
        match (sub_type, super_type) {
            (Self::Integer, Self::Integer) => true,
            (Self::Float, Self::Float) => true,
            (Self::Long, Self::Long) => true,
            (Self::Double, Self::Double) => true,
            (Self::Null, Self::Null) => true,
            (Self::Null, Self::Object(_)) => true,
            (Self::UninitializedThis, Self::UninitializedThis) => true,
            (Self::Object(t1), Self::Object(t2)) => class_graph.is_java_assignable(t1, t2),
            _ => false,
        }
    }
}
