use super::{
    BinaryName, ClassAccessFlags, Error, FieldAccessFlags, FieldType, MethodAccessFlags,
    MethodDescriptor, RefType, RenderDescriptor, UnqualifiedName,
};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Tracks the relationships between classes and interfaces
///
/// The verifier only ever asks two questions of the graph: "is this name an interface?" (to pick
/// between `invokevirtual` and `invokeinterface`) and "is this type assignable to that type?"
/// (for arguments, receivers, and array stores). Classes must be registered before code that
/// refers to them is verified.
#[derive(Default)]
pub struct ClassGraph {
    classes: HashMap<BinaryName, ClassData>,
}

/// Class or interface in the graph
#[derive(Debug, Clone)]
pub struct ClassData {
    /// Name of the class
    pub name: BinaryName,

    /// Superclass is only ever missing for `java/lang/Object` itself
    pub superclass: Option<BinaryName>,

    /// Interfaces implemented (or extended, for interfaces)
    pub interfaces: Vec<BinaryName>,

    /// Access flags
    pub access_flags: ClassAccessFlags,
}

impl ClassData {
    /// Class extending `superclass`
    pub fn new(name: BinaryName, superclass: BinaryName, access_flags: ClassAccessFlags) -> Self {
        ClassData {
            name,
            superclass: Some(superclass),
            interfaces: vec![],
            access_flags,
        }
    }

    /// Interface (whose superclass is always `java/lang/Object`)
    pub fn interface(name: BinaryName) -> Self {
        ClassData {
            name,
            superclass: Some(BinaryName::OBJECT),
            interfaces: vec![],
            access_flags: ClassAccessFlags::PUBLIC
                | ClassAccessFlags::INTERFACE
                | ClassAccessFlags::ABSTRACT,
        }
    }

    pub fn is_interface(&self) -> bool {
        self.access_flags.contains(ClassAccessFlags::INTERFACE)
    }
}

/// Method, along with the class it is declared on
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct MethodData {
    pub class: BinaryName,
    pub name: UnqualifiedName,
    pub descriptor: MethodDescriptor<BinaryName>,
    pub access_flags: MethodAccessFlags,
}

impl MethodData {
    pub fn is_static(&self) -> bool {
        self.access_flags.contains(MethodAccessFlags::STATIC)
    }
}

impl fmt::Debug for MethodData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}{}",
            self.class,
            self.name,
            self.descriptor.render()
        )
    }
}

/// Field, along with the class it is declared on
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct FieldData {
    pub class: BinaryName,
    pub name: UnqualifiedName,
    pub descriptor: FieldType<BinaryName>,
    pub access_flags: FieldAccessFlags,
}

impl FieldData {
    pub fn is_static(&self) -> bool {
        self.access_flags.contains(FieldAccessFlags::STATIC)
    }
}

impl fmt::Debug for FieldData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}:{}",
            self.class,
            self.name,
            self.descriptor.render()
        )
    }
}

impl ClassGraph {
    /// New empty graph
    pub fn new() -> Self {
        ClassGraph::default()
    }

    /// Add (or replace) a class in the graph
    pub fn add_class(&mut self, class: ClassData) {
        log::trace!("Adding {:?} to class graph", class.name);
        self.classes.insert(class.name.clone(), class);
    }

    /// Lookup a class by name
    pub fn lookup_class(&self, name: &BinaryName) -> Option<&ClassData> {
        self.classes.get(name)
    }

    /// Is the class an interface?
    pub fn is_interface(&self, name: &BinaryName) -> Result<bool, Error> {
        self.lookup_class(name)
            .map(ClassData::is_interface)
            .ok_or_else(|| Error::MissingClass(name.to_string()))
    }

    /// Add the small subset of `java.lang` needed to box, unbox, and pass around values
    pub fn insert_java_library_types(&mut self) {
        let public = ClassAccessFlags::PUBLIC;
        let public_final = ClassAccessFlags::PUBLIC | ClassAccessFlags::FINAL;

        self.add_class(ClassData {
            name: BinaryName::OBJECT,
            superclass: None,
            interfaces: vec![],
            access_flags: public,
        });
        for interface in [
            BinaryName::CHARSEQUENCE,
            BinaryName::CLONEABLE,
            BinaryName::COMPARABLE,
            BinaryName::SERIALIZABLE,
        ] {
            self.add_class(ClassData::interface(interface));
        }
        self.add_class(ClassData::new(
            BinaryName::NUMBER,
            BinaryName::OBJECT,
            public | ClassAccessFlags::ABSTRACT,
        ));
        self.add_class(ClassData::new(
            BinaryName::CLASS,
            BinaryName::OBJECT,
            public_final,
        ));
        self.add_class(ClassData::new(
            BinaryName::THROWABLE,
            BinaryName::OBJECT,
            public,
        ));

        let mut string = ClassData::new(BinaryName::STRING, BinaryName::OBJECT, public_final);
        string.interfaces = vec![
            BinaryName::CHARSEQUENCE,
            BinaryName::COMPARABLE,
            BinaryName::SERIALIZABLE,
        ];
        self.add_class(string);

        for (boxed, superclass) in [
            (BinaryName::BOOLEAN, BinaryName::OBJECT),
            (BinaryName::CHARACTER, BinaryName::OBJECT),
            (BinaryName::BYTE, BinaryName::NUMBER),
            (BinaryName::SHORT, BinaryName::NUMBER),
            (BinaryName::INTEGER, BinaryName::NUMBER),
            (BinaryName::LONG, BinaryName::NUMBER),
            (BinaryName::FLOAT, BinaryName::NUMBER),
            (BinaryName::DOUBLE, BinaryName::NUMBER),
        ] {
            let mut class = ClassData::new(boxed, superclass, public_final);
            class.interfaces = vec![BinaryName::COMPARABLE, BinaryName::SERIALIZABLE];
            self.add_class(class);
        }
    }

    /// Query if one type is assignable to another
    ///
    /// This matches the semantics of the prolog predicate `isJavaAssignable(sub_type, super_type)`
    /// in the JVM verifier specification.
    pub fn is_java_assignable(
        &self,
        sub_type: &RefType<BinaryName>,
        super_type: &RefType<BinaryName>,
    ) -> bool {
        match (sub_type, super_type) {
            // Special superclass and interfaces of all arrays
            (
                RefType::PrimitiveArray(_) | RefType::ObjectArray(_),
                RefType::Object(object_type),
            ) => is_array_type_assignable(object_type),

            // Primitive arrays must match in dimension and type
            (RefType::PrimitiveArray(arr1), RefType::PrimitiveArray(arr2)) => arr1 == arr2,

            // Higher dimensional primitive arrays can be subtypes of object arrays
            (RefType::PrimitiveArray(arr1), RefType::ObjectArray(arr2)) => {
                arr1.additional_dimensions > arr2.additional_dimensions
                    && is_array_type_assignable(&arr2.element_type)
            }

            // Cursed (unsound) covariance of arrays
            (RefType::ObjectArray(arr1), RefType::ObjectArray(arr2)) => {
                if arr1.additional_dimensions < arr2.additional_dimensions {
                    false
                } else if arr1.additional_dimensions == arr2.additional_dimensions {
                    self.is_object_type_assignable(&arr1.element_type, &arr2.element_type)
                } else {
                    is_array_type_assignable(&arr2.element_type)
                }
            }

            // Object-to-object assignability holds if there is a path through super type edges
            (RefType::Object(cls1), RefType::Object(cls2)) => {
                self.is_object_type_assignable(cls1, cls2)
            }

            _ => false,
        }
    }

    /// Object to object assignability
    ///
    /// This does a search up the superclasses and superinterfaces looking for the super type.
    /// Everything is assignable to `java/lang/Object`, even classes missing from the graph.
    fn is_object_type_assignable(&self, sub_type: &BinaryName, super_type: &BinaryName) -> bool {
        if sub_type == super_type || super_type == &BinaryName::OBJECT {
            return true;
        }

        // Optimization: if the super type is a class, then skip visiting interfaces
        let super_is_class = self
            .lookup_class(super_type)
            .map_or(true, |class| !class.is_interface());

        let mut supertypes_to_visit: Vec<&BinaryName> = vec![sub_type];
        let mut dont_revisit: HashSet<&BinaryName> = HashSet::new();
        dont_revisit.insert(sub_type);

        while let Some(class_name) = supertypes_to_visit.pop() {
            if class_name == super_type {
                return true;
            }
            let class_data = match self.lookup_class(class_name) {
                Some(class_data) => class_data,
                None => continue,
            };

            if let Some(superclass) = &class_data.superclass {
                if dont_revisit.insert(superclass) {
                    supertypes_to_visit.push(superclass);
                }
            }
            if !super_is_class {
                for interface in &class_data.interfaces {
                    if dont_revisit.insert(interface) {
                        supertypes_to_visit.push(interface);
                    }
                }
            }
        }

        false
    }
}

/// Check if arrays can be assigned to a super type
///
/// This bakes in knowledge of the small, finite set of super types arrays have.
fn is_array_type_assignable(super_type: &BinaryName) -> bool {
    super_type == &BinaryName::OBJECT
        || super_type == &BinaryName::CLONEABLE
        || super_type == &BinaryName::SERIALIZABLE
}
