use super::{method_key, redirected_descriptor, Error};
use crate::jvm::class_graph::MethodData;
use crate::jvm::code::Position;
use crate::jvm::{BinaryName, FieldType, MethodDescriptor, RenderDescriptor, UnqualifiedName};
use crate::util::Width;

/// Everything about one redirection that doesn't depend on how the alternate gets called
///
/// Built through [`RedirectionSpec::new`], which checks that the parameter and return types agree
/// with the descriptor and computes the redirected descriptor once. Nothing is mutable after that.
#[derive(Debug, Clone, PartialEq)]
pub struct RedirectionSpec {
    position: Position,
    declaring_type: BinaryName,
    method_name: UnqualifiedName,
    original_descriptor: MethodDescriptor<BinaryName>,
    parameter_types: Vec<FieldType<BinaryName>>,
    return_type: Option<FieldType<BinaryName>>,
    is_static: bool,
    redirected_descriptor: MethodDescriptor<BinaryName>,
}

impl RedirectionSpec {
    pub fn new(
        position: Position,
        declaring_type: BinaryName,
        method_name: UnqualifiedName,
        original_descriptor: MethodDescriptor<BinaryName>,
        parameter_types: Vec<FieldType<BinaryName>>,
        return_type: Option<FieldType<BinaryName>>,
        is_static: bool,
    ) -> Result<RedirectionSpec, Error> {
        if parameter_types.len() != original_descriptor.parameters.len() {
            return Err(Error::ParameterCountMismatch {
                expected: original_descriptor.parameters.len(),
                found: parameter_types.len(),
            });
        }
        for (index, (found, expected)) in parameter_types
            .iter()
            .zip(&original_descriptor.parameters)
            .enumerate()
        {
            if found != expected {
                return Err(Error::ParameterTypeMismatch {
                    index,
                    expected: expected.clone(),
                    found: found.clone(),
                });
            }
        }
        if return_type != original_descriptor.return_type {
            return Err(Error::ReturnTypeMismatch {
                expected: original_descriptor.return_type.clone(),
                found: return_type,
            });
        }

        let redirected_descriptor =
            redirected_descriptor(&original_descriptor, &declaring_type, is_static);
        log::trace!(
            "Redirecting {}.{}{} as {}",
            declaring_type,
            method_name,
            original_descriptor.render(),
            redirected_descriptor.render()
        );

        Ok(RedirectionSpec {
            position,
            declaring_type,
            method_name,
            original_descriptor,
            parameter_types,
            return_type,
            is_static,
            redirected_descriptor,
        })
    }

    /// Redirect a method exactly as declared
    pub fn for_method(position: Position, method: &MethodData) -> Result<RedirectionSpec, Error> {
        RedirectionSpec::new(
            position,
            method.class.clone(),
            method.name.clone(),
            method.descriptor.clone(),
            method.descriptor.parameters.clone(),
            method.descriptor.return_type.clone(),
            method.is_static(),
        )
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn declaring_type(&self) -> &BinaryName {
        &self.declaring_type
    }

    pub fn method_name(&self) -> &UnqualifiedName {
        &self.method_name
    }

    pub fn original_descriptor(&self) -> &MethodDescriptor<BinaryName> {
        &self.original_descriptor
    }

    /// Parameter types, in argument order
    pub fn parameter_types(&self) -> &[FieldType<BinaryName>] {
        &self.parameter_types
    }

    /// Declared return type (`None` for `void`)
    pub fn return_type(&self) -> &Option<FieldType<BinaryName>> {
        &self.return_type
    }

    pub fn is_static(&self) -> bool {
        self.is_static
    }

    /// Descriptor of the replacement: the original one, with the receiver prepended for instance
    /// methods
    pub fn redirected_descriptor(&self) -> &MethodDescriptor<BinaryName> {
        &self.redirected_descriptor
    }

    /// Key passed to a generic dispatcher
    pub fn method_key(&self) -> String {
        method_key(&self.method_name, &self.original_descriptor)
    }

    /// Local variable slot of every argument, receiver included, alongside its type
    pub fn argument_locals(&self) -> Vec<(u16, FieldType<BinaryName>)> {
        let mut locals = Vec::with_capacity(self.parameter_types.len() + 1);
        let mut offset: u16 = 0;
        if !self.is_static {
            locals.push((offset, FieldType::object(self.declaring_type.clone())));
            offset += 1;
        }
        for parameter in &self.parameter_types {
            locals.push((offset, parameter.clone()));
            offset += parameter.width() as u16;
        }
        locals
    }
}
