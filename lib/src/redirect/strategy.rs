use super::boxing::box_top;
use super::{Error, RedirectionSpec, Settings};
use crate::jvm::class_graph::MethodData;
use crate::jvm::code::{CodeBuilder, CodeBuilderExts, Instruction, InvokeType};
use crate::jvm::{BinaryName, FieldType, MethodAccessFlags, MethodDescriptor, RefType, UnqualifiedName};

/// How the alternate implementation gets called
///
/// Whatever the variant, the dispatch step consumes nothing from the stack and leaves exactly one
/// raw result (or nothing) on it. [`RedirectionStrategy::emit_dispatch`] reports which type that
/// raw result has, so the caller can adapt it to the declared return type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectionStrategy {
    /// Pack every argument into an `Object[]` and call the generic dispatcher on the alternate
    ///
    /// ```text
    /// $change.access$dispatch("compute.(II)I", new Object[] { this, a, b })
    /// ```
    ///
    /// The raw result is always a `java/lang/Object`, even for `void` methods.
    ArrayDispatch {
        change_interface: BinaryName,
        dispatch_method: UnqualifiedName,
    },

    /// Cast the alternate to the override class and call the method with the redirected
    /// descriptor on it, passing arguments unboxed
    ///
    /// ```text
    /// ((Calculator$override) $change).compute(this, a, b)
    /// ```
    ///
    /// The raw result already has the declared return type.
    DirectDispatch { override_class: BinaryName },
}

impl RedirectionStrategy {
    /// Generic dispatcher named in the settings
    pub fn array_dispatch(settings: &Settings) -> RedirectionStrategy {
        RedirectionStrategy::ArrayDispatch {
            change_interface: settings.change_interface.clone(),
            dispatch_method: settings.dispatch_method_name.clone(),
        }
    }

    /// Overrides declared on the companion class of `class`
    pub fn direct_dispatch(settings: &Settings, class: &BinaryName) -> RedirectionStrategy {
        RedirectionStrategy::DirectDispatch {
            override_class: settings.override_class(class),
        }
    }

    /// Method actually invoked for a given redirection
    pub fn dispatch_target(&self, spec: &RedirectionSpec) -> MethodData {
        match self {
            RedirectionStrategy::ArrayDispatch {
                change_interface,
                dispatch_method,
            } => MethodData {
                class: change_interface.clone(),
                name: dispatch_method.clone(),
                descriptor: MethodDescriptor {
                    parameters: vec![
                        FieldType::object(BinaryName::STRING),
                        FieldType::array(FieldType::object(BinaryName::OBJECT)),
                    ],
                    return_type: Some(FieldType::object(BinaryName::OBJECT)),
                },
                access_flags: MethodAccessFlags::PUBLIC | MethodAccessFlags::ABSTRACT,
            },
            RedirectionStrategy::DirectDispatch { override_class } => MethodData {
                class: override_class.clone(),
                name: spec.method_name().clone(),
                descriptor: spec.redirected_descriptor().clone(),
                access_flags: MethodAccessFlags::PUBLIC,
            },
        }
    }

    /// Emit the call to the alternate, returning the type of the raw result left on the stack
    pub fn emit_dispatch(
        &self,
        spec: &RedirectionSpec,
        code: &mut CodeBuilder,
        alternate_local: u16,
    ) -> Result<Option<FieldType<BinaryName>>, Error> {
        let target = self.dispatch_target(spec);
        let raw_type = target.descriptor.return_type.clone();

        match self {
            RedirectionStrategy::ArrayDispatch {
                change_interface, ..
            } => {
                let arguments = spec.argument_locals();

                code.get_local(alternate_local, &FieldType::object(change_interface.clone()))?;
                code.const_string(spec.method_key())?;

                code.const_int(arguments.len() as i32)?;
                code.new_ref_array(RefType::Object(BinaryName::OBJECT))?;
                for (index, (local, arg_type)) in arguments.iter().enumerate() {
                    code.push_instruction(Instruction::Dup)?;
                    code.const_int(index as i32)?;
                    code.get_local(*local, arg_type)?;
                    box_top(code, arg_type)?;
                    code.push_instruction(Instruction::AAStore)?;
                }

                let count = target.descriptor.parameter_length(true) as u8;
                code.push_instruction(Instruction::Invoke(InvokeType::Interface(count), target))?;
            }
            RedirectionStrategy::DirectDispatch { override_class } => {
                code.push_instruction(Instruction::ALoad(alternate_local))?;
                code.push_instruction(Instruction::CheckCast(RefType::Object(
                    override_class.clone(),
                )))?;
                for (local, arg_type) in spec.argument_locals() {
                    code.get_local(local, &arg_type)?;
                }
                code.invoke(target)?;
            }
        }

        Ok(raw_type)
    }
}
