use super::*;
use crate::jvm::code::{BranchInstruction, ConstantData, Instruction, InvokeType};
use crate::jvm::{
    BaseType, BinaryName, ClassGraph, FieldType, RefType, RenderDescriptor, UnqualifiedName,
    VerifierErrorKind,
};
use crate::util::{Offset, SlotLookup, SlotVec, Width};

/// Snapshot of the stack and local variables at a point in the bytecode
///
/// Tracking frames lets us validate that the bytecode being created is valid as it is created,
/// so mistakes show up at the instruction that caused them.
#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct Frame<Cls> {
    /// Local variables in scope
    pub locals: SlotVec<VerificationType<Cls>>,

    /// Types of values on the stack
    pub stack: SlotVec<VerificationType<Cls>>,
}

/// Stack map frame stored during verification
pub type VerifierFrame = Frame<RefType<BinaryName>>;

type VType = VerificationType<RefType<BinaryName>>;

impl VerifierFrame {
    /// Update the frame to reflect the effects of the given (non-branching) instruction
    pub fn verify_instruction(
        &mut self,
        insn: &Instruction,
        class_graph: &ClassGraph,
        this_class: &RefType<BinaryName>,
    ) -> Result<(), VerifierErrorKind> {
        verify_instruction(self, class_graph, this_class, insn)
    }

    /// Update the frame to reflect the effects of the given branching instruction
    pub fn verify_branch_instruction<Lbl, LblNext>(
        &mut self,
        insn: &BranchInstruction<Lbl, LblNext>,
        this_method_return_type: &Option<FieldType<BinaryName>>,
        class_graph: &ClassGraph,
    ) -> Result<(), VerifierErrorKind> {
        verify_branch_instruction(self, this_method_return_type, insn, class_graph)
    }

    /// Update the maximum locals and stack
    ///
    /// Only has an effect if the size of the locals or the size of the stack is greater than the
    /// previous maximum values.
    pub fn update_maximums(&self, max_locals: &mut Offset, max_stack: &mut Offset) {
        max_locals.0 = max_locals.0.max(self.locals.offset_len().0);
        max_stack.0 = max_stack.0.max(self.stack.offset_len().0);
    }
}

fn verify_instruction(
    frame: &mut VerifierFrame,
    class_graph: &ClassGraph,
    this_class: &RefType<BinaryName>,
    insn: &Instruction,
) -> Result<(), VerifierErrorKind> {
    use Instruction::*;
    use VerificationType::*;

    let Frame {
        ref mut stack,
        ref mut locals,
    } = frame;

    let assignable = |sub_type: &VType, super_type: &VType| {
        VerificationType::is_assignable(class_graph, sub_type, super_type)
    };

    match insn {
        Nop => (),
        AConstNull => {
            stack.push(Null);
        }
        IConstM1 | IConst0 | IConst1 | IConst2 | IConst3 | IConst4 | IConst5 => {
            stack.push(Integer);
        }
        LConst0 | LConst1 => {
            stack.push(Long);
        }
        FConst0 | FConst1 | FConst2 => {
            stack.push(Float);
        }
        DConst0 | DConst1 => {
            stack.push(Double);
        }
        BiPush(_) | SiPush(_) => {
            stack.push(Integer);
        }
        Ldc(constant) => {
            stack.push(match constant {
                ConstantData::String(_) => Object(RefType::Object(BinaryName::STRING)),
                ConstantData::Class(_) => Object(RefType::Object(BinaryName::CLASS)),
                ConstantData::Integer(_) => Integer,
                ConstantData::Float(_) => Float,
                ConstantData::Long(_) | ConstantData::Double(_) => {
                    return Err(VerifierErrorKind::InvalidWidth(2))
                }
            });
        }
        Ldc2(constant) => {
            stack.push(match constant {
                ConstantData::String(_)
                | ConstantData::Class(_)
                | ConstantData::Integer(_)
                | ConstantData::Float(_) => return Err(VerifierErrorKind::InvalidWidth(1)),
                ConstantData::Long(_) => Long,
                ConstantData::Double(_) => Double,
            });
        }

        ILoad(offset) => {
            get_local_expecting_type(locals, *offset, Integer)?;
            stack.push(Integer);
        }
        LLoad(offset) => {
            get_local_expecting_type(locals, *offset, Long)?;
            stack.push(Long);
        }
        FLoad(offset) => {
            get_local_expecting_type(locals, *offset, Float)?;
            stack.push(Float);
        }
        DLoad(offset) => {
            get_local_expecting_type(locals, *offset, Double)?;
            stack.push(Double);
        }
        ALoad(offset) => {
            let typ = get_local(locals, *offset)?;
            if !typ.is_reference() {
                return Err(VerifierErrorKind::NotReferenceType(typ));
            }
            stack.push(typ);
        }

        AALoad => {
            pop_expecting_type(stack, Integer)?;
            match pop(stack)? {
                Object(array_type @ RefType::ObjectArray(_)) => match array_type.element_type() {
                    Some(elem_type) => stack.push(VType::from(elem_type)),
                    None => return Err(VerifierErrorKind::NotArrayType),
                },
                _ => return Err(VerifierErrorKind::NotArrayType),
            };
        }

        IStore(offset) => {
            pop_expecting_type(stack, Integer)?;
            update_local_type(locals, *offset, Integer)?;
        }
        FStore(offset) => {
            pop_expecting_type(stack, Float)?;
            update_local_type(locals, *offset, Float)?;
        }
        LStore(offset) => {
            pop_expecting_type(stack, Long)?;
            update_local_type(locals, *offset, Long)?;
        }
        DStore(offset) => {
            pop_expecting_type(stack, Double)?;
            update_local_type(locals, *offset, Double)?;
        }
        AStore(offset) => {
            let popped_type = pop(stack)?;
            if !popped_type.is_reference() {
                return Err(VerifierErrorKind::NotReferenceType(popped_type));
            }
            update_local_type(locals, *offset, popped_type)?;
        }

        AAStore => {
            let elem_type = pop(stack)?;
            pop_expecting_type(stack, Integer)?;
            match pop(stack)? {
                Object(array_type @ RefType::ObjectArray(_)) => {
                    let expected_elem_type = array_type
                        .element_type()
                        .map(VType::from)
                        .ok_or(VerifierErrorKind::NotArrayType)?;
                    if !assignable(&elem_type, &expected_elem_type) {
                        return Err(VerifierErrorKind::IncompatibleTypes(
                            elem_type,
                            expected_elem_type,
                        ));
                    }
                }
                _ => return Err(VerifierErrorKind::NotArrayType),
            }
        }

        Pop => {
            let _ = pop_expecting_width(stack, 1)?;
        }

        Pop2 => {
            let arg1 = pop(stack)?;
            match arg1.width() {
                // Form 1
                1 => {
                    let _ = pop_expecting_width(stack, 1)?;
                }

                // Form 2
                2 => (),

                other => return Err(VerifierErrorKind::InvalidWidth(other)),
            }
        }

        Dup => {
            let arg1 = pop_expecting_width(stack, 1)?;
            stack.push(arg1.clone());
            stack.push(arg1);
        }

        Swap => {
            let arg1 = pop_expecting_width(stack, 1)?;
            let arg2 = pop_expecting_width(stack, 1)?;
            stack.push(arg1);
            stack.push(arg2);
        }

        IAdd | ISub | IMul => {
            pop_expecting_type(stack, Integer)?;
            pop_expecting_type(stack, Integer)?;
            stack.push(Integer);
        }

        LAdd | LSub | LMul => {
            pop_expecting_type(stack, Long)?;
            pop_expecting_type(stack, Long)?;
            stack.push(Long);
        }

        FAdd => {
            pop_expecting_type(stack, Float)?;
            pop_expecting_type(stack, Float)?;
            stack.push(Float);
        }

        DAdd => {
            pop_expecting_type(stack, Double)?;
            pop_expecting_type(stack, Double)?;
            stack.push(Double);
        }

        INeg => {
            pop_expecting_type(stack, Integer)?;
            stack.push(Integer);
        }

        I2L => {
            pop_expecting_type(stack, Integer)?;
            stack.push(Long);
        }
        I2F => {
            pop_expecting_type(stack, Integer)?;
            stack.push(Float);
        }
        I2D => {
            pop_expecting_type(stack, Integer)?;
            stack.push(Double);
        }
        L2I => {
            pop_expecting_type(stack, Long)?;
            stack.push(Integer);
        }

        GetStatic(field) => {
            stack.push(VType::from(field.descriptor.clone()));
        }
        PutStatic(field) => {
            let field_type = VType::from(field.descriptor.clone());
            let arg_type = pop(stack)?;
            if !assignable(&arg_type, &field_type) {
                return Err(VerifierErrorKind::IncompatibleTypes(arg_type, field_type));
            }
        }

        GetField(field) => {
            let object_type = Object(RefType::Object(field.class.clone()));
            let object_type_found = pop(stack)?;
            if !assignable(&object_type_found, &object_type) {
                return Err(VerifierErrorKind::IncompatibleTypes(
                    object_type_found,
                    object_type,
                ));
            }
            stack.push(VType::from(field.descriptor.clone()));
        }
        PutField(field) => {
            let field_type = VType::from(field.descriptor.clone());
            let object_type = Object(RefType::Object(field.class.clone()));
            let arg_type = pop(stack)?;
            if !assignable(&arg_type, &field_type) {
                return Err(VerifierErrorKind::IncompatibleTypes(arg_type, field_type));
            }
            let object_type_found = pop(stack)?;
            if !assignable(&object_type_found, &object_type) {
                return Err(VerifierErrorKind::IncompatibleTypes(
                    object_type_found,
                    object_type,
                ));
            }
        }

        Invoke(invoke_type, method) => {
            let is_interface = class_graph
                .is_interface(&method.class)
                .map_err(|_| VerifierErrorKind::MissingClass(method.class.clone()))?;
            let is_init = method.name == UnqualifiedName::INIT;
            let desc = &method.descriptor;

            // Check that all the arguments match
            for expected_arg_type in desc.parameters.iter().rev() {
                let found_arg_type = pop(stack)?;
                let expected_arg_type = VType::from(expected_arg_type.clone());
                if !assignable(&found_arg_type, &expected_arg_type) {
                    log::error!(
                        "Incompatible argument types: found {:?} but expected {:?} (for {})",
                        found_arg_type,
                        expected_arg_type,
                        desc.render(),
                    );
                    return Err(VerifierErrorKind::IncompatibleTypes(
                        found_arg_type,
                        expected_arg_type,
                    ));
                }
            }

            if let (InvokeType::Special, true) = (invoke_type, is_init) {
                // Initialize
                match pop(stack)? {
                    UninitializedThis => {
                        replace_all(stack, &UninitializedThis, || Object(this_class.clone()));
                        replace_all(locals, &UninitializedThis, || Object(this_class.clone()));
                    }
                    _ => return Err(VerifierErrorKind::InvalidType),
                }

                if is_interface || desc.return_type.is_some() {
                    return Err(VerifierErrorKind::InvalidType);
                }
            } else {
                let (is_interface2, needs_receiver) = match invoke_type {
                    InvokeType::Static => (is_interface, false),
                    InvokeType::Virtual | InvokeType::Special => (false, true),
                    InvokeType::Interface(_) => (true, true),
                };

                if is_interface != is_interface2 {
                    return Err(VerifierErrorKind::InvalidType);
                }

                // Pop off the receiver type
                if needs_receiver {
                    let found_receiver = pop(stack)?;
                    let expected = Object(RefType::Object(method.class.clone()));
                    if !assignable(&found_receiver, &expected) {
                        log::error!(
                            "Incompatible receiver: found {:?} but expected {:?} (for {})",
                            found_receiver,
                            expected,
                            desc.render(),
                        );
                        return Err(VerifierErrorKind::IncompatibleTypes(found_receiver, expected));
                    }
                }

                // Push the return type
                if let Some(return_type) = &desc.return_type {
                    stack.push(VType::from(return_type.clone()));
                }
            }
        }

        ANewArray(ref_type) => {
            pop_expecting_type(stack, Integer)?;
            stack.push(Object(RefType::array(FieldType::Ref(ref_type.clone()))));
        }
        ArrayLength => {
            match pop(stack)? {
                Object(RefType::PrimitiveArray(_) | RefType::ObjectArray(_)) | Null => (),
                _ => return Err(VerifierErrorKind::NotArrayType),
            }
            stack.push(Integer);
        }

        CheckCast(ref_type) => {
            match pop(stack)? {
                Object(_) | Null => (),
                other => return Err(VerifierErrorKind::NotReferenceType(other)),
            }
            stack.push(Object(ref_type.clone()));
        }
        InstanceOf(_) => {
            match pop(stack)? {
                Object(_) | Null => (),
                other => return Err(VerifierErrorKind::NotReferenceType(other)),
            }
            stack.push(Integer);
        }
    }

    Ok(())
}

fn verify_branch_instruction<Lbl, LblNext>(
    frame: &mut VerifierFrame,
    this_method_return_type: &Option<FieldType<BinaryName>>,
    insn: &BranchInstruction<Lbl, LblNext>,
    class_graph: &ClassGraph,
) -> Result<(), VerifierErrorKind> {
    use BranchInstruction::*;
    use VerificationType::*;

    let Frame {
        ref mut stack,
        locals: _,
    } = frame;

    match insn {
        If(_, _, _) => pop_expecting_type(stack, Integer)?,
        IfICmp(_, _, _) => {
            pop_expecting_type(stack, Integer)?;
            pop_expecting_type(stack, Integer)?;
        }
        IfACmp(_, _, _) => {
            let atype_1 = pop(stack)?;
            let atype_2 = pop(stack)?;
            if !atype_1.is_reference() {
                return Err(VerifierErrorKind::NotReferenceType(atype_1));
            }
            if !atype_2.is_reference() {
                return Err(VerifierErrorKind::NotReferenceType(atype_2));
            }
        }
        IfNull(_, _, _) => {
            let atype = pop(stack)?;
            if !atype.is_reference() {
                return Err(VerifierErrorKind::NotReferenceType(atype));
            }
        }
        Goto(_) => (),
        IReturn => {
            pop_expecting_type(stack, Integer)?;
            match this_method_return_type {
                Some(FieldType::Base(
                    BaseType::Int
                    | BaseType::Char
                    | BaseType::Short
                    | BaseType::Byte
                    | BaseType::Boolean,
                )) => (),
                _ => return Err(VerifierErrorKind::InvalidType),
            }
        }
        LReturn => {
            pop_expecting_type(stack, Long)?;
            if *this_method_return_type != Some(FieldType::long()) {
                return Err(VerifierErrorKind::InvalidType);
            }
        }
        FReturn => {
            pop_expecting_type(stack, Float)?;
            if *this_method_return_type != Some(FieldType::float()) {
                return Err(VerifierErrorKind::InvalidType);
            }
        }
        DReturn => {
            pop_expecting_type(stack, Double)?;
            if *this_method_return_type != Some(FieldType::double()) {
                return Err(VerifierErrorKind::InvalidType);
            }
        }
        AReturn => {
            let atype = pop(stack)?;
            match this_method_return_type {
                Some(ret_type @ FieldType::Ref(_)) => {
                    let expected = VType::from(ret_type.clone());
                    if !VerificationType::is_assignable(class_graph, &atype, &expected) {
                        return Err(VerifierErrorKind::IncompatibleTypes(atype, expected));
                    }
                }
                _ => return Err(VerifierErrorKind::InvalidType),
            }
        }
        Return => {
            if this_method_return_type.is_some() {
                return Err(VerifierErrorKind::InvalidType);
            }
        }
        AThrow => {
            let atype = pop(stack)?;
            let throwable = Object(RefType::Object(BinaryName::THROWABLE));
            if !VerificationType::is_assignable(class_graph, &atype, &throwable) {
                return Err(VerifierErrorKind::IncompatibleTypes(atype, throwable));
            }
            *stack = SlotVec::new();
            stack.push(atype);
        }
        FallThrough(_) => (),
    }

    Ok(())
}

fn replace_all(
    slots: &mut SlotVec<VType>,
    original: &VType,
    updated: impl Fn() -> VType,
) {
    let replaced: SlotVec<VType> = slots
        .iter()
        .map(|(_, ty)| if ty == original { updated() } else { ty.clone() })
        .collect();
    *slots = replaced;
}

fn get_local(locals: &SlotVec<VType>, offset: u16) -> Result<VType, VerifierErrorKind> {
    match locals.get_offset(Offset(offset as usize)) {
        SlotLookup::Found(typ) => Ok(typ.clone()),
        SlotLookup::Straddled | SlotLookup::Missing => Err(VerifierErrorKind::InvalidIndex),
    }
}

fn get_local_expecting_type(
    locals: &SlotVec<VType>,
    offset: u16,
    expected_type: VType,
) -> Result<(), VerifierErrorKind> {
    let found_type = get_local(locals, offset)?;
    if found_type == expected_type {
        Ok(())
    } else {
        Err(VerifierErrorKind::IncompatibleTypes(found_type, expected_type))
    }
}

fn update_local_type(
    locals: &mut SlotVec<VType>,
    offset: u16,
    new_type: VType,
) -> Result<(), VerifierErrorKind> {
    locals
        .set_offset(Offset(offset as usize), new_type)
        .map_err(|(expected_width, _)| VerifierErrorKind::InvalidWidth(expected_width))
}

fn pop(stack: &mut SlotVec<VType>) -> Result<VType, VerifierErrorKind> {
    stack
        .pop()
        .map(|(_, typ)| typ)
        .ok_or(VerifierErrorKind::EmptyStack)
}

fn pop_expecting_width(
    stack: &mut SlotVec<VType>,
    expected_width: usize,
) -> Result<VType, VerifierErrorKind> {
    let typ = pop(stack)?;
    let found_width = typ.width();
    if found_width == expected_width {
        Ok(typ)
    } else {
        Err(VerifierErrorKind::InvalidWidth(found_width))
    }
}

fn pop_expecting_type(
    stack: &mut SlotVec<VType>,
    expected_type: VType,
) -> Result<(), VerifierErrorKind> {
    let typ = pop(stack)?;
    if typ == expected_type {
        Ok(())
    } else {
        Err(VerifierErrorKind::IncompatibleTypes(typ, expected_type))
    }
}
