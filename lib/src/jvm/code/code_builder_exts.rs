use crate::jvm::class_graph::{FieldData, MethodData};
use crate::jvm::code::{BranchInstruction, CodeBuilder, ConstantData, Instruction, InvokeType};
use crate::jvm::{BaseType, BinaryName, Error, FieldType, RefType};
use crate::util::Width;
use std::borrow::Cow;

pub trait CodeBuilderExts {
    /// Push a constant string to the stack
    fn const_string(&mut self, string: impl Into<Cow<'static, str>>) -> Result<(), Error>;

    /// Push an integer constant onto the stack
    fn const_int(&mut self, integer: i32) -> Result<(), Error>;

    /// Push a long constant onto the stack
    ///
    /// Small values use `int` instructions followed by a conversion, which keeps them out of the
    /// constant pool.
    fn const_long(&mut self, long: i64) -> Result<(), Error>;

    /// Get a local at a particular offset
    fn get_local(&mut self, offset: u16, field_type: &FieldType<BinaryName>) -> Result<(), Error>;

    /// Set a local at a particular offset
    fn set_local(&mut self, offset: u16, field_type: &FieldType<BinaryName>) -> Result<(), Error>;

    /// First local slot not used by the current frame
    fn next_local(&self) -> Result<u16, Error>;

    /// Return from the function
    fn return_(&mut self, field_type_opt: &Option<FieldType<BinaryName>>) -> Result<(), Error>;

    /// Pop the top of the stack, accounting for the different possible type widths
    fn pop(&mut self) -> Result<(), Error>;

    /// Invoke a method, picking the invocation type from the method and its class
    fn invoke(&mut self, method: MethodData) -> Result<(), Error>;

    /// Get/put a field
    fn access_field(&mut self, field: FieldData, access_mode: AccessMode) -> Result<(), Error>;

    /// Construct a new array of the given type
    fn new_ref_array(&mut self, elem_type: RefType<BinaryName>) -> Result<(), Error>;
}

impl<'g> CodeBuilderExts for CodeBuilder<'g> {
    fn const_string(&mut self, string: impl Into<Cow<'static, str>>) -> Result<(), Error> {
        let constant = ConstantData::String(string.into());
        self.push_instruction(Instruction::Ldc(constant))
    }

    fn const_int(&mut self, integer: i32) -> Result<(), Error> {
        let insn = match integer {
            -1 => Instruction::IConstM1,
            0 => Instruction::IConst0,
            1 => Instruction::IConst1,
            2 => Instruction::IConst2,
            3 => Instruction::IConst3,
            4 => Instruction::IConst4,
            5 => Instruction::IConst5,
            -128..=127 => Instruction::BiPush(integer as i8),
            -32768..=32767 => Instruction::SiPush(integer as i16),
            _ => Instruction::Ldc(ConstantData::Integer(integer)),
        };
        self.push_instruction(insn)
    }

    fn const_long(&mut self, long: i64) -> Result<(), Error> {
        match long {
            0 => self.push_instruction(Instruction::LConst0),
            1 => self.push_instruction(Instruction::LConst1),
            -32768..=32767 => {
                self.const_int(long as i32)?;
                self.push_instruction(Instruction::I2L)
            }
            _ => self.push_instruction(Instruction::Ldc2(ConstantData::Long(long))),
        }
    }

    fn get_local(&mut self, offset: u16, field_type: &FieldType<BinaryName>) -> Result<(), Error> {
        let insn = match field_type {
            FieldType::Base(
                BaseType::Int
                | BaseType::Char
                | BaseType::Short
                | BaseType::Byte
                | BaseType::Boolean,
            ) => Instruction::ILoad(offset),
            FieldType::Base(BaseType::Float) => Instruction::FLoad(offset),
            FieldType::Base(BaseType::Long) => Instruction::LLoad(offset),
            FieldType::Base(BaseType::Double) => Instruction::DLoad(offset),
            FieldType::Ref(_) => Instruction::ALoad(offset),
        };
        self.push_instruction(insn)
    }

    fn set_local(&mut self, offset: u16, field_type: &FieldType<BinaryName>) -> Result<(), Error> {
        let insn = match field_type {
            FieldType::Base(
                BaseType::Int
                | BaseType::Char
                | BaseType::Short
                | BaseType::Byte
                | BaseType::Boolean,
            ) => Instruction::IStore(offset),
            FieldType::Base(BaseType::Float) => Instruction::FStore(offset),
            FieldType::Base(BaseType::Long) => Instruction::LStore(offset),
            FieldType::Base(BaseType::Double) => Instruction::DStore(offset),
            FieldType::Ref(_) => Instruction::AStore(offset),
        };
        self.push_instruction(insn)
    }

    fn next_local(&self) -> Result<u16, Error> {
        match self.current_frame() {
            Some(frame) => Ok(frame.locals.offset_len().0 as u16),
            None => Err(Error::UnreachableCode(String::from("allocate local"))),
        }
    }

    fn return_(&mut self, field_type_opt: &Option<FieldType<BinaryName>>) -> Result<(), Error> {
        let insn = match field_type_opt {
            None => BranchInstruction::Return,
            Some(FieldType::Base(
                BaseType::Int
                | BaseType::Char
                | BaseType::Short
                | BaseType::Byte
                | BaseType::Boolean,
            )) => BranchInstruction::IReturn,
            Some(FieldType::Base(BaseType::Float)) => BranchInstruction::FReturn,
            Some(FieldType::Base(BaseType::Long)) => BranchInstruction::LReturn,
            Some(FieldType::Base(BaseType::Double)) => BranchInstruction::DReturn,
            Some(FieldType::Ref(_)) => BranchInstruction::AReturn,
        };
        self.push_branch_instruction(insn)
    }

    fn pop(&mut self) -> Result<(), Error> {
        let wide_typ = self
            .current_frame()
            .and_then(|frame| frame.stack.last())
            .map_or(false, |t| t.width() == 2);
        let insn = if wide_typ {
            Instruction::Pop2
        } else {
            Instruction::Pop
        };
        self.push_instruction(insn)
    }

    fn invoke(&mut self, method: MethodData) -> Result<(), Error> {
        let invoke_type = if method.is_static() {
            InvokeType::Static
        } else if self.class_graph.is_interface(&method.class)? {
            // Count includes the receiver
            InvokeType::Interface(method.descriptor.parameter_length(true) as u8)
        } else {
            InvokeType::Virtual
        };
        self.push_instruction(Instruction::Invoke(invoke_type, method))
    }

    fn access_field(&mut self, field: FieldData, access_mode: AccessMode) -> Result<(), Error> {
        self.push_instruction(match (field.is_static(), access_mode) {
            (true, AccessMode::Read) => Instruction::GetStatic(field),
            (true, AccessMode::Write) => Instruction::PutStatic(field),
            (false, AccessMode::Read) => Instruction::GetField(field),
            (false, AccessMode::Write) => Instruction::PutField(field),
        })
    }

    fn new_ref_array(&mut self, elem_type: RefType<BinaryName>) -> Result<(), Error> {
        self.push_instruction(Instruction::ANewArray(elem_type))
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AccessMode {
    Read,
    Write,
}
