//! The instructions here are an AST of JVM bytecode, slightly reshaped to be convenient to
//! construct:
//!
//!   - `wide` never shows up, it gets merged into the instructions it is allowed to modify
//!   - families of instructions (eg. `ifnull`/`ifnonnull`) become one instruction with a field
//!   - instructions we never emit (`jsr`, `monitorenter`, switches, ...) are omitted
//!

use crate::jvm::class_graph::{FieldData, MethodData};
use crate::jvm::{BinaryName, RefType, RenderDescriptor};
use std::borrow::Cow;
use std::fmt;
use std::ops::Not;

/// Non-branching JVM bytecode instruction
#[derive(Clone, Debug, PartialEq)]
pub enum Instruction {
    Nop,
    AConstNull,
    IConstM1,
    IConst0,
    IConst1,
    IConst2,
    IConst3,
    IConst4,
    IConst5,
    LConst0,
    LConst1,
    FConst0,
    FConst1,
    FConst2,
    DConst0,
    DConst1,
    BiPush(i8),
    SiPush(i16),
    Ldc(ConstantData), // covers both `ldc` and `ldc_w`
    Ldc2(ConstantData),
    ILoad(u16), // covers `iload`, `iload{0,3}`, and `wide iload`
    LLoad(u16),
    FLoad(u16),
    DLoad(u16),
    ALoad(u16),
    AALoad,
    IStore(u16), // covers `istore`, `istore{0,3}`, and `wide istore`
    LStore(u16),
    FStore(u16),
    DStore(u16),
    AStore(u16),
    AAStore,
    Pop,
    Pop2,
    Dup,
    Swap,
    IAdd,
    LAdd,
    FAdd,
    DAdd,
    ISub,
    LSub,
    IMul,
    LMul,
    INeg,
    I2L,
    I2F,
    I2D,
    L2I,
    GetStatic(FieldData),
    PutStatic(FieldData),
    GetField(FieldData),
    PutField(FieldData),
    Invoke(InvokeType, MethodData),
    ANewArray(RefType<BinaryName>),
    ArrayLength,
    CheckCast(RefType<BinaryName>),
    InstanceOf(RefType<BinaryName>),
}

/// Constants that can be loaded with `ldc`/`ldc2_w`
#[derive(Clone, Debug, PartialEq)]
pub enum ConstantData {
    String(Cow<'static, str>),
    Class(RefType<BinaryName>),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
}

/// Branching JVM bytecode instruction (these are the only instructions that end a basic block)
///
/// The type parameters let us abstract over the representation of
///
///   * __jump targets__: used in all instructions that can jump
///   * __fallthough targets__: used in all instructions that fall through
///
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BranchInstruction<Lbl, LblNext> {
    If(OrdComparison, Lbl, LblNext), // covers `ifeq`, `ifne`, `iflt`, `ifge`, `ifgt`, `ifle`
    IfICmp(OrdComparison, Lbl, LblNext), // covers `if_icmpeq`, `if_icmpne`, ... `if_icmple`
    IfACmp(EqComparison, Lbl, LblNext), // covers `if_acmpeq`, `if_acmpne`
    IfNull(EqComparison, Lbl, LblNext), // covers `ifnull`, `ifnonnull`
    Goto(Lbl),
    IReturn,
    LReturn,
    FReturn,
    DReturn,
    AReturn,
    Return,
    AThrow,

    /// This is a synthetic marker used to explicitly end a block which just falls through to the
    /// next block. In the JVM, this is implicit when a block ends without a jump. Making it
    /// explicit allows us to enforce that all blocks end in a branch instruction.
    FallThrough(LblNext),
}

impl<Lbl: Copy, LblNext: Copy> BranchInstruction<Lbl, LblNext> {
    /// If the instruction can fall through to the next block, get that next block
    pub fn fallthrough_target(&self) -> Option<LblNext> {
        match self {
            BranchInstruction::Goto(_)
            | BranchInstruction::IReturn
            | BranchInstruction::LReturn
            | BranchInstruction::FReturn
            | BranchInstruction::DReturn
            | BranchInstruction::AReturn
            | BranchInstruction::Return
            | BranchInstruction::AThrow => None,

            BranchInstruction::If(_, _, lbl)
            | BranchInstruction::IfICmp(_, _, lbl)
            | BranchInstruction::IfACmp(_, _, lbl)
            | BranchInstruction::IfNull(_, _, lbl)
            | BranchInstruction::FallThrough(lbl) => Some(*lbl),
        }
    }

    /// If the instruction can jump to another block (non-fallthrough), get that block
    pub fn jump_target(&self) -> Option<Lbl> {
        match self {
            BranchInstruction::If(_, lbl, _)
            | BranchInstruction::IfICmp(_, lbl, _)
            | BranchInstruction::IfACmp(_, lbl, _)
            | BranchInstruction::IfNull(_, lbl, _)
            | BranchInstruction::Goto(lbl) => Some(*lbl),

            BranchInstruction::IReturn
            | BranchInstruction::LReturn
            | BranchInstruction::FReturn
            | BranchInstruction::DReturn
            | BranchInstruction::AReturn
            | BranchInstruction::Return
            | BranchInstruction::AThrow
            | BranchInstruction::FallThrough(_) => None,
        }
    }

    /// Does this instruction leave the method?
    pub fn is_exit(&self) -> bool {
        self.fallthrough_target().is_none() && self.jump_target().is_none()
    }

    pub fn map_labels<Lbl2, LblNext2>(
        &self,
        map_label: impl FnOnce(&Lbl) -> Lbl2,
        map_next_label: impl FnOnce(&LblNext) -> LblNext2,
    ) -> BranchInstruction<Lbl2, LblNext2> {
        use BranchInstruction::*;

        match self {
            If(op, lbl, next) => If(*op, map_label(lbl), map_next_label(next)),
            IfICmp(op, lbl, next) => IfICmp(*op, map_label(lbl), map_next_label(next)),
            IfACmp(op, lbl, next) => IfACmp(*op, map_label(lbl), map_next_label(next)),
            IfNull(op, lbl, next) => IfNull(*op, map_label(lbl), map_next_label(next)),
            Goto(lbl) => Goto(map_label(lbl)),
            IReturn => IReturn,
            LReturn => LReturn,
            FReturn => FReturn,
            DReturn => DReturn,
            AReturn => AReturn,
            Return => Return,
            AThrow => AThrow,
            FallThrough(next) => FallThrough(map_next_label(next)),
        }
    }
}

/// Binary comparison operators available for `int` branches
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum OrdComparison {
    EQ,
    GE,
    GT,
    LE,
    LT,
    NE,
}

impl Not for OrdComparison {
    type Output = Self;

    fn not(self) -> Self::Output {
        match self {
            OrdComparison::EQ => OrdComparison::NE,
            OrdComparison::GE => OrdComparison::LT,
            OrdComparison::GT => OrdComparison::LE,
            OrdComparison::LE => OrdComparison::GT,
            OrdComparison::LT => OrdComparison::GE,
            OrdComparison::NE => OrdComparison::EQ,
        }
    }
}

/// Equality/inequality comparison operators
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum EqComparison {
    EQ,
    NE,
}

impl Not for EqComparison {
    type Output = Self;

    fn not(self) -> Self::Output {
        match self {
            EqComparison::EQ => EqComparison::NE,
            EqComparison::NE => EqComparison::EQ,
        }
    }
}

/// Type of method to invoke
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum InvokeType {
    Virtual,
    Special,
    Static,
    Interface(u8), // `count` is of total arguments, where `long`/`double` count for 2
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Instruction::*;

        match self {
            BiPush(value) => write!(f, "bipush {}", value),
            SiPush(value) => write!(f, "sipush {}", value),
            Ldc(constant) => write!(f, "ldc {}", constant),
            Ldc2(constant) => write!(f, "ldc2_w {}", constant),
            ILoad(idx) => write!(f, "iload {}", idx),
            LLoad(idx) => write!(f, "lload {}", idx),
            FLoad(idx) => write!(f, "fload {}", idx),
            DLoad(idx) => write!(f, "dload {}", idx),
            ALoad(idx) => write!(f, "aload {}", idx),
            IStore(idx) => write!(f, "istore {}", idx),
            LStore(idx) => write!(f, "lstore {}", idx),
            FStore(idx) => write!(f, "fstore {}", idx),
            DStore(idx) => write!(f, "dstore {}", idx),
            AStore(idx) => write!(f, "astore {}", idx),
            GetStatic(field) => write!(f, "getstatic {:?}", field),
            PutStatic(field) => write!(f, "putstatic {:?}", field),
            GetField(field) => write!(f, "getfield {:?}", field),
            PutField(field) => write!(f, "putfield {:?}", field),
            Invoke(InvokeType::Virtual, method) => write!(f, "invokevirtual {:?}", method),
            Invoke(InvokeType::Special, method) => write!(f, "invokespecial {:?}", method),
            Invoke(InvokeType::Static, method) => write!(f, "invokestatic {:?}", method),
            Invoke(InvokeType::Interface(count), method) => {
                write!(f, "invokeinterface {:?} {}", method, count)
            }
            ANewArray(ref_type) => write!(f, "anewarray {}", ref_type.render()),
            CheckCast(ref_type) => write!(f, "checkcast {}", ref_type.render()),
            InstanceOf(ref_type) => write!(f, "instanceof {}", ref_type.render()),
            other => {
                let mnemonic = match other {
                    Nop => "nop",
                    AConstNull => "aconst_null",
                    IConstM1 => "iconst_m1",
                    IConst0 => "iconst_0",
                    IConst1 => "iconst_1",
                    IConst2 => "iconst_2",
                    IConst3 => "iconst_3",
                    IConst4 => "iconst_4",
                    IConst5 => "iconst_5",
                    LConst0 => "lconst_0",
                    LConst1 => "lconst_1",
                    FConst0 => "fconst_0",
                    FConst1 => "fconst_1",
                    FConst2 => "fconst_2",
                    DConst0 => "dconst_0",
                    DConst1 => "dconst_1",
                    AALoad => "aaload",
                    AAStore => "aastore",
                    Pop => "pop",
                    Pop2 => "pop2",
                    Dup => "dup",
                    Swap => "swap",
                    IAdd => "iadd",
                    LAdd => "ladd",
                    FAdd => "fadd",
                    DAdd => "dadd",
                    ISub => "isub",
                    LSub => "lsub",
                    IMul => "imul",
                    LMul => "lmul",
                    INeg => "ineg",
                    I2L => "i2l",
                    I2F => "i2f",
                    I2D => "i2d",
                    L2I => "l2i",
                    ArrayLength => "arraylength",
                    _ => unreachable!("instruction with operands"),
                };
                f.write_str(mnemonic)
            }
        }
    }
}

impl fmt::Display for ConstantData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstantData::String(string) => write!(f, "{:?}", string),
            ConstantData::Class(ref_type) => write!(f, "{}.class", ref_type.render()),
            ConstantData::Integer(integer) => write!(f, "{}", integer),
            ConstantData::Float(float) => write!(f, "{}f", float),
            ConstantData::Long(long) => write!(f, "{}L", long),
            ConstantData::Double(double) => write!(f, "{}d", double),
        }
    }
}

impl<Lbl: fmt::Debug, LblNext> fmt::Display for BranchInstruction<Lbl, LblNext> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use BranchInstruction::*;

        fn ord(op: &OrdComparison) -> &'static str {
            match op {
                OrdComparison::EQ => "eq",
                OrdComparison::NE => "ne",
                OrdComparison::LT => "lt",
                OrdComparison::GE => "ge",
                OrdComparison::GT => "gt",
                OrdComparison::LE => "le",
            }
        }

        match self {
            If(op, lbl, _) => write!(f, "if{} {:?}", ord(op), lbl),
            IfICmp(op, lbl, _) => write!(f, "if_icmp{} {:?}", ord(op), lbl),
            IfACmp(EqComparison::EQ, lbl, _) => write!(f, "if_acmpeq {:?}", lbl),
            IfACmp(EqComparison::NE, lbl, _) => write!(f, "if_acmpne {:?}", lbl),
            IfNull(EqComparison::EQ, lbl, _) => write!(f, "ifnull {:?}", lbl),
            IfNull(EqComparison::NE, lbl, _) => write!(f, "ifnonnull {:?}", lbl),
            Goto(lbl) => write!(f, "goto {:?}", lbl),
            IReturn => f.write_str("ireturn"),
            LReturn => f.write_str("lreturn"),
            FReturn => f.write_str("freturn"),
            DReturn => f.write_str("dreturn"),
            AReturn => f.write_str("areturn"),
            Return => f.write_str("return"),
            AThrow => f.write_str("athrow"),
            FallThrough(_) => Ok(()),
        }
    }
}
