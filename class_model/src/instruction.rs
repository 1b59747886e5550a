use crate::program_error::Result;
use crate::switch_table::{JumpTable, LookupTable};
use crate::type_descriptor::{PrimitiveType, TypeTag};
use std::fmt::{Display, Formatter};

/// 指令在方法代码中的下标，程序计数器与跳转目标都使用它
pub type CodeIndex = usize;

/// 符号化的字段引用（已经从常量池中解析出来）
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldRef {
    pub class: String,
    pub name: String,
    pub descriptor: String,
}

impl FieldRef {
    pub fn new(class: &str, name: &str, descriptor: &str) -> FieldRef {
        FieldRef {
            class: class.to_string(),
            name: name.to_string(),
            descriptor: descriptor.to_string(),
        }
    }
}

impl Display for FieldRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}:{}", self.class, self.name, self.descriptor)
    }
}

/// 符号化的方法引用
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodRef {
    pub class: String,
    pub name: String,
    pub descriptor: String,
}

impl MethodRef {
    pub fn new(class: &str, name: &str, descriptor: &str) -> MethodRef {
        MethodRef {
            class: class.to_string(),
            name: name.to_string(),
            descriptor: descriptor.to_string(),
        }
    }
}

impl Display for MethodRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}{}", self.class, self.name, self.descriptor)
    }
}

/// Lowered instruction set.
///
/// Mirrors the JVM instruction set
/// (https://docs.oracle.com/javase/specs/jvms/se21/html/jvms-6.html#jvms-6.5)
/// with constant-pool operands already resolved into symbolic references,
/// the `_n` short forms folded into their indexed form, and branch offsets
/// replaced by absolute instruction indices.
#[derive(Debug, Clone, PartialEq, strum_macros::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Instruction {
    Nop,
    AconstNull,
    Iconst(i32),
    Lconst(i64),
    Fconst(f32),
    Dconst(f64),

    Iload(u16),
    Lload(u16),
    Fload(u16),
    Dload(u16),
    Aload(u16),
    Istore(u16),
    Lstore(u16),
    Fstore(u16),
    Dstore(u16),
    Astore(u16),
    Iinc(u16, i32),

    Iaload,
    Laload,
    Faload,
    Daload,
    Aaload,
    Baload,
    Caload,
    Saload,
    Iastore,
    Lastore,
    Fastore,
    Dastore,
    Aastore,
    Bastore,
    Castore,
    Sastore,
    Arraylength,
    Newarray(PrimitiveType),
    Anewarray(TypeTag),

    Pop,
    Pop2,
    Dup,
    DupX1,
    DupX2,
    Dup2,
    Dup2X1,
    Dup2X2,
    Swap,

    Iadd,
    Ladd,
    Fadd,
    Dadd,
    Isub,
    Lsub,
    Fsub,
    Dsub,
    Imul,
    Lmul,
    Fmul,
    Dmul,
    Idiv,
    Ldiv,
    Fdiv,
    Ddiv,
    Irem,
    Lrem,
    Frem,
    Drem,
    Ineg,
    Lneg,
    Fneg,
    Dneg,
    Ishl,
    Lshl,
    Ishr,
    Lshr,
    Iushr,
    Lushr,
    Iand,
    Land,
    Ior,
    Lor,
    Ixor,
    Lxor,

    I2l,
    I2f,
    I2d,
    L2i,
    L2f,
    L2d,
    F2i,
    F2l,
    F2d,
    D2i,
    D2l,
    D2f,
    I2b,
    I2c,
    I2s,

    Lcmp,
    Fcmpl,
    Fcmpg,
    Dcmpl,
    Dcmpg,

    Ifeq(CodeIndex),
    Ifne(CodeIndex),
    Iflt(CodeIndex),
    Ifge(CodeIndex),
    Ifgt(CodeIndex),
    Ifle(CodeIndex),
    IfIcmpeq(CodeIndex),
    IfIcmpne(CodeIndex),
    IfIcmplt(CodeIndex),
    IfIcmpge(CodeIndex),
    IfIcmpgt(CodeIndex),
    IfIcmple(CodeIndex),
    IfAcmpeq(CodeIndex),
    IfAcmpne(CodeIndex),
    Ifnull(CodeIndex),
    Ifnonnull(CodeIndex),
    Goto(CodeIndex),
    Tableswitch(Box<JumpTable>),
    Lookupswitch(Box<LookupTable>),

    Getstatic(FieldRef),
    Putstatic(FieldRef),
    Getfield(FieldRef),
    Putfield(FieldRef),
    Invokevirtual(MethodRef),
    Invokespecial(MethodRef),
    Invokestatic(MethodRef),
    Invokeinterface(MethodRef),
    New(String),
    Checkcast(TypeTag),
    Instanceof(TypeTag),
    Athrow,

    Ireturn,
    Lreturn,
    Freturn,
    Dreturn,
    Areturn,
    Return,
}

impl Instruction {
    /// 访问指令中的所有跳转目标，用于标签回填与范围校验
    pub fn for_each_target_mut<F>(&mut self, mut f: F) -> Result<()>
    where
        F: FnMut(&mut CodeIndex) -> Result<()>,
    {
        match self {
            Instruction::Ifeq(target)
            | Instruction::Ifne(target)
            | Instruction::Iflt(target)
            | Instruction::Ifge(target)
            | Instruction::Ifgt(target)
            | Instruction::Ifle(target)
            | Instruction::IfIcmpeq(target)
            | Instruction::IfIcmpne(target)
            | Instruction::IfIcmplt(target)
            | Instruction::IfIcmpge(target)
            | Instruction::IfIcmpgt(target)
            | Instruction::IfIcmple(target)
            | Instruction::IfAcmpeq(target)
            | Instruction::IfAcmpne(target)
            | Instruction::Ifnull(target)
            | Instruction::Ifnonnull(target)
            | Instruction::Goto(target) => f(target),
            Instruction::Tableswitch(table) => table.for_each_target_mut(&mut f),
            Instruction::Lookupswitch(table) => table.for_each_target_mut(&mut f),
            _ => Ok(()),
        }
    }

    /// 读写局部变量的指令所触及的最高槽位（不含）
    pub fn local_slots_touched(&self) -> Option<usize> {
        match self {
            Instruction::Iload(index)
            | Instruction::Fload(index)
            | Instruction::Aload(index)
            | Instruction::Istore(index)
            | Instruction::Fstore(index)
            | Instruction::Astore(index)
            | Instruction::Iinc(index, _) => Some(*index as usize + 1),
            Instruction::Lload(index)
            | Instruction::Dload(index)
            | Instruction::Lstore(index)
            | Instruction::Dstore(index) => Some(*index as usize + 2),
            _ => None,
        }
    }

    /// 执行后控制流不会落到下一条指令
    pub fn ends_block(&self) -> bool {
        matches!(
            self,
            Instruction::Goto(_)
                | Instruction::Tableswitch(_)
                | Instruction::Lookupswitch(_)
                | Instruction::Athrow
                | Instruction::Ireturn
                | Instruction::Lreturn
                | Instruction::Freturn
                | Instruction::Dreturn
                | Instruction::Areturn
                | Instruction::Return
        )
    }
}
