use crate::instruction::{CodeIndex, Instruction};
use crate::program_error::Result;
use crate::type_descriptor::MethodSignature;
use bitflags::bitflags;
use std::fmt::{Display, Formatter};

bitflags! {
    /// ## Method flags
    /// [jvms refer](https://docs.oracle.com/javase/specs/jvms/se21/html/jvms-4.html#jvms-4.6)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MethodAccessFlags: u16 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const SYNCHRONIZED = 0x0020;
        const BRIDGE = 0x0040;
        const VARARGS = 0x0080;
        const NATIVE = 0x0100;
        const ABSTRACT = 0x0400;
        const STRICT = 0x0800;
        const SYNTHETIC = 0x1000;
    }
}

impl Default for MethodAccessFlags {
    fn default() -> MethodAccessFlags {
        MethodAccessFlags::empty()
    }
}

/// 异常处理范围 `[start, end)`，`catch_type` 为 `None` 时匹配任意异常（finally）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionRange {
    pub start: CodeIndex,
    pub end: CodeIndex,
    pub handler: CodeIndex,
    pub catch_type: Option<String>,
}

impl ExceptionRange {
    pub fn covers(&self, pc: CodeIndex) -> bool {
        self.start <= pc && pc < self.end
    }

    pub fn is_catch_all(&self) -> bool {
        self.catch_type.is_none()
    }
}

/// 方法体：已降级的指令序列与异常表
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Code {
    pub max_stack: u16,
    pub max_locals: u16,
    pub instructions: Vec<Instruction>,
    pub exception_table: Vec<ExceptionRange>,
}

impl Display for Code {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "    stack={}, locals={}",
            self.max_stack, self.max_locals
        )?;
        for (index, instruction) in self.instructions.iter().enumerate() {
            writeln!(f, "    {index:>5}: {instruction:?}")?;
        }
        if !self.exception_table.is_empty() {
            writeln!(f, "    Exception table:")?;
            for range in &self.exception_table {
                writeln!(
                    f,
                    "      {:>5} {:>5} {:>5}   {}",
                    range.start,
                    range.end,
                    range.handler,
                    range.catch_type.as_deref().unwrap_or("any")
                )?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodDescriptor {
    pub access_flags: MethodAccessFlags,
    pub name: String,
    pub descriptor: String,
    //除了native和abstract方法应该都有code
    pub code: Option<Code>,
}

impl MethodDescriptor {
    pub fn is_static(&self) -> bool {
        self.access_flags.contains(MethodAccessFlags::STATIC)
    }

    pub fn is_native(&self) -> bool {
        self.access_flags.contains(MethodAccessFlags::NATIVE)
    }

    pub fn is_abstract(&self) -> bool {
        self.access_flags.contains(MethodAccessFlags::ABSTRACT)
    }

    pub fn is_private(&self) -> bool {
        self.access_flags.contains(MethodAccessFlags::PRIVATE)
    }

    pub fn is_init_method(&self) -> bool {
        self.name == "<init>"
    }

    pub fn is_class_init_method(&self) -> bool {
        self.name == "<clinit>"
    }

    pub fn signature(&self) -> Result<MethodSignature> {
        MethodSignature::parse(&self.descriptor)
    }
}
