use crate::constant::Constant;
use crate::program_error::Result;
use crate::type_descriptor::TypeTag;
use bitflags::bitflags;

bitflags! {
    /// ## Field flags
    /// [jvms refer](https://docs.oracle.com/javase/specs/jvms/se21/html/jvms-4.html#jvms-4.5)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FieldAccessFlags: u16 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const VOLATILE = 0x0040;
        const TRANSIENT = 0x0080;
        const SYNTHETIC = 0x1000;
        const ENUM = 0x4000;
    }
}

impl Default for FieldAccessFlags {
    fn default() -> FieldAccessFlags {
        FieldAccessFlags::empty()
    }
}

/// ## 字段描述
/// 已经解析好的字段信息，`constant_value` 对应编译期常量初始值，
/// 在类准备阶段写入静态槽位；其余初始化由 `<clinit>` 或 `<init>` 完成。
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub access_flags: FieldAccessFlags,
    pub name: String,
    pub descriptor: String,
    pub constant_value: Option<Constant>,
}

impl FieldDescriptor {
    pub fn is_static(&self) -> bool {
        self.access_flags.contains(FieldAccessFlags::STATIC)
    }

    pub fn type_tag(&self) -> Result<TypeTag> {
        TypeTag::parse(&self.descriptor)
    }
}
