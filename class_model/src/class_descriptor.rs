use crate::field_descriptor::FieldDescriptor;
use crate::method_descriptor::MethodDescriptor;
use bitflags::bitflags;
use std::fmt::{Display, Formatter};

bitflags! {
    /// Class flags
    /// https://docs.oracle.com/javase/specs/jvms/se21/html/jvms-4.html#jvms-4.1-200-E.1
    ///
    /// | Flag Name |	Value |	Interpretation |
    /// | -----     |-----    | ------------------|
    /// |ACC_PUBLIC	|0x0001   |	Declared public; may be accessed from outside its package.|
    /// |ACC_FINAL	| 0x0010  | Declared final; no subclasses allowed.|
    /// |ACC_SUPER	| 0x0020	|Treat superclass methods specially when invoked by the invokespecial instruction.|
    /// |ACC_INTERFACE|	0x0200	|Is an interface, not a class.|
    /// |ACC_ABSTRACT	|0x0400	|Declared abstract; must not be instantiated.|
    /// |ACC_SYNTHETIC	|0x1000	|Declared synthetic; not present in the source code.|
    ///
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClassAccessFlags: u16 {
        const PUBLIC = 0x0001;
        const FINAL = 0x0010;
        const SUPER = 0x0020;
        const INTERFACE = 0x0200;
        const ABSTRACT = 0x0400;
        const SYNTHETIC = 0x1000;
    }
}

impl Default for ClassAccessFlags {
    fn default() -> ClassAccessFlags {
        ClassAccessFlags::empty()
    }
}

/// 降级后的类或接口描述。由编译器（外部协作者）产出，加载后不可变。
#[derive(Debug, Clone, PartialEq)]
pub struct ClassDescriptor {
    pub access_flags: ClassAccessFlags,
    pub name: String,
    pub super_class: Option<String>,
    pub interfaces: Vec<String>,
    pub fields: Vec<FieldDescriptor>,
    pub methods: Vec<MethodDescriptor>,
}

impl ClassDescriptor {
    pub fn is_interface(&self) -> bool {
        self.access_flags.contains(ClassAccessFlags::INTERFACE)
    }

    pub fn method(&self, name: &str, descriptor: &str) -> Option<&MethodDescriptor> {
        self.methods
            .iter()
            .find(|m| m.name == name && m.descriptor == descriptor)
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }
}

impl Display for ClassDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let kind = if self.is_interface() {
            "interface"
        } else {
            "class"
        };
        write!(f, "{kind} {}", self.name)?;
        if let Some(super_class) = &self.super_class {
            write!(f, " extends {super_class}")?;
        }
        if !self.interfaces.is_empty() {
            write!(f, " implements {}", self.interfaces.join(", "))?;
        }
        writeln!(f)?;
        for field in &self.fields {
            write!(f, "  field {}:{}", field.name, field.descriptor)?;
            if let Some(constant) = &field.constant_value {
                write!(f, " = {constant}")?;
            }
            writeln!(f)?;
        }
        for method in &self.methods {
            writeln!(f, "  method {}{}", method.name, method.descriptor)?;
            if let Some(code) = &method.code {
                write!(f, "{code}")?;
            }
        }
        Ok(())
    }
}
