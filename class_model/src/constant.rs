use std::fmt::{Display, Formatter};

/// 编译期常量，对应 ConstantValue 属性
/// [jvms-4.7.2](https://docs.oracle.com/javase/specs/jvms/se21/html/jvms-4.html#jvms-4.7.2)
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Constant {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
}

impl Display for Constant {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Constant::Int(i) => write!(f, "{i}"),
            Constant::Long(l) => write!(f, "{l}L"),
            Constant::Float(v) => write!(f, "{v}f"),
            Constant::Double(d) => write!(f, "{d}d"),
        }
    }
}
