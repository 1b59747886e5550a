use std::fmt::{Display, Formatter};

//栈帧信息，用来做异常调用栈回溯
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackTraceElement {
    pub declaring_class: String,
    pub method_name: String,
    pub descriptor: String,
    //native方法没有pc
    pub pc: Option<usize>,
}

impl Display for StackTraceElement {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "\tat {}.{}",
            self.declaring_class.replace('/', "."),
            self.method_name
        )?;
        match self.pc {
            Some(pc) => write!(f, "(pc {})", pc),
            None => write!(f, "(Native Method)"),
        }
    }
}
