use crate::jvm_error::VmError;
use crate::jvm_values::{ObjectReference, Value};
use crate::stack_trace_element::StackTraceElement;
use std::fmt::{Display, Formatter};
use thiserror::Error;

/// 方法调用的两种失败：虚拟机内部错误，或者被解释执行的代码抛出了异常
#[derive(Debug, PartialEq)]
pub enum MethodCallError {
    InternalError(VmError),
    ExceptionThrown(ObjectReference),
}

impl From<VmError> for MethodCallError {
    fn from(value: VmError) -> Self {
        Self::InternalError(value)
    }
}

pub type InvokeMethodResult = Result<Option<Value>, MethodCallError>;

/// 栈帧结束时交给调用者的结果：正常返回（可能带返回值），或者向外传播的异常
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Completion {
    Return(Option<Value>),
    Throw(ObjectReference),
}

impl Completion {
    pub fn into_result(self) -> InvokeMethodResult {
        match self {
            Completion::Return(value) => Ok(value),
            Completion::Throw(exception) => Err(MethodCallError::ExceptionThrown(exception)),
        }
    }
}

/// 传播到调用栈顶部仍未被处理的异常
#[derive(Debug, Clone, PartialEq)]
pub struct UncaughtException {
    pub class_name: String,
    pub message: Option<String>,
    pub stack_trace: Vec<StackTraceElement>,
}

impl Display for UncaughtException {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.class_name.replace('/', "."))?;
        if let Some(message) = &self.message {
            write!(f, ": {}", message)?;
        }
        for element in &self.stack_trace {
            write!(f, "\n{}", element)?;
        }
        Ok(())
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum RunError {
    #[error("Exception in thread \"main\" {0}")]
    Uncaught(UncaughtException),
    #[error(transparent)]
    Internal(#[from] VmError),
}
