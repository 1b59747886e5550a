use class_model::program_error::ProgramError;
use thiserror::Error;

/// 虚拟机内部错误，解释执行的代码无法捕获，出现即终止当前运行
#[derive(Error, Debug, PartialEq, Clone)]
pub enum VmError {
    #[error("ClassNotFound {0}")]
    ClassNotFound(String),
    #[error("DuplicateClass {0}")]
    DuplicateClass(String),
    #[error("ClassCircularity {0}")]
    ClassCircularity(String),
    #[error("ExecuteCodeError {0}")]
    ExecuteCodeError(String),
    #[error("value type mismatch")]
    ValueTypeMismatch,
    #[error("invalid program: {0}")]
    InvalidProgram(#[from] ProgramError),

    #[error("index out of bounds")]
    IndexOutOfBounds,
    #[error("local variable {0} is the second half of a long or double")]
    InvalidOffset(usize),
    #[error("can't pop from empty stack")]
    PopFromEmptyStack,
    #[error("operand stack overflow")]
    StackOverFlow,
    #[error("invalid reference {0}")]
    InvalidReference(usize),
}

pub type VmExecResult<T> = Result<T, VmError>;
