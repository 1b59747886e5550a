use thiserror::Error;

/// Models the possible errors returned when assembling a lowered program
#[derive(Error, Debug, PartialEq, Eq, Clone)]
pub enum ProgramError {
    #[error("invalid descriptor: {0}")]
    InvalidDescriptor(String),
    #[error("label {0} is never placed")]
    UnboundLabel(usize),
    #[error("label {0} is placed twice")]
    LabelPlacedTwice(usize),
    #[error("branch at {at} targets {target}, outside of code")]
    BranchOutOfRange { at: usize, target: usize },
    #[error("duplicate case label {0}")]
    DuplicateCaseLabel(i32),
    #[error("invalid exception range [{start}, {end}) -> {handler}")]
    InvalidExceptionRange {
        start: usize,
        end: usize,
        handler: usize,
    },
    #[error("duplicate member {0}")]
    DuplicateMember(String),
}

pub type Result<T> = std::result::Result<T, ProgramError>;
