use std::fmt;

use super::instr::InstId;

/// Result type for IR operations
pub type IrResult<T> = Result<T, IrError>;

/// Errors raised by the IR model itself
#[derive(Debug, Clone, PartialEq)]
pub enum IrError {
    /// An out-of-line function body could not be loaded
    Materialize { function: String, reason: String },
    /// No function with this name exists in the module
    UnknownFunction(String),
    /// No instruction with this id exists in the function
    UnknownInstruction { function: String, id: InstId },
}

impl fmt::Display for IrError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IrError::Materialize { function, reason } => {
                write!(f, "failed to materialize '{}': {}", function, reason)
            }
            IrError::UnknownFunction(name) => write!(f, "unknown function '{}'", name),
            IrError::UnknownInstruction { function, id } => {
                write!(f, "no instruction %{} in function '{}'", id, function)
            }
        }
    }
}

impl std::error::Error for IrError {}
