use crate::ast::Type;
use thiserror::Error;

/// Errors raised by the semantic analyzer and the evaluator.
#[derive(Error, Debug)]
pub enum MicroError {
    #[error("Undefined variable: {0}")]
    UndefinedVariable(String),
    #[error("Undefined function: {0}")]
    UndefinedFunction(String),
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: Type, got: Type },
    #[error("Function '{name}' expects {expected} arguments, got {got}")]
    ArgumentCount {
        name: String,
        expected: usize,
        got: usize,
    },
    #[error("Division by zero")]
    DivisionByZero,
    #[error("{0}")]
    Semantic(String),
    #[error("Failed to write output: {0}")]
    Output(#[from] std::io::Error),
}

impl MicroError {
    pub fn semantic(message: impl Into<String>) -> Self {
        MicroError::Semantic(message.into())
    }

    /// The variable or function name the error is about, if any.
    pub fn name(&self) -> Option<&str> {
        match self {
            MicroError::UndefinedVariable(name)
            | MicroError::UndefinedFunction(name)
            | MicroError::ArgumentCount { name, .. } => Some(name),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, MicroError>;
