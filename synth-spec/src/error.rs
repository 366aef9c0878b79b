//! # Error Types for the Synthesizer Core Types

use crate::catalogue::CatalogueError;
use crate::config::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpecError {
    // Trace-driven errors
    #[error("Input arity mismatch for {name}: expected {expected}, got {actual}")]
    InputArity {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("Unknown subcircuit: {0}")]
    UnknownSubcircuit(String),

    #[error("Empty operand list for {name}")]
    EmptyOperand { name: String },

    #[error("Unimplemented opcode: {0}")]
    UnimplementedOpcode(String),

    #[error("Operand {slot} of {name} is {actual} bits wide, slot declares {expected}")]
    OperandWidth {
        name: String,
        slot: usize,
        expected: u32,
        actual: u32,
    },

    // Malformed trace or dispatch defect
    #[error("Value {value} does not fit in {bit_size} bits")]
    ValueRange { value: String, bit_size: u32 },

    // Catalogue and configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    #[error("Invalid catalogue: {0}")]
    Catalogue(#[from] CatalogueError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SpecError {
    /// Check if this error must abort the whole run rather than a single step
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SpecError::ValueRange { .. }
                | SpecError::InvalidConfig(_)
                | SpecError::Catalogue(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, SpecError>;
