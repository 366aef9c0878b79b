//! Runtime error types for the trace synthesizer

use evm_synth_spec::{PlacementId, SpecError};
use thiserror::Error;

use crate::refactor::CapacityViolation;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Spec error: {0}")]
    SpecError(#[from] SpecError),

    #[error("Permutation inconsistency at (row {row}, col {col}) -> (row {z}, col {y}): {reason}")]
    PermutationInconsistency {
        row: usize,
        col: PlacementId,
        y: PlacementId,
        z: usize,
        reason: String,
    },

    #[error("Dangling wire: placement {placement} consumes output {wire} of placement {source_placement}")]
    DanglingWire {
        placement: PlacementId,
        source_placement: PlacementId,
        wire: usize,
    },

    #[error("Result mismatch for {name}: interpreter reported {expected}, synthesized {actual}")]
    ResultMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("Instance check failed for placement {placement} ({name}): {reason}")]
    InstanceCheckFailed {
        placement: PlacementId,
        name: String,
        reason: String,
    },

    #[error("Buffer misuse on {buffer}: {reason}")]
    BufferMisuse { buffer: String, reason: String },

    #[error("Keccak digest mismatch: trace reported {expected}, computed {computed}")]
    KeccakMismatch { expected: String, computed: String },

    #[error("Capacity exceeded: {} violation(s)", .0.len())]
    CapacityExceeded(Vec<CapacityViolation>),

    #[error("Missing operation handler: {0}")]
    MissingHandler(String),

    #[error("Step {step} has no output {output}")]
    UnknownStepOutput { step: usize, output: usize },

    #[error("External state error: {0}")]
    State(String),

    #[error("Encoding error: {0}")]
    Encoding(#[from] bincode::Error),
}

impl RuntimeError {
    /// Check if this error means the synthesized circuit cannot be trusted
    pub fn is_fatal(&self) -> bool {
        match self {
            RuntimeError::SpecError(e) => e.is_fatal(),
            RuntimeError::PermutationInconsistency { .. }
            | RuntimeError::DanglingWire { .. }
            | RuntimeError::InstanceCheckFailed { .. }
            | RuntimeError::MissingHandler(_) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, RuntimeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permutation_inconsistency_display() {
        let err = RuntimeError::PermutationInconsistency {
            row: 3,
            col: 4,
            y: 0,
            z: 1,
            reason: "value mismatch".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Permutation inconsistency at (row 3, col 4) -> (row 1, col 0): value mismatch"
        );
        assert!(err.is_fatal());
    }

    #[test]
    fn test_spec_error_from() {
        let spec_err = SpecError::UnknownSubcircuit("UNKNOWN_OP".to_string());
        let runtime_err: RuntimeError = spec_err.into();
        assert!(runtime_err.to_string().contains("UNKNOWN_OP"));
        assert!(!runtime_err.is_fatal());
    }

    #[test]
    fn test_value_range_is_fatal() {
        let err: RuntimeError = SpecError::ValueRange {
            value: "0x2".to_string(),
            bit_size: 1,
        }
        .into();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_capacity_display() {
        let err = RuntimeError::CapacityExceeded(vec![CapacityViolation::PlacementCount { actual: 10, max: 8 }]);
        assert_eq!(err.to_string(), "Capacity exceeded: 1 violation(s)");
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_keccak_mismatch_display() {
        let err = RuntimeError::KeccakMismatch {
            expected: "0x00".to_string(),
            computed: "0x01".to_string(),
        };
        assert!(err.to_string().starts_with("Keccak digest mismatch"));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RuntimeError>();
    }
}
