//! # Interpreter Trace Steps
//!
//! What the EVM interpreter hands the synthesizer for each executed
//! instruction it wants proven: the opcode, operand values, and for every
//! operand either its provenance or the identity of a fresh external value.

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use crate::datapoint::{DataPoint, ExternalKey};

/// One operand of a traced instruction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operand {
    /// Already wired value (typically popped from the stack of data points)
    Wired(DataPoint),
    /// Output `output` of an earlier step in the same batch
    Step { step: usize, output: usize },
    /// Value entering the circuit through LOAD
    External {
        key: ExternalKey,
        value: BigUint,
        bit_size: u32,
    },
    /// Storage slot, fetched from external state on first reference
    Storage { address: BigUint, slot: BigUint },
    /// Constant with no outside identity (PUSH immediates, masks)
    Constant { value: BigUint, bit_size: u32 },
}

/// One traced instruction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TraceStep {
    /// Arithmetic, comparison, bitwise or shift opcode
    Arith {
        opcode: u8,
        operands: Vec<Operand>,
        /// Result the interpreter computed, when it reports one
        result: Option<BigUint>,
    },
    /// KECCAK256 over `length` bytes given as 32-byte big-endian chunks
    Keccak {
        chunks: Vec<Operand>,
        length: usize,
        digest: BigUint,
    },
    /// Value leaving the circuit (RETURN data, logs, storage writes)
    Return { operand: Operand },
}

impl TraceStep {
    /// Short label for logging
    pub fn label(&self) -> String {
        match self {
            TraceStep::Arith { opcode, .. } => format!("arith {opcode:#04x}"),
            TraceStep::Keccak { length, .. } => format!("keccak {length} bytes"),
            TraceStep::Return { .. } => "return".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels() {
        let step = TraceStep::Arith {
            opcode: 0x01,
            operands: vec![],
            result: None,
        };
        assert_eq!(step.label(), "arith 0x01");

        let step = TraceStep::Keccak {
            chunks: vec![],
            length: 0,
            digest: BigUint::from(0u32),
        };
        assert_eq!(step.label(), "keccak 0 bytes");

        let step = TraceStep::Return {
            operand: Operand::Constant {
                value: BigUint::from(1u32),
                bit_size: 8,
            },
        };
        assert_eq!(step.label(), "return");
    }

    #[test]
    fn test_step_serializes() {
        let step = TraceStep::Arith {
            opcode: 0x02,
            operands: vec![
                Operand::Step { step: 0, output: 0 },
                Operand::External {
                    key: ExternalKey::Calldata { offset: 4 },
                    value: BigUint::from(7u32),
                    bit_size: 256,
                },
            ],
            result: Some(BigUint::from(14u32)),
        };
        let json = serde_json::to_string(&step).unwrap();
        let back: TraceStep = serde_json::from_str(&json).unwrap();
        assert_eq!(back, step);
    }
}
