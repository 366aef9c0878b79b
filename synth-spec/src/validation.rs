//! Synchronous guards run before a placement is built.
//!
//! Every check fails on the first violation and nothing is inserted into the
//! registry when one fails:
//! - operand count against the operation's arity
//! - subcircuit name against the catalogue
//! - opcode against the implemented operation set
//! - non-empty operand lists
//! - operand widths against the subcircuit's input slots
//! - value range against a bit size

use num_bigint::BigUint;

use crate::catalogue::Catalogue;
use crate::datapoint::DataPoint;
use crate::error::{Result, SpecError};
use crate::opcode::{ArithmeticOp, Arity};
use crate::value;
use crate::SubcircuitId;

pub struct Validator;

impl Validator {
    /// Fail with `InputArity` unless `actual == expected`
    pub fn validate_input_count(name: &str, actual: usize, expected: usize) -> Result<()> {
        if actual != expected {
            return Err(SpecError::InputArity {
                name: name.to_string(),
                expected,
                actual,
            });
        }
        Ok(())
    }

    /// Check an operand list against an operation's arity
    pub fn validate_arity(op: ArithmeticOp, actual: usize) -> Result<()> {
        match op.arity() {
            Arity::Fixed(expected) => Self::validate_input_count(op.name(), actual, expected),
            Arity::Variadic { max } if actual > max => Err(SpecError::InputArity {
                name: op.name().to_string(),
                expected: max,
                actual,
            }),
            Arity::Variadic { .. } => Ok(()),
        }
    }

    /// Resolve a subcircuit name, failing with `UnknownSubcircuit`
    pub fn validate_subcircuit_name(catalogue: &Catalogue, name: &str) -> Result<SubcircuitId> {
        catalogue
            .id_of(name)
            .ok_or_else(|| SpecError::UnknownSubcircuit(name.to_string()))
    }

    /// Map an EVM opcode byte to an implemented operation
    pub fn validate_implemented_opcode(opcode: u8) -> Result<ArithmeticOp> {
        ArithmeticOp::from_evm_opcode(opcode).ok_or_else(|| SpecError::UnimplementedOpcode(format!("{opcode:#04x}")))
    }

    /// Fail with `EmptyOperand` on an empty operand list
    pub fn validate_operands(name: &str, operands: &[DataPoint]) -> Result<()> {
        if operands.is_empty() {
            return Err(SpecError::EmptyOperand { name: name.to_string() });
        }
        Ok(())
    }

    /// Fail with `OperandWidth` unless every operand matches its input slot
    ///
    /// Slots are laid out per operand at the declared width, so an operand of
    /// any other width would shift every later wire once words are split.
    pub fn validate_operand_widths(op: ArithmeticOp, operands: &[DataPoint]) -> Result<()> {
        for (slot, (dp, expected)) in operands.iter().zip(op.input_bit_sizes()).enumerate() {
            if dp.bit_size() != expected {
                return Err(SpecError::OperandWidth {
                    name: op.name().to_string(),
                    slot,
                    expected,
                    actual: dp.bit_size(),
                });
            }
        }
        Ok(())
    }

    /// Fail with `ValueRange` unless `value < 2^bit_size`
    pub fn validate_value(value: &BigUint, bit_size: u32) -> Result<()> {
        if bit_size == 0 || !value::fits_in(value, bit_size) {
            return Err(SpecError::ValueRange {
                value: format!("{value:#x}"),
                bit_size,
            });
        }
        Ok(())
    }
}
