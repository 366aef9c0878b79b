//! # Arithmetic Operations
//!
//! Closed set of operations the synthesizer can place. The first block maps
//! one-to-one onto EVM opcodes 0x01-0x0b and 0x10-0x1d; the last three are
//! helper subcircuits used to decompose EXP and to sum wire bundles.
//!
//! ## Opcode Encoding
//! - 0x01-0x0b: Arithmetic (ADD .. SIGNEXTEND)
//! - 0x10-0x15: Comparison (LT, GT, SLT, SGT, EQ, ISZERO)
//! - 0x16-0x1a: Bitwise (AND, OR, XOR, NOT, BYTE)
//! - 0x1b-0x1d: Shift (SHL, SHR, SAR)

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::WORD_BITS;

/// Maximum number of summands an Accumulator placement takes
pub const ACCUMULATOR_MAX_INPUTS: usize = 32;

/// Operation tag
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ArithmeticOp {
    // ========== Arithmetic ==========
    Add,
    Mul,
    Sub,
    Div,
    SDiv,
    Mod,
    SMod,
    AddMod,
    MulMod,
    Exp,
    SignExtend,

    // ========== Comparison ==========
    Lt,
    Gt,
    Slt,
    Sgt,
    Eq,
    IsZero,

    // ========== Bitwise ==========
    And,
    Or,
    Xor,
    Not,
    Byte,

    // ========== Shift ==========
    Shl,
    Shr,
    Sar,

    // ========== Helpers ==========
    /// Decompose a word into 256 bits, most significant first
    DecToBit,
    /// One square-and-multiply step: (c, a, bit) -> (c * (bit ? a : 1), a * a)
    SubExp,
    /// Sum of all inputs
    Accumulator,
}

/// Number of inputs an operation takes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Arity {
    Fixed(usize),
    Variadic { max: usize },
}

impl ArithmeticOp {
    /// Every operation, in tag order
    pub const ALL: [ArithmeticOp; 28] = [
        ArithmeticOp::Add,
        ArithmeticOp::Mul,
        ArithmeticOp::Sub,
        ArithmeticOp::Div,
        ArithmeticOp::SDiv,
        ArithmeticOp::Mod,
        ArithmeticOp::SMod,
        ArithmeticOp::AddMod,
        ArithmeticOp::MulMod,
        ArithmeticOp::Exp,
        ArithmeticOp::SignExtend,
        ArithmeticOp::Lt,
        ArithmeticOp::Gt,
        ArithmeticOp::Slt,
        ArithmeticOp::Sgt,
        ArithmeticOp::Eq,
        ArithmeticOp::IsZero,
        ArithmeticOp::And,
        ArithmeticOp::Or,
        ArithmeticOp::Xor,
        ArithmeticOp::Not,
        ArithmeticOp::Byte,
        ArithmeticOp::Shl,
        ArithmeticOp::Shr,
        ArithmeticOp::Sar,
        ArithmeticOp::DecToBit,
        ArithmeticOp::SubExp,
        ArithmeticOp::Accumulator,
    ];

    /// Convert from an EVM opcode byte
    pub fn from_evm_opcode(opcode: u8) -> Option<Self> {
        use ArithmeticOp::*;
        match opcode {
            0x01 => Some(Add),
            0x02 => Some(Mul),
            0x03 => Some(Sub),
            0x04 => Some(Div),
            0x05 => Some(SDiv),
            0x06 => Some(Mod),
            0x07 => Some(SMod),
            0x08 => Some(AddMod),
            0x09 => Some(MulMod),
            0x0a => Some(Exp),
            0x0b => Some(SignExtend),
            0x10 => Some(Lt),
            0x11 => Some(Gt),
            0x12 => Some(Slt),
            0x13 => Some(Sgt),
            0x14 => Some(Eq),
            0x15 => Some(IsZero),
            0x16 => Some(And),
            0x17 => Some(Or),
            0x18 => Some(Xor),
            0x19 => Some(Not),
            0x1a => Some(Byte),
            0x1b => Some(Shl),
            0x1c => Some(Shr),
            0x1d => Some(Sar),
            _ => None,
        }
    }

    /// EVM opcode byte, `None` for helper operations
    pub fn evm_opcode(&self) -> Option<u8> {
        let index = *self as u8;
        match self {
            ArithmeticOp::DecToBit | ArithmeticOp::SubExp | ArithmeticOp::Accumulator => None,
            _ if index <= ArithmeticOp::SignExtend as u8 => Some(index + 0x01),
            _ => Some(index - ArithmeticOp::Lt as u8 + 0x10),
        }
    }

    /// Look up an operation by its subcircuit name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|op| op.name() == name)
    }

    /// Canonical name, also the name of the subcircuit that proves it
    pub fn name(&self) -> &'static str {
        use ArithmeticOp::*;
        match self {
            Add => "ADD",
            Mul => "MUL",
            Sub => "SUB",
            Div => "DIV",
            SDiv => "SDIV",
            Mod => "MOD",
            SMod => "SMOD",
            AddMod => "ADDMOD",
            MulMod => "MULMOD",
            Exp => "EXP",
            SignExtend => "SIGNEXTEND",
            Lt => "LT",
            Gt => "GT",
            Slt => "SLT",
            Sgt => "SGT",
            Eq => "EQ",
            IsZero => "ISZERO",
            And => "AND",
            Or => "OR",
            Xor => "XOR",
            Not => "NOT",
            Byte => "BYTE",
            Shl => "SHL",
            Shr => "SHR",
            Sar => "SAR",
            DecToBit => "DecToBit",
            SubExp => "SubEXP",
            Accumulator => "Accumulator",
        }
    }

    /// Subcircuit placed for this operation
    ///
    /// EXP has no subcircuit of its own: it is placed as DecToBit followed by
    /// a chain of SubEXP placements.
    pub fn subcircuit_name(&self) -> Option<&'static str> {
        match self {
            ArithmeticOp::Exp => None,
            op => Some(op.name()),
        }
    }

    /// Check if this operation is placed through a decomposition
    #[inline]
    pub fn is_composite(&self) -> bool {
        self.subcircuit_name().is_none()
    }

    pub fn arity(&self) -> Arity {
        use ArithmeticOp::*;
        match self {
            IsZero | Not | DecToBit => Arity::Fixed(1),
            AddMod | MulMod | SubExp => Arity::Fixed(3),
            Accumulator => Arity::Variadic {
                max: ACCUMULATOR_MAX_INPUTS,
            },
            _ => Arity::Fixed(2),
        }
    }

    /// Number of output wires
    pub fn output_count(&self) -> usize {
        match self {
            ArithmeticOp::DecToBit => WORD_BITS as usize,
            ArithmeticOp::SubExp => 2,
            _ => 1,
        }
    }

    /// Bit size of every output wire
    pub fn output_bit_size(&self) -> u32 {
        match self {
            ArithmeticOp::DecToBit => 1,
            _ => WORD_BITS,
        }
    }

    /// Bit sizes of the input slots the subcircuit declares
    pub fn input_bit_sizes(&self) -> Vec<u32> {
        match (self, self.arity()) {
            (ArithmeticOp::SubExp, _) => vec![WORD_BITS, WORD_BITS, 1],
            (_, Arity::Fixed(n)) => vec![WORD_BITS; n],
            (_, Arity::Variadic { max }) => vec![WORD_BITS; max],
        }
    }

    /// Check if this operation interprets its operands as signed
    pub fn is_signed(&self) -> bool {
        matches!(
            self,
            ArithmeticOp::SDiv | ArithmeticOp::SMod | ArithmeticOp::Slt | ArithmeticOp::Sgt | ArithmeticOp::Sar
        )
    }
}

impl fmt::Display for ArithmeticOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
