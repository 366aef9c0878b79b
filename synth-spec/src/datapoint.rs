//! # Data Points
//!
//! A [`DataPoint`] is one wire value plus its provenance. Outputs of placement
//! `p` carry `Source::Placement(p)` and their index among `p`'s outputs; an
//! input refers back to the output it consumes through the same pair. The
//! remaining tags mark wires on the outside of a buffer placement.
//!
//! Data points are immutable and only minted through [`DataPointFactory`],
//! which enforces `0 <= value < 2^bit_size`.

use num_bigint::{BigInt, BigUint, Sign};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Result, SpecError};
use crate::placement::BufferKind;
use crate::value;
use crate::{PlacementId, LIMB_BITS, WORD_BITS};

/// Provenance tag of a wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Source {
    /// Output of a placement (buffers included)
    Placement(PlacementId),
    /// Enters the circuit through LOAD
    Load,
    /// Leaves the circuit through RETURN
    Return,
    /// Hash pre-image leaving through KECCAK-IN
    KeccakIn,
    /// Hash digest entering through KECCAK-OUT
    KeccakOut,
    /// Constant introduced by the synthesizer itself
    Auxiliary,
}

impl Source {
    /// Placement that produced this wire, if it has an in-circuit parent
    pub fn placement(&self) -> Option<PlacementId> {
        match self {
            Source::Placement(id) => Some(*id),
            _ => None,
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Placement(id) => write!(f, "placement {id}"),
            Source::Load => write!(f, "load"),
            Source::Return => write!(f, "return"),
            Source::KeccakIn => write!(f, "keccak-in"),
            Source::KeccakOut => write!(f, "keccak-out"),
            Source::Auxiliary => write!(f, "auxiliary"),
        }
    }
}

/// Logical identity of a value coming from outside the circuit
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExternalKey {
    /// 32-byte calldata word at a byte offset
    Calldata { offset: usize },
    /// Storage slot of an account
    Storage { address: BigUint, slot: BigUint },
    /// Transaction or block context field (CALLER, TIMESTAMP, ...)
    Context(String),
    /// Immediate taken from bytecode (PUSH data)
    Code { address: BigUint, pc: usize },
    /// Constant needed by a placement rule
    Constant { value: BigUint, bit_size: u32 },
}

/// Everything a data point carries besides its value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPointDescriptor {
    pub source: Source,
    pub wire_index: usize,
    pub bit_size: u32,
    pub origin: Option<ExternalKey>,
}

impl DataPointDescriptor {
    pub fn new(source: Source, wire_index: usize, bit_size: u32) -> Self {
        Self {
            source,
            wire_index,
            bit_size,
            origin: None,
        }
    }

    pub fn with_origin(mut self, origin: ExternalKey) -> Self {
        self.origin = Some(origin);
        self
    }
}

/// Immutable wire value with provenance
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DataPoint {
    source: Source,
    wire_index: usize,
    bit_size: u32,
    value: BigUint,
    value_hex: String,
    origin: Option<ExternalKey>,
}

impl DataPoint {
    #[inline]
    pub fn source(&self) -> Source {
        self.source
    }

    #[inline]
    pub fn wire_index(&self) -> usize {
        self.wire_index
    }

    #[inline]
    pub fn bit_size(&self) -> u32 {
        self.bit_size
    }

    #[inline]
    pub fn value(&self) -> &BigUint {
        &self.value
    }

    #[inline]
    pub fn value_hex(&self) -> &str {
        &self.value_hex
    }

    #[inline]
    pub fn origin(&self) -> Option<&ExternalKey> {
        self.origin.as_ref()
    }

    /// Content signature used to match copies of the same value
    pub fn signature(&self) -> (BigUint, u32) {
        (self.value.clone(), self.bit_size)
    }

    /// Same value under a different provenance
    ///
    /// The value is untouched, so the range invariant carries over.
    pub fn rewired(&self, source: Source, wire_index: usize) -> DataPoint {
        DataPoint {
            source,
            wire_index,
            ..self.clone()
        }
    }

    /// Split into field-sized wires
    ///
    /// Values wider than `field_bits` become a low and a high 128-bit half
    /// sharing this data point's provenance; anything else is returned as is.
    pub fn split_words(&self, field_bits: u32) -> Vec<DataPoint> {
        if self.bit_size <= field_bits {
            return vec![self.clone()];
        }
        let (low, high) = value::split_limbs(&self.value);
        [low, high]
            .into_iter()
            .map(|limb| DataPoint {
                source: self.source,
                wire_index: self.wire_index,
                bit_size: LIMB_BITS,
                value_hex: value::to_hex(&limb, LIMB_BITS),
                value: limb,
                origin: self.origin.clone(),
            })
            .collect()
    }
}

impl fmt::Display for DataPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}] = {} ({} bits)",
            self.source, self.wire_index, self.value_hex, self.bit_size
        )
    }
}

/// Validating constructor for [`DataPoint`]
pub struct DataPointFactory;

impl DataPointFactory {
    /// Mint a data point, rejecting values outside `[0, 2^bit_size)`
    pub fn create(descriptor: DataPointDescriptor, value: BigUint) -> Result<DataPoint> {
        let bit_size = descriptor.bit_size;
        if bit_size == 0 || bit_size > WORD_BITS || !value::fits_in(&value, bit_size) {
            return Err(SpecError::ValueRange {
                value: format!("{:#x}", value),
                bit_size,
            });
        }
        Ok(DataPoint {
            source: descriptor.source,
            wire_index: descriptor.wire_index,
            bit_size,
            value_hex: value::to_hex(&value, bit_size),
            value,
            origin: descriptor.origin,
        })
    }

    /// Mint from a signed integer; negative values are a range error
    pub fn create_signed(descriptor: DataPointDescriptor, value: &BigInt) -> Result<DataPoint> {
        match value.sign() {
            Sign::Minus => Err(SpecError::ValueRange {
                value: value.to_string(),
                bit_size: descriptor.bit_size,
            }),
            _ => Self::create(descriptor, value.magnitude().clone()),
        }
    }

    /// Mint the (inPt, outPt) pair of a buffer entry
    ///
    /// The inPt carries the descriptor's outside tag, the outPt is sourced from
    /// the buffer placement itself. Both share wire index, value and origin.
    pub fn create_for_buffer_init(
        buffer: BufferKind,
        descriptor: DataPointDescriptor,
        value: BigUint,
    ) -> Result<(DataPoint, DataPoint)> {
        let wire_index = descriptor.wire_index;
        let in_pt = Self::create(descriptor, value)?;
        let out_pt = in_pt.rewired(Source::Placement(buffer.placement_id()), wire_index);
        Ok((in_pt, out_pt))
    }
}
