//! # Placement Registry
//!
//! One [`Placements`] registry exists per synthesis run. Keys 0-3 hold the
//! buffer placements and exist from construction on; every placed instruction
//! is appended at the next free key, so key order is circuit-instance order.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::catalogue::Catalogue;
use crate::datapoint::{DataPoint, Source};
use crate::{
    PlacementId, SubcircuitId, FIRST_INSTRUCTION_PLACEMENT, KECCAK_IN_PLACEMENT, KECCAK_OUT_PLACEMENT,
    LOAD_PLACEMENT, RETURN_PLACEMENT,
};

/// The four reserved boundary placements
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BufferKind {
    /// Values entering the circuit (calldata, context, storage, constants)
    Load,
    /// Values leaving the circuit
    Return,
    /// Hash pre-images handed to an off-circuit Keccak
    KeccakIn,
    /// Hash digests coming back from the off-circuit Keccak
    KeccakOut,
}

impl BufferKind {
    pub const ALL: [BufferKind; 4] = [
        BufferKind::Load,
        BufferKind::Return,
        BufferKind::KeccakIn,
        BufferKind::KeccakOut,
    ];

    pub const fn placement_id(&self) -> PlacementId {
        match self {
            BufferKind::Load => LOAD_PLACEMENT,
            BufferKind::Return => RETURN_PLACEMENT,
            BufferKind::KeccakIn => KECCAK_IN_PLACEMENT,
            BufferKind::KeccakOut => KECCAK_OUT_PLACEMENT,
        }
    }

    pub fn from_placement_id(id: PlacementId) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.placement_id() == id)
    }

    /// Catalogue name of the buffer subcircuit
    pub const fn subcircuit_name(&self) -> &'static str {
        match self {
            BufferKind::Load => "bufferLoad",
            BufferKind::Return => "bufferReturn",
            BufferKind::KeccakIn => "bufferKeccakIn",
            BufferKind::KeccakOut => "bufferKeccakOut",
        }
    }

    /// Tag of the wires on the outside of this buffer
    pub const fn outer_source(&self) -> Source {
        match self {
            BufferKind::Load => Source::Load,
            BufferKind::Return => Source::Return,
            BufferKind::KeccakIn => Source::KeccakIn,
            BufferKind::KeccakOut => Source::KeccakOut,
        }
    }

    /// Check if values flow into the circuit through this buffer
    ///
    /// Entry buffers expose their outputs as interface wires; exit buffers
    /// expose their inputs.
    pub const fn is_entry(&self) -> bool {
        matches!(self, BufferKind::Load | BufferKind::KeccakOut)
    }
}

impl fmt::Display for BufferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BufferKind::Load => "LOAD",
            BufferKind::Return => "RETURN",
            BufferKind::KeccakIn => "KECCAK-IN",
            BufferKind::KeccakOut => "KECCAK-OUT",
        };
        write!(f, "{name}")
    }
}

/// One placement as recorded during synthesis
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacementEntry {
    /// Subcircuit name
    pub name: String,
    /// What the placement is for (the EVM opcode it proves, or the buffer role)
    pub usage: String,
    /// Catalogue id, set by dispatch; refactor resolves by name regardless
    pub subcircuit_id: Option<SubcircuitId>,
    pub in_pts: Vec<DataPoint>,
    pub out_pts: Vec<DataPoint>,
}

impl PlacementEntry {
    pub fn new(name: impl Into<String>, usage: impl Into<String>, in_pts: Vec<DataPoint>, out_pts: Vec<DataPoint>) -> Self {
        Self {
            name: name.into(),
            usage: usage.into(),
            subcircuit_id: None,
            in_pts,
            out_pts,
        }
    }

    pub fn with_subcircuit(mut self, id: SubcircuitId) -> Self {
        self.subcircuit_id = Some(id);
        self
    }
}

/// Ordered placement registry owned by one synthesis run
#[derive(Debug, Clone)]
pub struct Placements {
    buffers: [PlacementEntry; 4],
    instructions: Vec<PlacementEntry>,
}

impl Placements {
    /// Registry holding only the four empty buffer placements
    pub fn with_buffers(catalogue: &Catalogue) -> Self {
        let buffer = |kind: BufferKind| {
            PlacementEntry::new(kind.subcircuit_name(), kind.to_string(), Vec::new(), Vec::new())
                .with_subcircuit(catalogue.buffer_id(kind))
        };
        Self {
            buffers: BufferKind::ALL.map(buffer),
            instructions: Vec::new(),
        }
    }

    /// Key the next pushed placement will receive
    #[inline]
    pub fn next_key(&self) -> PlacementId {
        FIRST_INSTRUCTION_PLACEMENT + self.instructions.len()
    }

    /// Append a placement and return its key
    pub fn push(&mut self, entry: PlacementEntry) -> PlacementId {
        let key = self.next_key();
        self.instructions.push(entry);
        key
    }

    pub fn get(&self, id: PlacementId) -> Option<&PlacementEntry> {
        if id < FIRST_INSTRUCTION_PLACEMENT {
            self.buffers.get(id)
        } else {
            self.instructions.get(id - FIRST_INSTRUCTION_PLACEMENT)
        }
    }

    pub fn buffer(&self, kind: BufferKind) -> &PlacementEntry {
        &self.buffers[kind.placement_id()]
    }

    pub fn buffer_mut(&mut self, kind: BufferKind) -> &mut PlacementEntry {
        &mut self.buffers[kind.placement_id()]
    }

    /// All placements in key order, buffers first
    pub fn iter(&self) -> impl Iterator<Item = (PlacementId, &PlacementEntry)> {
        self.buffers.iter().chain(self.instructions.iter()).enumerate()
    }

    /// Instruction placements in key order
    pub fn instructions(&self) -> impl Iterator<Item = (PlacementId, &PlacementEntry)> {
        self.instructions
            .iter()
            .enumerate()
            .map(|(i, entry)| (FIRST_INSTRUCTION_PLACEMENT + i, entry))
    }

    /// Total number of placements, buffers included
    #[inline]
    pub fn len(&self) -> usize {
        self.buffers.len() + self.instructions.len()
    }

    /// Check if no instruction has been placed yet
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

/// Refactored placement, ready for the proving backend
///
/// Unlike [`PlacementEntry`] every field is resolved: the subcircuit id is
/// mandatory and wires are split to the field width.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitPlacement {
    pub index: PlacementId,
    pub name: String,
    pub usage: String,
    pub subcircuit_id: SubcircuitId,
    pub in_pts: Vec<DataPoint>,
    pub out_pts: Vec<DataPoint>,
}
