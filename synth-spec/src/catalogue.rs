//! # Subcircuit Catalogue
//!
//! Read-only description of the compiled subcircuit library: one entry per
//! subcircuit with its wire count, the local index ranges of its outputs and
//! inputs, and a flatten map from local wire index to global wire id.
//!
//! ## Local Wire Layout
//! - wire 0: constant one
//! - `Out_idx`: output wires
//! - `In_idx`: input wires
//! - remaining wires: internal
//!
//! Global ids `0..l` are public, `l..l_D` are interface wires (the ones the
//! permutation argument connects), `l_D..m_D` are internal.
//!
//! A catalogue is loaded once and shared read-only between synthesis runs.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::Read;
use thiserror::Error;

use crate::config::{ConfigError, SetupParams};
use crate::error::SpecError;
use crate::opcode::ArithmeticOp;
use crate::placement::BufferKind;
use crate::{SubcircuitId, WORD_BITS};

/// Name of the batched square-and-multiply subcircuit in the standard layout
pub const SUB_EXP_BATCH: &str = "SubExpBatch";

/// Catalogue structure errors
#[derive(Debug, Error)]
pub enum CatalogueError {
    #[error("setup parameters: {0}")]
    Config(#[from] ConfigError),

    #[error("expected {expected} subcircuits, found {actual}")]
    CountMismatch { expected: usize, actual: usize },

    #[error("subcircuit at position {position} has id {id}")]
    NonDenseId { position: usize, id: SubcircuitId },

    #[error("duplicate subcircuit name: {0}")]
    DuplicateName(String),

    #[error("flatten map of {name} has {actual} entries, expected {expected}")]
    FlattenMapLength {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("wire ranges of {name} exceed its {n_wires} wires or overlap")]
    RangeOutOfBounds { name: String, n_wires: usize },

    #[error("{name} maps to global wire {global}, beyond m_D = {m_d}")]
    GlobalWireOutOfRange { name: String, global: usize, m_d: usize },

    #[error("global wire {global} is mapped twice")]
    DuplicateGlobalWire { global: usize },

    #[error("missing buffer subcircuit: {0}")]
    MissingBuffer(&'static str),

    #[error("{name} fuses into unknown subcircuit {into}")]
    UnknownFusionTarget { name: String, into: String },

    #[error("{name} declares an empty fusion run")]
    EmptyFusionRun { name: String },

    #[error("catalogue encoding: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// `[start, count]` range of local wire indices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "(usize, usize)", into = "(usize, usize)")]
pub struct WireRange {
    pub start: usize,
    pub count: usize,
}

impl WireRange {
    pub const fn new(start: usize, count: usize) -> Self {
        Self { start, count }
    }

    #[inline]
    pub const fn end(&self) -> usize {
        self.start + self.count
    }

    #[inline]
    pub const fn contains(&self, local: usize) -> bool {
        local >= self.start && local < self.end()
    }

    /// Local index of the `k`-th wire in this range
    #[inline]
    pub fn local(&self, k: usize) -> Option<usize> {
        (k < self.count).then(|| self.start + k)
    }

    fn overlaps(&self, other: &WireRange) -> bool {
        self.count > 0 && other.count > 0 && self.start < other.end() && other.start < self.end()
    }
}

impl From<(usize, usize)> for WireRange {
    fn from((start, count): (usize, usize)) -> Self {
        Self { start, count }
    }
}

impl From<WireRange> for (usize, usize) {
    fn from(range: WireRange) -> Self {
        (range.start, range.count)
    }
}

/// Marks a subcircuit whose consecutive placements may be merged
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fusion {
    /// Subcircuit a run is merged into
    pub into: String,
    /// Maximum number of placements per merged run
    pub max_run: usize,
}

/// One catalogue entry, in the compiler's JSON shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubcircuitInfo {
    pub id: SubcircuitId,
    pub name: String,
    #[serde(rename = "Nwires")]
    pub n_wires: usize,
    #[serde(rename = "Out_idx")]
    pub out_idx: WireRange,
    #[serde(rename = "In_idx")]
    pub in_idx: WireRange,
    #[serde(rename = "flattenMap")]
    pub flatten_map: Vec<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fusion: Option<Fusion>,
}

impl SubcircuitInfo {
    /// Global id of output wire `k`
    pub fn out_global(&self, k: usize) -> Option<usize> {
        self.out_idx.local(k).and_then(|local| self.flatten_map.get(local).copied())
    }

    /// Global id of input wire `k`
    pub fn in_global(&self, k: usize) -> Option<usize> {
        self.in_idx.local(k).and_then(|local| self.flatten_map.get(local).copied())
    }
}

/// Serialized catalogue: setup parameters plus all subcircuit entries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogueDescription {
    #[serde(rename = "setupParams")]
    pub params: SetupParams,
    pub subcircuits: Vec<SubcircuitInfo>,
}

/// Validated, indexed catalogue
#[derive(Debug, Clone)]
pub struct Catalogue {
    description: CatalogueDescription,
    by_name: HashMap<String, SubcircuitId>,
    global_wire_list: Vec<Option<(SubcircuitId, usize)>>,
    buffers: [SubcircuitId; 4],
    digest: [u8; 32],
}

impl Catalogue {
    /// Validate a description and build its indices
    pub fn from_description(description: CatalogueDescription) -> Result<Self, CatalogueError> {
        let params = description.params;
        params.validate()?;

        if description.subcircuits.len() != params.s_d {
            return Err(CatalogueError::CountMismatch {
                expected: params.s_d,
                actual: description.subcircuits.len(),
            });
        }

        let mut by_name = HashMap::with_capacity(description.subcircuits.len());
        let mut global_wire_list = vec![None; params.m_d];

        for (position, info) in description.subcircuits.iter().enumerate() {
            if info.id != position {
                return Err(CatalogueError::NonDenseId { position, id: info.id });
            }
            if by_name.insert(info.name.clone(), info.id).is_some() {
                return Err(CatalogueError::DuplicateName(info.name.clone()));
            }
            if info.flatten_map.len() != info.n_wires {
                return Err(CatalogueError::FlattenMapLength {
                    name: info.name.clone(),
                    expected: info.n_wires,
                    actual: info.flatten_map.len(),
                });
            }
            if info.out_idx.end() > info.n_wires
                || info.in_idx.end() > info.n_wires
                || info.out_idx.overlaps(&info.in_idx)
            {
                return Err(CatalogueError::RangeOutOfBounds {
                    name: info.name.clone(),
                    n_wires: info.n_wires,
                });
            }
            for (local, &global) in info.flatten_map.iter().enumerate() {
                let slot = global_wire_list.get_mut(global).ok_or_else(|| CatalogueError::GlobalWireOutOfRange {
                    name: info.name.clone(),
                    global,
                    m_d: params.m_d,
                })?;
                if slot.is_some() {
                    return Err(CatalogueError::DuplicateGlobalWire { global });
                }
                *slot = Some((info.id, local));
            }
        }

        for info in &description.subcircuits {
            if let Some(fusion) = &info.fusion {
                if !by_name.contains_key(&fusion.into) {
                    return Err(CatalogueError::UnknownFusionTarget {
                        name: info.name.clone(),
                        into: fusion.into.clone(),
                    });
                }
                if fusion.max_run == 0 {
                    return Err(CatalogueError::EmptyFusionRun { name: info.name.clone() });
                }
            }
        }

        let mut buffers = [0; 4];
        for kind in BufferKind::ALL {
            buffers[kind.placement_id()] = *by_name
                .get(kind.subcircuit_name())
                .ok_or(CatalogueError::MissingBuffer(kind.subcircuit_name()))?;
        }

        let mut digest = [0u8; 32];
        digest.copy_from_slice(&Sha256::digest(serde_json::to_vec(&description)?));

        Ok(Self {
            description,
            by_name,
            global_wire_list,
            buffers,
            digest,
        })
    }

    /// Load from the JSON description
    pub fn from_json_str(text: &str) -> Result<Self, SpecError> {
        let description: CatalogueDescription = serde_json::from_str(text)?;
        Ok(Self::from_description(description)?)
    }

    /// Load from any reader yielding the JSON description
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, SpecError> {
        let description: CatalogueDescription = serde_json::from_reader(reader)?;
        Ok(Self::from_description(description)?)
    }

    /// Buffers plus every operation subcircuit, at the default field width
    pub fn standard() -> Result<Self, CatalogueError> {
        CatalogueBuilder::standard(crate::DEFAULT_FIELD_BITS).build()
    }

    /// Serialize back to the JSON description
    pub fn to_json(&self) -> Result<String, SpecError> {
        Ok(serde_json::to_string_pretty(&self.description)?)
    }

    #[inline]
    pub fn params(&self) -> &SetupParams {
        &self.description.params
    }

    #[inline]
    pub fn description(&self) -> &CatalogueDescription {
        &self.description
    }

    #[inline]
    pub fn subcircuits(&self) -> &[SubcircuitInfo] {
        &self.description.subcircuits
    }

    pub fn id_of(&self, name: &str) -> Option<SubcircuitId> {
        self.by_name.get(name).copied()
    }

    pub fn lookup(&self, name: &str) -> Option<&SubcircuitInfo> {
        self.id_of(name).and_then(|id| self.get(id))
    }

    pub fn get(&self, id: SubcircuitId) -> Option<&SubcircuitInfo> {
        self.description.subcircuits.get(id)
    }

    /// Subcircuit and local wire a global wire id belongs to
    pub fn locate_global(&self, global: usize) -> Option<(SubcircuitId, usize)> {
        self.global_wire_list.get(global).copied().flatten()
    }

    pub fn buffer_id(&self, kind: BufferKind) -> SubcircuitId {
        self.buffers[kind.placement_id()]
    }

    /// SHA-256 of the canonical JSON description
    #[inline]
    pub fn digest(&self) -> &[u8; 32] {
        &self.digest
    }

    pub fn digest_hex(&self) -> String {
        self.digest.iter().map(|b| format!("{b:02x}")).collect()
    }
}

/// Which side of a subcircuit is public
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PublicSide {
    None,
    Inputs,
    Outputs,
}

#[derive(Debug, Clone)]
struct Shape {
    name: String,
    in_wires: usize,
    out_wires: usize,
    public: PublicSide,
    fusion: Option<Fusion>,
}

/// Generates a consistent catalogue layout from subcircuit shapes
///
/// Public wires are numbered first (public inputs, then public outputs), then
/// interface wires in subcircuit order, then constant and internal wires.
#[derive(Debug, Clone)]
pub struct CatalogueBuilder {
    field_bits: u32,
    s_max: usize,
    n: usize,
    internal_wires: usize,
    shapes: Vec<Shape>,
}

impl CatalogueBuilder {
    pub fn new(field_bits: u32) -> Self {
        Self {
            field_bits,
            s_max: 2048,
            n: 4096,
            internal_wires: 4,
            shapes: Vec::new(),
        }
    }

    /// The four buffers, every directly placed operation, and SubExpBatch
    pub fn standard(field_bits: u32) -> Self {
        let words = |bits: &[u32]| -> usize {
            bits.iter().map(|&b| if b > field_bits { 2 } else { 1 }).sum()
        };

        let mut builder = Self::new(field_bits)
            .buffer(BufferKind::Load, 256)
            .buffer(BufferKind::Return, 64)
            .buffer(BufferKind::KeccakIn, 128)
            .buffer(BufferKind::KeccakOut, 32);

        for op in ArithmeticOp::ALL {
            let Some(name) = op.subcircuit_name() else {
                continue;
            };
            let outs = vec![op.output_bit_size(); op.output_count()];
            builder = builder.subcircuit(name, words(&op.input_bit_sizes()), words(&outs));
        }

        let run = 16;
        let sub_exp = ArithmeticOp::SubExp;
        let sub_exp_outs = vec![sub_exp.output_bit_size(); sub_exp.output_count()];
        builder
            .subcircuit(
                SUB_EXP_BATCH,
                run * words(&sub_exp.input_bit_sizes()),
                run * words(&sub_exp_outs),
            )
            .fusible(sub_exp.name(), SUB_EXP_BATCH, run)
    }

    /// Add a buffer subcircuit with `capacity` wires on each side
    pub fn buffer(mut self, kind: BufferKind, capacity: usize) -> Self {
        self.shapes.push(Shape {
            name: kind.subcircuit_name().to_string(),
            in_wires: capacity,
            out_wires: capacity,
            public: if kind.is_entry() {
                PublicSide::Inputs
            } else {
                PublicSide::Outputs
            },
            fusion: None,
        });
        self
    }

    /// Add a subcircuit whose inputs and outputs are all interface wires
    pub fn subcircuit(mut self, name: impl Into<String>, in_wires: usize, out_wires: usize) -> Self {
        self.shapes.push(Shape {
            name: name.into(),
            in_wires,
            out_wires,
            public: PublicSide::None,
            fusion: None,
        });
        self
    }

    /// Mark an already added subcircuit as fusible into `into`
    pub fn fusible(mut self, name: &str, into: impl Into<String>, max_run: usize) -> Self {
        let into = into.into();
        for shape in self.shapes.iter_mut().filter(|s| s.name == name) {
            shape.fusion = Some(Fusion {
                into: into.clone(),
                max_run,
            });
        }
        self
    }

    pub fn max_placements(mut self, s_max: usize) -> Self {
        self.s_max = s_max;
        self
    }

    pub fn internal_wires(mut self, count: usize) -> Self {
        self.internal_wires = count;
        self
    }

    /// Number the wires and validate the result
    pub fn build(self) -> Result<Catalogue, CatalogueError> {
        let public_in: usize = self
            .shapes
            .iter()
            .filter(|s| s.public == PublicSide::Inputs)
            .map(|s| s.in_wires)
            .sum();
        let public_out: usize = self
            .shapes
            .iter()
            .filter(|s| s.public == PublicSide::Outputs)
            .map(|s| s.out_wires)
            .sum();
        let interface: usize = self
            .shapes
            .iter()
            .map(|s| match s.public {
                PublicSide::None => s.in_wires + s.out_wires,
                PublicSide::Inputs => s.out_wires,
                PublicSide::Outputs => s.in_wires,
            })
            .sum();
        let private: usize = self.shapes.len() * (1 + self.internal_wires);

        let l = public_in + public_out;
        let l_d = l + interface;
        let params = SetupParams {
            l,
            l_in: public_in,
            l_out: public_out,
            l_d,
            m_d: l_d + private,
            n: self.n,
            s_d: self.shapes.len(),
            s_max: self.s_max,
            field_bits: self.field_bits,
        };

        let mut next_public_in = 0;
        let mut next_public_out = public_in;
        let mut next_interface = l;
        let mut next_private = l_d;
        fn take(counter: &mut usize) -> usize {
            let id = *counter;
            *counter += 1;
            id
        }

        let mut subcircuits = Vec::with_capacity(self.shapes.len());
        for (id, shape) in self.shapes.into_iter().enumerate() {
            let n_wires = 1 + shape.out_wires + shape.in_wires + self.internal_wires;
            let mut flatten_map = Vec::with_capacity(n_wires);

            flatten_map.push(take(&mut next_private));
            for _ in 0..shape.out_wires {
                let global = match shape.public {
                    PublicSide::Outputs => take(&mut next_public_out),
                    _ => take(&mut next_interface),
                };
                flatten_map.push(global);
            }
            for _ in 0..shape.in_wires {
                let global = match shape.public {
                    PublicSide::Inputs => take(&mut next_public_in),
                    _ => take(&mut next_interface),
                };
                flatten_map.push(global);
            }
            for _ in 0..self.internal_wires {
                flatten_map.push(take(&mut next_private));
            }

            subcircuits.push(SubcircuitInfo {
                id,
                name: shape.name,
                n_wires,
                out_idx: WireRange::new(1, shape.out_wires),
                in_idx: WireRange::new(1 + shape.out_wires, shape.in_wires),
                flatten_map,
                fusion: shape.fusion,
            });
        }

        Catalogue::from_description(CatalogueDescription { params, subcircuits })
    }
}

/// Wires a word occupies in the standard layout at `field_bits`
pub fn word_wires(field_bits: u32) -> usize {
    if WORD_BITS > field_bits {
        2
    } else {
        1
    }
}
