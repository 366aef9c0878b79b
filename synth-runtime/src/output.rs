//! Finalize artifact and its encodings

use evm_synth_spec::{CircuitPlacement, SpecError};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::permutation::Permutation;
use crate::variables::PlacementVariables;

/// Everything a proving backend consumes from one synthesis run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesisOutput {
    /// Hex SHA-256 of the catalogue the run was wired against
    pub catalogue_digest: String,
    pub placements: Vec<CircuitPlacement>,
    pub permutation: Permutation,
    pub variables: Vec<PlacementVariables>,
}

impl SynthesisOutput {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| SpecError::Json(e).into())
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| SpecError::Json(e).into())
    }

    /// Compact binary encoding
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }

    /// Number of instruction placements, buffers excluded
    pub fn instruction_count(&self) -> usize {
        self.placements
            .len()
            .saturating_sub(evm_synth_spec::FIRST_INSTRUCTION_PLACEMENT)
    }
}
