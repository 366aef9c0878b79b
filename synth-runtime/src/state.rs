//! External account state consulted for storage reads.
//!
//! Only values the trace actually references are fetched, once each; the
//! synthesizer caches the resulting LOAD data point.

use num_bigint::BigUint;
use num_traits::Zero;
use std::collections::HashMap;

use crate::error::Result;

/// Source of storage values on first reference
pub trait ExternalState {
    /// Value of `slot` in the storage of `address`
    fn storage(&mut self, address: &BigUint, slot: &BigUint) -> Result<BigUint>;
}

/// Map-backed state; unknown slots read as zero
#[derive(Debug, Clone, Default)]
pub struct InMemoryState {
    slots: HashMap<(BigUint, BigUint), BigUint>,
    reads: usize,
}

impl InMemoryState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_slot(mut self, address: BigUint, slot: BigUint, value: BigUint) -> Self {
        self.slots.insert((address, slot), value);
        self
    }

    pub fn set(&mut self, address: BigUint, slot: BigUint, value: BigUint) {
        self.slots.insert((address, slot), value);
    }

    /// Number of storage fetches served so far
    pub fn reads(&self) -> usize {
        self.reads
    }
}

impl ExternalState for InMemoryState {
    fn storage(&mut self, address: &BigUint, slot: &BigUint) -> Result<BigUint> {
        self.reads += 1;
        Ok(self
            .slots
            .get(&(address.clone(), slot.clone()))
            .cloned()
            .unwrap_or_else(BigUint::zero))
    }
}
