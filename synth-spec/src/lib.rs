//! # EVM Trace Synthesizer Core Types
//!
//! Core types for turning an EVM execution trace into arithmetic-circuit
//! placements.
//!
//! ## Key Features
//! - 256-bit word model with explicit provenance ([`DataPoint`])
//! - Four reserved buffer placements (LOAD, RETURN, KECCAK-IN, KECCAK-OUT)
//! - Subcircuit catalogue with flatten maps into global wire positions
//! - Closed enumeration of supported arithmetic operations
//! - Synchronous validators for arity, range and catalogue membership

pub mod catalogue;
pub mod config;
pub mod datapoint;
pub mod error;
pub mod opcode;
pub mod placement;
pub mod trace;
pub mod validation;
pub mod value;

pub use catalogue::{Catalogue, CatalogueBuilder, CatalogueDescription, CatalogueError, Fusion, SubcircuitInfo, WireRange};
pub use config::{ConfigError, SetupParams};
pub use datapoint::{DataPoint, DataPointDescriptor, DataPointFactory, ExternalKey, Source};
pub use error::{Result, SpecError};
pub use opcode::{ArithmeticOp, Arity};
pub use placement::{BufferKind, CircuitPlacement, PlacementEntry, Placements};
pub use trace::{Operand, TraceStep};
pub use validation::Validator;

/// EVM word width in bits
pub const WORD_BITS: u32 = 256;

/// Width of the halves a word is split into when it does not fit the scalar field
pub const LIMB_BITS: u32 = 128;

/// Default scalar field width (BLS12-381 scalar field)
pub const DEFAULT_FIELD_BITS: u32 = 255;

/// Reserved placement indices
pub const LOAD_PLACEMENT: PlacementId = 0;
pub const RETURN_PLACEMENT: PlacementId = 1;
pub const KECCAK_IN_PLACEMENT: PlacementId = 2;
pub const KECCAK_OUT_PLACEMENT: PlacementId = 3;

/// First key handed out to an instruction placement
pub const FIRST_INSTRUCTION_PLACEMENT: PlacementId = 4;

/// Index of a placement in the registry (also the permutation column)
pub type PlacementId = usize;

/// Dense catalogue id of a subcircuit
pub type SubcircuitId = usize;
