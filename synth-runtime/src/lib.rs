//! # EVM Trace Synthesizer Runtime
//!
//! Turns an EVM execution trace into circuit placements and the permutation
//! argument that wires them together.
//!
//! ## Pipeline
//!
//! - **Dispatch**: each trace step becomes one placement (EXP becomes several)
//! - **Buffers**: external values enter through LOAD, results leave through
//!   RETURN, hash invocations pair KECCAK-IN with KECCAK-OUT
//! - **Refactor**: prune, fuse, renumber and split to the field width
//! - **Permutation**: one copy cycle per `(value, bit_size)` signature
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use evm_synth_runtime::{Synthesizer, SynthConfig};
//! use evm_synth_spec::{ArithmeticOp, Catalogue, ExternalKey};
//! use num_bigint::BigUint;
//!
//! let catalogue = Arc::new(Catalogue::standard().unwrap());
//! let mut synth = Synthesizer::new(catalogue, SynthConfig::default()).unwrap();
//! let a = synth.load_external(ExternalKey::Calldata { offset: 0 }, BigUint::from(2u32), 256).unwrap();
//! let b = synth.load_external(ExternalKey::Calldata { offset: 32 }, BigUint::from(3u32), 256).unwrap();
//! let sum = synth.place_arith(ArithmeticOp::Add, vec![a, b]).unwrap().remove(0);
//! synth.return_value(sum).unwrap();
//! let output = synth.finalize().unwrap();
//! println!("edges: {}", output.permutation.edges().len());
//! ```

pub mod arithmetic;
pub mod buffer;
pub mod error;
pub mod output;
pub mod permutation;
pub mod refactor;
pub mod state;
pub mod synthesizer;
pub mod variables;

pub use arithmetic::OperationTable;
pub use error::{Result, RuntimeError};
pub use output::SynthesisOutput;
pub use permutation::{Permutation, PermutationBuilder, PermutationEdge};
pub use refactor::{CapacityViolation, PlacementRefactor, RefactorOptions};
pub use state::{ExternalState, InMemoryState};
pub use synthesizer::{SynthConfig, Synthesizer};
pub use variables::{check_instances, placement_variables, PlacementVariables};

use evm_synth_spec::{Catalogue, TraceStep};
use std::sync::Arc;

/// Synthesize a complete trace and finalize it with the default configuration
pub fn synthesize(catalogue: Arc<Catalogue>, steps: &[TraceStep]) -> Result<SynthesisOutput> {
    let mut synth = Synthesizer::new(catalogue, SynthConfig::default())?;
    synth.synthesize_trace(steps)?;
    synth.finalize()
}
