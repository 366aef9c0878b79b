//! Stress tests for the trace synthesizer
//!
//! Long placement chains, full buffers, wide exponents and concurrent runs
//! sharing one catalogue.

use evm_synth_runtime::{RuntimeError, SynthConfig, SynthesisOutput, Synthesizer};
use evm_synth_spec::{catalogue::SUB_EXP_BATCH, value, ArithmeticOp, Catalogue, CatalogueBuilder, DataPoint, ExternalKey};
use num_bigint::BigUint;
use sha3::{Digest, Keccak256};
use std::sync::Arc;
use std::thread;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn calldata(synth: &mut Synthesizer, offset: usize, n: u64) -> DataPoint {
    synth
        .load_external(ExternalKey::Calldata { offset }, BigUint::from(n), 256)
        .unwrap()
}

/// Alternating ADD/XOR chain of `length` placements seeded with `seed`
fn chain(catalogue: Arc<Catalogue>, seed: u64, length: usize) -> SynthesisOutput {
    let mut synth = Synthesizer::new(catalogue, SynthConfig::default()).unwrap();
    let a = calldata(&mut synth, 0, seed);
    let b = calldata(&mut synth, 32, seed.wrapping_mul(31) | 1);
    let mut acc = a;
    for i in 0..length {
        let op = if i % 2 == 0 { ArithmeticOp::Add } else { ArithmeticOp::Xor };
        acc = synth.place_arith(op, vec![acc, b.clone()]).unwrap().remove(0);
    }
    synth.return_value(acc).unwrap();
    synth.finalize().unwrap()
}

// ============================================================================
// Large Trace Tests
// ============================================================================

#[test]
fn test_1000_placement_chain() {
    init_tracing();
    let catalogue = Arc::new(Catalogue::standard().unwrap());
    let output = chain(catalogue.clone(), 7, 1000);

    assert_eq!(output.instruction_count(), 1000);
    assert!(output.permutation.validate(&catalogue, &output.placements).is_ok());
    for (i, placement) in output.placements.iter().enumerate() {
        assert_eq!(placement.index, i);
    }
}

#[test]
fn test_full_width_exponent() {
    let catalogue = Arc::new(Catalogue::standard().unwrap());
    let mut synth = Synthesizer::new(catalogue.clone(), SynthConfig::default()).unwrap();
    let base = calldata(&mut synth, 0, 3);
    let exponent = synth
        .load_external(ExternalKey::Calldata { offset: 32 }, value::word_mask(), 256)
        .unwrap();
    let power = synth.place_exp(base, exponent).unwrap();
    synth.return_value(power).unwrap();

    let output = synth.finalize().unwrap();
    let batches = output.placements.iter().filter(|p| p.name == SUB_EXP_BATCH).count();
    assert_eq!(batches, 16);
    assert_eq!(output.instruction_count(), 1 + 16);
    assert!(output.permutation.validate(&catalogue, &output.placements).is_ok());
}

#[test]
fn test_keccak_chain() {
    let catalogue = Arc::new(CatalogueBuilder::standard(256).build().unwrap());
    let mut synth = Synthesizer::new(catalogue, SynthConfig::default()).unwrap();
    let mut word = calldata(&mut synth, 0, 1);
    for _ in 0..20 {
        let bytes = value::to_be_bytes_padded(word.value(), 32).unwrap();
        let digest = BigUint::from_bytes_be(&Keccak256::digest(&bytes));
        word = synth.keccak(vec![word], 32, digest).unwrap();
    }
    synth.return_value(word).unwrap();

    assert_eq!(synth.keccak_invocations(), 20);
    let output = synth.finalize().unwrap();
    assert_eq!(output.instruction_count(), 0);
    assert_eq!(output.permutation.copy_links().len(), 21);
}

// ============================================================================
// Capacity Tests
// ============================================================================

#[test]
fn test_load_buffer_overflow() {
    let catalogue = Arc::new(Catalogue::standard().unwrap());
    let mut synth = Synthesizer::new(catalogue, SynthConfig::default()).unwrap();
    for i in 0..129 {
        calldata(&mut synth, i * 32, i as u64);
    }

    match synth.finalize() {
        Err(RuntimeError::CapacityExceeded(violations)) => assert!(!violations.is_empty()),
        other => panic!("expected capacity error, got {:?}", other.map(|o| o.placements.len())),
    }
}

#[test]
fn test_load_buffer_at_capacity() {
    let catalogue = Arc::new(Catalogue::standard().unwrap());
    let mut synth = Synthesizer::new(catalogue, SynthConfig::default()).unwrap();
    for i in 0..128 {
        calldata(&mut synth, i * 32, i as u64);
    }
    assert!(synth.finalize().is_ok());
}

// ============================================================================
// Concurrency Tests
// ============================================================================

#[test]
fn test_parallel_runs_share_catalogue() {
    init_tracing();
    let catalogue = Arc::new(Catalogue::standard().unwrap());
    let handles: Vec<_> = (0..8u64)
        .map(|seed| {
            let catalogue = catalogue.clone();
            thread::spawn(move || chain(catalogue, seed % 2, 64))
        })
        .collect();
    let outputs: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    for (seed, output) in outputs.iter().enumerate() {
        assert_eq!(output, &outputs[seed % 2]);
        assert_eq!(output.catalogue_digest, catalogue.digest_hex());
    }
    assert_ne!(outputs[0], outputs[1]);
}
