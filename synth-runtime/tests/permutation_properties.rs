//! Property tests: permutation totality and soundness on random traces

use evm_synth_runtime::{SynthConfig, Synthesizer};
use evm_synth_spec::{ArithmeticOp, Catalogue, CatalogueBuilder, DataPoint, ExternalKey};
use num_bigint::BigUint;
use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;

/// Binary operations safe to chain in any order
const BINARY: [ArithmeticOp; 12] = [
    ArithmeticOp::Add,
    ArithmeticOp::Mul,
    ArithmeticOp::Sub,
    ArithmeticOp::Div,
    ArithmeticOp::SDiv,
    ArithmeticOp::Mod,
    ArithmeticOp::Lt,
    ArithmeticOp::Eq,
    ArithmeticOp::And,
    ArithmeticOp::Xor,
    ArithmeticOp::Shl,
    ArithmeticOp::Sar,
];

#[derive(Debug, Clone)]
struct Step {
    op: usize,
    lhs: usize,
    rhs: usize,
}

fn arb_word() -> impl Strategy<Value = BigUint> {
    prop_oneof![
        (0u64..16).prop_map(BigUint::from),
        any::<u64>().prop_map(BigUint::from),
        prop::collection::vec(any::<u8>(), 32).prop_map(|bytes| BigUint::from_bytes_be(&bytes)),
    ]
}

fn arb_trace() -> impl Strategy<Value = (Vec<BigUint>, Vec<Step>, usize)> {
    (
        prop::collection::vec(arb_word(), 1..6),
        prop::collection::vec(
            (0..BINARY.len(), any::<usize>(), any::<usize>()).prop_map(|(op, lhs, rhs)| Step { op, lhs, rhs }),
            0..24,
        ),
        1usize..4,
    )
}

fn run(catalogue: Arc<Catalogue>, inputs: &[BigUint], steps: &[Step], returned: usize) -> Synthesizer {
    let mut synth = Synthesizer::new(catalogue, SynthConfig::default()).unwrap();
    let mut pool: Vec<DataPoint> = inputs
        .iter()
        .enumerate()
        .map(|(i, value)| {
            synth
                .load_external(ExternalKey::Calldata { offset: i * 32 }, value.clone(), 256)
                .unwrap()
        })
        .collect();
    for step in steps {
        let lhs = pool[step.lhs % pool.len()].clone();
        let rhs = pool[step.rhs % pool.len()].clone();
        let out = synth.place_arith(BINARY[step.op], vec![lhs, rhs]).unwrap();
        pool.extend(out);
    }
    for dp in pool.iter().rev().take(returned) {
        synth.return_value(dp.clone()).unwrap();
    }
    synth
}

proptest! {
    #[test]
    fn test_permutation_is_total((inputs, steps, returned) in arb_trace()) {
        let catalogue = Arc::new(Catalogue::standard().unwrap());
        let synth = run(catalogue.clone(), &inputs, &steps, returned);
        let output = synth.finalize().unwrap();

        let edges = output.permutation.edges();
        let sources: HashSet<_> = edges.iter().map(|e| (e.row, e.col)).collect();
        let targets: HashSet<_> = edges.iter().map(|e| (e.z, e.y)).collect();
        prop_assert_eq!(sources.len(), edges.len());
        prop_assert_eq!(&sources, &targets);
        prop_assert!(output.permutation.validate(&catalogue, &output.placements).is_ok());
    }

    #[test]
    fn test_links_join_equal_values((inputs, steps, returned) in arb_trace()) {
        let catalogue = Arc::new(CatalogueBuilder::standard(256).build().unwrap());
        let synth = run(catalogue.clone(), &inputs, &steps, returned);
        let output = synth.finalize().unwrap();

        let l = catalogue.params().l;
        let value_at = |row: usize, col: usize| {
            let placement = &output.placements[col];
            let info = catalogue.get(placement.subcircuit_id).unwrap();
            let global = row + l;
            let (_, local) = catalogue.locate_global(global).unwrap();
            if info.out_idx.contains(local) {
                placement.out_pts[local - info.out_idx.start].signature()
            } else {
                placement.in_pts[local - info.in_idx.start].signature()
            }
        };
        for link in output.permutation.copy_links() {
            prop_assert_eq!(value_at(link.row, link.col), value_at(link.z, link.y));
        }
    }

    #[test]
    fn test_refactor_is_deterministic((inputs, steps, returned) in arb_trace()) {
        let catalogue = Arc::new(Catalogue::standard().unwrap());
        let first = run(catalogue.clone(), &inputs, &steps, returned).finalize().unwrap();
        let second = run(catalogue, &inputs, &steps, returned).finalize().unwrap();
        prop_assert_eq!(first, second);
    }
}
