//! Catalogue loading tests against a hand-written compiler description

use evm_synth_spec::{BufferKind, Catalogue, CatalogueError, SpecError};

/// Four single-wire buffers plus a two-input ADD, unsplit field
///
/// Globals: public inputs 0-1, public outputs 2-3, interface 4-10,
/// constant wires 11-15.
const TINY: &str = r#"{
  "setupParams": {
    "l": 4, "l_in": 2, "l_out": 2, "l_D": 11, "m_D": 16,
    "n": 16, "s_D": 5, "s_max": 8, "field_bits": 256
  },
  "subcircuits": [
    { "id": 0, "name": "bufferLoad",      "Nwires": 3, "Out_idx": [1, 1], "In_idx": [2, 1], "flattenMap": [11, 4, 0] },
    { "id": 1, "name": "bufferReturn",    "Nwires": 3, "Out_idx": [1, 1], "In_idx": [2, 1], "flattenMap": [12, 2, 5] },
    { "id": 2, "name": "bufferKeccakIn",  "Nwires": 3, "Out_idx": [1, 1], "In_idx": [2, 1], "flattenMap": [13, 3, 6] },
    { "id": 3, "name": "bufferKeccakOut", "Nwires": 3, "Out_idx": [1, 1], "In_idx": [2, 1], "flattenMap": [14, 7, 1] },
    { "id": 4, "name": "ADD",             "Nwires": 4, "Out_idx": [1, 1], "In_idx": [2, 2], "flattenMap": [15, 8, 9, 10] }
  ]
}"#;

// ============================================================================
// Loading Tests
// ============================================================================

#[test]
fn test_load_tiny_catalogue() {
    let catalogue = Catalogue::from_json_str(TINY).unwrap();
    let params = catalogue.params();
    assert_eq!(params.l, 4);
    assert_eq!(params.interface_wires(), 7);
    assert_eq!(params.field_bits, 256);

    let add = catalogue.lookup("ADD").unwrap();
    assert_eq!(add.id, 4);
    assert_eq!(add.in_global(1), Some(10));
    assert_eq!(add.out_global(0), Some(8));
    assert_eq!(add.in_global(2), None);
}

#[test]
fn test_buffers_resolved_by_name() {
    let catalogue = Catalogue::from_json_str(TINY).unwrap();
    for kind in BufferKind::ALL {
        let info = catalogue.get(catalogue.buffer_id(kind)).unwrap();
        assert_eq!(info.name, kind.subcircuit_name());
    }
}

#[test]
fn test_locate_global() {
    let catalogue = Catalogue::from_json_str(TINY).unwrap();
    assert_eq!(catalogue.locate_global(9), Some((4, 2)));
    assert_eq!(catalogue.locate_global(0), Some((0, 2)));
    assert_eq!(catalogue.locate_global(16), None);
}

#[test]
fn test_from_reader_matches_from_str() {
    let a = Catalogue::from_json_str(TINY).unwrap();
    let b = Catalogue::from_reader(TINY.as_bytes()).unwrap();
    assert_eq!(a.digest(), b.digest());
}

#[test]
fn test_field_bits_default() {
    let without = TINY.replace(r#", "field_bits": 256"#, "");
    let catalogue = Catalogue::from_json_str(&without).unwrap();
    assert_eq!(catalogue.params().field_bits, 255);
}

// ============================================================================
// Rejection Tests
// ============================================================================

#[test]
fn test_rejects_inconsistent_params() {
    let broken = TINY.replace(r#""l_in": 2"#, r#""l_in": 3"#);
    let err = Catalogue::from_json_str(&broken).unwrap_err();
    assert!(matches!(err, SpecError::Catalogue(CatalogueError::Config(_))));
    assert!(err.is_fatal());
}

#[test]
fn test_rejects_wrong_subcircuit_count() {
    let broken = TINY.replace(r#""s_D": 5"#, r#""s_D": 6"#);
    let err = Catalogue::from_json_str(&broken).unwrap_err();
    assert!(matches!(
        err,
        SpecError::Catalogue(CatalogueError::CountMismatch { expected: 6, actual: 5 })
    ));
}

#[test]
fn test_rejects_global_beyond_total() {
    let broken = TINY.replace("[15, 8, 9, 10]", "[16, 8, 9, 10]");
    let err = Catalogue::from_json_str(&broken).unwrap_err();
    assert!(matches!(
        err,
        SpecError::Catalogue(CatalogueError::GlobalWireOutOfRange { global: 16, .. })
    ));
}

#[test]
fn test_rejects_overlapping_ranges() {
    let broken = TINY.replace(r#""In_idx": [2, 2]"#, r#""In_idx": [1, 2]"#);
    let err = Catalogue::from_json_str(&broken).unwrap_err();
    assert!(matches!(err, SpecError::Catalogue(CatalogueError::RangeOutOfBounds { .. })));
}

#[test]
fn test_rejects_duplicate_names() {
    let broken = TINY.replace(r#""name": "ADD""#, r#""name": "bufferLoad""#);
    let err = Catalogue::from_json_str(&broken).unwrap_err();
    assert!(matches!(err, SpecError::Catalogue(CatalogueError::DuplicateName(_))));
}

#[test]
fn test_export_reloads() {
    let catalogue = Catalogue::from_json_str(TINY).unwrap();
    let exported = catalogue.to_json().unwrap();
    let reloaded = Catalogue::from_json_str(&exported).unwrap();
    assert_eq!(reloaded.digest_hex(), catalogue.digest_hex());
    assert_eq!(reloaded.description(), catalogue.description());
}
