//! Permutation builder
//!
//! Every interface wire of every refactored placement gets a global position
//! `(row, col)`: `col` is the placement index and `row` the wire's global id
//! minus the number of public wires. Positions holding the same
//! `(value, bit_size)` signature form one copy group; the group's first
//! position in placement order (then wire order) is its representative.
//!
//! The emitted permutation is total: each group becomes one cycle, and a
//! group of one is a self-loop. [`Permutation::copy_links`] additionally
//! lists every later member of a group against its representative.

use evm_synth_spec::{Catalogue, CircuitPlacement, DataPoint, PlacementId, SubcircuitInfo};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::error::{Result, RuntimeError};

/// `(row, col)` of an interface wire
type Position = (usize, PlacementId);

/// One copy constraint: the source wire equals the target wire
///
/// Source and target are both `(row, placement)` pairs. The target is
/// stored as `y` (placement, the column coordinate) and `z` (wire row), so
/// positionally an edge reads `(row, col) -> (z, y)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PermutationEdge {
    /// Source wire: global wire id minus the public wire count `l`
    pub row: usize,
    /// Source placement index
    pub col: PlacementId,
    /// Target placement index
    pub y: PlacementId,
    /// Target wire, numbered like `row`
    pub z: usize,
}

impl PermutationEdge {
    fn between(from: Position, to: Position) -> Self {
        Self {
            row: from.0,
            col: from.1,
            y: to.1,
            z: to.0,
        }
    }

    #[inline]
    pub fn is_self_loop(&self) -> bool {
        self.row == self.z && self.col == self.y
    }
}

/// Permutation artifact of one finalize call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permutation {
    /// Hex SHA-256 of the catalogue the positions refer to
    pub catalogue_digest: String,
    edges: Vec<PermutationEdge>,
    links: Vec<PermutationEdge>,
}

impl Permutation {
    /// Every interface position exactly once as source, ordered by `(col, row)`
    pub fn edges(&self) -> &[PermutationEdge] {
        &self.edges
    }

    /// Consumer to representative links, in discovery order
    pub fn copy_links(&self) -> &[PermutationEdge] {
        &self.links
    }

    pub fn non_trivial_edges(&self) -> impl Iterator<Item = &PermutationEdge> {
        self.edges.iter().filter(|edge| !edge.is_self_loop())
    }

    /// Re-derive every position from the catalogue and check the edges
    ///
    /// Fails unless the edges form a permutation of exactly the interface
    /// positions of `placements` and every edge joins equal values.
    pub fn validate(&self, catalogue: &Catalogue, placements: &[CircuitPlacement]) -> Result<()> {
        if self.catalogue_digest != catalogue.digest_hex() {
            return Err(inconsistency((0, 0), (0, 0), "permutation built against a different catalogue"));
        }

        let values = interface_values(catalogue, placements)?;

        let mut sources = HashSet::with_capacity(self.edges.len());
        let mut targets = HashSet::with_capacity(self.edges.len());
        for edge in &self.edges {
            let from = (edge.row, edge.col);
            let to = (edge.z, edge.y);
            if !sources.insert(from) {
                return Err(inconsistency(from, to, "position is the source of two edges"));
            }
            if !targets.insert(to) {
                return Err(inconsistency(from, to, "position is the target of two edges"));
            }
            check_edge(&values, from, to)?;
        }
        if let Some(&missing) = values.keys().find(|position| !sources.contains(*position)) {
            return Err(inconsistency(missing, missing, "position missing from the permutation"));
        }
        if sources.len() != values.len() {
            return Err(inconsistency((0, 0), (0, 0), "permutation covers positions outside the circuit"));
        }

        for link in &self.links {
            check_edge(&values, (link.row, link.col), (link.z, link.y))?;
        }
        Ok(())
    }
}

fn inconsistency(from: Position, to: Position, reason: impl Into<String>) -> RuntimeError {
    RuntimeError::PermutationInconsistency {
        row: from.0,
        col: from.1,
        y: to.1,
        z: to.0,
        reason: reason.into(),
    }
}

fn check_edge(values: &HashMap<Position, (&BigUint, u32)>, from: Position, to: Position) -> Result<()> {
    let (Some(a), Some(b)) = (values.get(&from), values.get(&to)) else {
        return Err(inconsistency(from, to, "edge refers to an unknown position"));
    };
    if a != b {
        return Err(inconsistency(
            from,
            to,
            format!("value {:#x} ({} bits) copied to {:#x} ({} bits)", a.0, a.1, b.0, b.1),
        ));
    }
    Ok(())
}

/// Value at every interface position, looked up through the inverse
/// global-wire list rather than the flatten maps directly
fn interface_values<'p>(
    catalogue: &Catalogue,
    placements: &'p [CircuitPlacement],
) -> Result<HashMap<Position, (&'p BigUint, u32)>> {
    let params = catalogue.params();
    let mut values = HashMap::new();
    for placement in placements {
        let info = catalogue
            .get(placement.subcircuit_id)
            .ok_or_else(|| inconsistency((0, placement.index), (0, placement.index), "unknown subcircuit id"))?;
        let sides = [
            (info.out_idx, &placement.out_pts),
            (info.in_idx, &placement.in_pts),
        ];
        for (range, wires) in sides {
            for (k, dp) in wires.iter().enumerate() {
                let here = (k, placement.index);
                let global = range
                    .local(k)
                    .and_then(|local| info.flatten_map.get(local).map(|&g| (local, g)))
                    .filter(|&(local, g)| catalogue.locate_global(g) == Some((info.id, local)))
                    .map(|(_, g)| g)
                    .ok_or_else(|| inconsistency(here, here, "wire has no global position"))?;
                if !params.is_interface(global) {
                    continue;
                }
                let position = (global - params.l, placement.index);
                if values.insert(position, (dp.value(), dp.bit_size())).is_some() {
                    return Err(inconsistency(position, position, "two wires share one position"));
                }
            }
        }
    }
    Ok(values)
}

/// Builds the permutation for one refactored placement list
pub struct PermutationBuilder<'a> {
    catalogue: &'a Catalogue,
}

impl<'a> PermutationBuilder<'a> {
    pub fn new(catalogue: &'a Catalogue) -> Self {
        Self { catalogue }
    }

    /// Build and validate; an unsound permutation is never returned
    pub fn build(&self, placements: &[CircuitPlacement]) -> Result<Permutation> {
        let mut groups: Vec<Vec<Position>> = Vec::new();
        let mut by_signature: HashMap<(BigUint, u32), usize> = HashMap::new();
        let mut links = Vec::new();

        // Producers claim signatures first, in placement then wire order
        for placement in placements {
            let info = self.subcircuit(placement)?;
            for (k, dp) in placement.out_pts.iter().enumerate() {
                let Some(position) = self.position(placement, info.out_global(k), k)? else {
                    continue;
                };
                match by_signature.entry(dp.signature()) {
                    Entry::Occupied(entry) => {
                        let group = &mut groups[*entry.get()];
                        links.push(PermutationEdge::between(position, group[0]));
                        group.push(position);
                    }
                    Entry::Vacant(entry) => {
                        entry.insert(groups.len());
                        groups.push(vec![position]);
                    }
                }
            }
        }

        for placement in placements {
            let info = self.subcircuit(placement)?;
            for (k, dp) in placement.in_pts.iter().enumerate() {
                let Some(position) = self.position(placement, info.in_global(k), k)? else {
                    continue;
                };
                let group = by_signature
                    .get(&dp.signature())
                    .and_then(|&g| groups.get_mut(g))
                    .ok_or_else(|| unproduced(dp, position))?;
                links.push(PermutationEdge::between(position, group[0]));
                group.push(position);
            }
        }

        let mut edges = Vec::new();
        for group in &groups {
            for (i, &from) in group.iter().enumerate() {
                let to = group[(i + 1) % group.len()];
                edges.push(PermutationEdge::between(from, to));
            }
        }
        edges.sort_unstable_by_key(|edge| (edge.col, edge.row));

        let cycles = groups.iter().filter(|group| group.len() > 1).count();
        debug!(
            "permutation over {} positions: {} copy groups, {} non-trivial cycles",
            edges.len(),
            groups.len(),
            cycles
        );

        let permutation = Permutation {
            catalogue_digest: self.catalogue.digest_hex(),
            edges,
            links,
        };
        permutation.validate(self.catalogue, placements)?;
        Ok(permutation)
    }

    fn subcircuit(&self, placement: &CircuitPlacement) -> Result<&'a SubcircuitInfo> {
        self.catalogue.get(placement.subcircuit_id).ok_or_else(|| {
            inconsistency(
                (0, placement.index),
                (0, placement.index),
                format!("{} resolves to no subcircuit", placement.name),
            )
        })
    }

    /// Position of local wire `k`, or `None` for a public wire
    fn position(&self, placement: &CircuitPlacement, global: Option<usize>, k: usize) -> Result<Option<Position>> {
        let params = self.catalogue.params();
        let global = global.ok_or_else(|| {
            inconsistency(
                (k, placement.index),
                (k, placement.index),
                format!("{} has no wire slot {}", placement.name, k),
            )
        })?;
        Ok(params
            .is_interface(global)
            .then(|| (global - params.l, placement.index)))
    }
}

fn unproduced(dp: &DataPoint, position: Position) -> RuntimeError {
    inconsistency(
        position,
        position,
        format!("consumed value {} has no producer", dp.value_hex()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use evm_synth_spec::{
        BufferKind, CatalogueBuilder, DataPointDescriptor, DataPointFactory, Source, LOAD_PLACEMENT,
        RETURN_PLACEMENT,
    };

    fn point(source: Source, wire: usize, value: u64) -> DataPoint {
        DataPointFactory::create(DataPointDescriptor::new(source, wire, 256), BigUint::from(value)).unwrap()
    }

    fn placement(catalogue: &Catalogue, index: usize, name: &str, ins: Vec<DataPoint>, outs: Vec<DataPoint>) -> CircuitPlacement {
        CircuitPlacement {
            index,
            name: name.to_string(),
            usage: name.to_string(),
            subcircuit_id: catalogue.id_of(name).unwrap(),
            in_pts: ins,
            out_pts: outs,
        }
    }

    /// LOAD -> NOT -> RETURN over an unsplit layout
    fn not_chain(catalogue: &Catalogue) -> Vec<CircuitPlacement> {
        let x = 5u64;
        let not_x = evm_synth_spec::value::word_mask() - BigUint::from(x);
        let load_out = point(Source::Placement(LOAD_PLACEMENT), 0, x);
        let not_out = DataPointFactory::create(DataPointDescriptor::new(Source::Placement(4), 0, 256), not_x).unwrap();

        vec![
            placement(catalogue, 0, BufferKind::Load.subcircuit_name(), vec![point(Source::Load, 0, x)], vec![load_out.clone()]),
            placement(
                catalogue,
                1,
                BufferKind::Return.subcircuit_name(),
                vec![not_out.clone()],
                vec![not_out.rewired(Source::Return, 0)],
            ),
            placement(catalogue, 2, BufferKind::KeccakIn.subcircuit_name(), vec![], vec![]),
            placement(catalogue, 3, BufferKind::KeccakOut.subcircuit_name(), vec![], vec![]),
            placement(catalogue, 4, "NOT", vec![load_out], vec![not_out]),
        ]
    }

    #[test]
    fn test_not_chain_links() {
        let catalogue = CatalogueBuilder::standard(256).build().unwrap();
        let placements = not_chain(&catalogue);
        let permutation = PermutationBuilder::new(&catalogue).build(&placements).unwrap();

        assert_eq!(permutation.copy_links().len(), 2);
        assert_eq!(permutation.edges().len(), 4);
        assert_eq!(permutation.non_trivial_edges().count(), 4);
        let pairs: Vec<_> = permutation.copy_links().iter().map(|l| (l.col, l.y)).collect();
        assert!(pairs.contains(&(4, LOAD_PLACEMENT)));
        assert!(pairs.contains(&(RETURN_PLACEMENT, 4)));
    }

    #[test]
    fn test_edge_targets_resolve_to_their_placement() {
        let catalogue = CatalogueBuilder::standard(256).build().unwrap();
        let placements = not_chain(&catalogue);
        let permutation = PermutationBuilder::new(&catalogue).build(&placements).unwrap();
        let l = catalogue.params().l;

        for edge in permutation.edges().iter().chain(permutation.copy_links()) {
            let (source, _) = catalogue.locate_global(edge.row + l).unwrap();
            let (target, _) = catalogue.locate_global(edge.z + l).unwrap();
            assert_eq!(source, placements[edge.col].subcircuit_id);
            assert_eq!(target, placements[edge.y].subcircuit_id);
        }
    }

    #[test]
    fn test_unused_wire_is_self_loop() {
        let catalogue = CatalogueBuilder::standard(256).build().unwrap();
        let mut placements = not_chain(&catalogue);
        placements[0].in_pts.push(point(Source::Load, 1, 77));
        placements[0].out_pts.push(point(Source::Placement(LOAD_PLACEMENT), 1, 77));

        let permutation = PermutationBuilder::new(&catalogue).build(&placements).unwrap();
        assert_eq!(permutation.edges().len(), 5);
        assert_eq!(permutation.edges().iter().filter(|e| e.is_self_loop()).count(), 1);
    }

    #[test]
    fn test_earliest_producer_is_representative() {
        let catalogue = CatalogueBuilder::standard(256).build().unwrap();
        let mut placements = not_chain(&catalogue);
        placements[0].in_pts.push(point(Source::Load, 1, 5));
        placements[0].out_pts.push(point(Source::Placement(LOAD_PLACEMENT), 1, 5));

        let permutation = PermutationBuilder::new(&catalogue).build(&placements).unwrap();
        let load = catalogue.get(catalogue.buffer_id(BufferKind::Load)).unwrap();
        let first_row = load.out_global(0).unwrap() - catalogue.params().l;
        for link in permutation.copy_links().iter().filter(|l| l.col != RETURN_PLACEMENT) {
            assert_eq!((link.y, link.z), (LOAD_PLACEMENT, first_row));
        }
    }

    #[test]
    fn test_unproduced_value_is_fatal() {
        let catalogue = CatalogueBuilder::standard(256).build().unwrap();
        let mut placements = not_chain(&catalogue);
        placements[4].in_pts[0] = point(Source::Placement(LOAD_PLACEMENT), 0, 6);

        let err = PermutationBuilder::new(&catalogue).build(&placements).unwrap_err();
        assert!(matches!(err, RuntimeError::PermutationInconsistency { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_validate_rejects_tampered_values() {
        let catalogue = CatalogueBuilder::standard(256).build().unwrap();
        let mut placements = not_chain(&catalogue);
        let permutation = PermutationBuilder::new(&catalogue).build(&placements).unwrap();
        assert!(permutation.validate(&catalogue, &placements).is_ok());

        placements[1].in_pts[0] = point(Source::Placement(4), 0, 0);
        let err = permutation.validate(&catalogue, &placements).unwrap_err();
        assert!(matches!(err, RuntimeError::PermutationInconsistency { .. }));
    }

    #[test]
    fn test_validate_rejects_foreign_catalogue() {
        let unsplit = CatalogueBuilder::standard(256).build().unwrap();
        let other = CatalogueBuilder::standard(256).max_placements(17).build().unwrap();
        let placements = not_chain(&unsplit);
        let permutation = PermutationBuilder::new(&unsplit).build(&placements).unwrap();
        assert!(permutation.validate(&other, &placements).is_err());
    }

    #[test]
    fn test_validate_rejects_dropped_edge() {
        let catalogue = CatalogueBuilder::standard(256).build().unwrap();
        let placements = not_chain(&catalogue);
        let mut permutation = PermutationBuilder::new(&catalogue).build(&placements).unwrap();
        permutation.edges.pop();
        assert!(permutation.validate(&catalogue, &placements).is_err());
    }

    #[test]
    fn test_public_wires_not_permuted() {
        let catalogue = CatalogueBuilder::standard(256).build().unwrap();
        let placements = not_chain(&catalogue);
        let permutation = PermutationBuilder::new(&catalogue).build(&placements).unwrap();
        let l_d = catalogue.params().l_d - catalogue.params().l;
        assert!(permutation.edges().iter().all(|e| e.row < l_d && e.z < l_d));
        assert!(permutation.edges().iter().all(|e| e.col != 2 && e.col != 3));
    }
}
