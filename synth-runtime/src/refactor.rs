//! Placement refactor
//!
//! Turns the raw registry of one run into the placement list a proving
//! backend consumes:
//!
//! 1. resolve every subcircuit name against the catalogue
//! 2. drop placements whose outputs never reach RETURN or KECCAK-IN
//! 3. optionally drop LOAD wires nothing consumes
//! 4. merge runs of fusible placements
//! 5. renumber densely and split words wider than the scalar field
//! 6. check every placement against its subcircuit's capacity
//!
//! Buffers keep ids 0-3; surviving instructions follow in execution order.

use evm_synth_spec::{
    ArithmeticOp, Arity, BufferKind, Catalogue, CircuitPlacement, DataPoint, PlacementEntry, PlacementId, Placements, Source, SpecError,
    SubcircuitId, FIRST_INSTRUCTION_PLACEMENT,
};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

use crate::error::{Result, RuntimeError};

/// A refactored placement that does not fit the catalogue
///
/// Fixed-arity instructions must fill their subcircuit's slots exactly;
/// buffers, variadic instructions and fused batches may leave slots unused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapacityViolation {
    Inputs {
        placement: PlacementId,
        name: String,
        actual: usize,
        capacity: usize,
    },
    Outputs {
        placement: PlacementId,
        name: String,
        actual: usize,
        capacity: usize,
    },
    PlacementCount {
        actual: usize,
        max: usize,
    },
}

impl std::fmt::Display for CapacityViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CapacityViolation::Inputs {
                placement,
                name,
                actual,
                capacity,
            } => write!(f, "placement {placement} ({name}) has {actual} input wires, capacity {capacity}"),
            CapacityViolation::Outputs {
                placement,
                name,
                actual,
                capacity,
            } => write!(f, "placement {placement} ({name}) has {actual} output wires, capacity {capacity}"),
            CapacityViolation::PlacementCount { actual, max } => {
                write!(f, "{actual} placements exceed s_max = {max}")
            }
        }
    }
}

/// Optional refactor passes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefactorOptions {
    pub prune_dead: bool,
    pub fuse: bool,
    pub drop_unused_loads: bool,
}

impl Default for RefactorOptions {
    fn default() -> Self {
        Self {
            prune_dead: true,
            fuse: true,
            drop_unused_loads: false,
        }
    }
}

/// Placements that end up as one refactored placement
struct Unit<'a> {
    name: String,
    usage: String,
    subcircuit_id: SubcircuitId,
    members: Vec<(PlacementId, &'a PlacementEntry)>,
}

/// Refactors one registry against a catalogue
pub struct PlacementRefactor<'a> {
    catalogue: &'a Catalogue,
    options: RefactorOptions,
}

impl<'a> PlacementRefactor<'a> {
    pub fn new(catalogue: &'a Catalogue) -> Self {
        Self {
            catalogue,
            options: RefactorOptions::default(),
        }
    }

    pub fn with_options(mut self, options: RefactorOptions) -> Self {
        self.options = options;
        self
    }

    /// Refactor into `out`, which is only replaced on success
    pub fn refactor_into(&self, placements: &Placements, out: &mut Vec<CircuitPlacement>) -> Result<()> {
        let refactored = self.refactor(placements)?;
        *out = refactored;
        Ok(())
    }

    pub fn refactor(&self, placements: &Placements) -> Result<Vec<CircuitPlacement>> {
        let resolved = self.resolve(placements)?;

        let alive = if self.options.prune_dead {
            live_placements(placements)
        } else {
            placements.iter().map(|(id, _)| id).collect()
        };
        let dropped = placements.len() - alive.len();

        let used_loads = self
            .options
            .drop_unused_loads
            .then(|| consumed_wires(placements, &alive, BufferKind::Load.placement_id()));

        let units = self.group(placements, &resolved, &alive);
        let fused = units.iter().filter(|unit| unit.members.len() > 1).count();

        let field_bits = self.catalogue.params().field_bits;
        let mut remap: HashMap<(PlacementId, usize), Vec<(PlacementId, usize)>> = HashMap::new();
        let mut refactored = Vec::with_capacity(units.len());
        let mut split_wires = 0usize;

        // Outputs first so every consumer can be remapped in one pass; inputs
        // only ever reference earlier placements.
        for (index, unit) in units.iter().enumerate() {
            let mut out_pts = Vec::new();
            for &(old_id, entry) in &unit.members {
                for (wire, dp) in entry.out_pts.iter().enumerate() {
                    if old_id == BufferKind::Load.placement_id()
                        && used_loads.as_ref().is_some_and(|used| !used.contains(&wire))
                    {
                        continue;
                    }
                    let limbs = dp.split_words(field_bits);
                    split_wires += limbs.len() - 1;
                    let mut targets = Vec::with_capacity(limbs.len());
                    for limb in limbs {
                        let new_wire = out_pts.len();
                        let source = match dp.source() {
                            Source::Placement(_) => Source::Placement(index),
                            outer => outer,
                        };
                        targets.push((index, new_wire));
                        out_pts.push(limb.rewired(source, new_wire));
                    }
                    if dp.source().placement().is_some() {
                        remap.insert((old_id, wire), targets);
                    }
                }
            }
            refactored.push(CircuitPlacement {
                index,
                name: unit.name.clone(),
                usage: unit.usage.clone(),
                subcircuit_id: unit.subcircuit_id,
                in_pts: Vec::new(),
                out_pts,
            });
        }

        for (placement, unit) in refactored.iter_mut().zip(&units) {
            for &(old_id, entry) in &unit.members {
                for (wire, dp) in entry.in_pts.iter().enumerate() {
                    if old_id == BufferKind::Load.placement_id()
                        && used_loads.as_ref().is_some_and(|used| !used.contains(&wire))
                    {
                        continue;
                    }
                    let limbs = dp.split_words(field_bits);
                    match dp.source().placement() {
                        Some(producer) => {
                            let targets = remap
                                .get(&(producer, dp.wire_index()))
                                .filter(|targets| targets.len() == limbs.len())
                                .ok_or(RuntimeError::DanglingWire {
                                    placement: old_id,
                                    source_placement: producer,
                                    wire: dp.wire_index(),
                                })?;
                            for (limb, &(new_producer, new_wire)) in limbs.into_iter().zip(targets) {
                                placement
                                    .in_pts
                                    .push(limb.rewired(Source::Placement(new_producer), new_wire));
                            }
                        }
                        None => {
                            for limb in limbs {
                                let position = placement.in_pts.len();
                                placement.in_pts.push(limb.rewired(dp.source(), position));
                            }
                        }
                    }
                }
            }
        }

        self.check_capacity(&refactored)?;

        debug!(
            "refactored {} placements into {} ({} dropped, {} fused runs, {} wires split)",
            placements.len(),
            refactored.len(),
            dropped,
            fused,
            split_wires
        );
        Ok(refactored)
    }

    /// Catalogue id of every placement, by name
    fn resolve(&self, placements: &Placements) -> Result<HashMap<PlacementId, SubcircuitId>> {
        placements
            .iter()
            .map(|(id, entry)| {
                self.catalogue
                    .id_of(&entry.name)
                    .map(|sid| (id, sid))
                    .ok_or_else(|| RuntimeError::from(SpecError::UnknownSubcircuit(entry.name.clone())))
            })
            .collect()
    }

    /// Buffers stay single; consecutive live placements of a fusible
    /// subcircuit are merged in runs of at most `max_run`
    fn group<'p>(
        &self,
        placements: &'p Placements,
        resolved: &HashMap<PlacementId, SubcircuitId>,
        alive: &HashSet<PlacementId>,
    ) -> Vec<Unit<'p>> {
        let mut units: Vec<Unit<'p>> = Vec::new();
        let mut open_run = false;

        for (id, entry) in placements.iter().filter(|(id, _)| alive.contains(id)) {
            let subcircuit_id = resolved.get(&id).copied().unwrap_or_default();
            let fusion = (self.options.fuse && id >= FIRST_INSTRUCTION_PLACEMENT)
                .then(|| self.catalogue.get(subcircuit_id).and_then(|info| info.fusion.as_ref()))
                .flatten();

            let Some(fusion) = fusion else {
                units.push(Unit {
                    name: entry.name.clone(),
                    usage: entry.usage.clone(),
                    subcircuit_id,
                    members: vec![(id, entry)],
                });
                open_run = false;
                continue;
            };

            if let Some(last) = units.last_mut().filter(|_| open_run) {
                let same = last.members.first().map(|(_, e)| e.name == entry.name).unwrap_or(false);
                if same && last.members.len() < fusion.max_run {
                    last.members.push((id, entry));
                    continue;
                }
            }
            units.push(Unit {
                name: entry.name.clone(),
                usage: entry.usage.clone(),
                subcircuit_id,
                members: vec![(id, entry)],
            });
            open_run = true;
        }

        // Runs that found a partner become the batched subcircuit
        for unit in units.iter_mut().filter(|unit| unit.members.len() > 1) {
            let target = self
                .catalogue
                .get(unit.subcircuit_id)
                .and_then(|info| info.fusion.as_ref())
                .and_then(|fusion| self.catalogue.lookup(&fusion.into));
            if let Some(target) = target {
                unit.name = target.name.clone();
                unit.subcircuit_id = target.id;
            }
        }
        units
    }

    fn check_capacity(&self, placements: &[CircuitPlacement]) -> Result<()> {
        let mut violations = Vec::new();
        let max = self.catalogue.params().s_max;
        if placements.len() > max {
            violations.push(CapacityViolation::PlacementCount {
                actual: placements.len(),
                max,
            });
        }
        for placement in placements {
            let Some(info) = self.catalogue.get(placement.subcircuit_id) else {
                return Err(SpecError::UnknownSubcircuit(placement.name.clone()).into());
            };
            let exact = placement.index >= FIRST_INSTRUCTION_PLACEMENT
                && ArithmeticOp::from_name(&placement.name).is_some_and(|op| matches!(op.arity(), Arity::Fixed(_)));
            let misfit = |actual: usize, capacity: usize| if exact { actual != capacity } else { actual > capacity };
            if misfit(placement.in_pts.len(), info.in_idx.count) {
                violations.push(CapacityViolation::Inputs {
                    placement: placement.index,
                    name: placement.name.clone(),
                    actual: placement.in_pts.len(),
                    capacity: info.in_idx.count,
                });
            }
            if misfit(placement.out_pts.len(), info.out_idx.count) {
                violations.push(CapacityViolation::Outputs {
                    placement: placement.index,
                    name: placement.name.clone(),
                    actual: placement.out_pts.len(),
                    capacity: info.out_idx.count,
                });
            }
        }

        if violations.is_empty() {
            return Ok(());
        }
        for violation in &violations {
            warn!("capacity violation: {}", violation);
        }
        Err(RuntimeError::CapacityExceeded(violations))
    }
}

/// Placements backward-reachable from the exit buffers, plus all buffers
fn live_placements(placements: &Placements) -> HashSet<PlacementId> {
    let mut alive: HashSet<PlacementId> = BufferKind::ALL.iter().map(|kind| kind.placement_id()).collect();
    let mut needed: HashSet<PlacementId> = HashSet::new();

    let mark = |needed: &mut HashSet<PlacementId>, inputs: &[DataPoint]| {
        needed.extend(inputs.iter().filter_map(|dp| dp.source().placement()));
    };
    for kind in [BufferKind::Return, BufferKind::KeccakIn] {
        mark(&mut needed, &placements.buffer(kind).in_pts);
    }

    let instructions: Vec<_> = placements.instructions().collect();
    for (id, entry) in instructions.into_iter().rev() {
        if needed.contains(&id) {
            alive.insert(id);
            mark(&mut needed, &entry.in_pts);
        }
    }
    alive
}

/// Output wires of `producer` consumed by live placements
fn consumed_wires(placements: &Placements, alive: &HashSet<PlacementId>, producer: PlacementId) -> HashSet<usize> {
    placements
        .iter()
        .filter(|(id, _)| alive.contains(id))
        .flat_map(|(_, entry)| entry.in_pts.iter())
        .filter(|dp| dp.source().placement() == Some(producer))
        .map(|dp| dp.wire_index())
        .collect()
}
