//! Instance check and placement-variable listing
//!
//! The instance check re-evaluates every placement of a run before it is
//! refactored. The variable listing gives a proving backend, per refactored
//! placement, the values of the subcircuit's constant, output and input wires
//! in local wire order.

use evm_synth_spec::{
    value, ArithmeticOp, BufferKind, Catalogue, CircuitPlacement, PlacementId, Placements, SpecError, SubcircuitId,
};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::arithmetic::OperationTable;
use crate::error::{Result, RuntimeError};
use crate::refactor::CapacityViolation;

/// Hex of the constant-one wire and of an unused padding wire
const ONE_WIRE: &str = "0x01";
const PAD_WIRE: &str = "0x00";

/// Wire values of one refactored placement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementVariables {
    pub placement_index: PlacementId,
    pub subcircuit_id: SubcircuitId,
    /// `[1, outputs.., inputs..]`, each side zero-padded to its capacity
    pub variables: Vec<String>,
}

/// Re-evaluate every placement against its recorded outputs
///
/// Buffers must pair each inPt with an equal outPt; instructions must
/// reproduce their outputs exactly from their inputs.
pub fn check_instances(placements: &Placements, table: &OperationTable) -> Result<()> {
    for kind in BufferKind::ALL {
        let buffer = placements.buffer(kind);
        let id = kind.placement_id();
        let failed = |reason: String| RuntimeError::InstanceCheckFailed {
            placement: id,
            name: buffer.name.clone(),
            reason,
        };
        if buffer.in_pts.len() != buffer.out_pts.len() {
            return Err(failed(format!(
                "{} inputs paired with {} outputs",
                buffer.in_pts.len(),
                buffer.out_pts.len()
            )));
        }
        for (i, (in_pt, out_pt)) in buffer.in_pts.iter().zip(&buffer.out_pts).enumerate() {
            if in_pt.signature() != out_pt.signature() {
                return Err(failed(format!("wire {i} carries {} in, {} out", in_pt, out_pt)));
            }
        }
    }

    for (id, entry) in placements.instructions() {
        let failed = |reason: String| RuntimeError::InstanceCheckFailed {
            placement: id,
            name: entry.name.clone(),
            reason,
        };
        let op = ArithmeticOp::from_name(&entry.name)
            .ok_or_else(|| failed("no operation of that name".to_string()))?;
        let inputs: Vec<BigUint> = entry.in_pts.iter().map(|dp| dp.value().clone()).collect();
        let expected = table
            .evaluate(op, &inputs)
            .map_err(|e| failed(format!("re-evaluation failed: {e}")))?;
        let actual: Vec<&BigUint> = entry.out_pts.iter().map(|dp| dp.value()).collect();
        if expected.iter().collect::<Vec<_>>() != actual {
            return Err(failed(format!(
                "outputs do not match {} re-evaluated from its inputs",
                op.name()
            )));
        }
    }

    debug!("instance check passed for {} placements", placements.len());
    Ok(())
}

/// List the wire values of every refactored placement
pub fn placement_variables(catalogue: &Catalogue, placements: &[CircuitPlacement]) -> Result<Vec<PlacementVariables>> {
    placements
        .iter()
        .map(|placement| {
            let info = catalogue
                .get(placement.subcircuit_id)
                .ok_or_else(|| SpecError::UnknownSubcircuit(placement.name.clone()))?;
            let (outs, ins) = (info.out_idx.count, info.in_idx.count);
            if placement.out_pts.len() > outs {
                return Err(RuntimeError::CapacityExceeded(vec![CapacityViolation::Outputs {
                    placement: placement.index,
                    name: placement.name.clone(),
                    actual: placement.out_pts.len(),
                    capacity: outs,
                }]));
            }
            if placement.in_pts.len() > ins {
                return Err(RuntimeError::CapacityExceeded(vec![CapacityViolation::Inputs {
                    placement: placement.index,
                    name: placement.name.clone(),
                    actual: placement.in_pts.len(),
                    capacity: ins,
                }]));
            }

            let mut variables = Vec::with_capacity(1 + outs + ins);
            variables.push(ONE_WIRE.to_string());
            for (wires, capacity) in [(&placement.out_pts, outs), (&placement.in_pts, ins)] {
                variables.extend(wires.iter().map(|dp| dp.value_hex().to_string()));
                variables.extend(std::iter::repeat(PAD_WIRE.to_string()).take(capacity - wires.len()));
            }
            Ok(PlacementVariables {
                placement_index: placement.index,
                subcircuit_id: placement.subcircuit_id,
                variables,
            })
        })
        .collect()
}

/// Parse a listed variable back into its value
pub fn variable_value(variable: &str) -> Option<BigUint> {
    value::from_hex(variable)
}
