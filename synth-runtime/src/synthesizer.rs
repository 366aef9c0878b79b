//! Trace synthesizer
//!
//! Owns the placement registry of one synthesis run and turns interpreter
//! trace steps into placements, in instruction order.

use evm_synth_spec::{
    ArithmeticOp, Catalogue, DataPoint, DataPointDescriptor, DataPointFactory, ExternalKey, Operand, PlacementEntry,
    PlacementId, Placements, Source, SpecError, TraceStep, Validator, WORD_BITS,
};
use num_bigint::BigUint;
use num_traits::{One, Zero};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, trace};

use crate::arithmetic::OperationTable;
use crate::error::{Result, RuntimeError};
use crate::output::SynthesisOutput;
use crate::permutation::PermutationBuilder;
use crate::refactor::{PlacementRefactor, RefactorOptions};
use crate::state::{ExternalState, InMemoryState};
use crate::variables::{check_instances, placement_variables};

/// Synthesizer configuration
#[derive(Debug, Clone)]
pub struct SynthConfig {
    /// Compare synthesized results against results reported in the trace
    pub validate_results: bool,

    /// Re-evaluate every placement before refactoring
    pub instance_check: bool,

    /// Drop placements whose outputs never reach a buffer
    pub prune_dead_placements: bool,

    /// Merge runs of fusible placements
    pub fuse_placements: bool,

    /// Remove LOAD wires nothing consumes instead of keeping them as self-loops
    pub drop_unused_loads: bool,

    /// Recompute Keccak-256 digests reported by the trace
    pub verify_keccak: bool,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            validate_results: true,
            instance_check: true,
            prune_dead_placements: true,
            fuse_placements: true,
            drop_unused_loads: false,
            verify_keccak: true,
        }
    }
}

impl SynthConfig {
    pub(crate) fn refactor_options(&self) -> RefactorOptions {
        RefactorOptions {
            prune_dead: self.prune_dead_placements,
            fuse: self.fuse_placements,
            drop_unused_loads: self.drop_unused_loads,
        }
    }
}

/// Per-run synthesizer
///
/// The catalogue is shared read-only; everything else belongs to this run.
pub struct Synthesizer {
    pub(crate) catalogue: Arc<Catalogue>,
    pub(crate) config: SynthConfig,
    pub(crate) placements: Placements,
    pub(crate) table: OperationTable,
    /// LOAD data points by external identity
    pub(crate) loads: HashMap<ExternalKey, DataPoint>,
    pub(crate) keccak_invocations: usize,
    pub(crate) state: Box<dyn ExternalState + Send>,
}

impl Synthesizer {
    /// Create a synthesizer with empty buffers and in-memory state
    pub fn new(catalogue: Arc<Catalogue>, config: SynthConfig) -> Result<Self> {
        let table = OperationTable::new()?;
        let placements = Placements::with_buffers(&catalogue);
        debug!("synthesizer initialized with {} subcircuits", catalogue.subcircuits().len());
        Ok(Self {
            catalogue,
            config,
            placements,
            table,
            loads: HashMap::new(),
            keccak_invocations: 0,
            state: Box::new(InMemoryState::new()),
        })
    }

    /// Replace the external state storage reads are served from
    pub fn with_state(mut self, state: impl ExternalState + Send + 'static) -> Self {
        self.state = Box::new(state);
        self
    }

    #[inline]
    pub fn placements(&self) -> &Placements {
        &self.placements
    }

    #[inline]
    pub fn catalogue(&self) -> &Arc<Catalogue> {
        &self.catalogue
    }

    #[inline]
    pub fn config(&self) -> &SynthConfig {
        &self.config
    }

    /// Number of KECCAK256 invocations wired so far
    #[inline]
    pub fn keccak_invocations(&self) -> usize {
        self.keccak_invocations
    }

    /// Place one operation and return its output data points
    ///
    /// EXP is routed through [`Synthesizer::place_exp`].
    pub fn place_arith(&mut self, op: ArithmeticOp, inputs: Vec<DataPoint>) -> Result<Vec<DataPoint>> {
        if op.is_composite() {
            Validator::validate_operands(op.name(), &inputs)?;
            Validator::validate_arity(op, inputs.len())?;
            let [base, exponent]: [DataPoint; 2] = inputs.try_into().map_err(|v: Vec<DataPoint>| {
                SpecError::InputArity {
                    name: op.name().to_string(),
                    expected: 2,
                    actual: v.len(),
                }
            })?;
            return Ok(vec![self.place_exp(base, exponent)?]);
        }
        self.place(op, inputs, op.name())
    }

    /// Place `base ^ exponent` as DecToBit plus a chain of SubEXP steps
    ///
    /// An exponent of 0 yields the constant 1 from LOAD, an exponent of 1
    /// forwards the base without placing anything.
    ///
    /// Operands and both subcircuit names are checked before the first
    /// placement, so a failed EXP leaves the registry untouched.
    pub fn place_exp(&mut self, base: DataPoint, exponent: DataPoint) -> Result<DataPoint> {
        let operands = [base, exponent];
        Validator::validate_operand_widths(ArithmeticOp::Exp, &operands)?;
        let key = self.placements.next_key();
        for operand in &operands {
            self.check_wired(operand, key)?;
        }
        for op in [ArithmeticOp::DecToBit, ArithmeticOp::SubExp] {
            let name = op.subcircuit_name().ok_or_else(|| SpecError::UnimplementedOpcode(op.name().to_string()))?;
            Validator::validate_subcircuit_name(&self.catalogue, name)?;
        }
        let [base, exponent] = operands;

        if exponent.value().is_zero() {
            return self.load_auxiliary(BigUint::one(), WORD_BITS);
        }
        if exponent.value().is_one() {
            return Ok(base);
        }

        let bit_length = exponent.value().bits() as usize;
        let usage = ArithmeticOp::Exp.name();
        let bits = self.place(ArithmeticOp::DecToBit, vec![exponent], usage)?;

        let mut c = self.load_auxiliary(BigUint::one(), WORD_BITS)?;
        let mut a = base;
        for bit in bits.iter().rev().take(bit_length) {
            let outs = self.place(ArithmeticOp::SubExp, vec![c, a, bit.clone()], usage)?;
            let [c_next, a_next]: [DataPoint; 2] = outs.try_into().map_err(|v: Vec<DataPoint>| {
                SpecError::InputArity {
                    name: ArithmeticOp::SubExp.name().to_string(),
                    expected: 2,
                    actual: v.len(),
                }
            })?;
            c = c_next;
            a = a_next;
        }
        debug!("placed EXP as {} SubEXP steps", bit_length);
        Ok(c)
    }

    fn place(&mut self, op: ArithmeticOp, inputs: Vec<DataPoint>, usage: &str) -> Result<Vec<DataPoint>> {
        let name = op.subcircuit_name().ok_or_else(|| SpecError::UnimplementedOpcode(op.name().to_string()))?;
        Validator::validate_operands(name, &inputs)?;
        Validator::validate_arity(op, inputs.len())?;
        Validator::validate_operand_widths(op, &inputs)?;
        let subcircuit_id = Validator::validate_subcircuit_name(&self.catalogue, name)?;

        let key = self.placements.next_key();
        for input in &inputs {
            self.check_wired(input, key)?;
        }

        let values: Vec<BigUint> = inputs.iter().map(|dp| dp.value().clone()).collect();
        let results = self.table.evaluate(op, &values)?;
        let out_pts = results
            .into_iter()
            .enumerate()
            .map(|(i, value)| {
                DataPointFactory::create(
                    DataPointDescriptor::new(Source::Placement(key), i, op.output_bit_size()),
                    value,
                )
            })
            .collect::<std::result::Result<Vec<_>, SpecError>>()?;

        let entry = PlacementEntry::new(name, usage, inputs, out_pts.clone()).with_subcircuit(subcircuit_id);
        let placed = self.placements.push(entry);
        trace!("placed {} at {} with {} outputs", name, placed, out_pts.len());
        Ok(out_pts)
    }

    /// Check that a consumed data point is a live output of an earlier placement
    pub(crate) fn check_wired(&self, dp: &DataPoint, consumer: PlacementId) -> Result<()> {
        let Some(producer) = dp.source().placement() else {
            return Err(RuntimeError::BufferMisuse {
                buffer: dp.source().to_string(),
                reason: format!("placement {consumer} consumes a wire with no in-circuit producer"),
            });
        };
        let matches = self
            .placements
            .get(producer)
            .and_then(|entry| entry.out_pts.get(dp.wire_index()))
            .map(|out| out.value() == dp.value() && out.bit_size() == dp.bit_size())
            .unwrap_or(false);
        if !matches {
            return Err(RuntimeError::DanglingWire {
                placement: consumer,
                source_placement: producer,
                wire: dp.wire_index(),
            });
        }
        Ok(())
    }

    /// Synthesize one trace step
    ///
    /// `prior` holds the outputs of the earlier steps of the same batch, for
    /// [`Operand::Step`] references.
    pub fn synthesize(&mut self, step: &TraceStep, prior: &[Vec<DataPoint>]) -> Result<Vec<DataPoint>> {
        match step {
            TraceStep::Arith {
                opcode,
                operands,
                result,
            } => {
                let op = Validator::validate_implemented_opcode(*opcode)?;
                let inputs = operands
                    .iter()
                    .map(|operand| self.resolve(operand, prior))
                    .collect::<Result<Vec<_>>>()?;
                let outputs = self.place_arith(op, inputs)?;
                if let (true, Some(expected), Some(actual)) = (self.config.validate_results, result, outputs.first()) {
                    if actual.value() != expected {
                        return Err(RuntimeError::ResultMismatch {
                            name: op.name().to_string(),
                            expected: format!("{expected:#x}"),
                            actual: actual.value_hex().to_string(),
                        });
                    }
                }
                Ok(outputs)
            }
            TraceStep::Keccak { chunks, length, digest } => {
                let chunks = chunks
                    .iter()
                    .map(|operand| self.resolve(operand, prior))
                    .collect::<Result<Vec<_>>>()?;
                Ok(vec![self.keccak(chunks, *length, digest.clone())?])
            }
            TraceStep::Return { operand } => {
                let dp = self.resolve(operand, prior)?;
                self.return_value(dp)?;
                Ok(Vec::new())
            }
        }
    }

    /// Synthesize a whole trace; returns the outputs of every step
    pub fn synthesize_trace(&mut self, steps: &[TraceStep]) -> Result<Vec<Vec<DataPoint>>> {
        let mut outputs: Vec<Vec<DataPoint>> = Vec::with_capacity(steps.len());
        for (i, step) in steps.iter().enumerate() {
            trace!("step {}: {}", i, step.label());
            let produced = self.synthesize(step, &outputs)?;
            outputs.push(produced);
        }
        debug!(
            "synthesized {} steps into {} placements",
            steps.len(),
            self.placements.len()
        );
        Ok(outputs)
    }

    fn resolve(&mut self, operand: &Operand, prior: &[Vec<DataPoint>]) -> Result<DataPoint> {
        match operand {
            Operand::Wired(dp) => Ok(dp.clone()),
            Operand::Step { step, output } => prior
                .get(*step)
                .and_then(|outs| outs.get(*output))
                .cloned()
                .ok_or(RuntimeError::UnknownStepOutput {
                    step: *step,
                    output: *output,
                }),
            Operand::External { key, value, bit_size } => self.load_external(key.clone(), value.clone(), *bit_size),
            Operand::Storage { address, slot } => self.load_storage(address.clone(), slot.clone()),
            Operand::Constant { value, bit_size } => self.load_auxiliary(value.clone(), *bit_size),
        }
    }

    /// Check, refactor and wire the synthesized placements
    ///
    /// Aborts on the first inconsistency; nothing is emitted in that case.
    pub fn finalize(&self) -> Result<SynthesisOutput> {
        if self.config.instance_check {
            check_instances(&self.placements, &self.table)?;
        }

        let placements = PlacementRefactor::new(&self.catalogue)
            .with_options(self.config.refactor_options())
            .refactor(&self.placements)?;
        let permutation = PermutationBuilder::new(&self.catalogue).build(&placements)?;
        let variables = placement_variables(&self.catalogue, &placements)?;

        info!(
            "finalized {} placements, {} permutation edges ({} copy links)",
            placements.len(),
            permutation.edges().len(),
            permutation.copy_links().len()
        );

        Ok(SynthesisOutput {
            catalogue_digest: self.catalogue.digest_hex(),
            placements,
            permutation,
            variables,
        })
    }
}
