//! Buffer placements
//!
//! Values cross the circuit boundary only through the four reserved buffers.
//! Entry buffers (LOAD, KECCAK-OUT) mint an (inPt, outPt) pair per value: the
//! inPt is the public outside wire, the outPt is what instructions consume.
//! Exit buffers (RETURN, KECCAK-IN) take an in-circuit wire as inPt and expose
//! a public outPt.
//!
//! LOAD deduplicates by external identity, so a calldata word or storage slot
//! referenced twice enters the circuit once.

use evm_synth_spec::{
    value, BufferKind, DataPoint, DataPointDescriptor, DataPointFactory, ExternalKey, Source, SpecError, Validator,
    WORD_BITS,
};
use num_bigint::BigUint;
use sha3::{Digest, Keccak256};
use tracing::{debug, trace};

use crate::error::{Result, RuntimeError};
use crate::synthesizer::Synthesizer;

/// Bytes per pre-image chunk handed to KECCAK-IN
pub const KECCAK_CHUNK_BYTES: usize = 32;

impl Synthesizer {
    /// Bring an external value into the circuit through LOAD
    ///
    /// `value` must fit `bit_size`, the width the value has outside the
    /// circuit (160 for an address, 8 for a PUSH1 immediate). Inside, every
    /// LOAD wire is a full word so it fills exactly one operand slot.
    ///
    /// Returns the buffer's outPt. A key seen before returns the cached data
    /// point; a different value for the same key is a buffer misuse.
    pub fn load_external(&mut self, key: ExternalKey, value: BigUint, bit_size: u32) -> Result<DataPoint> {
        if bit_size > WORD_BITS {
            return Err(SpecError::ValueRange {
                value: value::to_hex(&value, WORD_BITS),
                bit_size,
            }
            .into());
        }
        Validator::validate_value(&value, bit_size)?;
        if let Some(cached) = self.loads.get(&key) {
            if cached.value() != &value {
                return Err(RuntimeError::BufferMisuse {
                    buffer: BufferKind::Load.to_string(),
                    reason: format!("conflicting values for {key:?}"),
                });
            }
            return Ok(cached.clone());
        }

        let outer = match key {
            ExternalKey::Constant { .. } => Source::Auxiliary,
            _ => Source::Load,
        };
        let index = self.placements.buffer(BufferKind::Load).out_pts.len();
        let descriptor = DataPointDescriptor::new(outer, index, WORD_BITS).with_origin(key.clone());
        let (in_pt, out_pt) = DataPointFactory::create_for_buffer_init(BufferKind::Load, descriptor, value)?;

        let buffer = self.placements.buffer_mut(BufferKind::Load);
        buffer.in_pts.push(in_pt);
        buffer.out_pts.push(out_pt.clone());
        self.loads.insert(key, out_pt.clone());
        trace!("LOAD[{}] <- {}", index, out_pt.value_hex());
        Ok(out_pt)
    }

    /// Load a constant the synthesizer needs for its own placement rules
    pub fn load_auxiliary(&mut self, value: BigUint, bit_size: u32) -> Result<DataPoint> {
        let key = ExternalKey::Constant {
            value: value.clone(),
            bit_size,
        };
        self.load_external(key, value, bit_size)
    }

    /// Load a storage slot, fetching it from the external state on first use
    pub fn load_storage(&mut self, address: BigUint, slot: BigUint) -> Result<DataPoint> {
        let key = ExternalKey::Storage {
            address: address.clone(),
            slot: slot.clone(),
        };
        if let Some(cached) = self.loads.get(&key) {
            return Ok(cached.clone());
        }
        let value = self.state.storage(&address, &slot)?;
        debug!("storage read {:#x}[{:#x}] = {:#x}", address, slot, value);
        self.load_external(key, value, WORD_BITS)
    }

    /// Route an in-circuit value out through RETURN; returns the public outPt
    pub fn return_value(&mut self, dp: DataPoint) -> Result<DataPoint> {
        self.check_wired(&dp, BufferKind::Return.placement_id())?;
        let out = self.record_exit(BufferKind::Return, dp);
        trace!("RETURN[{}] -> {}", out.wire_index(), out.value_hex());
        Ok(out)
    }

    /// Wire one KECCAK256 invocation
    ///
    /// `chunks` are the 32-byte words of the pre-image (the last one holds the
    /// remaining `length % 32` bytes when the length is not word aligned). They
    /// leave through KECCAK-IN; `digest` comes back through KECCAK-OUT and its
    /// outPt is returned.
    pub fn keccak(&mut self, chunks: Vec<DataPoint>, length: usize, digest: BigUint) -> Result<DataPoint> {
        let expected_chunks = length.div_ceil(KECCAK_CHUNK_BYTES);
        Validator::validate_input_count("KECCAK256", chunks.len(), expected_chunks)?;

        let consumer = BufferKind::KeccakIn.placement_id();
        let mut preimage = Vec::with_capacity(length);
        for (i, chunk) in chunks.iter().enumerate() {
            self.check_wired(chunk, consumer)?;
            let width = (length - i * KECCAK_CHUNK_BYTES).min(KECCAK_CHUNK_BYTES);
            let bytes = value::to_be_bytes_padded(chunk.value(), width).ok_or_else(|| SpecError::ValueRange {
                value: chunk.value_hex().to_string(),
                bit_size: (width * 8) as u32,
            })?;
            preimage.extend_from_slice(&bytes);
        }

        if self.config.verify_keccak {
            let computed = BigUint::from_bytes_be(&Keccak256::digest(&preimage));
            if computed != digest {
                return Err(RuntimeError::KeccakMismatch {
                    expected: value::to_hex(&digest, WORD_BITS),
                    computed: value::to_hex(&computed, WORD_BITS),
                });
            }
        }

        let index = self.placements.buffer(BufferKind::KeccakOut).out_pts.len();
        let descriptor = DataPointDescriptor::new(Source::KeccakOut, index, WORD_BITS);
        let (in_pt, out_pt) = DataPointFactory::create_for_buffer_init(BufferKind::KeccakOut, descriptor, digest)?;

        for chunk in chunks {
            self.record_exit(BufferKind::KeccakIn, chunk);
        }
        let buffer = self.placements.buffer_mut(BufferKind::KeccakOut);
        buffer.in_pts.push(in_pt);
        buffer.out_pts.push(out_pt.clone());
        self.keccak_invocations += 1;

        debug!(
            "KECCAK256 #{} over {} bytes -> {}",
            self.keccak_invocations,
            length,
            out_pt.value_hex()
        );
        Ok(out_pt)
    }

    fn record_exit(&mut self, kind: BufferKind, dp: DataPoint) -> DataPoint {
        let buffer = self.placements.buffer_mut(kind);
        let out = dp.rewired(kind.outer_source(), buffer.out_pts.len());
        buffer.in_pts.push(dp);
        buffer.out_pts.push(out.clone());
        out
    }
}
