//! # Protocol Setup Parameters
//!
//! The fixed parameter set a subcircuit catalogue is compiled against. Field
//! names follow the compiler's JSON output (`l_D`, `m_D`, `s_D`).

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{DEFAULT_FIELD_BITS, LIMB_BITS, WORD_BITS};

/// Wire and placement counts of a compiled circuit library
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SetupParams {
    /// Number of public wires
    pub l: usize,
    /// Public input wires
    pub l_in: usize,
    /// Public output wires
    pub l_out: usize,
    /// End of the interface wire range (interface wires are `l..l_D`)
    #[serde(rename = "l_D")]
    pub l_d: usize,
    /// Total number of wires in the library
    #[serde(rename = "m_D")]
    pub m_d: usize,
    /// Maximum number of constraints per subcircuit
    pub n: usize,
    /// Number of subcircuits in the library
    #[serde(rename = "s_D")]
    pub s_d: usize,
    /// Maximum number of placements in one synthesized circuit
    pub s_max: usize,
    /// Scalar field width; wider data points are split into 128-bit halves
    #[serde(default = "default_field_bits")]
    pub field_bits: u32,
}

fn default_field_bits() -> u32 {
    DEFAULT_FIELD_BITS
}

impl SetupParams {
    /// Validate internal consistency of the counts
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.l_in + self.l_out != self.l {
            return Err(ConfigError::PublicWireMismatch {
                l: self.l,
                l_in: self.l_in,
                l_out: self.l_out,
            });
        }
        if self.l > self.l_d {
            return Err(ConfigError::InterfaceBeforePublic {
                l: self.l,
                l_d: self.l_d,
            });
        }
        if self.l_d > self.m_d {
            return Err(ConfigError::InterfaceBeyondTotal {
                l_d: self.l_d,
                m_d: self.m_d,
            });
        }
        if self.s_max == 0 {
            return Err(ConfigError::ZeroPlacementSlots);
        }
        if self.field_bits < LIMB_BITS || self.field_bits > WORD_BITS {
            return Err(ConfigError::InvalidFieldBits(self.field_bits));
        }
        Ok(())
    }

    /// Number of interface wires (`l_D - l`)
    #[inline]
    pub const fn interface_wires(&self) -> usize {
        self.l_d - self.l
    }

    /// Check whether a global wire id lies in the interface range
    #[inline]
    pub const fn is_interface(&self, global: usize) -> bool {
        global >= self.l && global < self.l_d
    }

    /// Check whether a global wire id is public
    #[inline]
    pub const fn is_public(&self, global: usize) -> bool {
        global < self.l
    }

    /// Number of wires a value of `bit_size` bits occupies after splitting
    #[inline]
    pub const fn wires_for(&self, bit_size: u32) -> usize {
        if bit_size > self.field_bits {
            2
        } else {
            1
        }
    }
}

/// Setup parameter validation errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// `l_in + l_out` must equal `l`
    PublicWireMismatch { l: usize, l_in: usize, l_out: usize },
    /// Public wires must precede the end of the interface range
    InterfaceBeforePublic { l: usize, l_d: usize },
    /// Interface range must lie inside the total wire count
    InterfaceBeyondTotal { l_d: usize, m_d: usize },
    /// At least one placement slot is required
    ZeroPlacementSlots,
    /// Field width must be in range [128, 256]
    InvalidFieldBits(u32),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::PublicWireMismatch { l, l_in, l_out } => {
                write!(f, "l_in ({l_in}) + l_out ({l_out}) must equal l ({l})")
            }
            ConfigError::InterfaceBeforePublic { l, l_d } => {
                write!(f, "l ({l}) must not exceed l_D ({l_d})")
            }
            ConfigError::InterfaceBeyondTotal { l_d, m_d } => {
                write!(f, "l_D ({l_d}) must not exceed m_D ({m_d})")
            }
            ConfigError::ZeroPlacementSlots => {
                write!(f, "s_max must be at least 1")
            }
            ConfigError::InvalidFieldBits(bits) => {
                write!(f, "field_bits must be in range [128, 256], got {bits}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}
