//! Shared types used across the synthesizer firmware
//!
//! This module defines domain-specific types that enforce invariants
//! at compile time and provide type safety throughout the codebase.

use core::fmt;

/// Loop operating mode, selected from the frequency decomposition
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Mode {
    /// VCO is an exact multiple of the PFD (no fractional words)
    #[default]
    Integer,
    /// FRAC1 and optionally FRAC2/MOD2 are in use
    Fractional,
}

impl Mode {
    /// Smallest N_INT the chip accepts in this mode
    #[must_use]
    pub const fn n_int_min(self) -> u16 {
        match self {
            Self::Integer => crate::config::N_INT_MIN_INTEGER,
            Self::Fractional => crate::config::N_INT_MIN_FRACTIONAL,
        }
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for Mode {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Integer => defmt::write!(f, "INT"),
            Self::Fractional => defmt::write!(f, "FRAC"),
        }
    }
}

/// Direction of a bleed current or a phase offset
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Polarity {
    /// Positive (register bit clear)
    #[default]
    Positive,
    /// Negative (register bit set)
    Negative,
}

impl Polarity {
    /// The opposite polarity
    #[must_use]
    pub const fn inverted(self) -> Self {
        match self {
            Self::Positive => Self::Negative,
            Self::Negative => Self::Positive,
        }
    }

    /// Register bit value
    #[must_use]
    pub const fn is_negative(self) -> bool {
        matches!(self, Self::Negative)
    }

    /// Build from a register bit
    #[must_use]
    pub const fn from_bit(negative: bool) -> Self {
        if negative {
            Self::Negative
        } else {
            Self::Positive
        }
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for Polarity {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Positive => defmt::write!(f, "+"),
            Self::Negative => defmt::write!(f, "-"),
        }
    }
}

/// Charge pump current setting
///
/// Wraps the 4-bit CP_I register index. The current in µA comes from a
/// fixed table.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChargePump(u8);

impl ChargePump {
    /// Charge pump currents in µA, indexed by the CP_I field
    pub const CURRENT_UA: [u64; 16] = [
        790, 990, 1190, 1380, 1590, 1980, 2390, 2790, 3180, 3970, 4770, 5570, 6330, 7910,
        9510, 11100,
    ];

    /// Create from a register index, returns None if out of range
    #[must_use]
    pub const fn from_index(index: u8) -> Option<Self> {
        if index <= crate::config::CP_INDEX_MAX {
            Some(Self(index))
        } else {
            None
        }
    }

    /// Create from the low four bits of a register value
    #[must_use]
    pub const fn from_reg(value: u8) -> Self {
        Self(value & 0x0F)
    }

    /// Register index
    #[must_use]
    pub const fn index(self) -> u8 {
        self.0
    }

    /// Charge pump current in µA
    #[must_use]
    pub const fn current_ua(self) -> u64 {
        Self::CURRENT_UA[self.0 as usize]
    }
}

impl Default for ChargePump {
    fn default() -> Self {
        Self(crate::config::DEFAULT_CP_INDEX)
    }
}

impl fmt::Debug for ChargePump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChargePump({} uA)", self.current_ua())
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for ChargePump {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{} uA", self.current_ua());
    }
}

/// RF output channel
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputChannel {
    /// CLKOUT1 pair
    Clk1,
    /// CLKOUT2 pair
    Clk2,
}

impl OutputChannel {
    /// Both channels, in register order
    pub const ALL: [Self; 2] = [Self::Clk1, Self::Clk2];

    /// Output power field in register 0x29
    #[must_use]
    pub const fn power_mask(self) -> u8 {
        match self {
            Self::Clk1 => 0x0F,
            Self::Clk2 => 0xF0,
        }
    }

    /// Bit position of the output power field
    #[must_use]
    pub const fn power_shift(self) -> u8 {
        match self {
            Self::Clk1 => 0,
            Self::Clk2 => 4,
        }
    }

    /// Power-down bit in register 0x2B
    #[must_use]
    pub const fn power_down_mask(self) -> u8 {
        match self {
            Self::Clk1 => 0x01,
            Self::Clk2 => 0x02,
        }
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for OutputChannel {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Clk1 => defmt::write!(f, "CLKOUT1"),
            Self::Clk2 => defmt::write!(f, "CLKOUT2"),
        }
    }
}

/// SPI bit order the chip is configured for
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum BitOrder {
    /// Most significant bit first (power-on default)
    #[default]
    MsbFirst,
    /// Least significant bit first
    LsbFirst,
}

#[cfg(feature = "embedded")]
impl defmt::Format for BitOrder {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::MsbFirst => defmt::write!(f, "MSB-first"),
            Self::LsbFirst => defmt::write!(f, "LSB-first"),
        }
    }
}

/// Requested phase offset in femtoseconds with a sign
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct PhaseOffset {
    /// Magnitude in femtoseconds
    pub femtoseconds: u32,
    /// Direction of the shift
    pub polarity: Polarity,
}

impl PhaseOffset {
    /// Create a phase offset
    #[must_use]
    pub const fn new(femtoseconds: u32, polarity: Polarity) -> Self {
        Self {
            femtoseconds,
            polarity,
        }
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for PhaseOffset {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{}{} fs", self.polarity, self.femtoseconds);
    }
}
