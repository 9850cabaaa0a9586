//! VCO band and output divider selection

use super::PlanError;
use crate::config::{CLKOUT_DIV_MAX, VCO_MAX_HZ, VCO_MIN_HZ};

/// VCO tuning range and the largest output divider exponent
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VcoBand {
    /// Lowest VCO frequency in Hz
    pub min_hz: u64,
    /// Highest VCO frequency in Hz
    pub max_hz: u64,
    /// Largest CLKOUT_DIV exponent (divide by 2^k)
    pub max_exponent: u8,
}

impl VcoBand {
    /// ADF4368 VCO band: 6.4 - 12.8 GHz, divide by 1 to 16
    pub const ADF4368: Self = Self {
        min_hz: VCO_MIN_HZ,
        max_hz: VCO_MAX_HZ,
        max_exponent: CLKOUT_DIV_MAX,
    };

    /// Check a frequency against the band
    #[must_use]
    pub const fn contains(&self, hz: u64) -> bool {
        hz >= self.min_hz && hz <= self.max_hz
    }

    /// Find the smallest exponent `k` with `f_out × 2^k` in band
    pub fn select(&self, rfout_hz: u64) -> Result<OutputDivider, PlanError> {
        (0..=self.max_exponent)
            .find_map(|exponent| {
                let vco_hz = rfout_hz.checked_mul(1 << exponent)?;
                self.contains(vco_hz)
                    .then_some(OutputDivider { exponent, vco_hz })
            })
            .ok_or(PlanError::NoValidDivider)
    }
}

impl Default for VcoBand {
    fn default() -> Self {
        Self::ADF4368
    }
}

/// Selected output divider and resulting VCO frequency
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OutputDivider {
    /// CLKOUT_DIV register value
    pub exponent: u8,
    /// VCO frequency in Hz
    pub vco_hz: u64,
}

impl OutputDivider {
    /// Division ratio (2^exponent)
    #[must_use]
    pub const fn ratio(&self) -> u64 {
        1 << self.exponent
    }
}
