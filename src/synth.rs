//! Frequency and Phase Synthesis Math
//!
//! Pure, host-testable calculations for the ADF4368 fractional-N loop.
//! Nothing here touches the bus: the driver computes a [`plan::FrequencyPlan`]
//! first and only then starts writing registers.
//!
//! # Theory of Operation
//!
//! The loop locks a 6.4 - 12.8 GHz VCO to the phase/frequency detector:
//!
//! ```text
//! f_VCO = f_PFD × (N_INT + (FRAC1 + FRAC2/MOD2) / MOD1)     MOD1 = 2^25
//! f_OUT = f_VCO / 2^k                                        k = 0..=4
//! ```
//!
//! The pipeline is reference → PFD → output divider → decomposition
//! (N_INT, FRAC1, FRAC2/MOD2) → bleed current and lock-detect window.

pub mod bleed;
pub mod divider;
pub mod fraction;
pub mod lock_window;
pub mod pfd;
pub mod phase;
pub mod plan;

pub use bleed::BleedWord;
pub use divider::{OutputDivider, VcoBand};
pub use fraction::Decomposition;
pub use pfd::Reference;
pub use plan::FrequencyPlan;

/// Planning failure, reported before any register is touched
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlanError {
    /// An input lies outside the range the chip supports
    InvalidParameter,
    /// No power-of-two output divider puts the VCO in band
    NoValidDivider,
    /// The divider words cannot represent the target (N_INT range or MOD2 search)
    InvalidFrequencyPlan,
}

#[cfg(feature = "embedded")]
impl defmt::Format for PlanError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::InvalidParameter => defmt::write!(f, "invalid parameter"),
            Self::NoValidDivider => defmt::write!(f, "no valid output divider"),
            Self::InvalidFrequencyPlan => defmt::write!(f, "invalid frequency plan"),
        }
    }
}

/// Integer division rounding to the nearest value, halves up
#[must_use]
pub(crate) const fn div_round_closest(num: u64, den: u64) -> u64 {
    (num + den / 2) / den
}
