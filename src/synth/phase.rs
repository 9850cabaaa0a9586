//! Phase adjustment planning
//!
//! Two mechanisms shift the output phase:
//!
//! - **Bleed nudge** (integer mode): the bleed word is offset by the charge a
//!   phase shift corresponds to. When the result leaves the programmable
//!   range, one full RF period is folded in the opposite direction.
//! - **Sigma-delta** (fractional mode): an 8-bit phase word
//!   `round(f_OUT(MHz) × phase_fs × 512 / 1e9)`, positive shifts only.

use super::bleed::{phase_delta, BleedWord};
use super::PlanError;
use crate::config::SIGMA_DELTA_PHASE_SCALE;
use crate::types::{ChargePump, PhaseOffset, Polarity};

/// Femtoseconds per microsecond
const FS_PER_US: u64 = 1_000_000_000;

/// Hz per MHz
const HZ_PER_MHZ: u64 = 1_000_000;

/// RF output period in fs, `1e9 / f_OUT(MHz)`
#[must_use]
pub const fn rf_period_fs(rfout_hz: u64) -> u64 {
    let mhz = rfout_hz / HZ_PER_MHZ;
    if mhz == 0 {
        return u64::MAX;
    }
    FS_PER_US / mhz
}

/// Operating point a bleed nudge is planned against
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NudgeContext {
    /// Bleed word currently programmed
    pub current: BleedWord,
    /// Charge pump setting
    pub charge_pump: ChargePump,
    /// PFD frequency in Hz
    pub pfd_hz: u64,
    /// Output frequency in Hz
    pub rfout_hz: u64,
}

/// Compute the bleed word that realizes a phase shift
///
/// The bleed polarity is the inverse of the phase polarity. Shifts longer
/// than one RF period are rejected, and so is any word that stays outside
/// `0..=0x1FFF` after folding.
pub fn plan_bleed_nudge(ctx: &NudgeContext, phase: PhaseOffset) -> Result<BleedWord, PlanError> {
    let period_fs = rf_period_fs(ctx.rfout_hz);
    if u64::from(phase.femtoseconds) > period_fs {
        warn!("phase {} fs exceeds one RF period ({} fs)", phase.femtoseconds, period_fs);
        return Err(PlanError::InvalidParameter);
    }

    let bleed_polarity = phase.polarity.inverted();
    let delta = phase_delta(
        ctx.charge_pump,
        ctx.pfd_hz,
        u64::from(phase.femtoseconds),
        bleed_polarity,
    );
    let mut word = ctx.current.offset(delta);

    if !word.is_programmable() {
        let fold_polarity = if word.raw() < 0 {
            Polarity::Positive
        } else {
            Polarity::Negative
        };
        let fold = phase_delta(ctx.charge_pump, ctx.pfd_hz, period_fs, fold_polarity);
        debug!("bleed word {} out of range, folding {}", word.raw(), fold);
        word = word.offset(fold);
    }

    if word.is_programmable() {
        Ok(word)
    } else {
        Err(PlanError::InvalidParameter)
    }
}

/// Sigma-delta phase register value
///
/// Only positive shifts are supported. Values past 255 are clamped.
pub fn sigma_delta_word(rfout_hz: u64, phase: PhaseOffset) -> Result<u8, PlanError> {
    if phase.polarity == Polarity::Negative {
        return Err(PlanError::InvalidParameter);
    }

    let mhz = rfout_hz / HZ_PER_MHZ;
    let scaled = mhz * u64::from(phase.femtoseconds) * SIGMA_DELTA_PHASE_SCALE;
    let value = super::div_round_closest(scaled, FS_PER_US);

    Ok(u8::try_from(value).unwrap_or_else(|_| {
        warn!("sigma-delta phase word {} clamped to 255", value);
        u8::MAX
    }))
}

/// Phase represented by one sigma-delta LSB, in fs (truncated)
#[must_use]
pub const fn sigma_delta_fs_per_lsb(rfout_hz: u64) -> u64 {
    let per = (rfout_hz / HZ_PER_MHZ) * SIGMA_DELTA_PHASE_SCALE;
    if per == 0 {
        return 0;
    }
    FS_PER_US / per
}

/// Phase in fs read back from a sigma-delta register value
#[must_use]
pub const fn sigma_delta_phase_fs(rfout_hz: u64, word: u8) -> u64 {
    sigma_delta_fs_per_lsb(rfout_hz) * word as u64
}
