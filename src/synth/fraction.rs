//! Feedback divider decomposition
//!
//! Splits `f_VCO / f_PFD` into the integer word N_INT, the first fractional
//! word FRAC1 over the fixed modulus MOD1 = 2^25, and when the residue of
//! that step is non-zero, a second fraction FRAC2/MOD2.

use super::{div_round_closest, PlanError};
use crate::config::{
    CHANNEL_SPACING_MAX, MOD1, MOD2_MAX, MOD2_MAX_PHASE_RESYNC, N_INT_MAX,
};
use crate::types::Mode;

/// Greatest common divisor (Euclid)
#[must_use]
pub const fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

/// Largest MOD2 word allowed in the current phase-resync state
#[must_use]
pub const fn mod2_limit(phase_resync: bool) -> u32 {
    if phase_resync {
        MOD2_MAX_PHASE_RESYNC
    } else {
        MOD2_MAX
    }
}

/// Result of the MOD2 search
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Mod2Choice {
    /// Channel spacing multiplier that produced the modulus (power of 5)
    pub channel_spacing: u64,
    /// MOD2 word
    pub mod2: u32,
}

/// Search for a second-stage modulus
///
/// Starting from a channel spacing of 1, `MOD2 = ceil(f_PFD / gcd(cs × MOD1,
/// f_PFD))` is tried and `cs` multiplied by 5 while the result is over the
/// limit and `cs` stays below 78125. Exhausting the search is an error.
///
/// Without phase resync the modulus is scaled by `floor(limit / MOD2)` to
/// use as much of the 24-bit range as possible.
pub fn mod2_search(pfd_hz: u64, phase_resync: bool) -> Result<Mod2Choice, PlanError> {
    if pfd_hz == 0 {
        return Err(PlanError::InvalidParameter);
    }

    let limit = u64::from(mod2_limit(phase_resync));
    let mut channel_spacing = 1u64;

    while channel_spacing < CHANNEL_SPACING_MAX {
        let divisor = gcd(channel_spacing * MOD1, pfd_hz);
        let mod2 = pfd_hz.div_ceil(divisor);
        if mod2 <= limit {
            let mod2 = if phase_resync { mod2 } else { mod2 * (limit / mod2) };
            let mod2 = u32::try_from(mod2).map_err(|_| PlanError::InvalidFrequencyPlan)?;
            return Ok(Mod2Choice {
                channel_spacing,
                mod2,
            });
        }
        channel_spacing *= 5;
    }

    warn!("MOD2 search exhausted for PFD {} Hz", pfd_hz);
    Err(PlanError::InvalidFrequencyPlan)
}

/// Divider words for one VCO frequency
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Decomposition {
    /// Integer or fractional loop
    pub mode: Mode,
    /// Integer feedback word
    pub n_int: u16,
    /// First fractional word (0 to MOD1 - 1)
    pub frac1: u32,
    /// Second fractional word (below `mod2`)
    pub frac2: u32,
    /// Second-stage modulus, 0 when FRAC2 is unused
    pub mod2: u32,
}

impl Decomposition {
    /// Split `vco_hz / pfd_hz` into divider words
    ///
    /// N_INT is checked against the minimum for the resulting mode and the
    /// register width.
    pub fn compute(vco_hz: u64, pfd_hz: u64, phase_resync: bool) -> Result<Self, PlanError> {
        if pfd_hz == 0 {
            return Err(PlanError::InvalidParameter);
        }

        let n = vco_hz / pfd_hz;
        let rem = vco_hz % pfd_hz;

        let (frac1, frac2, mod2) = if rem == 0 {
            (0, 0, 0)
        } else {
            // rem < pfd <= 8 GHz, so rem × 2^25 stays well inside u64
            let scaled = rem * MOD1;
            let frac1 = scaled / pfd_hz;
            let r2 = scaled % pfd_hz;
            if r2 == 0 {
                (frac1, 0, 0)
            } else {
                let choice = mod2_search(pfd_hz, phase_resync)?;
                let mod2 = u64::from(choice.mod2);
                let frac2 = div_round_closest(r2 * mod2, pfd_hz).min(mod2 - 1);
                (frac1, frac2, mod2)
            }
        };

        let mode = if frac1 == 0 && frac2 == 0 {
            Mode::Integer
        } else {
            Mode::Fractional
        };

        let n_int = u16::try_from(n).map_err(|_| PlanError::InvalidFrequencyPlan)?;
        if n_int < mode.n_int_min() || n_int > N_INT_MAX {
            warn!("N_INT {} out of range", n_int);
            return Err(PlanError::InvalidFrequencyPlan);
        }

        let to_u32 = |v: u64| u32::try_from(v).map_err(|_| PlanError::InvalidFrequencyPlan);
        Ok(Self {
            mode,
            n_int,
            frac1: to_u32(frac1)?,
            frac2: to_u32(frac2)?,
            mod2: to_u32(mod2)?,
        })
    }

    /// VCO frequency these words produce, truncated to whole Hz
    #[must_use]
    pub fn vco_hz(&self, pfd_hz: u64) -> u64 {
        reconstruct_vco_hz(pfd_hz, self.n_int, self.frac1, self.frac2, self.mod2)
    }
}

/// Rebuild the VCO frequency from divider words
///
/// `f_PFD × (N + (FRAC1 + FRAC2/MOD2) / MOD1)`, with FRAC2 ignored when
/// MOD2 is zero.
#[must_use]
pub fn reconstruct_vco_hz(pfd_hz: u64, n_int: u16, frac1: u32, frac2: u32, mod2: u32) -> u64 {
    let pfd = u128::from(pfd_hz);
    let integer = pfd * u128::from(n_int);
    let fractional = if mod2 == 0 {
        pfd * u128::from(frac1) / u128::from(MOD1)
    } else {
        let mod2 = u128::from(mod2);
        pfd * (u128::from(frac1) * mod2 + u128::from(frac2)) / (u128::from(MOD1) * mod2)
    };
    u64::try_from(integer + fractional).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gcd_basics() {
        assert_eq!(gcd(12, 18), 6);
        assert_eq!(gcd(1 << 25, 100_000_000), 256);
        assert_eq!(gcd(7, 0), 7);
        assert_eq!(gcd(13, 17), 1);
    }

    #[test]
    fn mod2_search_without_resync_scales_up() {
        let choice = mod2_search(100_000_000, false).unwrap();
        assert_eq!(choice.channel_spacing, 1);
        // 390625 × floor(0xFFFFFF / 390625)
        assert_eq!(choice.mod2, 16_406_250);
    }

    #[test]
    fn mod2_search_with_resync_widens_spacing() {
        let choice = mod2_search(100_000_000, true).unwrap();
        assert_eq!(choice.channel_spacing, 5);
        assert_eq!(choice.mod2, 78_125);
        assert!(choice.mod2 <= MOD2_MAX_PHASE_RESYNC);
    }

    #[test]
    fn mod2_search_exhaustion_fails_closed() {
        // 100_000_007 is prime: gcd is always 1 and MOD2 equals the PFD
        assert_eq!(
            mod2_search(100_000_007, false),
            Err(PlanError::InvalidFrequencyPlan)
        );
    }

    #[test]
    fn integer_decomposition() {
        let d = Decomposition::compute(8_000_000_000, 100_000_000, false).unwrap();
        assert_eq!(d.mode, Mode::Integer);
        assert_eq!(d.n_int, 80);
        assert_eq!((d.frac1, d.frac2, d.mod2), (0, 0, 0));
    }

    #[test]
    fn frac1_only_decomposition() {
        // 50 MHz residue is exactly half of MOD1
        let d = Decomposition::compute(10_050_000_000, 100_000_000, false).unwrap();
        assert_eq!(d.mode, Mode::Fractional);
        assert_eq!(d.n_int, 100);
        assert_eq!(d.frac1, 16_777_216);
        assert_eq!((d.frac2, d.mod2), (0, 0));
        assert_eq!(d.vco_hz(100_000_000), 10_050_000_000);
    }

    #[test]
    fn two_stage_decomposition() {
        let d = Decomposition::compute(10_012_345_678, 100_000_000, false).unwrap();
        assert_eq!(d.mode, Mode::Fractional);
        assert_eq!(d.n_int, 100);
        assert_eq!(d.frac1, 4_142_522);
        assert_eq!(d.frac2, 2_123_772);
        assert_eq!(d.mod2, 16_406_250);
        assert!(d.frac2 < d.mod2);
    }

    #[test]
    fn two_stage_with_resync_limit() {
        let d = Decomposition::compute(10_012_345_678, 100_000_000, true).unwrap();
        assert_eq!(d.frac1, 4_142_522);
        assert_eq!(d.frac2, 10_113);
        assert_eq!(d.mod2, 78_125);
    }

    #[test]
    fn n_int_below_fractional_minimum_rejected() {
        // N = 18 with a fractional residue
        assert_eq!(
            Decomposition::compute(6_450_000_000, 350_000_000, false),
            Err(PlanError::InvalidFrequencyPlan)
        );
    }

    #[test]
    fn n_int_below_integer_minimum_rejected() {
        // N = 3, integer
        assert_eq!(
            Decomposition::compute(6_600_000_000, 2_200_000_000, false),
            Err(PlanError::InvalidFrequencyPlan)
        );
    }

    #[test]
    fn unsearchable_pfd_fails_closed() {
        assert_eq!(
            Decomposition::compute(10_012_345_678, 100_000_007, false),
            Err(PlanError::InvalidFrequencyPlan)
        );
    }
}
