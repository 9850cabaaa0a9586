//! Bleed current calibration
//!
//! In fractional mode a constant bleed current linearizes the charge pump.
//! The current is programmed as a 13-bit word: 4 coarse bits over 9 fine
//! bits, where one coarse step equals 512 fine steps of 395 nA.
//!
//! The word is kept as one signed integer in fine-step units. Adding or
//! subtracting fine steps carries into the coarse field automatically, and
//! values outside `0..=0x1FFF` can be represented while a phase nudge is
//! being planned.

use crate::config::{
    BLEED_N_INT_THRESHOLD, BLEED_PFD_THRESHOLD_HZ, BLEED_WORD_MAX, FINE_BLEED_NA,
    FINE_BLEED_STEPS,
};
use crate::types::{ChargePump, Polarity};

/// Picoseconds per second
const PS_PER_S: u64 = 1_000_000_000_000;

/// Bleed current word in fine-step units
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
pub struct BleedWord(i32);

impl BleedWord {
    /// No bleed current
    pub const ZERO: Self = Self(0);

    /// Largest programmable word
    pub const MAX: Self = Self(BLEED_WORD_MAX);

    /// Wrap a raw value (may be out of register range)
    #[must_use]
    pub const fn from_raw(raw: i32) -> Self {
        Self(raw)
    }

    /// Build from coarse and fine fields
    #[must_use]
    pub const fn from_parts(coarse: i32, fine: u16) -> Self {
        Self(coarse * FINE_BLEED_STEPS + fine as i32)
    }

    /// Raw value in fine steps
    #[must_use]
    pub const fn raw(self) -> i32 {
        self.0
    }

    /// Coarse field (floor division by 512)
    #[must_use]
    pub const fn coarse(self) -> i32 {
        self.0 >> 9
    }

    /// Fine field, always in `0..=511`
    #[must_use]
    pub const fn fine(self) -> u16 {
        (self.0 & 0x1FF) as u16
    }

    /// True when the word fits the register
    #[must_use]
    pub const fn is_programmable(self) -> bool {
        self.0 >= 0 && self.0 <= BLEED_WORD_MAX
    }

    /// Shift by a signed number of fine steps
    #[must_use]
    pub const fn offset(self, fine_steps: i32) -> Self {
        Self(self.0.saturating_add(fine_steps))
    }

    /// Clamp into the programmable range
    #[must_use]
    pub const fn saturated(self) -> Self {
        if self.0 < 0 {
            Self::ZERO
        } else if self.0 > BLEED_WORD_MAX {
            Self::MAX
        } else {
            self
        }
    }

    /// Register bytes: `(0x1D fine LSB, 0x1E BLEED_MSB field)`
    ///
    /// The word is saturated first.
    #[must_use]
    pub const fn to_registers(self) -> (u8, u8) {
        let word = self.saturated().0;
        ((word & 0xFF) as u8, ((word >> 8) & 0x1F) as u8)
    }

    /// Rebuild from the 0x1D byte and the BLEED_MSB field of 0x1E
    #[must_use]
    pub const fn from_registers(lsb: u8, msb: u8) -> Self {
        Self((((msb & 0x1F) as i32) << 8) | lsb as i32)
    }

    /// Bleed current in nA
    #[must_use]
    pub const fn current_na(self) -> u64 {
        self.saturated().0 as u64 * FINE_BLEED_NA
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for BleedWord {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "bleed {}:{}", self.coarse(), self.fine());
    }
}

/// Bleed pulse width and direction for one operating point
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BleedTiming {
    /// Equivalent bleed time in ps
    pub t_bleed_ps: u64,
    /// Current direction
    pub polarity: Polarity,
}

/// Calibrated bleed setting
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BleedCalibration {
    /// Bleed word to program
    pub word: BleedWord,
    /// Bleed polarity
    pub polarity: Polarity,
}

/// Look up the bleed time and polarity
///
/// Two tables split at a 120 MHz PFD. The lower-PFD table also depends on
/// whether N_INT is under 35.
#[must_use]
pub const fn bleed_timing(pfd_hz: u64, rfout_hz: u64, n_int: u16) -> BleedTiming {
    const fn timing(t_bleed_ps: u64, polarity: Polarity) -> BleedTiming {
        BleedTiming {
            t_bleed_ps,
            polarity,
        }
    }

    let low_n = n_int < BLEED_N_INT_THRESHOLD;
    let low_n_pol = if low_n {
        Polarity::Negative
    } else {
        Polarity::Positive
    };

    if pfd_hz >= BLEED_PFD_THRESHOLD_HZ {
        if rfout_hz > 4_200_000_000 {
            timing(390, Polarity::Positive)
        } else if rfout_hz > 3_000_000_000 {
            timing(900, Polarity::Positive)
        } else if rfout_hz > 1_800_000_000 {
            timing(1200, Polarity::Positive)
        } else {
            timing(1400, Polarity::Positive)
        }
    } else if rfout_hz > 4_200_000_000 {
        timing(390, Polarity::Positive)
    } else if rfout_hz > 3_000_000_000 {
        if low_n {
            timing(900, Polarity::Positive)
        } else {
            timing(1200, Polarity::Negative)
        }
    } else if rfout_hz > 1_800_000_000 {
        timing(1200, low_n_pol)
    } else if rfout_hz > 1_200_000_000 {
        timing(1400, low_n_pol)
    } else if low_n {
        timing(2000, Polarity::Negative)
    } else {
        timing(1400, Polarity::Positive)
    }
}

/// Bleed current in nA: `ceil(t_ps × f_PFD × I_CP(µA) / 1e9)`
#[must_use]
pub const fn bleed_current_na(t_bleed_ps: u64, pfd_hz: u64, cp: ChargePump) -> u64 {
    // ps × Hz × µA / 1e12 = µA·s/s; × 1e3 for nA
    (t_bleed_ps * pfd_hz * cp.current_ua()).div_ceil(PS_PER_S / 1000)
}

/// Calibrate the bleed word for a fractional-mode operating point
///
/// The word is `ceil(I_bleed / 395 nA)`, saturated at 0x1FFF.
#[must_use]
pub fn calibrate(pfd_hz: u64, rfout_hz: u64, n_int: u16, cp: ChargePump) -> BleedCalibration {
    let timing = bleed_timing(pfd_hz, rfout_hz, n_int);
    let current = bleed_current_na(timing.t_bleed_ps, pfd_hz, cp);
    let steps = current.div_ceil(FINE_BLEED_NA);

    let word = match i32::try_from(steps) {
        Ok(raw) if raw <= BLEED_WORD_MAX => BleedWord::from_raw(raw),
        _ => {
            warn!("bleed current {} nA saturates the bleed word", current);
            BleedWord::MAX
        }
    };

    debug!(
        "bleed t={} ps, {} nA, coarse {} fine {}",
        timing.t_bleed_ps,
        current,
        word.coarse(),
        word.fine()
    );

    BleedCalibration {
        word,
        polarity: timing.polarity,
    }
}

/// Charge delta for a phase shift, in nA
///
/// `(I_CP(µA) × f_PFD / 1e6) × phase_fs / 1e6`
#[must_use]
pub const fn phase_delta_na(cp: ChargePump, pfd_hz: u64, phase_fs: u64) -> u64 {
    cp.current_ua() * pfd_hz / 1_000_000 * phase_fs / 1_000_000
}

/// Magnitude of a phase shift in fine bleed steps (truncated)
#[must_use]
pub const fn phase_delta_steps(cp: ChargePump, pfd_hz: u64, phase_fs: u64) -> u64 {
    phase_delta_na(cp, pfd_hz, phase_fs) / FINE_BLEED_NA
}

/// Signed bleed word change for a phase shift with the given bleed polarity
///
/// A negative bleed polarity lowers the word.
#[must_use]
pub fn phase_delta(cp: ChargePump, pfd_hz: u64, phase_fs: u64, bleed_polarity: Polarity) -> i32 {
    let steps = i32::try_from(phase_delta_steps(cp, pfd_hz, phase_fs)).unwrap_or(i32::MAX);
    match bleed_polarity {
        Polarity::Positive => steps,
        Polarity::Negative => -steps,
    }
}
