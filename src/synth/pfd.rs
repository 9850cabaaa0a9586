//! Reference path and PFD frequency

use super::{div_round_closest, PlanError};
use crate::config::{REF_DIV_MAX, REF_MAX_HZ, REF_MIN_HZ};

/// Reference input configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Reference {
    /// Reference input frequency in Hz
    pub frequency_hz: u64,
    /// R divider (1-63)
    pub divider: u8,
    /// Reference doubler in the path
    pub doubler: bool,
}

impl Reference {
    /// Create a reference configuration without validating it
    #[must_use]
    pub const fn new(frequency_hz: u64, divider: u8, doubler: bool) -> Self {
        Self {
            frequency_hz,
            divider,
            doubler,
        }
    }

    /// Check the frequency and divider against the chip limits
    pub const fn validate(&self) -> Result<(), PlanError> {
        if self.frequency_hz < REF_MIN_HZ || self.frequency_hz > REF_MAX_HZ {
            return Err(PlanError::InvalidParameter);
        }
        if self.divider == 0 || self.divider > REF_DIV_MAX {
            return Err(PlanError::InvalidParameter);
        }
        Ok(())
    }

    /// PFD frequency in Hz
    ///
    /// `round(f_REF / R) × (2 if doubler)`. Fails for an out-of-range
    /// reference or divider.
    pub const fn pfd_hz(&self) -> Result<u64, PlanError> {
        if let Err(e) = self.validate() {
            return Err(e);
        }
        let pfd = div_round_closest(self.frequency_hz, self.divider as u64);
        Ok(if self.doubler { pfd * 2 } else { pfd })
    }
}

impl Default for Reference {
    fn default() -> Self {
        Self::new(
            crate::config::DEFAULT_REF_HZ,
            crate::config::DEFAULT_REF_DIV,
            false,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pfd_plain_and_doubled() {
        assert_eq!(Reference::new(100_000_000, 1, false).pfd_hz(), Ok(100_000_000));
        assert_eq!(Reference::new(100_000_000, 1, true).pfd_hz(), Ok(200_000_000));
        assert_eq!(Reference::new(122_880_000, 4, false).pfd_hz(), Ok(30_720_000));
    }

    #[test]
    fn pfd_rounds_to_closest() {
        // 100 MHz / 3 = 33.333... MHz
        assert_eq!(Reference::new(100_000_000, 3, false).pfd_hz(), Ok(33_333_333));
        // 10 MHz + 1 Hz / 2 rounds the half up
        assert_eq!(Reference::new(10_000_001, 2, false).pfd_hz(), Ok(5_000_001));
    }

    #[test]
    fn out_of_range_reference_rejected() {
        assert_eq!(
            Reference::new(9_999_999, 1, false).pfd_hz(),
            Err(PlanError::InvalidParameter)
        );
        assert_eq!(
            Reference::new(4_000_000_001, 1, false).pfd_hz(),
            Err(PlanError::InvalidParameter)
        );
        assert_eq!(
            Reference::new(100_000_000, 0, false).pfd_hz(),
            Err(PlanError::InvalidParameter)
        );
        assert_eq!(
            Reference::new(100_000_000, 64, false).pfd_hz(),
            Err(PlanError::InvalidParameter)
        );
    }

    #[test]
    fn pfd_is_deterministic() {
        let reference = Reference::new(245_760_000, 7, true);
        assert_eq!(reference.pfd_hz(), reference.pfd_hz());
    }
}
