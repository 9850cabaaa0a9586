//! Complete frequency plan
//!
//! Runs the whole pipeline for one target: PFD, output divider, divider
//! words, bleed calibration, lock-detect window and the helper clock
//! dividers. The driver writes a plan only after it has been fully computed.

use super::bleed::{self, BleedWord};
use super::divider::{OutputDivider, VcoBand};
use super::fraction::{reconstruct_vco_hz, Decomposition};
use super::lock_window;
use super::pfd::Reference;
use super::PlanError;
use crate::config::{
    ADC_CLK_TARGET_HZ, BLEED_N_INT_THRESHOLD, DCLK_DIV1_0_MAX_HZ, DCLK_DIV1_1_MAX_HZ,
    RFOUT_MAX_HZ, RFOUT_MIN_HZ,
};
use crate::types::{ChargePump, Mode, Polarity};

/// Inputs that fully determine a plan
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlanInputs {
    /// Reference path
    pub reference: Reference,
    /// Target output frequency in Hz
    pub rfout_hz: u64,
    /// Charge pump setting
    pub charge_pump: ChargePump,
    /// Phase resync currently enabled on the chip (limits MOD2)
    pub phase_resync: bool,
}

/// Digital clock divider settings derived from the PFD
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HelperClocks {
    /// DCLK_DIV1 field (0, 1 or 2)
    pub dclk_div1: u8,
    /// ADC_CLK_DIV register
    pub adc_clk_div: u8,
}

impl HelperClocks {
    /// Derive from the PFD frequency
    #[must_use]
    pub fn for_pfd(pfd_hz: u64) -> Self {
        let (dclk_div1, ratio) = if pfd_hz <= DCLK_DIV1_0_MAX_HZ {
            (0, 1)
        } else if pfd_hz <= DCLK_DIV1_1_MAX_HZ {
            (1, 2)
        } else {
            (2, 8)
        };
        let adc = (pfd_hz / (ratio * ADC_CLK_TARGET_HZ))
            .saturating_sub(2)
            .div_ceil(4)
            .min(u64::from(u8::MAX));
        Self {
            dclk_div1,
            adc_clk_div: u8::try_from(adc).unwrap_or(u8::MAX),
        }
    }
}

/// Every register value needed to tune to one frequency
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrequencyPlan {
    /// PFD frequency in Hz
    pub pfd_hz: u64,
    /// Target output frequency in Hz
    pub rfout_hz: u64,
    /// VCO frequency in Hz
    pub vco_hz: u64,
    /// CLKOUT_DIV exponent
    pub output_divider_exponent: u8,
    /// Divider words and mode
    pub words: Decomposition,
    /// Bleed word (zero in integer mode)
    pub bleed: BleedWord,
    /// Bleed polarity
    pub bleed_polarity: Polarity,
    /// Bleed current enabled
    pub bleed_enabled: bool,
    /// LDWIN_PW code
    pub lock_window: u8,
    /// Digital clock dividers
    pub clocks: HelperClocks,
}

impl FrequencyPlan {
    /// Compute the plan for `inputs`
    ///
    /// Fails without side effects when any stage cannot be satisfied.
    pub fn compute(inputs: &PlanInputs) -> Result<Self, PlanError> {
        if inputs.rfout_hz < RFOUT_MIN_HZ || inputs.rfout_hz > RFOUT_MAX_HZ {
            return Err(PlanError::InvalidParameter);
        }

        let pfd_hz = inputs.reference.pfd_hz()?;
        let divider = VcoBand::ADF4368.select(inputs.rfout_hz)?;
        let words = Decomposition::compute(divider.vco_hz, pfd_hz, inputs.phase_resync)?;
        Ok(Self::assemble(inputs, pfd_hz, divider, words))
    }

    /// Adds the bleed calibration, lock window and helper clocks
    fn assemble(
        inputs: &PlanInputs,
        pfd_hz: u64,
        divider: OutputDivider,
        words: Decomposition,
    ) -> Self {
        let (bleed, bleed_polarity, bleed_enabled, lock_window) = match words.mode {
            Mode::Fractional => {
                let cal = bleed::calibrate(pfd_hz, inputs.rfout_hz, words.n_int, inputs.charge_pump);
                (
                    cal.word,
                    cal.polarity,
                    true,
                    lock_window::fractional(pfd_hz, inputs.rfout_hz),
                )
            }
            Mode::Integer => (
                BleedWord::ZERO,
                Polarity::Positive,
                false,
                lock_window::integer(None, pfd_hz, inputs.charge_pump),
            ),
        };

        Self {
            pfd_hz,
            rfout_hz: inputs.rfout_hz,
            vco_hz: divider.vco_hz,
            output_divider_exponent: divider.exponent,
            words,
            bleed,
            bleed_polarity,
            bleed_enabled,
            lock_window,
            clocks: HelperClocks::for_pfd(pfd_hz),
        }
    }

    /// Keep a bleed current that was forced on in integer mode
    ///
    /// The lock window is recomputed for the plan's PFD and `charge_pump`.
    /// Fractional plans carry their own calibrated bleed and are returned
    /// unchanged.
    #[must_use]
    pub fn with_forced_bleed(mut self, word: BleedWord, charge_pump: ChargePump) -> Self {
        if let Mode::Integer = self.words.mode {
            self.bleed = word;
            self.bleed_enabled = true;
            self.lock_window = lock_window::integer(Some(word), self.pfd_hz, charge_pump);
        }
        self
    }

    /// Operating mode
    #[must_use]
    pub const fn mode(&self) -> Mode {
        self.words.mode
    }

    /// Variable modulus in use (FRAC2 non-zero)
    #[must_use]
    pub const fn variable_modulus(&self) -> bool {
        self.words.frac2 != 0
    }

    /// Output frequency the programmed words actually produce
    #[must_use]
    pub fn achieved_output_hz(&self) -> u64 {
        self.words.vco_hz(self.pfd_hz) >> self.output_divider_exponent
    }
}

/// Digital delay code for reference-timed sync
///
/// 3 at 200 MHz PFD and above, 4 from 175 MHz, 7 below. Slow PFDs with a
/// large N_INT need no delay.
#[must_use]
pub const fn sync_delay(pfd_hz: u64, n_int: u16) -> u8 {
    if pfd_hz < 70_000_000 && n_int >= BLEED_N_INT_THRESHOLD {
        0
    } else if pfd_hz >= 200_000_000 {
        3
    } else if pfd_hz >= 175_000_000 {
        4
    } else {
        7
    }
}

/// Output frequency from read-back divider words
#[must_use]
pub fn output_frequency_hz(
    pfd_hz: u64,
    words: &Decomposition,
    output_divider_exponent: u8,
) -> u64 {
    reconstruct_vco_hz(pfd_hz, words.n_int, words.frac1, words.frac2, words.mod2)
        >> output_divider_exponent
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(rfout_hz: u64) -> PlanInputs {
        PlanInputs {
            reference: Reference::new(100_000_000, 1, false),
            rfout_hz,
            charge_pump: ChargePump::from_index(14).unwrap(),
            phase_resync: false,
        }
    }

    #[test]
    fn integer_plan() {
        let plan = FrequencyPlan::compute(&inputs(8_000_000_000)).unwrap();
        assert_eq!(plan.mode(), Mode::Integer);
        assert_eq!(plan.words.n_int, 80);
        assert_eq!(plan.bleed, BleedWord::ZERO);
        assert!(!plan.bleed_enabled);
        assert_eq!(plan.lock_window, 0);
        assert_eq!(plan.achieved_output_hz(), 8_000_000_000);
    }

    #[test]
    fn forced_bleed_kept_in_integer_mode() {
        let cp = ChargePump::from_index(14).unwrap();
        let plan = FrequencyPlan::compute(&inputs(8_000_000_000))
            .unwrap()
            .with_forced_bleed(BleedWord::from_raw(2), cp);
        assert!(plan.bleed_enabled);
        assert_eq!(plan.bleed.raw(), 2);
        assert_eq!(plan.lock_window, 0);
        assert_eq!(plan.words.n_int, 80);

        let frac = FrequencyPlan::compute(&inputs(10_012_345_678)).unwrap();
        assert_eq!(frac.with_forced_bleed(BleedWord::from_raw(2), cp), frac);
    }

    #[test]
    fn fractional_plan() {
        let plan = FrequencyPlan::compute(&inputs(10_012_345_678)).unwrap();
        assert_eq!(plan.mode(), Mode::Fractional);
        assert!(plan.variable_modulus());
        assert!(plan.bleed_enabled);
        assert_eq!(plan.bleed.raw(), 939);
        assert_eq!(plan.lock_window, 5);
        assert_eq!(plan.achieved_output_hz(), 10_012_345_678);
    }

    #[test]
    fn divided_output_plan() {
        let plan = FrequencyPlan::compute(&inputs(1_000_000_123)).unwrap();
        assert_eq!(plan.output_divider_exponent, 3);
        assert_eq!(plan.vco_hz, 8_000_000_984);
        assert_eq!(plan.words.n_int, 80);
        assert_eq!(plan.words.frac1, 330);
        assert_eq!(plan.achieved_output_hz(), 1_000_000_123);
    }

    #[test]
    fn helper_clock_dividers() {
        assert_eq!(
            HelperClocks::for_pfd(100_000_000),
            HelperClocks { dclk_div1: 0, adc_clk_div: 62 }
        );
        assert_eq!(HelperClocks::for_pfd(250_000_000).dclk_div1, 1);
        assert_eq!(HelperClocks::for_pfd(500_000_000).dclk_div1, 2);
        // below 800 kHz the subtraction floors at zero
        assert_eq!(HelperClocks::for_pfd(500_000).adc_clk_div, 0);
        // 4 GHz / 8 / 400 kHz = 1250 -> 312
        assert_eq!(HelperClocks::for_pfd(4_000_000_000).adc_clk_div, 255);
    }

    #[test]
    fn sync_delays() {
        assert_eq!(sync_delay(250_000_000, 40), 3);
        assert_eq!(sync_delay(200_000_000, 40), 3);
        assert_eq!(sync_delay(180_000_000, 40), 4);
        assert_eq!(sync_delay(100_000_000, 80), 7);
        assert_eq!(sync_delay(50_000_000, 34), 7);
        assert_eq!(sync_delay(50_000_000, 35), 0);
    }

    #[test]
    fn out_of_range_output_rejected() {
        assert_eq!(
            FrequencyPlan::compute(&inputs(799_999_999)),
            Err(PlanError::InvalidParameter)
        );
        assert_eq!(
            FrequencyPlan::compute(&inputs(12_800_000_001)),
            Err(PlanError::InvalidParameter)
        );
    }
}
