//! Synthesis Pipeline Tests
//!
//! Frequency plans across the output range: divider selection, divider
//! word decomposition, MOD2 search and bleed calibration.
//! Run with: cargo test --target x86_64-unknown-linux-gnu --no-default-features --features std --test synth_tests

use rf_synth_firmware::config::*;
use rf_synth_firmware::synth::fraction::{mod2_search, reconstruct_vco_hz};
use rf_synth_firmware::synth::plan::{output_frequency_hz, PlanInputs};
use rf_synth_firmware::synth::{
    bleed, lock_window, Decomposition, FrequencyPlan, PlanError, Reference, VcoBand,
};
use rf_synth_firmware::types::{ChargePump, Mode, Polarity};

/// PFDs seen with common reference oscillators
const PFDS: [u64; 6] = [
    50_000_000,
    61_440_000,
    100_000_000,
    122_880_000,
    200_000_000,
    245_760_000,
];

fn inputs(reference: Reference, rfout_hz: u64, phase_resync: bool) -> PlanInputs {
    PlanInputs {
        reference,
        rfout_hz,
        charge_pump: ChargePump::default(),
        phase_resync,
    }
}

fn sweep() -> impl Iterator<Item = u64> {
    (RFOUT_MIN_HZ..=RFOUT_MAX_HZ).step_by(97_531_111)
}

// =============================================================================
// Reference and PFD Tests
// =============================================================================

#[test]
fn test_pfd_from_reference() {
    assert_eq!(Reference::default().pfd_hz(), Ok(100_000_000));
    assert_eq!(Reference::new(245_760_000, 2, true).pfd_hz(), Ok(245_760_000));
    assert_eq!(
        Reference::new(9_999_999, 1, false).pfd_hz(),
        Err(PlanError::InvalidParameter)
    );
    assert_eq!(
        Reference::new(100_000_000, 0, false).pfd_hz(),
        Err(PlanError::InvalidParameter)
    );
}

// =============================================================================
// Output Divider Tests
// =============================================================================

#[test]
fn test_divider_keeps_vco_in_band() {
    for rfout in sweep() {
        let divider = VcoBand::ADF4368.select(rfout).unwrap();
        assert!(divider.vco_hz >= VCO_MIN_HZ && divider.vco_hz <= VCO_MAX_HZ);
        assert_eq!(divider.vco_hz, rfout * divider.ratio());
        // smallest exponent wins
        if divider.exponent > 0 {
            assert!(rfout << (divider.exponent - 1) < VCO_MIN_HZ);
        }
    }
}

#[test]
fn test_divider_band_edges() {
    assert_eq!(VcoBand::ADF4368.select(RFOUT_MAX_HZ).unwrap().exponent, 0);
    assert_eq!(VcoBand::ADF4368.select(VCO_MIN_HZ).unwrap().exponent, 0);
    assert_eq!(VcoBand::ADF4368.select(VCO_MIN_HZ - 1).unwrap().exponent, 1);
    assert_eq!(VcoBand::ADF4368.select(RFOUT_MIN_HZ).unwrap().exponent, 3);
}

#[test]
fn test_divider_custom_band() {
    let band = VcoBand {
        min_hz: 4_000_000_000,
        max_hz: 8_000_000_000,
        max_exponent: 4,
    };

    let top = band.select(8_000_000_000).unwrap();
    assert_eq!(top.exponent, 0);
    assert_eq!(top.vco_hz, 8_000_000_000);

    let divided = band.select(1_000_000_000).unwrap();
    assert_eq!(divided.exponent, 2);
    assert_eq!(divided.vco_hz, 4_000_000_000);

    // above the band, and too low for a divide by 16
    assert_eq!(band.select(8_000_000_001), Err(PlanError::NoValidDivider));
    assert_eq!(band.select(200_000_000), Err(PlanError::NoValidDivider));
}

// =============================================================================
// Decomposition Tests
// =============================================================================

#[test]
fn test_round_trip_across_range() {
    for pfd in PFDS {
        let reference = Reference::new(pfd, 1, false);
        for phase_resync in [false, true] {
            for rfout in sweep() {
                let plan = FrequencyPlan::compute(&inputs(reference, rfout, phase_resync))
                    .unwrap_or_else(|e| panic!("{} Hz at PFD {}: {:?}", rfout, pfd, e));
                let achieved = plan.achieved_output_hz();
                assert!(
                    achieved.abs_diff(rfout) <= 1,
                    "{} Hz at PFD {} gave {}",
                    rfout,
                    pfd,
                    achieved
                );
            }
        }
    }
}

#[test]
fn test_words_within_register_limits() {
    for pfd in PFDS {
        for phase_resync in [false, true] {
            for rfout in sweep() {
                let plan =
                    FrequencyPlan::compute(&inputs(Reference::new(pfd, 1, false), rfout, phase_resync))
                        .unwrap();
                let words = plan.words;

                assert!(u64::from(words.frac1) < MOD1);
                assert!(words.n_int >= words.mode.n_int_min() && words.n_int <= N_INT_MAX);
                if words.mod2 == 0 {
                    assert_eq!(words.frac2, 0);
                } else {
                    assert!(words.frac2 < words.mod2);
                    assert!(words.mod2 <= if phase_resync { MOD2_MAX_PHASE_RESYNC } else { MOD2_MAX });
                }
                assert_eq!(words.mode == Mode::Integer, words.frac1 == 0 && words.frac2 == 0);
            }
        }
    }
}

#[test]
fn test_integer_multiples_need_no_fraction() {
    for n in [64u64, 80, 100, 128] {
        let words = Decomposition::compute(n * 100_000_000, 100_000_000, false).unwrap();
        assert_eq!(words.mode, Mode::Integer);
        assert_eq!(u64::from(words.n_int), n);
        assert_eq!(words.mod2, 0);
    }
}

#[test]
fn test_fractional_minimum_n() {
    // N = 18 with a fraction is below the fractional minimum
    assert_eq!(
        Decomposition::compute(6_450_000_000, 350_000_000, false),
        Err(PlanError::InvalidFrequencyPlan)
    );
    // the same N is fine in integer mode
    let words = Decomposition::compute(6_300_000_000, 350_000_000, false).unwrap();
    assert_eq!(words.mode, Mode::Integer);
    assert_eq!(words.n_int, 18);
}

#[test]
fn test_reconstruct_matches_read_back() {
    let plan = FrequencyPlan::compute(&inputs(Reference::default(), 10_012_345_678, false)).unwrap();
    let w = plan.words;

    assert_eq!(
        reconstruct_vco_hz(plan.pfd_hz, w.n_int, w.frac1, w.frac2, w.mod2),
        plan.vco_hz
    );
    assert_eq!(
        output_frequency_hz(plan.pfd_hz, &w, plan.output_divider_exponent),
        10_012_345_678
    );
}

// =============================================================================
// MOD2 Search Tests
// =============================================================================

#[test]
fn test_mod2_search_terminates() {
    for pfd in (10_000_000..=4_000_000_000u64).step_by(7_654_321) {
        for phase_resync in [false, true] {
            match mod2_search(pfd, phase_resync) {
                Ok(choice) => {
                    assert!(choice.mod2 > 0);
                    assert!(choice.channel_spacing < CHANNEL_SPACING_MAX);
                }
                Err(e) => assert_eq!(e, PlanError::InvalidFrequencyPlan),
            }
        }
    }
}

#[test]
fn test_mod2_search_resync_limit() {
    let free = mod2_search(100_000_000, false).unwrap();
    let resync = mod2_search(100_000_000, true).unwrap();

    assert_eq!(resync.mod2, 78_125);
    assert_eq!(free.mod2, 16_406_250);
    assert_eq!(free.mod2 % resync.mod2, 0);
}

#[test]
fn test_mod2_search_prime_pfd_fails() {
    assert_eq!(
        mod2_search(100_000_007, false),
        Err(PlanError::InvalidFrequencyPlan)
    );
}

// =============================================================================
// Bleed and Lock Window Tests
// =============================================================================

#[test]
fn test_fractional_plans_carry_bleed() {
    for rfout in sweep() {
        let plan = FrequencyPlan::compute(&inputs(Reference::default(), rfout, false)).unwrap();
        match plan.mode() {
            Mode::Fractional => {
                assert!(plan.bleed_enabled);
                assert!(plan.bleed.is_programmable());
                assert!(plan.bleed.raw() > 0);
                assert_eq!(plan.lock_window, 5);
            }
            Mode::Integer => {
                assert!(!plan.bleed_enabled);
                assert_eq!(plan.lock_window, 0);
            }
        }
    }
}

#[test]
fn test_bleed_scales_with_charge_pump() {
    let low = bleed::calibrate(100_000_000, 10_000_000_000, 100, ChargePump::from_index(0).unwrap());
    let high = bleed::calibrate(100_000_000, 10_000_000_000, 100, ChargePump::from_index(15).unwrap());

    assert!(low.word < high.word);
    assert_eq!(low.polarity, Polarity::Positive);
}

#[test]
fn test_bleed_saturates() {
    // 4 GHz PFD with the largest current overflows the word
    let cal = bleed::calibrate(4_000_000_000, 1_000_000_000, 20, ChargePump::from_index(15).unwrap());
    assert_eq!(cal.word.raw(), BLEED_WORD_MAX);
}

#[test]
fn test_lock_window_narrows_with_pfd() {
    let mut last = u8::MAX;
    for pfd in [20_000_000, 45_000_000, 80_000_000, 150_000_000, 300_000_000] {
        let window = lock_window::fractional(pfd, 10_000_000_000);
        assert!(window <= last);
        last = window;
    }
    assert_eq!(lock_window::fractional(300_000_000, 5_500_000_000), 3);
}

// =============================================================================
// Plan Failure Tests
// =============================================================================

#[test]
fn test_plan_rejects_bad_inputs() {
    let reference = Reference::default();
    assert_eq!(
        FrequencyPlan::compute(&inputs(reference, RFOUT_MIN_HZ - 1, false)),
        Err(PlanError::InvalidParameter)
    );
    assert_eq!(
        FrequencyPlan::compute(&inputs(Reference::new(5_000_000, 1, false), 8_000_000_000, false)),
        Err(PlanError::InvalidParameter)
    );
    assert_eq!(
        FrequencyPlan::compute(&inputs(Reference::new(100_000_007, 1, false), 10_012_345_678, false)),
        Err(PlanError::InvalidFrequencyPlan)
    );
}

#[test]
fn test_plan_is_deterministic() {
    let a = FrequencyPlan::compute(&inputs(Reference::default(), 7_777_777_777, false)).unwrap();
    let b = FrequencyPlan::compute(&inputs(Reference::default(), 7_777_777_777, false)).unwrap();
    assert_eq!(a, b);
}
