//! Lock-detect window selection (LDWIN_PW)

use super::bleed::BleedWord;
use crate::types::ChargePump;

/// Largest bleed ratio that still allows the narrowest integer-mode window
const INTEGER_BLEED_RATIO_MAX: u64 = 85;

/// Window code for fractional mode
///
/// Chosen by PFD band. Above 200 MHz the 5.0 - 6.4 GHz output range gets a
/// wider window than the rest.
#[must_use]
pub const fn fractional(pfd_hz: u64, rfout_hz: u64) -> u8 {
    if pfd_hz <= 40_000_000 {
        7
    } else if pfd_hz <= 50_000_000 {
        6
    } else if pfd_hz <= 100_000_000 {
        5
    } else if pfd_hz <= 200_000_000 {
        4
    } else if rfout_hz >= 5_000_000_000 && rfout_hz < 6_400_000_000 {
        3
    } else {
        2
    }
}

/// Window code for integer mode
///
/// Zero unless a bleed current has been forced on, in which case the window
/// widens to 1 when `ceil(word / (ceil(f_PFD / 1 MHz) × I_CP(µA)))` exceeds
/// 85.
///
/// With a 13-bit word and at least 790 µA per PFD megahertz the ratio never
/// gets past 11, so for in-range inputs the result is always 0. Only a zero
/// PFD reaches the wide window.
#[must_use]
pub const fn integer(forced_bleed: Option<BleedWord>, pfd_hz: u64, cp: ChargePump) -> u8 {
    let Some(word) = forced_bleed else {
        return 0;
    };
    let per_step = pfd_hz.div_ceil(1_000_000) * cp.current_ua();
    if per_step == 0 {
        return 1;
    }
    let word = if word.raw() > 0 { word.raw() as u64 } else { 0 };
    for_bleed_ratio(word.div_ceil(per_step))
}

/// Integer-mode window code for a given bleed ratio
#[must_use]
pub const fn for_bleed_ratio(ratio: u64) -> u8 {
    if ratio <= INTEGER_BLEED_RATIO_MAX {
        0
    } else {
        1
    }
}
