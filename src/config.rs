//! System configuration and hardware constants
//!
//! Compile-time constants for the ADF4368 synthesizer and the board it sits on.
//! Chip limits, synthesis constants, timings and the bring-up register table
//! are centralized here.

/// Minimum RF output frequency (800 MHz)
pub const RFOUT_MIN_HZ: u64 = 800_000_000;

/// Maximum RF output frequency (12.8 GHz)
pub const RFOUT_MAX_HZ: u64 = 12_800_000_000;

/// Minimum VCO frequency (6.4 GHz)
pub const VCO_MIN_HZ: u64 = 6_400_000_000;

/// Maximum VCO frequency (12.8 GHz)
pub const VCO_MAX_HZ: u64 = 12_800_000_000;

/// Largest CLKOUT_DIV register value (divide by 2^4 = 16)
pub const CLKOUT_DIV_MAX: u8 = 4;

/// Minimum reference input frequency (10 MHz)
pub const REF_MIN_HZ: u64 = 10_000_000;

/// Maximum reference input frequency (4 GHz)
pub const REF_MAX_HZ: u64 = 4_000_000_000;

/// Largest reference divider (R_DIV is 6 bits)
pub const REF_DIV_MAX: u8 = 63;

/// Largest charge pump register index
pub const CP_INDEX_MAX: u8 = 15;

/// Largest output power register value
pub const OUT_POWER_MAX: u8 = 15;

/// First-stage fractional modulus (fixed by hardware)
pub const MOD1: u64 = 1 << 25;

/// Largest MOD2 word without phase resync (24 bits)
pub const MOD2_MAX: u32 = 0x00FF_FFFF;

/// Largest MOD2 word with phase resync enabled
pub const MOD2_MAX_PHASE_RESYNC: u32 = 0x0001_FFFF;

/// Channel spacing bound for the MOD2 search (5^7)
pub const CHANNEL_SPACING_MAX: u64 = 78_125;

/// Minimum N_INT in integer mode
pub const N_INT_MIN_INTEGER: u16 = 4;

/// Minimum N_INT in fractional mode
pub const N_INT_MIN_FRACTIONAL: u16 = 19;

/// Largest N_INT the register pair can hold (12 bits)
pub const N_INT_MAX: u16 = 0x0FFF;

/// N_INT threshold used by the bleed table and the sync delay selection
pub const BLEED_N_INT_THRESHOLD: u16 = 35;

/// PFD frequency splitting the two bleed lookup tables
pub const BLEED_PFD_THRESHOLD_HZ: u64 = 120_000_000;

/// Fine bleed step in nA
pub const FINE_BLEED_NA: u64 = 395;

/// Fine bleed steps per coarse step (9-bit fine field)
pub const FINE_BLEED_STEPS: i32 = 512;

/// Largest bleed word (4 coarse bits + 9 fine bits)
pub const BLEED_WORD_MAX: i32 = 0x1FFF;

/// Sigma-delta phase adjust scale (register LSB per MHz·fs, times 1e9)
pub const SIGMA_DELTA_PHASE_SCALE: u64 = 512;

/// PFD ceiling for DCLK_DIV1 = 0 (divide by 1)
pub const DCLK_DIV1_0_MAX_HZ: u64 = 160_000_000;

/// PFD ceiling for DCLK_DIV1 = 1 (divide by 2)
pub const DCLK_DIV1_1_MAX_HZ: u64 = 320_000_000;

/// Target ADC clock used when deriving ADC_CLK_DIV
pub const ADC_CLK_TARGET_HZ: u64 = 400_000;

/// Delay after soft reset before the SPI port is usable
pub const POR_DELAY_US: u32 = 200;

/// Settle time between the auto-calibration trigger and the first lock poll
pub const LOCK_SETTLE_MS: u32 = 1;

/// Number of lock-detect polls before giving up
pub const LOCK_POLL_ATTEMPTS: u32 = 10;

/// Interval between lock-detect polls
pub const LOCK_POLL_INTERVAL_US: u32 = 100;

/// Value written to and read back from the scratchpad at bring-up
pub const SCRATCHPAD_TEST: u8 = 0x5A;

/// Default reference frequency (100 MHz)
pub const DEFAULT_REF_HZ: u64 = 100_000_000;

/// Default output frequency (10 GHz)
pub const DEFAULT_RFOUT_HZ: u64 = 10_000_000_000;

/// Default reference divider
pub const DEFAULT_REF_DIV: u8 = 1;

/// Default charge pump index (9.51 mA)
pub const DEFAULT_CP_INDEX: u8 = 14;

/// Default lock-detect count field
pub const DEFAULT_LD_COUNT: u8 = 0x0C;

/// Output power applied to both channels at bring-up
pub const DEFAULT_OUT_POWER: u8 = 9;

/// SPI bus frequency for the synthesizer
pub const SPI_FREQUENCY_HZ: u32 = 10_000_000;

/// Register address range covered by a register dump
pub const REG_DUMP_LEN: usize = 0x63;

/// Register defaults written once at bring-up, highest address first
pub const DEFAULT_REGISTERS: [(u16, u8); 68] = [
    (0x054, 0x00),
    (0x053, 0x25),
    (0x052, 0x00),
    (0x051, 0x00),
    (0x050, 0x00),
    (0x04f, 0x00),
    (0x04e, 0x10),
    (0x04d, 0x00),
    (0x04c, 0x2B),
    (0x04b, 0x5D),
    (0x04a, 0x00),
    (0x048, 0x00),
    (0x047, 0x00),
    (0x046, 0x00),
    (0x045, 0x08),
    (0x044, 0x18),
    (0x043, 0x09),
    (0x042, 0x09),
    (0x041, 0x00),
    (0x040, 0x00),
    (0x03f, 0x83),
    (0x03e, 0x26),
    (0x03d, 0xC0),
    (0x03c, 0x00),
    (0x03b, 0x8C),
    (0x03a, 0x00),
    (0x039, 0xB0),
    (0x038, 0x00),
    (0x037, 0x3E),
    (0x036, 0xD6),
    (0x035, 0x04),
    (0x034, 0x99),
    (0x033, 0x32),
    (0x032, 0xD3),
    (0x031, 0x69),
    (0x030, 0x1B),
    (0x02f, 0xA7),
    (0x02e, 0x00),
    (0x02d, 0xF1),
    (0x02c, 0x4C),
    (0x02b, 0x03),
    (0x02a, 0x10),
    (0x029, 0xDD),
    (0x028, 0x20),
    (0x027, 0x28),
    (0x026, 0x80),
    (0x025, 0x00),
    (0x024, 0x00),
    (0x023, 0x80),
    (0x022, 0x00),
    (0x021, 0x09),
    (0x020, 0xC1),
    (0x01f, 0x1E),
    (0x01e, 0x28),
    (0x01d, 0xDD),
    (0x01c, 0xFF),
    (0x01b, 0xFF),
    (0x01a, 0xFF),
    (0x019, 0x55),
    (0x018, 0x55),
    (0x017, 0x55),
    (0x016, 0x00),
    (0x015, 0x00),
    (0x014, 0x43),
    (0x013, 0x55),
    (0x012, 0x55),
    (0x011, 0x00),
    (0x010, 0x2B),
];

/// Pin assignments for GPIO
pub mod pins {
    //! GPIO pin assignments matching the schematic

    /// Status LED (directly on MCU)
    pub const LED_STATUS: &str = "PA5";

    /// SPI2 SCK (ADF4368)
    pub const SPI2_SCK: &str = "PB13";

    /// SPI2 MISO (ADF4368 MUXOUT/SDO)
    pub const SPI2_MISO: &str = "PB14";

    /// SPI2 MOSI (ADF4368 SDIO)
    pub const SPI2_MOSI: &str = "PB15";

    /// ADF4368 chip select (active low)
    pub const SYNTH_CS: &str = "PB12";
}
