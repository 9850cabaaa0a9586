//! ADF4368 Wideband Synthesizer Driver
//!
//! Tunes the ADF4368 fractional-N PLL (800 MHz - 12.8 GHz) and adjusts the
//! output phase.
//!
//! A frequency change runs the pure planning pipeline in [`crate::synth`]
//! first and only writes registers once every stage has succeeded. The
//! divider words are double buffered: nothing takes effect until the N_INT
//! LSB register is written, which also starts VCO auto-calibration. During a
//! commit that write is issued only by the private latch step, after which
//! the lock detector is polled.
//!
//! # Phase adjustment
//!
//! - Integer mode shifts phase by nudging the bleed current.
//! - Fractional mode uses the sigma-delta phase word (positive shifts only).
//!
//! [`Adf4368::set_phase`] picks the mechanism from the chip's INT_MODE bit.

use crate::config::{
    DEFAULT_REGISTERS, LOCK_POLL_ATTEMPTS, LOCK_POLL_INTERVAL_US, LOCK_SETTLE_MS,
    OUT_POWER_MAX, POR_DELAY_US, REG_DUMP_LEN, SCRATCHPAD_TEST,
};
use crate::hal::spi::RegisterBus;
use crate::synth::fraction::Decomposition;
use crate::synth::phase::{self, NudgeContext};
use crate::synth::plan::{self, FrequencyPlan, PlanInputs};
use crate::synth::{lock_window, BleedWord, PlanError, Reference};
use crate::types::{BitOrder, ChargePump, Mode, OutputChannel, PhaseOffset, Polarity};
use embedded_hal::delay::DelayNs;
use embedded_hal::spi::SpiDevice;

/// ADF4368 register addresses
mod reg {
    pub const SPI_CONFIG: u16 = 0x00;
    pub const SCRATCHPAD: u16 = 0x0A;
    pub const N_INT_LSB: u16 = 0x10;
    pub const N_INT_MSB: u16 = 0x11;
    pub const FRAC1_LSB: u16 = 0x12;
    pub const FRAC1_MID: u16 = 0x13;
    pub const FRAC1_HI: u16 = 0x14;
    pub const FRAC1_MSB: u16 = 0x15;
    pub const FRAC2_LSB: u16 = 0x17;
    pub const FRAC2_MID: u16 = 0x18;
    pub const FRAC2_MSB: u16 = 0x19;
    pub const MOD2_LSB: u16 = 0x1A;
    pub const MOD2_MID: u16 = 0x1B;
    pub const MOD2_MSB: u16 = 0x1C;
    pub const BLEED_LSB: u16 = 0x1D;
    pub const SYNC_BLEED: u16 = 0x1E;
    pub const CP_BLEED: u16 = 0x1F;
    pub const REF_CONFIG: u16 = 0x20;
    pub const PHASE_WORD: u16 = 0x24;
    pub const VAR_MOD: u16 = 0x28;
    pub const OUT_POWER: u16 = 0x29;
    pub const SYNC_POWER: u16 = 0x2A;
    pub const CLKOUT_POWER: u16 = 0x2B;
    pub const LOCK_DETECT: u16 = 0x2C;
    pub const DIGITAL_CLOCKS: u16 = 0x2D;
    pub const DELAYS: u16 = 0x30;
    pub const SYNC_DELAY: u16 = 0x31;
    pub const DCLK_CONFIG: u16 = 0x35;
    pub const CMOS_OUT: u16 = 0x3D;
    pub const ADC_CLK_DIV: u16 = 0x3E;
    pub const DCLK_DIV: u16 = 0x4E;
    pub const SYNC_SELECT: u16 = 0x53;
    pub const ADC_CONTROL: u16 = 0x54;
    pub const LOCK_STATUS: u16 = 0x58;
    pub const TEMP_LSB: u16 = 0x5B;
    pub const TEMP_MSB: u16 = 0x5C;
}

/// Register field masks
mod bits {
    // SPI_CONFIG
    pub const SOFT_RESET: u8 = 0x81;
    pub const SDO_ACTIVE: u8 = 0x18;
    pub const LSB_FIRST: u8 = 0x42;

    // N_INT_MSB
    pub const INT_MODE: u8 = 0x80;
    pub const CLKOUT_DIV: u8 = 0x70;
    pub const N_INT_HI: u8 = 0x0F;

    // FRAC1_MSB
    pub const FRAC1_BIT24: u8 = 0x01;

    // SYNC_BLEED
    pub const EN_PHASE_RESYNC: u8 = 0x80;
    pub const EN_REF_RST: u8 = 0x40;
    pub const TIMED_SYNC: u8 = 0x20;
    pub const BLEED_MSB: u8 = 0x1F;

    // CP_BLEED
    pub const SW_SYNC: u8 = 0x80;
    pub const PHASE_ADJ: u8 = 0x40;
    pub const EN_BLEED: u8 = 0x20;
    pub const BLEED_POL: u8 = 0x10;
    pub const CP_I: u8 = 0x0F;

    // REF_CONFIG
    pub const EN_RDBLR: u8 = 0x40;
    pub const R_DIV: u8 = 0x3F;

    pub const VAR_MOD_EN: u8 = 0x20;
    pub const PD_SYNC: u8 = 0x20;

    // LOCK_DETECT
    pub const LDWIN_PW: u8 = 0xE0;
    pub const LD_COUNT: u8 = 0x1F;

    pub const EN_DRCLK: u8 = 0x08;

    // DELAYS
    pub const DRCLK_DEL: u8 = 0x38;
    pub const DNCLK_DEL: u8 = 0x07;

    pub const SYNC_DEL: u8 = 0x70;
    pub const EN_ADC_CLK: u8 = 0x01;
    pub const DCLK_MODE: u8 = 0x04;
    pub const CMOS_OV: u8 = 0x01;
    pub const DCLK_DIV1: u8 = 0xC0;
    pub const SYNC_SEL: u8 = 0x02;
    pub const ADC_ST_CNV: u8 = 0x01;
    pub const LOCKED: u8 = 0x01;
    pub const TEMP_SIGN: u8 = 0x01;
}

/// Driver error
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Error<E> {
    /// A parameter is outside the range the chip supports
    InvalidParameter,
    /// No output divider places the VCO in band
    NoValidDivider,
    /// The target cannot be expressed with the divider words
    InvalidFrequencyPlan,
    /// Operation requires the other loop mode
    InvalidModeForOperation,
    /// SPI transfer failed
    Bus(E),
    /// Lock detect did not assert within the poll budget
    NotLocked,
    /// Scratchpad read back a different value at bring-up
    ScratchpadMismatch(u8),
}

impl<E> From<PlanError> for Error<E> {
    fn from(e: PlanError) -> Self {
        match e {
            PlanError::InvalidParameter => Self::InvalidParameter,
            PlanError::NoValidDivider => Self::NoValidDivider,
            PlanError::InvalidFrequencyPlan => Self::InvalidFrequencyPlan,
        }
    }
}

#[cfg(feature = "embedded")]
impl<E> defmt::Format for Error<E> {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::InvalidParameter => defmt::write!(f, "invalid parameter"),
            Self::NoValidDivider => defmt::write!(f, "no valid output divider"),
            Self::InvalidFrequencyPlan => defmt::write!(f, "invalid frequency plan"),
            Self::InvalidModeForOperation => defmt::write!(f, "wrong mode for operation"),
            Self::Bus(_) => defmt::write!(f, "SPI bus error"),
            Self::NotLocked => defmt::write!(f, "PLL not locked"),
            Self::ScratchpadMismatch(v) => defmt::write!(f, "scratchpad read 0x{:02X}", v),
        }
    }
}

/// Driver result
pub type SynthResult<T, E> = Result<T, Error<E>>;

/// Progress of the last frequency change
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CommitStage {
    /// Nothing attempted yet
    #[default]
    Idle,
    /// Reference divider and doubler written
    RefConfigured,
    /// Output divider chosen
    DividerSelected,
    /// Divider words computed
    DecompositionDone,
    /// Bleed word and lock window computed
    BleedAndWindowSet,
    /// Registers are being written
    Committing,
    /// Lock detect asserted
    Locked,
    /// Lock detect never asserted
    TimedOut,
    /// Planning or a bus transfer failed
    Failed,
}

#[cfg(feature = "embedded")]
impl defmt::Format for CommitStage {
    fn format(&self, f: defmt::Formatter) {
        let name = match self {
            Self::Idle => "idle",
            Self::RefConfigured => "ref configured",
            Self::DividerSelected => "divider selected",
            Self::DecompositionDone => "decomposition done",
            Self::BleedAndWindowSet => "bleed/window set",
            Self::Committing => "committing",
            Self::Locked => "locked",
            Self::TimedOut => "timed out",
            Self::Failed => "failed",
        };
        defmt::write!(f, "{=str}", name);
    }
}

/// Bring-up configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Adf4368Config {
    /// Reference path
    pub reference: Reference,
    /// Output frequency tuned at bring-up
    pub rfout_hz: u64,
    /// Charge pump current
    pub charge_pump: ChargePump,
    /// Lock-detect count field
    pub lock_detect_count: u8,
    /// Drive SDO (4-wire SPI)
    pub spi_4wire: bool,
    /// 3.3 V CMOS output levels on MUXOUT
    pub cmos_3v3: bool,
    /// SPI bit order to switch to after reset
    pub bit_order: BitOrder,
    /// Output power applied to both channels
    pub output_power: u8,
}

impl Default for Adf4368Config {
    fn default() -> Self {
        Self {
            reference: Reference::default(),
            rfout_hz: crate::config::DEFAULT_RFOUT_HZ,
            charge_pump: ChargePump::default(),
            lock_detect_count: crate::config::DEFAULT_LD_COUNT,
            spi_4wire: true,
            cmos_3v3: false,
            bit_order: BitOrder::MsbFirst,
            output_power: crate::config::DEFAULT_OUT_POWER,
        }
    }
}

/// Everything the driver knows about the programmed loop
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct SynthesizerState {
    /// Reference path
    pub reference: Reference,
    /// Requested output frequency in Hz
    pub rfout_hz: u64,
    /// PFD frequency in Hz
    pub pfd_hz: u64,
    /// VCO frequency in Hz
    pub vco_hz: u64,
    /// CLKOUT_DIV exponent
    pub output_divider_exponent: u8,
    /// Charge pump current
    pub charge_pump: ChargePump,
    /// Loop mode
    pub mode: Mode,
    /// Integer feedback word
    pub n_int: u16,
    /// First fractional word
    pub frac1: u32,
    /// Second fractional word
    pub frac2: u32,
    /// Second modulus (0 when unused)
    pub mod2: u32,
    /// Programmed bleed word
    pub bleed: BleedWord,
    /// Bleed polarity
    pub bleed_polarity: Polarity,
    /// Last requested phase offset
    pub phase: PhaseOffset,
    /// LDWIN_PW code
    pub lock_window: u8,
    /// LD_COUNT field
    pub lock_detect_count: u8,
    /// Lock detect asserted after the last commit
    pub locked: bool,
}

/// Divider words written and waiting for the N_INT LSB latch
///
/// Only [`Adf4368::staged_commit`] creates one and only [`Adf4368::latch`]
/// consumes it.
#[must_use]
struct StagedCommit {
    n_int: u16,
}

/// What a retune does with the bleed current of an integer-mode plan
///
/// Fractional plans always use their calibrated bleed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RetainBleed {
    /// Use the freshly computed plan as is
    Recalibrate,
    /// Keep the bleed word already forced on
    Keep,
}

/// ADF4368 driver
pub struct Adf4368<SPI, D> {
    bus: RegisterBus<SPI>,
    delay: D,
    config: Adf4368Config,
    state: SynthesizerState,
    stage: CommitStage,
}

impl<SPI, D> Adf4368<SPI, D>
where
    SPI: SpiDevice<u8>,
    D: DelayNs,
{
    /// Create a driver; the chip is not touched until [`Self::init`]
    pub fn new(spi: SPI, delay: D, config: Adf4368Config) -> Self {
        let state = SynthesizerState {
            reference: config.reference,
            rfout_hz: config.rfout_hz,
            pfd_hz: config.reference.pfd_hz().unwrap_or(0),
            charge_pump: config.charge_pump,
            lock_detect_count: config.lock_detect_count,
            ..SynthesizerState::default()
        };
        Self {
            bus: RegisterBus::new(spi, BitOrder::MsbFirst),
            delay,
            config,
            state,
            stage: CommitStage::Idle,
        }
    }

    /// Bring the chip up
    ///
    /// Soft reset, SPI configuration, default registers, scratchpad check,
    /// MUXOUT level, initial frequency, both outputs on at the configured
    /// power.
    pub fn init(&mut self) -> SynthResult<(), SPI::Error> {
        self.write_default_registers()?;

        self.write(reg::SCRATCHPAD, SCRATCHPAD_TEST)?;
        let scratch = self.read(reg::SCRATCHPAD)?;
        if scratch != SCRATCHPAD_TEST {
            error!("scratchpad mismatch: 0x{:02X}", scratch);
            return Err(Error::ScratchpadMismatch(scratch));
        }

        self.set_bits(reg::CMOS_OUT, bits::CMOS_OV, self.config.cmos_3v3)?;

        self.set_output_frequency(self.config.rfout_hz)?;

        for channel in OutputChannel::ALL {
            self.set_channel_enabled(channel, true)?;
            self.set_output_power(channel, self.config.output_power)?;
        }

        info!("ADF4368 ready at {} Hz", self.state.rfout_hz);
        Ok(())
    }

    /// Soft reset, SPI setup and the default register table
    fn write_default_registers(&mut self) -> SynthResult<(), SPI::Error> {
        self.write(reg::SPI_CONFIG, bits::SOFT_RESET)?;
        // reset returns the port to MSB-first
        self.bus.set_bit_order(BitOrder::MsbFirst);
        self.delay.delay_us(POR_DELAY_US);

        let mut spi_config = 0;
        if self.config.spi_4wire {
            spi_config |= bits::SDO_ACTIVE;
        }
        if self.config.bit_order == BitOrder::LsbFirst {
            spi_config |= bits::LSB_FIRST;
        }
        self.write(reg::SPI_CONFIG, spi_config)?;
        self.bus.set_bit_order(self.config.bit_order);

        for &(addr, value) in &DEFAULT_REGISTERS {
            self.write(addr, value)?;
        }
        debug!("{} default registers written", DEFAULT_REGISTERS.len());
        Ok(())
    }

    /// Tune to `rfout_hz`
    ///
    /// Runs the full pipeline with the current reference and charge pump.
    /// Out-of-range targets are rejected before any register is written.
    pub fn set_output_frequency(&mut self, rfout_hz: u64) -> SynthResult<(), SPI::Error> {
        self.retune(
            self.state.reference,
            rfout_hz,
            self.state.charge_pump,
            RetainBleed::Recalibrate,
        )
    }

    /// Change the reference input frequency and retune
    pub fn set_reference_frequency(&mut self, hz: u64) -> SynthResult<(), SPI::Error> {
        let reference = Reference {
            frequency_hz: hz,
            ..self.state.reference
        };
        self.retune(
            reference,
            self.state.rfout_hz,
            self.state.charge_pump,
            RetainBleed::Recalibrate,
        )
    }

    /// Reference frequency in Hz
    #[must_use]
    pub const fn reference_frequency(&self) -> u64 {
        self.state.reference.frequency_hz
    }

    /// Change the R divider (1-63) and retune
    pub fn set_reference_divider(&mut self, divider: u8) -> SynthResult<(), SPI::Error> {
        let reference = Reference {
            divider,
            ..self.state.reference
        };
        self.retune(
            reference,
            self.state.rfout_hz,
            self.state.charge_pump,
            RetainBleed::Recalibrate,
        )
    }

    /// R divider as programmed on the chip
    pub fn reference_divider(&mut self) -> SynthResult<u8, SPI::Error> {
        self.read_field(reg::REF_CONFIG, bits::R_DIV)
    }

    /// Enable or disable the reference doubler and retune
    pub fn set_reference_doubler(&mut self, enabled: bool) -> SynthResult<(), SPI::Error> {
        let reference = Reference {
            doubler: enabled,
            ..self.state.reference
        };
        self.retune(
            reference,
            self.state.rfout_hz,
            self.state.charge_pump,
            RetainBleed::Recalibrate,
        )
    }

    /// Reference doubler state as programmed on the chip
    pub fn reference_doubler(&mut self) -> SynthResult<bool, SPI::Error> {
        Ok(self.read(reg::REF_CONFIG)? & bits::EN_RDBLR != 0)
    }

    /// Select the charge pump current (index 0-15) and retune
    ///
    /// A bleed current forced on in integer mode (by a phase nudge or
    /// [`Self::set_bleed_word`]) stays on, with the lock window recomputed
    /// for the new current.
    pub fn set_charge_pump(&mut self, index: u8) -> SynthResult<(), SPI::Error> {
        let cp = ChargePump::from_index(index).ok_or(Error::InvalidParameter)?;
        let retain = if self.read(reg::CP_BLEED)? & bits::EN_BLEED != 0 {
            RetainBleed::Keep
        } else {
            RetainBleed::Recalibrate
        };
        self.retune(self.state.reference, self.state.rfout_hz, cp, retain)
    }

    /// Charge pump setting as programmed on the chip
    pub fn charge_pump(&mut self) -> SynthResult<ChargePump, SPI::Error> {
        Ok(ChargePump::from_reg(self.read(reg::CP_BLEED)?))
    }

    /// Run the synthesis pipeline and commit the result
    fn retune(
        &mut self,
        reference: Reference,
        rfout_hz: u64,
        charge_pump: ChargePump,
        retain: RetainBleed,
    ) -> SynthResult<(), SPI::Error> {
        let result = self.try_retune(reference, rfout_hz, charge_pump, retain);
        if let Err(e) = &result {
            self.stage = match e {
                Error::NotLocked => CommitStage::TimedOut,
                _ => CommitStage::Failed,
            };
            warn!("retune to {} Hz failed: {}", rfout_hz, e);
        }
        result
    }

    fn try_retune(
        &mut self,
        reference: Reference,
        rfout_hz: u64,
        charge_pump: ChargePump,
        retain: RetainBleed,
    ) -> SynthResult<(), SPI::Error> {
        self.stage = CommitStage::Idle;
        self.state.locked = false;

        let phase_resync = self.read(reg::SYNC_BLEED)? & bits::EN_PHASE_RESYNC != 0;
        let mut plan = FrequencyPlan::compute(&PlanInputs {
            reference,
            rfout_hz,
            charge_pump,
            phase_resync,
        })?;
        if retain == RetainBleed::Keep {
            plan = plan.with_forced_bleed(self.state.bleed, charge_pump);
        }
        debug!(
            "plan: pfd {} vco {} k {} N {} F1 {} F2 {} M2 {}",
            plan.pfd_hz,
            plan.vco_hz,
            plan.output_divider_exponent,
            plan.words.n_int,
            plan.words.frac1,
            plan.words.frac2,
            plan.words.mod2
        );

        let ref_bits = (if reference.doubler { bits::EN_RDBLR } else { 0 })
            | (reference.divider & bits::R_DIV);
        self.update_bits(reg::REF_CONFIG, bits::EN_RDBLR | bits::R_DIV, ref_bits)?;
        for stage in [
            CommitStage::RefConfigured,
            CommitStage::DividerSelected,
            CommitStage::DecompositionDone,
            CommitStage::BleedAndWindowSet,
            CommitStage::Committing,
        ] {
            self.advance(stage);
        }
        self.state.reference = reference;
        self.state.rfout_hz = rfout_hz;
        self.state.charge_pump = charge_pump;
        self.write_plan(&plan)?;
        self.record_plan(&plan);

        let staged = self.staged_commit();
        self.latch(staged)?;
        self.wait_for_lock()
    }

    fn advance(&mut self, stage: CommitStage) {
        trace!("stage {}", stage);
        self.stage = stage;
    }

    /// Write every register of `plan` except the N_INT LSB
    fn write_plan(&mut self, plan: &FrequencyPlan) -> SynthResult<(), SPI::Error> {
        let words = plan.words;

        self.write_field(reg::CP_BLEED, bits::CP_I, self.state.charge_pump.index())?;

        if plan.mode() == Mode::Fractional {
            self.set_bits(reg::CP_BLEED, bits::BLEED_POL, plan.bleed_polarity.is_negative())?;
            self.write_bleed_word(plan.bleed)?;
        }

        self.set_bits(reg::VAR_MOD, bits::VAR_MOD_EN, plan.variable_modulus())?;
        self.set_bits(reg::N_INT_MSB, bits::INT_MODE, plan.mode() == Mode::Integer)?;
        self.set_bits(reg::CP_BLEED, bits::EN_BLEED, plan.bleed_enabled)?;

        let [m0, m1, m2, _] = words.mod2.to_le_bytes();
        self.write(reg::MOD2_LSB, m0)?;
        self.write(reg::MOD2_MID, m1)?;
        self.write(reg::MOD2_MSB, m2)?;

        let [f0, f1, f2, _] = words.frac2.to_le_bytes();
        self.write(reg::FRAC2_LSB, f0)?;
        self.write(reg::FRAC2_MID, f1)?;
        self.write(reg::FRAC2_MSB, f2)?;

        let [g0, g1, g2, g3] = words.frac1.to_le_bytes();
        self.write(reg::FRAC1_LSB, g0)?;
        self.write(reg::FRAC1_MID, g1)?;
        self.write(reg::FRAC1_HI, g2)?;
        self.update_bits(reg::FRAC1_MSB, bits::FRAC1_BIT24, g3)?;

        self.write_field(reg::DCLK_DIV, bits::DCLK_DIV1, plan.clocks.dclk_div1)?;
        self.set_bits(reg::DCLK_CONFIG, bits::DCLK_MODE, true)?;
        self.set_bits(reg::DCLK_CONFIG, bits::EN_ADC_CLK, true)?;
        self.write(reg::ADC_CLK_DIV, plan.clocks.adc_clk_div)?;

        self.write_field(reg::LOCK_DETECT, bits::LD_COUNT, self.state.lock_detect_count)?;
        self.write_field(reg::LOCK_DETECT, bits::LDWIN_PW, plan.lock_window)?;

        self.write_field(reg::N_INT_MSB, bits::CLKOUT_DIV, plan.output_divider_exponent)?;
        let [_, n_hi] = words.n_int.to_le_bytes();
        self.update_bits(reg::N_INT_MSB, bits::N_INT_HI, n_hi)
    }

    fn record_plan(&mut self, plan: &FrequencyPlan) {
        let state = &mut self.state;
        state.pfd_hz = plan.pfd_hz;
        state.vco_hz = plan.vco_hz;
        state.output_divider_exponent = plan.output_divider_exponent;
        state.mode = plan.mode();
        state.n_int = plan.words.n_int;
        state.frac1 = plan.words.frac1;
        state.frac2 = plan.words.frac2;
        state.mod2 = plan.words.mod2;
        state.bleed = plan.bleed;
        state.bleed_polarity = plan.bleed_polarity;
        state.lock_window = plan.lock_window;
    }

    /// Snapshot the N_INT word for the latch
    fn staged_commit(&self) -> StagedCommit {
        StagedCommit {
            n_int: self.state.n_int,
        }
    }

    /// Write the N_INT LSB, transferring all double-buffered registers
    fn latch(&mut self, staged: StagedCommit) -> SynthResult<(), SPI::Error> {
        let [n_lo, _] = staged.n_int.to_le_bytes();
        self.write(reg::N_INT_LSB, n_lo)
    }

    /// Settle, then poll the lock detector
    fn wait_for_lock(&mut self) -> SynthResult<(), SPI::Error> {
        self.delay.delay_ms(LOCK_SETTLE_MS);
        let locked = self
            .bus
            .poll_until(
                reg::LOCK_STATUS,
                bits::LOCKED,
                bits::LOCKED,
                LOCK_POLL_ATTEMPTS,
                LOCK_POLL_INTERVAL_US,
                &mut self.delay,
            )
            .map_err(Error::Bus)?;

        self.state.locked = locked;
        if locked {
            self.stage = CommitStage::Locked;
            debug!("locked at {} Hz", self.state.rfout_hz);
            Ok(())
        } else {
            Err(Error::NotLocked)
        }
    }

    /// Output frequency reconstructed from the divider registers
    pub fn output_frequency(&mut self) -> SynthResult<u64, SPI::Error> {
        let n_lo = self.read(reg::N_INT_LSB)?;
        let n_msb = self.read(reg::N_INT_MSB)?;
        let n_int = u16::from_le_bytes([n_lo, n_msb & bits::N_INT_HI]);
        let exponent = (n_msb & bits::CLKOUT_DIV) >> 4;

        let frac1 = u32::from_le_bytes([
            self.read(reg::FRAC1_LSB)?,
            self.read(reg::FRAC1_MID)?,
            self.read(reg::FRAC1_HI)?,
            self.read(reg::FRAC1_MSB)? & bits::FRAC1_BIT24,
        ]);
        let frac2 = u32::from_le_bytes([
            self.read(reg::FRAC2_LSB)?,
            self.read(reg::FRAC2_MID)?,
            self.read(reg::FRAC2_MSB)?,
            0,
        ]);
        let mod2 = u32::from_le_bytes([
            self.read(reg::MOD2_LSB)?,
            self.read(reg::MOD2_MID)?,
            self.read(reg::MOD2_MSB)?,
            0,
        ]);

        let mode = if n_msb & bits::INT_MODE != 0 {
            Mode::Integer
        } else {
            Mode::Fractional
        };
        let words = Decomposition {
            mode,
            n_int,
            frac1,
            frac2,
            mod2,
        };
        let pfd_hz = self.state.reference.pfd_hz()?;
        Ok(plan::output_frequency_hz(pfd_hz, &words, exponent))
    }

    /// Loop mode from the chip's INT_MODE bit
    pub fn mode(&mut self) -> SynthResult<Mode, SPI::Error> {
        Ok(if self.read(reg::N_INT_MSB)? & bits::INT_MODE != 0 {
            Mode::Integer
        } else {
            Mode::Fractional
        })
    }

    /// Shift the output phase
    ///
    /// Integer mode nudges the bleed current; fractional mode uses the
    /// sigma-delta phase word and accepts positive shifts only.
    pub fn set_phase(&mut self, phase_fs: u32, polarity: Polarity) -> SynthResult<(), SPI::Error> {
        let offset = PhaseOffset::new(phase_fs, polarity);
        match self.mode()? {
            Mode::Integer => self.apply_bleed_phase(offset),
            Mode::Fractional => self.apply_sigma_delta_phase(offset),
        }
    }

    /// Shift phase with the bleed current (integer mode only)
    pub fn set_phase_bleed(
        &mut self,
        phase_fs: u32,
        polarity: Polarity,
    ) -> SynthResult<(), SPI::Error> {
        if self.mode()? != Mode::Integer {
            return Err(Error::InvalidModeForOperation);
        }
        self.apply_bleed_phase(PhaseOffset::new(phase_fs, polarity))
    }

    /// Shift phase with the sigma-delta phase word (fractional mode only)
    pub fn set_phase_sigma_delta(
        &mut self,
        phase_fs: u32,
        polarity: Polarity,
    ) -> SynthResult<(), SPI::Error> {
        if self.mode()? != Mode::Fractional {
            return Err(Error::InvalidModeForOperation);
        }
        self.apply_sigma_delta_phase(PhaseOffset::new(phase_fs, polarity))
    }

    fn apply_bleed_phase(&mut self, offset: PhaseOffset) -> SynthResult<(), SPI::Error> {
        let word = phase::plan_bleed_nudge(
            &NudgeContext {
                current: self.state.bleed,
                charge_pump: self.state.charge_pump,
                pfd_hz: self.state.pfd_hz,
                rfout_hz: self.state.rfout_hz,
            },
            offset,
        )?;

        self.set_bits(reg::SYNC_BLEED, bits::EN_PHASE_RESYNC, true)?;
        self.set_bits(reg::CP_BLEED, bits::EN_BLEED, true)?;
        self.write_bleed_word(word)?;
        self.state.bleed = word;
        self.state.phase = offset;
        debug!("bleed phase {} fs -> word {}", offset.femtoseconds, word.raw());

        let staged = self.staged_commit();
        self.latch(staged)
    }

    fn apply_sigma_delta_phase(&mut self, offset: PhaseOffset) -> SynthResult<(), SPI::Error> {
        let value = phase::sigma_delta_word(self.state.rfout_hz, offset)?;

        self.set_bits(reg::SYNC_BLEED, bits::EN_PHASE_RESYNC, true)?;
        self.write(reg::PHASE_WORD, value)?;
        self.set_bits(reg::CP_BLEED, bits::PHASE_ADJ, true)?;
        self.set_bits(reg::CP_BLEED, bits::PHASE_ADJ, false)?;
        self.state.phase = offset;
        debug!("sigma-delta phase {} fs -> 0x{:02X}", offset.femtoseconds, value);
        Ok(())
    }

    /// Current phase offset
    ///
    /// Integer mode reports the last requested nudge. Fractional mode reads
    /// the phase word back, so the result is quantized to the register LSB.
    pub fn phase(&mut self) -> SynthResult<PhaseOffset, SPI::Error> {
        match self.mode()? {
            Mode::Integer => Ok(self.state.phase),
            Mode::Fractional => {
                let word = self.read(reg::PHASE_WORD)?;
                let fs = phase::sigma_delta_phase_fs(self.state.rfout_hz, word);
                Ok(PhaseOffset::new(
                    u32::try_from(fs).unwrap_or(u32::MAX),
                    Polarity::Positive,
                ))
            }
        }
    }

    /// Program a raw bleed word
    ///
    /// In integer mode this also forces the bleed current on and widens the
    /// lock window if needed. Takes effect through the N_INT latch.
    pub fn set_bleed_word(&mut self, word: BleedWord) -> SynthResult<(), SPI::Error> {
        if !word.is_programmable() {
            return Err(Error::InvalidParameter);
        }
        self.write_bleed_word(word)?;
        self.state.bleed = word;

        if self.mode()? == Mode::Integer {
            self.set_bits(reg::CP_BLEED, bits::EN_BLEED, true)?;
            let window =
                lock_window::integer(Some(word), self.state.pfd_hz, self.state.charge_pump);
            self.write_field(reg::LOCK_DETECT, bits::LDWIN_PW, window)?;
            self.state.lock_window = window;
        }

        let staged = self.staged_commit();
        self.latch(staged)
    }

    /// Bleed word as programmed on the chip
    pub fn bleed_word(&mut self) -> SynthResult<BleedWord, SPI::Error> {
        let msb = self.read(reg::SYNC_BLEED)?;
        let lsb = self.read(reg::BLEED_LSB)?;
        Ok(BleedWord::from_registers(lsb, msb))
    }

    fn write_bleed_word(&mut self, word: BleedWord) -> SynthResult<(), SPI::Error> {
        let (lsb, msb) = word.to_registers();
        self.write(reg::BLEED_LSB, lsb)?;
        self.update_bits(reg::SYNC_BLEED, bits::BLEED_MSB, msb)
    }

    /// Set the output power code (0-15) of a channel
    pub fn set_output_power(
        &mut self,
        channel: OutputChannel,
        power: u8,
    ) -> SynthResult<(), SPI::Error> {
        if power > OUT_POWER_MAX {
            return Err(Error::InvalidParameter);
        }
        self.update_bits(
            reg::OUT_POWER,
            channel.power_mask(),
            power << channel.power_shift(),
        )
    }

    /// Output power code of a channel
    pub fn output_power(&mut self, channel: OutputChannel) -> SynthResult<u8, SPI::Error> {
        Ok((self.read(reg::OUT_POWER)? & channel.power_mask()) >> channel.power_shift())
    }

    /// Power a channel up or down
    pub fn set_channel_enabled(
        &mut self,
        channel: OutputChannel,
        enabled: bool,
    ) -> SynthResult<(), SPI::Error> {
        self.set_bits(reg::CLKOUT_POWER, channel.power_down_mask(), !enabled)
    }

    /// Whether a channel is powered up
    pub fn channel_enabled(&mut self, channel: OutputChannel) -> SynthResult<bool, SPI::Error> {
        Ok(self.read(reg::CLKOUT_POWER)? & channel.power_down_mask() == 0)
    }

    /// Configure reference-synchronized (EZSYNC / timed) output sync
    ///
    /// Enabling powers the sync block up, turns on reference reset, timed
    /// sync and phase resync, and programs the digital delays for the
    /// current PFD.
    pub fn set_sync_setup(&mut self, enabled: bool) -> SynthResult<(), SPI::Error> {
        if !enabled {
            return self.set_bits(reg::SYNC_POWER, bits::PD_SYNC, true);
        }

        self.set_bits(reg::SYNC_POWER, bits::PD_SYNC, false)?;
        self.set_bits(reg::SYNC_SELECT, bits::SYNC_SEL, true)?;
        self.set_bits(
            reg::SYNC_BLEED,
            bits::EN_REF_RST | bits::TIMED_SYNC | bits::EN_PHASE_RESYNC,
            true,
        )?;
        self.set_bits(reg::DIGITAL_CLOCKS, bits::EN_DRCLK, true)?;

        let delay = plan::sync_delay(self.state.pfd_hz, self.state.n_int);
        self.write_field(reg::SYNC_DELAY, bits::SYNC_DEL, delay)?;
        self.update_bits(
            reg::DELAYS,
            bits::DRCLK_DEL | bits::DNCLK_DEL,
            (delay << 3) | delay,
        )
    }

    /// Whether the sync block is powered up
    pub fn sync_setup(&mut self) -> SynthResult<bool, SPI::Error> {
        Ok(self.read(reg::SYNC_POWER)? & bits::PD_SYNC == 0)
    }

    /// Set or clear the software sync request
    ///
    /// Setting it holds the RF dividers in reset; clearing it arms them for
    /// the next reference edge.
    pub fn set_sw_sync(&mut self, asserted: bool) -> SynthResult<(), SPI::Error> {
        self.set_bits(reg::CP_BLEED, bits::SW_SYNC, asserted)
    }

    /// Software sync request bit
    pub fn sw_sync(&mut self) -> SynthResult<bool, SPI::Error> {
        Ok(self.read(reg::CP_BLEED)? & bits::SW_SYNC != 0)
    }

    /// Start or stop the die temperature ADC
    pub fn set_temperature_readback(&mut self, enabled: bool) -> SynthResult<(), SPI::Error> {
        if enabled {
            self.set_bits(reg::DIGITAL_CLOCKS, bits::EN_DRCLK, true)?;
            self.set_bits(reg::SYNC_DELAY, bits::EN_ADC_CLK, true)?;
        }
        self.set_bits(reg::ADC_CONTROL, bits::ADC_ST_CNV, enabled)
    }

    /// Approximate die temperature in °C
    pub fn temperature(&mut self) -> SynthResult<i16, SPI::Error> {
        let magnitude = i16::from(self.read(reg::TEMP_LSB)?);
        let negative = self.read(reg::TEMP_MSB)? & bits::TEMP_SIGN != 0;
        Ok(if negative { -magnitude } else { magnitude })
    }

    /// Whether every register in the default table still holds its default
    pub fn default_registers_match(&mut self) -> SynthResult<bool, SPI::Error> {
        for &(addr, expected) in &DEFAULT_REGISTERS {
            if self.read(addr)? != expected {
                debug!("register 0x{:03X} differs from default", addr);
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Read registers 0x00 to 0x62
    pub fn dump_registers(&mut self) -> SynthResult<heapless::Vec<u8, REG_DUMP_LEN>, SPI::Error> {
        let mut regs = heapless::Vec::new();
        for addr in 0..REG_DUMP_LEN {
            let addr = u16::try_from(addr).map_err(|_| Error::InvalidParameter)?;
            let value = self.read(addr)?;
            info!("0x{:02X}    0x{:02X}", addr, value);
            regs.push(value).map_err(|_| Error::InvalidParameter)?;
        }
        Ok(regs)
    }

    /// Read the lock detector directly
    pub fn is_locked(&mut self) -> SynthResult<bool, SPI::Error> {
        Ok(self.read(reg::LOCK_STATUS)? & bits::LOCKED != 0)
    }

    /// Driver-side view of the programmed loop
    #[must_use]
    pub const fn state(&self) -> &SynthesizerState {
        &self.state
    }

    /// Progress of the last frequency change
    #[must_use]
    pub const fn commit_stage(&self) -> CommitStage {
        self.stage
    }

    /// Give back the SPI device and delay provider
    pub fn release(self) -> (SPI, D) {
        (self.bus.release(), self.delay)
    }

    fn read(&mut self, addr: u16) -> SynthResult<u8, SPI::Error> {
        self.bus.read(addr).map_err(Error::Bus)
    }

    fn write(&mut self, addr: u16, value: u8) -> SynthResult<(), SPI::Error> {
        self.bus.write(addr, value).map_err(Error::Bus)
    }

    fn update_bits(&mut self, addr: u16, mask: u8, value: u8) -> SynthResult<(), SPI::Error> {
        self.bus.update_bits(addr, mask, value).map_err(Error::Bus)
    }

    fn set_bits(&mut self, addr: u16, mask: u8, on: bool) -> SynthResult<(), SPI::Error> {
        self.bus.set_bits(addr, mask, on).map_err(Error::Bus)
    }

    fn read_field(&mut self, addr: u16, mask: u8) -> SynthResult<u8, SPI::Error> {
        self.bus.read_field(addr, mask).map_err(Error::Bus)
    }

    fn write_field(&mut self, addr: u16, mask: u8, value: u8) -> SynthResult<(), SPI::Error> {
        self.bus.write_field(addr, mask, value).map_err(Error::Bus)
    }
}
