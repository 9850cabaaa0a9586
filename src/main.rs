//! RF Synthesizer Main Application
//!
//! Entry point for the STM32G474 board carrying the ADF4368.
//! Brings the synthesizer up, tunes it and keeps a heartbeat running.

#![no_std]
#![no_main]

use defmt::{error, info, warn};
use embassy_executor::Spawner;
use embassy_stm32::gpio::{Level, Output, Speed};
use embassy_stm32::spi::{self, Spi};
use embassy_stm32::time::Hertz;
use embassy_time::{Delay, Duration, Timer};
use {defmt_rtt as _, panic_probe as _};

use rf_synth_firmware::hal::spi::ChipSelectSpi;
use rf_synth_firmware::prelude::*;

/// Output frequency tuned after bring-up
const TARGET_RFOUT_HZ: u64 = 8_000_000_000;

/// Phase step applied once the loop is locked
const PHASE_STEP_FS: u32 = 1_000;

/// Main entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("RF Synthesizer Firmware v{}", env!("CARGO_PKG_VERSION"));

    // Initialize STM32G474 peripherals with default clock configuration
    let config = embassy_stm32::Config::default();
    let p = embassy_stm32::init(config);

    info!("Peripherals initialized");

    // Initialize status LED (typically on PA5 for Nucleo boards)
    let led = Output::new(p.PA5, Level::Low, Speed::Low);

    // SPI2 for the ADF4368: PB13 = SCK, PB15 = MOSI, PB14 = MISO, PB12 = CS
    let mut spi_config = spi::Config::default();
    spi_config.frequency = Hertz(SPI_FREQUENCY_HZ);
    let spi = Spi::new_blocking(p.SPI2, p.PB13, p.PB15, p.PB14, spi_config);
    let cs = Output::new(p.PB12, Level::High, Speed::VeryHigh);

    info!("SPI2 initialized at {} Hz", SPI_FREQUENCY_HZ);

    let mut synth = Adf4368::new(ChipSelectSpi::new(spi, cs), Delay, Adf4368Config::default());

    match synth.init() {
        Ok(()) => info!("ADF4368 initialized"),
        Err(e) => error!("ADF4368 init failed: {}", e),
    }

    match synth.set_output_frequency(TARGET_RFOUT_HZ) {
        Ok(()) => info!("Tuned to {} Hz ({})", TARGET_RFOUT_HZ, synth.state().mode),
        Err(e) => warn!("Tuning failed at stage {}: {}", synth.commit_stage(), e),
    }

    if let Err(e) = synth.set_phase(PHASE_STEP_FS, Polarity::Positive) {
        warn!("Phase adjust failed: {}", e);
    }

    // Spawn background tasks
    spawner.spawn(heartbeat_task(led)).unwrap();

    info!("Tasks spawned, entering main loop");

    // Main loop - report lock state periodically
    loop {
        Timer::after(Duration::from_secs(10)).await;
        match synth.is_locked() {
            Ok(true) => info!("PLL locked"),
            Ok(false) => warn!("PLL unlocked"),
            Err(e) => error!("Lock status read failed: {}", e),
        }
    }
}

/// Heartbeat task - blinks LED to show system is running
#[embassy_executor::task]
async fn heartbeat_task(mut led: Output<'static>) {
    loop {
        led.set_high();
        Timer::after(Duration::from_millis(100)).await;
        led.set_low();
        Timer::after(Duration::from_millis(900)).await;
    }
}
