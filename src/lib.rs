//! RF Synthesizer Firmware Library
//!
//! This library drives an ADF4368 wideband fractional-N synthesizer
//! (800 MHz - 12.8 GHz) from an STM32G474 over SPI. It derives the divider
//! words, bleed current and lock-detect settings for a target frequency,
//! commits them in the order the chip's double buffering requires, and
//! adjusts output phase.
//!
//! # Architecture
//!
//! The firmware is organized in layers:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    APPLICATION LAYER                         │
//! │        Bring-up  │  Tuning  │  Phase alignment               │
//! ├─────────────────────────────────────────────────────────────┤
//! │                     DRIVER LAYER                             │
//! │   ADF4368 orchestrator (commit, latch, lock poll)            │
//! ├─────────────────────────────────────────────────────────────┤
//! │                   SYNTHESIS MATH                             │
//! │  PFD │ Divider │ Fraction/MOD2 │ Bleed │ Lock window │ Phase │
//! ├─────────────────────────────────────────────────────────────┤
//! │                      HAL LAYER                               │
//! │      SPI register access  │  embedded-hal traits             │
//! ├─────────────────────────────────────────────────────────────┤
//! │                    RTOS / SCHEDULER                          │
//! │           embassy-rs (async/await executor)                  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Design Principles
//!
//! - **Functional core, imperative shell**: all synthesis math is pure and
//!   host-testable; the driver only sequences register writes
//! - **Type-driven design**: charge pump, bleed word and phase offset carry
//!   their invariants in their types
//! - **No unsafe in application code**
//! - **Explicit error handling**: all fallible operations return `Result`

#![cfg_attr(feature = "embedded", no_std)]
#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

#[macro_use]
mod fmt;

// Re-export dependencies needed by applications (only in embedded mode)
#[cfg(feature = "embedded")]
pub use embassy_executor;
#[cfg(feature = "embedded")]
pub use embassy_stm32;
#[cfg(feature = "embedded")]
pub use embassy_time;

/// Hardware Abstraction Layer
///
/// SPI register access, plus the STM32 adapter in embedded builds.
pub mod hal;

/// Peripheral Drivers
///
/// The ADF4368 synthesizer driver.
pub mod drivers;

/// Synthesis Math
///
/// PFD, divider selection, fractional decomposition, bleed and phase.
pub mod synth;

/// Shared types used across modules
pub mod types;

/// System configuration and constants
pub mod config;

/// Prelude module for common imports
#[cfg(feature = "embedded")]
pub mod prelude {
    //! Convenient re-exports for common types and traits.

    pub use crate::config::*;
    pub use crate::drivers::adf4368::{Adf4368, Adf4368Config, Error as SynthError};
    pub use crate::types::*;

    // Common traits
    pub use embedded_hal::delay::DelayNs;
    pub use embedded_hal::spi::SpiDevice;

    // Embassy
    pub use embassy_time::{Duration, Instant, Timer};

    // Error handling
    pub use core::result::Result;

    // Logging
    pub use defmt::{debug, error, info, trace, warn};
}
