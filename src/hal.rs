//! Hardware Abstraction Layer
//!
//! Register access to the synthesizer over any `embedded-hal` SPI device,
//! plus the STM32G474 adapter that provides one on the target.

pub mod spi;
