//! SPI Register Access
//!
//! The ADF4368 uses a 3-byte instruction frame: a 16-bit command word
//! (`R/W` flag in bit 15, register address below it) followed by one data
//! byte. Every register access is a single full-duplex `transfer_in_place`.
//!
//! When the chip is configured for LSB-first transfers, the two command bytes
//! are sent low byte first and every byte is bit-reversed on the wire. Read
//! data is reversed back before it is returned.

use crate::types::BitOrder;
use embedded_hal::delay::DelayNs;
use embedded_hal::spi::SpiDevice;

/// SPI operation result, carrying the bus error verbatim
pub type SpiResult<T, E> = Result<T, E>;

/// Read flag in the command word
pub const READ_FLAG: u16 = 0x8000;

/// Byte clocked out during the data phase of a read
const DUMMY_BYTE: u8 = 0x00;

/// Frame length in bytes
pub const FRAME_LEN: usize = 3;

/// Build the on-wire frame for one register access
#[must_use]
pub const fn encode_frame(cmd: u16, data: u8, order: BitOrder) -> [u8; FRAME_LEN] {
    let [hi, lo] = cmd.to_be_bytes();
    match order {
        BitOrder::MsbFirst => [hi, lo, data],
        BitOrder::LsbFirst => [lo.reverse_bits(), hi.reverse_bits(), data.reverse_bits()],
    }
}

/// Recover the data byte of a received frame
#[must_use]
pub const fn decode_data(frame: &[u8; FRAME_LEN], order: BitOrder) -> u8 {
    match order {
        BitOrder::MsbFirst => frame[2],
        BitOrder::LsbFirst => frame[2].reverse_bits(),
    }
}

/// Register-level access to the synthesizer
///
/// Owns the SPI device. No shadow copy is kept; every read goes to the chip.
pub struct RegisterBus<SPI> {
    spi: SPI,
    bit_order: BitOrder,
}

impl<SPI> RegisterBus<SPI>
where
    SPI: SpiDevice<u8>,
{
    /// Wrap an SPI device, starting in the given bit order
    #[must_use]
    pub const fn new(spi: SPI, bit_order: BitOrder) -> Self {
        Self { spi, bit_order }
    }

    /// Bit order used for framing
    #[must_use]
    pub const fn bit_order(&self) -> BitOrder {
        self.bit_order
    }

    /// Change the framing bit order
    ///
    /// Call this right after the chip's SPI configuration register has been
    /// rewritten.
    pub fn set_bit_order(&mut self, bit_order: BitOrder) {
        self.bit_order = bit_order;
    }

    /// Read a single register
    pub fn read(&mut self, addr: u16) -> SpiResult<u8, SPI::Error> {
        let mut frame = encode_frame(READ_FLAG | addr, DUMMY_BYTE, self.bit_order);
        self.spi.transfer_in_place(&mut frame)?;
        let value = decode_data(&frame, self.bit_order);
        trace!("rd 0x{:03X} -> 0x{:02X}", addr, value);
        Ok(value)
    }

    /// Write a single register
    pub fn write(&mut self, addr: u16, value: u8) -> SpiResult<(), SPI::Error> {
        let mut frame = encode_frame(addr & !READ_FLAG, value, self.bit_order);
        trace!("wr 0x{:03X} <- 0x{:02X}", addr, value);
        self.spi.transfer_in_place(&mut frame)
    }

    /// Read-modify-write the bits selected by `mask`
    ///
    /// `value` is masked before merging, so passing `0xFF` sets every bit of
    /// the field. Nothing is written when the register already holds the
    /// result.
    pub fn update_bits(&mut self, addr: u16, mask: u8, value: u8) -> SpiResult<(), SPI::Error> {
        let current = self.read(addr)?;
        let updated = (current & !mask) | (value & mask);
        if updated != current {
            self.write(addr, updated)?;
        }
        Ok(())
    }

    /// Set or clear every bit in `mask`
    pub fn set_bits(&mut self, addr: u16, mask: u8, on: bool) -> SpiResult<(), SPI::Error> {
        self.update_bits(addr, mask, if on { 0xFF } else { 0x00 })
    }

    /// Read the bits selected by `mask`, shifted down to bit 0
    pub fn read_field(&mut self, addr: u16, mask: u8) -> SpiResult<u8, SPI::Error> {
        let value = self.read(addr)?;
        Ok((value & mask) >> mask.trailing_zeros())
    }

    /// Write `value` into the field selected by `mask`, shifting it into place
    pub fn write_field(&mut self, addr: u16, mask: u8, value: u8) -> SpiResult<(), SPI::Error> {
        self.update_bits(addr, mask, value << mask.trailing_zeros())
    }

    /// Poll a register until `(reg & mask) == expected`
    ///
    /// Performs at most `attempts` reads, waiting `interval_us` between
    /// them. Returns `Ok(false)` when the condition never held.
    pub fn poll_until<D: DelayNs>(
        &mut self,
        addr: u16,
        mask: u8,
        expected: u8,
        attempts: u32,
        interval_us: u32,
        delay: &mut D,
    ) -> SpiResult<bool, SPI::Error> {
        for attempt in 0..attempts {
            if self.read(addr)? & mask == expected {
                return Ok(true);
            }
            if attempt + 1 < attempts {
                delay.delay_us(interval_us);
            }
        }
        Ok(false)
    }

    /// Give back the SPI device
    pub fn release(self) -> SPI {
        self.spi
    }
}

#[cfg(feature = "embedded")]
pub use target::ChipSelectSpi;

#[cfg(feature = "embedded")]
mod target {
    use embassy_stm32::gpio::Output;
    use embassy_stm32::mode::Blocking;
    use embassy_stm32::spi::{Error, Spi};
    use embassy_time::{block_for, Duration};
    use embedded_hal::spi::{ErrorType, Operation, SpiDevice};

    /// Blocking SPI peripheral with a dedicated chip-select line
    ///
    /// Exposes the peripheral as an `embedded-hal` [`SpiDevice`]. CS is held
    /// low for the whole transaction and always released, even on error.
    pub struct ChipSelectSpi<'d> {
        spi: Spi<'d, Blocking>,
        cs: Output<'d>,
    }

    impl<'d> ChipSelectSpi<'d> {
        /// Wrap a blocking SPI peripheral and its CS pin (idle high)
        #[must_use]
        pub fn new(spi: Spi<'d, Blocking>, mut cs: Output<'d>) -> Self {
            cs.set_high();
            Self { spi, cs }
        }
    }

    impl ErrorType for ChipSelectSpi<'_> {
        type Error = Error;
    }

    impl SpiDevice<u8> for ChipSelectSpi<'_> {
        fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), Error> {
            self.cs.set_low();
            let result = operations.iter_mut().try_for_each(|op| match op {
                Operation::Read(buf) => self.spi.blocking_read(buf),
                Operation::Write(buf) => self.spi.blocking_write(buf),
                Operation::Transfer(read, write) => self.spi.blocking_transfer(read, write),
                Operation::TransferInPlace(buf) => self.spi.blocking_transfer_in_place(buf),
                Operation::DelayNs(ns) => {
                    block_for(Duration::from_nanos(u64::from(*ns)));
                    Ok(())
                }
            });
            self.cs.set_high();
            result
        }
    }
}
