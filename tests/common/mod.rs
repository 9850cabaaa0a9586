//! Shared test doubles for driver-level tests
//!
//! `MockSpi` decodes the 3-byte register frames against an in-memory
//! register file, following the chip's own bit-order switch on writes to
//! the SPI configuration register. Tests keep a `ChipHandle` to inspect and
//! poke registers while the driver owns the device.

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use embedded_hal::delay::DelayNs;
use embedded_hal::spi::{ErrorKind, ErrorType, Operation, SpiDevice};

/// Number of modelled registers
pub const REG_COUNT: usize = 0x64;

const LOCK_STATUS: usize = 0x58;
const SCRATCHPAD: usize = 0x0A;

/// Bus failure injected by the mock
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MockError;

impl embedded_hal::spi::Error for MockError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

/// Register file and bus bookkeeping
#[derive(Debug)]
pub struct Chip {
    /// Register contents
    pub regs: [u8; REG_COUNT],
    /// Every register write, in order
    pub writes: Vec<(u16, u8)>,
    /// Number of completed transactions
    pub transactions: usize,
    /// Lock detect asserts after this many status reads (None = never)
    pub lock_after: Option<u32>,
    /// Fail the transaction with this index
    pub fail_at: Option<usize>,
    /// Scratchpad always reads this value
    pub scratchpad_stuck: Option<u8>,
    lsb_first: bool,
    lock_reads: u32,
}

impl Chip {
    fn new() -> Self {
        Self {
            regs: [0; REG_COUNT],
            writes: Vec::new(),
            transactions: 0,
            lock_after: Some(0),
            fail_at: None,
            scratchpad_stuck: None,
            lsb_first: false,
            lock_reads: 0,
        }
    }

    fn decode(&self, frame: &[u8]) -> (u16, u8) {
        if self.lsb_first {
            let cmd = u16::from_le_bytes([frame[0].reverse_bits(), frame[1].reverse_bits()]);
            (cmd, frame[2].reverse_bits())
        } else {
            (u16::from_be_bytes([frame[0], frame[1]]), frame[2])
        }
    }

    fn encode_data(&self, value: u8) -> u8 {
        if self.lsb_first {
            value.reverse_bits()
        } else {
            value
        }
    }

    fn read_register(&mut self, addr: usize) -> u8 {
        match addr {
            LOCK_STATUS => {
                self.lock_reads += 1;
                match self.lock_after {
                    Some(n) if self.lock_reads > n => self.regs[addr] | 0x01,
                    _ => self.regs[addr] & !0x01,
                }
            }
            SCRATCHPAD => self.scratchpad_stuck.unwrap_or(self.regs[addr]),
            _ => self.regs[addr],
        }
    }

    fn write_register(&mut self, addr: usize, value: u8) {
        self.writes.push((addr as u16, value));
        if addr == 0 {
            if value == 0x81 {
                self.regs = [0; REG_COUNT];
                self.lsb_first = false;
                return;
            }
            self.lsb_first = value & 0x42 == 0x42;
        }
        self.regs[addr] = value;
    }

    fn frame(&mut self, frame: &mut [u8]) {
        assert_eq!(frame.len(), 3, "register frames are 3 bytes");
        let (cmd, data) = self.decode(frame);
        let addr = usize::from(cmd & 0x7FFF);
        assert!(addr < REG_COUNT, "access to unmodelled register 0x{:03X}", addr);

        if cmd & 0x8000 != 0 {
            let value = self.read_register(addr);
            frame[2] = self.encode_data(value);
        } else {
            self.write_register(addr, data);
        }
    }

    /// Addresses written since the log was last cleared
    pub fn written_addresses(&self) -> Vec<u16> {
        self.writes.iter().map(|&(addr, _)| addr).collect()
    }
}

/// Shared view of the mock chip
#[derive(Clone, Debug)]
pub struct ChipHandle(Rc<RefCell<Chip>>);

impl ChipHandle {
    /// Register value
    pub fn reg(&self, addr: u16) -> u8 {
        self.0.borrow().regs[usize::from(addr)]
    }

    /// Overwrite a register without logging a write
    pub fn poke(&self, addr: u16, value: u8) {
        self.0.borrow_mut().regs[usize::from(addr)] = value;
    }

    /// Copy of the write log
    pub fn writes(&self) -> Vec<(u16, u8)> {
        self.0.borrow().writes.clone()
    }

    /// Addresses in the write log
    pub fn written_addresses(&self) -> Vec<u16> {
        self.0.borrow().written_addresses()
    }

    /// Drop the write log
    pub fn clear_writes(&self) {
        self.0.borrow_mut().writes.clear();
    }

    /// Number of completed transactions
    pub fn transactions(&self) -> usize {
        self.0.borrow().transactions
    }

    /// Whether the chip currently expects LSB-first frames
    pub fn lsb_first(&self) -> bool {
        self.0.borrow().lsb_first
    }

    /// Configure lock detect
    pub fn set_lock_after(&self, reads: Option<u32>) {
        let mut chip = self.0.borrow_mut();
        chip.lock_after = reads;
        chip.lock_reads = 0;
    }

    /// Fail the transaction `n` transactions from now
    pub fn fail_in(&self, n: usize) {
        let mut chip = self.0.borrow_mut();
        chip.fail_at = Some(chip.transactions + n);
    }

    /// Force the scratchpad read-back value
    pub fn set_scratchpad_stuck(&self, value: Option<u8>) {
        self.0.borrow_mut().scratchpad_stuck = value;
    }
}

/// SPI device backed by the mock chip
#[derive(Debug)]
pub struct MockSpi(Rc<RefCell<Chip>>);

impl ErrorType for MockSpi {
    type Error = MockError;
}

impl SpiDevice<u8> for MockSpi {
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), MockError> {
        let mut chip = self.0.borrow_mut();
        if chip.fail_at == Some(chip.transactions) {
            chip.fail_at = None;
            chip.transactions += 1;
            return Err(MockError);
        }

        for op in operations.iter_mut() {
            match op {
                Operation::TransferInPlace(buf) => chip.frame(buf),
                Operation::Transfer(read, write) => {
                    let mut frame = [0u8; 3];
                    frame.copy_from_slice(&write[..3]);
                    chip.frame(&mut frame);
                    read[..3].copy_from_slice(&frame);
                }
                Operation::Write(buf) => {
                    let mut frame = [0u8; 3];
                    frame.copy_from_slice(&buf[..3]);
                    chip.frame(&mut frame);
                }
                Operation::Read(_) | Operation::DelayNs(_) => {}
            }
        }
        chip.transactions += 1;
        Ok(())
    }
}

/// Create a connected SPI device and chip handle
pub fn mock_chip() -> (MockSpi, ChipHandle) {
    let chip = Rc::new(RefCell::new(Chip::new()));
    (MockSpi(Rc::clone(&chip)), ChipHandle(chip))
}

/// Delay provider that only accumulates the requested time
#[derive(Debug, Default)]
pub struct NoopDelay {
    /// Total requested delay in ns
    pub total_ns: u64,
}

impl DelayNs for NoopDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns += u64::from(ns);
    }
}
