//! Simulated ATmega328P register space.
//!
//! The lower 256 bytes of the AVR unified data space:
//!
//! | Address Range | Content                       |
//! |---------------|-------------------------------|
//! | 0x0000–0x001F | General registers R0–R31      |
//! | 0x0020–0x005F | I/O registers                 |
//! | 0x0060–0x00FF | Extended I/O registers        |
//!
//! SRAM, flash and EEPROM are not modelled; the drivers only ever touch
//! peripheral registers. Each byte is an atomic cell so the foreground thread
//! and the interrupt thread observe each other's writes in order, which is the
//! host equivalent of `volatile` on the device.

use std::sync::atomic::{AtomicU8, Ordering};

use crate::regs::RegisterFile;
use crate::IO_SPACE_SIZE;

/// Raw register storage with no peripheral side effects.
pub struct IoSpace {
    data: Box<[AtomicU8]>,
}

impl IoSpace {
    pub fn new() -> Self {
        IoSpace {
            data: (0..IO_SPACE_SIZE).map(|_| AtomicU8::new(0)).collect(),
        }
    }

    #[inline(always)]
    pub fn read_raw(&self, addr: u16) -> u8 {
        match self.data.get(addr as usize) {
            Some(cell) => cell.load(Ordering::SeqCst),
            None => 0,
        }
    }

    #[inline(always)]
    pub fn write_raw(&self, addr: u16, v: u8) {
        if let Some(cell) = self.data.get(addr as usize) {
            cell.store(v, Ordering::SeqCst);
        }
    }

    /// Copy of the whole register image, for save states.
    pub fn image(&self) -> Vec<u8> {
        self.data.iter().map(|c| c.load(Ordering::SeqCst)).collect()
    }

    /// Restore a register image. Extra bytes are ignored, missing bytes are left alone.
    pub fn load_image(&self, image: &[u8]) {
        for (cell, &v) in self.data.iter().zip(image) {
            cell.store(v, Ordering::SeqCst);
        }
    }
}

impl Default for IoSpace {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterFile for IoSpace {
    fn read(&self, addr: u16) -> u8 {
        self.read_raw(addr)
    }

    fn write(&self, addr: u16, value: u8) {
        self.write_raw(addr, value)
    }
}
