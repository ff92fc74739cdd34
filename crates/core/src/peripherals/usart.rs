//! USART0 transmitter model.
//!
//! Bytes written to UDR0 while the transmitter is enabled go straight onto
//! the simulated wire, so the data register is always empty again by the
//! time the next instruction runs (UDRE0 stays set). Pacing of the "data
//! register empty" interrupt is left to [`crate::sim::InterruptThread`].
//!
//! The model also counts UDRIE0 edges so tests can check how often the
//! driver arms and disarms the interrupt.

use tracing::trace;

use crate::memory::IoSpace;
use crate::regs::{bv, TXC0, TXEN0, UCSR0A, UCSR0B, UDR0, UDRE0, UDRIE0};
use crate::savestate::UsartState;

/// UCSR0A value after reset: data register empty.
pub const UCSR0A_RESET: u8 = 1 << UDRE0;

pub struct Usart {
    /// Every byte that left the transmitter, in order
    pub wire: Vec<u8>,
    /// UDRIE0 0→1 transitions
    pub udrie_enables: u32,
    /// UDRIE0 1→0 transitions
    pub udrie_disables: u32,
    /// Bytes written to UDR0 with TXEN0 clear (lost on real hardware)
    pub dropped: u32,
}

impl Usart {
    pub fn new() -> Self {
        Usart { wire: Vec::new(), udrie_enables: 0, udrie_disables: 0, dropped: 0 }
    }

    pub fn reset(&mut self, io: &IoSpace) {
        *self = Usart::new();
        io.write_raw(UCSR0A, UCSR0A_RESET);
    }

    /// Returns true if addr was handled
    pub fn write(&mut self, addr: u16, value: u8, io: &IoSpace) -> bool {
        match addr {
            UCSR0B => {
                let prev = io.read_raw(UCSR0B) & bv(UDRIE0) != 0;
                let next = value & bv(UDRIE0) != 0;
                match (prev, next) {
                    (false, true) => { self.udrie_enables += 1; trace!("UDRIE0 armed"); }
                    (true, false) => { self.udrie_disables += 1; trace!("UDRIE0 disarmed"); }
                    _ => {}
                }
                io.write_raw(UCSR0B, value);
                true
            }
            UDR0 => {
                io.write_raw(UDR0, value);
                if io.read_raw(UCSR0B) & bv(TXEN0) != 0 {
                    self.wire.push(value);
                    trace!(byte = value, "wire");
                    io.write_raw(UCSR0A, io.read_raw(UCSR0A) | bv(UDRE0) | bv(TXC0));
                } else {
                    self.dropped += 1;
                }
                true
            }
            UCSR0A => {
                // UDRE0 is read-only, TXC0 is cleared by writing a one
                let mut v = io.read_raw(UCSR0A) | bv(UDRE0);
                if value & bv(TXC0) != 0 {
                    v &= !bv(TXC0);
                }
                io.write_raw(UCSR0A, v);
                true
            }
            _ => false,
        }
    }

    /// Drain the captured wire bytes.
    pub fn take_wire(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.wire)
    }

    /// Capture state for save state.
    pub fn save_state(&self) -> UsartState {
        UsartState {
            wire: self.wire.clone(),
            udrie_enables: self.udrie_enables,
            udrie_disables: self.udrie_disables,
            dropped: self.dropped,
        }
    }

    /// Restore state from save state.
    pub fn load_state(&mut self, s: &UsartState) {
        self.wire = s.wire.clone();
        self.udrie_enables = s.udrie_enables;
        self.udrie_disables = s.udrie_disables;
        self.dropped = s.dropped;
    }
}

impl Default for Usart {
    fn default() -> Self {
        Self::new()
    }
}
