//! Rising-edge detection on a pull-down switch.
//!
//! The switch sits on Uno pin 12 (PB4) and reads high while pressed. The
//! detector keeps the previously sampled level and reports a press once, on
//! the sample where the level goes from low to high. Holding the switch down
//! does not repeat the report.

use crate::regs::{bv, RegisterFile, DDRB, PB4, PINB};

pub struct SwitchEdge<R: RegisterFile> {
    regs: R,
    previous: u8,
}

impl<R: RegisterFile> SwitchEdge<R> {
    /// Make PB4 an input and forget any previous level. Only DDRB bit 4 is
    /// touched, whatever the register held before.
    pub fn setup(regs: R) -> Self {
        regs.clear_bit(DDRB, PB4);
        SwitchEdge { regs, previous: 0 }
    }

    /// Sample the switch. Returns `true` on a low-to-high transition since
    /// the previous call.
    pub fn is_rising_edge(&mut self) -> bool {
        let current = self.regs.read(PINB) & bv(PB4);
        let rising = self.previous == 0 && current != 0;
        self.previous = current;
        rising
    }
}
