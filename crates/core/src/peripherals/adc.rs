//! Analog-to-digital converter model.
//!
//! Each of the 16 MUX selections has a settable input level (10-bit). Writing
//! ADCSRA with ADEN and ADSC set completes the conversion on the spot: the
//! result is placed in ADCH:ADCL, ADSC is cleared and ADIF is set, so a
//! polling `while ADCSRA & (1 << ADSC)` loop exits on its next read.
//!
//! A stalled converter leaves ADSC set forever, which is how a dead ADC looks
//! to the polling loop.

use crate::memory::IoSpace;
use crate::regs::{bv, ADCH, ADCL, ADCSRA, ADEN, ADIF, ADLAR, ADMUX, ADMUX_MUX_MASK, ADSC};
use crate::savestate::AdcState;

/// Number of MUX selections (MUX3:0).
pub const ADC_CHANNELS: usize = 16;
/// Full-scale 10-bit result.
pub const ADC_MAX: u16 = 0x3FF;

pub struct Adc {
    pub inputs: [u16; ADC_CHANNELS],
    pub stalled: bool,
    /// Completed conversions since reset
    pub conversions: u64,
}

impl Adc {
    pub fn new() -> Self {
        Adc { inputs: [0; ADC_CHANNELS], stalled: false, conversions: 0 }
    }

    pub fn reset(&mut self) {
        *self = Adc::new();
    }

    /// Returns true if addr was handled
    pub fn write(&mut self, addr: u16, value: u8, io: &IoSpace) -> bool {
        if addr != ADCSRA {
            return false;
        }
        // ADIF is cleared by writing a one to it
        let prev = io.read_raw(ADCSRA);
        let mut v = (value & !bv(ADIF)) | (prev & bv(ADIF));
        if value & bv(ADIF) != 0 {
            v &= !bv(ADIF);
        }
        io.write_raw(ADCSRA, v);
        if v & bv(ADEN) != 0 && v & bv(ADSC) != 0 && !self.stalled {
            self.convert(io);
        }
        true
    }

    /// Stall or release the converter. Releasing it finishes a conversion
    /// that was started while stalled.
    pub fn set_stalled(&mut self, stalled: bool, io: &IoSpace) {
        self.stalled = stalled;
        let csr = io.read_raw(ADCSRA);
        if !stalled && csr & bv(ADEN) != 0 && csr & bv(ADSC) != 0 {
            self.convert(io);
        }
    }

    fn convert(&mut self, io: &IoSpace) {
        let admux = io.read_raw(ADMUX);
        let channel = (admux & ADMUX_MUX_MASK) as usize;
        let mut result = self.inputs[channel].min(ADC_MAX);
        if admux & bv(ADLAR) != 0 {
            result <<= 6;
        }
        io.write_raw(ADCL, result as u8);
        io.write_raw(ADCH, (result >> 8) as u8);
        let csr = io.read_raw(ADCSRA);
        io.write_raw(ADCSRA, (csr & !bv(ADSC)) | bv(ADIF));
        self.conversions += 1;
    }

    /// Capture state for save state.
    pub fn save_state(&self) -> AdcState {
        AdcState { inputs: self.inputs.to_vec(), stalled: self.stalled, conversions: self.conversions }
    }

    /// Restore state from save state.
    pub fn load_state(&mut self, s: &AdcState) {
        self.inputs = [0; ADC_CHANNELS];
        for (slot, &v) in self.inputs.iter_mut().zip(&s.inputs) {
            *slot = v;
        }
        self.stalled = s.stalled;
        self.conversions = s.conversions;
    }
}

impl Default for Adc {
    fn default() -> Self {
        Self::new()
    }
}
