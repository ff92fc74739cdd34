//! Blocking single-channel ADC sampler.
//!
//! [`Sampler::configure`] selects the AVcc reference and enables the
//! converter with one of the datasheet prescaler settings (table 24-5);
//! [`Sampler::sample`] runs one conversion and busy-polls ADSC until the
//! hardware clears it. There is no timeout: a converter that never finishes
//! hangs the caller.

use tracing::debug;

use crate::error::ConfigError;
use crate::regs::{
    bv, RegisterFile, ADCL, ADCSRA, ADEN, ADMUX, ADMUX_MUX_MASK, ADPS0, ADPS1, ADPS2, ADSC, REFS0,
};

/// ADC clock prescaler. Division by 2 is never used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum DivisionFactor {
    Div4,
    Div8,
    Div16,
    Div32,
    Div64,
    Div128,
}

impl DivisionFactor {
    pub const ALL: [DivisionFactor; 6] = [
        DivisionFactor::Div4,
        DivisionFactor::Div8,
        DivisionFactor::Div16,
        DivisionFactor::Div32,
        DivisionFactor::Div64,
        DivisionFactor::Div128,
    ];

    /// ADPS2:0 bits for this factor.
    pub const fn prescaler_bits(self) -> u8 {
        match self {
            DivisionFactor::Div4 => bv(ADPS1),
            DivisionFactor::Div8 => bv(ADPS1) | bv(ADPS0),
            DivisionFactor::Div16 => bv(ADPS2),
            DivisionFactor::Div32 => bv(ADPS2) | bv(ADPS0),
            DivisionFactor::Div64 => bv(ADPS2) | bv(ADPS1),
            DivisionFactor::Div128 => bv(ADPS2) | bv(ADPS1) | bv(ADPS0),
        }
    }

    pub const fn divisor(self) -> u32 {
        match self {
            DivisionFactor::Div4 => 4,
            DivisionFactor::Div8 => 8,
            DivisionFactor::Div16 => 16,
            DivisionFactor::Div32 => 32,
            DivisionFactor::Div64 => 64,
            DivisionFactor::Div128 => 128,
        }
    }
}

impl TryFrom<u32> for DivisionFactor {
    type Error = ConfigError;

    fn try_from(factor: u32) -> Result<Self, Self::Error> {
        DivisionFactor::ALL
            .into_iter()
            .find(|f| f.divisor() == factor)
            .ok_or(ConfigError::DivisionFactor(factor))
    }
}

pub struct Sampler<R: RegisterFile> {
    regs: R,
}

impl<R: RegisterFile> Sampler<R> {
    /// Select AVcc as reference (REFS1:0 = 01, every other ADMUX bit zero)
    /// and enable the ADC with the given prescaler.
    pub fn configure(regs: R, factor: DivisionFactor) -> Self {
        regs.write(ADMUX, bv(REFS0));
        regs.write(ADCSRA, bv(ADEN) | factor.prescaler_bits());
        debug!(divisor = factor.divisor(), "ADC configured");
        Sampler { regs }
    }

    /// Convert one channel and return the 10-bit result.
    ///
    /// Only MUX3:0 are replaced; REFS1:0 and ADLAR keep whatever was
    /// configured before. Channels 0-7 are the external pins.
    pub fn sample(&mut self, channel: u8) -> u16 {
        let admux = self.regs.read(ADMUX);
        self.regs.write(ADMUX, (admux & !ADMUX_MUX_MASK) | (channel & ADMUX_MUX_MASK));

        self.regs.set_bit(ADCSRA, ADSC);
        // ADSC reads back as 1 until the conversion is done
        while self.regs.bit_is_set(ADCSRA, ADSC) {
            core::hint::spin_loop();
        }

        self.regs.read16(ADCL)
    }
}
