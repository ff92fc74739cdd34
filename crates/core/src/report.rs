//! Periodic potentiometer report.
//!
//! Each call to [`PotReporter::process`] samples the configured channel,
//! drives the on-board LED (PB5) from a strict greater-than comparison against
//! the threshold, and queues the reading as decimal ASCII followed by CR LF.

use core::fmt::Write;

use heapless::String;
use tracing::debug;

use crate::config::MonitorConfig;
use crate::error::ConfigError;
use crate::pipeline::{self, DrainHandler, Transmitter};
use crate::regs::{RegisterFile, DDRB, PB5, PORTB};
use crate::sampler::Sampler;
use crate::TX_BUFFER_SIZE;

/// Room for any u16 in decimal.
const LINE_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Report {
    pub value: u16,
    pub led: bool,
}

pub struct PotReporter<R: RegisterFile + Clone> {
    regs: R,
    sampler: Sampler<R>,
    tx: Transmitter<R, TX_BUFFER_SIZE>,
    channel: u8,
    threshold: u16,
}

impl<R: RegisterFile + Clone> PotReporter<R> {
    /// Bring up the USART, the LED pin and the ADC, in that order. The drain
    /// handler is returned for the caller to hook onto the USART_UDRE vector.
    pub fn setup(regs: R, config: &MonitorConfig) -> Result<(Self, DrainHandler<R, TX_BUFFER_SIZE>), ConfigError> {
        config.validate()?;
        let (tx, drain) = pipeline::initialize::<R, TX_BUFFER_SIZE>(regs.clone(), config.baud_divisor()?);
        regs.set_bit(DDRB, PB5);
        let sampler = Sampler::configure(regs.clone(), config.division_factor);
        debug!(channel = config.channel, threshold = config.threshold, "reporter ready");
        let reporter = PotReporter { regs, sampler, tx, channel: config.channel, threshold: config.threshold };
        Ok((reporter, drain))
    }

    pub fn process(&mut self) -> Report {
        let value = self.sampler.sample(self.channel);

        let led = value > self.threshold;
        if led {
            self.regs.set_bit(PORTB, PB5);
        } else {
            self.regs.clear_bit(PORTB, PB5);
        }

        let mut line: String<LINE_LEN> = String::new();
        let _ = write!(line, "{}", value);
        self.tx.enqueue_str(line.as_bytes());
        self.tx.enqueue_str(b"\r\n");

        Report { value, led }
    }

    pub fn transmitter(&self) -> &Transmitter<R, TX_BUFFER_SIZE> {
        &self.tx
    }
}
