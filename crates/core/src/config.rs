//! Monitor configuration.
//!
//! Defaults reproduce the classic sketch: 9600 baud 8N1 from a 16 MHz clock,
//! ADC prescaler 128, potentiometer on A0, LED threshold 512, one report
//! every 50 ms.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::ConfigError;
use crate::sampler::DivisionFactor;
use crate::{CLOCK_HZ, DEFAULT_BAUD};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    pub clock_hz: u32,
    pub baud: u32,
    pub division_factor: DivisionFactor,
    /// ADC channel sampled on every report (0-7)
    pub channel: u8,
    /// LED turns on strictly above this value
    pub threshold: u16,
    pub interval_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        MonitorConfig {
            clock_hz: CLOCK_HZ,
            baud: DEFAULT_BAUD,
            division_factor: DivisionFactor::Div128,
            channel: 0,
            threshold: 512,
            interval_ms: 50,
        }
    }
}

impl MonitorConfig {
    /// UBRR0 value for normal-speed asynchronous mode: F_CPU / 16 / BAUD - 1.
    pub fn baud_divisor(&self) -> Result<u16, ConfigError> {
        if self.baud == 0 {
            return Err(ConfigError::ZeroBaud);
        }
        let out_of_range = ConfigError::BaudOutOfRange { baud: self.baud, clock_hz: self.clock_hz };
        let div = (self.clock_hz / 16 / self.baud).checked_sub(1).ok_or(out_of_range)?;
        // UBRR0 is 12 bits wide
        if div > 0x0FFF {
            return Err(ConfigError::BaudOutOfRange { baud: self.baud, clock_hz: self.clock_hz });
        }
        Ok(div as u16)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.baud_divisor()?;
        if self.channel > 7 {
            return Err(ConfigError::Channel(self.channel));
        }
        if self.threshold > crate::peripherals::ADC_MAX {
            return Err(ConfigError::Threshold(self.threshold));
        }
        Ok(())
    }

    /// Override fields from `--baud`, `--prescale`, `--channel`,
    /// `--threshold` and `--interval-ms` flags. Unknown flags are ignored.
    pub fn apply_args(&mut self, args: &[String]) -> Result<(), ConfigError> {
        if let Some(baud) = flag_value(args, "--baud")? {
            self.baud = baud;
        }
        if let Some(factor) = flag_value::<u32>(args, "--prescale")? {
            self.division_factor = DivisionFactor::try_from(factor)?;
        }
        if let Some(channel) = flag_value(args, "--channel")? {
            self.channel = channel;
        }
        if let Some(threshold) = flag_value(args, "--threshold")? {
            self.threshold = threshold;
        }
        if let Some(interval) = flag_value(args, "--interval-ms")? {
            self.interval_ms = interval;
        }
        self.validate()
    }
}

/// Value following `flag`, parsed. `Ok(None)` when the flag is absent.
pub fn flag_value<T: FromStr>(args: &[String], flag: &str) -> Result<Option<T>, ConfigError> {
    let Some(i) = args.iter().position(|a| a == flag) else {
        return Ok(None);
    };
    let raw = args.get(i + 1).ok_or_else(|| ConfigError::MissingValue(flag.to_string()))?;
    raw.parse()
        .map(Some)
        .map_err(|_| ConfigError::InvalidValue { flag: flag.to_string(), value: raw.clone() })
}
