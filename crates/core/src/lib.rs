//! # uno-telemetry-core
//!
//! ADC sampling and interrupt-driven serial output for the ATmega328P
//! (Arduino Uno), written against a register-file trait so the same drivers
//! run on a simulated board.
//!
//! ## Architecture
//!
//! - [`regs`] — Register map and the [`RegisterFile`](regs::RegisterFile) trait
//! - [`sampler`] — Blocking single-channel ADC conversions
//! - [`ring_buffer`] — Lock-free single-producer single-consumer byte ring
//! - [`pipeline`] — USART0 transmit pipeline: [`Transmitter`](pipeline::Transmitter)
//!   (foreground producer) and [`DrainHandler`](pipeline::DrainHandler)
//!   (`USART_UDRE` interrupt body)
//! - [`report`] — Periodic potentiometer report (sample, LED, serial line)
//! - [`edge`] — Rising-edge detection on a pull-down switch
//! - [`sim`] — Simulated board: register file, peripheral models, interrupt thread
//! - [`memory`] — Atomic register storage behind the simulator
//! - [`peripherals`] — ADC and USART0 models
//! - [`savestate`] — Compressed board snapshots
//! - [`config`] — Monitor settings and command-line overrides
//!
//! ## Concurrency
//!
//! The foreground loop and the `USART_UDRE` handler share the transmit ring
//! without a lock. The producer is the only writer of `head`, the handler the
//! only writer of `tail`, and the pipeline is split into two non-cloneable
//! halves so that cannot change by accident.

pub mod regs;
pub mod memory;
pub mod peripherals;
pub mod sim;
pub mod sampler;
pub mod ring_buffer;
pub mod pipeline;
pub mod edge;
pub mod report;
pub mod config;
pub mod error;
pub mod savestate;

pub use config::MonitorConfig;
pub use error::{ConfigError, StateError};
pub use pipeline::{DrainHandler, LineState, Transmitter};
pub use report::{PotReporter, Report};
pub use sampler::{DivisionFactor, Sampler};
pub use sim::Board;

/// CPU clock frequency: 16 MHz
pub const CLOCK_HZ: u32 = 16_000_000;
/// Default serial rate
pub const DEFAULT_BAUD: u32 = 9600;
/// Transmit ring slots (one is always kept free)
pub const TX_BUFFER_SIZE: usize = 64;
/// Registers + I/O + extended I/O (0x00..0xFF)
pub const IO_SPACE_SIZE: usize = 256;
