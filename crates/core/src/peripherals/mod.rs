//! ATmega328P peripheral models used by the simulated board.
//!
//! - [`Adc`] — Analog-to-digital converter (potentiometer input, stall injection)
//! - [`Usart`] — USART0 transmitter (wire capture, UDRIE0 edge counters)
//!
//! Each model follows the same shape: `write(addr, value, io)` returns `true`
//! when the address belongs to the peripheral and applies the register side
//! effects to the shared [`IoSpace`](crate::memory::IoSpace).

mod adc;
mod usart;

pub use adc::{Adc, ADC_CHANNELS, ADC_MAX};
pub use usart::{Usart, UCSR0A_RESET};

/// USART0 data register empty vector (word address, ATmega328P datasheet table 12-6)
pub const INT_USART_UDRE: u16 = 0x0026;
