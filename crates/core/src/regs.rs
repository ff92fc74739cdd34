//! ATmega328P register map and the register-file abstraction.
//!
//! Addresses are data-space addresses (I/O address + 0x20), matching what the
//! device sees through `LDS`/`STS`. Only the registers the drivers touch are
//! listed here.
//!
//! | Register | Address | Bits used                                   |
//! |----------|---------|---------------------------------------------|
//! | PINB     | 0x23    | PB4 switch input                            |
//! | DDRB     | 0x24    | PB4 input, PB5 output                       |
//! | PORTB    | 0x25    | PB5 LED                                     |
//! | SREG     | 0x5F    | I (global interrupt enable)                 |
//! | ADCL/H   | 0x78/79 | 10-bit conversion result                    |
//! | ADCSRA   | 0x7A    | ADEN, ADSC, ADIF, ADIE, ADPS2:0             |
//! | ADMUX    | 0x7C    | REFS1:0, ADLAR, MUX3:0                      |
//! | UCSR0A   | 0xC0    | RXC0, TXC0, UDRE0                           |
//! | UCSR0B   | 0xC1    | RXCIE0, TXCIE0, UDRIE0, RXEN0, TXEN0        |
//! | UCSR0C   | 0xC2    | UCSZ01:0 (frame size)                       |
//! | UBRR0L/H | 0xC4/C5 | baud divisor                                |
//! | UDR0     | 0xC6    | transmit data                               |

// GPIO port B
pub const PINB: u16 = 0x23;
pub const DDRB: u16 = 0x24;
pub const PORTB: u16 = 0x25;
pub const PB4: u8 = 4;
pub const PB5: u8 = 5;

// GPIO port C
pub const DDRC: u16 = 0x27;

// Status register
pub const SREG: u16 = 0x5F;
pub const SREG_I: u8 = 7;

// ADC
pub const ADCL: u16 = 0x78;
pub const ADCH: u16 = 0x79;
pub const ADCSRA: u16 = 0x7A;
pub const ADMUX: u16 = 0x7C;

pub const ADEN: u8 = 7;
pub const ADSC: u8 = 6;
pub const ADIF: u8 = 4;
pub const ADIE: u8 = 3;
pub const ADPS2: u8 = 2;
pub const ADPS1: u8 = 1;
pub const ADPS0: u8 = 0;

pub const REFS1: u8 = 7;
pub const REFS0: u8 = 6;
pub const ADLAR: u8 = 5;
/// MUX3:0 occupy the low nibble of ADMUX.
pub const ADMUX_MUX_MASK: u8 = 0x0F;

// USART0
pub const UCSR0A: u16 = 0xC0;
pub const UCSR0B: u16 = 0xC1;
pub const UCSR0C: u16 = 0xC2;
pub const UBRR0L: u16 = 0xC4;
pub const UBRR0H: u16 = 0xC5;
pub const UDR0: u16 = 0xC6;

pub const RXC0: u8 = 7;
pub const TXC0: u8 = 6;
pub const UDRE0: u8 = 5;

pub const RXCIE0: u8 = 7;
pub const TXCIE0: u8 = 6;
pub const UDRIE0: u8 = 5;
pub const RXEN0: u8 = 4;
pub const TXEN0: u8 = 3;

pub const UCSZ01: u8 = 2;
pub const UCSZ00: u8 = 1;

/// Bit value helper, `_BV()` in avr-libc.
#[inline(always)]
pub const fn bv(bit: u8) -> u8 {
    1 << bit
}

/// Memory-mapped register access.
///
/// Every read and write must behave like a volatile access: it may not be
/// elided, merged or reordered with other register accesses, because the
/// foreground code and the interrupt handler observe each other through these
/// registers. Accesses take `&self` so a register file can be shared between
/// both contexts.
pub trait RegisterFile {
    fn read(&self, addr: u16) -> u8;
    fn write(&self, addr: u16, value: u8);

    /// Read a 16-bit register pair, low byte first (ADCL must be read before
    /// ADCH to latch the result).
    fn read16(&self, addr_lo: u16) -> u16 {
        let lo = self.read(addr_lo);
        let hi = self.read(addr_lo + 1);
        lo as u16 | ((hi as u16) << 8)
    }

    /// Write a 16-bit register pair, high byte first.
    fn write16(&self, addr_lo: u16, value: u16) {
        self.write(addr_lo + 1, (value >> 8) as u8);
        self.write(addr_lo, value as u8);
    }

    fn set_bit(&self, addr: u16, bit: u8) {
        self.write(addr, self.read(addr) | bv(bit));
    }

    fn clear_bit(&self, addr: u16, bit: u8) {
        self.write(addr, self.read(addr) & !bv(bit));
    }

    fn bit_is_set(&self, addr: u16, bit: u8) -> bool {
        self.read(addr) & bv(bit) != 0
    }

    /// `cli`
    fn disable_interrupts(&self) {
        self.clear_bit(SREG, SREG_I);
    }

    /// `sei`
    fn enable_interrupts(&self) {
        self.set_bit(SREG, SREG_I);
    }
}

impl<R: RegisterFile + ?Sized> RegisterFile for &R {
    fn read(&self, addr: u16) -> u8 {
        (**self).read(addr)
    }

    fn write(&self, addr: u16, value: u8) {
        (**self).write(addr, value)
    }
}
