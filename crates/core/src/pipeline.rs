//! Interrupt-driven USART0 transmit pipeline.
//!
//! [`initialize`] programs the USART for 8N1 at the given baud divisor and
//! splits the pipeline into its two actors:
//!
//! - [`Transmitter`] — the foreground producer. `enqueue` spins while the ring
//!   is full, stores the byte and arms the "data register empty" interrupt.
//! - [`DrainHandler`] — the body of the `USART_UDRE` interrupt. Each call
//!   moves one byte to UDR0, or disarms the interrupt when nothing is left.
//!
//! Neither half is `Clone`, so there is exactly one writer of `head` and one
//! writer of `tail`, and the handler has no way to reach the blocking
//! producer path.
//!
//! ```text
//!            enqueue (UDRIE0 := 1)
//!   IDLE ───────────────────────────► ARMED ──┐ drain, bytes left:
//!     ▲                                 │   ◄──┘ one byte to UDR0
//!     └─────────────────────────────────┘
//!            drain, ring empty (UDRIE0 := 0)
//! ```

use std::sync::Arc;

use tracing::{debug, trace};

use crate::regs::{
    bv, RegisterFile, RXCIE0, RXEN0, TXEN0, UBRR0H, UBRR0L, UCSR0B, UCSR0C, UCSZ00, UCSZ01, UDR0,
    UDRIE0,
};
use crate::ring_buffer::TxRing;
use crate::TX_BUFFER_SIZE;

/// UCSR0B while bytes are pending: receiver and transmitter enabled, RX
/// complete and data register empty interrupts enabled.
pub const UCSR0B_ARMED: u8 = bv(RXEN0) | bv(TXEN0) | bv(RXCIE0) | bv(UDRIE0);
/// UCSR0B once the ring has drained: as above with UDRIE0 cleared.
pub const UCSR0B_IDLE: u8 = bv(RXEN0) | bv(TXEN0) | bv(RXCIE0);
/// UCSR0C for asynchronous 8 data bits, no parity, 1 stop bit.
pub const UCSR0C_8N1: u8 = bv(UCSZ01) | bv(UCSZ00);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineState {
    /// Data register empty interrupt disabled
    Idle,
    /// Data register empty interrupt enabled, draining in progress
    Armed,
}

/// Program USART0 and reset the ring. Interrupts are disabled for the
/// duration and enabled again on return.
pub fn initialize<R, const N: usize>(regs: R, baud_divisor: u16) -> (Transmitter<R, N>, DrainHandler<R, N>)
where
    R: RegisterFile + Clone,
{
    let ring = Arc::new(TxRing::<N>::new());

    regs.disable_interrupts();
    regs.write(UBRR0H, (baud_divisor >> 8) as u8);
    regs.write(UBRR0L, baud_divisor as u8);
    regs.write(UCSR0B, bv(TXEN0));
    regs.write(UCSR0C, UCSR0C_8N1);
    ring.reset();
    regs.enable_interrupts();

    debug!(baud_divisor, capacity = N - 1, "USART0 transmit pipeline initialized");
    (
        Transmitter { regs: regs.clone(), ring: ring.clone() },
        DrainHandler { regs, ring },
    )
}

/// Foreground half of the pipeline.
pub struct Transmitter<R: RegisterFile, const N: usize = TX_BUFFER_SIZE> {
    regs: R,
    ring: Arc<TxRing<N>>,
}

impl<R: RegisterFile, const N: usize> Transmitter<R, N> {
    /// Queue one byte, spinning while the ring is full.
    ///
    /// Never drops data. Blocks forever if the drain handler never runs
    /// (interrupts disabled or the line is stalled).
    pub fn enqueue(&mut self, byte: u8) {
        while !self.ring.push(byte) {
            core::hint::spin_loop();
        }
        // Written on every call, not just on the IDLE -> ARMED edge
        self.regs.write(UCSR0B, UCSR0B_ARMED);
    }

    /// Queue bytes up to, not including, the first NUL.
    pub fn enqueue_str(&mut self, s: &[u8]) {
        for &b in s.iter().take_while(|&&b| b != 0) {
            self.enqueue(b);
        }
    }

    pub fn state(&self) -> LineState {
        if self.regs.bit_is_set(UCSR0B, UDRIE0) { LineState::Armed } else { LineState::Idle }
    }

    pub fn pending(&self) -> usize {
        self.ring.len()
    }

    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }
}

/// Interrupt half of the pipeline, run on `USART_UDRE`.
pub struct DrainHandler<R: RegisterFile, const N: usize = TX_BUFFER_SIZE> {
    regs: R,
    ring: Arc<TxRing<N>>,
}

impl<R: RegisterFile, const N: usize> DrainHandler<R, N> {
    /// Move one byte to the transmit register, or disarm the interrupt when
    /// the ring is empty. Constant time, never blocks.
    pub fn on_data_register_empty(&mut self) {
        match self.ring.pop() {
            Some(byte) => self.regs.write(UDR0, byte),
            None => {
                self.regs.write(UCSR0B, UCSR0B_IDLE);
                trace!("transmit ring drained");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regs::{SREG, SREG_I, UCSR0A, UDRE0};
    use crate::sim::Board;
    use std::sync::mpsc;
    use std::thread;
    use std::time::{Duration, Instant};

    fn wait_for_wire(board: &Board, len: usize) -> Vec<u8> {
        let deadline = Instant::now() + Duration::from_secs(5);
        while board.wire_len() < len && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        board.wire()
    }

    #[test]
    fn test_initialize_registers() {
        let board = Board::new();
        board.write(UCSR0B, 0xFF);
        let (tx, _drain) = initialize::<_, 64>(board.clone(), 103);
        assert_eq!(board.read(UBRR0H), 0);
        assert_eq!(board.read(UBRR0L), 103);
        assert_eq!(board.read(UCSR0B), bv(TXEN0));
        assert_eq!(board.read(UCSR0C), 0x06);
        assert!(board.bit_is_set(SREG, SREG_I));
        assert_eq!(tx.state(), LineState::Idle);
        assert_eq!(tx.pending(), 0);
        assert_eq!(tx.capacity(), 63);
    }

    #[test]
    fn test_initialize_high_divisor_byte() {
        let board = Board::new();
        let _ = initialize::<_, 64>(board.clone(), 0x0ABC);
        assert_eq!(board.read(UBRR0H), 0x0A);
        assert_eq!(board.read(UBRR0L), 0xBC);
    }

    #[test]
    fn test_manual_drain_fifo() {
        let board = Board::new();
        let (mut tx, mut drain) = initialize::<_, 64>(board.clone(), 103);
        tx.enqueue_str(b"hello");
        assert_eq!(tx.pending(), 5);
        for _ in 0..5 {
            drain.on_data_register_empty();
        }
        assert_eq!(board.wire(), b"hello");
        assert_eq!(tx.state(), LineState::Armed);
        drain.on_data_register_empty();
        assert_eq!(tx.state(), LineState::Idle);
        assert_eq!(tx.pending(), 0);
        assert!(board.bit_is_set(UCSR0A, UDRE0));
    }

    #[test]
    fn test_enqueue_str_stops_at_nul() {
        let board = Board::new();
        let (mut tx, mut drain) = initialize::<_, 64>(board.clone(), 103);
        tx.enqueue_str(b"ab\0cd");
        tx.enqueue_str(b"");
        tx.enqueue_str(b"\0");
        assert_eq!(tx.pending(), 2);
        for _ in 0..3 {
            drain.on_data_register_empty();
        }
        assert_eq!(board.wire(), b"ab");
    }

    #[test]
    fn test_arms_once_from_idle() {
        let board = Board::new();
        let (mut tx, _drain) = initialize::<_, 64>(board.clone(), 103);
        assert_eq!(board.udrie_edges(), (0, 0));
        tx.enqueue(b'x');
        assert_eq!(tx.state(), LineState::Armed);
        assert_eq!(board.read(UCSR0B), UCSR0B_ARMED);
        // Re-arming on every call leaves the register unchanged
        tx.enqueue(b'y');
        tx.enqueue(b'z');
        assert_eq!(board.read(UCSR0B), UCSR0B_ARMED);
        assert_eq!(board.udrie_edges(), (1, 0));
    }

    #[test]
    fn test_disarms_once_when_drained() {
        let board = Board::new();
        let (mut tx, mut drain) = initialize::<_, 64>(board.clone(), 103);
        tx.enqueue_str(b"abc");
        for _ in 0..3 {
            drain.on_data_register_empty();
            assert_eq!(tx.state(), LineState::Armed);
        }
        drain.on_data_register_empty();
        assert_eq!(board.udrie_edges(), (1, 1));
        assert_eq!(board.read(UCSR0B), UCSR0B_IDLE);
        assert_eq!(tx.pending(), 0);

        // Armed again by the next byte
        tx.enqueue(b'd');
        assert_eq!(board.udrie_edges(), (2, 1));
        drain.on_data_register_empty();
        drain.on_data_register_empty();
        assert_eq!(board.udrie_edges(), (2, 2));
        assert_eq!(board.wire(), b"abcd");
    }

    #[test]
    fn test_interrupt_thread_drains_in_order() {
        let board = Board::new();
        let (mut tx, drain) = initialize::<_, 64>(board.clone(), 103);
        let _isr = board.attach_udre(drain, Duration::ZERO);

        let message: Vec<u8> = (0..1000u32).map(|i| b'a' + (i % 26) as u8).collect();
        tx.enqueue_str(&message);
        assert_eq!(wait_for_wire(&board, message.len()), message);

        let deadline = Instant::now() + Duration::from_secs(5);
        while tx.state() != LineState::Idle && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(tx.state(), LineState::Idle);
        assert_eq!(tx.pending(), 0);
    }

    #[test]
    fn test_slow_line_applies_backpressure() {
        let board = Board::new();
        let (mut tx, drain) = initialize::<_, 8>(board.clone(), 103);
        let _isr = board.attach_udre(drain, Duration::from_micros(200));

        let message: Vec<u8> = (0..64u8).collect();
        for &b in &message {
            tx.enqueue(b);
            assert!(tx.pending() <= 7);
        }
        assert_eq!(wait_for_wire(&board, message.len()), message);
    }

    #[test]
    fn test_full_ring_blocks_without_drain() {
        let board = Board::new();
        let (mut tx, drain) = initialize::<_, 64>(board.clone(), 103);

        let (done_tx, done_rx) = mpsc::channel();
        let producer = thread::spawn(move || {
            for i in 0..64u8 {
                tx.enqueue(i);
                let _ = done_tx.send(i);
            }
            tx
        });

        // 63 bytes fit, the 64th spins
        for i in 0..63u8 {
            assert_eq!(done_rx.recv_timeout(Duration::from_secs(5)).unwrap(), i);
        }
        assert!(done_rx.recv_timeout(Duration::from_millis(200)).is_err());
        assert!(board.wire().is_empty());

        // Servicing the interrupt releases the producer with nothing lost
        let _isr = board.attach_udre(drain, Duration::ZERO);
        assert_eq!(done_rx.recv_timeout(Duration::from_secs(5)).unwrap(), 63);
        let tx = producer.join().unwrap();
        assert_eq!(wait_for_wire(&board, 64), (0..64u8).collect::<Vec<u8>>());
        drop(tx);
    }

    #[test]
    fn test_interrupts_masked_blocks_drain() {
        let board = Board::new();
        let (mut tx, drain) = initialize::<_, 64>(board.clone(), 103);
        let _isr = board.attach_udre(drain, Duration::ZERO);
        board.disable_interrupts();
        tx.enqueue_str(b"held");
        thread::sleep(Duration::from_millis(50));
        assert!(board.wire().is_empty());
        board.enable_interrupts();
        assert_eq!(wait_for_wire(&board, 4), b"held");
    }
}
