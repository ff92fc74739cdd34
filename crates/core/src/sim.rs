//! Simulated ATmega328P board.
//!
//! [`Board`] is a cheap, cloneable handle to one shared register file plus
//! the peripheral models behind it. It implements
//! [`RegisterFile`](crate::regs::RegisterFile), so the drivers run against it
//! unchanged.
//!
//! ## Interrupts
//!
//! [`Board::attach_udre`] starts an [`InterruptThread`] that plays the role of
//! the `USART_UDRE` vector: whenever SREG.I and UDRIE0 are both set it runs
//! the handler to completion. While the handler runs, register accesses from
//! any other thread wait, so from the foreground's point of view the handler
//! happens between two of its instructions, as on the real core. Accesses
//! made by the handler itself do not wait.
//!
//! ## Pin mapping
//!
//! | Uno pin | Port | Use                     |
//! |---------|------|-------------------------|
//! | 12      | PB4  | pull-down switch input  |
//! | 13      | PB5  | on-board LED            |
//! | A0–A5   | ADC  | analog inputs           |

use std::cell::Cell;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{trace, warn};

use crate::memory::IoSpace;
use crate::peripherals::{Adc, Usart, INT_USART_UDRE};
use crate::pipeline::DrainHandler;
use crate::regs::{bv, RegisterFile, DDRB, PINB, PORTB, PB5, SREG, SREG_I, UCSR0A, UCSR0B, UDRE0, UDRIE0};
use crate::savestate::BoardState;

thread_local! {
    static IN_INTERRUPT: Cell<bool> = const { Cell::new(false) };
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct BoardInner {
    io: IoSpace,
    adc: Mutex<Adc>,
    usart: Mutex<Usart>,
    /// External levels on port B, seen through PINB for input pins
    pins_b: AtomicU8,
    /// Held while an interrupt handler runs
    cpu: Mutex<()>,
}

#[derive(Clone)]
pub struct Board {
    inner: Arc<BoardInner>,
}

impl Board {
    /// Create a board with all registers in their reset state.
    pub fn new() -> Self {
        let board = Board {
            inner: Arc::new(BoardInner {
                io: IoSpace::new(),
                adc: Mutex::new(Adc::new()),
                usart: Mutex::new(Usart::new()),
                pins_b: AtomicU8::new(0),
                cpu: Mutex::new(()),
            }),
        };
        board.reset();
        board
    }

    /// Zero every register and reset the peripheral models.
    pub fn reset(&self) {
        let _cpu = self.enter();
        let io = &self.inner.io;
        io.load_image(&[0u8; crate::IO_SPACE_SIZE]);
        lock(&self.inner.adc).reset();
        lock(&self.inner.usart).reset(io);
        self.inner.pins_b.store(0, Ordering::SeqCst);
    }

    /// Serialize with a running interrupt handler, unless called from it.
    fn enter(&self) -> Option<MutexGuard<'_, ()>> {
        if IN_INTERRUPT.with(|f| f.get()) {
            None
        } else {
            Some(lock(&self.inner.cpu))
        }
    }

    // ─── Stimulus ───────────────────────────────────────────────────────────

    /// Set the level seen by an ADC channel (clamped to 10 bits on conversion).
    pub fn set_adc_input(&self, channel: u8, value: u16) {
        let mut adc = lock(&self.inner.adc);
        if let Some(slot) = adc.inputs.get_mut(channel as usize) {
            *slot = value;
        }
    }

    pub fn adc_input(&self, channel: u8) -> u16 {
        lock(&self.inner.adc).inputs.get(channel as usize).copied().unwrap_or(0)
    }

    /// Freeze the converter so ADSC never clears. Releasing it finishes the
    /// conversion in progress.
    pub fn set_adc_stalled(&self, stalled: bool) {
        let _cpu = self.enter();
        lock(&self.inner.adc).set_stalled(stalled, &self.inner.io);
    }

    pub fn adc_conversions(&self) -> u64 {
        lock(&self.inner.adc).conversions
    }

    /// Drive an external port B pin (only visible while the pin is an input).
    pub fn set_pin_b(&self, bit: u8, high: bool) {
        if high {
            self.inner.pins_b.fetch_or(bv(bit), Ordering::SeqCst);
        } else {
            self.inner.pins_b.fetch_and(!bv(bit), Ordering::SeqCst);
        }
    }

    // ─── Observation ────────────────────────────────────────────────────────

    /// On-board LED (PB5 driven high as an output).
    pub fn led(&self) -> bool {
        let io = &self.inner.io;
        io.read_raw(DDRB) & bv(PB5) != 0 && io.read_raw(PORTB) & bv(PB5) != 0
    }

    /// Every byte transmitted so far.
    pub fn wire(&self) -> Vec<u8> {
        lock(&self.inner.usart).wire.clone()
    }

    pub fn wire_len(&self) -> usize {
        lock(&self.inner.usart).wire.len()
    }

    /// Remove and return the bytes transmitted so far.
    pub fn take_wire(&self) -> Vec<u8> {
        lock(&self.inner.usart).take_wire()
    }

    /// (enable, disable) edges seen on UDRIE0.
    pub fn udrie_edges(&self) -> (u32, u32) {
        let usart = lock(&self.inner.usart);
        (usart.udrie_enables, usart.udrie_disables)
    }

    /// True when the USART_UDRE vector would be taken.
    pub fn udre_pending(&self) -> bool {
        let io = &self.inner.io;
        io.read_raw(SREG) & bv(SREG_I) != 0
            && io.read_raw(UCSR0B) & bv(UDRIE0) != 0
            && io.read_raw(UCSR0A) & bv(UDRE0) != 0
    }

    // ─── Interrupts ─────────────────────────────────────────────────────────

    /// Run `handler` as the USART_UDRE interrupt until the returned thread
    /// handle is dropped. `byte_time` is how long the line takes to shift one
    /// byte out; zero drains as fast as the host allows.
    pub fn attach_udre<const N: usize>(&self, mut handler: DrainHandler<Board, N>, byte_time: Duration) -> InterruptThread {
        self.attach_interrupt(move || handler.on_data_register_empty(), byte_time)
    }

    /// Run an arbitrary closure as the USART_UDRE interrupt.
    pub fn attach_interrupt<F>(&self, mut handler: F, byte_time: Duration) -> InterruptThread
    where
        F: FnMut() + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let fired = Arc::new(AtomicU64::new(0));
        let board = self.clone();
        let handle = {
            let stop = stop.clone();
            let fired = fired.clone();
            thread::Builder::new()
                .name("usart-udre".into())
                .spawn(move || {
                    IN_INTERRUPT.with(|f| f.set(true));
                    while !stop.load(Ordering::Acquire) {
                        if !board.udre_pending() {
                            thread::yield_now();
                            continue;
                        }
                        {
                            let _cpu = lock(&board.inner.cpu);
                            // Foreground may have masked interrupts meanwhile
                            if !board.udre_pending() {
                                continue;
                            }
                            trace!(vector = INT_USART_UDRE, "interrupt");
                            handler();
                        }
                        fired.fetch_add(1, Ordering::Relaxed);
                        if !byte_time.is_zero() {
                            thread::sleep(byte_time);
                        }
                    }
                })
        };
        let handle = handle.map_err(|e| warn!("interrupt thread did not start: {}", e)).ok();
        InterruptThread { stop, fired, handle }
    }

    // ─── Save state ─────────────────────────────────────────────────────────

    pub fn save_state(&self) -> BoardState {
        let _cpu = self.enter();
        BoardState {
            io: self.inner.io.image(),
            pins_b: self.inner.pins_b.load(Ordering::SeqCst),
            adc: lock(&self.inner.adc).save_state(),
            usart: lock(&self.inner.usart).save_state(),
        }
    }

    pub fn load_state(&self, s: &BoardState) {
        let _cpu = self.enter();
        self.inner.io.load_image(&s.io);
        self.inner.pins_b.store(s.pins_b, Ordering::SeqCst);
        lock(&self.inner.adc).load_state(&s.adc);
        lock(&self.inner.usart).load_state(&s.usart);
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterFile for Board {
    fn read(&self, addr: u16) -> u8 {
        let _cpu = self.enter();
        let io = &self.inner.io;
        match addr {
            PINB => {
                // Output pins read back PORTB, input pins the external level
                let ddr = io.read_raw(DDRB);
                let port = io.read_raw(PORTB);
                (port & ddr) | (self.inner.pins_b.load(Ordering::SeqCst) & !ddr)
            }
            _ => io.read_raw(addr),
        }
    }

    fn write(&self, addr: u16, value: u8) {
        let _cpu = self.enter();
        let io = &self.inner.io;
        if addr == PINB {
            // Writing 1 to PINx toggles PORTx
            io.write_raw(PORTB, io.read_raw(PORTB) ^ value);
            return;
        }
        if lock(&self.inner.adc).write(addr, value, io) {
            return;
        }
        if lock(&self.inner.usart).write(addr, value, io) {
            return;
        }
        io.write_raw(addr, value);
    }
}

/// Handle to a running interrupt thread. Dropping it stops the thread.
pub struct InterruptThread {
    stop: Arc<AtomicBool>,
    fired: Arc<AtomicU64>,
    handle: Option<JoinHandle<()>>,
}

impl InterruptThread {
    /// Number of times the handler has run.
    pub fn fired(&self) -> u64 {
        self.fired.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().map_or(false, |h| !h.is_finished())
    }
}

impl Drop for InterruptThread {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
