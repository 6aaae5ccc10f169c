//! In-memory fake UART/timer harness.
//!
//! Timing is simulated, not real: a [`SimClock`] is just a counter an
//! orchestrator thread advances in small logical ticks, and the BREAK/MAB/
//! byte-shift-out sequencing that real hardware would signal via interrupts
//! is driven by that same orchestrator polling shared, thread-safe wire
//! state and calling `Port::on_uart_interrupt`/`on_timer_interrupt`
//! directly. No test sleeps on wall-clock time.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use rdm_engine::hal::{IrqControl, Timer, Uart, UartInterrupt};
use rdm_engine::synch::TaskControl;

#[derive(Clone, Default)]
pub struct SimClock(Arc<Mutex<u64>>);

impl SimClock {
    pub fn new() -> Self {
        SimClock(Arc::new(Mutex::new(0)))
    }

    pub fn advance(&self, us: u64) {
        *self.0.lock().unwrap() += us;
    }

    pub fn now(&self) -> u64 {
        *self.0.lock().unwrap()
    }
}

/// One direction of a half-duplex wire, plus the edge-triggered conditions
/// that a real UART would expose as separate interrupt flags.
#[derive(Default)]
pub struct Wire {
    pub bytes: VecDeque<u8>,
    pub break_pending: bool,
    pub frame_error_pending: bool,
    pub rx_timeout_pending: bool,
    pub tx_done_pending: bool,
}

pub type WireHandle = Arc<Mutex<Wire>>;

pub struct FakeLink {
    pub clock: SimClock,
    pub a_to_b: WireHandle,
    pub b_to_a: WireHandle,
}

impl FakeLink {
    pub fn new() -> Self {
        FakeLink {
            clock: SimClock::new(),
            a_to_b: Arc::new(Mutex::new(Wire::default())),
            b_to_a: Arc::new(Mutex::new(Wire::default())),
        }
    }

    pub fn station_a(&self) -> FakeUart {
        FakeUart::new(self.a_to_b.clone(), self.b_to_a.clone())
    }

    pub fn station_b(&self) -> FakeUart {
        FakeUart::new(self.b_to_a.clone(), self.a_to_b.clone())
    }
}

pub struct FakeUart {
    tx: WireHandle,
    rx: WireHandle,
    enabled: UartInterrupt,
    in_break: bool,
}

impl FakeUart {
    fn new(tx: WireHandle, rx: WireHandle) -> Self {
        FakeUart { tx, rx, enabled: UartInterrupt::empty(), in_break: false }
    }
}

impl Uart for FakeUart {
    fn set_baud_rate(&mut self, _baud: u32) {}
    fn set_8n2(&mut self) {}
    fn set_rts(&mut self, _receive: bool) {}

    fn invert_tx(&mut self, inverted: bool) {
        if inverted {
            self.in_break = true;
        } else if self.in_break {
            self.in_break = false;
            // BREAK just ended: the far end sees it as a BRK_DETECTED edge.
            self.tx.lock().unwrap().break_pending = true;
        }
    }

    fn rx_fifo_len(&self) -> usize {
        self.rx.lock().unwrap().bytes.len()
    }

    fn read_rx_fifo(&mut self, dest: &mut [u8]) -> usize {
        let mut rx = self.rx.lock().unwrap();
        let n = dest.len().min(rx.bytes.len());
        for slot in dest.iter_mut().take(n) {
            *slot = rx.bytes.pop_front().unwrap();
        }
        n
    }

    fn reset_rx_fifo(&mut self) {
        self.rx.lock().unwrap().bytes.clear();
    }

    fn tx_fifo_len(&self) -> usize {
        0
    }

    fn write_tx_fifo(&mut self, src: &[u8]) -> usize {
        self.tx.lock().unwrap().bytes.extend(src.iter().copied());
        src.len()
    }

    fn reset_tx_fifo(&mut self) {
        self.tx.lock().unwrap().bytes.clear();
    }

    fn enable_interrupts(&mut self, mask: UartInterrupt) {
        self.enabled.insert(mask);
    }

    fn disable_interrupts(&mut self, mask: UartInterrupt) {
        self.enabled.remove(mask);
    }

    fn interrupt_status(&self) -> UartInterrupt {
        let mut status = UartInterrupt::empty();
        {
            let rx = self.rx.lock().unwrap();
            if !rx.bytes.is_empty() {
                status.insert(UartInterrupt::RX_FIFO_FULL);
            }
            if rx.break_pending {
                status.insert(UartInterrupt::BRK_DETECTED);
            }
            if rx.frame_error_pending {
                status.insert(UartInterrupt::FRAME_ERR);
            }
            if rx.rx_timeout_pending {
                status.insert(UartInterrupt::RX_TIMEOUT);
            }
        }
        {
            let tx = self.tx.lock().unwrap();
            if tx.tx_done_pending {
                status.insert(UartInterrupt::TX_DONE);
            }
        }
        status.insert(UartInterrupt::TX_FIFO_EMPTY);
        status & self.enabled
    }

    fn clear_interrupts(&mut self, mask: UartInterrupt) {
        if mask.contains(UartInterrupt::BRK_DETECTED) {
            self.rx.lock().unwrap().break_pending = false;
        }
        if mask.contains(UartInterrupt::FRAME_ERR) {
            self.rx.lock().unwrap().frame_error_pending = false;
        }
        if mask.contains(UartInterrupt::RX_TIMEOUT) {
            self.rx.lock().unwrap().rx_timeout_pending = false;
        }
        if mask.contains(UartInterrupt::TX_DONE) {
            self.tx.lock().unwrap().tx_done_pending = false;
        }
    }
}

#[derive(Clone, Default)]
pub struct TimerHandle(Arc<Mutex<Option<u64>>>);

impl TimerHandle {
    pub fn due(&self, clock: &SimClock) -> bool {
        self.0.lock().unwrap().is_some_and(|d| clock.now() >= d)
    }
}

pub struct FakeTimer {
    clock: SimClock,
    deadline: Arc<Mutex<Option<u64>>>,
}

impl FakeTimer {
    pub fn new(clock: SimClock) -> (Self, TimerHandle) {
        let deadline = Arc::new(Mutex::new(None));
        let handle = TimerHandle(deadline.clone());
        (FakeTimer { clock, deadline }, handle)
    }
}

impl Timer for FakeTimer {
    fn now_us(&self) -> u64 {
        self.clock.now()
    }

    fn arm(&mut self, delay_us: u32) {
        *self.deadline.lock().unwrap() = Some(self.clock.now() + delay_us as u64);
    }

    fn stop(&mut self) {
        *self.deadline.lock().unwrap() = None;
    }

    fn is_running(&self) -> bool {
        self.deadline.lock().unwrap().is_some()
    }
}

/// Never actually contends across real threads in these tests (each port
/// is driven by at most one caller at a time), so blocking is a spin.
pub struct HostPlatform;

impl IrqControl for HostPlatform {
    fn disable() -> bool {
        true
    }
    fn restore(_was_enabled: bool) {}
}

impl TaskControl for HostPlatform {
    type TaskId = ();
    fn current_task_id() -> Self::TaskId {}
    fn block_current_task() {
        std::thread::yield_now();
    }
    fn wake(_task: ()) {}
}

/// Drives both ports' interrupt entry points until `done()` reports the
/// background call has finished, advancing the simulated clock by one
/// logical tick per iteration. Once a sender's bytes land on the wire, the
/// orchestrator immediately signals `TX_DONE` to the sender and
/// `RX_TIMEOUT` to the receiver: this harness has no per-byte timing model,
/// so a whole frame is delivered as a single unit.
pub struct Orchestrator<'a> {
    pub clock: SimClock,
    pub a_to_b: WireHandle,
    pub b_to_a: WireHandle,
    pub timer_a: TimerHandle,
    pub timer_b: TimerHandle,
    pub on_uart_a: Box<dyn Fn() + 'a>,
    pub on_uart_b: Box<dyn Fn() + 'a>,
    pub on_timer_a: Box<dyn Fn() + 'a>,
    pub on_timer_b: Box<dyn Fn() + 'a>,
}

impl<'a> Orchestrator<'a> {
    pub fn run(&self, mut done: impl FnMut() -> bool) {
        const MAX_TICKS: u64 = 5_000_000;
        for _ in 0..MAX_TICKS {
            if done() {
                return;
            }

            self.clock.advance(1);

            if self.timer_a.due(&self.clock) {
                (self.on_timer_a)();
            }
            if self.timer_b.due(&self.clock) {
                (self.on_timer_b)();
            }

            self.settle_frame(&self.a_to_b);
            self.settle_frame(&self.b_to_a);

            (self.on_uart_a)();
            (self.on_uart_b)();

            std::thread::yield_now();
        }
        panic!("orchestrator exceeded its tick budget without the background call finishing");
    }

    fn settle_frame(&self, wire: &WireHandle) {
        let mut w = wire.lock().unwrap();
        if !w.bytes.is_empty() && !w.rx_timeout_pending && !w.tx_done_pending {
            w.tx_done_pending = true;
            w.rx_timeout_pending = true;
        }
    }
}
