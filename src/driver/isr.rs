//! The ISR pump: one state machine driving both the receive path and the
//! send path of a half-duplex port (§4.4).
//!
//! Both `on_uart_interrupt` and `on_timer_interrupt` are meant to be called
//! directly from the platform's real interrupt vectors, with interrupts
//! already masked at the level the driver runs at — they touch `shared`
//! without going through `SpinlockIrqSave::lock`, matching the invariant
//! documented on that type.

use log::{trace, warn};

use crate::codec::{self, CommandClass, RDM_START_CODE, RDM_SUB_START_CODE};
use crate::hal::{IrqControl, Timer, Uart, UartInterrupt};
use crate::pd::PersistHook;
use crate::synch::TaskControl;
use crate::uid::Uid;

use super::{DriverFlags, Port, PumpState, RdmType, BUFFER_LEN, HEAD_AWAITING_BREAK};

/// PID of `DISC_UNIQUE_BRANCH`, the one PID classified straight out of the
/// ISR so the send path can pick dual-byte-encoded framing over standard
/// framing without waiting for task-context dispatch.
const PID_DISC_UNIQUE_BRANCH: u16 = 0x0001;

impl<U: Uart, T: Timer, P: IrqControl + TaskControl, H: PersistHook> Port<U, T, P, H> {
    /// Starts a standard RDM (or raw DMX) transmission of `shared.buffer[..tx_size]`.
    /// Called from task context with `shared` already populated and the
    /// recursive mutex held by the caller.
    pub(crate) fn begin_send(&self) {
        let mut uart = self.uart.lock();
        let mut timer = self.timer.lock();
        let mut shared = self.shared.lock();

        uart.disable_interrupts(UartInterrupt::all());
        uart.set_rts(false);
        uart.invert_tx(true);

        shared.flags.insert(DriverFlags::IS_SENDING | DriverFlags::IS_IN_BREAK);
        shared.flags.remove(DriverFlags::SENT_LAST);
        shared.state = PumpState::TxBreak;
        trace!("pump: idle -> tx_break");

        timer.arm(shared.break_len_us);
        shared.flags.insert(DriverFlags::TIMER_RUNNING);
    }

    /// Starts a DUB response send: unframed, no BREAK, dual-byte encoded.
    pub(crate) fn begin_dub_response(&self, uid: Uid, preamble_len: usize) {
        let mut buf = [0u8; 24];
        let n = codec::encode_dub_response(uid, preamble_len, &mut buf).expect("dub buffer sized for max preamble");

        let mut uart = self.uart.lock();
        let mut shared = self.shared.lock();
        shared.buffer[..n].copy_from_slice(&buf[..n]);
        shared.tx_size = n;
        shared.flags.insert(DriverFlags::IS_SENDING);
        shared.flags.remove(DriverFlags::IS_IN_BREAK | DriverFlags::SENT_LAST);
        shared.state = PumpState::TxData;
        trace!("pump: idle -> tx_data (dub response)");

        uart.set_rts(false);
        uart.invert_tx(false);
        let written = uart.write_tx_fifo(&shared.buffer[..n.min(shared.tx_size)]);
        let _ = written;
        uart.enable_interrupts(UartInterrupt::TX_FIFO_EMPTY | UartInterrupt::TX_DONE);
    }

    /// Rearms receive mode: clears buffer bookkeeping and waits for BREAK.
    pub(crate) fn begin_receive(&self) {
        let mut uart = self.uart.lock();
        let mut shared = self.shared.lock();
        shared.head = HEAD_AWAITING_BREAK;
        shared.rdm_type = RdmType::empty();
        shared.flags.remove(DriverFlags::IS_SENDING | DriverFlags::IS_IN_BREAK | DriverFlags::HAS_DATA);
        shared.state = PumpState::Idle;
        uart.set_rts(true);
        uart.invert_tx(false);
        uart.reset_rx_fifo();
        uart.enable_interrupts(UartInterrupt::BRK_DETECTED | UartInterrupt::RX_TIMEOUT | UartInterrupt::FRAME_ERR);
    }

    /// Entry point for the platform's UART interrupt vector.
    pub fn on_uart_interrupt(&self) {
        let status = {
            let uart = self.uart.lock();
            uart.interrupt_status()
        };

        if status.contains(UartInterrupt::FRAME_ERR) {
            self.handle_frame_error();
        }
        if status.contains(UartInterrupt::BRK_DETECTED) {
            self.handle_break_detected();
        }
        if status.contains(UartInterrupt::RX_FIFO_FULL) {
            self.handle_rx_fifo_full();
        }
        if status.contains(UartInterrupt::RX_TIMEOUT) {
            self.handle_rx_timeout();
        }
        if status.contains(UartInterrupt::TX_FIFO_EMPTY) {
            self.handle_tx_fifo_empty();
        }
        if status.contains(UartInterrupt::TX_DONE) {
            self.handle_tx_done();
        }

        let mut uart = self.uart.lock();
        uart.clear_interrupts(status);
    }

    /// Entry point for the platform's one-shot alarm vector, which times
    /// the BREAK and MAB phases of the send path.
    pub fn on_timer_interrupt(&self) {
        let mut timer = self.timer.lock();
        timer.stop();
        drop(timer);

        let next = {
            let shared = self.shared.lock();
            shared.state
        };

        match next {
            PumpState::TxBreak => self.advance_break_to_mab(),
            PumpState::TxMab => self.advance_mab_to_data(),
            _ => {}
        }
    }

    fn advance_break_to_mab(&self) {
        let mut uart = self.uart.lock();
        let mut timer = self.timer.lock();
        let mut shared = self.shared.lock();

        uart.invert_tx(false);
        shared.flags.remove(DriverFlags::IS_IN_BREAK);
        shared.state = PumpState::TxMab;
        trace!("pump: tx_break -> tx_mab");
        timer.arm(shared.mab_len_us);
    }

    fn advance_mab_to_data(&self) {
        let mut uart = self.uart.lock();
        let mut shared = self.shared.lock();

        shared.state = PumpState::TxData;
        trace!("pump: tx_mab -> tx_data");
        let tx_size = shared.tx_size;
        let written = uart.write_tx_fifo(&shared.buffer[..tx_size]);
        shared.head = written as isize;
        uart.enable_interrupts(UartInterrupt::TX_FIFO_EMPTY | UartInterrupt::TX_DONE);
    }

    fn handle_tx_fifo_empty(&self) {
        let mut uart = self.uart.lock();
        let mut shared = self.shared.lock();
        if (shared.head as usize) >= shared.tx_size {
            return;
        }
        let start = shared.head as usize;
        let written = uart.write_tx_fifo(&shared.buffer[start..shared.tx_size]);
        shared.head += written as isize;
    }

    fn handle_tx_done(&self) {
        let mut uart = self.uart.lock();
        let mut shared = self.shared.lock();
        if (shared.head as usize) < shared.tx_size {
            // Spurious: more bytes queued than the FIFO has drained.
            return;
        }

        uart.disable_interrupts(UartInterrupt::TX_FIFO_EMPTY | UartInterrupt::TX_DONE);
        shared.flags.remove(DriverFlags::IS_SENDING);
        shared.flags.insert(DriverFlags::SENT_LAST);
        shared.state = PumpState::Idle;
        let last_ts = shared.last_slot_ts_us;
        let _ = last_ts;
        let pending = shared.pending_persist.take();
        drop(shared);
        drop(uart);

        if let Some((sub_device, pid)) = pending {
            if self.persist_hook.persist(sub_device, pid).is_err() {
                warn!("persist: failed to write through sub_device={sub_device} pid={pid:#06x}");
            }
        }

        self.notify.notify_from_isr(0);
    }

    fn handle_break_detected(&self) {
        let mut shared = self.shared.lock();
        shared.head = HEAD_AWAITING_BREAK;
        shared.rdm_type = RdmType::empty();
        shared.flags.remove(DriverFlags::HAS_DATA);
        shared.state = PumpState::RxActive;
        drop(shared);

        let mut uart = self.uart.lock();
        uart.reset_rx_fifo();
        uart.enable_interrupts(UartInterrupt::RX_FIFO_FULL);
    }

    fn handle_frame_error(&self) {
        let mut shared = self.shared.lock();
        shared.frame_error_pending = true;
        shared.head = HEAD_AWAITING_BREAK;
        shared.state = PumpState::Idle;
    }

    fn handle_rx_fifo_full(&self) {
        let mut uart = self.uart.lock();
        let mut shared = self.shared.lock();

        if shared.head == HEAD_AWAITING_BREAK {
            shared.head = 0;
        }
        let head = shared.head as usize;
        if head >= BUFFER_LEN {
            return;
        }
        let n = uart.read_rx_fifo(&mut shared.buffer[head..]);
        shared.head += n as isize;

        if shared.head as usize >= BUFFER_LEN {
            self.finish_receive(&mut shared);
        }
    }

    fn handle_rx_timeout(&self) {
        let mut shared = self.shared.lock();
        if shared.head <= 0 {
            shared.head = HEAD_AWAITING_BREAK;
            return;
        }
        self.finish_receive(&mut shared);
    }

    fn finish_receive(&self, shared: &mut super::Shared) {
        let len = (shared.head.max(0)) as usize;
        shared.tx_size = len;
        shared.flags.insert(DriverFlags::HAS_DATA);
        shared.state = PumpState::Idle;

        shared.rdm_type = classify(&shared.buffer, len, self.uid);
        trace!("pump: rx_active -> idle (len={})", len);

        self.notify.notify_from_isr(len as u32);
    }
}

/// Classifies a received buffer without fully decoding it: just enough to
/// decide `is_target`/broadcast/request/DUB for the task-context dispatcher.
fn classify(buffer: &[u8], len: usize, local_uid: Uid) -> RdmType {
    if len < 2 || buffer[0] != RDM_START_CODE || buffer[1] != RDM_SUB_START_CODE {
        return RdmType::empty();
    }

    let mut pd_out = [0u8; codec::MAX_PDL];
    let Ok(decoded) = codec::decode_standard(buffer, len, &mut pd_out) else {
        return RdmType::empty();
    };

    let mut flags = RdmType::IS_VALID;
    if decoded.header.cc.is_request() {
        flags.insert(RdmType::IS_REQUEST);
    }
    if !decoded.header.dest_uid.is_target(&local_uid) {
        return flags;
    }
    if decoded.header.dest_uid.is_broadcast() {
        flags.insert(RdmType::IS_BROADCAST);
    }
    if decoded.header.cc == CommandClass::DiscCommand && decoded.header.pid == PID_DISC_UNIQUE_BRANCH {
        flags.insert(RdmType::IS_DISC_UNIQUE_BRANCH);
    }
    flags
}
