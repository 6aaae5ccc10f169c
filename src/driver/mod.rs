//! Per-port driver record, the ISR pump, responder dispatch, and raw slot
//! access (§3, §4.4, §4.5, §10.1).

mod isr;
pub mod raw;
pub mod responder;
pub mod timing;

use log::info;

use crate::config::DmxConfig;
use crate::error::{DmxError, DmxResult};
use crate::hal::{IrqControl, Timer, Uart};
use crate::pd::{self, DeviceInfo, NoopPersist, PdRegistry, PersistHook};
use crate::synch::{Notify, RecursiveMutex, SpinlockIrqSave, TaskControl};
use crate::uid::Uid;

bitflags::bitflags! {
    /// Per-port state bits guarded by the shared spinlock (§3).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DriverFlags: u8 {
        const IS_SENDING     = 1 << 0;
        const IS_IN_BREAK    = 1 << 1;
        const HAS_DATA       = 1 << 2;
        const SENT_LAST      = 1 << 3;
        const TIMER_RUNNING  = 1 << 4;
    }

    /// Classification of the packet currently in the receive buffer.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RdmType: u8 {
        const IS_VALID             = 1 << 0;
        const IS_REQUEST           = 1 << 1;
        const IS_BROADCAST         = 1 << 2;
        const IS_DISC_UNIQUE_BRANCH = 1 << 3;
    }
}

/// States of the single state machine driving both send and receive (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpState {
    Idle,
    RxActive,
    TxBreak,
    TxMab,
    TxData,
}

/// Slot buffer size: start code + 512 data slots.
pub const BUFFER_LEN: usize = 513;
/// Sentinel `head` value meaning "awaiting BREAK".
pub const HEAD_AWAITING_BREAK: isize = -1;

/// State touched by both the ISR pump and task-context callers; guarded by
/// a single [`SpinlockIrqSave`] per the invariant that these fields only
/// ever change together.
pub(crate) struct Shared {
    pub buffer: [u8; BUFFER_LEN],
    pub head: isize,
    pub tx_size: usize,
    pub flags: DriverFlags,
    pub rdm_type: RdmType,
    pub tn: u8,
    pub break_len_us: u32,
    pub mab_len_us: u32,
    pub last_slot_ts_us: u64,
    pub state: PumpState,
    pub frame_error_pending: bool,
    /// Discovery mute latch (§4.6): a muted responder still answers
    /// ordinary GET/SET but is skipped by `DISC_UNIQUE_BRANCH`.
    pub muted: bool,
    /// Set by dispatch when a SET both ACKs and touches a non-volatile PID;
    /// drained on send completion to perform the actual persistence.
    pub pending_persist: Option<(u16, u16)>,
}

impl Shared {
    fn new(break_len_us: u32, mab_len_us: u32) -> Self {
        Shared {
            buffer: [0; BUFFER_LEN],
            head: HEAD_AWAITING_BREAK,
            tx_size: 0,
            flags: DriverFlags::empty(),
            rdm_type: RdmType::empty(),
            tn: 0,
            break_len_us,
            mab_len_us,
            last_slot_ts_us: 0,
            state: PumpState::Idle,
            frame_error_pending: false,
            muted: false,
            pending_persist: None,
        }
    }
}

/// A half-duplex DMX512/RDM port: one UART, one timer, and all the state
/// the ISR pump and responder/controller APIs need (§3). `H` is the
/// non-volatile persistence hook (§10.4); a platform with no such storage
/// uses the default [`NoopPersist`].
pub struct Port<U: Uart, T: Timer, P: IrqControl + TaskControl, H: PersistHook = NoopPersist> {
    pub(crate) uart: SpinlockIrqSave<U, P>,
    pub(crate) timer: SpinlockIrqSave<T, P>,
    pub(crate) shared: SpinlockIrqSave<Shared, P>,
    pub(crate) mutex: RecursiveMutex<P>,
    pub(crate) notify: Notify,
    pub(crate) pd: SpinlockIrqSave<PdRegistry, P>,
    pub(crate) uid: Uid,
    pub(crate) config: DmxConfig,
    pub(crate) persist_hook: H,
}

impl<U: Uart, T: Timer, P: IrqControl + TaskControl, H: PersistHook + Default> Port<U, T, P, H> {
    /// Brings the UART to the required line settings and builds the
    /// driver record. The caller is responsible for wiring `on_uart_interrupt`
    /// / `on_timer_interrupt` to the platform's real interrupt vectors.
    pub fn install(mut uart: U, timer: T, config: DmxConfig) -> DmxResult<Self> {
        let config = config.validate()?;

        uart.set_baud_rate(250_000);
        uart.set_8n2();
        uart.set_rts(true);
        uart.reset_rx_fifo();
        uart.reset_tx_fifo();

        let mut pd = PdRegistry::new(config.queue_size);
        let device_info = DeviceInfo {
            model_id: 0x0001,
            product_category: 0x0000,
            software_version_id: 0x0000_0001,
            footprint: 0,
            current_personality: 1,
            personality_count: 1,
            start_address: pd::DMX_START_ADDRESS_NONE,
            sub_device_count: 0,
            sensor_count: 0,
        };
        pd::install_builtin_parameters(&mut pd, crate::codec::SUB_DEVICE_ROOT, device_info, "rdm-engine-0.1.0");

        info!("install: uid={} break_us={} mab_us={}", config.root_uid, config.break_len_us, config.mab_len_us);

        let port = Port {
            uart: SpinlockIrqSave::new(uart),
            timer: SpinlockIrqSave::new(timer),
            shared: SpinlockIrqSave::new(Shared::new(config.break_len_us, config.mab_len_us)),
            mutex: RecursiveMutex::new(),
            notify: Notify::new(),
            pd: SpinlockIrqSave::new(pd),
            uid: config.root_uid,
            config,
            persist_hook: H::default(),
        };
        // Arms the UART to listen for the first BREAK immediately: a
        // responder is ready to be serviced right after install, and a
        // controller's own request()/discover() calls rearm receive anyway.
        port.begin_receive();
        Ok(port)
    }

    pub fn uninstall(self) {
        info!("uninstall: uid={}", self.uid);
    }

    pub fn uid(&self) -> Uid {
        self.uid
    }

    pub fn config(&self) -> DmxConfig {
        self.config
    }

    pub(crate) fn now_us(&self) -> u64 {
        self.timer.lock().now_us()
    }

    /// Waits for the current receive (or send) to finish, runs dispatch
    /// against whatever was received, and drives the resulting reply (if
    /// any) back through the pump. Meant to be called in a loop from the
    /// task that owns this port; returns once the pump is idle again.
    pub fn service_once(&self, timeout_us: u32) -> DmxResult<()> {
        self.mutex.acquire();
        let result = self.service_once_locked(timeout_us);
        self.mutex.release();
        result
    }

    fn service_once_locked(&self, timeout_us: u32) -> DmxResult<()> {
        self.notify.clear();
        let deadline = self.now_us() + timeout_us as u64;
        let code = loop {
            if let Some(v) = self.notify.poll() {
                break v;
            }
            if self.now_us() >= deadline {
                return Err(DmxError::Timeout);
            }
            core::hint::spin_loop();
        };
        let len = code as usize;

        let mut local = [0u8; BUFFER_LEN];
        {
            let shared = self.shared.lock();
            let n = len.min(shared.buffer.len());
            local[..n].copy_from_slice(&shared.buffer[..n]);
        }

        match self.dispatch(&local, len) {
            responder::DispatchOutcome::RawDmx | responder::DispatchOutcome::NoReply => {
                self.begin_receive();
                Ok(())
            }
            responder::DispatchOutcome::StandardReply => {
                self.begin_send();
                Ok(())
            }
            responder::DispatchOutcome::DubReply { uid, preamble_len } => {
                self.begin_dub_response(uid, preamble_len);
                Ok(())
            }
        }
    }
}
