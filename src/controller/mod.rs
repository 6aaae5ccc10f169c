//! Synchronous controller API: blocking request/ack primitives (§4.6).

pub mod discovery;

use alloc::vec::Vec;

use log::{debug, trace};

use crate::codec::{self, CommandClass, NackReason, RdmHeader, ResponseType};
use crate::driver::timing::{self, SpacingSituation};
use crate::driver::{Port, BUFFER_LEN};
use crate::error::{DmxError, DmxResult};
use crate::hal::{IrqControl, Timer, Uart};
use crate::pd::PersistHook;
use crate::synch::TaskControl;

/// A send timeout generous enough for a full BREAK + MAB + 513-slot packet
/// at 250 kbaud; not part of the inter-packet spacing table because it
/// bounds *our own* transmission, not a gap between packets.
const SEND_COMPLETE_TIMEOUT_US: u32 = 50_000;

/// Outcome of a single controller request (§4.6 steps 4-7).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerReply {
    Ack { pd: Vec<u8> },
    AckTimer { estimate_ms: u16 },
    AckOverflow { pd: Vec<u8> },
    Nack(NackReason),
    /// No reply arrived before the responder-response-lost deadline
    /// (or, for a broadcast, no reply was ever expected).
    NoResponse,
}

impl<U: Uart, T: Timer, P: IrqControl + TaskControl, H: PersistHook> Port<U, T, P, H> {
    /// Sends a `GET`/`SET` request and blocks for its acknowledgement,
    /// serializing against any other controller or responder activity on
    /// this port via the recursive mutex.
    pub fn request(&self, mut header: RdmHeader, pd: &[u8]) -> DmxResult<ControllerReply> {
        self.mutex.acquire();
        let result = self.request_locked(&mut header, pd);
        self.mutex.release();
        result
    }

    fn request_locked(&self, header: &mut RdmHeader, pd: &[u8]) -> DmxResult<ControllerReply> {
        let is_broadcast = header.dest_uid.is_broadcast();
        header.transaction_num = self.next_transaction_num();

        {
            let mut shared = self.shared.lock();
            let n = codec::encode_standard(header, pd, &mut shared.buffer).ok_or(DmxError::InvalidArgument)?;
            shared.tx_size = n;
        }

        self.notify.clear();
        self.begin_send();
        if self.wait_for_notify(SEND_COMPLETE_TIMEOUT_US).is_none() {
            return Err(DmxError::Timeout);
        }
        self.mark_spacing_reference();

        if is_broadcast {
            self.enforce_spacing(SpacingSituation::BroadcastSent);
            return Ok(ControllerReply::NoResponse);
        }

        self.begin_receive();
        let Some(len) = self.wait_for_notify(timing::CONTROLLER_RESPONSE_LOST_TIMEOUT_US) else {
            self.enforce_spacing(SpacingSituation::RequestNoResponse);
            return Ok(ControllerReply::NoResponse);
        };
        self.mark_spacing_reference();

        let mut local = [0u8; BUFFER_LEN];
        let len = len as usize;
        {
            let shared = self.shared.lock();
            let n = len.min(shared.buffer.len());
            local[..n].copy_from_slice(&shared.buffer[..n]);
        }

        let mut pd_out = [0u8; codec::MAX_PDL];
        let reply = match codec::decode_standard(&local, len, &mut pd_out) {
            Ok(decoded) if decoded.header.cc == expected_response_cc(header.cc) => {
                decode_reply(decoded.header.port_or_response, &pd_out[..decoded.pdl])
            }
            _ => {
                debug!("request: malformed or mismatched reply, treating as no response");
                ControllerReply::NoResponse
            }
        };
        trace!("request: pid={:#06x} reply={:?}", header.pid, reply);

        self.enforce_spacing(SpacingSituation::RespondToRequest);
        Ok(reply)
    }

    pub(crate) fn next_transaction_num(&self) -> u8 {
        let mut shared = self.shared.lock();
        let tn = shared.tn;
        shared.tn = shared.tn.wrapping_add(1);
        tn
    }

    pub(crate) fn mark_spacing_reference(&self) {
        let now = self.now_us();
        self.shared.lock().last_slot_ts_us = now;
    }

    pub(crate) fn enforce_spacing(&self, situation: SpacingSituation) {
        let last_ts = self.shared.lock().last_slot_ts_us;
        loop {
            let now = self.now_us();
            let remaining = timing::remaining_wait_us(now, last_ts, situation);
            if remaining == 0 {
                break;
            }
            core::hint::spin_loop();
        }
    }

    /// Busy-waits (polling [`crate::synch::Notify`]) for the pump to finish
    /// its current send or receive, returning the notification code.
    pub(crate) fn wait_for_notify(&self, timeout_us: u32) -> Option<u32> {
        let deadline = self.now_us() + timeout_us as u64;
        loop {
            if let Some(v) = self.notify.poll() {
                self.notify.clear();
                return Some(v);
            }
            if self.now_us() >= deadline {
                return None;
            }
            core::hint::spin_loop();
        }
    }
}

fn expected_response_cc(request_cc: CommandClass) -> CommandClass {
    request_cc.response().unwrap_or(request_cc)
}

fn decode_reply(response_type_byte: u8, pd: &[u8]) -> ControllerReply {
    match ResponseType::try_from(response_type_byte) {
        Ok(ResponseType::Ack) => ControllerReply::Ack { pd: pd.to_vec() },
        Ok(ResponseType::AckTimer) => {
            let estimate_ms = pd.get(0..2).map(|b| u16::from_be_bytes([b[0], b[1]])).unwrap_or(0);
            ControllerReply::AckTimer { estimate_ms }
        }
        Ok(ResponseType::AckOverflow) => ControllerReply::AckOverflow { pd: pd.to_vec() },
        Ok(ResponseType::NackReason) => {
            let code = pd.get(0..2).map(|b| u16::from_be_bytes([b[0], b[1]])).unwrap_or(0);
            NackReason::try_from(code).map(ControllerReply::Nack).unwrap_or(ControllerReply::NoResponse)
        }
        Err(_) => ControllerReply::NoResponse,
    }
}
