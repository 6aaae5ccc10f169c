//! Responder-side dispatch: the ordered validation pipeline and the
//! discovery/parameter-data handlers it calls into (§4.5, §4.6 discovery
//! semantics as seen from the responder side).

use alloc::vec::Vec;

use log::{debug, trace};

use crate::codec::{self, CommandClass, FrameError, NackReason, RdmHeader, ResponseType, SUB_DEVICE_MAX, SUB_DEVICE_ROOT};
use crate::hal::{IrqControl, Timer, Uart};
use crate::pd::{PersistHook, PID_DEVICE_INFO, PID_DMX_START_ADDRESS, PID_IDENTIFY_DEVICE, PID_SOFTWARE_VERSION_LABEL, PID_SUPPORTED_PARAMETERS};
use crate::synch::TaskControl;
use crate::uid::Uid;

use super::Port;

const PID_DISC_UNIQUE_BRANCH: u16 = 0x0001;
const PID_DISC_MUTE: u16 = 0x0002;
const PID_DISC_UN_MUTE: u16 = 0x0003;

/// PIDs the minimum-required set excludes from its own `SUPPORTED_PARAMETERS`
/// enumeration (ANSI E1.20 §10.5.1): the discovery PIDs never reach the
/// registry at all, and these registered ones are excluded explicitly.
const EXCLUDED_FROM_SUPPORTED_PARAMETERS: [u16; 5] = [
    PID_SUPPORTED_PARAMETERS,
    PID_DEVICE_INFO,
    PID_SOFTWARE_VERSION_LABEL,
    PID_DMX_START_ADDRESS,
    PID_IDENTIFY_DEVICE,
];

/// Outcome of dispatching one received buffer.
pub enum DispatchOutcome {
    /// Not an RDM packet at all; the caller should treat `buffer[..len]` as
    /// a raw DMX frame update.
    RawDmx,
    /// The packet was not addressed to this responder, or was a broadcast
    /// for which no reply is ever sent.
    NoReply,
    /// A standard RDM response is queued in `shared.buffer`/`tx_size` and
    /// ready for `begin_send`.
    StandardReply,
    /// A discovery-unique-branch response is queued via `begin_dub_response`.
    DubReply { uid: Uid, preamble_len: usize },
}

impl<U: Uart, T: Timer, P: IrqControl + TaskControl, H: PersistHook> Port<U, T, P, H> {
    /// Runs the ordered validation pipeline over `buffer[..len]` and, for
    /// requests addressed to this responder, stages the response. Must be
    /// called from task context with the recursive mutex held.
    pub fn dispatch(&self, buffer: &[u8], len: usize) -> DispatchOutcome {
        if len < 2 || buffer[0] != codec::RDM_START_CODE {
            return DispatchOutcome::RawDmx;
        }

        let mut pd_in = [0u8; codec::MAX_PDL];
        let decoded = match codec::decode_standard(buffer, len, &mut pd_in) {
            Ok(d) => d,
            Err(FrameError::ChecksumMismatch) => {
                debug!("dispatch: checksum mismatch, dropping");
                return DispatchOutcome::NoReply;
            }
            Err(_) => return DispatchOutcome::NoReply,
        };
        let header = decoded.header;
        let pd = &pd_in[..decoded.pdl];

        if !header.dest_uid.is_target(&self.uid) {
            return DispatchOutcome::NoReply;
        }
        if !header.cc.is_request() {
            return DispatchOutcome::NoReply;
        }

        let is_broadcast = header.dest_uid.is_broadcast();
        let is_disc_unique_branch = header.cc == CommandClass::DiscCommand && header.pid == PID_DISC_UNIQUE_BRANCH;

        if header.cc == CommandClass::DiscCommand {
            return self.dispatch_discovery(header, pd, is_disc_unique_branch);
        }

        let outcome = self.validate_and_handle(header, pd);

        if is_broadcast {
            // A broadcast request is never acknowledged, no matter what the
            // handler decided (§4.5 post-dispatch policy).
            DispatchOutcome::NoReply
        } else {
            outcome
        }
    }

    fn dispatch_discovery(&self, header: RdmHeader, pd: &[u8], is_disc_unique_branch: bool) -> DispatchOutcome {
        if self.shared.lock().muted && is_disc_unique_branch {
            return DispatchOutcome::NoReply;
        }

        match header.pid {
            PID_DISC_UNIQUE_BRANCH => self.handle_disc_unique_branch(pd),
            PID_DISC_MUTE => {
                self.shared.lock().muted = true;
                self.encode_mute_response(header, true)
            }
            PID_DISC_UN_MUTE => {
                self.shared.lock().muted = false;
                self.encode_mute_response(header, false)
            }
            _ => DispatchOutcome::NoReply,
        }
    }

    fn handle_disc_unique_branch(&self, pd: &[u8]) -> DispatchOutcome {
        if pd.len() < 12 {
            return DispatchOutcome::NoReply;
        }
        let Some(lower) = Uid::from_wire_slice(&pd[0..6]) else {
            return DispatchOutcome::NoReply;
        };
        let Some(upper) = Uid::from_wire_slice(&pd[6..12]) else {
            return DispatchOutcome::NoReply;
        };

        if self.uid >= lower && self.uid <= upper {
            trace!("dispatch: in discovery range, answering DUB");
            DispatchOutcome::DubReply { uid: self.uid, preamble_len: 0 }
        } else {
            DispatchOutcome::NoReply
        }
    }

    /// Builds a `DISC_MUTE`/`DISC_UN_MUTE` response, decoding a real
    /// `binding_uid` from this device's own sub-device count instead of
    /// hardcoding it to NULL: a root device managing sub-devices of its own
    /// reports itself as the binding UID, per ANSI E1.20 §6.6.
    fn encode_mute_response(&self, header: RdmHeader, is_mute: bool) -> DispatchOutcome {
        let sub_device_count = self
            .pd
            .lock()
            .get(SUB_DEVICE_ROOT, PID_DEVICE_INFO)
            .ok()
            .and_then(|bytes| bytes.get(16..18).map(|b| u16::from_be_bytes([b[0], b[1]])))
            .unwrap_or(0);
        let binding_uid = if sub_device_count > 0 { Some(self.uid) } else { None };

        let control_field: u16 = if is_mute { 0x0000 } else { 0x0000 };
        let mut pd = Vec::with_capacity(8);
        pd.extend_from_slice(&control_field.to_be_bytes());
        if let Some(uid) = binding_uid {
            pd.extend_from_slice(&uid.to_wire());
        }

        self.stage_standard_response(header, ResponseType::Ack, &pd)
    }

    /// Shared format-error / PID / command-class / sub-device validation
    /// for everything except `DISC_*` (§4.5).
    fn validate_and_handle(&self, header: RdmHeader, pd: &[u8]) -> DispatchOutcome {
        let port_id = header.port_or_response;
        if pd.len() > codec::MAX_PDL || port_id == 0 || header.src_uid.is_broadcast() {
            debug!("dispatch: FORMAT_ERROR (pdl={} port_id={})", pd.len(), port_id);
            return self.nack(header, NackReason::FormatError);
        }

        let sub_device = if header.sub_device == codec::SUB_DEVICE_ALL { SUB_DEVICE_ROOT } else { header.sub_device };

        let Some(definition) = self.pd.lock().get_definition(sub_device, header.pid).copied() else {
            debug!("dispatch: UNKNOWN_PID pid={:#06x}", header.pid);
            return self.nack(header, NackReason::UnknownPid);
        };

        let supported = match header.cc {
            CommandClass::GetCommand => definition.pid_cc.supports_get(),
            CommandClass::SetCommand => definition.pid_cc.supports_set(),
            _ => false,
        };
        if !supported {
            debug!("dispatch: UNSUPPORTED_COMMAND_CLASS pid={:#06x}", header.pid);
            return self.nack(header, NackReason::UnsupportedCommandClass);
        }

        if !is_valid_sub_device(header.cc, header.sub_device) {
            debug!("dispatch: SUB_DEVICE_OUT_OF_RANGE sub_device={}", header.sub_device);
            return self.nack(header, NackReason::SubDeviceOutOfRange);
        }

        match header.cc {
            CommandClass::GetCommand => self.handle_get(header, sub_device, header.pid),
            CommandClass::SetCommand => self.handle_set(header, sub_device, header.pid, pd),
            _ => unreachable!("DISC_COMMAND routed separately"),
        }
    }

    fn handle_get(&self, header: RdmHeader, sub_device: u16, pid: u16) -> DispatchOutcome {
        if pid == PID_SUPPORTED_PARAMETERS {
            let pids: Vec<u16> = self
                .pd
                .lock()
                .supported_pids(sub_device)
                .filter(|pid| !EXCLUDED_FROM_SUPPORTED_PARAMETERS.contains(pid))
                .collect();
            let mut out = Vec::with_capacity(pids.len() * 2);
            for pid in pids {
                out.extend_from_slice(&pid.to_be_bytes());
            }
            trace!("dispatch: ACK GET SUPPORTED_PARAMETERS ({} pids)", out.len() / 2);
            return self.stage_standard_response(header, ResponseType::Ack, &out);
        }

        let pd = self.pd.lock();
        match pd.get(sub_device, pid) {
            Ok(bytes) => {
                let bytes = bytes.to_vec();
                drop(pd);
                trace!("dispatch: ACK GET pid={:#06x}", pid);
                self.stage_standard_response(header, ResponseType::Ack, &bytes)
            }
            Err(_) => {
                drop(pd);
                self.nack(header, NackReason::DataOutOfRange)
            }
        }
    }

    fn handle_set(&self, header: RdmHeader, sub_device: u16, pid: u16, data: &[u8]) -> DispatchOutcome {
        let non_volatile = self.pd.lock().is_non_volatile(sub_device, pid);
        let result = self.pd.lock().set_and_queue(sub_device, pid, data);
        match result {
            Ok(_) => {
                if non_volatile {
                    self.shared.lock().pending_persist = Some((sub_device, pid));
                }
                trace!("dispatch: ACK SET pid={:#06x}", pid);
                self.stage_standard_response(header, ResponseType::Ack, &[])
            }
            Err(_) => self.nack(header, NackReason::DataOutOfRange),
        }
    }

    fn nack(&self, header: RdmHeader, reason: NackReason) -> DispatchOutcome {
        debug!("dispatch: NACK pid={:#06x} reason={:?}", header.pid, reason);
        let code: u16 = reason.into();
        self.stage_standard_response(header, ResponseType::NackReason, &code.to_be_bytes())
    }

    fn stage_standard_response(&self, header: RdmHeader, response_type: ResponseType, pd: &[u8]) -> DispatchOutcome {
        let Some(response_header) = header.into_response(response_type) else {
            return DispatchOutcome::NoReply;
        };

        let mut shared = self.shared.lock();
        let Some(n) = codec::encode_standard(&response_header, pd, &mut shared.buffer) else {
            return DispatchOutcome::NoReply;
        };
        shared.tx_size = n;
        DispatchOutcome::StandardReply
    }
}

/// True when `sub_device` is addressable by a request of command class `cc`
/// (§4.5: `SUB_DEVICE_ALL` is only valid for `SET_COMMAND`; 1..=512 is
/// always in range regardless of whether a sub-device is actually present).
fn is_valid_sub_device(cc: CommandClass, sub_device: u16) -> bool {
    match sub_device {
        SUB_DEVICE_ROOT => true,
        codec::SUB_DEVICE_ALL => cc == CommandClass::SetCommand,
        n => n <= SUB_DEVICE_MAX,
    }
}
