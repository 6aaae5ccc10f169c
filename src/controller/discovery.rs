//! Iterative binary-search discovery over the 48-bit UID space (§4.6).
//!
//! Recursion depth in a textbook implementation is bounded by the UID
//! space's bit width (48), so an explicit work stack sized for that bound
//! replaces recursion — no stack overflow risk regardless of how many
//! responders are actually present.

use alloc::vec::Vec;

use log::{debug, trace};

use crate::codec::{self, CommandClass, RdmHeader, SUB_DEVICE_ROOT};
use crate::driver::timing::{self, SpacingSituation};
use crate::driver::{Port, BUFFER_LEN};
use crate::error::{DmxError, DmxResult};
use crate::hal::{IrqControl, Timer, Uart};
use crate::pd::PersistHook;
use crate::synch::TaskControl;
use crate::uid::Uid;

const PID_DISC_UNIQUE_BRANCH: u16 = 0x0001;
const PID_DISC_MUTE: u16 = 0x0002;

/// Upper bound on simultaneous work-stack entries: one push per bit of the
/// UID space in the worst case.
const MAX_STACK_DEPTH: usize = 48;

/// Generous bound on physically transmitting a DISC_UNIQUE_BRANCH/DISC_MUTE
/// request: BREAK + MAB + a short packet at 250 kbaud.
const SEND_COMPLETE_TIMEOUT_US: u32 = 50_000;

enum BranchOutcome {
    NoResponse,
    Found(Uid),
    Collision,
}

impl<U: Uart, T: Timer, P: IrqControl + TaskControl, H: PersistHook> Port<U, T, P, H> {
    /// Runs full-range discovery and returns every responder found, each
    /// successfully muted before the next branch is probed.
    pub fn discover(&self) -> DmxResult<Vec<Uid>> {
        self.mutex.acquire();
        let result = self.discover_locked();
        self.mutex.release();
        result
    }

    fn discover_locked(&self) -> DmxResult<Vec<Uid>> {
        let mut found = Vec::new();
        let mut stack: Vec<(Uid, Uid)> = Vec::with_capacity(MAX_STACK_DEPTH);
        stack.push((Uid::new(0, 1), Uid::MAX));

        while let Some((lower, upper)) = stack.pop() {
            debug_assert!(stack.len() < MAX_STACK_DEPTH, "discovery work stack exceeded its bound");

            if lower > upper {
                continue;
            }

            match self.probe_branch(lower, upper) {
                BranchOutcome::NoResponse => {}
                BranchOutcome::Found(uid) => {
                    if self.mute(uid) {
                        trace!("discover: found and muted {uid}");
                        found.push(uid);
                    } else {
                        debug!("discover: {uid} answered DUB but did not ack mute, dropping");
                    }
                }
                BranchOutcome::Collision => {
                    if lower == upper {
                        continue;
                    }
                    let mid = midpoint(lower, upper);
                    stack.push((mid.next(), upper));
                    stack.push((lower, mid));
                }
            }
        }

        Ok(found)
    }

    fn probe_branch(&self, lower: Uid, upper: Uid) -> BranchOutcome {
        let header = self.disc_header_to(Uid::BROADCAST_ALL, PID_DISC_UNIQUE_BRANCH);
        let mut pd = [0u8; 12];
        pd[0..6].copy_from_slice(&lower.to_wire());
        pd[6..12].copy_from_slice(&upper.to_wire());

        if self.stage_and_send(&header, &pd).is_err() {
            return BranchOutcome::NoResponse;
        }
        if self.wait_for_notify(SEND_COMPLETE_TIMEOUT_US).is_none() {
            return BranchOutcome::NoResponse;
        }
        self.mark_spacing_reference();

        self.begin_receive();
        let Some(len) = self.wait_for_notify(timing::CONTROLLER_RESPONSE_LOST_TIMEOUT_US) else {
            self.mark_spacing_reference();
            self.enforce_spacing(SpacingSituation::DiscoveryNoResponse);
            return BranchOutcome::NoResponse;
        };
        self.mark_spacing_reference();

        let local = self.copy_received(len as usize);

        match codec::decode_dub_response(&local.0, local.1) {
            Ok((uid, _)) => {
                self.enforce_spacing(SpacingSituation::RespondToRequest);
                BranchOutcome::Found(uid)
            }
            Err(_) => {
                self.enforce_spacing(SpacingSituation::DiscoveryNoResponse);
                BranchOutcome::Collision
            }
        }
    }

    /// Sends `DISC_MUTE` to exactly `uid` and returns whether it acked.
    fn mute(&self, uid: Uid) -> bool {
        let header = self.disc_header_to(uid, PID_DISC_MUTE);
        if self.stage_and_send(&header, &[]).is_err() {
            return false;
        }
        if self.wait_for_notify(SEND_COMPLETE_TIMEOUT_US).is_none() {
            return false;
        }
        self.mark_spacing_reference();

        self.begin_receive();
        let Some(len) = self.wait_for_notify(timing::CONTROLLER_RESPONSE_LOST_TIMEOUT_US) else {
            self.mark_spacing_reference();
            self.enforce_spacing(SpacingSituation::RequestNoResponse);
            return false;
        };
        self.mark_spacing_reference();
        self.enforce_spacing(SpacingSituation::RespondToRequest);

        let local = self.copy_received(len as usize);
        let mut pd_out = [0u8; codec::MAX_PDL];
        codec::decode_standard(&local.0, local.1, &mut pd_out)
            .map(|d| d.header.cc == CommandClass::DiscCommandResponse)
            .unwrap_or(false)
    }

    fn disc_header_to(&self, dest: Uid, pid: u16) -> RdmHeader {
        RdmHeader {
            message_len: 0,
            dest_uid: dest,
            src_uid: self.uid(),
            transaction_num: self.next_transaction_num(),
            port_or_response: 1,
            message_count: 0,
            sub_device: SUB_DEVICE_ROOT,
            cc: CommandClass::DiscCommand,
            pid,
        }
    }

    fn stage_and_send(&self, header: &RdmHeader, pd: &[u8]) -> DmxResult<()> {
        {
            let mut shared = self.shared.lock();
            let n = codec::encode_standard(header, pd, &mut shared.buffer).ok_or(DmxError::InvalidArgument)?;
            shared.tx_size = n;
        }
        self.notify.clear();
        self.begin_send();
        Ok(())
    }

    fn copy_received(&self, len: usize) -> ([u8; BUFFER_LEN], usize) {
        let mut local = [0u8; BUFFER_LEN];
        let len = len.min(local.len());
        let shared = self.shared.lock();
        local[..len].copy_from_slice(&shared.buffer[..len]);
        (local, len)
    }
}

fn midpoint(lower: Uid, upper: Uid) -> Uid {
    let lo = ((lower.man_id as u64) << 32) | lower.dev_id as u64;
    let hi = ((upper.man_id as u64) << 32) | upper.dev_id as u64;
    let mid = lo + (hi - lo) / 2;
    Uid::new((mid >> 32) as u16, mid as u32)
}

trait NextUid {
    fn next(self) -> Uid;
}

impl NextUid for Uid {
    fn next(self) -> Uid {
        if self.dev_id == u32::MAX {
            Uid::new(self.man_id + 1, 0)
        } else {
            Uid::new(self.man_id, self.dev_id + 1)
        }
    }
}
