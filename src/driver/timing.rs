//! Inter-packet timing constants and spacing arithmetic (§4.7).

/// After a controller sent a DUB and got no response.
pub const DISCOVERY_NO_RESPONSE_PACKET_SPACING_US: u32 = 5_800;
/// After a controller sent a broadcast non-DUB packet.
pub const BROADCAST_PACKET_SPACING_US: u32 = 176;
/// After a controller sent a request and has not yet seen a reply.
pub const REQUEST_NO_RESPONSE_PACKET_SPACING_US: u32 = 3_000;
/// After a controller received a valid RDM reply.
pub const RESPOND_TO_REQUEST_PACKET_SPACING_US: u32 = 176;
/// Deadline by which a controller must receive a response.
pub const CONTROLLER_RESPONSE_LOST_TIMEOUT_US: u32 = 2_800;
/// Deadline by which a responder must begin its reply.
pub const RESPONDER_RESPONSE_LOST_TIMEOUT_US: u32 = 2_000;

/// Situations that gate a subsequent `send` on a minimum spacing since
/// `last_slot_ts`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpacingSituation {
    DiscoveryNoResponse,
    BroadcastSent,
    RequestNoResponse,
    RespondToRequest,
}

impl SpacingSituation {
    pub const fn spacing_us(self) -> u32 {
        match self {
            SpacingSituation::DiscoveryNoResponse => DISCOVERY_NO_RESPONSE_PACKET_SPACING_US,
            SpacingSituation::BroadcastSent => BROADCAST_PACKET_SPACING_US,
            SpacingSituation::RequestNoResponse => REQUEST_NO_RESPONSE_PACKET_SPACING_US,
            SpacingSituation::RespondToRequest => RESPOND_TO_REQUEST_PACKET_SPACING_US,
        }
    }
}

/// Microseconds a caller must still wait before `now` satisfies the
/// required spacing since `last_slot_ts`. `0` if the spacing is already
/// satisfied. Saturates rather than wrapping on clock anomalies.
pub fn remaining_wait_us(now_us: u64, last_slot_ts_us: u64, situation: SpacingSituation) -> u32 {
    let elapsed = now_us.saturating_sub(last_slot_ts_us);
    let required = situation.spacing_us() as u64;
    if elapsed >= required {
        0
    } else {
        (required - elapsed) as u32
    }
}
