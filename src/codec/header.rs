//! RDM header layout and the small enums that appear in it (§3, §4.2.1).

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::uid::Uid;

/// Fixed size of the RDM header on the wire, including the leading
/// `0xCC 0x01` start codes.
pub const HEADER_LEN: usize = 24;
/// Largest parameter-data length a standard RDM packet may carry.
pub const MAX_PDL: usize = 231;

/// Command class: the action a request packet specifies, or the response
/// counterpart to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum CommandClass {
    DiscCommand = 0x10,
    DiscCommandResponse = 0x11,
    GetCommand = 0x20,
    GetCommandResponse = 0x21,
    SetCommand = 0x30,
    SetCommandResponse = 0x31,
}

impl CommandClass {
    /// True for `GET_COMMAND`/`SET_COMMAND`/`DISC_COMMAND`: a request, not a response.
    pub const fn is_request(self) -> bool {
        matches!(
            self,
            CommandClass::DiscCommand | CommandClass::GetCommand | CommandClass::SetCommand
        )
    }

    /// The response command class for a request class (request + 1, per §4.5).
    pub const fn response(self) -> Option<CommandClass> {
        match self {
            CommandClass::DiscCommand => Some(CommandClass::DiscCommandResponse),
            CommandClass::GetCommand => Some(CommandClass::GetCommandResponse),
            CommandClass::SetCommand => Some(CommandClass::SetCommandResponse),
            _ => None,
        }
    }
}

/// Acknowledgement type carried by a response packet's `response_type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum ResponseType {
    Ack = 0x00,
    AckTimer = 0x01,
    NackReason = 0x02,
    AckOverflow = 0x03,
}

/// Reason a responder declined to service a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u16)]
pub enum NackReason {
    UnknownPid = 0x0000,
    FormatError = 0x0001,
    HardwareFault = 0x0002,
    ProxyReject = 0x0003,
    WriteProtect = 0x0004,
    UnsupportedCommandClass = 0x0005,
    DataOutOfRange = 0x0006,
    BufferFull = 0x0007,
    PacketSizeUnsupported = 0x0008,
    SubDeviceOutOfRange = 0x0009,
    ProxyBufferFull = 0x000a,
}

/// Sub-device addressing a root device (`0`) or all of a device's
/// sub-devices (`0xFFFF`).
pub const SUB_DEVICE_ROOT: u16 = 0;
pub const SUB_DEVICE_ALL: u16 = 0xffff;
/// Highest individually addressable sub-device number (§8 boundary: 512 is
/// valid, 513 is not).
pub const SUB_DEVICE_MAX: u16 = 512;

/// Host-order representation of the 24-byte RDM header (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RdmHeader {
    /// Total message length including this header, set by the codec on encode.
    pub message_len: u8,
    pub dest_uid: Uid,
    pub src_uid: Uid,
    pub transaction_num: u8,
    /// Port ID (request) or response type (response); role-dependent per §3.
    pub port_or_response: u8,
    pub message_count: u8,
    pub sub_device: u16,
    pub cc: CommandClass,
    pub pid: u16,
}

impl RdmHeader {
    /// Encodes the 22-byte header body (everything after the two start
    /// codes) into `dest`, which must be exactly `HEADER_LEN - 2` bytes.
    pub fn encode_body(&self, dest: &mut [u8], pdl: u8) {
        let message_len = (HEADER_LEN as u8).wrapping_add(pdl);
        dest[0] = message_len;
        dest[1..7].copy_from_slice(&self.dest_uid.to_wire());
        dest[7..13].copy_from_slice(&self.src_uid.to_wire());
        dest[13] = self.transaction_num;
        dest[14] = self.port_or_response;
        dest[15] = self.message_count;
        dest[16..18].copy_from_slice(&self.sub_device.to_be_bytes());
        dest[18] = self.cc.into();
        dest[19..21].copy_from_slice(&self.pid.to_be_bytes());
        dest[21] = pdl;
    }

    /// Decodes the 22-byte header body. `body` must be exactly `HEADER_LEN - 2` bytes.
    pub fn decode_body(body: &[u8]) -> Result<Self, super::FrameError> {
        if body.len() != HEADER_LEN - 2 {
            return Err(super::FrameError::Truncated);
        }
        let cc = CommandClass::try_from(body[18]).map_err(|_| super::FrameError::MalformedHeader)?;
        Ok(RdmHeader {
            message_len: body[0],
            dest_uid: Uid::from_wire_slice(&body[1..7]).ok_or(super::FrameError::MalformedHeader)?,
            src_uid: Uid::from_wire_slice(&body[7..13]).ok_or(super::FrameError::MalformedHeader)?,
            transaction_num: body[13],
            port_or_response: body[14],
            message_count: body[15],
            sub_device: u16::from_be_bytes([body[16], body[17]]),
            cc,
            pid: u16::from_be_bytes([body[19], body[20]]),
        })
    }

    /// Builds the response header for a request, per §4.5: swap src/dest,
    /// advance the command class, preserve sub-device/PID/transaction number.
    pub fn into_response(self, response_type: ResponseType) -> Option<Self> {
        Some(RdmHeader {
            message_len: 0,
            dest_uid: self.src_uid,
            src_uid: self.dest_uid,
            transaction_num: self.transaction_num,
            port_or_response: response_type as u8,
            message_count: 0,
            sub_device: self.sub_device,
            cc: self.cc.response()?,
            pid: self.pid,
        })
    }
}
