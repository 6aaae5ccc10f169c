//! RDM wire encoding: standard framing, discovery-response framing, and the
//! parameter-data format mini-language (§4.2).

mod format;
mod header;

pub use format::{decode_pd, encode_pd, FormatError, PdField};
pub use header::{
    CommandClass, NackReason, RdmHeader, ResponseType, HEADER_LEN, MAX_PDL, SUB_DEVICE_ALL,
    SUB_DEVICE_MAX, SUB_DEVICE_ROOT,
};

/// Start code identifying an RDM packet on the DMX wire.
pub const RDM_START_CODE: u8 = 0xcc;
/// Sub-start code of a standard RDM message.
pub const RDM_SUB_START_CODE: u8 = 0x01;

const DUB_DELIMITER: u8 = 0xaa;
const DUB_PREAMBLE_BYTE: u8 = 0xfe;
const MAX_DUB_PREAMBLE: usize = 7;

/// Computes the RDM checksum: the sum of all bytes mod 2^16.
pub fn checksum(bytes: &[u8]) -> u16 {
    bytes.iter().fold(0u16, |acc, &b| acc.wrapping_add(b as u16))
}

/// Encodes a standard RDM packet: `0xCC 0x01`, the 22-byte header body,
/// `pd`, then the big-endian checksum. Returns the number of bytes written.
///
/// `dest` must be at least `HEADER_LEN + pd.len() + 2` bytes.
pub fn encode_standard(header: &RdmHeader, pd: &[u8], dest: &mut [u8]) -> Option<usize> {
    if pd.len() > MAX_PDL {
        return None;
    }
    let total = HEADER_LEN + pd.len() + 2;
    if dest.len() < total {
        return None;
    }

    dest[0] = RDM_START_CODE;
    dest[1] = RDM_SUB_START_CODE;
    header.encode_body(&mut dest[2..HEADER_LEN], pd.len() as u8);
    dest[HEADER_LEN..HEADER_LEN + pd.len()].copy_from_slice(pd);

    let sum = checksum(&dest[..HEADER_LEN + pd.len()]);
    dest[HEADER_LEN + pd.len()..total].copy_from_slice(&sum.to_be_bytes());
    Some(total)
}

/// Decoded view of a received standard RDM packet.
pub struct Decoded {
    pub header: RdmHeader,
    pub pdl: usize,
}

/// Decodes and checksum-verifies a standard RDM packet occupying
/// `buf[..len]`. Parameter data is returned via `pd_out` (must be at least
/// `MAX_PDL` bytes).
pub fn decode_standard(buf: &[u8], len: usize, pd_out: &mut [u8]) -> Result<Decoded, FrameError> {
    if len < HEADER_LEN + 2 {
        return Err(FrameError::Truncated);
    }
    if buf[0] != RDM_START_CODE || buf[1] != RDM_SUB_START_CODE {
        return Err(FrameError::UnexpectedStartCode);
    }

    let header = RdmHeader::decode_body(&buf[2..HEADER_LEN])?;
    let message_len = header.message_len as usize;
    if message_len < HEADER_LEN || message_len + 2 > len {
        return Err(FrameError::LengthMismatch);
    }

    let pdl = message_len - HEADER_LEN;
    if pdl > MAX_PDL || pdl > pd_out.len() {
        return Err(FrameError::LengthMismatch);
    }

    let expected = checksum(&buf[..message_len]);
    let actual = u16::from_be_bytes([buf[message_len], buf[message_len + 1]]);
    if expected != actual {
        return Err(FrameError::ChecksumMismatch);
    }

    pd_out[..pdl].copy_from_slice(&buf[HEADER_LEN..message_len]);
    Ok(Decoded { header, pdl })
}

/// Reason a received buffer could not be decoded as a standard RDM packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    Truncated,
    UnexpectedStartCode,
    LengthMismatch,
    ChecksumMismatch,
    MalformedHeader,
}

impl From<FrameError> for crate::error::DmxError {
    fn from(e: FrameError) -> Self {
        use crate::error::ProtocolFault::*;
        crate::error::DmxError::Protocol(match e {
            FrameError::Truncated | FrameError::LengthMismatch => BufferOverrun,
            FrameError::UnexpectedStartCode => UnexpectedStartCode,
            FrameError::ChecksumMismatch => ChecksumMismatch,
            FrameError::MalformedHeader => MalformedHeader,
        })
    }
}

/// Encodes a discovery-unique-branch response: `preamble_len` bytes of
/// `0xFE`, the `0xAA` delimiter, then the dual-byte-encoded UID and
/// checksum. `preamble_len` is clamped to `[0, 7]`. Returns the number of
/// bytes written; `dest` must be at least `preamble_len + 1 + 16` bytes.
pub fn encode_dub_response(uid: crate::uid::Uid, preamble_len: usize, dest: &mut [u8]) -> Option<usize> {
    let preamble_len = preamble_len.min(MAX_DUB_PREAMBLE);
    let total = preamble_len + 1 + 16;
    if dest.len() < total {
        return None;
    }

    dest[..preamble_len].fill(DUB_PREAMBLE_BYTE);
    dest[preamble_len] = DUB_DELIMITER;

    let wire = uid.to_wire();
    let sum = checksum(&wire);
    let mut plain = [0u8; 8];
    plain[..6].copy_from_slice(&wire);
    plain[6..8].copy_from_slice(&sum.to_be_bytes());

    let out = &mut dest[preamble_len + 1..total];
    for (i, &b) in plain.iter().enumerate() {
        out[2 * i] = b | 0xaa;
        out[2 * i + 1] = b | 0x55;
    }
    Some(total)
}

/// Locates and decodes a discovery-unique-branch response anywhere in
/// `buf[..len]` (a 0-7 byte `0xFE` preamble may precede the delimiter).
/// Returns the decoded UID and the total length of the framed response
/// (preamble + delimiter + 16 dual-byte-encoded bytes).
pub fn decode_dub_response(buf: &[u8], len: usize) -> Result<(crate::uid::Uid, usize), FrameError> {
    let preamble_len = buf[..len.min(MAX_DUB_PREAMBLE + 1)]
        .iter()
        .take_while(|&&b| b == DUB_PREAMBLE_BYTE)
        .count();
    if preamble_len > MAX_DUB_PREAMBLE {
        return Err(FrameError::MalformedHeader);
    }
    if preamble_len >= len || buf[preamble_len] != DUB_DELIMITER {
        return Err(FrameError::MalformedHeader);
    }

    let body_start = preamble_len + 1;
    let total = body_start + 16;
    if len < total {
        return Err(FrameError::Truncated);
    }

    let enc = &buf[body_start..total];
    let mut plain = [0u8; 8];
    for i in 0..8 {
        plain[i] = enc[2 * i] & enc[2 * i + 1];
    }

    let uid = crate::uid::Uid::from_wire(&plain[..6].try_into().unwrap());
    let expected = checksum(&plain[..6]);
    let actual = u16::from_be_bytes([plain[6], plain[7]]);
    if expected != actual {
        return Err(FrameError::ChecksumMismatch);
    }
    Ok((uid, total))
}
