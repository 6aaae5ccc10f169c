//! Crate-wide error type.

use core::fmt;

/// Errors surfaced by the driver, responder dispatch, and controller API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmxError {
    /// No data arrived within the caller's tick budget.
    Timeout,
    /// Caller contract violation: null buffer, out-of-range port, `pdl > 231`.
    InvalidArgument,
    /// Generic protocol or framing failure (bad checksum, frame error, unexpected start code).
    Protocol(ProtocolFault),
    /// Allocation failure during `install`.
    OutOfMemory,
    /// Feature unimplemented on this hardware target.
    NotSupported,
}

/// Detail carried by [`DmxError::Protocol`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolFault {
    ChecksumMismatch,
    FrameError,
    UnexpectedStartCode,
    MalformedHeader,
    BufferOverrun,
}

impl From<ProtocolFault> for DmxError {
    fn from(fault: ProtocolFault) -> Self {
        DmxError::Protocol(fault)
    }
}

impl fmt::Display for DmxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            DmxError::Timeout => write!(f, "no response within the tick budget"),
            DmxError::InvalidArgument => write!(f, "invalid argument"),
            DmxError::Protocol(fault) => write!(f, "protocol error: {fault:?}"),
            DmxError::OutOfMemory => write!(f, "out of memory"),
            DmxError::NotSupported => write!(f, "not supported on this target"),
        }
    }
}

pub type DmxResult<T> = Result<T, DmxError>;
