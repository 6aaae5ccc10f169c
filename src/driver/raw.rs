//! Raw (non-RDM) DMX slot access (§10.1).
//!
//! These accessors share the same slot buffer, spinlock, and recursive
//! mutex as the RDM path: a raw `write` and an in-flight RDM send cannot
//! race each other.

use crate::error::{DmxError, DmxResult};
use crate::hal::{IrqControl, Timer, Uart};
use crate::pd::PersistHook;
use crate::synch::TaskControl;

use super::Port;

impl<U: Uart, T: Timer, P: IrqControl + TaskControl, H: PersistHook> Port<U, T, P, H> {
    /// Copies the full 512-slot frame (slot 0 is the DMX start code) into
    /// `dest`, returning the number of slots copied.
    pub fn read(&self, dest: &mut [u8]) -> usize {
        self.mutex.acquire();
        let n = {
            let shared = self.shared.lock();
            let n = dest.len().min(shared.buffer.len());
            dest[..n].copy_from_slice(&shared.buffer[..n]);
            n
        };
        self.mutex.release();
        n
    }

    /// Copies `dest.len()` slots starting at `offset` (1-indexed data slots,
    /// slot 0 is the start code and is not addressable here), returning the
    /// number of slots actually copied (0 if `offset` is out of range).
    pub fn read_offset(&self, offset: usize, dest: &mut [u8]) -> usize {
        if offset == 0 || offset >= super::BUFFER_LEN {
            return 0;
        }
        self.mutex.acquire();
        let n = {
            let shared = self.shared.lock();
            let available = super::BUFFER_LEN - offset;
            let n = dest.len().min(available);
            dest[..n].copy_from_slice(&shared.buffer[offset..offset + n]);
            n
        };
        self.mutex.release();
        n
    }

    /// Reads a single data slot, or `None` if `slot` is out of range.
    pub fn read_slot(&self, slot: usize) -> Option<u8> {
        let mut byte = [0u8];
        if self.read_offset(slot, &mut byte) == 0 {
            None
        } else {
            Some(byte[0])
        }
    }

    /// Replaces the full 512-slot frame with `src`, zero-padding any
    /// remainder. Does not touch slot 0 (the start code). Returns the
    /// number of slots copied from `src` before padding.
    pub fn write(&self, src: &[u8]) -> usize {
        self.mutex.acquire();
        let n = {
            let mut shared = self.shared.lock();
            let n = src.len().min(super::BUFFER_LEN - 1);
            shared.buffer[1..1 + n].copy_from_slice(&src[..n]);
            shared.buffer[1 + n..].fill(0);
            shared.tx_size = super::BUFFER_LEN;
            n
        };
        self.mutex.release();
        n
    }

    /// Writes `src` starting at `offset`, returning the number of slots
    /// actually written (0 if `offset` is out of range).
    pub fn write_offset(&self, offset: usize, src: &[u8]) -> usize {
        if offset == 0 || offset >= super::BUFFER_LEN {
            return 0;
        }
        self.mutex.acquire();
        let n = {
            let mut shared = self.shared.lock();
            let available = super::BUFFER_LEN - offset;
            let n = src.len().min(available);
            shared.buffer[offset..offset + n].copy_from_slice(&src[..n]);
            shared.tx_size = shared.tx_size.max(offset + n);
            n
        };
        self.mutex.release();
        n
    }

    pub fn write_slot(&self, slot: usize, value: u8) -> DmxResult<()> {
        if self.write_offset(slot, &[value]) == 0 {
            return Err(DmxError::InvalidArgument);
        }
        Ok(())
    }
}
