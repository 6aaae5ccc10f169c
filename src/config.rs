//! Install-time configuration (§10.3).

use crate::driver::timing;
use crate::error::{DmxError, DmxResult};
use crate::uid::Uid;

/// Configuration validated and clamped by [`crate::driver::Port::install`].
#[derive(Debug, Clone, Copy)]
pub struct DmxConfig {
    /// Fixed for the lifetime of the driver record; must not be NULL,
    /// broadcast, or a manufacturer-broadcast address.
    pub root_uid: Uid,
    /// BREAK duration in microseconds, clamped to `[92, 1_000_000]`.
    pub break_len_us: u32,
    /// MAB duration in microseconds, clamped to `>= 12`.
    pub mab_len_us: u32,
    /// How long the responder has to begin a reply before the request is
    /// considered abandoned.
    pub response_lost_timeout_us: u32,
    /// Capacity of the queued-message slot (§10.4).
    pub queue_size: u8,
}

pub const DEFAULT_BREAK_LEN_US: u32 = 176;
pub const MIN_BREAK_LEN_US: u32 = 92;
pub const MAX_BREAK_LEN_US: u32 = 1_000_000;
pub const DEFAULT_MAB_LEN_US: u32 = 12;
pub const MIN_MAB_LEN_US: u32 = 12;

impl Default for DmxConfig {
    fn default() -> Self {
        DmxConfig {
            root_uid: Uid::NULL,
            break_len_us: DEFAULT_BREAK_LEN_US,
            mab_len_us: DEFAULT_MAB_LEN_US,
            response_lost_timeout_us: timing::RESPONDER_RESPONSE_LOST_TIMEOUT_US,
            queue_size: 16,
        }
    }
}

impl DmxConfig {
    /// Validates `root_uid` and clamps timing fields into their documented
    /// ranges, logging when clamping occurred. Only an invalid `root_uid` is
    /// rejected outright.
    pub fn validate(mut self) -> DmxResult<Self> {
        if self.root_uid.is_null() || self.root_uid.is_broadcast() {
            return Err(DmxError::InvalidArgument);
        }

        let clamped_break = self.break_len_us.clamp(MIN_BREAK_LEN_US, MAX_BREAK_LEN_US);
        if clamped_break != self.break_len_us {
            log::warn!(
                "break_len_us {} out of range, clamped to {}",
                self.break_len_us,
                clamped_break
            );
            self.break_len_us = clamped_break;
        }

        let clamped_mab = self.mab_len_us.max(MIN_MAB_LEN_US);
        if clamped_mab != self.mab_len_us {
            log::warn!("mab_len_us {} out of range, clamped to {}", self.mab_len_us, clamped_mab);
            self.mab_len_us = clamped_mab;
        }

        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_null_and_broadcast_root_uid() {
        let cfg = DmxConfig { root_uid: Uid::NULL, ..Default::default() };
        assert_eq!(cfg.validate().unwrap_err(), DmxError::InvalidArgument);

        let cfg = DmxConfig { root_uid: Uid::BROADCAST_ALL, ..Default::default() };
        assert_eq!(cfg.validate().unwrap_err(), DmxError::InvalidArgument);
    }

    #[test]
    fn clamps_out_of_range_timing() {
        let cfg = DmxConfig {
            root_uid: Uid::new(1, 1),
            break_len_us: 10,
            mab_len_us: 1,
            ..Default::default()
        };
        let validated = cfg.validate().unwrap();
        assert_eq!(validated.break_len_us, MIN_BREAK_LEN_US);
        assert_eq!(validated.mab_len_us, MIN_MAB_LEN_US);
    }
}
