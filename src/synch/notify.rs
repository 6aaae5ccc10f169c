//! ISR-to-task rendezvous: a one-word notification slot.
//!
//! Exactly one task may wait on a [`Notify`] at a time, enforced by the
//! per-port recursive mutex; the waiting task clears the slot before it
//! waits, and the ISR that eventually fires writes a 32-bit value (an error
//! code, `0` for plain success) and wakes it.

use core::sync::atomic::{AtomicU32, Ordering};

const EMPTY: u32 = u32::MAX;

pub struct Notify {
    value: AtomicU32,
}

impl Notify {
    pub const fn new() -> Self {
        Notify {
            value: AtomicU32::new(EMPTY),
        }
    }

    /// Clears any stale value. Must be called by the waiting task before it
    /// starts waiting, per the invariant that the waiter handle is cleared
    /// before any notification may fire.
    pub fn clear(&self) {
        self.value.store(EMPTY, Ordering::Release);
    }

    /// Called from interrupt context to wake the waiter with a result code.
    pub fn notify_from_isr(&self, code: u32) {
        debug_assert!(code != EMPTY, "notification code collides with EMPTY sentinel");
        self.value.store(code, Ordering::Release);
    }

    /// Polls for a notification without blocking.
    pub fn poll(&self) -> Option<u32> {
        let v = self.value.load(Ordering::Acquire);
        if v == EMPTY {
            None
        } else {
            Some(v)
        }
    }

    /// Busy-waits for a notification up to `deadline_us` on `clock`, polling
    /// between spins. Returns `None` on timeout. This is the "portable
    /// monotonic-clock busy-wait" fallback described for targets without
    /// sub-millisecond task scheduling; a real RTOS binding should instead
    /// park the calling task and have `notify_from_isr` wake it directly.
    pub fn wait_until(&self, clock: &dyn crate::hal::Timer, deadline_us: u64) -> Option<u32> {
        loop {
            if let Some(v) = self.poll() {
                return Some(v);
            }
            if clock.now_us() >= deadline_us {
                return None;
            }
            core::hint::spin_loop();
        }
    }
}

impl Default for Notify {
    fn default() -> Self {
        Self::new()
    }
}
