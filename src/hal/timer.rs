//! One-shot microsecond alarm capability required by the ISR pump (§4.4, §4.7).

/// A single hardware alarm with microsecond resolution.
///
/// `arm`/`stop` may be called from task context; the alarm's expiry fires
/// from interrupt context and is observed by the pump via
/// [`crate::hal::UartInterrupt`]-independent bookkeeping, so this trait only
/// needs to expose control, not an interrupt mask of its own.
pub trait Timer {
    /// Monotonic microsecond clock. Must never go backwards.
    fn now_us(&self) -> u64;

    /// Arms the alarm to fire `delay_us` from now. Re-arming an already
    /// running alarm replaces the previous deadline.
    fn arm(&mut self, delay_us: u32);

    /// Cancels a running alarm. A no-op if the alarm is not running.
    fn stop(&mut self);

    /// True while an alarm is armed and has not yet fired.
    fn is_running(&self) -> bool;
}
