//! Hardware capability traits the driver is built against.
//!
//! Nothing in this module allocates or blocks; every method here must be
//! callable from interrupt context.

mod timer;
mod uart;

pub use timer::Timer;
pub use uart::{Uart, UartInterrupt};

/// Disables and restores the single interrupt priority level the driver's
/// ISRs run at. Used by [`crate::synch::SpinlockIrqSave`] to build short,
/// ISR-safe critical sections out of a target-specific IRQ controller.
pub trait IrqControl {
    /// Disables this level's interrupts, returning whether they were enabled
    /// beforehand (so the guard can restore the prior state, not just enable
    /// unconditionally on drop).
    fn disable() -> bool;

    /// Restores the interrupt-enable state returned by a prior `disable`.
    fn restore(was_enabled: bool);
}

/// An [`IrqControl`] that never actually masks anything. Appropriate for
/// single-threaded host-side tests where no real interrupt exists to race
/// against.
pub struct NoIrq;

impl IrqControl for NoIrq {
    fn disable() -> bool {
        true
    }

    fn restore(_was_enabled: bool) {}
}
