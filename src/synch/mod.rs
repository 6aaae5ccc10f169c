//! Synchronization primitives: the spinlocks, recursive mutex, and task
//! notification the per-port driver record is built on (§5).

pub mod notify;
pub mod recmutex;
pub mod spinlock;
pub mod task;

pub use notify::Notify;
pub use recmutex::{RecursiveMutex, TaskControl};
pub use spinlock::{Spinlock, SpinlockIrqSave};
pub use task::BusySpin;
