//! Busy-wait locks used to guard the short, ISR-safe critical sections in
//! the driver record (buffer head/flags/timestamps, RTS state, timer arming,
//! waiter handle).

use core::cell::UnsafeCell;
use core::marker::PhantomData;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicUsize, Ordering};

use crate::hal::IrqControl;

/// A ticket lock with no interrupt interaction, suitable for state that is
/// only ever touched from task context.
pub struct Spinlock<T: ?Sized> {
    queue: AtomicUsize,
    dequeue: AtomicUsize,
    data: UnsafeCell<T>,
}

unsafe impl<T: ?Sized + Send> Sync for Spinlock<T> {}
unsafe impl<T: ?Sized + Send> Send for Spinlock<T> {}

impl<T> Spinlock<T> {
    pub const fn new(value: T) -> Self {
        Spinlock {
            queue: AtomicUsize::new(0),
            dequeue: AtomicUsize::new(1),
            data: UnsafeCell::new(value),
        }
    }

    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

impl<T: ?Sized> Spinlock<T> {
    pub fn lock(&self) -> SpinlockGuard<'_, T> {
        let ticket = self.queue.fetch_add(1, Ordering::Relaxed) + 1;
        while self.dequeue.load(Ordering::Acquire) != ticket {
            core::hint::spin_loop();
        }
        SpinlockGuard {
            dequeue: &self.dequeue,
            ticket,
            data: unsafe { &mut *self.data.get() },
        }
    }
}

pub struct SpinlockGuard<'a, T: ?Sized> {
    dequeue: &'a AtomicUsize,
    ticket: usize,
    data: &'a mut T,
}

impl<'a, T: ?Sized> Deref for SpinlockGuard<'a, T> {
    type Target = T;
    fn deref(&self) -> &T {
        self.data
    }
}

impl<'a, T: ?Sized> DerefMut for SpinlockGuard<'a, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.data
    }
}

impl<'a, T: ?Sized> Drop for SpinlockGuard<'a, T> {
    fn drop(&mut self) {
        self.dequeue.store(self.ticket + 1, Ordering::Release);
    }
}

/// A ticket lock that also masks the driver's interrupt level for the
/// duration of the critical section, via a caller-supplied [`IrqControl`].
///
/// This is the lock that guards per-port driver state shared between task
/// context and the ISR pump: the ISR never calls `lock()` (it runs with
/// interrupts already masked by the platform), it only ever touches the
/// guarded state directly, so task-side critical sections only need to keep
/// the ISR from firing mid-update, not contend with it.
pub struct SpinlockIrqSave<T: ?Sized, I: IrqControl> {
    queue: AtomicUsize,
    dequeue: AtomicUsize,
    _irq: PhantomData<I>,
    data: UnsafeCell<T>,
}

unsafe impl<T: ?Sized + Send, I: IrqControl> Sync for SpinlockIrqSave<T, I> {}
unsafe impl<T: ?Sized + Send, I: IrqControl> Send for SpinlockIrqSave<T, I> {}

impl<T, I: IrqControl> SpinlockIrqSave<T, I> {
    pub const fn new(value: T) -> Self {
        SpinlockIrqSave {
            queue: AtomicUsize::new(0),
            dequeue: AtomicUsize::new(1),
            _irq: PhantomData,
            data: UnsafeCell::new(value),
        }
    }
}

impl<T: ?Sized, I: IrqControl> SpinlockIrqSave<T, I> {
    pub fn lock(&self) -> SpinlockIrqSaveGuard<'_, T, I> {
        let irq_was_enabled = I::disable();
        let ticket = self.queue.fetch_add(1, Ordering::Relaxed) + 1;
        while self.dequeue.load(Ordering::Acquire) != ticket {
            core::hint::spin_loop();
        }
        SpinlockIrqSaveGuard {
            dequeue: &self.dequeue,
            ticket,
            irq_was_enabled,
            _irq: PhantomData,
            data: unsafe { &mut *self.data.get() },
        }
    }
}

pub struct SpinlockIrqSaveGuard<'a, T: ?Sized, I: IrqControl> {
    dequeue: &'a AtomicUsize,
    ticket: usize,
    irq_was_enabled: bool,
    _irq: PhantomData<I>,
    data: &'a mut T,
}

impl<'a, T: ?Sized, I: IrqControl> Deref for SpinlockIrqSaveGuard<'a, T, I> {
    type Target = T;
    fn deref(&self) -> &T {
        self.data
    }
}

impl<'a, T: ?Sized, I: IrqControl> DerefMut for SpinlockIrqSaveGuard<'a, T, I> {
    fn deref_mut(&mut self) -> &mut T {
        self.data
    }
}

impl<'a, T: ?Sized, I: IrqControl> Drop for SpinlockIrqSaveGuard<'a, T, I> {
    fn drop(&mut self) {
        self.dequeue.store(self.ticket + 1, Ordering::Release);
        I::restore(self.irq_was_enabled);
    }
}
