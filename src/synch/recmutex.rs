//! Reentrant application-level lock serialising `send`/`receive`/`send_rdm`/
//! `wait_sent` on a single port.
//!
//! Dispatch handlers may call `send` while `receive` still holds this mutex
//! for the same port, so ownership must nest: the same task may re-acquire
//! without blocking on itself.

use alloc::collections::VecDeque;

use crate::synch::spinlock::Spinlock;

/// Scheduler hooks a recursive mutex needs: task identity, plus a way to
/// park the current task and wake one up later. A host build without a real
/// scheduler can satisfy this with a busy-wait task control (see
/// [`crate::synch::BusySpin`]).
pub trait TaskControl {
    type TaskId: Copy + Eq;

    fn current_task_id() -> Self::TaskId;
    /// Parks the current task; returns once `wake` has been called for it.
    fn block_current_task();
    fn wake(task: Self::TaskId);
}

struct RecursiveMutexState<C: TaskControl> {
    current: Option<C::TaskId>,
    count: usize,
    queue: VecDeque<C::TaskId>,
}

pub struct RecursiveMutex<C: TaskControl> {
    state: Spinlock<RecursiveMutexState<C>>,
}

impl<C: TaskControl> RecursiveMutex<C> {
    pub const fn new() -> Self {
        Self {
            state: Spinlock::new(RecursiveMutexState {
                current: None,
                count: 0,
                queue: VecDeque::new(),
            }),
        }
    }

    pub fn acquire(&self) {
        let tid = C::current_task_id();

        loop {
            {
                let mut locked = self.state.lock();

                if let Some(current) = locked.current {
                    if current == tid {
                        locked.count += 1;
                        return;
                    }
                } else {
                    locked.current = Some(tid);
                    locked.count = 1;
                    return;
                }

                locked.queue.push_back(tid);
            }

            C::block_current_task();
        }
    }

    pub fn release(&self) {
        let woken = {
            let mut locked = self.state.lock();
            locked.count -= 1;
            if locked.count == 0 {
                locked.current = None;
                locked.queue.pop_front()
            } else {
                None
            }
        };

        if let Some(task) = woken {
            C::wake(task);
        }
    }
}

unsafe impl<C: TaskControl> Sync for RecursiveMutex<C> {}
unsafe impl<C: TaskControl> Send for RecursiveMutex<C> {}
