//! A [`TaskControl`] for hosts with no real scheduler: single task id,
//! `block_current_task` spins rather than parking. Appropriate for
//! single-threaded host-side tests, where the recursive mutex is only ever
//! reentered by the same logical task and never genuinely contended.

use super::recmutex::TaskControl;

pub struct BusySpin;

impl TaskControl for BusySpin {
    type TaskId = ();

    fn current_task_id() -> Self::TaskId {}

    fn block_current_task() {
        core::hint::spin_loop();
    }

    fn wake(_task: ()) {}
}
