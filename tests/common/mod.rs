#![allow(dead_code)]

use std::sync::Mutex;

use taskcore::task::context::{ContextSwitch, TaskContext};
use taskcore::task::manager::TaskManager;
use taskcore::config::MAX_LEVEL;
use taskcore::TaskId;

/// Records every switch instead of performing it. `restore_context` cannot
/// return, so it panics after recording; tests catch that panic.
#[derive(Default)]
pub struct Recorder {
    switches: Mutex<Vec<(usize, usize)>>,
    restores: Mutex<Vec<usize>>,
}

pub const RESTORED: &str = "context restored";

impl Recorder {
    pub fn leaked() -> &'static Recorder {
        Box::leak(Box::default())
    }

    pub fn switches(&self) -> Vec<(usize, usize)> {
        self.switches.lock().unwrap().clone()
    }

    pub fn restores(&self) -> Vec<usize> {
        self.restores.lock().unwrap().clone()
    }
}

impl ContextSwitch for Recorder {
    unsafe fn switch_context(&self, next: *const TaskContext, current: *mut TaskContext) {
        self.switches
            .lock()
            .unwrap()
            .push((next as usize, current as usize));
    }

    unsafe fn restore_context(&self, next: *const TaskContext) -> ! {
        self.restores.lock().unwrap().push(next as usize);
        panic!("{}", RESTORED);
    }
}

pub extern "C" fn body(_task_id: u64, _data: u64) -> i32 {
    0
}

/// Every task is queued exactly when it is running, once, at its own level;
/// with no level change pending, the current level is the highest non-empty
/// one.
pub fn assert_consistent(mgr: &TaskManager) {
    for id in mgr.task_ids().collect::<Vec<TaskId>>() {
        let task = mgr.task(id).unwrap();
        let slots: Vec<usize> = (0..=MAX_LEVEL)
            .flat_map(|level| mgr.run_queue(level).filter(move |&t| t == id).map(move |_| level))
            .collect();
        if task.is_running() {
            assert_eq!(slots, [task.level()], "{} queued wrongly", id);
        } else {
            assert!(slots.is_empty(), "sleeping {} is queued", id);
        }
    }

    if !mgr.level_change_pending() {
        let top = (0..=MAX_LEVEL)
            .rev()
            .find(|&l| mgr.run_queue(l).next().is_some());
        if let Some(top) = top {
            assert_eq!(mgr.current_level(), top);
            let current = mgr.current_task();
            assert_eq!(mgr.task(current).unwrap().level(), top);
        }
    }
}
