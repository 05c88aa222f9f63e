//! The kernel context: task manager, timer manager and the CPU's
//! context-switch primitive behind one object.
//!
//! Boot code builds a [`Kernel`], [`install`]s it once and only then enables
//! interrupts. Interrupt handlers and task bodies reach it via [`get`].
//!
//! Every operation masks interrupts while it touches shared state. Switches
//! decided by the task manager are carried out here, after the manager's
//! borrow has ended but before the mask is released.

use core::sync::atomic::{AtomicU64, Ordering};

use spin::Once;

use crate::config::Config;
use crate::message::Message;
use crate::println;
use crate::sync::{InterruptCell, InterruptMask};
use crate::task::context::{ContextSwitch, TaskContext, TaskFn};
use crate::task::manager::{Switch, TaskManager, WaitFinish};
use crate::task::{TaskError, TaskId};
use crate::timer::TimerManager;

pub struct Kernel {
    tasks: InterruptCell<TaskManager>,
    timers: InterruptCell<TimerManager>,
    switcher: &'static dyn ContextSwitch,
    /// Raw id of the task receiving keyboard input; 0 for none.
    input_focus: AtomicU64,
}

impl Kernel {
    /// Build the context. The caller's flow of execution becomes task 1 and
    /// the scheduler timer is armed.
    pub fn new(config: Config, switcher: &'static dyn ContextSwitch) -> Self {
        let mut timers = TimerManager::new(&config);
        timers.start_scheduler_timer();
        Kernel {
            tasks: InterruptCell::new(TaskManager::new(config)),
            timers: InterruptCell::new(timers),
            switcher,
            input_focus: AtomicU64::new(0),
        }
    }

    /// Run `f` against the task manager with interrupts masked.
    pub fn with_tasks<R>(&self, f: impl FnOnce(&mut TaskManager) -> R) -> R {
        self.tasks.with(f)
    }

    /// Run `f` against the timer manager with interrupts masked.
    pub fn with_timers<R>(&self, f: impl FnOnce(&mut TimerManager) -> R) -> R {
        self.timers.with(f)
    }

    // ─── Task lifecycle ─────────────────────────────────────────

    pub fn new_task(&self) -> TaskId {
        self.tasks.with(|m| m.new_task())
    }

    pub fn init_context(
        &self,
        id: TaskId,
        entry: TaskFn,
        arg1: u64,
        arg2: u64,
    ) -> Result<(), TaskError> {
        self.tasks.with(|m| m.init_context(id, entry, arg1, arg2))
    }

    pub fn spawn(&self, entry: TaskFn, data: u64, level: Option<usize>) -> Result<TaskId, TaskError> {
        self.tasks.with(|m| m.spawn(entry, data, level))
    }

    pub fn wakeup(&self, id: TaskId, level: Option<usize>) -> Result<(), TaskError> {
        self.tasks.with(|m| m.wakeup(id, level))
    }

    /// Put a task to sleep. For the executing task this returns only after
    /// it has been woken and scheduled again.
    pub fn sleep(&self, id: TaskId) -> Result<(), TaskError> {
        let mask = InterruptMask::acquire();
        if let Some(switch) = self.tasks.with_masked(&mask, |m| m.sleep(id))? {
            self.perform(&mask, switch);
        }
        Ok(())
    }

    pub fn sleep_current(&self) {
        let mask = InterruptMask::acquire();
        let switch = self.tasks.with_masked(&mask, |m| {
            let current = m.current_task();
            m.sleep(current)
        });
        // The executing task is always live.
        if let Ok(Some(switch)) = switch {
            self.perform(&mask, switch);
        }
    }

    pub fn current_task(&self) -> TaskId {
        self.tasks.with(|m| m.current_task())
    }

    /// Retire the executing task and resume the next one.
    pub fn finish(&self, exit_code: i32) -> ! {
        let mask = InterruptMask::acquire();
        let next = self.tasks.with_masked(&mask, |m| {
            let next = m.finish(exit_code);
            m.context_ptr(next)
        });
        let Some(next) = next else {
            panic!("no context for the task after finish");
        };
        // The resumed task brings its own interrupt flag.
        core::mem::forget(mask);
        // SAFETY: `next` points into a live task owned by the manager.
        unsafe { self.switcher.restore_context(next) }
    }

    /// Block the executing task until `target` exits and return its code.
    pub fn wait_finish(&self, target: TaskId) -> Result<i32, TaskError> {
        loop {
            let mask = InterruptMask::acquire();
            let attempt = self.tasks.with_masked(&mask, |m| {
                let waiter = m.current_task();
                m.wait_finish(waiter, target)
            })?;
            match attempt {
                WaitFinish::Exited(code) => return Ok(code),
                WaitFinish::Blocked(Some(switch)) => self.perform(&mask, switch),
                WaitFinish::Blocked(None) => {}
            }
        }
    }

    // ─── Messages ───────────────────────────────────────────────

    pub fn send_message(&self, id: TaskId, msg: Message) -> Result<(), TaskError> {
        self.tasks.with(|m| m.send_message(id, msg))
    }

    pub fn receive_message(&self, id: TaskId) -> Result<Option<Message>, TaskError> {
        self.tasks.with(|m| m.receive_message(id))
    }

    /// Take the executing task's next message, sleeping until one arrives.
    ///
    /// The empty check and the sleep happen under one mask, so a message
    /// sent from an interrupt in between cannot be missed.
    pub fn receive_message_blocking(&self) -> Message {
        loop {
            let mask = InterruptMask::acquire();
            let outcome = self.tasks.with_masked(&mask, |m| {
                let current = m.current_task();
                match m.receive_message(current) {
                    Ok(Some(msg)) => Ok(msg),
                    _ => Err(m.sleep(current).ok().flatten()),
                }
            });
            match outcome {
                Ok(msg) => return msg,
                Err(Some(switch)) => self.perform(&mask, switch),
                Err(None) => {}
            }
        }
    }

    // ─── Timers ─────────────────────────────────────────────────

    pub fn add_timer(&self, timeout: u64, value: i32, task_id: TaskId, description: &str) {
        self.timers
            .with(|t| t.add_timer(timeout, value, task_id, description));
    }

    pub fn add_timer_after(&self, delay: u64, value: i32, task_id: TaskId, description: &str) {
        self.timers
            .with(|t| t.add_timer_after(delay, value, task_id, description));
    }

    pub fn current_tick(&self) -> u64 {
        self.timers.with(|t| t.current_tick())
    }

    /// One hardware tick. Returns true if a scheduling decision is due.
    pub fn tick(&self) -> bool {
        let mask = InterruptMask::acquire();
        self.timers.with_masked(&mask, |timers| {
            self.tasks.with_masked(&mask, |tasks| timers.tick(tasks))
        })
    }

    /// Timer-driven rotation. Resumes another task if one was selected;
    /// otherwise returns and the interrupted task continues.
    pub fn switch_task(&self, saved: &TaskContext) {
        let mask = InterruptMask::acquire();
        let next = self.tasks.with_masked(&mask, |m| {
            let next = m.switch_task(saved)?;
            m.context_ptr(next)
        });
        if let Some(next) = next {
            core::mem::forget(mask);
            // SAFETY: `next` points into a live task owned by the manager.
            unsafe { self.switcher.restore_context(next) }
        }
    }

    // ─── Input focus ────────────────────────────────────────────

    pub fn set_input_focus(&self, id: Option<TaskId>) {
        let raw = id.map_or(0, |id| id.raw());
        self.input_focus.store(raw, Ordering::Relaxed);
    }

    pub fn input_focus(&self) -> Option<TaskId> {
        match self.input_focus.load(Ordering::Relaxed) {
            0 => None,
            raw => Some(TaskId::from(raw)),
        }
    }

    fn perform(&self, mask: &InterruptMask, switch: Switch) {
        if switch.next == switch.current {
            return;
        }
        let (next, current) = self
            .tasks
            .with_masked(mask, |m| (m.context_ptr(switch.next), m.context_ptr(switch.current)));
        if let (Some(next), Some(current)) = (next, current) {
            // SAFETY: both contexts live in boxed tasks that stay put until
            // reaped, which never happens to the executing task.
            unsafe { self.switcher.switch_context(next, current) }
        }
    }
}

static KERNEL: Once<Kernel> = Once::new();

/// Make `kernel` the global context. Panics if one is already installed.
pub fn install(kernel: Kernel) -> &'static Kernel {
    let mut fresh = false;
    let installed = KERNEL.call_once(|| {
        fresh = true;
        kernel
    });
    if !fresh {
        panic!("kernel context installed twice");
    }
    println!("[OK] Kernel context installed");
    installed
}

/// The installed context. Panics if called before [`install`].
pub fn get() -> &'static Kernel {
    match KERNEL.get() {
        Some(kernel) => kernel,
        None => panic!("kernel context used before install"),
    }
}
