//! Tasks: the unit of scheduling.
//!
//! A task owns its stack, its saved register context and its mailbox. The
//! [`manager::TaskManager`] owns every task and decides which one runs; run
//! queues and waiter maps refer to tasks only by [`TaskId`].

pub mod context;
pub mod mailbox;
pub mod manager;

use alloc::boxed::Box;
use alloc::vec::Vec;

use crate::config::DEFAULT_LEVEL;
use crate::message::Message;
use context::{TaskContext, TaskFn};
use mailbox::Mailbox;

/// Unique task identifier. Assigned in increasing order, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(u64);

impl TaskId {
    /// Sender id used for messages originating in the kernel or an ISR.
    pub const KERNEL: TaskId = TaskId(0);

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl From<u64> for TaskId {
    fn from(raw: u64) -> Self {
        TaskId(raw)
    }
}

impl core::fmt::Display for TaskId {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "Task#{}", self.0)
    }
}

// ─── Errors ─────────────────────────────────────────────────────

/// Task operation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskError {
    /// No live task has the requested id.
    NoSuchTask,
    /// The stack for a new task could not be allocated.
    StackAllocationFailed,
    /// Priority level outside `0..=MAX_LEVEL` under the reject policy.
    InvalidLevel(usize),
    /// The task is already schedulable; its context cannot be reset.
    AlreadyRunning,
}

impl core::fmt::Display for TaskError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        match self {
            TaskError::NoSuchTask => write!(f, "no such task"),
            TaskError::StackAllocationFailed => write!(f, "stack allocation failed"),
            TaskError::InvalidLevel(level) => write!(f, "invalid level {}", level),
            TaskError::AlreadyRunning => write!(f, "task already running"),
        }
    }
}

// ─── Task ───────────────────────────────────────────────────────

/// A schedulable task.
pub struct Task {
    id: TaskId,
    stack: Box<[u64]>,
    context: TaskContext,
    mailbox: Mailbox,
    level: usize,
    running: bool,
}

impl Task {
    pub(crate) fn new(id: TaskId) -> Self {
        Task {
            id,
            stack: Box::new([]),
            context: TaskContext::zeroed(),
            mailbox: Mailbox::new(),
            level: DEFAULT_LEVEL,
            running: false,
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn level(&self) -> usize {
        self.level
    }

    /// True while the task sits in a run queue.
    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn context(&self) -> &TaskContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut TaskContext {
        &mut self.context
    }

    /// Address range `[bottom, top)` of the task's stack.
    pub fn stack_bounds(&self) -> (u64, u64) {
        let bottom = self.stack.as_ptr() as u64;
        (bottom, bottom + (self.stack.len() * 8) as u64)
    }

    pub fn pending_messages(&self) -> usize {
        self.mailbox.len()
    }

    /// Allocate a stack and point the context at `entry(arg1, arg2)`.
    ///
    /// On entry `rsp + 8` is 16-byte aligned, as after a `call`, and the
    /// slot at `rsp` holds the arch task-return trampoline so a returning
    /// entry function finishes the task. Nothing is modified if the stack
    /// cannot be allocated.
    pub fn init_context(
        &mut self,
        entry: TaskFn,
        arg1: u64,
        arg2: u64,
        stack_bytes: usize,
    ) -> Result<&mut Self, TaskError> {
        if self.running {
            return Err(TaskError::AlreadyRunning);
        }

        let words = stack_bytes.div_ceil(8).max(2);
        let mut stack = Vec::new();
        stack
            .try_reserve_exact(words)
            .map_err(|_| TaskError::StackAllocationFailed)?;
        stack.resize(words, 0u64);
        let mut stack = stack.into_boxed_slice();

        let bottom = stack.as_ptr() as u64;
        let top = bottom + (words * 8) as u64;
        let rsp = (top & !0xf) - 8;
        stack[((rsp - bottom) / 8) as usize] = crate::arch::task_return_address();

        self.context = TaskContext::for_entry(entry, arg1, arg2, rsp);
        self.stack = stack;
        Ok(self)
    }

    pub(crate) fn set_level(&mut self, level: usize) {
        self.level = level;
    }

    pub(crate) fn set_running(&mut self, running: bool) {
        self.running = running;
    }

    pub(crate) fn push_message(&mut self, msg: Message) {
        self.mailbox.push(msg);
    }

    pub(crate) fn pop_message(&mut self) -> Option<Message> {
        self.mailbox.pop()
    }
}

impl core::fmt::Debug for Task {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("level", &self.level)
            .field("running", &self.running)
            .field("messages", &self.mailbox.len())
            .finish()
    }
}
