//! Scheduler and timer tuning.
//!
//! Compile-time constants cover the fixed shape of the kernel (number of
//! priority levels, tick rate). [`Config`] carries the knobs a kernel image
//! may want to choose at boot.

use crate::task::TaskError;

/// Highest priority level. Levels run `0..=MAX_LEVEL`; higher preempts lower.
pub const MAX_LEVEL: usize = 3;

/// Level given to freshly created tasks.
pub const DEFAULT_LEVEL: usize = 1;

/// Timer interrupts per second.
pub const TIMER_FREQ: u64 = 100;

/// Ticks between scheduler rotations (20 ms at `TIMER_FREQ`).
pub const TASK_TIMER_PERIOD: u64 = TIMER_FREQ / 50;

/// Stack allocated per task by `init_context`.
pub const DEFAULT_STACK_BYTES: usize = 16 * 1024;

/// Virtual start of the kernel heap.
pub const HEAP_START: usize = 0x_4444_4444_0000;

/// Kernel heap size. Task stacks come out of it.
pub const HEAP_SIZE: usize = 1024 * 1024;

/// What to do with a priority level outside `0..=MAX_LEVEL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelPolicy {
    /// Fail the call with [`TaskError::InvalidLevel`].
    Reject,
    /// Silently lower the level to `MAX_LEVEL`.
    Clamp,
}

/// Where a running task lands when its level is changed while it is queued
/// but not executing.
///
/// The executing task is always moved to the front of its new level so it
/// keeps the CPU without a context switch; this only affects the others.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequeuePolicy {
    /// Append to the back of the new level's queue.
    Back,
    /// Insert at the front of the new level's queue.
    Front,
}

/// Boot-time scheduler configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Ticks between scheduler timer expiries. Zero is treated as one.
    pub scheduler_period: u64,
    /// Bytes of stack allocated per task.
    pub stack_bytes: usize,
    pub level_policy: LevelPolicy,
    pub requeue_policy: RequeuePolicy,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            scheduler_period: TASK_TIMER_PERIOD,
            stack_bytes: DEFAULT_STACK_BYTES,
            level_policy: LevelPolicy::Reject,
            requeue_policy: RequeuePolicy::Back,
        }
    }
}

impl Config {
    /// Scheduler period, never zero.
    pub fn period(&self) -> u64 {
        self.scheduler_period.max(1)
    }

    /// Validate a requested level against `level_policy`.
    pub fn check_level(&self, level: usize) -> Result<usize, TaskError> {
        if level <= MAX_LEVEL {
            return Ok(level);
        }
        match self.level_policy {
            LevelPolicy::Reject => Err(TaskError::InvalidLevel(level)),
            LevelPolicy::Clamp => Ok(MAX_LEVEL),
        }
    }
}

/// Convert milliseconds to timer ticks, rounding down.
pub const fn ms_to_ticks(ms: u64) -> u64 {
    ms * TIMER_FREQ / 1000
}
