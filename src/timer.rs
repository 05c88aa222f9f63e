//! Tick counter and one-shot timers.
//!
//! The timer interrupt calls [`TimerManager::tick`] once per hardware tick.
//! Expired timers either turn into `TimerTimeout` messages for their target
//! task or, for the scheduler's own periodic timer, report that a scheduling
//! decision is due.

use alloc::collections::BinaryHeap;
use core::cmp::Ordering;

use crate::config::Config;
use crate::message::{Label, Message, MessageKind};
use crate::println;
use crate::task::manager::TaskManager;
use crate::task::TaskId;

/// What an expired timer means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerValue {
    /// The scheduler's periodic timer. Never delivered to a mailbox.
    Scheduler,
    /// A user timer; the value is echoed back in the timeout message.
    User(i32),
}

/// An armed timer.
#[derive(Debug, Clone, Copy)]
pub struct Timer {
    timeout: u64,
    value: TimerValue,
    task_id: TaskId,
    description: Label,
    seq: u64,
}

impl Timer {
    pub fn timeout(&self) -> u64 {
        self.timeout
    }

    pub fn value(&self) -> TimerValue {
        self.value
    }

    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    pub fn description(&self) -> Label {
        self.description
    }
}

// BinaryHeap is a max-heap: invert so the earliest expiry (then the earliest
// insertion) comes out first.
impl Ord for Timer {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .timeout
            .cmp(&self.timeout)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Timer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Timer {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Timer {}

pub struct TimerManager {
    tick: u64,
    period: u64,
    next_seq: u64,
    timers: BinaryHeap<Timer>,
}

impl TimerManager {
    pub fn new(config: &Config) -> Self {
        TimerManager {
            tick: 0,
            period: config.period(),
            next_seq: 0,
            timers: BinaryHeap::new(),
        }
    }

    /// Ticks elapsed since the timer started.
    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    /// Number of armed timers, the scheduler timer included.
    pub fn pending(&self) -> usize {
        self.timers.len()
    }

    /// Arm the scheduler's periodic timer one period from now.
    pub fn start_scheduler_timer(&mut self) {
        let timeout = self.tick + self.period;
        self.push(timeout, TimerValue::Scheduler, TaskId::KERNEL, Label::new("sched"));
    }

    /// Arm a one-shot timer that sends `value` to `task_id` at tick `timeout`.
    pub fn add_timer(&mut self, timeout: u64, value: i32, task_id: TaskId, description: &str) {
        self.push(timeout, TimerValue::User(value), task_id, Label::new(description));
    }

    /// Arm a one-shot timer `delay` ticks from now.
    pub fn add_timer_after(&mut self, delay: u64, value: i32, task_id: TaskId, description: &str) {
        self.add_timer(self.tick.saturating_add(delay), value, task_id, description);
    }

    fn push(&mut self, timeout: u64, value: TimerValue, task_id: TaskId, description: Label) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.timers.push(Timer {
            timeout,
            value,
            task_id,
            description,
            seq,
        });
    }

    /// Advance one tick and fire everything that is due.
    ///
    /// Returns true if the scheduler timer expired during this tick.
    pub fn tick(&mut self, tasks: &mut TaskManager) -> bool {
        self.tick += 1;

        let mut task_timer_timeout = false;
        while let Some(timer) = self.timers.peek() {
            if timer.timeout > self.tick {
                break;
            }
            let Some(timer) = self.timers.pop() else {
                break;
            };

            match timer.value {
                TimerValue::Scheduler => {
                    task_timer_timeout = true;
                    let next = self.tick + self.period;
                    self.push(next, TimerValue::Scheduler, timer.task_id, timer.description);
                }
                TimerValue::User(value) => {
                    let msg = Message::new(MessageKind::TimerTimeout {
                        timeout: timer.timeout,
                        value,
                        description: timer.description,
                    });
                    if let Err(e) = tasks.send_message(timer.task_id, msg) {
                        println!(
                            "[TIMER] dropped {} for {}: {}",
                            timer.description, timer.task_id, e
                        );
                    }
                }
            }
        }

        task_timer_timeout
    }
}
