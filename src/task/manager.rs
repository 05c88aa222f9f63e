//! Priority-level round-robin task manager.
//!
//! Each level `0..=MAX_LEVEL` has a FIFO run queue of task ids. The head of
//! the highest non-empty level is the current task. The scheduler timer
//! rotates the current level (head to tail); sleeping drops the head instead.
//!
//! Level changes that could alter the active level are recorded in a flag and
//! applied at the next rotation, except when the executing task changes its
//! own level, which takes effect immediately.
//!
//! Every method here only updates bookkeeping. When an operation requires the
//! CPU to move to another task it returns a [`Switch`] and leaves the actual
//! transfer to the caller (see `kernel`).

use alloc::boxed::Box;
use alloc::collections::{BTreeMap, VecDeque};
use alloc::vec::Vec;

use super::context::{TaskContext, TaskFn};
use super::{Task, TaskError, TaskId};
use crate::config::{Config, RequeuePolicy, MAX_LEVEL};
use crate::message::Message;
use crate::println;

/// A context switch decided by the task manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Switch {
    /// Task to resume.
    pub next: TaskId,
    /// Task whose state must be saved.
    pub current: TaskId,
}

/// Outcome of one `wait_finish` attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitFinish {
    /// The target has exited with this code; the code is consumed.
    Exited(i32),
    /// The waiter was put to sleep; retry after being woken.
    Blocked(Option<Switch>),
}

pub struct TaskManager {
    config: Config,
    tasks: BTreeMap<TaskId, Box<Task>>,
    latest_id: u64,
    running: [VecDeque<TaskId>; MAX_LEVEL + 1],
    current_level: usize,
    level_changed: bool,
    finish_codes: BTreeMap<TaskId, i32>,
    finish_waiters: BTreeMap<TaskId, Vec<TaskId>>,
    /// Finished tasks whose stacks may still be executing until the next
    /// switch away from them.
    zombies: Vec<Box<Task>>,
}

impl TaskManager {
    /// Create the manager and adopt the caller's flow of execution as the
    /// first task, running at `MAX_LEVEL`.
    pub fn new(config: Config) -> Self {
        let mut mgr = TaskManager {
            config,
            tasks: BTreeMap::new(),
            latest_id: 0,
            running: Default::default(),
            current_level: MAX_LEVEL,
            level_changed: false,
            finish_codes: BTreeMap::new(),
            finish_waiters: BTreeMap::new(),
            zombies: Vec::new(),
        };

        let boot = mgr.new_task();
        if let Some(task) = mgr.tasks.get_mut(&boot) {
            task.set_level(MAX_LEVEL);
            task.set_running(true);
        }
        mgr.running[MAX_LEVEL].push_back(boot);
        mgr
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Allocate a sleeping task with a fresh id and the default level.
    pub fn new_task(&mut self) -> TaskId {
        self.reap_zombies();
        self.latest_id += 1;
        let id = TaskId(self.latest_id);
        self.tasks.insert(id, Box::new(Task::new(id)));
        id
    }

    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.get(&id).map(|t| &**t)
    }

    pub fn task_mut(&mut self, id: TaskId) -> Option<&mut Task> {
        self.tasks.get_mut(&id).map(|t| &mut **t)
    }

    /// Ids of all live tasks, ascending.
    pub fn task_ids(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.tasks.keys().copied()
    }

    /// Give a task a stack and an entry point.
    pub fn init_context(
        &mut self,
        id: TaskId,
        entry: TaskFn,
        arg1: u64,
        arg2: u64,
    ) -> Result<(), TaskError> {
        let stack_bytes = self.config.stack_bytes;
        let task = self.task_mut(id).ok_or(TaskError::NoSuchTask)?;
        task.init_context(entry, arg1, arg2, stack_bytes)?;
        Ok(())
    }

    /// Create a task running `entry(task_id, data)` and wake it at `level`.
    pub fn spawn(
        &mut self,
        entry: TaskFn,
        data: u64,
        level: Option<usize>,
    ) -> Result<TaskId, TaskError> {
        let level = level.map(|l| self.config.check_level(l)).transpose()?;
        let id = self.new_task();
        if let Err(e) = self.init_context(id, entry, id.raw(), data) {
            self.tasks.remove(&id);
            return Err(e);
        }
        self.wakeup(id, level)?;
        println!("[SCHED] Spawned {} at level {}", id, self.tasks[&id].level());
        Ok(id)
    }

    // ─── Queries ────────────────────────────────────────────────

    /// The executing task: head of the active level's queue.
    ///
    /// Panics if every run queue is empty, which an idle task prevents.
    pub fn current_task(&self) -> TaskId {
        match self.running[self.current_level].front() {
            Some(&id) => id,
            None => panic!("run queue {} empty: no idle task", self.current_level),
        }
    }

    pub fn current_level(&self) -> usize {
        self.current_level
    }

    /// A level change is waiting for the next rotation.
    pub fn level_change_pending(&self) -> bool {
        self.level_changed
    }

    /// Snapshot of one level's run queue, head first.
    pub fn run_queue(&self, level: usize) -> impl Iterator<Item = TaskId> + '_ {
        self.running
            .get(level)
            .into_iter()
            .flat_map(|q| q.iter().copied())
    }

    // ─── Sleep / wakeup ─────────────────────────────────────────

    /// Make a task schedulable at `level` (or its previous level).
    ///
    /// Waking a task that is already running changes its level instead.
    pub fn wakeup(&mut self, id: TaskId, level: Option<usize>) -> Result<(), TaskError> {
        let level = level.map(|l| self.config.check_level(l)).transpose()?;
        let task = self.tasks.get_mut(&id).ok_or(TaskError::NoSuchTask)?;

        if task.is_running() {
            self.change_level_running(id, level);
            return Ok(());
        }

        let level = level.unwrap_or(task.level());
        task.set_level(level);
        task.set_running(true);
        self.running[level].push_back(id);
        if level > self.current_level {
            self.level_changed = true;
        }
        Ok(())
    }

    /// Remove a task from its run queue.
    ///
    /// If it is the executing task, the returned [`Switch`] must be carried
    /// out before the caller continues.
    pub fn sleep(&mut self, id: TaskId) -> Result<Option<Switch>, TaskError> {
        self.reap_zombies();
        let task = self.tasks.get_mut(&id).ok_or(TaskError::NoSuchTask)?;
        if !task.is_running() {
            return Ok(None);
        }
        task.set_running(false);
        let level = task.level();

        if self.running[self.current_level].front() == Some(&id) {
            self.rotate_current_run_queue(true);
            return Ok(Some(Switch {
                next: self.current_task(),
                current: id,
            }));
        }

        erase(&mut self.running[level], id);
        Ok(None)
    }

    fn change_level_running(&mut self, id: TaskId, level: Option<usize>) {
        let Some(task) = self.tasks.get_mut(&id) else {
            return;
        };
        let old = task.level();
        let level = match level {
            Some(l) if l != old => l,
            _ => return,
        };
        task.set_level(level);

        if self.running[self.current_level].front() != Some(&id) {
            erase(&mut self.running[old], id);
            match self.config.requeue_policy {
                RequeuePolicy::Back => self.running[level].push_back(id),
                // The head of the active level is on the CPU; stay behind it.
                RequeuePolicy::Front if level == self.current_level => {
                    let queue = &mut self.running[level];
                    queue.insert(queue.len().min(1), id);
                }
                RequeuePolicy::Front => self.running[level].push_front(id),
            }
            if level > self.current_level {
                self.level_changed = true;
            }
            return;
        }

        // The executing task moves itself and keeps the CPU.
        self.running[self.current_level].pop_front();
        self.running[level].push_front(id);
        if level < self.current_level {
            self.level_changed = true;
        }
        self.current_level = level;
    }

    // ─── Scheduling ─────────────────────────────────────────────

    /// Scheduler-timer rotation from interrupt context.
    ///
    /// Stores `saved` as the interrupted task's context, rotates the active
    /// level and returns the task to resume if it is a different one.
    pub fn switch_task(&mut self, saved: &TaskContext) -> Option<TaskId> {
        let current = *self.running[self.current_level].front()?;
        if let Some(task) = self.tasks.get_mut(&current) {
            *task.context_mut() = *saved;
        }
        self.rotate_current_run_queue(false);
        let next = *self.running[self.current_level].front()?;
        (next != current).then_some(next)
    }

    fn rotate_current_run_queue(&mut self, current_sleep: bool) -> Option<TaskId> {
        let queue = &mut self.running[self.current_level];
        let current = queue.pop_front()?;
        if !current_sleep {
            queue.push_back(current);
        }
        if queue.is_empty() {
            self.level_changed = true;
        }

        if self.level_changed {
            self.level_changed = false;
            if let Some(level) = (0..=MAX_LEVEL).rev().find(|&l| !self.running[l].is_empty()) {
                self.current_level = level;
            }
        }
        Some(current)
    }

    // ─── Messages ───────────────────────────────────────────────

    /// Queue `msg` for a task and wake it.
    pub fn send_message(&mut self, id: TaskId, msg: Message) -> Result<(), TaskError> {
        let task = self.tasks.get_mut(&id).ok_or(TaskError::NoSuchTask)?;
        task.push_message(msg);
        self.wakeup(id, None)
    }

    /// Take the oldest message from a task's mailbox.
    pub fn receive_message(&mut self, id: TaskId) -> Result<Option<Message>, TaskError> {
        let task = self.tasks.get_mut(&id).ok_or(TaskError::NoSuchTask)?;
        Ok(task.pop_message())
    }

    // ─── Exit ───────────────────────────────────────────────────

    /// Retire the executing task with `exit_code` and return the task to
    /// resume.
    ///
    /// The code is kept until a `wait_finish` consumes it, so a waiter that
    /// arrives late still sees it. Codes of tasks nobody waits for are never
    /// released; one `i32` per finished task.
    pub fn finish(&mut self, exit_code: i32) -> TaskId {
        if let Some(id) = self.rotate_current_run_queue(true) {
            if let Some(mut task) = self.tasks.remove(&id) {
                task.set_running(false);
                self.zombies.push(task);
            }
            self.finish_codes.insert(id, exit_code);
            println!("[SCHED] {} finished with code {}", id, exit_code);

            for waiter in self.finish_waiters.remove(&id).unwrap_or_default() {
                // A waiter that exited meanwhile has nothing to wake.
                let _ = self.wakeup(waiter, None);
            }
        }
        self.current_task()
    }

    /// One attempt of `waiter` waiting for `target` to exit.
    pub fn wait_finish(&mut self, waiter: TaskId, target: TaskId) -> Result<WaitFinish, TaskError> {
        if let Some(code) = self.finish_codes.remove(&target) {
            return Ok(WaitFinish::Exited(code));
        }
        if !self.tasks.contains_key(&target) || !self.tasks.contains_key(&waiter) {
            return Err(TaskError::NoSuchTask);
        }

        let waiters = self.finish_waiters.entry(target).or_default();
        if !waiters.contains(&waiter) {
            waiters.push(waiter);
        }
        Ok(WaitFinish::Blocked(self.sleep(waiter)?))
    }

    /// Stable pointer to a task's saved context, live or just finished.
    pub fn context_ptr(&mut self, id: TaskId) -> Option<*mut TaskContext> {
        if let Some(task) = self.tasks.get_mut(&id) {
            return Some(task.context_mut() as *mut TaskContext);
        }
        self.zombies
            .iter_mut()
            .find(|t| t.id() == id)
            .map(|t| t.context_mut() as *mut TaskContext)
    }

    /// Release finished tasks. Only called from task context, after the
    /// exiting task has been switched away from.
    fn reap_zombies(&mut self) {
        self.zombies.clear();
    }

    pub fn zombie_count(&self) -> usize {
        self.zombies.len()
    }
}

fn erase(queue: &mut VecDeque<TaskId>, id: TaskId) {
    if let Some(pos) = queue.iter().position(|&t| t == id) {
        queue.remove(pos);
    }
}
