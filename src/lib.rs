//! Preemptive priority-level task scheduling for a single-CPU x86_64 kernel.
//!
//! Tasks sit in per-level round-robin run queues; the highest non-empty level
//! runs. A periodic scheduler timer rotates the active level from the timer
//! interrupt, and tasks talk to each other (and receive device and timer
//! events) through per-task mailboxes.
//!
//! Built for `x86_64-unknown-none` this is a bare-metal kernel core. On any
//! other target the architecture layer is simulated, which is how the test
//! suite runs.

#![cfg_attr(target_os = "none", no_std)]

extern crate alloc;

#[macro_use]
pub mod serial;

pub mod arch;
pub mod config;
pub mod kernel;
pub mod keyboard;
#[cfg(target_os = "none")]
pub mod memory;
pub mod message;
pub mod sync;
pub mod task;
pub mod timer;

pub use config::Config;
pub use kernel::Kernel;
pub use message::{Message, MessageKind};
pub use task::{TaskError, TaskId};
