//! Mutual exclusion between task context and interrupt handlers.
//!
//! There is one CPU and no blocking locks. Shared kernel state is only ever
//! touched with interrupts masked, which keeps the timer ISR out while a task
//! is mid-update. Interrupt handlers run with interrupts already off.

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicBool, Ordering};

use crate::arch;

/// Interrupts stay disabled while this guard lives.
///
/// Dropping it restores whatever interrupt state was in effect when it was
/// acquired, so masks nest.
pub struct InterruptMask {
    were_enabled: bool,
}

impl InterruptMask {
    pub fn acquire() -> Self {
        let were_enabled = arch::interrupts_enabled();
        arch::disable_interrupts();
        InterruptMask { were_enabled }
    }
}

impl Drop for InterruptMask {
    fn drop(&mut self) {
        if self.were_enabled {
            arch::enable_interrupts();
        }
    }
}

/// Kernel state shared between tasks and interrupt handlers.
///
/// Access goes through a closure under an [`InterruptMask`]; the `&mut`
/// handed to the closure cannot escape it, so no borrow is held across a
/// context switch.
pub struct InterruptCell<T> {
    value: UnsafeCell<T>,
    borrowed: AtomicBool,
}

// SAFETY:
// - Single CPU; every access runs with interrupts masked.
// - Nested access is detected by `borrowed` and panics.
unsafe impl<T: Send> Sync for InterruptCell<T> {}

impl<T> InterruptCell<T> {
    pub const fn new(value: T) -> Self {
        InterruptCell {
            value: UnsafeCell::new(value),
            borrowed: AtomicBool::new(false),
        }
    }

    /// Run `f` with exclusive access, masking interrupts for the duration.
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mask = InterruptMask::acquire();
        self.with_masked(&mask, f)
    }

    /// Run `f` with exclusive access under a mask the caller already holds.
    pub fn with_masked<R>(&self, _mask: &InterruptMask, f: impl FnOnce(&mut T) -> R) -> R {
        if self.borrowed.swap(true, Ordering::Acquire) {
            panic!("re-entrant access to kernel state");
        }
        let _release = Release(&self.borrowed);
        // SAFETY:
        // - Interrupts are masked, so no handler can observe `value`.
        // - `borrowed` guarantees this is the only live reference.
        f(unsafe { &mut *self.value.get() })
    }
}

struct Release<'a>(&'a AtomicBool);

impl Drop for Release<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
