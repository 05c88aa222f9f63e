//! Simulated CPU for hosted builds.
//!
//! The interrupt flag is per thread so concurrently running tests do not
//! observe each other's masks.

use std::cell::Cell;

/// Page-table root reported to new task contexts.
pub const SIMULATED_PAGE_TABLE_ROOT: u64 = 0x0010_0000;

/// (code, stack) selectors reported to new task contexts.
pub const SIMULATED_SELECTORS: (u64, u64) = (0x08, 0x10);

std::thread_local! {
    static INTERRUPT_FLAG: Cell<bool> = const { Cell::new(true) };
}

pub fn interrupts_enabled() -> bool {
    INTERRUPT_FLAG.with(|f| f.get())
}

pub fn enable_interrupts() {
    INTERRUPT_FLAG.with(|f| f.set(true));
}

pub fn disable_interrupts() {
    INTERRUPT_FLAG.with(|f| f.set(false));
}

pub fn current_page_table_root() -> u64 {
    SIMULATED_PAGE_TABLE_ROOT
}

pub fn current_selectors() -> (u64, u64) {
    SIMULATED_SELECTORS
}

extern "C" fn simulated_task_return() -> ! {
    panic!("task entry returned on the simulated CPU");
}

pub fn task_return_address() -> u64 {
    simulated_task_return as usize as u64
}
