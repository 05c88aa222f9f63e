//! x86_64 architecture support.
//!
//! On bare metal (`target_os = "none"`) this is the real CPU: interrupt
//! masking, the context switch assembly, IDT/PIC/PIT setup. Everywhere else a
//! simulated CPU stands in so the scheduler can be exercised on a host.
//!
//! Both variants export the same set of free functions:
//! `interrupts_enabled`, `enable_interrupts`, `disable_interrupts`,
//! `current_page_table_root`, `current_selectors`, `task_return_address`.

#[cfg(target_os = "none")]
mod cpu;
#[cfg(target_os = "none")]
mod idt;
#[cfg(target_os = "none")]
pub mod interrupts;

#[cfg(target_os = "none")]
pub use cpu::*;

#[cfg(not(target_os = "none"))]
mod fake;
#[cfg(not(target_os = "none"))]
pub use fake::*;

/// Initialize interrupt handling (IDT, PIC, PIT). Interrupts stay disabled.
///
/// Must run after the kernel context has been installed.
#[cfg(target_os = "none")]
pub fn init() {
    idt::init();
    interrupts::init_pic();
    interrupts::init_pit(crate::config::TIMER_FREQ);
}
