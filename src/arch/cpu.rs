//! CPU primitives: interrupt flag, control registers, context switching.
//!
//! `taskcore_switch_context` and `taskcore_restore_context` operate on the
//! [`TaskContext`] layout (offsets in `task::context`). Restoring builds an
//! `iretq` frame from the saved SS/RSP/RFLAGS/CS/RIP, so the same path resumes
//! both tasks that switched away voluntarily and tasks preempted by the timer.

use core::arch::{asm, global_asm};

use x86_64::instructions::interrupts;
use x86_64::registers::control::Cr3;

use crate::task::context::{ContextSwitch, TaskContext};

global_asm!(
    ".global taskcore_switch_context",
    "taskcore_switch_context:",
    // rdi = next, rsi = current
    "    mov [rsi + 0x40], rax",
    "    mov [rsi + 0x48], rbx",
    "    mov [rsi + 0x50], rcx",
    "    mov [rsi + 0x58], rdx",
    "    mov [rsi + 0x60], rdi",
    "    mov [rsi + 0x68], rsi",
    "    lea rax, [rsp + 8]",
    "    mov [rsi + 0x70], rax",
    "    mov [rsi + 0x78], rbp",
    "    mov [rsi + 0x80], r8",
    "    mov [rsi + 0x88], r9",
    "    mov [rsi + 0x90], r10",
    "    mov [rsi + 0x98], r11",
    "    mov [rsi + 0xa0], r12",
    "    mov [rsi + 0xa8], r13",
    "    mov [rsi + 0xb0], r14",
    "    mov [rsi + 0xb8], r15",
    "    mov rax, cr3",
    "    mov [rsi + 0x00], rax",
    "    mov rax, [rsp]",
    "    mov [rsi + 0x08], rax",
    "    pushfq",
    "    pop qword ptr [rsi + 0x10]",
    "    xor eax, eax",
    "    mov ax, cs",
    "    mov [rsi + 0x20], rax",
    "    mov ax, ss",
    "    mov [rsi + 0x28], rax",
    "    mov ax, fs",
    "    mov [rsi + 0x30], rax",
    "    mov ax, gs",
    "    mov [rsi + 0x38], rax",
    "    fxsave64 [rsi + 0xc0]",
    // fall through
    ".global taskcore_restore_context",
    "taskcore_restore_context:",
    // rdi = context to resume
    "    push qword ptr [rdi + 0x28]",
    "    push qword ptr [rdi + 0x70]",
    "    push qword ptr [rdi + 0x10]",
    "    push qword ptr [rdi + 0x20]",
    "    push qword ptr [rdi + 0x08]",
    "    fxrstor64 [rdi + 0xc0]",
    "    mov rax, [rdi + 0x00]",
    "    mov cr3, rax",
    "    mov rax, [rdi + 0x30]",
    "    mov fs, ax",
    "    mov rax, [rdi + 0x38]",
    "    mov gs, ax",
    "    mov rax, [rdi + 0x40]",
    "    mov rbx, [rdi + 0x48]",
    "    mov rcx, [rdi + 0x50]",
    "    mov rdx, [rdi + 0x58]",
    "    mov rsi, [rdi + 0x68]",
    "    mov rbp, [rdi + 0x78]",
    "    mov r8,  [rdi + 0x80]",
    "    mov r9,  [rdi + 0x88]",
    "    mov r10, [rdi + 0x90]",
    "    mov r11, [rdi + 0x98]",
    "    mov r12, [rdi + 0xa0]",
    "    mov r13, [rdi + 0xa8]",
    "    mov r14, [rdi + 0xb0]",
    "    mov r15, [rdi + 0xb8]",
    "    mov rdi, [rdi + 0x60]",
    "    iretq",
    // A task entry function returned: its exit code is in eax and rsp is
    // 16-byte aligned.
    ".global taskcore_task_return",
    "taskcore_task_return:",
    "    mov edi, eax",
    "    call {task_returned}",
    "    ud2",
    task_returned = sym task_returned,
);

extern "C" {
    fn taskcore_switch_context(next: *const TaskContext, current: *mut TaskContext);
    fn taskcore_restore_context(next: *const TaskContext) -> !;
    fn taskcore_task_return();
}

extern "C" fn task_returned(exit_code: i32) -> ! {
    crate::kernel::get().finish(exit_code)
}

/// The physical CPU as a [`ContextSwitch`] implementation.
pub struct Cpu;

/// The one CPU this kernel runs on.
pub static CPU: Cpu = Cpu;

impl ContextSwitch for Cpu {
    unsafe fn switch_context(&self, next: *const TaskContext, current: *mut TaskContext) {
        unsafe { taskcore_switch_context(next, current) }
    }

    unsafe fn restore_context(&self, next: *const TaskContext) -> ! {
        unsafe { taskcore_restore_context(next) }
    }
}

pub fn interrupts_enabled() -> bool {
    interrupts::are_enabled()
}

pub fn enable_interrupts() {
    interrupts::enable();
}

pub fn disable_interrupts() {
    interrupts::disable();
}

/// Raw CR3: PML4 frame address plus PWT/PCD flags.
pub fn current_page_table_root() -> u64 {
    let (frame, flags) = Cr3::read();
    frame.start_address().as_u64() | flags.bits()
}

/// Current (code, stack) segment selectors.
pub fn current_selectors() -> (u64, u64) {
    let cs: u16;
    let ss: u16;
    unsafe {
        asm!(
            "mov {0:x}, cs",
            "mov {1:x}, ss",
            out(reg) cs,
            out(reg) ss,
            options(nomem, nostack, preserves_flags),
        );
    }
    (u64::from(cs), u64::from(ss))
}

pub fn task_return_address() -> u64 {
    taskcore_task_return as usize as u64
}

/// Halt until the next interrupt.
pub fn halt() {
    x86_64::instructions::hlt();
}
