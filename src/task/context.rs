//! Saved CPU state of a task and the contract for switching between them.
//!
//! The layout of [`TaskContext`] is shared with the switch and interrupt
//! entry assembly in `arch`; the offsets are fixed and checked at compile
//! time below.

use core::mem::offset_of;

/// Entry point of a task: `(first, second) -> exit code`.
///
/// `spawn` passes the task's own id as `first`.
pub type TaskFn = extern "C" fn(u64, u64) -> i32;

/// Size of the FXSAVE image stored at the end of the context.
pub const FXSAVE_AREA_BYTES: usize = 512;

/// RFLAGS with IF set (bit 9) and the always-one reserved bit 1.
pub const INITIAL_RFLAGS: u64 = 0x202;

/// x87 control word with every exception masked.
pub const DEFAULT_FCW: u16 = 0x037f;

/// MXCSR with every SSE exception masked, round-to-nearest.
pub const DEFAULT_MXCSR: u32 = 0x1f80;

const MXCSR_OFFSET: usize = 24;

/// Complete CPU-visible state of a paused task.
#[derive(Clone, Copy)]
#[repr(C, align(16))]
pub struct TaskContext {
    pub cr3: u64,
    pub rip: u64,
    pub rflags: u64,
    pub reserved1: u64,
    pub cs: u64,
    pub ss: u64,
    pub fs: u64,
    pub gs: u64,
    pub rax: u64,
    pub rbx: u64,
    pub rcx: u64,
    pub rdx: u64,
    pub rdi: u64,
    pub rsi: u64,
    pub rsp: u64,
    pub rbp: u64,
    pub r8: u64,
    pub r9: u64,
    pub r10: u64,
    pub r11: u64,
    pub r12: u64,
    pub r13: u64,
    pub r14: u64,
    pub r15: u64,
    pub fxsave_area: [u8; FXSAVE_AREA_BYTES],
}

const _: () = {
    assert!(offset_of!(TaskContext, cr3) == 0x00);
    assert!(offset_of!(TaskContext, cs) == 0x20);
    assert!(offset_of!(TaskContext, rax) == 0x40);
    assert!(offset_of!(TaskContext, rsp) == 0x70);
    assert!(offset_of!(TaskContext, r8) == 0x80);
    assert!(offset_of!(TaskContext, fxsave_area) == 0xc0);
    assert!(core::mem::size_of::<TaskContext>() == 0xc0 + FXSAVE_AREA_BYTES);
};

impl TaskContext {
    pub const fn zeroed() -> Self {
        TaskContext {
            cr3: 0,
            rip: 0,
            rflags: 0,
            reserved1: 0,
            cs: 0,
            ss: 0,
            fs: 0,
            gs: 0,
            rax: 0,
            rbx: 0,
            rcx: 0,
            rdx: 0,
            rdi: 0,
            rsi: 0,
            rsp: 0,
            rbp: 0,
            r8: 0,
            r9: 0,
            r10: 0,
            r11: 0,
            r12: 0,
            r13: 0,
            r14: 0,
            r15: 0,
            fxsave_area: [0; FXSAVE_AREA_BYTES],
        }
    }

    /// Fresh context that starts `entry(arg1, arg2)` on `stack_pointer`.
    ///
    /// Page-table root and code/stack selectors are taken from the CPU as it
    /// is now, so the task runs in the same address space and privilege.
    pub fn for_entry(entry: TaskFn, arg1: u64, arg2: u64, stack_pointer: u64) -> Self {
        let mut ctx = TaskContext::zeroed();
        let (cs, ss) = crate::arch::current_selectors();

        ctx.cr3 = crate::arch::current_page_table_root();
        ctx.cs = cs;
        ctx.ss = ss;
        ctx.rip = entry as usize as u64;
        ctx.rdi = arg1;
        ctx.rsi = arg2;
        ctx.rsp = stack_pointer;
        ctx.rflags = INITIAL_RFLAGS;
        ctx.fxsave_area[0..2].copy_from_slice(&DEFAULT_FCW.to_le_bytes());
        ctx.fxsave_area[MXCSR_OFFSET..MXCSR_OFFSET + 4]
            .copy_from_slice(&DEFAULT_MXCSR.to_le_bytes());
        ctx
    }

    pub fn fcw(&self) -> u16 {
        u16::from_le_bytes([self.fxsave_area[0], self.fxsave_area[1]])
    }

    pub fn mxcsr(&self) -> u32 {
        let b = &self.fxsave_area[MXCSR_OFFSET..MXCSR_OFFSET + 4];
        u32::from_le_bytes([b[0], b[1], b[2], b[3]])
    }
}

impl core::fmt::Debug for TaskContext {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_struct("TaskContext")
            .field("rip", &format_args!("{:#x}", self.rip))
            .field("rsp", &format_args!("{:#x}", self.rsp))
            .field("rflags", &format_args!("{:#x}", self.rflags))
            .field("cr3", &format_args!("{:#x}", self.cr3))
            .finish_non_exhaustive()
    }
}

/// Architecture primitive that moves the CPU from one task to another.
///
/// Implemented with assembly by `arch` on bare metal; tests substitute a
/// recorder.
pub trait ContextSwitch: Sync {
    /// Save the live registers into `current`, then resume `next`.
    ///
    /// Returns only when something later resumes `current`.
    ///
    /// # Safety
    /// Both pointers must reference task contexts that stay allocated until
    /// the switch completes, and interrupts must be masked.
    unsafe fn switch_context(&self, next: *const TaskContext, current: *mut TaskContext);

    /// Resume `next`, discarding the caller's state.
    ///
    /// # Safety
    /// `next` must hold a context that is valid to resume.
    unsafe fn restore_context(&self, next: *const TaskContext) -> !;
}
