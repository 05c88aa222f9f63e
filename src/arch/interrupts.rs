//! Hardware interrupts: PIC8259, PIT channel 0, keyboard.
//!
//! IRQ 0-15 are remapped to vectors 32-47, clear of the CPU exceptions.
//!
//! The timer entry saves the interrupted task into a [`TaskContext`] laid out
//! on the interrupt stack and hands it to the kernel; if the scheduler picks
//! another task, that task is resumed directly and this frame is abandoned.

use core::arch::global_asm;

use lazy_static::lazy_static;
use pic8259::ChainedPics;
use spin::Mutex;
use x86_64::instructions::port::Port;

use crate::keyboard::KeyboardDecoder;
use crate::println;
use crate::task::context::TaskContext;

/// PIC1 starts at vector 32 (right after CPU exceptions 0-31).
pub const PIC_1_OFFSET: u8 = 32;
/// PIC2 starts at vector 40.
pub const PIC_2_OFFSET: u8 = PIC_1_OFFSET + 8;

/// PIT input clock in Hz.
const PIT_BASE_FREQ: u64 = 1_193_182;

/// Hardware interrupt vector indices.
#[derive(Debug, Clone, Copy)]
#[repr(u8)]
pub enum InterruptIndex {
    Timer = PIC_1_OFFSET,        // IRQ0 → vector 32
    Keyboard = PIC_1_OFFSET + 1, // IRQ1 → vector 33
}

impl InterruptIndex {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn as_usize(self) -> usize {
        usize::from(self.as_u8())
    }
}

pub static PICS: Mutex<ChainedPics> =
    Mutex::new(unsafe { ChainedPics::new(PIC_1_OFFSET, PIC_2_OFFSET) });

lazy_static! {
    static ref KEYBOARD: Mutex<KeyboardDecoder> = Mutex::new(KeyboardDecoder::new());
}

/// Remap the PICs and unmask only the timer and keyboard lines.
pub fn init_pic() {
    let mut pics = PICS.lock();
    unsafe {
        pics.initialize();
        pics.write_masks(0b1111_1100, 0b1111_1111);
    }
}

/// Program PIT channel 0 as a rate generator at `freq` Hz.
pub fn init_pit(freq: u64) {
    let divisor = (PIT_BASE_FREQ / freq.max(1)).clamp(1, u64::from(u16::MAX)) as u16;
    let mut command = Port::<u8>::new(0x43);
    let mut channel0 = Port::<u8>::new(0x40);
    unsafe {
        // channel 0, lobyte/hibyte, mode 3
        command.write(0x36);
        channel0.write(divisor as u8);
        channel0.write((divisor >> 8) as u8);
    }
    println!("[OK] PIT at {} Hz (divisor {})", freq, divisor);
}

/// EOI straight to the PIC1 command port; both lines live on PIC1.
fn end_of_interrupt() {
    unsafe {
        Port::<u8>::new(0x20).write(0x20);
    }
}

// ─── Entry stubs ────────────────────────────────────────────────

global_asm!(
    ".global taskcore_timer_entry",
    "taskcore_timer_entry:",
    "    push rbp",
    "    mov rbp, rsp",
    "    sub rsp, 512",
    "    fxsave64 [rsp]",
    "    push r15",
    "    push r14",
    "    push r13",
    "    push r12",
    "    push r11",
    "    push r10",
    "    push r9",
    "    push r8",
    "    push qword ptr [rbp]",        // rbp
    "    push qword ptr [rbp + 0x20]", // rsp
    "    push rsi",
    "    push rdi",
    "    push rdx",
    "    push rcx",
    "    push rbx",
    "    push rax",
    "    xor eax, eax",
    "    mov ax, gs",
    "    push rax",
    "    mov ax, fs",
    "    push rax",
    "    push qword ptr [rbp + 0x28]", // ss
    "    push qword ptr [rbp + 0x10]", // cs
    "    push 0",                      // reserved
    "    push qword ptr [rbp + 0x18]", // rflags
    "    push qword ptr [rbp + 0x08]", // rip
    "    mov rax, cr3",
    "    push rax",
    "    mov rdi, rsp",
    "    call {on_timer}",
    "    add rsp, 8 * 8",
    "    pop rax",
    "    pop rbx",
    "    pop rcx",
    "    pop rdx",
    "    pop rdi",
    "    pop rsi",
    "    add rsp, 16",
    "    pop r8",
    "    pop r9",
    "    pop r10",
    "    pop r11",
    "    pop r12",
    "    pop r13",
    "    pop r14",
    "    pop r15",
    "    fxrstor64 [rsp]",
    "    mov rsp, rbp",
    "    pop rbp",
    "    iretq",
    "",
    ".global taskcore_keyboard_entry",
    "taskcore_keyboard_entry:",
    "    push rbp",
    "    mov rbp, rsp",
    "    push rax",
    "    push rcx",
    "    push rdx",
    "    push rsi",
    "    push rdi",
    "    push r8",
    "    push r9",
    "    push r10",
    "    push r11",
    "    and rsp, -16",
    "    sub rsp, 512",
    "    fxsave64 [rsp]",
    "    call {on_keyboard}",
    "    fxrstor64 [rsp]",
    "    lea rsp, [rbp - 9 * 8]",
    "    pop r11",
    "    pop r10",
    "    pop r9",
    "    pop r8",
    "    pop rdi",
    "    pop rsi",
    "    pop rdx",
    "    pop rcx",
    "    pop rax",
    "    pop rbp",
    "    iretq",
    on_timer = sym timer_on_interrupt,
    on_keyboard = sym keyboard_on_interrupt,
);

extern "C" {
    fn taskcore_timer_entry();
    fn taskcore_keyboard_entry();
}

pub(super) fn timer_entry_address() -> u64 {
    taskcore_timer_entry as usize as u64
}

pub(super) fn keyboard_entry_address() -> u64 {
    taskcore_keyboard_entry as usize as u64
}

// ─── Handlers ───────────────────────────────────────────────────

/// Timer interrupt (IRQ0, vector 32).
extern "C" fn timer_on_interrupt(saved: *const TaskContext) {
    let kernel = crate::kernel::get();
    let switch_due = kernel.tick();
    end_of_interrupt();
    if switch_due {
        // SAFETY: `saved` is the frame built by `taskcore_timer_entry`.
        kernel.switch_task(unsafe { &*saved });
    }
}

/// Keyboard interrupt (IRQ1, vector 33): decode and post to the focus task.
extern "C" fn keyboard_on_interrupt() {
    let scancode: u8 = unsafe { Port::new(0x60).read() };

    if let Some(msg) = KEYBOARD.lock().on_scancode(scancode) {
        let kernel = crate::kernel::get();
        if let Some(focus) = kernel.input_focus() {
            if let Err(e) = kernel.send_message(focus, msg) {
                println!("[KBD] dropped key for {}: {}", focus, e);
            }
        }
    }

    end_of_interrupt();
}
