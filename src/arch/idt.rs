//! Interrupt descriptor table.
//!
//! Handlers are plain assembly entry points installed by address. CPU faults
//! are fatal: the stub reports the vector and faulting RIP and halts.

use core::arch::global_asm;

use lazy_static::lazy_static;
use x86_64::structures::idt::InterruptDescriptorTable;
use x86_64::VirtAddr;

use super::interrupts::{self, InterruptIndex};
use crate::println;

// Each stub passes (vector, frame, has_error_code). With an error code the
// frame starts with it; otherwise it starts at RIP.
global_asm!(
    ".global taskcore_fault_divide",
    "taskcore_fault_divide:",
    "    mov edi, 0",
    "    xor edx, edx",
    "    jmp 2f",
    ".global taskcore_fault_opcode",
    "taskcore_fault_opcode:",
    "    mov edi, 6",
    "    xor edx, edx",
    "    jmp 2f",
    ".global taskcore_fault_double",
    "taskcore_fault_double:",
    "    mov edi, 8",
    "    mov edx, 1",
    "    jmp 2f",
    ".global taskcore_fault_protection",
    "taskcore_fault_protection:",
    "    mov edi, 13",
    "    mov edx, 1",
    "    jmp 2f",
    ".global taskcore_fault_page",
    "taskcore_fault_page:",
    "    mov edi, 14",
    "    mov edx, 1",
    "2:",
    "    mov rsi, rsp",
    "    and rsp, -16",
    "    call {on_fault}",
    "    ud2",
    on_fault = sym fault_on_exception,
);

extern "C" {
    fn taskcore_fault_divide();
    fn taskcore_fault_opcode();
    fn taskcore_fault_double();
    fn taskcore_fault_protection();
    fn taskcore_fault_page();
}

fn addr(f: unsafe extern "C" fn()) -> VirtAddr {
    VirtAddr::new(f as usize as u64)
}

lazy_static! {
    static ref IDT: InterruptDescriptorTable = {
        let mut idt = InterruptDescriptorTable::new();
        unsafe {
            idt.divide_error.set_handler_addr(addr(taskcore_fault_divide));
            idt.invalid_opcode.set_handler_addr(addr(taskcore_fault_opcode));
            idt.double_fault.set_handler_addr(addr(taskcore_fault_double));
            idt.general_protection_fault
                .set_handler_addr(addr(taskcore_fault_protection));
            idt.page_fault.set_handler_addr(addr(taskcore_fault_page));

            idt[InterruptIndex::Timer.as_usize()]
                .set_handler_addr(VirtAddr::new(interrupts::timer_entry_address()));
            idt[InterruptIndex::Keyboard.as_usize()]
                .set_handler_addr(VirtAddr::new(interrupts::keyboard_entry_address()));
        }
        idt
    };
}

pub fn init() {
    IDT.load();
    println!("[OK] IDT loaded");
}

extern "C" fn fault_on_exception(vector: u64, frame: *const u64, has_error_code: u64) -> ! {
    // SAFETY: `frame` points at the CPU-pushed exception frame.
    let (error_code, rip) = unsafe {
        if has_error_code != 0 {
            (Some(*frame), *frame.add(1))
        } else {
            (None, *frame)
        }
    };
    println!("\n!!! CPU EXCEPTION {} at {:#x} (error {:?})", vector, rip, error_code);
    if vector == 14 {
        let cr2 = x86_64::registers::control::Cr2::read();
        println!("    faulting address {:?}", cr2);
    }
    loop {
        x86_64::instructions::interrupts::disable();
        x86_64::instructions::hlt();
    }
}
