//! Memory bring-up: page-table access and the kernel heap that backs task
//! stacks, mailboxes and the scheduler's queues.

pub mod frame_allocator;
pub mod heap;

use bootloader_api::BootInfo;
use x86_64::structures::paging::{OffsetPageTable, PageTable};
use x86_64::VirtAddr;

use crate::config::HEAP_SIZE;
use crate::println;

/// Memory bring-up failures. Both are fatal at boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryError {
    /// The bootloader did not map physical memory.
    NoPhysicalMapping,
    /// The heap could not be mapped.
    HeapMapping,
}

/// Set up the kernel heap. Must run before anything allocates.
pub fn init(boot_info: &'static BootInfo) -> Result<(), MemoryError> {
    let offset = boot_info
        .physical_memory_offset
        .into_option()
        .ok_or(MemoryError::NoPhysicalMapping)?;
    let offset = VirtAddr::new(offset);

    let level_4_table = unsafe { active_level_4_table(offset) };
    let mut mapper = unsafe { OffsetPageTable::new(level_4_table, offset) };
    let mut frames = unsafe { frame_allocator::BootInfoFrameAllocator::new(&boot_info.memory_regions) };

    let usable = frames.usable_frames();
    println!(
        "[OK] Frame allocator initialized ({} usable frames, {} MiB)",
        usable,
        usable * 4096 / 1024 / 1024
    );

    heap::init_heap(&mut mapper, &mut frames).map_err(|_| MemoryError::HeapMapping)?;
    println!(
        "[OK] Kernel heap initialized ({} KiB, {} KiB free)",
        HEAP_SIZE / 1024,
        heap::ALLOCATOR.free_bytes() / 1024
    );
    Ok(())
}

/// # Safety
/// `physical_memory_offset` must be where the bootloader mapped physical
/// memory, and this must be called only once.
unsafe fn active_level_4_table(physical_memory_offset: VirtAddr) -> &'static mut PageTable {
    use x86_64::registers::control::Cr3;

    let (frame, _) = Cr3::read();
    let virt = physical_memory_offset + frame.start_address().as_u64();
    let table: *mut PageTable = virt.as_mut_ptr();
    unsafe { &mut *table }
}
