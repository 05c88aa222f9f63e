//! Kernel heap: `linked_list_allocator` over a freshly mapped region.
//!
//! The timer and keyboard handlers allocate when they push into mailboxes.
//! Every heap operation runs with interrupts masked, so a handler can never
//! interrupt a task that holds the heap lock.

use core::alloc::{GlobalAlloc, Layout};

use linked_list_allocator::LockedHeap;
use x86_64::structures::paging::{
    mapper::MapToError, FrameAllocator, Mapper, Page, PageTableFlags, Size4KiB,
};
use x86_64::VirtAddr;

use crate::config::{HEAP_SIZE, HEAP_START};
use crate::sync::InterruptMask;

pub struct InterruptSafeHeap(LockedHeap);

impl InterruptSafeHeap {
    pub const fn empty() -> Self {
        InterruptSafeHeap(LockedHeap::empty())
    }

    pub fn free_bytes(&self) -> usize {
        let _mask = InterruptMask::acquire();
        self.0.lock().free()
    }
}

unsafe impl GlobalAlloc for InterruptSafeHeap {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let _mask = InterruptMask::acquire();
        unsafe { self.0.alloc(layout) }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        let _mask = InterruptMask::acquire();
        unsafe { self.0.dealloc(ptr, layout) }
    }
}

#[global_allocator]
pub static ALLOCATOR: InterruptSafeHeap = InterruptSafeHeap::empty();

/// Map `HEAP_SIZE` bytes at `HEAP_START` and hand them to the allocator.
pub fn init_heap(
    mapper: &mut impl Mapper<Size4KiB>,
    frame_allocator: &mut impl FrameAllocator<Size4KiB>,
) -> Result<(), MapToError<Size4KiB>> {
    let heap_start = VirtAddr::new(HEAP_START as u64);
    let heap_end = heap_start + (HEAP_SIZE as u64 - 1);
    let pages = Page::range_inclusive(
        Page::<Size4KiB>::containing_address(heap_start),
        Page::containing_address(heap_end),
    );

    let flags = PageTableFlags::PRESENT | PageTableFlags::WRITABLE;
    for page in pages {
        let frame = frame_allocator
            .allocate_frame()
            .ok_or(MapToError::FrameAllocationFailed)?;
        unsafe {
            mapper.map_to(page, frame, flags, frame_allocator)?.flush();
        }
    }

    let _mask = InterruptMask::acquire();
    unsafe {
        ALLOCATOR.0.lock().init(HEAP_START as *mut u8, HEAP_SIZE);
    }
    Ok(())
}
