//! Physical frames for the kernel heap, handed out from the bootloader's
//! usable regions. Frames are never returned.

use bootloader_api::info::{MemoryRegion, MemoryRegionKind};
use x86_64::structures::paging::{FrameAllocator, PhysFrame, Size4KiB};
use x86_64::PhysAddr;

const FRAME_SIZE: u64 = 4096;

pub struct BootInfoFrameAllocator {
    regions: &'static [MemoryRegion],
    /// Index of the region being carved up.
    region: usize,
    /// Next free address inside that region.
    cursor: u64,
}

impl BootInfoFrameAllocator {
    /// # Safety
    /// Every `Usable` region in `regions` must really be unused.
    pub unsafe fn new(regions: &'static [MemoryRegion]) -> Self {
        BootInfoFrameAllocator {
            regions,
            region: 0,
            cursor: 0,
        }
    }

    /// Total usable frames in the memory map.
    pub fn usable_frames(&self) -> u64 {
        self.regions
            .iter()
            .filter(|r| r.kind == MemoryRegionKind::Usable)
            .map(|r| (r.end - r.start) / FRAME_SIZE)
            .sum()
    }
}

unsafe impl FrameAllocator<Size4KiB> for BootInfoFrameAllocator {
    fn allocate_frame(&mut self) -> Option<PhysFrame<Size4KiB>> {
        while let Some(region) = self.regions.get(self.region) {
            if region.kind == MemoryRegionKind::Usable {
                let start = self.cursor.max(region.start);
                let start = (start + FRAME_SIZE - 1) & !(FRAME_SIZE - 1);
                if start + FRAME_SIZE <= region.end {
                    self.cursor = start + FRAME_SIZE;
                    return Some(PhysFrame::containing_address(PhysAddr::new(start)));
                }
            }
            self.region += 1;
            self.cursor = 0;
        }
        None
    }
}
