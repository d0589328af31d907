//! Fixed-budget memory pool
//!
//! Suballocates the one shared GPU buffer through a VMA virtual block. Every
//! region is aligned to the device's minimum uniform alignment so it can be
//! bound as a vertex, index or dynamic uniform buffer offset. The pool never
//! grows and never exceeds its configured budget; running out is reported
//! to the caller.

use std::collections::BTreeMap;
use std::fmt;

use vk_mem::{VirtualAllocation, VirtualAllocationCreateFlags, VirtualAllocationCreateInfo, VirtualBlockCreateInfo};

use super::region::{align_down, align_up, MemoryRegion};
use crate::render::{RenderError, RenderResult};

struct LiveAllocation {
    allocation: VirtualAllocation,
    size: u64,
}

/// Suballocator over the one shared GPU buffer
pub struct MemoryPool {
    block: vk_mem::VirtualBlock,
    live: BTreeMap<u64, LiveAllocation>,
    alignment: u64,
    capacity: u64,
    used: u64,
    high_water_mark: u64,
}

impl MemoryPool {
    /// Create a pool of at most `size_bytes`, rounded down to `alignment`
    pub fn new(size_bytes: u64, alignment: u64) -> RenderResult<Self> {
        if !alignment.is_power_of_two() {
            return Err(RenderError::InitializationFailed(format!(
                "Memory pool alignment {alignment} is not a power of two"
            )));
        }

        let capacity = align_down(size_bytes, alignment);
        if capacity == 0 {
            return Err(RenderError::InitializationFailed(format!(
                "Memory pool of {size_bytes} bytes holds no {alignment}-byte aligned region"
            )));
        }

        let block = vk_mem::VirtualBlock::new(VirtualBlockCreateInfo::new().size(capacity))
            .map_err(|e| RenderError::InitializationFailed(format!("Failed to create virtual block: {e:?}")))?;
        log::debug!("Memory pool: {capacity} bytes, alignment {alignment}");

        Ok(Self {
            block,
            live: BTreeMap::new(),
            alignment,
            capacity,
            used: 0,
            high_water_mark: 0,
        })
    }

    /// Claim a region large enough for `size` bytes
    pub fn allocate(&mut self, size: u64) -> RenderResult<MemoryRegion> {
        if size == 0 || size > self.capacity {
            return Err(RenderError::PoolExhausted { requested: size });
        }

        let aligned = align_up(size, self.alignment);
        let create_info = VirtualAllocationCreateInfo {
            size: aligned,
            alignment: self.alignment,
            user_data: 0,
            flags: VirtualAllocationCreateFlags::VMA_VIRTUAL_ALLOCATION_CREATE_STRATEGY_MIN_OFFSET_BIT,
        };

        // SAFETY: the block outlives every allocation, `Drop` clears it first
        let (allocation, offset) = unsafe { self.block.allocate(create_info) }
            .map_err(|_| RenderError::PoolExhausted { requested: aligned })?;

        let region = MemoryRegion::new(offset, aligned);
        self.live.insert(offset, LiveAllocation { allocation, size: aligned });
        self.used += aligned;
        self.high_water_mark = self.high_water_mark.max(region.end());
        Ok(region)
    }

    /// Give a region back
    pub fn free(&mut self, region: MemoryRegion) -> RenderResult<()> {
        let unknown = RenderError::UnknownRegion { offset: region.offset() };
        if !self.live.get(&region.offset()).is_some_and(|live| live.size == region.size()) {
            return Err(unknown);
        }
        let mut live = self.live.remove(&region.offset()).ok_or(unknown)?;

        // SAFETY: the allocation came from this block and is freed exactly once
        unsafe { self.block.free(&mut live.allocation) };
        self.used -= live.size;
        Ok(())
    }

    /// Size of the backing address space
    pub const fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Bytes currently claimed
    pub const fn used(&self) -> u64 {
        self.used
    }

    /// Highest offset ever handed out
    pub const fn high_water_mark(&self) -> u64 {
        self.high_water_mark
    }

    /// Number of live regions
    pub fn allocation_count(&self) -> usize {
        self.live.len()
    }

    /// Live regions in offset order
    pub fn live_regions(&self) -> impl Iterator<Item = MemoryRegion> + '_ {
        self.live.iter().map(|(&offset, live)| MemoryRegion::new(offset, live.size))
    }
}

impl fmt::Debug for MemoryPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryPool")
            .field("capacity", &self.capacity)
            .field("alignment", &self.alignment)
            .field("used", &self.used)
            .field("high_water_mark", &self.high_water_mark)
            .field("allocations", &self.live.len())
            .finish()
    }
}

impl Drop for MemoryPool {
    fn drop(&mut self) {
        if !self.live.is_empty() {
            log::debug!("Memory pool dropped with {} live regions", self.live.len());
        }
        self.live.clear();
        // SAFETY: no region is referenced once the pool is gone
        unsafe { self.block.clear() };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_disjoint(pool: &MemoryPool) {
        let regions: Vec<_> = pool.live_regions().collect();
        for pair in regions.windows(2) {
            assert!(!pair[0].overlaps(&pair[1]), "{:?} overlaps {:?}", pair[0], pair[1]);
        }
        for region in &regions {
            assert!(region.end() <= pool.capacity());
        }
    }

    #[test]
    fn test_capacity_never_exceeds_the_budget() {
        let mut pool = MemoryPool::new(1000, 256).expect("Should create pool");
        assert_eq!(pool.capacity(), 768);

        let region = pool.allocate(72).expect("Should allocate");
        assert_eq!(region.size(), 256);
        assert_eq!(region.offset() % 256, 0);
    }

    #[test]
    fn test_unaligned_budget_is_not_overcommitted() {
        let mut pool = MemoryPool::new(1000, 256).expect("Should create pool");

        let granted: Vec<_> = (0..4).filter_map(|_| pool.allocate(200).ok()).collect();
        assert_eq!(granted.len(), 3);
        assert!(matches!(pool.allocate(200), Err(RenderError::PoolExhausted { .. })));
        assert!(pool.used() <= 1000);
        assert!(pool.high_water_mark() <= 1000);
        assert_disjoint(&pool);
    }

    #[test]
    fn test_invalid_setup_is_rejected() {
        assert!(MemoryPool::new(1024, 48).is_err());
        assert!(MemoryPool::new(0, 64).is_err());
        assert!(MemoryPool::new(255, 256).is_err());
    }

    #[test]
    fn test_exhaustion_is_local_to_the_call() {
        let mut pool = MemoryPool::new(1024, 64).expect("Should create pool");
        let big = pool.allocate(960).expect("Should allocate");

        assert!(matches!(pool.allocate(128), Err(RenderError::PoolExhausted { requested: 128 })));
        assert!(matches!(pool.allocate(4096), Err(RenderError::PoolExhausted { .. })));
        assert_eq!(pool.used(), 960);
        assert_eq!(pool.allocation_count(), 1);
        let small = pool.allocate(64).expect("Remaining space is still usable");

        pool.free(big).expect("Should free");
        pool.free(small).expect("Should free");
        assert_eq!(pool.used(), 0);
    }

    #[test]
    fn test_freed_range_is_reused_before_high_water_mark_grows() {
        let mut pool = MemoryPool::new(1024, 64).expect("Should create pool");
        let a = pool.allocate(64).expect("Should allocate");
        let _b = pool.allocate(128).expect("Should allocate");
        let _c = pool.allocate(256).expect("Should allocate");
        let mark = pool.high_water_mark();
        assert_eq!(mark, 448);

        pool.free(a).expect("Should free");
        let d = pool.allocate(64).expect("Should allocate");
        assert_eq!(d.offset(), a.offset());
        assert_eq!(pool.high_water_mark(), mark);
        assert_disjoint(&pool);
    }

    #[test]
    fn test_double_free_reports_unknown_region() {
        let mut pool = MemoryPool::new(1024, 64).expect("Should create pool");
        let region = pool.allocate(64).expect("Should allocate");

        pool.free(region).expect("Should free");
        assert!(matches!(
            pool.free(region),
            Err(RenderError::UnknownRegion { offset }) if offset == region.offset()
        ));
        assert_eq!(pool.used(), 0);
    }

    #[test]
    fn test_released_neighbours_serve_a_full_size_request() {
        let mut pool = MemoryPool::new(1024, 64).expect("Should create pool");
        let regions: Vec<_> = (0..16).map(|_| pool.allocate(64).expect("Should allocate")).collect();
        assert!(pool.allocate(64).is_err());

        for region in regions.into_iter().rev() {
            pool.free(region).expect("Should free");
        }
        let whole = pool.allocate(1024).expect("Freed ranges should merge");
        assert_eq!(whole.size(), 1024);
    }

    #[test]
    fn test_churn_keeps_regions_disjoint_and_within_budget() {
        let mut pool = MemoryPool::new(4000, 64).expect("Should create pool");
        let mut live = Vec::new();
        let mut state = 0x2545_f491_u64;

        for _ in 0..5000 {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;

            if state % 3 == 0 && !live.is_empty() {
                let index = (state as usize / 3) % live.len();
                let region = live.swap_remove(index);
                pool.free(region).expect("Should free a live region");
            } else if let Ok(region) = pool.allocate(1 + state % 300) {
                live.push(region);
            }

            assert!(pool.used() <= 4000);
            assert!(pool.high_water_mark() <= pool.capacity());
        }

        assert_eq!(pool.allocation_count(), live.len());
        assert_disjoint(&pool);
        for region in live {
            pool.free(region).expect("Should free");
        }
        assert_eq!(pool.used(), 0);
    }
}
