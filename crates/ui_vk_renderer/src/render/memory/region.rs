//! Byte ranges handed out by the memory pool

/// Round `value` up to the next multiple of `alignment`
///
/// `alignment` must be a non-zero power of two.
pub const fn align_up(value: u64, alignment: u64) -> u64 {
    (value + alignment - 1) & !(alignment - 1)
}

/// Round `value` down to a multiple of `alignment`
///
/// `alignment` must be a non-zero power of two.
pub const fn align_down(value: u64, alignment: u64) -> u64 {
    value & !(alignment - 1)
}

/// A claimed byte range inside the shared buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemoryRegion {
    offset: u64,
    size: u64,
}

impl MemoryRegion {
    pub(super) const fn new(offset: u64, size: u64) -> Self {
        Self { offset, size }
    }

    /// Byte offset from the start of the buffer
    pub const fn offset(&self) -> u64 {
        self.offset
    }

    /// Length in bytes
    pub const fn size(&self) -> u64 {
        self.size
    }

    /// One past the last byte
    pub const fn end(&self) -> u64 {
        self.offset + self.size
    }

    /// Whether two regions share at least one byte
    pub const fn overlaps(&self, other: &Self) -> bool {
        self.offset < other.end() && other.offset < self.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alignment_rounding() {
        assert_eq!(align_up(0, 64), 0);
        assert_eq!(align_up(1, 64), 64);
        assert_eq!(align_up(64, 64), 64);
        assert_eq!(align_up(65, 256), 256);
        assert_eq!(align_down(1000, 256), 768);
        assert_eq!(align_down(255, 256), 0);
        assert_eq!(align_down(1024, 256), 1024);
    }

    #[test]
    fn test_overlap_is_exclusive_at_the_end() {
        let a = MemoryRegion::new(0, 64);
        let b = MemoryRegion::new(64, 64);
        let c = MemoryRegion::new(32, 64);
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&c));
        assert!(c.overlaps(&b));
        assert_eq!(b.end(), 128);
    }
}
