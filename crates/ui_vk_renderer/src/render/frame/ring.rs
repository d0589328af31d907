//! Round-robin frame slot cursor

/// Cursor over `depth` frame slots
///
/// Before the first frame the cursor sits on the last slot, so the first
/// [`FrameRing::advance`] lands on slot 0.
#[derive(Debug, Clone)]
pub struct FrameRing {
    depth: usize,
    current: usize,
    frames_begun: u64,
}

impl FrameRing {
    /// Create a ring with `depth` slots (at least one)
    pub fn new(depth: usize) -> Self {
        let depth = depth.max(1);
        Self {
            depth,
            current: depth - 1,
            frames_begun: 0,
        }
    }

    /// Number of slots
    pub const fn depth(&self) -> usize {
        self.depth
    }

    /// Slot of the frame most recently begun
    pub const fn current(&self) -> usize {
        self.current
    }

    /// Slot the next frame will use
    pub const fn next(&self) -> usize {
        (self.current + 1) % self.depth
    }

    /// Move to the next slot and return it
    pub fn advance(&mut self) -> usize {
        self.current = self.next();
        self.frames_begun += 1;
        log::trace!("Frame {} uses slot {}", self.frames_begun, self.current);
        self.current
    }

    /// How many times the ring has advanced
    pub const fn frames_begun(&self) -> u64 {
        self.frames_begun
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slots_advance_round_robin() {
        let mut ring = FrameRing::new(3);
        assert_eq!(ring.current(), 2);
        assert_eq!(ring.next(), 0);

        let slots: Vec<usize> = (0..7).map(|_| ring.advance()).collect();
        assert_eq!(slots, vec![0, 1, 2, 0, 1, 2, 0]);
        assert_eq!(ring.frames_begun(), 7);
    }

    #[test]
    fn test_zero_depth_is_clamped() {
        let mut ring = FrameRing::new(0);
        assert_eq!(ring.depth(), 1);
        assert_eq!(ring.advance(), 0);
        assert_eq!(ring.advance(), 0);
    }
}
