//! Deferred destruction keyed by frame slot
//!
//! Anything the GPU may still read is parked in the bucket of the slot that
//! was active when it was released. The bucket is drained the next time that
//! slot comes around, right after its fence has been waited on, which is
//! `ring_depth` frames later.

/// Per-slot buckets of resources awaiting destruction
#[derive(Debug)]
pub struct DeletionQueue<R> {
    buckets: Vec<Vec<R>>,
}

impl<R> DeletionQueue<R> {
    /// Create one empty bucket per frame slot
    pub fn new(ring_depth: usize) -> Self {
        Self {
            buckets: (0..ring_depth.max(1)).map(|_| Vec::new()).collect(),
        }
    }

    /// Park `resource` under `slot`
    pub fn enqueue(&mut self, slot: usize, resource: R) {
        let index = slot % self.buckets.len();
        self.buckets[index].push(resource);
    }

    /// Take every resource parked under `slot`
    ///
    /// Only call once the slot's fence has signaled.
    pub fn drain(&mut self, slot: usize) -> std::vec::Drain<'_, R> {
        let index = slot % self.buckets.len();
        self.buckets[index].drain(..)
    }

    /// Take everything, oldest slot order not guaranteed
    ///
    /// Only valid once the device is idle.
    pub fn drain_all(&mut self) -> Vec<R> {
        self.buckets.iter_mut().flat_map(std::mem::take).collect()
    }

    /// Total resources waiting
    pub fn pending(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum()
    }

    /// Resources waiting under `slot`
    pub fn pending_in(&self, slot: usize) -> usize {
        self.buckets[slot % self.buckets.len()].len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::frame::FrameRing;

    #[test]
    fn test_release_is_delayed_by_ring_depth_frames() {
        const DEPTH: usize = 3;
        let mut ring = FrameRing::new(DEPTH);
        let mut queue = DeletionQueue::new(DEPTH);
        let mut destroyed: Vec<(&str, u64)> = Vec::new();

        let mut begin_frame = |ring: &mut FrameRing, queue: &mut DeletionQueue<&'static str>| {
            let slot = ring.next();
            // fence of `slot` waited here
            let drained: Vec<_> = queue.drain(slot).collect();
            ring.advance();
            for item in drained {
                destroyed.push((item, ring.frames_begun()));
            }
        };

        begin_frame(&mut ring, &mut queue);
        queue.enqueue(ring.current(), "released in frame 1");

        for _ in 0..DEPTH - 1 {
            begin_frame(&mut ring, &mut queue);
        }
        assert_eq!(queue.pending(), 1);

        begin_frame(&mut ring, &mut queue);
        assert_eq!(queue.pending(), 0);
        assert_eq!(destroyed, vec![("released in frame 1", 1 + DEPTH as u64)]);
    }

    #[test]
    fn test_buckets_are_independent() {
        let mut queue = DeletionQueue::new(2);
        queue.enqueue(0, 10);
        queue.enqueue(1, 20);
        queue.enqueue(1, 21);

        assert_eq!(queue.pending_in(0), 1);
        assert_eq!(queue.pending_in(1), 2);
        assert_eq!(queue.drain(1).collect::<Vec<_>>(), vec![20, 21]);
        assert_eq!(queue.pending(), 1);

        let mut rest = queue.drain_all();
        rest.sort_unstable();
        assert_eq!(rest, vec![10]);
        assert_eq!(queue.pending(), 0);
    }
}
