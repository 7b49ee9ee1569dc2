use std::cmp::Ordering;
use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Mutex;

use super::page::FrameId;

/// Replacer tracks frame usage for replacement in case the buffer pool is full.
pub trait Replacer: Send + Sync {
    /// Record the event that the given frame id is accessed at current timestamp.
    /// Create a new entry for access history if frame id has not been seen before.
    fn record_access(&self, frame_id: FrameId);

    /// Find the frame to evict with the replace policy (e.g. backward k-distance).
    /// Only frames that are marked as evictable are candidates for eviction.
    ///
    /// Successful eviction of a frame should decrement the size of replacer and
    /// remove the frame's access history.
    ///
    /// Return the frame id if a frame is evicted successfully, None if no frames
    /// can be evicted.
    fn evict(&self) -> Option<FrameId>;

    /// Toggle whether a frame is evictable or non-evictable. this function also
    /// controls replacer size. Note that size is equal to the number of evictable
    /// entries.
    ///
    /// If a frame was previously evictable and is to be set to non-evictable, then
    /// size should decrement. If a frame was previously non-evictable and is to be
    /// set evictable, then size should increment.
    fn set_evictable(&self, frame_id: FrameId, evictable: bool);

    /// Check if a frame is evictable. if the frame is not found, return true.
    fn is_evictable(&self, frame_id: FrameId) -> bool;

    /// Remove an evictable frame from the replacer, along with its access history.
    /// This function should also decrement the replacer size if removal is
    /// successful.
    ///
    /// Note that this is different from evicting a frame without checking the
    /// replace policy.
    ///
    /// Calling remove on a non-evictable frame, or on a frame that has no access
    /// history, is a programming error and panics.
    fn remove(&self, frame_id: FrameId);

    /// replacer size.
    fn size(&self) -> usize;
}

/// Ordering key for eviction. Sorting ascending puts the frame with the
/// greatest backward k-distance first; ties are broken by the frame with
/// the oldest retained timestamp.
#[derive(Debug, Eq, PartialEq)]
struct KDistance {
    frame_id: FrameId,
    distance: usize,
    oldest_at: usize,
}

impl PartialOrd for KDistance {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for KDistance {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.distance.cmp(&other.distance).reverse() {
            Ordering::Equal => self.oldest_at.cmp(&other.oldest_at),
            other => other,
        }
    }
}

struct LRUKNode {
    k: usize,
    frame_id: FrameId,
    is_evictable: bool,
    /// The last up-to-k access timestamps of the frame, least recent in
    /// front. While the frame has fewer than k accesses the front is its
    /// very first access.
    history: VecDeque<usize>,
}

impl LRUKNode {
    fn new(frame_id: FrameId, k: usize) -> Self {
        LRUKNode { history: VecDeque::with_capacity(k), k, frame_id, is_evictable: false }
    }

    fn record_access(&mut self, timestamp: usize) {
        if self.history.len() == self.k {
            self.history.pop_front();
        }
        self.history.push_back(timestamp)
    }

    fn k_distance(&self, now: usize) -> KDistance {
        // a node is only created by an access, so the history always has
        // at least one element and unwrap here cannot panic.
        let oldest = *self.history.front().unwrap();
        if self.history.len() < self.k {
            return KDistance { frame_id: self.frame_id, distance: usize::MAX, oldest_at: oldest };
        }
        // with a full history the front is the k-th most recent access.
        KDistance { frame_id: self.frame_id, distance: now - oldest, oldest_at: oldest }
    }
}

/// LRUKReplacer implements the LRU-k replacement policy.
///
/// The LRU-k algorithm evicts a frame whose backward k-distance is maximum of
/// all frames. Backward k-distance is computed as the difference in time between
/// the current timestamp and the timestamp of the k-th previous access.
///
/// A frame with less than k history references is given +inf as its backward
/// k-distance. When multiple frames have +inf backward k-distance, the frame
/// with the earliest first access is evicted; among frames with a full history,
/// ties go to the earliest k-th most recent access.
pub struct LRUKReplacer {
    nodes: HashMap<FrameId, LRUKNode>,
    current_timestamp: usize,
    current_size: usize,
    replacer_size: usize,
    k: usize,
}

impl LRUKReplacer {
    pub fn new(k: usize, size: usize) -> Self {
        assert!(k > 0, "replacer k must be larger than zero");
        let nodes = HashMap::new();
        LRUKReplacer { nodes, current_timestamp: 0, current_size: 0, replacer_size: size, k }
    }

    /// Record the event that the given frame id is accessed at current timestamp.
    /// Create a new entry for access history if frame id has not been seen before.
    /// A newly tracked frame starts out non-evictable.
    fn record_access(&mut self, frame_id: FrameId) {
        assert!(frame_id < self.replacer_size, "frame id {} out of range", frame_id);
        let node = self.nodes.entry(frame_id).or_insert_with(|| LRUKNode::new(frame_id, self.k));
        node.record_access(self.current_timestamp);
        self.current_timestamp += 1;
    }

    /// Find the frame with the largest backward k-distance and evict that frame.
    /// Only frames that are marked as evictable are candidates for eviction.
    ///
    /// Successful eviction of a frame decrements the size of the replacer and
    /// removes the frame's access history.
    ///
    /// Return the frame id if a frame is evicted successfully, None if no frames
    /// can be evicted.
    fn evict(&mut self) -> Option<FrameId> {
        let mut distances = vec![];
        for node in self.nodes.values() {
            if !node.is_evictable {
                continue;
            }
            distances.push(node.k_distance(self.current_timestamp));
        }
        if distances.is_empty() {
            return None;
        }

        distances.sort();

        // we will always have at least one element here, it is
        // okay to use unwrap.
        let dist = distances.first().unwrap();
        let evicted = self.nodes.remove(&dist.frame_id).unwrap();
        self.current_size -= 1;

        Some(evicted.frame_id)
    }

    /// Toggle whether a frame is evictable or non-evictable. this function also
    /// controls replacer size. Note that size is equal to the number of evictable
    /// entries.
    ///
    /// For a frame that has no recorded history, or whose flag is already at the
    /// requested value, this function terminates without modifying anything.
    fn set_evictable(&mut self, frame_id: FrameId, evictable: bool) {
        assert!(frame_id < self.replacer_size, "frame id {} out of range", frame_id);
        let node = self.nodes.get_mut(&frame_id);
        if node.is_none() {
            return;
        }
        let node = node.unwrap();
        if node.is_evictable == evictable {
            return;
        }

        node.is_evictable = evictable;
        if evictable {
            self.current_size += 1;
        } else {
            self.current_size -= 1;
        }
    }

    /// Check if a frame is evictable. if the frame is not found, return true.
    fn is_evictable(&self, frame_id: FrameId) -> bool {
        let node = self.nodes.get(&frame_id);
        if node.is_none() {
            return true;
        }
        node.unwrap().is_evictable
    }

    /// Remove an evictable frame from the replacer, along with its access history,
    /// and decrement the replacer size.
    ///
    /// Note that this is different from evicting a frame, which always removes the
    /// frame with the largest backward k-distance. This function removes the
    /// specified frame id, no matter what its backward k-distance is.
    ///
    /// Calling remove on a frame with no recorded access, or on a non-evictable
    /// frame, panics.
    fn remove(&mut self, frame_id: FrameId) {
        let node = self.nodes.get(&frame_id);
        assert!(node.is_some(), "cannot remove frame {} with no recorded access", frame_id);
        assert!(node.unwrap().is_evictable, "cannot remove non-evictable frame {}", frame_id);
        self.nodes.remove(&frame_id);
        self.current_size -= 1;
    }

    fn size(&self) -> usize {
        self.current_size
    }
}

/// SyncLRUKReplacer implements the thread-safe version of the LRU-k replacement
/// policy, basically all the heavy lifting happens in the LRUKReplacer.
pub struct SyncLRUKReplacer {
    inner: Mutex<LRUKReplacer>,
}

impl SyncLRUKReplacer {
    pub fn new(k: usize, size: usize) -> Self {
        let inner = Mutex::new(LRUKReplacer::new(k, size));
        SyncLRUKReplacer { inner }
    }
}

impl Replacer for SyncLRUKReplacer {
    fn record_access(&self, frame_id: FrameId) {
        let mut guard = self.inner.lock().unwrap();
        guard.record_access(frame_id)
    }

    fn evict(&self) -> Option<FrameId> {
        let mut guard = self.inner.lock().unwrap();
        guard.evict()
    }

    fn set_evictable(&self, frame_id: FrameId, evictable: bool) {
        let mut guard = self.inner.lock().unwrap();
        guard.set_evictable(frame_id, evictable)
    }

    fn is_evictable(&self, frame_id: FrameId) -> bool {
        let guard = self.inner.lock().unwrap();
        guard.is_evictable(frame_id)
    }

    fn remove(&self, frame_id: FrameId) {
        let mut guard = self.inner.lock().unwrap();
        guard.remove(frame_id)
    }

    fn size(&self) -> usize {
        let guard = self.inner.lock().unwrap();
        guard.size()
    }
}
