//! Per-Sensor Detection History
//!
//! Fixed-capacity ring over the most recent detections of one sensor.
//! Storage is reserved once at construction; once full, each push
//! overwrites the oldest entry. That eviction is the retention policy,
//! not data loss.

use detection::DetectionResult;

/// Default number of detections retained per sensor.
pub const DEFAULT_CAPACITY: usize = 10;

/// Ring buffer of recent detections, owned by the pipeline, one per sensor.
#[derive(Debug, Clone)]
pub struct DetectionHistory {
    slots: Vec<DetectionResult>,
    capacity: usize,
    /// Index of the next write.
    head: usize,
    total_pushed: u64,
}

impl DetectionHistory {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            capacity,
            head: 0,
            total_pushed: 0,
        }
    }

    /// O(1) insertion; overwrites the oldest entry once full.
    pub fn push(&mut self, detection: DetectionResult) {
        if self.capacity == 0 {
            return;
        }
        if self.slots.len() < self.capacity {
            self.slots.push(detection);
        } else {
            self.slots[self.head] = detection;
        }
        self.head = (self.head + 1) % self.capacity;
        self.total_pushed += 1;
    }

    /// The nth-most-recent entry; `latest(0)` is the newest. `None` when
    /// `n` reaches past the stored count.
    pub fn latest(&self, n: usize) -> Option<&DetectionResult> {
        if n >= self.slots.len() {
            return None;
        }
        let index = (self.head + self.capacity - 1 - n) % self.capacity;
        self.slots.get(index)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Occupancy in `[0, 1]`.
    pub fn fill_ratio(&self) -> f64 {
        if self.capacity == 0 {
            return 0.0;
        }
        self.slots.len() as f64 / self.capacity as f64
    }

    /// Lifetime push count, including overwritten entries.
    pub fn total_pushed(&self) -> u64 {
        self.total_pushed
    }

    /// Drop every entry; storage stays reserved.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.head = 0;
        self.total_pushed = 0;
    }
}

impl Default for DetectionHistory {
    fn default() -> Self {
        Self::new()
    }
}
