/// Recently emitted message identifiers.
///
/// Length never exceeds `capacity`. When an append pushes it past the bound,
/// the window is cut back to the most recent `capacity / 2` identifiers in one
/// step instead of evicting entries one at a time. Lookups are a linear scan,
/// which is fine for the small default capacity.
const MIN_CAPACITY: usize = 2;

#[derive(Debug, Clone)]
pub struct DedupWindow {
    ids: Vec<String>,
    capacity: usize,
}

impl DedupWindow {
    /// Capacities below 2 are raised to 2 so a just-recorded id always
    /// survives eviction.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(MIN_CAPACITY);
        Self {
            ids: Vec::with_capacity(capacity + 1),
            capacity,
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.iter().any(|seen| seen == id)
    }

    pub fn record(&mut self, id: impl Into<String>) {
        self.ids.push(id.into());
        if self.ids.len() > self.capacity {
            let keep = self.capacity / 2;
            let evict = self.ids.len() - keep;
            self.ids.drain(..evict);
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }
}
