/// Fixed-capacity buffer of pending rows for one table.
#[derive(Debug, Clone)]
pub struct Batch<T> {
    capacity: usize,
    items: Vec<T>,
}

impl<T> Batch<T> {
    /// Creates an empty batch. A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            items: Vec::with_capacity(capacity),
        }
    }

    pub fn append(&mut self, item: T) {
        self.items.push(item);
    }

    /// True once the batch holds at least `capacity` items.
    pub fn should_flush(&self) -> bool {
        self.items.len() >= self.capacity
    }

    /// Takes every pending item, leaving the batch empty.
    pub fn drain(&mut self) -> Vec<T> {
        std::mem::replace(&mut self.items, Vec::with_capacity(self.capacity))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flushes_at_capacity() {
        let mut batch = Batch::new(3);
        batch.append(1);
        batch.append(2);
        assert!(!batch.should_flush());
        batch.append(3);
        assert!(batch.should_flush());

        assert_eq!(batch.drain(), vec![1, 2, 3]);
        assert!(batch.is_empty());
        assert!(!batch.should_flush());
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let mut batch = Batch::new(0);
        assert_eq!(batch.capacity(), 1);
        batch.append("row");
        assert!(batch.should_flush());
    }

    #[test]
    fn test_drain_empty() {
        let mut batch: Batch<u8> = Batch::new(10);
        assert!(batch.drain().is_empty());
    }
}
