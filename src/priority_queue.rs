/// Anything stored in the heap exposes a real-valued key, the heap orders on it.
pub trait HeapKey {
    fn key(&self) -> f64;
}

/// A binary max-heap over a real-valued key.
///
/// Ties between equal keys are resolved by the heap layout at the time of
/// extraction, not by insertion order. Callers must not rely on any
/// particular order among equal keys.
///
/// The heap never deduplicates, and never checks whether an entry is still
/// meaningful, that is up to whoever pops it.
#[derive(Debug, Clone)]
pub struct MaxHeap<T: HeapKey> {
    items: Vec<T>,
}

impl<T: HeapKey> Default for MaxHeap<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: HeapKey> MaxHeap<T> {
    pub fn new() -> MaxHeap<T> {
        // Create an empty heap.
        MaxHeap { items: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> MaxHeap<T> {
        MaxHeap {
            items: Vec::with_capacity(capacity),
        }
    }

    /// Append an item and restore heap order upwards.
    pub fn insert(&mut self, item: T) {
        self.items.push(item);
        self.sift_up(self.items.len() - 1);
    }

    /// Remove and return the item with the maximum key, `None` if empty.
    pub fn extract_max(&mut self) -> Option<T> {
        if self.items.is_empty() {
            return None;
        }
        // Move the last leaf to the root, then push it down.
        let top = self.items.swap_remove(0);
        if !self.items.is_empty() {
            self.sift_down(0);
        }
        Some(top)
    }

    pub fn peek(&self) -> Option<&T> {
        self.items.first()
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn sift_up(&mut self, mut index: usize) {
        while index > 0 {
            let parent = (index - 1) / 2;
            if self.items[index].key() > self.items[parent].key() {
                self.items.swap(index, parent);
                index = parent;
            } else {
                break;
            }
        }
    }

    fn sift_down(&mut self, mut index: usize) {
        let len = self.items.len();
        loop {
            let left = 2 * index + 1;
            let right = left + 1;
            let mut largest = index;
            if left < len && self.items[left].key() > self.items[largest].key() {
                largest = left;
            }
            if right < len && self.items[right].key() > self.items[largest].key() {
                largest = right;
            }
            if largest == index {
                break;
            }
            self.items.swap(index, largest);
            index = largest;
        }
    }
}

impl<T: HeapKey> Extend<T> for MaxHeap<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for item in iter {
            self.insert(item);
        }
    }
}

#[cfg(test)]
mod test_priority_queue {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::{HeapKey, MaxHeap};

    #[derive(Debug, Clone, PartialEq)]
    struct Entry {
        gain: f64,
        tag: u32,
    }

    impl HeapKey for Entry {
        fn key(&self) -> f64 {
            self.gain
        }
    }

    #[test]
    fn test_empty_heap() {
        let mut heap = MaxHeap::<Entry>::new();
        assert!(heap.is_empty());
        assert_eq!(heap.size(), 0);
        assert!(heap.peek().is_none());
        assert!(heap.extract_max().is_none());
    }

    #[test]
    fn test_extract_in_descending_order() {
        let mut heap = MaxHeap::new();
        for (tag, gain) in [0.3, -1.0, 2.5, 0.0, 1.25, 0.7].into_iter().enumerate() {
            heap.insert(Entry { gain, tag: tag as u32 });
        }
        assert_eq!(heap.size(), 6);
        assert_eq!(heap.peek().map(|e| e.tag), Some(2));

        let popped: Vec<f64> = std::iter::from_fn(|| heap.extract_max())
            .map(|e| e.gain)
            .collect();
        assert_eq!(popped, vec![2.5, 1.25, 0.7, 0.3, 0.0, -1.0]);
        assert!(heap.is_empty());
    }

    #[test]
    fn test_duplicates_are_kept() {
        // The heap does not deduplicate.
        let mut heap = MaxHeap::new();
        heap.insert(Entry { gain: 1.0, tag: 7 });
        heap.insert(Entry { gain: 1.0, tag: 7 });
        heap.insert(Entry { gain: 1.0, tag: 8 });
        assert_eq!(heap.len(), 3);
        let mut tags: Vec<u32> = std::iter::from_fn(|| heap.extract_max())
            .map(|e| e.tag)
            .collect();
        tags.sort();
        assert_eq!(tags, vec![7, 7, 8]);
    }

    #[test]
    fn test_interleaved_random_operations() {
        // Compare against a sorted vector under random inserts and pops.
        let mut rng = StdRng::seed_from_u64(17);
        let mut heap = MaxHeap::new();
        let mut reference: Vec<f64> = Vec::new();
        for step in 0..2000u32 {
            if rng.gen_bool(0.6) || reference.is_empty() {
                let gain = rng.gen_range(-10.0..10.0);
                heap.insert(Entry { gain, tag: step });
                reference.push(gain);
            } else {
                reference.sort_by(|a, b| a.partial_cmp(b).unwrap());
                let expected = reference.pop().unwrap();
                let got = heap.extract_max().unwrap();
                assert_eq!(got.gain, expected);
            }
            assert_eq!(heap.size(), reference.len());
        }
    }

    #[test]
    fn test_extend() {
        let mut heap = MaxHeap::with_capacity(4);
        heap.extend((0..4).map(|tag| Entry { gain: tag as f64, tag }));
        assert_eq!(heap.extract_max().map(|e| e.tag), Some(3));
        assert_eq!(heap.size(), 3);
    }
}
