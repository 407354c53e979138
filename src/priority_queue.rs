//! An indexed min-heap priority queue.
//!
//! The queue holds a set of `usize` indices, ordered by an external key
//! array it does not own: every operation that needs to compare keys takes
//! `values: &[f64]` explicitly, so the same `&[f64]` can live as a sibling
//! field elsewhere (in this crate, on [`crate::merge_engine`]'s scratch
//! state) without the queue needing to borrow it persistently.
//!
//! Alongside the heap array this also maintains `locs`, the inverse map from
//! index to heap position, which is what makes `update` and `delete`
//! logarithmic instead of linear.

/// An indexed min-heap over `usize` indices, keyed by an external `&[f64]`
/// value array supplied to each operation.
#[derive(Debug, Default)]
pub struct IndexedPriorityQueue {
    /// `heap[j]` is the index stored at heap position `j`.
    heap: Vec<usize>,
    /// `locs[i] == Some(j)` iff index `i` is currently at heap position `j`.
    locs: Vec<Option<usize>>,
}

impl IndexedPriorityQueue {
    /// An empty queue with no indices tracked yet.
    pub fn new() -> Self {
        IndexedPriorityQueue {
            heap: Vec::new(),
            locs: Vec::new(),
        }
    }

    /// Heapify the identity permutation `[0, values.len())`, using `values`
    /// as keys.
    pub fn set_up(values: &[f64]) -> Self {
        let n = values.len();
        let heap: Vec<usize> = (0..n).collect();
        Self::set_up_heap(heap, values, n)
    }

    /// Adopt a pre-filled `heap` of indices (taking ownership of it) and
    /// heapify it in place. `max_size` bounds the index values that may ever
    /// appear in `heap` via later `add` calls.
    pub fn set_up_heap(heap: Vec<usize>, values: &[f64], max_size: usize) -> Self {
        let mut locs = vec![None; max_size];
        for (j, &i) in heap.iter().enumerate() {
            locs[i] = Some(j);
        }
        let mut pq = IndexedPriorityQueue { heap, locs };
        let n = pq.heap.len();
        for j in (0..n / 2).rev() {
            pq.sift_down(j, values);
        }
        pq
    }

    /// Number of indices currently in the queue.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// The index with the smallest key, without removing it.
    pub fn peek_min(&self) -> Option<usize> {
        self.heap.first().copied()
    }

    /// Remove and return the index with the smallest key.
    pub fn get_min(&mut self, values: &[f64]) -> Option<usize> {
        if self.heap.is_empty() {
            return None;
        }
        let i = self.heap[0];
        self.locs[i] = None;
        let last = self.heap.len() - 1;
        if last > 0 {
            self.heap[0] = self.heap[last];
            self.heap.pop();
            self.sift_down(0, values);
        } else {
            self.heap.pop();
        }
        Some(i)
    }

    /// Insert index `i` into the queue. `i` must not already be present, and
    /// `values[i]` must be the current key for `i`.
    pub fn add(&mut self, i: usize, values: &[f64]) {
        debug_assert!(
            self.locs[i].is_none(),
            "index {} is already in the priority queue",
            i
        );
        let j = self.heap.len();
        self.heap.push(i);
        self.locs[i] = Some(j);
        self.sift_up(j, values);
    }

    /// Restore the heap property after `values[i]` has changed. No-op if `i`
    /// is not currently in the queue.
    pub fn update(&mut self, i: usize, values: &[f64]) {
        if let Some(j) = self.locs[i] {
            // Key direction is unknown: it may have gotten smaller (needs to
            // swim up) or larger (needs to sink down). Running both is safe
            // since each is a no-op if the heap property already holds in
            // that direction.
            let j = self.sift_down(j, values);
            self.sift_up(j, values);
        }
    }

    /// Remove index `i` from the queue, if present. No-op otherwise.
    pub fn delete(&mut self, i: usize, values: &[f64]) {
        if let Some(j) = self.locs[i] {
            self.locs[i] = None;
            let last = self.heap.len() - 1;
            if j < last {
                self.heap[j] = self.heap[last];
                self.heap.pop();
                let j = self.sift_down(j, values);
                self.sift_up(j, values);
            } else {
                self.heap.pop();
            }
        }
    }

    /// Move the entry at heap position `j` upward until its parent's key is
    /// no bigger. Returns the entry's final position.
    fn sift_up(&mut self, mut j: usize, values: &[f64]) -> usize {
        let i = self.heap[j];
        let val = values[i];
        while j > 0 {
            let parent = (j - 1) / 2;
            if values[self.heap[parent]] <= val {
                break;
            }
            self.heap[j] = self.heap[parent];
            self.locs[self.heap[j]] = Some(j);
            j = parent;
        }
        self.heap[j] = i;
        self.locs[i] = Some(j);
        j
    }

    /// Move the entry at heap position `j` downward until its children's
    /// keys are no smaller. Returns the entry's final position.
    ///
    /// Compares the incoming value against the smaller child once per level;
    /// this is the bottleneck of the whole merge loop, so it avoids any
    /// redundant swap or comparison.
    fn sift_down(&mut self, mut j: usize, values: &[f64]) -> usize {
        let i = self.heap[j];
        let val = values[i];
        let size = self.heap.len();
        loop {
            let right = 2 * j + 2;
            if right < size {
                let left = right - 1;
                let val_left = values[self.heap[left]];
                let val_right = values[self.heap[right]];
                let (smaller_child, smaller_val) = if val_left < val_right {
                    (left, val_left)
                } else {
                    (right, val_right)
                };
                if val <= smaller_val {
                    break;
                }
                self.heap[j] = self.heap[smaller_child];
                self.locs[self.heap[j]] = Some(j);
                j = smaller_child;
            } else if right == size {
                let left = right - 1;
                if val <= values[self.heap[left]] {
                    break;
                }
                self.heap[j] = self.heap[left];
                self.locs[self.heap[j]] = Some(j);
                j = left;
                break; // left is a leaf; nothing further to sink into.
            } else {
                break; // no children at all.
            }
        }
        self.heap[j] = i;
        self.locs[i] = Some(j);
        j
    }
}
