//! Max segment tree over disk free space.
//!
//! Answers "leftmost disk with at least `need` bytes free" in O(log D), which
//! is exactly the disk a linear first-fit scan would pick.

/// Free-space index keyed by disk position (creation order).
#[derive(Debug, Clone)]
pub(crate) struct FreeSpaceIndex {
    /// Leaf count, a power of two.
    leaves: usize,
    len: usize,
    /// 1-based heap layout; leaves live at `leaves..2 * leaves`.
    tree: Vec<u64>,
}

impl FreeSpaceIndex {
    pub(crate) fn with_free_space(free: impl IntoIterator<Item = u64>) -> Self {
        let free: Vec<u64> = free.into_iter().collect();
        let mut index = Self {
            leaves: 0,
            len: 0,
            tree: Vec::new(),
        };
        index.rebuild(free.len().max(1).next_power_of_two(), &free);
        index
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Append a disk at the end of the creation order.
    pub(crate) fn push(&mut self, free: u64) {
        if self.len == self.leaves {
            let current: Vec<u64> = self.tree[self.leaves..self.leaves + self.len].to_vec();
            self.rebuild(self.leaves * 2, &current);
        }
        self.len += 1;
        self.set(self.len - 1, free);
    }

    /// Record a new free-space value for the disk at `position`.
    pub(crate) fn set(&mut self, position: usize, free: u64) {
        debug_assert!(position < self.len);
        let mut node = self.leaves + position;
        self.tree[node] = free;
        while node > 1 {
            node /= 2;
            self.tree[node] = self.tree[2 * node].max(self.tree[2 * node + 1]);
        }
    }

    /// Position of the first disk with `free >= need`.
    pub(crate) fn first_fit(&self, need: u64) -> Option<usize> {
        if self.len == 0 || self.tree[1] < need {
            return None;
        }
        let mut node = 1;
        while node < self.leaves {
            let left = 2 * node;
            node = if self.tree[left] >= need { left } else { left + 1 };
        }
        Some(node - self.leaves)
    }

    fn rebuild(&mut self, leaves: usize, free: &[u64]) {
        self.leaves = leaves;
        self.len = free.len();
        self.tree = vec![0; 2 * leaves];
        self.tree[leaves..leaves + free.len()].copy_from_slice(free);
        for node in (1..leaves).rev() {
            self.tree[node] = self.tree[2 * node].max(self.tree[2 * node + 1]);
        }
    }
}
