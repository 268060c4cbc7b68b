use std::collections::BTreeSet;

/// Allocates and recycles unique `u32` ids, lowest free id first.
///
/// Used for material ids inside a shader pipeline and for instance ids inside
/// a material. Ids index slices of shared uniform buffers, so handing back the
/// lowest free id keeps those buffers dense.
///
/// # Example
///
/// ```ignore
/// let mut ids = SlotAllocator::new();
/// let a = ids.alloc();  // 0
/// let b = ids.alloc();  // 1
/// ids.free(a);          // 0 is now available
/// let c = ids.alloc();  // 0 (recycled)
/// ```
#[derive(Debug, Clone)]
pub struct SlotAllocator {
    free_ids: BTreeSet<u32>,
    next_id: u32,
}

impl SlotAllocator {
    /// Create a new empty allocator
    pub fn new() -> Self {
        Self {
            free_ids: BTreeSet::new(),
            next_id: 0,
        }
    }

    /// Allocate the lowest available id
    pub fn alloc(&mut self) -> u32 {
        match self.free_ids.pop_first() {
            Some(id) => id,
            None => {
                let id = self.next_id;
                self.next_id += 1;
                id
            }
        }
    }

    /// Return an id to the pool. Returns false if the id was not allocated.
    pub fn free(&mut self, id: u32) -> bool {
        if !self.contains(id) {
            return false;
        }

        if id + 1 == self.next_id {
            // Freeing the top id lowers the high water mark, along with any
            // free ids directly below it
            self.next_id = id;
            while self.next_id > 0 && self.free_ids.remove(&(self.next_id - 1)) {
                self.next_id -= 1;
            }
        } else {
            self.free_ids.insert(id);
        }
        true
    }

    /// Whether `id` is currently allocated
    pub fn contains(&self, id: u32) -> bool {
        id < self.next_id && !self.free_ids.contains(&id)
    }

    /// Highest allocated id + 1.
    ///
    /// This is the minimum capacity the backing storage must have
    /// to accommodate all allocated ids.
    pub fn high_water_mark(&self) -> u32 {
        self.next_id
    }

    /// Number of currently allocated ids
    pub fn len(&self) -> u32 {
        self.next_id - self.free_ids.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate allocated ids in ascending order
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        (0..self.next_id).filter(move |id| !self.free_ids.contains(id))
    }
}

impl Default for SlotAllocator {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "slot_allocator_tests.rs"]
mod tests;
