//! Per-draw uniform blocks.
//!
//! Blocks live in one growable byte store and are addressed through [`SlotPool`] handles,
//! never by pointer, so growing the store cannot leave a dangling reference. Blocks with
//! identical bytes share a handle, which keeps their draws mergeable.

use crate::pool::{SlotId, SlotPool};

/// Uniform block binding slots a draw carries.
pub const MAX_UNIFORM_SLOTS: usize = 4;

/// The uniform block bound to each slot, `None` for the backend's default.
pub type UniformSlots = [Option<Uniform>; MAX_UNIFORM_SLOTS];

/// Handle to a block in the [`UniformPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Uniform(SlotId);

impl Uniform {
    pub fn slot(self) -> SlotId {
        self.0
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct UniformBlock {
    offset: usize,
    size: usize,
}

#[derive(Debug)]
pub struct UniformPool {
    pool: SlotPool,
    blocks: Vec<UniformBlock>,
    /// Handles in allocation order; blocks are laid out in the same order in `data`.
    used: Vec<SlotId>,
    data: Vec<u8>,
}

impl UniformPool {
    pub fn new(slots: u16, initial_bytes: usize) -> Self {
        let pool = SlotPool::new(slots);
        let blocks = vec![UniformBlock::default(); pool.capacity()];
        Self {
            used: Vec::with_capacity(pool.capacity()),
            pool,
            blocks,
            data: Vec::with_capacity(initial_bytes),
        }
    }

    /// Stores `bytes` and returns a handle to them. Returns the existing handle if an
    /// identical block is already live, and `None` for empty input or when no slot is free.
    pub fn create(&mut self, bytes: &[u8]) -> Option<Uniform> {
        if bytes.is_empty() {
            return None;
        }

        if let Some(existing) = self
            .used
            .iter()
            .rev()
            .copied()
            .find(|id| self.block_bytes(*id) == bytes)
        {
            return Some(Uniform(existing));
        }

        let id = self.pool.alloc()?;

        let offset = self.data.len();
        let required = offset + bytes.len();
        if required > self.data.capacity() {
            let new_capacity = required.max(self.data.capacity() * 2);
            tracing::debug!(
                from = self.data.capacity(),
                to = new_capacity,
                "growing uniform storage"
            );
            self.data.reserve_exact(new_capacity - self.data.len());
        }
        self.data.extend_from_slice(bytes);

        self.blocks[SlotPool::index_of(id)] = UniformBlock {
            offset,
            size: bytes.len(),
        };
        self.used.push(id);

        Some(Uniform(id))
    }

    /// Bytes of a live block, or `None` if the handle went stale.
    pub fn get(&self, uniform: Uniform) -> Option<&[u8]> {
        if !self.pool.is_live(uniform.0) {
            return None;
        }
        Some(self.block_bytes(uniform.0))
    }

    pub fn is_live(&self, uniform: Uniform) -> bool {
        self.pool.is_live(uniform.0)
    }

    /// Number of live blocks. Pass it to [`UniformPool::release_from`] to undo everything
    /// created after this point.
    pub fn mark(&self) -> usize {
        self.used.len()
    }

    pub fn release_from(&mut self, mark: usize) {
        if mark >= self.used.len() {
            return;
        }

        let first = self.blocks[SlotPool::index_of(self.used[mark])];
        for id in self.used.drain(mark..) {
            self.pool.free(id);
        }
        self.data.truncate(first.offset);
    }

    /// Frees every block. Storage capacity is kept.
    pub fn reset(&mut self) {
        self.pool.reset();
        self.used.clear();
        self.data.clear();
    }

    pub fn len(&self) -> usize {
        self.used.len()
    }

    pub fn is_empty(&self) -> bool {
        self.used.is_empty()
    }

    pub fn storage_capacity(&self) -> usize {
        self.data.capacity()
    }

    fn block_bytes(&self, id: SlotId) -> &[u8] {
        let block = self.blocks[SlotPool::index_of(id)];
        &self.data[block.offset..block.offset + block.size]
    }
}
