//! Generational slot allocator.
//!
//! Hands out [`SlotId`]s that pack a 16-bit slot index with a 16-bit generation counter.
//! Reusing an index bumps its generation, so an old handle can be told apart from the
//! current one by comparing it against the pool's table with [`SlotPool::is_live`].

use std::fmt;

const SLOT_INDEX_BITS: u32 = 16;
const SLOT_INDEX_MASK: u32 = (1 << SLOT_INDEX_BITS) - 1;
const DEFAULT_SLOT_COUNT: u16 = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SlotId(u32);

impl SlotId {
    /// Index 0 is never allocated, so the all-zero handle is always invalid.
    pub const INVALID: Self = Self(0);

    #[inline]
    fn pack(generation: u16, index: u16) -> Self {
        Self(((generation as u32) << SLOT_INDEX_BITS) | (index as u32 & SLOT_INDEX_MASK))
    }

    #[inline]
    pub fn index(self) -> u16 {
        (self.0 & SLOT_INDEX_MASK) as u16
    }

    #[inline]
    pub fn generation(self) -> u16 {
        (self.0 >> SLOT_INDEX_BITS) as u16
    }

    #[inline]
    pub fn is_valid(self) -> bool {
        self.index() != 0
    }

    pub fn to_bits(self) -> u32 {
        self.0
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index(), self.generation())
    }
}

#[derive(Debug, Clone)]
pub struct SlotPool {
    /// Currently issued handle per index, `SlotId::INVALID` when free.
    slots: Vec<SlotId>,
    generations: Vec<u16>,
    free_queue: Vec<u16>,
}

impl SlotPool {
    /// Creates a pool able to hold `size` live handles. A size of zero picks the default.
    pub fn new(size: u16) -> Self {
        let size = if size == 0 { DEFAULT_SLOT_COUNT } else { size };
        let capacity = size as usize + 1;

        let mut pool = Self {
            slots: vec![SlotId::INVALID; capacity],
            generations: vec![0; capacity],
            free_queue: Vec::with_capacity(size as usize),
        };
        pool.reset();
        pool
    }

    /// Table size, including the reserved index 0.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of handles that can still be allocated.
    pub fn available(&self) -> usize {
        self.free_queue.len()
    }

    /// Frees every slot. Generations survive, so stale handles stay distinguishable.
    pub fn reset(&mut self) {
        self.free_queue.clear();
        // Highest index first so allocation pops 1, 2, 3...
        for index in (1..self.slots.len()).rev() {
            self.free_queue.push(index as u16);
            self.slots[index] = SlotId::INVALID;
        }
    }

    pub fn alloc(&mut self) -> Option<SlotId> {
        let Some(index) = self.free_queue.pop() else {
            tracing::warn!(capacity = self.capacity() - 1, "slot pool exhausted");
            return None;
        };
        debug_assert!(index > 0 && (index as usize) < self.slots.len());

        let slot = index as usize;
        self.generations[slot] = self.generations[slot].wrapping_add(1);
        let id = SlotId::pack(self.generations[slot], index);
        self.slots[slot] = id;

        Some(id)
    }

    pub fn free(&mut self, id: SlotId) {
        if !id.is_valid() {
            return;
        }
        let index = id.index();

        debug_assert!(
            !self.free_queue.contains(&index),
            "slot {index} freed twice"
        );

        if !self.is_live(id) {
            tracing::warn!(slot = %id, "ignoring free of a stale slot handle");
            return;
        }

        self.slots[index as usize] = SlotId::INVALID;
        self.free_queue.push(index);
    }

    /// Masks the generation out of `id`. Only meaningful after [`SlotPool::is_live`] passed.
    #[inline]
    pub fn index_of(id: SlotId) -> usize {
        id.index() as usize
    }

    #[inline]
    pub fn generation_of(id: SlotId) -> u16 {
        id.generation()
    }

    /// True if `id` is exactly the handle currently issued for its index.
    pub fn is_live(&self, id: SlotId) -> bool {
        id.is_valid()
            && self
                .slots
                .get(id.index() as usize)
                .is_some_and(|current| *current == id)
    }
}

impl Default for SlotPool {
    fn default() -> Self {
        Self::new(DEFAULT_SLOT_COUNT)
    }
}
