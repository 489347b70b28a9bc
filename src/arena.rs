//! Fixed-capacity linear allocators for vertices and render commands.
//!
//! An arena is allocated once and reused every frame: allocation bumps a cursor, flushing
//! rewinds it. Nothing is freed individually.

use std::ops::{Index, IndexMut, Range};

use crate::command::RenderCommand;
use crate::vertex::Vertex;

pub type VertexArena = Arena<Vertex>;
pub type CommandArena = Arena<RenderCommand>;

#[derive(Debug, Clone)]
pub struct Arena<T> {
    label: &'static str,
    items: Box<[T]>,
    cursor: usize,
}

impl<T: Copy + Default> Arena<T> {
    pub fn new(label: &'static str, capacity: usize) -> Self {
        Self {
            label,
            items: vec![T::default(); capacity].into_boxed_slice(),
            cursor: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.items.len()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn remaining(&self) -> usize {
        self.items.len() - self.cursor
    }

    pub fn is_empty(&self) -> bool {
        self.cursor == 0
    }

    /// Reserves `count` items at the cursor. On overflow nothing is reserved.
    pub fn alloc(&mut self, count: usize) -> Option<&mut [T]> {
        if count > self.remaining() {
            tracing::error!(
                arena = self.label,
                requested = count,
                cursor = self.cursor,
                capacity = self.capacity(),
                "arena overflow"
            );
            return None;
        }

        let start = self.cursor;
        self.cursor += count;
        Some(&mut self.items[start..self.cursor])
    }

    pub fn alloc_one(&mut self) -> Option<&mut T> {
        self.alloc(1).map(|items| &mut items[0])
    }

    /// Index of the item `depth` slots behind the cursor (`depth == 1` is the last one),
    /// or `None` if that would fall below `floor`.
    pub fn peek_index(&self, depth: usize, floor: usize) -> Option<usize> {
        if depth == 0 || self.cursor < floor.saturating_add(depth) {
            return None;
        }
        Some(self.cursor - depth)
    }

    pub fn peek(&self, depth: usize, floor: usize) -> Option<&T> {
        let index = self.peek_index(depth, floor)?;
        Some(&self.items[index])
    }

    pub fn peek_mut(&mut self, depth: usize, floor: usize) -> Option<&mut T> {
        let index = self.peek_index(depth, floor)?;
        Some(&mut self.items[index])
    }

    pub fn rewind(&mut self, count: usize) {
        debug_assert!(count <= self.cursor, "{} rewound past its start", self.label);
        self.cursor = self.cursor.saturating_sub(count);
    }

    pub fn rewind_to(&mut self, position: usize) {
        debug_assert!(
            position <= self.cursor,
            "{} rewound forward to {position}",
            self.label
        );
        self.cursor = position.min(self.cursor);
    }

    /// Everything allocated so far.
    pub fn live(&self) -> &[T] {
        &self.items[..self.cursor]
    }

    pub(crate) fn live_mut(&mut self) -> &mut [T] {
        &mut self.items[..self.cursor]
    }

    pub fn slice(&self, range: Range<usize>) -> &[T] {
        &self.items[range]
    }
}

impl<T> Index<usize> for Arena<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        debug_assert!(index < self.cursor);
        &self.items[index]
    }
}

impl<T> IndexMut<usize> for Arena<T> {
    fn index_mut(&mut self, index: usize) -> &mut T {
        debug_assert!(index < self.cursor);
        &mut self.items[index]
    }
}
