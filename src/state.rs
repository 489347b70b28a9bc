//! Per-scope render state and the stack that nests it.

use std::mem;

use crate::command::IRect;
use crate::error::RenderError;
use crate::id::{PipelineId, TargetId};
use crate::uniform::{UniformSlots, MAX_UNIFORM_SLOTS};
use crate::view::{screen_projection, Mat4, View};

/// Render state of one `begin()`/`end()` scope.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchState {
    /// Offscreen target the scope draws into. `None` is the frame's own target.
    pub target: Option<TargetId>,
    pub framebuffer_size: (u32, u32),
    pub viewport: IRect,
    /// Relative to the viewport origin. `None` leaves the whole framebuffer unclipped.
    pub scissor: Option<IRect>,
    pub projection: Mat4,
    pub view: View,
    /// Overrides the pipeline a drawable would pick from its primitive type.
    pub pipeline: Option<PipelineId>,
    pub uniforms: UniformSlots,
    /// Slots whose last `set_uniform` could not be stored. Draws are dropped while any is set.
    pub lost_uniforms: [bool; MAX_UNIFORM_SLOTS],
    /// Arena cursors when the scope began. The scope never looks below them.
    pub base_vertex: usize,
    pub base_command: usize,
    pub base_uniform: usize,
}

impl BatchState {
    pub fn new(framebuffer_size: (u32, u32)) -> Self {
        let full = IRect::from_size(framebuffer_size);
        Self {
            target: None,
            framebuffer_size,
            viewport: full,
            scissor: None,
            projection: screen_projection(framebuffer_size.0 as f32, framebuffer_size.1 as f32),
            view: View::default(),
            pipeline: None,
            uniforms: [None; MAX_UNIFORM_SLOTS],
            lost_uniforms: [false; MAX_UNIFORM_SLOTS],
            base_vertex: 0,
            base_command: 0,
            base_uniform: 0,
        }
    }

    /// Model-view-projection for a drawable placed with `model`.
    pub fn mvp(&self, model: &Mat4) -> Mat4 {
        model.then(self.view.matrix()).then(&self.projection)
    }

    /// Scissor in framebuffer coordinates.
    pub fn absolute_scissor(&self) -> IRect {
        match self.scissor {
            Some(scissor) => IRect::new(
                self.viewport.x + scissor.x,
                self.viewport.y + scissor.y,
                scissor.w,
                scissor.h,
            ),
            None => IRect::from_size(self.framebuffer_size),
        }
    }

    /// False while a uniform slot holds data that could not be stored.
    pub fn uniforms_available(&self) -> bool {
        !self.lost_uniforms.contains(&true)
    }

    pub fn covers_framebuffer(&self) -> bool {
        let full = IRect::from_size(self.framebuffer_size);
        self.viewport == full && self.absolute_scissor() == full
    }
}

/// LIFO stack of saved scope states. `current` is the innermost scope.
#[derive(Debug)]
pub struct StateStack {
    saved: Vec<BatchState>,
    current: BatchState,
    max_depth: usize,
}

impl StateStack {
    pub fn new(max_depth: usize, framebuffer_size: (u32, u32)) -> Self {
        Self {
            saved: Vec::with_capacity(max_depth),
            current: BatchState::new(framebuffer_size),
            max_depth,
        }
    }

    pub fn depth(&self) -> usize {
        self.saved.len()
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn current(&self) -> &BatchState {
        &self.current
    }

    pub fn current_mut(&mut self) -> &mut BatchState {
        &mut self.current
    }

    /// Saves the active state and makes `next` current.
    pub fn push(&mut self, next: BatchState) -> Result<(), RenderError> {
        if self.saved.len() >= self.max_depth {
            return Err(RenderError::StackOverflow {
                max_depth: self.max_depth,
            });
        }
        let previous = mem::replace(&mut self.current, next);
        self.saved.push(previous);
        Ok(())
    }

    /// Restores the last saved state and returns the one that was active.
    pub fn pop(&mut self) -> Result<BatchState, RenderError> {
        let restored = self.saved.pop().ok_or(RenderError::StackUnderflow)?;
        Ok(mem::replace(&mut self.current, restored))
    }

    /// Drops every scope and starts over with a framebuffer of `framebuffer_size`.
    pub fn reset(&mut self, framebuffer_size: (u32, u32)) {
        self.saved.clear();
        self.current = BatchState::new(framebuffer_size);
    }
}
