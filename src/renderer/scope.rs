use std::mem;

use super::*;

impl<B: RenderBackend> Renderer<B> {
    /// Starts a frame targeting a framebuffer of `framebuffer_size` pixels.
    #[track_caller]
    pub fn begin_frame(&mut self, framebuffer_size: (u32, u32)) {
        if self.stack.depth() > 0 {
            fatal(RenderError::UnbalancedFrame {
                open: self.stack.depth(),
            });
        }
        if self.in_frame {
            tracing::warn!("begin_frame() called twice without end_frame()");
        }

        self.framebuffer_size = framebuffer_size;
        self.stack.reset(framebuffer_size);
        self.vertices.rewind_to(0);
        self.commands.rewind_to(0);
        self.uniforms.reset();
        self.frame_stats = FrameStats::default();
        self.in_frame = true;
    }

    /// Ends the frame and lets the backend submit its work. Every scope must be closed.
    #[track_caller]
    pub fn end_frame(&mut self) {
        if self.stack.depth() > 0 {
            fatal(RenderError::UnbalancedFrame {
                open: self.stack.depth(),
            });
        }

        self.backend.commit();
        self.uniforms.reset();
        self.in_frame = false;
        self.last_frame_stats = mem::take(&mut self.frame_stats);

        tracing::trace!(
            draw_calls = self.last_frame_stats.draw_calls,
            merges = self.last_frame_stats.merges(),
            dropped = self.last_frame_stats.draws_dropped,
            "frame finished"
        );
    }

    /// Opens a scope drawing through `view` onto the whole framebuffer.
    ///
    /// Viewport and scissor cover the framebuffer, the projection is reset and pipeline and
    /// uniform overrides are cleared. The previous state comes back at [`Renderer::end`].
    #[track_caller]
    pub fn begin(&mut self, view: &View) {
        self.begin_scope(view, None, self.framebuffer_size);
    }

    /// Like [`Renderer::begin`], but the scope draws into the offscreen `target` and its
    /// framebuffer is the target's size. An unknown target is fatal.
    #[track_caller]
    pub fn begin_target(&mut self, view: &View, target: TargetId) {
        let Some(size) = self.backend.target_size(target) else {
            fatal(RenderError::UnknownTarget(target));
        };
        self.begin_scope(view, Some(target), size);
    }

    #[track_caller]
    fn begin_scope(&mut self, view: &View, target: Option<TargetId>, framebuffer_size: (u32, u32)) {
        if !self.in_frame {
            tracing::warn!("begin() called outside of begin_frame()/end_frame()");
        }

        let mut state = BatchState::new(framebuffer_size);
        state.target = target;
        state.view = *view;
        state.base_vertex = self.vertices.cursor();
        state.base_command = self.commands.cursor();
        state.base_uniform = self.uniforms.mark();

        if let Err(err) = self.stack.push(state) {
            fatal(err);
        }
    }

    /// Flushes the innermost scope and restores the state saved by its `begin()`.
    #[track_caller]
    pub fn end(&mut self) {
        if self.stack.depth() == 0 {
            fatal(RenderError::StackUnderflow);
        }

        self.flush_scope();
        match self.stack.pop() {
            Ok(ended) => self.uniforms.release_from(ended.base_uniform),
            Err(err) => fatal(err),
        }
    }

    /// Sets the viewport in framebuffer pixels and resets the projection to match it.
    ///
    /// A clipping scissor keeps its position relative to the viewport.
    #[track_caller]
    pub fn apply_viewport(&mut self, x: i32, y: i32, width: i32, height: i32) {
        self.require_scope("apply_viewport");

        let viewport = IRect::new(x, y, width, height);
        let state = *self.stack.current();
        if state.viewport == viewport {
            return;
        }
        if !self.record_control(RenderCommand::Viewport(viewport)) {
            return;
        }

        let current = self.stack.current_mut();
        current.viewport = viewport;
        current.projection = screen_projection(width as f32, height as f32);

        let scissor = current.absolute_scissor();
        if state.scissor.is_some() && scissor != state.absolute_scissor() {
            self.record_control(RenderCommand::Scissor(scissor));
        }
    }

    /// Clips to a rectangle relative to the viewport origin.
    ///
    /// A negative width or height, either one alone, removes clipping and the recorded
    /// scissor covers the whole framebuffer again. A zero size is a valid scissor that
    /// clips everything.
    #[track_caller]
    pub fn apply_scissor(&mut self, x: i32, y: i32, width: i32, height: i32) {
        self.require_scope("apply_scissor");

        let scissor = if width < 0 || height < 0 {
            None
        } else {
            Some(IRect::new(x, y, width, height))
        };

        let mut next = *self.stack.current();
        if next.scissor == scissor {
            return;
        }
        next.scissor = scissor;

        if self.record_control(RenderCommand::Scissor(next.absolute_scissor())) {
            self.stack.current_mut().scissor = scissor;
        }
    }

    #[track_caller]
    pub fn set_projection(&mut self, projection: Mat4) {
        self.require_scope("set_projection");
        self.stack.current_mut().projection = projection;
    }

    #[track_caller]
    pub fn apply_view(&mut self, view: &View) {
        self.require_scope("apply_view");
        self.stack.current_mut().view = *view;
    }

    /// Draws with `pipeline` instead of the backend's per-primitive default. `None` goes
    /// back to the default. Either way every uniform slot is cleared.
    #[track_caller]
    pub fn set_pipeline(&mut self, pipeline: Option<PipelineId>) {
        self.require_scope("set_pipeline");
        let current = self.stack.current_mut();
        current.pipeline = pipeline;
        current.uniforms = [None; MAX_UNIFORM_SLOTS];
        current.lost_uniforms = [false; MAX_UNIFORM_SLOTS];
    }

    /// Stores a uniform block bound to `slot` for the draws that follow. Empty `data`
    /// clears the slot.
    ///
    /// If the block cannot be stored, draws are dropped until the slot is set again or the
    /// pipeline changes, rather than drawn with whatever the slot held before.
    #[track_caller]
    pub fn set_uniform(&mut self, slot: usize, data: &[u8]) {
        self.require_scope("set_uniform");
        if slot >= MAX_UNIFORM_SLOTS {
            fatal(RenderError::InvalidUniformSlot {
                slot,
                max: MAX_UNIFORM_SLOTS,
            });
        }

        let uniform = if data.is_empty() {
            None
        } else {
            self.uniforms.create(data)
        };
        let lost = uniform.is_none() && !data.is_empty();
        if lost {
            tracing::warn!(
                slot,
                bytes = data.len(),
                "no uniform slot left, dropping draws until the slot is set again"
            );
        }

        let current = self.stack.current_mut();
        current.uniforms[slot] = uniform;
        current.lost_uniforms[slot] = lost;
    }

    /// Appends a viewport or scissor command, or overwrites the previous command of the
    /// scope if it has the same kind. Returns `false` if the command arena is full.
    pub(super) fn record_control(&mut self, command: RenderCommand) -> bool {
        let base_command = self.stack.current().base_command;
        if let Some(previous) = self.commands.peek_mut(1, base_command) {
            if mem::discriminant(previous) == mem::discriminant(&command) {
                *previous = command;
                return true;
            }
        }

        match self.commands.alloc_one() {
            Some(slot) => {
                *slot = command;
                true
            }
            None => {
                self.frame_stats.controls_dropped += 1;
                false
            }
        }
    }
}
