use super::*;

impl<B: RenderBackend> Renderer<B> {
    /// Submits everything the innermost scope recorded so far. The scope stays open and
    /// keeps its viewport and scissor.
    #[track_caller]
    pub fn flush(&mut self) {
        self.require_scope("flush");
        self.flush_scope();

        // The next pass starts unclipped on the whole framebuffer.
        let state = *self.stack.current();
        if state.viewport != IRect::from_size(state.framebuffer_size) {
            self.record_control(RenderCommand::Viewport(state.viewport));
        }
        if state.scissor.is_some() {
            self.record_control(RenderCommand::Scissor(state.absolute_scissor()));
        }
    }

    /// Replays the innermost scope's commands against the backend in one pass and rewinds
    /// both arenas to the scope's base.
    pub(super) fn flush_scope(&mut self) {
        let state = *self.stack.current();
        let end_vertex = self.vertices.cursor();
        let end_command = self.commands.cursor();

        self.vertices.rewind_to(state.base_vertex);
        self.commands.rewind_to(state.base_command);

        if end_command <= state.base_command {
            return;
        }

        #[cfg(feature = "render_metrics")]
        let started_at = Instant::now();

        let vertices = self.vertices.slice(state.base_vertex..end_vertex);
        let vertex_buffer_offset = match self.backend.append_vertices(vertices) {
            Ok(offset) => offset,
            Err(err) => {
                tracing::error!(error = %err, vertices = vertices.len(), "flush aborted");
                self.frame_stats.failed_uploads += 1;
                return;
            }
        };

        let mut stats = FlushStats {
            commands: (end_command - state.base_command) as u32,
            vertices_uploaded: vertices.len() as u32,
            ..FlushStats::default()
        };

        let base_vertex = state.base_vertex as u32;
        let mut current_pipeline = PipelineId::INVALID;
        let mut current_textures = [TextureBinding::NONE; MAX_TEXTURE_SLOTS];
        let mut current_uniforms: UniformSlots = [None; MAX_UNIFORM_SLOTS];

        self.backend.begin_pass(state.target, state.framebuffer_size);

        for command in self.commands.slice(state.base_command..end_command) {
            let draw = match command {
                RenderCommand::None => {
                    stats.skipped += 1;
                    continue;
                }
                RenderCommand::Viewport(viewport) => {
                    self.backend.apply_viewport(*viewport);
                    continue;
                }
                RenderCommand::Scissor(scissor) => {
                    self.backend.apply_scissor(*scissor);
                    continue;
                }
                RenderCommand::Draw(draw) => draw,
            };

            if draw.vertex_count == 0 {
                stats.skipped += 1;
                continue;
            }

            let mut apply_bindings = false;
            if draw.pipeline != current_pipeline {
                self.backend.apply_pipeline(draw.pipeline);
                current_pipeline = draw.pipeline;
                stats.pipeline_switches += 1;
                apply_bindings = true;
            }
            if draw.textures != current_textures {
                current_textures = draw.textures;
                apply_bindings = true;
            }

            if apply_bindings {
                self.backend.apply_bindings(&Bindings {
                    vertex_buffer_offset,
                    textures: draw.textures,
                });
                stats.bindings_applied += 1;
            }

            for (slot, (uniform, current)) in
                draw.uniforms.iter().zip(current_uniforms.iter_mut()).enumerate()
            {
                let changed = *uniform != *current;
                *current = *uniform;
                if !apply_bindings && !changed {
                    continue;
                }
                match uniform {
                    Some(uniform) => match self.uniforms.get(*uniform) {
                        Some(data) => {
                            self.backend.apply_uniforms(slot, data);
                            stats.uniforms_applied += 1;
                        }
                        None => {
                            tracing::warn!(slot, block = %uniform.slot(), "skipping stale uniform block");
                        }
                    },
                    // Back to the backend's default block.
                    None if changed => self.backend.apply_uniforms(slot, &[]),
                    None => {}
                }
            }

            self.backend
                .draw(draw.vertex_index - base_vertex, draw.vertex_count, 1);
            stats.draw_calls += 1;
        }

        self.backend.end_pass();

        #[cfg(feature = "render_metrics")]
        {
            stats.duration = started_at.elapsed();
        }

        tracing::trace!(
            commands = stats.commands,
            draw_calls = stats.draw_calls,
            pipeline_switches = stats.pipeline_switches,
            "flushed scope"
        );
        self.frame_stats.accumulate(&stats);
        self.last_flush = stats;
    }
}
