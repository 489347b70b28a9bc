use super::*;

impl<B: RenderBackend> Renderer<B> {
    /// Records `drawable` placed with the `transform` model matrix.
    ///
    /// Vertices are transformed to clip space right away. The draw is merged into an
    /// earlier compatible one when that cannot change the result, and dropped with a log
    /// message if an arena is full or its pipeline is invalid.
    #[track_caller]
    pub fn draw(&mut self, drawable: &Drawable, transform: &Mat4) {
        self.require_scope("draw");

        if drawable.is_empty() {
            return;
        }
        self.frame_stats.draws_recorded += 1;

        let state = *self.stack.current();
        if !state.uniforms_available() {
            tracing::debug!("dropping draw, its uniform block could not be stored");
            self.frame_stats.draws_dropped += 1;
            return;
        }

        let pipeline = state
            .pipeline
            .unwrap_or_else(|| self.backend.pipeline_for(drawable.primitive()));
        if !self.backend.is_pipeline_valid(pipeline) {
            tracing::warn!(%pipeline, primitive = ?drawable.primitive(), "dropping draw with an invalid pipeline");
            self.frame_stats.draws_dropped += 1;
            return;
        }
        // An override pipeline decides the topology, whatever the drawable was built for.
        let primitive = self
            .backend
            .pipeline_primitive(pipeline)
            .unwrap_or(drawable.primitive());

        let source = drawable.vertices();
        let vertex_index = self.vertices.cursor();
        let Some(target) = self.vertices.alloc(source.len()) else {
            self.frame_stats.draws_dropped += 1;
            return;
        };

        let mvp = state.mvp(transform);
        let mut region = empty_region();
        for (out, vertex) in target.iter_mut().zip(source) {
            let [x, y, z] = vertex.position;
            let clip = mvp.transform_point3d_homogeneous(Point3D::new(x, y, z));
            *out = Vertex {
                position: [clip.x, clip.y, clip.z],
                ..*vertex
            };
            grow_region(&mut region, clip.x, clip.y);
        }

        let candidate = DrawCommand {
            pipeline,
            primitive,
            textures: *drawable.textures(),
            uniforms: state.uniforms,
            region,
            vertex_index: vertex_index as u32,
            vertex_count: source.len() as u32,
        };

        if !primitive.is_strip() {
            match try_merge(
                &mut self.vertices,
                &mut self.commands,
                state.base_command,
                self.merge_limits,
                &candidate,
            ) {
                Ok(kind) => {
                    self.frame_stats.record_merge(kind);
                    return;
                }
                Err(reason) => {
                    tracing::trace!(%reason, "draw not merged");
                }
            }
        }

        match self.commands.alloc_one() {
            Some(slot) => *slot = RenderCommand::Draw(candidate),
            None => {
                self.vertices.rewind(source.len());
                self.frame_stats.draws_dropped += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::backend::RecordingBackend;
    use crate::drawable::DrawMode;
    use crate::Color;

    use super::*;

    fn renderer(config: RendererConfig) -> Renderer<RecordingBackend> {
        let mut renderer = Renderer::new(RecordingBackend::new(), config).unwrap();
        renderer.begin_frame((100, 100));
        renderer.begin(&View::default());
        renderer
    }

    fn quad(x: f32, y: f32) -> Drawable {
        Drawable::rect(DrawMode::Fill, x, y, 10.0, 10.0, Color::WHITE)
    }

    #[test]
    fn vertices_are_stored_in_clip_space() {
        let mut renderer = renderer(RendererConfig::default());
        renderer.draw(&quad(0.0, 0.0), &Mat4::translation(50.0, 50.0, 0.0));

        let first = renderer.pending_vertices()[0];
        assert!(first.position[0].abs() < 1e-6);
        assert!(first.position[1].abs() < 1e-6);

        let draw = renderer.pending_commands()[0].as_draw().copied().unwrap();
        assert!((draw.region.max.x - 0.2).abs() < 1e-6);
        assert!((draw.region.min.y + 0.2).abs() < 1e-6);
    }

    #[test]
    fn empty_drawables_are_ignored() {
        let mut renderer = renderer(RendererConfig::default());
        renderer.draw(&Drawable::new(PrimitiveType::Triangles), &Mat4::identity());
        assert!(renderer.pending_commands().is_empty());
        assert_eq!(renderer.stats().draws_recorded, 0);
    }

    #[test]
    fn pipeline_override_applies_to_draws() {
        let mut renderer = renderer(RendererConfig::default());
        let lines = renderer.backend().pipeline_for(PrimitiveType::Lines);
        renderer.set_pipeline(Some(lines));
        renderer.draw(&quad(0.0, 0.0), &Mat4::identity());

        let draw = renderer.pending_commands()[0].as_draw().copied().unwrap();
        assert_eq!(draw.pipeline, lines);
    }

    #[test]
    fn invalid_pipeline_drops_the_draw() {
        let mut renderer = renderer(RendererConfig::default());
        renderer.set_pipeline(Some(PipelineId(77)));
        renderer.draw(&quad(0.0, 0.0), &Mat4::identity());

        assert!(renderer.pending_commands().is_empty());
        assert!(renderer.pending_vertices().is_empty());
        assert_eq!(renderer.stats().draws_dropped, 1);
    }

    #[test]
    fn full_command_arena_rewinds_vertices() {
        let mut renderer = renderer(RendererConfig::default().with_max_commands(1));
        let strip = Drawable::with_vertices(
            PrimitiveType::TriangleStrip,
            quad(0.0, 0.0).vertices()[..4].to_vec(),
        );
        renderer.draw(&strip, &Mat4::identity());
        renderer.draw(&strip, &Mat4::identity());

        assert_eq!(renderer.pending_commands().len(), 1);
        assert_eq!(renderer.pending_vertices().len(), 4);
        assert_eq!(renderer.stats().draws_dropped, 1);
    }

    #[test]
    fn full_vertex_arena_drops_the_draw() {
        let mut renderer = renderer(RendererConfig::default().with_max_vertices(8));
        renderer.draw(&quad(0.0, 0.0), &Mat4::identity());
        renderer.draw(&quad(50.0, 50.0), &Mat4::identity());

        assert_eq!(renderer.pending_vertices().len(), 6);
        assert_eq!(renderer.stats().draws_dropped, 1);
    }

    #[test]
    fn equal_uniform_bytes_keep_draws_mergeable() {
        let mut renderer = renderer(RendererConfig::default());
        renderer.set_uniform(0, &[1, 0, 0, 0]);
        renderer.draw(&quad(0.0, 0.0), &Mat4::identity());
        renderer.set_uniform(0, &[1, 0, 0, 0]);
        renderer.draw(&quad(50.0, 50.0), &Mat4::identity());
        renderer.set_uniform(0, &[2, 0, 0, 0]);
        renderer.draw(&quad(80.0, 0.0), &Mat4::identity());

        assert_eq!(renderer.pending_commands().len(), 2);
        assert_eq!(renderer.stats().merged_backward, 1);
    }

    #[test]
    fn draws_take_the_override_pipeline_topology() {
        let mut renderer = renderer(RendererConfig::default());
        let strip = renderer.backend().pipeline_for(PrimitiveType::LineStrip);
        renderer.set_pipeline(Some(strip));
        renderer.draw(&quad(0.0, 0.0), &Mat4::identity());

        let draw = renderer.pending_commands()[0].as_draw().copied().unwrap();
        assert_eq!(draw.primitive, PrimitiveType::LineStrip);
    }

    #[test]
    fn draws_are_dropped_while_a_uniform_is_lost() {
        let mut renderer = renderer(RendererConfig::default().with_uniform_slots(1));
        renderer.set_uniform(0, &[1; 4]);
        renderer.draw(&quad(0.0, 0.0), &Mat4::identity());
        renderer.set_uniform(0, &[2; 4]);
        renderer.draw(&quad(50.0, 50.0), &Mat4::identity());

        assert_eq!(renderer.pending_commands().len(), 1);
        assert_eq!(renderer.pending_vertices().len(), 6);
        assert_eq!(renderer.stats().draws_dropped, 1);
        assert_eq!(renderer.stats().merges(), 0);
    }

    #[test]
    #[should_panic(expected = "draw called outside of a begin()/end() scope")]
    fn draw_outside_scope_is_fatal() {
        let mut renderer = Renderer::new(RecordingBackend::new(), RendererConfig::default()).unwrap();
        renderer.begin_frame((10, 10));
        renderer.draw(&quad(0.0, 0.0), &Mat4::identity());
    }
}
