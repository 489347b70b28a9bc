use super::*;

impl<B: RenderBackend> Renderer<B> {
    /// Allocates the arenas and checks that `backend` can draw every primitive type.
    pub fn new(backend: B, config: RendererConfig) -> Result<Self, RenderError> {
        config.validate()?;

        for primitive in PrimitiveType::ALL {
            let pipeline = backend.pipeline_for(primitive);
            if !backend.is_pipeline_valid(pipeline) {
                return Err(RenderError::PipelineUnavailable {
                    primitive,
                    pipeline,
                });
            }
        }

        tracing::debug!(
            max_vertices = config.max_vertices,
            max_commands = config.max_commands,
            max_stack_depth = config.max_stack_depth,
            "creating renderer"
        );

        Ok(Self {
            backend,
            merge_limits: config.merge_limits(),
            vertices: VertexArena::new("vertices", config.max_vertices),
            commands: CommandArena::new("commands", config.max_commands),
            stack: StateStack::new(config.max_stack_depth, (0, 0)),
            uniforms: UniformPool::new(config.uniform_slots, config.uniform_buffer_size),
            config,
            framebuffer_size: (0, 0),
            in_frame: false,
            frame_stats: FrameStats::default(),
            last_frame_stats: FrameStats::default(),
            last_flush: FlushStats::default(),
        })
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }
}

#[cfg(test)]
mod tests {
    use crate::backend::RecordingBackend;

    use super::*;

    #[test]
    fn invalid_config_is_rejected() {
        let result = Renderer::new(
            RecordingBackend::new(),
            RendererConfig::default().with_max_commands(0),
        );
        assert!(matches!(result, Err(RenderError::InvalidConfig(_))));
    }

    #[test]
    fn backend_without_a_pipeline_is_rejected() {
        let mut backend = RecordingBackend::new();
        let pipeline = backend.pipeline_for(PrimitiveType::TriangleStrip);
        backend.invalidate_pipeline(pipeline);

        let result = Renderer::new(backend, RendererConfig::default());
        assert_eq!(
            result.err(),
            Some(RenderError::PipelineUnavailable {
                primitive: PrimitiveType::TriangleStrip,
                pipeline,
            })
        );
    }

    #[test]
    fn arenas_follow_config() {
        let renderer = Renderer::new(
            RecordingBackend::new(),
            RendererConfig::default()
                .with_max_vertices(32)
                .with_max_commands(4),
        )
        .unwrap();
        assert_eq!(renderer.vertices.capacity(), 32);
        assert_eq!(renderer.commands.capacity(), 4);
        assert_eq!(renderer.depth(), 0);
    }
}
