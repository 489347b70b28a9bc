//! The batching renderer.
//!
//! A [`Renderer`] owns the vertex and command arenas, the scope stack and the uniform pool,
//! and talks to the GPU only through its [`RenderBackend`]. Draws are recorded into the
//! arenas, merged where possible and replayed against the backend when their scope ends.
//!
//! ```
//! use batch2d::{Color, DrawMode, Drawable, Mat4, RecordingBackend, Renderer, RendererConfig, View};
//!
//! let mut renderer = Renderer::new(RecordingBackend::new(), RendererConfig::default()).unwrap();
//!
//! renderer.begin_frame((800, 600));
//! renderer.begin(&View::default());
//! for i in 0..3 {
//!     let offset = i as f32 * 20.0;
//!     let quad = Drawable::rect(DrawMode::Fill, offset, offset, 10.0, 10.0, Color::WHITE);
//!     renderer.draw(&quad, &Mat4::identity());
//! }
//! renderer.end();
//! renderer.end_frame();
//!
//! // All three quads went out in one draw call.
//! assert_eq!(renderer.backend().draw_calls(), vec![(0, 18)]);
//! ```

#[cfg(feature = "render_metrics")]
use std::time::Instant;

use lyon::geom::euclid::default::Point3D;

use crate::arena::{CommandArena, VertexArena};
use crate::backend::{Bindings, RenderBackend};
use crate::command::{empty_region, grow_region, DrawCommand, IRect, RenderCommand};
use crate::config::RendererConfig;
use crate::drawable::Drawable;
use crate::error::{fatal, RenderError};
use crate::id::{PipelineId, PrimitiveType, TargetId, TextureBinding, MAX_TEXTURE_SLOTS};
use crate::merge::{try_merge, MergeKind, MergeLimits};
use crate::state::{BatchState, StateStack};
use crate::uniform::{UniformPool, UniformSlots, MAX_UNIFORM_SLOTS};
use crate::vertex::Vertex;
use crate::view::{screen_projection, Mat4, View};

mod construction;
mod draw_queue;
mod flush;
mod metrics;
mod scope;

pub use metrics::{FlushStats, FrameStats};

pub struct Renderer<B: RenderBackend> {
    backend: B,
    config: RendererConfig,
    merge_limits: MergeLimits,

    vertices: VertexArena,
    commands: CommandArena,
    stack: StateStack,
    uniforms: UniformPool,

    framebuffer_size: (u32, u32),
    in_frame: bool,

    frame_stats: FrameStats,
    last_frame_stats: FrameStats,
    last_flush: FlushStats,
}

impl<B: RenderBackend> std::fmt::Debug for Renderer<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("framebuffer_size", &self.framebuffer_size)
            .field("depth", &self.stack.depth())
            .field("vertices", &self.vertices.cursor())
            .field("commands", &self.commands.cursor())
            .field("uniforms", &self.uniforms.len())
            .finish_non_exhaustive()
    }
}

impl<B: RenderBackend> Renderer<B> {
    /// Number of open `begin()` scopes.
    pub fn depth(&self) -> usize {
        self.stack.depth()
    }

    /// State of the innermost scope.
    pub fn current(&self) -> &BatchState {
        self.stack.current()
    }

    pub fn framebuffer_size(&self) -> (u32, u32) {
        self.framebuffer_size
    }

    /// Commands recorded and not yet flushed, including tombstones.
    pub fn pending_commands(&self) -> &[RenderCommand] {
        self.commands.live()
    }

    /// Vertices recorded and not yet flushed, in clip space.
    pub fn pending_vertices(&self) -> &[Vertex] {
        self.vertices.live()
    }

    #[track_caller]
    fn require_scope(&self, operation: &'static str) {
        if self.stack.depth() == 0 {
            fatal(RenderError::NoActiveScope { operation });
        }
    }
}
