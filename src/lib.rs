//! Immediate-mode 2D draw batching.
//!
//! Geometry recorded with [`Renderer::draw`] is transformed to clip space, stored in
//! fixed-size arenas and merged into earlier draws sharing its pipeline, textures and
//! uniforms whenever reordering cannot change the picture. Each `begin()`/`end()` scope is
//! replayed against a [`RenderBackend`] with one vertex upload and no redundant state
//! changes. [`WgpuBackend`] draws with `wgpu`; [`RecordingBackend`] only records the calls.

pub use lyon;
pub use wgpu;

mod arena;
mod backend;
mod color;
mod command;
mod config;
mod drawable;
mod error;
mod id;
mod merge;
mod pipeline;
mod pool;
mod renderer;
mod state;
mod uniform;
mod vertex;
mod view;
mod wgpu_backend;

pub use arena::{Arena, CommandArena, VertexArena};
pub use backend::{BackendCall, Bindings, RecordingBackend, RenderBackend};
pub use color::Color;
pub use command::{regions_overlap, region_union, DrawCommand, IRect, Region, RenderCommand};
pub use config::RendererConfig;
pub use drawable::{DrawMode, Drawable};
pub use error::{BackendError, DrawableError, RenderError};
pub use id::{
    ImageId, PipelineId, PrimitiveType, SamplerId, TargetId, TextureBinding, TextureBindings,
    MAX_TEXTURE_SLOTS,
};
pub use merge::{try_merge, MergeKind, MergeLimits, MergeRejection};
pub use pipeline::{
    create_pipeline_layout, create_texture_bind_group_layout, create_uniform_bind_group_layout,
    UNIFORM_BLOCK_SIZE,
};
pub use pool::{SlotId, SlotPool};
pub use renderer::{FlushStats, FrameStats, Renderer};
pub use state::{BatchState, StateStack};
pub use uniform::{Uniform, UniformPool, UniformSlots, MAX_UNIFORM_SLOTS};
pub use vertex::Vertex;
pub use view::{screen_projection, Mat4, View};
pub use wgpu_backend::{WgpuBackend, WgpuBackendConfig};
