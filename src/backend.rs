//! The seam between the batcher and a graphics API.

use ahash::{HashMap, HashMapExt, HashSet, HashSetExt};

use crate::command::IRect;
use crate::error::BackendError;
use crate::id::{PipelineId, PrimitiveType, TargetId, TextureBindings};
use crate::vertex::Vertex;

/// Resources bound for the draws that follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bindings {
    /// Byte offset of the flushed vertex slice in the backend's vertex buffer.
    pub vertex_buffer_offset: u64,
    pub textures: TextureBindings,
}

/// What the renderer needs from a graphics API.
///
/// Between [`begin_pass`](RenderBackend::begin_pass) and
/// [`end_pass`](RenderBackend::end_pass) the renderer only issues state changes that differ
/// from the previous ones, so a backend can apply every call as it comes.
pub trait RenderBackend {
    /// Pipeline used for drawables of `primitive` when no override is active.
    fn pipeline_for(&self, primitive: PrimitiveType) -> PipelineId;

    fn is_pipeline_valid(&self, pipeline: PipelineId) -> bool;

    /// Topology `pipeline` draws with, `None` if the backend does not know the pipeline.
    fn pipeline_primitive(&self, pipeline: PipelineId) -> Option<PrimitiveType>;

    /// Size in pixels of an offscreen target, `None` if it is not registered.
    fn target_size(&self, target: TargetId) -> Option<(u32, u32)>;

    /// Appends `vertices` to this frame's vertex buffer and returns their byte offset.
    fn append_vertices(&mut self, vertices: &[Vertex]) -> Result<u64, BackendError>;

    /// Starts a pass drawing into `target`, or into the frame's own target for `None`.
    /// Viewport and scissor start out covering all of `framebuffer_size`.
    fn begin_pass(&mut self, target: Option<TargetId>, framebuffer_size: (u32, u32));

    fn apply_viewport(&mut self, rect: IRect);

    /// `rect` is in framebuffer pixels.
    fn apply_scissor(&mut self, rect: IRect);

    fn apply_pipeline(&mut self, pipeline: PipelineId);

    fn apply_bindings(&mut self, bindings: &Bindings);

    /// Empty `data` restores the backend's default block.
    fn apply_uniforms(&mut self, slot: usize, data: &[u8]);

    /// `first_vertex` is relative to the vertex buffer offset of the last bindings.
    fn draw(&mut self, first_vertex: u32, vertex_count: u32, instances: u32);

    fn end_pass(&mut self);

    /// Ends the frame. Vertex buffer space is reclaimed.
    fn commit(&mut self);
}

/// One call made on a [`RecordingBackend`].
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    BeginPass {
        target: Option<TargetId>,
        framebuffer_size: (u32, u32),
    },
    Viewport(IRect),
    Scissor(IRect),
    Pipeline(PipelineId),
    Bindings(Bindings),
    Uniforms { slot: usize, data: Vec<u8> },
    Draw {
        first_vertex: u32,
        vertex_count: u32,
        instances: u32,
    },
    EndPass,
    Commit,
}

/// A backend that only writes down what it is asked to do.
///
/// Every primitive type gets its own valid pipeline, numbered from 1 in
/// [`PrimitiveType::ALL`] order.
#[derive(Debug)]
pub struct RecordingBackend {
    calls: Vec<BackendCall>,
    pipelines: HashMap<PrimitiveType, PipelineId>,
    invalid: HashSet<PipelineId>,
    targets: HashMap<TargetId, (u32, u32)>,
    vertices: Vec<Vertex>,
    vertex_capacity: usize,
}

impl RecordingBackend {
    pub fn new() -> Self {
        let mut pipelines = HashMap::new();
        for (i, primitive) in PrimitiveType::ALL.into_iter().enumerate() {
            pipelines.insert(primitive, PipelineId(i as u32 + 1));
        }

        Self {
            calls: Vec::new(),
            pipelines,
            invalid: HashSet::new(),
            targets: HashMap::new(),
            vertices: Vec::new(),
            vertex_capacity: usize::MAX,
        }
    }

    /// Limits how many vertices can be appended per frame.
    pub fn with_vertex_capacity(mut self, capacity: usize) -> Self {
        self.vertex_capacity = capacity;
        self
    }

    pub fn register_pipeline(&mut self, primitive: PrimitiveType, pipeline: PipelineId) {
        self.invalid.remove(&pipeline);
        self.pipelines.insert(primitive, pipeline);
    }

    pub fn invalidate_pipeline(&mut self, pipeline: PipelineId) {
        self.invalid.insert(pipeline);
    }

    /// Registers an offscreen target of `size` pixels. Ids count up from 1.
    pub fn register_target(&mut self, size: (u32, u32)) -> TargetId {
        let id = TargetId(self.targets.len() as u32 + 1);
        self.targets.insert(id, size);
        id
    }

    pub fn calls(&self) -> &[BackendCall] {
        &self.calls
    }

    pub fn take_calls(&mut self) -> Vec<BackendCall> {
        std::mem::take(&mut self.calls)
    }

    /// `(first_vertex, vertex_count)` of every draw so far.
    pub fn draw_calls(&self) -> Vec<(u32, u32)> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                BackendCall::Draw {
                    first_vertex,
                    vertex_count,
                    ..
                } => Some((*first_vertex, *vertex_count)),
                _ => None,
            })
            .collect()
    }

    /// Vertices appended since the last commit.
    pub fn uploaded_vertices(&self) -> &[Vertex] {
        &self.vertices
    }
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self::new()
    }
}

const VERTEX_SIZE: u64 = std::mem::size_of::<Vertex>() as u64;

impl RenderBackend for RecordingBackend {
    fn pipeline_for(&self, primitive: PrimitiveType) -> PipelineId {
        self.pipelines
            .get(&primitive)
            .copied()
            .unwrap_or(PipelineId::INVALID)
    }

    fn is_pipeline_valid(&self, pipeline: PipelineId) -> bool {
        pipeline.is_valid()
            && !self.invalid.contains(&pipeline)
            && self.pipelines.values().any(|known| *known == pipeline)
    }

    fn pipeline_primitive(&self, pipeline: PipelineId) -> Option<PrimitiveType> {
        self.pipelines
            .iter()
            .find(|(_, known)| **known == pipeline)
            .map(|(primitive, _)| *primitive)
    }

    fn target_size(&self, target: TargetId) -> Option<(u32, u32)> {
        self.targets.get(&target).copied()
    }

    fn append_vertices(&mut self, vertices: &[Vertex]) -> Result<u64, BackendError> {
        let available = self.vertex_capacity.saturating_sub(self.vertices.len());
        if vertices.len() > available {
            return Err(BackendError::VertexBufferOverflow {
                requested: vertices.len() as u64 * VERTEX_SIZE,
                available: available as u64 * VERTEX_SIZE,
            });
        }
        let offset = self.vertices.len() as u64 * VERTEX_SIZE;
        self.vertices.extend_from_slice(vertices);
        Ok(offset)
    }

    fn begin_pass(&mut self, target: Option<TargetId>, framebuffer_size: (u32, u32)) {
        self.calls.push(BackendCall::BeginPass {
            target,
            framebuffer_size,
        });
    }

    fn apply_viewport(&mut self, rect: IRect) {
        self.calls.push(BackendCall::Viewport(rect));
    }

    fn apply_scissor(&mut self, rect: IRect) {
        self.calls.push(BackendCall::Scissor(rect));
    }

    fn apply_pipeline(&mut self, pipeline: PipelineId) {
        self.calls.push(BackendCall::Pipeline(pipeline));
    }

    fn apply_bindings(&mut self, bindings: &Bindings) {
        self.calls.push(BackendCall::Bindings(*bindings));
    }

    fn apply_uniforms(&mut self, slot: usize, data: &[u8]) {
        self.calls.push(BackendCall::Uniforms {
            slot,
            data: data.to_vec(),
        });
    }

    fn draw(&mut self, first_vertex: u32, vertex_count: u32, instances: u32) {
        self.calls.push(BackendCall::Draw {
            first_vertex,
            vertex_count,
            instances,
        });
    }

    fn end_pass(&mut self) {
        self.calls.push(BackendCall::EndPass);
    }

    fn commit(&mut self) {
        self.vertices.clear();
        self.calls.push(BackendCall::Commit);
    }
}
