//! [`RenderBackend`] implementation on top of a `wgpu` device.

use std::num::NonZeroUsize;
use std::sync::Arc;

use ahash::{HashMap, HashMapExt, HashSet, HashSetExt};
use lru::LruCache;

use crate::backend::{Bindings, RenderBackend};
use crate::command::IRect;
use crate::error::BackendError;
use crate::id::{ImageId, PipelineId, PrimitiveType, SamplerId, TargetId, TextureBinding};
use crate::pipeline::{self, UNIFORM_BLOCK_SIZE};
use crate::vertex::Vertex;

const VERTEX_SIZE: u64 = std::mem::size_of::<Vertex>() as u64;

#[derive(Debug, Clone, Copy)]
pub struct WgpuBackendConfig {
    /// Vertices the GPU vertex buffer holds per frame.
    pub vertex_capacity: u32,
    /// Uniform blocks available per frame. Block 0 is the default block.
    pub uniform_block_capacity: u32,
    /// Color the target is cleared to by the first pass of a frame.
    pub clear_color: wgpu::Color,
    /// Texture bind groups kept alive between frames.
    pub bind_group_cache_size: usize,
}

impl Default for WgpuBackendConfig {
    fn default() -> Self {
        Self {
            vertex_capacity: 65536,
            uniform_block_capacity: 1024,
            clear_color: wgpu::Color::BLACK,
            bind_group_cache_size: 64,
        }
    }
}

impl WgpuBackendConfig {
    pub fn with_vertex_capacity(mut self, vertex_capacity: u32) -> Self {
        self.vertex_capacity = vertex_capacity;
        self
    }

    pub fn with_uniform_block_capacity(mut self, uniform_block_capacity: u32) -> Self {
        self.uniform_block_capacity = uniform_block_capacity;
        self
    }

    pub fn with_clear_color(mut self, clear_color: wgpu::Color) -> Self {
        self.clear_color = clear_color;
        self
    }

    pub fn with_bind_group_cache_size(mut self, bind_group_cache_size: usize) -> Self {
        self.bind_group_cache_size = bind_group_cache_size;
        self
    }
}

/// A call recorded between `begin_pass` and `end_pass`.
#[derive(Debug)]
enum PassOp {
    Viewport(IRect),
    Scissor(IRect),
    Pipeline(PipelineId),
    VertexOffset(u64),
    Textures(Arc<wgpu::BindGroup>),
    Uniforms(u32),
    Draw {
        first_vertex: u32,
        vertex_count: u32,
        instances: u32,
    },
}

struct RegisteredPipeline {
    pipeline: wgpu::RenderPipeline,
    primitive: PrimitiveType,
}

struct RenderTarget {
    view: wgpu::TextureView,
    size: (u32, u32),
}

#[derive(Debug, Clone, Copy)]
struct OpenPass {
    target: Option<TargetId>,
    size: (u32, u32),
}

/// Draws into a texture view with one pipeline per primitive type.
///
/// Vertices and uniform blocks are appended to GPU buffers through the queue as they
/// arrive. Pass calls are recorded and encoded into a single `wgpu::RenderPass`, submitted
/// at [`end_pass`](RenderBackend::end_pass). Only texture slot 0 is sampled by the built-in
/// shader; custom pipelines added with [`WgpuBackend::add_pipeline`] share its layout.
///
/// Scopes opened with [`Renderer::begin_target`](crate::Renderer::begin_target) draw into
/// targets registered with [`WgpuBackend::add_target`] or
/// [`WgpuBackend::create_render_target`]. Every target is cleared by its first pass of a
/// frame.
pub struct WgpuBackend {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    config: WgpuBackendConfig,
    format: wgpu::TextureFormat,

    pipeline_layout: wgpu::PipelineLayout,
    texture_layout: wgpu::BindGroupLayout,
    pipelines: HashMap<PipelineId, RegisteredPipeline>,
    defaults: HashMap<PrimitiveType, PipelineId>,
    next_pipeline: u32,

    vertex_buffer: wgpu::Buffer,
    vertex_cursor: u64,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    uniform_cursor: u32,
    uniform_blocks: u32,

    images: HashMap<ImageId, wgpu::TextureView>,
    samplers: HashMap<SamplerId, wgpu::Sampler>,
    next_image: u32,
    next_sampler: u32,
    white_texture: wgpu::TextureView,
    default_sampler: wgpu::Sampler,
    default_textures: Arc<wgpu::BindGroup>,
    bind_groups: LruCache<(ImageId, SamplerId), Arc<wgpu::BindGroup>>,

    target: Option<wgpu::TextureView>,
    targets: HashMap<TargetId, RenderTarget>,
    next_target: u32,
    pass: Option<OpenPass>,
    ops: Vec<PassOp>,
    cleared: HashSet<Option<TargetId>>,
}

impl WgpuBackend {
    /// Creates the buffers, layouts and one pipeline per primitive type for targets of
    /// `format`.
    pub fn new(
        device: Arc<wgpu::Device>,
        queue: Arc<wgpu::Queue>,
        format: wgpu::TextureFormat,
        config: WgpuBackendConfig,
    ) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("batch_shader"),
            source: wgpu::ShaderSource::Wgsl(pipeline::BATCH_SHADER.into()),
        });

        let uniform_layout = pipeline::create_uniform_bind_group_layout(&device);
        let texture_layout = pipeline::create_texture_bind_group_layout(&device);
        let pipeline_layout =
            pipeline::create_pipeline_layout(&device, &uniform_layout, &texture_layout);

        let mut pipelines = HashMap::new();
        let mut defaults = HashMap::new();
        let mut next_pipeline = 1;
        for primitive in PrimitiveType::ALL {
            let id = PipelineId(next_pipeline);
            next_pipeline += 1;
            pipelines.insert(
                id,
                RegisteredPipeline {
                    pipeline: pipeline::create_batch_pipeline(
                        &device,
                        &shader,
                        &pipeline_layout,
                        format,
                        primitive,
                    ),
                    primitive,
                },
            );
            defaults.insert(primitive, id);
        }

        let vertex_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("batch_vertex_buffer"),
            size: u64::from(config.vertex_capacity.max(1)) * VERTEX_SIZE,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let uniform_blocks = config.uniform_block_capacity.max(2);
        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("batch_uniform_buffer"),
            size: u64::from(uniform_blocks) * UNIFORM_BLOCK_SIZE,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        queue.write_buffer(&uniform_buffer, 0, &pipeline::default_uniform_block());
        let uniform_bind_group =
            pipeline::create_uniform_bind_group(&device, &uniform_layout, &uniform_buffer);

        let white_texture = pipeline::create_white_texture(&device, &queue);
        let default_sampler = pipeline::create_default_sampler(&device);
        let default_textures = Arc::new(pipeline::create_texture_bind_group(
            &device,
            &texture_layout,
            &white_texture,
            &default_sampler,
        ));

        let cache_size =
            NonZeroUsize::new(config.bind_group_cache_size).unwrap_or(NonZeroUsize::MIN);

        tracing::debug!(
            ?format,
            vertex_capacity = config.vertex_capacity,
            uniform_blocks,
            "created wgpu backend"
        );

        Self {
            device,
            queue,
            config,
            format,
            pipeline_layout,
            texture_layout,
            pipelines,
            defaults,
            next_pipeline,
            vertex_buffer,
            vertex_cursor: 0,
            uniform_buffer,
            uniform_bind_group,
            uniform_cursor: 1,
            uniform_blocks,
            images: HashMap::new(),
            samplers: HashMap::new(),
            next_image: 1,
            next_sampler: 1,
            white_texture,
            default_sampler,
            default_textures,
            bind_groups: LruCache::new(cache_size),
            target: None,
            targets: HashMap::new(),
            next_target: 1,
            pass: None,
            ops: Vec::new(),
            cleared: HashSet::new(),
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    pub fn config(&self) -> &WgpuBackendConfig {
        &self.config
    }

    /// Layout custom pipelines must be created with: uniform block in group 0, slot 0
    /// texture and sampler in group 1.
    pub fn pipeline_layout(&self) -> &wgpu::PipelineLayout {
        &self.pipeline_layout
    }

    /// Sets the view passes draw into, usually the current surface texture.
    pub fn set_target(&mut self, target: wgpu::TextureView) {
        self.target = Some(target);
    }

    pub fn take_target(&mut self) -> Option<wgpu::TextureView> {
        self.target.take()
    }

    /// Registers a pipeline built with [`WgpuBackend::pipeline_layout`] and [`Vertex::desc`].
    /// `primitive` must match the topology it was created with.
    pub fn add_pipeline(
        &mut self,
        pipeline: wgpu::RenderPipeline,
        primitive: PrimitiveType,
    ) -> PipelineId {
        let id = PipelineId(self.next_pipeline);
        self.next_pipeline += 1;
        self.pipelines
            .insert(id, RegisteredPipeline { pipeline, primitive });
        id
    }

    /// Removes a pipeline. Draws still referencing it are dropped.
    pub fn remove_pipeline(&mut self, id: PipelineId) -> bool {
        self.pipelines.remove(&id).is_some()
    }

    /// Registers a view scopes can draw into. It must have this backend's format.
    pub fn add_target(&mut self, view: wgpu::TextureView, size: (u32, u32)) -> TargetId {
        let id = TargetId(self.next_target);
        self.next_target += 1;
        self.targets.insert(id, RenderTarget { view, size });
        id
    }

    /// Creates a texture of `size` pixels that scopes can draw into and later draws can
    /// sample through the returned image.
    pub fn create_render_target(&mut self, size: (u32, u32)) -> (TargetId, ImageId) {
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("batch_render_target"),
            size: wgpu::Extent3d {
                width: size.0.max(1),
                height: size.1.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: self.format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let target = self.add_target(
            texture.create_view(&wgpu::TextureViewDescriptor::default()),
            size,
        );
        let image =
            self.register_texture_view(texture.create_view(&wgpu::TextureViewDescriptor::default()));
        (target, image)
    }

    pub fn remove_target(&mut self, id: TargetId) -> bool {
        self.cleared.remove(&Some(id));
        self.targets.remove(&id).is_some()
    }

    /// Uploads an RGBA8 image of `size` pixels.
    pub fn create_texture(&mut self, size: (u32, u32), rgba: &[u8]) -> Result<ImageId, BackendError> {
        let expected = size.0 as usize * size.1 as usize * 4;
        if rgba.len() != expected || expected == 0 {
            return Err(BackendError::InvalidTextureData {
                expected,
                actual: rgba.len(),
            });
        }

        let texture = pipeline::create_rgba_texture(&self.device, size, Some("batch_image"));
        pipeline::write_rgba_texture(&self.queue, &texture, size, rgba);
        Ok(self.register_texture_view(
            texture.create_view(&wgpu::TextureViewDescriptor::default()),
        ))
    }

    /// Registers a view of a texture owned elsewhere, e.g. a render target.
    pub fn register_texture_view(&mut self, view: wgpu::TextureView) -> ImageId {
        let id = ImageId(self.next_image);
        self.next_image += 1;
        self.images.insert(id, view);
        id
    }

    pub fn remove_texture(&mut self, id: ImageId) -> bool {
        self.evict_bind_groups(|(image, _)| *image == id);
        self.images.remove(&id).is_some()
    }

    pub fn create_sampler(&mut self, descriptor: &wgpu::SamplerDescriptor) -> SamplerId {
        let id = SamplerId(self.next_sampler);
        self.next_sampler += 1;
        self.samplers
            .insert(id, self.device.create_sampler(descriptor));
        id
    }

    pub fn remove_sampler(&mut self, id: SamplerId) -> bool {
        self.evict_bind_groups(|(_, sampler)| *sampler == id);
        self.samplers.remove(&id).is_some()
    }

    fn evict_bind_groups(&mut self, stale: impl Fn(&(ImageId, SamplerId)) -> bool) {
        let keys: Vec<_> = self
            .bind_groups
            .iter()
            .filter(|(key, _)| stale(key))
            .map(|(key, _)| *key)
            .collect();
        for key in keys {
            self.bind_groups.pop(&key);
        }
    }

    fn texture_bind_group(&mut self, binding: TextureBinding) -> Arc<wgpu::BindGroup> {
        if binding == TextureBinding::NONE {
            return self.default_textures.clone();
        }
        let key = (binding.image, binding.sampler);
        if let Some(bind_group) = self.bind_groups.get(&key) {
            return bind_group.clone();
        }

        let view = if binding.image.is_valid() {
            match self.images.get(&binding.image) {
                Some(view) => view,
                None => {
                    tracing::warn!(image = %binding.image, "unknown image, using the default texture");
                    return self.default_textures.clone();
                }
            }
        } else {
            &self.white_texture
        };
        let sampler = if binding.sampler.is_valid() {
            match self.samplers.get(&binding.sampler) {
                Some(sampler) => sampler,
                None => {
                    tracing::warn!(sampler = %binding.sampler, "unknown sampler, using the default");
                    &self.default_sampler
                }
            }
        } else {
            &self.default_sampler
        };

        let bind_group = Arc::new(pipeline::create_texture_bind_group(
            &self.device,
            &self.texture_layout,
            view,
            sampler,
        ));
        self.bind_groups.put(key, bind_group.clone());
        bind_group
    }

    fn record(&mut self, op: PassOp) {
        if self.pass.is_none() {
            tracing::warn!(?op, "backend call outside of a pass ignored");
            return;
        }
        self.ops.push(op);
    }

    /// Encodes and submits the recorded pass. Without a target the pass is discarded.
    fn submit_pass(&mut self, open: OpenPass) {
        let view = match open.target {
            None => self.target.as_ref(),
            Some(id) => self.targets.get(&id).map(|target| &target.view),
        };
        let Some(view) = view else {
            tracing::warn!(target = ?open.target, ops = self.ops.len(), "no render target, dropping pass");
            self.ops.clear();
            return;
        };
        let framebuffer_size = open.size;

        let clear = (!self.cleared.contains(&open.target)).then_some(self.config.clear_color);
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("batch_encoder"),
            });

        {
            let mut pass = pipeline::begin_batch_pass(&mut encoder, view, clear);
            pass.set_bind_group(0, &self.uniform_bind_group, &[0]);
            pass.set_bind_group(1, self.default_textures.as_ref(), &[]);
            pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));

            for op in &self.ops {
                match op {
                    PassOp::Viewport(rect) => {
                        if rect.has_area() {
                            pass.set_viewport(
                                rect.x as f32,
                                rect.y as f32,
                                rect.w as f32,
                                rect.h as f32,
                                0.0,
                                1.0,
                            );
                        }
                    }
                    PassOp::Scissor(rect) => {
                        let [x, y, w, h] = clamp_scissor(*rect, framebuffer_size);
                        pass.set_scissor_rect(x, y, w, h);
                    }
                    PassOp::Pipeline(id) => match self.pipelines.get(id) {
                        Some(registered) => pass.set_pipeline(&registered.pipeline),
                        None => tracing::warn!(pipeline = %id, "unknown pipeline"),
                    },
                    PassOp::VertexOffset(offset) => {
                        pass.set_vertex_buffer(0, self.vertex_buffer.slice(*offset..));
                    }
                    PassOp::Textures(bind_group) => {
                        pass.set_bind_group(1, bind_group.as_ref(), &[]);
                    }
                    PassOp::Uniforms(offset) => {
                        pass.set_bind_group(0, &self.uniform_bind_group, &[*offset]);
                    }
                    PassOp::Draw {
                        first_vertex,
                        vertex_count,
                        instances,
                    } => {
                        pass.draw(*first_vertex..first_vertex + vertex_count, 0..*instances);
                    }
                }
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        self.cleared.insert(open.target);
        self.ops.clear();
    }
}

impl std::fmt::Debug for WgpuBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuBackend")
            .field("format", &self.format)
            .field("pipelines", &self.pipelines.len())
            .field("images", &self.images.len())
            .field("targets", &self.targets.len())
            .field("vertex_cursor", &self.vertex_cursor)
            .field("uniform_cursor", &self.uniform_cursor)
            .finish_non_exhaustive()
    }
}

impl RenderBackend for WgpuBackend {
    fn pipeline_for(&self, primitive: PrimitiveType) -> PipelineId {
        self.defaults
            .get(&primitive)
            .copied()
            .unwrap_or(PipelineId::INVALID)
    }

    fn is_pipeline_valid(&self, pipeline: PipelineId) -> bool {
        self.pipelines.contains_key(&pipeline)
    }

    fn pipeline_primitive(&self, pipeline: PipelineId) -> Option<PrimitiveType> {
        self.pipelines
            .get(&pipeline)
            .map(|registered| registered.primitive)
    }

    fn target_size(&self, target: TargetId) -> Option<(u32, u32)> {
        self.targets.get(&target).map(|target| target.size)
    }

    fn append_vertices(&mut self, vertices: &[Vertex]) -> Result<u64, BackendError> {
        let offset = self.vertex_cursor;
        let requested = vertices.len() as u64 * VERTEX_SIZE;
        let available = self.vertex_buffer.size() - offset;
        if requested > available {
            return Err(BackendError::VertexBufferOverflow {
                requested,
                available,
            });
        }
        if requested > 0 {
            self.queue
                .write_buffer(&self.vertex_buffer, offset, bytemuck::cast_slice(vertices));
            self.vertex_cursor += requested;
        }
        Ok(offset)
    }

    fn begin_pass(&mut self, target: Option<TargetId>, framebuffer_size: (u32, u32)) {
        if let Some(open) = self.pass.take() {
            tracing::warn!("begin_pass() while a pass is open, submitting it first");
            self.submit_pass(open);
        }
        self.pass = Some(OpenPass {
            target,
            size: framebuffer_size,
        });
    }

    fn apply_viewport(&mut self, rect: IRect) {
        self.record(PassOp::Viewport(rect));
    }

    fn apply_scissor(&mut self, rect: IRect) {
        self.record(PassOp::Scissor(rect));
    }

    fn apply_pipeline(&mut self, pipeline: PipelineId) {
        self.record(PassOp::Pipeline(pipeline));
    }

    fn apply_bindings(&mut self, bindings: &Bindings) {
        let textures = self.texture_bind_group(bindings.textures[0]);
        self.record(PassOp::VertexOffset(bindings.vertex_buffer_offset));
        self.record(PassOp::Textures(textures));
    }

    fn apply_uniforms(&mut self, slot: usize, data: &[u8]) {
        if slot != 0 {
            // The built-in layout has a single uniform group.
            if !data.is_empty() {
                tracing::warn!(slot, "uniform slot ignored, only slot 0 is bound");
            }
            return;
        }
        if data.is_empty() {
            self.record(PassOp::Uniforms(0));
            return;
        }
        if self.uniform_cursor >= self.uniform_blocks {
            tracing::warn!(
                blocks = self.uniform_blocks,
                "uniform buffer full, keeping the previous block"
            );
            return;
        }

        let block = uniform_block(data);
        let offset = u64::from(self.uniform_cursor) * UNIFORM_BLOCK_SIZE;
        self.queue.write_buffer(&self.uniform_buffer, offset, &block);
        self.uniform_cursor += 1;
        self.record(PassOp::Uniforms(offset as u32));
    }

    fn draw(&mut self, first_vertex: u32, vertex_count: u32, instances: u32) {
        self.record(PassOp::Draw {
            first_vertex,
            vertex_count,
            instances,
        });
    }

    fn end_pass(&mut self) {
        match self.pass.take() {
            Some(open) => self.submit_pass(open),
            None => tracing::warn!("end_pass() without begin_pass()"),
        }
    }

    fn commit(&mut self) {
        if let Some(open) = self.pass.take() {
            tracing::warn!("commit() with an open pass, submitting it");
            self.submit_pass(open);
        }
        // A frame without draws still clears its target.
        if !self.cleared.contains(&None) && self.target.is_some() {
            self.submit_pass(OpenPass {
                target: None,
                size: (0, 0),
            });
        }

        tracing::trace!(
            vertex_bytes = self.vertex_cursor,
            uniform_blocks = self.uniform_cursor,
            "wgpu frame committed"
        );
        self.vertex_cursor = 0;
        self.uniform_cursor = 1;
        self.cleared.clear();
    }
}

/// Fills a block with `data` over the default block, truncating what does not fit.
fn uniform_block(data: &[u8]) -> [u8; UNIFORM_BLOCK_SIZE as usize] {
    let mut block = pipeline::default_uniform_block();
    if data.len() > block.len() {
        tracing::warn!(bytes = data.len(), "uniform data truncated to one block");
    }
    let len = data.len().min(block.len());
    block[..len].copy_from_slice(&data[..len]);
    block
}

/// Intersects `rect` with the target as `[x, y, width, height]`.
fn clamp_scissor(rect: IRect, target: (u32, u32)) -> [u32; 4] {
    let (width, height) = (target.0 as i64, target.1 as i64);
    let x0 = i64::from(rect.x).clamp(0, width);
    let y0 = i64::from(rect.y).clamp(0, height);
    let x1 = (i64::from(rect.x) + i64::from(rect.w.max(0))).clamp(x0, width);
    let y1 = (i64::from(rect.y) + i64::from(rect.h.max(0))).clamp(y0, height);
    [x0 as u32, y0 as u32, (x1 - x0) as u32, (y1 - y0) as u32]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scissor_is_clamped_to_the_target() {
        assert_eq!(clamp_scissor(IRect::new(10, 10, 20, 20), (100, 100)), [10, 10, 20, 20]);
        assert_eq!(clamp_scissor(IRect::new(-5, 90, 20, 20), (100, 100)), [0, 90, 15, 10]);
        assert_eq!(clamp_scissor(IRect::new(200, 0, 5, 5), (100, 100)), [100, 0, 0, 5]);
    }

    #[test]
    fn uniform_data_overrides_the_default_block() {
        let block = uniform_block(&[7; 4]);
        assert_eq!(&block[..4], &[7; 4]);
        assert_eq!(&block[4..16], &pipeline::default_uniform_block()[4..16]);

        let long = uniform_block(&[1; 300]);
        assert!(long.iter().all(|byte| *byte == 1));
    }

    #[test]
    fn config_builders() {
        let config = WgpuBackendConfig::default()
            .with_vertex_capacity(8)
            .with_uniform_block_capacity(4)
            .with_bind_group_cache_size(2);
        assert_eq!(config.vertex_capacity, 8);
        assert_eq!(config.uniform_block_capacity, 4);
        assert_eq!(config.bind_group_cache_size, 2);
    }
}
