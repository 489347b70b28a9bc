use crate::Color;

/// A single batched vertex.
///
/// Positions are in model space when handed to [`Renderer::draw`] and in clip space once
/// they sit in the vertex arena. The layout matches the `VertexInput` struct in `shader.wgsl`.
///
/// [`Renderer::draw`]: crate::Renderer::draw
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub texcoord: [f32; 2],
    pub color: [u8; 4],
}

impl Vertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 3] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x2, 2 => Unorm8x4];

    #[inline]
    pub fn new(position: [f32; 3], texcoord: [f32; 2], color: Color) -> Self {
        Self {
            position,
            texcoord,
            color: color.0,
        }
    }

    /// A vertex on the `z = 0` plane.
    #[inline]
    pub fn at(x: f32, y: f32, texcoord: [f32; 2], color: Color) -> Self {
        Self::new([x, y, 0.0], texcoord, color)
    }

    /// Vertex buffer layout used by every batch pipeline.
    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}
