use lyon::path::Path;
use lyon::tessellation::{
    BuffersBuilder, FillOptions, FillTessellator, FillVertex, FillVertexConstructor,
    VertexBuffers,
};

use crate::error::DrawableError;
use crate::id::{PrimitiveType, TextureBinding, TextureBindings, MAX_TEXTURE_SLOTS};
use crate::vertex::Vertex;
use crate::Color;

/// How [`Drawable::rect`] turns a rectangle into geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawMode {
    /// Two triangles.
    Fill,
    /// Four separate edges.
    Lines,
}

/// Geometry handed to [`Renderer::draw`](crate::Renderer::draw): a primitive type, the
/// vertices in model space and the textures to sample.
///
/// # Examples
///
/// ```
/// use batch2d::{Color, DrawMode, Drawable, PrimitiveType};
///
/// let quad = Drawable::rect(DrawMode::Fill, 10.0, 10.0, 100.0, 50.0, Color::WHITE);
/// assert_eq!(quad.primitive(), PrimitiveType::Triangles);
/// assert_eq!(quad.vertices().len(), 6);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Drawable {
    primitive: PrimitiveType,
    vertices: Vec<Vertex>,
    textures: TextureBindings,
}

impl Drawable {
    pub fn new(primitive: PrimitiveType) -> Self {
        Self::with_vertices(primitive, Vec::new())
    }

    pub fn with_vertices(primitive: PrimitiveType, vertices: Vec<Vertex>) -> Self {
        Self {
            primitive,
            vertices,
            textures: [TextureBinding::NONE; MAX_TEXTURE_SLOTS],
        }
    }

    pub fn rect(mode: DrawMode, x: f32, y: f32, width: f32, height: f32, color: Color) -> Self {
        let (x2, y2) = (x + width, y + height);
        let top_left = Vertex::at(x, y, [0.0, 0.0], color);
        let top_right = Vertex::at(x2, y, [1.0, 0.0], color);
        let bottom_left = Vertex::at(x, y2, [0.0, 1.0], color);
        let bottom_right = Vertex::at(x2, y2, [1.0, 1.0], color);

        match mode {
            DrawMode::Fill => Self::with_vertices(
                PrimitiveType::Triangles,
                vec![
                    top_left,
                    top_right,
                    bottom_left,
                    bottom_left,
                    top_right,
                    bottom_right,
                ],
            ),
            DrawMode::Lines => Self::with_vertices(
                PrimitiveType::Lines,
                vec![
                    top_left,
                    top_right,
                    top_right,
                    bottom_right,
                    bottom_right,
                    bottom_left,
                    bottom_left,
                    top_left,
                ],
            ),
        }
    }

    /// Tessellates the interior of `path` into a triangle list. Texture coordinates span
    /// the path's bounding box.
    pub fn fill_path(path: &Path, color: Color, tolerance: f32) -> Result<Self, DrawableError> {
        let mut buffers: VertexBuffers<Vertex, u16> = VertexBuffers::new();
        let mut tessellator = FillTessellator::new();
        tessellator
            .tessellate_path(
                path,
                &FillOptions::tolerance(tolerance),
                &mut BuffersBuilder::new(&mut buffers, VertexConverter { color }),
            )
            .map_err(DrawableError::Tessellation)?;

        let mut min = [f32::INFINITY; 2];
        let mut max = [f32::NEG_INFINITY; 2];
        for vertex in &buffers.vertices {
            for axis in 0..2 {
                min[axis] = min[axis].min(vertex.position[axis]);
                max[axis] = max[axis].max(vertex.position[axis]);
            }
        }
        let width = (max[0] - min[0]).max(1e-6);
        let height = (max[1] - min[1]).max(1e-6);

        // Batched draws are non-indexed.
        let vertices = buffers
            .indices
            .iter()
            .map(|index| {
                let mut vertex = buffers.vertices[*index as usize];
                vertex.texcoord = [
                    (vertex.position[0] - min[0]) / width,
                    (vertex.position[1] - min[1]) / height,
                ];
                vertex
            })
            .collect();

        Ok(Self::with_vertices(PrimitiveType::Triangles, vertices))
    }

    pub fn append_vertices(&mut self, vertices: &[Vertex]) {
        self.vertices.extend_from_slice(vertices);
    }

    pub fn set_texture(&mut self, slot: usize, binding: TextureBinding) {
        let Some(target) = self.textures.get_mut(slot) else {
            tracing::warn!(slot, max = MAX_TEXTURE_SLOTS, "texture slot out of range");
            return;
        };
        *target = binding;
    }

    pub fn with_texture(mut self, slot: usize, binding: TextureBinding) -> Self {
        self.set_texture(slot, binding);
        self
    }

    pub fn primitive(&self) -> PrimitiveType {
        self.primitive
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn textures(&self) -> &TextureBindings {
        &self.textures
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }
}

struct VertexConverter {
    color: Color,
}

impl FillVertexConstructor<Vertex> for VertexConverter {
    fn new_vertex(&mut self, vertex: FillVertex) -> Vertex {
        let position = vertex.position();
        Vertex::at(position.x, position.y, [0.0, 0.0], self.color)
    }
}
