use lyon::math::{point, Box2D};

use crate::id::{PipelineId, PrimitiveType, TextureBinding, TextureBindings, MAX_TEXTURE_SLOTS};
use crate::uniform::{UniformSlots, MAX_UNIFORM_SLOTS};

/// Clip-space bounding box of a draw. Only used to decide whether draws may be reordered.
pub type Region = Box2D;

/// Integer rectangle in framebuffer pixels, used for viewports and scissors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct IRect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl IRect {
    pub const fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    /// Rectangle covering a whole framebuffer of `size` pixels.
    pub fn from_size(size: (u32, u32)) -> Self {
        Self::new(0, 0, size.0 as i32, size.1 as i32)
    }

    #[inline]
    pub fn has_area(&self) -> bool {
        self.w > 0 && self.h > 0
    }
}

/// An empty region that any point will grow.
pub(crate) fn empty_region() -> Region {
    Box2D::new(point(f32::MAX, f32::MAX), point(f32::MIN, f32::MIN))
}

pub(crate) fn grow_region(region: &mut Region, x: f32, y: f32) {
    region.min.x = region.min.x.min(x);
    region.min.y = region.min.y.min(y);
    region.max.x = region.max.x.max(x);
    region.max.y = region.max.y.max(y);
}

/// Inclusive AABB overlap. Touching edges count as overlapping.
#[inline]
pub fn regions_overlap(a: &Region, b: &Region) -> bool {
    a.min.x <= b.max.x && b.min.x <= a.max.x && a.min.y <= b.max.y && b.min.y <= a.max.y
}

#[inline]
pub fn region_union(a: &Region, b: &Region) -> Region {
    Box2D::new(
        point(a.min.x.min(b.min.x), a.min.y.min(b.min.y)),
        point(a.max.x.max(b.max.x), a.max.y.max(b.max.y)),
    )
}

/// One recorded draw call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawCommand {
    pub pipeline: PipelineId,
    /// Topology the pipeline draws with, which is not always the drawable's own.
    pub primitive: PrimitiveType,
    pub textures: TextureBindings,
    pub uniforms: UniformSlots,
    pub region: Region,
    /// Absolute index into the vertex arena.
    pub vertex_index: u32,
    pub vertex_count: u32,
}

impl DrawCommand {
    /// Two draws can share a GPU draw call when everything they bind is identical and
    /// neither is a strip.
    #[inline]
    pub fn is_compatible(&self, other: &DrawCommand) -> bool {
        !self.primitive.is_strip()
            && self.pipeline == other.pipeline
            && self.primitive == other.primitive
            && self.uniforms == other.uniforms
            && self.textures == other.textures
    }

    #[inline]
    pub fn vertex_end(&self) -> u32 {
        self.vertex_index + self.vertex_count
    }
}

impl Default for DrawCommand {
    fn default() -> Self {
        Self {
            pipeline: PipelineId::INVALID,
            primitive: PrimitiveType::Triangles,
            textures: [TextureBinding::NONE; MAX_TEXTURE_SLOTS],
            uniforms: [None; MAX_UNIFORM_SLOTS],
            region: empty_region(),
            vertex_index: 0,
            vertex_count: 0,
        }
    }
}

/// A slot in the command arena.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum RenderCommand {
    /// Tombstone left behind when a draw was absorbed by a later one.
    #[default]
    None,
    Viewport(IRect),
    Scissor(IRect),
    Draw(DrawCommand),
}

impl RenderCommand {
    pub fn as_draw(&self) -> Option<&DrawCommand> {
        match self {
            RenderCommand::Draw(draw) => Some(draw),
            _ => None,
        }
    }

    pub fn as_draw_mut(&mut self) -> Option<&mut DrawCommand> {
        match self {
            RenderCommand::Draw(draw) => Some(draw),
            _ => None,
        }
    }

    pub fn is_tombstone(&self) -> bool {
        matches!(self, RenderCommand::None)
    }
}
