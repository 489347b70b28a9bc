use std::fmt;
use std::hash::Hash;

macro_rules! backend_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
        pub struct $name(pub u32);

        impl $name {
            /// The id no backend ever hands out.
            pub const INVALID: Self = Self(0);

            #[inline]
            pub fn is_valid(self) -> bool {
                self.0 != 0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

backend_id!(
    /// Identifies a GPU pipeline object owned by the backend.
    PipelineId
);
backend_id!(
    /// Identifies an image (texture view) registered with the backend.
    ImageId
);
backend_id!(
    /// Identifies a sampler registered with the backend.
    SamplerId
);
backend_id!(
    /// Identifies an offscreen render target registered with the backend.
    TargetId
);

/// Number of texture slots a draw command carries.
pub const MAX_TEXTURE_SLOTS: usize = 4;

/// An image/sampler pair bound to one texture slot. The invalid image means "use the
/// backend's default texture".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TextureBinding {
    pub image: ImageId,
    pub sampler: SamplerId,
}

impl TextureBinding {
    pub const NONE: Self = Self {
        image: ImageId::INVALID,
        sampler: SamplerId::INVALID,
    };

    pub fn new(image: ImageId, sampler: SamplerId) -> Self {
        Self { image, sampler }
    }
}

pub type TextureBindings = [TextureBinding; MAX_TEXTURE_SLOTS];

/// Primitive topology of a draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    Points,
    Lines,
    LineStrip,
    Triangles,
    TriangleStrip,
}

impl PrimitiveType {
    pub const ALL: [PrimitiveType; 5] = [
        PrimitiveType::Points,
        PrimitiveType::Lines,
        PrimitiveType::LineStrip,
        PrimitiveType::Triangles,
        PrimitiveType::TriangleStrip,
    ];

    /// Strip topologies depend on vertex adjacency, so their draws are never merged.
    #[inline]
    pub fn is_strip(self) -> bool {
        matches!(self, PrimitiveType::LineStrip | PrimitiveType::TriangleStrip)
    }

    pub(crate) fn topology(self) -> wgpu::PrimitiveTopology {
        match self {
            PrimitiveType::Points => wgpu::PrimitiveTopology::PointList,
            PrimitiveType::Lines => wgpu::PrimitiveTopology::LineList,
            PrimitiveType::LineStrip => wgpu::PrimitiveTopology::LineStrip,
            PrimitiveType::Triangles => wgpu::PrimitiveTopology::TriangleList,
            PrimitiveType::TriangleStrip => wgpu::PrimitiveTopology::TriangleStrip,
        }
    }
}
