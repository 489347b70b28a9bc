/// An 8-bit-per-channel RGBA color, stored exactly as it is uploaded in a [`Vertex`].
///
/// The GPU reads the channels as normalized `Unorm8x4`, so `255` maps to `1.0`.
///
/// # Examples
///
/// ```
/// use batch2d::Color;
///
/// let red = Color::rgb(255, 0, 0);
/// assert_eq!(red.normalize(), [1.0, 0.0, 0.0, 1.0]);
///
/// let faded = red.with_alpha(0);
/// assert_eq!(faded.to_array(), [255, 0, 0, 0]);
/// ```
///
/// [`Vertex`]: crate::Vertex
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Color(pub [u8; 4]);

impl Color {
    /// Fully transparent black.
    pub const TRANSPARENT: Self = Self([0, 0, 0, 0]);
    /// Opaque black.
    pub const BLACK: Self = Self([0, 0, 0, 255]);
    /// Opaque white. Multiplying by it leaves a texture sample unchanged.
    pub const WHITE: Self = Self([255, 255, 255, 255]);

    /// Creates an opaque color.
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self([r, g, b, 255])
    }

    /// Creates a color with an explicit alpha channel.
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self([r, g, b, a])
    }

    /// Returns the same color with its alpha channel replaced.
    pub const fn with_alpha(self, alpha: u8) -> Self {
        Self([self.0[0], self.0[1], self.0[2], alpha])
    }

    /// Normalizes the channels to `[0.0, 1.0]`, the way the shader sees them.
    pub fn normalize(&self) -> [f32; 4] {
        normalize_rgba_color(&self.0)
    }

    pub fn to_array(&self) -> [u8; 4] {
        self.0
    }
}

impl From<[u8; 4]> for Color {
    fn from(channels: [u8; 4]) -> Self {
        Self(channels)
    }
}

impl From<Color> for [u8; 4] {
    fn from(color: Color) -> Self {
        color.0
    }
}

pub(crate) fn normalize_rgba_color(color: &[u8; 4]) -> [f32; 4] {
    [
        color[0] as f32 / 255.0,
        color[1] as f32 / 255.0,
        color[2] as f32 / 255.0,
        color[3] as f32 / 255.0,
    ]
}
