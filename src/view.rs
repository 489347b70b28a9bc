use lyon::geom::euclid::{default::Transform3D, Angle};
use lyon::math::{point, Point};

/// 4x4 column-major transform used for model, view and projection matrices.
pub type Mat4 = Transform3D<f32>;

/// Screen-space orthographic projection for a target of `width` x `height` pixels, with
/// the origin in the top-left corner and y growing downwards.
pub fn screen_projection(width: f32, height: f32) -> Mat4 {
    Mat4::ortho(0.0, width, height, 0.0, -1.0, 1.0)
}

/// A 2D camera. Zoom and rotation happen around `center`.
///
/// The matrix is rebuilt by every setter, so reading it never mutates the view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct View {
    center: Point,
    rotation: f32,
    zoom: f32,
    matrix: Mat4,
}

impl View {
    pub fn new(center: Point, rotation: f32, zoom: f32) -> Self {
        let mut view = Self {
            center,
            rotation,
            zoom,
            matrix: Mat4::identity(),
        };
        view.update_matrix();
        view
    }

    pub fn center(&self) -> Point {
        self.center
    }

    /// Rotation in radians.
    pub fn rotation(&self) -> f32 {
        self.rotation
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn matrix(&self) -> &Mat4 {
        &self.matrix
    }

    pub fn set_center(&mut self, center: Point) {
        self.center = center;
        self.update_matrix();
    }

    pub fn set_rotation(&mut self, radians: f32) {
        self.rotation = radians;
        self.update_matrix();
    }

    pub fn set_zoom(&mut self, zoom: f32) {
        self.zoom = zoom;
        self.update_matrix();
    }

    pub fn translate(&mut self, dx: f32, dy: f32) {
        self.center = point(self.center.x + dx, self.center.y + dy);
        self.update_matrix();
    }

    fn update_matrix(&mut self) {
        let (cx, cy) = (self.center.x, self.center.y);
        self.matrix = Mat4::translation(-cx, -cy, 0.0)
            .then(&Mat4::scale(self.zoom, self.zoom, 1.0))
            .then(&Mat4::rotation(0.0, 0.0, 1.0, Angle::radians(self.rotation)))
            .then(&Mat4::translation(cx, cy, 0.0));
    }
}

impl Default for View {
    fn default() -> Self {
        Self::new(point(0.0, 0.0), 0.0, 1.0)
    }
}
