//! Plain geometry values and grouped parameters for drawing calls.

/// Axis-aligned rectangle stored as edges.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl Rect {
    pub const fn from_ltrb(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// From origin and size; negative sizes are normalized.
    pub fn from_xywh(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self::from_ltrb(
            x.min(x + width),
            y.min(y + height),
            x.max(x + width),
            y.max(y + height),
        )
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    pub fn is_empty(&self) -> bool {
        !(self.right > self.left && self.bottom > self.top)
    }

    pub fn is_finite(&self) -> bool {
        self.to_array().iter().all(|v| v.is_finite())
    }

    /// Half-open containment: left/top edges inside, right/bottom outside.
    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.left && x < self.right && y >= self.top && y < self.bottom
    }

    pub fn center(&self) -> (f32, f32) {
        (
            (self.left + self.right) * 0.5,
            (self.top + self.bottom) * 0.5,
        )
    }

    pub fn to_array(&self) -> [f32; 4] {
        [self.left, self.top, self.right, self.bottom]
    }

    pub fn union(&self, other: &Rect) -> Rect {
        Rect::from_ltrb(
            self.left.min(other.left),
            self.top.min(other.top),
            self.right.max(other.right),
            self.bottom.max(other.bottom),
        )
    }

    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let r = Rect::from_ltrb(
            self.left.max(other.left),
            self.top.max(other.top),
            self.right.min(other.right),
            self.bottom.min(other.bottom),
        );
        (!r.is_empty()).then_some(r)
    }

    /// Smallest integer rect covering this one.
    pub fn round_out(&self) -> IRect {
        let left = self.left.floor() as i32;
        let top = self.top.floor() as i32;
        IRect {
            x: left,
            y: top,
            width: (self.right.ceil() as i32 - left).max(0),
            height: (self.bottom.ceil() as i32 - top).max(0),
        }
    }

    pub fn to_tiny_skia(&self) -> Option<tiny_skia::Rect> {
        tiny_skia::Rect::from_ltrb(self.left, self.top, self.right, self.bottom)
    }
}

/// Integer pixel rectangle (origin + size).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl IRect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Clip to `0..width` x `0..height`.
    pub fn clip_to(&self, width: u32, height: u32) -> Option<IRect> {
        let left = self.x.max(0);
        let top = self.y.max(0);
        let right = self.x.saturating_add(self.width).min(width as i32);
        let bottom = self.y.saturating_add(self.height).min(height as i32);
        let r = IRect::new(left, top, right - left, bottom - top);
        (!r.is_empty()).then_some(r)
    }

    pub fn to_array(&self) -> [i32; 4] {
        [self.x, self.y, self.width, self.height]
    }
}

/// Circular arc parameters (`arc(x, y, r, start, end, ccw)`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArcParams {
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    /// Radians.
    pub start_angle: f32,
    /// Radians.
    pub end_angle: f32,
    pub anticlockwise: bool,
}

/// Elliptical arc parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EllipseParams {
    pub x: f32,
    pub y: f32,
    pub radius_x: f32,
    pub radius_y: f32,
    /// Rotation of the ellipse axes in radians.
    pub rotation: f32,
    pub start_angle: f32,
    pub end_angle: f32,
    pub anticlockwise: bool,
}

impl From<&ArcParams> for EllipseParams {
    fn from(arc: &ArcParams) -> Self {
        Self {
            x: arc.x,
            y: arc.y,
            radius_x: arc.radius,
            radius_y: arc.radius,
            rotation: 0.0,
            start_angle: arc.start_angle,
            end_angle: arc.end_angle,
            anticlockwise: arc.anticlockwise,
        }
    }
}

/// Tangent arc from the current point towards `(x1, y1)` then `(x2, y2)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArcToParams {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub radius: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CubicBezierParams {
    pub cp1x: f32,
    pub cp1y: f32,
    pub cp2x: f32,
    pub cp2y: f32,
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuadraticBezierParams {
    pub cpx: f32,
    pub cpy: f32,
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RectParams {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl RectParams {
    pub fn is_finite(&self) -> bool {
        [self.x, self.y, self.width, self.height]
            .iter()
            .all(|v| v.is_finite())
    }

    pub fn to_rect(&self) -> Rect {
        Rect::from_xywh(self.x, self.y, self.width, self.height)
    }
}

/// Independent horizontal and vertical corner radius.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CornerRadius {
    pub x: f32,
    pub y: f32,
}

impl CornerRadius {
    pub const fn uniform(r: f32) -> Self {
        Self { x: r, y: r }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoundRectParams {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// Top-left, top-right, bottom-right, bottom-left.
    pub radii: [CornerRadius; 4],
}

/// Source and destination rectangles for `draw_image_rect`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageCropParams {
    pub sx: f32,
    pub sy: f32,
    pub sw: f32,
    pub sh: f32,
    pub dx: f32,
    pub dy: f32,
    pub dw: f32,
    pub dh: f32,
}

impl ImageCropParams {
    pub fn is_finite(&self) -> bool {
        [
            self.sx, self.sy, self.sw, self.sh, self.dx, self.dy, self.dw, self.dh,
        ]
        .iter()
        .all(|v| v.is_finite())
    }
}

/// Region of an `ImageData` to copy in `put_image_data_dirty`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirtyRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// Two-circle radial gradient geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadialGradientParams {
    pub x0: f32,
    pub y0: f32,
    pub r0: f32,
    pub x1: f32,
    pub y1: f32,
    pub r1: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_from_negative_size() {
        let r = Rect::from_xywh(10.0, 10.0, -4.0, 6.0);
        assert_eq!(r, Rect::from_ltrb(6.0, 10.0, 10.0, 16.0));
        assert_eq!(r.width(), 4.0);
        assert!(r.contains(6.0, 10.0));
        assert!(!r.contains(10.0, 10.0));
    }

    #[test]
    fn test_rect_intersection() {
        let a = Rect::from_ltrb(0.0, 0.0, 10.0, 10.0);
        let b = Rect::from_ltrb(5.0, 5.0, 20.0, 20.0);
        assert_eq!(a.intersect(&b), Some(Rect::from_ltrb(5.0, 5.0, 10.0, 10.0)));
        assert_eq!(a.intersect(&Rect::from_ltrb(11.0, 0.0, 12.0, 1.0)), None);
        assert_eq!(a.union(&b), Rect::from_ltrb(0.0, 0.0, 20.0, 20.0));
    }

    #[test]
    fn test_round_out_and_clip() {
        let r = Rect::from_ltrb(-1.5, 0.2, 3.1, 2.0).round_out();
        assert_eq!(r, IRect::new(-2, 0, 6, 2));
        assert_eq!(r.clip_to(3, 3), Some(IRect::new(0, 0, 3, 2)));
        assert_eq!(IRect::new(5, 5, 2, 2).clip_to(3, 3), None);
    }
}
