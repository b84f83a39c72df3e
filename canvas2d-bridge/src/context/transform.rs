//! Transform operations for Canvas2dContext.
//!
//! The engine matrix always mirrors `state.transform`; the open path is
//! re-expressed after every change so it stays fixed in device space.

use super::Canvas2dContext;
use crate::dom_matrix::DOMMatrix;
use crate::error::Canvas2dResult;
use crate::matrix::Matrix3;

impl Canvas2dContext {
    pub fn translate(&mut self, x: f32, y: f32) -> Canvas2dResult<()> {
        log::debug!(target: "canvas", "translate {} {}", x, y);
        self.concat_transform(Matrix3::translate(x, y))
    }

    /// Rotate by `angle` radians.
    pub fn rotate(&mut self, angle: f32) -> Canvas2dResult<()> {
        log::debug!(target: "canvas", "rotate {}", angle);
        self.concat_transform(Matrix3::rotate(angle))
    }

    pub fn scale(&mut self, x: f32, y: f32) -> Canvas2dResult<()> {
        log::debug!(target: "canvas", "scale {} {}", x, y);
        self.concat_transform(Matrix3::scale(x, y))
    }

    /// Skew by factors: `x += kx * y`, `y += ky * x`.
    pub fn skew(&mut self, kx: f32, ky: f32) -> Canvas2dResult<()> {
        log::debug!(target: "canvas", "skew {} {}", kx, ky);
        self.concat_transform(Matrix3::skew(kx, ky))
    }

    /// Multiply the current transform by `[a c e; b d f]`.
    pub fn transform(
        &mut self,
        a: f32,
        b: f32,
        c: f32,
        d: f32,
        e: f32,
        f: f32,
    ) -> Canvas2dResult<()> {
        log::debug!(target: "canvas", "transform {} {} {} {} {} {}", a, b, c, d, e, f);
        self.concat_transform(Matrix3::from_canvas(a, b, c, d, e, f))
    }

    /// Replace the current transform.
    pub fn set_transform(&mut self, matrix: DOMMatrix) -> Canvas2dResult<()> {
        log::debug!(target: "canvas", "setTransform {:?}", matrix);
        if !matrix.is_finite() {
            return Ok(());
        }
        self.replace_transform(matrix.into())
    }

    pub fn reset_transform(&mut self) -> Canvas2dResult<()> {
        log::debug!(target: "canvas", "resetTransform");
        self.replace_transform(Matrix3::identity())
    }

    pub fn get_transform(&self) -> DOMMatrix {
        self.state.transform.into()
    }

    fn concat_transform(&mut self, delta: Matrix3) -> Canvas2dResult<()> {
        if !delta.is_finite() {
            log::debug!(target: "canvas", "ignoring non-finite transform");
            return Ok(());
        }
        self.surface.with_bound(|native| native.concat(&delta))?;
        self.state.transform = self.state.transform.multiply(&delta);
        self.path.retarget(&self.state.transform);
        Ok(())
    }

    fn replace_transform(&mut self, matrix: Matrix3) -> Canvas2dResult<()> {
        self.surface.with_bound(|native| native.set_matrix(&matrix))?;
        self.state.transform = matrix;
        self.path.retarget(&self.state.transform);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::font_config::FontConfig;
    use crate::Canvas2dContext;

    fn context() -> Canvas2dContext {
        Canvas2dContext::with_config(20, 20, FontConfig::empty()).unwrap()
    }

    #[test]
    fn test_transform_composes_right_to_left() {
        let mut ctx = context();
        ctx.translate(10.0, 0.0).unwrap();
        ctx.scale(2.0, 2.0).unwrap();
        let t = ctx.get_transform();
        // Scale applies to points first, then the translation
        assert_eq!((t.a, t.d, t.e, t.f), (2.0, 2.0, 10.0, 0.0));
    }

    #[test]
    fn test_non_finite_arguments_are_ignored() {
        let mut ctx = context();
        ctx.translate(f32::NAN, 1.0).unwrap();
        ctx.scale(f32::INFINITY, 1.0).unwrap();
        ctx.transform(1.0, 0.0, 0.0, 1.0, f32::NAN, 0.0).unwrap();
        ctx.set_transform(crate::DOMMatrix::new(f32::NAN, 0.0, 0.0, 1.0, 0.0, 0.0))
            .unwrap();
        assert!(ctx.get_transform().is_identity());
    }

    #[test]
    fn test_open_path_stays_in_device_space() {
        let mut ctx = context();
        ctx.move_to(2.0, 2.0);
        ctx.scale(2.0, 2.0).unwrap();
        ctx.line_to(5.0, 5.0);
        let device = ctx.path.device_path();
        let points: Vec<(f32, f32)> = device.points().iter().map(|p| (p.x, p.y)).collect();
        assert_eq!(points, vec![(2.0, 2.0), (10.0, 10.0)]);
    }

    #[test]
    fn test_engine_matrix_tracks_state() {
        let mut ctx = context();
        ctx.translate(3.0, 4.0).unwrap();
        ctx.skew(0.5, 0.0).unwrap();
        ctx.set_transform(crate::DOMMatrix::new(2.0, 0.0, 0.0, 2.0, 1.0, 1.0))
            .unwrap();
        let engine = ctx
            .engine()
            .with(|native| native.engine().total_matrix())
            .unwrap();
        assert_eq!(engine, ctx.state.transform);
    }
}
