//! Path building operations for Canvas2dContext.
//!
//! Verbs land in the tracker's path in the coordinates of the current transform.
//! Non-finite coordinates are dropped by [`Path`](crate::path::Path) itself.

use super::Canvas2dContext;
use crate::error::Canvas2dResult;
use crate::geometry::{
    ArcParams, ArcToParams, CubicBezierParams, EllipseParams, QuadraticBezierParams, RectParams,
    RoundRectParams,
};
use crate::path::Path;

impl Canvas2dContext {
    /// Begin a new path.
    pub fn begin_path(&mut self) {
        log::debug!(target: "canvas", "beginPath");
        self.path.reset(&self.state.transform);
    }

    pub fn move_to(&mut self, x: f32, y: f32) {
        log::trace!(target: "canvas", "moveTo {} {}", x, y);
        self.edit_path(|path| path.move_to(x, y));
    }

    pub fn line_to(&mut self, x: f32, y: f32) {
        log::trace!(target: "canvas", "lineTo {} {}", x, y);
        self.edit_path(|path| path.line_to(x, y));
    }

    pub fn quadratic_curve_to(&mut self, params: &QuadraticBezierParams) {
        self.edit_path(|path| path.quadratic_curve_to(params));
    }

    pub fn bezier_curve_to(&mut self, params: &CubicBezierParams) {
        self.edit_path(|path| path.bezier_curve_to(params));
    }

    /// Add a circular arc. A negative radius is an error.
    pub fn arc(&mut self, params: &ArcParams) -> Canvas2dResult<()> {
        log::debug!(target: "canvas", "arc {:?}", params);
        self.try_edit_path(|path| path.arc(params))
    }

    /// Add an arc tangent to the lines towards `(x1, y1)` and `(x2, y2)`.
    pub fn arc_to(&mut self, params: &ArcToParams) -> Canvas2dResult<()> {
        log::debug!(target: "canvas", "arcTo {:?}", params);
        self.try_edit_path(|path| path.arc_to(params))
    }

    pub fn ellipse(&mut self, params: &EllipseParams) -> Canvas2dResult<()> {
        log::debug!(target: "canvas", "ellipse {:?}", params);
        self.try_edit_path(|path| path.ellipse(params))
    }

    pub fn rect(&mut self, params: &RectParams) {
        self.edit_path(|path| path.rect(params));
    }

    pub fn round_rect(&mut self, params: &RoundRectParams) -> Canvas2dResult<()> {
        self.try_edit_path(|path| path.round_rect(params))
    }

    pub fn close_path(&mut self) {
        self.edit_path(Path::close);
    }

    /// The current path in the coordinates of the current transform.
    pub fn current_path(&self) -> &Path {
        self.path.path()
    }

    fn edit_path(&mut self, f: impl FnOnce(&mut Path)) {
        self.path.edit(&self.state.transform, f);
    }

    fn try_edit_path(
        &mut self,
        f: impl FnOnce(&mut Path) -> Canvas2dResult<()>,
    ) -> Canvas2dResult<()> {
        self.path
            .edit(&self.state.transform, f)
            .unwrap_or(Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use crate::error::Canvas2dError;
    use crate::font_config::FontConfig;
    use crate::geometry::{ArcParams, RectParams};
    use crate::Canvas2dContext;

    fn context() -> Canvas2dContext {
        Canvas2dContext::with_config(40, 40, FontConfig::empty()).unwrap()
    }

    #[test]
    fn test_line_to_on_empty_path_starts_subpath() {
        let mut ctx = context();
        ctx.line_to(3.0, 4.0);
        let mut expected = crate::path::Path::new();
        expected.move_to(3.0, 4.0);
        expected.line_to(3.0, 4.0);
        assert_eq!(ctx.current_path(), &expected);
    }

    #[test]
    fn test_non_finite_verbs_are_dropped() {
        let mut ctx = context();
        ctx.move_to(1.0, 1.0);
        ctx.line_to(f32::NAN, 0.0);
        ctx.line_to(2.0, f32::INFINITY);
        assert_eq!(ctx.current_path().verb_count(), 1);
    }

    #[test]
    fn test_negative_arc_radius_is_error() {
        let mut ctx = context();
        let result = ctx.arc(&ArcParams {
            x: 10.0,
            y: 10.0,
            radius: -1.0,
            start_angle: 0.0,
            end_angle: 1.0,
            anticlockwise: false,
        });
        assert!(matches!(result, Err(Canvas2dError::InvalidArgument(_))));
    }

    #[test]
    fn test_begin_path_clears() {
        let mut ctx = context();
        ctx.rect(&RectParams {
            x: 0.0,
            y: 0.0,
            width: 5.0,
            height: 5.0,
        });
        assert!(!ctx.current_path().is_empty());
        ctx.begin_path();
        assert!(ctx.current_path().is_empty());
    }
}
