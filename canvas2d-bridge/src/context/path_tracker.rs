//! The context's current path, kept in the coordinates of the current transform.
//!
//! Canvas path verbs are fixed in device space at the moment they are issued,
//! while the engine draws under the current matrix. The tracker stores the path
//! in the logical space of a basis transform and re-expresses it whenever the
//! transform changes, so drawing the path under the current matrix lands on the
//! original device positions.

use crate::matrix::Matrix3;
use crate::path::Path;

#[derive(Debug, Clone, Default)]
pub struct LogicalPathTracker {
    path: Path,
    basis: Matrix3,
}

impl LogicalPathTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// The path in the coordinates of [`LogicalPathTracker::basis`].
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn basis(&self) -> Matrix3 {
        self.basis
    }

    /// Whether the path is expressed in `ctm`'s coordinates.
    pub fn is_current(&self, ctm: &Matrix3) -> bool {
        self.basis == *ctm
    }

    /// The path in device coordinates.
    pub fn device_path(&self) -> Path {
        self.path.transformed(&self.basis)
    }

    /// Re-express the path in `ctm`'s coordinates. A singular `ctm` leaves the
    /// path in its last invertible basis.
    pub fn retarget(&mut self, ctm: &Matrix3) {
        if self.basis == *ctm {
            return;
        }
        let Some(inverse) = ctm.invert() else {
            return;
        };
        if !self.path.is_empty() {
            self.path.transform(&inverse.multiply(&self.basis));
        }
        self.basis = *ctm;
    }

    /// Apply a path edit issued under `ctm`. Ignored while `ctm` is singular.
    pub fn edit<R>(&mut self, ctm: &Matrix3, f: impl FnOnce(&mut Path) -> R) -> Option<R> {
        self.retarget(ctm);
        if !self.is_current(ctm) {
            log::debug!(target: "canvas", "path edit ignored under singular transform");
            return None;
        }
        Some(f(&mut self.path))
    }

    /// Start a new, empty path.
    pub fn reset(&mut self, ctm: &Matrix3) {
        self.path.reset();
        if ctm.invert().is_some() {
            self.basis = *ctm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn device_points(tracker: &LogicalPathTracker) -> Vec<(f32, f32)> {
        tracker
            .device_path()
            .points()
            .iter()
            .map(|p| (p.x, p.y))
            .collect()
    }

    fn assert_close(a: &[(f32, f32)], b: &[(f32, f32)]) {
        assert_eq!(a.len(), b.len());
        for (p, q) in a.iter().zip(b) {
            assert!((p.0 - q.0).abs() < 1e-3 && (p.1 - q.1).abs() < 1e-3, "{:?} != {:?}", a, b);
        }
    }

    #[rstest]
    #[case(Matrix3::translate(5.0, -3.0))]
    #[case(Matrix3::scale(2.0, 0.5))]
    #[case(Matrix3::rotate(0.7))]
    #[case(Matrix3::skew(0.3, 0.1))]
    fn test_device_points_stable_across_transforms(#[case] next: Matrix3) {
        let mut tracker = LogicalPathTracker::new();
        let ctm = Matrix3::translate(10.0, 10.0);
        tracker.edit(&ctm, |p| {
            p.move_to(0.0, 0.0);
            p.line_to(4.0, 0.0);
        });
        let before = device_points(&tracker);
        assert_close(&before, &[(10.0, 10.0), (14.0, 10.0)]);

        let moved = ctm.multiply(&next);
        tracker.retarget(&moved);
        assert_eq!(tracker.basis(), moved);
        assert_close(&device_points(&tracker), &before);

        tracker.retarget(&ctm);
        assert_close(&device_points(&tracker), &before);
    }

    #[test]
    fn test_edits_under_singular_transform_are_ignored() {
        let mut tracker = LogicalPathTracker::new();
        tracker.edit(&Matrix3::identity(), |p| p.move_to(1.0, 1.0));
        let singular = Matrix3::scale(0.0, 1.0);
        assert_eq!(tracker.edit(&singular, |p| p.line_to(5.0, 5.0)), None);
        assert_eq!(tracker.path().verb_count(), 1);
        assert_eq!(tracker.basis(), Matrix3::identity());

        // Edits resume in the next invertible basis
        let scaled = Matrix3::scale(2.0, 2.0);
        tracker.edit(&scaled, |p| p.line_to(5.0, 5.0));
        assert_close(&device_points(&tracker), &[(1.0, 1.0), (10.0, 10.0)]);
    }

    #[test]
    fn test_reset_clears_and_adopts_basis() {
        let mut tracker = LogicalPathTracker::new();
        tracker.edit(&Matrix3::identity(), |p| p.move_to(1.0, 1.0));
        let ctm = Matrix3::translate(3.0, 3.0);
        tracker.reset(&ctm);
        assert!(tracker.path().is_empty());
        assert!(tracker.is_current(&ctm));
    }
}
