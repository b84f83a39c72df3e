//! Pattern types for Canvas 2D operations.

use crate::dom_matrix::DOMMatrix;
use crate::engine::{ImageShaderPayload, NativeContext};
use crate::error::{Canvas2dError, Canvas2dResult};
use crate::image_data::ImageData;
use crate::matrix::Matrix3;
use crate::paint::PaintSource;
use crate::shader::{NativeImage, NativeShader};
use crate::style::TileMode;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Maximum pattern size (4096x4096).
const MAX_PATTERN_SIZE: u32 = 4096;

/// Pattern repetition mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Repetition {
    /// Repeat in both directions (default).
    #[default]
    Repeat,
    /// Repeat only horizontally.
    RepeatX,
    /// Repeat only vertically.
    RepeatY,
    /// No repetition (single instance).
    NoRepeat,
}

impl Repetition {
    /// Engine tile modes along x and y.
    pub fn tile_modes(self) -> (TileMode, TileMode) {
        match self {
            Repetition::Repeat => (TileMode::Repeat, TileMode::Repeat),
            Repetition::RepeatX => (TileMode::Repeat, TileMode::Decal),
            Repetition::RepeatY => (TileMode::Decal, TileMode::Repeat),
            Repetition::NoRepeat => (TileMode::Decal, TileMode::Decal),
        }
    }
}

impl std::str::FromStr for Repetition {
    type Err = Canvas2dError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "repeat" | "" => Ok(Repetition::Repeat),
            "repeat-x" => Ok(Repetition::RepeatX),
            "repeat-y" => Ok(Repetition::RepeatY),
            "no-repeat" => Ok(Repetition::NoRepeat),
            _ => Err(Canvas2dError::InvalidArgument(format!(
                "Invalid repetition mode: '{}'",
                s
            ))),
        }
    }
}

#[derive(Debug)]
struct PatternInner {
    image: ImageData,
    repetition: Repetition,
    transform: Cell<Matrix3>,
    shader: RefCell<Option<NativeShader>>,
    native_image: RefCell<Option<NativeImage>>,
}

/// Canvas pattern for fill/stroke operations.
///
/// Clones share the image, the transform and the native objects.
#[derive(Debug, Clone)]
pub struct CanvasPattern {
    inner: Rc<PatternInner>,
}

impl CanvasPattern {
    /// Create a pattern from straight-alpha pixels.
    pub fn new(image: ImageData, repetition: Repetition) -> Canvas2dResult<Self> {
        if image.width() > MAX_PATTERN_SIZE || image.height() > MAX_PATTERN_SIZE {
            return Err(Canvas2dError::InvalidArgument(format!(
                "Pattern size {}x{} exceeds maximum {}x{}",
                image.width(),
                image.height(),
                MAX_PATTERN_SIZE,
                MAX_PATTERN_SIZE
            )));
        }
        Ok(Self {
            inner: Rc::new(PatternInner {
                image,
                repetition,
                transform: Cell::new(Matrix3::identity()),
                shader: RefCell::new(None),
                native_image: RefCell::new(None),
            }),
        })
    }

    /// Set the pattern transform matrix.
    pub fn set_transform(&self, transform: DOMMatrix) {
        self.inner.transform.set(transform.into());
    }

    /// Get the pattern transform matrix.
    pub fn transform(&self) -> DOMMatrix {
        self.inner.transform.get().into()
    }

    /// Get the pattern width.
    pub fn width(&self) -> u32 {
        self.inner.image.width()
    }

    /// Get the pattern height.
    pub fn height(&self) -> u32 {
        self.inner.image.height()
    }

    /// Get the repetition mode.
    pub fn repetition(&self) -> Repetition {
        self.inner.repetition
    }

    pub fn ptr_eq(&self, other: &CanvasPattern) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Upload the image once per engine.
    fn native_image(&self, native: &mut NativeContext) -> Canvas2dResult<crate::engine::ImageId> {
        let mut slot = self.inner.native_image.borrow_mut();
        if let Some(id) = slot
            .as_ref()
            .filter(|image| image.belongs_to(native))
            .and_then(|image| image.handle())
        {
            return Ok(id);
        }
        if let Some(old) = slot.take() {
            old.release_in(native)?;
        }
        let image = &self.inner.image;
        let pixels = image.to_premultiplied();
        let id = native.with_bytes(&pixels, |engine, ptr| {
            engine.make_image(image.width(), image.height(), ptr)
        })?;
        *slot = Some(NativeImage::new(id, native.owner()));
        Ok(id)
    }

    /// Rebuild the native image shader for `ctm` and return the paint source.
    /// `None` under a singular transform.
    pub(crate) fn materialize(
        &self,
        native: &mut NativeContext,
        ctm: &Matrix3,
        global_alpha: f32,
        quality: tiny_skia::FilterQuality,
    ) -> Canvas2dResult<Option<PaintSource>> {
        let Some(inverse) = ctm.invert() else {
            log::debug!(target: "canvas", "pattern skipped under singular transform");
            return Ok(None);
        };
        let image = self.native_image(native)?;

        if let Some(old) = self.inner.shader.borrow_mut().take() {
            old.release_in(native)?;
        }

        // Pattern space to device space, then back into the drawing's local space
        let device = ctm.multiply(&self.inner.transform.get());
        let local = inverse.multiply(&device);
        let (tile_x, tile_y) = self.inner.repetition.tile_modes();
        let local_matrix = native.stage_matrix(&local)?;
        let id = native.engine_mut().make_image_shader(&ImageShaderPayload {
            image,
            tile_x,
            tile_y,
            quality,
            opacity: global_alpha,
            local_matrix,
        })?;
        *self.inner.shader.borrow_mut() = Some(NativeShader::new(id, native.owner()));
        Ok(Some(PaintSource::Shader(id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineCall, EngineConfig, EngineHandle};
    use rstest::rstest;

    #[rstest]
    #[case("repeat", Repetition::Repeat)]
    #[case("", Repetition::Repeat)]
    #[case("repeat-x", Repetition::RepeatX)]
    #[case("repeat-y", Repetition::RepeatY)]
    #[case("no-repeat", Repetition::NoRepeat)]
    fn test_repetition_parse(#[case] input: &str, #[case] expected: Repetition) {
        assert_eq!(input.parse::<Repetition>().unwrap(), expected);
    }

    #[test]
    fn test_repetition_rejects_unknown() {
        assert!(matches!(
            "diagonal".parse::<Repetition>(),
            Err(Canvas2dError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_oversize_pattern() {
        let image = ImageData::new(MAX_PATTERN_SIZE + 1, 1).unwrap();
        assert!(CanvasPattern::new(image, Repetition::Repeat).is_err());
    }

    #[test]
    fn test_image_uploaded_once() {
        let (handle, log) = EngineHandle::recording(EngineConfig::default()).unwrap();
        let pattern =
            CanvasPattern::new(ImageData::new(2, 2).unwrap(), Repetition::RepeatX).unwrap();
        for _ in 0..3 {
            handle
                .with(|native| {
                    pattern.materialize(
                        native,
                        &Matrix3::identity(),
                        1.0,
                        tiny_skia::FilterQuality::Nearest,
                    )
                })
                .unwrap();
        }
        let calls = log.calls();
        let images = calls
            .iter()
            .filter(|c| matches!(c, EngineCall::MakeImage { .. }))
            .count();
        let deleted_shaders = calls
            .iter()
            .filter(|c| matches!(c, EngineCall::DeleteShader(_)))
            .count();
        assert_eq!(images, 1);
        assert_eq!(deleted_shaders, 2);
    }

    #[test]
    fn test_transform_shared_between_clones() {
        let pattern =
            CanvasPattern::new(ImageData::new(1, 1).unwrap(), Repetition::Repeat).unwrap();
        let other = pattern.clone();
        pattern.set_transform(DOMMatrix::new(2.0, 0.0, 0.0, 2.0, 0.0, 0.0));
        assert_eq!(other.transform().a, 2.0);
    }
}
