//! Error types for canvas2d-bridge.

use thiserror::Error;

/// Result type alias using Canvas2dError.
pub type Canvas2dResult<T> = Result<T, Canvas2dError>;

/// Errors that can occur in Canvas 2D operations.
///
/// Geometry and styling edge cases (non-finite coordinates, singular transforms,
/// unknown composite modes) are absorbed by the context and never surface here.
/// Everything in this enum is a programmer or resource error that the caller has
/// to handle.
#[derive(Debug, Error)]
pub enum Canvas2dError {
    /// Invalid canvas dimensions (must be positive and within limits).
    #[error("Invalid dimensions: width={width}, height={height}")]
    InvalidDimensions { width: u32, height: u32 },

    /// Failed to parse CSS font string.
    #[error("Failed to parse font string: {0}")]
    FontParseError(String),

    /// Failed to parse color value.
    #[error("Failed to parse color: {0}")]
    ColorParseError(String),

    /// PNG encoding error.
    #[error("PNG encoding error: {0}")]
    PngError(String),

    /// JPEG encoding error.
    #[error("JPEG encoding error: {0}")]
    JpegError(String),

    /// Invalid gradient stop offset (must be 0.0-1.0).
    #[error("Invalid gradient stop offset: {0} (must be 0.0-1.0)")]
    InvalidGradientStop(f64),

    /// Invalid argument passed to an API call.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Matrix constructed from a slice of unsupported length.
    #[error("Invalid matrix shape: expected 6, 9 or 16 elements, got {0}")]
    InvalidMatrixShape(usize),

    /// Path operation error.
    #[error("Path error: {0}")]
    PathError(String),

    /// Text rendering error.
    #[error("Text rendering error: {0}")]
    TextError(String),

    /// Linear memory could not satisfy an allocation.
    #[error("Out of linear memory: requested {requested} bytes (capacity {capacity})")]
    OutOfMemory { requested: usize, capacity: usize },

    /// Free of a pointer that is not a live allocation (unknown or already freed).
    #[error("Invalid pointer: {0:#x} is not a live allocation")]
    InvalidPointer(u32),

    /// Read or write outside of linear memory.
    #[error("Out of bounds memory access at {ptr:#x} ({len} bytes)")]
    OutOfBounds { ptr: u32, len: usize },

    /// A caller-managed buffer was used or freed after being freed.
    #[error("Managed buffer at {0:#x} was already freed")]
    BufferFreed(u32),

    /// A surface was used or disposed after disposal.
    #[error("Surface has been disposed")]
    SurfaceDisposed,

    /// An engine handle does not refer to a live native object.
    #[error("Unknown {kind} handle")]
    UnknownHandle { kind: &'static str },

    /// A draw call was issued with no surface bound.
    #[error("No surface is bound to the engine")]
    NoCurrentSurface,

    /// The engine context is already borrowed (re-entrant native call).
    #[error("Engine context is busy")]
    EngineBusy,
}

impl From<png::EncodingError> for Canvas2dError {
    fn from(err: png::EncodingError) -> Self {
        Canvas2dError::PngError(err.to_string())
    }
}

impl From<image::ImageError> for Canvas2dError {
    fn from(err: image::ImageError) -> Self {
        Canvas2dError::JpegError(err.to_string())
    }
}
