//! Owned native shader and image handles.
//!
//! A [`NativeHandle`] deletes its engine object exactly once. Code that already
//! holds the engine borrow releases handles with [`NativeHandle::release_in`];
//! `Drop` covers everything else and can only run while the engine is not
//! borrowed, so a handle dropped inside a native call is logged as leaked.

use crate::engine::{Handle, HandleKind, ImageKind, NativeContext, RasterEngine, ShaderKind};
use crate::error::Canvas2dResult;
use std::cell::RefCell;
use std::fmt;
use std::rc::Weak;

/// Engine objects that an owned handle can delete.
pub trait NativeKind: HandleKind {
    fn delete(engine: &mut dyn RasterEngine, handle: Handle<Self>) -> Canvas2dResult<()>
    where
        Self: Sized;
}

impl NativeKind for ShaderKind {
    fn delete(engine: &mut dyn RasterEngine, handle: Handle<Self>) -> Canvas2dResult<()> {
        engine.delete_shader(handle)
    }
}

impl NativeKind for ImageKind {
    fn delete(engine: &mut dyn RasterEngine, handle: Handle<Self>) -> Canvas2dResult<()> {
        engine.delete_image(handle)
    }
}

pub struct NativeHandle<K: NativeKind> {
    handle: Option<Handle<K>>,
    owner: Weak<RefCell<NativeContext>>,
}

/// Owned native shader.
pub type NativeShader = NativeHandle<ShaderKind>;
/// Owned native image.
pub type NativeImage = NativeHandle<ImageKind>;

impl<K: NativeKind> fmt::Debug for NativeHandle<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NativeHandle").field(&self.handle).finish()
    }
}

impl<K: NativeKind> NativeHandle<K> {
    pub(crate) fn new(handle: Handle<K>, owner: Weak<RefCell<NativeContext>>) -> Self {
        Self {
            handle: Some(handle),
            owner,
        }
    }

    pub fn handle(&self) -> Option<Handle<K>> {
        self.handle
    }

    pub(crate) fn belongs_to(&self, native: &NativeContext) -> bool {
        native.is_owned_by(&self.owner)
    }

    /// Delete the native object through an engine borrow the caller already holds.
    /// A handle from a different engine is released through its own engine.
    pub(crate) fn release_in(mut self, native: &mut NativeContext) -> Canvas2dResult<()> {
        if !self.belongs_to(native) {
            return Ok(());
        }
        match self.handle.take() {
            Some(handle) => K::delete(native.engine_mut(), handle),
            None => Ok(()),
        }
    }
}

impl<K: NativeKind> Drop for NativeHandle<K> {
    fn drop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        let Some(cell) = self.owner.upgrade() else {
            // The engine is gone and took its objects with it
            return;
        };
        match cell.try_borrow_mut() {
            Ok(mut native) => {
                if let Err(err) = K::delete(native.engine_mut(), handle) {
                    log::warn!(target: "canvas::engine", "failed to delete {}: {}", K::NAME, err);
                }
            }
            Err(_) => {
                log::warn!(
                    target: "canvas::engine",
                    "leaked {} {:?}: engine busy during drop",
                    K::NAME,
                    handle.index()
                );
            }
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineCall, EngineConfig, EngineHandle};

    fn make_image(handle: &EngineHandle) -> NativeImage {
        handle
            .with(|native| {
                let id = native
                    .with_bytes(&[0, 0, 0, 0], |engine, ptr| engine.make_image(1, 1, ptr))?;
                Ok(NativeImage::new(id, native.owner()))
            })
            .unwrap()
    }

    #[test]
    fn test_drop_deletes_native_object() {
        let (handle, log) = EngineHandle::recording(EngineConfig::default()).unwrap();
        let image = make_image(&handle);
        let id = image.handle().unwrap();
        drop(image);
        assert_eq!(log.calls().last(), Some(&EngineCall::DeleteImage(id)));
    }

    #[test]
    fn test_release_in_runs_once() {
        let (handle, log) = EngineHandle::recording(EngineConfig::default()).unwrap();
        let image = make_image(&handle);
        handle.with(|native| image.release_in(native)).unwrap();
        let deletes = log
            .calls()
            .iter()
            .filter(|c| matches!(c, EngineCall::DeleteImage(_)))
            .count();
        assert_eq!(deletes, 1);
    }

    #[test]
    fn test_drop_while_busy_is_leaked_not_panicking() {
        let (handle, log) = EngineHandle::recording(EngineConfig::default()).unwrap();
        let image = make_image(&handle);
        handle
            .with(|_native| {
                drop(image);
                Ok(())
            })
            .unwrap();
        assert!(!log
            .calls()
            .iter()
            .any(|c| matches!(c, EngineCall::DeleteImage(_))));
    }
}
