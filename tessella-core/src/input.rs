//! Fresh-text entry point
//!
//! Producers (file loaders, fetchers, taggers) introduce text by building an
//! [`Input`]: one newly registered string, one full-span segment. Transient
//! inputs are the producer's responsibility to release once downstream
//! segmentations no longer need the content.

use crate::error::Result;
use crate::segment::Segment;
use crate::segmentation::Segmentation;
use crate::store::{StringHandle, StringStore};
use std::ops::Deref;

/// A segmentation of exactly one full-span segment over a fresh string
#[derive(Debug, Clone)]
pub struct Input {
    segmentation: Segmentation,
    handle: StringHandle,
}

impl Input {
    /// Register `content` in the store and wrap it in a one-segment
    /// segmentation
    pub fn new(store: &mut StringStore, content: impl Into<String>, label: Option<String>) -> Self {
        let handle = store.register(content);
        let mut segment = Segment::new(handle, None, None);
        segment.last_modified = store.last_handle();
        Self {
            segmentation: Segmentation::from_segments(label, vec![segment]),
            handle,
        }
    }

    /// Handle of the backing string
    pub fn handle(&self) -> StringHandle {
        self.handle
    }

    /// Replace the backing string's content at the same handle
    ///
    /// Every segment anywhere referencing this handle immediately resolves
    /// against the new content; this aliasing is what lets recoding rewrite
    /// text for segmentations built on top of this input.
    pub fn update(&mut self, store: &mut StringStore, content: impl Into<String>) -> Result<()> {
        store.update(self.handle, content)?;
        if let Some(segment) = self.segmentation.segments.first_mut() {
            segment.last_modified = store.last_handle();
        }
        Ok(())
    }

    /// Release the backing string from the store
    pub fn release(&self, store: &mut StringStore) -> Result<()> {
        store.release(self.handle)
    }

    /// Borrow as a segmentation
    pub fn as_segmentation(&self) -> &Segmentation {
        &self.segmentation
    }

    /// Consume into the underlying segmentation
    pub fn into_segmentation(self) -> Segmentation {
        self.segmentation
    }

    /// Build an input wrapper around an already registered full-span
    /// segmentation
    ///
    /// Used by operators that rewrite an input's backing string and hand the
    /// result back as an input.
    pub fn from_parts(segmentation: Segmentation, handle: StringHandle) -> Self {
        Self {
            segmentation,
            handle,
        }
    }
}

impl Deref for Input {
    type Target = Segmentation;

    fn deref(&self) -> &Self::Target {
        &self.segmentation
    }
}

impl AsRef<Segmentation> for Input {
    fn as_ref(&self) -> &Segmentation {
        &self.segmentation
    }
}
