//! String registry
//!
//! All segment addresses refer to strings held here. Entries are append-only:
//! a handle is issued once, is never reused, and stays valid for address
//! arithmetic even after its content has been released. Content itself is
//! mutable through [`StringStore::update`], which is the mechanism that lets
//! recoding rewrite text visible to every segmentation aliasing the handle.

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque reference to a stored string
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StringHandle(usize);

impl StringHandle {
    /// Raw index value, for display and sorting only
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for StringHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Registry mapping handles to immutable text buffers
///
/// Single-threaded by contract: callers needing cross-thread access wrap the
/// whole store in their own synchronization.
#[derive(Debug, Default)]
pub struct StringStore {
    // None marks a released (tombstoned) entry.
    entries: Vec<Option<String>>,
}

impl StringStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new string and return its handle
    pub fn register(&mut self, content: impl Into<String>) -> StringHandle {
        self.entries.push(Some(content.into()));
        StringHandle(self.entries.len() - 1)
    }

    /// Look up the content behind a handle
    pub fn get(&self, handle: StringHandle) -> Result<&str> {
        self.entries
            .get(handle.0)
            .and_then(|entry| entry.as_deref())
            .ok_or(CoreError::NotFound { handle })
    }

    /// Overwrite the content behind a live handle, keeping the handle
    pub fn update(&mut self, handle: StringHandle, content: impl Into<String>) -> Result<()> {
        match self.entries.get_mut(handle.0) {
            Some(entry) if entry.is_some() => {
                *entry = Some(content.into());
                Ok(())
            }
            _ => Err(CoreError::NotFound { handle }),
        }
    }

    /// Release a handle; subsequent `get`/`update` fail with `NotFound`
    ///
    /// The slot is tombstoned, not compacted: the handle is never reissued.
    pub fn release(&mut self, handle: StringHandle) -> Result<()> {
        match self.entries.get_mut(handle.0) {
            Some(entry) if entry.is_some() => {
                *entry = None;
                Ok(())
            }
            _ => Err(CoreError::NotFound { handle }),
        }
    }

    /// Number of handles ever issued, released ones included
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no string was ever registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Most recently issued handle, if any
    ///
    /// Segments record this at content-change time as a tie-break marker.
    pub fn last_handle(&self) -> Option<StringHandle> {
        self.entries.len().checked_sub(1).map(StringHandle)
    }
}
