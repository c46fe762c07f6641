//! Ordered segment containers

use crate::error::Result;
use crate::segment::Segment;
use crate::store::{StringHandle, StringStore};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::ops::Index;
use std::slice::SliceIndex;

/// Ordered sequence of segments with a display label
///
/// Order is construction order (or an explicit sort requested from an
/// operator), never implicit address order. The virtual-reference counter is
/// lifecycle bookkeeping for embedding applications; the core only exposes
/// the hooks and attaches no meaning to the count.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Segmentation {
    /// Display name
    pub label: Option<String>,
    pub(crate) segments: Vec<Segment>,
    #[serde(skip)]
    virtual_refs: usize,
}

impl Segmentation {
    /// Create an empty segmentation
    pub fn new(label: Option<String>) -> Self {
        Self {
            label,
            segments: Vec::new(),
            virtual_refs: 0,
        }
    }

    /// Create a segmentation from existing segments
    pub fn from_segments(label: Option<String>, segments: Vec<Segment>) -> Self {
        Self {
            label,
            segments,
            virtual_refs: 0,
        }
    }

    /// Append a segment
    pub fn push(&mut self, segment: Segment) {
        self.segments.push(segment);
    }

    /// Number of segments
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// True if there are no segments
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Segment at `index`, if any
    pub fn get(&self, index: usize) -> Option<&Segment> {
        self.segments.get(index)
    }

    /// Ordered iteration
    pub fn iter(&self) -> std::slice::Iter<'_, Segment> {
        self.segments.iter()
    }

    /// Read-only view of the underlying segments
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Consume into the underlying segments
    pub fn into_segments(self) -> Vec<Segment> {
        self.segments
    }

    /// Union of annotation keys over all segments
    pub fn annotation_keys(&self) -> BTreeSet<String> {
        self.segments
            .iter()
            .flat_map(|segment| segment.annotations.keys().cloned())
            .collect()
    }

    /// True iff no two segments sharing a string intersect
    ///
    /// Adjacency (`end1 == start2`) is not an overlap; segments on different
    /// strings never overlap. Recoding requires this predicate to hold, since
    /// rewriting overlapping spans would apply twice to shared text.
    pub fn is_non_overlapping(&self, store: &StringStore) -> Result<bool> {
        let mut spans: HashMap<StringHandle, Vec<(usize, usize)>> = HashMap::new();
        for segment in &self.segments {
            let (handle, start, end) = segment.address(store)?;
            spans.entry(handle).or_default().push((start, end));
        }
        for per_string in spans.values_mut() {
            per_string.sort_unstable();
            for pair in per_string.windows(2) {
                if pair[1].0 < pair[0].1 {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    /// Increment the virtual-reference counter
    pub fn acquire_ref(&mut self) {
        self.virtual_refs += 1;
    }

    /// Decrement the virtual-reference counter
    pub fn release_ref(&mut self) {
        self.virtual_refs = self.virtual_refs.saturating_sub(1);
    }

    /// Current virtual-reference count
    pub fn ref_count(&self) -> usize {
        self.virtual_refs
    }
}

impl<I> Index<I> for Segmentation
where
    I: SliceIndex<[Segment]>,
{
    type Output = I::Output;

    fn index(&self, index: I) -> &Self::Output {
        &self.segments[index]
    }
}

impl<'a> IntoIterator for &'a Segmentation {
    type Item = &'a Segment;
    type IntoIter = std::slice::Iter<'a, Segment>;

    fn into_iter(self) -> Self::IntoIter {
        self.segments.iter()
    }
}

impl FromIterator<Segment> for Segmentation {
    fn from_iter<T: IntoIterator<Item = Segment>>(iter: T) -> Self {
        Segmentation::from_segments(None, iter.into_iter().collect())
    }
}
