//! Addressable text spans

use crate::annotation::Annotations;
use crate::error::{CoreError, Result};
use crate::segmentation::Segmentation;
use crate::store::{StringHandle, StringStore};
use serde::{Deserialize, Serialize};

/// A single addressable span over a stored string, plus annotations
///
/// Offsets are byte offsets into the referenced string. `None` bounds mean
/// "from the beginning" / "to the end". Bounds are resolved lazily against
/// the store's current content, so a segment may hold an address that is
/// temporarily invalid for its string; the error surfaces at resolution
/// time, never earlier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// Handle of the referenced string (not owned)
    pub string_handle: StringHandle,
    /// Start offset; `None` means 0
    pub start: Option<usize>,
    /// End offset; `None` means the content length
    pub end: Option<usize>,
    /// Key/value annotations
    pub annotations: Annotations,
    /// Highest store handle at the moment this segment's content last
    /// changed; tie-break bookkeeping only
    pub last_modified: Option<StringHandle>,
}

impl Segment {
    /// Create a segment with empty annotations
    pub fn new(string_handle: StringHandle, start: Option<usize>, end: Option<usize>) -> Self {
        Self {
            string_handle,
            start,
            end,
            annotations: Annotations::new(),
            last_modified: None,
        }
    }

    /// Create a segment carrying the given annotations
    pub fn with_annotations(
        string_handle: StringHandle,
        start: Option<usize>,
        end: Option<usize>,
        annotations: Annotations,
    ) -> Self {
        Self {
            string_handle,
            start,
            end,
            annotations,
            last_modified: None,
        }
    }

    /// Resolve `start`/`end` against the store's current content
    ///
    /// Fails with [`CoreError::Range`] when the resolved bounds are
    /// inverted, past the end of the content, or cut a UTF-8 code point.
    pub fn resolved_bounds(&self, store: &StringStore) -> Result<(usize, usize)> {
        let content = store.get(self.string_handle)?;
        let len = content.len();
        let start = self.start.unwrap_or(0);
        let end = self.end.unwrap_or(len);
        if start > end
            || end > len
            || !content.is_char_boundary(start)
            || !content.is_char_boundary(end)
        {
            return Err(CoreError::Range { start, end, len });
        }
        Ok((start, end))
    }

    /// Resolved address: the identity used for sorting, duplicate merging
    /// and overlap detection
    pub fn address(&self, store: &StringStore) -> Result<(StringHandle, usize, usize)> {
        let (start, end) = self.resolved_bounds(store)?;
        Ok((self.string_handle, start, end))
    }

    /// The span's text, resolved live against the store
    pub fn content<'a>(&self, store: &'a StringStore) -> Result<&'a str> {
        let (start, end) = self.resolved_bounds(store)?;
        Ok(&store.get(self.string_handle)?[start..end])
    }

    /// Copy this segment's address into a new segment
    ///
    /// With `annotations = None` the copy gets this segment's annotations
    /// when `update` is true, empty annotations otherwise. With a map given,
    /// `update` merges it over a copy of this segment's annotations (given
    /// keys win) while `update = false` replaces them entirely.
    pub fn deep_copy(&self, annotations: Option<&Annotations>, update: bool) -> Segment {
        let annotations = match (annotations, update) {
            (None, true) => self.annotations.clone(),
            (None, false) => Annotations::new(),
            (Some(given), true) => {
                let mut merged = self.annotations.clone();
                merged.extend(given.iter().map(|(k, v)| (k.clone(), v.clone())));
                merged
            }
            (Some(given), false) => given.clone(),
        };
        Segment {
            string_handle: self.string_handle,
            start: self.start,
            end: self.end,
            annotations,
            last_modified: self.last_modified,
        }
    }

    /// True iff `other` resolves to a sub-span of this segment
    ///
    /// Always false across different string handles.
    pub fn contains(&self, other: &Segment, store: &StringStore) -> Result<bool> {
        if self.string_handle != other.string_handle {
            return Ok(false);
        }
        let (self_start, self_end) = self.resolved_bounds(store)?;
        let (other_start, other_end) = other.resolved_bounds(store)?;
        Ok(other_start >= self_start && other_end <= self_end)
    }

    /// Segments of `segmentation` contained in this one, in order
    pub fn contained_segments(
        &self,
        segmentation: &Segmentation,
        store: &StringStore,
    ) -> Result<Vec<Segment>> {
        let mut contained = Vec::new();
        for segment in segmentation.iter() {
            if self.contains(segment, store)? {
                contained.push(segment.clone());
            }
        }
        Ok(contained)
    }

    /// Positions of the segments of `segmentation` contained in this one
    pub fn contained_indices(
        &self,
        segmentation: &Segmentation,
        store: &StringStore,
    ) -> Result<Vec<usize>> {
        let mut indices = Vec::new();
        for (index, segment) in segmentation.iter().enumerate() {
            if self.contains(segment, store)? {
                indices.push(index);
            }
        }
        Ok(indices)
    }

    /// Positions `i` such that this segment contains the merged span of the
    /// contiguous run `segmentation[i..i + n]`
    ///
    /// Aligns multi-segment sequences (n-grams) to a containing unit: every
    /// segment of the run must live on this segment's string and the span
    /// from the first segment's start to the last segment's end must lie
    /// inside this one.
    pub fn contained_sequence_indices(
        &self,
        segmentation: &Segmentation,
        n: usize,
        store: &StringStore,
    ) -> Result<Vec<usize>> {
        let mut indices = Vec::new();
        if n == 0 || segmentation.len() < n {
            return Ok(indices);
        }
        let (self_start, self_end) = self.resolved_bounds(store)?;
        for i in 0..=segmentation.len() - n {
            let run = &segmentation.segments()[i..i + n];
            if run.iter().any(|s| s.string_handle != self.string_handle) {
                continue;
            }
            let (run_start, _) = run[0].resolved_bounds(store)?;
            let (_, run_end) = run[n - 1].resolved_bounds(store)?;
            if run_start <= run_end && run_start >= self_start && run_end <= self_end {
                indices.push(i);
            }
        }
        Ok(indices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::AnnotationValue;
    use proptest::prelude::*;

    fn store_with(content: &str) -> (StringStore, StringHandle) {
        let mut store = StringStore::new();
        let handle = store.register(content);
        (store, handle)
    }

    #[test]
    fn none_bounds_resolve_to_full_span() {
        let (store, h) = store_with("ab cde");
        let explicit = Segment::new(h, Some(0), None);
        let implicit = Segment::new(h, None, None);
        assert_eq!(explicit.content(&store).unwrap(), "ab cde");
        assert_eq!(implicit.content(&store).unwrap(), "ab cde");
    }

    #[test]
    fn content_length_matches_bounds() {
        let (store, h) = store_with("segmented");
        let segment = Segment::new(h, Some(3), Some(7));
        let (start, end) = segment.resolved_bounds(&store).unwrap();
        assert_eq!(segment.content(&store).unwrap().len(), end - start);
        assert_eq!(segment.content(&store).unwrap(), "ment");
    }

    #[test]
    fn out_of_range_bounds_fail_at_resolution() {
        let (store, h) = store_with("abc");
        let past_end = Segment::new(h, Some(1), Some(9));
        assert_eq!(
            past_end.resolved_bounds(&store),
            Err(CoreError::Range {
                start: 1,
                end: 9,
                len: 3
            })
        );
        let inverted = Segment::new(h, Some(2), Some(1));
        assert!(matches!(
            inverted.resolved_bounds(&store),
            Err(CoreError::Range { .. })
        ));
    }

    #[test]
    fn non_char_boundary_is_a_range_error() {
        let (store, h) = store_with("é!");
        let cut = Segment::new(h, Some(1), None); // inside the two-byte é
        assert!(matches!(cut.content(&store), Err(CoreError::Range { .. })));
    }

    #[test]
    fn content_resolution_is_live() {
        let (mut store, h) = store_with("old text");
        let segment = Segment::new(h, Some(0), Some(3));
        assert_eq!(segment.content(&store).unwrap(), "old");
        store.update(h, "new text").unwrap();
        assert_eq!(segment.content(&store).unwrap(), "new");
    }

    #[test]
    fn deep_copy_annotation_semantics() {
        let (_, h) = store_with("x");
        let mut original = Segment::new(h, None, None);
        original
            .annotations
            .insert("a".into(), AnnotationValue::from("1"));

        let kept = original.deep_copy(None, true);
        assert_eq!(kept.annotations, original.annotations);

        let empty = original.deep_copy(None, false);
        assert!(empty.annotations.is_empty());

        let mut given = Annotations::new();
        given.insert("b".into(), AnnotationValue::from(1));
        let replaced = original.deep_copy(Some(&given), false);
        assert_eq!(replaced.annotations, given);

        let mut conflicting = Annotations::new();
        conflicting.insert("a".into(), AnnotationValue::from("2"));
        let merged = original.deep_copy(Some(&conflicting), true);
        assert_eq!(
            merged.annotations.get("a"),
            Some(&AnnotationValue::from("2"))
        );
    }

    #[test]
    fn deep_copy_does_not_alias_annotations() {
        let (_, h) = store_with("x");
        let mut original = Segment::new(h, None, None);
        original
            .annotations
            .insert("a".into(), AnnotationValue::from("1"));
        let mut copy = original.deep_copy(None, true);
        copy.annotations
            .insert("a".into(), AnnotationValue::from("2"));
        assert_eq!(
            original.annotations.get("a"),
            Some(&AnnotationValue::from("1"))
        );
    }

    #[test]
    fn containment_requires_same_string() {
        let mut store = StringStore::new();
        let h1 = store.register("same text");
        let h2 = store.register("same text");
        let whole = Segment::new(h1, None, None);
        let sub = Segment::new(h1, Some(2), Some(5));
        let elsewhere = Segment::new(h2, Some(2), Some(5));
        assert!(whole.contains(&sub, &store).unwrap());
        assert!(!whole.contains(&elsewhere, &store).unwrap());
        assert!(!sub.contains(&whole, &store).unwrap());
    }

    #[test]
    fn contained_indices_preserve_order() {
        let (store, h) = store_with("one two three");
        let whole = Segment::new(h, Some(0), Some(7));
        let words = Segmentation::from_segments(
            Some("words".into()),
            vec![
                Segment::new(h, Some(0), Some(3)),
                Segment::new(h, Some(4), Some(7)),
                Segment::new(h, Some(8), Some(13)),
            ],
        );
        assert_eq!(whole.contained_indices(&words, &store).unwrap(), vec![0, 1]);
        let contained = whole.contained_segments(&words, &store).unwrap();
        assert_eq!(contained.len(), 2);
        assert_eq!(contained[0].content(&store).unwrap(), "one");
        assert_eq!(contained[1].content(&store).unwrap(), "two");
    }

    #[test]
    fn sequence_indices_align_ngrams() {
        let (store, h) = store_with("one two three");
        let clause = Segment::new(h, Some(0), Some(7));
        let words = Segmentation::from_segments(
            None,
            vec![
                Segment::new(h, Some(0), Some(3)),
                Segment::new(h, Some(4), Some(7)),
                Segment::new(h, Some(8), Some(13)),
            ],
        );
        // Bigrams: only "one two" fits inside the clause.
        assert_eq!(
            clause
                .contained_sequence_indices(&words, 2, &store)
                .unwrap(),
            vec![0]
        );
        assert_eq!(
            clause
                .contained_sequence_indices(&words, 4, &store)
                .unwrap(),
            Vec::<usize>::new()
        );
    }

    proptest! {
        #[test]
        fn whole_span_contains_every_sub_span(len in 0usize..40, a in 0usize..40, b in 0usize..40) {
            let content: String = "x".repeat(len);
            let (store, h) = store_with(&content);
            let whole = Segment::new(h, None, None);
            let (start, end) = (a.min(b).min(len), a.max(b).min(len));
            let sub = Segment::new(h, Some(start), Some(end));
            prop_assert!(whole.contains(&sub, &store).unwrap());
            prop_assert_eq!(sub.content(&store).unwrap().len(), end - start);
        }
    }
}
