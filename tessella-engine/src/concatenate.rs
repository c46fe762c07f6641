//! Segmentation union and defensive copying

use crate::error::Result;
use crate::merge::{auto_number, merge_duplicate_segments, sort_by_address};
use tessella_core::progress::tick;
use tessella_core::{Progress, Segment, Segmentation, StringStore};
use tracing::debug;

/// Options for [`concatenate`]
#[derive(Debug, Clone)]
pub struct ConcatenateOptions {
    /// Copy each segment's annotations into the output (default true)
    pub copy_annotations: bool,
    /// Reorder the output by ascending resolved address
    pub sort: bool,
    /// Collapse segments with identical resolved addresses; annotation
    /// conflicts resolve later-input-wins
    pub merge_duplicates: bool,
    /// Assign 1-based ordinals into this annotation key across the output
    pub auto_number_as: Option<String>,
    /// Label of the output segmentation
    pub label: Option<String>,
}

impl Default for ConcatenateOptions {
    fn default() -> Self {
        Self {
            copy_annotations: true,
            sort: false,
            merge_duplicates: false,
            auto_number_as: None,
            label: None,
        }
    }
}

/// Ordered union of several segmentations
///
/// Segments appear in input order, then within-segmentation order, each
/// defensively deep-copied. The progress hook is advanced once per output
/// segment, plus the merge and autonumber bookkeeping documented on
/// [`merge_duplicate_segments`] and [`auto_number`] when those options are
/// set.
pub fn concatenate(
    store: &StringStore,
    segmentations: &[&Segmentation],
    options: &ConcatenateOptions,
    mut progress: Option<&mut dyn Progress>,
) -> Result<Segmentation> {
    debug!(
        inputs = segmentations.len(),
        sort = options.sort,
        merge_duplicates = options.merge_duplicates,
        "concatenate"
    );
    let mut output: Vec<Segment> = Vec::new();
    for segmentation in segmentations {
        for segment in segmentation.iter() {
            output.push(segment.deep_copy(None, options.copy_annotations));
            tick(&mut progress);
        }
    }
    if options.sort {
        sort_by_address(store, &mut output)?;
    }
    if options.merge_duplicates {
        output = merge_duplicate_segments(store, output, progress.as_deref_mut())?;
    }
    if let Some(key) = &options.auto_number_as {
        auto_number(&mut output, key, progress.as_deref_mut());
    }
    Ok(Segmentation::from_segments(options.label.clone(), output))
}

/// Full defensive deep copy of a segmentation
///
/// Identical addresses and content, distinct segment values and annotation
/// maps; used when a consumer requires guaranteed non-aliased segments.
pub fn bypass(segmentation: &Segmentation) -> Segmentation {
    Segmentation::from_segments(
        segmentation.label.clone(),
        segmentation
            .iter()
            .map(|segment| segment.deep_copy(None, true))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessella_core::{AnnotationValue, Annotations, StringHandle};

    fn word_segmentation(store: &mut StringStore) -> (StringHandle, Segmentation) {
        let h = store.register("ab cde");
        let segmentation = Segmentation::from_segments(
            Some("words".into()),
            vec![
                Segment::new(h, Some(0), Some(2)),
                Segment::new(h, Some(3), Some(6)),
            ],
        );
        (h, segmentation)
    }

    #[test]
    fn union_preserves_input_then_segment_order() {
        let mut store = StringStore::new();
        let (_, first) = word_segmentation(&mut store);
        let (_, second) = word_segmentation(&mut store);
        let output = concatenate(
            &store,
            &[&first, &second],
            &ConcatenateOptions::default(),
            None,
        )
        .unwrap();
        let contents: Vec<&str> = output
            .iter()
            .map(|s| s.content(&store).unwrap())
            .collect();
        assert_eq!(contents, vec!["ab", "cde", "ab", "cde"]);
    }

    #[test]
    fn sort_reorders_by_address() {
        let mut store = StringStore::new();
        let h = store.register("abcd");
        let unordered = Segmentation::from_segments(
            None,
            vec![
                Segment::new(h, Some(2), Some(4)),
                Segment::new(h, Some(0), Some(2)),
            ],
        );
        let options = ConcatenateOptions {
            sort: true,
            ..Default::default()
        };
        let output = concatenate(&store, &[&unordered], &options, None).unwrap();
        assert_eq!(output[0].start, Some(0));
        assert_eq!(output[1].start, Some(2));
    }

    #[test]
    fn merge_duplicates_is_later_input_wins() {
        let mut store = StringStore::new();
        let h = store.register("ab");
        let mut early = Annotations::new();
        early.insert("k".into(), AnnotationValue::from("early"));
        let mut late = Annotations::new();
        late.insert("k".into(), AnnotationValue::from("late"));
        let first = Segmentation::from_segments(
            None,
            vec![Segment::with_annotations(h, Some(0), Some(2), early)],
        );
        let second = Segmentation::from_segments(
            None,
            vec![Segment::with_annotations(h, Some(0), Some(2), late)],
        );
        let options = ConcatenateOptions {
            merge_duplicates: true,
            ..Default::default()
        };
        let output = concatenate(&store, &[&first, &second], &options, None).unwrap();
        assert_eq!(output.len(), 1);
        assert_eq!(
            output[0].annotations.get("k"),
            Some(&AnnotationValue::from("late"))
        );
    }

    #[test]
    fn autonumber_runs_in_final_order() {
        let mut store = StringStore::new();
        let (_, words) = word_segmentation(&mut store);
        let options = ConcatenateOptions {
            auto_number_as: Some("num".into()),
            ..Default::default()
        };
        let output = concatenate(&store, &[&words], &options, None).unwrap();
        assert_eq!(output[0].annotations.get("num"), Some(&AnnotationValue::Number(1)));
        assert_eq!(output[1].annotations.get("num"), Some(&AnnotationValue::Number(2)));
    }

    #[test]
    fn copy_annotations_false_drops_them() {
        let mut store = StringStore::new();
        let h = store.register("ab");
        let mut annotations = Annotations::new();
        annotations.insert("k".into(), AnnotationValue::from("v"));
        let input = Segmentation::from_segments(
            None,
            vec![Segment::with_annotations(h, None, None, annotations)],
        );
        let options = ConcatenateOptions {
            copy_annotations: false,
            ..Default::default()
        };
        let output = concatenate(&store, &[&input], &options, None).unwrap();
        assert!(output[0].annotations.is_empty());
    }

    #[test]
    fn bypass_round_trip_has_same_contents_without_aliasing() {
        let mut store = StringStore::new();
        let h = store.register("ab cde");
        let mut annotations = Annotations::new();
        annotations.insert("k".into(), AnnotationValue::from("v"));
        let words = Segmentation::from_segments(
            Some("words".into()),
            vec![
                Segment::with_annotations(h, Some(0), Some(2), annotations),
                Segment::new(h, Some(3), Some(6)),
            ],
        );
        let copy = bypass(&words);
        let round_trip =
            concatenate(&store, &[&copy], &ConcatenateOptions::default(), None).unwrap();
        let original: Vec<&str> = words.iter().map(|s| s.content(&store).unwrap()).collect();
        let copied: Vec<&str> = round_trip
            .iter()
            .map(|s| s.content(&store).unwrap())
            .collect();
        assert_eq!(original, copied);

        // Mutating the copy must not leak into the original.
        let mut copied_segments = round_trip.into_segments();
        copied_segments[0]
            .annotations
            .insert("k".into(), AnnotationValue::from("changed"));
        assert_eq!(
            words[0].annotations.get("k"),
            Some(&AnnotationValue::from("v"))
        );
    }

    #[test]
    fn progress_called_once_per_output_segment() {
        let mut store = StringStore::new();
        let (_, words) = word_segmentation(&mut store);
        let mut calls = 0usize;
        let mut hook = || calls += 1;
        concatenate(
            &store,
            &[&words, &words],
            &ConcatenateOptions::default(),
            Some(&mut hook),
        )
        .unwrap();
        assert_eq!(calls, 4);
    }
}
