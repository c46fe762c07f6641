//! Filtering operators: select, threshold, intersect
//!
//! All three split the input into a kept/discarded pair, preserving the
//! relative order of both subsets. Autonumbering applies to the kept
//! output, in its final order.

use crate::error::{EngineError, Result};
use crate::merge::auto_number;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use tessella_core::progress::tick;
use tessella_core::{Progress, Segment, Segmentation, StringStore};
use tracing::debug;

/// Whether matching segments are kept or dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterMode {
    /// Keep matching segments in the first output
    #[default]
    Include,
    /// Keep non-matching segments in the first output
    Exclude,
}

impl FromStr for FilterMode {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "include" => Ok(FilterMode::Include),
            "exclude" => Ok(FilterMode::Exclude),
            other => Err(EngineError::Config(format!("unknown filter mode '{other}'"))),
        }
    }
}

impl fmt::Display for FilterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterMode::Include => write!(f, "include"),
            FilterMode::Exclude => write!(f, "exclude"),
        }
    }
}

/// Kept/discarded output pair of a filtering operator
#[derive(Debug, Clone, Default)]
pub struct Filtered {
    /// Segments satisfying the filter
    pub kept: Segmentation,
    /// The exact complement, in original order
    pub discarded: Segmentation,
}

/// Options for [`select`]
#[derive(Debug, Clone)]
pub struct SelectOptions {
    /// Keep or drop matching segments
    pub mode: FilterMode,
    /// Test the annotation value under this key instead of the content;
    /// segments lacking the key never match
    pub annotation_key: Option<String>,
    /// Copy annotations into the outputs (default true)
    pub copy_annotations: bool,
    /// Assign 1-based ordinals into this key across the kept output
    pub auto_number_as: Option<String>,
    /// Label of the kept output
    pub label: Option<String>,
}

impl Default for SelectOptions {
    fn default() -> Self {
        Self {
            mode: FilterMode::Include,
            annotation_key: None,
            copy_annotations: true,
            auto_number_as: None,
            label: None,
        }
    }
}

/// Filter segments by regex search
///
/// The pattern is searched (not anchored) in each segment's content, or in
/// the annotation value under `annotation_key` when given. The progress
/// hook is advanced once per input segment.
pub fn select(
    store: &StringStore,
    segmentation: &Segmentation,
    pattern: &Regex,
    options: &SelectOptions,
    mut progress: Option<&mut dyn Progress>,
) -> Result<Filtered> {
    debug!(
        segments = segmentation.len(),
        mode = %options.mode,
        "select"
    );
    let mut kept: Vec<Segment> = Vec::new();
    let mut discarded: Vec<Segment> = Vec::new();
    for segment in segmentation.iter() {
        let matches = match &options.annotation_key {
            Some(key) => segment
                .annotations
                .get(key)
                .is_some_and(|value| pattern.is_match(&value.render())),
            None => pattern.is_match(segment.content(store)?),
        };
        let keep = matches == (options.mode == FilterMode::Include);
        let copy = segment.deep_copy(None, options.copy_annotations);
        if keep {
            kept.push(copy);
        } else {
            discarded.push(copy);
        }
        tick(&mut progress);
    }
    Ok(finish(kept, discarded, options.auto_number_as.as_deref(), options.label.clone(), progress))
}

/// Options for [`threshold`]
#[derive(Debug, Clone)]
pub struct ThresholdOptions {
    /// Minimum total occurrences of a segment's type (unconstrained if
    /// `None`)
    pub min_count: Option<usize>,
    /// Maximum total occurrences of a segment's type (unconstrained if
    /// `None`)
    pub max_count: Option<usize>,
    /// Type by annotation value under this key instead of content; segments
    /// lacking the key are always discarded
    pub annotation_key: Option<String>,
    /// Copy annotations into the outputs (default true)
    pub copy_annotations: bool,
    /// Assign 1-based ordinals into this key across the kept output
    pub auto_number_as: Option<String>,
    /// Label of the kept output
    pub label: Option<String>,
}

impl Default for ThresholdOptions {
    fn default() -> Self {
        Self {
            min_count: None,
            max_count: None,
            annotation_key: None,
            copy_annotations: true,
            auto_number_as: None,
            label: None,
        }
    }
}

/// Filter segments by the frequency of their type
///
/// A segment's type is its content, or the annotation value under
/// `annotation_key` when given; occurrences are counted across the whole
/// segmentation and a segment is kept iff its type's total satisfies the
/// bounds. The progress hook is advanced once per input segment.
pub fn threshold(
    store: &StringStore,
    segmentation: &Segmentation,
    options: &ThresholdOptions,
    mut progress: Option<&mut dyn Progress>,
) -> Result<Filtered> {
    debug!(
        segments = segmentation.len(),
        min = ?options.min_count,
        max = ?options.max_count,
        "threshold"
    );
    let mut types: Vec<Option<String>> = Vec::with_capacity(segmentation.len());
    let mut counts: HashMap<String, usize> = HashMap::new();
    for segment in segmentation.iter() {
        let ty = segment_value(store, segment, options.annotation_key.as_deref())?;
        if let Some(ty) = &ty {
            *counts.entry(ty.clone()).or_insert(0) += 1;
        }
        types.push(ty);
    }
    let mut kept: Vec<Segment> = Vec::new();
    let mut discarded: Vec<Segment> = Vec::new();
    for (segment, ty) in segmentation.iter().zip(&types) {
        let keep = match ty {
            Some(ty) => {
                let count = counts[ty];
                options.min_count.map_or(true, |min| count >= min)
                    && options.max_count.map_or(true, |max| count <= max)
            }
            None => false,
        };
        let copy = segment.deep_copy(None, options.copy_annotations);
        if keep {
            kept.push(copy);
        } else {
            discarded.push(copy);
        }
        tick(&mut progress);
    }
    Ok(finish(kept, discarded, options.auto_number_as.as_deref(), options.label.clone(), progress))
}

/// Options for [`intersect`]
#[derive(Debug, Clone)]
pub struct IntersectOptions {
    /// Keep or drop source segments whose value appears in the filtering set
    pub mode: FilterMode,
    /// Source value by annotation under this key instead of content;
    /// segments lacking the key never match
    pub source_annotation_key: Option<String>,
    /// Filtering value by annotation under this key instead of content;
    /// filtering segments lacking the key contribute nothing
    pub filtering_annotation_key: Option<String>,
    /// Copy annotations into the outputs (default true)
    pub copy_annotations: bool,
    /// Assign 1-based ordinals into this key across the kept output
    pub auto_number_as: Option<String>,
    /// Label of the kept output
    pub label: Option<String>,
}

impl Default for IntersectOptions {
    fn default() -> Self {
        Self {
            mode: FilterMode::Include,
            source_annotation_key: None,
            filtering_annotation_key: None,
            copy_annotations: true,
            auto_number_as: None,
            label: None,
        }
    }
}

/// Filter `source` by membership in the value set of `filtering`
///
/// Both sides take their value from content or from a designated annotation
/// key, supporting all four combinations. The progress hook is advanced
/// once per source segment.
pub fn intersect(
    store: &StringStore,
    source: &Segmentation,
    filtering: &Segmentation,
    options: &IntersectOptions,
    mut progress: Option<&mut dyn Progress>,
) -> Result<Filtered> {
    debug!(
        source_segments = source.len(),
        filtering_segments = filtering.len(),
        mode = %options.mode,
        "intersect"
    );
    let mut filter_values: HashSet<String> = HashSet::new();
    for segment in filtering.iter() {
        if let Some(value) =
            segment_value(store, segment, options.filtering_annotation_key.as_deref())?
        {
            filter_values.insert(value);
        }
    }
    let mut kept: Vec<Segment> = Vec::new();
    let mut discarded: Vec<Segment> = Vec::new();
    for segment in source.iter() {
        let matches = segment_value(store, segment, options.source_annotation_key.as_deref())?
            .is_some_and(|value| filter_values.contains(&value));
        let keep = matches == (options.mode == FilterMode::Include);
        let copy = segment.deep_copy(None, options.copy_annotations);
        if keep {
            kept.push(copy);
        } else {
            discarded.push(copy);
        }
        tick(&mut progress);
    }
    Ok(finish(kept, discarded, options.auto_number_as.as_deref(), options.label.clone(), progress))
}

/// Content, or the rendered annotation value under `key`
fn segment_value(
    store: &StringStore,
    segment: &Segment,
    key: Option<&str>,
) -> Result<Option<String>> {
    match key {
        Some(key) => Ok(segment.annotations.get(key).map(|value| value.render())),
        None => Ok(Some(segment.content(store)?.to_string())),
    }
}

fn finish(
    mut kept: Vec<Segment>,
    discarded: Vec<Segment>,
    auto_number_as: Option<&str>,
    label: Option<String>,
    mut progress: Option<&mut dyn Progress>,
) -> Filtered {
    if let Some(key) = auto_number_as {
        auto_number(&mut kept, key, progress.as_deref_mut());
    }
    Filtered {
        kept: Segmentation::from_segments(label, kept),
        discarded: Segmentation::from_segments(None, discarded),
    }
}
