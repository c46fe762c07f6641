//! Content rewriting
//!
//! Recoding rewrites segment content in place: the transformed text is
//! spliced back into the backing strings at their original handles, so any
//! other segmentation aliasing those handles observes the new content. The
//! overlap check exists because splicing overlapping spans would rewrite
//! shared text twice; it runs before any mutation, which is what makes a
//! failed call leave the store untouched.

use crate::error::{EngineError, Result};
use crate::template::expand_refs;
use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tessella_core::progress::tick;
use tessella_core::{Input, Progress, Segment, Segmentation, StringHandle, StringStore};
use tracing::debug;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Case folding applied before other transforms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseTransform {
    /// Uppercase
    Upper,
    /// Lowercase
    Lower,
}

impl FromStr for CaseTransform {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "upper" => Ok(CaseTransform::Upper),
            "lower" => Ok(CaseTransform::Lower),
            other => Err(EngineError::Config(format!("unknown case transform '{other}'"))),
        }
    }
}

impl fmt::Display for CaseTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaseTransform::Upper => write!(f, "upper"),
            CaseTransform::Lower => write!(f, "lower"),
        }
    }
}

/// One pattern/replacement rewrite step
///
/// The replacement may reference capture groups of the pattern with `&N`.
#[derive(Debug, Clone)]
pub struct Substitution {
    /// Pattern searched in the running content
    pub pattern: Regex,
    /// Replacement template
    pub replacement: String,
}

impl Substitution {
    /// Compile `pattern` into a substitution
    pub fn new(pattern: &str, replacement: impl Into<String>) -> Result<Self> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            replacement: replacement.into(),
        })
    }
}

/// Options for [`recode`]
#[derive(Debug, Clone)]
pub struct RecodeOptions {
    /// Case folding, applied first
    pub case: Option<CaseTransform>,
    /// Strip accents: canonical decomposition, drop combining marks,
    /// recompose
    pub remove_accents: bool,
    /// Ordered substitutions applied successively to the running content
    pub substitutions: Vec<Substitution>,
    /// Copy annotations into the output (default true)
    pub copy_annotations: bool,
    /// Refuse overlapping segmentations before mutating anything
    /// (default true)
    pub check_overlap: bool,
    /// Label of the output
    pub label: Option<String>,
}

impl Default for RecodeOptions {
    fn default() -> Self {
        Self {
            case: None,
            remove_accents: false,
            substitutions: Vec::new(),
            copy_annotations: true,
            check_overlap: true,
            label: None,
        }
    }
}

/// Outcome of [`recode`]
///
/// Distinguishes "a full-span input was rewritten in place" from the
/// general case, so callers holding an input can keep treating the result
/// as one.
#[derive(Debug, Clone)]
pub enum Recoded {
    /// The input was a single full-span input and its backing string
    /// changed
    Input(Input),
    /// Any other input, or nothing changed
    Segmentation(Segmentation),
}

impl Recoded {
    /// Borrow the outcome as a segmentation
    pub fn as_segmentation(&self) -> &Segmentation {
        match self {
            Recoded::Input(input) => input.as_segmentation(),
            Recoded::Segmentation(segmentation) => segmentation,
        }
    }

    /// Consume into a segmentation
    pub fn into_segmentation(self) -> Segmentation {
        match self {
            Recoded::Input(input) => input.into_segmentation(),
            Recoded::Segmentation(segmentation) => segmentation,
        }
    }
}

struct Rewrite {
    handle: StringHandle,
    start: usize,
    end: usize,
    content: String,
    changed: bool,
    adjusted: Option<(usize, usize)>,
}

/// Rewrite segment content in place
///
/// Per segment and in this order: case folding, accent stripping, then the
/// substitutions, each applied to the previous step's output. All
/// transforms are computed (and all template errors surfaced) before the
/// first store mutation. Returned segments carry offsets adjusted for the
/// length changes of earlier rewrites on the same string. The progress hook
/// is advanced once per input segment.
pub fn recode(
    store: &mut StringStore,
    segmentation: &Segmentation,
    options: &RecodeOptions,
    mut progress: Option<&mut dyn Progress>,
) -> Result<Recoded> {
    debug!(
        segments = segmentation.len(),
        case = ?options.case,
        remove_accents = options.remove_accents,
        substitutions = options.substitutions.len(),
        "recode"
    );
    if options.check_overlap && !segmentation.is_non_overlapping(store)? {
        return Err(EngineError::Config(
            "cannot recode an overlapping segmentation".to_string(),
        ));
    }

    let was_full_span_input = segmentation.len() == 1 && {
        let segment = &segmentation[0];
        let (start, end) = segment.resolved_bounds(store)?;
        start == 0 && end == store.get(segment.string_handle)?.len()
    };

    // Compute every rewrite up front; nothing is written until all of them
    // are known to succeed.
    let mut rewrites: Vec<Rewrite> = Vec::with_capacity(segmentation.len());
    for segment in segmentation.iter() {
        let (start, end) = segment.resolved_bounds(store)?;
        let original = segment.content(store)?;
        let transformed = transform(original, options)?;
        rewrites.push(Rewrite {
            handle: segment.string_handle,
            start,
            end,
            changed: transformed != original,
            content: transformed,
            adjusted: None,
        });
        tick(&mut progress);
    }

    // Splice per backing string, in span order, shifting later offsets by
    // the accumulated length delta.
    let mut by_handle: HashMap<StringHandle, Vec<usize>> = HashMap::new();
    for (index, rewrite) in rewrites.iter().enumerate() {
        by_handle.entry(rewrite.handle).or_default().push(index);
    }
    let mut any_changed = false;
    for (handle, mut indices) in by_handle {
        indices.sort_by_key(|&i| (rewrites[i].start, rewrites[i].end));
        if !indices.iter().any(|&i| rewrites[i].changed) {
            for i in indices {
                rewrites[i].adjusted = Some((rewrites[i].start, rewrites[i].end));
            }
            continue;
        }
        any_changed = true;
        let original = store.get(handle)?.to_string();
        let mut spliced = String::with_capacity(original.len());
        let mut cursor = 0usize;
        let mut delta = 0isize;
        for i in indices {
            let rewrite = &mut rewrites[i];
            let adjusted_start = (rewrite.start as isize + delta) as usize;
            rewrite.adjusted = Some((adjusted_start, adjusted_start + rewrite.content.len()));
            spliced.push_str(&original[cursor..rewrite.start]);
            spliced.push_str(&rewrite.content);
            cursor = rewrite.end;
            delta += rewrite.content.len() as isize - (rewrite.end - rewrite.start) as isize;
        }
        spliced.push_str(&original[cursor..]);
        store.update(handle, spliced)?;
    }

    let last_handle = store.last_handle();
    let mut output: Vec<Segment> = Vec::with_capacity(segmentation.len());
    for (segment, rewrite) in segmentation.iter().zip(&rewrites) {
        let mut copy = segment.deep_copy(None, options.copy_annotations);
        let (start, end) = rewrite.adjusted.unwrap_or((rewrite.start, rewrite.end));
        copy.start = Some(start);
        copy.end = Some(end);
        if rewrite.changed {
            copy.last_modified = last_handle;
        }
        output.push(copy);
    }

    if was_full_span_input && any_changed {
        let handle = segmentation[0].string_handle;
        let mut segment = output.remove(0);
        segment.start = None;
        segment.end = None;
        let label = options.label.clone().or_else(|| segmentation.label.clone());
        return Ok(Recoded::Input(Input::from_parts(
            Segmentation::from_segments(label, vec![segment]),
            handle,
        )));
    }
    let label = options.label.clone().or_else(|| segmentation.label.clone());
    Ok(Recoded::Segmentation(Segmentation::from_segments(
        label, output,
    )))
}

fn transform(content: &str, options: &RecodeOptions) -> Result<String> {
    let mut running = match options.case {
        Some(CaseTransform::Upper) => content.to_uppercase(),
        Some(CaseTransform::Lower) => content.to_lowercase(),
        None => content.to_string(),
    };
    if options.remove_accents {
        running = running
            .nfd()
            .filter(|c| !is_combining_mark(*c))
            .nfc()
            .collect();
    }
    for substitution in &options.substitutions {
        running = apply_substitution(&running, substitution)?;
    }
    Ok(running)
}

fn apply_substitution(content: &str, substitution: &Substitution) -> Result<String> {
    let mut output = String::with_capacity(content.len());
    let mut cursor = 0usize;
    for captures in substitution.pattern.captures_iter(content) {
        let matched = captures.get(0).expect("group 0 always participates");
        output.push_str(&content[cursor..matched.start()]);
        output.push_str(&expand_refs(&substitution.replacement, &captures)?);
        cursor = matched.end();
    }
    output.push_str(&content[cursor..]);
    Ok(output)
}
