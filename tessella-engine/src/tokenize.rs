//! Regex-driven segmentation

use crate::error::{EngineError, Result};
use crate::merge::{auto_number, merge_duplicate_segments, sort_by_address};
use crate::template::{expand_refs, has_refs};
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use tessella_core::progress::tick;
use tessella_core::{Progress, Segment, Segmentation, StringStore};
use tracing::debug;

/// What a tokenization spec keeps of each segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitMode {
    /// Keep the regex matches, discard the text between them
    Tokenize,
    /// Keep the spans between matches, discard the matches themselves
    Split,
}

impl FromStr for SplitMode {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "tokenize" => Ok(SplitMode::Tokenize),
            "split" => Ok(SplitMode::Split),
            other => Err(EngineError::Config(format!(
                "unknown tokenization mode '{other}'"
            ))),
        }
    }
}

impl fmt::Display for SplitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SplitMode::Tokenize => write!(f, "tokenize"),
            SplitMode::Split => write!(f, "split"),
        }
    }
}

/// One step of a tokenization pipeline
///
/// Annotation pairs are templates: both key and value may reference capture
/// groups of the pattern with `&N`, interpolated per match. Pairs without
/// references behave as static annotations. Group references are only
/// meaningful in [`SplitMode::Tokenize`]; a referencing pair under
/// [`SplitMode::Split`] fails the call, since the kept spans have no match
/// to resolve against.
#[derive(Debug, Clone)]
pub struct TokenizeSpec {
    /// Pattern searched in each segment's content
    pub pattern: Regex,
    /// Whether matches or gaps are kept
    pub mode: SplitMode,
    /// Annotation key/value templates applied to every emitted segment
    pub annotations: Vec<(String, String)>,
}

impl TokenizeSpec {
    /// Compile `pattern` into a spec with no annotations
    pub fn new(pattern: &str, mode: SplitMode) -> Result<Self> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            mode,
            annotations: Vec::new(),
        })
    }

    /// Add an annotation key/value template pair
    pub fn annotate(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.push((key.into(), value.into()));
        self
    }
}

/// Options for [`tokenize`]
#[derive(Debug, Clone)]
pub struct TokenizeOptions {
    /// Propagate each parent segment's annotations to its children
    /// (default true)
    pub import_annotations: bool,
    /// Reorder the output by ascending resolved address
    pub sort: bool,
    /// Collapse segments with identical resolved addresses
    pub merge_duplicates: bool,
    /// Assign 1-based ordinals into this annotation key across the output
    pub auto_number_as: Option<String>,
    /// Label of the output segmentation
    pub label: Option<String>,
}

impl Default for TokenizeOptions {
    fn default() -> Self {
        Self {
            import_annotations: true,
            sort: false,
            merge_duplicates: false,
            auto_number_as: None,
            label: None,
        }
    }
}

/// Re-segment every segment through a pipeline of regex specs
///
/// Specs compose by subdividing: the first spec applies to the input
/// segment itself, each further spec applies to every segment the previous
/// spec produced, and the emissions of every spec all land in the output,
/// ordered by input segment, then spec, then match. The progress hook is
/// advanced once per input segment, plus the merge and autonumber
/// bookkeeping when those options are set.
pub fn tokenize(
    store: &StringStore,
    segmentation: &Segmentation,
    specs: &[TokenizeSpec],
    options: &TokenizeOptions,
    mut progress: Option<&mut dyn Progress>,
) -> Result<Segmentation> {
    debug!(
        segments = segmentation.len(),
        specs = specs.len(),
        "tokenize"
    );
    let mut output: Vec<Segment> = Vec::new();
    for segment in segmentation.iter() {
        let mut current = vec![segment.clone()];
        for spec in specs {
            let mut produced: Vec<Segment> = Vec::new();
            for parent in &current {
                apply_spec(store, parent, spec, options.import_annotations, &mut produced)?;
            }
            output.extend(produced.iter().cloned());
            current = produced;
        }
        tick(&mut progress);
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

fn apply_spec(
    store: &StringStore,
    parent: &Segment,
    spec: &TokenizeSpec,
    import_annotations: bool,
    produced: &mut Vec<Segment>,
) -> Result<()> {
    let (base, _) = parent.resolved_bounds(store)?;
    let content = parent.content(store)?;
    match spec.mode {
        SplitMode::Tokenize => {
            for captures in spec.pattern.captures_iter(content) {
                let matched = captures.get(0).expect("group 0 always participates");
                if matched.start() == matched.end() {
                    continue; // zero-width matches segment nothing
                }
                let mut child = child_segment(
                    parent,
                    base + matched.start(),
                    base + matched.end(),
                    import_annotations,
                );
                for (key, value) in &spec.annotations {
                    child.annotations.insert(
                        expand_refs(key, &captures)?,
                        expand_refs(value, &captures)?.into(),
                    );
                }
                produced.push(child);
            }
        }
        SplitMode::Split => {
            for (key, value) in &spec.annotations {
                if has_refs(key) || has_refs(value) {
                    return Err(EngineError::Template(
                        "group references cannot be resolved in split mode".to_string(),
                    ));
                }
            }
            let mut previous_end = 0;
            let emit = |start: usize, end: usize, produced: &mut Vec<Segment>| {
                if end > start {
                    let mut child =
                        child_segment(parent, base + start, base + end, import_annotations);
                    for (key, value) in &spec.annotations {
                        child
                            .annotations
                            .insert(key.clone(), value.clone().into());
                    }
                    produced.push(child);
                }
            };
            for matched in spec.pattern.find_iter(content) {
                emit(previous_end, matched.start(), produced);
                previous_end = matched.end();
            }
            emit(previous_end, content.len(), produced);
        }
    }
    Ok(())
}

fn child_segment(parent: &Segment, start: usize, end: usize, import_annotations: bool) -> Segment {
    let mut child = parent.deep_copy(None, import_annotations);
    child.start = Some(start);
    child.end = Some(end);
    child
}
