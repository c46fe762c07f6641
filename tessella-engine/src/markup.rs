//! Markup-aware segmentation
//!
//! [`import_xml`] scans segment content for tags in a simplified XML-like
//! grammar and emits one output segment per opening-to-matching-closing
//! span of the requested element. The scan runs over the logical
//! concatenation of the input segments, so elements (and individual tags)
//! may be broken across segments from different strings.
//!
//! Tag grammar: `<`, optional `/`, a name token (letters, digits, `_`,
//! `:`, `-`, `.`, not starting with a digit), whitespace-separated
//! `name="value"` attribute pairs, optional whitespace, optional trailing
//! `/`, `>`. Comments open with `<!--` and close with `-->`; any other
//! `<!` or `<?` construct runs to the next `>`. A `<` with no closing `>`
//! before end of input is literal text, as is any `<…>` run that parses as
//! none of the above. Only open/close mismatches of the requested element
//! are errors.

use crate::error::{MarkupError, Result};
use crate::merge::auto_number;
use regex::Regex;
use smallvec::SmallVec;
use std::collections::HashMap;
use tessella_core::progress::tick;
use tessella_core::{Annotations, Progress, Segment, Segmentation, StringHandle, StringStore};
use tracing::debug;

/// Options for [`import_xml`]
#[derive(Debug, Clone)]
pub struct ImportXmlOptions {
    /// Element whose spans are extracted
    pub element: String,
    /// Attribute patterns an instance must match (partial search) to be
    /// emitted; instances failing a condition are skipped, their
    /// descendants judged independently
    pub conditions: HashMap<String, Regex>,
    /// Store the literal tag name under this annotation key
    pub import_element_as: Option<String>,
    /// Turn opening-tag attributes into annotations and propagate the
    /// enclosing segment's annotations (default true)
    pub import_annotations: bool,
    /// Collect text with all markup stripped into a fresh store string and
    /// address spans of that instead of the original strings
    pub remove_markup: bool,
    /// Collapse identical-address results (nested elements under
    /// `remove_markup`, or re-scanned regions)
    pub merge_duplicates: bool,
    /// On duplicate-merge conflicts, prefer the innermost instance's
    /// annotations instead of the outermost
    pub preserve_leaves: bool,
    /// Assign 1-based ordinals into this annotation key across the output
    pub auto_number_as: Option<String>,
    /// Label of the output segmentation
    pub label: Option<String>,
}

impl ImportXmlOptions {
    /// Options for extracting `element` with the defaults
    pub fn new(element: impl Into<String>) -> Self {
        Self {
            element: element.into(),
            conditions: HashMap::new(),
            import_element_as: None,
            import_annotations: true,
            remove_markup: false,
            merge_duplicates: false,
            preserve_leaves: false,
            auto_number_as: None,
            label: None,
        }
    }
}

/// A contiguous piece of one instance's content within one input segment
#[derive(Debug, Clone, Copy)]
struct Fragment {
    seg_index: usize,
    handle: StringHandle,
    start: usize,
    end: usize,
}

/// One open (or completed) instance of the requested element
#[derive(Debug)]
struct Instance {
    order: usize,
    depth: usize,
    keep: bool,
    annotations: Annotations,
    fragments: SmallVec<[Fragment; 2]>,
    open_fragment: Option<Fragment>,
    stripped_start: usize,
    stripped_end: usize,
}

/// Position in the logical input stream
#[derive(Debug, Clone, Copy)]
struct StreamPos {
    seg_index: usize,
    offset: usize,
}

enum ScanState {
    Outside,
    InTag { start: StreamPos, body: String },
}

enum Tag {
    Opening {
        name: String,
        attributes: Vec<(String, String)>,
        self_closing: bool,
    },
    Closing {
        name: String,
    },
    Ignored,
    Literal,
}

/// Extract spans of one element from markup
///
/// Each emitted segment spans from immediately after an opening tag of the
/// element to immediately before its matching closing tag, outer instances
/// listed before inner ones. Empty instances (including self-closing tags)
/// emit nothing. With `remove_markup` the spans address a freshly
/// registered string holding the stream's text with all markup stripped;
/// otherwise they address the original strings, one fragment segment per
/// input segment an instance crosses. The progress hook is advanced once
/// per input segment scanned, plus the merge and autonumber bookkeeping
/// when those options are set.
pub fn import_xml(
    store: &mut StringStore,
    segmentation: &Segmentation,
    options: &ImportXmlOptions,
    mut progress: Option<&mut dyn Progress>,
) -> Result<Segmentation> {
    debug!(
        segments = segmentation.len(),
        element = %options.element,
        remove_markup = options.remove_markup,
        "import_xml"
    );
    let mut scanner = Scanner {
        options,
        stack: Vec::new(),
        done: Vec::new(),
        stripped: String::new(),
        next_order: 0,
    };
    let mut state = ScanState::Outside;
    for (seg_index, segment) in segmentation.iter().enumerate() {
        let (base, _) = segment.resolved_bounds(store)?;
        let content = segment.content(store)?;
        let handle = segment.string_handle;
        scanner.reopen_fragments(seg_index, handle, base);
        for (i, ch) in content.char_indices() {
            let abs = base + i;
            match &mut state {
                ScanState::Outside => {
                    if ch == '<' {
                        state = ScanState::InTag {
                            start: StreamPos {
                                seg_index,
                                offset: abs,
                            },
                            body: String::new(),
                        };
                    } else if options.remove_markup {
                        scanner.stripped.push(ch);
                    }
                }
                ScanState::InTag { start, body } => {
                    let in_comment = body.starts_with("!--");
                    if ch == '>' && (!in_comment || (body.len() >= 5 && body.ends_with("--"))) {
                        let after = StreamPos {
                            seg_index,
                            offset: abs + 1,
                        };
                        let tag_start = *start;
                        let body = std::mem::take(body);
                        state = ScanState::Outside;
                        scanner.classify(
                            &body,
                            tag_start,
                            after,
                            handle,
                            &segment.annotations,
                        )?;
                    } else {
                        body.push(ch);
                    }
                }
            }
        }
        scanner.close_fragments(base + content.len());
        tick(&mut progress);
    }
    if let ScanState::InTag { body, .. } = state {
        // Never-closed tag: literal text.
        if options.remove_markup {
            scanner.stripped.push('<');
            scanner.stripped.push_str(&body);
        }
    }
    if !scanner.stack.is_empty() {
        return Err(MarkupError::MissingClosingTag {
            element: options.element.clone(),
        }
        .into());
    }

    scanner.done.sort_by_key(|instance| instance.order);
    let mut emitted: Vec<(Segment, usize)> = Vec::new();
    if options.remove_markup {
        let spans: Vec<&Instance> = scanner
            .done
            .iter()
            .filter(|i| i.keep && i.stripped_start < i.stripped_end)
            .collect();
        if !spans.is_empty() {
            let stripped_handle = store.register(std::mem::take(&mut scanner.stripped));
            let last_handle = store.last_handle();
            for instance in spans {
                let mut segment = Segment::with_annotations(
                    stripped_handle,
                    Some(instance.stripped_start),
                    Some(instance.stripped_end),
                    instance.annotations.clone(),
                );
                segment.last_modified = last_handle;
                emitted.push((segment, instance.depth));
            }
        }
    } else {
        for instance in scanner.done.iter().filter(|i| i.keep) {
            for fragment in &instance.fragments {
                emitted.push((
                    Segment::with_annotations(
                        fragment.handle,
                        Some(fragment.start),
                        Some(fragment.end),
                        instance.annotations.clone(),
                    ),
                    instance.depth,
                ));
            }
        }
    }

    let mut output: Vec<Segment> = if options.merge_duplicates {
        merge_by_depth(emitted, options.preserve_leaves, &mut progress)
    } else {
        emitted.into_iter().map(|(segment, _)| segment).collect()
    };
    if let Some(key) = &options.auto_number_as {
        auto_number(&mut output, key, progress.as_deref_mut());
    }
    Ok(Segmentation::from_segments(options.label.clone(), output))
}

struct Scanner<'a> {
    options: &'a ImportXmlOptions,
    stack: Vec<Instance>,
    done: Vec<Instance>,
    stripped: String,
    next_order: usize,
}

impl Scanner<'_> {
    /// Start a fresh content fragment for every open instance
    fn reopen_fragments(&mut self, seg_index: usize, handle: StringHandle, base: usize) {
        for instance in &mut self.stack {
            if instance.open_fragment.is_none() {
                instance.open_fragment = Some(Fragment {
                    seg_index,
                    handle,
                    start: base,
                    end: base,
                });
            }
        }
    }

    /// Close every open fragment at the end of the current input segment
    fn close_fragments(&mut self, segment_end: usize) {
        for instance in &mut self.stack {
            if let Some(mut fragment) = instance.open_fragment.take() {
                fragment.end = segment_end;
                if fragment.end > fragment.start {
                    instance.fragments.push(fragment);
                }
            }
        }
    }

    fn classify(
        &mut self,
        body: &str,
        tag_start: StreamPos,
        after: StreamPos,
        handle: StringHandle,
        enclosing_annotations: &Annotations,
    ) -> Result<()> {
        match parse_tag(body) {
            Tag::Closing { name } if name == self.options.element => {
                self.pop_instance(tag_start)?;
            }
            Tag::Opening {
                name,
                attributes,
                self_closing,
            } if name == self.options.element => {
                if self_closing {
                    return Ok(()); // empty instance, nothing to emit
                }
                self.push_instance(attributes, after, handle, enclosing_annotations);
            }
            Tag::Literal => {
                if self.options.remove_markup {
                    self.stripped.push('<');
                    self.stripped.push_str(body);
                    self.stripped.push('>');
                }
            }
            _ => {} // other elements, comments, declarations
        }
        Ok(())
    }

    fn push_instance(
        &mut self,
        attributes: Vec<(String, String)>,
        after: StreamPos,
        handle: StringHandle,
        enclosing_annotations: &Annotations,
    ) {
        let keep = self.options.conditions.iter().all(|(name, pattern)| {
            attributes
                .iter()
                .find(|(attr, _)| attr == name)
                .map_or(false, |(_, value)| pattern.is_match(value))
        });
        let mut annotations = if self.options.import_annotations {
            let mut merged = enclosing_annotations.clone();
            merged.extend(
                attributes
                    .into_iter()
                    .map(|(name, value)| (name, value.into())),
            );
            merged
        } else {
            Annotations::new()
        };
        if let Some(key) = &self.options.import_element_as {
            annotations.insert(key.clone(), self.options.element.clone().into());
        }
        self.stack.push(Instance {
            order: self.next_order,
            depth: self.stack.len(),
            keep,
            annotations,
            fragments: SmallVec::new(),
            open_fragment: Some(Fragment {
                seg_index: after.seg_index,
                handle,
                start: after.offset,
                end: after.offset,
            }),
            stripped_start: self.stripped.len(),
            stripped_end: self.stripped.len(),
        });
        self.next_order += 1;
    }

    fn pop_instance(&mut self, tag_start: StreamPos) -> Result<()> {
        let mut instance = self.stack.pop().ok_or_else(|| MarkupError::MissingOpeningTag {
            element: self.options.element.clone(),
        })?;
        if let Some(mut fragment) = instance.open_fragment.take() {
            // The closing tag may have started in an earlier segment; any
            // fragment content past its `<` belongs to the tag, not to the
            // instance.
            fragment.end = if fragment.seg_index == tag_start.seg_index {
                tag_start.offset
            } else {
                fragment.start
            };
            instance.fragments.push(fragment);
        }
        instance.fragments.retain(|f| f.seg_index <= tag_start.seg_index);
        if let Some(last) = instance.fragments.last_mut() {
            if last.seg_index == tag_start.seg_index {
                last.end = last.end.min(tag_start.offset);
            }
        }
        instance.fragments.retain(|f| f.end > f.start);
        instance.stripped_end = self.stripped.len();
        self.done.push(instance);
        Ok(())
    }
}

/// Depth-aware duplicate collapse
///
/// Groups by address, keeps the first occurrence's position, and merges
/// annotations so that on key conflicts the outermost instance wins by
/// default and the innermost wins under `preserve_leaves`; among equal
/// depths the later-scanned instance wins.
fn merge_by_depth(
    emitted: Vec<(Segment, usize)>,
    preserve_leaves: bool,
    progress: &mut Option<&mut dyn Progress>,
) -> Vec<Segment> {
    let mut groups: Vec<(Segment, Vec<(usize, usize)>)> = Vec::new();
    let mut by_address: HashMap<(StringHandle, Option<usize>, Option<usize>), usize> =
        HashMap::new();
    let mut candidates: Vec<Annotations> = Vec::new();
    for (scan_order, (segment, depth)) in emitted.into_iter().enumerate() {
        let address = (segment.string_handle, segment.start, segment.end);
        tick(progress);
        candidates.push(segment.annotations.clone());
        match by_address.get(&address) {
            Some(&index) => {
                groups[index].1.push((depth, scan_order));
                tick(progress);
            }
            None => {
                by_address.insert(address, groups.len());
                groups.push((segment, vec![(depth, scan_order)]));
            }
        }
    }
    groups
        .into_iter()
        .map(|(mut segment, mut members)| {
            // Least privileged first, so the most privileged overwrite last.
            if preserve_leaves {
                members.sort_by_key(|&(depth, order)| (depth, order));
            } else {
                members.sort_by_key(|&(depth, order)| (std::cmp::Reverse(depth), order));
            }
            let mut annotations = Annotations::new();
            for (_, order) in members {
                annotations.extend(
                    candidates[order]
                        .iter()
                        .map(|(k, v)| (k.clone(), v.clone())),
                );
            }
            segment.annotations = annotations;
            segment
        })
        .collect()
}

fn parse_tag(body: &str) -> Tag {
    if body.starts_with("!--") {
        // Scanner only hands over comment bodies once `-->` was seen.
        return Tag::Ignored;
    }
    if body.starts_with('!') || body.starts_with('?') {
        return Tag::Ignored;
    }
    if let Some(rest) = body.strip_prefix('/') {
        let name = rest.trim();
        return if is_valid_name(name) {
            Tag::Closing {
                name: name.to_string(),
            }
        } else {
            Tag::Literal
        };
    }
    let (body, self_closing) = match body.trim_end().strip_suffix('/') {
        Some(stripped) => (stripped, true),
        None => (body, false),
    };
    let name_end = body
        .find(|c: char| !is_name_char(c))
        .unwrap_or(body.len());
    let name = &body[..name_end];
    if !is_valid_name(name) {
        return Tag::Literal;
    }
    match parse_attributes(&body[name_end..]) {
        Some(attributes) => Tag::Opening {
            name: name.to_string(),
            attributes,
            self_closing,
        },
        None => Tag::Literal,
    }
}

fn parse_attributes(mut rest: &str) -> Option<Vec<(String, String)>> {
    let mut attributes = Vec::new();
    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            return Some(attributes);
        }
        let name_end = rest.find(|c: char| !is_name_char(c))?;
        if name_end == 0 {
            return None;
        }
        let name = &rest[..name_end];
        rest = rest[name_end..].strip_prefix('=')?.strip_prefix('"')?;
        let value_end = rest.find('"')?;
        attributes.push((name.to_string(), rest[..value_end].to_string()));
        rest = &rest[value_end + 1..];
    }
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | ':' | '-' | '.')
}

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if is_name_char(first) && !first.is_ascii_digit() => {
            chars.all(is_name_char)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_classification() {
        assert!(matches!(parse_tag("a"), Tag::Opening { self_closing: false, .. }));
        assert!(matches!(parse_tag("a/"), Tag::Opening { self_closing: true, .. }));
        assert!(matches!(parse_tag("/a"), Tag::Closing { .. }));
        assert!(matches!(parse_tag("!DOCTYPE html"), Tag::Ignored));
        assert!(matches!(parse_tag("?xml version=\"1.0\"?"), Tag::Ignored));
        assert!(matches!(parse_tag("!--note--"), Tag::Ignored));
        assert!(matches!(parse_tag("1bad"), Tag::Literal));
        assert!(matches!(parse_tag(" b "), Tag::Literal));
    }

    #[test]
    fn attribute_parsing() {
        match parse_tag(r#"w pos="noun" lemma="cat""#) {
            Tag::Opening { attributes, .. } => {
                assert_eq!(
                    attributes,
                    vec![
                        ("pos".to_string(), "noun".to_string()),
                        ("lemma".to_string(), "cat".to_string()),
                    ]
                );
            }
            _ => panic!("expected an opening tag"),
        }
        assert!(matches!(parse_tag(r#"w pos=noun"#), Tag::Literal)); // unquoted
        assert!(matches!(parse_tag(r#"w pos="unterminated"#), Tag::Literal));
    }

    #[test]
    fn names_follow_the_token_grammar() {
        assert!(is_valid_name("w"));
        assert!(is_valid_name("tei:seg"));
        assert!(is_valid_name("_x1-2.3"));
        assert!(!is_valid_name("1x"));
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("a b"));
    }
}
