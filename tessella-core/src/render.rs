//! Human-readable rendering of segmentations
//!
//! Each segment is formatted through a %-style template: `%(name)s` tokens
//! interpolate builtin pseudo-variables or annotation keys, `%%` escapes a
//! literal percent sign. Builtin pseudo-variables:
//!
//! - `__num__`: 1-based ordinal of the segment in the segmentation
//! - `__content__`: the segment's resolved content
//! - `__str_index__`, `__start__`, `__end__`: humanized address (handle
//!   index plus one, 1-based start, end unchanged)
//! - `__str_index_raw__`, `__start_raw__`, `__end_raw__`: raw address
//!
//! Any other name is looked up among the segment's annotations; a missing
//! key renders the literal sentinel `__none__`.

use crate::error::Result;
use crate::progress::{tick, Progress};
use crate::segment::Segment;
use crate::segmentation::Segmentation;
use crate::store::StringStore;

/// Sentinel rendered for a missing annotation key
pub const NONE_SENTINEL: &str = "__none__";

/// Template used when [`RenderOptions::template`] is not given
pub const DEFAULT_TEMPLATE: &str = "%(__num__)s. %(__content__)s";

/// Options for [`Segmentation::render`]
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    /// Literal emitted before the first segment
    pub header: Option<String>,
    /// Literal emitted after the last segment
    pub footer: Option<String>,
    /// Per-segment %-style template; [`DEFAULT_TEMPLATE`] when `None`
    pub template: Option<String>,
}

impl Segmentation {
    /// Render a listing of all segments
    ///
    /// Segment renderings are joined with newlines; header and footer are
    /// concatenated literally around them. The progress hook is advanced
    /// exactly once per segment.
    pub fn render(
        &self,
        store: &StringStore,
        options: &RenderOptions,
        mut progress: Option<&mut dyn Progress>,
    ) -> Result<String> {
        let template = options.template.as_deref().unwrap_or(DEFAULT_TEMPLATE);
        let mut lines = Vec::with_capacity(self.len());
        for (index, segment) in self.iter().enumerate() {
            lines.push(format_segment(template, segment, index, store)?);
            tick(&mut progress);
        }
        let mut output = String::new();
        if let Some(header) = &options.header {
            output.push_str(header);
        }
        output.push_str(&lines.join("\n"));
        if let Some(footer) = &options.footer {
            output.push_str(footer);
        }
        Ok(output)
    }
}

fn format_segment(
    template: &str,
    segment: &Segment,
    index: usize,
    store: &StringStore,
) -> Result<String> {
    let mut output = String::with_capacity(template.len());
    let mut chars = template.char_indices().peekable();
    while let Some((pos, ch)) = chars.next() {
        if ch != '%' {
            output.push(ch);
            continue;
        }
        match chars.peek().map(|&(_, next)| next) {
            Some('%') => {
                output.push('%');
                chars.next();
            }
            Some('(') => {
                let rest = &template[pos..];
                match rest.find(')') {
                    Some(close) => {
                        let name = &rest[2..close];
                        output.push_str(&resolve_variable(name, segment, index, store)?);
                        // Skip past ')' and one trailing conversion character.
                        while let Some((p, _)) = chars.next() {
                            if p == pos + close {
                                break;
                            }
                        }
                        if let Some('s' | 'd' | 'i' | 'f') = chars.peek().map(|&(_, conv)| conv) {
                            chars.next();
                        }
                    }
                    None => output.push(ch), // unterminated token stays literal
                }
            }
            _ => output.push(ch),
        }
    }
    Ok(output)
}

fn resolve_variable(
    name: &str,
    segment: &Segment,
    index: usize,
    store: &StringStore,
) -> Result<String> {
    Ok(match name {
        "__num__" => (index + 1).to_string(),
        "__content__" => segment.content(store)?.to_string(),
        "__str_index__" => (segment.string_handle.index() + 1).to_string(),
        "__start__" => (segment.resolved_bounds(store)?.0 + 1).to_string(),
        "__end__" => segment.resolved_bounds(store)?.1.to_string(),
        "__str_index_raw__" => segment.string_handle.index().to_string(),
        "__start_raw__" => segment.resolved_bounds(store)?.0.to_string(),
        "__end_raw__" => segment.resolved_bounds(store)?.1.to_string(),
        key => segment
            .annotations
            .get(key)
            .map(|value| value.render())
            .unwrap_or_else(|| NONE_SENTINEL.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::AnnotationValue;

    fn words() -> (StringStore, Segmentation) {
        let mut store = StringStore::new();
        let h = store.register("ab cde");
        let mut first = Segment::new(h, Some(0), Some(2));
        first
            .annotations
            .insert("pos".into(), AnnotationValue::from("x"));
        let segmentation = Segmentation::from_segments(
            Some("words".into()),
            vec![first, Segment::new(h, Some(3), Some(6))],
        );
        (store, segmentation)
    }

    #[test]
    fn default_template_lists_contents() {
        let (store, segmentation) = words();
        let text = segmentation
            .render(&store, &RenderOptions::default(), None)
            .unwrap();
        assert_eq!(text, "1. ab\n2. cde");
    }

    #[test]
    fn template_interpolates_address_and_annotations() {
        let (store, segmentation) = words();
        let options = RenderOptions {
            template: Some("%(__str_index__)s:%(__start__)s-%(__end__)s %(pos)s".into()),
            ..Default::default()
        };
        let text = segmentation.render(&store, &options, None).unwrap();
        assert_eq!(text, "1:1-2 x\n1:4-6 __none__");
    }

    #[test]
    fn raw_variants_and_percent_escape() {
        let (store, segmentation) = words();
        let options = RenderOptions {
            template: Some("%(__start_raw__)s%%".into()),
            ..Default::default()
        };
        let text = segmentation.render(&store, &options, None).unwrap();
        assert_eq!(text, "0%\n3%");
    }

    #[test]
    fn header_footer_and_progress_cadence() {
        let (store, segmentation) = words();
        let options = RenderOptions {
            header: Some("== words ==\n".into()),
            footer: Some("\n== end ==".into()),
            ..Default::default()
        };
        let mut calls = 0usize;
        let mut hook = || calls += 1;
        let text = segmentation
            .render(&store, &options, Some(&mut hook))
            .unwrap();
        assert!(text.starts_with("== words ==\n1. ab"));
        assert!(text.ends_with("== end =="));
        assert_eq!(calls, 2); // once per segment
    }
}
