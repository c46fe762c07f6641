//! `&N` capture-group reference expansion
//!
//! Substitution replacements and dynamic annotation pairs use the same
//! template syntax: literal text plus `&` immediately followed by one or
//! more digits, referring to a capture group of the active pattern. `&0` is
//! rejected, as is a reference to a group the pattern does not define or
//! that did not participate in the match. An `&` not followed by a digit is
//! literal.

use crate::error::{EngineError, Result};
use regex::Captures;

/// Expand every `&N` reference in `template` against `captures`
pub fn expand_refs(template: &str, captures: &Captures<'_>) -> Result<String> {
    let mut output = String::with_capacity(template.len());
    let mut chars = template.char_indices().peekable();
    while let Some((pos, ch)) = chars.next() {
        if ch != '&' {
            output.push(ch);
            continue;
        }
        let digits_start = pos + 1;
        let mut digits_end = digits_start;
        while let Some(&(p, c)) = chars.peek() {
            if !c.is_ascii_digit() {
                break;
            }
            digits_end = p + 1;
            chars.next();
        }
        if digits_end == digits_start {
            output.push('&');
            continue;
        }
        let number = &template[digits_start..digits_end];
        let group: usize = number
            .parse()
            .map_err(|_| EngineError::Template(format!("group reference &{number} is not a number")))?;
        if group == 0 {
            return Err(EngineError::Template(
                "group reference &0 is not allowed".to_string(),
            ));
        }
        match captures.get(group) {
            Some(matched) => output.push_str(matched.as_str()),
            None => {
                return Err(EngineError::Template(format!(
                    "group reference &{group} has no matching capture group"
                )))
            }
        }
    }
    Ok(output)
}

/// True if `template` contains at least one `&N` reference
pub fn has_refs(template: &str) -> bool {
    let bytes = template.as_bytes();
    bytes
        .windows(2)
        .any(|pair| pair[0] == b'&' && pair[1].is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    fn captures<'a>(pattern: &str, text: &'a str) -> Captures<'a> {
        Regex::new(pattern).unwrap().captures(text).unwrap()
    }

    #[test]
    fn expands_group_references() {
        let caps = captures(r"(\w+)=(\w+)", "key=value");
        assert_eq!(expand_refs("&1 -> &2", &caps).unwrap(), "key -> value");
    }

    #[test]
    fn ampersand_without_digit_is_literal() {
        let caps = captures(r"(x)", "x");
        assert_eq!(expand_refs("a & b &1", &caps).unwrap(), "a & b x");
    }

    #[test]
    fn group_zero_is_rejected() {
        let caps = captures(r"(x)", "x");
        assert!(matches!(
            expand_refs("&0", &caps),
            Err(EngineError::Template(_))
        ));
    }

    #[test]
    fn missing_group_is_rejected() {
        let caps = captures(r"(x)", "x");
        assert!(matches!(
            expand_refs("&2", &caps),
            Err(EngineError::Template(_))
        ));
    }

    #[test]
    fn detects_references() {
        assert!(has_refs("&1"));
        assert!(!has_refs("a & b"));
        assert!(!has_refs("plain"));
    }

    proptest::proptest! {
        #[test]
        fn reference_free_templates_expand_to_themselves(template in "[a-z &]{0,30}") {
            proptest::prop_assume!(!has_refs(&template));
            let caps = captures(r"(x)", "x");
            proptest::prop_assert_eq!(expand_refs(&template, &caps).unwrap(), template);
        }
    }
}
