//! Segment annotations

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Value of a single annotation
///
/// Values are text except for autonumbering, which writes integers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnnotationValue {
    /// Textual value
    Text(String),
    /// Numeric value (autonumbering)
    Number(i64),
}

impl AnnotationValue {
    /// Textual rendering, used wherever a value is matched or printed
    pub fn render(&self) -> String {
        match self {
            AnnotationValue::Text(text) => text.clone(),
            AnnotationValue::Number(n) => n.to_string(),
        }
    }

    /// Borrow the text payload, if this is a textual value
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AnnotationValue::Text(text) => Some(text),
            AnnotationValue::Number(_) => None,
        }
    }
}

impl fmt::Display for AnnotationValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnnotationValue::Text(text) => write!(f, "{text}"),
            AnnotationValue::Number(n) => write!(f, "{n}"),
        }
    }
}

impl From<&str> for AnnotationValue {
    fn from(text: &str) -> Self {
        AnnotationValue::Text(text.to_string())
    }
}

impl From<String> for AnnotationValue {
    fn from(text: String) -> Self {
        AnnotationValue::Text(text)
    }
}

impl From<i64> for AnnotationValue {
    fn from(n: i64) -> Self {
        AnnotationValue::Number(n)
    }
}

/// Key/value annotation map attached to a segment
///
/// Keys are unique; iteration order carries no guarantee.
pub type Annotations = HashMap<String, AnnotationValue>;
