//! Segmentation operators for the Tessella text-segmentation engine
//!
//! Every operator consumes one or more segmentations plus an options
//! struct and produces new segmentations, leaving its inputs untouched
//! (except [`recode`], which rewrites backing strings in place by design).
//! Operators resolve content against an explicit [`StringStore`] and
//! report progress through an optional hook at the cadence each operator
//! documents.

#![warn(missing_docs)]

pub mod concatenate;
pub mod error;
pub mod filter;
pub mod markup;
pub mod merge;
pub mod recode;
pub mod sample;
pub mod template;
pub mod tokenize;

pub use concatenate::{bypass, concatenate, ConcatenateOptions};
pub use error::{EngineError, MarkupError, Result};
pub use filter::{
    intersect, select, threshold, FilterMode, Filtered, IntersectOptions, SelectOptions,
    ThresholdOptions,
};
pub use markup::{import_xml, ImportXmlOptions};
pub use merge::{auto_number, merge_duplicate_segments, sort_by_address};
pub use recode::{recode, CaseTransform, Recoded, RecodeOptions, Substitution};
pub use sample::{sample, SampleMode, SampleOptions};
pub use tokenize::{tokenize, SplitMode, TokenizeOptions, TokenizeSpec};

// Re-export the data model for convenience
pub use tessella_core::{
    AnnotationValue, Annotations, CoreError, Input, Progress, RenderOptions, Segment,
    Segmentation, StringHandle, StringStore,
};
