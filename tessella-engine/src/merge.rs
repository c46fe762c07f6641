//! Shared segment bookkeeping: duplicate merging, autonumbering, sorting
//!
//! Several operators expose the same `sort`/`merge_duplicates`/
//! `auto_number_as` options; they all delegate here so the policies stay
//! identical everywhere.

use crate::error::Result;
use std::collections::HashMap;
use tessella_core::progress::tick;
use tessella_core::{AnnotationValue, Progress, Segment, StringHandle, StringStore};

/// Collapse segments with identical resolved addresses
///
/// The first occurrence keeps its identity and its relative order among
/// distinct addresses; annotations of later occurrences are merged over it,
/// later occurrence winning on key conflicts. The progress hook is advanced
/// once per input segment during grouping, plus once per collapse actually
/// performed.
pub fn merge_duplicate_segments(
    store: &StringStore,
    segments: Vec<Segment>,
    mut progress: Option<&mut (dyn Progress + '_)>,
) -> Result<Vec<Segment>> {
    let mut merged: Vec<Segment> = Vec::with_capacity(segments.len());
    let mut by_address: HashMap<(StringHandle, usize, usize), usize> = HashMap::new();
    for segment in segments {
        let address = segment.address(store)?;
        tick(&mut progress);
        match by_address.get(&address) {
            Some(&index) => {
                let keeper = &mut merged[index];
                keeper.annotations.extend(
                    segment
                        .annotations
                        .iter()
                        .map(|(k, v)| (k.clone(), v.clone())),
                );
                tick(&mut progress);
            }
            None => {
                by_address.insert(address, merged.len());
                merged.push(segment);
            }
        }
    }
    Ok(merged)
}

/// Assign 1-based ordinals into `key` across `segments`, in current order
///
/// A pre-existing value under `key` is overwritten. The progress hook is
/// advanced once per segment.
pub fn auto_number(segments: &mut [Segment], key: &str, mut progress: Option<&mut (dyn Progress + '_)>) {
    for (index, segment) in segments.iter_mut().enumerate() {
        segment
            .annotations
            .insert(key.to_string(), AnnotationValue::Number(index as i64 + 1));
        tick(&mut progress);
    }
}

/// Stable sort by ascending `(string_handle, start, end)` resolved address
pub fn sort_by_address(store: &StringStore, segments: &mut Vec<Segment>) -> Result<()> {
    let mut keyed: Vec<((StringHandle, usize, usize), Segment)> = Vec::with_capacity(segments.len());
    for segment in segments.drain(..) {
        keyed.push((segment.address(store)?, segment));
    }
    keyed.sort_by(|a, b| a.0.cmp(&b.0));
    segments.extend(keyed.into_iter().map(|(_, segment)| segment));
    Ok(())
}
