//! Positional sampling

use crate::error::{EngineError, Result};
use crate::filter::Filtered;
use crate::merge::auto_number;
use rand::Rng;
use std::fmt;
use std::str::FromStr;
use tessella_core::progress::tick;
use tessella_core::{Progress, Segment, Segmentation};
use tracing::debug;

/// How sampled positions are chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SampleMode {
    /// Uniformly at random, without replacement
    #[default]
    Random,
    /// Evenly spaced: positions `i * floor(N / sample_size)`
    Systematic,
}

impl FromStr for SampleMode {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "random" => Ok(SampleMode::Random),
            "systematic" => Ok(SampleMode::Systematic),
            other => Err(EngineError::Config(format!("unknown sample mode '{other}'"))),
        }
    }
}

impl fmt::Display for SampleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleMode::Random => write!(f, "random"),
            SampleMode::Systematic => write!(f, "systematic"),
        }
    }
}

/// Options for [`sample`]
#[derive(Debug, Clone)]
pub struct SampleOptions {
    /// Position selection strategy
    pub mode: SampleMode,
    /// Copy annotations into the outputs (default true)
    pub copy_annotations: bool,
    /// Assign 1-based ordinals into this key across the kept output
    pub auto_number_as: Option<String>,
    /// Label of the kept output
    pub label: Option<String>,
}

impl Default for SampleOptions {
    fn default() -> Self {
        Self {
            mode: SampleMode::Random,
            copy_annotations: true,
            auto_number_as: None,
            label: None,
        }
    }
}

/// Keep exactly `sample_size` segments, discarding the complement
///
/// Sampling is positional, so no store access is needed. Random picks are
/// uniform without replacement and the kept output is restored to original
/// relative order; systematic picks take `sample_size` evenly spaced
/// positions starting at 0. `sample_size` must lie in `1..=len`. The
/// progress hook is advanced once per input segment.
pub fn sample<R: Rng + ?Sized>(
    segmentation: &Segmentation,
    sample_size: usize,
    options: &SampleOptions,
    rng: &mut R,
    mut progress: Option<&mut dyn Progress>,
) -> Result<Filtered> {
    debug!(
        segments = segmentation.len(),
        sample_size,
        mode = %options.mode,
        "sample"
    );
    let len = segmentation.len();
    if sample_size == 0 || sample_size > len {
        return Err(EngineError::Config(format!(
            "sample size {sample_size} out of range for {len} segments"
        )));
    }
    let picked: Vec<usize> = match options.mode {
        SampleMode::Random => {
            let mut indices = rand::seq::index::sample(rng, len, sample_size).into_vec();
            indices.sort_unstable();
            indices
        }
        SampleMode::Systematic => {
            let step = len / sample_size;
            (0..sample_size).map(|i| i * step).collect()
        }
    };
    let mut kept: Vec<Segment> = Vec::new();
    let mut discarded: Vec<Segment> = Vec::new();
    let mut next_pick = picked.iter().copied().peekable();
    for (index, segment) in segmentation.iter().enumerate() {
        let copy = segment.deep_copy(None, options.copy_annotations);
        if next_pick.peek() == Some(&index) {
            next_pick.next();
            kept.push(copy);
        } else {
            discarded.push(copy);
        }
        tick(&mut progress);
    }
    if let Some(key) = &options.auto_number_as {
        auto_number(&mut kept, key, progress.as_deref_mut());
    }
    Ok(Filtered {
        kept: Segmentation::from_segments(options.label.clone(), kept),
        discarded: Segmentation::from_segments(None, discarded),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tessella_core::{StringHandle, StringStore};

    fn letters(store: &mut StringStore, n: usize) -> (StringHandle, Segmentation) {
        let h = store.register("x".repeat(n));
        let segmentation = Segmentation::from_segments(
            None,
            (0..n).map(|i| Segment::new(h, Some(i), Some(i + 1))).collect(),
        );
        (h, segmentation)
    }

    #[test]
    fn random_sample_is_exact_and_order_preserving() {
        let mut store = StringStore::new();
        let (_, segmentation) = letters(&mut store, 10);
        let mut rng = StdRng::seed_from_u64(7);
        let result = sample(&segmentation, 4, &SampleOptions::default(), &mut rng, None).unwrap();
        assert_eq!(result.kept.len(), 4);
        assert_eq!(result.discarded.len(), 6);
        let starts: Vec<usize> = result.kept.iter().map(|s| s.start.unwrap()).collect();
        let mut sorted = starts.clone();
        sorted.sort_unstable();
        assert_eq!(starts, sorted); // original relative order
    }

    #[test]
    fn complement_is_exact() {
        let mut store = StringStore::new();
        let (_, segmentation) = letters(&mut store, 6);
        let mut rng = StdRng::seed_from_u64(3);
        let result = sample(&segmentation, 2, &SampleOptions::default(), &mut rng, None).unwrap();
        let mut all: Vec<usize> = result
            .kept
            .iter()
            .chain(result.discarded.iter())
            .map(|s| s.start.unwrap())
            .collect();
        all.sort_unstable();
        assert_eq!(all, (0..6).collect::<Vec<_>>());
    }

    #[test]
    fn systematic_sample_is_evenly_spaced() {
        let mut store = StringStore::new();
        let (_, segmentation) = letters(&mut store, 9);
        let mut rng = StdRng::seed_from_u64(0);
        let result = sample(
            &segmentation,
            3,
            &SampleOptions {
                mode: SampleMode::Systematic,
                ..Default::default()
            },
            &mut rng,
            None,
        )
        .unwrap();
        let starts: Vec<usize> = result.kept.iter().map(|s| s.start.unwrap()).collect();
        assert_eq!(starts, vec![0, 3, 6]); // step = floor(9 / 3)
    }

    #[test]
    fn out_of_range_sizes_are_config_errors() {
        let mut store = StringStore::new();
        let (_, segmentation) = letters(&mut store, 3);
        let mut rng = StdRng::seed_from_u64(0);
        assert!(matches!(
            sample(&segmentation, 0, &SampleOptions::default(), &mut rng, None),
            Err(EngineError::Config(_))
        ));
        assert!(matches!(
            sample(&segmentation, 4, &SampleOptions::default(), &mut rng, None),
            Err(EngineError::Config(_))
        ));
    }

    #[test]
    fn unknown_mode_string_is_a_config_error() {
        assert!(matches!(
            "stratified".parse::<SampleMode>(),
            Err(EngineError::Config(_))
        ));
        assert_eq!(
            "systematic".parse::<SampleMode>().unwrap(),
            SampleMode::Systematic
        );
    }
}
