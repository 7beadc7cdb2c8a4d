//! The ordered log of [Sample]s taken while a stimulus is playing.

use crate::affect_mapper::{AffectPoint, Quadrant};
use log::debug;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One logged emotional report.
///
/// The quadrant is computed from the point on construction and cannot be
/// set on its own.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    elapsed: Duration,
    stimulus_id: String,
    point: AffectPoint,
    quadrant: Quadrant,
}

impl Sample {
    /// Builds a sample taken `elapsed` after logging started for
    /// `stimulus_id`.
    pub fn new(elapsed: Duration, stimulus_id: impl Into<String>, point: AffectPoint) -> Self {
        Sample {
            elapsed,
            stimulus_id: stimulus_id.into(),
            point,
            quadrant: point.quadrant(),
        }
    }

    /// Time since logging started when the sample was taken.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// The stimulus that was active.
    pub fn stimulus_id(&self) -> &str {
        &self.stimulus_id
    }

    /// The reported point.
    pub fn point(&self) -> AffectPoint {
        self.point
    }

    /// Shorthand for `point().valence`.
    pub fn valence(&self) -> f64 {
        self.point.valence
    }

    /// Shorthand for `point().arousal`.
    pub fn arousal(&self) -> f64 {
        self.point.arousal
    }

    /// The quadrant of the reported point.
    pub fn quadrant(&self) -> Quadrant {
        self.quadrant
    }
}

/// Whether repeated identical reports are kept.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
pub enum DedupPolicy {
    /// Every sample is appended
    #[default]
    KeepAll,
    /// A sample with the same (valence, arousal) as the previous sample is
    /// dropped
    SkipConsecutive,
}

/// An immutable, ordered copy of a [SampleStore].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleSnapshot {
    samples: Vec<Sample>,
}

impl SampleSnapshot {
    /// The samples in insertion order.
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Iterates over the samples in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, Sample> {
        self.samples.iter()
    }

    /// Number of samples captured.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether no samples were captured.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl<'a> IntoIterator for &'a SampleSnapshot {
    type Item = &'a Sample;
    type IntoIter = std::slice::Iter<'a, Sample>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Append-only storage for the samples of the current stimulus.
#[derive(Debug, Clone, Default)]
pub struct SampleStore {
    samples: Vec<Sample>,
    dedup: DedupPolicy,
}

impl SampleStore {
    /// An empty store with the given [DedupPolicy].
    pub fn new(dedup: DedupPolicy) -> Self {
        Self {
            samples: Vec::new(),
            dedup,
        }
    }

    /// Appends a sample, returning `false` if the dedup policy dropped it.
    pub fn append(&mut self, sample: Sample) -> bool {
        if self.dedup == DedupPolicy::SkipConsecutive {
            if let Some(last) = self.last() {
                if last.point == sample.point {
                    debug!(
                        "Skipping repeated sample at ({}, {})",
                        sample.valence(),
                        sample.arousal()
                    );
                    return false;
                }
            }
        }

        self.samples.push(sample);
        true
    }

    /// Removes every sample.
    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Copies the current contents for export.
    pub fn snapshot(&self) -> SampleSnapshot {
        SampleSnapshot {
            samples: self.samples.clone(),
        }
    }

    /// The samples in insertion order.
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// The most recently appended sample.
    pub fn last(&self) -> Option<&Sample> {
        self.samples.last()
    }

    /// Number of stored samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(secs: u64, valence: f64, arousal: f64) -> Sample {
        Sample::new(
            Duration::from_secs(secs),
            "trackA",
            AffectPoint { valence, arousal },
        )
    }

    #[test]
    fn quadrant_follows_point() {
        let s = sample(0, -0.2, 0.7);
        assert_eq!(s.quadrant(), Quadrant::Yellow);
        assert_eq!(s.stimulus_id(), "trackA");
    }

    #[test]
    fn append_keeps_order() {
        let mut store = SampleStore::default();
        assert!(store.append(sample(1, 0.1, 0.1)));
        assert!(store.append(sample(2, 0.1, 0.1)));
        assert!(store.append(sample(3, -0.5, 0.2)));

        let secs: Vec<u64> = store.samples().iter().map(|s| s.elapsed().as_secs()).collect();
        assert_eq!(secs, vec![1, 2, 3]);
    }

    #[test]
    fn dedup_skips_only_consecutive_repeats() {
        let mut store = SampleStore::new(DedupPolicy::SkipConsecutive);
        assert!(store.append(sample(1, 0.1, 0.1)));
        assert!(!store.append(sample(2, 0.1, 0.1)));
        assert!(store.append(sample(3, -0.5, 0.2)));
        assert!(store.append(sample(4, 0.1, 0.1)));
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn snapshot_is_detached() {
        let mut store = SampleStore::default();
        store.append(sample(1, 0.1, 0.1));
        let snap = store.snapshot();

        store.append(sample(2, 0.3, 0.3));
        store.clear();

        assert_eq!(snap.len(), 1);
        assert!(store.is_empty());
        assert_eq!(snap.samples()[0].elapsed(), Duration::from_secs(1));
    }

    #[test]
    fn last_tracks_the_newest_sample() {
        let mut store = SampleStore::new(DedupPolicy::SkipConsecutive);
        assert!(store.last().is_none());
        store.append(sample(1, 0.1, 0.1));
        store.append(sample(2, 0.4, -0.4));
        store.append(sample(3, 0.4, -0.4));
        assert_eq!(store.last().map(|s| s.elapsed()), Some(Duration::from_secs(2)));

        let snap = store.snapshot();
        let quadrants: Vec<Quadrant> = snap.iter().map(|s| s.quadrant()).collect();
        assert_eq!(quadrants, vec![Quadrant::Green, Quadrant::Blue]);
    }
}
