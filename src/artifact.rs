//! Percentile track cleaning
//!
//! Two passes per track: a plausibility floor, then flat-line detection on
//! what survived. Cleaning only ever nulls values; it never interpolates.

use crate::config::BiomarkerConfig;
use crate::models::{Percentile, PercentileCurve, PercentileTrack, HOURS_PER_DAY};

/// How many points each pass removed from a track
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterStats {
    pub below_floor: usize,
    pub flat_line: usize,
}

impl FilterStats {
    pub fn total(&self) -> usize {
        self.below_floor + self.flat_line
    }
}

/// Nulls implausible and stalled-sensor points in percentile tracks
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArtifactFilter {
    floor: f64,
    min_run: usize,
}

impl ArtifactFilter {
    /// A run needs two anchors, so `min_run` is raised to at least 2
    pub fn new(floor: f64, min_run: usize) -> Self {
        Self {
            floor,
            min_run: min_run.max(2),
        }
    }

    pub fn for_biomarker(config: &BiomarkerConfig) -> Self {
        Self::new(config.plausibility_floor, config.flat_line_min_run)
    }

    pub fn clean_track(&self, track: &PercentileTrack) -> (PercentileTrack, FilterStats) {
        let mut values = *track.values();
        let mut stats = FilterStats::default();

        for slot in values.iter_mut() {
            if let Some(v) = *slot {
                if !v.is_finite() || v < self.floor {
                    *slot = None;
                    stats.below_floor += 1;
                }
            }
        }

        stats.flat_line = self.null_flat_lines(&mut values);
        (PercentileTrack::new(values), stats)
    }

    /// Keep the first and last point of each run of `min_run` or more
    /// exactly equal values and null the interior. Runs do not overlap.
    fn null_flat_lines(&self, values: &mut [Option<f64>; HOURS_PER_DAY]) -> usize {
        let mut nulled = 0;
        let mut start = 0;

        while start < HOURS_PER_DAY {
            let Some(anchor) = values[start] else {
                start += 1;
                continue;
            };

            let mut end = start;
            while end + 1 < HOURS_PER_DAY && values[end + 1] == Some(anchor) {
                end += 1;
            }

            if end - start + 1 >= self.min_run {
                for slot in &mut values[start + 1..end] {
                    *slot = None;
                }
                nulled += end - start - 1;
            }
            start = end + 1;
        }

        nulled
    }

    /// Clean every track independently
    pub fn clean_curve(&self, curve: &PercentileCurve) -> (PercentileCurve, Vec<(Percentile, FilterStats)>) {
        let mut cleaned = PercentileCurve::default();
        let mut stats = Vec::with_capacity(Percentile::ALL.len());

        for percentile in Percentile::ALL {
            let (track, track_stats) = self.clean_track(curve.track(percentile));
            *cleaned.track_mut(percentile) = track;
            stats.push((percentile, track_stats));
        }

        (cleaned, stats)
    }
}
