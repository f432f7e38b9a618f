//! Hourly percentile curves from raw readings
//!
//! Upstream services usually deliver the percentile arrays pre-computed.
//! This builder produces the same shape from timestamped readings so local
//! data can go through the same pipeline.

use statrs::statistics::{Data, OrderStatistics};
use chrono::Timelike;
use tracing::debug;

use crate::config::BiomarkerConfig;
use crate::models::{Percentile, PercentileCurve, PercentileTrack, Reading, HOURS_PER_DAY};

/// Buckets readings by UTC hour of day and takes percentiles per bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HourlyPercentileBuilder {
    min_readings_per_hour: usize,
}

impl Default for HourlyPercentileBuilder {
    fn default() -> Self {
        Self::new(3)
    }
}

impl HourlyPercentileBuilder {
    pub fn new(min_readings_per_hour: usize) -> Self {
        Self {
            min_readings_per_hour: min_readings_per_hour.max(1),
        }
    }

    pub fn from_config(config: &BiomarkerConfig) -> Self {
        Self::new(config.min_readings_per_hour)
    }

    /// Build all five tracks; hours with too few finite readings stay null
    pub fn build(&self, readings: &[Reading]) -> PercentileCurve {
        let mut buckets: Vec<Vec<f64>> = vec![Vec::new(); HOURS_PER_DAY];
        let mut skipped = 0usize;

        for reading in readings {
            if reading.value.is_finite() {
                buckets[reading.timestamp.hour() as usize].push(reading.value);
            } else {
                skipped += 1;
            }
        }

        let mut curve = PercentileCurve::default();
        for percentile in Percentile::ALL {
            let mut values = [None; HOURS_PER_DAY];
            for (hour, bucket) in buckets.iter().enumerate() {
                if bucket.len() >= self.min_readings_per_hour {
                    let mut data = Data::new(bucket.clone());
                    values[hour] = Some(data.percentile(percentile.rank()));
                }
            }
            *curve.track_mut(percentile) = PercentileTrack::new(values);
        }

        debug!(
            readings = readings.len(),
            skipped,
            hours = buckets
                .iter()
                .filter(|b| b.len() >= self.min_readings_per_hour)
                .count(),
            "built hourly percentile curve"
        );
        curve
    }
}
