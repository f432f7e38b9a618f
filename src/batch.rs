//! Parallel batch analysis using rayon
//!
//! Each request is independent, so a batch is a plain parallel map. Output
//! order always matches input order.

use rayon::prelude::*;
use std::time::Instant;
use tracing::{info, warn};

use crate::error::{AgpError, Result};
use crate::models::AnalyticsResult;
use crate::report::{AmbulatoryProfileEngine, AnalyticsRequest};

/// Configuration for batch runs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchConfig {
    /// Worker threads; `None` uses the rayon global pool
    pub num_threads: Option<usize>,
}

/// Per-request outcomes of one batch, in input order
#[derive(Debug)]
pub struct BatchOutcome {
    pub results: Vec<Result<AnalyticsResult>>,
    pub duration_ms: u128,
}

impl BatchOutcome {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }

    /// Index and error of every rejected request
    pub fn errors(&self) -> impl Iterator<Item = (usize, &AgpError)> {
        self.results
            .iter()
            .enumerate()
            .filter_map(|(index, result)| result.as_ref().err().map(|e| (index, e)))
    }
}

/// Runs many analytics requests against one engine
pub struct BatchAnalyzer<'a> {
    engine: AmbulatoryProfileEngine<'a>,
    config: BatchConfig,
}

impl<'a> BatchAnalyzer<'a> {
    pub fn new(engine: AmbulatoryProfileEngine<'a>) -> Self {
        Self::with_config(engine, BatchConfig::default())
    }

    pub fn with_config(engine: AmbulatoryProfileEngine<'a>, config: BatchConfig) -> Self {
        Self { engine, config }
    }

    pub fn analyze_all(&self, requests: &[AnalyticsRequest]) -> Result<BatchOutcome> {
        let start = Instant::now();

        let results = match self.config.num_threads {
            Some(num_threads) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(num_threads)
                    .build()
                    .map_err(|e| AgpError::Configuration(format!("Failed to create thread pool: {}", e)))?;
                pool.install(|| self.run(requests))
            }
            None => self.run(requests),
        };

        let outcome = BatchOutcome {
            results,
            duration_ms: start.elapsed().as_millis(),
        };

        for (index, error) in outcome.errors() {
            warn!(index, %error, "batch request rejected");
        }
        info!(
            total = requests.len(),
            succeeded = outcome.succeeded(),
            failed = outcome.failed(),
            duration_ms = outcome.duration_ms as u64,
            "batch analysis complete"
        );
        Ok(outcome)
    }

    fn run(&self, requests: &[AnalyticsRequest]) -> Vec<Result<AnalyticsResult>> {
        requests
            .par_iter()
            .map(|request| self.engine.analyze(request))
            .collect()
    }
}
