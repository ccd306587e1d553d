//! Pipeline observer: hooks for logging, profiling, and debugging.
//!
//! Observers receive notifications at stage boundaries without coupling to
//! stage logic. Use cases include timing stages and emitting structured
//! telemetry about how much of the document each engine touched.

use std::time::{Duration, Instant};

use serde::Serialize;

/// Callbacks at stage boundaries. Every method has an empty default.
pub trait PipelineObserver {
    fn on_stage_start(&mut self, _stage: &str) {}

    fn on_stage_end(&mut self, _stage: &str, _report: &StageReport) {}
}

/// Observer that ignores every callback.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}

// ============================================================================
// StageReport
// ============================================================================

/// What one stage did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageReport {
    #[serde(serialize_with = "serialize_millis")]
    pub elapsed: Duration,
    /// Sentences the stage processed.
    pub sentences: usize,
    /// Word count over all sentences after the stage ran.
    pub words: usize,
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64() * 1000.0)
}

impl StageReport {
    pub fn new(elapsed: Duration) -> Self {
        Self {
            elapsed,
            sentences: 0,
            words: 0,
        }
    }
}

/// Fluent construction of a [`StageReport`].
#[derive(Debug, Clone)]
pub struct StageReportBuilder {
    report: StageReport,
}

impl StageReportBuilder {
    pub fn new(elapsed: Duration) -> Self {
        Self {
            report: StageReport::new(elapsed),
        }
    }

    pub fn sentences(mut self, n: usize) -> Self {
        self.report.sentences = n;
        self
    }

    pub fn words(mut self, n: usize) -> Self {
        self.report.words = n;
        self
    }

    pub fn build(self) -> StageReport {
        self.report
    }
}

/// Wall-clock timer for one stage.
#[derive(Debug, Clone, Copy)]
pub struct StageClock {
    started: Instant,
}

impl StageClock {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

// ============================================================================
// TimingObserver
// ============================================================================

/// Records every finished stage, in order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TimingObserver {
    pub stages: Vec<(String, StageReport)>,
}

impl TimingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total(&self) -> Duration {
        self.stages.iter().map(|(_, r)| r.elapsed).sum()
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|(name, _)| name.as_str()).collect()
    }
}

impl PipelineObserver for TimingObserver {
    fn on_stage_end(&mut self, stage: &str, report: &StageReport) {
        self.stages.push((stage.to_string(), report.clone()));
    }
}
