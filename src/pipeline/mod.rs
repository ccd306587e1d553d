//! Stage composition: spec, validation, stage traits, observer and runner.

pub mod observer;
pub mod runner;
pub mod spec;
pub mod traits;
pub mod validation;

pub use observer::{NoopObserver, PipelineObserver, StageReport, TimingObserver};
pub use runner::{Pipeline, PipelineBuilder, Stage};
pub use spec::PipelineSpec;
pub use traits::{DocumentStage, SentenceStage};
pub use validation::{ValidationEngine, ValidationReport};
