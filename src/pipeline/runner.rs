//! Pipeline runner: orchestrates stage execution over a document.
//!
//! A [`Pipeline`] holds an ordered list of stages. Calling [`Pipeline::run`]
//! executes them in order, notifying a [`PipelineObserver`] at each
//! boundary. Sentence stages fan out across sentences with rayon; document
//! stages see the whole document.
//!
//! # Building from a spec
//!
//! ```no_run
//! # use lingrules::pipeline::runner::PipelineBuilder;
//! # use lingrules::pipeline::spec::PipelineSpec;
//! # use lingrules::pipeline::observer::NoopObserver;
//! # use lingrules::types::Document;
//! let spec = PipelineSpec::from_json(r#"{ "v": 1, "modules": { "chart": "grammar.dat" } }"#)?;
//! let pipeline = PipelineBuilder::from_spec(&spec, "data/es")?.build()?;
//! let mut doc = Document::default();
//! pipeline.run(&mut doc, &mut NoopObserver)?;
//! # Ok::<(), lingrules::LingError>(())
//! ```

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use rayon::prelude::*;

use crate::automaton::{Automaton, LocutionPolicy, ProperNounConfig, ProperNounPolicy};
use crate::chart::ChartParser;
use crate::dependency::DependencyMaker;
use crate::errors::{LingError, Result};
use crate::pipeline::observer::{PipelineObserver, StageClock, StageReportBuilder};
use crate::pipeline::spec::PipelineSpec;
use crate::pipeline::traits::{DocumentStage, SentenceStage};
use crate::pipeline::validation::ValidationEngine;
use crate::relax::RelaxTagger;
use crate::types::{Document, Sentence};

/// Enter a tracing span for a pipeline stage.
macro_rules! trace_stage {
    ($name:expr) => {
        let _span = tracing::info_span!("pipeline_stage", stage = $name).entered();
    };
}

/// One entry of a pipeline.
#[derive(Clone)]
pub enum Stage {
    Sentence(Arc<dyn SentenceStage>),
    Document(Arc<dyn DocumentStage>),
}

impl Stage {
    pub fn name(&self) -> &str {
        match self {
            Stage::Sentence(s) => s.name(),
            Stage::Document(d) => d.name(),
        }
    }
}

impl fmt::Debug for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Sentence(s) => write!(f, "Sentence({})", s.name()),
            Stage::Document(d) => write!(f, "Document({})", d.name()),
        }
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// An ordered, shareable list of analysis stages.
#[derive(Debug, Clone)]
pub struct Pipeline {
    stages: Vec<Stage>,
    max_sentence_words: Option<usize>,
    pool: Option<Arc<rayon::ThreadPool>>,
}

impl Pipeline {
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(Stage::name).collect()
    }

    /// Run every stage over `doc`, in order.
    ///
    /// Fails before any stage runs if a sentence exceeds the configured word
    /// limit, and stops at the first stage error.
    pub fn run(&self, doc: &mut Document, observer: &mut impl PipelineObserver) -> Result<()> {
        if let Some(limit) = self.max_sentence_words {
            if let Some((i, s)) = doc.sentences.iter().enumerate().find(|(_, s)| s.len() > limit) {
                return Err(LingError::invalid_input(format!(
                    "sentence {i} has {} words, limit is {limit}",
                    s.len()
                )));
            }
        }

        for stage in &self.stages {
            let name = stage.name();
            trace_stage!(name);
            observer.on_stage_start(name);
            let clock = StageClock::start();
            match stage {
                Stage::Sentence(s) => self.process_sentences(s.as_ref(), &mut doc.sentences)?,
                Stage::Document(d) => d.process(doc)?,
            }
            let report = StageReportBuilder::new(clock.elapsed())
                .sentences(doc.sentences.len())
                .words(doc.sentences.iter().map(Sentence::len).sum())
                .build();
            tracing::debug!(
                stage = name,
                elapsed_ms = report.elapsed.as_secs_f64() * 1000.0,
                words = report.words,
                "stage finished"
            );
            observer.on_stage_end(name, &report);
        }
        Ok(())
    }

    fn process_sentences(&self, stage: &dyn SentenceStage, sentences: &mut [Sentence]) -> Result<()> {
        match &self.pool {
            Some(pool) => pool.install(|| process_all(stage, sentences)),
            None => process_all(stage, sentences),
        }
    }
}

fn process_all(stage: &dyn SentenceStage, sentences: &mut [Sentence]) -> Result<()> {
    sentences.par_iter_mut().try_for_each(|s| stage.process(s))
}

// ============================================================================
// PipelineBuilder
// ============================================================================

/// Fluent builder for a [`Pipeline`]. Stages run in the order they are added.
///
/// ```
/// # use lingrules::pipeline::runner::PipelineBuilder;
/// # use lingrules::automaton::{Automaton, LocutionPolicy};
/// let locutions = LocutionPolicy::from_text("a_pesar_de a_pesar_de SPS00\n", "inline")?;
/// let pipeline = PipelineBuilder::new()
///     .sentence_stage(Automaton::new(locutions))
///     .build()?;
/// assert_eq!(pipeline.stage_names(), vec!["locutions"]);
/// # Ok::<(), lingrules::LingError>(())
/// ```
#[derive(Debug, Default)]
pub struct PipelineBuilder {
    stages: Vec<Stage>,
    threads: Option<usize>,
    max_sentence_words: Option<usize>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sentence_stage(mut self, stage: impl SentenceStage + 'static) -> Self {
        self.stages.push(Stage::Sentence(Arc::new(stage)));
        self
    }

    pub fn document_stage(mut self, stage: impl DocumentStage + 'static) -> Self {
        self.stages.push(Stage::Document(Arc::new(stage)));
        self
    }

    /// Use a dedicated pool of `n` threads instead of rayon's global pool.
    pub fn threads(mut self, n: usize) -> Self {
        self.threads = Some(n);
        self
    }

    pub fn max_sentence_words(mut self, n: usize) -> Self {
        self.max_sentence_words = Some(n);
        self
    }

    /// Validate `spec` and load every engine it names. Relative rule-file
    /// paths are resolved against `base_dir`.
    ///
    /// Engines are added in analysis order: locutions, proper nouns, tagger,
    /// chart parser, dependencies.
    pub fn from_spec(spec: &PipelineSpec, base_dir: impl AsRef<Path>) -> Result<Self> {
        let report = ValidationEngine::with_defaults().validate(spec);
        for warning in report.warnings() {
            tracing::warn!(%warning, "pipeline spec");
        }
        if report.has_errors() {
            let messages: Vec<String> = report.errors().map(ToString::to_string).collect();
            return Err(LingError::invalid_config(messages.join("; ")));
        }

        let base_dir = base_dir.as_ref();
        let modules = &spec.modules;
        let mut builder = Self::new();

        if let Some(path) = &modules.locutions {
            builder = builder.sentence_stage(Automaton::new(LocutionPolicy::from_file(base_dir.join(path))?));
        }
        if let Some(path) = &modules.proper_nouns {
            let config = ProperNounConfig::from_file(base_dir.join(path))?;
            builder = builder.sentence_stage(Automaton::new(ProperNounPolicy::new(config)?));
        }
        if let Some(tagger) = &modules.tagger {
            builder = builder.sentence_stage(RelaxTagger::from_file(base_dir.join(&tagger.grammar), tagger.config())?);
        }
        let mut start_symbol = None;
        if let Some(path) = &modules.chart {
            let parser = ChartParser::from_file(base_dir.join(path))?;
            start_symbol = Some(parser.start_symbol().to_string());
            builder = builder.sentence_stage(parser);
        }
        if let Some(path) = &modules.dependencies {
            let start = start_symbol.ok_or_else(|| LingError::invalid_config("dependencies requires a chart grammar"))?;
            builder = builder.sentence_stage(DependencyMaker::from_file(base_dir.join(path), start)?);
        }

        if let Some(n) = spec.runtime.threads {
            builder = builder.threads(n);
        }
        if let Some(n) = spec.runtime.max_sentence_words {
            builder = builder.max_sentence_words(n);
        }
        Ok(builder)
    }

    pub fn build(self) -> Result<Pipeline> {
        let pool = match self.threads {
            Some(0) => return Err(LingError::invalid_config("threads must be greater than 0")),
            Some(n) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .build()
                    .map_err(|e| LingError::invalid_config(format!("cannot start thread pool: {e}")))?;
                Some(Arc::new(pool))
            }
            None => None,
        };
        tracing::debug!(stages = self.stages.len(), threads = ?self.threads, "pipeline built");
        Ok(Pipeline {
            stages: self.stages,
            max_sentence_words: self.max_sentence_words,
            pool,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::observer::{NoopObserver, TimingObserver};
    use crate::types::Analysis;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const GRAMMAR: &str = "sn ==> DA, +NC .\nsn ==> +NC .\ngrup-verb ==> +VMIP3S0 .\n@START S .\n";
    const RULES: &str = "<GRPAR>\n\
                         10 - - (sn,grup-verb) top_right RELABEL -\n\
                         20 - - (grup-verb,sn) top_left RELABEL -\n\
                         </GRPAR>\n\
                         <GRLAB>\n\
                         grup-verb subj d.label=sn d.side=left\n\
                         grup-verb dobj d.label=sn d.side=right\n\
                         </GRLAB>\n";

    /// Adds one analysis per word from a small lexicon.
    struct Lexicon;

    impl SentenceStage for Lexicon {
        fn name(&self) -> &str {
            "lexicon"
        }

        fn process(&self, sentence: &mut Sentence) -> Result<()> {
            for w in &mut sentence.words {
                let (lemma, tag) = match w.form.as_str() {
                    "el" => ("el", "DA"),
                    "come" => ("comer", "VMIP3S0"),
                    "a_pesar_de" => ("a_pesar_de", "SPS00"),
                    f => (f, "NC"),
                };
                w.add_analysis(Analysis::new(lemma, tag));
            }
            Ok(())
        }
    }

    struct Counter(Arc<AtomicUsize>);

    impl DocumentStage for Counter {
        fn name(&self) -> &str {
            "counter"
        }

        fn process(&self, document: &mut Document) -> Result<()> {
            self.0.fetch_add(document.sentences.len(), Ordering::SeqCst);
            Ok(())
        }
    }

    struct Failing;

    impl SentenceStage for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn process(&self, sentence: &mut Sentence) -> Result<()> {
            if sentence.forms().contains(&"boom") {
                return Err(LingError::invalid_input("boom"));
            }
            Ok(())
        }
    }

    fn document() -> Document {
        Document::new(vec![
            Sentence::from_forms(&["el", "perro", "come", "carne"]),
            Sentence::from_forms(&["el", "gato", "come", "pescado"]),
        ])
    }

    #[test]
    fn test_stages_run_in_order_and_report() {
        let count = Arc::new(AtomicUsize::new(0));
        let parser = ChartParser::new(crate::chart::Grammar::from_text(GRAMMAR, "g", None).unwrap());
        let maker = DependencyMaker::from_text(RULES, "d", None, parser.start_symbol()).unwrap();
        let pipeline = PipelineBuilder::new()
            .sentence_stage(Lexicon)
            .sentence_stage(parser)
            .sentence_stage(maker)
            .document_stage(Counter(count.clone()))
            .build()
            .unwrap();

        let mut doc = document();
        let mut obs = TimingObserver::new();
        pipeline.run(&mut doc, &mut obs).unwrap();

        assert_eq!(obs.stage_names(), vec!["lexicon", "chart_parser", "dependencies", "counter"]);
        assert_eq!(obs.stages[0].1.words, 8);
        assert_eq!(count.load(Ordering::SeqCst), 2);
        for s in &doc.sentences {
            assert!(s.dep_tree.is_some());
        }
    }

    #[test]
    fn test_dedicated_pool_gives_same_result() {
        let parser = || ChartParser::new(crate::chart::Grammar::from_text(GRAMMAR, "g", None).unwrap());
        let global = PipelineBuilder::new()
            .sentence_stage(Lexicon)
            .sentence_stage(parser())
            .build()
            .unwrap();
        let pooled = PipelineBuilder::new()
            .sentence_stage(Lexicon)
            .sentence_stage(parser())
            .threads(2)
            .build()
            .unwrap();

        let (mut a, mut b) = (document(), document());
        global.run(&mut a, &mut NoopObserver).unwrap();
        pooled.run(&mut b, &mut NoopObserver).unwrap();
        let trees = |d: &Document| -> Vec<String> {
            d.sentences
                .iter()
                .map(|s| {
                    let t = s.parse_tree.as_ref().unwrap();
                    t.bracketed(t.root())
                })
                .collect()
        };
        assert_eq!(trees(&a), trees(&b));
    }

    #[test]
    fn test_stage_error_stops_the_run() {
        let count = Arc::new(AtomicUsize::new(0));
        let pipeline = PipelineBuilder::new()
            .sentence_stage(Failing)
            .document_stage(Counter(count.clone()))
            .build()
            .unwrap();
        let mut doc = Document::new(vec![Sentence::from_forms(&["boom"])]);
        let err = pipeline.run(&mut doc, &mut NoopObserver).unwrap_err();
        assert!(matches!(err, LingError::InvalidInput(_)));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_sentence_limit() {
        let pipeline = PipelineBuilder::new()
            .sentence_stage(Lexicon)
            .max_sentence_words(3)
            .build()
            .unwrap();
        let mut doc = document();
        assert!(pipeline.run(&mut doc, &mut NoopObserver).is_err());
        // nothing ran
        assert_eq!(doc.sentences[0].words[0].n_analyses(), 0);
    }

    #[test]
    fn test_zero_threads_rejected() {
        assert!(PipelineBuilder::new().threads(0).build().is_err());
    }

    #[test]
    fn test_from_spec_loads_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("loc.dat"), "a_pesar_de a_pesar_de SPS00\n").unwrap();
        std::fs::write(dir.path().join("chunk.gram"), GRAMMAR).unwrap();
        std::fs::write(dir.path().join("dep.dat"), RULES).unwrap();
        let spec = PipelineSpec::from_json(
            r#"{
                "v": 1,
                "modules": { "locutions": "loc.dat", "chart": "chunk.gram", "dependencies": "dep.dat" },
                "runtime": { "threads": 1, "max_sentence_words": 50 }
            }"#,
        )
        .unwrap();
        let pipeline = PipelineBuilder::from_spec(&spec, dir.path())
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(pipeline.stage_names(), vec!["locutions", "chart_parser", "dependencies"]);

        let mut doc = Document::new(vec![Sentence::from_forms(&["a", "pesar", "de", "todo"])]);
        pipeline.run(&mut doc, &mut NoopObserver).unwrap();
        assert_eq!(doc.sentences[0].forms(), vec!["a_pesar_de", "todo"]);
        assert!(doc.sentences[0].parse_tree.is_some());
    }

    #[test]
    fn test_from_spec_rejects_invalid_spec() {
        let spec = PipelineSpec::from_json(r#"{ "v": 1, "modules": { "dependencies": "dep.dat" } }"#).unwrap();
        let err = PipelineBuilder::from_spec(&spec, ".").unwrap_err();
        assert!(matches!(err, LingError::InvalidConfig(ref m) if m.contains("missing_stage")));
    }

    #[test]
    fn test_from_spec_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let spec = PipelineSpec::from_json(r#"{ "v": 1, "modules": { "chart": "nope.gram" } }"#).unwrap();
        let err = PipelineBuilder::from_spec(&spec, dir.path()).unwrap_err();
        assert!(matches!(err, LingError::Io { .. }));
    }
}
