//! Stage trait definitions for the pipeline.
//!
//! Each engine of the crate sits behind one of two stage boundaries:
//! [`SentenceStage`] for engines that work one sentence at a time (and can
//! therefore run sentences in parallel), and [`DocumentStage`] for engines
//! that need the whole document, such as coreference.

use crate::automaton::{Automaton, LocutionPolicy, ProperNounPolicy};
use crate::chart::ChartParser;
use crate::coref::CorefResolver;
use crate::dependency::DependencyMaker;
use crate::errors::Result;
use crate::relax::RelaxTagger;
use crate::types::{Document, Sentence};

/// Stage names used in tracing spans and observer callbacks.
pub const STAGE_LOCUTIONS: &str = "locutions";
pub const STAGE_PROPER_NOUNS: &str = "proper_nouns";
pub const STAGE_TAGGER: &str = "tagger";
pub const STAGE_CHART: &str = "chart_parser";
pub const STAGE_DEPENDENCIES: &str = "dependencies";
pub const STAGE_COREF: &str = "coref";

// ============================================================================
// Stage traits
// ============================================================================

/// An analysis step applied to each sentence independently.
///
/// # Contract
///
/// - **Input**: a mutable [`Sentence`], modified in place.
/// - **Independence**: the result for one sentence never depends on another,
///   so the runner may process sentences concurrently.
pub trait SentenceStage: Send + Sync {
    fn name(&self) -> &str;

    fn process(&self, sentence: &mut Sentence) -> Result<()>;
}

/// An analysis step over a whole document.
pub trait DocumentStage: Send + Sync {
    fn name(&self) -> &str;

    fn process(&self, document: &mut Document) -> Result<()>;
}

// ─── Engine impls ───────────────────────────────────────────────────────────

impl SentenceStage for Automaton<LocutionPolicy> {
    fn name(&self) -> &str {
        STAGE_LOCUTIONS
    }

    fn process(&self, sentence: &mut Sentence) -> Result<()> {
        self.annotate(sentence);
        Ok(())
    }
}

impl SentenceStage for Automaton<ProperNounPolicy> {
    fn name(&self) -> &str {
        STAGE_PROPER_NOUNS
    }

    fn process(&self, sentence: &mut Sentence) -> Result<()> {
        self.annotate(sentence);
        Ok(())
    }
}

impl SentenceStage for RelaxTagger {
    fn name(&self) -> &str {
        STAGE_TAGGER
    }

    fn process(&self, sentence: &mut Sentence) -> Result<()> {
        self.analyze_sentence(sentence)
    }
}

impl SentenceStage for ChartParser {
    fn name(&self) -> &str {
        STAGE_CHART
    }

    fn process(&self, sentence: &mut Sentence) -> Result<()> {
        self.analyze_sentence(sentence);
        Ok(())
    }
}

impl SentenceStage for DependencyMaker {
    fn name(&self) -> &str {
        STAGE_DEPENDENCIES
    }

    fn process(&self, sentence: &mut Sentence) -> Result<()> {
        self.analyze_sentence(sentence);
        Ok(())
    }
}

impl DocumentStage for CorefResolver {
    fn name(&self) -> &str {
        STAGE_COREF
    }

    fn process(&self, document: &mut Document) -> Result<()> {
        self.analyze(document);
        Ok(())
    }
}
