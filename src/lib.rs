//! # lingrules
//!
//! Rule engines for a linguistic analysis pipeline:
//!
//! - [`automaton`]: finite-state recognition of multiword locutions and
//!   capitalised proper nouns, merging matched words into one.
//! - [`chart`]: a bottom-up chart parser driven by a chunk grammar with
//!   symbol attributes that resolve ambiguity.
//! - [`dependency`]: completion of chunk parses into full trees and
//!   labelling of the resulting dependency tree.
//! - [`relax`]: a relaxation-labelling solver and the constraint-grammar
//!   tagger built on it.
//! - [`coref`]: a mention-pair coreference loop over parsed documents.
//! - [`pipeline`]: a JSON pipeline spec, its validation, and a runner that
//!   applies the engines to a [`Document`] with rayon.
//!
//! ## Quick start
//!
//! ```
//! use lingrules::automaton::{Automaton, LocutionPolicy};
//! use lingrules::Sentence;
//!
//! let locutions = Automaton::new(LocutionPolicy::from_text("a_pesar_de a_pesar_de SPS00\n", "inline")?);
//! let mut sentence = Sentence::from_forms(&["a", "pesar", "de", "todo"]);
//! locutions.annotate(&mut sentence);
//! assert_eq!(sentence.forms(), vec!["a_pesar_de", "todo"]);
//! # Ok::<(), lingrules::LingError>(())
//! ```
//!
//! Rule files are loaded once and shared read-only; every loader reports
//! all problems of a file at once through [`LoadReport`].

pub mod automaton;
pub mod chart;
pub mod coref;
pub mod dependency;
pub mod diagnostics;
pub mod errors;
pub mod matching;
pub mod pipeline;
pub mod relax;
pub mod sections;
pub mod tree;
pub mod types;

pub use automaton::{Automaton, LocutionPolicy, ProperNounConfig, ProperNounPolicy};
pub use chart::{ChartParser, Grammar};
pub use coref::{Classifier, CorefConfig, CorefResolver, MentionEncoder};
pub use dependency::{DependencyMaker, SemanticDb};
pub use diagnostics::{Diagnostic, DiagnosticCode, LoadReport, Severity};
pub use errors::{LingError, Result};
pub use pipeline::{Pipeline, PipelineBuilder, PipelineSpec};
pub use relax::{ConstraintGrammar, Relax, RelaxConfig, RelaxTagger, TaggerConfig};
pub use tree::{NodeId, Tree};
pub use types::{Analysis, DepNode, DepTree, Document, ParseNode, ParseTree, Sentence, Word};
