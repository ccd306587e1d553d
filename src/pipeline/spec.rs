//! Pipeline description types.
//!
//! A [`PipelineSpec`] names the rule files of each engine, the runtime
//! limits, and the strictness setting. It is checked by the
//! [`super::validation::ValidationEngine`] and turned into a runnable
//! pipeline by [`super::runner::PipelineBuilder::from_spec`].
//!
//! # JSON shape
//!
//! ```json
//! {
//!   "v": 1,
//!   "modules": {
//!     "locutions": "locucions.dat",
//!     "proper_nouns": "np.dat",
//!     "tagger": { "grammar": "constr_gram.dat", "retokenize": true, "force": "tagger" },
//!     "chart": "grammar-chunk.dat",
//!     "dependencies": "dependences.dat"
//!   },
//!   "runtime": { "threads": 4 },
//!   "strict": false
//! }
//! ```

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::relax::{ForceSelect, RelaxConfig, TaggerConfig};

/// Top-level pipeline description (v1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSpec {
    /// Spec version (currently `1`).
    pub v: u32,

    #[serde(default)]
    pub modules: ModuleSet,

    #[serde(default)]
    pub runtime: RuntimeSpec,

    /// If `true`, unrecognized fields are errors; if `false`, warnings.
    #[serde(default)]
    pub strict: bool,

    /// Fields not recognized by the schema.
    #[serde(flatten)]
    pub unknown_fields: HashMap<String, serde_json::Value>,
}

impl PipelineSpec {
    pub fn from_json(json: &str) -> crate::errors::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Rule files of the engines to run, in pipeline order. Absent engines are
/// skipped.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModuleSet {
    /// Multiword locution lexicon.
    #[serde(default)]
    pub locutions: Option<PathBuf>,

    /// Proper-noun recognizer settings.
    #[serde(default)]
    pub proper_nouns: Option<PathBuf>,

    #[serde(default)]
    pub tagger: Option<TaggerModule>,

    /// Chunk grammar.
    #[serde(default)]
    pub chart: Option<PathBuf>,

    /// Dependency rules. Needs `chart`.
    #[serde(default)]
    pub dependencies: Option<PathBuf>,

    #[serde(flatten)]
    pub unknown_fields: HashMap<String, serde_json::Value>,
}

impl ModuleSet {
    pub fn is_empty(&self) -> bool {
        self.locutions.is_none()
            && self.proper_nouns.is_none()
            && self.tagger.is_none()
            && self.chart.is_none()
            && self.dependencies.is_none()
    }
}

/// Relaxation tagger: constraint grammar plus solver settings. Unset solver
/// parameters take their defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaggerModule {
    pub grammar: PathBuf,

    #[serde(default)]
    pub retokenize: bool,

    #[serde(default)]
    pub force: ForceSelect,

    #[serde(default)]
    pub max_iterations: Option<usize>,

    #[serde(default)]
    pub scale_factor: Option<f64>,

    #[serde(default)]
    pub epsilon: Option<f64>,

    #[serde(flatten)]
    pub unknown_fields: HashMap<String, serde_json::Value>,
}

impl TaggerModule {
    pub fn config(&self) -> TaggerConfig {
        let defaults = RelaxConfig::default();
        let relax = RelaxConfig::new()
            .with_max_iterations(self.max_iterations.unwrap_or(defaults.max_iterations))
            .with_scale_factor(self.scale_factor.unwrap_or(defaults.scale_factor))
            .with_epsilon(self.epsilon.unwrap_or(defaults.epsilon));
        TaggerConfig::new()
            .with_relax(relax)
            .with_retokenize(self.retokenize)
            .with_force(self.force)
    }
}

/// Runtime execution limits.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeSpec {
    /// Worker threads for sentence stages; the global pool when unset.
    #[serde(default)]
    pub threads: Option<usize>,

    /// Reject documents with a longer sentence.
    #[serde(default)]
    pub max_sentence_words: Option<usize>,

    #[serde(flatten)]
    pub unknown_fields: HashMap<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_minimal_spec() {
        let spec = PipelineSpec::from_json(r#"{ "v": 1 }"#).unwrap();
        assert_eq!(spec.v, 1);
        assert!(spec.modules.is_empty());
        assert!(!spec.strict);
    }

    #[test]
    fn test_deserialize_full_spec() {
        let json = r#"{
            "v": 1,
            "modules": {
                "locutions": "loc.dat",
                "tagger": { "grammar": "cg.dat", "force": "retokenization", "epsilon": 0.01 },
                "chart": "chunk.gram",
                "dependencies": "dep.dat"
            },
            "runtime": { "threads": 2, "max_sentence_words": 300 },
            "strict": true
        }"#;
        let spec = PipelineSpec::from_json(json).unwrap();
        assert_eq!(spec.modules.locutions, Some(PathBuf::from("loc.dat")));
        let tagger = spec.modules.tagger.as_ref().unwrap();
        let config = tagger.config();
        assert_eq!(config.force, ForceSelect::Retokenization);
        assert_eq!(config.relax.epsilon, 0.01);
        assert_eq!(config.relax.max_iterations, RelaxConfig::default().max_iterations);
        assert_eq!(spec.runtime.threads, Some(2));
        assert!(spec.strict);
    }

    #[test]
    fn test_unknown_fields_captured() {
        let json = r#"{
            "v": 1,
            "bogus_top_level": 42,
            "modules": { "chart": "g", "parser": "x", "tagger": { "grammar": "cg", "beam": 3 } },
            "runtime": { "timeout": 5 }
        }"#;
        let spec = PipelineSpec::from_json(json).unwrap();
        assert!(spec.unknown_fields.contains_key("bogus_top_level"));
        assert!(spec.modules.unknown_fields.contains_key("parser"));
        assert!(spec.modules.tagger.unwrap().unknown_fields.contains_key("beam"));
        assert!(spec.runtime.unknown_fields.contains_key("timeout"));
    }

    #[test]
    fn test_bad_json_is_an_error() {
        assert!(PipelineSpec::from_json(r#"{ "modules": {} }"#).is_err());
        assert!(PipelineSpec::from_json(r#"{ "v": 1, "modules": { "tagger": { "force": "always" } } }"#).is_err());
    }
}
