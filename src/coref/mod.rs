//! Coreference resolution over noun-phrase mentions
//!
//! Mentions are the outermost noun-phrase constituents of each sentence's
//! parse tree. Every mention is paired with the mentions before it, nearest
//! first, and a [`Classifier`] decides from the features a
//! [`MentionEncoder`] extracts whether the pair corefers. The first accepted
//! antecedent links the two mentions in the document's coreference groups.

use std::fmt::Debug;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::errors::{LingError, Result};
use crate::tree::NodeId;
use crate::types::{Document, MentionRef, ParseTree, Sentence};

/// Label a classifier gives to coreferent pairs.
pub const POSITIVE: &str = "Positive";

// ─── Mentions ───────────────────────────────────────────────────────────────

/// A candidate mention with the words it covers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mention {
    pub id: MentionRef,
    /// Position of the first covered word, counted across the document.
    pub start: usize,
    /// One past the last covered word.
    pub end: usize,
    /// Lowercased forms.
    pub tokens: Vec<String>,
    /// Lowercased tags.
    pub tags: Vec<String>,
}

impl Mention {
    pub fn sentence(&self) -> usize {
        self.id.sentence
    }

    /// Tokens joined by spaces.
    pub fn text(&self) -> String {
        self.tokens.join(" ")
    }
}

// ─── Seams ──────────────────────────────────────────────────────────────────

/// Turns a (candidate antecedent, mention) pair into feature indices.
pub trait MentionEncoder: Debug + Send + Sync {
    fn encode(&self, antecedent: &Mention, mention: &Mention) -> Vec<usize>;
}

/// A trained multi-label classifier over sparse binary features.
pub trait Classifier: Debug + Send + Sync {
    fn n_labels(&self) -> usize;

    fn label(&self, index: usize) -> &str;

    /// One score per label.
    fn classify(&self, features: &[usize]) -> Vec<f64>;

    /// Label to use when every score is negative.
    fn default_class(&self) -> Option<&str> {
        None
    }
}

// ─── Resolver ───────────────────────────────────────────────────────────────

/// Resolver parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorefConfig {
    /// Constituent label of mentions.
    pub mention_label: String,
    /// How many preceding mentions are tried as antecedents.
    pub max_antecedents: usize,
}

impl Default for CorefConfig {
    fn default() -> Self {
        Self {
            mention_label: "sn".to_string(),
            max_antecedents: 20,
        }
    }
}

impl CorefConfig {
    pub fn with_mention_label(mut self, label: impl Into<String>) -> Self {
        self.mention_label = label.into();
        self
    }

    pub fn with_max_antecedents(mut self, n: usize) -> Self {
        self.max_antecedents = n;
        self
    }
}

#[derive(Debug, Clone)]
pub struct CorefResolver {
    encoder: Arc<dyn MentionEncoder>,
    classifier: Arc<dyn Classifier>,
    config: CorefConfig,
}

impl CorefResolver {
    pub fn new(encoder: Arc<dyn MentionEncoder>, classifier: Arc<dyn Classifier>) -> Result<Self> {
        Self::with_config(encoder, classifier, CorefConfig::default())
    }

    pub fn with_config(
        encoder: Arc<dyn MentionEncoder>,
        classifier: Arc<dyn Classifier>,
        config: CorefConfig,
    ) -> Result<Self> {
        if classifier.n_labels() == 0 {
            return Err(LingError::invalid_config("coreference classifier has no labels"));
        }
        Ok(Self {
            encoder,
            classifier,
            config,
        })
    }

    pub fn config(&self) -> &CorefConfig {
        &self.config
    }

    /// Collect the mentions of every parsed sentence, in document order.
    pub fn mentions(&self, doc: &Document) -> Vec<Mention> {
        let mut out = Vec::new();
        let mut position = 0;
        for (i, s) in doc.sentences.iter().enumerate() {
            if let Some(tree) = &s.parse_tree {
                self.collect(i, s, tree, tree.root(), &mut position, &mut out);
            }
        }
        out
    }

    fn collect(
        &self,
        sentence: usize,
        s: &Sentence,
        tree: &ParseTree,
        node: NodeId,
        position: &mut usize,
        out: &mut Vec<Mention>,
    ) {
        if tree.is_leaf(node) {
            *position += 1;
            return;
        }
        if tree.get(node).label != self.config.mention_label {
            for &c in tree.children(node) {
                self.collect(sentence, s, tree, c, position, out);
            }
            return;
        }
        let start = *position;
        let (tokens, tags): (Vec<String>, Vec<String>) = tree
            .leaves(node)
            .into_iter()
            .filter_map(|leaf| tree.get(leaf).word.and_then(|w| s.words.get(w)))
            .map(|w| (w.lowercase_form(), w.tag().to_lowercase()))
            .unzip();
        *position += tree.leaves(node).len();
        out.push(Mention {
            id: MentionRef { sentence, node },
            start,
            end: *position,
            tokens,
            tags,
        });
    }

    /// Does `mention` corefer with `antecedent`?
    pub fn corefer(&self, antecedent: &Mention, mention: &Mention) -> bool {
        let features = self.encoder.encode(antecedent, mention);
        let scores = self.classifier.classify(&features);
        let mut best = 0;
        for (i, &s) in scores.iter().enumerate().skip(1) {
            if s > scores[best] {
                best = i;
            }
        }
        let mut label = self.classifier.label(best);
        if scores.get(best).is_some_and(|&s| s < 0.0) {
            if let Some(default) = self.classifier.default_class() {
                label = default;
            }
        }
        label == POSITIVE
    }

    /// Link each mention to its nearest accepted antecedent.
    pub fn analyze(&self, doc: &mut Document) {
        let mentions = self.mentions(doc);
        let mut links = 0;
        for (j, mention) in mentions.iter().enumerate() {
            let window = j.saturating_sub(self.config.max_antecedents);
            if let Some(antecedent) = mentions[window..j]
                .iter()
                .rev()
                .find(|a| self.corefer(a, mention))
            {
                tracing::trace!(
                    antecedent = %antecedent.text(),
                    mention = %mention.text(),
                    "coreference"
                );
                doc.add_positive(antecedent.id, mention.id);
                links += 1;
            }
        }
        tracing::debug!(mentions = mentions.len(), links, groups = doc.coref_groups.len(), "coreference resolved");
    }
}
