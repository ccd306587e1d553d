//! Part-of-speech disambiguation by relaxation labelling
//!
//! Each word becomes a variable whose labels are its selected analyses,
//! weighted by their probabilities. The sentence is padded with an
//! [`OUT_OF_BOUNDS`] word on each side so conditions can test the sentence
//! edges. Constraints are instantiated only for the labels of ambiguous
//! words.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::constraint_grammar::{CgRule, Condition, ConstraintGrammar, Term, OUT_OF_BOUNDS};
use super::solver::{Problem, Relax, RelaxConfig, TermGroup};
use crate::errors::{LingError, Result};
use crate::types::{Analysis, Sentence, Word};

/// When to reduce the remaining ambiguity to a single analysis per word.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForceSelect {
    /// Keep every analysis tied for the best weight.
    #[default]
    None,
    /// Keep the first best analysis, before retokenization.
    Tagger,
    /// Retokenize first, then keep one analysis per word.
    Retokenization,
}

/// Tagger parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaggerConfig {
    pub relax: RelaxConfig,
    /// Split words whose single selected analysis carries a retokenization.
    pub retokenize: bool,
    pub force: ForceSelect,
}

impl TaggerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_relax(mut self, relax: RelaxConfig) -> Self {
        self.relax = relax;
        self
    }

    pub fn with_retokenize(mut self, retokenize: bool) -> Self {
        self.retokenize = retokenize;
        self
    }

    pub fn with_force(mut self, force: ForceSelect) -> Self {
        self.force = force;
        self
    }
}

/// Relaxation-labelling tagger over a [`ConstraintGrammar`].
#[derive(Debug, Clone)]
pub struct RelaxTagger {
    grammar: ConstraintGrammar,
    config: TaggerConfig,
}

impl RelaxTagger {
    pub fn new(grammar: ConstraintGrammar, config: TaggerConfig) -> Result<Self> {
        config.relax.validate()?;
        Ok(Self { grammar, config })
    }

    pub fn from_file(path: impl AsRef<Path>, config: TaggerConfig) -> Result<Self> {
        Self::new(ConstraintGrammar::from_file(path)?, config)
    }

    pub fn grammar(&self) -> &ConstraintGrammar {
        &self.grammar
    }

    pub fn config(&self) -> &TaggerConfig {
        &self.config
    }

    pub fn analyze(&self, sentences: &mut [Sentence]) -> Result<()> {
        sentences.iter_mut().try_for_each(|s| self.analyze_sentence(s))
    }

    /// Disambiguate one sentence in place.
    ///
    /// Fails when the grammar looks at senses and some analysis still carries
    /// more than one: sense conditions need one sense per analysis.
    pub fn analyze_sentence(&self, sentence: &mut Sentence) -> Result<()> {
        if self.grammar.senses_used() {
            if let Some(w) = sentence
                .words
                .iter()
                .find(|w| w.selected_analyses().any(|a| a.senses.len() > 1))
            {
                return Err(LingError::invalid_input(format!(
                    "word '{}' has analyses with several senses, but the constraint grammar tests senses",
                    w.form
                )));
            }
        }

        let selections = self.solve(&sentence.words)?;
        for (w, best) in sentence.words.iter_mut().zip(selections) {
            if let Some(best) = best {
                w.unselect_all();
                for i in best {
                    w.select(i);
                }
            }
        }

        match self.config.force {
            ForceSelect::None => {
                if self.config.retokenize {
                    retokenize(sentence);
                }
            }
            ForceSelect::Tagger => {
                force_select(sentence);
                if self.config.retokenize {
                    retokenize(sentence);
                }
            }
            ForceSelect::Retokenization => {
                if self.config.retokenize {
                    retokenize(sentence);
                }
                force_select(sentence);
            }
        }
        Ok(())
    }

    /// For each ambiguous word, the analysis indices to keep.
    fn solve(&self, words: &[Word]) -> Result<Vec<Option<Vec<usize>>>> {
        let pad = Word::new(OUT_OF_BOUNDS).with_analysis(Analysis::new(OUT_OF_BOUNDS, OUT_OF_BOUNDS).with_prob(1.0));
        let padded: Vec<Padded<'_>> = std::iter::once(&pad)
            .chain(words)
            .chain(std::iter::once(&pad))
            .map(|w| Padded {
                word: w,
                labels: w.selected_indices(),
            })
            .collect();

        let mut problem = Problem::new(padded.len());
        for (v, p) in padded.iter().enumerate() {
            for &i in &p.labels {
                problem.add_label(v, p.word.analyses()[i].prob);
            }
        }
        let mut relax = Relax::new(self.config.relax);
        relax.reset(&problem);

        for v in 0..padded.len() {
            if padded[v].labels.len() < 2 {
                continue;
            }
            for (lb, &ai) in padded[v].labels.iter().enumerate() {
                let a = &padded[v].word.analyses()[ai];
                for rule in self.candidates(padded[v].word, a) {
                    if let Some(terms) = self.instantiate(&padded, v, rule) {
                        relax.add_constraint(v, lb, terms, rule.weight)?;
                    }
                }
            }
        }
        let stats = relax.solve();
        tracing::trace!(
            words = words.len(),
            constraints = relax.n_constraints(),
            iterations = stats.iterations,
            converged = stats.converged,
            "sentence tagged"
        );

        Ok((1..=words.len())
            .map(|v| {
                let labels = &padded[v].labels;
                (labels.len() > 1).then(|| relax.best_label(v).into_iter().map(|lb| labels[lb]).collect())
            })
            .collect())
    }

    /// Rules whose head covers analysis `a` of `word`.
    fn candidates<'g>(&'g self, word: &Word, a: &Analysis) -> Vec<&'g CgRule> {
        let tag = &a.tag;
        let lemma = format!("<{}>", a.lemma);
        let form = format!("({})", word.lowercase_form());
        let sense = a.senses.first().map(|s| format!("[{s}]"));

        let mut heads = vec![tag.clone(), lemma.clone(), format!("{tag}{lemma}"), format!("{tag}{form}")];
        if let Some(sense) = &sense {
            heads.push(sense.clone());
            heads.push(format!("{tag}{sense}"));
        }
        heads.extend(a.user.iter().enumerate().map(|(i, u)| format!("u.{i}={u}")));
        for (cut, _) in tag.char_indices().skip(1) {
            let prefix = format!("{}*", &tag[..cut]);
            heads.push(format!("{prefix}{lemma}"));
            heads.push(format!("{prefix}{form}"));
            if let Some(sense) = &sense {
                heads.push(format!("{prefix}{sense}"));
            }
            heads.push(prefix);
        }

        heads
            .iter()
            .flat_map(|h| self.grammar.rules_for(h))
            .collect()
    }

    /// Term groups of `rule` applied at variable `v`, or `None` if some
    /// condition fails.
    fn instantiate(&self, padded: &[Padded<'_>], v: usize, rule: &CgRule) -> Option<Vec<TermGroup>> {
        let mut groups = Vec::new();
        for cond in &rule.conditions {
            self.check_condition(padded, v, cond, &mut groups)?;
        }
        Some(groups)
    }

    fn check_condition(
        &self,
        padded: &[Padded<'_>],
        v: usize,
        cond: &Condition,
        groups: &mut Vec<TermGroup>,
    ) -> Option<()> {
        let step = cond.position.signum();
        let inside = |p: isize| p >= 0 && (p as usize) < padded.len();

        let mut at = v as isize + cond.position;
        let starts_outside = !inside(at);
        let mut found = None;
        while inside(at) {
            if let Some(g) = self.word_matches(&cond.terms, cond.negated, padded, at as usize) {
                found = Some(g);
                break;
            }
            if !cond.star || step == 0 {
                break;
            }
            at += step;
        }

        let matched = match found {
            Some(g) => g,
            // a negated condition holds outside the sentence, on the padding
            None if cond.negated && starts_outside => vec![(0, 0)],
            None => return None,
        };
        groups.push(matched);

        if !cond.barrier.is_empty() {
            let mut between = Vec::new();
            let mut b = v as isize + step;
            while b != at && inside(b) {
                // only analyses that are not barriers keep the rule alive
                between.push(self.word_matches(&cond.barrier, true, padded, b as usize)?);
                b += step;
            }
            groups.extend(between);
        }
        Some(())
    }

    /// Labels of variable `v` matching any of `terms` (or none, when
    /// `negated`), `None` if there are none.
    fn word_matches(&self, terms: &[Term], negated: bool, padded: &[Padded<'_>], v: usize) -> Option<TermGroup> {
        let p = &padded[v];
        let group: TermGroup = p
            .labels
            .iter()
            .enumerate()
            .filter(|&(_, &ai)| {
                let a = &p.word.analyses()[ai];
                terms.iter().any(|t| self.grammar.term_matches(t, p.word, a)) != negated
            })
            .map(|(lb, _)| (v, lb))
            .collect();
        (!group.is_empty()).then_some(group)
    }
}

/// A word of the padded sentence and the analysis index behind each label.
struct Padded<'a> {
    word: &'a Word,
    labels: Vec<usize>,
}

/// Keep only the first selected analysis of every word.
pub fn force_select(sentence: &mut Sentence) {
    for w in &mut sentence.words {
        if let Some(&first) = w.selected_indices().first() {
            w.unselect_all();
            w.select(first);
        }
    }
}

/// Replace each word whose single selected analysis carries a retokenization
/// by the words it lists. Spans are carved from the contracted word's span.
pub fn retokenize(sentence: &mut Sentence) {
    let mut out = Vec::with_capacity(sentence.words.len());
    let mut changed = false;
    for w in sentence.words.drain(..) {
        let parts = w
            .best()
            .filter(|a| w.n_selected() == 1 && a.is_retokenizable())
            .map(|a| a.retokenization.clone());
        let Some(parts) = parts else {
            out.push(w);
            continue;
        };
        changed = true;
        tracing::trace!(form = %w.form, parts = parts.len(), "retokenizing");
        let mut pos = w.start;
        for mut part in parts {
            let end = (pos + part.form.chars().count()).min(w.end);
            part.start = pos;
            part.end = end;
            part.user = w.user.clone();
            pos = end;
            out.push(part);
        }
    }
    sentence.words = out;
    if changed {
        sentence.parse_tree = None;
        sentence.dep_tree = None;
    }
}
