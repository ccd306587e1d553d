//! Multiword locution recognition
//!
//! Lexicon lines have the form
//!
//! ```text
//! a_pesar_de   a_pesar_de  SPS00
//! <gran>_parte gran_parte  NCFS000
//! de_NC        de_NC       $2:NC
//! ```
//!
//! The key chains forms, `<lemma>`s and tags with `_`. Each following
//! `lemma tag` pair is one analysis of the merged word. A tag written
//! `$N:PREFIX` copies every analysis of the N-th component whose tag starts
//! with `PREFIX`; a candidate whose component has no such analysis is
//! rejected.

use std::collections::BTreeSet;
use std::path::Path;

use rustc_hash::{FxHashMap, FxHashSet};

use super::{AutomatonPolicy, StateId, TokenId, TransitionTable};
use crate::diagnostics::{DiagnosticCode, LoadReport};
use crate::errors::{read_to_string, Result};
use crate::types::{Analysis, Word};

// States
const ST_P: StateId = 0;
const ST_M: StateId = 1;
const ST_STOP: StateId = 2;

// Tokens
const TK_PREF: TokenId = 0;
const TK_MW: TokenId = 1;
const TK_OTHER: TokenId = 2;

/// Tag of one locution reading.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ReadingTag {
    Fixed(String),
    /// Analyses of component `component` (0-based) with a tag starting with `prefix`.
    Inherit { component: usize, prefix: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Reading {
    lemma: String,
    tag: ReadingTag,
}

/// Scan state threaded through one locution match attempt.
#[derive(Debug, Default)]
pub struct LocutionContext {
    /// Keys (complete or prefix) reachable with the words seen so far.
    acc: BTreeSet<String>,
    /// Accumulator at the last position that completed a locution.
    longest: BTreeSet<String>,
    components: Vec<Word>,
    analyses: Vec<Analysis>,
}

/// Automaton policy for locutions from a lexicon.
#[derive(Debug, Clone)]
pub struct LocutionPolicy {
    locutions: FxHashMap<String, Vec<Reading>>,
    prefixes: FxHashSet<String>,
    table: TransitionTable,
}

impl Default for LocutionPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl LocutionPolicy {
    /// Create a policy with an empty lexicon.
    pub fn new() -> Self {
        let mut table = TransitionTable::new(3, 3, ST_P, ST_STOP).with_final(ST_M);
        table.set(ST_P, TK_PREF, ST_P);
        table.set(ST_P, TK_MW, ST_M);
        table.set(ST_M, TK_MW, ST_M);
        table.set(ST_M, TK_PREF, ST_P);
        Self {
            locutions: FxHashMap::default(),
            prefixes: FxHashSet::default(),
            table,
        }
    }

    /// Load a lexicon file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = read_to_string(path)?;
        Self::from_text(&text, path.display().to_string())
    }

    /// Load a lexicon from text. Every malformed line is reported.
    pub fn from_text(text: &str, origin: impl Into<String>) -> Result<Self> {
        let mut policy = Self::new();
        let mut report = LoadReport::new(origin);
        for (n, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('%') {
                continue;
            }
            if let Err((code, message)) = policy.parse_line(line) {
                report.error(code, Some(n + 1), message);
            }
        }
        tracing::debug!(locutions = policy.len(), "locution lexicon loaded");
        report.finish(policy)
    }

    /// Add one lexicon line at run time.
    pub fn add_locution(&mut self, line: &str) -> Result<()> {
        let mut report = LoadReport::new("<inline>");
        if let Err((code, message)) = self.parse_line(line.trim()) {
            report.error(code, None, message);
        }
        report.finish(())
    }

    pub fn len(&self) -> usize {
        self.locutions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locutions.is_empty()
    }

    pub fn is_locution(&self, key: &str) -> bool {
        self.locutions.contains_key(key)
    }

    /// `true` if `key` followed by `_` starts some locution.
    pub fn is_prefix(&self, key: &str) -> bool {
        self.prefixes.contains(&format!("{key}_"))
    }

    fn parse_line(&mut self, line: &str) -> std::result::Result<(), (DiagnosticCode, String)> {
        let mut fields = line.split_whitespace();
        let Some(key) = fields.next() else {
            return Err((DiagnosticCode::Syntax, "empty locution line".to_string()));
        };
        let rest: Vec<&str> = fields.collect();
        if rest.is_empty() || rest.len() % 2 != 0 {
            return Err((
                DiagnosticCode::Syntax,
                format!("locution '{key}' needs lemma/tag pairs"),
            ));
        }
        let readings = rest
            .chunks(2)
            .map(|pair| {
                Ok(Reading {
                    lemma: pair[0].to_string(),
                    tag: parse_reading_tag(pair[1])?,
                })
            })
            .collect::<std::result::Result<Vec<_>, String>>()
            .map_err(|m| (DiagnosticCode::InvalidTag, m))?;

        let mut prefix = String::new();
        let parts: Vec<&str> = key.split('_').collect();
        for part in &parts[..parts.len() - 1] {
            prefix.push_str(part);
            prefix.push('_');
            self.prefixes.insert(prefix.clone());
        }
        self.locutions
            .entry(key.to_string())
            .or_default()
            .extend(readings);
        Ok(())
    }

    /// Extend the accumulator with `key`, reporting whether it completes a
    /// locution or may still be extended.
    fn check(&self, key: String, acc: &mut BTreeSet<String>, longest: &mut BTreeSet<String>, mw: &mut bool, pref: &mut bool) {
        if self.locutions.contains_key(&key) {
            acc.insert(key);
            *longest = acc.clone();
            *mw = true;
        } else if self.is_prefix(&key) {
            acc.insert(key);
            *pref = true;
        }
    }
}

fn parse_reading_tag(tag: &str) -> std::result::Result<ReadingTag, String> {
    let Some(spec) = tag.strip_prefix('$') else {
        return Ok(ReadingTag::Fixed(tag.to_string()));
    };
    let (num, prefix) = spec
        .split_once(':')
        .ok_or_else(|| format!("inherited tag '{tag}' must be $N:PREFIX"))?;
    let component = num
        .parse::<usize>()
        .ok()
        .filter(|&n| n >= 1)
        .ok_or_else(|| format!("inherited tag '{tag}' has no valid component number"))?;
    Ok(ReadingTag::Inherit {
        component: component - 1,
        prefix: prefix.to_string(),
    })
}

impl AutomatonPolicy for LocutionPolicy {
    type Context = LocutionContext;

    fn table(&self) -> &TransitionTable {
        &self.table
    }

    fn compute_token(&self, ctx: &mut LocutionContext, _state: StateId, words: &[Word], j: usize) -> TokenId {
        let word = &words[j];
        ctx.components.push(word.clone());
        let form = word.lowercase_form();

        let mut acc = BTreeSet::new();
        let (mut mw, mut pref) = (false, false);

        // keys to try for this word: its form, and for every analysis its
        // lemma and tag
        let mut keys = vec![form];
        for a in word.analyses() {
            keys.push(format!("<{}>", a.lemma));
            keys.push(a.tag.clone());
        }

        for key in keys {
            if ctx.acc.is_empty() {
                self.check(key, &mut acc, &mut ctx.longest, &mut mw, &mut pref);
            } else {
                for prev in &ctx.acc {
                    self.check(format!("{prev}_{key}"), &mut acc, &mut ctx.longest, &mut mw, &mut pref);
                }
            }
        }

        ctx.acc = acc;
        if mw {
            TK_MW
        } else if pref {
            TK_PREF
        } else {
            TK_OTHER
        }
    }

    fn valid_multiword(&self, ctx: &mut LocutionContext, _candidate: &Word) -> bool {
        let mut valid = false;
        ctx.analyses.clear();
        for key in &ctx.longest {
            let Some(readings) = self.locutions.get(key) else {
                continue;
            };
            for reading in readings {
                match &reading.tag {
                    ReadingTag::Fixed(tag) => {
                        ctx.analyses.push(Analysis::new(reading.lemma.clone(), tag.clone()));
                        valid = true;
                    }
                    ReadingTag::Inherit { component, prefix } => {
                        let mut found = false;
                        if let Some(word) = ctx.components.get(*component) {
                            for a in word.analyses().iter().filter(|a| a.tag.starts_with(prefix.as_str())) {
                                ctx.analyses.push(Analysis::new(reading.lemma.clone(), a.tag.clone()));
                                found = true;
                            }
                        }
                        valid = found;
                    }
                }
            }
        }
        valid
    }

    fn set_multiword_analysis(&self, ctx: &LocutionContext, word: &mut Word, _final_state: StateId) {
        word.set_analyses(ctx.analyses.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automaton::Automaton;
    use crate::types::Sentence;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn automaton(lexicon: &str) -> Automaton<LocutionPolicy> {
        Automaton::new(LocutionPolicy::from_text(lexicon, "test").unwrap())
    }

    #[test]
    fn test_fixed_locution_is_merged() {
        let a = automaton("a_pesar_de a_pesar_de SPS00\n");
        let mut s = Sentence::from_forms(&["a", "pesar", "de", "todo"]);
        assert_eq!(a.annotate(&mut s), 1);
        assert_eq!(s.forms(), vec!["a_pesar_de", "todo"]);
        let mw = &s.words[0];
        assert_eq!(mw.lemma(), "a_pesar_de");
        assert_eq!(mw.tag(), "SPS00");
        assert_eq!(mw.n_analyses(), 1);
        assert_eq!(mw.components().len(), 3);
        assert!(!s.words[1].is_multiword());
        assert_eq!(s.words[1].n_analyses(), 0);
    }

    #[test]
    fn test_prefixes_are_indexed() {
        let p = LocutionPolicy::from_text("sin_embargo sin_embargo RG\n", "t").unwrap();
        assert!(p.is_locution("sin_embargo"));
        assert!(p.is_prefix("sin"));
        assert!(!p.is_prefix("sin_embargo"));
    }

    #[test]
    fn test_longest_locution_wins() {
        let a = automaton("a_causa a_causa NCFS000\na_causa_de a_causa_de SPS00\n");
        let mut s = Sentence::from_forms(&["a", "causa", "de", "ello"]);
        a.annotate(&mut s);
        assert_eq!(s.forms(), vec!["a_causa_de", "ello"]);
        assert_eq!(s.words[0].tag(), "SPS00");

        let mut s = Sentence::from_forms(&["a", "causa", "suya"]);
        a.annotate(&mut s);
        assert_eq!(s.forms(), vec!["a_causa", "suya"]);
    }

    #[test]
    fn test_lemma_and_tag_keys() {
        let a = automaton("<dar>_cuenta dar_cuenta VMN0000\nde_<casa> de_casa $2:NC\n");
        let mut s = Sentence::from_forms(&["dio", "cuenta"]);
        s.words[0].add_analysis(Analysis::new("dar", "VMIS3S0"));
        a.annotate(&mut s);
        assert_eq!(s.forms(), vec!["dio_cuenta"]);
        assert_eq!(s.words[0].lemma(), "dar_cuenta");

        let mut s = Sentence::from_forms(&["de", "casa"]);
        s.words[0].add_analysis(Analysis::new("de", "SPS00"));
        s.words[1].add_analysis(Analysis::new("casa", "NCFS000"));
        s.words[1].add_analysis(Analysis::new("casar", "VMIP3S0"));
        a.annotate(&mut s);
        assert_eq!(s.forms(), vec!["de_casa"]);
        let tags: Vec<_> = s.words[0].analyses().iter().map(|a| a.tag.as_str()).collect();
        assert_eq!(tags, vec!["NCFS000"]);
    }

    #[test]
    fn test_inherited_tag_without_match_rejects() {
        let a = automaton("de_<casa> de_casa $2:NC\n");
        let mut s = Sentence::from_forms(&["de", "casa"]);
        s.words[0].add_analysis(Analysis::new("de", "SPS00"));
        s.words[1].add_analysis(Analysis::new("casa", "VMIP3S0"));
        let before = s.clone();
        assert!(!a.annotate_at(&mut s, 0));
        assert_eq!(s, before);
    }

    #[test]
    fn test_multiple_readings() {
        let a = automaton("en_cuanto en_cuanto CS en_cuanto RG\n");
        let mut s = Sentence::from_forms(&["En", "cuanto"]);
        a.annotate(&mut s);
        assert_eq!(s.forms(), vec!["En_cuanto"]);
        assert_eq!(s.words[0].n_analyses(), 2);
    }

    #[test]
    fn test_malformed_lines_are_all_reported() {
        let err = LocutionPolicy::from_text("a_b a_b\nc_d c_d $x:NC\ne_f e_f $0:NC\ng_h g_h NC\n", "bad.loc")
            .unwrap_err();
        let report = err.report().unwrap();
        assert_eq!(report.errors().count(), 3);
        assert!(report.has_code(DiagnosticCode::InvalidTag));
        assert!(report.has_code(DiagnosticCode::Syntax));
    }

    #[test]
    fn test_add_locution() {
        let mut p = LocutionPolicy::new();
        assert!(p.is_empty());
        p.add_locution("por_favor por_favor RG").unwrap();
        assert!(p.add_locution("por_favor").is_err());
        assert_eq!(p.len(), 1);
        let a = Automaton::new(p);
        let mut s = Sentence::from_forms(&["por", "favor"]);
        assert!(a.annotate_at(&mut s, 0));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = LocutionPolicy::from_file("/nonexistent/locutions.dat").unwrap_err();
        assert!(matches!(err, crate::errors::LingError::Io { .. }));
    }

    proptest! {
        #[test]
        fn prop_annotate_twice_is_idempotent(forms in prop::collection::vec(
            prop::sample::select(vec!["a", "b", "c", "d", "e"]), 0..12)) {
            let a = automaton("a_b a_b NC\nb_c_d b_c_d RG\nd_d d_d AQ\n");
            let mut s = Sentence::from_forms(&forms);
            a.annotate(&mut s);
            let once = s.clone();
            prop_assert_eq!(a.annotate(&mut s), 0);
            prop_assert_eq!(s, once);
        }
    }
}
