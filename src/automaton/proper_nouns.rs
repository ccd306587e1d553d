//! Capitalisation-based named-entity recognition
//!
//! Runs of capitalised words are merged into one entity, optionally bridged
//! by function words (`Banco de España`). Sentence-initial words are treated
//! with care: a capitalised dictionary word at the start of a sentence is
//! usually not a name, so it only starts an entity when its analyses allow
//! it (noun/adjective tags, no closed-category tag) or when it is a known
//! name.

use std::path::Path;

use regex::Regex;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use stop_words::{get, LANGUAGE};

use super::{AutomatonPolicy, StateId, TokenId, TransitionTable};
use crate::diagnostics::{DiagnosticCode, LoadReport};
use crate::errors::{read_to_string, LingError, Result};
use crate::sections::read_sections;
use crate::types::{Analysis, Word};

// States
const ST_IN: StateId = 0;
const ST_NP: StateId = 1;
const ST_FUN: StateId = 2;
const ST_STOP: StateId = 3;

// Tokens
/// Sentence-initial capitalised word with no analyses.
const TK_S_UNK_UPP: TokenId = 0;
/// Sentence-initial capitalised noun or adjective.
const TK_S_NOUN_UPP: TokenId = 1;
/// Capitalised word elsewhere.
const TK_M_UPPER: TokenId = 2;
/// Function word.
const TK_M_FUN: TokenId = 3;
const TK_OTHER: TokenId = 4;

// ============================================================================
// Configuration
// ============================================================================

/// Settings for [`ProperNounPolicy`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProperNounConfig {
    /// Lowercase words allowed inside an entity (`de`, `la`, ...).
    pub function_words: FxHashSet<String>,
    /// Tags after which the next word counts as sentence-initial.
    pub special_punct: FxHashSet<String>,
    /// Tag given to recognised entities.
    pub ne_tag: String,
    /// Runs of at least this many words must contain a lowercase letter
    /// (all-caps titles are not entities). `0` disables the check.
    pub title_limit: usize,
    /// Known names, accepted sentence-initially whatever their tags.
    pub names: FxHashSet<String>,
    /// Words that continue an entity but only start one before a
    /// capitalised word.
    pub ignore: FxHashSet<String>,
    pub re_noun_adj: String,
    pub re_closed: String,
    pub re_date_num_punct: String,
    /// Annotate each word of an entity in place instead of merging.
    pub split_multiwords: bool,
}

impl Default for ProperNounConfig {
    fn default() -> Self {
        Self {
            function_words: FxHashSet::default(),
            special_punct: FxHashSet::default(),
            ne_tag: "NP00000".to_string(),
            title_limit: 0,
            names: FxHashSet::default(),
            ignore: FxHashSet::default(),
            re_noun_adj: "^(NC|AQ)".to_string(),
            re_closed: "^[DSC]".to_string(),
            re_date_num_punct: "^[FWZ]".to_string(),
            split_multiwords: false,
        }
    }
}

impl ProperNounConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Default settings with function words taken from the stop-word list
    /// of `language` (ISO code or English name).
    pub fn for_language(language: &str) -> Result<Self> {
        let lang = match language.to_lowercase().as_str() {
            "en" | "english" => LANGUAGE::English,
            "es" | "spanish" => LANGUAGE::Spanish,
            "fr" | "french" => LANGUAGE::French,
            "it" | "italian" => LANGUAGE::Italian,
            "pt" | "portuguese" => LANGUAGE::Portuguese,
            "de" | "german" => LANGUAGE::German,
            "nl" | "dutch" => LANGUAGE::Dutch,
            "ru" | "russian" => LANGUAGE::Russian,
            other => {
                return Err(LingError::invalid_config(format!(
                    "no function word list for language '{other}'"
                )))
            }
        };
        let function_words = get(lang).iter().map(|s| s.to_string()).collect();
        Ok(Self {
            function_words,
            special_punct: ["Fc", "Fd", "Fe", "Fx", "Fp", "Fat", "Fit", "Fg"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            ..Self::default()
        })
    }

    pub fn with_function_words<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.function_words = words.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_special_punct<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.special_punct = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_ne_tag(mut self, tag: impl Into<String>) -> Self {
        self.ne_tag = tag.into();
        self
    }

    pub fn with_title_limit(mut self, limit: usize) -> Self {
        self.title_limit = limit;
        self
    }

    pub fn with_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.names = names.into_iter().map(|s| s.into().to_lowercase()).collect();
        self
    }

    pub fn with_ignore<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore = words.into_iter().map(|s| s.into().to_lowercase()).collect();
        self
    }

    pub fn with_split_multiwords(mut self, split: bool) -> Self {
        self.split_multiwords = split;
        self
    }

    /// Load settings from a sectioned file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = read_to_string(path)?;
        Self::from_sections(&text, path.display().to_string())
    }

    /// Parse `<FunctionWords>`, `<SpecialPunct>`, `<NE_Tag>`, `<TitleLimit>`,
    /// `<Names>`, `<Ignore>`, `<RE_NounAdj>`, `<RE_Closed>`,
    /// `<RE_DateNumPunct>` and `<SplitMultiwords>` sections. Missing
    /// sections keep their defaults.
    pub fn from_sections(text: &str, origin: impl Into<String>) -> Result<Self> {
        let mut report = LoadReport::new(origin);
        let sections = read_sections(text, &mut report);
        let mut config = Self::default();

        let words = |name: &str| -> Vec<String> {
            sections
                .get(name)
                .map(|lines| {
                    lines
                        .iter()
                        .flat_map(|(_, l)| l.split_whitespace())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default()
        };
        let first = |name: &str| -> Option<(usize, String)> {
            sections
                .get(name)
                .and_then(|lines| lines.first())
                .map(|(n, l)| (*n, l.trim().to_string()))
        };

        for name in sections.keys() {
            if !SECTIONS.contains(&name.as_str()) {
                report.warning(
                    DiagnosticCode::UnknownName,
                    None,
                    format!("unknown section <{name}> ignored"),
                );
            }
        }

        config.function_words = words("FunctionWords").into_iter().collect();
        config.special_punct = words("SpecialPunct").into_iter().collect();
        config.names = words("Names").into_iter().map(|w| w.to_lowercase()).collect();
        config.ignore = words("Ignore").into_iter().map(|w| w.to_lowercase()).collect();
        if let Some((_, tag)) = first("NE_Tag") {
            config.ne_tag = tag;
        }
        if let Some((line, limit)) = first("TitleLimit") {
            match limit.parse() {
                Ok(n) => config.title_limit = n,
                Err(_) => report.error(
                    DiagnosticCode::Syntax,
                    Some(line),
                    format!("TitleLimit must be a number, got '{limit}'"),
                ),
            }
        }
        for (section, slot) in [
            ("RE_NounAdj", &mut config.re_noun_adj),
            ("RE_Closed", &mut config.re_closed),
            ("RE_DateNumPunct", &mut config.re_date_num_punct),
        ] {
            if let Some((line, re)) = first(section) {
                if let Err(e) = Regex::new(&re) {
                    report.error(DiagnosticCode::InvalidRegex, Some(line), e.to_string());
                }
                *slot = re;
            }
        }
        if let Some((_, split)) = first("SplitMultiwords") {
            config.split_multiwords = split.eq_ignore_ascii_case("yes");
        }

        report.finish(config)
    }
}

const SECTIONS: &[&str] = &[
    "FunctionWords",
    "SpecialPunct",
    "NE_Tag",
    "TitleLimit",
    "Names",
    "Ignore",
    "RE_NounAdj",
    "RE_Closed",
    "RE_DateNumPunct",
    "SplitMultiwords",
];

// ============================================================================
// Policy
// ============================================================================

/// Scan state for one entity match attempt.
#[derive(Debug, Default)]
pub struct ProperNounContext {
    /// The entity started with a sentence-initial dictionary noun.
    initial_noun: bool,
}

/// Automaton policy recognising capitalised named entities.
#[derive(Debug, Clone)]
pub struct ProperNounPolicy {
    config: ProperNounConfig,
    re_noun_adj: Regex,
    re_closed: Regex,
    re_date_num_punct: Regex,
    table: TransitionTable,
}

impl ProperNounPolicy {
    pub fn new(config: ProperNounConfig) -> Result<Self> {
        let compile = |re: &str| Regex::new(re).map_err(|e| LingError::regex("proper noun settings", e));
        let mut table = TransitionTable::new(4, 5, ST_IN, ST_STOP).with_final(ST_NP);
        table.set_all(ST_IN, &[TK_S_UNK_UPP, TK_S_NOUN_UPP, TK_M_UPPER], ST_NP);
        table.set(ST_NP, TK_M_UPPER, ST_NP);
        table.set(ST_NP, TK_M_FUN, ST_FUN);
        table.set_all(ST_FUN, &[TK_S_UNK_UPP, TK_S_NOUN_UPP, TK_M_UPPER], ST_NP);
        table.set(ST_FUN, TK_M_FUN, ST_FUN);
        Ok(Self {
            re_noun_adj: compile(&config.re_noun_adj)?,
            re_closed: compile(&config.re_closed)?,
            re_date_num_punct: compile(&config.re_date_num_punct)?,
            config,
            table,
        })
    }

    pub fn config(&self) -> &ProperNounConfig {
        &self.config
    }

    fn is_sentence_begin(&self, words: &[Word], j: usize) -> bool {
        j == 0
            || words[j - 1]
                .analyses()
                .iter()
                .any(|a| self.config.special_punct.contains(&a.tag))
    }
}

impl AutomatonPolicy for ProperNounPolicy {
    type Context = ProperNounContext;

    fn table(&self) -> &TransitionTable {
        &self.table
    }

    fn compute_token(&self, _ctx: &mut ProperNounContext, state: StateId, words: &[Word], j: usize) -> TokenId {
        let word = &words[j];
        let form = word.lowercase_form();
        let sbegin = self.is_sentence_begin(words, j);

        if self.config.ignore.contains(&form) {
            if state == ST_NP {
                return TK_M_UPPER;
            }
            if words.get(j + 1).is_some_and(Word::is_capitalized) {
                return if sbegin { TK_S_NOUN_UPP } else { TK_M_UPPER };
            }
            return TK_OTHER;
        }

        let dnp = word.has_tag_matching(&self.re_date_num_punct);
        if sbegin {
            if !word.locked
                && word.is_capitalized()
                && !self.config.function_words.contains(&form)
                && !word.is_multiword()
                && !dnp
            {
                if word.n_analyses() == 0 {
                    return TK_S_UNK_UPP;
                }
                if !word.has_tag_matching(&self.re_closed)
                    && (word.has_tag_matching(&self.re_noun_adj) || self.config.names.contains(&form))
                {
                    return TK_S_NOUN_UPP;
                }
            }
        } else if !word.locked {
            if word.is_capitalized() && !dnp {
                return TK_M_UPPER;
            }
            if self.config.function_words.contains(&form) {
                return TK_M_FUN;
            }
        }
        TK_OTHER
    }

    fn state_actions(&self, ctx: &mut ProperNounContext, _origin: StateId, state: StateId, token: TokenId, _word: &Word) {
        if state == ST_NP {
            ctx.initial_noun = token == TK_S_NOUN_UPP;
        }
    }

    fn valid_multiword(&self, _ctx: &mut ProperNounContext, candidate: &Word) -> bool {
        let limit = self.config.title_limit;
        if limit > 0 && candidate.components().len() >= limit {
            // all-caps titles are not entities
            return candidate
                .components()
                .iter()
                .any(|w| w.form.chars().any(char::is_lowercase));
        }
        true
    }

    fn set_multiword_analysis(&self, ctx: &ProperNounContext, word: &mut Word, _final_state: StateId) {
        if ctx.initial_noun && word.components().len() == 1 {
            let single = word.components()[0].clone();
            word.copy_analyses(&single);
        }
        let lemma = word.lowercase_form();
        word.add_analysis(Analysis::new(lemma, self.config.ne_tag.clone()));
    }

    fn split_multiwords(&self) -> bool {
        self.config.split_multiwords
    }

    fn set_split_analysis(&self, _ctx: &ProperNounContext, word: &mut Word) {
        if word.is_capitalized() {
            let lemma = word.lowercase_form();
            word.set_analyses(vec![Analysis::new(lemma, self.config.ne_tag.clone())]);
        }
    }
}
