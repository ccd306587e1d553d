//! Core types for lingrules
//!
//! Words with their candidate analyses, sentences that own the words and the
//! trees built over them, and documents that group sentences for
//! cross-sentence stages such as coreference.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::tree::{NodeId, Tree};

// ============================================================================
// Analysis
// ============================================================================

/// One candidate reading of a word: lemma, tag and probability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub lemma: String,
    pub tag: String,
    #[serde(default)]
    pub prob: f64,
    /// Sense identifiers, most likely first.
    #[serde(default)]
    pub senses: Vec<String>,
    /// Free slots for user-defined annotations (`u.0`, `u.1`, ...).
    #[serde(default)]
    pub user: Vec<String>,
    /// Words that replace the analysed word if this reading is chosen
    /// (e.g. a contraction split into its parts).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub retokenization: Vec<Word>,
}

impl Analysis {
    pub fn new(lemma: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            lemma: lemma.into(),
            tag: tag.into(),
            prob: 0.0,
            senses: Vec::new(),
            user: Vec::new(),
            retokenization: Vec::new(),
        }
    }

    pub fn with_prob(mut self, prob: f64) -> Self {
        self.prob = prob;
        self
    }

    pub fn with_senses<I, S>(mut self, senses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.senses = senses.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_user<I, S>(mut self, user: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.user = user.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_retokenization(mut self, words: Vec<Word>) -> Self {
        self.retokenization = words;
        self
    }

    pub fn is_retokenizable(&self) -> bool {
        !self.retokenization.is_empty()
    }
}

// ============================================================================
// Word
// ============================================================================

/// A token (or merged multiword) with its analyses.
///
/// Every analysis has a selection flag; engines that disambiguate (the
/// tagger) narrow the selection, engines that consume tags (the chart
/// parser) read only selected analyses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub form: String,
    /// Character offset of the first character.
    pub start: usize,
    /// Character offset one past the last character.
    pub end: usize,
    analyses: Vec<Analysis>,
    selected: Vec<bool>,
    /// Words merged into this one, empty for plain tokens.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    components: Vec<Word>,
    /// Set by earlier recognizers; locked words are skipped by later ones.
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub user: Vec<String>,
}

impl Word {
    pub fn new(form: impl Into<String>) -> Self {
        let form = form.into();
        let end = form.chars().count();
        Self {
            form,
            start: 0,
            end,
            analyses: Vec::new(),
            selected: Vec::new(),
            components: Vec::new(),
            locked: false,
            user: Vec::new(),
        }
    }

    /// Create a multiword from its components. Analyses are left empty.
    pub fn multiword(form: impl Into<String>, components: Vec<Word>) -> Self {
        let start = components.first().map(|w| w.start).unwrap_or(0);
        let end = components.last().map(|w| w.end).unwrap_or(start);
        Self {
            form: form.into(),
            start,
            end,
            analyses: Vec::new(),
            selected: Vec::new(),
            components,
            locked: false,
            user: Vec::new(),
        }
    }

    pub fn with_span(mut self, start: usize, end: usize) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    pub fn with_analysis(mut self, analysis: Analysis) -> Self {
        self.add_analysis(analysis);
        self
    }

    pub fn with_locked(mut self, locked: bool) -> Self {
        self.locked = locked;
        self
    }

    pub fn lowercase_form(&self) -> String {
        self.form.to_lowercase()
    }

    /// `true` if the first character is uppercase.
    pub fn is_capitalized(&self) -> bool {
        self.form.chars().next().is_some_and(char::is_uppercase)
    }

    pub fn is_multiword(&self) -> bool {
        !self.components.is_empty()
    }

    pub fn components(&self) -> &[Word] {
        &self.components
    }

    // ─── Analyses ───────────────────────────────────────────────────────────

    pub fn analyses(&self) -> &[Analysis] {
        &self.analyses
    }

    pub fn n_analyses(&self) -> usize {
        self.analyses.len()
    }

    /// Add an analysis, selected.
    pub fn add_analysis(&mut self, analysis: Analysis) {
        self.analyses.push(analysis);
        self.selected.push(true);
    }

    /// Replace all analyses, all selected.
    pub fn set_analyses(&mut self, analyses: Vec<Analysis>) {
        self.selected = vec![true; analyses.len()];
        self.analyses = analyses;
    }

    /// Replace the analyses with those of `other`, keeping its selection.
    pub fn copy_analyses(&mut self, other: &Word) {
        self.analyses = other.analyses.clone();
        self.selected = other.selected.clone();
    }

    pub fn is_selected(&self, index: usize) -> bool {
        self.selected.get(index).copied().unwrap_or(false)
    }

    /// Indices of the selected analyses, in order.
    pub fn selected_indices(&self) -> Vec<usize> {
        (0..self.analyses.len())
            .filter(|&i| self.selected[i])
            .collect()
    }

    pub fn selected_analyses(&self) -> impl Iterator<Item = &Analysis> {
        self.analyses
            .iter()
            .zip(self.selected.iter())
            .filter(|(_, sel)| **sel)
            .map(|(a, _)| a)
    }

    pub fn n_selected(&self) -> usize {
        self.selected.iter().filter(|&&s| s).count()
    }

    pub fn select(&mut self, index: usize) {
        if let Some(flag) = self.selected.get_mut(index) {
            *flag = true;
        }
    }

    pub fn unselect_all(&mut self) {
        self.selected.iter_mut().for_each(|s| *s = false);
    }

    pub fn select_all(&mut self) {
        self.selected.iter_mut().for_each(|s| *s = true);
    }

    /// First selected analysis, if any.
    pub fn best(&self) -> Option<&Analysis> {
        self.selected_analyses().next()
    }

    /// Tag of the first selected analysis, or `""`.
    pub fn tag(&self) -> &str {
        self.best().map(|a| a.tag.as_str()).unwrap_or("")
    }

    /// Lemma of the first selected analysis, or `""`.
    pub fn lemma(&self) -> &str {
        self.best().map(|a| a.lemma.as_str()).unwrap_or("")
    }

    /// `true` if any analysis tag matches `re`.
    pub fn has_tag_matching(&self, re: &Regex) -> bool {
        self.analyses.iter().any(|a| re.is_match(&a.tag))
    }
}

// ============================================================================
// Trees
// ============================================================================

/// A constituent in a parse tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseNode {
    pub label: String,
    /// Marks the governor among its siblings.
    pub head: bool,
    /// Ordinal of the chunk this node roots (1-based), 0 if none.
    pub chunk: usize,
    /// Index of the sentence word a leaf covers.
    pub word: Option<usize>,
}

impl ParseNode {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            head: false,
            chunk: 0,
            word: None,
        }
    }
}

/// A node in a dependency tree. Each node stands for one word.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepNode {
    /// Dependency relation to the parent.
    pub label: String,
    /// Index of the sentence word.
    pub word: usize,
    /// Parse tree constituent this word heads (its maximal projection).
    pub link: NodeId,
    pub chunk: usize,
}

pub type ParseTree = Tree<ParseNode>;
pub type DepTree = Tree<DepNode>;

impl Tree<ParseNode> {
    /// Bracketed rendering of the subtree under `node`, heads marked `+`:
    /// `S[sn[DA +NC] +grup-verb[+VMI]]`.
    pub fn bracketed(&self, node: NodeId) -> String {
        let data = self.get(node);
        let mark = if data.head { "+" } else { "" };
        if self.is_leaf(node) {
            return format!("{mark}{}", data.label);
        }
        let kids: Vec<String> = self.children(node).iter().map(|&c| self.bracketed(c)).collect();
        format!("{mark}{}[{}]", data.label, kids.join(" "))
    }
}

// ============================================================================
// Sentence & Document
// ============================================================================

/// An ordered sequence of words plus the trees computed over them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sentence {
    pub words: Vec<Word>,
    #[serde(default)]
    pub parse_tree: Option<ParseTree>,
    #[serde(default)]
    pub dep_tree: Option<DepTree>,
}

impl Sentence {
    pub fn new(words: Vec<Word>) -> Self {
        Self {
            words,
            parse_tree: None,
            dep_tree: None,
        }
    }

    /// Build a sentence from bare forms, with consecutive spans.
    pub fn from_forms(forms: &[&str]) -> Self {
        let mut pos = 0;
        let words = forms
            .iter()
            .map(|f| {
                let len = f.chars().count();
                let w = Word::new(*f).with_span(pos, pos + len);
                pos += len + 1;
                w
            })
            .collect();
        Self::new(words)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn forms(&self) -> Vec<&str> {
        self.words.iter().map(|w| w.form.as_str()).collect()
    }

    /// The word a parse-tree node covers, following its head path down to a leaf.
    pub fn head_word(&self, tree: &ParseTree, node: NodeId) -> Option<&Word> {
        let mut n = node;
        while !tree.is_leaf(n) {
            let children = tree.children(n);
            n = children
                .iter()
                .copied()
                .find(|&c| tree.get(c).head)
                .unwrap_or(children[0]);
        }
        tree.get(n).word.and_then(|w| self.words.get(w))
    }
}

/// A parse-tree constituent, addressed across a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MentionRef {
    pub sentence: usize,
    pub node: NodeId,
}

/// Sentences of one input unit plus document-level annotations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Document {
    pub sentences: Vec<Sentence>,
    /// Groups of mentions found to corefer.
    pub coref_groups: Vec<Vec<MentionRef>>,
}

impl Document {
    pub fn new(sentences: Vec<Sentence>) -> Self {
        Self {
            sentences,
            coref_groups: Vec::new(),
        }
    }

    /// Record that two mentions corefer, merging their groups.
    pub fn add_positive(&mut self, a: MentionRef, b: MentionRef) {
        let ga = self.coref_groups.iter().position(|g| g.contains(&a));
        let gb = self.coref_groups.iter().position(|g| g.contains(&b));
        match (ga, gb) {
            (Some(x), Some(y)) if x == y => {}
            (Some(x), Some(y)) => {
                let (keep, drop) = if x < y { (x, y) } else { (y, x) };
                let moved = self.coref_groups.remove(drop);
                self.coref_groups[keep].extend(moved);
                self.coref_groups[keep].sort();
            }
            (Some(x), None) => {
                self.coref_groups[x].push(b);
                self.coref_groups[x].sort();
            }
            (None, Some(y)) => {
                self.coref_groups[y].push(a);
                self.coref_groups[y].sort();
            }
            (None, None) => {
                let mut group = vec![a, b];
                group.sort();
                self.coref_groups.push(group);
            }
        }
    }

    /// Index of the coreference group containing `m`.
    pub fn group_of(&self, m: MentionRef) -> Option<usize> {
        self.coref_groups.iter().position(|g| g.contains(&m))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_selection() {
        let mut w = Word::new("bajo")
            .with_analysis(Analysis::new("bajo", "SPS00"))
            .with_analysis(Analysis::new("bajo", "AQ0MS0"))
            .with_analysis(Analysis::new("bajar", "VMIP1S0"));
        assert_eq!(w.n_selected(), 3);
        w.unselect_all();
        w.select(2);
        assert_eq!(w.selected_indices(), vec![2]);
        assert_eq!(w.tag(), "VMIP1S0");
        assert_eq!(w.lemma(), "bajar");
    }

    #[test]
    fn test_multiword_span_covers_components() {
        let s = Sentence::from_forms(&["a", "pesar", "de"]);
        let mw = Word::multiword("a_pesar_de", s.words.clone());
        assert_eq!(mw.start, 0);
        assert_eq!(mw.end, 10);
        assert!(mw.is_multiword());
        assert_eq!(mw.components().len(), 3);
    }

    #[test]
    fn test_tag_regex_match() {
        let w = Word::new("Casa").with_analysis(Analysis::new("casa", "NCFS000"));
        assert!(w.has_tag_matching(&Regex::new("^(NC|AQ)").unwrap()));
        assert!(!w.has_tag_matching(&Regex::new("^[DSC]").unwrap()));
        assert!(w.is_capitalized());
    }

    #[test]
    fn test_add_positive_merges_groups() {
        let m = |s, n| MentionRef { sentence: s, node: n };
        let mut doc = Document::default();
        doc.add_positive(m(0, 1), m(0, 5));
        doc.add_positive(m(1, 2), m(1, 3));
        assert_eq!(doc.coref_groups.len(), 2);
        doc.add_positive(m(0, 5), m(1, 3));
        assert_eq!(doc.coref_groups.len(), 1);
        assert_eq!(doc.coref_groups[0].len(), 4);
        assert_eq!(doc.group_of(m(1, 2)), Some(0));
    }
}
