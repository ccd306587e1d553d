//! Bottom-up chart over one sentence
//!
//! Cell `(i, j)` holds the edges spanning `i + 1` words starting at word
//! `j`. Row 0 is filled from the words' selected analyses; every longer
//! cell is built from pairs of shorter ones. Cells are stored in one
//! triangular `Vec`.

use std::collections::VecDeque;
use std::sync::Arc;

use rustc_hash::FxHashSet;

use super::grammar::{Grammar, Rule};
use crate::matching::{split_qualifier, wildcard_match};
use crate::tree::{NodeId, Tree};
use crate::types::{ParseNode, ParseTree, Sentence};

/// Brackets that start a form or lemma qualifier in a chart symbol.
const QUALIFIER_OPENERS: &str = "(<";

// ============================================================================
// Edge
// ============================================================================

/// A (possibly partial) application of a rule.
///
/// Categories before `dot` have been matched; `backpath` records the cell
/// each one was matched in.
#[derive(Debug, Clone)]
pub struct Edge {
    head: String,
    right: Arc<[String]>,
    dot: usize,
    governor: Option<usize>,
    backpath: Vec<(usize, usize)>,
}

impl Edge {
    /// A complete edge for a terminal symbol.
    fn terminal(symbol: String) -> Self {
        Self {
            head: symbol,
            right: Arc::from(Vec::new()),
            dot: 0,
            governor: Some(0),
            backpath: Vec::new(),
        }
    }

    fn from_rule(rule: &Rule) -> Self {
        Self {
            head: rule.head().to_string(),
            right: rule.right_shared(),
            dot: 0,
            governor: Some(rule.governor()),
            backpath: Vec::new(),
        }
    }

    pub fn head(&self) -> &str {
        &self.head
    }

    /// `true` while some category remains to be matched.
    pub fn is_active(&self) -> bool {
        self.dot < self.right.len()
    }

    pub fn matched(&self) -> &[String] {
        &self.right[..self.dot]
    }

    pub fn backpath(&self) -> &[(usize, usize)] {
        &self.backpath
    }

    /// Governor index into the matched categories, `None` for the
    /// fictitious root.
    pub fn governor(&self) -> Option<usize> {
        self.governor
    }

    fn next_category(&self) -> Option<&str> {
        self.right.get(self.dot).map(String::as_str)
    }

    fn shift(&mut self, row: usize, col: usize) {
        self.dot += 1;
        self.backpath.push((row, col));
    }
}

// ============================================================================
// Chart
// ============================================================================

/// Parsing chart for one sentence, borrowing a shared grammar.
#[derive(Debug)]
pub struct Chart<'g> {
    grammar: &'g Grammar,
    cells: Vec<Vec<Edge>>,
    size: usize,
}

impl<'g> Chart<'g> {
    pub fn new(grammar: &'g Grammar) -> Self {
        Self {
            grammar,
            cells: Vec::new(),
            size: 0,
        }
    }

    /// Number of words loaded.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Edges in cell `(row, col)`.
    pub fn cell(&self, row: usize, col: usize) -> &[Edge] {
        &self.cells[self.index(row, col)]
    }

    fn index(&self, row: usize, col: usize) -> usize {
        col + row * (self.size + 1) - (row + 1) * row / 2
    }

    /// Fill row 0 from the selected analyses of each word.
    ///
    /// Each analysis yields three terminals: the tag, the tag qualified
    /// with the lowercase form and the tag qualified with the lemma.
    pub fn load_sentence(&mut self, sentence: &Sentence) {
        self.size = sentence.len();
        self.cells = vec![Vec::new(); self.size * (self.size + 1) / 2];

        for (j, word) in sentence.words.iter().enumerate() {
            let mut cell = Vec::new();
            let form = word.lowercase_form();
            let mut symbols = Vec::new();
            for a in word.selected_analyses() {
                symbols.push(a.tag.clone());
                symbols.push(format!("{}({form})", a.tag));
                symbols.push(format!("{}<{}>", a.tag, a.lemma));
            }
            if symbols.is_empty() {
                // keeps row 0 complete so every word gets a leaf
                symbols.push(String::new());
            }
            for symbol in symbols {
                cell.push(Edge::terminal(symbol.clone()));
                self.find_all_rules(&symbol, &mut cell, 0, j);
            }
            let idx = self.index(0, j);
            self.cells[idx] = cell;
        }
    }

    /// Run the bottom-up closure over every span, then make sure the top
    /// cell holds a complete edge.
    pub fn parse(&mut self) {
        let size = self.size;
        for k in 1..size {
            for i in 0..size - k {
                let mut cell = Vec::new();
                for a in 0..k {
                    for edge in &self.cells[self.index(a, i)] {
                        let Some(cat) = edge.next_category() else {
                            continue;
                        };
                        if self.can_extend(cat, k - a - 1, i + a + 1) {
                            let mut e = edge.clone();
                            e.shift(k - a - 1, i + a + 1);
                            let complete = !e.is_active();
                            let head = e.head.clone();
                            cell.push(e);
                            if complete {
                                self.find_all_rules(&head, &mut cell, k, i);
                            }
                        }
                    }
                }
                let idx = self.index(k, i);
                self.cells[idx] = cell;
            }
        }
        if size > 0 {
            self.ensure_root();
        }
    }

    /// Add a fictitious start edge over the best cover of the sentence if no
    /// complete, top-eligible edge spans it. Hidden edges are not eligible,
    /// the same filter [`Chart::get_tree`] applies to its root.
    fn ensure_root(&mut self) {
        let top = self.index(self.size - 1, 0);
        let has_root = self.cells[top]
            .iter()
            .any(|e| !e.is_active() && !self.grammar.is_hidden(&e.head) && !self.grammar.is_notop(&e.head));
        if has_root {
            return;
        }

        let covered = self.cover(self.size as isize - 1, 0);
        let right: Vec<String> = covered
            .iter()
            .filter_map(|&(r, c)| self.best_inactive(r, c, |_| true).map(|e| e.head.clone()))
            .collect();
        let mut root = Edge {
            head: self.grammar.start_symbol().to_string(),
            right: right.into(),
            dot: 0,
            governor: None,
            backpath: Vec::new(),
        };
        for &(r, c) in &covered {
            root.shift(r, c);
        }
        tracing::debug!(cells = covered.len(), "no full parse, fictitious root added");
        self.cells[top].push(root);
    }

    /// Cells covering the span under `(a, b)` with the largest possible
    /// constituents, left to right.
    fn cover(&self, a: isize, b: isize) -> Vec<(usize, usize)> {
        if a < 0 || b < 0 || (a + b) as usize >= self.size {
            return Vec::new();
        }
        let (a, b) = (a as usize, b as usize);

        let mut found: Option<(usize, usize, &Edge)> = None;
        for i in (0..=a).rev() {
            for j in b..=b + (a - i) {
                for e in self.cell(i, j).iter().filter(|e| !e.is_active()) {
                    if self.better_edge(e, found.map(|(_, _, best)| best)) {
                        found = Some((i, j, e));
                    }
                }
            }
            if found.is_some() {
                break;
            }
        }
        let Some((x, y, _)) = found else {
            return Vec::new();
        };

        let mut cells = self.cover(y as isize - b as isize - 1, b as isize);
        cells.push((x, y));
        cells.extend(self.cover((a + b) as isize - (x + y + 1) as isize, (x + y + 1) as isize));
        cells
    }

    /// `true` if `e1` should be preferred over `e2` when picking a
    /// constituent for a cell.
    fn better_edge(&self, e1: &Edge, e2: Option<&Edge>) -> bool {
        let Some(e2) = e2 else {
            return true;
        };
        let g = self.grammar;
        let (h1, h2) = (e1.head.as_str(), e2.head.as_str());
        let start = g.start_symbol();

        if h1 == start && h2 != start {
            return true;
        }
        if h1 != start && h2 == start {
            return false;
        }
        match (g.is_terminal(h1), g.is_terminal(h2)) {
            (true, true) => g.get_specificity(h1) < g.get_specificity(h2),
            (false, false) => {
                let (p1, p2) = (g.get_priority(h1), g.get_priority(h2));
                if p1 != p2 {
                    return p1 < p2;
                }
                e1.dot > e2.dot
            }
            (t1, t2) => !t1 && t2,
        }
    }

    fn best_inactive(&self, row: usize, col: usize, accept: impl Fn(&Edge) -> bool) -> Option<&Edge> {
        let mut best = None;
        for e in self.cell(row, col) {
            if !e.is_active() && accept(e) && self.better_edge(e, best) {
                best = Some(e);
            }
        }
        best
    }

    /// `true` if cell `(row, col)` has a complete edge matching `cat`.
    fn can_extend(&self, cat: &str, row: usize, col: usize) -> bool {
        self.cell(row, col)
            .iter()
            .any(|e| !e.is_active() && self.check_match(cat, &e.head))
    }

    /// Match a grammar category against an edge head.
    fn check_match(&self, searched: &str, found: &str) -> bool {
        if searched == found {
            return true;
        }
        let (searched_tag, searched_qual) = split_qualifier(searched, QUALIFIER_OPENERS);
        if searched_qual.contains('"') {
            // file list: tag must match, qualifier looked up in the list
            let (found_tag, found_qual) = split_qualifier(found, QUALIFIER_OPENERS);
            let tag_ok = match searched_tag.find('*') {
                Some(p) => found_tag.starts_with(&searched_tag[..p]),
                None => found_tag == searched_tag,
            };
            return tag_ok && self.grammar.in_filemap(found_qual, searched_qual);
        }
        wildcard_match(searched, found, QUALIFIER_OPENERS)
    }

    /// Add to `cell` every rule that can start with a complete `head`
    /// found at `(row, col)`, closing over unary rules.
    fn find_all_rules(&self, head: &str, cell: &mut Vec<Edge>, row: usize, col: usize) {
        let g = self.grammar;
        let mut pending = VecDeque::new();
        let mut expanded = FxHashSet::default();

        if g.is_terminal(head) {
            if let Some(c) = head.chars().next() {
                for rule in g.get_rules_right_wildcard(c) {
                    if self.check_match(&rule.right()[0], head) {
                        let mut e = Edge::from_rule(rule);
                        e.shift(row, col);
                        if !e.is_active() {
                            pending.push_back(e.head.clone());
                        }
                        cell.push(e);
                    }
                }
            }
        }

        pending.push_back(head.to_string());
        while let Some(h) = pending.pop_front() {
            // unary cycles (A ==> B. B ==> A.) expand each head once
            if !expanded.insert(h.clone()) {
                continue;
            }
            for rule in g.get_rules_right(&h) {
                let mut e = Edge::from_rule(rule);
                e.shift(row, col);
                if !e.is_active() {
                    pending.push_back(e.head.clone());
                }
                cell.push(e);
            }
        }
    }

    // ─── Tree extraction ────────────────────────────────────────────────────

    /// Build the best tree spanning the whole sentence.
    ///
    /// Leaves carry the matched terminal categories; binding them to words
    /// is left to the caller.
    pub fn get_tree(&self) -> ParseTree {
        let start = self.grammar.start_symbol();
        if self.size == 0 {
            return Tree::new(ParseNode::new(start));
        }
        let (x, y) = (self.size - 1, 0);
        let label = self
            .best_inactive(x, y, |e| {
                !self.grammar.is_hidden(&e.head) && !self.grammar.is_notop(&e.head)
            })
            .map(|e| e.head.clone())
            .unwrap_or_else(|| start.to_string());

        let mut tree = Tree::new(ParseNode::new(label.clone()));
        let root = tree.root();
        self.expand(&mut tree, root, x, y, &label, &mut Vec::new());
        tree.extract(root).0
    }

    /// Expand `node` with the best edge for `label` in cell `(x, y)`.
    ///
    /// `path` holds the labels being expanded in each cell above this call;
    /// unary edges leading back to one of them are skipped.
    fn expand(
        &self,
        tree: &mut ParseTree,
        node: NodeId,
        x: usize,
        y: usize,
        label: &str,
        path: &mut Vec<(usize, usize, String)>,
    ) {
        let g = self.grammar;
        let start = g.start_symbol();
        if label != start && g.is_terminal(label) {
            return;
        }
        let loops_back = |e: &Edge| {
            e.backpath == [(x, y)]
                && path
                    .iter()
                    .any(|(px, py, l)| (*px, *py) == (x, y) && *l == e.right[0])
        };
        let Some(best) = self.best_inactive(x, y, |e| e.head == label && !loops_back(e)) else {
            return;
        };
        path.push((x, y, label.to_string()));

        let mut head_set = false;
        for (ch, (cat, &(px, py))) in best.matched().iter().zip(best.backpath()).enumerate() {
            let is_gov = best.governor() == Some(ch);
            let child = tree.new_node(ParseNode::new(cat.clone()));
            self.expand(tree, child, px, py, cat, path);

            let child_label = tree.get(child).label.clone();
            let splice = g.is_hidden(&child_label)
                || g.is_onlytop(&child_label)
                || (g.is_flat(&child_label) && label == child_label);
            if splice {
                for grandchild in tree.children(child).to_vec() {
                    if is_gov {
                        head_set = true;
                    } else {
                        tree.get_mut(grandchild).head = false;
                    }
                    tree.append_child(node, grandchild);
                }
            } else {
                if is_gov {
                    tree.get_mut(child).head = true;
                    head_set = true;
                }
                tree.append_child(node, child);
            }
        }

        path.pop();

        if !head_set && label != start {
            tracing::warn!(label, row = x, col = y, "unset rule governor");
        }
    }
}
