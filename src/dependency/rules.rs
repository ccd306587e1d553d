//! Boolean predicates over dependency-tree node pairs
//!
//! A labelling rule is a conjunction of conditions like `d.label=sn`,
//! `p.lemma!=ser` or `As:sn.class=animate`. Each condition names a node
//! relative to the (ancestor, descendant) pair being labelled and a test on
//! that node:
//!
//! | node       | resolves to                                     |
//! |------------|-------------------------------------------------|
//! | `p`        | the ancestor                                    |
//! | `d`        | the descendant                                  |
//! | `As`       | every other child of the ancestor (all must pass) |
//! | `Es`       | every other child of the ancestor (one must pass) |
//! | `x:a:b`    | from `x`, the child linked to an `a` constituent, then its `b` child |
//!
//! A condition whose node reference resolves to nothing is false. A leading
//! `NOT` (or `!=` instead of `=`) negates a condition, and a value `$NAME`
//! stands for the items of set `NAME` from the `<SETS>` section.

use std::collections::VecDeque;
use std::path::Path;

use regex::Regex;
use rustc_hash::{FxHashMap, FxHashSet};

use super::semdb::{sense_pos, SemanticDb};
use crate::diagnostics::{DiagnosticCode, LoadReport};
use crate::matching::prefix_match;
use crate::sections::SectionLines;
use crate::tree::NodeId;
use crate::types::{DepTree, ParseTree, Sentence, Word};

// ─── Word classes ───────────────────────────────────────────────────────────

/// Named lemma sets from a `<CLASS>` section.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WordClasses {
    entries: FxHashSet<String>,
}

impl WordClasses {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, class: &str, lemma: &str) {
        self.entries.insert(format!("{class}#{lemma}"));
    }

    pub fn contains(&self, class: &str, lemma: &str) -> bool {
        self.entries.contains(&format!("{class}#{lemma}"))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Read `class lemma` and `class "file"` lines. File paths are relative to
/// `base_dir`; each non-comment line of the file contributes its first word.
pub(crate) fn load_classes(
    lines: Option<&SectionLines<'_>>,
    base_dir: Option<&Path>,
    report: &mut LoadReport,
) -> WordClasses {
    let mut classes = WordClasses::new();
    for &(lineno, line) in lines.into_iter().flatten() {
        let mut fields = line.split_whitespace();
        let (Some(class), Some(value), None) = (fields.next(), fields.next(), fields.next()) else {
            report.error(
                DiagnosticCode::Syntax,
                Some(lineno),
                format!("expected 'class lemma' or 'class \"file\"', found '{line}'"),
            );
            continue;
        };

        match value.strip_prefix('"').and_then(|v| v.strip_suffix('"')) {
            Some(file) => {
                let path = match base_dir {
                    Some(dir) => dir.join(file),
                    None => Path::new(file).to_path_buf(),
                };
                match std::fs::read_to_string(&path) {
                    Ok(text) => {
                        for lemma in text
                            .lines()
                            .filter(|l| !l.trim().is_empty() && !l.starts_with('%'))
                            .filter_map(|l| l.split_whitespace().next())
                        {
                            classes.insert(class, lemma);
                        }
                    }
                    Err(e) => report.error(
                        DiagnosticCode::UnreadableFile,
                        Some(lineno),
                        format!("cannot read word class file {}: {e}", path.display()),
                    ),
                }
            }
            None => classes.insert(class, value),
        }
    }
    classes
}

// ─── Term sets ──────────────────────────────────────────────────────────────

/// Named value lists from a `<SETS>` section, referenced as `$NAME`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TermSets {
    sets: FxHashMap<String, Vec<String>>,
}

impl TermSets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `items` to set `name`. Repeated names accumulate.
    pub fn extend<I, S>(&mut self, name: &str, items: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sets
            .entry(name.to_string())
            .or_default()
            .extend(items.into_iter().map(Into::into));
    }

    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.sets.get(name).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

/// Read `NAME item item...` lines.
pub(crate) fn load_sets(lines: Option<&SectionLines<'_>>, report: &mut LoadReport) -> TermSets {
    let mut sets = TermSets::new();
    for &(lineno, line) in lines.into_iter().flatten() {
        let mut fields = line.split_whitespace();
        let name = fields.next().unwrap_or_default();
        let items: Vec<&str> = fields.collect();
        if items.is_empty() || name.starts_with('$') {
            report.error(
                DiagnosticCode::Syntax,
                Some(lineno),
                format!("expected 'NAME item...', found '{line}'"),
            );
            continue;
        }
        sets.extend(name, items);
    }
    sets
}

// ─── Expressions ────────────────────────────────────────────────────────────

/// Where a node reference starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeBase {
    /// `p`
    Parent,
    /// `d`
    Daughter,
    /// `As`: all other children of the parent.
    AllSiblings,
    /// `Es`: some other child of the parent.
    AnySibling,
}

/// A node reference such as `p`, `d:sn` or `Es:grup-sp:sn`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRef {
    pub base: NodeBase,
    /// Link labels of the children to descend through.
    pub path: Vec<String>,
}

impl NodeRef {
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.split(':');
        let base = match parts.next()? {
            "p" => NodeBase::Parent,
            "d" => NodeBase::Daughter,
            "As" => NodeBase::AllSiblings,
            "Es" => NodeBase::AnySibling,
            _ => return None,
        };
        let path: Vec<String> = parts.map(str::to_string).collect();
        if path.iter().any(String::is_empty) {
            return None;
        }
        Some(Self { base, path })
    }

    fn is_plain(&self) -> bool {
        self.path.is_empty() && matches!(self.base, NodeBase::Parent | NodeBase::Daughter)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

/// The test applied to each resolved node.
#[derive(Debug, Clone)]
pub enum Predicate {
    /// Relative position of descendant and ancestor.
    Side(Side),
    /// Label of the linked constituent, `*` suffix for prefixes.
    Label(Vec<String>),
    Lemma(FxHashSet<String>),
    /// Regex over the tag.
    Pos(Regex),
    Class(Vec<String>),
    Tonto(FxHashSet<String>),
    Semfile(FxHashSet<String>),
    Synon(FxHashSet<String>),
    /// Synonyms of the word or of any hypernym.
    Asynon(FxHashSet<String>),
}

impl Predicate {
    fn is_semantic(&self) -> bool {
        matches!(
            self,
            Self::Tonto(_) | Self::Semfile(_) | Self::Synon(_) | Self::Asynon(_)
        )
    }
}

/// A labelling condition tree.
#[derive(Debug, Clone)]
pub enum RuleExpression {
    Condition { node: NodeRef, predicate: Predicate },
    And(Vec<RuleExpression>),
    Not(Box<RuleExpression>),
}

/// Everything a condition may look at.
#[derive(Clone, Copy)]
pub struct EvalContext<'a> {
    pub deps: &'a DepTree,
    pub parse: &'a ParseTree,
    pub sentence: &'a Sentence,
    pub classes: &'a WordClasses,
    pub semdb: Option<&'a dyn SemanticDb>,
}

impl<'a> EvalContext<'a> {
    fn word(&self, node: NodeId) -> Option<&'a Word> {
        self.sentence.words.get(self.deps.get(node).word)
    }

    fn link_label(&self, node: NodeId) -> &'a str {
        &self.parse.get(self.deps.get(node).link).label
    }

    fn start(&self, node: NodeId) -> usize {
        self.word(node).map(|w| w.start).unwrap_or(0)
    }

    /// Follow `path` down from `node`, matching children by link label.
    fn resolve(&self, path: &[String], node: NodeId) -> Option<NodeId> {
        let mut current = node;
        for step in path {
            current = self
                .deps
                .children(current)
                .iter()
                .copied()
                .find(|&c| self.link_label(c) == step)?;
        }
        Some(current)
    }
}

impl RuleExpression {
    /// Parse one `node.func=values` or `node.func!=values` condition.
    ///
    /// Semantic predicates need `has_semdb`.
    pub fn parse_condition(condition: &str, has_semdb: bool) -> Result<Self, (DiagnosticCode, String)> {
        Self::parse_condition_with_sets(condition, has_semdb, &TermSets::new())
    }

    /// Like [`parse_condition`](Self::parse_condition), also accepting a
    /// `NOT ` prefix and `$NAME` values drawn from `sets`.
    pub fn parse_condition_with_sets(
        condition: &str,
        has_semdb: bool,
        sets: &TermSets,
    ) -> Result<Self, (DiagnosticCode, String)> {
        let syntax = |msg: String| (DiagnosticCode::Syntax, msg);
        let (outer_not, condition) = match condition.trim().split_once(char::is_whitespace) {
            Some((kw, rest)) if kw.eq_ignore_ascii_case("NOT") => (true, rest.trim_start()),
            _ => (false, condition.trim()),
        };
        let eq = condition
            .find('=')
            .ok_or_else(|| syntax(format!("condition '{condition}' has no '='")))?;
        let negated = condition[..eq].ends_with('!');
        let lhs = &condition[..if negated { eq - 1 } else { eq }];
        let value = &condition[eq + 1..];
        let dot = lhs
            .rfind('.')
            .ok_or_else(|| syntax(format!("condition '{condition}' has no node.function")))?;
        let (node_str, func) = (&lhs[..dot], &lhs[dot + 1..]);
        let node = NodeRef::parse(node_str)
            .ok_or_else(|| syntax(format!("unknown node reference '{node_str}' in '{condition}'")))?;
        if value.is_empty() {
            return Err(syntax(format!("condition '{condition}' has no value")));
        }

        let mut values: Vec<String> = Vec::new();
        for term in value.split('|') {
            match term.strip_prefix('$') {
                Some(name) => match sets.get(name) {
                    Some(items) => values.extend(items.iter().cloned()),
                    None => {
                        return Err((
                            DiagnosticCode::UndefinedSet,
                            format!("set {name} is not defined in '{condition}'"),
                        ))
                    }
                },
                None => values.push(term.to_string()),
            }
        }
        let value = values.join("|");
        let value = value.as_str();
        let set = || values.iter().cloned().collect::<FxHashSet<String>>();
        let predicate = match func {
            "side" => {
                let side = match value {
                    "left" => Side::Left,
                    "right" => Side::Right,
                    _ => return Err(syntax(format!("side must be 'left' or 'right' in '{condition}'"))),
                };
                if !node.is_plain() {
                    return Err(syntax(format!("side applies only to 'p' or 'd' in '{condition}'")));
                }
                Predicate::Side(side)
            }
            "label" => Predicate::Label(values),
            "lemma" => Predicate::Lemma(set()),
            "pos" => Predicate::Pos(Regex::new(value).map_err(|e| {
                (
                    DiagnosticCode::InvalidRegex,
                    format!("invalid pos pattern in '{condition}': {e}"),
                )
            })?),
            "class" => Predicate::Class(values),
            "tonto" => Predicate::Tonto(set()),
            "semfile" => Predicate::Semfile(set()),
            "synon" => Predicate::Synon(set()),
            "asynon" => Predicate::Asynon(set()),
            other => {
                return Err((
                    DiagnosticCode::UnknownName,
                    format!("unknown function '{other}' in '{condition}'"),
                ))
            }
        };
        if predicate.is_semantic() && !has_semdb {
            return Err((
                DiagnosticCode::MissingSemanticDb,
                format!("'{func}' needs a semantic database (add a <SEMDB> section)"),
            ));
        }

        let mut expr = Self::Condition { node, predicate };
        if negated {
            expr = Self::Not(Box::new(expr));
        }
        if outer_not {
            expr = Self::Not(Box::new(expr));
        }
        Ok(expr)
    }

    /// Evaluate for an (ancestor, descendant) pair of the dependency tree.
    pub fn check(&self, ctx: &EvalContext<'_>, ancestor: NodeId, descendant: NodeId) -> bool {
        match self {
            Self::And(parts) => parts.iter().all(|e| e.check(ctx, ancestor, descendant)),
            Self::Not(inner) => !inner.check(ctx, ancestor, descendant),
            Self::Condition {
                node,
                predicate: Predicate::Side(side),
            } => {
                let (a, d) = (ctx.start(ancestor), ctx.start(descendant));
                match (side, node.base) {
                    (Side::Left, NodeBase::Daughter) | (Side::Right, NodeBase::Parent) => d < a,
                    (Side::Left, NodeBase::Parent) | (Side::Right, NodeBase::Daughter) => d > a,
                    _ => false,
                }
            }
            Self::Condition { node, predicate } => {
                let (nodes, all) = nodes_to_check(ctx, node, ancestor, descendant);
                if nodes.is_empty() {
                    return false;
                }
                if all {
                    nodes.into_iter().all(|n| eval(ctx, predicate, n))
                } else {
                    nodes.into_iter().any(|n| eval(ctx, predicate, n))
                }
            }
        }
    }
}

/// Resolve a node reference. The flag is `true` when every resolved node must
/// pass.
fn nodes_to_check(
    ctx: &EvalContext<'_>,
    node: &NodeRef,
    ancestor: NodeId,
    descendant: NodeId,
) -> (Vec<NodeId>, bool) {
    match node.base {
        NodeBase::Parent => (ctx.resolve(&node.path, ancestor).into_iter().collect(), false),
        NodeBase::Daughter => (ctx.resolve(&node.path, descendant).into_iter().collect(), false),
        NodeBase::AllSiblings | NodeBase::AnySibling => {
            let nodes = ctx
                .deps
                .children(ancestor)
                .iter()
                .copied()
                .filter(|&s| s != descendant)
                .filter_map(|s| ctx.resolve(&node.path, s))
                .collect();
            (nodes, node.base == NodeBase::AllSiblings)
        }
    }
}

fn eval(ctx: &EvalContext<'_>, predicate: &Predicate, node: NodeId) -> bool {
    let Some(word) = ctx.word(node) else {
        return false;
    };
    match predicate {
        Predicate::Side(_) => false,
        Predicate::Label(values) => prefix_match(values, ctx.link_label(node)),
        Predicate::Lemma(values) => values.contains(word.lemma()),
        Predicate::Pos(re) => re.is_match(word.tag()),
        Predicate::Class(classes) => classes.iter().any(|c| ctx.classes.contains(c, word.lemma())),
        Predicate::Tonto(values) => any_sense(ctx, word, |info| info.tonto.iter().any(|t| values.contains(t))),
        Predicate::Semfile(values) => any_sense(ctx, word, |info| values.contains(&info.semfile)),
        Predicate::Synon(values) => any_sense(ctx, word, |info| info.words.iter().any(|w| values.contains(w))),
        Predicate::Asynon(values) => ancestor_synonym(ctx, word, values),
    }
}

fn any_sense(ctx: &EvalContext<'_>, word: &Word, test: impl Fn(&super::semdb::SenseInfo) -> bool) -> bool {
    let Some(db) = ctx.semdb else { return false };
    let pos = sense_pos(word.tag());
    db.word_senses(word.lemma(), &pos)
        .iter()
        .any(|s| test(&db.sense_info(s, &pos)))
}

/// Breadth-first search over the word's senses and their hypernyms.
fn ancestor_synonym(ctx: &EvalContext<'_>, word: &Word, values: &FxHashSet<String>) -> bool {
    let Some(db) = ctx.semdb else { return false };
    let pos = sense_pos(word.tag());
    let mut queue: VecDeque<String> = db.word_senses(word.lemma(), &pos).into();
    let mut seen: FxHashSet<String> = queue.iter().cloned().collect();
    while let Some(sense) = queue.pop_front() {
        let info = db.sense_info(&sense, &pos);
        if info.words.iter().any(|w| values.contains(w)) {
            return true;
        }
        for parent in info.parents {
            if seen.insert(parent.clone()) {
                queue.push_back(parent);
            }
        }
    }
    false
}
