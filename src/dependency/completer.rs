//! Tree completion: fuse the chunks of a shallow parse into one tree
//!
//! The chart parser leaves unconnected chunks under a fictitious start node.
//! The completer repeatedly picks the best rule for a pair of adjacent chunks
//! and hangs one under the other until a single tree remains.
//!
//! Rules live in the `<GRPAR>` section:
//!
//! ```text
//! % weight flags  context  (left,right)        operation  literal  node  toggles
//!   10     -      -        (sn,grup-verb)      top_right  RELABEL  -
//!   20     INIT   !$$_OUT  (grup-verb,sn)      top_left   RELABEL  -     -INIT +OBJ
//!   30     -      -        (grup-verb,sp<de>)  last_left  MATCHING sn
//! ```
//!
//! Chunk labels may carry conditions on their head word: `<lemma>`,
//! `(form)`, `{tag regex}` and `[word class]`. Context patterns are
//! `_`-separated lists around `$$` (the pair itself) with `?` (any chunk),
//! `*` (any run of chunks), `OUT` (beyond the sentence edge), `~` negation
//! and `|` alternatives.

use std::path::Path;
use std::sync::Arc;

use regex::Regex;
use rustc_hash::{FxHashMap, FxHashSet};

use super::rules::{load_classes, WordClasses};
use crate::diagnostics::{DiagnosticCode, LoadReport};
use crate::sections::{read_sections, SectionLines};
use crate::tree::NodeId;
use crate::types::{ParseTree, Sentence};

/// Flag active at the start of every sentence.
pub const INIT_FLAG: &str = "INIT";

// ============================================================================
// Rule pieces
// ============================================================================

/// How two adjacent chunks are joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Right chunk goes under the left chunk root.
    TopLeft,
    /// Left chunk goes under the right chunk root.
    TopRight,
    /// Right chunk goes under the last matching node of the left chunk.
    LastLeft,
    /// Left chunk goes under the last matching node of the right chunk.
    LastRight,
    /// Right chunk takes the place of the last matching node of the left
    /// chunk, which goes under it.
    CoverLastLeft,
}

impl Operation {
    fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "top_left" => Self::TopLeft,
            "top_right" => Self::TopRight,
            "last_left" => Self::LastLeft,
            "last_right" => Self::LastRight,
            "cover_last_left" => Self::CoverLastLeft,
            _ => return None,
        })
    }

    fn needs_node(self) -> bool {
        matches!(self, Self::LastLeft | Self::LastRight | Self::CoverLastLeft)
    }
}

#[derive(Debug, Clone)]
enum HeadCond {
    Lemma(String),
    Form(String),
    Tag(Regex),
    Class(String),
}

/// A chunk label with optional head-word conditions, e.g. `sp<de>`.
#[derive(Debug, Clone)]
struct ChunkPattern {
    label: String,
    conds: Vec<HeadCond>,
}

impl ChunkPattern {
    fn parse(text: &str) -> Result<Self, (DiagnosticCode, String)> {
        let Some(start) = text.find(['<', '(', '[', '{']) else {
            return Ok(Self {
                label: text.to_string(),
                conds: Vec::new(),
            });
        };
        let label = text[..start].to_string();
        let rest = &text[start..];
        let mut conds = Vec::new();
        let mut seen = String::new();
        let mut p = Some(0);
        while let Some(open_at) = p {
            let open = rest[open_at..].chars().next().unwrap_or('<');
            let close = match open {
                '<' => '>',
                '(' => ')',
                '[' => ']',
                _ => '}',
            };
            if seen.contains(open) {
                return Err((
                    DiagnosticCode::Syntax,
                    format!("duplicate {open}{close} condition in '{text}'"),
                ));
            }
            seen.push(open);
            let Some(close_at) = rest[open_at..].find(close).map(|q| q + open_at) else {
                return Err((DiagnosticCode::Syntax, format!("missing closing {close} in '{text}'")));
            };
            let inner = &rest[open_at + 1..close_at];
            conds.push(match open {
                '<' => HeadCond::Lemma(inner.to_string()),
                '(' => HeadCond::Form(inner.to_string()),
                '[' => HeadCond::Class(inner.to_string()),
                _ => HeadCond::Tag(Regex::new(inner).map_err(|e| {
                    (DiagnosticCode::InvalidRegex, format!("invalid tag pattern in '{text}': {e}"))
                })?),
            });
            p = rest[close_at..].find(['<', '(', '[', '{']).map(|q| q + close_at);
        }
        Ok(Self { label, conds })
    }
}

/// `~`-negatable list of `|` alternatives.
#[derive(Debug, Clone)]
struct ChunkMatcher {
    negated: bool,
    alternatives: Vec<ChunkPattern>,
}

impl ChunkMatcher {
    fn parse(text: &str) -> Result<Self, (DiagnosticCode, String)> {
        let (negated, body) = match text.strip_prefix('~') {
            Some(b) => (true, b),
            None => (false, text),
        };
        let alternatives = body
            .split('|')
            .map(ChunkPattern::parse)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { negated, alternatives })
    }
}

#[derive(Debug, Clone)]
enum ContextItem {
    /// `$$`
    Core,
    /// `*`
    Star,
    /// `?`
    Any,
    /// `OUT`
    Out,
    Pattern(ChunkMatcher),
}

/// One `<GRPAR>` rule.
#[derive(Debug, Clone)]
pub struct CompleterRule {
    line: usize,
    weight: i32,
    enabling: FxHashSet<String>,
    context: Vec<ContextItem>,
    context_negated: bool,
    left: ChunkPattern,
    right: ChunkPattern,
    operation: Operation,
    relabel: Option<String>,
    node: Option<ChunkMatcher>,
    flags_on: Vec<String>,
    flags_off: Vec<String>,
}

impl CompleterRule {
    pub fn line(&self) -> usize {
        self.line
    }

    pub fn weight(&self) -> i32 {
        self.weight
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn left_label(&self) -> &str {
        &self.left.label
    }

    pub fn right_label(&self) -> &str {
        &self.right.label
    }

    fn parse(lineno: usize, line: &str, report: &mut LoadReport) -> Option<Self> {
        let body = line.split('%').next().unwrap_or("");
        let fields: Vec<&str> = body.split_whitespace().collect();
        if fields.len() < 7 {
            report.error(
                DiagnosticCode::Syntax,
                Some(lineno),
                "expected 'weight flags context (left,right) operation RELABEL|MATCHING node [+flag|-flag]...'",
            );
            return None;
        }
        let fail = |report: &mut LoadReport, (code, msg): (DiagnosticCode, String)| {
            report.error(code, Some(lineno), msg);
        };

        let Ok(weight) = fields[0].parse::<i32>() else {
            fail(report, (DiagnosticCode::Syntax, format!("weight '{}' is not an integer", fields[0])));
            return None;
        };
        let enabling = fields[1].split('|').map(str::to_string).collect();

        let (context_negated, context_text) = match fields[2] {
            "-" => (false, "$$"),
            c => match c.strip_prefix('!') {
                Some(rest) => (true, if rest == "-" { "$$" } else { rest }),
                None => (false, c),
            },
        };
        let mut context = Vec::new();
        for item in context_text.split('_') {
            context.push(match item {
                "$$" => ContextItem::Core,
                "*" => ContextItem::Star,
                "?" => ContextItem::Any,
                "OUT" => ContextItem::Out,
                p => match ChunkMatcher::parse(p) {
                    Ok(m) => ContextItem::Pattern(m),
                    Err(e) => {
                        fail(report, e);
                        return None;
                    }
                },
            });
        }

        let pair = fields[3];
        let inner = pair.strip_prefix('(').and_then(|p| p.strip_suffix(')'));
        let Some((left_text, right_text)) = inner.and_then(|p| p.split_once(',')) else {
            fail(report, (DiagnosticCode::Syntax, format!("expected (left,right) chunk pair, found '{pair}'")));
            return None;
        };
        let (left, right) = match (ChunkPattern::parse(left_text), ChunkPattern::parse(right_text)) {
            (Ok(l), Ok(r)) => (l, r),
            (Err(e), _) | (_, Err(e)) => {
                fail(report, e);
                return None;
            }
        };

        let Some(operation) = Operation::parse(fields[4]) else {
            fail(report, (DiagnosticCode::UnknownName, format!("unknown operation '{}'", fields[4])));
            return None;
        };
        let literal = if operation.needs_node() { "MATCHING" } else { "RELABEL" };
        if fields[5] != literal {
            report.warning(
                DiagnosticCode::Syntax,
                Some(lineno),
                format!("{} requires {literal}, found '{}'", fields[4], fields[5]),
            );
        }

        let (relabel, node) = if operation.needs_node() {
            match ChunkMatcher::parse(fields[6]) {
                Ok(m) => (None, Some(m)),
                Err(e) => {
                    fail(report, e);
                    return None;
                }
            }
        } else if fields[6] == "-" {
            (None, None)
        } else {
            (Some(fields[6].to_string()), None)
        };

        let mut flags_on = Vec::new();
        let mut flags_off = Vec::new();
        for toggle in &fields[7..] {
            if let Some(f) = toggle.strip_prefix('+') {
                flags_on.push(f.to_string());
            } else if let Some(f) = toggle.strip_prefix('-') {
                flags_off.push(f.to_string());
            } else {
                fail(
                    report,
                    (DiagnosticCode::Syntax, format!("flag '{toggle}' must be toggled on (+) or off (-)")),
                );
                return None;
            }
        }

        Some(Self {
            line: lineno,
            weight,
            enabling,
            context,
            context_negated,
            left,
            right,
            operation,
            relabel,
            node,
            flags_on,
            flags_off,
        })
    }
}

/// The rule chosen for one chunk pair, or the default attachment.
#[derive(Debug, Clone)]
struct Choice<'r> {
    rule: Option<&'r CompleterRule>,
    weight: i32,
    operation: Operation,
    /// Node found for the `last_*` operations.
    target: Option<NodeId>,
}

#[derive(Debug, Clone, Copy)]
enum Dir {
    Left,
    Right,
}

// ============================================================================
// Completer
// ============================================================================

/// Joins the chunks of a shallow parse into one tree.
#[derive(Debug, Clone)]
pub struct Completer {
    rules: FxHashMap<(String, String), Vec<CompleterRule>>,
    classes: Arc<WordClasses>,
    start: String,
}

impl Completer {
    /// Load `<CLASS>` and `<GRPAR>` sections. Only trees rooted at
    /// `start_symbol` are completed.
    pub fn from_text(
        text: &str,
        origin: impl Into<String>,
        base_dir: Option<&Path>,
        start_symbol: impl Into<String>,
    ) -> crate::errors::Result<Self> {
        let mut report = LoadReport::new(origin);
        let sections = read_sections(text, &mut report);
        let classes = Arc::new(load_classes(sections.get("CLASS"), base_dir, &mut report));
        let completer = Self::from_section(sections.get("GRPAR"), classes, start_symbol, &mut report);
        report.finish(completer)
    }

    pub(crate) fn from_section(
        lines: Option<&SectionLines<'_>>,
        classes: Arc<WordClasses>,
        start_symbol: impl Into<String>,
        report: &mut LoadReport,
    ) -> Self {
        let mut rules: FxHashMap<(String, String), Vec<CompleterRule>> = FxHashMap::default();
        for &(lineno, line) in lines.into_iter().flatten() {
            if let Some(rule) = CompleterRule::parse(lineno, line, report) {
                rules
                    .entry((rule.left.label.clone(), rule.right.label.clone()))
                    .or_default()
                    .push(rule);
            }
        }
        Self {
            rules,
            classes,
            start: start_symbol.into(),
        }
    }

    pub fn start_symbol(&self) -> &str {
        &self.start
    }

    pub fn n_rules(&self) -> usize {
        self.rules.values().map(Vec::len).sum()
    }

    /// Rules registered for a chunk label pair, in file order.
    pub fn rules_for(&self, left: &str, right: &str) -> &[CompleterRule] {
        self.rules
            .get(&(left.to_string(), right.to_string()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Complete `tree`. A tree not rooted at the start symbol is returned
    /// unchanged; otherwise the root's children are chunks, numbered from 1,
    /// and the result is the single tree they fuse into.
    pub fn complete(&self, tree: &ParseTree, sentence: &Sentence) -> ParseTree {
        let root = tree.root();
        if tree.get(root).label != self.start || tree.is_leaf(root) {
            return tree.clone();
        }

        let mut work = tree.clone();
        let mut chunks: Vec<NodeId> = work.children(root).to_vec();
        for (i, &c) in chunks.iter().enumerate() {
            work.get_mut(c).chunk = i + 1;
        }
        for &c in &chunks {
            work.detach(c);
        }

        let mut flags: FxHashSet<String> = FxHashSet::default();
        flags.insert(INIT_FLAG.to_string());

        while chunks.len() > 1 {
            let mut best = self.find_rule(&work, sentence, &chunks, 0, &flags);
            let mut best_at = 0;
            for chk in 1..chunks.len() - 1 {
                let choice = self.find_rule(&work, sentence, &chunks, chk, &flags);
                if (choice.weight > 0 && choice.weight < best.weight)
                    || (best.weight <= 0 && choice.weight > best.weight)
                {
                    best = choice;
                    best_at = chk;
                }
            }
            tracing::trace!(
                line = best.rule.map(|r| r.line),
                operation = ?best.operation,
                position = best_at,
                "completer rule applied"
            );
            let fused = apply(&mut work, &best, chunks[best_at], chunks[best_at + 1], &mut flags);
            chunks[best_at] = fused;
            chunks.remove(best_at + 1);
        }

        work.extract(chunks[0]).0
    }

    fn find_rule(
        &self,
        work: &ParseTree,
        sentence: &Sentence,
        chunks: &[NodeId],
        chk: usize,
        flags: &FxHashSet<String>,
    ) -> Choice<'_> {
        let (left, right) = (chunks[chk], chunks[chk + 1]);
        let left_label = &work.get(left).label;
        let right_label = &work.get(right).label;

        let mut best: Option<Choice<'_>> = None;
        for rule in self.rules_for(left_label, right_label) {
            let enabled = rule.enabling.contains("-") || rule.enabling.iter().any(|f| flags.contains(f));
            if !enabled
                || !self.head_conditions(work, sentence, left, &rule.left.conds)
                || !self.head_conditions(work, sentence, right, &rule.right.conds)
                || !self.matching_context(work, sentence, chunks, chk, rule)
            {
                continue;
            }
            let target = match &rule.node {
                Some(m) if rule.operation.needs_node() => {
                    let within = if rule.operation == Operation::LastRight { right } else { left };
                    match work
                        .preorder(within)
                        .into_iter()
                        .filter(|&n| self.match_pattern(work, sentence, n, m))
                        .last()
                    {
                        Some(n) => Some(n),
                        None => continue,
                    }
                }
                _ => None,
            };
            if best.as_ref().map_or(true, |b| rule.weight < b.weight) {
                best = Some(Choice {
                    rule: Some(rule),
                    weight: rule.weight,
                    operation: rule.operation,
                    target,
                });
            }
        }

        best.unwrap_or_else(|| Choice {
            rule: None,
            weight: 0,
            operation: if left_label == "0" {
                Operation::TopRight
            } else {
                Operation::TopLeft
            },
            target: None,
        })
    }

    /// Conditions on the head word of `node`.
    fn head_conditions(&self, work: &ParseTree, sentence: &Sentence, node: NodeId, conds: &[HeadCond]) -> bool {
        if conds.is_empty() {
            return true;
        }
        let Some(word) = sentence.head_word(work, node) else {
            return false;
        };
        conds.iter().all(|c| match c {
            HeadCond::Lemma(l) => word.lemma() == l,
            HeadCond::Form(f) => &word.form == f,
            HeadCond::Tag(re) => re.is_match(word.tag()),
            HeadCond::Class(class) => self.classes.contains(class, word.lemma()),
        })
    }

    fn match_pattern(&self, work: &ParseTree, sentence: &Sentence, node: NodeId, m: &ChunkMatcher) -> bool {
        let label = &work.get(node).label;
        let found = m
            .alternatives
            .iter()
            .any(|alt| &alt.label == label && self.head_conditions(work, sentence, node, &alt.conds));
        found != m.negated
    }

    fn item_matches(&self, work: &ParseTree, sentence: &Sentence, item: &ContextItem, node: NodeId) -> bool {
        match item {
            ContextItem::Any => true,
            ContextItem::Pattern(m) => self.match_pattern(work, sentence, node, m),
            ContextItem::Core | ContextItem::Star | ContextItem::Out => false,
        }
    }

    fn matching_context(
        &self,
        work: &ParseTree,
        sentence: &Sentence,
        chunks: &[NodeId],
        chk: usize,
        rule: &CompleterRule,
    ) -> bool {
        let core = rule
            .context
            .iter()
            .position(|i| matches!(i, ContextItem::Core))
            .unwrap_or(rule.context.len());
        let matched = self.match_side(work, sentence, chunks, chk, &rule.context, core, Dir::Left)
            && self.match_side(work, sentence, chunks, chk, &rule.context, core, Dir::Right);
        matched != rule.context_negated
    }

    /// Walk outwards from the chunk pair, matching context items to chunks.
    #[allow(clippy::too_many_arguments)]
    fn match_side(
        &self,
        work: &ParseTree,
        sentence: &Sentence,
        chunks: &[NodeId],
        chk: usize,
        items: &[ContextItem],
        core: usize,
        dir: Dir,
    ) -> bool {
        let (step, mut k): (isize, isize) = match dir {
            Dir::Left => (-1, chk as isize - 1),
            Dir::Right => (1, chk as isize + 2),
        };
        let outside = |i: isize, len: usize| i < 0 || i >= len as isize;
        let mut j = core as isize + step;

        while !outside(j, items.len()) {
            let item = &items[j as usize];
            if outside(k, chunks.len()) {
                if !matches!(item, ContextItem::Out) {
                    return false;
                }
            } else {
                let mut ok = self.item_matches(work, sentence, item, chunks[k as usize]);
                if matches!(item, ContextItem::Star) {
                    j += step;
                    match (!outside(j, items.len())).then(|| &items[j as usize]) {
                        // a trailing star or a star before OUT takes the rest
                        None | Some(ContextItem::Out) => ok = true,
                        Some(next) => {
                            while !outside(k, chunks.len()) && !ok {
                                ok = self.item_matches(work, sentence, next, chunks[k as usize]);
                                k += step;
                            }
                            k -= step;
                        }
                    }
                }
                if !ok {
                    return false;
                }
            }
            k += step;
            j += step;
        }
        true
    }
}

/// Join `left` and `right` as the choice says. Returns the fused chunk.
fn apply(work: &mut ParseTree, choice: &Choice<'_>, left: NodeId, right: NodeId, flags: &mut FxHashSet<String>) -> NodeId {
    if let Some(rule) = choice.rule {
        flags.extend(rule.flags_on.iter().cloned());
        for f in &rule.flags_off {
            flags.remove(f);
        }
    }
    let relabel = choice.rule.and_then(|r| r.relabel.clone());

    match (choice.operation, choice.target) {
        (Operation::TopRight, _) => {
            work.get_mut(left).head = false;
            work.get_mut(right).head = true;
            if let Some(label) = relabel {
                work.get_mut(right).label = label;
            }
            work.prepend_child(right, left);
            right
        }
        (Operation::TopLeft, _) => {
            work.get_mut(right).head = false;
            work.get_mut(left).head = true;
            if let Some(label) = relabel {
                work.get_mut(left).label = label;
            }
            work.append_child(left, right);
            left
        }
        (Operation::LastLeft, Some(last)) => {
            work.get_mut(right).head = false;
            work.append_child(last, right);
            left
        }
        (Operation::LastRight, Some(last)) => {
            work.get_mut(left).head = false;
            work.prepend_child(last, left);
            right
        }
        (Operation::CoverLastLeft, Some(last)) => {
            work.get_mut(right).head = true;
            work.get_mut(left).head = false;
            match (work.parent(last), work.sibling_index(last)) {
                (Some(parent), Some(at)) => {
                    work.get_mut(last).head = false;
                    work.prepend_child(right, last);
                    work.insert_child(parent, at, right);
                    left
                }
                _ => {
                    work.prepend_child(right, left);
                    right
                }
            }
        }
        // last_* choices always carry their target node
        (_, None) => {
            work.append_child(left, right);
            left
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Analysis, ParseNode, Word};
    use pretty_assertions::assert_eq;

    /// Build `S[chunk chunk ...]`, each chunk `(label, words, head)` over
    /// consecutive words with leaves labelled by tag.
    fn chunked(words: &[(&str, &str, &str)], chunks: &[(&str, usize, usize)]) -> (Sentence, ParseTree) {
        let sentence = Sentence::new(
            words
                .iter()
                .map(|(f, l, t)| Word::new(*f).with_analysis(Analysis::new(*l, *t)))
                .collect(),
        );
        let mut tree = ParseTree::new(ParseNode::new("S"));
        let mut next = 0;
        for &(label, len, head) in chunks {
            let c = tree.add_child(0, ParseNode::new(label));
            for i in 0..len {
                let w = next + i;
                let mut leaf = ParseNode::new(words[w].2);
                leaf.word = Some(w);
                leaf.head = i == head;
                tree.add_child(c, leaf);
            }
            next += len;
        }
        (sentence, tree)
    }

    fn complete(rules: &str, sentence: &Sentence, tree: &ParseTree) -> String {
        let text = format!("<GRPAR>\n{rules}\n</GRPAR>\n");
        let c = Completer::from_text(&text, "t", None, "S").unwrap();
        let out = c.complete(tree, sentence);
        out.bracketed(out.root())
    }

    fn el_perro_come_carne() -> (Sentence, ParseTree) {
        chunked(
            &[
                ("el", "el", "DA0MS0"),
                ("perro", "perro", "NCMS000"),
                ("come", "comer", "VMIP3S0"),
                ("carne", "carne", "NCFS000"),
            ],
            &[("sn", 2, 1), ("grup-verb", 1, 0), ("sn", 1, 0)],
        )
    }

    #[test]
    fn test_top_operations() {
        let (s, t) = el_perro_come_carne();
        let rules = "10 - - (sn,grup-verb) top_right RELABEL -\n20 - - (grup-verb,sn) top_left RELABEL -";
        assert_eq!(
            complete(rules, &s, &t),
            "+grup-verb[sn[DA0MS0 +NCMS000] +VMIP3S0 sn[+NCFS000]]"
        );
    }

    #[test]
    fn test_lowest_positive_weight_wins() {
        let (s, t) = el_perro_come_carne();
        // the object attaches first and the verb phrase is relabelled
        let rules = "20 - - (sn,grup-verb) top_right RELABEL -\n10 - - (grup-verb,sn) top_left RELABEL sv";
        // the object attaches first; the relabelled verb phrase then falls
        // back to the default attachment
        assert_eq!(complete(rules, &s, &t), "+sn[DA0MS0 +NCMS000 sv[+VMIP3S0 sn[+NCFS000]]]");
    }

    #[test]
    fn test_chunks_are_numbered() {
        let (s, t) = el_perro_come_carne();
        let c = Completer::from_text("<GRPAR>\n</GRPAR>\n", "t", None, "S").unwrap();
        let out = c.complete(&t, &s);
        let mut chunks: Vec<(String, usize)> = out
            .iter()
            .filter(|(_, n)| n.chunk > 0)
            .map(|(_, n)| (n.label.clone(), n.chunk))
            .collect();
        chunks.sort_by_key(|c| c.1);
        assert_eq!(
            chunks,
            vec![("sn".to_string(), 1), ("grup-verb".to_string(), 2), ("sn".to_string(), 3)]
        );
        // default attachment: everything hangs under the first chunk
        assert_eq!(out.bracketed(out.root()), "+sn[DA0MS0 +NCMS000 grup-verb[+VMIP3S0] sn[+NCFS000]]");
    }

    #[test]
    fn test_head_conditions() {
        let (s, t) = el_perro_come_carne();
        let rules = "10 - - (grup-verb,sn<perro>) top_left RELABEL A\n\
                     11 - - (grup-verb,sn{^NCF}) top_left RELABEL B\n\
                     5 - - (sn(el),grup-verb) top_right RELABEL C";
        // sn(el) fails: the head word of the subject is perro
        assert_eq!(
            complete(rules, &s, &t),
            "+sn[DA0MS0 +NCMS000 B[+VMIP3S0 sn[+NCFS000]]]"
        );
    }

    #[test]
    fn test_word_class_condition() {
        let (s, t) = el_perro_come_carne();
        let text = "<CLASS>\nfood carne\n</CLASS>\n<GRPAR>\n10 - - (grup-verb,sn[food]) top_left RELABEL eat\n</GRPAR>\n";
        let c = Completer::from_text(text, "t", None, "S").unwrap();
        let out = c.complete(&t, &s);
        assert!(out.bracketed(out.root()).contains("eat["));
    }

    #[test]
    fn test_context() {
        let (s, t) = el_perro_come_carne();
        // (sn,grup-verb) only when nothing precedes it and an sn follows
        let rules = "10 - OUT_$$_sn (sn,grup-verb) top_right RELABEL X";
        assert_eq!(complete(rules, &s, &t), "+X[sn[DA0MS0 +NCMS000] +VMIP3S0 sn[+NCFS000]]");
        let rules = "10 - OUT_$$_sn (sn,grup-verb) top_right RELABEL X\n\
                     5 - ?_$$_OUT (grup-verb,sn) top_left RELABEL Y";
        assert_eq!(complete(rules, &s, &t), "+sn[DA0MS0 +NCMS000 Y[+VMIP3S0 sn[+NCFS000]]]");
        // negated context: never when the pair is at the sentence start
        let rules = "10 - !OUT_$$ (sn,grup-verb) top_right RELABEL X";
        assert_eq!(
            complete(rules, &s, &t),
            "+sn[DA0MS0 +NCMS000 grup-verb[+VMIP3S0] sn[+NCFS000]]"
        );
    }

    #[test]
    fn test_star_context() {
        let (s, t) = chunked(
            &[("a", "a", "A"), ("b", "b", "B"), ("c", "c", "C"), ("d", "d", "D")],
            &[("a", 1, 0), ("b", 1, 0), ("c", 1, 0), ("d", 1, 0)],
        );
        let rules = "10 - $$_*_d (a,b) top_left RELABEL ab\n10 - $$_*_x (b,c) top_left RELABEL bc";
        let out = complete(rules, &s, &t);
        assert!(out.starts_with("+ab["), "{out}");
        assert!(!out.contains("bc["), "{out}");
        // a star before OUT always matches
        let rules = "10 - $$_*_OUT (b,c) top_left RELABEL bc";
        assert!(complete(rules, &s, &t).contains("bc["));
    }

    #[test]
    fn test_flags() {
        let (s, t) = el_perro_come_carne();
        // the first rule switches INIT off, so the second never fires
        let rules = "10 INIT - (sn,grup-verb) top_right RELABEL - -INIT +OBJ\n\
                     10 INIT - (grup-verb,sn) top_left RELABEL wrong\n\
                     20 OBJ - (grup-verb,sn) top_left RELABEL right";
        assert_eq!(complete(rules, &s, &t), "+right[sn[DA0MS0 +NCMS000] +VMIP3S0 sn[+NCFS000]]");
    }

    #[test]
    fn test_last_left_and_cover() {
        let (s, t) = chunked(
            &[
                ("come", "comer", "VMIP3S0"),
                ("carne", "carne", "NCFS000"),
                ("de", "de", "SPS00"),
                ("vaca", "vaca", "NCFS000"),
            ],
            &[("grup-verb", 2, 0), ("sp", 2, 0)],
        );
        let mut tree = t;
        // nest the object: grup-verb[+VMIP3S0 sn[+NCFS000]]
        let gv = tree.children(0)[0];
        let carne = tree.children(gv)[1];
        let sn = tree.new_node(ParseNode::new("sn"));
        tree.insert_child(gv, 1, sn);
        tree.append_child(sn, carne);
        tree.get_mut(carne).head = true;

        let out = complete("10 - - (grup-verb,sp) last_left MATCHING sn", &s, &tree);
        assert_eq!(out, "grup-verb[+VMIP3S0 sn[+NCFS000 sp[+SPS00 NCFS000]]]");

        let out = complete("10 - - (grup-verb,sp) cover_last_left MATCHING sn", &s, &tree);
        assert_eq!(out, "grup-verb[+VMIP3S0 +sp[sn[+NCFS000] +SPS00 NCFS000]]");

        // no sn inside sp: the last_right rule is not feasible
        let out = complete("5 - - (grup-verb,sp) last_right MATCHING sn", &s, &tree);
        assert_eq!(out, "+grup-verb[+VMIP3S0 sn[+NCFS000] sp[+SPS00 NCFS000]]");
    }

    #[test]
    fn test_other_roots_untouched() {
        let (s, mut t) = el_perro_come_carne();
        t.get_mut(0).label = "frase".into();
        let c = Completer::from_text("", "t", None, "S").unwrap();
        assert_eq!(c.complete(&t, &s), t);
    }

    #[test]
    fn test_load_errors() {
        let text = "<GRPAR>\n\
                    x - - (a,b) top_left RELABEL -\n\
                    1 - - a,b top_left RELABEL -\n\
                    1 - - (a,b) sideways RELABEL -\n\
                    1 - - (a<b,c) top_left RELABEL -\n\
                    1 - - (a<b><c>,c) top_left RELABEL -\n\
                    1 - - (a,b) top_left RELABEL - INIT\n\
                    1 - - (a,b) top_left MATCHING -\n\
                    </GRPAR>\n";
        let err = Completer::from_text(text, "t", None, "S").unwrap_err();
        let report = err.report().unwrap();
        assert_eq!(report.errors().count(), 6);
        assert_eq!(report.warnings().count(), 1);
    }

    #[test]
    fn test_rules_indexed_by_pair() {
        let c = Completer::from_text(
            "<GRPAR>\n1 - - (sn,grup-verb) top_right RELABEL - % subject\n2 - - (sn,grup-verb) top_left RELABEL -\n</GRPAR>\n",
            "t",
            None,
            "S",
        )
        .unwrap();
        assert_eq!(c.n_rules(), 2);
        assert_eq!(c.rules_for("sn", "grup-verb").len(), 2);
        assert_eq!(c.rules_for("sn", "grup-verb")[0].operation(), Operation::TopRight);
        assert!(c.rules_for("sp", "sn").is_empty());
    }
}
