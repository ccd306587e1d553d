//! Dependency labelling
//!
//! `<GRLAB>` rules are grouped by the constituent label of the governing
//! word. For each child of a node, the rules of the node's group are tried
//! in file order; the first whose conditions all hold names the relation.

use std::path::Path;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use super::rules::{load_classes, load_sets, EvalContext, RuleExpression, TermSets, WordClasses};
use super::semdb::{FileSemanticDb, SemanticDb};
use crate::diagnostics::{DiagnosticCode, LoadReport};
use crate::errors::Result;
use crate::sections::{read_sections, SectionLines};
use crate::tree::NodeId;
use crate::types::{DepTree, ParseTree, Sentence};

/// Relation given to the root.
pub const TOP_LABEL: &str = "top";
/// Relation given when the governor's group has no matching rule.
pub const NO_MATCH_LABEL: &str = "modnomatch";
/// Relation given when the governor's label has no rule group.
pub const NO_RULE_LABEL: &str = "modnorule";

/// One `ancestorLabel label cond...` line.
#[derive(Debug, Clone)]
pub struct LabelRule {
    pub line: usize,
    pub ancestor: String,
    pub label: String,
    pub expression: RuleExpression,
}

/// Names dependency relations with `<GRLAB>` rules.
#[derive(Debug, Clone)]
pub struct Labeler {
    rules: FxHashMap<String, Vec<LabelRule>>,
    classes: Arc<WordClasses>,
    semdb: Option<Arc<dyn SemanticDb>>,
}

impl Labeler {
    /// Load `<CLASS>`, `<SETS>`, `<SEMDB>` and `<GRLAB>` sections. Database
    /// files are resolved against `base_dir`.
    pub fn from_text(text: &str, origin: impl Into<String>, base_dir: Option<&Path>) -> Result<Self> {
        let mut report = LoadReport::new(origin);
        let sections = read_sections(text, &mut report);
        let classes = Arc::new(load_classes(sections.get("CLASS"), base_dir, &mut report));
        let sets = load_sets(sections.get("SETS"), &mut report);
        let semdb = load_semdb(sections.get("SEMDB"), base_dir, &mut report);
        let labeler = Self::from_section(sections.get("GRLAB"), classes, &sets, semdb, &mut report);
        report.finish(labeler)
    }

    pub(crate) fn from_section(
        lines: Option<&SectionLines<'_>>,
        classes: Arc<WordClasses>,
        sets: &TermSets,
        semdb: Option<Arc<dyn SemanticDb>>,
        report: &mut LoadReport,
    ) -> Self {
        let mut rules: FxHashMap<String, Vec<LabelRule>> = FxHashMap::default();
        for &(lineno, line) in lines.into_iter().flatten() {
            let mut fields = line.split_whitespace();
            let (Some(ancestor), Some(label)) = (fields.next(), fields.next()) else {
                report.error(
                    DiagnosticCode::Syntax,
                    Some(lineno),
                    format!("expected 'ancestorLabel label condition...', found '{line}'"),
                );
                continue;
            };
            let mut conditions = Vec::new();
            let mut ok = true;
            while let Some(field) = fields.next() {
                let cond = if field.eq_ignore_ascii_case("NOT") {
                    match fields.next() {
                        Some(next) => format!("NOT {next}"),
                        None => {
                            report.error(DiagnosticCode::Syntax, Some(lineno), "NOT without a condition");
                            ok = false;
                            break;
                        }
                    }
                } else {
                    field.to_string()
                };
                match RuleExpression::parse_condition_with_sets(&cond, semdb.is_some(), sets) {
                    Ok(e) => conditions.push(e),
                    Err((code, msg)) => {
                        report.error(code, Some(lineno), msg);
                        ok = false;
                    }
                }
            }
            if ok {
                rules.entry(ancestor.to_string()).or_default().push(LabelRule {
                    line: lineno,
                    ancestor: ancestor.to_string(),
                    label: label.to_string(),
                    expression: RuleExpression::And(conditions),
                });
            }
        }
        Self { rules, classes, semdb }
    }

    pub fn n_rules(&self) -> usize {
        self.rules.values().map(Vec::len).sum()
    }

    pub fn has_semantic_db(&self) -> bool {
        self.semdb.is_some()
    }

    /// Set the relation of every node of `deps`. Conditions see the parse
    /// tree the nodes link to and the sentence words.
    pub fn label(&self, deps: &mut DepTree, parse: &ParseTree, sentence: &Sentence) {
        let root = deps.root();
        let mut labels = vec![(root, TOP_LABEL.to_string())];
        {
            let ctx = EvalContext {
                deps: &*deps,
                parse,
                sentence,
                classes: &self.classes,
                semdb: self.semdb.as_deref(),
            };
            self.label_children(&ctx, root, &mut labels);
        }
        for (node, label) in labels {
            deps.get_mut(node).label = label;
        }
    }

    fn label_children(&self, ctx: &EvalContext<'_>, ancestor: NodeId, out: &mut Vec<(NodeId, String)>) {
        let group = &ctx.parse.get(ctx.deps.get(ancestor).link).label;
        for &child in ctx.deps.children(ancestor) {
            let label = match self.rules.get(group) {
                Some(rules) => match rules.iter().find(|r| r.expression.check(ctx, ancestor, child)) {
                    Some(rule) => {
                        tracing::trace!(line = rule.line, label = %rule.label, "dependency labelled");
                        rule.label.clone()
                    }
                    None => NO_MATCH_LABEL.to_string(),
                },
                None => NO_RULE_LABEL.to_string(),
            };
            out.push((child, label));
            self.label_children(ctx, child, out);
        }
    }
}

/// Read `SenseFile path` and `WNFile path` lines.
pub(crate) fn load_semdb(
    lines: Option<&SectionLines<'_>>,
    base_dir: Option<&Path>,
    report: &mut LoadReport,
) -> Option<Arc<dyn SemanticDb>> {
    let lines = lines?;
    let resolve = |f: &str| match base_dir {
        Some(dir) => dir.join(f),
        None => Path::new(f).to_path_buf(),
    };
    let mut sense_file = None;
    let mut wordnet_file = None;
    for &(lineno, line) in lines {
        let mut fields = line.split_whitespace();
        match (fields.next(), fields.next()) {
            (Some("SenseFile"), Some(f)) => sense_file = Some(resolve(f)),
            (Some("WNFile"), Some(f)) => wordnet_file = Some(resolve(f)),
            (Some(key), _) => report.warning(
                DiagnosticCode::UnknownName,
                Some(lineno),
                format!("unknown <SEMDB> parameter '{key}'"),
            ),
            (None, _) => {}
        }
    }
    if sense_file.is_none() && wordnet_file.is_none() {
        return None;
    }
    match FileSemanticDb::from_files(sense_file.as_deref(), wordnet_file.as_deref()) {
        Ok(db) => Some(Arc::new(db)),
        Err(e) => {
            report.error(DiagnosticCode::UnreadableFile, None, format!("semantic database: {e}"));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Analysis, DepNode, ParseNode, Word};
    use pretty_assertions::assert_eq;

    /// `come` governs `perro` (sn, left) and `carne` (sn, right); `carne`
    /// governs `roja` (s-a-ms).
    fn fixture() -> (Sentence, ParseTree, DepTree) {
        let words = [
            ("perro", "perro", "NCMS000"),
            ("come", "comer", "VMIP3S0"),
            ("carne", "carne", "NCFS000"),
            ("roja", "rojo", "AQ0FS0"),
        ];
        let mut pos = 0;
        let sentence = Sentence::new(
            words
                .iter()
                .map(|(f, l, t)| {
                    let w = Word::new(*f).with_span(pos, pos + f.len()).with_analysis(Analysis::new(*l, *t));
                    pos += f.len() + 1;
                    w
                })
                .collect(),
        );
        let mut parse = ParseTree::new(ParseNode::new("grup-verb"));
        let sn1 = parse.add_child(0, ParseNode::new("sn"));
        let sn2 = parse.add_child(0, ParseNode::new("sn"));
        let adj = parse.add_child(sn2, ParseNode::new("s-a-ms"));

        let node = |word, link| DepNode { label: String::new(), word, link, chunk: 0 };
        let mut deps = DepTree::new(node(1, 0));
        deps.add_child(0, node(0, sn1));
        let carne = deps.add_child(0, node(2, sn2));
        deps.add_child(carne, node(3, adj));
        (sentence, parse, deps)
    }

    fn labels(deps: &DepTree, sentence: &Sentence) -> Vec<(String, String)> {
        deps.iter()
            .map(|(_, n)| (sentence.words[n.word].form.clone(), n.label.clone()))
            .collect()
    }

    #[test]
    fn test_labelling() {
        let text = "<GRLAB>\n\
                    grup-verb subj d.label=sn d.side=left\n\
                    grup-verb dobj d.label=sn d.side=right\n\
                    </GRLAB>\n";
        let labeler = Labeler::from_text(text, "t", None).unwrap();
        assert_eq!(labeler.n_rules(), 2);
        let (s, p, mut d) = fixture();
        labeler.label(&mut d, &p, &s);
        assert_eq!(
            labels(&d, &s),
            vec![
                ("come".to_string(), "top".to_string()),
                ("perro".to_string(), "subj".to_string()),
                ("carne".to_string(), "dobj".to_string()),
                // carne links to an sn, which has no rule group
                ("roja".to_string(), "modnorule".to_string()),
            ]
        );
    }

    #[test]
    fn test_first_rule_wins_and_no_match() {
        let text = "<GRLAB>\n\
                    grup-verb first p.lemma=comer\n\
                    grup-verb second p.lemma=comer\n\
                    sn adj d.lemma=verde\n\
                    </GRLAB>\n";
        let labeler = Labeler::from_text(text, "t", None).unwrap();
        let (s, p, mut d) = fixture();
        labeler.label(&mut d, &p, &s);
        let got = labels(&d, &s);
        assert_eq!(got[1].1, "first");
        assert_eq!(got[2].1, "first");
        assert_eq!(got[3].1, NO_MATCH_LABEL);
    }

    #[test]
    fn test_classes_and_semdb_section() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("senses.txt"), "W:carne:n c1\nS:c1:n carne chicha\n").unwrap();
        std::fs::write(dir.path().join("wn.txt"), "c1:n - noun.food Substance\n").unwrap();
        let text = "<CLASS>\nfood carne\n</CLASS>\n\
                    <SEMDB>\nSenseFile senses.txt\nWNFile wn.txt\n</SEMDB>\n\
                    <GRLAB>\n\
                    grup-verb eaten d.class=food d.semfile=noun.food d.synon=chicha\n\
                    grup-verb other d.label=sn\n\
                    </GRLAB>\n";
        let labeler = Labeler::from_text(text, "t", Some(dir.path())).unwrap();
        assert!(labeler.has_semantic_db());
        let (s, p, mut d) = fixture();
        labeler.label(&mut d, &p, &s);
        let got = labels(&d, &s);
        assert_eq!(got[1].1, "other");
        assert_eq!(got[2].1, "eaten");
    }

    #[test]
    fn test_semantic_predicate_without_db_is_rejected() {
        let text = "<GRLAB>\ngrup-verb x d.tonto=Human\ngrup-verb y d.colour=red\nlonely\n</GRLAB>\n";
        let err = Labeler::from_text(text, "t", None).unwrap_err();
        let report = err.report().unwrap();
        assert!(report.has_code(DiagnosticCode::MissingSemanticDb));
        assert!(report.has_code(DiagnosticCode::UnknownName));
        assert_eq!(report.errors().count(), 3);
    }

    #[test]
    fn test_sets_and_not_prefix() {
        let text = "<SETS>\nMEAT carne pollo\n</SETS>\n\
                    <GRLAB>\n\
                    grup-verb dobj d.lemma=$MEAT\n\
                    grup-verb subj NOT d.lemma=$MEAT d.side=left\n\
                    sn mod not d.label=sn\n\
                    </GRLAB>\n";
        let labeler = Labeler::from_text(text, "t", None).unwrap();
        assert_eq!(labeler.n_rules(), 3);
        let (s, p, mut d) = fixture();
        labeler.label(&mut d, &p, &s);
        let got: Vec<String> = labels(&d, &s).into_iter().map(|(_, l)| l).collect();
        assert_eq!(got, vec!["top", "subj", "dobj", "mod"]);
    }

    #[test]
    fn test_undefined_set_and_dangling_not() {
        let text = "<SETS>\nLONELY\n</SETS>\n\
                    <GRLAB>\n\
                    grup-verb x d.lemma=$FRUIT\n\
                    grup-verb y d.side=left NOT\n\
                    </GRLAB>\n";
        let err = Labeler::from_text(text, "t", None).unwrap_err();
        let report = err.report().unwrap();
        assert!(report.has_code(DiagnosticCode::UndefinedSet));
        let lines: Vec<Option<usize>> = report.errors().map(|d| d.line).collect();
        assert_eq!(lines, vec![Some(2), Some(5), Some(6)]);
    }

    #[test]
    fn test_unreadable_semdb() {
        let text = "<SEMDB>\nSenseFile /nonexistent/senses.txt\nColour red\n</SEMDB>\n";
        let err = Labeler::from_text(text, "t", None).unwrap_err();
        let report = err.report().unwrap();
        assert!(report.has_code(DiagnosticCode::UnreadableFile));
        assert_eq!(report.warnings().count(), 1);
    }
}
