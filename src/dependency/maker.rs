use std::path::Path;
use std::sync::Arc;

use super::completer::Completer;
use super::labeler::{load_semdb, Labeler};
use super::rules::{load_classes, load_sets};
use super::semdb::SemanticDb;
use crate::diagnostics::LoadReport;
use crate::errors::{read_to_string, Result};
use crate::sections::read_sections;
use crate::tree::NodeId;
use crate::types::{DepNode, DepTree, ParseTree, Sentence};

/// Builds labelled dependency trees from chunk parses.
///
/// One rule file feeds both halves: `<GRPAR>` completes the chunk parse into
/// a full tree, `<GRLAB>` labels the dependencies read off that tree.
/// `<CLASS>` and `<SEMDB>` are shared.
#[derive(Debug, Clone)]
pub struct DependencyMaker {
    completer: Completer,
    labeler: Labeler,
}

impl DependencyMaker {
    pub fn new(completer: Completer, labeler: Labeler) -> Self {
        Self { completer, labeler }
    }

    /// Load a rule file. Referenced files are relative to its directory.
    pub fn from_file(path: impl AsRef<Path>, start_symbol: impl Into<String>) -> Result<Self> {
        let path = path.as_ref();
        let text = read_to_string(path)?;
        Self::load(&text, path.display().to_string(), path.parent(), start_symbol, None)
    }

    pub fn from_text(
        text: &str,
        origin: impl Into<String>,
        base_dir: Option<&Path>,
        start_symbol: impl Into<String>,
    ) -> Result<Self> {
        Self::load(text, origin, base_dir, start_symbol, None)
    }

    /// Like [`from_text`](Self::from_text), with a semantic database
    /// supplied by the caller instead of a `<SEMDB>` section.
    pub fn from_text_with_semdb(
        text: &str,
        origin: impl Into<String>,
        base_dir: Option<&Path>,
        start_symbol: impl Into<String>,
        semdb: Arc<dyn SemanticDb>,
    ) -> Result<Self> {
        Self::load(text, origin, base_dir, start_symbol, Some(semdb))
    }

    fn load(
        text: &str,
        origin: impl Into<String>,
        base_dir: Option<&Path>,
        start_symbol: impl Into<String>,
        semdb: Option<Arc<dyn SemanticDb>>,
    ) -> Result<Self> {
        let mut report = LoadReport::new(origin);
        let sections = read_sections(text, &mut report);
        let classes = Arc::new(load_classes(sections.get("CLASS"), base_dir, &mut report));
        let semdb = match semdb {
            Some(db) => Some(db),
            None => load_semdb(sections.get("SEMDB"), base_dir, &mut report),
        };
        let completer = Completer::from_section(sections.get("GRPAR"), classes.clone(), start_symbol, &mut report);
        let sets = load_sets(sections.get("SETS"), &mut report);
        let labeler = Labeler::from_section(sections.get("GRLAB"), classes, &sets, semdb, &mut report);
        tracing::debug!(
            completer_rules = completer.n_rules(),
            labeler_rules = labeler.n_rules(),
            "dependency rules loaded"
        );
        report.finish(Self::new(completer, labeler))
    }

    pub fn completer(&self) -> &Completer {
        &self.completer
    }

    pub fn labeler(&self) -> &Labeler {
        &self.labeler
    }

    pub fn analyze(&self, sentences: &mut [Sentence]) {
        for s in sentences.iter_mut() {
            self.analyze_sentence(s);
        }
    }

    /// Complete the sentence's parse tree and derive its labelled dependency
    /// tree. Sentences without a parse tree are left alone.
    pub fn analyze_sentence(&self, sentence: &mut Sentence) {
        let Some(parse) = sentence.parse_tree.as_ref() else {
            tracing::debug!("sentence has no parse tree, no dependencies built");
            return;
        };
        let completed = self.completer.complete(parse, sentence);
        let deps = dependencies(&completed).map(|mut deps| {
            self.labeler.label(&mut deps, &completed, sentence);
            deps
        });
        sentence.parse_tree = Some(completed);
        sentence.dep_tree = deps;
    }
}

/// Read the dependency tree off a parse tree: each constituent collapses
/// into its head child, and the other children hang below it in sentence
/// order. `None` when the tree covers no word.
pub fn dependencies(parse: &ParseTree) -> Option<DepTree> {
    let root = parse.root();
    let mut out = DepTree::new(DepNode {
        label: String::new(),
        word: 0,
        link: root,
        chunk: 0,
    });
    let top = build(parse, root, root, &mut out)?;
    Some(out.extract(top).0)
}

/// `link` is the highest constituent headed by `node`'s head word so far.
fn build(parse: &ParseTree, node: NodeId, link: NodeId, out: &mut DepTree) -> Option<NodeId> {
    let data = parse.get(node);
    if parse.is_leaf(node) {
        return data.word.map(|word| {
            out.new_node(DepNode {
                label: String::new(),
                word,
                link,
                chunk: data.chunk,
            })
        });
    }

    let children = parse.children(node);
    let head_at = children
        .iter()
        .position(|&c| parse.get(c).head)
        .unwrap_or_else(|| {
            tracing::warn!(label = %data.label, "constituent has no head, using its first child");
            0
        });
    let link = if data.head { link } else { node };

    let head = build(parse, children[head_at], link, out)?;
    for &k in &children[head_at + 1..] {
        if let Some(dep) = build(parse, k, k, out) {
            out.append_child(head, dep);
        }
    }
    for &k in children[..head_at].iter().rev() {
        if let Some(dep) = build(parse, k, k, out) {
            out.prepend_child(head, dep);
        }
    }
    if data.chunk != 0 {
        out.get_mut(head).chunk = data.chunk;
    }
    Some(head)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::{ChartParser, Grammar};
    use crate::dependency::semdb::FileSemanticDb;
    use crate::types::{Analysis, ParseNode};
    use pretty_assertions::assert_eq;

    const GRAMMAR: &str = "sn ==> DA, +NC .\nsn ==> +NC .\ngrup-verb ==> +VMIP3S0 .\n@START S .\n";
    const RULES: &str = "<GRPAR>\n\
                         10 - - (sn,grup-verb) top_right RELABEL -\n\
                         20 - - (grup-verb,sn) top_left RELABEL -\n\
                         </GRPAR>\n\
                         <GRLAB>\n\
                         grup-verb subj d.label=sn d.side=left\n\
                         grup-verb dobj d.label=sn d.side=right\n\
                         sn spec d.pos=^DA\n\
                         </GRLAB>\n";

    fn sentence() -> Sentence {
        let mut s = Sentence::from_forms(&["el", "perro", "come", "carne"]);
        for (w, (l, t)) in s
            .words
            .iter_mut()
            .zip([("el", "DA"), ("perro", "NC"), ("comer", "VMIP3S0"), ("carne", "NC")])
        {
            w.add_analysis(Analysis::new(l, t));
        }
        s
    }

    /// `(form, relation, chunk)` in dependency-tree preorder, with depth.
    fn flatten(s: &Sentence) -> Vec<(usize, String, String, usize)> {
        fn walk(t: &DepTree, s: &Sentence, n: NodeId, depth: usize, out: &mut Vec<(usize, String, String, usize)>) {
            let d = t.get(n);
            out.push((depth, s.words[d.word].form.clone(), d.label.clone(), d.chunk));
            for &c in t.children(n) {
                walk(t, s, c, depth + 1, out);
            }
        }
        let mut out = Vec::new();
        let t = s.dep_tree.as_ref().unwrap();
        walk(t, s, t.root(), 0, &mut out);
        out
    }

    #[test]
    fn test_end_to_end() {
        let parser = ChartParser::new(Grammar::from_text(GRAMMAR, "g", None).unwrap());
        let maker = DependencyMaker::from_text(RULES, "d", None, parser.start_symbol()).unwrap();
        let mut s = sentence();
        parser.analyze_sentence(&mut s);
        maker.analyze_sentence(&mut s);

        let tree = s.parse_tree.as_ref().unwrap();
        assert_eq!(tree.bracketed(tree.root()), "+grup-verb[sn[DA +NC] +VMIP3S0 sn[+NC]]");
        let row = |d: usize, f: &str, l: &str, c: usize| (d, f.to_string(), l.to_string(), c);
        assert_eq!(
            flatten(&s),
            vec![
                row(0, "come", "top", 2),
                row(1, "perro", "subj", 1),
                row(2, "el", "spec", 0),
                row(1, "carne", "dobj", 3),
            ]
        );
        // every word is linked to its maximal projection
        let deps = s.dep_tree.as_ref().unwrap();
        let links: Vec<&str> = deps.iter().map(|(_, d)| tree.get(d.link).label.as_str()).collect();
        assert_eq!(links, vec!["grup-verb", "sn", "DA", "sn"]);
    }

    #[test]
    fn test_sentence_order_around_head() {
        // x[a b +c d] with c heading
        let mut parse = ParseTree::new(ParseNode::new("x"));
        for (i, label) in ["a", "b", "c", "d"].iter().enumerate() {
            let mut leaf = ParseNode::new(*label);
            leaf.word = Some(i);
            leaf.head = i == 2;
            parse.add_child(0, leaf);
        }
        let deps = dependencies(&parse).unwrap();
        let root = deps.root();
        assert_eq!(deps.get(root).word, 2);
        let kids: Vec<usize> = deps.children(root).iter().map(|&c| deps.get(c).word).collect();
        assert_eq!(kids, vec![0, 1, 3]);
    }

    #[test]
    fn test_headless_constituent_uses_first_child() {
        let mut parse = ParseTree::new(ParseNode::new("x"));
        for i in 0..3 {
            let mut leaf = ParseNode::new("w");
            leaf.word = Some(i);
            parse.add_child(0, leaf);
        }
        let deps = dependencies(&parse).unwrap();
        assert_eq!(deps.get(deps.root()).word, 0);
        assert_eq!(deps.num_children(deps.root()), 2);
    }

    #[test]
    fn test_unparsed_and_empty_sentences() {
        let maker = DependencyMaker::from_text(RULES, "d", None, "S").unwrap();
        let mut s = sentence();
        maker.analyze_sentence(&mut s);
        assert!(s.dep_tree.is_none());

        let mut empty = Sentence::default();
        empty.parse_tree = Some(ParseTree::new(ParseNode::new("S")));
        maker.analyze(std::slice::from_mut(&mut empty));
        assert!(empty.dep_tree.is_none());
        assert!(empty.parse_tree.is_some());
    }

    #[test]
    fn test_injected_semantic_db() {
        let mut db = FileSemanticDb::new();
        db.add_word_senses("carne", "n", ["c1"]);
        db.add_sense("c1", "n", &[], "noun.food", &[], &["carne"]);
        let rules = RULES.replace("grup-verb dobj", "grup-verb food d.semfile=noun.food\ngrup-verb dobj");
        assert!(DependencyMaker::from_text(&rules, "d", None, "S").is_err());
        let maker = DependencyMaker::from_text_with_semdb(&rules, "d", None, "S", Arc::new(db)).unwrap();

        let parser = ChartParser::new(Grammar::from_text(GRAMMAR, "g", None).unwrap());
        let mut s = sentence();
        parser.analyze_sentence(&mut s);
        maker.analyze_sentence(&mut s);
        assert_eq!(flatten(&s)[3].2, "food");
    }

    #[test]
    fn test_from_file_resolves_classes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("food.txt"), "carne\n").unwrap();
        let path = dir.path().join("dep.rules");
        std::fs::write(&path, format!("<CLASS>\nfood \"food.txt\"\n</CLASS>\n{RULES}")).unwrap();
        let maker = DependencyMaker::from_file(&path, "S").unwrap();
        assert_eq!(maker.completer().n_rules(), 2);
        assert_eq!(maker.labeler().n_rules(), 3);
        assert!(DependencyMaker::from_file(dir.path().join("missing"), "S").is_err());
    }
}
