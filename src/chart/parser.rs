use std::path::Path;

use super::chart::Chart;
use super::grammar::Grammar;
use crate::errors::Result;
use crate::types::Sentence;

/// Shallow parser: one chart parse per sentence with a shared grammar.
#[derive(Debug, Clone)]
pub struct ChartParser {
    grammar: Grammar,
}

impl ChartParser {
    pub fn new(grammar: Grammar) -> Self {
        Self { grammar }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(Grammar::from_file(path)?))
    }

    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    pub fn start_symbol(&self) -> &str {
        self.grammar.start_symbol()
    }

    /// Parse every sentence, replacing any previous parse tree.
    pub fn analyze(&self, sentences: &mut [Sentence]) {
        for s in sentences.iter_mut() {
            self.analyze_sentence(s);
        }
    }

    /// Parse one sentence and bind the tree leaves, left to right, to its
    /// words. Each leaf is relabelled with its word's tag.
    pub fn analyze_sentence(&self, sentence: &mut Sentence) {
        let mut chart = Chart::new(&self.grammar);
        chart.load_sentence(sentence);
        chart.parse();
        let mut tree = chart.get_tree();

        let leaves = if sentence.is_empty() {
            Vec::new()
        } else {
            tree.leaves(tree.root())
        };
        if leaves.len() != sentence.len() {
            tracing::warn!(
                leaves = leaves.len(),
                words = sentence.len(),
                "parse tree leaves do not match sentence words"
            );
        }
        for (i, (leaf, word)) in leaves.into_iter().zip(&sentence.words).enumerate() {
            let node = tree.get_mut(leaf);
            node.word = Some(i);
            node.label = word.tag().to_string();
        }
        tracing::trace!(nodes = tree.len(), "sentence parsed");
        sentence.parse_tree = Some(tree);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Analysis, Word};
    use pretty_assertions::assert_eq;

    fn parser() -> ChartParser {
        ChartParser::new(
            Grammar::from_text(
                "S ==> sn, +grup-verb .\nsn ==> DA, +NC .\ngrup-verb ==> +VMI* .\n@START S .\n",
                "t",
                None,
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_leaves_are_bound_to_words() {
        let mut s = Sentence::new(vec![
            Word::new("El").with_analysis(Analysis::new("el", "DA")),
            Word::new("perro").with_analysis(Analysis::new("perro", "NC")),
            Word::new("ladra").with_analysis(Analysis::new("ladrar", "VMIP3S0")),
        ]);
        parser().analyze(std::slice::from_mut(&mut s));
        let tree = s.parse_tree.as_ref().unwrap();
        let leaves: Vec<_> = tree
            .leaves(tree.root())
            .into_iter()
            .map(|n| (tree.get(n).label.clone(), tree.get(n).word))
            .collect();
        assert_eq!(
            leaves,
            vec![
                ("DA".to_string(), Some(0)),
                ("NC".to_string(), Some(1)),
                ("VMIP3S0".to_string(), Some(2)),
            ]
        );
        assert_eq!(s.head_word(tree, tree.root()).unwrap().form, "ladra");
    }

    #[test]
    fn test_empty_sentence_gets_start_root() {
        let mut s = Sentence::default();
        parser().analyze_sentence(&mut s);
        let tree = s.parse_tree.unwrap();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.get(tree.root()).label, "S");
        assert_eq!(tree.get(tree.root()).word, None);
    }

    #[test]
    fn test_reparse_replaces_tree() {
        let p = parser();
        let mut s = Sentence::new(vec![Word::new("perro").with_analysis(Analysis::new("perro", "NC"))]);
        p.analyze_sentence(&mut s);
        let first = s.parse_tree.clone();
        p.analyze_sentence(&mut s);
        assert_eq!(s.parse_tree, first);
    }
}
