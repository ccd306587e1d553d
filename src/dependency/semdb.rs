//! Semantic database lookups used by the dependency labeller
//!
//! A [`SemanticDb`] answers two questions: which senses a lemma has for a
//! part of speech, and what is known about one sense (hypernyms, semantic
//! file, top-ontology tags, synonym words). Misses are empty answers, never
//! errors.
//!
//! [`FileSemanticDb`] reads the two plain-text tables named by a `<SEMDB>`
//! section:
//!
//! - the sense file, with lines `W:lemma:pos sense sense...` (senses of a
//!   lemma) and `S:sense:pos word word...` (words of a sense);
//! - the WordNet file, with lines `sense:pos parents semfile tonto`, where
//!   `parents` and `tonto` are `:`-separated lists or `-` when empty.

use std::fmt;
use std::path::Path;

use rustc_hash::FxHashMap;

use crate::diagnostics::{DiagnosticCode, LoadReport};
use crate::errors::{read_to_string, Result};

/// Everything the database knows about one sense.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SenseInfo {
    pub sense: String,
    pub pos: String,
    /// Direct hypernyms.
    pub parents: Vec<String>,
    pub semfile: String,
    /// Top-ontology tags.
    pub tonto: Vec<String>,
    /// Words sharing the sense.
    pub words: Vec<String>,
}

/// Sense lookups. Implementations are read-only after construction.
pub trait SemanticDb: fmt::Debug + Send + Sync {
    /// Senses of `lemma` with part of speech `pos`, most frequent first.
    fn word_senses(&self, lemma: &str, pos: &str) -> Vec<String>;

    /// Information about `sense`. Unknown senses give an empty record.
    fn sense_info(&self, sense: &str, pos: &str) -> SenseInfo;
}

/// Part-of-speech key for sense lookups: the first letter of the tag,
/// lowercased.
pub fn sense_pos(tag: &str) -> String {
    tag.chars()
        .next()
        .map(|c| c.to_lowercase().collect())
        .unwrap_or_default()
}

// ============================================================================
// File-backed database
// ============================================================================

/// In-memory semantic database loaded from text tables.
#[derive(Debug, Clone, Default)]
pub struct FileSemanticDb {
    /// `W:lemma:pos` and `S:sense:pos` entries.
    senses: FxHashMap<String, Vec<String>>,
    /// `sense:pos` entries.
    wordnet: FxHashMap<String, WordnetEntry>,
}

#[derive(Debug, Clone, Default)]
struct WordnetEntry {
    parents: Vec<String>,
    semfile: String,
    tonto: Vec<String>,
}

fn split_list(field: &str) -> Vec<String> {
    if field == "-" {
        Vec::new()
    } else {
        field.split(':').filter(|s| !s.is_empty()).map(str::to_string).collect()
    }
}

impl FileSemanticDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from the sense file and/or the WordNet file.
    pub fn from_files(sense_file: Option<&Path>, wordnet_file: Option<&Path>) -> Result<Self> {
        let mut db = Self::new();
        let mut report = LoadReport::new(
            sense_file
                .or(wordnet_file)
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "<semdb>".to_string()),
        );
        if let Some(path) = sense_file {
            db.read_senses(&read_to_string(path)?, &mut report);
        }
        if let Some(path) = wordnet_file {
            db.read_wordnet(&read_to_string(path)?, &mut report);
        }
        report.finish(db)
    }

    /// Load from in-memory tables.
    pub fn from_text(senses: &str, wordnet: &str, origin: impl Into<String>) -> Result<Self> {
        let mut db = Self::new();
        let mut report = LoadReport::new(origin);
        db.read_senses(senses, &mut report);
        db.read_wordnet(wordnet, &mut report);
        report.finish(db)
    }

    pub(crate) fn read_senses(&mut self, text: &str, report: &mut LoadReport) {
        for (n, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('%') {
                continue;
            }
            let mut fields = line.split_whitespace();
            let Some(key) = fields.next() else { continue };
            if !(key.starts_with("W:") || key.starts_with("S:")) || key.matches(':').count() < 2 {
                report.error(
                    DiagnosticCode::Syntax,
                    Some(n + 1),
                    format!("sense key must look like W:lemma:pos or S:sense:pos, found '{key}'"),
                );
                continue;
            }
            self.senses
                .entry(key.to_string())
                .or_default()
                .extend(fields.map(str::to_string));
        }
    }

    pub(crate) fn read_wordnet(&mut self, text: &str, report: &mut LoadReport) {
        for (n, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('%') {
                continue;
            }
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() != 4 {
                report.error(
                    DiagnosticCode::Syntax,
                    Some(n + 1),
                    format!("expected 'sense:pos parents semfile tonto', found '{line}'"),
                );
                continue;
            }
            self.wordnet.insert(
                fields[0].to_string(),
                WordnetEntry {
                    parents: split_list(fields[1]),
                    semfile: fields[2].to_string(),
                    tonto: split_list(fields[3]),
                },
            );
        }
    }

    /// Register the senses of a lemma.
    pub fn add_word_senses<I, S>(&mut self, lemma: &str, pos: &str, senses: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.senses
            .entry(format!("W:{lemma}:{pos}"))
            .or_default()
            .extend(senses.into_iter().map(Into::into));
    }

    /// Register a sense with its hypernyms, semantic file, ontology tags and
    /// synonym words.
    pub fn add_sense(&mut self, sense: &str, pos: &str, parents: &[&str], semfile: &str, tonto: &[&str], words: &[&str]) {
        self.wordnet.insert(
            format!("{sense}:{pos}"),
            WordnetEntry {
                parents: parents.iter().map(|s| s.to_string()).collect(),
                semfile: semfile.to_string(),
                tonto: tonto.iter().map(|s| s.to_string()).collect(),
            },
        );
        self.senses
            .entry(format!("S:{sense}:{pos}"))
            .or_default()
            .extend(words.iter().map(|s| s.to_string()));
    }
}

impl SemanticDb for FileSemanticDb {
    fn word_senses(&self, lemma: &str, pos: &str) -> Vec<String> {
        self.senses
            .get(&format!("W:{lemma}:{pos}"))
            .cloned()
            .unwrap_or_default()
    }

    fn sense_info(&self, sense: &str, pos: &str) -> SenseInfo {
        let entry = self.wordnet.get(&format!("{sense}:{pos}")).cloned().unwrap_or_default();
        SenseInfo {
            sense: sense.to_string(),
            pos: pos.to_string(),
            parents: entry.parents,
            semfile: entry.semfile,
            tonto: entry.tonto,
            words: self
                .senses
                .get(&format!("S:{sense}:{pos}"))
                .cloned()
                .unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SENSES: &str = "W:perro:n 02084071\nS:02084071:n perro can\nW:can:n 02084071\n";
    const WORDNET: &str = "% sense parents semfile tonto\n02084071:n 02083346 noun.animal Animal:Living\n02083346:n - noun.animal -\n";

    #[test]
    fn test_lookups() {
        let db = FileSemanticDb::from_text(SENSES, WORDNET, "t").unwrap();
        assert_eq!(db.word_senses("perro", "n"), vec!["02084071"]);
        let info = db.sense_info("02084071", "n");
        assert_eq!(info.parents, vec!["02083346"]);
        assert_eq!(info.semfile, "noun.animal");
        assert_eq!(info.tonto, vec!["Animal", "Living"]);
        assert_eq!(info.words, vec!["perro", "can"]);
        assert!(db.sense_info("02083346", "n").tonto.is_empty());
    }

    #[test]
    fn test_misses_are_empty() {
        let db = FileSemanticDb::new();
        assert!(db.word_senses("gato", "n").is_empty());
        assert_eq!(db.sense_info("x", "n").semfile, "");
    }

    #[test]
    fn test_malformed_lines_rejected() {
        let err = FileSemanticDb::from_text("perro 1\n", "1:n a b\n", "t").unwrap_err();
        assert_eq!(err.report().unwrap().errors().count(), 2);
    }

    #[test]
    fn test_sense_pos() {
        assert_eq!(sense_pos("NCMS000"), "n");
        assert_eq!(sense_pos(""), "");
    }

    #[test]
    fn test_files() {
        let dir = tempfile::tempdir().unwrap();
        let s = dir.path().join("senses.txt");
        std::fs::write(&s, SENSES).unwrap();
        let db = FileSemanticDb::from_files(Some(&s), None).unwrap();
        assert_eq!(db.word_senses("can", "n"), vec!["02084071"]);
        assert!(FileSemanticDb::from_files(Some(&dir.path().join("nope")), None).is_err());
    }
}
