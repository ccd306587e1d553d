//! Context-free grammar for the chart parser
//!
//! Grammar files contain rules and directives, each ended by a dot:
//!
//! ```text
//! % comment
//! sn ==> +NC | DA, +NC | DA, +grup-nom, AQ* .
//! grup-verb ==> VMI* | VAI*, +VMP*<ser> .
//! @START S .
//! @PRIOR sn grup-verb .
//! @HIDDEN grup-nom .
//! ```
//!
//! `|` separates alternatives for the same head; a `+` before a category marks
//! it as governor. Categories may carry a `<lemma>` or `(form)` qualifier, or
//! a file list (`<"lemmas.txt">`, `("forms.txt")`) whose lines are loaded into
//! the file-membership map.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::diagnostics::{Diagnostic, DiagnosticCode, LoadReport};
use crate::errors::{read_to_string, Result};

/// Priority of symbols without a `@PRIOR` entry.
pub const DEFAULT_PRIORITY: u32 = 9999;

// ============================================================================
// Rule
// ============================================================================

/// A grammar rule `head ==> right[0], right[1], ...`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    head: String,
    right: Arc<[String]>,
    governor: usize,
}

impl Rule {
    pub fn new(head: impl Into<String>, right: Vec<String>, governor: usize) -> Self {
        Self {
            head: head.into(),
            right: right.into(),
            governor,
        }
    }

    pub fn head(&self) -> &str {
        &self.head
    }

    pub fn right(&self) -> &[String] {
        &self.right
    }

    pub(crate) fn right_shared(&self) -> Arc<[String]> {
        Arc::clone(&self.right)
    }

    /// Index of the governor in the right-hand side.
    pub fn governor(&self) -> usize {
        self.governor
    }
}

// ============================================================================
// Lexer
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum Tok {
    Comment,
    Category(String),
    Arrow,
    /// A bare `>`: arrow after a head, governor mark inside a rule.
    Gt,
    Head,
    Comma,
    Bar,
    Dot,
    Lemma(String),
    Form(String),
    Filename(String),
    Directive(Directive),
    Unknown(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Directive {
    Start,
    Prior,
    Hidden,
    Flat,
    NoTop,
    OnlyTop,
}

fn is_category_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '*' | '$' | '\'' | '¿' | '?' | '!' | '¡')
}

/// Split grammar text into tokens with their line numbers.
fn tokenize(text: &str) -> Vec<(usize, Tok)> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut line = 1;
    let mut i = 0;

    let read_until = |i: usize, close: char| -> Option<usize> {
        chars[i + 1..]
            .iter()
            .position(|&c| c == close || c == '\n')
            .map(|p| i + 1 + p)
            .filter(|&p| chars[p] == close)
    };

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\n' => {
                line += 1;
                i += 1;
            }
            c if c.is_whitespace() => i += 1,
            '%' => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
                tokens.push((line, Tok::Comment));
            }
            '=' if chars.get(i + 1) == Some(&'=') && chars.get(i + 2) == Some(&'>') => {
                tokens.push((line, Tok::Arrow));
                i += 3;
            }
            '-' if chars.get(i + 1) == Some(&'>') => {
                tokens.push((line, Tok::Arrow));
                i += 2;
            }
            '>' => {
                tokens.push((line, Tok::Gt));
                i += 1;
            }
            '+' => {
                tokens.push((line, Tok::Head));
                i += 1;
            }
            ',' => {
                tokens.push((line, Tok::Comma));
                i += 1;
            }
            '|' => {
                tokens.push((line, Tok::Bar));
                i += 1;
            }
            '.' => {
                tokens.push((line, Tok::Dot));
                i += 1;
            }
            '<' | '(' => {
                let close = if c == '<' { '>' } else { ')' };
                match read_until(i, close) {
                    Some(end) => {
                        let text: String = chars[i..=end].iter().collect();
                        let tok = if chars.get(i + 1) == Some(&'"') {
                            Tok::Filename(text)
                        } else if c == '<' {
                            Tok::Lemma(text)
                        } else {
                            Tok::Form(text)
                        };
                        tokens.push((line, tok));
                        i = end + 1;
                    }
                    None => {
                        tokens.push((line, Tok::Unknown(c.to_string())));
                        i += 1;
                    }
                }
            }
            '@' => {
                let start = i;
                i += 1;
                while i < chars.len() && chars[i].is_ascii_alphabetic() {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                let tok = match word.as_str() {
                    "@START" => Tok::Directive(Directive::Start),
                    "@PRIOR" => Tok::Directive(Directive::Prior),
                    "@HIDDEN" => Tok::Directive(Directive::Hidden),
                    "@FLAT" => Tok::Directive(Directive::Flat),
                    "@NOTOP" => Tok::Directive(Directive::NoTop),
                    "@ONLYTOP" => Tok::Directive(Directive::OnlyTop),
                    _ => Tok::Unknown(word),
                };
                tokens.push((line, tok));
            }
            c if is_category_char(c) => {
                let start = i;
                while i < chars.len()
                    && is_category_char(chars[i])
                    && !(chars[i] == '-' && chars.get(i + 1) == Some(&'>'))
                {
                    i += 1;
                }
                tokens.push((line, Tok::Category(chars[start..i].iter().collect())));
            }
            other => {
                tokens.push((line, Tok::Unknown(other.to_string())));
                i += 1;
            }
        }
    }
    tokens
}

// ============================================================================
// Grammar
// ============================================================================

/// A loaded grammar: rules indexed by their first right-hand category plus
/// symbol attributes.
#[derive(Debug, Clone, Default)]
pub struct Grammar {
    /// Rules by first right-hand category.
    rules: FxHashMap<String, Vec<Rule>>,
    /// Rules whose first category is a wildcard, by its first character.
    wild: FxHashMap<char, Vec<Rule>>,
    nonterminals: FxHashSet<String>,
    hidden: FxHashSet<String>,
    flat: FxHashSet<String>,
    notop: FxHashSet<String>,
    onlytop: FxHashSet<String>,
    prior: FxHashMap<String, u32>,
    /// `op + line + clo` -> file-list qualifier containing it.
    filemap: FxHashMap<String, Vec<String>>,
    start: String,
}

/// Parser states of the grammar file reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum St {
    Error,
    Idle,
    Head,
    RuleStart,
    Category,
    Qualified,
    ListDirective,
    ListItem,
    StartDirective,
    StartSymbol,
    Governor,
}

impl Grammar {
    /// Load a grammar file. File lists are resolved relative to it.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = read_to_string(path)?;
        let base = path.parent().map(Path::to_path_buf);
        Self::from_text(&text, path.display().to_string(), base.as_deref())
    }

    /// Load a grammar from text. Relative file lists are resolved against
    /// `base_dir` (or the working directory).
    pub fn from_text(text: &str, origin: impl Into<String>, base_dir: Option<&Path>) -> Result<Self> {
        let mut g = Grammar::default();
        let mut report = LoadReport::new(origin);
        g.read(text, base_dir, &mut report);
        tracing::debug!(
            rules = g.n_rules(),
            nonterminals = g.nonterminals.len(),
            start = %g.start,
            "grammar loaded"
        );
        report.finish(g)
    }

    fn read(&mut self, text: &str, base_dir: Option<&Path>, report: &mut LoadReport) {
        let tokens = tokenize(text);
        let mut state = St::Idle;
        let mut head = String::new();
        let mut categ = String::new();
        let mut right: Vec<String> = Vec::new();
        let mut first = false;
        let mut wildcard = false;
        let mut governor: Option<usize> = None;
        let mut directive = Directive::Prior;
        let mut prior_val = 1;
        let mut last_line = 1;

        let mut k = 0;
        while k < tokens.len() {
            let (line, tok) = &tokens[k];
            let line = *line;
            last_line = line;
            let mut err: Option<Diagnostic> = None;

            let next = match (state, tok) {
                (St::Idle, Tok::Comment) => St::Idle,
                (St::Idle, Tok::Category(c)) => {
                    head = c.clone();
                    self.nonterminals.insert(head.clone());
                    St::Head
                }
                (St::Idle, Tok::Directive(Directive::Start)) => {
                    if self.start.is_empty() {
                        St::StartDirective
                    } else {
                        err = Some(Diagnostic::error(
                            DiagnosticCode::DuplicateStart,
                            Some(line),
                            "@START specified more than once",
                        ));
                        St::Error
                    }
                }
                (St::Idle, Tok::Directive(d)) => {
                    directive = *d;
                    St::ListDirective
                }
                (St::Head, Tok::Arrow | Tok::Gt) => {
                    right.clear();
                    first = true;
                    wildcard = false;
                    governor = None;
                    St::RuleStart
                }
                (St::RuleStart, Tok::Head | Tok::Gt) => {
                    governor = Some(right.len());
                    St::Governor
                }
                (St::RuleStart | St::Governor, Tok::Category(c)) => {
                    categ = c.clone();
                    if first && categ.contains('*') {
                        wildcard = true;
                    }
                    first = false;
                    St::Category
                }
                (St::Category, Tok::Lemma(q) | Tok::Form(q)) => {
                    categ.push_str(q);
                    St::Qualified
                }
                (St::Category, Tok::Filename(q)) => {
                    categ.push_str(q);
                    self.load_file_list(q, base_dir, line, report);
                    St::Qualified
                }
                (St::Category | St::Qualified, Tok::Comma) => {
                    right.push(std::mem::take(&mut categ));
                    St::RuleStart
                }
                (St::Category | St::Qualified, Tok::Bar) => {
                    right.push(std::mem::take(&mut categ));
                    self.finish_rule(&head, std::mem::take(&mut right), wildcard, governor, line, report);
                    first = true;
                    wildcard = false;
                    governor = None;
                    St::RuleStart
                }
                (St::Category | St::Qualified, Tok::Dot) => {
                    right.push(std::mem::take(&mut categ));
                    self.finish_rule(&head, std::mem::take(&mut right), wildcard, governor, line, report);
                    St::Idle
                }
                (St::ListDirective | St::ListItem, Tok::Category(c)) => {
                    if self.nonterminals.contains(c) {
                        match directive {
                            Directive::Prior => {
                                self.prior.insert(c.clone(), prior_val);
                                prior_val += 1;
                            }
                            Directive::Hidden => {
                                self.hidden.insert(c.clone());
                            }
                            Directive::Flat => {
                                self.flat.insert(c.clone());
                            }
                            Directive::NoTop => {
                                self.notop.insert(c.clone());
                            }
                            Directive::OnlyTop => {
                                self.onlytop.insert(c.clone());
                            }
                            Directive::Start => {}
                        }
                        St::ListItem
                    } else {
                        err = Some(Diagnostic::error(
                            DiagnosticCode::TerminalInDirective,
                            Some(line),
                            format!("terminal symbol '{c}' not allowed in directive"),
                        ));
                        St::Error
                    }
                }
                (St::ListItem, Tok::Dot) => St::Idle,
                (St::StartDirective, Tok::Category(c)) => {
                    self.start = c.clone();
                    self.nonterminals.insert(c.clone());
                    St::StartSymbol
                }
                (St::StartSymbol, Tok::Dot) => St::Idle,
                _ => St::Error,
            };

            if next == St::Error {
                let diagnostic = err.unwrap_or_else(|| {
                    if *tok == Tok::Comment {
                        Diagnostic::error(
                            DiagnosticCode::Syntax,
                            Some(line),
                            "unexpected comment",
                        )
                        .with_hint("missing dot ending previous rule or directive?")
                    } else {
                        Diagnostic::error(
                            DiagnosticCode::Syntax,
                            Some(line),
                            format!("unexpected {}", describe(tok)),
                        )
                    }
                });
                report.push(diagnostic);
                // skip to the end of the offending rule or directive
                while k < tokens.len() && tokens[k].1 != Tok::Dot {
                    k += 1;
                }
                categ.clear();
                right.clear();
                state = St::Idle;
            } else {
                state = next;
            }
            k += 1;
        }

        if state != St::Idle {
            report.error(
                DiagnosticCode::Syntax,
                Some(last_line),
                "unexpected end of file, missing final dot",
            );
        }
        self.check_start(report);
    }

    fn finish_rule(
        &mut self,
        head: &str,
        right: Vec<String>,
        wildcard: bool,
        governor: Option<usize>,
        line: usize,
        report: &mut LoadReport,
    ) {
        let governor = governor.unwrap_or_else(|| {
            if right.len() != 1 {
                report.push(
                    Diagnostic::warning(
                        DiagnosticCode::MissingGovernor,
                        Some(line),
                        format!("non-unary rule for '{head}' with no governor, first component taken"),
                    )
                    .with_hint("mark the governor with '+'"),
                );
            }
            0
        });
        self.add_rule(Rule::new(head, right, governor), wildcard);
    }

    fn add_rule(&mut self, rule: Rule, wildcard: bool) {
        let Some(first) = rule.right.first().cloned() else {
            return;
        };
        if wildcard {
            if let Some(c) = first.chars().next() {
                self.wild.entry(c).or_default().push(rule.clone());
            }
        }
        self.rules.entry(first).or_default().push(rule);
    }

    fn load_file_list(&mut self, qualifier: &str, base_dir: Option<&Path>, line: usize, report: &mut LoadReport) {
        let (open, close) = match qualifier.chars().next() {
            Some('<') => ("<", ">"),
            _ => ("(", ")"),
        };
        let name = qualifier
            .trim_start_matches(['<', '('])
            .trim_end_matches(['>', ')'])
            .trim_matches('"');
        let path = match base_dir {
            Some(dir) if Path::new(name).is_relative() => dir.join(name),
            _ => PathBuf::from(name),
        };
        match std::fs::read_to_string(&path) {
            Ok(text) => {
                for entry in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
                    self.filemap
                        .entry(format!("{open}{entry}{close}"))
                        .or_default()
                        .push(qualifier.to_string());
                }
            }
            Err(e) => report.error(
                DiagnosticCode::UnreadableFile,
                Some(line),
                format!("cannot open word list {}: {e}", path.display()),
            ),
        }
    }

    fn check_start(&self, report: &mut LoadReport) {
        if self.start.is_empty() {
            report.push(
                Diagnostic::error(DiagnosticCode::MissingStart, None, "@START symbol not specified")
                    .with_hint("add a line like '@START S.'"),
            );
        }
        if self.hidden.contains(&self.start) {
            report.error(DiagnosticCode::InvalidStart, None, "@START symbol cannot be @HIDDEN");
        }
        if self.notop.contains(&self.start) {
            report.error(DiagnosticCode::InvalidStart, None, "@START symbol cannot be @NOTOP");
        }
        let mut overridden: Vec<_> = self.onlytop.intersection(&self.hidden).collect();
        overridden.sort();
        for sym in overridden {
            report.warning(
                DiagnosticCode::HiddenOverridesOnlytop,
                None,
                format!("@HIDDEN directive for '{sym}' overrides @ONLYTOP"),
            );
        }
    }

    // ─── Queries ────────────────────────────────────────────────────────────

    /// Rules whose right-hand side starts with `cat`.
    pub fn get_rules_right(&self, cat: &str) -> &[Rule] {
        self.rules.get(cat).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Rules whose right-hand side starts with a wildcard beginning with `c`.
    pub fn get_rules_right_wildcard(&self, c: char) -> &[Rule] {
        self.wild.get(&c).map(Vec::as_slice).unwrap_or(&[])
    }

    /// How specific a terminal symbol is: `0` for form-qualified, `1` for
    /// lemma-qualified, `2` for a plain tag. Lower is more specific.
    pub fn get_specificity(&self, sym: &str) -> u8 {
        specificity(sym)
    }

    /// Reduction priority of a symbol, lower wins.
    pub fn get_priority(&self, sym: &str) -> u32 {
        self.prior.get(sym).copied().unwrap_or(DEFAULT_PRIORITY)
    }

    pub fn is_terminal(&self, sym: &str) -> bool {
        !self.nonterminals.contains(sym)
    }

    pub fn is_hidden(&self, sym: &str) -> bool {
        self.hidden.contains(sym)
    }

    pub fn is_flat(&self, sym: &str) -> bool {
        self.flat.contains(sym)
    }

    pub fn is_notop(&self, sym: &str) -> bool {
        self.notop.contains(sym)
    }

    pub fn is_onlytop(&self, sym: &str) -> bool {
        self.onlytop.contains(sym)
    }

    pub fn start_symbol(&self) -> &str {
        &self.start
    }

    /// `true` if the file list `list` contains `key` (e.g. `(casa)`).
    pub fn in_filemap(&self, key: &str, list: &str) -> bool {
        self.filemap
            .get(key)
            .is_some_and(|lists| lists.iter().any(|l| l == list))
    }

    pub fn n_rules(&self) -> usize {
        self.rules.values().map(Vec::len).sum()
    }
}

fn specificity(sym: &str) -> u8 {
    let ends_with_at_last = |open: char, close: char| {
        sym.contains(open) && sym.find(close) == Some(sym.len() - close.len_utf8())
    };
    if ends_with_at_last('(', ')') {
        0
    } else if ends_with_at_last('<', '>') {
        1
    } else {
        2
    }
}

fn describe(tok: &Tok) -> String {
    match tok {
        Tok::Comment => "comment".to_string(),
        Tok::Category(c) => format!("'{c}'"),
        Tok::Arrow => "'==>'".to_string(),
        Tok::Gt => "'>'".to_string(),
        Tok::Head => "'+'".to_string(),
        Tok::Comma => "','".to_string(),
        Tok::Bar => "'|'".to_string(),
        Tok::Dot => "'.'".to_string(),
        Tok::Lemma(q) | Tok::Form(q) | Tok::Filename(q) => format!("'{q}'"),
        Tok::Directive(d) => format!("directive {d:?}"),
        Tok::Unknown(s) => format!("'{s}'"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn grammar(text: &str) -> Grammar {
        Grammar::from_text(text, "test.gram", None).unwrap()
    }

    #[test]
    fn test_rules_and_governors() {
        let g = grammar(
            "sn ==> DA, +NC | +NC .\n\
             S ==> sn, +grup-verb .\n\
             grup-verb -> VMI* | VAI*, +VMP* .\n\
             @START S .\n",
        );
        let rules = g.get_rules_right("DA");
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].head(), "sn");
        assert_eq!(rules[0].right(), &["DA".to_string(), "NC".to_string()]);
        assert_eq!(rules[0].governor(), 1);
        assert_eq!(g.get_rules_right("NC")[0].governor(), 0);
        assert_eq!(g.get_rules_right("sn")[0].governor(), 1);

        let wild = g.get_rules_right_wildcard('V');
        assert_eq!(wild.len(), 2);
        assert_eq!(g.start_symbol(), "S");
        assert!(g.is_terminal("NC"));
        assert!(!g.is_terminal("sn"));
        assert!(g.get_rules_right("XX").is_empty());
    }

    #[test]
    fn test_specificity_ordering() {
        let g = Grammar::default();
        assert!(g.get_specificity("VB(run)") < g.get_specificity("VB<run>"));
        assert!(g.get_specificity("VB<run>") < g.get_specificity("VB"));
        assert_eq!(g.get_specificity("(run)"), 0);
        assert_eq!(g.get_specificity("<run>"), 1);
    }

    #[test]
    fn test_directives() {
        let g = grammar(
            "S ==> +sn .\nsn ==> +NC .\ngrup ==> +AQ .\nx ==> +F .\n\
             @START S .\n@PRIOR grup sn .\n@HIDDEN x .\n@FLAT sn .\n@NOTOP grup .\n@ONLYTOP x .\n",
        );
        assert_eq!(g.get_priority("grup"), 1);
        assert_eq!(g.get_priority("sn"), 2);
        assert_eq!(g.get_priority("S"), DEFAULT_PRIORITY);
        assert!(g.is_hidden("x"));
        assert!(g.is_onlytop("x"));
        assert!(g.is_flat("sn"));
        assert!(g.is_notop("grup"));
    }

    #[test]
    fn test_lone_gt_arrow_and_governor() {
        let g = grammar("S > sn, > grup .\n@START S .\n");
        assert_eq!(g.get_rules_right("sn")[0].governor(), 1);
    }

    #[test]
    fn test_qualified_categories() {
        let g = grammar("grup ==> +VMI*<ser>, AQ(bonito) .\n@START grup .\n");
        let r = &g.get_rules_right_wildcard('V')[0];
        assert_eq!(r.right()[0], "VMI*<ser>");
        assert_eq!(r.right()[1], "AQ(bonito)");
    }

    #[test]
    fn test_missing_governor_is_warning() {
        let g = Grammar::from_text("S ==> a, b .\n@START S .\n", "t", None);
        assert!(g.is_ok());
        assert_eq!(g.unwrap().get_rules_right("a")[0].governor(), 0);
    }

    #[test]
    fn test_errors_are_collected() {
        let err = Grammar::from_text(
            "S ==> a b .\n@PRIOR NC .\n@START S .\n@START T .\nx ==> , .\n",
            "bad.gram",
            None,
        )
        .unwrap_err();
        let report = err.report().unwrap();
        assert!(report.has_code(DiagnosticCode::Syntax));
        assert!(report.has_code(DiagnosticCode::TerminalInDirective));
        assert!(report.has_code(DiagnosticCode::DuplicateStart));
        assert_eq!(report.errors().count(), 4);
    }

    #[test]
    fn test_start_checks() {
        let err = Grammar::from_text("S ==> +a .\n", "t", None).unwrap_err();
        assert!(err.report().unwrap().has_code(DiagnosticCode::MissingStart));

        let err = Grammar::from_text("S ==> +a .\n@START S .\n@HIDDEN S .\n", "t", None).unwrap_err();
        assert!(err.report().unwrap().has_code(DiagnosticCode::InvalidStart));

        let err = Grammar::from_text("S ==> +a .\n@START S .\n@NOTOP S .\n", "t", None).unwrap_err();
        assert!(err.report().unwrap().has_code(DiagnosticCode::InvalidStart));
    }

    #[test]
    fn test_comment_inside_rule_is_error() {
        let err = Grammar::from_text("S ==> a\n% oops\n.\n@START S .\n", "t", None).unwrap_err();
        let d = err.report().unwrap().errors().next().unwrap().clone();
        assert_eq!(d.line, Some(2));
        assert!(d.hint.is_some());
    }

    #[test]
    fn test_file_list_qualifier() {
        let dir = tempfile::tempdir().unwrap();
        let mut f = std::fs::File::create(dir.path().join("cities.txt")).unwrap();
        writeln!(f, "madrid\nlima").unwrap();
        let gram_path = dir.path().join("g.gram");
        std::fs::write(&gram_path, "S ==> +NP*(\"cities.txt\") .\n@START S .\n").unwrap();

        let g = Grammar::from_file(&gram_path).unwrap();
        assert!(g.in_filemap("(madrid)", "(\"cities.txt\")"));
        assert!(!g.in_filemap("(paris)", "(\"cities.txt\")"));
    }

    #[test]
    fn test_unreadable_file_list() {
        let err = Grammar::from_text("S ==> +NP*(\"nope.txt\") .\n@START S .\n", "t", Some(Path::new("/nonexistent")))
            .unwrap_err();
        assert!(err.report().unwrap().has_code(DiagnosticCode::UnreadableFile));
    }
}
