//! Constraint grammar for the relaxation tagger
//!
//! ```text
//! SETS
//! Det = DA* DD* ;
//! Be = <ser> <estar> ;
//! CONSTRAINTS
//! %% a noun is unlikely right after a verb form of ser/estar
//! -2.0  NC*  (-1 $Be) ;
//!  0.8  VMI*<ser>  (1* AQ* barrier VM* or NC*) ;
//!  1.0  NC  (-1 {Det} or OUT_OF_BOUNDS) (not 1 SPS00) ;
//! ```
//!
//! A constraint is a weight, a head naming the analyses it applies to, and
//! conditions on the surrounding words. Sets group items of one kind (forms,
//! lemmas, tags or senses) and are referenced as `{NAME}` or `$NAME`.

use std::path::Path;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::diagnostics::{DiagnosticCode, LoadReport};
use crate::errors::{read_to_string, Result};
use crate::matching::wildcard_match;
use crate::types::{Analysis, Word};

/// Tag and lemma of the padding words around a sentence.
pub const OUT_OF_BOUNDS: &str = "OUT_OF_BOUNDS";

const QUALIFIERS: &str = "(<[";

// ============================================================================
// Sets
// ============================================================================

/// What the items of a set are compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetKind {
    Form,
    Lemma,
    Category,
    Sense,
}

/// A named set. Items keep their brackets: `(form)`, `<lemma>`, `[sense]`.
#[derive(Debug, Clone, PartialEq)]
pub struct CgSet {
    pub kind: SetKind,
    items: FxHashSet<String>,
}

impl CgSet {
    pub fn contains(&self, item: &str) -> bool {
        self.items.contains(item)
    }

    /// Exact membership, or for tag sets a `*` item matching the tag.
    pub fn matches(&self, probe: &str) -> bool {
        self.contains(probe)
            || (self.kind == SetKind::Category
                && self
                    .items
                    .iter()
                    .any(|item| item.contains('*') && wildcard_match(item, probe, QUALIFIERS)))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

// ============================================================================
// Terms, conditions, rules
// ============================================================================

/// One alternative of a condition. Patterns may carry a tag prefix with a
/// `*` wildcard and a qualifier: `VMI*`, `NC<casa>`, `AQ*(roja)`.
#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    Tag(String),
    Lemma(String),
    Form(String),
    Sense(String),
    /// `u.N=value`; `index` is N.
    User { index: usize, pattern: String },
    Set(String),
}

/// `[not] pos[*] term [or term]... [barrier term [or term]...]`
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub negated: bool,
    /// Offset from the word the rule applies to.
    pub position: isize,
    /// Scan onwards from `position` until a word matches.
    pub star: bool,
    pub terms: Vec<Term>,
    pub barrier: Vec<Term>,
}

/// `weight head (cond) (cond)... ;`
#[derive(Debug, Clone, PartialEq)]
pub struct CgRule {
    pub line: usize,
    pub weight: f64,
    pub head: String,
    pub conditions: Vec<Condition>,
}

/// A loaded constraint grammar: sets plus rules indexed by head.
#[derive(Debug, Clone, Default)]
pub struct ConstraintGrammar {
    sets: FxHashMap<String, CgSet>,
    rules: FxHashMap<String, Vec<CgRule>>,
    senses_used: bool,
}

impl ConstraintGrammar {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = read_to_string(path)?;
        Self::from_text(&text, path.display().to_string())
    }

    /// Parse a grammar. Every problem found is reported; any error rejects
    /// the grammar.
    pub fn from_text(text: &str, origin: impl Into<String>) -> Result<Self> {
        let mut report = LoadReport::new(origin);
        let tokens = lex(text, &mut report);
        let mut parser = Parser {
            tokens,
            pos: 0,
            grammar: Self::default(),
            report: &mut report,
        };
        parser.run();
        let grammar = parser.grammar;
        tracing::debug!(
            sets = grammar.sets.len(),
            rules = grammar.n_rules(),
            "constraint grammar loaded"
        );
        report.finish(grammar)
    }

    /// Rules whose head is exactly `head`.
    pub fn rules_for(&self, head: &str) -> &[CgRule] {
        self.rules.get(head).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn set(&self, name: &str) -> Option<&CgSet> {
        self.sets.get(name)
    }

    pub fn n_rules(&self) -> usize {
        self.rules.values().map(Vec::len).sum()
    }

    /// `true` if some rule or set looks at word senses.
    pub fn senses_used(&self) -> bool {
        self.senses_used
    }

    /// Does analysis `a` of `word` satisfy `term`?
    pub fn term_matches(&self, term: &Term, word: &Word, a: &Analysis) -> bool {
        match term {
            Term::Tag(p) => wildcard_match(p, &a.tag, QUALIFIERS),
            Term::Lemma(p) => {
                let lemma = format!("<{}>", a.lemma);
                wildcard_match(p, &lemma, QUALIFIERS) || wildcard_match(p, &format!("{}{lemma}", a.tag), QUALIFIERS)
            }
            Term::Form(p) => {
                let form = format!("({})", word.lowercase_form());
                wildcard_match(p, &form, QUALIFIERS) || wildcard_match(p, &format!("{}{form}", a.tag), QUALIFIERS)
            }
            Term::Sense(p) => a.senses.first().is_some_and(|s| {
                let sense = format!("[{s}]");
                wildcard_match(p, &sense, QUALIFIERS) || wildcard_match(p, &format!("{}{sense}", a.tag), QUALIFIERS)
            }),
            Term::User { index, pattern } => a
                .user
                .get(*index)
                .is_some_and(|u| wildcard_match(pattern, &format!("u.{index}={u}"), QUALIFIERS)),
            Term::Set(name) => self.sets.get(name).is_some_and(|set| {
                let probe = match set.kind {
                    SetKind::Form => format!("({})", word.lowercase_form()),
                    SetKind::Lemma => format!("<{}>", a.lemma.to_lowercase()),
                    SetKind::Sense => format!("[{}]", a.senses.first().map(String::as_str).unwrap_or("")),
                    SetKind::Category => a.tag.clone(),
                };
                set.matches(&probe)
            }),
        }
    }
}

// ============================================================================
// Lexer
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Sets,
    Constraints,
    Is,
    Semicolon,
    Open,
    Close,
    Not,
    Or,
    Barrier,
    Out,
    /// `(form)`, brackets kept.
    Form(String),
    /// `<lemma>`, brackets kept.
    Lemma(String),
    /// `[sense]`, brackets kept.
    Sense(String),
    SetRef(String),
    User(String),
    /// Anything else: numbers, positions, tags, set names.
    Word(String),
}

const DELIMITERS: &str = "()<>[]{};=%$";

fn lex(text: &str, report: &mut LoadReport) -> Vec<(usize, Token)> {
    let mut tokens = Vec::new();
    for (n, raw) in text.lines().enumerate() {
        let lineno = n + 1;
        let chars: Vec<char> = raw.chars().collect();
        let mut i = 0;
        while i < chars.len() {
            let c = chars[i];
            if c.is_whitespace() {
                i += 1;
                continue;
            }
            if c == '%' {
                break;
            }
            let single = match c {
                ';' => Some(Token::Semicolon),
                '=' => Some(Token::Is),
                ')' => Some(Token::Close),
                _ => None,
            };
            if let Some(t) = single {
                tokens.push((lineno, t));
                i += 1;
                continue;
            }
            match c {
                '(' | '<' | '[' | '{' => {
                    let close = match c {
                        '(' => ')',
                        '<' => '>',
                        '[' => ']',
                        _ => '}',
                    };
                    let body_end = chars[i + 1..]
                        .iter()
                        .position(|&x| x == close || x.is_whitespace() || x == c)
                        .map(|p| i + 1 + p);
                    match body_end {
                        Some(e) if chars[e] == close && e > i + 1 => {
                            let body: String = chars[i + 1..e].iter().collect();
                            let tok = match c {
                                '(' => Token::Form(format!("({body})")),
                                '<' => Token::Lemma(format!("<{body}>")),
                                '[' => Token::Sense(format!("[{body}]")),
                                _ => Token::SetRef(body),
                            };
                            tokens.push((lineno, tok));
                            i = e + 1;
                        }
                        _ if c == '(' => {
                            tokens.push((lineno, Token::Open));
                            i += 1;
                        }
                        _ => {
                            report.error(
                                DiagnosticCode::Syntax,
                                Some(lineno),
                                format!("unterminated '{c}' in '{}'", raw.trim()),
                            );
                            i = chars.len();
                        }
                    }
                }
                '$' => {
                    let end = scan_word(&chars, i + 1);
                    if end == i + 1 {
                        report.error(DiagnosticCode::Syntax, Some(lineno), "'$' without a set name");
                        i += 1;
                    } else {
                        tokens.push((lineno, Token::SetRef(chars[i + 1..end].iter().collect())));
                        i = end;
                    }
                }
                '>' | ']' | '}' => {
                    report.error(DiagnosticCode::Syntax, Some(lineno), format!("unexpected '{c}'"));
                    i += 1;
                }
                _ => {
                    let mut end = scan_word(&chars, i);
                    let mut word: String = chars[i..end].iter().collect();
                    if is_user_prefix(&word) && chars.get(end) == Some(&'=') {
                        let value_end = scan_word(&chars, end + 1);
                        word = chars[i..value_end].iter().collect();
                        end = value_end;
                        tokens.push((lineno, Token::User(word)));
                        i = end;
                        continue;
                    }
                    let tok = match word.as_str() {
                        "SETS" => Token::Sets,
                        "CONSTRAINTS" => Token::Constraints,
                        "not" => Token::Not,
                        "or" => Token::Or,
                        "barrier" => Token::Barrier,
                        OUT_OF_BOUNDS => Token::Out,
                        _ => Token::Word(word),
                    };
                    tokens.push((lineno, tok));
                    i = end;
                }
            }
        }
    }
    tokens
}

fn scan_word(chars: &[char], from: usize) -> usize {
    chars[from..]
        .iter()
        .position(|&c| c.is_whitespace() || DELIMITERS.contains(c))
        .map_or(chars.len(), |p| from + p)
}

/// `u.` followed by digits.
fn is_user_prefix(word: &str) -> bool {
    word.strip_prefix("u.")
        .is_some_and(|d| !d.is_empty() && d.bytes().all(|b| b.is_ascii_digit()))
}

fn user_term(user: &str) -> Option<Term> {
    let (lhs, _) = user.split_once('=')?;
    let index = lhs.strip_prefix("u.")?.parse().ok()?;
    Some(Term::User {
        index,
        pattern: user.to_string(),
    })
}

// ============================================================================
// Parser
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Start,
    Sets,
    Constraints,
}

type Failure = (DiagnosticCode, String);

struct Parser<'r> {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    grammar: ConstraintGrammar,
    report: &'r mut LoadReport,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn line(&self) -> Option<usize> {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|(l, _)| *l)
    }

    fn next(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).map(|(_, t)| t.clone());
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn expect(&mut self, want: &Token, what: &str) -> std::result::Result<(), Failure> {
        match self.next() {
            Some(ref t) if t == want => Ok(()),
            Some(t) => Err(syntax(format!("expected {what}, found {t:?}"))),
            None => Err(syntax(format!("expected {what}, found end of file"))),
        }
    }

    fn run(&mut self) {
        let mut mode = Mode::Start;
        while let Some(tok) = self.peek() {
            match tok {
                Token::Sets => {
                    if mode == Mode::Constraints {
                        let line = self.line();
                        self.report
                            .error(DiagnosticCode::Syntax, line, "SETS must come before CONSTRAINTS");
                    }
                    mode = Mode::Sets;
                    self.pos += 1;
                    continue;
                }
                Token::Constraints => {
                    mode = Mode::Constraints;
                    self.pos += 1;
                    continue;
                }
                _ => {}
            }
            let line = self.line().unwrap_or(0);
            let outcome = match mode {
                Mode::Start => Err(syntax("expected SETS or CONSTRAINTS")),
                Mode::Sets => self.set_definition(line),
                Mode::Constraints => self.rule(line),
            };
            if let Err((code, message)) = outcome {
                self.report.error(code, Some(line), message);
                self.recover();
            }
        }
    }

    /// Skip past the next `;`, stopping early at a section keyword.
    fn recover(&mut self) {
        while let Some(tok) = self.peek() {
            match tok {
                Token::Sets | Token::Constraints => return,
                Token::Semicolon => {
                    self.pos += 1;
                    return;
                }
                _ => self.pos += 1,
            }
        }
    }

    fn set_definition(&mut self, line: usize) -> std::result::Result<(), Failure> {
        let name = match self.next() {
            Some(Token::Word(w)) => w,
            other => return Err(syntax(format!("expected a set name, found {other:?}"))),
        };
        self.expect(&Token::Is, "'='")?;
        let mut kind = None;
        let mut items = FxHashSet::default();
        loop {
            let (k, item) = match self.next() {
                Some(Token::Semicolon) => break,
                Some(Token::Form(f)) => (SetKind::Form, f.to_lowercase()),
                Some(Token::Lemma(l)) => (SetKind::Lemma, l.to_lowercase()),
                Some(Token::Sense(s)) => (SetKind::Sense, s),
                Some(Token::Word(w)) => (SetKind::Category, w),
                Some(t) => return Err(syntax(format!("unexpected {t:?} in set {name}"))),
                None => return Err(syntax(format!("set {name} is not closed with ';'"))),
            };
            match kind {
                None => kind = Some(k),
                Some(prev) if prev != k => {
                    return Err(syntax(format!("set {name} mixes {prev:?} and {k:?} items")));
                }
                Some(_) => {}
            }
            items.insert(item);
        }
        let Some(kind) = kind else {
            return Err(syntax(format!("set {name} is empty")));
        };
        if kind == SetKind::Sense {
            self.grammar.senses_used = true;
        }
        if self.grammar.sets.insert(name.clone(), CgSet { kind, items }).is_some() {
            self.report.warning(
                DiagnosticCode::Syntax,
                Some(line),
                format!("set {name} redefined, the last definition is used"),
            );
        }
        Ok(())
    }

    fn rule(&mut self, line: usize) -> std::result::Result<(), Failure> {
        let weight = match self.next() {
            Some(Token::Word(w)) => w
                .parse::<f64>()
                .map_err(|_| syntax(format!("expected a weight, found '{w}'")))?,
            other => return Err(syntax(format!("expected a weight, found {other:?}"))),
        };
        let head = self.head()?;
        let mut conditions = Vec::new();
        loop {
            match self.next() {
                Some(Token::Semicolon) => break,
                Some(Token::Open) => conditions.push(self.condition()?),
                Some(t) => return Err(syntax(format!("expected '(' or ';', found {t:?}"))),
                None => return Err(syntax("rule is not closed with ';'")),
            }
        }
        self.grammar.rules.entry(head.clone()).or_default().push(CgRule {
            line,
            weight,
            head,
            conditions,
        });
        Ok(())
    }

    fn head(&mut self) -> std::result::Result<String, Failure> {
        match self.next() {
            Some(Token::Word(tag)) => match self.peek() {
                Some(Token::Lemma(q)) => {
                    let head = format!("{tag}{q}");
                    self.pos += 1;
                    Ok(head)
                }
                Some(Token::Form(q)) => {
                    let head = format!("{tag}{}", q.to_lowercase());
                    self.pos += 1;
                    Ok(head)
                }
                Some(Token::Sense(q)) => {
                    let head = format!("{tag}{q}");
                    self.pos += 1;
                    self.grammar.senses_used = true;
                    Ok(head)
                }
                _ => Ok(tag),
            },
            Some(Token::Lemma(l)) => Ok(l),
            Some(Token::Sense(s)) => {
                self.grammar.senses_used = true;
                Ok(s)
            }
            Some(Token::User(u)) => Ok(u),
            other => Err(syntax(format!("expected a rule head, found {other:?}"))),
        }
    }

    /// After the opening `(`.
    fn condition(&mut self) -> std::result::Result<Condition, Failure> {
        let negated = self.peek() == Some(&Token::Not);
        if negated {
            self.pos += 1;
        }
        let (position, star) = match self.next() {
            Some(Token::Word(w)) => {
                let (num, star) = match w.strip_suffix('*') {
                    Some(n) => (n, true),
                    None => (w.as_str(), false),
                };
                let position = num
                    .parse::<isize>()
                    .map_err(|_| syntax(format!("expected a position, found '{w}'")))?;
                (position, star)
            }
            other => return Err(syntax(format!("expected a position, found {other:?}"))),
        };
        let terms = self.term_list()?;
        let mut barrier = Vec::new();
        if self.peek() == Some(&Token::Barrier) {
            self.pos += 1;
            if !star {
                return Err((
                    DiagnosticCode::BarrierWithoutStar,
                    format!("barrier on fixed position {position}, use '{position}*'"),
                ));
            }
            barrier = self.term_list()?;
        }
        self.expect(&Token::Close, "')'")?;
        Ok(Condition {
            negated,
            position,
            star,
            terms,
            barrier,
        })
    }

    /// `term [or term]...`
    fn term_list(&mut self) -> std::result::Result<Vec<Term>, Failure> {
        let mut terms = vec![self.term()?];
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            terms.push(self.term()?);
        }
        Ok(terms)
    }

    fn term(&mut self) -> std::result::Result<Term, Failure> {
        let term = match self.next() {
            Some(Token::Word(tag)) => match self.peek().cloned() {
                Some(Token::Lemma(q)) => {
                    self.pos += 1;
                    Term::Lemma(format!("{tag}{q}"))
                }
                Some(Token::Form(q)) => {
                    self.pos += 1;
                    Term::Form(format!("{tag}{}", q.to_lowercase()))
                }
                Some(Token::Sense(q)) => {
                    self.pos += 1;
                    Term::Sense(format!("{tag}{q}"))
                }
                _ => Term::Tag(tag),
            },
            Some(Token::Out) => Term::Tag(OUT_OF_BOUNDS.to_string()),
            Some(Token::Lemma(l)) => Term::Lemma(l),
            Some(Token::Form(f)) => Term::Form(f.to_lowercase()),
            Some(Token::Sense(s)) => Term::Sense(s),
            Some(Token::User(u)) => {
                user_term(&u).ok_or_else(|| syntax(format!("malformed user field '{u}'")))?
            }
            Some(Token::SetRef(name)) => match self.grammar.sets.get(&name) {
                Some(set) => {
                    if set.kind == SetKind::Sense {
                        self.grammar.senses_used = true;
                    }
                    Term::Set(name)
                }
                None => return Err((DiagnosticCode::UndefinedSet, format!("set {name} is not defined"))),
            },
            other => return Err(syntax(format!("expected a term, found {other:?}"))),
        };
        if matches!(term, Term::Sense(_)) {
            self.grammar.senses_used = true;
        }
        Ok(term)
    }
}

fn syntax(message: impl Into<String>) -> Failure {
    (DiagnosticCode::Syntax, message.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const GRAMMAR: &str = "\
SETS
Det = DA* DD* ;
Be = <ser> <Estar> ;
Small = (la) (el) ;
CONSTRAINTS
% comment line
-2.0  NC*  (-1 $Be) ;
0.8  VMI*<ser>  (1* AQ* barrier VM* or NC*) ;
1.0 NC (-1 {Det} or OUT_OF_BOUNDS) (not 1 SPS00) ;
0.5 <casa> (-1 (La)) ;
0.3 u.0=foo ;
";

    fn word(form: &str, lemma: &str, tag: &str) -> (Word, Analysis) {
        let a = Analysis::new(lemma, tag);
        (Word::new(form).with_analysis(a.clone()), a)
    }

    #[test]
    fn test_parse_rules_and_sets() {
        let g = ConstraintGrammar::from_text(GRAMMAR, "t").unwrap();
        assert_eq!(g.n_rules(), 5);
        assert!(!g.senses_used());
        assert_eq!(g.set("Det").unwrap().kind, SetKind::Category);
        assert!(g.set("Be").unwrap().contains("<estar>"));
        assert!(g.set("Small").unwrap().contains("(la)"));

        let nc = &g.rules_for("NC*")[0];
        assert_eq!(nc.weight, -2.0);
        assert_eq!(nc.line, 7);
        assert_eq!(
            nc.conditions,
            vec![Condition {
                negated: false,
                position: -1,
                star: false,
                terms: vec![Term::Set("Be".into())],
                barrier: vec![],
            }]
        );

        let vmi = &g.rules_for("VMI*<ser>")[0].conditions[0];
        assert!(vmi.star);
        assert_eq!(vmi.position, 1);
        assert_eq!(vmi.terms, vec![Term::Tag("AQ*".into())]);
        assert_eq!(vmi.barrier, vec![Term::Tag("VM*".into()), Term::Tag("NC*".into())]);

        let conds = &g.rules_for("NC")[0].conditions;
        assert_eq!(conds[0].terms[1], Term::Tag(OUT_OF_BOUNDS.into()));
        assert!(conds[1].negated);

        assert_eq!(g.rules_for("<casa>")[0].conditions[0].terms, vec![Term::Form("(la)".into())]);
        assert!(g.rules_for("u.0=foo")[0].conditions.is_empty());
        assert!(g.rules_for("VM*").is_empty());
    }

    #[test]
    fn test_term_matching() {
        let g = ConstraintGrammar::from_text(GRAMMAR, "t").unwrap();
        let (w, a) = word("Casa", "casa", "NCFS000");
        assert!(g.term_matches(&Term::Tag("NC*".into()), &w, &a));
        assert!(!g.term_matches(&Term::Tag("NCM*".into()), &w, &a));
        assert!(g.term_matches(&Term::Lemma("<casa>".into()), &w, &a));
        assert!(g.term_matches(&Term::Lemma("NC*<casa>".into()), &w, &a));
        assert!(!g.term_matches(&Term::Lemma("VM*<casa>".into()), &w, &a));
        assert!(g.term_matches(&Term::Form("(casa)".into()), &w, &a));
        assert!(g.term_matches(&Term::Form("NCFS000(casa)".into()), &w, &a));

        let (w, a) = word("Estar", "estar", "VMN0000");
        assert!(g.term_matches(&Term::Set("Be".into()), &w, &a));
        let (w, a) = word("La", "el", "DA0FS0");
        assert!(g.term_matches(&Term::Set("Det".into()), &w, &a));
        assert!(g.term_matches(&Term::Set("Small".into()), &w, &a));

        let a = Analysis::new("x", "NC").with_user(["foo", "bar"]).with_senses(["s1"]);
        let w = Word::new("x");
        let user = |i: usize, p: &str| Term::User { index: i, pattern: p.to_string() };
        assert!(g.term_matches(&user(1, "u.1=bar"), &w, &a));
        assert!(!g.term_matches(&user(0, "u.0=bar"), &w, &a));
        assert!(!g.term_matches(&user(4, "u.4=bar"), &w, &a));
        assert!(g.term_matches(&Term::Sense("[s1]".into()), &w, &a));
        assert!(g.term_matches(&Term::Sense("NC[s1]".into()), &w, &a));
    }

    #[test]
    fn test_senses_used() {
        let g = ConstraintGrammar::from_text("CONSTRAINTS\n1.0 NC (1 [s1]) ;\n", "t").unwrap();
        assert!(g.senses_used());
        let g = ConstraintGrammar::from_text("CONSTRAINTS\n1.0 [s1] ;\n", "t").unwrap();
        assert!(g.senses_used());
        assert_eq!(g.rules_for("[s1]").len(), 1);
    }

    #[test]
    fn test_all_errors_reported() {
        let text = "\
NC ;
SETS
Mixed = (la) <el> ;
CONSTRAINTS
1.0 NC (-1 $Nope) ;
abc NC (1 DA) ;
1.0 NC (1 DA barrier VM*) ;
1.0 NC (x DA) ;
1.0 NC (1 DA) ;
1.0 NC (1 <open) ;
";
        let err = ConstraintGrammar::from_text(text, "bad.rlx").unwrap_err();
        let report = err.report().unwrap();
        assert!(report.has_code(DiagnosticCode::UndefinedSet));
        assert!(report.has_code(DiagnosticCode::BarrierWithoutStar));
        let mut lines: Vec<Option<usize>> = report.errors().map(|d| d.line).collect();
        lines.sort();
        assert_eq!(
            lines,
            vec![Some(1), Some(3), Some(5), Some(6), Some(7), Some(8), Some(10), Some(10)]
        );
    }

    #[test]
    fn test_missing_semicolon_at_end() {
        let err = ConstraintGrammar::from_text("CONSTRAINTS\n1.0 NC (1 DA)\n", "t").unwrap_err();
        assert_eq!(err.report().unwrap().errors().count(), 1);
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tagger.rlx");
        std::fs::write(&path, GRAMMAR).unwrap();
        assert_eq!(ConstraintGrammar::from_file(&path).unwrap().n_rules(), 5);
        assert!(ConstraintGrammar::from_file(dir.path().join("nope.rlx")).is_err());
    }
}
