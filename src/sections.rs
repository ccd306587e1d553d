//! Reader for `<SECTION> ... </SECTION>` rule files
//!
//! Proper-noun settings and dependency rules are stored as named sections of
//! raw lines. Lines starting with `%` and blank lines are dropped; line
//! numbers are kept for diagnostics.

use rustc_hash::FxHashMap;

use crate::diagnostics::{DiagnosticCode, LoadReport};

/// One section's lines, with their 1-based line numbers.
pub type SectionLines<'a> = Vec<(usize, &'a str)>;

/// Split `text` into sections. Problems are recorded in `report`.
pub fn read_sections<'a>(text: &'a str, report: &mut LoadReport) -> FxHashMap<String, SectionLines<'a>> {
    let mut sections: FxHashMap<String, SectionLines<'a>> = FxHashMap::default();
    let mut current: Option<(String, usize)> = None;

    for (n, raw) in text.lines().enumerate() {
        let lineno = n + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('%') {
            continue;
        }

        if let Some(name) = line.strip_prefix("</").and_then(|l| l.strip_suffix('>')) {
            match &current {
                Some((open, _)) if open == name => current = None,
                Some((open, _)) => report.error(
                    DiagnosticCode::Syntax,
                    Some(lineno),
                    format!("</{name}> closes section <{open}>"),
                ),
                None => report.error(
                    DiagnosticCode::Syntax,
                    Some(lineno),
                    format!("</{name}> outside any section"),
                ),
            }
            continue;
        }

        if current.is_none() {
            if let Some(name) = line.strip_prefix('<').and_then(|l| l.strip_suffix('>')) {
                if !name.contains(char::is_whitespace) {
                    sections.entry(name.to_string()).or_default();
                    current = Some((name.to_string(), lineno));
                    continue;
                }
            }
            report.warning(
                DiagnosticCode::Syntax,
                Some(lineno),
                format!("line outside any section ignored: '{line}'"),
            );
            continue;
        }

        if let Some((name, _)) = &current {
            sections.entry(name.clone()).or_default().push((lineno, line));
        }
    }

    if let Some((name, opened)) = current {
        report.error(
            DiagnosticCode::Syntax,
            Some(opened),
            format!("section <{name}> is never closed"),
        );
    }
    sections
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sections_are_split() {
        let mut report = LoadReport::new("t");
        let text = "<A>\nx y\n% comment\n\nz\n</A>\n<B>\n</B>\n";
        let s = read_sections(text, &mut report);
        assert!(report.is_empty());
        assert_eq!(s["A"], vec![(2, "x y"), (5, "z")]);
        assert!(s["B"].is_empty());
    }

    #[test]
    fn test_unclosed_and_stray_lines() {
        let mut report = LoadReport::new("t");
        let s = read_sections("stray\n<A>\nx\n", &mut report);
        assert_eq!(s["A"], vec![(3, "x")]);
        assert_eq!(report.warnings().count(), 1);
        assert_eq!(report.errors().count(), 1);
    }

    #[test]
    fn test_mismatched_close() {
        let mut report = LoadReport::new("t");
        read_sections("<A>\n</B>\n</A>\n", &mut report);
        assert_eq!(report.errors().count(), 1);
    }
}
