//! Wildcard matching for tag patterns
//!
//! Grammar categories and constraint terms share one pattern language: a
//! literal symbol (`NCMS000`), a tag prefix ending in `*` (`VMI*`), and either
//! of those followed by a qualifier (`VMI*<ser>`, `NC(casa)`, `NC[02084442]`).
//! A wildcard pattern matches a symbol when the symbol's tag starts with the
//! pattern prefix and the qualifiers are identical.

/// Split `symbol` at the first opening bracket listed in `openers`.
///
/// ```
/// use lingrules::matching::split_qualifier;
/// assert_eq!(split_qualifier("VMI*<ser>", "(<"), ("VMI*", "<ser>"));
/// assert_eq!(split_qualifier("NC", "(<"), ("NC", ""));
/// ```
pub fn split_qualifier<'a>(symbol: &'a str, openers: &str) -> (&'a str, &'a str) {
    match symbol.find(|c: char| openers.contains(c)) {
        Some(p) => (&symbol[..p], &symbol[p..]),
        None => (symbol, ""),
    }
}

/// Match a possibly wildcarded `pattern` against a literal `found` symbol.
///
/// `openers` lists the bracket characters that start a qualifier.
pub fn wildcard_match(pattern: &str, found: &str, openers: &str) -> bool {
    if pattern == found {
        return true;
    }
    let Some(star) = pattern.find('*') else {
        return false;
    };
    if !found.starts_with(&pattern[..star]) {
        return false;
    }
    let (found_tag, _) = split_qualifier(found, openers);
    let (_, pattern_qual) = split_qualifier(pattern, openers);
    found.len() == found_tag.len() + pattern_qual.len() && found.ends_with(pattern_qual)
}

/// Match `value` against a list of alternatives where any alternative may
/// end in `*` to accept every value with that prefix.
pub fn prefix_match<'a, I>(alternatives: I, value: &str) -> bool
where
    I: IntoIterator<Item = &'a String>,
{
    alternatives.into_iter().any(|alt| {
        alt == value
            || alt
                .find('*')
                .is_some_and(|p| value.get(..p).is_some_and(|v| v == &alt[..p]))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_match() {
        assert!(wildcard_match("NCMS000", "NCMS000", "(<["));
        assert!(!wildcard_match("NCMS000", "NCFS000", "(<["));
    }

    #[test]
    fn test_prefix_wildcard() {
        assert!(wildcard_match("VMI*", "VMIP3S0", "(<["));
        assert!(!wildcard_match("VMI*", "VMSP3S0", "(<["));
        // an unqualified pattern does not accept a qualified symbol
        assert!(!wildcard_match("VMI*", "VMIP3S0<ser>", "(<["));
    }

    #[test]
    fn test_wildcard_with_qualifier() {
        assert!(wildcard_match("VMI*<ser>", "VMIP3S0<ser>", "(<["));
        assert!(!wildcard_match("VMI*<ser>", "VMIP3S0<estar>", "(<["));
        assert!(!wildcard_match("VMI*<ser>", "VMIP3S0", "(<["));
        assert!(wildcard_match("N*(casa)", "NCFS000(casa)", "(<["));
    }

    #[test]
    fn test_prefix_match_alternatives() {
        let alts = vec!["sn".to_string(), "grup-*".to_string()];
        assert!(prefix_match(&alts, "sn"));
        assert!(prefix_match(&alts, "grup-verb"));
        assert!(!prefix_match(&alts, "sp"));
        assert!(!prefix_match(&alts, "gr"));
    }
}
