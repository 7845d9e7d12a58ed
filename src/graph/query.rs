//! Structured report queries and their SPARQL rendering
//!
//! Caller-supplied strings (domains, keywords) are stored raw inside
//! `ReportFilter` and only ever reach query text through `escape_literal`
//! (and `regex::escape` for REGEX alternations). There is no public way
//! to splice unescaped text into a query.

/// Ontology namespace for credibility reports
pub const CRED_NAMESPACE: &str = "https://github.com/DominiqueLoyer/systemFactChecking#";

/// What a report query filters on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportFilter {
    /// Subject URL contains the value (case-sensitive substring)
    UrlContains(String),
    /// Claim content matches any keyword (case-insensitive)
    ContentMatchesAny(Vec<String>),
}

/// A read-only query over prior credibility reports, newest first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportQuery {
    pub filter: ReportFilter,
    pub limit: usize,
}

impl ReportQuery {
    /// Prior reports about a source domain; `None` for a blank domain
    pub fn source_history(domain: &str, limit: usize) -> Option<Self> {
        let domain = domain.trim();
        if domain.is_empty() || limit == 0 {
            return None;
        }
        Some(Self {
            filter: ReportFilter::UrlContains(domain.to_string()),
            limit,
        })
    }

    /// Prior reports whose content mentions any keyword of at least `min_len` chars
    ///
    /// `None` when no keyword qualifies.
    pub fn similar_claims(keywords: &[String], min_len: usize, limit: usize) -> Option<Self> {
        let mut kept: Vec<String> = Vec::new();
        for kw in keywords {
            let kw = kw.trim();
            if kw.chars().count() >= min_len && !kept.iter().any(|k| k == kw) {
                kept.push(kw.to_string());
            }
        }
        if kept.is_empty() || limit == 0 {
            return None;
        }
        Some(Self {
            filter: ReportFilter::ContentMatchesAny(kept),
            limit,
        })
    }

    /// Evaluate the filter against one report's fields
    pub fn matches(&self, subject_url: Option<&str>, content: Option<&str>) -> bool {
        match &self.filter {
            ReportFilter::UrlContains(domain) => {
                subject_url.is_some_and(|url| url.contains(domain.as_str()))
            }
            ReportFilter::ContentMatchesAny(keywords) => content.is_some_and(|c| {
                let folded = c.to_lowercase();
                keywords.iter().any(|kw| folded.contains(&kw.to_lowercase()))
            }),
        }
    }

    /// SPARQL SELECT returning ?report ?url ?content ?score ?level ?timestamp
    pub fn to_sparql(&self) -> String {
        let (subject_pattern, filter) = match &self.filter {
            ReportFilter::UrlContains(domain) => (
                "?info cred:informationURL ?url .\n        OPTIONAL { ?info cred:informationContent ?content . }",
                format!("FILTER(CONTAINS(STR(?url), \"{}\"))", escape_literal(domain)),
            ),
            ReportFilter::ContentMatchesAny(keywords) => {
                let alternation = keywords
                    .iter()
                    .map(|kw| regex::escape(kw))
                    .collect::<Vec<_>>()
                    .join("|");
                (
                    "?info cred:informationContent ?content .\n        OPTIONAL { ?info cred:informationURL ?url . }",
                    format!(
                        "FILTER(REGEX(STR(?content), \"{}\", \"i\"))",
                        escape_literal(&alternation)
                    ),
                )
            }
        };

        format!(
            r#"PREFIX cred: <{ns}>

SELECT ?report ?url ?content ?score ?level ?timestamp
WHERE {{
        {subject}
        ?request cred:concernsInformation ?info .
        ?report cred:isReportOf ?request .
        ?report cred:credibilityScoreValue ?score .
        ?report cred:assignsCredibilityLevel ?level .
        ?report cred:completionTimestamp ?timestamp .
        {filter}
}}
ORDER BY DESC(?timestamp)
LIMIT {limit}"#,
            ns = CRED_NAMESPACE,
            subject = subject_pattern,
            filter = filter,
            limit = self.limit,
        )
    }
}

/// Escape a value for a double- or single-quoted SPARQL string literal
///
/// Backslash is escaped first so later escapes are not doubled.
pub fn escape_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 8);
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0C}' => out.push_str("\\f"),
            c if c.is_control() => out.push_str(&format!("\\u{:04X}", c as u32)),
            c => out.push(c),
        }
    }
    out
}

/// Local name of an ontology IRI (text after '#', else after the last '/')
pub fn local_name(iri: &str) -> &str {
    iri.rsplit_once('#')
        .or_else(|| iri.rsplit_once('/'))
        .map(|(_, name)| name)
        .unwrap_or(iri)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_literal() {
        assert_eq!(escape_literal(r#"a"b"#), r#"a\"b"#);
        assert_eq!(escape_literal(r"a\b"), r"a\\b");
        assert_eq!(escape_literal("it's"), r"it\'s");
        assert_eq!(escape_literal("l1\nl2\r\t"), r"l1\nl2\r\t");
        assert_eq!(escape_literal("\u{0}"), r"\u0000");
        assert_eq!(escape_literal(r#"\""#), r#"\\\""#);
    }

    #[test]
    fn test_injection_stays_inside_literal() {
        let q = ReportQuery::source_history(r#"evil.com")) } DROP ALL #"#, 10).unwrap();
        let sparql = q.to_sparql();
        assert!(sparql.contains(r#"CONTAINS(STR(?url), "evil.com\")) } DROP ALL #")"#));
        assert!(sparql.contains("LIMIT 10"));
        assert!(sparql.contains("ORDER BY DESC(?timestamp)"));
    }

    #[test]
    fn test_similar_claims_filters_short_keywords() {
        let kws = vec!["the".to_string(), "vaccine".to_string(), "a.b*".to_string(), "vaccine".to_string()];
        let q = ReportQuery::similar_claims(&kws, 4, 3).unwrap();
        assert_eq!(
            q.filter,
            ReportFilter::ContentMatchesAny(vec!["vaccine".to_string(), "a.b*".to_string()])
        );
        let sparql = q.to_sparql();
        // regex escape then literal escape: `.` -> `\.` -> `\\.`
        assert!(sparql.contains(r#"REGEX(STR(?content), "vaccine|a\\.b\\*", "i")"#));
        assert!(sparql.contains("LIMIT 3"));

        assert!(ReportQuery::similar_claims(&["abc".to_string()], 4, 3).is_none());
    }

    #[test]
    fn test_blank_domain_has_no_query() {
        assert!(ReportQuery::source_history("  ", 10).is_none());
    }

    #[test]
    fn test_matches() {
        let history = ReportQuery::source_history("lemonde.fr", 10).unwrap();
        assert!(history.matches(Some("https://www.lemonde.fr/a"), None));
        assert!(!history.matches(Some("https://example.com"), None));
        assert!(!history.matches(None, Some("lemonde.fr")));

        let similar = ReportQuery::similar_claims(&["Vaccine".to_string()], 4, 3).unwrap();
        assert!(similar.matches(None, Some("The VACCINE causes harm")));
        assert!(!similar.matches(None, Some("unrelated")));
    }

    #[test]
    fn test_local_name() {
        assert_eq!(local_name("https://x.org/onto#High"), "High");
        assert_eq!(local_name("https://x.org/onto/Low"), "Low");
        assert_eq!(local_name("Medium"), "Medium");
    }
}
