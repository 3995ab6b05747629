//! Suffix table mapping domain suffixes to their whois servers.
//!
//! The table is an ordered list of `suffix<TAB>server` records. Resolution
//! returns the first record in table order whose suffix ends the domain on a
//! label boundary, so more specific suffixes (`.co.uk`) must be listed before
//! their parents (`.uk`) in the source.

use once_cell::sync::Lazy;
use serde::Serialize;

use crate::error::{Result, WhoisError};

/// Embedded suffix source.
const SERVER_LIST: &str = include_str!("servers.tsv");

/// Process-wide suffix table, built on first use.
///
/// A malformed embedded source leaves every lookup meaningless, so the load
/// panics instead of handing out a partial table.
static SUFFIX_TABLE: Lazy<SuffixTable> = Lazy::new(|| match SuffixTable::parse(SERVER_LIST) {
    Ok(table) => table,
    Err(e) => {
        log::error!("whois: invalid embedded suffix list: {}", e);
        panic!("whois: invalid embedded suffix list: {}", e);
    }
});

/// A single suffix -> server record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuffixRecord {
    /// Domain suffix including its leading dot, e.g. `.com`
    pub suffix: String,
    /// Hostname of the authoritative whois server
    pub server: String,
}

impl SuffixRecord {
    pub fn new(suffix: impl Into<String>, server: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
            server: server.into(),
        }
    }

    /// Check whether `domain` ends with this suffix on a label boundary.
    ///
    /// Comparison is byte-wise and case-sensitive.
    pub fn matches(&self, domain: &str) -> bool {
        let domain = domain.as_bytes();
        let suffix = self.suffix.as_bytes();
        if suffix.len() > domain.len() {
            return false;
        }
        let p = domain.len() - suffix.len();
        if domain.get(p) != Some(&b'.') {
            return false;
        }
        &domain[p..] == suffix
    }
}

/// Ordered suffix table.
#[derive(Debug, Clone, Default)]
pub struct SuffixTable {
    records: Vec<SuffixRecord>,
}

impl SuffixTable {
    /// Build a table from records, keeping their order.
    pub fn new(records: Vec<SuffixRecord>) -> Self {
        Self { records }
    }

    /// Parse a tab-separated suffix list.
    ///
    /// Blank lines are skipped. Every other line must have exactly two
    /// tab-separated columns.
    pub fn parse(text: &str) -> Result<Self> {
        let mut records = Vec::new();

        for (line_num, line) in text.lines().enumerate() {
            let line_num = line_num + 1;

            if line.is_empty() {
                continue;
            }

            let columns: Vec<&str> = line.split('\t').collect();
            if columns.len() != 2 {
                return Err(WhoisError::ConfigError {
                    line: line_num,
                    message: format!(
                        "expected 2 tab-separated columns, found {}: {:?}",
                        columns.len(),
                        line
                    ),
                });
            }

            records.push(SuffixRecord::new(columns[0], columns[1]));
        }

        Ok(Self { records })
    }

    /// Find the first record in table order matching `domain`.
    pub fn resolve(&self, domain: &str) -> Option<&SuffixRecord> {
        self.records.iter().find(|r| r.matches(domain))
    }

    pub fn iter(&self) -> impl Iterator<Item = &SuffixRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// The process-wide table loaded from the embedded list.
pub fn suffix_table() -> &'static SuffixTable {
    &SUFFIX_TABLE
}

/// Resolve the whois server for `domain` using the process-wide table.
pub fn resolve_server(domain: &str) -> Result<&'static SuffixRecord> {
    let record = suffix_table()
        .resolve(domain)
        .ok_or_else(|| WhoisError::NoServer(domain.to_string()))?;
    log::debug!(
        "whois: {} matched suffix {} -> {}",
        domain,
        record.suffix,
        record.server
    );
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(text: &str) -> SuffixTable {
        SuffixTable::parse(text).unwrap()
    }

    #[test]
    fn test_embedded_list_loads() {
        let table = suffix_table();
        assert!(!table.is_empty());
        assert!(table.iter().all(|r| r.suffix.starts_with('.')));
    }

    #[test]
    fn test_resolve_com() {
        let record = resolve_server("example.com").unwrap();
        assert_eq!(record.suffix, ".com");
        assert_eq!(record.server, "whois.verisign-grs.com");
    }

    #[test]
    fn test_resolve_second_level_listed_first() {
        let record = resolve_server("bbc.co.uk").unwrap();
        assert_eq!(record.suffix, ".co.uk");
    }

    #[test]
    fn test_resolve_unknown() {
        let err = resolve_server("example.invalid").unwrap_err();
        assert!(matches!(err, WhoisError::NoServer(ref d) if d == "example.invalid"));
    }

    #[test]
    fn test_first_match_wins_over_longer_suffix() {
        let t = table(".uk\twhois.nic.uk\n.co.uk\twhois.co-uk.example\n");
        let record = t.resolve("example.co.uk").unwrap();
        assert_eq!(record.suffix, ".uk");
        assert_eq!(record.server, "whois.nic.uk");

        let t = table(".co.uk\twhois.co-uk.example\n.uk\twhois.nic.uk\n");
        assert_eq!(t.resolve("example.co.uk").unwrap().suffix, ".co.uk");
    }

    #[test]
    fn test_duplicate_suffix_first_wins() {
        let t = table(".com\tfirst.example\n.com\tsecond.example\n");
        assert_eq!(t.resolve("a.com").unwrap().server, "first.example");
    }

    #[test]
    fn test_partial_label_does_not_match() {
        let t = table(".com\twhois.verisign-grs.com\n");
        assert!(t.resolve("examplecom").is_none());
        assert!(t.resolve("example.co").is_none());
        assert!(t.resolve("example.community").is_none());
    }

    #[test]
    fn test_case_sensitive() {
        let t = table(".com\twhois.verisign-grs.com\n");
        assert!(t.resolve("EXAMPLE.COM").is_none());
        assert!(t.resolve("EXAMPLE.com").is_some());
    }

    #[test]
    fn test_suffix_equal_to_domain() {
        let t = table(".com\twhois.verisign-grs.com\n");
        assert!(t.resolve(".com").is_some());
        assert!(t.resolve("com").is_none());
        assert!(t.resolve("").is_none());
    }

    #[test]
    fn test_suffix_without_leading_dot_never_matches() {
        let t = table("com\twhois.verisign-grs.com\n");
        assert!(t.resolve("example.com").is_none());
    }

    #[test]
    fn test_multibyte_domain_does_not_panic() {
        let t = table(".com\twhois.verisign-grs.com\n");
        assert!(t.resolve("ü").is_none());
        assert!(t.resolve("bücher.com").is_some());
    }

    #[test]
    fn test_parse_skips_blank_lines() {
        let t = table("\n.com\ta\n\n.net\tb\n\n");
        assert_eq!(t.len(), 2);
        let suffixes: Vec<&str> = t.iter().map(|r| r.suffix.as_str()).collect();
        assert_eq!(suffixes, vec![".com", ".net"]);
    }

    #[test]
    fn test_parse_crlf_line_endings() {
        // A bare "\r" line counts as blank; line numbers still include it
        let t = table(".com\ta\r\n\r\n.net\tb\r\n");
        assert_eq!(t.len(), 2);
        assert_eq!(t.resolve("x.com").unwrap().server, "a");
        assert_eq!(t.resolve("x.net").unwrap().server, "b");

        let err = SuffixTable::parse(".com\ta\r\n\r\n.net\r\n").unwrap_err();
        match err {
            WhoisError::ConfigError { line, .. } => assert_eq!(line, 3),
            other => panic!("expected ConfigError, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_rejects_single_column() {
        let err = SuffixTable::parse(".com\ta\n.net\n").unwrap_err();
        match err {
            WhoisError::ConfigError { line, .. } => assert_eq!(line, 2),
            other => panic!("expected ConfigError, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_rejects_three_columns() {
        let err = SuffixTable::parse(".com\ta\tb\n").unwrap_err();
        match err {
            WhoisError::ConfigError { line, message } => {
                assert_eq!(line, 1);
                assert!(message.contains("found 3"), "got: {}", message);
            }
            other => panic!("expected ConfigError, got {:?}", other),
        }
    }

    #[test]
    fn test_record_serializes() {
        let record = SuffixRecord::new(".com", "whois.verisign-grs.com");
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"suffix":".com","server":"whois.verisign-grs.com"}"#);
    }
}
