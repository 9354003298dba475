//! Entity extraction for the intent classifier.
//!
//! Captures email addresses, FQDN-shaped domain tokens, and numbers with an
//! optional units hint (`250 users`, `99.9%`). Extraction order is emails,
//! then domains (excluding the domain part of captured emails), then numbers
//! (excluding digits that belong to an email or domain token).

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b[a-z0-9._%+\-]+@(?:[a-z0-9](?:[a-z0-9\-]{0,61}[a-z0-9])?\.)+[a-z]{2,}\b")
        .expect("EMAIL_RE regex should compile")
});

static FQDN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:[a-z0-9](?:[a-z0-9\-]{0,61}[a-z0-9])?\.)+[a-z]{2,24}\b")
        .expect("FQDN_RE regex should compile")
});

static NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,3}(?:,\d{3})+|\d+(?:\.\d+)?)(?:\s*(%|[a-z][a-z\-]*))?")
        .expect("NUMBER_RE regex should compile")
});

/// A numeric capture with its units/label hint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericEntity {
    /// Parsed value, thousands separators removed.
    pub value: f64,
    /// Units or label immediately following the number ("users", "%", "gb").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// The matched text.
    pub raw: String,
}

/// Entities extracted from a query, grouped by kind.
///
/// Serializes as a mapping `{"numbers": [...], "emails": [...], "domains": [...]}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Entities {
    pub numbers: Vec<NumericEntity>,
    pub emails: Vec<String>,
    pub domains: Vec<String>,
}

impl Entities {
    /// Largest numeric value, if any number was captured.
    pub fn max_number(&self) -> Option<f64> {
        self.numbers
            .iter()
            .map(|n| n.value)
            .fold(None, |acc, v| Some(acc.map_or(v, |a: f64| a.max(v))))
    }

    pub fn is_empty(&self) -> bool {
        self.numbers.is_empty() && self.emails.is_empty() && self.domains.is_empty()
    }

    /// Whether any number with this value was captured.
    pub fn has_number(&self, value: f64) -> bool {
        self.numbers
            .iter()
            .any(|n| (n.value - value).abs() < f64::EPSILON)
    }
}

/// Words that commonly follow a number but are not a units hint.
const LABEL_STOPWORDS: &[&str] = &[
    "and", "or", "to", "from", "of", "in", "on", "at", "for", "with", "the", "a", "an", "by",
];

fn overlaps(span: &Range<usize>, taken: &[Range<usize>]) -> bool {
    taken
        .iter()
        .any(|t| span.start < t.end && t.start < span.end)
}

/// Extract all entities from the raw query text.
pub fn extract_entities(query: &str) -> Entities {
    let mut taken: Vec<Range<usize>> = Vec::new();

    let mut emails = Vec::new();
    for m in EMAIL_RE.find_iter(query) {
        emails.push(m.as_str().to_lowercase());
        taken.push(m.range());
    }

    let mut domains = Vec::new();
    for m in FQDN_RE.find_iter(query) {
        let span = m.range();
        if overlaps(&span, &taken) {
            continue;
        }
        let token = m.as_str().to_lowercase();
        if !domains.contains(&token) {
            domains.push(token);
        }
        taken.push(span);
    }

    let mut numbers = Vec::new();
    for caps in NUMBER_RE.captures_iter(query) {
        let Some(whole) = caps.get(0) else { continue };
        let Some(digits) = caps.get(1) else { continue };
        if overlaps(&digits.range(), &taken) {
            continue;
        }
        let Ok(value) = digits.as_str().replace(',', "").parse::<f64>() else {
            continue;
        };
        let label = caps
            .get(2)
            .map(|l| l.as_str().to_lowercase())
            .filter(|l| !LABEL_STOPWORDS.contains(&l.as_str()));
        let raw = match &label {
            Some(_) => whole.as_str().to_string(),
            None => digits.as_str().to_string(),
        };
        numbers.push(NumericEntity { value, label, raw });
    }

    Entities {
        numbers,
        emails,
        domains,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_with_label() {
        let e = extract_entities("Migrate 250 users to the new tenant");
        assert_eq!(e.numbers.len(), 1);
        assert_eq!(e.numbers[0].value, 250.0);
        assert_eq!(e.numbers[0].label.as_deref(), Some("users"));
        assert_eq!(e.numbers[0].raw, "250 users");
    }

    #[test]
    fn test_thousands_separator_and_percent() {
        let e = extract_entities("We have 1,500 mailboxes and need 99.9% uptime");
        assert!(e.has_number(1500.0));
        assert!(e.has_number(99.9));
        let pct = e.numbers.iter().find(|n| n.value == 99.9).unwrap();
        assert_eq!(pct.label.as_deref(), Some("%"));
        assert_eq!(e.max_number(), Some(1500.0));
    }

    #[test]
    fn test_stopword_is_not_a_label() {
        let e = extract_entities("between 10 and 20");
        assert_eq!(e.numbers.len(), 2);
        assert!(e.numbers[0].label.is_none());
        assert_eq!(e.numbers[0].raw, "10");
    }

    #[test]
    fn test_email_domain_not_double_counted() {
        let e = extract_entities("Forward admin@contoso.com mail for fabrikam.co.uk");
        assert_eq!(e.emails, vec!["admin@contoso.com"]);
        assert_eq!(e.domains, vec!["fabrikam.co.uk"]);
    }

    #[test]
    fn test_digits_inside_domain_are_not_numbers() {
        let e = extract_entities("point mail2.example.com at the new server");
        assert_eq!(e.domains, vec!["mail2.example.com"]);
        assert!(e.numbers.is_empty());
    }

    #[test]
    fn test_domains_deduplicated_in_order() {
        let e = extract_entities("example.org then contoso.com then example.org");
        assert_eq!(e.domains, vec!["example.org", "contoso.com"]);
    }

    #[test]
    fn test_empty_query() {
        let e = extract_entities("");
        assert!(e.is_empty());
        assert_eq!(e.max_number(), None);
    }
}
