//! Exact-match metadata filters applied before ranking.

use crate::types::{Metadata, MetadataValue};
use serde::{Deserialize, Serialize};

/// All filters must match for a fragment to be a retrieval candidate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataFilters {
    exact: Vec<(String, MetadataValue)>,
}

impl MetadataFilters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_exact(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.exact.push((key.into(), value.into()));
        self
    }

    /// Parse `key=value` pairs as given on the command line.
    ///
    /// Values that parse as an integer or boolean are typed accordingly, but
    /// still match metadata stored as text with the same spelling.
    pub fn parse_pairs<'a>(pairs: impl IntoIterator<Item = &'a str>) -> Option<Self> {
        let mut filters = Self::new();
        for pair in pairs {
            let (key, raw) = pair.split_once('=')?;
            let value = if let Ok(i) = raw.parse::<i64>() {
                MetadataValue::Int(i)
            } else if let Ok(b) = raw.parse::<bool>() {
                MetadataValue::Bool(b)
            } else {
                MetadataValue::Text(raw.to_string())
            };
            filters = filters.with_exact(key.trim(), value);
        }
        Some(filters)
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty()
    }

    pub fn matches(&self, metadata: &Metadata) -> bool {
        self.exact.iter().all(|(key, expected)| {
            metadata
                .get(key)
                .is_some_and(|actual| value_matches(actual, expected))
        })
    }
}

/// Equal values match; a text value also matches any value that prints the same.
fn value_matches(actual: &MetadataValue, expected: &MetadataValue) -> bool {
    match (actual, expected) {
        (MetadataValue::Text(a), MetadataValue::Text(b)) => a == b,
        (MetadataValue::Text(_), _) | (_, MetadataValue::Text(_)) => {
            actual.to_string() == expected.to_string()
        }
        _ => actual == expected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> Metadata {
        let mut m = Metadata::new();
        m.insert("file_name".to_string(), "paul_graham_essay.txt".into());
        m.insert("page_label".to_string(), "2".into());
        m.insert("file_size".to_string(), 75042u64.into());
        m
    }

    #[test]
    fn test_empty_filters_match_everything() {
        assert!(MetadataFilters::new().matches(&metadata()));
        assert!(MetadataFilters::new().is_empty());
    }

    #[test]
    fn test_exact_match() {
        let filters = MetadataFilters::new().with_exact("file_name", "paul_graham_essay.txt");
        assert!(filters.matches(&metadata()));

        let filters = filters.with_exact("page_label", "3");
        assert!(!filters.matches(&metadata()));
    }

    #[test]
    fn test_missing_key_does_not_match() {
        let filters = MetadataFilters::new().with_exact("author", "pg");
        assert!(!filters.matches(&metadata()));
    }

    #[test]
    fn test_parse_pairs() {
        let filters = MetadataFilters::parse_pairs(["file_size=75042", "page_label=2"]).unwrap();
        assert!(filters.matches(&metadata()));

        let filters = MetadataFilters::parse_pairs(["page_label=3"]).unwrap();
        assert!(!filters.matches(&metadata()));

        assert!(MetadataFilters::parse_pairs(["no-equals-sign"]).is_none());
    }

    #[test]
    fn test_typed_values_match_their_text_form() {
        let mut m = metadata();
        m.insert("draft".to_string(), "true".into());

        assert!(MetadataFilters::new().with_exact("page_label", 2i64).matches(&m));
        assert!(MetadataFilters::new().with_exact("draft", true).matches(&m));
        assert!(MetadataFilters::new().with_exact("file_size", "75042").matches(&m));
        assert!(!MetadataFilters::new().with_exact("file_size", 75041i64).matches(&m));
    }
}
