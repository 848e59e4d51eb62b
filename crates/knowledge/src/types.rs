//! Core data types for the knowledge layer.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A scalar metadata value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u64> for MetadataValue {
    fn from(value: u64) -> Self {
        Self::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// String-keyed scalar metadata. Ordered so serialized output is stable.
pub type Metadata = BTreeMap<String, MetadataValue>;

/// Normalized text produced by the loader from one file (or one page of it).
///
/// Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentUnit {
    id: String,
    text: String,
    metadata: Metadata,
}

impl DocumentUnit {
    pub fn new(id: impl Into<String>, text: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            metadata,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}

/// An indexed chunk of a document: the atomic retrieval unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    /// Unique fragment identifier
    pub id: String,

    /// Document this fragment was cut from
    pub document_id: String,

    /// Ingestion order across the whole index; ties in ranking resolve by it
    pub position: u32,

    pub text: String,

    pub embedding: Vec<f32>,

    /// Inherited from the document
    pub metadata: Metadata,
}

/// A retrieved fragment with its relevance score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceFragment {
    pub text: String,

    /// Relevance in [0, 1]
    pub score: f32,

    pub metadata: Metadata,
}

/// Outcome of one query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub answer: String,

    /// Ordered by non-increasing score
    pub sources: Vec<SourceFragment>,

    /// The question actually used for retrieval (condensed when history exists)
    pub retrieval_query: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_value_serialization() {
        let mut metadata = Metadata::new();
        metadata.insert("file_name".to_string(), "lyft_2021.pdf".into());
        metadata.insert("file_size".to_string(), 2048u64.into());
        metadata.insert("page_label".to_string(), "3".into());

        let json = serde_json::to_string(&metadata).unwrap();
        assert_eq!(
            json,
            r#"{"file_name":"lyft_2021.pdf","file_size":2048,"page_label":"3"}"#
        );

        let back: Metadata = serde_json::from_str(&json).unwrap();
        assert_eq!(back["file_size"], MetadataValue::Int(2048));
    }

    #[test]
    fn test_metadata_display() {
        assert_eq!(MetadataValue::from("abc").to_string(), "abc");
        assert_eq!(MetadataValue::from(true).to_string(), "true");
        assert_eq!(MetadataValue::from(7i64).to_string(), "7");
    }
}
