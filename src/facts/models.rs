//! Data models for profile facts

use crate::error::{Result, TwinError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

/// One retrievable unit of knowledge about the subject
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactChunk {
    #[serde(default)]
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl FactChunk {
    /// Create a chunk with empty classification metadata
    pub fn new(id: impl Into<String>, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            content: content.into(),
            kind: String::new(),
            category: String::new(),
            tags: Vec::new(),
        }
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Text embedded by the vector index
    pub fn embedding_text(&self) -> String {
        format!("{}: {}", self.title, self.content)
    }

    /// Whether the chunk carries anything worth sending to the generator
    pub fn has_content(&self) -> bool {
        !self.content.is_empty()
    }

    /// Metadata stored next to the vector
    pub fn metadata(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("title".to_string(), Value::String(self.title.clone()));
        map.insert("content".to_string(), Value::String(self.content.clone()));
        map.insert("type".to_string(), Value::String(self.kind.clone()));
        map.insert("category".to_string(), Value::String(self.category.clone()));
        map.insert(
            "tags".to_string(),
            Value::Array(self.tags.iter().cloned().map(Value::String).collect()),
        );
        map
    }

    /// Rebuild a chunk from vector metadata; absent fields become defaults
    pub fn from_metadata(id: impl Into<String>, metadata: &Map<String, Value>) -> Self {
        let text = |key: &str| {
            metadata
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        let title = metadata
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or("Information")
            .to_string();

        Self {
            id: id.into(),
            title,
            content: text("content"),
            kind: text("type"),
            category: text("category"),
            tags: parse_tags(metadata.get("tags")),
        }
    }
}

/// Tags are stored as an array, but older loads wrote a stringified list
fn parse_tags(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(String::from)
            .collect(),
        Some(Value::String(s)) => s
            .trim_matches(|c| c == '[' || c == ']')
            .split(',')
            .map(|t| t.trim().trim_matches(|c| c == '\'' || c == '"').to_string())
            .filter(|t| !t.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

/// Chunk as it appears in the profile file
#[derive(Debug, Clone, Deserialize)]
struct ProfileChunk {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    tags: Option<Vec<String>>,
    #[serde(default)]
    metadata: Option<ProfileChunkMetadata>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ProfileChunkMetadata {
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    tags: Option<Vec<String>>,
}

/// Profile document holding the subject's facts
#[derive(Debug, Clone)]
pub struct ProfileData {
    pub chunks: Vec<FactChunk>,
}

#[derive(Deserialize)]
struct ProfileFile {
    content_chunks: Option<Vec<ProfileChunk>>,
}

impl ProfileData {
    /// Parse a profile document; `content_chunks` is required
    pub fn from_json(source: &str) -> Result<Self> {
        let file: ProfileFile = serde_json::from_str(source)?;
        let raw = file.content_chunks.ok_or_else(|| {
            TwinError::Configuration("No content_chunks found in profile data".to_string())
        })?;

        let chunks = raw
            .into_iter()
            .enumerate()
            .map(|(i, chunk)| {
                let metadata = chunk.metadata.unwrap_or_default();
                FactChunk {
                    id: chunk
                        .id
                        .filter(|id| !id.is_empty())
                        .unwrap_or_else(|| format!("chunk:{}", i)),
                    title: chunk.title,
                    content: chunk.content,
                    kind: chunk.kind,
                    category: chunk.category.or(metadata.category).unwrap_or_default(),
                    tags: chunk.tags.or(metadata.tags).unwrap_or_default(),
                }
            })
            .collect();

        Ok(Self { chunks })
    }

    /// Read and parse a profile file
    pub async fn load(path: &Path) -> Result<Self> {
        let source = tokio::fs::read_to_string(path).await.map_err(|e| {
            TwinError::Configuration(format!("Failed to read profile {}: {}", path.display(), e))
        })?;
        Self::from_json(&source)
    }
}
