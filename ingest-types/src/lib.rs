//! Contract between the gitdigest web server and the ingestion tool that
//! turns a repository into a summary, a directory tree and the file content.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MEDIA_TYPE_TEXT: &str = "text/plain";
pub const MEDIA_TYPE_JSON: &str = "application/json";

/// Representation the ingestion tool should produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    Text,
    Json,
}

impl ResponseFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseFormat::Text => "text",
            ResponseFormat::Json => "json",
        }
    }

    pub fn media_type(&self) -> &'static str {
        match self {
            ResponseFormat::Text => MEDIA_TYPE_TEXT,
            ResponseFormat::Json => MEDIA_TYPE_JSON,
        }
    }
}

impl fmt::Display for ResponseFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResponseFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(ResponseFormat::Text),
            "json" => Ok(ResponseFormat::Json),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternType {
    Include,
    #[default]
    Exclude,
}

impl PatternType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternType::Include => "include",
            PatternType::Exclude => "exclude",
        }
    }
}

impl FromStr for PatternType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "include" => Ok(PatternType::Include),
            "exclude" => Ok(PatternType::Exclude),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestRequest {
    /// Repository path as it appeared in the URL, e.g. `octocat/Hello-World`.
    pub source: String,
    /// Upper bound on the size of a single file, in bytes.
    pub max_file_size: u64,
    pub pattern_type: PatternType,
    pub pattern: String,
    pub response_format: ResponseFormat,
    pub ingest_id: String,
}

impl IngestRequest {
    /// Splits `source` into owner and repository, if it has that shape.
    pub fn owner_and_repo(&self) -> Option<(&str, &str)> {
        let (owner, repo) = self.source.trim_matches('/').split_once('/')?;
        if owner.is_empty() || repo.is_empty() || repo.contains('/') {
            return None;
        }
        Some((owner, repo))
    }
}

/// What the ingestion tool hands back: a status, a media type and an opaque body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestResponse {
    pub status_code: u16,
    pub media_type: String,
    pub body: Vec<u8>,
}

impl IngestResponse {
    pub fn ok(format: ResponseFormat, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status_code: 200,
            media_type: format.media_type().to_string(),
            body: body.into(),
        }
    }

    pub fn is_json(&self) -> bool {
        self.media_type.starts_with(MEDIA_TYPE_JSON)
    }
}

/// Body of a JSON-format ingestion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestDigest {
    pub summary: String,
    pub tree: String,
    pub content: String,
    pub ingest_id: String,
}

impl IngestDigest {
    /// Plain-text rendering used for text responses and the downloadable digest.
    pub fn to_text(&self) -> String {
        format!("{}\n\n{}\n\n{}", self.summary, self.tree, self.content)
    }
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("invalid repository source: {0}")]
    InvalidSource(String),
    #[error("ingestion failed with status {status:?}: {stderr}")]
    Failed { status: Option<i32>, stderr: String },
    #[error("ingestion timed out after {0:?}")]
    TimedOut(Duration),
    #[error("ingestion produced malformed output: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("ingestion i/o error: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait Ingestor: Send + Sync + 'static {
    async fn process_query(&self, request: IngestRequest) -> Result<IngestResponse, IngestError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(source: &str) -> IngestRequest {
        IngestRequest {
            source: source.to_string(),
            max_file_size: 1024,
            pattern_type: PatternType::default(),
            pattern: String::new(),
            response_format: ResponseFormat::Text,
            ingest_id: "id".to_string(),
        }
    }

    #[test]
    fn parses_response_format_case_insensitively() {
        assert_eq!("JSON".parse::<ResponseFormat>(), Ok(ResponseFormat::Json));
        assert_eq!(" text ".parse::<ResponseFormat>(), Ok(ResponseFormat::Text));
        assert!("html".parse::<ResponseFormat>().is_err());
    }

    #[test]
    fn splits_owner_and_repo() {
        assert_eq!(
            request("octocat/Hello-World").owner_and_repo(),
            Some(("octocat", "Hello-World"))
        );
        assert_eq!(request("/a/b/").owner_and_repo(), Some(("a", "b")));
        assert_eq!(request("lonely").owner_and_repo(), None);
        assert_eq!(request("a/b/c").owner_and_repo(), None);
    }

    #[test]
    fn digest_text_joins_sections() {
        let digest = IngestDigest {
            summary: "s".into(),
            tree: "t".into(),
            content: "c".into(),
            ingest_id: "x".into(),
        };
        assert_eq!(digest.to_text(), "s\n\nt\n\nc");
    }

    #[test]
    fn json_media_type_detection_ignores_parameters() {
        let mut response = IngestResponse::ok(ResponseFormat::Json, b"{}".to_vec());
        assert!(response.is_json());
        response.media_type = "application/json; charset=utf-8".into();
        assert!(response.is_json());
        response.media_type = MEDIA_TYPE_TEXT.into();
        assert!(!response.is_json());
    }
}
