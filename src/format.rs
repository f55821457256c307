use axum::http::{HeaderMap, header};
use gitdigest_ingest_types::{MEDIA_TYPE_JSON, ResponseFormat};
use tracing::debug;

/// Tokens whose presence in a `User-Agent` marks the request as coming from a browser.
pub const BROWSER_IDENTIFIERS: [&str; 7] = [
    "mozilla", "chrome", "safari", "edge", "firefox", "webkit", "opera",
];

/// Shape of the response for an ingestion request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    Html,
    Text,
    Json,
}

impl ResponseShape {
    /// Format to request from the ingestion tool. HTML pages are rendered from the JSON digest.
    pub fn ingest_format(&self) -> ResponseFormat {
        match self {
            ResponseShape::Text => ResponseFormat::Text,
            ResponseShape::Html | ResponseShape::Json => ResponseFormat::Json,
        }
    }
}

/// Substring match against [`BROWSER_IDENTIFIERS`].
///
/// Command-line tools that put `Mozilla` in their user agent for compatibility
/// are classified as browsers too.
pub fn is_browser(user_agent: &str) -> bool {
    let user_agent = user_agent.to_lowercase();
    BROWSER_IDENTIFIERS
        .iter()
        .any(|identifier| user_agent.contains(identifier))
}

/// Picks the response shape from the `format` query value, the `Accept` header
/// and the user agent. Browsers always get HTML.
pub fn negotiate(
    format: Option<&str>,
    accept: Option<&str>,
    user_agent: Option<&str>,
) -> ResponseShape {
    if user_agent.is_some_and(is_browser) {
        return ResponseShape::Html;
    }

    let explicit = format.and_then(|value| value.parse::<ResponseFormat>().ok());
    let shape = match explicit {
        Some(ResponseFormat::Json) => ResponseShape::Json,
        Some(ResponseFormat::Text) => ResponseShape::Text,
        None if accepts_json(accept) => ResponseShape::Json,
        None => ResponseShape::Text,
    };

    debug!(?format, ?accept, ?shape, "negotiated response format");
    shape
}

pub fn negotiate_from_headers(headers: &HeaderMap, format: Option<&str>) -> ResponseShape {
    let accept = headers
        .get(header::ACCEPT)
        .and_then(|value| value.to_str().ok());
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok());
    negotiate(format, accept, user_agent)
}

fn accepts_json(accept: Option<&str>) -> bool {
    accept.is_some_and(|value| value.to_ascii_lowercase().contains(MEDIA_TYPE_JSON))
}
