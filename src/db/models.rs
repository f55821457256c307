use chrono::{DateTime, Utc};

/// Level stored for every access row.
pub const ACCESS_LEVEL: &str = "INFO";

/// One handled HTTP request, as persisted in `api_logs`.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiLogRow {
    pub timestamp: DateTime<Utc>,
    pub level: &'static str,
    pub message: String,
    pub method: Option<String>,
    pub path: Option<String>,
    pub status_code: Option<i32>,
    pub ip_address: Option<String>,
    /// Seconds spent producing the response.
    pub processing_time: Option<f64>,
}

impl ApiLogRow {
    /// Builds an [`ACCESS_LEVEL`] row with the access-log style message
    /// `{ip} - "{METHOD} {path} HTTP/1.1" {status}`.
    pub fn access(
        method: &str,
        path: &str,
        status_code: u16,
        ip_address: Option<String>,
        processing_time: f64,
    ) -> Self {
        let client = ip_address.as_deref().unwrap_or("None");
        let message = format!("{client} - \"{method} {path} HTTP/1.1\" {status_code}");
        Self {
            timestamp: Utc::now(),
            level: ACCESS_LEVEL,
            message,
            method: Some(method.to_string()),
            path: Some(path.to_string()),
            status_code: Some(i32::from(status_code)),
            ip_address,
            processing_time: Some(processing_time),
        }
    }
}
