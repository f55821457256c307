use std::net::{IpAddr, Ipv4Addr};
use std::num::NonZeroU32;
use std::time::Duration;

use axum::{
    Json,
    extract::{Request, State},
    http::{HeaderValue, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::clock::{Clock, DefaultClock};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use serde_json::json;
use thiserror::Error;
use tracing::warn;

use crate::middleware::client_ip;
use crate::server::AppState;

/// Fixed per-minute quota keyed by client address.
pub struct ClientRateLimiter {
    limiter: DefaultKeyedRateLimiter<IpAddr>,
    per_minute: NonZeroU32,
}

#[derive(Debug, Error)]
#[error("Rate limit exceeded: {limit} per 1 minute")]
pub struct RateLimitExceeded {
    pub limit: u32,
    pub retry_after: Duration,
}

impl ClientRateLimiter {
    /// Returns `None` when `per_minute` is zero.
    pub fn per_minute(per_minute: u32) -> Option<Self> {
        let per_minute = NonZeroU32::new(per_minute)?;
        Some(Self {
            limiter: RateLimiter::keyed(Quota::per_minute(per_minute)),
            per_minute,
        })
    }

    pub fn check(&self, client: IpAddr) -> Result<(), RateLimitExceeded> {
        self.limiter.check_key(&client).map_err(|not_until| {
            let retry_after = not_until.wait_time_from(DefaultClock::default().now());
            RateLimitExceeded {
                limit: self.per_minute.get(),
                retry_after,
            }
        })
    }
}

impl IntoResponse for RateLimitExceeded {
    fn into_response(self) -> Response {
        let retry_after_secs = self.retry_after.as_secs().max(1);
        let mut response = (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({ "error": self.to_string() })),
        )
            .into_response();
        if let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string()) {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }
        response
    }
}

/// Rejects over-quota clients with 429; every other response passes through untouched.
pub async fn rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, RateLimitExceeded> {
    let client = client_ip(&request).unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

    if let Err(err) = state.limiter.check(client) {
        warn!(
            client = %client,
            path = %request.uri().path(),
            retry_after_ms = err.retry_after.as_millis(),
            "rate limit exceeded"
        );
        return Err(err);
    }

    Ok(next.run(request).await)
}
