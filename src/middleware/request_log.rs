use std::time::Instant;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::{error, info};

use crate::db::models::ApiLogRow;
use crate::middleware::client_ip;
use crate::server::AppState;

/// Times the request, queues one `api_logs` row and returns the response untouched.
///
/// The row is written on a separate task so a slow or unreachable store never
/// delays the client. A failing store is reported and otherwise ignored.
pub async fn log_request(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let client = client_ip(&request).map(|ip| ip.to_string());

    let response = next.run(request).await;

    let elapsed = start.elapsed();
    let status = response.status().as_u16();
    info!(
        method = %method,
        path = %path,
        status,
        client = client.as_deref().unwrap_or("-"),
        duration_ms = elapsed.as_millis(),
        "request completed"
    );

    let row = ApiLogRow::access(&method, &path, status, client, elapsed.as_secs_f64());
    let store = state.log_store.clone();
    tokio::spawn(async move {
        if let Err(err) = store.insert_log(&row).await {
            error!(error = %err, method = %method, path = %path, "failed to write request log row");
        }
    });

    response
}
