use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use super::Inspector;

/// axum middleware publishing body fields as request headers.
///
/// Install with `axum::middleware::from_fn_with_state(inspector, inspect_headers)`.
/// The next stage always runs unless the request body itself cannot be read.
pub async fn inspect_headers(
    State(inspector): State<Arc<Inspector>>,
    request: Request,
    next: Next,
) -> Response {
    match inspector.inspect(request).await {
        Ok(request) => next.run(request).await,
        Err(err) => {
            tracing::error!(error = %err, "failed to read request body for inspection");
            err.into_response()
        }
    }
}
