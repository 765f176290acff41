use axum::response::{IntoResponse, Response};
use http::StatusCode;

/// Errors raised while building or running the body inspector.
#[derive(Debug, thiserror::Error)]
pub enum InspectError {
    #[error("Invalid header name '{name}' for field '{field}'")]
    InvalidHeaderName { field: String, name: String },
    #[error("Invalid request URI pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
    #[error("Failed to read request body: {0}")]
    BodyRead(String),
    #[error("Request body exceeds {0} bytes")]
    BodyTooLarge(usize),
}

/// Errors raised by the forwarding proxy.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("Upstream error: {0}")]
    Upstream(String),
    #[error(transparent)]
    Inspect(#[from] InspectError),
}

impl InspectError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            InspectError::BodyTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            InspectError::InvalidHeaderName { .. }
            | InspectError::InvalidPattern { .. }
            | InspectError::BodyRead(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl ProxyError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ProxyError::Inspect(err) => err.status(),
        }
    }
}

impl IntoResponse for InspectError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_read_maps_to_internal_error() {
        let err = InspectError::BodyRead("connection reset".to_string());
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            err.to_string(),
            "Failed to read request body: connection reset"
        );
    }

    #[test]
    fn test_proxy_error_status() {
        assert_eq!(
            ProxyError::Upstream("refused".to_string()).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ProxyError::from(InspectError::BodyTooLarge(16)).status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
    }
}
