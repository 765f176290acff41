pub mod classify;
pub mod extract;
pub mod fields;
pub mod middleware;
pub mod payload;

use axum::body::{self, Body};
use axum::http::request::Parts;
use axum::http::Request;

use crate::error::InspectError;
use crate::observability::log_extraction;

pub use classify::{Classifier, Schema, SchemaSet, UriPattern};
pub use extract::{extract, parse_failure_header, Diagnostic, Extraction};
pub use fields::{HeaderMapping, LogicalField, PARSE_FAILURE_HEADER};

/// Construction-time settings for an [`Inspector`].
#[derive(Debug, Clone)]
pub struct InspectorConfig {
    /// `None` selects the built-in header names.
    pub request_fields: Option<Vec<(String, String)>>,
    pub chat_completion_uri_regex: String,
    /// `None` matches only the batch creation endpoint.
    pub batch_uri_prefix: Option<String>,
    /// `None` reads bodies of any size.
    pub max_body_bytes: Option<usize>,
}

impl Default for InspectorConfig {
    fn default() -> Self {
        Self {
            request_fields: None,
            chat_completion_uri_regex: classify::DEFAULT_CHAT_COMPLETION_URI_REGEX.to_string(),
            batch_uri_prefix: None,
            max_body_bytes: None,
        }
    }
}

/// Request body inspector. Immutable once built; share it through `Arc`.
#[derive(Debug, Clone)]
pub struct Inspector {
    mapping: HeaderMapping,
    classifier: Classifier,
    max_body_bytes: Option<usize>,
}

impl Inspector {
    /// Build an inspector from its configuration.
    ///
    /// A URI regex that does not compile is logged and never matches; it is
    /// not a construction error.
    ///
    /// # Errors
    ///
    /// Returns [`InspectError::InvalidHeaderName`] when a mapped header name is
    /// not a legal HTTP header name.
    pub fn new(config: InspectorConfig) -> Result<Self, InspectError> {
        let mapping = match config.request_fields {
            Some(entries) => HeaderMapping::from_entries(entries)?,
            None => HeaderMapping::default(),
        };
        let batch = match config.batch_uri_prefix.as_deref() {
            Some(prefix) => UriPattern::prefix(prefix),
            None => UriPattern::exact(classify::DEFAULT_BATCH_URI),
        };
        let classifier = Classifier::new(UriPattern::regex(&config.chat_completion_uri_regex), batch);
        Ok(Self {
            mapping,
            classifier,
            max_body_bytes: config.max_body_bytes,
        })
    }

    #[must_use]
    pub fn mapping(&self) -> &HeaderMapping {
        &self.mapping
    }

    #[must_use]
    pub fn classify(&self, parts: &Parts) -> SchemaSet {
        self.classifier.classify(&parts.method, parts.uri.path())
    }

    /// Run the extractor once per schema, in schema order.
    #[must_use]
    pub fn extract(&self, body: &[u8], schemas: SchemaSet) -> Vec<Extraction> {
        schemas
            .iter()
            .map(|schema| extract(body, schema, &self.mapping))
            .collect()
    }

    /// Inspect a request and return it with headers attached and its body
    /// replaced by a replayable copy of the original bytes.
    ///
    /// Requests that match no schema are returned untouched.
    ///
    /// # Errors
    ///
    /// Returns [`InspectError::BodyRead`] when the body stream fails, or
    /// [`InspectError::BodyTooLarge`] when a configured limit is exceeded.
    pub async fn inspect(&self, request: Request<Body>) -> Result<Request<Body>, InspectError> {
        let (mut parts, body) = request.into_parts();
        let schemas = self.classify(&parts);
        if schemas.is_empty() {
            tracing::debug!(method = %parts.method, path = parts.uri.path(), "request not inspected");
            return Ok(Request::from_parts(parts, body));
        }

        let limit = self.max_body_bytes.unwrap_or(usize::MAX);
        let bytes = body::to_bytes(body, limit).await.map_err(|err| {
            if is_length_limit_error(&err) {
                InspectError::BodyTooLarge(limit)
            } else {
                InspectError::BodyRead(err.to_string())
            }
        })?;

        let path = parts.uri.path();
        for schema in schemas.iter() {
            let extraction = extract(&bytes, schema, &self.mapping);
            log_extraction(path, schema, &extraction);
            extraction.apply(&mut parts.headers);
        }

        Ok(Request::from_parts(parts, Body::from(bytes)))
    }
}

fn is_length_limit_error(err: &axum::Error) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(current) = source {
        if current.is::<http_body_util::LengthLimitError>() {
            return true;
        }
        source = current.source();
    }
    false
}
