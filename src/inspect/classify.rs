use http::Method;
use regex_lite::Regex;

use crate::error::InspectError;

pub const DEFAULT_CHAT_COMPLETION_URI_REGEX: &str = "/v1/chat/completions";
/// Batch job creation endpoint; sub-resources such as `/v1/batches/{id}/cancel` are excluded.
pub const DEFAULT_BATCH_URI: &str = "/v1/batches";

/// Payload shape expected for a classified request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schema {
    ChatCompletion,
    Batch,
}

impl Schema {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Schema::ChatCompletion => "chat_completion",
            Schema::Batch => "batch",
        }
    }
}

/// Schemas that apply to one request, always iterated chat completion first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchemaSet {
    chat_completion: bool,
    batch: bool,
}

impl SchemaSet {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, schema: Schema) -> Self {
        match schema {
            Schema::ChatCompletion => self.chat_completion = true,
            Schema::Batch => self.batch = true,
        }
        self
    }

    #[must_use]
    pub fn contains(&self, schema: Schema) -> bool {
        match schema {
            Schema::ChatCompletion => self.chat_completion,
            Schema::Batch => self.batch,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.chat_completion && !self.batch
    }

    pub fn iter(&self) -> impl Iterator<Item = Schema> + '_ {
        [Schema::ChatCompletion, Schema::Batch]
            .into_iter()
            .filter(|schema| self.contains(*schema))
    }
}

/// A configured request path pattern.
#[derive(Debug, Clone)]
pub enum UriPattern {
    /// Unanchored, case-sensitive regular expression.
    Regex(Regex),
    /// Literal path prefix.
    Prefix(String),
    /// Literal full path.
    Exact(String),
    /// A regex that failed to compile; never matches.
    Invalid { pattern: String, reason: String },
}

impl UriPattern {
    /// Compile `pattern` as a regex, keeping a failed compile as
    /// [`UriPattern::Invalid`] instead of failing construction.
    #[must_use]
    pub fn regex(pattern: &str) -> Self {
        match Regex::new(pattern) {
            Ok(regex) => UriPattern::Regex(regex),
            Err(err) => {
                tracing::warn!(
                    pattern,
                    error = %err,
                    "request URI pattern does not compile, requests will not match it"
                );
                UriPattern::Invalid {
                    pattern: pattern.to_string(),
                    reason: err.to_string(),
                }
            }
        }
    }

    #[must_use]
    pub fn prefix(prefix: &str) -> Self {
        UriPattern::Prefix(prefix.to_string())
    }

    #[must_use]
    pub fn exact(path: &str) -> Self {
        UriPattern::Exact(path.to_string())
    }

    /// Test a request path against the pattern.
    ///
    /// # Errors
    ///
    /// Returns [`InspectError::InvalidPattern`] when the pattern never compiled.
    pub fn matches(&self, path: &str) -> Result<bool, InspectError> {
        match self {
            UriPattern::Regex(regex) => Ok(regex.is_match(path)),
            UriPattern::Prefix(prefix) => Ok(path.starts_with(prefix.as_str())),
            UriPattern::Exact(exact) => Ok(path == exact),
            UriPattern::Invalid { pattern, reason } => Err(InspectError::InvalidPattern {
                pattern: pattern.clone(),
                reason: reason.clone(),
            }),
        }
    }
}

/// Decides which schemas, if any, apply to a request.
#[derive(Debug, Clone)]
pub struct Classifier {
    chat_completion: UriPattern,
    batch: UriPattern,
}

impl Classifier {
    #[must_use]
    pub fn new(chat_completion: UriPattern, batch: UriPattern) -> Self {
        Self {
            chat_completion,
            batch,
        }
    }

    /// Classify a request by method and URI path. The path must not carry
    /// the query string.
    #[must_use]
    pub fn classify(&self, method: &Method, path: &str) -> SchemaSet {
        if method != Method::POST {
            return SchemaSet::empty();
        }

        let mut schemas = SchemaSet::empty();
        if pattern_matches(&self.chat_completion, Schema::ChatCompletion, path) {
            schemas = schemas.with(Schema::ChatCompletion);
        }
        if pattern_matches(&self.batch, Schema::Batch, path) {
            schemas = schemas.with(Schema::Batch);
        }
        schemas
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(
            UriPattern::regex(DEFAULT_CHAT_COMPLETION_URI_REGEX),
            UriPattern::exact(DEFAULT_BATCH_URI),
        )
    }
}

fn pattern_matches(pattern: &UriPattern, schema: Schema, path: &str) -> bool {
    match pattern.matches(path) {
        Ok(matched) => matched,
        Err(err) => {
            tracing::warn!(schema = schema.as_str(), path, error = %err, "error while matching request URI");
            false
        }
    }
}
