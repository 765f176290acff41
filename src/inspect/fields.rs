use std::fmt;

use http::HeaderName;
use rustc_hash::FxHashMap;

use crate::error::InspectError;

/// Header carrying the reason a matched body could not be inspected.
pub const PARSE_FAILURE_HEADER: &str = "X-OpenAI-Parse-Failure";

/// Request attribute that can be republished as a header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalField {
    Model,
    FrequencyPenalty,
    User,
    Temperature,
    TopP,
    MaxCompletionTokens,
    PresencePenalty,
    Logprobs,
    TopLogprobs,
    ToolChoice,
    Stream,
    N,
    Seed,
    ServiceTier,
    ReasoningEffort,
    Store,
    CompletionWindow,
    Endpoint,
}

impl LogicalField {
    pub const ALL: [LogicalField; 18] = [
        LogicalField::Model,
        LogicalField::FrequencyPenalty,
        LogicalField::User,
        LogicalField::Temperature,
        LogicalField::TopP,
        LogicalField::MaxCompletionTokens,
        LogicalField::PresencePenalty,
        LogicalField::Logprobs,
        LogicalField::TopLogprobs,
        LogicalField::ToolChoice,
        LogicalField::Stream,
        LogicalField::N,
        LogicalField::Seed,
        LogicalField::ServiceTier,
        LogicalField::ReasoningEffort,
        LogicalField::Store,
        LogicalField::CompletionWindow,
        LogicalField::Endpoint,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            LogicalField::Model => "model",
            LogicalField::FrequencyPenalty => "frequency_penalty",
            LogicalField::User => "user",
            LogicalField::Temperature => "temperature",
            LogicalField::TopP => "top_p",
            LogicalField::MaxCompletionTokens => "max_completion_tokens",
            LogicalField::PresencePenalty => "presence_penalty",
            LogicalField::Logprobs => "logprobs",
            LogicalField::TopLogprobs => "top_logprobs",
            LogicalField::ToolChoice => "tool_choice",
            LogicalField::Stream => "stream",
            LogicalField::N => "n",
            LogicalField::Seed => "seed",
            LogicalField::ServiceTier => "service_tier",
            LogicalField::ReasoningEffort => "reasoning_effort",
            LogicalField::Store => "store",
            LogicalField::CompletionWindow => "completion_window",
            LogicalField::Endpoint => "endpoint",
        }
    }

    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.as_str() == name)
    }

    /// Header name used when the caller configures no mapping at all.
    /// Fields without a default are only emitted when mapped explicitly.
    #[must_use]
    pub fn default_header(self) -> Option<&'static str> {
        let header = match self {
            LogicalField::Model => "X-OpenAI-Model",
            LogicalField::FrequencyPenalty => "X-OpenAI-Frequency-Penalty",
            LogicalField::User => "X-OpenAI-User",
            LogicalField::Temperature => "X-OpenAI-Temperature",
            LogicalField::TopP => "X-OpenAI-Top-P",
            LogicalField::MaxCompletionTokens => "X-OpenAI-Max-Completion-Tokens",
            LogicalField::PresencePenalty => "X-OpenAI-Presence-Penalty",
            LogicalField::Logprobs => "X-OpenAI-Logprobs",
            LogicalField::TopLogprobs => "X-OpenAI-Top-Logprobs",
            LogicalField::ToolChoice => "X-OpenAI-Tool-Choice",
            LogicalField::Stream => "X-OpenAI-Stream",
            LogicalField::CompletionWindow => "X-OpenAI-Completion-Window",
            LogicalField::Endpoint => "X-OpenAI-Endpoint",
            LogicalField::N
            | LogicalField::Seed
            | LogicalField::ServiceTier
            | LogicalField::ReasoningEffort
            | LogicalField::Store => return None,
        };
        Some(header)
    }
}

impl fmt::Display for LogicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable mapping from logical field to the header it is published as.
#[derive(Debug, Clone)]
pub struct HeaderMapping {
    headers: FxHashMap<LogicalField, HeaderName>,
}

impl HeaderMapping {
    /// Build a mapping from `(logical field, header name)` pairs.
    ///
    /// Unknown logical names are ignored. A repeated logical name keeps the
    /// last header name given for it.
    ///
    /// # Errors
    ///
    /// Returns [`InspectError::InvalidHeaderName`] when a header name is not a
    /// legal HTTP header name.
    pub fn from_entries<I, K, V>(entries: I) -> Result<Self, InspectError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut headers = FxHashMap::default();
        for (key, value) in entries {
            let key = key.as_ref();
            let Some(field) = LogicalField::parse(key) else {
                tracing::warn!(field = key, "ignoring unknown request field in header mapping");
                continue;
            };
            let name = HeaderName::from_bytes(value.as_ref().as_bytes()).map_err(|_| {
                InspectError::InvalidHeaderName {
                    field: key.to_string(),
                    name: value.as_ref().to_string(),
                }
            })?;
            headers.insert(field, name);
        }
        Ok(Self { headers })
    }

    /// A mapping with no entries; the extractor then emits no field headers.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            headers: FxHashMap::default(),
        }
    }

    #[must_use]
    pub fn get(&self, field: LogicalField) -> Option<&HeaderName> {
        self.headers.get(&field)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.headers.len()
    }
}

impl Default for HeaderMapping {
    fn default() -> Self {
        let headers = LogicalField::ALL
            .into_iter()
            .filter_map(|field| {
                let name = HeaderName::from_bytes(field.default_header()?.as_bytes()).ok()?;
                Some((field, name))
            })
            .collect();
        Self { headers }
    }
}
