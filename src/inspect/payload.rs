use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};

/// Decode a JSON body into `T`.
///
/// The body is first parsed into a [`serde_json::Value`] so that a repeated
/// key keeps its last occurrence, then shaped into `T`. Unknown keys are
/// ignored; a known key of the wrong type fails the decode.
///
/// # Errors
///
/// Returns the decoder error for malformed JSON or a schema mismatch.
pub fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, serde_json::Error> {
    let value: serde_json::Value = serde_json::from_slice(body)?;
    serde_json::from_value(value)
}

/// Treat an explicit `null` the same as a missing key.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Chat completion request body.
///
/// Every optional field is `Option<T>`; `None` means the key was absent or
/// `null`, so `stream: false` and a missing `stream` stay distinct.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ChatCompletionRequest {
    #[serde(default, deserialize_with = "null_as_default")]
    pub model: String,
    pub messages: Option<serde_json::Value>,
    pub audio: Option<Audio>,
    pub frequency_penalty: Option<f64>,
    pub max_completion_tokens: Option<f64>,
    pub metadata: Option<HashMap<String, Option<String>>>,
    pub modalities: Option<Vec<Option<String>>>,
    pub n: Option<i64>,
    pub presence_penalty: Option<f64>,
    pub reasoning_effort: Option<String>,
    pub response_format: Option<ResponseFormat>,
    pub seed: Option<i64>,
    pub service_tier: Option<String>,
    pub store: Option<bool>,
    pub stream: Option<bool>,
    pub stream_options: Option<StreamOptions>,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub user: Option<String>,
    pub web_search_options: Option<WebSearchOptions>,
    pub logprobs: Option<Logprobs>,
    pub top_logprobs: Option<i64>,
    pub tool_choice: Option<ToolChoice>,
}

/// `tool_choice`: a mode string (`"auto"`, `"none"`, `"required"`) or a
/// structured selector that is never republished.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ToolChoice {
    Mode(String),
    Object(serde_json::Map<String, serde_json::Value>),
}

/// `logprobs`: older clients send a count, the current API a flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Logprobs {
    Count(i64),
    Flag(bool),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Audio {
    pub format: Option<String>,
    pub voice: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub type_: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct StreamOptions {
    pub include_usage: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct WebSearchOptions {
    pub search_context_size: Option<String>,
    pub user_location: Option<UserLocation>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UserLocation {
    pub approximate: Option<ApproximateLocation>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ApproximateLocation {
    pub city: Option<String>,
    pub country: Option<String>,
    pub region: Option<String>,
    pub timezone: Option<String>,
}

/// Reduced chat completion shape tried after the full decode fails.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ModelOnlyRequest {
    #[serde(default, deserialize_with = "null_as_default")]
    pub model: String,
}

/// Batch job creation request body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BatchRequest {
    pub completion_window: Option<String>,
    pub endpoint: Option<String>,
    pub input_file_id: Option<String>,
    pub metadata: Option<HashMap<String, Option<String>>>,
}
