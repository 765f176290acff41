use std::fmt;

use http::{HeaderMap, HeaderName, HeaderValue};

use super::classify::Schema;
use super::fields::{HeaderMapping, LogicalField};
use super::payload::{
    decode, BatchRequest, ChatCompletionRequest, Logprobs, ModelOnlyRequest, ToolChoice,
};

/// Why a matched body produced no (or only partial) field headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    EmptyBody,
    UnknownModel,
    Decode(String),
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::EmptyBody => f.write_str("empty body"),
            Diagnostic::UnknownModel => f.write_str("Unknown model"),
            Diagnostic::Decode(message) => f.write_str(message),
        }
    }
}

/// Headers produced by inspecting one body against one schema.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    pub headers: Vec<(HeaderName, HeaderValue)>,
    pub diagnostic: Option<Diagnostic>,
}

impl Extraction {
    fn diagnostic(diagnostic: Diagnostic) -> Self {
        Self {
            headers: Vec::new(),
            diagnostic: Some(diagnostic),
        }
    }

    /// Value written to the parse-failure header, if any.
    #[must_use]
    pub fn diagnostic_value(&self) -> Option<HeaderValue> {
        let diagnostic = self.diagnostic.as_ref()?;
        header_value(&diagnostic.to_string())
    }

    /// Write every header into `headers`, replacing existing values.
    pub fn apply(&self, headers: &mut HeaderMap) {
        for (name, value) in &self.headers {
            headers.insert(name.clone(), value.clone());
        }
        if let Some(value) = self.diagnostic_value() {
            headers.insert(parse_failure_header(), value);
        }
    }
}

/// Name of the diagnostic header as a typed [`HeaderName`].
#[must_use]
pub fn parse_failure_header() -> HeaderName {
    HeaderName::from_static("x-openai-parse-failure")
}

/// Inspect `body` against `schema` and collect the headers to publish.
#[must_use]
pub fn extract(body: &[u8], schema: Schema, mapping: &HeaderMapping) -> Extraction {
    if body.is_empty() {
        return Extraction::diagnostic(Diagnostic::EmptyBody);
    }
    if mapping.is_empty() {
        return Extraction::default();
    }

    match schema {
        Schema::ChatCompletion => extract_chat_completion(body, mapping),
        Schema::Batch => extract_batch(body, mapping),
    }
}

fn extract_chat_completion(body: &[u8], mapping: &HeaderMapping) -> Extraction {
    let request = match decode::<ChatCompletionRequest>(body) {
        Ok(request) => request,
        Err(err) => {
            tracing::debug!(error = %err, "chat completion body did not decode, retrying model only");
            return match decode::<ModelOnlyRequest>(body) {
                Ok(reduced) => {
                    let mut out = HeaderSink::new(mapping);
                    out.emit(LogicalField::Model, &reduced.model);
                    out.finish()
                }
                Err(err) => {
                    tracing::debug!(error = %err, "chat completion body has no readable model");
                    Extraction::diagnostic(Diagnostic::UnknownModel)
                }
            };
        }
    };

    let mut out = HeaderSink::new(mapping);
    // model is always published, even when empty
    out.emit(LogicalField::Model, &request.model);
    out.emit_non_empty(LogicalField::User, request.user.as_deref());
    out.emit_display(LogicalField::Temperature, request.temperature);
    out.emit_display(LogicalField::MaxCompletionTokens, request.max_completion_tokens);
    if let Some(logprobs) = request.logprobs {
        match logprobs {
            Logprobs::Count(count) => out.emit(LogicalField::Logprobs, &count.to_string()),
            Logprobs::Flag(flag) => out.emit(LogicalField::Logprobs, bool_str(flag)),
        }
    }
    out.emit_display(LogicalField::TopLogprobs, request.top_logprobs);
    if let Some(ToolChoice::Mode(mode)) = &request.tool_choice {
        out.emit(LogicalField::ToolChoice, mode);
    }
    out.emit_display(LogicalField::FrequencyPenalty, request.frequency_penalty);
    out.emit_display(LogicalField::PresencePenalty, request.presence_penalty);
    out.emit_display(LogicalField::TopP, request.top_p);
    if let Some(stream) = request.stream {
        out.emit(LogicalField::Stream, bool_str(stream));
    }
    out.emit_display(LogicalField::N, request.n);
    out.emit_display(LogicalField::Seed, request.seed);
    out.emit_non_empty(LogicalField::ServiceTier, request.service_tier.as_deref());
    out.emit_non_empty(
        LogicalField::ReasoningEffort,
        request.reasoning_effort.as_deref(),
    );
    if let Some(store) = request.store {
        out.emit(LogicalField::Store, bool_str(store));
    }
    out.finish()
}

fn extract_batch(body: &[u8], mapping: &HeaderMapping) -> Extraction {
    let request = match decode::<BatchRequest>(body) {
        Ok(request) => request,
        Err(err) => {
            tracing::debug!(error = %err, "batch body did not decode");
            return Extraction::diagnostic(Diagnostic::Decode(err.to_string()));
        }
    };

    let mut out = HeaderSink::new(mapping);
    out.emit_non_empty(
        LogicalField::CompletionWindow,
        request.completion_window.as_deref(),
    );
    out.emit_non_empty(LogicalField::Endpoint, request.endpoint.as_deref());
    out.finish()
}

struct HeaderSink<'a> {
    mapping: &'a HeaderMapping,
    headers: Vec<(HeaderName, HeaderValue)>,
}

impl<'a> HeaderSink<'a> {
    fn new(mapping: &'a HeaderMapping) -> Self {
        Self {
            mapping,
            headers: Vec::with_capacity(mapping.len()),
        }
    }

    fn emit(&mut self, field: LogicalField, value: &str) {
        let Some(name) = self.mapping.get(field) else {
            return;
        };
        match header_value(value) {
            Some(value) => self.headers.push((name.clone(), value)),
            None => tracing::warn!(
                field = field.as_str(),
                header = name.as_str(),
                "dropping field value that is not a valid header value"
            ),
        }
    }

    fn emit_non_empty(&mut self, field: LogicalField, value: Option<&str>) {
        if let Some(value) = value.filter(|value| !value.is_empty()) {
            self.emit(field, value);
        }
    }

    fn emit_display<T: fmt::Display>(&mut self, field: LogicalField, value: Option<T>) {
        if let Some(value) = value {
            self.emit(field, &value.to_string());
        }
    }

    fn finish(self) -> Extraction {
        Extraction {
            headers: self.headers,
            diagnostic: None,
        }
    }
}

fn header_value(value: &str) -> Option<HeaderValue> {
    HeaderValue::from_str(value).ok()
}

fn bool_str(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chat(body: &str) -> Extraction {
        extract(
            body.as_bytes(),
            Schema::ChatCompletion,
            &HeaderMapping::default(),
        )
    }

    fn header<'a>(extraction: &'a Extraction, name: &str) -> Option<&'a str> {
        extraction
            .headers
            .iter()
            .find(|(header, _)| header.as_str().eq_ignore_ascii_case(name))
            .and_then(|(_, value)| value.to_str().ok())
    }

    #[test]
    fn test_empty_body_only_emits_diagnostic() {
        for schema in [Schema::ChatCompletion, Schema::Batch] {
            let extraction = extract(b"", schema, &HeaderMapping::default());
            assert!(extraction.headers.is_empty());
            assert_eq!(extraction.diagnostic, Some(Diagnostic::EmptyBody));
            assert_eq!(
                extraction.diagnostic_value().unwrap(),
                HeaderValue::from_static("empty body")
            );
        }
    }

    #[test]
    fn test_model_only_payload() {
        let extraction = chat(r#"{"model": "test"}"#);
        assert_eq!(extraction.headers.len(), 1);
        assert_eq!(header(&extraction, "X-OpenAI-Model"), Some("test"));
        assert_eq!(extraction.diagnostic, None);
    }

    #[test]
    fn test_invalid_json_reports_unknown_model() {
        let extraction = chat("INVALID JSON");
        assert!(extraction.headers.is_empty());
        assert_eq!(extraction.diagnostic, Some(Diagnostic::UnknownModel));
        assert_eq!(
            extraction.diagnostic_value().unwrap(),
            HeaderValue::from_static("Unknown model")
        );
    }

    #[test]
    fn test_duplicate_model_last_wins() {
        let extraction = chat(r#"{"model": "a", "model": "b"}"#);
        assert_eq!(header(&extraction, "X-OpenAI-Model"), Some("b"));
    }

    #[test]
    fn test_tool_choice_object_is_skipped_model_is_empty() {
        let extraction = chat(r#"{"tool_choice": {"type":"file_search"}}"#);
        assert_eq!(header(&extraction, "X-OpenAI-Tool-Choice"), None);
        assert_eq!(header(&extraction, "X-OpenAI-Model"), Some(""));
        assert_eq!(extraction.diagnostic, None);
    }

    #[test]
    fn test_tool_choice_string_is_emitted() {
        let extraction = chat(r#"{"model":"gpt-4.1","tools":[],"tool_choice":"auto"}"#);
        assert_eq!(header(&extraction, "X-OpenAI-Tool-Choice"), Some("auto"));
    }

    #[test]
    fn test_scalar_formatting() {
        let extraction = chat(
            r#"{"model":"gpt-4.1","temperature":1.0,"top_p":0.7,"frequency_penalty":0,
                "presence_penalty":-0.5,"max_completion_tokens":300,"stream":false,
                "logprobs":5,"top_logprobs":2,"user":"alice"}"#,
        );
        assert_eq!(header(&extraction, "X-OpenAI-Temperature"), Some("1"));
        assert_eq!(header(&extraction, "X-OpenAI-Top-P"), Some("0.7"));
        assert_eq!(header(&extraction, "X-OpenAI-Frequency-Penalty"), Some("0"));
        assert_eq!(header(&extraction, "X-OpenAI-Presence-Penalty"), Some("-0.5"));
        assert_eq!(
            header(&extraction, "X-OpenAI-Max-Completion-Tokens"),
            Some("300")
        );
        assert_eq!(header(&extraction, "X-OpenAI-Stream"), Some("false"));
        assert_eq!(header(&extraction, "X-OpenAI-Logprobs"), Some("5"));
        assert_eq!(header(&extraction, "X-OpenAI-Top-Logprobs"), Some("2"));
        assert_eq!(header(&extraction, "X-OpenAI-User"), Some("alice"));
    }

    #[test]
    fn test_absent_and_null_fields_are_not_emitted() {
        let extraction = chat(r#"{"model":"gpt-4.1","logprobs":null,"user":"","top_logprobs":2}"#);
        assert_eq!(header(&extraction, "X-OpenAI-Logprobs"), None);
        assert_eq!(header(&extraction, "X-OpenAI-User"), None);
        assert_eq!(header(&extraction, "X-OpenAI-Temperature"), None);
        assert_eq!(header(&extraction, "X-OpenAI-Stream"), None);
        assert_eq!(header(&extraction, "X-OpenAI-Top-Logprobs"), Some("2"));
    }

    #[test]
    fn test_schema_mismatch_falls_back_to_model() {
        let extraction = chat(r#"{"model":"gpt-4.1","stream":"yes","user":"alice"}"#);
        assert_eq!(extraction.headers.len(), 1);
        assert_eq!(header(&extraction, "X-OpenAI-Model"), Some("gpt-4.1"));
        assert_eq!(extraction.diagnostic, None);
    }

    #[test]
    fn test_unmapped_fields_are_skipped() {
        let mapping = HeaderMapping::from_entries([("stream", "X-Stream")]).unwrap();
        let extraction = extract(
            br#"{"model":"gpt-4.1","stream":true}"#,
            Schema::ChatCompletion,
            &mapping,
        );
        assert_eq!(extraction.headers.len(), 1);
        assert_eq!(header(&extraction, "X-Stream"), Some("true"));
    }

    #[test]
    fn test_optional_extra_fields_when_mapped() {
        let mapping = HeaderMapping::from_entries([
            ("seed", "X-Seed"),
            ("store", "X-Store"),
            ("reasoning_effort", "X-Reasoning-Effort"),
        ])
        .unwrap();
        let extraction = extract(
            br#"{"model":"o3","seed":42,"store":true,"reasoning_effort":"high"}"#,
            Schema::ChatCompletion,
            &mapping,
        );
        assert_eq!(header(&extraction, "X-Seed"), Some("42"));
        assert_eq!(header(&extraction, "X-Store"), Some("true"));
        assert_eq!(header(&extraction, "X-Reasoning-Effort"), Some("high"));
    }

    #[test]
    fn test_empty_mapping_skips_decode() {
        let extraction = extract(b"INVALID JSON", Schema::Batch, &HeaderMapping::empty());
        assert_eq!(extraction, Extraction::default());
    }

    #[test]
    fn test_invalid_header_value_is_dropped() {
        let extraction = chat("{\"model\":\"gpt\\n4\",\"user\":\"bob\"}");
        assert_eq!(header(&extraction, "X-OpenAI-Model"), None);
        assert_eq!(header(&extraction, "X-OpenAI-User"), Some("bob"));
    }

    #[test]
    fn test_batch_payload() {
        let extraction = extract(
            br#"{"completion_window":"24h","endpoint":"/v1/chat/completions"}"#,
            Schema::Batch,
            &HeaderMapping::default(),
        );
        assert_eq!(
            header(&extraction, "X-OpenAI-Completion-Window"),
            Some("24h")
        );
        assert_eq!(
            header(&extraction, "X-OpenAI-Endpoint"),
            Some("/v1/chat/completions")
        );
        assert_eq!(extraction.diagnostic, None);
    }

    #[test]
    fn test_batch_decode_failure_carries_decoder_message() {
        let extraction = extract(b"INVALID JSON", Schema::Batch, &HeaderMapping::default());
        assert!(extraction.headers.is_empty());
        let Some(Diagnostic::Decode(message)) = &extraction.diagnostic else {
            panic!("expected decode diagnostic, got {:?}", extraction.diagnostic);
        };
        assert!(message.contains("expected value"), "{message}");

        let extraction = extract(
            br#"{"completion_window":24,"endpoint":"/v1/chat/completions"}"#,
            Schema::Batch,
            &HeaderMapping::default(),
        );
        assert!(extraction.headers.is_empty());
        assert!(matches!(extraction.diagnostic, Some(Diagnostic::Decode(_))));
    }

    #[test]
    fn test_null_model_keeps_other_fields() {
        let extraction = chat(r#"{"model":null,"stream":true,"user":"alice"}"#);
        assert_eq!(extraction.diagnostic, None);
        assert_eq!(header(&extraction, "X-OpenAI-Model"), Some(""));
        assert_eq!(header(&extraction, "X-OpenAI-Stream"), Some("true"));
        assert_eq!(header(&extraction, "X-OpenAI-User"), Some("alice"));
    }

    #[test]
    fn test_null_metadata_value_keeps_full_decode() {
        let extraction = chat(r#"{"model":"gpt-4.1","stream":true,"metadata":{"k":null}}"#);
        assert_eq!(extraction.diagnostic, None);
        assert_eq!(header(&extraction, "X-OpenAI-Model"), Some("gpt-4.1"));
        assert_eq!(header(&extraction, "X-OpenAI-Stream"), Some("true"));

        let batch = extract(
            br#"{"completion_window":"24h","metadata":{"k":null}}"#,
            Schema::Batch,
            &HeaderMapping::default(),
        );
        assert_eq!(batch.diagnostic, None);
        assert_eq!(header(&batch, "X-OpenAI-Completion-Window"), Some("24h"));
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let body = br#"{"model":"gpt-4.1","temperature":0.2,"tool_choice":"none"}"#;
        let mapping = HeaderMapping::default();
        assert_eq!(
            extract(body, Schema::ChatCompletion, &mapping),
            extract(body, Schema::ChatCompletion, &mapping)
        );
    }

    #[test]
    fn test_apply_overwrites_existing_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("x-openai-model", HeaderValue::from_static("client-supplied"));
        chat(r#"{"model":"gpt-4.1"}"#).apply(&mut headers);
        assert_eq!(headers.get("X-OpenAI-Model").unwrap(), "gpt-4.1");
        assert!(headers.get(parse_failure_header()).is_none());

        chat("").apply(&mut headers);
        assert_eq!(headers.get("X-OpenAI-Parse-Failure").unwrap(), "empty body");
    }
}
