use tracing_subscriber::EnvFilter;

use crate::inspect::{Extraction, Schema};

/// Initialize the tracing subscriber with the configured log level and format.
///
/// Maps config log levels to tracing levels:
/// - "DISABLED" -> no subscriber installed
/// - "WARNING" -> WARN
/// - "CRITICAL" -> ERROR
/// - Others map directly (DEBUG, INFO, ERROR)
///
/// `json` switches to one JSON object per line.
pub fn init_tracing(log_level: &str, json: bool) {
    let level = log_level.to_uppercase();

    if level == "DISABLED" {
        return;
    }

    let tracing_level = match level.as_str() {
        "WARNING" => "WARN",
        "CRITICAL" => "ERROR",
        other => other,
    };

    let filter = EnvFilter::try_new(tracing_level).unwrap_or_else(|_| EnvFilter::new("INFO"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Log the outcome of inspecting one request body against one schema.
pub fn log_extraction(path: &str, schema: Schema, extraction: &Extraction) {
    match &extraction.diagnostic {
        Some(diagnostic) => tracing::debug!(
            path,
            schema = schema.as_str(),
            headers = extraction.headers.len(),
            %diagnostic,
            "request body inspection failed"
        ),
        None => tracing::debug!(
            path,
            schema = schema.as_str(),
            headers = extraction.headers.len(),
            "request body inspected"
        ),
    }
}
