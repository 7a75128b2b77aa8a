use std::time::Duration;

use tracing_subscriber::EnvFilter;

use crate::stream::SessionStats;

/// Initialize the tracing subscriber with the configured log level and format.
///
/// Maps config log levels to tracing levels:
/// - "DISABLED" -> no subscriber installed
/// - "WARNING" -> WARN
/// - "CRITICAL" -> ERROR
/// - Others map directly (DEBUG, INFO, ERROR)
pub fn init_tracing(log_level: &str, json: bool) {
    let Some(directive) = tracing_directive(log_level) else {
        return;
    };

    let filter = EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("INFO"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    // A subscriber may already be installed when embedded in tests.
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

fn tracing_directive(log_level: &str) -> Option<&'static str> {
    match log_level.to_uppercase().as_str() {
        "DISABLED" => None,
        "DEBUG" => Some("DEBUG"),
        "WARNING" => Some("WARN"),
        "ERROR" | "CRITICAL" => Some("ERROR"),
        _ => Some("INFO"),
    }
}

/// Log the outcome of one client stream.
pub fn log_stream_complete(completion_id: &str, stats: &SessionStats, elapsed: Duration) {
    let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
    match stats.error.as_deref() {
        None => tracing::info!(
            completion_id,
            finish_reason = stats.finish_reason.as_deref().unwrap_or("none"),
            chunks = stats.chunks_emitted,
            input_tokens = ?stats.usage.input_tokens,
            output_tokens = ?stats.usage.output_tokens,
            elapsed_ms,
            "stream complete"
        ),
        Some(error) => tracing::info!(
            completion_id,
            chunks = stats.chunks_emitted,
            error,
            elapsed_ms,
            "stream ended with error"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::tracing_directive;

    #[test]
    fn config_levels_map_to_tracing_directives() {
        assert_eq!(tracing_directive("DISABLED"), None);
        assert_eq!(tracing_directive("debug"), Some("DEBUG"));
        assert_eq!(tracing_directive("INFO"), Some("INFO"));
        assert_eq!(tracing_directive("WARNING"), Some("WARN"));
        assert_eq!(tracing_directive("ERROR"), Some("ERROR"));
        assert_eq!(tracing_directive("CRITICAL"), Some("ERROR"));
    }
}
