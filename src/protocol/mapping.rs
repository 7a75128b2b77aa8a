/// Map an Anthropic `stop_reason` onto an OpenAI `finish_reason`.
///
/// `end_turn` becomes `stop`; every other value is passed through unchanged.
#[must_use]
pub fn anthropic_stop_to_openai(stop_reason: &str) -> String {
    match stop_reason {
        "end_turn" => "stop".to_string(),
        other => other.to_string(),
    }
}
