use crate::error::BridgeError;
use crate::protocol::anthropic::{AnthropicMessage, AnthropicRequest, AnthropicRole};
use crate::protocol::openai_chat::{ChatCompletionRequest, ChatRole};

const SYSTEM_PROMPT_SEPARATOR: &str = "\n\n";

/// Upstream model and token defaults applied to every translated request.
#[derive(Debug, Clone, Copy)]
pub struct TranslateDefaults<'a> {
    pub model: &'a str,
    pub default_max_tokens: u64,
}

/// Translate an inbound chat-completions request into an Anthropic streaming
/// request.
///
/// System messages are pulled out of the turn list and joined into a single
/// system prompt; every other message keeps its position. Roles other than
/// `assistant` become `user`. Message text is copied verbatim.
///
/// # Errors
///
/// Returns [`BridgeError::Validation`] when `messages` is missing or empty,
/// when only system messages were supplied, or when `max_tokens` is zero.
pub fn encode_anthropic_request(
    request: ChatCompletionRequest,
    defaults: TranslateDefaults<'_>,
) -> Result<AnthropicRequest, BridgeError> {
    let messages = match request.messages {
        Some(messages) if !messages.is_empty() => messages,
        _ => return Err(BridgeError::Validation("messages required".to_string())),
    };

    let max_tokens = request.max_tokens.unwrap_or(defaults.default_max_tokens);
    if max_tokens == 0 {
        return Err(BridgeError::Validation(
            "max_tokens must be greater than 0".to_string(),
        ));
    }

    let mut system: Option<String> = None;
    let mut turns = Vec::with_capacity(messages.len());
    for message in messages {
        match message.role() {
            ChatRole::System => match system.as_mut() {
                Some(prompt) => {
                    prompt.push_str(SYSTEM_PROMPT_SEPARATOR);
                    prompt.push_str(&message.content);
                }
                None => system = Some(message.content),
            },
            ChatRole::Assistant => turns.push(AnthropicMessage {
                role: AnthropicRole::Assistant,
                content: message.content,
            }),
            ChatRole::User => turns.push(AnthropicMessage {
                role: AnthropicRole::User,
                content: message.content,
            }),
        }
    }

    if turns.is_empty() {
        return Err(BridgeError::Validation(
            "no user/assistant messages".to_string(),
        ));
    }

    Ok(AnthropicRequest {
        model: defaults.model.to_string(),
        max_tokens,
        stream: true,
        system,
        messages: turns,
    })
}
