use crate::config::AppConfig;
use crate::error::BridgeError;
use http::header::AUTHORIZATION;
use rustc_hash::FxHashSet;

/// Compact key index used in hot-path authentication.
pub enum AllowedClientKeys {
    Empty,
    Single { bearer: Box<str> },
    Multiple(FxHashSet<String>),
}

/// Extract the client key from `Authorization: Bearer <key>`.
///
/// # Errors
///
/// Returns `BridgeError::Auth` when the header is absent or not a bearer token.
pub fn extract_api_key(headers: &http::HeaderMap) -> Result<&str, BridgeError> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .ok_or_else(|| BridgeError::Auth("Missing API key".to_string()))
}

/// Authenticate an incoming request by checking the bearer key against
/// pre-indexed `allowed_keys`.
///
/// # Errors
///
/// Returns `BridgeError::Auth` when the API key is missing or invalid.
pub fn authenticate(
    headers: &http::HeaderMap,
    allowed_keys: &AllowedClientKeys,
) -> Result<(), BridgeError> {
    match allowed_keys {
        // Single key: compare the whole header value without UTF-8 checks.
        AllowedClientKeys::Single { bearer } => match headers.get(AUTHORIZATION) {
            Some(value) if value.as_bytes() == bearer.as_bytes() => Ok(()),
            Some(_) => Err(BridgeError::Auth("Invalid API key".to_string())),
            None => Err(BridgeError::Auth("Missing API key".to_string())),
        },
        AllowedClientKeys::Multiple(allowed_set) => {
            let client_key = extract_api_key(headers)?;
            if allowed_set.contains(client_key) {
                Ok(())
            } else {
                Err(BridgeError::Auth("Invalid API key".to_string()))
            }
        }
        AllowedClientKeys::Empty => Err(BridgeError::Auth("Invalid API key".to_string())),
    }
}

/// Build a hash-set index for allowed client keys.
#[must_use]
pub fn build_allowed_key_set(config: &AppConfig) -> AllowedClientKeys {
    let mut allowed_set: FxHashSet<String> = config
        .client_authentication
        .allowed_keys
        .iter()
        .cloned()
        .collect();

    match allowed_set.len() {
        0 => AllowedClientKeys::Empty,
        1 => match allowed_set.drain().next() {
            Some(single_key) => AllowedClientKeys::Single {
                bearer: format!("Bearer {single_key}").into_boxed_str(),
            },
            None => AllowedClientKeys::Empty,
        },
        _ => AllowedClientKeys::Multiple(allowed_set),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        AppConfig, ClientAuthConfig, FeaturesConfig, ServerConfig, UpstreamConfig,
    };

    fn make_config(allowed_keys: Vec<String>) -> AppConfig {
        AppConfig {
            server: ServerConfig::default(),
            upstream: UpstreamConfig {
                base_url: "https://api.anthropic.com".to_string(),
                api_key: "sk-upstream".to_string(),
                api_key_env: None,
                model: "claude-test".to_string(),
                default_max_tokens: 1024,
                api_version: "2023-06-01".to_string(),
                timeout_secs: 300,
                connect_timeout_secs: 5,
            },
            client_authentication: ClientAuthConfig { allowed_keys },
            features: FeaturesConfig::default(),
        }
    }

    fn bearer(key: &str) -> http::HeaderMap {
        let mut headers = http::HeaderMap::new();
        headers.insert(AUTHORIZATION, format!("Bearer {key}").parse().unwrap());
        headers
    }

    #[test]
    fn test_extract_bearer() {
        assert_eq!(extract_api_key(&bearer("sk-test123")).unwrap(), "sk-test123");
    }

    #[test]
    fn test_extract_missing_or_wrong_scheme() {
        assert!(extract_api_key(&http::HeaderMap::new()).is_err());
        let mut headers = http::HeaderMap::new();
        headers.insert(AUTHORIZATION, "Basic abc".parse().unwrap());
        assert!(extract_api_key(&headers).is_err());
    }

    #[test]
    fn test_single_key() {
        let keys = build_allowed_key_set(&make_config(vec!["sk-one".into()]));
        assert!(matches!(keys, AllowedClientKeys::Single { .. }));
        assert!(authenticate(&bearer("sk-one"), &keys).is_ok());
        assert!(authenticate(&bearer("sk-two"), &keys).is_err());
        let err = authenticate(&http::HeaderMap::new(), &keys).unwrap_err();
        assert_eq!(err.to_string(), "Auth error: Missing API key");
    }

    #[test]
    fn test_multiple_keys() {
        let keys = build_allowed_key_set(&make_config(vec!["sk-a".into(), "sk-b".into()]));
        assert!(matches!(keys, AllowedClientKeys::Multiple(_)));
        assert!(authenticate(&bearer("sk-a"), &keys).is_ok());
        assert!(authenticate(&bearer("sk-b"), &keys).is_ok());
        let err = authenticate(&bearer("sk-c"), &keys).unwrap_err();
        assert_eq!(err.to_string(), "Auth error: Invalid API key");
    }

    #[test]
    fn test_duplicate_keys_collapse_to_single() {
        let keys = build_allowed_key_set(&make_config(vec!["sk-a".into(), "sk-a".into()]));
        assert!(matches!(keys, AllowedClientKeys::Single { .. }));
    }

    #[test]
    fn test_empty_rejects_everything() {
        let keys = build_allowed_key_set(&make_config(vec![]));
        assert!(authenticate(&bearer("anything"), &keys).is_err());
    }
}
