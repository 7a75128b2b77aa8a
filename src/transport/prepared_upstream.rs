use http::header::{HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};

use crate::config::UpstreamConfig;
use crate::error::BridgeError;

const X_API_KEY: HeaderName = HeaderName::from_static("x-api-key");
const ANTHROPIC_VERSION: HeaderName = HeaderName::from_static("anthropic-version");

/// Precomputed upstream metadata used by the hot request path.
///
/// The Messages URL and the static credential/version headers are built once
/// at startup and shared read-only by every session.
#[derive(Debug, Clone)]
pub struct PreparedUpstream {
    messages_url: url::Url,
    static_headers: http::HeaderMap,
    model: String,
    default_max_tokens: u64,
}

impl PreparedUpstream {
    /// Build a prepared upstream from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Config`] when the messages URL does not parse or
    /// the credential/version cannot be used as header values.
    pub fn new(upstream: &UpstreamConfig) -> Result<Self, BridgeError> {
        let base = upstream.base_url.trim_end_matches('/');
        let messages_url = url::Url::parse(&format!("{base}/messages"))
            .map_err(|err| BridgeError::Config(format!("invalid upstream.base_url: {err}")))?;

        Ok(Self {
            messages_url,
            static_headers: Self::build_headers(upstream)?,
            model: upstream.model.clone(),
            default_max_tokens: upstream.default_max_tokens,
        })
    }

    #[must_use]
    pub fn messages_url(&self) -> &url::Url {
        &self.messages_url
    }

    #[must_use]
    pub fn static_headers(&self) -> &http::HeaderMap {
        &self.static_headers
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    #[must_use]
    pub fn default_max_tokens(&self) -> u64 {
        self.default_max_tokens
    }

    fn build_headers(upstream: &UpstreamConfig) -> Result<http::HeaderMap, BridgeError> {
        let mut headers = http::HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));

        let mut key = HeaderValue::from_str(upstream.api_key.trim()).map_err(|_| {
            BridgeError::Config("upstream.api_key is not a valid header value".to_string())
        })?;
        key.set_sensitive(true);
        headers.insert(X_API_KEY, key);

        let version = HeaderValue::from_str(upstream.api_version.trim()).map_err(|_| {
            BridgeError::Config("upstream.api_version is not a valid header value".to_string())
        })?;
        headers.insert(ANTHROPIC_VERSION, version);

        Ok(headers)
    }
}
