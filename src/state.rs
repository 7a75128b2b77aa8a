mod completion_id;

use crate::auth::{authenticate, build_allowed_key_set, AllowedClientKeys};
use crate::config::AppConfig;
use crate::error::BridgeError;
use crate::transport::{HttpTransport, PreparedUpstream};

use completion_id::CompletionIdGenerator;

/// Shared application state accessible to all handlers.
///
/// Everything here is read-only after startup apart from the id counter, so
/// concurrent sessions share it without locking.
pub struct AppState {
    pub config: AppConfig,
    pub transport: HttpTransport,
    pub upstream: PreparedUpstream,
    allowed_client_keys: AllowedClientKeys,
    completion_ids: CompletionIdGenerator,
}

impl AppState {
    #[must_use]
    pub fn new(
        config: AppConfig,
        transport: HttpTransport,
        upstream: PreparedUpstream,
        allowed_client_keys: AllowedClientKeys,
    ) -> Self {
        Self {
            config,
            transport,
            upstream,
            allowed_client_keys,
            completion_ids: CompletionIdGenerator::new(),
        }
    }

    /// Build every derived piece of state from a validated config.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Config`] when the HTTP client or the prepared
    /// upstream cannot be built.
    pub fn from_config(config: AppConfig) -> Result<Self, BridgeError> {
        let transport = HttpTransport::new(&config.server, &config.upstream)?;
        let upstream = PreparedUpstream::new(&config.upstream)?;
        let allowed_client_keys = build_allowed_key_set(&config);
        Ok(Self::new(config, transport, upstream, allowed_client_keys))
    }

    /// Authenticate a request using the prebuilt key index.
    ///
    /// # Errors
    ///
    /// Returns `BridgeError::Auth` when the API key is missing or invalid.
    pub fn authenticate(&self, headers: &http::HeaderMap) -> Result<(), BridgeError> {
        authenticate(headers, &self.allowed_client_keys)
    }

    #[must_use]
    pub fn next_completion_id(&self) -> String {
        self.completion_ids.next_id()
    }
}
