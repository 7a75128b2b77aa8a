use std::time::Duration;

use crate::config::{ServerConfig, UpstreamConfig};
use crate::error::BridgeError;

fn build_reqwest_client(
    pool_max_idle_per_host: usize,
    pool_idle_timeout: Option<Duration>,
    connect_timeout: Duration,
    timeout: Duration,
    use_env_proxy: bool,
) -> Result<reqwest::Client, BridgeError> {
    let mut builder = reqwest::Client::builder()
        .pool_max_idle_per_host(pool_max_idle_per_host)
        .pool_idle_timeout(pool_idle_timeout)
        .tcp_nodelay(true)
        .connect_timeout(connect_timeout)
        .redirect(reqwest::redirect::Policy::none())
        .timeout(timeout);

    if !use_env_proxy {
        builder = builder.no_proxy();
    }

    builder
        .build()
        .map_err(|err| BridgeError::Config(format!("Failed to build HTTP client: {err}")))
}

/// HTTP transport client for the upstream streaming call.
///
/// One pooled client is shared by every session. Its overall timeout covers
/// connecting, sending and reading the whole streamed body.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    timeout: Duration,
    connect_timeout: Duration,
}

impl HttpTransport {
    /// Create a new transport with connection pooling and timeouts from config.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Config`] when the HTTP client cannot be built.
    pub fn new(server: &ServerConfig, upstream: &UpstreamConfig) -> Result<Self, BridgeError> {
        let pool_idle_timeout = if server.http_pool_idle_timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(server.http_pool_idle_timeout_secs))
        };
        let timeout = Duration::from_secs(upstream.timeout_secs);
        let connect_timeout = Duration::from_secs(upstream.connect_timeout_secs);
        let client = build_reqwest_client(
            server.http_pool_max_idle_per_host.max(1),
            pool_idle_timeout,
            connect_timeout,
            timeout,
            server.http_use_env_proxy,
        )?;
        Ok(Self {
            client,
            timeout,
            connect_timeout,
        })
    }

    /// Issue the streaming POST and return once response headers arrive.
    ///
    /// Any status is returned as `Ok`; the caller decides how to read the body.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Transport`] when the request cannot be sent or
    /// the deadline expires before headers arrive.
    pub async fn send_stream(
        &self,
        url: &url::Url,
        headers: &http::HeaderMap,
        body: bytes::Bytes,
    ) -> Result<reqwest::Response, BridgeError> {
        let mut request = reqwest::Request::new(http::Method::POST, url.clone());
        *request.headers_mut() = headers.clone();
        *request.body_mut() = Some(reqwest::Body::from(body));

        self.client
            .execute(request)
            .await
            .map_err(|err| self.transport_error(&err))
    }

    /// Map a reqwest failure, from sending or from a body read, to a
    /// transport error with a readable message.
    #[must_use]
    pub fn transport_error(&self, err: &reqwest::Error) -> BridgeError {
        if err.is_timeout() {
            return self.timeout_error(err.is_connect());
        }
        let mut message = err.to_string();
        let mut source = std::error::Error::source(err);
        // reqwest's own message omits the io/hyper cause, e.g. "connection refused".
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        BridgeError::Transport(message)
    }

    /// Name the deadline that expired: the connect limit or the overall call limit.
    fn timeout_error(&self, during_connect: bool) -> BridgeError {
        if during_connect {
            BridgeError::Transport(format!(
                "upstream connect timed out after {}s",
                self.connect_timeout.as_secs()
            ))
        } else {
            BridgeError::Transport(format!(
                "upstream call timed out after {}s",
                self.timeout.as_secs()
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upstream(timeout_secs: u64) -> UpstreamConfig {
        UpstreamConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            api_key: "sk-test".to_string(),
            api_key_env: None,
            model: "claude-test".to_string(),
            default_max_tokens: 16,
            api_version: "2023-06-01".to_string(),
            timeout_secs,
            connect_timeout_secs: 1,
        }
    }

    #[test]
    fn builds_with_defaults() {
        let transport = HttpTransport::new(&ServerConfig::default(), &upstream(300)).unwrap();
        assert_eq!(transport.timeout, Duration::from_secs(300));
        assert_eq!(transport.connect_timeout, Duration::from_secs(1));
    }

    #[test]
    fn timeouts_name_the_deadline_that_expired() {
        let transport = HttpTransport::new(&ServerConfig::default(), &upstream(300)).unwrap();
        assert_eq!(
            transport.timeout_error(true).to_string(),
            "upstream connection error: upstream connect timed out after 1s"
        );
        assert_eq!(
            transport.timeout_error(false).to_string(),
            "upstream connection error: upstream call timed out after 300s"
        );
    }

    #[tokio::test]
    async fn refused_connection_is_a_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport = HttpTransport::new(&ServerConfig::default(), &upstream(5)).unwrap();
        let url = url::Url::parse(&format!("http://{addr}/v1/messages")).unwrap();
        let err = transport
            .send_stream(&url, &http::HeaderMap::new(), bytes::Bytes::from_static(b"{}"))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::Transport(_)));
        assert!(err.to_string().starts_with("upstream connection error: "));
    }
}
