use std::sync::Arc;

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{header::HeaderValue, Method, Request, Uri};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use tokio::time::timeout;
use tracing::debug;

use crate::config::{ConfigError, MetricsConfig};
use crate::point::DataPoint;

use super::{render_batch, SendError, SendFuture, Sender};

/// Header carrying the collector auth token.
const TOKEN_HEADER: &str = "M-Api-Token";

type HttpsClient = Client<hyper_rustls::HttpsConnector<HttpConnector>, Full<Bytes>>;

/// Ships each batch as one `PUT` request with a newline-joined body.
///
/// The connection is encrypted when the secure flag is set, authenticated with
/// the configured token when one is present, and bounded by the configured
/// timeout. A non-success status fails the batch; nothing is retried.
pub struct HttpSender {
    config: Arc<MetricsConfig>,
    endpoint: Uri,
    token: Option<HeaderValue>,
    client: HttpsClient,
}

impl HttpSender {
    /// Create a sender targeting the configured endpoint.
    ///
    /// # Errors
    ///
    /// Fails when the host/port pair does not form a valid URI, the token is
    /// not a valid header value, or TLS cannot be initialized.
    pub fn new(config: Arc<MetricsConfig>) -> Result<Self, ConfigError> {
        let scheme = if config.secure() { "https" } else { "http" };
        let endpoint = format!("{scheme}://{}:{}/metrics", config.host(), config.port())
            .parse::<Uri>()
            .map_err(|e| ConfigError::InvalidEndpoint { reason: e.to_string() })?;

        let token = config
            .token()
            .map(|token| {
                HeaderValue::from_str(token).map(|mut value| {
                    value.set_sensitive(true);
                    value
                })
            })
            .transpose()
            .map_err(|e| ConfigError::InvalidEndpoint { reason: e.to_string() })?;

        let https = hyper_rustls::HttpsConnectorBuilder::new()
            .with_native_roots()
            .map_err(|e| ConfigError::Tls { reason: e.to_string() })?
            .https_or_http()
            .enable_http1()
            .build();
        let client = Client::builder(TokioExecutor::new()).build(https);

        Ok(HttpSender { config, endpoint, token, client })
    }
}

impl Sender for HttpSender {
    fn transport_id(&self) -> &'static str {
        "http"
    }

    fn send<'a>(&'a self, batch: &'a [DataPoint]) -> SendFuture<'a> {
        Box::pin(async move {
            if batch.is_empty() {
                return Ok(());
            }

            let payload = render_batch(batch, &self.config)?;

            let mut builder = Request::builder()
                .method(Method::PUT)
                .uri(self.endpoint.clone())
                .header("content-type", "text/plain");
            if let Some(token) = &self.token {
                builder = builder.header(TOKEN_HEADER, token.clone());
            }
            let request = builder
                .body(Full::from(payload))
                .map_err(|e| SendError::Transport { reason: e.to_string() })?;

            let response = timeout(self.config.timeout(), self.client.request(request))
                .await
                .map_err(|_| SendError::Timeout)?
                .map_err(|e| SendError::Transport { reason: e.to_string() })?;

            let status = response.status();
            if !status.is_success() {
                return Err(SendError::Http { status: status.as_u16() });
            }

            debug!(points = batch.len(), "shipped batch over http");
            Ok(())
        })
    }

    fn close(&self) -> SendFuture<'_> {
        // The pooled client tears its connections down on drop.
        Box::pin(async { Ok(()) })
    }
}
