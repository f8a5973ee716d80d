use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::line::{Aggregation, AggregationFreq};

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 2013;
const DEFAULT_SECURE: bool = true;
const DEFAULT_TIMEOUT: Duration = Duration::from_millis(2000);
const DEFAULT_NAMESPACE: &str = "application";
const DEFAULT_SAMPLE_RATE: u32 = MAX_SAMPLE_RATE;
const DEFAULT_FLUSH_SIZE: usize = 10;
const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(30_000);

/// Smallest accepted sample rate.
pub(crate) const MIN_SAMPLE_RATE: u32 = 1;
/// Largest accepted sample rate (keep everything).
pub(crate) const MAX_SAMPLE_RATE: u32 = 100;

/// Errors raised by invalid configuration, either while building a
/// [`MetricsConfig`] or at first use of a setting that cannot be validated
/// earlier (such as the prefix, which is only required once a line is
/// rendered).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The sample rate is outside the accepted `[1, 100]` range.
    #[error("invalid sample rate {value}: valid values are within [1, 100]")]
    InvalidSampleRate {
        /// The rejected value.
        value: u32,
    },

    /// The transport selector did not name a known transport.
    #[error("unknown transport '{name}' (expected 'udp' or 'http')")]
    UnknownTransport {
        /// The rejected selector.
        name: String,
    },

    /// No metric prefix was configured. The prefix has no default and is
    /// required to render any line.
    #[error("no metric prefix configured; a prefix is required to render metric lines")]
    MissingPrefix,

    /// The host/port pair could not be assembled into a collector endpoint.
    #[error("invalid collector endpoint: {reason}")]
    InvalidEndpoint {
        /// Details about the failure.
        reason: String,
    },

    /// TLS could not be initialized for the secure HTTP transport.
    #[error("failed to initialize TLS: {reason}")]
    Tls {
        /// Details about the failure.
        reason: String,
    },

    /// The selected transport is not compiled into this build.
    #[error("transport '{name}' is not available in this build")]
    TransportUnavailable {
        /// The selected transport.
        name: &'static str,
    },
}

/// Transport used to deliver batches to the collector.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Transport {
    /// One datagram per batch, fire-and-forget at the socket level.
    Udp,
    /// One request per batch, with optional TLS and token authentication.
    Http,
}

impl FromStr for Transport {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "udp" => Ok(Transport::Udp),
            "http" => Ok(Transport::Http),
            other => Err(ConfigError::UnknownTransport { name: other.to_string() }),
        }
    }
}

/// Immutable client configuration, resolved once and shared read-only by every
/// component.
///
/// Build one with [`MetricsConfigBuilder`]. All values are optional except the
/// metric prefix, which has no default and is reported as a [`ConfigError`]
/// when the first line is rendered without it.
#[derive(Clone, Debug)]
pub struct MetricsConfig {
    host: String,
    port: u16,
    transport: Transport,
    secure: bool,
    timeout: Duration,
    token: Option<String>,
    app: Option<String>,
    dry_run: bool,
    tags: Vec<(String, String)>,
    sample_rate: u32,
    namespace: String,
    prefix: Option<String>,
    flush_size: usize,
    flush_interval: Duration,
    timer_aggregations: Vec<Aggregation>,
    timer_frequency: AggregationFreq,
}

impl MetricsConfig {
    /// Collector host.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Collector port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Transport used to ship batches.
    pub fn transport(&self) -> Transport {
        self.transport
    }

    /// Whether the HTTP transport uses an encrypted connection.
    pub fn secure(&self) -> bool {
        self.secure
    }

    /// Connect/request timeout for the HTTP transport.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Authentication token for the HTTP transport.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Application name, injected as the first tag of every line when set.
    pub fn app(&self) -> Option<&str> {
        self.app.as_deref()
    }

    /// When true, every observation is rejected before sampling and nothing is
    /// ever buffered or transmitted.
    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    /// Global tags appended to every custom metric, in configuration order.
    pub fn tags(&self) -> &[(String, String)] {
        &self.tags
    }

    /// Global sampling rate in `[1, 100]`.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Namespace segment of the metric identifier.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Prefix segment of the metric identifier, if one was configured.
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Number of buffered points that triggers an immediate flush.
    pub fn flush_size(&self) -> usize {
        self.flush_size
    }

    /// Interval at which buffered points are flushed regardless of count.
    pub fn flush_interval(&self) -> Duration {
        self.flush_interval
    }

    /// Default aggregations applied to timer points.
    pub fn timer_aggregations(&self) -> &[Aggregation] {
        &self.timer_aggregations
    }

    /// Default aggregation frequency applied to timer points.
    pub fn timer_frequency(&self) -> AggregationFreq {
        self.timer_frequency
    }
}

/// Builder for [`MetricsConfig`].
///
/// Every setting has a sensible default except the prefix; see the individual
/// methods for the default values.
#[derive(Clone, Debug)]
pub struct MetricsConfigBuilder {
    config: MetricsConfig,
}

impl MetricsConfigBuilder {
    /// Set the collector host.
    ///
    /// Defaults to `127.0.0.1`.
    #[must_use]
    pub fn with_host<S: Into<String>>(mut self, host: S) -> Self {
        self.config.host = host.into();
        self
    }

    /// Set the collector port.
    ///
    /// Defaults to `2013`.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Set the transport used to ship batches.
    ///
    /// Defaults to [`Transport::Udp`].
    #[must_use]
    pub fn with_transport(mut self, transport: Transport) -> Self {
        self.config.transport = transport;
        self
    }

    /// Set whether the HTTP transport uses an encrypted connection.
    ///
    /// Defaults to `true`. Ignored by the UDP transport.
    #[must_use]
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.config.secure = secure;
        self
    }

    /// Set the connect/request timeout for the HTTP transport.
    ///
    /// Defaults to 2 seconds.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the authentication token sent by the HTTP transport.
    #[must_use]
    pub fn with_token<S: Into<String>>(mut self, token: S) -> Self {
        self.config.token = Some(token.into());
        self
    }

    /// Set the application name. When set, every rendered line carries
    /// `app=<name>` as its first tag.
    #[must_use]
    pub fn with_app<S: Into<String>>(mut self, app: S) -> Self {
        self.config.app = Some(app.into());
        self
    }

    /// Enable or disable dry-run mode, in which no metric is ever buffered or
    /// transmitted.
    ///
    /// Defaults to `false`.
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.config.dry_run = dry_run;
        self
    }

    /// Append a global tag. Global tags are added to every custom metric after
    /// the metric's own tags, in the order they were configured. Duplicate
    /// keys are allowed and preserved.
    #[must_use]
    pub fn with_tag<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.config.tags.push((key.into(), value.into()));
        self
    }

    /// Replace the global tag list.
    #[must_use]
    pub fn with_tags(mut self, tags: Vec<(String, String)>) -> Self {
        self.config.tags = tags;
        self
    }

    /// Set the global sampling rate.
    ///
    /// Defaults to `100` (keep everything).
    ///
    /// # Errors
    ///
    /// Values outside `[1, 100]` are rejected with
    /// [`ConfigError::InvalidSampleRate`]; they are never silently clamped.
    pub fn with_sample_rate(mut self, sample_rate: u32) -> Result<Self, ConfigError> {
        if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&sample_rate) {
            return Err(ConfigError::InvalidSampleRate { value: sample_rate });
        }
        self.config.sample_rate = sample_rate;
        Ok(self)
    }

    /// Set the namespace segment of the metric identifier.
    ///
    /// Defaults to `application`.
    #[must_use]
    pub fn with_namespace<S: Into<String>>(mut self, namespace: S) -> Self {
        self.config.namespace = namespace.into();
        self
    }

    /// Set the prefix segment of the metric identifier.
    ///
    /// There is no default; rendering any line without a prefix fails with
    /// [`ConfigError::MissingPrefix`].
    #[must_use]
    pub fn with_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.config.prefix = Some(prefix.into());
        self
    }

    /// Set the number of buffered points that triggers an immediate flush.
    ///
    /// Defaults to `10`.
    #[must_use]
    pub fn with_flush_size(mut self, flush_size: usize) -> Self {
        self.config.flush_size = flush_size;
        self
    }

    /// Set the interval at which buffered points are flushed regardless of
    /// count.
    ///
    /// Defaults to 30 seconds.
    #[must_use]
    pub fn with_flush_interval(mut self, flush_interval: Duration) -> Self {
        self.config.flush_interval = flush_interval;
        self
    }

    /// Set the default aggregations applied to timer points.
    ///
    /// Defaults to `avg`, `p90`, `count`.
    #[must_use]
    pub fn with_timer_aggregations(mut self, aggregations: Vec<Aggregation>) -> Self {
        self.config.timer_aggregations = aggregations;
        self
    }

    /// Set the default aggregation frequency applied to timer points.
    ///
    /// Defaults to [`AggregationFreq::Freq10`].
    #[must_use]
    pub fn with_timer_frequency(mut self, frequency: AggregationFreq) -> Self {
        self.config.timer_frequency = frequency;
        self
    }

    /// Finalize the configuration.
    pub fn build(self) -> Arc<MetricsConfig> {
        Arc::new(self.config)
    }
}

impl Default for MetricsConfigBuilder {
    fn default() -> Self {
        MetricsConfigBuilder {
            config: MetricsConfig {
                host: DEFAULT_HOST.to_string(),
                port: DEFAULT_PORT,
                transport: Transport::Udp,
                secure: DEFAULT_SECURE,
                timeout: DEFAULT_TIMEOUT,
                token: None,
                app: None,
                dry_run: false,
                tags: Vec::new(),
                sample_rate: DEFAULT_SAMPLE_RATE,
                namespace: DEFAULT_NAMESPACE.to_string(),
                prefix: None,
                flush_size: DEFAULT_FLUSH_SIZE,
                flush_interval: DEFAULT_FLUSH_INTERVAL,
                timer_aggregations: vec![Aggregation::Avg, Aggregation::P90, Aggregation::Count],
                timer_frequency: AggregationFreq::Freq10,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = MetricsConfigBuilder::default().build();
        assert_eq!(config.host(), "127.0.0.1");
        assert_eq!(config.port(), 2013);
        assert_eq!(config.transport(), Transport::Udp);
        assert!(config.secure());
        assert_eq!(config.timeout(), Duration::from_millis(2000));
        assert_eq!(config.namespace(), "application");
        assert_eq!(config.sample_rate(), 100);
        assert_eq!(config.flush_size(), 10);
        assert_eq!(config.flush_interval(), Duration::from_millis(30_000));
        assert_eq!(
            config.timer_aggregations(),
            &[Aggregation::Avg, Aggregation::P90, Aggregation::Count]
        );
        assert_eq!(config.timer_frequency(), AggregationFreq::Freq10);
        assert!(config.prefix().is_none());
        assert!(!config.dry_run());
    }

    #[test]
    fn sample_rate_bounds() {
        assert!(MetricsConfigBuilder::default().with_sample_rate(1).is_ok());
        assert!(MetricsConfigBuilder::default().with_sample_rate(100).is_ok());

        for invalid in [0, 101, 1000] {
            match MetricsConfigBuilder::default().with_sample_rate(invalid) {
                Err(ConfigError::InvalidSampleRate { value }) => assert_eq!(value, invalid),
                other => panic!("expected InvalidSampleRate, got {other:?}"),
            }
        }
    }

    #[test]
    fn transport_from_str() {
        assert_eq!("udp".parse::<Transport>().unwrap(), Transport::Udp);
        assert_eq!("HTTP".parse::<Transport>().unwrap(), Transport::Http);

        match "carrier-pigeon".parse::<Transport>() {
            Err(ConfigError::UnknownTransport { name }) => assert_eq!(name, "carrier-pigeon"),
            other => panic!("expected UnknownTransport, got {other:?}"),
        }
    }

    #[test]
    fn global_tags_preserve_order_and_duplicates() {
        let config = MetricsConfigBuilder::default()
            .with_tag("env", "prod")
            .with_tag("host", "a")
            .with_tag("env", "canary")
            .build();

        assert_eq!(
            config.tags(),
            &[
                ("env".to_string(), "prod".to_string()),
                ("host".to_string(), "a".to_string()),
                ("env".to_string(), "canary".to_string()),
            ]
        );
    }
}
