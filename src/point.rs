use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::{ConfigError, MetricsConfig};
use crate::line::{Aggregation, AggregationFreq, LineBuilder, MetricType};

/// Capture time in seconds since the epoch, truncated from the millisecond
/// clock.
fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}

/// One observation, immutable from creation until it is rendered and shipped.
///
/// The set of variants is closed: every variant knows how to render itself to
/// a wire line given only the shared configuration.
#[derive(Clone, Debug)]
pub enum DataPoint {
    /// An application-defined metric.
    Custom(CustomMetric),
    /// A timer synthesized from HTTP request metadata.
    Http(HttpTimer),
}

impl DataPoint {
    /// Render this point into its wire line, without a trailing line break.
    ///
    /// # Errors
    ///
    /// Fails with [`ConfigError::MissingPrefix`] when the configuration
    /// carries no metric prefix.
    pub fn to_line(&self, config: &MetricsConfig) -> Result<String, ConfigError> {
        match self {
            DataPoint::Custom(metric) => metric.to_line(config),
            DataPoint::Http(timer) => timer.to_line(config),
        }
    }
}

impl From<CustomMetric> for DataPoint {
    fn from(metric: CustomMetric) -> Self {
        DataPoint::Custom(metric)
    }
}

impl From<HttpTimer> for DataPoint {
    fn from(timer: HttpTimer) -> Self {
        DataPoint::Http(timer)
    }
}

/// An application-defined metric observation.
///
/// Renders with the point's own tags first (in insertion order) followed by
/// the configuration's global tags, and always carries the configured sample
/// rate. A timer-typed metric without explicit aggregations falls back to the
/// configured timer defaults.
#[derive(Clone, Debug)]
pub struct CustomMetric {
    name: String,
    value: i64,
    tags: Vec<(String, String)>,
    metric_type: MetricType,
    aggregations: Option<Vec<Aggregation>>,
    frequency: Option<AggregationFreq>,
    timestamp: u64,
}

impl CustomMetric {
    /// Start building a metric with the two required fields.
    pub fn builder<S: Into<String>>(name: S, metric_type: MetricType) -> CustomMetricBuilder {
        CustomMetricBuilder {
            name: name.into(),
            value: 0,
            tags: Vec::new(),
            metric_type,
            aggregations: None,
            frequency: None,
            timestamp: None,
        }
    }

    fn to_line(&self, config: &MetricsConfig) -> Result<String, ConfigError> {
        let prefix = config.prefix().ok_or(ConfigError::MissingPrefix)?;

        let mut value_buf = itoa::Buffer::new();
        let mut builder = LineBuilder::new()
            .with_prefix(prefix)
            .with_namespace(config.namespace())
            .with_metric_type(self.metric_type)
            .with_metric_name(self.name.as_str())
            .with_value(value_buf.format(self.value))
            .with_timestamp(self.timestamp)
            .with_sample_rate(config.sample_rate());

        if let Some(app) = config.app() {
            builder = builder.with_app(app);
        }
        for (key, value) in &self.tags {
            builder = builder.with_tag(key.as_str(), value.as_str());
        }
        for (key, value) in config.tags() {
            builder = builder.with_tag(key.as_str(), value.as_str());
        }

        match &self.aggregations {
            Some(aggregations) => {
                builder = builder
                    .with_aggregations(aggregations.clone())
                    .with_frequency(self.frequency.unwrap_or(config.timer_frequency()));
            }
            None if self.metric_type == MetricType::Timer => {
                builder = builder
                    .with_aggregations(config.timer_aggregations().to_vec())
                    .with_frequency(config.timer_frequency());
            }
            None => {}
        }

        Ok(builder.build())
    }
}

/// Builder for [`CustomMetric`].
#[derive(Clone, Debug)]
pub struct CustomMetricBuilder {
    name: String,
    value: i64,
    tags: Vec<(String, String)>,
    metric_type: MetricType,
    aggregations: Option<Vec<Aggregation>>,
    frequency: Option<AggregationFreq>,
    timestamp: Option<u64>,
}

impl CustomMetricBuilder {
    /// Set the observed value.
    #[must_use]
    pub fn with_value(mut self, value: i64) -> Self {
        self.value = value;
        self
    }

    /// Append one tag specific to this observation.
    #[must_use]
    pub fn with_tag<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.tags.push((key.into(), value.into()));
        self
    }

    /// Set explicit aggregations, overriding any configured defaults.
    #[must_use]
    pub fn with_aggregations(mut self, aggregations: Vec<Aggregation>) -> Self {
        self.aggregations = Some(aggregations);
        self
    }

    /// Set an explicit aggregation frequency.
    #[must_use]
    pub fn with_frequency(mut self, frequency: AggregationFreq) -> Self {
        self.frequency = Some(frequency);
        self
    }

    /// Override the capture timestamp (seconds since epoch). Defaults to the
    /// time [`build`](Self::build) is called.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Finalize the metric, capturing the current time unless a timestamp was
    /// set explicitly.
    pub fn build(self) -> CustomMetric {
        CustomMetric {
            name: self.name,
            value: self.value,
            tags: self.tags,
            metric_type: self.metric_type,
            aggregations: self.aggregations,
            frequency: self.frequency,
            timestamp: self.timestamp.unwrap_or_else(unix_timestamp),
        }
    }
}

/// Whether an HTTP timer was observed on the serving or the calling side.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HttpTimerKind {
    /// Request handled by this process.
    Server,
    /// Request issued by this process.
    Client,
}

impl HttpTimerKind {
    fn as_str(self) -> &'static str {
        match self {
            HttpTimerKind::Server => "server",
            HttpTimerKind::Client => "client",
        }
    }
}

/// A timer observation synthesized from HTTP request metadata.
///
/// Always renders as metric type `timer` with tags describing the transport,
/// side, verb and status code; client timers additionally carry the tracked
/// request name as a `request` tag. Aggregations and frequency come from the
/// configured timer defaults. Unlike custom metrics, HTTP timers carry neither
/// the global tag list nor a sample rate token.
#[derive(Clone, Debug)]
pub struct HttpTimer {
    metric_name: String,
    request: Option<String>,
    verb: String,
    status_code: u16,
    duration_ms: u64,
    kind: HttpTimerKind,
    timestamp: u64,
}

impl HttpTimer {
    /// Create a server-side timer. The capture timestamp is taken now.
    pub fn server<M, V>(metric_name: M, verb: V, status_code: u16, duration_ms: u64) -> Self
    where
        M: Into<String>,
        V: Into<String>,
    {
        HttpTimer {
            metric_name: metric_name.into(),
            request: None,
            verb: verb.into(),
            status_code,
            duration_ms,
            kind: HttpTimerKind::Server,
            timestamp: unix_timestamp(),
        }
    }

    /// Create a client-side timer for the named tracked request. The capture
    /// timestamp is taken now.
    pub fn client<M, R, V>(
        metric_name: M,
        request_name: R,
        verb: V,
        status_code: u16,
        duration_ms: u64,
    ) -> Self
    where
        M: Into<String>,
        R: Into<String>,
        V: Into<String>,
    {
        HttpTimer {
            metric_name: metric_name.into(),
            request: Some(request_name.into()),
            verb: verb.into(),
            status_code,
            duration_ms,
            kind: HttpTimerKind::Client,
            timestamp: unix_timestamp(),
        }
    }

    #[cfg(test)]
    fn at_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }

    fn to_line(&self, config: &MetricsConfig) -> Result<String, ConfigError> {
        let prefix = config.prefix().ok_or(ConfigError::MissingPrefix)?;

        let mut status_buf = itoa::Buffer::new();
        let mut value_buf = itoa::Buffer::new();
        let mut builder = LineBuilder::new()
            .with_prefix(prefix)
            .with_namespace(config.namespace())
            .with_metric_type(MetricType::Timer)
            .with_metric_name(self.metric_name.as_str())
            .with_tag("transport", "http")
            .with_tag("type", self.kind.as_str())
            .with_tag("verb", self.verb.as_str())
            .with_tag("statusCode", status_buf.format(self.status_code))
            .with_value(value_buf.format(self.duration_ms))
            .with_timestamp(self.timestamp)
            .with_aggregations(config.timer_aggregations().to_vec())
            .with_frequency(config.timer_frequency());

        if let Some(request) = &self.request {
            builder = builder.with_tag("request", request.as_str());
        }
        if let Some(app) = config.app() {
            builder = builder.with_app(app);
        }

        Ok(builder.build())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{CustomMetric, DataPoint, HttpTimer};
    use crate::config::{ConfigError, MetricsConfig, MetricsConfigBuilder};
    use crate::line::{Aggregation, AggregationFreq, MetricType};

    fn config() -> Arc<MetricsConfig> {
        MetricsConfigBuilder::default().with_prefix("web").with_namespace("orders").build()
    }

    #[test]
    fn custom_metric_line() {
        let point: DataPoint = CustomMetric::builder("filled", MetricType::Counter)
            .with_value(3)
            .with_tag("region", "eu")
            .with_timestamp(1_500_000_000)
            .build()
            .into();

        assert_eq!(
            point.to_line(&config()).unwrap(),
            "web.orders.counter.filled,region=eu 3 1500000000 100"
        );
    }

    #[test]
    fn custom_metric_orders_app_own_and_global_tags() {
        let config = MetricsConfigBuilder::default()
            .with_prefix("web")
            .with_app("checkout")
            .with_tag("env", "prod")
            .build();

        let point: DataPoint = CustomMetric::builder("filled", MetricType::Counter)
            .with_value(1)
            .with_tag("region", "eu")
            .with_timestamp(7)
            .build()
            .into();

        assert_eq!(
            point.to_line(&config).unwrap(),
            "web.application.counter.filled,app=checkout,region=eu,env=prod 1 7 100"
        );
    }

    #[test]
    fn custom_timer_falls_back_to_configured_aggregations() {
        let point: DataPoint = CustomMetric::builder("execution", MetricType::Timer)
            .with_value(240)
            .with_timestamp(9)
            .build()
            .into();

        assert_eq!(
            point.to_line(&config()).unwrap(),
            "web.orders.timer.execution 240 9 avg,p90,count,10 100"
        );
    }

    #[test]
    fn custom_metric_explicit_aggregations_win() {
        let point: DataPoint = CustomMetric::builder("execution", MetricType::Timer)
            .with_value(240)
            .with_aggregations(vec![Aggregation::Max])
            .with_frequency(AggregationFreq::Freq60)
            .with_timestamp(9)
            .build()
            .into();

        assert_eq!(
            point.to_line(&config()).unwrap(),
            "web.orders.timer.execution 240 9 max,60 100"
        );
    }

    #[test]
    fn http_server_timer_line() {
        let point: DataPoint =
            HttpTimer::server("execution", "GET", 200, 145).at_timestamp(42).into();

        assert_eq!(
            point.to_line(&config()).unwrap(),
            "web.orders.timer.execution,transport=http,type=server,verb=GET,statusCode=200 \
             145 42 avg,p90,count,10"
        );
    }

    #[test]
    fn http_client_timer_carries_request_tag() {
        let point: DataPoint =
            HttpTimer::client("execution", "get-user", "GET", 404, 31).at_timestamp(42).into();

        assert_eq!(
            point.to_line(&config()).unwrap(),
            "web.orders.timer.execution,transport=http,type=client,verb=GET,statusCode=404,\
             request=get-user 31 42 avg,p90,count,10"
        );
    }

    #[test]
    fn missing_prefix_is_a_render_error() {
        let config = MetricsConfigBuilder::default().build();
        let point: DataPoint =
            CustomMetric::builder("filled", MetricType::Counter).build().into();

        assert!(matches!(point.to_line(&config), Err(ConfigError::MissingPrefix)));
    }
}
