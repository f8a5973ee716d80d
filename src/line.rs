//! Wire-format vocabulary and the line builder.
//!
//! A line is the fully serialized textual form of one data point:
//!
//! ```text
//! prefix.namespace.type.name[,tag=val]* value timestamp [agg,agg,...,freq] [sampleRate]
//! ```
//!
//! The token order and separator choice (`.` for identifier segments, `,` for
//! tags and aggregations, space elsewhere) are the contract with the remote
//! collector, which parses by position. Lines carry no trailing line break;
//! batching joins them with `\n`.

/// Kind of metric carried by a data point.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MetricType {
    /// Monotonic count of events.
    Counter,
    /// Point-in-time value.
    Gauge,
    /// Duration measurement.
    Timer,
}

impl MetricType {
    /// Identifier segment for this metric type.
    pub fn as_str(self) -> &'static str {
        match self {
            MetricType::Counter => "counter",
            MetricType::Gauge => "gauge",
            MetricType::Timer => "timer",
        }
    }
}

/// Aggregation the collector should apply to a metric.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[allow(missing_docs)]
pub enum Aggregation {
    Avg,
    Count,
    Sum,
    First,
    Last,
    Min,
    Max,
    P90,
    P95,
}

impl Aggregation {
    /// Wire token for this aggregation.
    pub fn as_str(self) -> &'static str {
        match self {
            Aggregation::Avg => "avg",
            Aggregation::Count => "count",
            Aggregation::Sum => "sum",
            Aggregation::First => "first",
            Aggregation::Last => "last",
            Aggregation::Min => "min",
            Aggregation::Max => "max",
            Aggregation::P90 => "p90",
            Aggregation::P95 => "p95",
        }
    }
}

/// Interval, in seconds, over which the collector aggregates.
///
/// The collector only accepts this closed set of intervals.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[allow(missing_docs)]
pub enum AggregationFreq {
    Freq10,
    Freq30,
    Freq60,
    Freq120,
    Freq180,
    Freq300,
}

impl AggregationFreq {
    /// Wire token for this frequency.
    pub fn as_str(self) -> &'static str {
        match self {
            AggregationFreq::Freq10 => "10",
            AggregationFreq::Freq30 => "30",
            AggregationFreq::Freq60 => "60",
            AggregationFreq::Freq120 => "120",
            AggregationFreq::Freq180 => "180",
            AggregationFreq::Freq300 => "300",
        }
    }
}

/// Single-use accumulator that serializes one data point into one line.
///
/// Build one per line, fill it with `with_*` calls, and consume it with
/// [`build`](LineBuilder::build). Tags render in insertion order with no
/// deduplication; the app tag, when present, always renders first.
#[derive(Debug, Default)]
pub struct LineBuilder {
    prefix: String,
    namespace: String,
    metric_type: Option<MetricType>,
    metric_name: String,
    app: Option<String>,
    tags: Vec<(String, String)>,
    value: String,
    timestamp: u64,
    aggregations: Vec<Aggregation>,
    frequency: Option<AggregationFreq>,
    sample_rate: Option<u32>,
}

impl LineBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the prefix segment.
    #[must_use]
    pub fn with_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Set the namespace segment.
    #[must_use]
    pub fn with_namespace<S: Into<String>>(mut self, namespace: S) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Set the metric type segment. Unset, the segment is omitted.
    #[must_use]
    pub fn with_metric_type(mut self, metric_type: MetricType) -> Self {
        self.metric_type = Some(metric_type);
        self
    }

    /// Set the metric name segment.
    #[must_use]
    pub fn with_metric_name<S: Into<String>>(mut self, metric_name: S) -> Self {
        self.metric_name = metric_name.into();
        self
    }

    /// Set the application tag, rendered before all other tags.
    #[must_use]
    pub fn with_app<S: Into<String>>(mut self, app: S) -> Self {
        self.app = Some(app.into());
        self
    }

    /// Append one tag. Repeated keys are preserved as separate entries.
    #[must_use]
    pub fn with_tag<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.tags.push((key.into(), value.into()));
        self
    }

    /// Set the value token, rendered verbatim.
    #[must_use]
    pub fn with_value<S: Into<String>>(mut self, value: S) -> Self {
        self.value = value.into();
        self
    }

    /// Set the capture timestamp (seconds since epoch).
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Set the aggregations to request from the collector.
    #[must_use]
    pub fn with_aggregations(mut self, aggregations: Vec<Aggregation>) -> Self {
        self.aggregations = aggregations;
        self
    }

    /// Set the aggregation frequency.
    #[must_use]
    pub fn with_frequency(mut self, frequency: AggregationFreq) -> Self {
        self.frequency = Some(frequency);
        self
    }

    /// Set the trailing sample rate.
    #[must_use]
    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = Some(sample_rate);
        self
    }

    /// Serialize the line, without a trailing line break.
    ///
    /// The aggregation segment renders only when both a non-empty aggregation
    /// set and a frequency are present; a frequency alone emits nothing. The
    /// sample rate renders only when set.
    pub fn build(self) -> String {
        let mut itoa_buf = itoa::Buffer::new();
        let mut line = String::with_capacity(64);

        line.push_str(&self.prefix);
        line.push('.');
        line.push_str(&self.namespace);
        line.push('.');
        if let Some(metric_type) = self.metric_type {
            line.push_str(metric_type.as_str());
            line.push('.');
        }
        line.push_str(&self.metric_name);

        if let Some(app) = &self.app {
            line.push_str(",app=");
            line.push_str(app);
        }
        for (key, value) in &self.tags {
            line.push(',');
            line.push_str(key);
            line.push('=');
            line.push_str(value);
        }

        line.push(' ');
        line.push_str(&self.value);
        line.push(' ');
        line.push_str(itoa_buf.format(self.timestamp));

        if !self.aggregations.is_empty() {
            if let Some(frequency) = self.frequency {
                line.push(' ');
                for aggregation in &self.aggregations {
                    line.push_str(aggregation.as_str());
                    line.push(',');
                }
                line.push_str(frequency.as_str());
            }
        }

        if let Some(sample_rate) = self.sample_rate {
            line.push(' ');
            line.push_str(itoa_buf.format(sample_rate));
        }

        line
    }
}
