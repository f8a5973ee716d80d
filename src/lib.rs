//! A buffered client for shipping telemetry to a line-protocol metrics collector.
//!
//! Application code and instrumentation hooks produce individual observations
//! ([`DataPoint`]s: custom counters/gauges/timers and HTTP request timers), and the
//! client accumulates them, applies statistical sampling, serializes them into the
//! collector's line format, and flushes them in batches over UDP or HTTP.
//!
//! # Usage
//!
//! ```no_run
//! use statline::{CustomMetric, MetricType, MetricsConfigBuilder, MetricsHolder, Transport};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! // Resolve the configuration once; it is shared read-only by every component.
//! let config = MetricsConfigBuilder::default()
//!     .with_host("collector.internal")
//!     .with_port(2013)
//!     .with_transport(Transport::Udp)
//!     .with_prefix("web")
//!     .with_app("checkout")
//!     .build();
//!
//! // The holder owns the buffer, the flush timer, and the sender.
//! let holder = MetricsHolder::from_config(config)?;
//!
//! // Record observations. The return value reports admission (sampling and
//! // dry-run rejections are expected outcomes, not errors).
//! let point = CustomMetric::builder("requests", MetricType::Counter)
//!     .with_value(1)
//!     .with_tag("region", "eu-west-1")
//!     .build();
//! holder.add_metric(point.into());
//!
//! // Flush whatever is left and release the transport. The future resolves
//! // once the transport has confirmed (or failed) the final send.
//! holder.close().await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Batching
//!
//! Points are buffered until either the buffer reaches the configured flush size or
//! the flush interval elapses, whichever comes first. Each flush atomically swaps
//! the buffer out, so a point recorded during an in-flight flush lands in the next
//! batch; points are never lost at the boundary and never sent twice.
//!
//! # Delivery
//!
//! Delivery is best-effort: transport failures are reported (and logged) but the
//! batch is dropped, never retried. Losing telemetry must never block or crash the
//! instrumented application.

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![deny(missing_docs)]

mod config;
pub use self::config::{ConfigError, MetricsConfig, MetricsConfigBuilder, Transport};

mod line;
pub use self::line::{Aggregation, AggregationFreq, LineBuilder, MetricType};

mod point;
pub use self::point::{CustomMetric, CustomMetricBuilder, DataPoint, HttpTimer, HttpTimerKind};

mod holder;
pub use self::holder::MetricsHolder;

mod sampler;
pub use self::sampler::{RateSampler, Sampling};

pub mod sender;
