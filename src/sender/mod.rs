//! Transport-specific delivery of rendered batches.
//!
//! A [`Sender`] accepts a batch of data points, renders each one through the
//! line builder, and ships the newline-joined result as a single network
//! operation. Delivery is best-effort: a failed batch is reported through the
//! returned future and dropped, never requeued.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use thiserror::Error;

use crate::config::{ConfigError, MetricsConfig, Transport};
use crate::point::DataPoint;

#[cfg(feature = "http")]
mod http;
#[cfg(feature = "http")]
pub use self::http::HttpSender;

mod udp;
pub use self::udp::UdpSender;

/// Future resolved when a transport operation completes.
///
/// Awaiting it is the completion handler; spawning it and dropping the result
/// is fire-and-forget.
pub type SendFuture<'a> = Pin<Box<dyn Future<Output = Result<(), SendError>> + Send + 'a>>;

/// Errors reported by a transport while delivering a batch.
#[derive(Debug, Error)]
pub enum SendError {
    /// A point could not be rendered into a line.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The socket operation failed.
    #[error("i/o error while sending batch: {0}")]
    Io(#[from] std::io::Error),

    /// The request did not complete within the configured timeout.
    #[error("timed out while sending batch")]
    Timeout,

    /// The collector answered with a non-success status.
    #[error("collector returned non-success status {status}")]
    Http {
        /// The HTTP status code.
        status: u16,
    },

    /// The HTTP transport failed below the status-code level.
    #[error("transport error while sending batch: {reason}")]
    Transport {
        /// Details about the failure.
        reason: String,
    },
}

/// Transport-specific delivery of a batch of rendered lines.
pub trait Sender: Send + Sync {
    /// Short identifier of the underlying transport (`udp`, `http`).
    fn transport_id(&self) -> &'static str;

    /// Render the batch and transmit it as one network operation.
    ///
    /// An empty batch resolves immediately without touching the network.
    fn send<'a>(&'a self, batch: &'a [DataPoint]) -> SendFuture<'a>;

    /// Release transport resources. No send may be issued afterwards.
    fn close(&self) -> SendFuture<'_>;
}

/// Construct the sender selected by the configuration's transport.
///
/// # Errors
///
/// Returns a [`ConfigError`] when the selected transport cannot be
/// constructed, such as an HTTP endpoint that does not form a valid URI or a
/// transport that is not compiled into this build.
pub fn from_config(config: &Arc<MetricsConfig>) -> Result<Box<dyn Sender>, ConfigError> {
    match config.transport() {
        Transport::Udp => Ok(Box::new(UdpSender::new(Arc::clone(config)))),
        #[cfg(feature = "http")]
        Transport::Http => Ok(Box::new(HttpSender::new(Arc::clone(config))?)),
        #[cfg(not(feature = "http"))]
        Transport::Http => Err(ConfigError::TransportUnavailable { name: "http" }),
    }
}

/// Render every point and join the lines with `\n` into one payload.
pub(crate) fn render_batch(
    batch: &[DataPoint],
    config: &MetricsConfig,
) -> Result<String, ConfigError> {
    let mut payload = String::with_capacity(batch.len() * 64);
    for (index, point) in batch.iter().enumerate() {
        if index > 0 {
            payload.push('\n');
        }
        payload.push_str(&point.to_line(config)?);
    }
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{from_config, render_batch};
    use crate::config::{ConfigError, MetricsConfig, MetricsConfigBuilder, Transport};
    use crate::line::MetricType;
    use crate::point::{CustomMetric, DataPoint};

    fn config_for(transport: Transport) -> Arc<MetricsConfig> {
        MetricsConfigBuilder::default()
            .with_prefix("web")
            .with_transport(transport)
            .build()
    }

    #[test]
    fn factory_selects_udp() {
        let sender = from_config(&config_for(Transport::Udp)).unwrap();
        assert_eq!(sender.transport_id(), "udp");
    }

    #[cfg(feature = "http")]
    #[test]
    fn factory_selects_http() {
        let sender = from_config(&config_for(Transport::Http)).unwrap();
        assert_eq!(sender.transport_id(), "http");
    }

    #[test]
    fn batch_rendering_joins_without_trailing_newline() {
        let config = config_for(Transport::Udp);
        let batch: Vec<DataPoint> = (0..3)
            .map(|value| {
                CustomMetric::builder("filled", MetricType::Counter)
                    .with_value(value)
                    .with_timestamp(1)
                    .build()
                    .into()
            })
            .collect();

        let payload = render_batch(&batch, &config).unwrap();
        assert_eq!(payload.lines().count(), 3);
        assert!(!payload.ends_with('\n'));
        assert_eq!(payload.lines().next().unwrap(), "web.application.counter.filled 0 1 100");
    }

    #[test]
    fn batch_rendering_surfaces_missing_prefix() {
        let config = MetricsConfigBuilder::default().build();
        let batch: Vec<DataPoint> =
            vec![CustomMetric::builder("filled", MetricType::Counter).build().into()];

        assert!(matches!(render_batch(&batch, &config), Err(ConfigError::MissingPrefix)));
    }
}
