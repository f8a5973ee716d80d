use std::net::Ipv4Addr;
use std::sync::Arc;

use tokio::net::UdpSocket;
use tracing::debug;

use crate::config::MetricsConfig;
use crate::point::DataPoint;

use super::{render_batch, SendFuture, Sender};

/// Ships each batch as a single datagram to the configured collector.
///
/// The socket is bound fresh for every send; there is no connection state to
/// maintain and a failed send leaves nothing to tear down.
pub struct UdpSender {
    config: Arc<MetricsConfig>,
}

impl UdpSender {
    /// Create a sender targeting the configured host and port.
    pub fn new(config: Arc<MetricsConfig>) -> Self {
        UdpSender { config }
    }
}

impl Sender for UdpSender {
    fn transport_id(&self) -> &'static str {
        "udp"
    }

    fn send<'a>(&'a self, batch: &'a [DataPoint]) -> SendFuture<'a> {
        Box::pin(async move {
            if batch.is_empty() {
                return Ok(());
            }

            let payload = render_batch(batch, &self.config)?;

            let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
            let sent = socket
                .send_to(payload.as_bytes(), (self.config.host(), self.config.port()))
                .await?;

            debug!(points = batch.len(), bytes = sent, "shipped batch over udp");
            Ok(())
        })
    }

    fn close(&self) -> SendFuture<'_> {
        Box::pin(async { Ok(()) })
    }
}
