//! End-to-end delivery over a real loopback UDP socket.

use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::timeout;

use statline::{CustomMetric, MetricType, MetricsConfigBuilder, MetricsHolder, Transport};

async fn recv_payload(socket: &UdpSocket) -> String {
    let mut buf = vec![0u8; 64 * 1024];
    let (len, _addr) = timeout(Duration::from_secs(5), socket.recv_from(&mut buf))
        .await
        .expect("no datagram within timeout")
        .expect("recv failed");
    String::from_utf8(buf[..len].to_vec()).expect("payload not utf-8")
}

#[tokio::test]
async fn size_triggered_batch_arrives_as_one_datagram() {
    let collector = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let port = collector.local_addr().unwrap().port();

    let config = MetricsConfigBuilder::default()
        .with_host("127.0.0.1")
        .with_port(port)
        .with_transport(Transport::Udp)
        .with_prefix("itest")
        .with_flush_size(3)
        .with_flush_interval(Duration::from_secs(3600))
        .build();
    let holder = MetricsHolder::from_config(config).unwrap();

    for value in 0..3 {
        let point = CustomMetric::builder("batch", MetricType::Counter)
            .with_value(value)
            .with_timestamp(1)
            .build();
        assert!(holder.add_metric(point.into()));
    }

    let payload = recv_payload(&collector).await;
    let lines: Vec<&str> = payload.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "itest.application.counter.batch 0 1 100");
    assert_eq!(lines[2], "itest.application.counter.batch 2 1 100");

    holder.close().await.unwrap();
}

#[tokio::test]
async fn close_ships_the_residual_batch() {
    let collector = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let port = collector.local_addr().unwrap().port();

    let config = MetricsConfigBuilder::default()
        .with_host("127.0.0.1")
        .with_port(port)
        .with_transport(Transport::Udp)
        .with_prefix("itest")
        .with_flush_interval(Duration::from_secs(3600))
        .build();
    let holder = MetricsHolder::from_config(config).unwrap();

    let point = CustomMetric::builder("residual", MetricType::Gauge)
        .with_value(7)
        .with_timestamp(2)
        .build();
    assert!(holder.add_metric(point.into()));

    holder.close().await.unwrap();

    let payload = recv_payload(&collector).await;
    assert_eq!(payload, "itest.application.gauge.residual 7 2 100");
}
