//! DogStatsD sink

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};

use tokio::net::UdpSocket;
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::Gauge;

use super::MetricSink;

/// Sends gauges to a Datadog agent as DogStatsD datagrams
pub struct StatsdSink {
    socket: UdpSocket,
    target: SocketAddr,
}

impl StatsdSink {
    /// Resolve `addr` and open a UDP socket aimed at it
    pub async fn connect(addr: &str) -> Result<Self> {
        let target = tokio::net::lookup_host(addr)
            .await?
            .next()
            .ok_or_else(|| Error::config(format!("statsd address '{addr}' did not resolve")))?;

        let local: SocketAddr = if target.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };

        let socket = UdpSocket::bind(local).await?;
        socket.connect(target).await?;

        debug!(%target, "DogStatsD socket connected");
        Ok(Self { socket, target })
    }

    /// Agent address
    pub fn target(&self) -> SocketAddr {
        self.target
    }
}

#[async_trait::async_trait]
impl MetricSink for StatsdSink {
    async fn gauge(&self, gauge: &Gauge) -> Result<()> {
        let line = format_line(gauge);
        self.socket.send(line.as_bytes()).await?;
        debug!(line = %line, "DogStatsD datagram sent");
        Ok(())
    }
}

/// Render a gauge as a DogStatsD line: `name:value|g|#tag1,tag2`
pub fn format_line(gauge: &Gauge) -> String {
    let mut line = format!("{}:{}|g", gauge.name, gauge.value);
    if !gauge.tags.is_empty() {
        line.push_str("|#");
        line.push_str(&gauge.tags.join(","));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_format_untagged() {
        let gauge = Gauge::new("vanguard.pi.cpu_temp", 57.25, Utc::now());
        assert_eq!(format_line(&gauge), "vanguard.pi.cpu_temp:57.25|g");
    }

    #[test]
    fn test_format_tagged() {
        let gauge = Gauge::new("vanguard.pi.connectivity", 1.0, Utc::now())
            .with_tag("app:vanguard")
            .with_tag("env:test");
        assert_eq!(format_line(&gauge), "vanguard.pi.connectivity:1|g|#app:vanguard,env:test");
    }

    #[tokio::test]
    async fn test_datagram_reaches_agent() {
        let agent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = agent.local_addr().unwrap();

        let sink = StatsdSink::connect(&addr.to_string()).await.unwrap();
        assert_eq!(sink.target(), addr);

        let gauge =
            Gauge::new("vanguard.pi.connectivity", 1.0, Utc::now()).with_tag("app:vanguard");
        sink.gauge(&gauge).await.unwrap();

        let mut buf = [0u8; 512];
        let (len, _) = agent.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], b"vanguard.pi.connectivity:1|g|#app:vanguard");
    }

    /// With no agent listening, the kernel reports the refusal on a later send
    #[tokio::test]
    async fn test_refused_send_is_io_error() {
        let addr = {
            let agent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
            agent.local_addr().unwrap()
        };

        let sink = StatsdSink::connect(&addr.to_string()).await.unwrap();
        let gauge = Gauge::new("vanguard.pi.cpu_temp", 50.0, Utc::now());

        let mut refused = false;
        for _ in 0..50 {
            match sink.gauge(&gauge).await {
                Ok(()) => tokio::time::sleep(std::time::Duration::from_millis(10)).await,
                Err(Error::Io(e)) => {
                    assert_eq!(e.kind(), std::io::ErrorKind::ConnectionRefused);
                    refused = true;
                    break;
                }
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert!(refused, "no send reported the closed port");
    }
}
