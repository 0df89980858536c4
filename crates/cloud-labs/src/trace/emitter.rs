//! Segment delivery to the trace daemon

use async_trait::async_trait;
use tokio::net::UdpSocket;

use super::segment::Segment;
use crate::error::{Error, Result};

/// Daemon protocol header line
const PROTOCOL_HEADER: &str = "{\"format\": \"json\", \"version\": 1}";

/// Trait for sending finished segments
///
/// Implementations:
/// - `UdpEmitter`: UDP datagrams to the trace daemon
/// - `NoopEmitter`: drops everything (tracing disabled)
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SegmentEmitter: Send + Sync {
    async fn emit(&self, segment: &Segment) -> Result<()>;
}

/// Frame a segment as one daemon datagram
pub fn encode_datagram(segment: &Segment) -> Result<Vec<u8>> {
    let mut datagram = Vec::with_capacity(256);
    datagram.extend_from_slice(PROTOCOL_HEADER.as_bytes());
    datagram.push(b'\n');
    serde_json::to_writer(&mut datagram, segment)?;
    Ok(datagram)
}

/// Sends segments to the daemon over UDP
pub struct UdpEmitter {
    address: String,
}

impl UdpEmitter {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

#[async_trait]
impl SegmentEmitter for UdpEmitter {
    async fn emit(&self, segment: &Segment) -> Result<()> {
        let datagram = encode_datagram(segment)?;
        let socket = UdpSocket::bind("0.0.0.0:0")
            .await
            .map_err(|e| Error::Trace(format!("Failed to bind UDP socket: {}", e)))?;
        socket
            .send_to(&datagram, &self.address)
            .await
            .map_err(|e| {
                Error::Trace(format!("Failed to send segment to {}: {}", self.address, e))
            })?;

        tracing::debug!(
            "Sent segment {} ({} bytes) to {}",
            segment.id(),
            datagram.len(),
            self.address
        );
        Ok(())
    }
}

/// Emitter used when tracing is disabled
pub struct NoopEmitter;

#[async_trait]
impl SegmentEmitter for NoopEmitter {
    async fn emit(&self, _segment: &Segment) -> Result<()> {
        Ok(())
    }
}
