//! UDP transport for the broadcast session.
//!
//! One datagram socket bound to an ephemeral local endpoint and connected
//! to the configured remote. The read loop hands every datagram to the
//! protocol engine and surfaces a timeout to the caller when the server
//! goes silent; the supervisor decides what that means.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Result, TelemetryError};
use crate::protocol::engine::{ProtocolEngine, SendFn};

/// Large enough for every defined inbound message.
pub const READ_BUFFER_SIZE: usize = 32 * 1024;

/// Read deadline; a silent server is surfaced after this long.
pub const READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Connected datagram socket plus the session's cancellation token.
pub struct Transport {
    socket: Arc<UdpSocket>,
    cancel: CancellationToken,
}

impl Transport {
    /// Binds an ephemeral local endpoint and connects it to the remote.
    pub async fn connect(remote: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(("0.0.0.0", 0))
            .await
            .map_err(|e| TelemetryError::transport("bind", e))?;
        socket.connect(remote).await.map_err(|e| TelemetryError::transport("connect", e))?;

        info!(%remote, "transport connected");
        Ok(Transport { socket: Arc::new(socket), cancel: CancellationToken::new() })
    }

    /// Best-effort datagram write; a short write is an error.
    pub fn send(&self, data: &[u8]) -> Result<()> {
        let written =
            self.socket.try_send(data).map_err(|e| TelemetryError::transport("send", e))?;
        if written != data.len() {
            return Err(TelemetryError::PartialWrite { written, expected: data.len() });
        }
        Ok(())
    }

    /// Write path to hand to a [`ProtocolEngine`].
    pub fn sender(&self) -> SendFn {
        let socket = Arc::clone(&self.socket);
        Box::new(move |data: &[u8]| {
            let written =
                socket.try_send(data).map_err(|e| TelemetryError::transport("send", e))?;
            if written != data.len() {
                return Err(TelemetryError::PartialWrite { written, expected: data.len() });
            }
            Ok(())
        })
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Requests the read loop to exit; idempotent.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Reads datagrams until cancelled or timed out.
    ///
    /// Codec errors abort only the offending frame; the loop keeps
    /// reading. A read deadline miss returns [`TelemetryError::Timeout`].
    pub async fn read_loop(&self, engine: Arc<ProtocolEngine>) -> Result<()> {
        let mut buf = vec![0u8; READ_BUFFER_SIZE];

        loop {
            let received = tokio::select! {
                _ = self.cancel.cancelled() => {
                    debug!("transport reader cancelled");
                    return Ok(());
                }
                r = tokio::time::timeout(READ_TIMEOUT, self.socket.recv(&mut buf)) => r,
            };

            let n = match received {
                Err(_) => return Err(TelemetryError::Timeout { duration: READ_TIMEOUT }),
                Ok(Err(e)) => {
                    if self.cancel.is_cancelled() {
                        return Ok(());
                    }
                    return Err(TelemetryError::transport("recv", e));
                }
                Ok(Ok(n)) => n,
            };

            if n == 0 {
                continue;
            }

            if let Err(e) = engine.process_inbound(&buf[..n]) {
                warn!(error = %e, bytes = n, "inbound frame rejected");
            }
        }
    }
}
