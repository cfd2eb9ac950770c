//! Engine socket connection
//!
//! One request per connection: the query is written, the write side is
//! shut down and the answer is read until the engine closes the socket.

use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
#[cfg(unix)]
use tokio::net::UnixStream;
use tokio::time::timeout;
use tracing::{debug, error, warn};

use crate::endpoint::Endpoint;
use crate::error::{ClientError, Result};

/// Open connection to the engine
#[derive(Debug)]
pub enum EngineConnection {
    #[cfg(unix)]
    Unix(UnixStream),
    Tcp(TcpStream),
}

impl EngineConnection {
    /// Connect to `endpoint`, giving up after `timeout_duration`
    pub async fn connect(endpoint: &Endpoint, timeout_duration: Duration) -> Result<Self> {
        debug!("Connecting to event daemon: {}", endpoint);
        match endpoint {
            #[cfg(unix)]
            Endpoint::Unix(path) => match timeout(timeout_duration, UnixStream::connect(path)).await
            {
                Ok(Ok(stream)) => Ok(EngineConnection::Unix(stream)),
                Ok(Err(e)) => {
                    error!("Connect err: {} - {}", endpoint, e);
                    Err(ClientError::Connection(format!("{endpoint}: {e}")))
                },
                Err(_) => {
                    warn!("Connect timeout: {}", endpoint);
                    Err(ClientError::Timeout(format!(
                        "Connection to {endpoint} timed out"
                    )))
                },
            },
            #[cfg(not(unix))]
            Endpoint::Unix(_) => Err(ClientError::InvalidEndpoint(format!(
                "{endpoint}: Unix sockets are not supported on this platform"
            ))),
            Endpoint::Tcp { host, port } => {
                let addr = format!("{host}:{port}");
                match timeout(timeout_duration, TcpStream::connect(&addr)).await {
                    Ok(Ok(stream)) => {
                        if let Err(e) = stream.set_nodelay(true) {
                            debug!("TCP_NODELAY: {}", e);
                        }
                        Ok(EngineConnection::Tcp(stream))
                    },
                    Ok(Err(e)) => {
                        error!("Connect err: {} - {}", endpoint, e);
                        Err(ClientError::Connection(format!("{endpoint}: {e}")))
                    },
                    Err(_) => {
                        warn!("Connect timeout: {}", endpoint);
                        Err(ClientError::Timeout(format!(
                            "Connection to {endpoint} timed out"
                        )))
                    },
                }
            },
        }
    }

    /// Send `query`, half-close and read the complete answer
    pub async fn exchange(mut self, query: &str, timeout_duration: Duration) -> Result<String> {
        let mut answer = Vec::new();
        let io = async {
            match &mut self {
                #[cfg(unix)]
                EngineConnection::Unix(stream) => {
                    stream.write_all(query.as_bytes()).await?;
                    stream.shutdown().await?;
                    stream.read_to_end(&mut answer).await
                },
                EngineConnection::Tcp(stream) => {
                    stream.write_all(query.as_bytes()).await?;
                    stream.shutdown().await?;
                    stream.read_to_end(&mut answer).await
                },
            }
        };

        match timeout(timeout_duration, io).await {
            Ok(Ok(n)) => debug!("Event daemon RX: {}B", n),
            Ok(Err(e)) => return Err(ClientError::Io(e.to_string())),
            Err(_) => {
                return Err(ClientError::Timeout(
                    "No answer from event daemon".to_string(),
                ))
            },
        }

        String::from_utf8(answer).map_err(|e| ClientError::Protocol(e.to_string()))
    }
}
