//! Newline-delimited JSON-RPC server
//!
//! Every accepted connection gets its own task. A connection handles one
//! call at a time; device calls from all connections meet at the dispatch
//! gate, so at most one exchange is ever on the wire.

use crate::methods::{MethodTable, SHUTDOWN};
use crate::protocol::{Fault, RpcRequest, RpcResponse};
use bincoms_core::{BincomsError, BincomsResult};
use bincoms_transport::ByteChannel;
use serde_json::Value as Json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;

/// Default listening address
pub const DEFAULT_ADDRESS: &str = "0.0.0.0:7912";

/// Default server name used in logs
pub const DEFAULT_NAME: &str = "logic_timer";

/// Longest request line accepted
pub const DEFAULT_MAX_LINE_LENGTH: usize = 64 * 1024;

/// Reply to a shutdown call
pub const SHUTDOWN_REPLY: &str = "Server shutdown";

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on
    pub address: SocketAddr,
    /// Name used in log lines
    pub name: String,
    /// Longest request line accepted before the connection is dropped
    pub max_line_length: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: SocketAddr::from(([0, 0, 0, 0], 7912)),
            name: DEFAULT_NAME.to_string(),
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
        }
    }
}

impl ServerConfig {
    pub fn with_address(mut self, address: SocketAddr) -> Self {
        self.address = address;
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }
}

/// Stops a running server
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    sender: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_shutdown(&self) -> bool {
        *self.sender.borrow()
    }
}

/// Server bound to its listening socket
///
/// # Usage Example
/// ```rust,no_run
/// use bincoms_server::{MethodTable, RpcServer, ServerConfig};
///
/// # async fn run(methods: MethodTable<bincoms_transport::SerialTransport>) -> bincoms_core::BincomsResult<()> {
/// let server = RpcServer::bind(ServerConfig::default(), methods).await?;
/// server.run().await?;
/// # Ok(())
/// # }
/// ```
pub struct RpcServer<C: ByteChannel> {
    listener: TcpListener,
    config: ServerConfig,
    methods: Arc<MethodTable<C>>,
    shutdown: ShutdownHandle,
}

/// Connection handler
///
/// Reads one request line, answers it, and repeats until the peer hangs up
/// or the server shuts down.
struct ClientHandler<C: ByteChannel> {
    methods: Arc<MethodTable<C>>,
    shutdown: ShutdownHandle,
    max_line_length: usize,
    peer: SocketAddr,
}

impl<C: ByteChannel + 'static> RpcServer<C> {
    /// Bind the listening socket
    ///
    /// # Errors
    /// Returns error if binding to the address fails
    pub async fn bind(config: ServerConfig, methods: MethodTable<C>) -> BincomsResult<Self> {
        let listener = TcpListener::bind(config.address).await.map_err(|e| {
            BincomsError::Connection(std::io::Error::new(
                std::io::ErrorKind::AddrNotAvailable,
                format!("Failed to bind to {}: {}", config.address, e),
            ))
        })?;
        let (sender, _) = watch::channel(false);

        Ok(Self {
            listener,
            config,
            methods: Arc::new(methods),
            shutdown: ShutdownHandle {
                sender: Arc::new(sender),
            },
        })
    }

    pub fn local_addr(&self) -> BincomsResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Accept connections until shutdown
    ///
    /// Each accepted connection is handled in a separate task.
    pub async fn run(self) -> BincomsResult<()> {
        log::info!(
            "{} server listening on {}",
            self.config.name,
            self.local_addr()?
        );
        let mut stop = self.shutdown.sender.subscribe();

        loop {
            if *stop.borrow_and_update() {
                break;
            }
            tokio::select! {
                _ = stop.changed() => {}
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        log::info!("Accepted connection from {}", peer);
                        let handler = ClientHandler {
                            methods: Arc::clone(&self.methods),
                            shutdown: self.shutdown.clone(),
                            max_line_length: self.config.max_line_length,
                            peer,
                        };
                        tokio::spawn(async move {
                            if let Err(e) = handler.handle_connection(stream).await {
                                log::error!("Error handling connection from {}: {}", peer, e);
                            }
                        });
                    }
                    Err(e) => {
                        log::error!("Error accepting connection: {}", e);
                    }
                },
            }
        }

        log::info!("{} server stopped", self.config.name);
        Ok(())
    }
}

impl<C: ByteChannel + 'static> ClientHandler<C> {
    async fn handle_connection(&self, stream: TcpStream) -> BincomsResult<()> {
        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);
        let mut stop = self.shutdown.sender.subscribe();
        let mut line = Vec::new();

        loop {
            line.clear();
            let mut limited = (&mut reader).take(self.max_line_length as u64 + 1);
            let read = tokio::select! {
                _ = stop.changed() => break,
                read = limited.read_until(b'\n', &mut line) => read?,
            };
            if read == 0 {
                break;
            }
            if line.len() > self.max_line_length {
                let response = RpcResponse::failure(
                    Json::Null,
                    Fault::invalid_request(format!(
                        "Request longer than {} bytes",
                        self.max_line_length
                    )),
                );
                write_response(&mut writer, &response).await?;
                log::warn!("Dropping {}: request line too long", self.peer);
                break;
            }
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            let (response, stop_after) = self.handle_line(&line).await;
            write_response(&mut writer, &response).await?;
            if stop_after {
                self.shutdown.shutdown();
                break;
            }
        }

        log::info!("Connection from {} closed", self.peer);
        Ok(())
    }

    /// Answer one request line; the flag asks for a server shutdown
    async fn handle_line(&self, line: &[u8]) -> (RpcResponse, bool) {
        let json: Json = match serde_json::from_slice(line) {
            Ok(json) => json,
            Err(e) => {
                let fault = Fault::parse_error(e.to_string());
                return (RpcResponse::failure(Json::Null, fault), false);
            }
        };
        let id = json.get("id").cloned().unwrap_or(Json::Null);
        let request: RpcRequest = match serde_json::from_value(json) {
            Ok(request) => request,
            Err(e) => {
                let fault = Fault::invalid_request(e.to_string());
                return (RpcResponse::failure(id, fault), false);
            }
        };

        if request.method == SHUTDOWN {
            log::info!("Shutdown requested by {}", self.peer);
            return (RpcResponse::success(request.id, Json::from(SHUTDOWN_REPLY)), true);
        }

        let result = match request.positional() {
            Ok(params) => self.methods.dispatch(&request.method, params).await,
            Err(fault) => Err(fault),
        };
        if let Err(fault) = &result {
            log::warn!("{} from {}: {}", request.method, self.peer, fault);
        }
        (RpcResponse::from_result(request.id, result), false)
    }
}

async fn write_response<W>(writer: &mut W, response: &RpcResponse) -> BincomsResult<()>
where
    W: AsyncWriteExt + Unpin,
{
    let mut bytes = serde_json::to_vec(response)
        .map_err(|e| BincomsError::InvalidData(format!("Cannot encode response: {}", e)))?;
    bytes.push(b'\n');
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.address.to_string(), DEFAULT_ADDRESS);
        assert_eq!(config.name, "logic_timer");
    }

    #[test]
    fn test_shutdown_handle() {
        let (sender, _) = watch::channel(false);
        let handle = ShutdownHandle {
            sender: Arc::new(sender),
        };
        assert!(!handle.is_shutdown());
        handle.clone().shutdown();
        assert!(handle.is_shutdown());
    }
}
