//! Operator control socket server/client (§4.12, §4.14).

use super::protocol::{error_codes, Method, Request, Response};
use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, error, info, warn};

#[derive(Error, Debug)]
pub enum IpcError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("connection closed")]
    ConnectionClosed,
    #[error("socket error: {0}")]
    Socket(String),
}

pub type IpcResult<T> = Result<T, IpcError>;

pub type HandlerFn = Box<dyn Fn(Request) -> Pin<Box<dyn Future<Output = Response> + Send>> + Send + Sync>;

/// Listens on the control socket and dispatches `health`/`status`/`shutdown`
/// requests to registered handlers. One connection per request/response
/// round trip, matching the IPC client below.
pub struct IpcServer {
    socket_path: String,
    handlers: Arc<RwLock<HashMap<Method, HandlerFn>>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl IpcServer {
    pub fn new(socket_path: &str) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            socket_path: socket_path.to_string(),
            handlers: Arc::new(RwLock::new(HashMap::new())),
            shutdown_tx,
        }
    }

    pub async fn register_handler<F, Fut>(&self, method: Method, handler: F)
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        let boxed: HandlerFn = Box::new(move |req| Box::pin(handler(req)));
        self.handlers.write().await.insert(method, boxed);
    }

    /// A sender handlers can clone to trigger shutdown themselves (the
    /// `shutdown` handler uses this to stop `run` after replying).
    pub fn shutdown_sender(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    pub async fn run(&self) -> IpcResult<()> {
        let socket_path = Path::new(&self.socket_path);
        if socket_path.exists() {
            std::fs::remove_file(socket_path)?;
        }
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let listener = UnixListener::bind(&self.socket_path)?;
        info!(path = %self.socket_path, "control socket listening");

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let handlers = self.handlers.clone();

        loop {
            tokio::select! {
                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((stream, _)) => {
                            let handlers = handlers.clone();
                            tokio::spawn(async move {
                                if let Err(err) = handle_connection(stream, handlers).await {
                                    error!(%err, "control socket connection error");
                                }
                            });
                        }
                        Err(err) => error!(%err, "control socket accept error"),
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("control socket shutting down");
                    break;
                }
            }
        }

        let _ = std::fs::remove_file(&self.socket_path);
        Ok(())
    }
}

async fn handle_connection(stream: UnixStream, handlers: Arc<RwLock<HashMap<Method, HandlerFn>>>) -> IpcResult<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            break;
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let request = match Request::from_json(trimmed) {
            Ok(req) => req,
            Err(err) => {
                warn!(%err, "failed to parse control socket request");
                let response = Response::error("", error_codes::PARSE_ERROR, &format!("parse error: {err}"));
                write_response(&mut writer, &response).await?;
                continue;
            }
        };

        let response = {
            let handlers = handlers.read().await;
            match handlers.get(&request.method) {
                Some(handler) => handler(request.clone()).await,
                None => Response::error(
                    &request.id,
                    error_codes::METHOD_NOT_FOUND,
                    &format!("method not found: {:?}", request.method),
                ),
            }
        };
        write_response(&mut writer, &response).await?;
    }

    debug!("control socket client disconnected");
    Ok(())
}

async fn write_response(writer: &mut tokio::net::unix::OwnedWriteHalf, response: &Response) -> IpcResult<()> {
    let json = response.to_json()?;
    writer.write_all(json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}

/// Thin client used by the `stop`/`status` CLI sub-commands.
pub struct IpcClient {
    socket_path: String,
}

impl IpcClient {
    pub fn new(socket_path: &str) -> Self {
        Self {
            socket_path: socket_path.to_string(),
        }
    }

    pub async fn call_method(&self, method: Method) -> IpcResult<Response> {
        let stream = UnixStream::connect(&self.socket_path)
            .await
            .map_err(|err| IpcError::Socket(format!("failed to connect: {err}")))?;
        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);

        let request = Request::new(method);
        let request_json = request.to_json()?;
        writer.write_all(request_json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;

        let mut line = String::new();
        reader.read_line(&mut line).await?;
        if line.is_empty() {
            return Err(IpcError::ConnectionClosed);
        }
        Response::from_json(line.trim()).map_err(IpcError::Json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ipc_server_creation() {
        let _server = IpcServer::new("/tmp/test-control-plane.sock");
    }

    #[tokio::test]
    async fn ipc_client_connect_failure() {
        let client = IpcClient::new("/tmp/definitely-does-not-exist-control-plane.sock");
        let result = client.call_method(Method::Health).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn server_register_handler_dispatches() {
        let dir = tempfile::tempdir().unwrap();
        let socket_path = dir.path().join("control.sock");
        let server = Arc::new(IpcServer::new(&socket_path.to_string_lossy()));
        server
            .register_handler(Method::Health, |req| async move {
                Response::success(&req.id, serde_json::json!({"status": "ok"}))
            })
            .await;

        let shutdown = server.shutdown_sender();
        let server_task = {
            let server = server.clone();
            tokio::spawn(async move { server.run().await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let client = IpcClient::new(&socket_path.to_string_lossy());
        let response = client.call_method(Method::Health).await.unwrap();
        assert!(response.is_success());

        let _ = shutdown.send(());
        let _ = server_task.await;
    }
}
