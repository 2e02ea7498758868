use std::io;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{Message, PendingCalls, RpcHost};
use crate::bridge::Bridge;
use crate::config::HostSettings;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("bridge worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

/// A request from the host, queued for the bridge worker
struct Incoming {
    id: u64,
    method: String,
    params: Vec<Value>,
}

/// Serve bridge requests until `reader` reaches end of input
pub async fn serve<R, W>(reader: R, writer: W, settings: HostSettings) -> Result<(), TransportError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (out_tx, out_rx) = mpsc::unbounded_channel::<Message>();
    let (req_tx, req_rx) = mpsc::unbounded_channel::<Incoming>();
    let pending = PendingCalls::default();

    let writer_task = tokio::spawn(write_messages(writer, out_rx));

    let worker = {
        let host = RpcHost::new(out_tx.clone(), pending.clone());
        let out_tx = out_tx.clone();
        tokio::task::spawn_blocking(move || run_bridge(host, settings, req_rx, out_tx))
    };
    // The writer stops once the worker's senders are gone
    drop(out_tx);

    let mut lines = BufReader::new(reader).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Message>(&line) {
            Ok(Message::Request { id, method, params }) => {
                if req_tx.send(Incoming { id, method, params }).is_err() {
                    break;
                }
            }
            Ok(Message::Response { id, error, result }) => {
                let reply = match error {
                    Some(error) => Err(error),
                    None => Ok(result),
                };
                if !pending.complete(id, reply) {
                    warn!(target: "rpc", "Response for unknown request {}", id);
                }
            }
            Ok(Message::Notification { method, .. }) => {
                debug!(target: "rpc", "Ignoring notification {}", method);
            }
            Err(e) => warn!(target: "rpc", "Malformed message: {}", e),
        }
    }

    info!(target: "rpc", "Input closed, shutting down");
    drop(req_tx);
    pending.close();
    worker.await?;
    writer_task.await??;
    Ok(())
}

fn run_bridge(
    host: RpcHost,
    settings: HostSettings,
    mut requests: mpsc::UnboundedReceiver<Incoming>,
    outgoing: mpsc::UnboundedSender<Message>,
) {
    let mut bridge = Bridge::new(Arc::new(host), settings);

    while let Some(request) = requests.blocking_recv() {
        let reply = match bridge.dispatch(&request.method, request.params) {
            Ok(result) => Message::Response {
                id: request.id,
                error: None,
                result,
            },
            Err(e) => {
                let error = serde_json::to_value(e.to_response())
                    .unwrap_or_else(|_| Value::String(e.to_string()));
                Message::Response {
                    id: request.id,
                    error: Some(error),
                    result: Value::Null,
                }
            }
        };
        if outgoing.send(reply).is_err() {
            break;
        }
    }

    bridge.teardown();
}

async fn write_messages<W>(mut writer: W, mut messages: mpsc::UnboundedReceiver<Message>) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = messages.recv().await {
        let mut line = serde_json::to_string(&message).map_err(io::Error::other)?;
        line.push('\n');
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
    }
    Ok(())
}
