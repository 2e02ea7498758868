use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio::sync::{mpsc, oneshot};

use super::Message;
use crate::host::{CurrentRange, Host, HostError};

type Reply = Result<Value, Value>;

#[derive(Default)]
struct PendingState {
    calls: HashMap<u64, oneshot::Sender<Reply>>,
    closed: bool,
}

/// Host calls waiting for their response
#[derive(Clone, Default)]
pub struct PendingCalls {
    state: Arc<Mutex<PendingState>>,
}

impl PendingCalls {
    fn register(&self, id: u64) -> Option<oneshot::Receiver<Reply>> {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        if state.closed {
            return None;
        }
        let (tx, rx) = oneshot::channel();
        state.calls.insert(id, tx);
        Some(rx)
    }

    /// Hand a response to its caller; unknown ids are dropped
    pub fn complete(&self, id: u64, reply: Reply) -> bool {
        let sender = self
            .state
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .calls
            .remove(&id);
        match sender {
            Some(tx) => tx.send(reply).is_ok(),
            None => false,
        }
    }

    /// Fail every waiting call and refuse new ones
    pub fn close(&self) {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        state.closed = true;
        state.calls.clear();
    }
}

/// A [`Host`] on the far side of the RPC channel
///
/// Calls block the calling thread until the response arrives, so this must
/// only be used off the async runtime.
pub struct RpcHost {
    outgoing: mpsc::UnboundedSender<Message>,
    pending: PendingCalls,
    next_id: AtomicU64,
}

impl RpcHost {
    pub fn new(outgoing: mpsc::UnboundedSender<Message>, pending: PendingCalls) -> Self {
        Self {
            outgoing,
            pending,
            next_id: AtomicU64::new(1),
        }
    }

    fn request(&self, method: &str, params: Vec<Value>) -> Result<Value, HostError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let rx = self.pending.register(id).ok_or(HostError::Disconnected)?;
        self.outgoing
            .send(Message::Request {
                id,
                method: method.to_string(),
                params,
            })
            .map_err(|_| HostError::Disconnected)?;

        match rx.blocking_recv() {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(error)) => Err(HostError::Remote(error_text(error))),
            Err(_) => Err(HostError::Disconnected),
        }
    }

    fn request_as<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<T, HostError> {
        let value = self.request(method, params)?;
        serde_json::from_value(value)
            .map_err(|e| HostError::Protocol(format!("{}: {}", method, e)))
    }

    fn notify(&self, method: &str, params: Vec<Value>) -> Result<(), HostError> {
        self.outgoing
            .send(Message::Notification {
                method: method.to_string(),
                params,
            })
            .map_err(|_| HostError::Disconnected)
    }
}

fn error_text(error: Value) -> String {
    match error {
        Value::String(s) => s,
        Value::Object(ref fields) => fields
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string()),
        other => other.to_string(),
    }
}

impl Host for RpcHost {
    fn list_runtime_paths(&self) -> Result<Vec<PathBuf>, HostError> {
        self.request_as("list_runtime_paths", vec![])
    }

    fn get_lines(&self, start: usize, end: usize) -> Result<Vec<String>, HostError> {
        self.request_as("buf_get_lines", vec![json!(start), json!(end)])
    }

    fn set_lines(&self, start: usize, end: usize, lines: Vec<String>) -> Result<(), HostError> {
        self.request("buf_set_lines", vec![json!(start), json!(end), json!(lines)])
            .map(|_| ())
    }

    fn line_count(&self) -> Result<usize, HostError> {
        self.request_as("buf_line_count", vec![])
    }

    fn resolve_range(&self, start: i64, stop: i64) -> Result<CurrentRange, HostError> {
        self.request_as("resolve_range", vec![json!(start), json!(stop)])
    }

    fn out_write(&self, text: &str) -> Result<(), HostError> {
        self.notify("out_write", vec![json!(text)])
    }

    fn err_write(&self, text: &str) -> Result<(), HostError> {
        self.notify("err_write", vec![json!(text)])
    }

    fn eval(&self, expr: &str) -> Result<Value, HostError> {
        self.request("eval", vec![json!(expr)])
    }

    fn command(&self, cmd: &str) -> Result<(), HostError> {
        self.request("command", vec![json!(cmd)]).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_wait_for_their_response() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let pending = PendingCalls::default();
        let host = RpcHost::new(tx, pending.clone());

        let responder = std::thread::spawn(move || {
            let Some(Message::Request { id, method, params }) = rx.blocking_recv() else {
                panic!("expected a request");
            };
            assert_eq!(method, "buf_get_lines");
            assert_eq!(params, vec![json!(0), json!(2)]);
            assert!(pending.complete(id, Ok(json!(["a", "b"]))));
        });

        assert_eq!(host.get_lines(0, 2).unwrap(), vec!["a", "b"]);
        responder.join().unwrap();
    }

    #[test]
    fn error_responses_become_remote_errors() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let pending = PendingCalls::default();
        let host = RpcHost::new(tx, pending.clone());

        let responder = std::thread::spawn(move || {
            if let Some(Message::Request { id, .. }) = rx.blocking_recv() {
                pending.complete(id, Err(json!({ "message": "E5555: no" })));
            }
        });

        match host.command("bad") {
            Err(HostError::Remote(msg)) => assert_eq!(msg, "E5555: no"),
            other => panic!("unexpected {:?}", other),
        }
        responder.join().unwrap();
    }

    #[test]
    fn closed_calls_fail_fast() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let pending = PendingCalls::default();
        pending.close();
        let host = RpcHost::new(tx, pending);
        assert!(matches!(host.line_count(), Err(HostError::Disconnected)));
    }

    #[test]
    fn writes_are_notifications() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let host = RpcHost::new(tx, PendingCalls::default());
        host.out_write("hi\n").unwrap();
        assert_eq!(
            rx.try_recv().unwrap(),
            Message::Notification {
                method: "out_write".to_string(),
                params: vec![json!("hi\n")],
            }
        );
    }
}
