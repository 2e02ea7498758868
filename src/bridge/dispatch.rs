//! Method routing for requests from the host

use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use super::{Bridge, BridgeError};

pub const EXECUTE: &str = "execute";
pub const EXECUTE_FILE: &str = "execute_file";
pub const EVALUATE: &str = "evaluate";
pub const APPLY_RANGE: &str = "apply_range";

/// Positional parameters as a tuple
fn unpack<T: DeserializeOwned>(method: &str, params: Vec<Value>) -> Result<T, BridgeError> {
    serde_json::from_value(Value::Array(params))
        .map_err(|e| BridgeError::InvalidArguments(format!("{}: {}", method, e)))
}

impl Bridge {
    /// Run one host request to completion
    pub fn dispatch(&mut self, method: &str, params: Vec<Value>) -> Result<Value, BridgeError> {
        debug!(target: "bridge", "Dispatching {}", method);

        let result = match method {
            EXECUTE => {
                let (script, start, stop): (String, i64, i64) = unpack(method, params)?;
                self.execute(&script, start, stop).map(|_| Value::Null)
            }
            EXECUTE_FILE => {
                let (path, start, stop): (PathBuf, i64, i64) = unpack(method, params)?;
                self.execute_file(&path, start, stop).map(|_| Value::Null)
            }
            EVALUATE => {
                let (expr,): (String,) = unpack(method, params)?;
                self.evaluate(&expr)
            }
            APPLY_RANGE => {
                let (start, stop, body): (i64, i64, String) = unpack(method, params)?;
                self.apply_range(start, stop, &body).map(|_| Value::Null)
            }
            other => Err(BridgeError::UnknownMethod(other.to_string())),
        };

        if let Err(e) = &result {
            debug!(target: "bridge", "{} failed: {}", method, e);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HostSettings;
    use crate::host::MemoryHost;
    use serde_json::json;
    use std::sync::Arc;

    fn bridge(host: &MemoryHost) -> Bridge {
        Bridge::new(Arc::new(host.clone()), HostSettings::default())
    }

    #[test]
    fn routes_each_method() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.rhai");
        std::fs::write(&path, "let from_file = true;").unwrap();

        let host = MemoryHost::with_lines(&["a", "b"]);
        let mut bridge = bridge(&host);

        assert_eq!(
            bridge.dispatch(EXECUTE, vec![json!("let n = 2;"), json!(1), json!(1)]).unwrap(),
            Value::Null
        );
        bridge
            .dispatch(EXECUTE_FILE, vec![json!(path), json!(1), json!(2)])
            .unwrap();
        bridge
            .dispatch(APPLY_RANGE, vec![json!(1), json!(2), json!("line.to_upper()")])
            .unwrap();
        assert_eq!(
            bridge.dispatch(EVALUATE, vec![json!("[n, from_file]")]).unwrap(),
            json!(["2", true])
        );
        assert_eq!(host.buffer_lines(), vec!["A", "B"]);
    }

    #[test]
    fn malformed_params_are_argument_errors() {
        let host = MemoryHost::with_lines(&["a"]);
        let mut bridge = bridge(&host);
        let err = bridge.dispatch(EXECUTE, vec![json!("x")]).unwrap_err();
        assert!(matches!(err, BridgeError::InvalidArguments(ref m) if m.starts_with("execute")));
        assert!(bridge.dispatch(EVALUATE, vec![json!(1)]).is_err());
    }

    #[test]
    fn unknown_methods_are_rejected() {
        let host = MemoryHost::with_lines(&["a"]);
        let mut bridge = bridge(&host);
        assert!(matches!(
            bridge.dispatch("shell_execute", vec![]),
            Err(BridgeError::UnknownMethod(_))
        ));
    }
}
