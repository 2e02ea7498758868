//! The script-execution bridge
//!
//! A [`Bridge`] owns one script engine and its execution context for the
//! whole host connection. Setup points the engine's output channels at the
//! host and registers the runtime module provider; teardown undoes both.

mod dispatch;
mod error;
pub mod range_apply;

use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::HostSettings;
use crate::host::Host;
use crate::scripting::value::to_host_value;
use crate::scripting::{
    INPUT_SOURCE, ModuleProvider, OutputChannels, RUNTIME_PATH_SENTINEL, RedirectedStream,
    Redirection, RuntimeProvider, ScriptEngine,
};

pub use dispatch::{APPLY_RANGE, EVALUATE, EXECUTE, EXECUTE_FILE};
pub use error::{BridgeError, ErrorKind, ErrorResponse};
pub use range_apply::{ApplyStats, LineOutcome, LineRange};

pub struct Bridge {
    host: Arc<dyn Host>,
    settings: HostSettings,
    scripts: ScriptEngine,
    provider: Arc<dyn ModuleProvider>,
    redirection: Option<Redirection>,
}

impl Bridge {
    pub fn new(host: Arc<dyn Host>, settings: HostSettings) -> Self {
        Self::with_channels(host, settings, OutputChannels::new())
    }

    /// Set up a bridge over an existing output-channel handle
    pub fn with_channels(
        host: Arc<dyn Host>,
        settings: HostSettings,
        channels: OutputChannels,
    ) -> Self {
        let scripts = ScriptEngine::with_channels(Arc::clone(&host), &settings, channels);

        let provider: Arc<dyn ModuleProvider> = Arc::new(RuntimeProvider::new(
            Arc::clone(&host),
            settings.clone(),
        ));
        scripts.search().register(Arc::clone(&provider));
        scripts.search().push_entry(RUNTIME_PATH_SENTINEL);

        let out = {
            let h = Arc::clone(&host);
            RedirectedStream::new(move |data| {
                if let Err(e) = h.out_write(data) {
                    warn!(target: "bridge", "Failed to forward output: {}", e);
                }
            })
        };
        let err = {
            let h = Arc::clone(&host);
            RedirectedStream::new(move |data| {
                if let Err(e) = h.err_write(data) {
                    warn!(target: "bridge", "Failed to forward error output: {}", e);
                }
            })
        };
        let redirection = scripts.channels().redirect(Arc::new(out), Arc::new(err));

        info!(target: "bridge", "Bridge ready (batch size {})", settings.batch_size);

        Self {
            host,
            settings,
            scripts,
            provider,
            redirection: Some(redirection),
        }
    }

    pub fn scripts(&self) -> &ScriptEngine {
        &self.scripts
    }

    fn set_current_range(&self, start: i64, stop: i64) -> Result<(), BridgeError> {
        let range = self.host.resolve_range(start, stop)?;
        self.scripts.set_current_range(range);
        Ok(())
    }

    /// Run `script` as statements in the shared context
    pub fn execute(&mut self, script: &str, start: i64, stop: i64) -> Result<(), BridgeError> {
        self.set_current_range(start, stop)?;
        self.scripts
            .run(INPUT_SOURCE, script)
            .map_err(|e| BridgeError::script(EXECUTE, Some(INPUT_SOURCE), &e))
    }

    /// Read, compile and run a script file in the shared context
    pub fn execute_file(&mut self, path: &Path, start: i64, stop: i64) -> Result<(), BridgeError> {
        self.set_current_range(start, stop)?;
        let script = std::fs::read_to_string(path).map_err(|source| BridgeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let source = path.display().to_string();
        self.scripts
            .run_file(path, &script)
            .map_err(|e| BridgeError::script(EXECUTE_FILE, Some(&source), &e))
    }

    /// Evaluate an expression; numbers in the result come back as text
    pub fn evaluate(&mut self, expr: &str) -> Result<Value, BridgeError> {
        let value = self
            .scripts
            .eval(expr)
            .map_err(|e| BridgeError::script(EVALUATE, Some(INPUT_SOURCE), &e))?;
        Ok(to_host_value(&value))
    }

    /// Run `body` for every line of `start..=stop`
    ///
    /// The body sees `line` and `linenr` and returns the new text, or `()` to
    /// delete the line.
    pub fn apply_range(
        &mut self,
        start: i64,
        stop: i64,
        body: &str,
    ) -> Result<ApplyStats, BridgeError> {
        let range = LineRange::from_one_based(start, stop)?;
        self.set_current_range(start, stop)?;

        let function = self
            .scripts
            .install_line_function(body)
            .map_err(|e| BridgeError::line_body(APPLY_RANGE, Some(INPUT_SOURCE), &e, None))?;

        let scripts = &self.scripts;
        let result = range_apply::apply_batched(
            self.host.as_ref(),
            range,
            self.settings.batch_size,
            |line, linenr| {
                scripts
                    .call_line_function(&function, line, linenr as i64)
                    .map(LineOutcome::from_dynamic)
                    .map_err(|e| {
                        BridgeError::line_body(
                            APPLY_RANGE,
                            Some(INPUT_SOURCE),
                            &e,
                            Some(function.closure_name()),
                        )
                    })
            },
        );

        self.scripts.remove_line_function(function);

        if let Ok(stats) = &result {
            debug!(
                target: "bridge",
                "apply_range {},{}: {} lines, {} deleted, {} reads, {} writes",
                start, stop, stats.lines, stats.deleted, stats.reads, stats.writes
            );
        }
        result
    }

    /// Undo setup; later calls do nothing
    pub fn teardown(&mut self) {
        let Some(redirection) = self.redirection.take() else {
            return;
        };
        redirection.restore();
        self.scripts.search().unregister(&self.provider);
        self.scripts.search().remove_entry(RUNTIME_PATH_SENTINEL);
        info!(target: "bridge", "Bridge torn down");
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        self.teardown();
    }
}
