use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use super::{Buffer, BufferId, CurrentRange, Host, HostError};

#[derive(Default)]
struct State {
    buffer: Buffer,
    runtime_paths: Vec<PathBuf>,
    variables: HashMap<String, serde_json::Value>,
    out: Vec<String>,
    err: Vec<String>,
    commands: Vec<String>,
    reads: usize,
    writes: usize,
}

/// An in-process host with a single buffer
///
/// Used by the local `apply` command and by tests, which inspect the
/// captured output and the number of bulk reads and writes.
#[derive(Clone, Default)]
pub struct MemoryHost {
    state: Arc<RwLock<State>>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_buffer(buffer: Buffer) -> Self {
        let host = Self::new();
        host.write().buffer = buffer;
        host
    }

    pub fn with_lines<S: AsRef<str>>(lines: &[S]) -> Self {
        Self::with_buffer(Buffer::from_lines(lines))
    }

    pub fn set_runtime_paths(&self, paths: Vec<PathBuf>) {
        self.write().runtime_paths = paths;
    }

    pub fn set_variable(&self, name: &str, value: serde_json::Value) {
        self.write().variables.insert(name.to_string(), value);
    }

    pub fn buffer_lines(&self) -> Vec<String> {
        let state = self.read();
        state.buffer.lines(0, state.buffer.line_count())
    }

    pub fn save(&self) -> std::io::Result<()> {
        self.read().buffer.save()
    }

    /// Everything written to the primary output, concatenated
    pub fn output(&self) -> String {
        self.read().out.concat()
    }

    pub fn errors(&self) -> String {
        self.read().err.concat()
    }

    pub fn commands(&self) -> Vec<String> {
        self.read().commands.clone()
    }

    /// Number of bulk reads and bulk writes served so far
    pub fn io_counts(&self) -> (usize, usize) {
        let state = self.read();
        (state.reads, state.writes)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn check_bounds(start: usize, end: usize, len: usize) -> Result<(), HostError> {
    if start > end || end > len {
        return Err(HostError::OutOfRange { start, end, len });
    }
    Ok(())
}

impl Host for MemoryHost {
    fn list_runtime_paths(&self) -> Result<Vec<PathBuf>, HostError> {
        Ok(self.read().runtime_paths.clone())
    }

    fn get_lines(&self, start: usize, end: usize) -> Result<Vec<String>, HostError> {
        let mut state = self.write();
        check_bounds(start, end, state.buffer.line_count())?;
        state.reads += 1;
        Ok(state.buffer.lines(start, end))
    }

    fn set_lines(&self, start: usize, end: usize, lines: Vec<String>) -> Result<(), HostError> {
        let mut state = self.write();
        check_bounds(start, end, state.buffer.line_count())?;
        state.writes += 1;
        state.buffer.replace_lines(start, end, &lines);
        Ok(())
    }

    fn line_count(&self) -> Result<usize, HostError> {
        Ok(self.read().buffer.line_count())
    }

    fn resolve_range(&self, start: i64, stop: i64) -> Result<CurrentRange, HostError> {
        let len = self.read().buffer.line_count();
        if start < 1 || stop < start - 1 || stop as usize > len {
            return Err(HostError::OutOfRange {
                start: start.max(0) as usize,
                end: stop.max(0) as usize,
                len,
            });
        }
        Ok(CurrentRange {
            buffer: BufferId(1),
            start,
            stop,
        })
    }

    fn out_write(&self, text: &str) -> Result<(), HostError> {
        self.write().out.push(text.to_string());
        Ok(())
    }

    fn err_write(&self, text: &str) -> Result<(), HostError> {
        self.write().err.push(text.to_string());
        Ok(())
    }

    fn eval(&self, expr: &str) -> Result<serde_json::Value, HostError> {
        self.read()
            .variables
            .get(expr)
            .cloned()
            .ok_or_else(|| HostError::Remote(format!("E121: Undefined variable: {}", expr)))
    }

    fn command(&self, cmd: &str) -> Result<(), HostError> {
        self.write().commands.push(cmd.to_string());
        Ok(())
    }
}
