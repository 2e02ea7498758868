//! Output channels for script `print`/`debug`
//!
//! The engine never writes to the process streams directly: stdout belongs
//! to the RPC channel. Scripts write through [`OutputChannels`], whose sinks a
//! bridge swaps for host-forwarding ones and puts back on teardown.

use std::sync::{Arc, RwLock};

/// Something script output can be written to
pub trait TextSink: Send + Sync {
    fn write(&self, data: &str);

    /// Join with newlines and forward as a single write
    fn write_lines(&self, lines: &[String]) {
        self.write(&lines.join("\n"));
    }
}

/// Forwards every write, unmodified, to a callback
pub struct RedirectedStream {
    handler: Box<dyn Fn(&str) + Send + Sync>,
}

impl RedirectedStream {
    pub fn new(handler: impl Fn(&str) + Send + Sync + 'static) -> Self {
        Self {
            handler: Box::new(handler),
        }
    }
}

impl TextSink for RedirectedStream {
    fn write(&self, data: &str) {
        (self.handler)(data);
    }
}

/// Default sink: stderr, tagged
#[derive(Debug, Clone, Copy)]
pub struct ConsoleSink;

impl TextSink for ConsoleSink {
    fn write(&self, data: &str) {
        eprint!("[rhai] {}", data);
    }
}

struct Streams {
    out: Arc<dyn TextSink>,
    err: Arc<dyn TextSink>,
}

/// Shared handle to the current output and error sinks
#[derive(Clone)]
pub struct OutputChannels {
    streams: Arc<RwLock<Streams>>,
}

impl OutputChannels {
    pub fn new() -> Self {
        Self::with_sinks(Arc::new(ConsoleSink), Arc::new(ConsoleSink))
    }

    pub fn with_sinks(out: Arc<dyn TextSink>, err: Arc<dyn TextSink>) -> Self {
        Self {
            streams: Arc::new(RwLock::new(Streams { out, err })),
        }
    }

    pub fn out(&self) -> Arc<dyn TextSink> {
        match self.streams.read() {
            Ok(s) => Arc::clone(&s.out),
            Err(poisoned) => Arc::clone(&poisoned.into_inner().out),
        }
    }

    pub fn err(&self) -> Arc<dyn TextSink> {
        match self.streams.read() {
            Ok(s) => Arc::clone(&s.err),
            Err(poisoned) => Arc::clone(&poisoned.into_inner().err),
        }
    }

    /// Install new sinks, returning a guard that restores the previous ones
    pub fn redirect(&self, out: Arc<dyn TextSink>, err: Arc<dyn TextSink>) -> Redirection {
        let previous = self.swap(Streams { out, err });
        Redirection {
            channels: self.clone(),
            saved: Some(previous),
        }
    }

    fn swap(&self, streams: Streams) -> Streams {
        let mut guard = self
            .streams
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        std::mem::replace(&mut *guard, streams)
    }
}

impl Default for OutputChannels {
    fn default() -> Self {
        Self::new()
    }
}

/// Active redirection; the captured sinks come back on `restore` or drop
pub struct Redirection {
    channels: OutputChannels,
    saved: Option<Streams>,
}

impl Redirection {
    pub fn restore(mut self) {
        self.restore_saved();
    }

    fn restore_saved(&mut self) {
        if let Some(saved) = self.saved.take() {
            self.channels.swap(saved);
        }
    }
}

impl Drop for Redirection {
    fn drop(&mut self) {
        self.restore_saved();
    }
}
