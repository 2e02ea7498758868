//! Structured traces for script errors
//!
//! A Rhai error nests one layer per function call or module it passed
//! through. [`Trace::capture`] flattens that into frames, outermost first,
//! starting with a frame for the bridge operation that ran the script.

use std::fmt;

use rhai::{EvalAltResult, Position};
use serde::Serialize;

/// Who a frame belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameOrigin {
    Bridge,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Frame {
    pub origin: FrameOrigin,
    /// Enclosing script function, `None` at top level
    pub function: Option<String>,
    /// Script or module source name
    pub source: Option<String>,
    pub line: Option<usize>,
    pub column: Option<usize>,
}

impl Frame {
    fn user(function: Option<String>, source: Option<String>, pos: Position) -> Self {
        Self {
            origin: FrameOrigin::User,
            function,
            source,
            line: pos.line(),
            column: pos.position(),
        }
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "at {}", self.source.as_deref().unwrap_or("<script>"))?;
        if let Some(line) = self.line {
            write!(f, ":{}", line)?;
            if let Some(column) = self.column {
                write!(f, ":{}", column)?;
            }
        }
        if let Some(function) = &self.function {
            write!(f, " in {}", function)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Trace {
    /// Message of the innermost error
    pub message: String,
    pub frames: Vec<Frame>,
}

impl Trace {
    /// Flatten `err`, raised while the bridge ran `operation`
    pub fn capture(operation: &str, source: Option<&str>, err: &EvalAltResult) -> Self {
        let mut frames = vec![Frame {
            origin: FrameOrigin::Bridge,
            function: Some(operation.to_string()),
            source: Some(env!("CARGO_PKG_NAME").to_string()),
            line: None,
            column: None,
        }];

        let mut function: Option<String> = None;
        let mut source = source.map(str::to_string);
        let mut current = err;
        loop {
            match current {
                EvalAltResult::ErrorInFunctionCall(name, fn_source, inner, pos) => {
                    frames.push(Frame::user(function.take(), source.clone(), *pos));
                    function = Some(name.clone());
                    if !fn_source.is_empty() {
                        source = Some(fn_source.clone());
                    }
                    current = &**inner;
                }
                EvalAltResult::ErrorInModule(name, inner, pos) => {
                    frames.push(Frame::user(function.take(), source.clone(), *pos));
                    source = Some(name.clone());
                    current = &**inner;
                }
                leaf => {
                    frames.push(Frame::user(function, source, leaf.position()));
                    return Self {
                        message: leaf.to_string(),
                        frames,
                    };
                }
            }
        }
    }

    /// Attribute frames of a per-line body to `name`
    ///
    /// The body runs as closure `closure`, compiled `offset` lines below the
    /// top of its wrapper. With no closure (the body failed to compile) the
    /// positioned top-level frames are the body's. The positionless frame
    /// that invoked the closure belongs to the bridge.
    pub fn within_line_body(mut self, closure: Option<&str>, name: &str, offset: usize) -> Self {
        let in_body = |frame: &Frame| {
            frame.origin == FrameOrigin::User
                && match closure {
                    Some(closure) => frame.function.as_deref() == Some(closure),
                    None => frame.function.is_none() && frame.line.is_some(),
                }
        };

        for idx in 0..self.frames.len() {
            let invokes_body = self.frames.get(idx + 1).is_some_and(|next| in_body(next));
            let frame = &self.frames[idx];
            let call_site = frame.origin == FrameOrigin::User
                && frame.function.is_none()
                && frame.line.is_none();
            if closure.is_some() && call_site && invokes_body {
                self.frames[idx].origin = FrameOrigin::Bridge;
            }
        }

        for frame in self.frames.iter_mut().filter(|f| in_body(f)) {
            frame.function = Some(name.to_string());
            frame.line = frame.line.map(|line| line.saturating_sub(offset).max(1));
        }
        self
    }

    /// Drop the frames the bridge itself contributed
    pub fn without_bridge_frames(mut self) -> Self {
        self.frames.retain(|frame| frame.origin == FrameOrigin::User);
        self
    }
}

impl fmt::Display for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        for frame in &self.frames {
            write!(f, "\n  {}", frame)?;
        }
        Ok(())
    }
}
