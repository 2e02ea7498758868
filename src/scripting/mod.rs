//! Scripting module - the Rhai runtime behind the bridge
//!
//! All host functions are exposed under the `lark` namespace:
//! - `lark::current::*` - the range of the running request
//! - `lark::buffer::*` - bulk access to the active buffer
//! - `lark::out::*`, `lark::err::*` - output channels
//! - `lark::host_eval`, `lark::command`, `lark::runtime_paths`

mod api;
pub mod context;
mod engine;
pub mod resolver;
pub mod stream;
pub mod trace;
pub mod value;

pub use context::{CurrentSlot, ExecutionContext, LINE_BODY_OFFSET, LINE_FUNCTION, LineFunction};
pub use engine::{INPUT_SOURCE, ScriptEngine};
pub use resolver::{
    DirectoryProvider, ModuleProvider, ModuleSearch, ModuleSource, RUNTIME_PATH_SENTINEL,
    RuntimeProvider,
};
pub use stream::{ConsoleSink, OutputChannels, RedirectedStream, Redirection, TextSink};
pub use trace::{Frame, FrameOrigin, Trace};
