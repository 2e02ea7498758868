//! Script host for the lark editor
//!
//! Runs Rhai code on behalf of an editor connected over RPC. One long-lived
//! execution context accumulates state across requests; script output is
//! forwarded to the editor, modules are imported from the editor's runtime
//! directories, and per-line edits are applied to buffers in batches.

pub mod bridge;
pub mod config;
pub mod host;
pub mod rpc;
pub mod scripting;

pub use bridge::{Bridge, BridgeError, ErrorResponse};
pub use config::{ConfigEngine, HostSettings};
pub use host::{Host, HostError, MemoryHost};
