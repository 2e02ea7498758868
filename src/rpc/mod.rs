//! Newline-delimited JSON RPC over a byte stream
//!
//! Both sides send requests, responses and notifications. Requests from the
//! host are handled one at a time by a single bridge worker; while the
//! worker waits on a host call, the reader keeps routing responses to it.

mod client;
mod message;
mod transport;

pub use client::{PendingCalls, RpcHost};
pub use message::Message;
pub use transport::{TransportError, serve};
