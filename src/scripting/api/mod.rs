//! API modules for the `lark` namespace
//!
//! Each submodule provides functions under `lark::<module>::*`. Together they
//! are the view of the host that scripts written for the editor expect to
//! find without importing anything.

pub mod current;
pub mod host;
pub mod output;

use std::sync::Arc;

use rhai::EvalAltResult;

use super::OutputChannels;
use super::context::CurrentSlot;
use crate::host::{Host, HostError};

/// Build the `lark` module
pub fn create_module(
    host: Arc<dyn Host>,
    current: CurrentSlot,
    channels: OutputChannels,
) -> rhai::Module {
    let mut lark_module = host::create_module(Arc::clone(&host));

    lark_module.set_sub_module("current", current::create_current_module(Arc::clone(&host), current));
    lark_module.set_sub_module("buffer", current::create_buffer_module(host));
    lark_module.set_sub_module("out", output::create_module(channels.clone(), output::Stream::Out));
    lark_module.set_sub_module("err", output::create_module(channels, output::Stream::Err));

    lark_module
}

pub(crate) fn host_error(e: HostError) -> Box<EvalAltResult> {
    e.to_string().into()
}
