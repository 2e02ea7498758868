//! lark::current and lark::buffer - the active range and buffer
//!
//! Usage in Rhai:
//! ```rhai
//! let first = lark::current::range_start();
//! for line in lark::current::lines() { print(line); }
//! lark::buffer::set_lines(0, 1, ["replaced"]);
//! ```

use rhai::plugin::*;
use std::sync::Arc;

use super::host_error;
use crate::host::{CurrentRange, Host};
use crate::scripting::context::CurrentSlot;

fn require(current: &CurrentSlot) -> Result<CurrentRange, Box<EvalAltResult>> {
    current.get().ok_or_else(|| "No current range".into())
}

fn index(n: i64) -> Result<usize, Box<EvalAltResult>> {
    usize::try_from(n).map_err(|_| format!("Invalid line index: {}", n).into())
}

pub fn create_current_module(host: Arc<dyn Host>, current: CurrentSlot) -> rhai::Module {
    let mut module = rhai::Module::new();

    // range_start() -> i64 (1-based)
    {
        let c = current.clone();
        module.set_native_fn(
            "range_start",
            move || -> Result<i64, Box<EvalAltResult>> { Ok(require(&c)?.start) },
        );
    }

    // range_end() -> i64 (1-based, inclusive)
    {
        let c = current.clone();
        module.set_native_fn(
            "range_end",
            move || -> Result<i64, Box<EvalAltResult>> { Ok(require(&c)?.stop) },
        );
    }

    // buffer() -> i64
    {
        let c = current.clone();
        module.set_native_fn(
            "buffer",
            move || -> Result<i64, Box<EvalAltResult>> { Ok(require(&c)?.buffer.0) },
        );
    }

    // lines() -> Array of the lines in the current range
    {
        let c = current;
        module.set_native_fn(
            "lines",
            move || -> Result<rhai::Array, Box<EvalAltResult>> {
                let range = require(&c)?;
                let start = index(range.start - 1)?;
                let end = index(range.stop)?.max(start);
                let lines = host.get_lines(start, end).map_err(host_error)?;
                Ok(lines.into_iter().map(rhai::Dynamic::from).collect())
            },
        );
    }

    module
}

pub fn create_buffer_module(host: Arc<dyn Host>) -> rhai::Module {
    let mut module = rhai::Module::new();

    // line_count() -> i64
    {
        let h = Arc::clone(&host);
        module.set_native_fn(
            "line_count",
            move || -> Result<i64, Box<EvalAltResult>> {
                Ok(h.line_count().map_err(host_error)? as i64)
            },
        );
    }

    // get_lines(start: i64, end: i64) -> Array, 0-based and end-exclusive
    {
        let h = Arc::clone(&host);
        module.set_native_fn(
            "get_lines",
            move |start: i64, end: i64| -> Result<rhai::Array, Box<EvalAltResult>> {
                let lines = h
                    .get_lines(index(start)?, index(end)?)
                    .map_err(host_error)?;
                Ok(lines.into_iter().map(rhai::Dynamic::from).collect())
            },
        );
    }

    // set_lines(start: i64, end: i64, lines: Array)
    {
        let h = Arc::clone(&host);
        module.set_native_fn(
            "set_lines",
            move |start: i64, end: i64, lines: rhai::Array| {
                let lines = lines
                    .into_iter()
                    .map(|l| {
                        l.into_string().map_err(|found| {
                            Box::<EvalAltResult>::from(format!(
                                "set_lines expects strings, found {}",
                                found
                            ))
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                h.set_lines(index(start)?, index(end)?, lines)
                    .map_err(host_error)
            },
        );
    }

    module
}
