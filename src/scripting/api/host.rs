//! lark::* - host queries and commands
//!
//! Usage in Rhai:
//! ```rhai
//! let ts = lark::host_eval("&tabstop");   // numbers arrive as strings
//! lark::command("write");
//! for p in lark::runtime_paths() { print(p); }
//! ```

use rhai::plugin::*;
use std::sync::Arc;

use super::host_error;
use crate::host::Host;
use crate::scripting::value::from_host_value;

pub fn create_module(host: Arc<dyn Host>) -> rhai::Module {
    let mut module = rhai::Module::new();

    // runtime_paths() -> Array
    {
        let h = Arc::clone(&host);
        module.set_native_fn(
            "runtime_paths",
            move || -> Result<rhai::Array, Box<EvalAltResult>> {
                let paths = h.list_runtime_paths().map_err(host_error)?;
                Ok(paths
                    .into_iter()
                    .map(|p| rhai::Dynamic::from(p.display().to_string()))
                    .collect())
            },
        );
    }

    // command(cmd: &str)
    {
        let h = Arc::clone(&host);
        module.set_native_fn("command", move |cmd: &str| {
            h.command(cmd).map_err(host_error)
        });
    }

    // host_eval(expr: &str) -> Dynamic
    {
        let h = Arc::clone(&host);
        module.set_native_fn(
            "host_eval",
            move |expr: &str| -> Result<rhai::Dynamic, Box<EvalAltResult>> {
                let value = h.eval(expr).map_err(host_error)?;
                Ok(from_host_value(value))
            },
        );
    }

    module
}
