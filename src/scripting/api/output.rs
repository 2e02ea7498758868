//! lark::out / lark::err - explicit writes to the output channels
//!
//! Usage in Rhai:
//! ```rhai
//! lark::out::write("no newline added");
//! lark::err::write_lines(["first", "second"]);
//! ```

use rhai::plugin::*;

use crate::scripting::OutputChannels;

#[derive(Debug, Clone, Copy)]
pub enum Stream {
    Out,
    Err,
}

pub fn create_module(channels: OutputChannels, stream: Stream) -> rhai::Module {
    let mut module = rhai::Module::new();

    let sink = move |channels: &OutputChannels| match stream {
        Stream::Out => channels.out(),
        Stream::Err => channels.err(),
    };

    // write(data: &str)
    {
        let c = channels.clone();
        module.set_native_fn("write", move |data: &str| -> Result<(), Box<EvalAltResult>> {
            sink(&c).write(data);
            Ok(())
        });
    }

    // write_lines(lines: Array)
    {
        let c = channels;
        module.set_native_fn("write_lines", move |lines: rhai::Array| -> Result<(), Box<EvalAltResult>> {
            let lines: Vec<String> = lines.into_iter().map(|l| l.to_string()).collect();
            sink(&c).write_lines(&lines);
            Ok(())
        });
    }

    module
}
