//! The Rhai engine behind a bridge
//!
//! Wires the execution context to the host: output channels for `print`
//! and `debug`, the module search for `import`, and the static `lark`
//! namespace every script and module can reach.

use std::path::Path;
use std::sync::Arc;

use rhai::{AST, Dynamic, Engine, EvalAltResult};

use super::api;
use super::context::{CurrentSlot, ExecutionContext, LineFunction};
use super::resolver::{DirectoryProvider, ModuleSearch};
use super::stream::OutputChannels;
use crate::config::HostSettings;
use crate::host::{CurrentRange, Host};

/// Source name given to scripts that arrive as text
pub const INPUT_SOURCE: &str = "<input>";

/// The scripting engine of a bridge
pub struct ScriptEngine {
    engine: Engine,
    context: ExecutionContext,
    channels: OutputChannels,
    search: ModuleSearch,
    current: CurrentSlot,
}

impl ScriptEngine {
    pub fn new(host: Arc<dyn Host>, settings: &HostSettings) -> Self {
        Self::with_channels(host, settings, OutputChannels::new())
    }

    /// Create an engine writing through an existing output-channel handle
    pub fn with_channels(
        host: Arc<dyn Host>,
        settings: &HostSettings,
        channels: OutputChannels,
    ) -> Self {
        let current = CurrentSlot::default();

        // Ordinary imports resolve against the working directory
        let search = ModuleSearch::new();
        search.register(Arc::new(DirectoryProvider));
        search.push_entry(".");

        let engine = Self::create_engine(
            host,
            settings,
            channels.clone(),
            search.clone(),
            current.clone(),
        );

        Self {
            engine,
            context: ExecutionContext::new(),
            channels,
            search,
            current,
        }
    }

    /// Create the Rhai engine with the `lark` namespace
    fn create_engine(
        host: Arc<dyn Host>,
        settings: &HostSettings,
        channels: OutputChannels,
        search: ModuleSearch,
        current: CurrentSlot,
    ) -> Engine {
        let mut engine = Engine::new();

        engine.set_max_expr_depths(settings.max_expr_depth, settings.max_expr_depth);
        engine.set_max_operations(settings.max_operations);
        engine.set_module_resolver(search);

        let lark_module = api::create_module(host, current, channels.clone());
        engine.register_static_module("lark", lark_module.into());

        {
            let c = channels.clone();
            engine.on_print(move |text| c.out().write(&format!("{}\n", text)));
        }

        {
            let c = channels.clone();
            engine.on_debug(move |text, source, pos| {
                let text = match (source, pos.line()) {
                    (Some(source), Some(line)) => format!("{}:{} {}\n", source, line, text),
                    (None, Some(line)) => format!("{} {}\n", line, text),
                    _ => format!("{}\n", text),
                };
                c.err().write(&text);
            });
        }

        {
            let c = channels;
            engine.register_fn("eprint", move |text: &str| {
                c.err().write(&format!("{}\n", text));
            });
        }

        engine
    }

    pub fn channels(&self) -> &OutputChannels {
        &self.channels
    }

    pub fn search(&self) -> &ModuleSearch {
        &self.search
    }

    pub fn set_current_range(&self, range: CurrentRange) {
        self.current.set(range);
    }

    pub fn current_range(&self) -> Option<CurrentRange> {
        self.current.get()
    }

    /// Compile and run statements under the given source name
    pub fn run(&mut self, source: &str, script: &str) -> Result<(), Box<EvalAltResult>> {
        let mut ast = self.engine.compile_with_scope(self.context.scope(), script)?;
        ast.set_source(source);
        self.context.run(&self.engine, &ast)
    }

    pub fn run_file(&mut self, path: &Path, script: &str) -> Result<(), Box<EvalAltResult>> {
        self.run(&path.display().to_string(), script)
    }

    pub fn eval(&mut self, expr: &str) -> Result<Dynamic, Box<EvalAltResult>> {
        let mut ast: AST = self
            .engine
            .compile_expression_with_scope(self.context.scope(), expr)?;
        ast.set_source(INPUT_SOURCE);
        self.context.eval(&self.engine, &ast)
    }

    pub fn install_line_function(&mut self, body: &str) -> Result<LineFunction, Box<EvalAltResult>> {
        self.context.install_line_function(&self.engine, body)
    }

    pub fn call_line_function(
        &self,
        function: &LineFunction,
        line: String,
        linenr: i64,
    ) -> Result<Dynamic, Box<EvalAltResult>> {
        self.context
            .call_line_function(&self.engine, function, line, linenr)
    }

    pub fn remove_line_function(&mut self, function: LineFunction) {
        self.context.remove_line_function(function);
    }
}
