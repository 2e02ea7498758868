//! The shared execution context
//!
//! One [`ExecutionContext`] lives as long as its bridge. Variables persist in
//! the scope; functions defined by any script persist in a function-only
//! AST merged in front of every later script.

use std::sync::{Arc, RwLock};

use rhai::{AST, Dynamic, Engine, EvalAltResult, FnPtr, Scope};

use crate::host::CurrentRange;

/// Scope name of the per-line function during a range apply
pub const LINE_FUNCTION: &str = "_lark_do";

/// Lines of wrapper above the first line of a per-line body
pub const LINE_BODY_OFFSET: usize = 1;

/// The range of the request being processed, shared with `lark::current`
#[derive(Clone, Default)]
pub struct CurrentSlot {
    range: Arc<RwLock<Option<CurrentRange>>>,
}

impl CurrentSlot {
    pub fn get(&self) -> Option<CurrentRange> {
        self.range.read().map(|r| *r).unwrap_or_default()
    }

    /// Overwrite with the latest request's range
    pub fn set(&self, range: CurrentRange) {
        if let Ok(mut current) = self.range.write() {
            *current = Some(range);
        }
    }
}

/// A per-line function installed for one range apply
pub struct LineFunction {
    ast: AST,
    fn_ptr: FnPtr,
    scope_len: usize,
}

impl LineFunction {
    /// Name Rhai gave the closure, as it appears in error call chains
    pub fn closure_name(&self) -> &str {
        self.fn_ptr.fn_name()
    }
}

pub struct ExecutionContext {
    scope: Scope<'static>,
    lib: AST,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self {
            scope: Scope::new(),
            lib: AST::empty(),
        }
    }

    pub fn scope(&self) -> &Scope<'static> {
        &self.scope
    }

    /// Run statements against the shared scope
    pub fn run(&mut self, engine: &Engine, ast: &AST) -> Result<(), Box<EvalAltResult>> {
        let result = engine.run_ast_with_scope(&mut self.scope, &self.lib.merge(ast));
        // Function definitions are hoisted, so they stay even if a statement failed
        self.lib = self.lib.merge(&ast.clone_functions_only());
        result
    }

    /// Evaluate against the shared scope
    pub fn eval(&mut self, engine: &Engine, ast: &AST) -> Result<Dynamic, Box<EvalAltResult>> {
        engine.eval_ast_with_scope::<Dynamic>(&mut self.scope, &self.lib.merge(ast))
    }

    /// Bind `body` as a closure over `(line, linenr)` under [`LINE_FUNCTION`]
    ///
    /// The closure captures scope variables it mentions, so the body reads and
    /// writes the same state as ordinary scripts.
    pub fn install_line_function(
        &mut self,
        engine: &Engine,
        body: &str,
    ) -> Result<LineFunction, Box<EvalAltResult>> {
        let scope_len = self.scope.len();
        let script = format!("let {} = |line, linenr| {{\n{}\n}};", LINE_FUNCTION, body);

        let installed = engine
            .compile_with_scope(&self.scope, &script)
            .map_err(Box::<EvalAltResult>::from)
            .and_then(|ast| {
                let ast = self.lib.merge(&ast);
                engine.run_ast_with_scope(&mut self.scope, &ast)?;
                let fn_ptr = self
                    .scope
                    .get_value::<FnPtr>(LINE_FUNCTION)
                    .ok_or_else(|| Box::<EvalAltResult>::from("Line function was not defined"))?;
                Ok(LineFunction {
                    ast,
                    fn_ptr,
                    scope_len,
                })
            });

        if installed.is_err() {
            self.scope.rewind(scope_len);
        }
        installed
    }

    pub fn call_line_function(
        &self,
        engine: &Engine,
        function: &LineFunction,
        line: String,
        linenr: i64,
    ) -> Result<Dynamic, Box<EvalAltResult>> {
        function
            .fn_ptr
            .call::<Dynamic>(engine, &function.ast, (line, linenr))
    }

    /// Remove the line function and anything pushed after it
    pub fn remove_line_function(&mut self, function: LineFunction) {
        self.scope.rewind(function.scope_len);
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(ctx: &mut ExecutionContext, engine: &Engine, script: &str) {
        let ast = engine.compile(script).unwrap();
        ctx.run(engine, &ast).unwrap();
    }

    fn eval(ctx: &mut ExecutionContext, engine: &Engine, expr: &str) -> Dynamic {
        let ast = engine.compile_expression(expr).unwrap();
        ctx.eval(engine, &ast).unwrap()
    }

    #[test]
    fn variables_and_functions_accumulate() {
        let engine = Engine::new();
        let mut ctx = ExecutionContext::new();
        run(&mut ctx, &engine, "let x = 40;");
        run(&mut ctx, &engine, "fn add(a) { a + 2 }");
        assert_eq!(eval(&mut ctx, &engine, "add(x)").as_int().unwrap(), 42);
    }

    #[test]
    fn later_definitions_override() {
        let engine = Engine::new();
        let mut ctx = ExecutionContext::new();
        run(&mut ctx, &engine, "fn f() { 1 }");
        run(&mut ctx, &engine, "fn f() { 2 }");
        assert_eq!(eval(&mut ctx, &engine, "f()").as_int().unwrap(), 2);
    }

    #[test]
    fn line_function_sees_and_updates_scope() {
        let engine = Engine::new();
        let mut ctx = ExecutionContext::new();
        run(&mut ctx, &engine, "let seen = 0; let suffix = \"!\";");

        let f = ctx
            .install_line_function(&engine, "seen += 1; line + suffix + linenr")
            .unwrap();
        let out = ctx
            .call_line_function(&engine, &f, "a".to_string(), 3)
            .unwrap();
        assert_eq!(out.into_string().unwrap(), "a!3");
        ctx.remove_line_function(f);

        assert!(ctx.scope().get_value::<FnPtr>(LINE_FUNCTION).is_none());
        assert_eq!(eval(&mut ctx, &engine, "seen").as_int().unwrap(), 1);
    }

    #[test]
    fn failed_install_leaves_scope_untouched() {
        let engine = Engine::new();
        let mut ctx = ExecutionContext::new();
        run(&mut ctx, &engine, "let x = 1;");
        assert!(ctx.install_line_function(&engine, "line +").is_err());
        assert_eq!(ctx.scope().len(), 1);
    }

    #[test]
    fn current_slot_is_overwritten() {
        use crate::host::BufferId;

        let slot = CurrentSlot::default();
        assert!(slot.get().is_none());
        let first = CurrentRange { buffer: BufferId(1), start: 1, stop: 3 };
        let second = CurrentRange { buffer: BufferId(2), start: 5, stop: 5 };
        slot.set(first);
        slot.set(second);
        assert_eq!(slot.get(), Some(second));
    }
}
