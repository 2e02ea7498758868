//! Module resolution from host runtime directories
//!
//! `import "pkg.sub.mod" as m;` walks an ordered list of search entries. Each
//! entry is handed to the first registered [`ModuleProvider`] that claims it.
//! The bridge registers a [`RuntimeProvider`] claiming only
//! [`RUNTIME_PATH_SENTINEL`], which re-queries the host for its runtime paths
//! on every import. Plain directories are served by [`DirectoryProvider`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use rhai::{Engine, EvalAltResult, Module, ModuleResolver, Position, Scope, Shared};
use tracing::{debug, warn};

use crate::config::HostSettings;
use crate::host::Host;

/// Search entry owned by the bridge's runtime provider
pub const RUNTIME_PATH_SENTINEL: &str = "_lark_runtime_path_";

const MODULE_EXTENSION: &str = "rhai";
const PACKAGE_INIT: &str = "init.rhai";

/// A module file found by a provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSource {
    pub name: String,
    pub path: PathBuf,
}

/// A source of modules for the search entries it claims
pub trait ModuleProvider: Send + Sync {
    /// Whether this provider serves the given search entry
    fn claims(&self, entry: &str) -> bool;

    /// Find `name` for `entry`, or decline with `None`
    fn locate(&self, entry: &str, name: &str) -> Option<ModuleSource>;
}

/// Locate a dotted module name under `roots`, one component at a time
///
/// Every component but the last must be a package directory. The last is
/// `<name>.rhai` or a package directory holding `init.rhai`.
pub fn find_dotted(roots: &[PathBuf], name: &str) -> Option<ModuleSource> {
    let path = find_component(roots, name)?;
    Some(ModuleSource {
        name: name.to_string(),
        path,
    })
}

fn find_component(roots: &[PathBuf], tail: &str) -> Option<PathBuf> {
    match tail.split_once('.') {
        Some((head, rest)) => {
            if head.is_empty() {
                return None;
            }
            let package = roots.iter().map(|root| root.join(head)).find(|p| p.is_dir())?;
            find_component(&[package], rest)
        }
        None => roots.iter().find_map(|root| module_file(root, tail)),
    }
}

fn module_file(dir: &Path, name: &str) -> Option<PathBuf> {
    if name.is_empty() {
        return None;
    }
    let file = dir.join(name).with_extension(MODULE_EXTENSION);
    if file.is_file() {
        return Some(file);
    }
    let init = dir.join(name).join(PACKAGE_INIT);
    init.is_file().then_some(init)
}

/// Module directories under the host's current runtime paths
///
/// Each existing runtime path contributes its auxiliary then its versioned
/// module directory, when present, in the order the host reports them.
pub fn discover_runtime_directories(
    host: &dyn Host,
    settings: &HostSettings,
) -> Vec<PathBuf> {
    let paths = match host.list_runtime_paths() {
        Ok(paths) => paths,
        Err(e) => {
            warn!(target: "resolver", "Failed to list runtime paths: {}", e);
            return Vec::new();
        }
    };

    let mut dirs = Vec::new();
    for path in paths.into_iter().filter(|p| p.exists()) {
        for sub in [&settings.aux_module_dir, &settings.versioned_module_dir] {
            let dir = path.join(sub);
            if dir.is_dir() {
                dirs.push(dir);
            }
        }
    }
    dirs
}

/// Serves the sentinel entry from host runtime directories
pub struct RuntimeProvider {
    host: Arc<dyn Host>,
    settings: HostSettings,
}

impl RuntimeProvider {
    pub fn new(host: Arc<dyn Host>, settings: HostSettings) -> Self {
        Self { host, settings }
    }
}

impl ModuleProvider for RuntimeProvider {
    fn claims(&self, entry: &str) -> bool {
        entry == RUNTIME_PATH_SENTINEL
    }

    fn locate(&self, _entry: &str, name: &str) -> Option<ModuleSource> {
        // Not cached: the host's runtime paths can change between imports
        let roots = discover_runtime_directories(self.host.as_ref(), &self.settings);
        find_dotted(&roots, name)
    }
}

/// Serves entries that name an existing directory
pub struct DirectoryProvider;

impl ModuleProvider for DirectoryProvider {
    fn claims(&self, entry: &str) -> bool {
        entry != RUNTIME_PATH_SENTINEL && Path::new(entry).is_dir()
    }

    fn locate(&self, entry: &str, name: &str) -> Option<ModuleSource> {
        find_dotted(&[PathBuf::from(entry)], name)
    }
}

#[derive(Default)]
struct SearchState {
    entries: Vec<String>,
    providers: Vec<Arc<dyn ModuleProvider>>,
    loaded: HashMap<String, Shared<Module>>,
}

/// Shared module search state, installed as the engine's module resolver
#[derive(Clone, Default)]
pub struct ModuleSearch {
    state: Arc<RwLock<SearchState>>,
}

impl ModuleSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_entry(&self, entry: impl Into<String>) {
        self.write().entries.push(entry.into());
    }

    /// Remove the first occurrence of `entry`
    pub fn remove_entry(&self, entry: &str) -> bool {
        let mut state = self.write();
        match state.entries.iter().position(|e| e == entry) {
            Some(idx) => {
                state.entries.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn entries(&self) -> Vec<String> {
        self.read().entries.clone()
    }

    pub fn register(&self, provider: Arc<dyn ModuleProvider>) {
        self.write().providers.push(provider);
    }

    pub fn unregister(&self, provider: &Arc<dyn ModuleProvider>) -> bool {
        let mut state = self.write();
        let before = state.providers.len();
        state.providers.retain(|p| !Arc::ptr_eq(p, provider));
        state.providers.len() != before
    }

    pub fn provider_count(&self) -> usize {
        self.read().providers.len()
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.read().loaded.contains_key(name)
    }

    /// Ask the providers, in entry order, for a module file
    fn locate(&self, name: &str) -> Option<ModuleSource> {
        let (entries, providers) = {
            let state = self.read();
            (state.entries.clone(), state.providers.clone())
        };
        entries.iter().find_map(|entry| {
            providers
                .iter()
                .find(|p| p.claims(entry))
                .and_then(|p| p.locate(entry, name))
        })
    }

    fn load(
        &self,
        engine: &Engine,
        source: &ModuleSource,
        pos: Position,
    ) -> Result<Shared<Module>, Box<EvalAltResult>> {
        let in_module = |err: Box<EvalAltResult>| -> Box<EvalAltResult> {
            EvalAltResult::ErrorInModule(source.name.clone(), err, pos).into()
        };

        let script = std::fs::read_to_string(&source.path).map_err(|e| {
            in_module(
                EvalAltResult::ErrorSystem(
                    format!("Cannot read {}", source.path.display()),
                    Box::new(e),
                )
                .into(),
            )
        })?;
        let mut ast = engine
            .compile(&script)
            .map_err(|e| in_module(e.into()))?;
        ast.set_source(source.path.display().to_string());

        let module = Module::eval_ast_as_new(Scope::new(), &ast, engine).map_err(in_module)?;
        Ok(module.into())
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, SearchState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, SearchState> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ModuleResolver for ModuleSearch {
    fn resolve(
        &self,
        engine: &Engine,
        _source: Option<&str>,
        path: &str,
        pos: Position,
    ) -> Result<Shared<Module>, Box<EvalAltResult>> {
        if let Some(module) = self.read().loaded.get(path) {
            return Ok(module.clone());
        }

        let Some(source) = self.locate(path) else {
            debug!(target: "resolver", "Module not found: {}", path);
            return Err(EvalAltResult::ErrorModuleNotFound(path.to_string(), pos).into());
        };

        debug!(target: "resolver", "Loading module {} from {}", path, source.path.display());
        let module = self.load(engine, &source, pos)?;
        self.write().loaded.insert(path.to_string(), module.clone());
        Ok(module)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryHost;
    use std::fs;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn engine_with(search: &ModuleSearch) -> Engine {
        let mut engine = Engine::new();
        engine.set_module_resolver(search.clone());
        engine
    }

    #[test]
    fn dotted_names_walk_packages() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("pkg/sub/leaf.rhai"), "fn f() { 1 }");
        write(&dir.path().join("pkg/tool/init.rhai"), "fn g() { 2 }");

        let roots = vec![dir.path().to_path_buf()];
        assert_eq!(
            find_dotted(&roots, "pkg.sub.leaf").unwrap().path,
            dir.path().join("pkg/sub/leaf.rhai")
        );
        assert_eq!(
            find_dotted(&roots, "pkg.tool").unwrap().path,
            dir.path().join("pkg/tool/init.rhai")
        );
        assert!(find_dotted(&roots, "pkg.missing").is_none());
        assert!(find_dotted(&roots, "pkg..leaf").is_none());
    }

    #[test]
    fn earlier_roots_win() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        write(&a.path().join("m.rhai"), "");
        write(&b.path().join("m.rhai"), "");
        let roots = vec![a.path().to_path_buf(), b.path().to_path_buf()];
        assert_eq!(find_dotted(&roots, "m").unwrap().path, a.path().join("m.rhai"));
    }

    #[test]
    fn runtime_directories_follow_host_order() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        fs::create_dir_all(first.path().join("rhai1")).unwrap();
        fs::create_dir_all(second.path().join("rhaix")).unwrap();
        fs::create_dir_all(second.path().join("rhai1")).unwrap();

        let host = MemoryHost::new();
        host.set_runtime_paths(vec![
            first.path().to_path_buf(),
            PathBuf::from("/nonexistent/lark/runtime"),
            second.path().to_path_buf(),
        ]);
        let dirs = discover_runtime_directories(&host, &HostSettings::default());
        assert_eq!(
            dirs,
            vec![
                first.path().join("rhai1"),
                second.path().join("rhaix"),
                second.path().join("rhai1"),
            ]
        );
    }

    #[test]
    fn sentinel_entry_imports_from_runtime_roots() {
        let runtime = tempfile::tempdir().unwrap();
        write(
            &runtime.path().join("rhaix/greet.rhai"),
            "fn hello(name) { `hello ${name}` }",
        );
        let host = MemoryHost::new();
        host.set_runtime_paths(vec![runtime.path().to_path_buf()]);

        let search = ModuleSearch::new();
        search.register(Arc::new(RuntimeProvider::new(
            Arc::new(host),
            HostSettings::default(),
        )));
        search.push_entry(RUNTIME_PATH_SENTINEL);

        let engine = engine_with(&search);
        let out: String = engine
            .eval(r#"import "greet" as g; g::hello("lark")"#)
            .unwrap();
        assert_eq!(out, "hello lark");
        assert!(search.is_loaded("greet"));
    }

    #[test]
    fn runtime_paths_are_queried_per_import() {
        let runtime = tempfile::tempdir().unwrap();
        write(&runtime.path().join("rhai1/late.rhai"), "export const X = 7;");
        let host = MemoryHost::new();

        let search = ModuleSearch::new();
        search.register(Arc::new(RuntimeProvider::new(
            Arc::new(host.clone()),
            HostSettings::default(),
        )));
        search.push_entry(RUNTIME_PATH_SENTINEL);
        let engine = engine_with(&search);

        assert!(engine.run(r#"import "late" as l;"#).is_err());
        host.set_runtime_paths(vec![runtime.path().to_path_buf()]);
        let x: i64 = engine.eval(r#"import "late" as l; l::X"#).unwrap();
        assert_eq!(x, 7);
    }

    #[test]
    fn missing_module_is_standard_not_found() {
        let search = ModuleSearch::new();
        search.register(Arc::new(RuntimeProvider::new(
            Arc::new(MemoryHost::new()),
            HostSettings::default(),
        )));
        search.push_entry(RUNTIME_PATH_SENTINEL);
        let engine = engine_with(&search);

        let err = engine.run(r#"import "nowhere" as n;"#).unwrap_err();
        assert!(matches!(*err, EvalAltResult::ErrorModuleNotFound(ref name, _) if name == "nowhere"));
    }

    #[test]
    fn loaded_modules_are_reused() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("counter.rhai"), "export const N = 1;");
        let search = ModuleSearch::new();
        search.register(Arc::new(DirectoryProvider));
        search.push_entry(dir.path().display().to_string());
        let engine = engine_with(&search);

        engine.run(r#"import "counter" as c;"#).unwrap();
        fs::remove_file(dir.path().join("counter.rhai")).unwrap();
        let n: i64 = engine.eval(r#"import "counter" as c; c::N"#).unwrap();
        assert_eq!(n, 1);
    }

    #[test]
    fn unclaimed_entries_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("m.rhai"), "");
        let search = ModuleSearch::new();
        search.push_entry(dir.path().display().to_string());
        assert!(search.locate("m").is_none());

        search.register(Arc::new(DirectoryProvider));
        assert!(search.locate("m").is_some());
    }

    #[test]
    fn broken_module_reports_in_module_error() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("bad.rhai"), "let = ;");
        let search = ModuleSearch::new();
        search.register(Arc::new(DirectoryProvider));
        search.push_entry(dir.path().display().to_string());
        let engine = engine_with(&search);

        let err = engine.run(r#"import "bad" as b;"#).unwrap_err();
        assert!(matches!(*err, EvalAltResult::ErrorInModule(ref name, _, _) if name == "bad"));
    }
}
