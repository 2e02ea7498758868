use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use rhai::{Engine, Scope};

use super::HostSettings;

/// The Rhai scripting engine for configuration
pub struct ConfigEngine {
    engine: Engine,
    settings: Arc<RwLock<HostSettings>>,
}

impl ConfigEngine {
    pub fn new() -> Self {
        let settings = Arc::new(RwLock::new(HostSettings::default()));
        let engine = Self::create_engine(Arc::clone(&settings));

        Self { engine, settings }
    }

    fn create_engine(settings: Arc<RwLock<HostSettings>>) -> Engine {
        let mut engine = Engine::new();

        // Limit script execution for safety
        engine.set_max_expr_depths(64, 64);
        engine.set_max_operations(100_000);

        {
            let s = Arc::clone(&settings);
            engine.register_fn("set_batch_size", move |size: i64| {
                if let Ok(mut settings) = s.write() {
                    settings.batch_size = size.clamp(1, 1_000_000) as usize;
                }
            });
        }

        {
            let s = Arc::clone(&settings);
            engine.register_fn("set_module_dirs", move |aux: &str, versioned: &str| {
                if let Ok(mut settings) = s.write() {
                    settings.aux_module_dir = aux.to_string();
                    settings.versioned_module_dir = versioned.to_string();
                }
            });
        }

        {
            let s = Arc::clone(&settings);
            engine.register_fn("set_max_operations", move |ops: i64| {
                if let Ok(mut settings) = s.write() {
                    settings.max_operations = ops.max(0) as u64;
                }
            });
        }

        {
            let s = Arc::clone(&settings);
            engine.register_fn("set_max_expr_depth", move |depth: i64| {
                if let Ok(mut settings) = s.write() {
                    settings.max_expr_depth = depth.clamp(0, 1024) as usize;
                }
            });
        }

        {
            let s = Arc::clone(&settings);
            engine.register_fn("set_log_filter", move |filter: &str| {
                if let Ok(mut settings) = s.write() {
                    settings.log_filter = filter.to_string();
                }
            });
        }

        {
            let s = Arc::clone(&settings);
            engine.register_fn("get_batch_size", move || -> i64 {
                s.read().map(|s| s.batch_size as i64).unwrap_or_default()
            });
        }

        // Config scripts have nowhere to print to
        engine.on_print(|_| {});

        engine
    }

    /// Load and execute a config file
    pub fn load_file(&mut self, path: &Path) -> Result<(), String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        self.eval(&content)
    }

    /// Evaluate a Rhai config script string
    pub fn eval(&mut self, script: &str) -> Result<(), String> {
        let ast = self
            .engine
            .compile(script)
            .map_err(|e| format!("Config parse error: {}", e))?;

        let mut scope = Scope::new();
        self.engine
            .run_ast_with_scope(&mut scope, &ast)
            .map_err(|e| format!("Config error: {}", e))?;

        Ok(())
    }

    /// Get the current settings (cloned)
    pub fn settings(&self) -> HostSettings {
        self.settings.read().map(|s| s.clone()).unwrap_or_default()
    }

    /// Get the config directory path
    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("lark"))
    }

    /// Get the default config file path
    pub fn config_file() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("host.rhai"))
    }

    /// Load the default config file if it exists
    pub fn load_default(&mut self) -> Result<(), String> {
        if let Some(config_file) = Self::config_file() {
            if config_file.exists() {
                return self.load_file(&config_file);
            }
        }
        Ok(()) // No config file is fine
    }
}

impl Default for ConfigEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_batch_size() {
        let mut engine = ConfigEngine::new();
        engine.eval("set_batch_size(100);").unwrap();
        assert_eq!(engine.settings().batch_size, 100);
    }

    #[test]
    fn test_set_batch_size_clamped() {
        let mut engine = ConfigEngine::new();
        engine.eval("set_batch_size(0);").unwrap();
        assert_eq!(engine.settings().batch_size, 1); // Clamped to min
    }

    #[test]
    fn test_set_module_dirs() {
        let mut engine = ConfigEngine::new();
        engine.eval(r#"set_module_dirs("lua", "lua5");"#).unwrap();
        let settings = engine.settings();
        assert_eq!(settings.aux_module_dir, "lua");
        assert_eq!(settings.versioned_module_dir, "lua5");
    }

    #[test]
    fn test_multiple_settings() {
        let mut engine = ConfigEngine::new();
        engine
            .eval(
                r#"
                set_batch_size(get_batch_size() * 2);
                set_max_operations(-5);
                set_max_expr_depth(32);
                set_log_filter("debug");
            "#,
            )
            .unwrap();

        let settings = engine.settings();
        assert_eq!(settings.batch_size, 10_000);
        assert_eq!(settings.max_operations, 0);
        assert_eq!(settings.max_expr_depth, 32);
        assert_eq!(settings.log_filter, "debug");
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("host.rhai");
        std::fs::write(&path, "set_batch_size(7);").unwrap();

        let mut engine = ConfigEngine::new();
        engine.load_file(&path).unwrap();
        assert_eq!(engine.settings().batch_size, 7);
        assert!(engine.load_file(&dir.path().join("missing.rhai")).is_err());
    }

    #[test]
    fn test_parse_error() {
        let mut engine = ConfigEngine::new();
        let err = engine.eval("set_batch_size(").unwrap_err();
        assert!(err.starts_with("Config parse error"));
    }
}
