/// Host settings that can be customized via Rhai config
#[derive(Debug, Clone, PartialEq)]
pub struct HostSettings {
    // Range apply
    pub batch_size: usize,

    // Module resolution: subdirectories of each runtime path
    pub aux_module_dir: String,
    pub versioned_module_dir: String,

    // Script limits (0 = unlimited)
    pub max_operations: u64,
    pub max_expr_depth: usize,

    // Logging filter used when RUST_LOG is unset
    pub log_filter: String,
}

pub const DEFAULT_BATCH_SIZE: usize = 5000;

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,

            aux_module_dir: "rhaix".to_string(),
            versioned_module_dir: "rhai1".to_string(),

            max_operations: 0,
            max_expr_depth: 64,

            log_filter: "info".to_string(),
        }
    }
}
