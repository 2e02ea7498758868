mod engine;
mod settings;

pub use engine::ConfigEngine;
pub use settings::{DEFAULT_BATCH_SIZE, HostSettings};
