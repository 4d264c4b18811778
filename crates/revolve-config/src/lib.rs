mod interpolate;
mod loader;
mod raw;
pub mod error;

pub use error::ConfigError;
pub use interpolate::{extract_resource_refs, resolve_template};
pub use loader::{load_config, LoadedConfig};
