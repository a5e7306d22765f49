// Shared utilities module
pub mod build_ui;
pub mod config_loader;
pub mod env_vars;
pub mod errors;
pub mod hashing;
pub mod logging;
pub mod source_maps;

pub use build_ui::BuildUi;
pub use config_loader::{CliOverrides, ConfigLoader, SatchelConfig};
pub use env_vars::EnvInputs;
pub use errors::*;
pub use hashing::*;
pub use logging::*;
pub use source_maps::*;
