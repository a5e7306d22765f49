// Core domain layer
pub mod config;
pub mod interfaces;
pub mod models;
pub mod plugin;
pub mod services;

pub use config::*;
pub use interfaces::*;
pub use models::*;
pub use services::*;
