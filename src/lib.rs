// satchel - production bundler with chunk planning and an offline cache

pub mod cli;
pub mod core;
pub mod infrastructure;
pub mod plugins;
pub mod utils;
