// Built-in pipeline stages

pub mod alias_plugin;
pub mod define_plugin;
pub mod minify_plugin;
pub mod stats_plugin;
pub mod strip_plugin;

pub use alias_plugin::AliasPlugin;
pub use define_plugin::DefinePlugin;
pub use minify_plugin::MinifyPlugin;
pub use stats_plugin::StatsPlugin;
pub use strip_plugin::StripPlugin;

use crate::core::config::BuildConfig;
use crate::core::plugin::StagePipeline;
use crate::utils::Result;
use std::sync::Arc;

/// The production stage chain: alias, define, strip, minify, stats.
/// Stripping runs before minification so removed calls never reach the minifier.
pub fn default_pipeline(config: &BuildConfig, verbose: bool) -> Result<StagePipeline> {
    let mut pipeline = StagePipeline::new()
        .with(Arc::new(AliasPlugin))
        .with(Arc::new(DefinePlugin::new(&config.define)?));

    let strip = StripPlugin::from_config(config);
    if !strip.is_noop() {
        pipeline.register(Arc::new(strip));
    }

    if config.minify {
        pipeline.register(Arc::new(MinifyPlugin::default()));
    }

    pipeline.register(Arc::new(StatsPlugin::new(verbose)));
    Ok(pipeline)
}
