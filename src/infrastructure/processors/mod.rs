// Processors module
pub mod chunk_planner;
pub mod common;
pub mod css_processor;
pub mod diagnostics;
pub mod emitter;
pub mod html;
pub mod linker;
pub mod minifier;
pub mod typescript;

pub use chunk_planner::{ChunkPlan, ChunkPlanner, PlanWarning};
pub use css_processor::LightningCssProcessor;
pub use diagnostics::{DiagnosticsStripper, StripOutcome};
pub use emitter::{BuildEmitter, EmitOutput};
pub use html::HtmlInjector;
pub use linker::{LinkTarget, ModuleLinker};
pub use minifier::{MinificationStats, OxcMinifier};
pub use typescript::{Lowered, TypeScriptLowering};
