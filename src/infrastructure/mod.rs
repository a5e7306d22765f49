// Infrastructure layer
pub mod discovery;
pub mod file_system;
pub mod node_resolver;
pub mod preview;
pub mod processors;
pub mod pwa;

pub use discovery::{DiscoveryResult, ModuleDiscovery};
pub use file_system::{Publisher, TokioFileSystemService};
pub use node_resolver::NodeModuleResolver;
pub use preview::PreviewServer;
