use crate::core::interfaces::BuildService;
use crate::core::services::SatchelBuildService;
use crate::infrastructure::pwa::render_manifest;
use crate::infrastructure::PreviewServer;
use crate::utils::{BuildUi, CliOverrides, ConfigLoader, EnvInputs, Logger, Result, SatchelError};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "satchel")]
#[command(about = "satchel - chunked, content-hashed production builds with an offline cache")]
#[command(version)]
pub struct Cli {
    /// Debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build for production
    Build {
        /// Root directory
        #[arg(short, long, default_value = ".")]
        root: String,
        /// Output directory
        #[arg(short, long)]
        outdir: Option<String>,
        /// Public base path
        #[arg(long)]
        base: Option<String>,
        /// Disable minification
        #[arg(long)]
        no_minify: bool,
        /// Keep console.* calls
        #[arg(long)]
        keep_console: bool,
        /// Write source maps (unminified builds only)
        #[arg(long)]
        sourcemap: bool,
    },
    /// Show chunk membership without emitting anything
    Plan {
        /// Root directory
        #[arg(short, long, default_value = ".")]
        root: String,
        /// Print JSON instead of a tree
        #[arg(long)]
        json: bool,
    },
    /// Validate and print the web app manifest
    Manifest {
        /// Root directory
        #[arg(short, long, default_value = ".")]
        root: String,
    },
    /// Serve a production build
    Preview {
        /// Root directory (for satchel.config.json)
        #[arg(short, long, default_value = ".")]
        root: String,
        /// Directory to serve, defaults to the configured output directory
        #[arg(short, long)]
        dir: Option<String>,
        /// Port to serve on
        #[arg(short, long)]
        port: Option<u16>,
        /// Host to bind
        #[arg(long)]
        host: Option<String>,
    },
    /// Show bundler information
    Info {
        /// Print an example satchel.config.json
        #[arg(long)]
        example_config: bool,
    },
}

#[derive(Serialize)]
struct PlanReport<'a> {
    chunks: BTreeMap<String, Vec<String>>,
    order: Vec<&'a str>,
    warnings: Vec<String>,
}

pub struct CliHandler;

impl CliHandler {
    pub fn new() -> Self {
        Self
    }

    pub async fn run(&self) -> Result<()> {
        let cli = Cli::parse();
        Logger::init(cli.verbose);

        match cli.command {
            Commands::Build {
                root,
                outdir,
                base,
                no_minify,
                keep_console,
                sourcemap,
            } => {
                let overrides = CliOverrides {
                    outdir,
                    base,
                    minify: no_minify.then_some(false),
                    drop_console: keep_console.then_some(false),
                    sourcemap: sourcemap.then_some(true),
                    ..Default::default()
                };
                self.handle_build_command(&root, &overrides, cli.verbose).await
            }
            Commands::Plan { root, json } => self.handle_plan_command(&root, json).await,
            Commands::Manifest { root } => self.handle_manifest_command(&root),
            Commands::Preview {
                root,
                dir,
                port,
                host,
            } => {
                let overrides = CliOverrides {
                    outdir: dir,
                    port,
                    host,
                    ..Default::default()
                };
                self.handle_preview_command(&root, &overrides).await
            }
            Commands::Info { example_config } => {
                self.handle_info_command(example_config);
                Ok(())
            }
        }
    }

    async fn handle_build_command(&self, root: &str, overrides: &CliOverrides, verbose: bool) -> Result<()> {
        BuildUi::show_banner();

        let root = PathBuf::from(root);
        let env = EnvInputs::from_env(&root);
        let config = ConfigLoader::resolve(root, overrides, &env)?;

        let mut build_service = SatchelBuildService::with_defaults(config, verbose)?;
        let result = build_service.build().await?;

        BuildUi::show_completion(&result);
        Ok(())
    }

    async fn handle_plan_command(&self, root: &str, json: bool) -> Result<()> {
        let root = PathBuf::from(root);
        let env = EnvInputs::from_env(&root);
        let config = ConfigLoader::resolve(root, &CliOverrides::default(), &env)?;

        let service = SatchelBuildService::with_defaults(config, false)?;
        let (_, plan) = service.plan().await?;

        if json {
            let report = PlanReport {
                chunks: plan.membership(),
                order: plan.chunks.iter().map(|c| c.name.as_str()).collect(),
                warnings: plan.warnings.iter().map(|w| w.to_string()).collect(),
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            BuildUi::show_plan(&plan);
        }

        Ok(())
    }

    fn handle_manifest_command(&self, root: &str) -> Result<()> {
        let root = PathBuf::from(root);
        let env = EnvInputs::from_env(&root);
        // validates the manifest too
        let config = ConfigLoader::resolve(root, &CliOverrides::default(), &env)?;

        let pwa = config
            .pwa
            .as_ref()
            .ok_or_else(|| SatchelError::config("satchel.config.json has no pwa section"))?;

        let rendered = render_manifest(&pwa.manifest, &pwa.attribution)?;
        println!("{}", String::from_utf8_lossy(&rendered));
        Logger::info("✅ Manifest is valid");
        Ok(())
    }

    async fn handle_preview_command(&self, root: &str, overrides: &CliOverrides) -> Result<()> {
        let root = PathBuf::from(root);
        let env = EnvInputs::from_env(&root);
        let config = ConfigLoader::resolve(root, overrides, &env)?;

        PreviewServer::new(&config.outdir, &config.base)
            .serve(&config.server.host, config.server.port)
            .await
    }

    fn handle_info_command(&self, example_config: bool) {
        if example_config {
            println!("{}", ConfigLoader::generate_example());
            return;
        }

        tracing::info!("🦀 satchel v{}", env!("CARGO_PKG_VERSION"));
        tracing::info!("══════════════════════════════════════");
        tracing::info!("🏗️  Pipeline:");
        tracing::info!("  • Module discovery (aliases, node_modules resolution)");
        tracing::info!("  • Ordered manualChunks planning, first rule wins");
        tracing::info!("  • oxc TypeScript lowering, console stripping and minification");
        tracing::info!("  • Lightning CSS for styles");
        tracing::info!("  • Content-hashed assets under assets/<type>/");
        tracing::info!("  • Precache manifest, sw.js, registerSW.js, manifest.webmanifest");
        tracing::info!("");
        tracing::info!("⚙️  Emission threads: {}", rayon::current_num_threads());
        tracing::info!("🖥️  CPUs: {}", num_cpus::get());
    }
}

impl Default for CliHandler {
    fn default() -> Self {
        Self::new()
    }
}
