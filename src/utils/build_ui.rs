use crate::core::models::{Asset, BuildResult, MediaCategory};
use crate::infrastructure::processors::ChunkPlan;
use colored::*;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::Write;

/// Terminal report of a finished build
pub struct BuildUi;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFileInfo {
    pub name: String,
    pub size: usize,
    /// Only computed for scripts, styles and HTML
    pub gzip_size: Option<usize>,
}

impl OutputFileInfo {
    pub fn from_asset(asset: &Asset) -> Self {
        let compressible = matches!(asset.category, MediaCategory::Script | MediaCategory::Style)
            || matches!(asset.extension(), "html" | "json" | "webmanifest");

        Self {
            name: asset.file_name.clone(),
            size: asset.size(),
            gzip_size: compressible.then(|| gzip_size(&asset.bytes)),
        }
    }
}

impl BuildUi {
    pub fn show_banner() {
        println!(
            "\n  {} {}",
            "SATCHEL".bright_cyan().bold(),
            concat!("v", env!("CARGO_PKG_VERSION")).bright_white()
        );
        println!();
    }

    pub fn show_completion(result: &BuildResult) {
        let outdir = format!("{}/", result.outdir.file_name().and_then(|n| n.to_str()).unwrap_or("dist"));

        let mut files: Vec<OutputFileInfo> = result.assets.iter().map(OutputFileInfo::from_asset).collect();
        files.sort_by(|a, b| a.name.cmp(&b.name));
        let width = files.iter().map(|f| f.name.len()).max().unwrap_or(0);

        println!();
        for file in &files {
            let gzip = file
                .gzip_size
                .map(|g| format!(" │ gzip: {}", format_size(g)))
                .unwrap_or_default();

            println!(
                "  {}{} {}",
                outdir.bright_black(),
                colorize(&file.name, width),
                format!("{:>10}{}", format_size(file.size), gzip).bright_black()
            );
        }

        for warning in &result.warnings {
            println!("  {} {}", "!".yellow().bold(), warning.yellow());
        }

        if let Some(manifest) = &result.cache_manifest {
            println!();
            println!(
                "  {} precache {} entries, version {}",
                "PWA".bright_magenta().bold(),
                manifest.precached().count().to_string().bright_white(),
                manifest.version.bright_white()
            );
        }

        println!();
        println!(
            "  {} built in {}",
            "✓".bright_green(),
            format!("{:.0}ms", result.build_time.as_secs_f64() * 1000.0)
                .bright_white()
                .bold()
        );
    }

    pub fn show_plan(plan: &ChunkPlan) {
        println!();
        for chunk in &plan.chunks {
            println!(
                "  {} {}",
                chunk.name.bright_cyan().bold(),
                format!("({} modules, {})", chunk.modules.len(), format_size(chunk.size_bytes())).bright_black()
            );
            for module in &chunk.modules {
                println!("    {}", module.id);
            }
        }

        for warning in &plan.warnings {
            println!("  {} {}", "!".yellow().bold(), warning.to_string().yellow());
        }
        println!();
    }
}

fn colorize(name: &str, width: usize) -> ColoredString {
    let padded = format!("{:<width$}", name, width = width);
    if name.ends_with(".js") {
        padded.bright_cyan()
    } else if name.ends_with(".css") {
        padded.bright_magenta()
    } else if name.ends_with(".html") {
        padded.bright_green()
    } else {
        padded.normal()
    }
}

pub fn format_size(bytes: usize) -> String {
    let kb = bytes as f64 / 1024.0;
    if kb < 1.0 {
        format!("{} B", bytes)
    } else {
        format!("{:.2} kB", kb)
    }
}

/// Size of `bytes` after default-level gzip
pub fn gzip_size(bytes: &[u8]) -> usize {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    if encoder.write_all(bytes).is_err() {
        return bytes.len();
    }
    encoder.finish().map(|out| out.len()).unwrap_or(bytes.len())
}
