use crate::core::config::{BuildConfig, ChunkRule};
use crate::core::models::{Chunk, ChunkKind, Module};
use crate::utils::Logger;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// Assigns every module to exactly one named chunk using ordered package rules
#[derive(Debug, Clone)]
pub struct ChunkPlanner {
    rules: Vec<ChunkRule>,
    default_chunk: String,
    /// KiB
    size_warning_limit: usize,
}

/// Non-fatal findings of a planning run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanWarning {
    /// A rule names a package no module belongs to
    UnusedPackage { chunk: String, package: String },
    /// A package is listed by more than one rule; the first one wins
    OverlappingPackage {
        package: String,
        assigned_to: String,
        shadowed: String,
    },
    OversizedChunk {
        chunk: String,
        size_kib: usize,
        limit_kib: usize,
    },
}

impl fmt::Display for PlanWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanWarning::UnusedPackage { chunk, package } => write!(
                f,
                "chunk \"{}\" lists package \"{}\" but no module belongs to it",
                chunk, package
            ),
            PlanWarning::OverlappingPackage {
                package,
                assigned_to,
                shadowed,
            } => write!(
                f,
                "package \"{}\" is listed by chunks \"{}\" and \"{}\"; using \"{}\"",
                package, assigned_to, shadowed, assigned_to
            ),
            PlanWarning::OversizedChunk {
                chunk,
                size_kib,
                limit_kib,
            } => write!(
                f,
                "chunk \"{}\" is {} kB, larger than the {} kB warning limit",
                chunk, size_kib, limit_kib
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChunkPlan {
    /// Rule chunks in rule order, then the default chunk
    pub chunks: Vec<Chunk>,
    pub warnings: Vec<PlanWarning>,
}

impl ChunkPlan {
    pub fn chunk_of(&self, module_id: &str) -> Option<&str> {
        self.chunks
            .iter()
            .find(|c| c.contains(module_id))
            .map(|c| c.name.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&Chunk> {
        self.chunks.iter().find(|c| c.name == name)
    }

    /// Chunk name -> module ids, for reports and determinism checks
    pub fn membership(&self) -> BTreeMap<String, Vec<String>> {
        self.chunks
            .iter()
            .map(|c| {
                (
                    c.name.clone(),
                    c.modules.iter().map(|m| m.id.clone()).collect(),
                )
            })
            .collect()
    }

    pub fn module_count(&self) -> usize {
        self.chunks.iter().map(|c| c.modules.len()).sum()
    }
}

impl ChunkPlanner {
    pub fn new(rules: Vec<ChunkRule>, default_chunk: impl Into<String>) -> Self {
        Self {
            rules,
            default_chunk: default_chunk.into(),
            size_warning_limit: 1000,
        }
    }

    pub fn from_config(config: &BuildConfig) -> Self {
        Self::new(config.manual_chunks.clone(), config.default_chunk.clone())
            .with_size_warning_limit(config.chunk_size_warning_limit)
    }

    pub fn with_size_warning_limit(mut self, limit_kib: usize) -> Self {
        self.size_warning_limit = limit_kib;
        self
    }

    /// Plan chunk membership. Output depends only on the module set and the
    /// rules, never on the order modules were discovered in.
    pub fn plan(&self, modules: &[Arc<Module>]) -> ChunkPlan {
        let mut warnings = Vec::new();

        // package -> index of the first rule listing it
        let mut owner: HashMap<&str, usize> = HashMap::new();
        for (index, rule) in self.rules.iter().enumerate() {
            for package in &rule.packages {
                match owner.get(package.as_str()) {
                    Some(&first) if first != index => {
                        warnings.push(PlanWarning::OverlappingPackage {
                            package: package.clone(),
                            assigned_to: self.rules[first].name.clone(),
                            shadowed: rule.name.clone(),
                        });
                    }
                    Some(_) => {}
                    None => {
                        owner.insert(package.as_str(), index);
                    }
                }
            }
        }

        let mut sorted: Vec<Arc<Module>> = modules.to_vec();
        sorted.sort_by(|a, b| a.id.cmp(&b.id));
        sorted.dedup_by(|a, b| a.id == b.id);

        let mut buckets: Vec<Vec<Arc<Module>>> = vec![Vec::new(); self.rules.len()];
        let mut default_bucket = Vec::new();

        for module in sorted {
            let rule_index = module
                .package
                .as_deref()
                .and_then(|package| owner.get(package).copied());

            match rule_index {
                Some(index) => buckets[index].push(module),
                None => default_bucket.push(module),
            }
        }

        for rule in &self.rules {
            for package in &rule.packages {
                let first_owner = owner.get(package.as_str()).map(|&i| &self.rules[i].name);
                if first_owner != Some(&rule.name) {
                    continue;
                }
                let used = modules
                    .iter()
                    .any(|m| m.package.as_deref() == Some(package.as_str()));
                if !used {
                    warnings.push(PlanWarning::UnusedPackage {
                        chunk: rule.name.clone(),
                        package: package.clone(),
                    });
                }
            }
        }

        let mut chunks: Vec<Chunk> = self
            .rules
            .iter()
            .zip(buckets)
            .filter(|(_, modules)| !modules.is_empty())
            .map(|(rule, modules)| Chunk {
                name: rule.name.clone(),
                kind: ChunkKind::Manual,
                modules,
            })
            .collect();

        if !default_bucket.is_empty() {
            chunks.push(Chunk {
                name: self.default_chunk.clone(),
                kind: ChunkKind::Default,
                modules: default_bucket,
            });
        }

        for chunk in &chunks {
            let size_kib = chunk.size_bytes() / 1024;
            if size_kib > self.size_warning_limit {
                warnings.push(PlanWarning::OversizedChunk {
                    chunk: chunk.name.clone(),
                    size_kib,
                    limit_kib: self.size_warning_limit,
                });
            }
        }

        for warning in &warnings {
            Logger::warn(&warning.to_string());
        }

        ChunkPlan { chunks, warnings }
    }
}

impl Default for ChunkPlanner {
    fn default() -> Self {
        Self::new(Vec::new(), "index")
    }
}
