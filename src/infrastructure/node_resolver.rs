use parking_lot::Mutex;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

const EXTENSIONS: &[&str] = &["ts", "tsx", "mts", "js", "jsx", "mjs", "cjs", "json", "css"];
const INDEX_FILES: &[&str] = &["index.ts", "index.tsx", "index.js", "index.jsx", "index.mjs", "index.json"];

/// The parts of `package.json` used for entry resolution
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PackageJson {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub main: Option<String>,
    #[serde(default)]
    pub module: Option<String>,
    #[serde(default)]
    pub browser: Option<BrowserField>,
    #[serde(default)]
    pub exports: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum BrowserField {
    String(String),
    Object(HashMap<String, serde_json::Value>),
}

impl PackageJson {
    pub fn read(path: &Path) -> Option<Self> {
        let content = std::fs::read_to_string(path).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Entry of the root export (`"exports": "./x.js"` or `{".": ...}`),
    /// preferring browser, then import, then default conditions
    fn root_export(&self) -> Option<String> {
        let exports = self.exports.as_ref()?;
        let root = match exports {
            serde_json::Value::Object(map) if map.contains_key(".") => map.get(".")?,
            other => other,
        };
        pick_condition(root)
    }
}

fn pick_condition(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Object(map) => ["browser", "import", "module", "default"]
            .iter()
            .filter_map(|key| map.get(*key))
            .find_map(pick_condition),
        _ => None,
    }
}

/// Node-style resolution of relative, root-absolute and bare specifiers
pub struct NodeModuleResolver {
    root: PathBuf,
    package_cache: Mutex<HashMap<PathBuf, Option<PackageJson>>>,
}

impl NodeModuleResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            package_cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn resolve(&self, specifier: &str, importer: &Path) -> Option<PathBuf> {
        let specifier = specifier.split(['?', '#']).next().unwrap_or(specifier);

        if specifier.starts_with("./") || specifier.starts_with("../") {
            let dir = importer.parent()?;
            return self.resolve_file_or_directory(&dir.join(specifier));
        }

        if let Some(rooted) = specifier.strip_prefix('/') {
            return self.resolve_file_or_directory(&self.root.join(rooted));
        }

        self.resolve_node_module(specifier, importer)
    }

    /// Resolve a path that may lack an extension (alias targets)
    pub fn resolve_path(&self, path: &Path) -> Option<PathBuf> {
        self.resolve_file_or_directory(path)
    }

    pub fn is_bare(specifier: &str) -> bool {
        !specifier.starts_with("./")
            && !specifier.starts_with("../")
            && !specifier.starts_with('/')
            && !specifier.contains("://")
    }

    /// `@scope/pkg/sub/path` -> (`@scope/pkg`, Some(`sub/path`))
    pub fn split_specifier(specifier: &str) -> (String, Option<String>) {
        let segments = if specifier.starts_with('@') { 2 } else { 1 };
        let mut parts = specifier.splitn(segments + 1, '/');
        let name: Vec<&str> = parts.by_ref().take(segments).collect();
        let subpath = parts.next().filter(|s| !s.is_empty()).map(str::to_string);
        (name.join("/"), subpath)
    }

    fn resolve_node_module(&self, specifier: &str, importer: &Path) -> Option<PathBuf> {
        let (package, subpath) = Self::split_specifier(specifier);

        let mut dir = importer.parent();
        while let Some(current) = dir {
            let package_dir = current.join("node_modules").join(&package);
            if package_dir.is_dir() {
                if let Some(entry) = self.resolve_package_entry(&package_dir, subpath.as_deref()) {
                    return Some(entry);
                }
            }

            if current == self.root {
                break;
            }
            dir = current.parent();
        }

        let package_dir = self.root.join("node_modules").join(&package);
        if package_dir.is_dir() {
            return self.resolve_package_entry(&package_dir, subpath.as_deref());
        }

        None
    }

    fn resolve_package_entry(&self, package_dir: &Path, subpath: Option<&str>) -> Option<PathBuf> {
        if let Some(subpath) = subpath {
            return self.resolve_file_or_directory(&package_dir.join(subpath));
        }

        let Some(package) = self.package_json(&package_dir.join("package.json")) else {
            return self.resolve_index(package_dir);
        };

        let browser = match &package.browser {
            Some(BrowserField::String(path)) => Some(path.clone()),
            _ => None,
        };

        let candidates = [package.root_export(), package.module.clone(), browser, package.main.clone()];
        for candidate in candidates.into_iter().flatten() {
            if let Some(resolved) = self.resolve_file_or_directory(&package_dir.join(candidate)) {
                return Some(resolved);
            }
        }

        self.resolve_index(package_dir)
    }

    fn resolve_file_or_directory(&self, path: &Path) -> Option<PathBuf> {
        if path.is_file() {
            return Some(normalize(path));
        }

        for ext in EXTENSIONS {
            let mut candidate = path.as_os_str().to_owned();
            candidate.push(".");
            candidate.push(ext);
            let candidate = PathBuf::from(candidate);
            if candidate.is_file() {
                return Some(normalize(&candidate));
            }
        }

        if path.is_dir() {
            if let Some(main) = self
                .package_json(&path.join("package.json"))
                .and_then(|p| p.module.or(p.main))
            {
                let entry = path.join(main);
                if entry.is_file() {
                    return Some(normalize(&entry));
                }
            }
            return self.resolve_index(path);
        }

        None
    }

    fn resolve_index(&self, dir: &Path) -> Option<PathBuf> {
        INDEX_FILES
            .iter()
            .map(|index| dir.join(index))
            .find(|candidate| candidate.is_file())
            .map(|p| normalize(&p))
    }

    fn package_json(&self, path: &Path) -> Option<PackageJson> {
        let mut cache = self.package_cache.lock();
        cache
            .entry(path.to_path_buf())
            .or_insert_with(|| PackageJson::read(path))
            .clone()
    }
}

/// Lexically drop `.` and `..` components so module ids stay canonical
pub fn normalize(path: &Path) -> PathBuf {
    use std::path::Component;

    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_split_specifier() {
        assert_eq!(NodeModuleResolver::split_specifier("vue"), ("vue".to_string(), None));
        assert_eq!(
            NodeModuleResolver::split_specifier("date-fns/format"),
            ("date-fns".to_string(), Some("format".to_string()))
        );
        assert_eq!(
            NodeModuleResolver::split_specifier("@vueuse/core"),
            ("@vueuse/core".to_string(), None)
        );
        assert_eq!(
            NodeModuleResolver::split_specifier("@vueuse/core/index.mjs"),
            ("@vueuse/core".to_string(), Some("index.mjs".to_string()))
        );
    }

    #[test]
    fn test_relative_with_extension_probing() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        write(&root.join("src/tools/base64.ts"), "export {}");
        write(&root.join("src/main.ts"), "");

        let resolver = NodeModuleResolver::new(root);
        let resolved = resolver
            .resolve("./tools/base64", &root.join("src/main.ts"))
            .unwrap();
        assert_eq!(resolved, root.join("src/tools/base64.ts"));
    }

    #[test]
    fn test_package_fields_in_order() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        write(
            &root.join("node_modules/pinia/package.json"),
            r#"{"name":"pinia","main":"index.cjs","module":"dist/pinia.mjs"}"#,
        );
        write(&root.join("node_modules/pinia/dist/pinia.mjs"), "export {}");
        write(&root.join("node_modules/pinia/index.cjs"), "");
        write(
            &root.join("node_modules/@vueuse/core/package.json"),
            r#"{"exports":{".":{"import":"./index.mjs","require":"./index.cjs"}}}"#,
        );
        write(&root.join("node_modules/@vueuse/core/index.mjs"), "export {}");

        let resolver = NodeModuleResolver::new(root);
        let importer = root.join("src/main.ts");

        assert_eq!(
            resolver.resolve("pinia", &importer),
            Some(root.join("node_modules/pinia/dist/pinia.mjs"))
        );
        assert_eq!(
            resolver.resolve("@vueuse/core", &importer),
            Some(root.join("node_modules/@vueuse/core/index.mjs"))
        );
        assert_eq!(resolver.resolve("missing-pkg", &importer), None);
    }

    #[test]
    fn test_directory_index_and_normalization() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        write(&root.join("src/utils/index.ts"), "export {}");
        write(&root.join("src/tools/x.ts"), "");

        let resolver = NodeModuleResolver::new(root);
        let resolved = resolver
            .resolve("../utils", &root.join("src/tools/x.ts"))
            .unwrap();
        assert_eq!(resolved, root.join("src/utils/index.ts"));
    }
}
