use satchel::core::config::BuildConfig;
use satchel::core::interfaces::BuildService;
use satchel::core::models::BuildResult;
use satchel::core::services::SatchelBuildService;
use satchel::utils::{CliOverrides, ConfigLoader, EnvInputs, Result};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const CONFIG: &str = r#"{
  "base": "/",
  "build": {
    "manualChunks": [
      { "name": "vue-vendor", "packages": ["vue", "vue-router", "pinia"] }
    ]
  }
}"#;

pub const PWA_CONFIG: &str = r##"{
  "base": "/",
  "build": {
    "manualChunks": [
      { "name": "vue-vendor", "packages": ["vue", "vue-router", "pinia"] }
    ]
  },
  "pwa": {
    "registerType": "autoUpdate",
    "includeAssets": ["favicon.ico"],
    "attribution": "utm_source=pwa&utm_medium=pwa",
    "manifest": {
      "name": "ToolsApp Lab",
      "short_name": "ToolsApp Lab",
      "description": "Developer tools running locally in your browser.",
      "display": "standalone",
      "lang": "en-US",
      "orientation": "any",
      "theme_color": "#0B0E14",
      "background_color": "#0B0E14",
      "icons": [
        { "src": "/favicon-16x16.png", "type": "image/png", "sizes": "16x16" },
        { "src": "/android-chrome-512x512.png", "type": "image/png", "sizes": "512x512", "purpose": "any maskable" }
      ]
    }
  }
}"##;

/// A small Vue-style tools app: one vendor group, one tool, styles, media
pub struct Fixture {
    dir: TempDir,
}

impl Fixture {
    pub fn tools_app(config: &str) -> Self {
        let fixture = Self {
            dir: tempfile::tempdir().unwrap(),
        };

        fixture.write("satchel.config.json", config);
        fixture.write("package.json", r#"{ "name": "tools-app", "version": "2024.5.1" }"#);
        fixture.write(
            "index.html",
            r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="UTF-8" />
    <title>ToolsApp Lab</title>
  </head>
  <body>
    <div id="app"></div>
    <script type="module" src="/src/main.ts"></script>
  </body>
</html>
"#,
        );

        fixture.write(
            "src/main.ts",
            r#"import { createApp } from 'vue';
import { useTool } from '@/tools/my-tool';
import logo from './assets/logo.svg';
import './style.css';

const version: string = import.meta.env.PACKAGE_VERSION;

createApp({ logo, version, store: useTool }).mount('#app');
"#,
        );
        fixture.write(
            "src/tools/my-tool.ts",
            r#"import { defineStore } from 'pinia';

export interface ToolState {
  count: number;
}

export const useTool = defineStore('my-tool', (): ToolState => {
  console.log('creating store');
  return { count: 0 };
});
"#,
        );
        fixture.write("src/style.css", "@import './reset.css';\n\nbody {\n  color: #333333;\n}\n");
        fixture.write("src/reset.css", "* {\n  margin: 0;\n}\n");
        fixture.write(
            "src/assets/logo.svg",
            r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 1 1"><rect width="1" height="1"/></svg>"#,
        );

        fixture.write(
            "node_modules/vue/package.json",
            r#"{ "name": "vue", "version": "3.4.0", "module": "dist/vue.runtime.esm-bundler.js" }"#,
        );
        fixture.write(
            "node_modules/vue/dist/vue.runtime.esm-bundler.js",
            "export function createApp(root) {\n  return { mount(selector) { return { root, selector }; } };\n}\n",
        );
        fixture.write(
            "node_modules/pinia/package.json",
            r#"{ "name": "pinia", "version": "2.1.0", "main": "index.js" }"#,
        );
        fixture.write(
            "node_modules/pinia/index.js",
            "export function defineStore(id, setup) {\n  return () => ({ id, state: setup() });\n}\n",
        );

        fixture.write("public/favicon.ico", "ICO");
        fixture.write("public/favicon-16x16.png", "PNG16");
        fixture.write("public/android-chrome-512x512.png", "PNG512");
        fixture.write("public/robots.txt", "User-agent: *\n");

        fixture
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn dist(&self) -> PathBuf {
        self.root().join("dist")
    }

    pub fn write(&self, rel: &str, content: &str) {
        let path = self.root().join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    pub fn read_dist(&self, rel: &str) -> String {
        std::fs::read_to_string(self.dist().join(rel)).unwrap()
    }

    /// Config file, CLI overrides and package.json version, as `satchel build` resolves them
    pub fn config(&self, cli: &CliOverrides) -> Result<BuildConfig> {
        self.config_with_env(cli, &[])
    }

    /// Same, with `vars` standing in for the process environment
    pub fn config_with_env(&self, cli: &CliOverrides, vars: &[(&str, &str)]) -> Result<BuildConfig> {
        let vars: Vec<(String, String)> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        let env = EnvInputs::from_lookup(self.root(), |key| {
            vars.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())
        });
        ConfigLoader::resolve(self.root().to_path_buf(), cli, &env)
    }

    pub async fn build(&self, cli: &CliOverrides) -> Result<BuildResult> {
        self.build_with_env(cli, &[]).await
    }

    pub async fn build_with_env(&self, cli: &CliOverrides, vars: &[(&str, &str)]) -> Result<BuildResult> {
        let config = self.config_with_env(cli, vars)?;
        SatchelBuildService::with_defaults(config, false)?.build().await
    }

    /// Every file below dist, relative and sorted
    pub fn dist_files(&self) -> Vec<String> {
        let mut files = Vec::new();
        let mut pending = vec![self.dist()];
        while let Some(dir) = pending.pop() {
            for entry in std::fs::read_dir(&dir).unwrap() {
                let path = entry.unwrap().path();
                if path.is_dir() {
                    pending.push(path);
                } else {
                    let rel = path.strip_prefix(self.dist()).unwrap();
                    files.push(rel.to_string_lossy().replace('\\', "/"));
                }
            }
        }
        files.sort();
        files
    }
}
