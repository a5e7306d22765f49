use crate::fixture::{Fixture, CONFIG};
use satchel::core::models::{AssetOrigin, MediaCategory};
use satchel::utils::{CliOverrides, SatchelError};

fn is_hashed(file_name: &str, dir: &str, stem: &str, ext: &str) -> bool {
    let Some(rest) = file_name.strip_prefix(&format!("assets/{}/{}-", dir, stem)) else {
        return false;
    };
    let Some(hash) = rest.strip_suffix(&format!(".{}", ext)) else {
        return false;
    };
    hash.len() == 8
        && hash
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[tokio::test]
async fn test_tools_app_build_layout() {
    let fixture = Fixture::tools_app(CONFIG);
    let result = fixture.build(&CliOverrides::default()).await.unwrap();

    let index_js = result.chunk_asset("index", MediaCategory::Script).unwrap();
    let vendor_js = result.chunk_asset("vue-vendor", MediaCategory::Script).unwrap();
    let index_css = result.chunk_asset("index", MediaCategory::Style).unwrap();

    assert!(is_hashed(&index_js.file_name, "js", "index", "js"), "{}", index_js.file_name);
    assert!(is_hashed(&vendor_js.file_name, "js", "vue-vendor", "js"), "{}", vendor_js.file_name);
    assert!(is_hashed(&index_css.file_name, "css", "index", "css"), "{}", index_css.file_name);

    let logo = result
        .assets
        .iter()
        .find(|a| matches!(&a.origin, AssetOrigin::Static(id) if id == "src/assets/logo.svg"))
        .unwrap();
    assert!(is_hashed(&logo.file_name, "svg", "logo", "svg"), "{}", logo.file_name);

    let files = fixture.dist_files();
    for expected in ["index.html", "favicon.ico", "robots.txt", "precache-manifest.json"] {
        assert!(files.contains(&expected.to_string()), "{} missing from {:?}", expected, files);
    }
    // no PWA section, no service worker
    assert!(!files.contains(&"sw.js".to_string()));

    // build-time constant from package.json
    let code = fixture.read_dist(&index_js.file_name);
    assert!(code.contains("2024.5.1"));
    assert!(!code.contains("import.meta.env.PACKAGE_VERSION"));
    // TypeScript is gone
    assert!(!code.contains("interface ToolState"));
    // the page loads the index chunk only; it pulls in the vendor chunk and runs the entry
    let vendor_name = vendor_js.file_name.rsplit('/').next().unwrap();
    assert!(code.contains(&format!("import \"./{}\";", vendor_name)));
    assert!(code.contains("__satchel.require(\"src/main.ts\");"));
    assert!(code.contains("__satchel_require(\"node_modules/vue/dist/vue.runtime.esm-bundler.js\")"));
    let vendor_code = fixture.read_dist(&vendor_js.file_name);
    assert!(vendor_code.contains("__satchel.define(\"node_modules/pinia/index.js\""));

    let css = fixture.read_dist(&index_css.file_name);
    assert!(css.contains("margin:0"));
    assert!(!css.contains("@import"));

    let html = fixture.read_dist("index.html");
    assert!(html.contains(&format!("src=\"/{}\"", index_js.file_name)));
    assert!(html.contains(&format!("rel=\"modulepreload\" crossorigin href=\"/{}\"", vendor_js.file_name)));
    assert!(html.contains(&format!("href=\"/{}\"", index_css.file_name)));
    assert!(!html.contains("/src/main.ts"));
}

#[tokio::test]
async fn test_vendor_group_membership() {
    let fixture = Fixture::tools_app(CONFIG);
    let result = fixture.build(&CliOverrides::default()).await.unwrap();

    let chunk = |name: &str| result.chunks.iter().find(|c| c.name == name).unwrap();

    assert_eq!(result.chunks[0].name, "vue-vendor");
    assert_eq!(
        chunk("vue-vendor").modules,
        vec![
            "node_modules/pinia/index.js",
            "node_modules/vue/dist/vue.runtime.esm-bundler.js",
        ]
    );
    assert!(chunk("index").modules.contains(&"src/tools/my-tool.ts".to_string()));
    assert!(chunk("index").modules.contains(&"src/main.ts".to_string()));

    // vue-router is listed but never imported
    assert!(result
        .warnings
        .iter()
        .any(|w| w.contains("vue-router") && w.contains("no module")));
}

#[tokio::test]
async fn test_console_calls_leave_no_trace() {
    let fixture = Fixture::tools_app(CONFIG);
    let result = fixture.build(&CliOverrides::default()).await.unwrap();

    for asset in result.assets.iter().filter(|a| a.category == MediaCategory::Script) {
        let code = String::from_utf8_lossy(&asset.bytes);
        assert!(!code.contains("console"), "{} still logs", asset.file_name);
        assert!(!code.contains("creating store"));
    }
}

#[tokio::test]
async fn test_keep_console_flag() {
    let fixture = Fixture::tools_app(CONFIG);
    let cli = CliOverrides {
        minify: Some(false),
        drop_console: Some(false),
        ..Default::default()
    };
    fixture.write(
        "satchel.config.json",
        r#"{ "build": { "pureFuncs": [], "manualChunks": [{ "name": "vue-vendor", "packages": ["vue", "pinia"] }] } }"#,
    );
    let result = fixture.build(&cli).await.unwrap();

    let index = result.chunk_asset("index", MediaCategory::Script).unwrap();
    let code = String::from_utf8_lossy(&index.bytes);
    assert!(code.contains("console.log("));
    assert!(code.contains("creating store"));
    // module markers of unminified output
    assert!(code.contains("// src/tools/my-tool.ts"));
}

#[tokio::test]
async fn test_rebuild_keeps_filenames_until_content_changes() {
    let fixture = Fixture::tools_app(CONFIG);
    let first = fixture.build(&CliOverrides::default()).await.unwrap();
    let second = fixture.build(&CliOverrides::default()).await.unwrap();

    let names = |result: &satchel::core::models::BuildResult| {
        let mut names: Vec<String> = result.assets.iter().map(|a| a.file_name.clone()).collect();
        names.sort();
        names
    };
    assert_eq!(names(&first), names(&second));

    fixture.write(
        "src/tools/my-tool.ts",
        "import { defineStore } from 'pinia';\nexport const useTool = defineStore('my-tool-2', () => ({ count: 1 }));\n",
    );
    let third = fixture.build(&CliOverrides::default()).await.unwrap();

    let script = |result: &satchel::core::models::BuildResult, chunk: &str| {
        result
            .chunk_asset(chunk, MediaCategory::Script)
            .unwrap()
            .file_name
            .clone()
    };
    assert_ne!(script(&first, "index"), script(&third, "index"));
    assert_eq!(script(&first, "vue-vendor"), script(&third, "vue-vendor"));
    assert_eq!(
        first.chunk_asset("index", MediaCategory::Style).unwrap().file_name,
        third.chunk_asset("index", MediaCategory::Style).unwrap().file_name
    );

    // the old index script is gone from the published output
    assert!(!fixture.dist().join(script(&first, "index")).exists());
}

#[tokio::test]
async fn test_failed_build_keeps_previous_output() {
    let fixture = Fixture::tools_app(CONFIG);
    fixture.build(&CliOverrides::default()).await.unwrap();
    let before = fixture.dist_files();
    let html_before = fixture.read_dist("index.html");

    fixture.write("src/tools/my-tool.ts", "export const useTool = ;\n");
    let err = fixture.build(&CliOverrides::default()).await.unwrap_err();
    assert!(matches!(err, SatchelError::Transform { .. }), "{:?}", err);

    assert_eq!(fixture.dist_files(), before);
    assert_eq!(fixture.read_dist("index.html"), html_before);

    let leftovers: Vec<_> = std::fs::read_dir(fixture.root())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with(".dist-"))
        .collect();
    assert!(leftovers.is_empty());
}

#[tokio::test]
async fn test_sourcemaps_for_unminified_build() {
    let fixture = Fixture::tools_app(CONFIG);
    let cli = CliOverrides {
        minify: Some(false),
        sourcemap: Some(true),
        ..Default::default()
    };
    let result = fixture.build(&cli).await.unwrap();

    let index = result.chunk_asset("index", MediaCategory::Script).unwrap();
    let map_name = format!("{}.map", index.file_name);
    assert!(result.asset(&map_name).is_some());

    let code = fixture.read_dist(&index.file_name);
    assert!(code.trim_end().ends_with(&format!(
        "//# sourceMappingURL={}",
        map_name.rsplit('/').next().unwrap()
    )));

    let map: serde_json::Value = serde_json::from_str(&fixture.read_dist(&map_name)).unwrap();
    assert_eq!(map["version"], 3);
    assert!(map["sources"]
        .as_array()
        .unwrap()
        .iter()
        .any(|s| s == "../../src/main.ts"));
}

#[tokio::test]
async fn test_invalid_chunk_rules_fail_before_output() {
    let fixture = Fixture::tools_app(
        r#"{ "build": { "manualChunks": [
            { "name": "vendor", "packages": ["vue"] },
            { "name": "vendor", "packages": ["pinia"] }
        ] } }"#,
    );

    let err = fixture.build(&CliOverrides::default()).await.unwrap_err();
    assert!(matches!(err, SatchelError::Config(_)));
    assert!(!fixture.dist().exists());
}
