use crate::fixture::{Fixture, PWA_CONFIG};
use satchel::core::models::{CacheManifest, CacheStrategy, MediaCategory};
use satchel::utils::{CliOverrides, SatchelError};

#[tokio::test]
async fn test_pwa_files_are_emitted() {
    let fixture = Fixture::tools_app(PWA_CONFIG);
    let result = fixture.build(&CliOverrides::default()).await.unwrap();

    let files = fixture.dist_files();
    for expected in ["sw.js", "registerSW.js", "manifest.webmanifest", "precache-manifest.json"] {
        assert!(files.contains(&expected.to_string()), "{} missing from {:?}", expected, files);
    }

    let manifest: serde_json::Value =
        serde_json::from_str(&fixture.read_dist("manifest.webmanifest")).unwrap();
    assert_eq!(manifest["name"], "ToolsApp Lab");
    assert_eq!(manifest["start_url"], "/?utm_source=pwa&utm_medium=pwa");
    assert_eq!(manifest["theme_color"], "#0B0E14");
    assert_eq!(manifest["icons"][1]["purpose"], "any maskable");

    let html = fixture.read_dist("index.html");
    assert!(html.contains(r#"<link rel="manifest" href="/manifest.webmanifest">"#));
    assert!(html.contains(r#"src="/registerSW.js""#));

    // every icon exists
    assert!(!result.warnings.iter().any(|w| w.contains("manifest icon")));
}

#[tokio::test]
async fn test_precache_manifest_contents() {
    let fixture = Fixture::tools_app(PWA_CONFIG);
    let result = fixture.build(&CliOverrides::default()).await.unwrap();

    let written: CacheManifest =
        serde_json::from_str(&fixture.read_dist("precache-manifest.json")).unwrap();
    assert_eq!(Some(&written), result.cache_manifest.as_ref());

    let urls: Vec<&str> = written.entries.iter().map(|e| e.url.as_str()).collect();
    let mut sorted = urls.clone();
    sorted.sort();
    assert_eq!(urls, sorted);

    let strategy = |url: &str| written.get(url).map(|e| e.strategy);

    for asset in result
        .assets
        .iter()
        .filter(|a| matches!(a.category, MediaCategory::Script | MediaCategory::Style))
    {
        if asset.file_name == "sw.js" {
            continue;
        }
        assert_eq!(
            strategy(&format!("/{}", asset.file_name)),
            Some(CacheStrategy::Precache),
            "{}",
            asset.file_name
        );
    }

    assert_eq!(strategy("/index.html"), Some(CacheStrategy::Precache));
    assert_eq!(strategy("/manifest.webmanifest"), Some(CacheStrategy::Precache));
    assert_eq!(strategy("/favicon.ico"), Some(CacheStrategy::Precache));
    assert_eq!(strategy("/favicon-16x16.png"), Some(CacheStrategy::Precache));
    assert_eq!(strategy("/android-chrome-512x512.png"), Some(CacheStrategy::Precache));
    assert_eq!(strategy("/robots.txt"), Some(CacheStrategy::Runtime));
    assert_eq!(strategy("/sw.js"), None);
    assert_eq!(strategy("/precache-manifest.json"), None);

    let logo = urls.iter().find(|u| u.starts_with("/assets/svg/logo-")).unwrap();
    assert_eq!(strategy(logo), Some(CacheStrategy::Runtime));

    let sw = fixture.read_dist("sw.js");
    assert!(sw.contains(&written.version));
}

#[tokio::test]
async fn test_manifest_version_tracks_content() {
    let fixture = Fixture::tools_app(PWA_CONFIG);
    let first = fixture.build(&CliOverrides::default()).await.unwrap();
    let again = fixture.build(&CliOverrides::default()).await.unwrap();
    assert_eq!(
        first.cache_manifest.as_ref().unwrap().version,
        again.cache_manifest.as_ref().unwrap().version
    );

    fixture.write("src/reset.css", "* {\n  margin: 0;\n  padding: 0;\n}\n");
    let changed = fixture.build(&CliOverrides::default()).await.unwrap();
    assert_ne!(
        first.cache_manifest.unwrap().version,
        changed.cache_manifest.unwrap().version
    );
}

#[tokio::test]
async fn test_invalid_manifest_is_rejected_before_output() {
    let fixture = Fixture::tools_app(&PWA_CONFIG.replace("\"any maskable\"", "\"any\""));

    let err = fixture.config(&CliOverrides::default()).unwrap_err();
    match err {
        SatchelError::Manifest(message) => assert!(message.contains("512x512"), "{}", message),
        other => panic!("expected manifest error, got {:?}", other),
    }

    assert!(fixture.build(&CliOverrides::default()).await.is_err());
    assert!(!fixture.dist().exists());
}

#[tokio::test]
async fn test_base_path_applies_to_every_url() {
    let fixture = Fixture::tools_app(PWA_CONFIG);
    let cli = CliOverrides {
        base: Some("/it-tools/".to_string()),
        ..Default::default()
    };
    let result = fixture.build(&cli).await.unwrap();
    let manifest = result.cache_manifest.unwrap();

    assert!(manifest.entries.iter().all(|e| e.url.starts_with("/it-tools/")));

    let html = fixture.read_dist("index.html");
    assert!(html.contains("src=\"/it-tools/assets/js/index-"));
    assert!(html.contains("/it-tools/registerSW.js"));
}

#[tokio::test]
async fn test_base_url_env_sets_default_start_url() {
    let fixture = Fixture::tools_app(PWA_CONFIG);
    let result = fixture
        .build_with_env(&CliOverrides::default(), &[("BASE_URL", "/it-tools/")])
        .await
        .unwrap();

    let manifest: serde_json::Value =
        serde_json::from_str(&fixture.read_dist("manifest.webmanifest")).unwrap();
    assert_eq!(manifest["start_url"], "/it-tools/?utm_source=pwa&utm_medium=pwa");
    assert!(result
        .cache_manifest
        .unwrap()
        .entries
        .iter()
        .all(|e| e.url.starts_with("/it-tools/")));
}

#[tokio::test]
async fn test_relative_base_service_worker() {
    let fixture = Fixture::tools_app(PWA_CONFIG);
    let cli = CliOverrides {
        base: Some("./".to_string()),
        ..Default::default()
    };
    let result = fixture.build(&cli).await.unwrap();
    let manifest = result.cache_manifest.unwrap();
    assert!(manifest.entries.iter().all(|e| e.url.starts_with("./")));

    let sw = fixture.read_dist("sw.js");
    let index = manifest.get("./index.html").unwrap();
    assert!(sw.contains(&format!(r#"{{"url":"./index.html","revision":"{}"}}"#, index.revision)));
    assert!(sw.contains("new URL(url, self.registration.scope).pathname"));
    assert!(sw.contains(r#"const NAVIGATION_FALLBACK = toPath("./index.html");"#));
}
