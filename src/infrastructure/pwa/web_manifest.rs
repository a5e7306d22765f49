use crate::core::models::{ManifestIcon, WebAppManifest};
use crate::utils::{Result, SatchelError};

pub const MANIFEST_FILE_NAME: &str = "manifest.webmanifest";

const DISPLAY_MODES: &[&str] = &["fullscreen", "standalone", "minimal-ui", "browser"];

const ORIENTATIONS: &[&str] = &[
    "any",
    "natural",
    "landscape",
    "landscape-primary",
    "landscape-secondary",
    "portrait",
    "portrait-primary",
    "portrait-secondary",
];

/// Check the installable-app descriptor. Every failure names the field.
pub fn validate_manifest(manifest: &WebAppManifest) -> Result<()> {
    for (field, value) in [
        ("name", &manifest.name),
        ("short_name", &manifest.short_name),
        ("start_url", &manifest.start_url),
    ] {
        if value.trim().is_empty() {
            return Err(SatchelError::manifest(format!("pwa.manifest.{} is required", field)));
        }
    }

    if !DISPLAY_MODES.contains(&manifest.display.as_str()) {
        return Err(SatchelError::manifest(format!(
            "pwa.manifest.display must be one of {}, got \"{}\"",
            DISPLAY_MODES.join(", "),
            manifest.display
        )));
    }

    if !ORIENTATIONS.contains(&manifest.orientation.as_str()) {
        return Err(SatchelError::manifest(format!(
            "pwa.manifest.orientation \"{}\" is not a valid orientation",
            manifest.orientation
        )));
    }

    for (field, color) in [
        ("theme_color", &manifest.theme_color),
        ("background_color", &manifest.background_color),
    ] {
        if !is_hex_color(color) {
            return Err(SatchelError::manifest(format!(
                "pwa.manifest.{} must be #rgb or #rrggbb, got \"{}\"",
                field, color
            )));
        }
    }

    for (index, icon) in manifest.icons.iter().enumerate() {
        if icon.src.trim().is_empty() {
            return Err(SatchelError::manifest(format!("pwa.manifest.icons[{}].src is required", index)));
        }
        if icon.mime_type.trim().is_empty() {
            return Err(SatchelError::manifest(format!("pwa.manifest.icons[{}].type is required", index)));
        }
        if parse_sizes(&icon.sizes).is_none() {
            return Err(SatchelError::manifest(format!(
                "pwa.manifest.icons[{}].sizes \"{}\" is not a list of WxH sizes",
                index, icon.sizes
            )));
        }
    }

    if !manifest.icons.iter().any(is_maskable_512) {
        return Err(SatchelError::manifest(
            "pwa.manifest.icons needs a 512x512 icon with purpose \"any maskable\"",
        ));
    }

    Ok(())
}

fn is_hex_color(value: &str) -> bool {
    match value.strip_prefix('#') {
        Some(hex) => (hex.len() == 3 || hex.len() == 6) && hex.chars().all(|c| c.is_ascii_hexdigit()),
        None => false,
    }
}

/// `"16x16 32x32"` -> [(16, 16), (32, 32)]; `"any"` is accepted for vector icons
pub fn parse_sizes(sizes: &str) -> Option<Vec<(u32, u32)>> {
    if sizes.trim() == "any" {
        return Some(Vec::new());
    }

    let parsed: Option<Vec<(u32, u32)>> = sizes
        .split_whitespace()
        .map(|size| {
            let (w, h) = size.to_ascii_lowercase().split_once('x').map(|(w, h)| (w.to_string(), h.to_string()))?;
            Some((w.parse().ok()?, h.parse().ok()?))
        })
        .collect();

    parsed.filter(|sizes| !sizes.is_empty())
}

fn is_maskable_512(icon: &ManifestIcon) -> bool {
    let has_512 = parse_sizes(&icon.sizes)
        .map(|sizes| sizes.contains(&(512, 512)))
        .unwrap_or(false);

    let purposes: Vec<&str> = icon
        .purpose
        .as_deref()
        .unwrap_or("any")
        .split_whitespace()
        .collect();

    has_512 && purposes.contains(&"any") && purposes.contains(&"maskable")
}

/// Append attribution query parameters to a start URL, keeping existing ones
pub fn with_attribution(start_url: &str, attribution: &[(String, String)]) -> String {
    let mut url = start_url.to_string();

    for (key, value) in attribution {
        let pair = format!("{}={}", key, value);
        let already = url
            .split_once('?')
            .map(|(_, query)| query.split('&').any(|p| p.split('=').next() == Some(key.as_str())))
            .unwrap_or(false);
        if already {
            continue;
        }

        url.push(if url.contains('?') { '&' } else { '?' });
        url.push_str(&pair);
    }

    url
}

/// Serialized `manifest.webmanifest`
pub fn render_manifest(manifest: &WebAppManifest, attribution: &[(String, String)]) -> Result<Vec<u8>> {
    let mut manifest = manifest.clone();
    manifest.start_url = with_attribution(&manifest.start_url, attribution);
    Ok(serde_json::to_vec_pretty(&manifest)?)
}
