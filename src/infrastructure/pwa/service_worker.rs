use super::precache::SERVICE_WORKER_FILE_NAME;
use crate::core::config::{BuildConfig, RegisterType};
use crate::core::models::{CacheManifest, CacheStrategy};
use crate::utils::Result;
use serde::Serialize;

#[derive(Serialize)]
struct PrecacheItem<'a> {
    url: &'a str,
    revision: &'a str,
}

/// `sw.js`: precache on install, purge outdated caches on activate,
/// cache-first for runtime entries
pub fn render_service_worker(
    manifest: &CacheManifest,
    config: &BuildConfig,
    register_type: RegisterType,
) -> Result<String> {
    let precache: Vec<PrecacheItem> = manifest
        .precached()
        .map(|e| PrecacheItem {
            url: &e.url,
            revision: &e.revision,
        })
        .collect();
    let runtime: Vec<&str> = manifest
        .entries
        .iter()
        .filter(|e| e.strategy == CacheStrategy::Runtime)
        .map(|e| e.url.as_str())
        .collect();

    let skip_waiting = match register_type {
        RegisterType::AutoUpdate => ".then(() => self.skipWaiting())",
        RegisterType::Prompt => "",
    };

    Ok(format!(
        r#"// Generated by satchel. Do not edit.
const VERSION = {version};
const PRECACHE_PREFIX = 'satchel-precache';
const PRECACHE_NAME = `${{PRECACHE_PREFIX}}-${{VERSION}}`;
const RUNTIME_NAME = 'satchel-runtime';
const PRECACHE = {precache};
// relative and full-URL bases compare as paths under the worker scope
const toPath = (url) => new URL(url, self.registration.scope).pathname;
const PRECACHE_URLS = new Set(PRECACHE.map((entry) => toPath(entry.url)));
const RUNTIME_URLS = new Set({runtime}.map(toPath));
const NAVIGATION_FALLBACK = toPath({fallback});

self.addEventListener('install', (event) => {{
  event.waitUntil(
    caches
      .open(PRECACHE_NAME)
      .then((cache) => cache.addAll(PRECACHE.map((entry) => new Request(toPath(entry.url), {{ cache: 'reload' }}))))
      {skip_waiting}
  );
}});

self.addEventListener('activate', (event) => {{
  event.waitUntil(
    caches
      .keys()
      .then((keys) => Promise.all(
        keys
          .filter((key) => key.startsWith(PRECACHE_PREFIX) && key !== PRECACHE_NAME)
          .map((key) => caches.delete(key))
      ))
      .then(() => self.clients.claim())
  );
}});

self.addEventListener('message', (event) => {{
  if (event.data && event.data.type === 'SKIP_WAITING') {{
    self.skipWaiting();
  }}
}});

self.addEventListener('fetch', (event) => {{
  const request = event.request;
  if (request.method !== 'GET') return;

  const url = new URL(request.url);
  if (url.origin !== self.location.origin) return;

  if (PRECACHE_URLS.has(url.pathname)) {{
    event.respondWith(
      caches.open(PRECACHE_NAME)
        .then((cache) => cache.match(url.pathname))
        .then((cached) => cached || fetch(request))
    );
    return;
  }}

  if (request.mode === 'navigate' && PRECACHE_URLS.has(NAVIGATION_FALLBACK)) {{
    event.respondWith(
      fetch(request).catch(() => caches.open(PRECACHE_NAME).then((cache) => cache.match(NAVIGATION_FALLBACK)))
    );
    return;
  }}

  if (RUNTIME_URLS.has(url.pathname)) {{
    event.respondWith(
      caches.open(RUNTIME_NAME).then((cache) =>
        cache.match(request).then((cached) =>
          cached ||
          fetch(request).then((response) => {{
            if (response.ok) cache.put(request, response.clone());
            return response;
          }})
        )
      )
    );
  }}
}});
"#,
        version = serde_json::to_string(&manifest.version)?,
        precache = serde_json::to_string(&precache)?,
        runtime = serde_json::to_string(&runtime)?,
        fallback = serde_json::to_string(&config.public_url("index.html"))?,
        skip_waiting = skip_waiting,
    ))
}

/// `registerSW.js`: registers the worker under the base path scope
pub fn render_register_script(config: &BuildConfig, register_type: RegisterType) -> Result<String> {
    let sw_url = serde_json::to_string(&config.public_url(SERVICE_WORKER_FILE_NAME))?;
    let scope = serde_json::to_string(&scope_for(&config.base))?;

    let on_waiting = match register_type {
        RegisterType::AutoUpdate => "",
        RegisterType::Prompt => {
            r#"
      registration.addEventListener('updatefound', () => {
        const worker = registration.installing;
        if (!worker) return;
        worker.addEventListener('statechange', () => {
          if (worker.state === 'installed' && navigator.serviceWorker.controller) {
            window.dispatchEvent(new CustomEvent('satchel:need-refresh', {
              detail: { update: () => worker.postMessage({ type: 'SKIP_WAITING' }) }
            }));
          }
        });
      });"#
        }
    };

    Ok(format!(
        r#"if ('serviceWorker' in navigator) {{
  window.addEventListener('load', () => {{
    navigator.serviceWorker.register({sw_url}, {{ scope: {scope} }}).then((registration) => {{{on_waiting}
      registration.update();
    }});
  }});
}}
"#,
        sw_url = sw_url,
        scope = scope,
        on_waiting = on_waiting,
    ))
}

/// Scope of the worker: the base path, or `./` for relative bases
fn scope_for(base: &str) -> String {
    if base.contains("://") || base.starts_with('/') {
        if base.ends_with('/') {
            base.to_string()
        } else {
            format!("{}/", base)
        }
    } else {
        "./".to_string()
    }
}
