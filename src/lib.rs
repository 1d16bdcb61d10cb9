//! Tally in-browser WASM server.
//!
//! Exports `handle_request(method, path, query, body)` for the Web Worker
//! bridge to call. Uses `matchit` for URL routing — the same router
//! engine that powers Axum.
//!
//! `localStorage` only exists on the main thread, so persistence is a
//! round trip: the page reads the stored collection and hands it to
//! `init_tally(config_json, stored)`, and after each request it drains
//! `GET /api/tally/persist` and applies the returned ops to localStorage.

use log::warn;
use wasm_bindgen::prelude::*;

pub mod logging;
pub mod routes;
pub mod tally;

use tally::config::TallyConfig;
use tally::session::{self, Session};
use tally::storage::MirroredStorage;

#[wasm_bindgen(start)]
pub fn wasm_start() {
    console_error_panic_hook::set_once();
    logging::init();
}

/// Start (or restart) the tally session.
///
/// # Arguments
/// * `config_json` — e.g. `{"kind":"counter","undo_window_ms":5000}`. Empty for defaults.
/// * `stored`      — the page's `localStorage.getItem(key)` for the configured key
///   (`"players"` / `"counters"` unless overridden). Empty when nothing is stored.
///
/// # Returns
/// `"ok"`, or `"error: ..."` when the config was rejected and defaults were used instead.
#[wasm_bindgen]
pub fn init_tally(config_json: &str, stored: &str) -> String {
    let (config, status) = match TallyConfig::from_json(config_json) {
        Ok(config) => (config, "ok".to_string()),
        Err(e) => {
            warn!("{}; falling back to defaults", e);
            (TallyConfig::default(), format!("error: {}", e))
        }
    };
    let stored = Some(stored).filter(|s| !s.is_empty());
    let storage = MirroredStorage::seeded(config.storage_key(), stored);
    session::install(Session::new(config, Box::new(storage)));
    status
}

/// Process an HTTP-like request and return an HTML fragment.
///
/// Called from JavaScript (Web Worker) via wasm-bindgen.
///
/// # Arguments
/// * `method` — HTTP method (e.g., "GET", "POST")
/// * `path`   — URL path (e.g., "/api/tally/list")
/// * `query`  — Query string. No tally route reads it; kept for the bridge signature.
/// * `body`   — Request body (e.g., POST form data). Empty string for GET requests.
///
/// # Returns
/// An HTML string fragment suitable for HTMX to swap into the DOM.
#[wasm_bindgen]
pub fn handle_request(method: &str, path: &str, _query: &str, body: &str) -> String {
    let mut router = matchit::Router::new();

    router.insert("/api/tally/list", "list").ok();
    router.insert("/api/tally/form", "form").ok();
    router.insert("/api/tally/export", "export").ok();
    router.insert("/api/tally/persist", "persist").ok();
    router.insert("/api/tally/add", "add").ok();
    router.insert("/api/tally/count", "count").ok();
    router.insert("/api/tally/remove", "remove").ok();
    router.insert("/api/tally/reset_all", "reset_all").ok();
    router.insert("/api/tally/clear_all", "clear_all").ok();
    router.insert("/api/tally/undo", "undo").ok();
    router.insert("/api/tally/undo/expire", "undo_expire").ok();

    let route = match router.at(path) {
        Ok(matched) => *matched.value,
        Err(_) => return not_found(),
    };

    use routes::tally as t;
    session::with_session(|s| match (route, method) {
        ("list", "GET") => t::handle_list_get(s),
        ("form", "GET") => t::handle_form_get(s),
        ("export", "GET") => t::handle_export_get(s),
        ("persist", "GET") => t::handle_persist_get(s),

        ("add", "POST") => t::handle_add_post(s, body),
        ("count", "POST") => t::handle_count_post(s, body),
        ("remove", "POST") => t::handle_remove_post(s, body),
        ("reset_all", "POST") => t::handle_reset_all_post(s, body),
        ("clear_all", "POST") => t::handle_clear_all_post(s, body),
        ("undo", "POST") => t::handle_undo_post(s, body),
        ("undo_expire", "POST") => t::handle_undo_expire_post(s, body),

        _ => method_not_allowed(),
    })
}

fn not_found() -> String {
    r#"<span class="text-red-600">404 — route not found</span>"#.to_string()
}

fn method_not_allowed() -> String {
    r#"<span class="text-red-600">405 — method not allowed</span>"#.to_string()
}
