//! `/api/tally/*` routes — card list rendering and the mutations behind
//! each button.
//!
//! Every POST re-renders the whole card list into `#tally-container`.
//! Destructive actions (remove, delete all) and undo also emit an
//! out-of-band swap for `#tally-undo`, the toast that carries the undo
//! button and arms the browser timer. Add failures swap `#tally-error`.

use log::warn;

use crate::routes::util::{escape_html, get_now, get_param, json_string, parse_form_body};
use crate::tally::entity::CountAction;
use crate::tally::session::Session;
use crate::tally::undo::{DestructiveAction, UndoTicket};

// ── GET /api/tally/list ────────────────────────────────────────────

/// Handle GET /api/tally/list
/// Returns the card list plus the global reset/delete controls.
pub fn handle_list_get(session: &Session) -> String {
    render_list(session)
}

// ── GET /api/tally/form ────────────────────────────────────────────

/// Handle GET /api/tally/form
/// Returns the add-entity form, labelled for the configured kind.
pub fn handle_form_get(session: &Session) -> String {
    let label = session.config.kind.label();
    let mut html = String::with_capacity(1024);
    html.push_str(
        r##"<form class="grid grid-cols-1 gap-2 p-3" hx-post="/api/tally/add" hx-target="#tally-container" hx-swap="innerHTML" hx-on::after-request="if(event.detail.successful) this.reset()">"##,
    );
    html.push_str(&format!(
        r#"<label class="block text-xs font-bold mb-1" for="tallyName">{} Name</label>"#,
        label
    ));
    html.push_str(
        r#"<input type="text" id="tallyName" name="name" required maxlength="40" autocomplete="off" class="w-full border rounded px-2 py-1 text-sm">"#,
    );
    html.push_str(r#"<div id="tally-error"></div>"#);
    html.push_str(&format!(
        r#"<button type="submit" class="bg-emerald-600 hover:bg-emerald-700 text-white font-bold py-2 px-4 rounded text-sm">Add {}</button>"#,
        label
    ));
    html.push_str(r#"</form>"#);
    html
}

// ── POST /api/tally/add ────────────────────────────────────────────

/// Handle POST /api/tally/add
/// Body: name={name}
/// Returns the card list, plus an out-of-band error message on rejection.
pub fn handle_add_post(session: &mut Session, body: &str) -> String {
    let params = parse_form_body(body);
    let name = get_param(&params, "name").unwrap_or("").trim();

    let error = if name.is_empty() {
        Some("Name cannot be empty".to_string())
    } else if !session.store.add(name) {
        Some(format!(r#""{}" already exists!"#, escape_html(name)))
    } else {
        None
    };

    let mut html = render_list(session);
    html.push_str(&render_error(error.as_deref()));
    html
}

// ── POST /api/tally/count ──────────────────────────────────────────

/// Handle POST /api/tally/count
/// Body: name={name}&action=increment|decrement|reset
pub fn handle_count_post(session: &mut Session, body: &str) -> String {
    let params = parse_form_body(body);
    let name = get_param(&params, "name").unwrap_or("");
    let action = get_param(&params, "action").and_then(CountAction::parse);

    match action {
        Some(action) => {
            if let Some(current) = session.store.get(name).map(|e| e.count) {
                session.store.set_count(name, action.apply(current));
            }
        }
        None => {
            return r#"<span class="text-red-600">Missing or invalid action parameter</span>"#
                .to_string();
        }
    }

    render_list(session)
}

// ── POST /api/tally/remove ─────────────────────────────────────────

/// Handle POST /api/tally/remove
/// Body: name={name}&now={ms}
pub fn handle_remove_post(session: &mut Session, body: &str) -> String {
    let params = parse_form_body(body);
    let name = get_param(&params, "name").unwrap_or("");
    // Without a page clock the window opens at the epoch, so no real undo can land in it
    let now = get_now(&params).unwrap_or(0.0);

    if session.store.get(name).is_none() {
        // Stale card: nothing to remove, and any pending undo stays put
        return render_list(session);
    }
    let ticket = session.remove_with_undo(name, now);

    let mut html = render_list(session);
    html.push_str(&render_toast(session, ticket));
    html
}

// ── POST /api/tally/reset_all ──────────────────────────────────────

/// Handle POST /api/tally/reset_all
pub fn handle_reset_all_post(session: &mut Session, _body: &str) -> String {
    session.store.reset_all();
    render_list(session)
}

// ── POST /api/tally/clear_all ──────────────────────────────────────

/// Handle POST /api/tally/clear_all
/// Body: now={ms}
pub fn handle_clear_all_post(session: &mut Session, body: &str) -> String {
    let params = parse_form_body(body);
    let ticket = session.clear_all_with_undo(get_now(&params).unwrap_or(0.0));

    let mut html = render_list(session);
    html.push_str(&render_toast(session, ticket));
    html
}

// ── POST /api/tally/undo ───────────────────────────────────────────

/// Handle POST /api/tally/undo
/// Body: now={ms}
/// Restores the collection from the pending snapshot, if still open.
/// Without `now` the window cannot be checked, so the undo is refused.
pub fn handle_undo_post(session: &mut Session, body: &str) -> String {
    let params = parse_form_body(body);
    match get_now(&params) {
        Some(now) => {
            session.undo_last(now);
        }
        None => warn!("undo request without a clock; ignoring"),
    }

    let mut html = render_list(session);
    html.push_str(&render_toast(session, None));
    html
}

// ── POST /api/tally/undo/expire ────────────────────────────────────

/// Handle POST /api/tally/undo/expire
/// Body: token={n}
/// Fired by the toast's delayed trigger. Returns the emptied toast body.
pub fn handle_undo_expire_post(session: &mut Session, body: &str) -> String {
    let params = parse_form_body(body);
    if let Some(token) = get_param(&params, "token").and_then(|s| s.parse::<u64>().ok()) {
        session.undo.expire(token);
    }
    String::new()
}

// ── GET /api/tally/export ──────────────────────────────────────────

/// Handle GET /api/tally/export
/// Returns the collection as the same JSON array that is stored.
pub fn handle_export_get(session: &Session) -> String {
    session
        .store
        .to_json()
        .unwrap_or_else(|_| "[]".to_string())
}

// ── GET /api/tally/persist ─────────────────────────────────────────

/// Handle GET /api/tally/persist
/// Drains pending storage writes as a JSON array of
/// `{"op":"set","key":...,"value":...}` / `{"op":"remove","key":...}`.
/// Called by the page after every request to apply them to localStorage.
pub fn handle_persist_get(session: &mut Session) -> String {
    let ops = session.store.take_storage_ops();
    serde_json::to_string(&ops).unwrap_or_else(|_| "[]".to_string())
}

// ── Rendering ──────────────────────────────────────────────────────

fn render_list(session: &Session) -> String {
    let kind = session.config.kind;
    let entities = session.store.entities();
    let mut html = String::with_capacity(512 + entities.len() * 1024);

    html.push_str(r#"<div id="tally-list" class="grid grid-cols-1 sm:grid-cols-2 md:grid-cols-3 gap-2">"#);
    if entities.is_empty() {
        html.push_str(&format!(
            r#"<p class="text-sm text-slate-500 text-center col-span-full">No {} yet.</p>"#,
            kind.plural_label().to_lowercase()
        ));
    }
    for entity in entities {
        let vals = |action: &str| {
            escape_html(&format!(
                r#"{{"name":{},"action":"{}"}}"#,
                json_string(&entity.name),
                action
            ))
        };
        let name = escape_html(&entity.name);

        html.push_str(&format!(
            r#"<div class="tally-card border rounded-lg p-3 text-center" data-name="{}">"#,
            name
        ));
        html.push_str(&format!(r#"<h4 class="text-lg font-bold">{}</h4>"#, name));
        html.push_str(&format!(
            r#"<div class="tally-count text-3xl font-bold">{}</div>"#,
            entity.count
        ));
        html.push_str(r#"<div class="flex justify-center gap-1 mt-2" role="group">"#);
        for (action, class, symbol, aria) in [
            ("increment", "border-emerald-600 text-emerald-600", "+", "Increment"),
            ("decrement", "border-red-600 text-red-600", "&minus;", "Decrement"),
            ("reset", "border-yellow-600 text-yellow-600", "&#x21BA;", "Reset"),
        ] {
            html.push_str(&format!(
                r##"<button class="border rounded px-3 py-1 {}" hx-post="/api/tally/count" hx-vals="{}" hx-target="#tally-container" hx-swap="innerHTML" aria-label="{} {}">{}</button>"##,
                class,
                vals(action),
                aria,
                name,
                symbol
            ));
        }
        let remove_vals = escape_html(&format!(
            r#"js:{{"name":{},"now":Date.now()}}"#,
            json_string(&entity.name)
        ));
        html.push_str(&format!(
            r##"<button class="border rounded px-3 py-1 border-slate-800 text-slate-800" hx-post="/api/tally/remove" hx-vals="{}" hx-target="#tally-container" hx-swap="innerHTML" aria-label="Remove {}">&#x1F5D1;</button>"##,
            remove_vals, name
        ));
        html.push_str(r#"</div></div>"#);
    }
    html.push_str(r#"</div>"#);

    // Global controls
    html.push_str(r#"<div class="flex justify-center gap-2 mt-3">"#);
    html.push_str(
        r##"<button class="bg-yellow-500 hover:bg-yellow-600 text-white font-bold py-1 px-3 rounded text-sm" hx-post="/api/tally/reset_all" hx-target="#tally-container" hx-swap="innerHTML">Reset All</button>"##,
    );
    html.push_str(
        r##"<button class="bg-red-600 hover:bg-red-700 text-white font-bold py-1 px-3 rounded text-sm" hx-post="/api/tally/clear_all" hx-vals="js:{now: Date.now()}" hx-target="#tally-container" hx-swap="innerHTML">Delete All</button>"##,
    );
    html.push_str(r#"</div>"#);

    html
}

/// Out-of-band undo toast. Empty when there is nothing to undo.
fn render_toast(session: &Session, ticket: Option<UndoTicket>) -> String {
    let mut html = String::from(r#"<div id="tally-undo" hx-swap-oob="innerHTML">"#);

    let pending = session
        .undo
        .pending()
        .zip(ticket)
        .filter(|(p, t)| p.token == t.token);

    if let Some((pending, ticket)) = pending {
        let message = match &pending.action {
            DestructiveAction::Remove { name } => format!("Removed {}", escape_html(name)),
            DestructiveAction::ClearAll => format!(
                "Deleted all {}",
                session.config.kind.plural_label().to_lowercase()
            ),
        };
        html.push_str(&format!(
            r##"<div class="flex items-center gap-3 bg-slate-800 text-white rounded-lg py-2 px-3 text-sm" hx-post="/api/tally/undo/expire" hx-vals='{{"token":"{}"}}' hx-trigger="load delay:{}ms" hx-target="#tally-undo" hx-swap="innerHTML">"##,
            ticket.token, ticket.window_ms
        ));
        html.push_str(&format!(r#"<span>{}</span>"#, message));
        html.push_str(
            r##"<button class="font-bold underline" hx-post="/api/tally/undo" hx-vals="js:{now: Date.now()}" hx-target="#tally-container" hx-swap="innerHTML">Undo</button>"##,
        );
        html.push_str(r#"</div>"#);
    }

    html.push_str(r#"</div>"#);
    html
}

/// Out-of-band add-form error. An empty message hides the error.
fn render_error(message: Option<&str>) -> String {
    match message {
        Some(msg) => format!(
            r#"<div id="tally-error" hx-swap-oob="true"><span class="text-red-600 text-xs">{}</span></div>"#,
            msg
        ),
        None => r#"<div id="tally-error" hx-swap-oob="true"></div>"#.to_string(),
    }
}
