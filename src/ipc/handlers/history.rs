use crate::ipc::helpers::{get_required_str, require_workspace, respond};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_history_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let outcome = state.engine.history_log().map(|keys| {
        let sessions: Vec<serde_json::Value> = keys
            .iter()
            .filter_map(|key| {
                let window = state.engine.edit_window(key).ok()?;
                Some(json!({
                    "sessionKey": key,
                    "editable": window.is_open(),
                    "editWindow": window,
                }))
            })
            .collect();
        json!({ "sessions": sessions })
    });
    respond(state, req, outcome, false)
}

fn handle_history_view(state: &mut AppState, req: &Request) -> serde_json::Value {
    let session_key = match get_required_str(&req.params, "sessionKey") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let outcome = state
        .engine
        .view_history(&session_key)
        .map(|()| json!({ "section": state.engine.section_view() }));
    respond(state, req, outcome, false)
}

fn handle_history_enable_edit(state: &mut AppState, req: &Request) -> serde_json::Value {
    let outcome = state
        .engine
        .enable_history_edit()
        .map(|edits_left| json!({ "editsLeft": edits_left }));
    respond(state, req, outcome, false)
}

fn handle_history_save_changes(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(e) = require_workspace(state) {
        return e.response(&req.id);
    }
    let outcome = state.engine.save_history_changes().map(|commit| {
        log::info!(
            "history {:?} amended, edit {} ({} left)",
            commit.session_key,
            commit.mod_count,
            commit.edits_left
        );
        json!(commit)
    });
    respond(state, req, outcome, true)
}

fn handle_history_exit(state: &mut AppState, req: &Request) -> serde_json::Value {
    let discarded = state.engine.exit_history();
    respond(
        state,
        req,
        Ok(json!({ "discardedDraft": discarded })),
        false,
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "history.list" => Some(handle_history_list(state, req)),
        "history.view" => Some(handle_history_view(state, req)),
        "history.enableEdit" => Some(handle_history_enable_edit(state, req)),
        "history.saveChanges" => Some(handle_history_save_changes(state, req)),
        "history.exit" => Some(handle_history_exit(state, req)),
        _ => None,
    }
}
