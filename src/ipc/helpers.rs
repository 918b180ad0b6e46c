use crate::db;
use crate::engine::Rejected;
use crate::ipc::error::{no_op, ok, HandlerErr};
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Value};

pub fn get_required_str(params: &Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::new("bad_params", format!("missing {}", key)))
}

pub fn get_optional_str(params: &Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

pub fn require_workspace(state: &AppState) -> Result<(), HandlerErr> {
    if state.db.is_none() {
        return Err(HandlerErr::new("no_workspace", "select a workspace first"));
    }
    Ok(())
}

/// Best-effort write of the whole store. Returns a warning on failure; the
/// in-memory state stays as it is.
pub fn persist(state: &AppState) -> Option<String> {
    let Some(conn) = state.db.as_ref() else {
        return Some("no workspace selected; changes are not saved".to_string());
    };
    match db::save_sections(conn, state.engine.sections()) {
        Ok(()) => None,
        Err(e) => {
            log::warn!("failed to persist section store: {e:#}");
            Some(format!("{e:#}"))
        }
    }
}

/// Response for an intent. Rejections are successful no-op responses.
pub fn respond(
    state: &AppState,
    req: &Request,
    outcome: Result<Value, Rejected>,
    persist_store: bool,
) -> Value {
    match outcome {
        Ok(result) => {
            let mut result = if result.is_object() { result } else { json!({}) };
            result["applied"] = json!(true);
            result["lifecycle"] = json!(state.engine.lifecycle());
            if persist_store {
                if let Some(warning) = persist(state) {
                    result["persistWarning"] = json!(warning);
                }
            }
            ok(&req.id, result)
        }
        Err(rejected) => {
            log::debug!("{} ignored: {}", req.method, rejected);
            no_op(&req.id, &rejected, state.engine.lifecycle())
        }
    }
}
