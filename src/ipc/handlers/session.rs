use crate::ipc::error::{ok, HandlerErr};
use crate::ipc::helpers::{get_required_str, require_workspace, respond};
use crate::ipc::types::{AppState, Request};
use crate::model::Status;
use serde_json::json;

fn handle_session_view(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "lifecycle": state.engine.lifecycle(),
            "section": state.engine.section_view(),
        }),
    )
}

fn handle_session_set_status(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(e) = require_workspace(state) {
        return e.response(&req.id);
    }
    let student_id = match get_required_str(&req.params, "studentId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let status = match get_required_str(&req.params, "status") {
        Ok(v) => match Status::parse(&v) {
            Some(s) => s,
            None => {
                return HandlerErr::new("bad_params", "status must be present or absent")
                    .response(&req.id)
            }
        },
        Err(e) => return e.response(&req.id),
    };

    match state.engine.set_status(&student_id, status) {
        Ok(change) => {
            // Draft changes are only written when the history edit is saved.
            let live = change.live;
            let mut result = json!(change);
            result["stats"] = json!(state.engine.stats());
            respond(state, req, Ok(result), live)
        }
        Err(rejected) => respond(state, req, Err(rejected), false),
    }
}

fn handle_session_save(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(e) = require_workspace(state) {
        return e.response(&req.id);
    }
    let outcome = state.engine.save_session().map(|saved| {
        log::info!(
            "session saved as {:?} with {} mark(s)",
            saved.session_key,
            saved.recorded
        );
        json!(saved)
    });
    respond(state, req, outcome, true)
}

fn handle_session_unlock(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(e) = require_workspace(state) {
        return e.response(&req.id);
    }
    let outcome = state.engine.unlock().map(|()| json!({}));
    respond(state, req, outcome, true)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "session.view" => Some(handle_session_view(state, req)),
        "session.setStatus" => Some(handle_session_set_status(state, req)),
        "session.save" => Some(handle_session_save(state, req)),
        "session.unlock" => Some(handle_session_unlock(state, req)),
        _ => None,
    }
}
