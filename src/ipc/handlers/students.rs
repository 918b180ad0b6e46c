use crate::ipc::helpers::{get_required_str, require_workspace, respond};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_students_add(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(e) = require_workspace(state) {
        return e.response(&req.id);
    }
    let name = match get_required_str(&req.params, "name") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let outcome = state
        .engine
        .add_student(&name)
        .map(|id| json!({ "studentId": id }));
    respond(state, req, outcome, true)
}

fn handle_students_remove(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(e) = require_workspace(state) {
        return e.response(&req.id);
    }
    let student_id = match get_required_str(&req.params, "studentId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let outcome = state
        .engine
        .remove_student(&student_id)
        .map(|()| json!({ "studentId": student_id }));
    respond(state, req, outcome, true)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.add" => Some(handle_students_add(state, req)),
        "students.remove" => Some(handle_students_remove(state, req)),
        _ => None,
    }
}
