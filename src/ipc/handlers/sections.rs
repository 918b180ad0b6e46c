use crate::ipc::error::{ok, HandlerErr};
use crate::ipc::helpers::{get_optional_str, get_required_str, require_workspace, respond};
use crate::ipc::types::{AppState, Request};
use crate::legacy;
use serde_json::json;
use std::path::PathBuf;

fn handle_sections_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "sections": state.engine.dashboard(),
            "lifecycle": state.engine.lifecycle(),
        }),
    )
}

fn handle_sections_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(e) = require_workspace(state) {
        return e.response(&req.id);
    }
    let name = match get_required_str(&req.params, "name") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let subject = get_optional_str(&req.params, "subject").unwrap_or_default();

    let outcome = state.engine.create_section(&name, &subject).map(|id| {
        log::info!("section created: {id}");
        json!({ "sectionId": id })
    });
    respond(state, req, outcome, true)
}

fn handle_sections_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(e) = require_workspace(state) {
        return e.response(&req.id);
    }
    let section_id = match get_required_str(&req.params, "sectionId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let outcome = state.engine.delete_section(&section_id).map(|()| {
        log::info!("section deleted: {section_id}");
        json!({ "sectionId": section_id })
    });
    respond(state, req, outcome, true)
}

fn handle_sections_switch(state: &mut AppState, req: &Request) -> serde_json::Value {
    let section_id = match get_required_str(&req.params, "sectionId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let outcome = state
        .engine
        .switch_section(&section_id)
        .map(|()| json!({ "sectionId": section_id }));
    respond(state, req, outcome, false)
}

fn handle_sections_close(state: &mut AppState, req: &Request) -> serde_json::Value {
    state.engine.close_section();
    respond(state, req, Ok(json!({})), false)
}

fn handle_sections_import_legacy(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(e) = require_workspace(state) {
        return e.response(&req.id);
    }
    let path = match get_required_str(&req.params, "path") {
        Ok(v) => PathBuf::from(v),
        Err(e) => return e.response(&req.id),
    };
    let incoming = match legacy::parse_legacy_export(&path) {
        Ok(v) => v,
        Err(e) => {
            return HandlerErr::new("import_failed", format!("{e:#}"))
                .with_details(json!({ "path": path.to_string_lossy() }))
                .response(&req.id)
        }
    };
    let found = incoming.len();
    let imported = state.engine.import_sections(incoming);
    log::info!(
        "imported {imported} of {found} section(s) from {}",
        path.to_string_lossy()
    );
    respond(
        state,
        req,
        Ok(json!({ "found": found, "imported": imported })),
        imported > 0,
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "sections.list" => Some(handle_sections_list(state, req)),
        "sections.create" => Some(handle_sections_create(state, req)),
        "sections.delete" => Some(handle_sections_delete(state, req)),
        "sections.switch" => Some(handle_sections_switch(state, req)),
        "sections.close" => Some(handle_sections_close(state, req)),
        "sections.importLegacy" => Some(handle_sections_import_legacy(state, req)),
        _ => None,
    }
}
