use crate::export;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::get_optional_str;
use crate::ipc::types::{AppState, Request};
use crate::model::Section;
use serde_json::json;
use std::path::PathBuf;

/// `sectionId` when given, otherwise the open section.
fn target_section<'a>(state: &'a AppState, req: &Request) -> Result<&'a Section, serde_json::Value> {
    let section = match get_optional_str(&req.params, "sectionId") {
        Some(id) => state.engine.section(&id),
        None => state.engine.current_section(),
    };
    section.ok_or_else(|| err(&req.id, "not_found", "section not found", None))
}

fn handle_export_section_report(state: &mut AppState, req: &Request) -> serde_json::Value {
    let section = match target_section(state, req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let report = export::attendance_report(section);
    ok(
        &req.id,
        json!({
            "report": report,
            "grid": report.to_grid(),
        }),
    )
}

fn handle_export_section_csv(state: &mut AppState, req: &Request) -> serde_json::Value {
    let section = match target_section(state, req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let out_path = match get_optional_str(&req.params, "outPath") {
        Some(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
        _ => match state.workspace.as_ref() {
            Some(ws) => ws.join(export::default_file_name(section)),
            None => return err(&req.id, "bad_params", "missing outPath", None),
        },
    };

    let report = export::attendance_report(section);
    if let Err(e) = export::write_csv(&report, &out_path) {
        return err(
            &req.id,
            "export_failed",
            format!("{e:#}"),
            Some(json!({ "path": out_path.to_string_lossy() })),
        );
    }
    ok(
        &req.id,
        json!({
            "path": out_path.to_string_lossy(),
            "rowCount": report.rows.len(),
            "sessionCount": report.columns.len(),
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "export.sectionReport" => Some(handle_export_section_report(state, req)),
        "export.sectionCsv" => Some(handle_export_section_csv(state, req)),
        _ => None,
    }
}
