use crate::backup;
use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::handlers::core::open_workspace;
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;

fn handle_backup_export_workspace(state: &mut AppState, req: &Request) -> serde_json::Value {
    let out_path = match req.params.get("outPath").and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => return err(&req.id, "bad_params", "missing outPath", None),
    };
    let Some(workspace_path) = state.workspace.clone() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    // The bundle copies the database file, so make sure it holds the in-memory store.
    let mut flush_warning = None;
    if let Some(conn) = state.db.as_ref() {
        if let Err(e) = db::save_sections(conn, state.engine.sections()) {
            log::warn!("backup taken without flushing the store: {e:#}");
            flush_warning = Some(format!("{e:#}"));
        }
    }

    let out = PathBuf::from(&out_path);
    let export = match backup::export_workspace_bundle(&workspace_path, &out) {
        Ok(v) => v,
        Err(e) => {
            return err(
                &req.id,
                "io_failed",
                format!("{e:#}"),
                Some(json!({ "path": out_path })),
            )
        }
    };
    log::info!("workspace backup written to {out_path}");

    let mut result = json!({
        "path": out_path,
        "bundleFormat": export.bundle_format,
        "entryCount": export.entry_count,
        "dbSha256": export.db_sha256,
    });
    // The bundle may predate the latest in-memory changes.
    if let Some(w) = flush_warning {
        result["persistWarning"] = json!(w);
    }
    ok(&req.id, result)
}

fn handle_backup_import_workspace(state: &mut AppState, req: &Request) -> serde_json::Value {
    let in_path = match req.params.get("inPath").and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => return err(&req.id, "bad_params", "missing inPath", None),
    };
    let Some(workspace_path) = state.workspace.clone() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let src = PathBuf::from(&in_path);
    if !src.is_file() {
        return err(
            &req.id,
            "not_found",
            "bundle file not found",
            Some(json!({ "path": in_path })),
        );
    }

    // Drop open handle before replacing file.
    state.db = None;

    let import = match backup::import_workspace_bundle(&src, &workspace_path) {
        Ok(v) => v,
        Err(e) => {
            // The bundle is verified before the database is touched; reattach it.
            state.db = db::open_db(&workspace_path).ok();
            return err(
                &req.id,
                "io_failed",
                format!("{e:#}"),
                Some(json!({ "path": src.to_string_lossy() })),
            );
        }
    };

    match open_workspace(state, &workspace_path) {
        Ok(warning) => {
            let mut result = json!({
                "workspacePath": workspace_path.to_string_lossy(),
                "bundleFormatDetected": import.bundle_format_detected,
                "sectionCount": state.engine.sections().len(),
            });
            if let Some(w) = warning {
                result["loadWarning"] = json!(w);
            }
            ok(&req.id, result)
        }
        Err(e) => err(&req.id, "db_open_failed", format!("{e:#}"), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "backup.exportWorkspace" => Some(handle_backup_export_workspace(state, req)),
        "backup.importWorkspace" => Some(handle_backup_import_workspace(state, req)),
        _ => None,
    }
}
