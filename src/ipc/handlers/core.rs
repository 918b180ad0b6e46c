use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::{Path, PathBuf};

/// Opens (or creates) the workspace database and loads the section store.
///
/// A store that fails to load is copied to a side key, leaves the engine empty
/// and comes back as a warning. A database that cannot be opened, or a store
/// that cannot be set aside, is an error and leaves `state` untouched.
pub fn open_workspace(state: &mut AppState, path: &Path) -> anyhow::Result<Option<String>> {
    let conn = db::open_db(path)?;
    let (sections, warning) = match db::load_sections(&conn) {
        Ok(sections) => (sections, None),
        Err(e) => {
            log::warn!("failed to load section store: {e:#}");
            // Starting empty is only safe once the unreadable text is kept elsewhere.
            let warning = match db::set_aside_store(&conn)? {
                Some(key) => format!("{e:#}; unreadable store kept under {key}"),
                None => format!("{e:#}"),
            };
            (Vec::new(), Some(warning))
        }
    };
    log::info!(
        "workspace opened at {} with {} section(s)",
        path.to_string_lossy(),
        sections.len()
    );
    state.engine.load(sections);
    state.workspace = Some(path.to_path_buf());
    state.db = Some(conn);
    Ok(warning)
}

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string())
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    match open_workspace(state, &path) {
        Ok(warning) => {
            let mut result = json!({
                "workspacePath": path.to_string_lossy(),
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
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        _ => None,
    }
}
