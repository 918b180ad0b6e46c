mod backup;
mod clock;
mod config;
mod db;
mod engine;
mod export;
mod ipc;
mod legacy;
mod model;
mod policy;

use std::io::{self, BufRead, Write};

fn init_logging(level: &str) {
    // stdout carries responses; logs go to stderr only.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .target(env_logger::Target::Stderr)
        .init();
}

fn main() {
    let settings = config::load_settings();
    init_logging(&settings.log_level);

    let mut state = ipc::AppState::new(engine::Engine::default());
    if let Some(workspace) = settings.workspace.as_ref() {
        match ipc::open_workspace(&mut state, workspace) {
            Ok(Some(warning)) => log::warn!("workspace opened with warning: {warning}"),
            Ok(None) => {}
            Err(e) => log::error!(
                "failed to open configured workspace {}: {e:#}",
                workspace.to_string_lossy()
            ),
        }
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // Can't reply without id.
                log::warn!("unparseable request: {e}");
                let resp = serde_json::json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() }
                });
                let _ = writeln!(stdout, "{}", resp);
                let _ = stdout.flush();
                continue;
            }
        };

        log::debug!("request {} {}", req.id, req.method);
        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
}
