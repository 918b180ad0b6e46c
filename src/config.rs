use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "edutrackd.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Workspace opened at startup, as if `workspace.select` had been sent.
    pub workspace: Option<PathBuf>,
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            workspace: None,
            log_level: "info".into(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    workspace: Option<PathBuf>,
    log_level: Option<String>,
}

pub fn load_settings() -> Settings {
    let mut settings = Settings::default();
    apply_file(&mut settings, Path::new(CONFIG_FILE_NAME));
    apply_env(&mut settings, |key| std::env::var(key).ok());
    settings
}

fn apply_file(settings: &mut Settings, path: &Path) {
    let Ok(raw) = fs::read_to_string(path) else {
        return;
    };
    match toml::from_str::<FileSettings>(&raw) {
        Ok(file_cfg) => {
            if let Some(v) = file_cfg.workspace {
                settings.workspace = Some(v);
            }
            if let Some(v) = file_cfg.log_level {
                settings.log_level = v;
            }
        }
        // Logging is not up yet; stderr is the only place this can go.
        Err(e) => eprintln!("ignoring {}: {}", path.to_string_lossy(), e),
    }
}

fn apply_env(settings: &mut Settings, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("EDUTRACKD_WORKSPACE").filter(|v| !v.trim().is_empty()) {
        settings.workspace = Some(PathBuf::from(v));
    }
    if let Some(v) = var("EDUTRACKD_LOG").filter(|v| !v.trim().is_empty()) {
        settings.log_level = v;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_file_or_env() {
        let mut s = Settings::default();
        apply_file(&mut s, Path::new("/nonexistent/edutrackd.toml"));
        apply_env(&mut s, |_| None);
        assert_eq!(s, Settings::default());
        assert_eq!(s.log_level, "info");
    }

    #[test]
    fn env_overrides_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "workspace = \"/srv/attendance\"\nlog_level = \"debug\"\n")
            .expect("write config");

        let mut s = Settings::default();
        apply_file(&mut s, &path);
        assert_eq!(s.workspace, Some(PathBuf::from("/srv/attendance")));
        assert_eq!(s.log_level, "debug");

        apply_env(&mut s, |key| match key {
            "EDUTRACKD_WORKSPACE" => Some("/tmp/ws".to_string()),
            _ => None,
        });
        assert_eq!(s.workspace, Some(PathBuf::from("/tmp/ws")));
        assert_eq!(s.log_level, "debug");
    }

    #[test]
    fn malformed_file_is_ignored() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "workspace = [").expect("write config");
        let mut s = Settings::default();
        apply_file(&mut s, &path);
        assert_eq!(s, Settings::default());
    }
}
