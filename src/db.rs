use crate::legacy;
use crate::model::Section;
use anyhow::Context;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

pub const DB_FILE_NAME: &str = "edutrack.sqlite3";
/// Key the whole section store lives under; matches the localStorage key of browser dumps.
pub const STORE_KEY: &str = "edutrack_attendance_data";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(db_path)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS kv_store(
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    Ok(conn)
}

pub fn kv_get(conn: &Connection, key: &str) -> anyhow::Result<Option<String>> {
    let v = conn
        .query_row("SELECT value FROM kv_store WHERE key = ?", [key], |r| {
            r.get::<_, String>(0)
        })
        .optional()?;
    Ok(v)
}

pub fn kv_set(conn: &Connection, key: &str, value: &str) -> anyhow::Result<()> {
    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO kv_store(key, value, updated_at)
         VALUES(?, ?, ?)
         ON CONFLICT(key) DO UPDATE SET
           value = excluded.value,
           updated_at = excluded.updated_at",
        (key, value, &now),
    )?;
    Ok(())
}

/// Missing store means a fresh workspace. History entries are normalized
/// on the way in.
pub fn load_sections(conn: &Connection) -> anyhow::Result<Vec<Section>> {
    let Some(text) = kv_get(conn, STORE_KEY).context("failed to read section store")? else {
        return Ok(Vec::new());
    };
    legacy::parse_sections_json(&text)
}

/// Copies the stored document to a side key so a store that no longer parses
/// is not lost to the next save. Returns the side key, if there was anything to copy.
pub fn set_aside_store(conn: &Connection) -> anyhow::Result<Option<String>> {
    let Some(text) = kv_get(conn, STORE_KEY).context("failed to read section store")? else {
        return Ok(None);
    };
    let key = format!(
        "{}.unreadable.{}",
        STORE_KEY,
        chrono::Utc::now().timestamp_millis()
    );
    kv_set(conn, &key, &text).context("failed to copy unreadable section store")?;
    Ok(Some(key))
}

pub fn save_sections(conn: &Connection, sections: &[Section]) -> anyhow::Result<()> {
    let text = serde_json::to_string(sections).context("failed to serialize section store")?;
    kv_set(conn, STORE_KEY, &text).context("failed to write section store")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::legacy::LEGACY_MOD_COUNT;

    #[test]
    fn fresh_workspace_loads_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let conn = open_db(dir.path()).expect("open");
        assert!(load_sections(&conn).expect("load").is_empty());
        assert!(dir.path().join(DB_FILE_NAME).is_file());
    }

    #[test]
    fn store_survives_reopen_and_legacy_entries_stay_exhausted() {
        let dir = tempfile::tempdir().expect("tempdir");
        {
            let conn = open_db(dir.path()).expect("open");
            kv_set(
                &conn,
                STORE_KEY,
                r#"[{"id":"k1","name":"8D","subject":"","students":[],
                    "history":{"Sep 3, 9:00 AM":{"s1":"present"}},
                    "isLocked":true,"createdAt":1}]"#,
            )
            .expect("seed");
            let sections = load_sections(&conn).expect("load");
            save_sections(&conn, &sections).expect("save");
        }

        let conn = open_db(dir.path()).expect("reopen");
        let raw = kv_get(&conn, STORE_KEY).expect("get").expect("stored");
        assert!(raw.contains("\"modCount\":999"), "{raw}");

        let sections = load_sections(&conn).expect("load");
        assert_eq!(sections.len(), 1);
        assert!(sections[0].is_locked);
        let node = sections[0].history.get("Sep 3, 9:00 AM").expect("node");
        assert_eq!(node.mod_count, LEGACY_MOD_COUNT);
        assert_eq!(node.timestamp, 0);
    }

    #[test]
    fn set_aside_keeps_the_raw_document() {
        let dir = tempfile::tempdir().expect("tempdir");
        let conn = open_db(dir.path()).expect("open");
        assert_eq!(set_aside_store(&conn).expect("empty store"), None);

        let raw = r#"[{"id":"k1","name":"8D","isLocked":"yes"}]"#;
        kv_set(&conn, STORE_KEY, raw).expect("seed");
        assert!(load_sections(&conn).is_err());

        let key = set_aside_store(&conn).expect("set aside").expect("key");
        assert!(key.starts_with("edutrack_attendance_data.unreadable."), "{key}");
        save_sections(&conn, &[]).expect("save");
        assert_eq!(kv_get(&conn, &key).expect("get").as_deref(), Some(raw));
    }

    #[test]
    fn save_fails_without_schema() {
        let conn = Connection::open_in_memory().expect("memory db");
        assert!(save_sections(&conn, &[]).is_err());
    }
}
