use crate::model::{HistoryNode, Section, Status, StatusMap};
use anyhow::Context;
use serde_json::{Map, Value};
use std::path::Path;

/// Edit count assigned to migrated bare maps; far past any edit limit.
pub const LEGACY_MOD_COUNT: u32 = 999;

/// Normalizes one stored history entry to the current node shape.
///
/// Current entries are `{data, modCount, timestamp}`. Older stores kept the
/// bare `{studentId: status}` map with no wrapper; those become nodes that can
/// never be edited (`modCount` exhausted, no save instant).
pub fn migrate_history_entry(raw: Value) -> HistoryNode {
    let Value::Object(obj) = raw else {
        return legacy_node(StatusMap::new());
    };
    match (obj.get("data"), obj.contains_key("modCount")) {
        (Some(Value::Object(data)), true) => HistoryNode {
            data: status_map(data),
            mod_count: obj
                .get("modCount")
                .and_then(|v| v.as_u64())
                .map(|n| u32::try_from(n).unwrap_or(u32::MAX))
                .unwrap_or(LEGACY_MOD_COUNT),
            timestamp: obj.get("timestamp").and_then(epoch_millis).unwrap_or(0),
        },
        _ => legacy_node(status_map(&obj)),
    }
}

/// Reads an epoch-milliseconds number. JavaScript wrote these as doubles, so
/// fractional values are truncated; values outside the `i64` range are unusable.
pub fn epoch_millis(v: &Value) -> Option<i64> {
    if let Some(n) = v.as_i64() {
        return Some(n);
    }
    let f = v.as_f64()?;
    if f.is_finite() && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Some(f.trunc() as i64)
    } else {
        None
    }
}

fn legacy_node(data: StatusMap) -> HistoryNode {
    HistoryNode {
        data,
        mod_count: LEGACY_MOD_COUNT,
        timestamp: 0,
    }
}

/// Entries cleared during an edit were stored as `null`; they and anything
/// unrecognized are dropped.
fn status_map(obj: &Map<String, Value>) -> StatusMap {
    obj.iter()
        .filter_map(|(id, v)| v.as_str().and_then(Status::parse).map(|s| (id.clone(), s)))
        .collect()
}

/// Parses a stored section document (a JSON array of sections).
pub fn parse_sections_json(text: &str) -> anyhow::Result<Vec<Section>> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(text).context("section store is not a valid section array")
}

/// Reads a browser localStorage dump of the section store.
pub fn parse_legacy_export(path: &Path) -> anyhow::Result<Vec<Section>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.to_string_lossy()))?;
    parse_sections_json(&text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{EditPolicy, EditWindow};
    use serde_json::json;

    #[test]
    fn wrapped_entry_keeps_counters() {
        let node = migrate_history_entry(json!({
            "data": { "s1": "present", "s2": "absent", "s3": null },
            "modCount": 1,
            "timestamp": 1_760_000_000_000_i64
        }));
        assert_eq!(node.mod_count, 1);
        assert_eq!(node.timestamp, 1_760_000_000_000);
        assert_eq!(node.data.len(), 2);
        assert_eq!(node.data.get("s1"), Some(&Status::Present));
    }

    #[test]
    fn bare_map_is_never_editable() {
        let node = migrate_history_entry(json!({ "s1": "present", "s2": "absent" }));
        assert_eq!(node.data.len(), 2);
        assert_eq!(node.mod_count, LEGACY_MOD_COUNT);
        assert_eq!(node.timestamp, 0);

        let verdict = EditPolicy::default().evaluate(&node, 0);
        assert_eq!(verdict, EditWindow::Untimed);
        assert!(!EditPolicy::default().evaluate(&node, i64::MAX).is_open());
    }

    #[test]
    fn bare_map_with_a_data_key_is_still_legacy() {
        // `data` alone, without `modCount`, is not a wrapper.
        let node = migrate_history_entry(json!({ "data": { "s1": "present" } }));
        assert_eq!(node.mod_count, LEGACY_MOD_COUNT);
        assert!(node.data.is_empty());
    }

    #[test]
    fn non_numeric_mod_count_is_treated_as_exhausted() {
        let node = migrate_history_entry(json!({
            "data": {},
            "modCount": null,
            "timestamp": 5
        }));
        assert_eq!(node.mod_count, LEGACY_MOD_COUNT);
    }

    #[test]
    fn browser_dump_parses_with_mixed_history_shapes() {
        let text = r#"[
          {
            "id": "k1", "name": "8D", "subject": "Math",
            "students": [
              { "id": "s1", "name": "Ann", "status": "present" },
              { "id": "s2", "name": "Bob", "status": null }
            ],
            "history": {
              "Sep 3, 9:00 AM": { "s1": "present", "s2": "absent" },
              "Sep 4, 9:01 AM": { "data": { "s1": "absent" }, "modCount": 0, "timestamp": 1757000000000 }
            },
            "isLocked": false,
            "lastSavedDate": "Sep 4, 9:01 AM",
            "createdAt": 1756000000000
          }
        ]"#;
        let sections = parse_sections_json(text).expect("parse dump");
        assert_eq!(sections.len(), 1);
        let sec = &sections[0];
        assert_eq!(sec.students[0].status, Some(Status::Present));
        let keys: Vec<&str> = sec.history.keys().collect();
        assert_eq!(keys, vec!["Sep 3, 9:00 AM", "Sep 4, 9:01 AM"]);
        assert_eq!(
            sec.history.get("Sep 3, 9:00 AM").map(|n| n.mod_count),
            Some(LEGACY_MOD_COUNT)
        );
        assert_eq!(sec.history.get("Sep 4, 9:01 AM").map(|n| n.mod_count), Some(0));
    }

    #[test]
    fn unusable_timestamps_leave_the_node_untimed() {
        let now = 1_760_000_000_000_i64;
        for ts in [json!(1e300), json!(-1e300), json!("1760000000000"), json!(null)] {
            let node = migrate_history_entry(json!({
                "data": { "s1": "present" },
                "modCount": 0,
                "timestamp": ts
            }));
            assert_eq!(node.timestamp, 0, "{ts}");
            assert_eq!(
                EditPolicy::default().evaluate(&node, now),
                EditWindow::Untimed
            );
        }

        let node = migrate_history_entry(json!({
            "data": {},
            "modCount": 1,
            "timestamp": 1_759_999_999_999.7
        }));
        assert_eq!(node.timestamp, 1_759_999_999_999);
    }

    #[test]
    fn fractional_created_at_does_not_reject_the_document() {
        let text = r#"[{"id":"k1","name":"8D","history":{"Sep 3, 9:00 AM":{"s1":"present"}},"createdAt":1.5},
                       {"id":"k2","name":"8E","createdAt":"yesterday"}]"#;
        let sections = parse_sections_json(text).expect("parse");
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].created_at, 1);
        assert_eq!(sections[0].history.len(), 1);
        assert_eq!(sections[1].created_at, 0);
    }

    #[test]
    fn empty_document_is_an_empty_store() {
        assert!(parse_sections_json("  ").expect("empty").is_empty());
        assert!(parse_sections_json("[]").expect("array").is_empty());
        assert!(parse_sections_json("{").is_err());
    }
}
