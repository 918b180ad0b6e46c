use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_edutrackd");
    let mut child = Command::new(exe)
        .env_remove("EDUTRACKD_WORKSPACE")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn edutrackd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({ "id": method, "method": method, "params": params });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");
    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value["ok"], json!(true), "{} failed: {}", method, value);
    value["result"].clone()
}

const BROWSER_DUMP: &str = r#"[
  {
    "id": "legacy-1",
    "name": "Grade 8 - Rizal",
    "subject": "Filipino",
    "students": [
      { "id": "s1", "name": "Maria", "status": null },
      { "id": "s2", "name": "Jose", "status": "present" }
    ],
    "history": {
      "Aug 1, 8:00 AM": { "s1": "present", "s2": "absent" },
      "Aug 2, 8:05 AM": { "data": { "s1": "absent", "s2": null }, "modCount": 1, "timestamp": 1000 }
    },
    "isLocked": false
  }
]"#;

#[test]
fn browser_dump_imports_with_bare_maps_frozen() {
    let workspace = tempfile::tempdir().expect("tempdir");
    let src_dir = tempfile::tempdir().expect("tempdir");
    let dump = src_dir.path().join("edutrack_attendance_data.json");
    std::fs::write(&dump, BROWSER_DUMP).expect("write dump");

    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    request_ok(
        &mut stdin,
        &mut reader,
        "workspace.select",
        json!({ "path": workspace.path().to_string_lossy() }),
    );

    let imported = request_ok(
        &mut stdin,
        &mut reader,
        "sections.importLegacy",
        json!({ "path": dump.to_string_lossy() }),
    );
    assert_eq!(imported["found"], json!(1));
    assert_eq!(imported["imported"], json!(1));

    // Same ids again are skipped.
    let again = request_ok(
        &mut stdin,
        &mut reader,
        "sections.importLegacy",
        json!({ "path": dump.to_string_lossy() }),
    );
    assert_eq!(again["imported"], json!(0));

    request_ok(
        &mut stdin,
        &mut reader,
        "sections.switch",
        json!({ "sectionId": "legacy-1" }),
    );
    let history = request_ok(&mut stdin, &mut reader, "history.list", json!({}));
    let sessions = history["sessions"].as_array().expect("sessions");
    assert_eq!(sessions.len(), 2);
    assert_eq!(sessions[0]["sessionKey"], json!("Aug 2, 8:05 AM"));
    assert_eq!(sessions[1]["sessionKey"], json!("Aug 1, 8:00 AM"));
    assert_eq!(sessions[1]["editWindow"], json!({ "state": "untimed" }));
    // Saved decades ago; the window is long gone.
    assert_eq!(sessions[0]["editWindow"], json!({ "state": "expired" }));

    request_ok(
        &mut stdin,
        &mut reader,
        "history.view",
        json!({ "sessionKey": "Aug 1, 8:00 AM" }),
    );
    let enable = request_ok(&mut stdin, &mut reader, "history.enableEdit", json!({}));
    assert_eq!(enable["applied"], json!(false));
    assert_eq!(enable["reason"], json!("edit_window_closed"));

    let report = request_ok(&mut stdin, &mut reader, "export.sectionReport", json!({}));
    assert_eq!(report["report"]["rows"][0]["studentName"], json!("Jose"));
    assert_eq!(report["report"]["rows"][0]["cells"], json!(["A", ""]));
    assert_eq!(report["report"]["rows"][1]["studentName"], json!("Maria"));
    assert_eq!(report["report"]["rows"][1]["cells"], json!(["P", "A"]));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn unreadable_dump_is_an_import_error() {
    let workspace = tempfile::tempdir().expect("tempdir");
    let src_dir = tempfile::tempdir().expect("tempdir");
    let dump = src_dir.path().join("broken.json");
    std::fs::write(&dump, "{\"not\": \"an array\"}").expect("write dump");

    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    request_ok(
        &mut stdin,
        &mut reader,
        "workspace.select",
        json!({ "path": workspace.path().to_string_lossy() }),
    );

    let payload = json!({
        "id": "x",
        "method": "sections.importLegacy",
        "params": { "path": dump.to_string_lossy() }
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush");
    let mut line = String::new();
    reader.read_line(&mut line).expect("read response");
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("json");
    assert_eq!(value["ok"], json!(false));
    assert_eq!(value["error"]["code"], json!("import_failed"));

    let listed = request_ok(&mut stdin, &mut reader, "sections.list", json!({}));
    assert_eq!(listed["sections"], json!([]));

    drop(stdin);
    let _ = child.wait();
}
