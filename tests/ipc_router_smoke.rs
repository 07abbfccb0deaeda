use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_attendanced");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn attendanced");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    if value.get("ok").and_then(|v| v.as_bool()) == Some(false) {
        let code = value
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");
        assert_ne!(
            code, "not_implemented",
            "unexpected unknown method for {}",
            method
        );
    }
    value
}

fn student(user_id: &str) -> serde_json::Value {
    json!({ "userId": user_id, "role": "student" })
}

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let workspace = temp_dir("attendanced-router-smoke");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request(&mut stdin, &mut reader, "1", "health", json!({}));
    let _ = request(
        &mut stdin,
        &mut reader,
        "2",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "3",
        "settings.update",
        json!({
            "principal": { "userId": "admin-1", "role": "admin" },
            "referenceLat": 0.0,
            "referenceLon": 0.0,
            "radiusM": 100.0,
            "checkinStart": "00:00:00",
            "checkinEnd": "23:59:59",
            "checkoutStart": "00:00:00",
            "checkoutEnd": "23:59:59"
        }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "4",
        "settings.get",
        json!({ "principal": { "userId": "teacher-1", "role": "teacher" } }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "5",
        "attendance.todayStatus",
        json!({ "principal": student("student-1") }),
    );
    let checked_in = request(
        &mut stdin,
        &mut reader,
        "6",
        "attendance.checkIn",
        json!({
            "principal": student("student-1"),
            "latitude": 0.0,
            "longitude": 0.0,
            "accuracy": 10.0
        }),
    );
    let attendance_id = checked_in
        .get("result")
        .and_then(|v| v.get("attendance"))
        .and_then(|v| v.get("id"))
        .and_then(|v| v.as_str())
        .expect("attendance id")
        .to_string();
    let today = checked_in
        .get("result")
        .and_then(|v| v.get("attendance"))
        .and_then(|v| v.get("date"))
        .and_then(|v| v.as_str())
        .expect("date")
        .to_string();
    let _ = request(
        &mut stdin,
        &mut reader,
        "7",
        "attendance.checkOut",
        json!({
            "principal": student("student-1"),
            "latitude": 0.0,
            "longitude": 0.0,
            "accuracy": 10.0
        }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "8",
        "attendance.listForDate",
        json!({
            "principal": { "userId": "teacher-1", "role": "teacher" },
            "date": today
        }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "9",
        "attendance.validate",
        json!({
            "principal": { "userId": "teacher-1", "role": "teacher" },
            "attendanceId": attendance_id,
            "note": "router smoke note"
        }),
    );

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
