use crate::window::TimeWindow;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

/// The singleton school configuration row. Exactly one row (id = 1) exists
/// once an admin has configured the school; validators receive it as a plain
/// value, never as ambient state.
#[derive(Debug, Clone, Copy)]
pub struct SchoolSettings {
    pub reference_lat: f64,
    pub reference_lon: f64,
    /// Allowed radius around the reference point, meters.
    pub radius_m: f64,
    pub checkin: TimeWindow,
    pub checkout: TimeWindow,
}

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("attendance.sqlite3");
    let conn = Connection::open(db_path)?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS school_settings(
            id INTEGER PRIMARY KEY CHECK (id = 1),
            reference_lat REAL NOT NULL,
            reference_lon REAL NOT NULL,
            radius_m REAL NOT NULL,
            checkin_start TEXT NOT NULL,
            checkin_end TEXT NOT NULL,
            checkout_start TEXT NOT NULL,
            checkout_end TEXT NOT NULL
        )",
        [],
    )?;

    // No coordinate columns by design: only derived statuses are stored.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS attendance(
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            date TEXT NOT NULL,
            check_in_time TEXT,
            check_in_status TEXT,
            check_out_time TEXT,
            check_out_status TEXT,
            final_status TEXT,
            teacher_validated INTEGER NOT NULL DEFAULT 0,
            teacher_note TEXT,
            UNIQUE(user_id, date)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attendance_date ON attendance(date)",
        [],
    )?;

    Ok(())
}

pub fn load_settings(conn: &Connection) -> rusqlite::Result<Option<SchoolSettings>> {
    conn.query_row(
        "SELECT reference_lat, reference_lon, radius_m,
                checkin_start, checkin_end, checkout_start, checkout_end
         FROM school_settings WHERE id = 1",
        [],
        |r| {
            let checkin = parse_window_columns(r.get_ref(3)?.as_str()?, r.get_ref(4)?.as_str()?, 3)?;
            let checkout =
                parse_window_columns(r.get_ref(5)?.as_str()?, r.get_ref(6)?.as_str()?, 5)?;
            Ok(SchoolSettings {
                reference_lat: r.get(0)?,
                reference_lon: r.get(1)?,
                radius_m: r.get(2)?,
                checkin,
                checkout,
            })
        },
    )
    .optional()
}

fn parse_window_columns(start: &str, end: &str, col: usize) -> rusqlite::Result<TimeWindow> {
    TimeWindow::parse(start, end).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            col,
            rusqlite::types::Type::Text,
            format!("bad time window: {start:?}..{end:?}").into(),
        )
    })
}

pub fn save_settings(conn: &Connection, settings: &SchoolSettings) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO school_settings(
            id, reference_lat, reference_lon, radius_m,
            checkin_start, checkin_end, checkout_start, checkout_end)
         VALUES(1, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
           reference_lat = excluded.reference_lat,
           reference_lon = excluded.reference_lon,
           radius_m = excluded.radius_m,
           checkin_start = excluded.checkin_start,
           checkin_end = excluded.checkin_end,
           checkout_start = excluded.checkout_start,
           checkout_end = excluded.checkout_end",
        rusqlite::params![
            settings.reference_lat,
            settings.reference_lon,
            settings.radius_m,
            settings.checkin.start.format("%H:%M:%S").to_string(),
            settings.checkin.end.format("%H:%M:%S").to_string(),
            settings.checkout.start.format("%H:%M:%S").to_string(),
            settings.checkout.end.format("%H:%M:%S").to_string(),
        ],
    )?;
    Ok(())
}
