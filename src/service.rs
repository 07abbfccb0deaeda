use crate::db::{self, SchoolSettings};
use crate::location::{self, LocationReading, LocationStatus, ValidationOutcome};
use crate::status::{self, FinalStatus};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{Connection, OptionalExtension, Row};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

const DATE_FMT: &str = "%Y-%m-%d";
const DATETIME_FMT: &str = "%Y-%m-%dT%H:%M:%S";

/// One row per (student, calendar date). Created by the first successful
/// check-in; check-out adds its leg and the final status. Never duplicated.
#[derive(Debug, Clone)]
pub struct AttendanceRecord {
    pub id: String,
    pub user_id: String,
    pub date: NaiveDate,
    pub check_in_time: Option<NaiveDateTime>,
    pub check_in_status: Option<LocationStatus>,
    pub check_out_time: Option<NaiveDateTime>,
    pub check_out_status: Option<LocationStatus>,
    pub final_status: Option<FinalStatus>,
    pub teacher_validated: bool,
    pub teacher_note: Option<String>,
}

impl AttendanceRecord {
    /// Live projection of the day's status: the stored final status once
    /// checked out, otherwise derived from the check-in leg alone. The
    /// pre-checkout value is display-only and never persisted.
    pub fn live_status(&self) -> Option<FinalStatus> {
        if let Some(final_status) = self.final_status {
            return Some(final_status);
        }
        self.check_in_status.map(status::project_single_leg)
    }

    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "id": self.id,
            "userId": self.user_id,
            "date": self.date.format(DATE_FMT).to_string(),
            "checkInTime": self.check_in_time.map(|t| t.format(DATETIME_FMT).to_string()),
            "checkInStatus": self.check_in_status.map(LocationStatus::as_str),
            "checkOutTime": self.check_out_time.map(|t| t.format(DATETIME_FMT).to_string()),
            "checkOutStatus": self.check_out_status.map(LocationStatus::as_str),
            "finalStatus": self.final_status.map(FinalStatus::as_str),
            "teacherValidated": self.teacher_validated,
            "teacherNote": self.teacher_note,
        })
    }
}

#[derive(Debug, Error)]
pub enum AttendanceError {
    #[error("school settings are not configured")]
    MissingSettings,
    #[error("outside the allowed window ({window})")]
    OutOfWindow { window: String },
    #[error("already checked in today")]
    AlreadyCheckedIn,
    #[error("already checked out today")]
    AlreadyCheckedOut,
    #[error("no check-in recorded today")]
    NoCheckIn,
    #[error("attendance record not found")]
    NotFound,
    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),
}

/// Check a student in for the day.
///
/// The pre-check gives a clean domain error; the insert itself is an atomic
/// insert-if-absent on (user_id, date), so two racing requests can never
/// create two rows — the loser sees zero affected rows and gets
/// `AlreadyCheckedIn` as well.
pub fn check_in(
    conn: &Connection,
    user_id: &str,
    reading: &LocationReading,
    now: NaiveDateTime,
) -> Result<(AttendanceRecord, ValidationOutcome), AttendanceError> {
    let settings = load_required_settings(conn)?;
    if !settings.checkin.contains(now.time()) {
        return Err(AttendanceError::OutOfWindow {
            window: settings.checkin.display(),
        });
    }

    let today = now.date();
    if let Some(existing) = record_for_date(conn, user_id, today)? {
        if existing.check_in_time.is_some() {
            return Err(AttendanceError::AlreadyCheckedIn);
        }
    }

    let outcome = location::validate_reading(reading, &settings);
    let inserted = conn.execute(
        "INSERT INTO attendance(id, user_id, date, check_in_time, check_in_status)
         VALUES(?, ?, ?, ?, ?)
         ON CONFLICT(user_id, date) DO NOTHING",
        rusqlite::params![
            Uuid::new_v4().to_string(),
            user_id,
            today.format(DATE_FMT).to_string(),
            now.format(DATETIME_FMT).to_string(),
            outcome.status.as_str(),
        ],
    )?;
    if inserted == 0 {
        return Err(AttendanceError::AlreadyCheckedIn);
    }

    let record =
        record_for_date(conn, user_id, today)?.ok_or(AttendanceError::NotFound)?;
    Ok((record, outcome))
}

/// Check a student out, resolving and persisting the day's final status.
pub fn check_out(
    conn: &Connection,
    user_id: &str,
    reading: &LocationReading,
    now: NaiveDateTime,
) -> Result<(AttendanceRecord, ValidationOutcome), AttendanceError> {
    let settings = load_required_settings(conn)?;
    if !settings.checkout.contains(now.time()) {
        return Err(AttendanceError::OutOfWindow {
            window: settings.checkout.display(),
        });
    }

    let today = now.date();
    let existing = record_for_date(conn, user_id, today)?.ok_or(AttendanceError::NoCheckIn)?;
    let check_in_status = existing.check_in_status.ok_or(AttendanceError::NoCheckIn)?;
    if existing.check_out_time.is_some() {
        return Err(AttendanceError::AlreadyCheckedOut);
    }

    let outcome = location::validate_reading(reading, &settings);
    let mut final_status = status::resolve(check_in_status, outcome.status);
    // A check-out timestamp earlier than the check-in timestamp is an
    // inconsistency; it always lands in the review pile.
    if existing.check_in_time.map(|t| now < t).unwrap_or(false) {
        final_status = FinalStatus::NeedsVerification;
    }

    let updated = conn.execute(
        "UPDATE attendance
         SET check_out_time = ?, check_out_status = ?, final_status = ?
         WHERE id = ? AND check_out_time IS NULL",
        rusqlite::params![
            now.format(DATETIME_FMT).to_string(),
            outcome.status.as_str(),
            final_status.as_str(),
            existing.id,
        ],
    )?;
    if updated == 0 {
        return Err(AttendanceError::AlreadyCheckedOut);
    }

    let record =
        record_for_date(conn, user_id, today)?.ok_or(AttendanceError::NotFound)?;
    Ok((record, outcome))
}

pub fn record_for_date(
    conn: &Connection,
    user_id: &str,
    date: NaiveDate,
) -> Result<Option<AttendanceRecord>, AttendanceError> {
    let record = conn
        .query_row(
            "SELECT id, user_id, date, check_in_time, check_in_status,
                    check_out_time, check_out_status, final_status,
                    teacher_validated, teacher_note
             FROM attendance WHERE user_id = ? AND date = ?",
            rusqlite::params![user_id, date.format(DATE_FMT).to_string()],
            record_from_row,
        )
        .optional()?;
    Ok(record)
}

pub fn records_for_date(
    conn: &Connection,
    date: NaiveDate,
) -> Result<Vec<AttendanceRecord>, AttendanceError> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, date, check_in_time, check_in_status,
                check_out_time, check_out_status, final_status,
                teacher_validated, teacher_note
         FROM attendance WHERE date = ? ORDER BY user_id",
    )?;
    let records = stmt
        .query_map([date.format(DATE_FMT).to_string()], record_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(records)
}

/// Teacher review: mark a record as validated, optionally attaching a note.
pub fn validate_record(
    conn: &Connection,
    attendance_id: &str,
    note: Option<&str>,
) -> Result<AttendanceRecord, AttendanceError> {
    let updated = conn.execute(
        "UPDATE attendance SET teacher_validated = 1, teacher_note = ? WHERE id = ?",
        rusqlite::params![note, attendance_id],
    )?;
    if updated == 0 {
        return Err(AttendanceError::NotFound);
    }
    let record = conn
        .query_row(
            "SELECT id, user_id, date, check_in_time, check_in_status,
                    check_out_time, check_out_status, final_status,
                    teacher_validated, teacher_note
             FROM attendance WHERE id = ?",
            [attendance_id],
            record_from_row,
        )
        .optional()?;
    record.ok_or(AttendanceError::NotFound)
}

fn load_required_settings(conn: &Connection) -> Result<SchoolSettings, AttendanceError> {
    db::load_settings(conn)?.ok_or(AttendanceError::MissingSettings)
}

fn record_from_row(r: &Row) -> rusqlite::Result<AttendanceRecord> {
    Ok(AttendanceRecord {
        id: r.get(0)?,
        user_id: r.get(1)?,
        date: parse_date_column(r.get_ref(2)?.as_str()?, 2)?,
        check_in_time: parse_datetime_column(r.get_ref(3)?.as_str_or_null()?, 3)?,
        check_in_status: parse_status_column(r.get_ref(4)?.as_str_or_null()?, 4)?,
        check_out_time: parse_datetime_column(r.get_ref(5)?.as_str_or_null()?, 5)?,
        check_out_status: parse_status_column(r.get_ref(6)?.as_str_or_null()?, 6)?,
        final_status: parse_final_column(r.get_ref(7)?.as_str_or_null()?, 7)?,
        teacher_validated: r.get::<_, i64>(8)? != 0,
        teacher_note: r.get(9)?,
    })
}

fn conversion_err(col: usize, raw: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        col,
        rusqlite::types::Type::Text,
        format!("bad stored value: {raw:?}").into(),
    )
}

fn parse_date_column(raw: &str, col: usize) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FMT).map_err(|_| conversion_err(col, raw))
}

fn parse_datetime_column(raw: Option<&str>, col: usize) -> rusqlite::Result<Option<NaiveDateTime>> {
    let Some(raw) = raw else { return Ok(None) };
    NaiveDateTime::parse_from_str(raw, DATETIME_FMT)
        .map(Some)
        .map_err(|_| conversion_err(col, raw))
}

fn parse_status_column(raw: Option<&str>, col: usize) -> rusqlite::Result<Option<LocationStatus>> {
    let Some(raw) = raw else { return Ok(None) };
    LocationStatus::parse(raw)
        .map(Some)
        .ok_or_else(|| conversion_err(col, raw))
}

fn parse_final_column(raw: Option<&str>, col: usize) -> rusqlite::Result<Option<FinalStatus>> {
    let Some(raw) = raw else { return Ok(None) };
    FinalStatus::parse(raw)
        .map(Some)
        .ok_or_else(|| conversion_err(col, raw))
}
