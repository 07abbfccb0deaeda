use crate::auth::{self, AuthError, Role};
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::location::LocationReading;
use crate::service::{self, AttendanceError, AttendanceRecord};
use crate::status::FinalStatus;
use chrono::{Local, NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use serde_json::json;

struct HandlerErr {
    code: &'static str,
    message: String,
    details: Option<serde_json::Value>,
}

impl HandlerErr {
    fn bad_params(message: impl Into<String>) -> Self {
        HandlerErr {
            code: "bad_params",
            message: message.into(),
            details: None,
        }
    }

    fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

impl From<AuthError> for HandlerErr {
    fn from(e: AuthError) -> Self {
        let code = match e {
            AuthError::Unauthenticated => "unauthenticated",
            AuthError::Forbidden => "forbidden",
        };
        HandlerErr {
            code,
            message: e.to_string(),
            details: None,
        }
    }
}

// Transport tiers: unauthenticated/forbidden -> 401; bad_params and the
// business-rule codes -> 400; settings_missing/db errors -> 500.
impl From<AttendanceError> for HandlerErr {
    fn from(e: AttendanceError) -> Self {
        let message = e.to_string();
        let (code, details) = match e {
            AttendanceError::MissingSettings => ("settings_missing", None),
            AttendanceError::OutOfWindow { window } => {
                ("out_of_window", Some(json!({ "window": window })))
            }
            AttendanceError::AlreadyCheckedIn => ("already_checked_in", None),
            AttendanceError::AlreadyCheckedOut => ("already_checked_out", None),
            AttendanceError::NoCheckIn => ("no_check_in", None),
            AttendanceError::NotFound => ("not_found", None),
            AttendanceError::Db(_) => ("db_query_failed", None),
        };
        HandlerErr {
            code,
            message,
            details,
        }
    }
}

/// Reject malformed readings before any validation logic runs. Coordinates
/// live only in this request-scoped value and are dropped with it.
fn get_reading(params: &serde_json::Value) -> Result<LocationReading, HandlerErr> {
    let get = |key: &str| -> Result<f64, HandlerErr> {
        let v = params
            .get(key)
            .and_then(|v| v.as_f64())
            .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))?;
        if !v.is_finite() {
            return Err(HandlerErr::bad_params(format!("{} must be finite", key)));
        }
        Ok(v)
    };
    let latitude = get("latitude")?;
    let longitude = get("longitude")?;
    let accuracy = get("accuracy")?;
    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return Err(HandlerErr::bad_params("coordinates out of range"));
    }
    if accuracy <= 0.0 {
        return Err(HandlerErr::bad_params("accuracy must be > 0"));
    }
    Ok(LocationReading {
        latitude,
        longitude,
        accuracy,
    })
}

fn leg_result(record: &AttendanceRecord, outcome: &crate::location::ValidationOutcome) -> serde_json::Value {
    json!({
        "attendance": record.to_json(),
        "validation": {
            "status": outcome.status.as_str(),
            "message": outcome.message,
            "distance": outcome.distance,
        }
    })
}

fn now_local() -> NaiveDateTime {
    Local::now().naive_local()
}

fn check_in(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let principal = auth::principal_from(params)?;
    auth::require_role(&principal, &[Role::Student])?;
    let reading = get_reading(params)?;
    let (record, outcome) = service::check_in(conn, &principal.user_id, &reading, now_local())?;
    Ok(leg_result(&record, &outcome))
}

fn check_out(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let principal = auth::principal_from(params)?;
    auth::require_role(&principal, &[Role::Student])?;
    let reading = get_reading(params)?;
    let (record, outcome) = service::check_out(conn, &principal.user_id, &reading, now_local())?;
    Ok(leg_result(&record, &outcome))
}

fn today_status(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let principal = auth::principal_from(params)?;
    auth::require_role(&principal, &[Role::Student])?;
    let today = now_local().date();
    let record = service::record_for_date(conn, &principal.user_id, today)?;
    Ok(json!({
        "date": today.format("%Y-%m-%d").to_string(),
        "attendance": record.as_ref().map(AttendanceRecord::to_json),
        "liveStatus": record
            .as_ref()
            .and_then(AttendanceRecord::live_status)
            .map(FinalStatus::as_str),
    }))
}

fn list_for_date(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let principal = auth::principal_from(params)?;
    auth::require_role(&principal, &[Role::Teacher, Role::Admin])?;
    let date_raw = params
        .get("date")
        .and_then(|v| v.as_str())
        .ok_or_else(|| HandlerErr::bad_params("missing date"))?;
    let date = NaiveDate::parse_from_str(date_raw, "%Y-%m-%d")
        .map_err(|_| HandlerErr::bad_params("date must be YYYY-MM-DD"))?;
    let records = service::records_for_date(conn, date)?;
    Ok(json!({
        "date": date_raw,
        "records": records.iter().map(AttendanceRecord::to_json).collect::<Vec<_>>(),
    }))
}

fn validate(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let principal = auth::principal_from(params)?;
    auth::require_role(&principal, &[Role::Teacher, Role::Admin])?;
    let attendance_id = params
        .get("attendanceId")
        .and_then(|v| v.as_str())
        .ok_or_else(|| HandlerErr::bad_params("missing attendanceId"))?;
    let note = params.get("note").and_then(|v| v.as_str());
    let record = service::validate_record(conn, attendance_id, note)?;
    Ok(json!({ "attendance": record.to_json() }))
}

fn with_db(
    state: &mut AppState,
    req: &Request,
    f: impl FnOnce(&Connection, &serde_json::Value) -> Result<serde_json::Value, HandlerErr>,
) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match f(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "attendance.checkIn" => Some(with_db(state, req, check_in)),
        "attendance.checkOut" => Some(with_db(state, req, check_out)),
        "attendance.todayStatus" => Some(with_db(state, req, today_status)),
        "attendance.listForDate" => Some(with_db(state, req, list_for_date)),
        "attendance.validate" => Some(with_db(state, req, validate)),
        _ => None,
    }
}
