use crate::auth::{self, AuthError, Role};
use crate::db::{self, SchoolSettings};
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::window::TimeWindow;
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

impl From<rusqlite::Error> for HandlerErr {
    fn from(e: rusqlite::Error) -> Self {
        HandlerErr {
            code: "db_query_failed",
            message: e.to_string(),
            details: None,
        }
    }
}

fn get_finite_f64(params: &serde_json::Value, key: &str) -> Result<f64, HandlerErr> {
    let v = params
        .get(key)
        .and_then(|v| v.as_f64())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))?;
    if !v.is_finite() {
        return Err(HandlerErr::bad_params(format!("{} must be finite", key)));
    }
    Ok(v)
}

fn get_window(params: &serde_json::Value, start_key: &str, end_key: &str) -> Result<TimeWindow, HandlerErr> {
    let start = params
        .get(start_key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", start_key)))?;
    let end = params
        .get(end_key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", end_key)))?;
    TimeWindow::parse(start, end).ok_or_else(|| {
        HandlerErr::bad_params(format!("{}/{} must be HH:MM times", start_key, end_key))
    })
}

fn settings_json(settings: &SchoolSettings) -> serde_json::Value {
    json!({
        "referenceLat": settings.reference_lat,
        "referenceLon": settings.reference_lon,
        "radiusM": settings.radius_m,
        "checkinStart": settings.checkin.start.format("%H:%M:%S").to_string(),
        "checkinEnd": settings.checkin.end.format("%H:%M:%S").to_string(),
        "checkoutStart": settings.checkout.start.format("%H:%M:%S").to_string(),
        "checkoutEnd": settings.checkout.end.format("%H:%M:%S").to_string(),
    })
}

fn settings_get(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let principal = auth::principal_from(params)?;
    auth::require_role(&principal, &[Role::Teacher, Role::Admin])?;
    let settings = db::load_settings(conn)?;
    Ok(json!({ "settings": settings.as_ref().map(settings_json) }))
}

fn settings_update(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let principal = auth::principal_from(params)?;
    auth::require_role(&principal, &[Role::Admin])?;

    let reference_lat = get_finite_f64(params, "referenceLat")?;
    let reference_lon = get_finite_f64(params, "referenceLon")?;
    if !(-90.0..=90.0).contains(&reference_lat) || !(-180.0..=180.0).contains(&reference_lon) {
        return Err(HandlerErr::bad_params("reference point out of range"));
    }
    let radius_m = get_finite_f64(params, "radiusM")?;
    if radius_m <= 0.0 {
        return Err(HandlerErr::bad_params("radiusM must be > 0"));
    }
    let checkin = get_window(params, "checkinStart", "checkinEnd")?;
    let checkout = get_window(params, "checkoutStart", "checkoutEnd")?;

    let settings = SchoolSettings {
        reference_lat,
        reference_lon,
        radius_m,
        checkin,
        checkout,
    };
    db::save_settings(conn, &settings)?;
    Ok(json!({ "settings": settings_json(&settings) }))
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
        "settings.get" => Some(with_db(state, req, settings_get)),
        "settings.update" => Some(with_db(state, req, settings_update)),
        _ => None,
    }
}
