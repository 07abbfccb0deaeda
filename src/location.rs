use crate::db::SchoolSettings;
use crate::geo;

/// A single client-supplied GPS sample. Ephemeral: validated, then dropped.
/// Never persisted, never echoed into responses or error payloads.
#[derive(Debug, Clone, Copy)]
pub struct LocationReading {
    pub latitude: f64,
    pub longitude: f64,
    /// Reported accuracy radius in meters, > 0.
    pub accuracy: f64,
}

/// Classification of one check-in/check-out leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationStatus {
    /// Within the strict allowed radius, regardless of accuracy.
    OnSite,
    /// Outside the strict radius but within radius + accuracy; accepted,
    /// flagged for teacher review.
    Unreliable,
    /// Outside even the accuracy-adjusted bound; recorded for review,
    /// never silently dropped.
    TooFar,
}

impl LocationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            LocationStatus::OnSite => "on_site",
            LocationStatus::Unreliable => "unreliable",
            LocationStatus::TooFar => "too_far",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "on_site" => Some(LocationStatus::OnSite),
            "unreliable" => Some(LocationStatus::Unreliable),
            "too_far" => Some(LocationStatus::TooFar),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    pub status: LocationStatus,
    pub message: String,
    /// Raw computed distance from the reference point, meters. Returned to
    /// the caller for display; never persisted.
    pub distance: f64,
}

/// Classify a reading against the school's reference point.
///
/// Accuracy widens the allowed radius instead of gating the reading: a
/// low-precision fix whose true position could plausibly be in range is
/// accepted as `Unreliable` rather than rejected outright.
pub fn validate_reading(reading: &LocationReading, settings: &SchoolSettings) -> ValidationOutcome {
    let distance = geo::distance_m(
        reading.latitude,
        reading.longitude,
        settings.reference_lat,
        settings.reference_lon,
    );
    let effective_radius = settings.radius_m + reading.accuracy;

    let (status, message) = if distance <= settings.radius_m {
        (
            LocationStatus::OnSite,
            format!("Location verified, {:.0} m from school", distance),
        )
    } else if distance <= effective_radius {
        (
            LocationStatus::Unreliable,
            format!(
                "Location accepted within GPS accuracy margin ({:.0} m from school); flagged for teacher review",
                distance
            ),
        )
    } else {
        (
            LocationStatus::TooFar,
            format!(
                "Location is outside the school area ({:.0} m from school, allowed {:.0} m)",
                distance, settings.radius_m
            ),
        )
    };

    ValidationOutcome {
        status,
        message,
        distance,
    }
}
