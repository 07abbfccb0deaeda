use crate::location::LocationStatus;

/// The persisted, authoritative classification for a day. Written exactly
/// once, at check-out time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalStatus {
    Full,
    Partial,
    NeedsVerification,
}

impl FinalStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            FinalStatus::Full => "full",
            FinalStatus::Partial => "partial",
            FinalStatus::NeedsVerification => "needs_verification",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "full" => Some(FinalStatus::Full),
            "partial" => Some(FinalStatus::Partial),
            "needs_verification" => Some(FinalStatus::NeedsVerification),
            _ => None,
        }
    }
}

/// Fold the two leg classifications into one final status: the worse leg
/// dominates, ordered TooFar > Unreliable > OnSite.
pub fn resolve(check_in: LocationStatus, check_out: LocationStatus) -> FinalStatus {
    match worse(check_in, check_out) {
        LocationStatus::OnSite => FinalStatus::Full,
        LocationStatus::Unreliable => FinalStatus::Partial,
        LocationStatus::TooFar => FinalStatus::NeedsVerification,
    }
}

/// Live projection for a day that has a check-in leg but no check-out yet.
/// Shown to the caller at query time, never persisted.
pub fn project_single_leg(check_in: LocationStatus) -> FinalStatus {
    match check_in {
        LocationStatus::OnSite => FinalStatus::Full,
        LocationStatus::Unreliable => FinalStatus::Partial,
        LocationStatus::TooFar => FinalStatus::NeedsVerification,
    }
}

fn worse(a: LocationStatus, b: LocationStatus) -> LocationStatus {
    fn rank(s: LocationStatus) -> u8 {
        match s {
            LocationStatus::OnSite => 0,
            LocationStatus::Unreliable => 1,
            LocationStatus::TooFar => 2,
        }
    }
    if rank(a) >= rank(b) {
        a
    } else {
        b
    }
}
