use serde::{Deserialize, Serialize};

/// Opaque package identifier supplied by the caller. Compared byte-exact,
/// never normalized.
pub type TrackKey = String;

pub const STATUS_CREATED: &str = "Created";
pub const STATUS_IN_TRANSIT: &str = "Transit";
pub const STATUS_IN_CUSTOMS: &str = "Customs";
pub const STATUS_DELIVERED: &str = "Delivered";
pub const STATUS_EXCEPTION: &str = "Exception";
pub const STATUS_RETURNED: &str = "Returned";

/// Sentinel country tag for missing origin/destination data.
pub const STATUS_UNKNOWN: &str = "Unknown";

/// A single tracking event as reported by the upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackEvent {
    pub status: String,
    /// RFC 3339 timestamp.
    pub date: String,
}

/// Immutable tracking state for one package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackRecord {
    /// Ordered country tags; `"Unknown"` where the upstream had no data.
    pub countries: Vec<String>,
    pub events: Vec<TrackEvent>,
}

/// The single outcome delivered to a caller.
///
/// Failures are carried in `error`, never raised out-of-band: every caller
/// consumes its result from the same reply channel regardless of what
/// happened to the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackResponse {
    pub status: bool,
    #[serde(rename = "data", skip_serializing_if = "Option::is_none")]
    pub record: Option<TrackRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TrackResponse {
    pub fn success(record: TrackRecord) -> Self {
        Self {
            status: true,
            record: Some(record),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            status: false,
            record: None,
            error: Some(error.into()),
        }
    }

    pub fn cancelled() -> Self {
        Self::failure("request cancelled")
    }

    pub fn busy() -> Self {
        Self::failure("service busy, try again later")
    }

    pub fn shutting_down() -> Self {
        Self::failure("service shutting down")
    }

    pub fn not_running() -> Self {
        Self::failure("service is not running")
    }

    pub fn not_found() -> Self {
        Self::failure("tracking code not found in external system")
    }

    pub fn unavailable() -> Self {
        Self::failure("tracking service temporarily unavailable")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_serializes_with_data_field() {
        let response = TrackResponse::success(TrackRecord {
            countries: vec!["China".into(), STATUS_UNKNOWN.into()],
            events: vec![TrackEvent {
                status: "Package received".into(),
                date: "2024-03-01T10:00:00Z".into(),
            }],
        });

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["status"], true);
        assert_eq!(json["data"]["countries"][0], "China");
        assert!(json.get("error").is_none());
    }

    #[test]
    fn failure_omits_data_field() {
        let json = serde_json::to_value(TrackResponse::not_found()).unwrap();
        assert_eq!(json["status"], false);
        assert_eq!(json["error"], "tracking code not found in external system");
        assert!(json.get("data").is_none());
    }
}
