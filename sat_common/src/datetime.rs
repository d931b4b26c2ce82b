//! minimal timestamp helpers. The core only ever needs seconds-since-epoch as `f64`,
//! which is what the wire format (§6) and the deadline arithmetic of the response
//! collector (§4.5) both use.

use chrono::Utc;

/// current time as seconds since the Unix epoch.
pub fn unix_now() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}
