use chrono::Utc;

use crate::models::TimeResponse;

/// Current server time in Unix seconds, millisecond precision
pub fn current_time() -> TimeResponse {
    TimeResponse {
        time: Utc::now().timestamp_millis() as f64 / 1000.0,
    }
}
