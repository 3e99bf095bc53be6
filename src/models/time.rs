//! Server time models

use serde::{Deserialize, Serialize};

/// Body of `GET /api/get_time`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeResponse {
    pub time: f64,
}

/// Server time as last reported to the view. Starts at 0 until the first response.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CurrentTime(f64);

impl CurrentTime {
    /// Returns `None` for NaN or infinite values so the view never holds an invalid number
    pub fn new(value: f64) -> Option<Self> {
        value.is_finite().then_some(Self(value))
    }
}

impl std::fmt::Display for CurrentTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
