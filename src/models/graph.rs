//! Graph payload models

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Opaque value returned by the `showgraph` RPC.
///
/// The controller never looks inside; only a renderer interprets it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GraphPayload(Value);

impl GraphPayload {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

/// A single colored marker on a scatter figure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScatterPoint {
    pub x: f64,
    pub y: f64,
    /// Hex color, `#rrggbb`
    pub color: String,
}

/// Figure description produced by the server and drawn by the SVG renderer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Figure {
    Scatter {
        title: String,
        points: Vec<ScatterPoint>,
        #[serde(default)]
        transparent: bool,
    },
}

impl Figure {
    pub fn into_payload(self) -> Result<GraphPayload, serde_json::Error> {
        serde_json::to_value(self).map(GraphPayload::new)
    }

    pub fn from_payload(payload: &GraphPayload) -> Result<Self, serde_json::Error> {
        Figure::deserialize(payload.as_value())
    }
}
