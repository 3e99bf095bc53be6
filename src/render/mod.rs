//! Render surfaces and the renderers that draw graph payloads into them

pub mod colormap;
pub mod surface;
pub mod svg;

pub use surface::RenderSurface;
pub use svg::SvgRenderer;

use crate::models::GraphPayload;
use crate::utils::PlotError;

/// Turns a graph payload into visible content on a surface
pub trait Renderer: Send + Sync {
    fn draw(&self, target: &RenderSurface, payload: &GraphPayload) -> Result<(), PlotError>;
}
