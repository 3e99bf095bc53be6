use plotters::prelude::*;
use std::ops::Range;
use tracing::debug;

use super::colormap::parse_hex;
use super::{RenderSurface, Renderer};
use crate::models::{Figure, GraphPayload, ScatterPoint};
use crate::utils::PlotError;

/// Draws scatter figure payloads as SVG text into a render surface
#[derive(Debug, Clone)]
pub struct SvgRenderer {
    width: u32,
    height: u32,
}

impl Default for SvgRenderer {
    fn default() -> Self {
        Self::new(640, 480)
    }
}

impl SvgRenderer {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Render a figure to an SVG document
    pub fn render_figure(&self, figure: &Figure) -> Result<String, PlotError> {
        let Figure::Scatter { title, points, transparent } = figure;

        // Resolve colors up front so a bad payload fails before any drawing
        let markers = points
            .iter()
            .map(|p| {
                parse_hex(&p.color)
                    .map(|(r, g, b)| (p.x, p.y, RGBColor(r, g, b)))
                    .ok_or_else(|| PlotError::RenderFailure(format!("Invalid marker color '{}'", p.color)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let (x_range, y_range) = axis_ranges(points);

        let mut svg = String::new();
        {
            let root = SVGBackend::with_string(&mut svg, (self.width, self.height)).into_drawing_area();
            if !transparent {
                root.fill(&WHITE)
                    .map_err(|e| PlotError::RenderFailure(format!("Failed to fill canvas: {}", e)))?;
            }

            let mut chart = ChartBuilder::on(&root)
                .caption(title.as_str(), ("sans-serif", 24.0).into_font())
                .margin(15)
                .x_label_area_size(30)
                .y_label_area_size(40)
                .build_cartesian_2d(x_range, y_range)
                .map_err(|e| PlotError::RenderFailure(format!("Failed to build chart: {}", e)))?;

            chart
                .configure_mesh()
                .draw()
                .map_err(|e| PlotError::RenderFailure(format!("Failed to draw mesh: {}", e)))?;

            chart
                .draw_series(
                    markers
                        .iter()
                        .map(|(x, y, color)| Circle::new((*x, *y), 3, color.filled())),
                )
                .map_err(|e| PlotError::RenderFailure(format!("Failed to draw points: {}", e)))?;

            root.present()
                .map_err(|e| PlotError::RenderFailure(format!("Failed to render chart: {}", e)))?;
        }

        debug!("Rendered {} markers into {} bytes of SVG", markers.len(), svg.len());
        Ok(svg)
    }
}

impl Renderer for SvgRenderer {
    fn draw(&self, target: &RenderSurface, payload: &GraphPayload) -> Result<(), PlotError> {
        let figure = Figure::from_payload(payload)
            .map_err(|e| PlotError::RenderFailure(format!("Payload is not a drawable figure: {}", e)))?;
        let svg = self.render_figure(&figure)?;
        target.set_svg(svg);
        Ok(())
    }
}

/// Data bounds padded by 10% on each side
fn axis_ranges(points: &[ScatterPoint]) -> (Range<f64>, Range<f64>) {
    fn padded(values: impl Iterator<Item = f64> + Clone) -> Range<f64> {
        let min = values.clone().fold(f64::INFINITY, f64::min);
        let max = values.fold(f64::NEG_INFINITY, f64::max);
        if !min.is_finite() || !max.is_finite() {
            return -1.0..1.0;
        }
        let padding = ((max - min) * 0.1).max(1e-8);
        (min - padding)..(max + padding)
    }

    (
        padded(points.iter().map(|p| p.x)),
        padded(points.iter().map(|p| p.y)),
    )
}
