//! Value-to-color mapping for scatter markers.

/// Viridis colormap approximation.
fn viridis_rgb(t: f64) -> (u8, u8, u8) {
    let t = t.clamp(0.0, 1.0);

    // Piecewise linear through the dark purple, teal and yellow anchors
    let lerp = |lo: f64, mid: f64, hi: f64| {
        if t < 0.5 {
            lo + t * 2.0 * (mid - lo)
        } else {
            mid + (t - 0.5) * 2.0 * (hi - mid)
        }
    };

    (
        lerp(68.0, 33.0, 253.0) as u8,
        lerp(1.0, 145.0, 231.0) as u8,
        lerp(84.0, 140.0, 37.0) as u8,
    )
}

/// Format an RGB triple as `#rrggbb`
pub fn to_hex((r, g, b): (u8, u8, u8)) -> String {
    format!("#{:02x}{:02x}{:02x}", r, g, b)
}

/// Parse `#rrggbb` back into an RGB triple
pub fn parse_hex(color: &str) -> Option<(u8, u8, u8)> {
    let hex = color.strip_prefix('#')?;
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some((channel(0)?, channel(2)?, channel(4)?))
}

/// Map every value to a hex color, normalizing against the min and max of the slice
pub fn vec_to_colors(values: &[f64]) -> Vec<String> {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;

    values
        .iter()
        .map(|v| {
            let t = if range > 0.0 { (v - min) / range } else { 0.5 };
            to_hex(viridis_rgb(t))
        })
        .collect()
}
