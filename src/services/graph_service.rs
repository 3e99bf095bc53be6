use rand::Rng;
use serde_json::Value;

use crate::models::{Figure, ScatterPoint};
use crate::render::colormap::vec_to_colors;
use crate::services::rpc_service::{Rpc, RpcArgs, RpcError};

/// Points drawn when the caller does not pass `n`
pub const DEFAULT_POINT_COUNT: usize = 1000;
pub const MAX_POINT_COUNT: usize = 100_000;

/// One sample from the standard normal distribution (Box-Muller)
fn standard_normal<R: Rng>(rng: &mut R) -> f64 {
    // gen() is in [0, 1); shift to (0, 1] so ln never sees zero
    let u1: f64 = 1.0 - rng.gen::<f64>();
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

/// Build a scatter of `n` normally distributed points colored by distance from the origin
pub fn random_scatter<R: Rng>(rng: &mut R, n: usize) -> Figure {
    let coords: Vec<(f64, f64)> = (0..n)
        .map(|_| (standard_normal(rng), standard_normal(rng)))
        .collect();

    let radii: Vec<f64> = coords.iter().map(|(x, y)| (x * x + y * y).sqrt()).collect();
    let colors = vec_to_colors(&radii);

    let points = coords
        .into_iter()
        .zip(colors)
        .map(|((x, y), color)| ScatterPoint { x, y, color })
        .collect();

    Figure::Scatter {
        title: format!("{} random dots", n),
        points,
        transparent: true,
    }
}

/// Read and validate the `n` parameter
fn point_count(args: &RpcArgs) -> Result<usize, RpcError> {
    let Some(raw) = args.get("n", 0) else {
        return Ok(DEFAULT_POINT_COUNT);
    };

    if !raw.is_number() {
        return Err(RpcError::Failed(format!("n must be a number, got {}", raw)));
    }

    // Negative and fractional numbers are out of range like 0 is
    match raw.as_u64() {
        Some(n) if (1..=MAX_POINT_COUNT as u64).contains(&n) => Ok(n as usize),
        _ => Err(RpcError::Rejected(format!(
            "n must be an integer between 1 and {}, got {}",
            MAX_POINT_COUNT, raw
        ))),
    }
}

/// `showgraph(n=1000)`
pub fn showgraph(args: &RpcArgs) -> Result<Option<Value>, RpcError> {
    let n = point_count(args)?;
    let figure = random_scatter(&mut rand::thread_rng(), n);
    let payload = figure
        .into_payload()
        .map_err(|e| RpcError::Failed(format!("Failed to serialize figure: {}", e)))?;
    Ok(Some(payload.as_value().clone()))
}

pub fn rpcs() -> Vec<Rpc> {
    vec![Rpc::new("showgraph", showgraph)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::json;

    #[test]
    fn test_random_scatter_shape() {
        let mut rng = StdRng::seed_from_u64(7);
        let Figure::Scatter { points, transparent, .. } = random_scatter(&mut rng, 500);
        assert_eq!(points.len(), 500);
        assert!(transparent);
        assert!(points.iter().all(|p| p.x.is_finite() && p.y.is_finite()));
        assert!(points.iter().all(|p| p.color.starts_with('#') && p.color.len() == 7));
    }

    #[test]
    fn test_samples_look_standard_normal() {
        let mut rng = StdRng::seed_from_u64(42);
        let samples: Vec<f64> = (0..20_000).map(|_| standard_normal(&mut rng)).collect();
        let mean = samples.iter().sum::<f64>() / samples.len() as f64;
        let var = samples.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / samples.len() as f64;
        assert!(mean.abs() < 0.05, "mean {}", mean);
        assert!((var - 1.0).abs() < 0.05, "variance {}", var);
    }

    #[test]
    fn test_point_count_parsing() {
        assert_eq!(point_count(&RpcArgs::default()).unwrap(), DEFAULT_POINT_COUNT);

        let positional = RpcArgs { args: vec![json!(25)], ..Default::default() };
        assert_eq!(point_count(&positional).unwrap(), 25);

        let mut too_many = RpcArgs::default();
        too_many.kwargs.insert("n".into(), json!(MAX_POINT_COUNT + 1));
        assert!(matches!(point_count(&too_many), Err(RpcError::Rejected(_))));

        for out_of_range in [json!(0), json!(-5), json!(2.5)] {
            let mut args = RpcArgs::default();
            args.kwargs.insert("n".into(), out_of_range.clone());
            assert!(
                matches!(point_count(&args), Err(RpcError::Rejected(_))),
                "n = {} should be rejected",
                out_of_range
            );
        }

        let mut wrong_type = RpcArgs::default();
        wrong_type.kwargs.insert("n".into(), json!("ten"));
        assert!(matches!(point_count(&wrong_type), Err(RpcError::Failed(_))));
    }

    #[test]
    fn test_showgraph_default_payload() {
        let value = showgraph(&RpcArgs::default()).unwrap().unwrap();
        assert_eq!(value["kind"], json!("scatter"));
        assert_eq!(value["points"].as_array().map(|p| p.len()), Some(DEFAULT_POINT_COUNT));
    }

    #[tokio::test]
    async fn test_bad_n_is_an_error_reply_not_an_exception() {
        let mut registry = crate::services::rpc_service::RpcRegistry::new();
        registry.register_all(rpcs()).unwrap();

        for n in [json!(-5), json!(2.5), json!(0), json!(MAX_POINT_COUNT + 1)] {
            let reply = registry
                .dispatch(&json!({"funcname": "showgraph", "kwargs": {"n": n}}), crate::config::LoggingMode::Minimal)
                .await;
            assert!(
                matches!(reply, crate::services::rpc_service::RpcReply::Error(_)),
                "n = {} gave {:?}",
                n,
                reply
            );
        }
    }
}
