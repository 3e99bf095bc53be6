use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, info, warn};

use crate::api::backend::BackendClient;
use crate::config::AppConfig;
use crate::controller::{GraphOutcome, PlotRequestController, RenderOrdering, TimeLoad};
use crate::render::{RenderSurface, SvgRenderer};
use crate::utils::{extract_clean_error, PlotError};

type ViewController = PlotRequestController<Arc<BackendClient>, Arc<BackendClient>, SvgRenderer>;

/// Terminal front end: shows the server time and draws new dots on every Enter
pub async fn execute(config: &AppConfig, ordering: RenderOrdering) -> Result<(), String> {
    let client = Arc::new(
        BackendClient::with_base_url(config.api_base_url.clone(), config.request_timeout)
            .map_err(|e| e.to_string())?,
    );
    info!("🔌 Using API at {} ({:?} ordering)", client.base_url(), ordering);

    let controller: Arc<ViewController> = Arc::new(
        PlotRequestController::new(client.clone(), client, SvgRenderer::default(), RenderSurface::new())
            .with_ordering(ordering),
    );

    println!("Hello Graph");

    // Mount: fetch the time once
    match controller.load_current_time().await {
        Ok(TimeLoad::Loaded(time)) => debug!("Mounted with server time {}", time),
        Ok(TimeLoad::AlreadyRequested) => {}
        Err(e) => println!("⚠️ Could not load the server time: {}", e),
    }
    println!("The current time is {}.", controller.current_time());
    println!("Press Enter to get new dots, or type q to quit.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut requests: JoinSet<Result<GraphOutcome, PlotError>> = JoinSet::new();

    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(input)) if input.trim().eq_ignore_ascii_case("q") => break,
                Ok(Some(_)) => {
                    let task_controller = Arc::clone(&controller);
                    requests.spawn(async move { task_controller.request_and_render_graph().await });
                    println!("Getting new dots...");
                }
                Ok(None) => break,
                Err(e) => return Err(format!("Failed to read input: {}", e)),
            },
            Some(done) = requests.join_next() => {
                report(done, &controller, &config.graph_output).await;
            }
        }
    }

    // Let outstanding requests finish so their results are not lost
    while let Some(done) = requests.join_next().await {
        report(done, &controller, &config.graph_output).await;
    }

    Ok(())
}

async fn report(
    done: Result<Result<GraphOutcome, PlotError>, JoinError>,
    controller: &ViewController,
    output: &Path,
) {
    match done {
        Ok(Ok(GraphOutcome::Rendered { token })) => {
            match tokio::fs::write(output, controller.surface().snapshot()).await {
                Ok(()) => println!("🎨 New dots drawn (request #{}) -> {}", token, output.display()),
                Err(e) => println!("⚠️ Drew new dots but could not save {}: {}", output.display(), e),
            }
        }
        Ok(Ok(GraphOutcome::Stale { token, latest })) => {
            debug!("Request #{} superseded by #{}", token, latest);
        }
        Ok(Err(e)) => {
            println!("❌ Could not get new dots: {}", extract_clean_error(&e.to_string()));
        }
        Err(e) => warn!("Graph request task failed: {}", e),
    }

    match controller.in_flight() {
        0 => println!("📊 Graph status: {}", controller.status()),
        pending => println!("📊 Graph status: {}, {} request(s) still running", controller.status(), pending),
    }
}
