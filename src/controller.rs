//! Coordinates the "load server time" and "request and render a graph" flows.
//!
//! The controller owns the view state (current time and graph status) and a
//! handle to the render surface. Its collaborators are injected so the view
//! can run against the real HTTP backend and tests can run against fakes.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::models::{CurrentTime, GraphPayload};
use crate::render::{RenderSurface, Renderer};
use crate::utils::{FailureKind, PlotError};

/// Name of the remote procedure that produces a graph payload
pub const SHOWGRAPH_RPC: &str = "showgraph";

/// Shown on the surface while a graph request is outstanding
pub const PLACEHOLDER_TEXT: &str = "Graph rendering...";

/// Source of the server's current time
#[async_trait]
pub trait TimeSource: Send + Sync {
    async fn fetch_time(&self) -> Result<f64, PlotError>;
}

/// Invokes a named remote procedure and returns its payload
#[async_trait]
pub trait RpcCaller: Send + Sync {
    async fn call(&self, name: &str) -> Result<GraphPayload, PlotError>;
}

#[async_trait]
impl<T: TimeSource + ?Sized> TimeSource for Arc<T> {
    async fn fetch_time(&self) -> Result<f64, PlotError> {
        (**self).fetch_time().await
    }
}

#[async_trait]
impl<T: RpcCaller + ?Sized> RpcCaller for Arc<T> {
    async fn call(&self, name: &str) -> Result<GraphPayload, PlotError> {
        (**self).call(name).await
    }
}

impl<T: Renderer + ?Sized> Renderer for Arc<T> {
    fn draw(&self, target: &RenderSurface, payload: &GraphPayload) -> Result<(), PlotError> {
        (**self).draw(target, payload)
    }
}

/// Which completed graph response is allowed onto the surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderOrdering {
    /// Only the most recently issued request may render; older responses are dropped
    #[default]
    LatestIssued,
    /// Every successful response renders, so the last one to arrive wins
    LastResolved,
}

/// Graph request state as seen by the view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphStatus {
    Idle,
    Requesting,
    Rendered,
    Failed(FailureKind),
}

impl std::fmt::Display for GraphStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GraphStatus::Idle => write!(f, "idle"),
            GraphStatus::Requesting => write!(f, "requesting"),
            GraphStatus::Rendered => write!(f, "rendered"),
            GraphStatus::Failed(kind) => write!(f, "failed ({})", kind),
        }
    }
}

/// Result of `load_current_time`
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimeLoad {
    Loaded(CurrentTime),
    /// The one-time fetch already happened; no request was issued
    AlreadyRequested,
}

/// Result of a graph request that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphOutcome {
    Rendered { token: u64 },
    /// A newer request was issued before this one completed
    Stale { token: u64, latest: u64 },
}

#[derive(Debug)]
struct ViewState {
    current_time: CurrentTime,
    status: GraphStatus,
    in_flight: usize,
}

fn lock_view(state: &Mutex<ViewState>) -> MutexGuard<'_, ViewState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Counts one graph request as outstanding until dropped, including when the caller cancels it
struct InFlight<'a> {
    state: &'a Mutex<ViewState>,
}

impl<'a> InFlight<'a> {
    fn enter(state: &'a Mutex<ViewState>) -> Self {
        let mut view = lock_view(state);
        view.in_flight += 1;
        view.status = GraphStatus::Requesting;
        Self { state }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut view = lock_view(self.state);
        view.in_flight -= 1;
        // Nothing settled the status: the requests were cancelled or only stale responses came back
        if view.in_flight == 0 && view.status == GraphStatus::Requesting {
            view.status = GraphStatus::Idle;
        }
    }
}

pub struct PlotRequestController<T, R, D> {
    time_source: T,
    rpc: R,
    renderer: D,
    surface: RenderSurface,
    ordering: RenderOrdering,
    state: Mutex<ViewState>,
    issued: AtomicU64,
    time_requested: AtomicBool,
}

impl<T, R, D> PlotRequestController<T, R, D>
where
    T: TimeSource,
    R: RpcCaller,
    D: Renderer,
{
    pub fn new(time_source: T, rpc: R, renderer: D, surface: RenderSurface) -> Self {
        Self {
            time_source,
            rpc,
            renderer,
            surface,
            ordering: RenderOrdering::default(),
            state: Mutex::new(ViewState {
                current_time: CurrentTime::default(),
                status: GraphStatus::Idle,
                in_flight: 0,
            }),
            issued: AtomicU64::new(0),
            time_requested: AtomicBool::new(false),
        }
    }

    pub fn with_ordering(mut self, ordering: RenderOrdering) -> Self {
        self.ordering = ordering;
        self
    }

    fn state(&self) -> MutexGuard<'_, ViewState> {
        lock_view(&self.state)
    }

    pub fn current_time(&self) -> CurrentTime {
        self.state().current_time
    }

    pub fn status(&self) -> GraphStatus {
        self.state().status
    }

    /// Graph requests issued but not yet completed
    pub fn in_flight(&self) -> usize {
        self.state().in_flight
    }

    pub fn surface(&self) -> &RenderSurface {
        &self.surface
    }

    /// Fetch the server time once. Later calls are no-ops.
    ///
    /// On failure the previous time is kept and the error is returned.
    pub async fn load_current_time(&self) -> Result<TimeLoad, PlotError> {
        if self.time_requested.swap(true, Ordering::SeqCst) {
            debug!("Current time already requested, skipping");
            return Ok(TimeLoad::AlreadyRequested);
        }

        let raw = self.time_source.fetch_time().await.map_err(|e| {
            warn!("Failed to load current time: {}", e);
            e
        })?;

        let time = CurrentTime::new(raw)
            .ok_or_else(|| PlotError::NetworkFailure(format!("Server time is not a finite number: {}", raw)))?;

        self.state().current_time = time;
        info!("Current time loaded: {}", time);
        Ok(TimeLoad::Loaded(time))
    }

    /// Reset the surface, call `showgraph` and hand the payload to the renderer.
    ///
    /// Overlapping calls are allowed; see [`RenderOrdering`] for which response wins.
    pub async fn request_and_render_graph(&self) -> Result<GraphOutcome, PlotError> {
        let token = self.issued.fetch_add(1, Ordering::SeqCst) + 1;

        self.surface.show_placeholder(PLACEHOLDER_TEXT);
        let _in_flight = InFlight::enter(&self.state);
        debug!(token, "Requesting graph via RPC '{}'", SHOWGRAPH_RPC);

        let result = self.rpc.call(SHOWGRAPH_RPC).await;

        let latest = self.issued.load(Ordering::SeqCst);
        let stale = self.ordering == RenderOrdering::LatestIssued && token != latest;

        if stale {
            match &result {
                Ok(_) => debug!(token, latest, "Discarding stale graph response"),
                Err(e) => debug!(token, latest, "Discarding stale graph failure: {}", e),
            }
            return Ok(GraphOutcome::Stale { token, latest });
        }

        self.apply(token, result)
    }

    fn apply(&self, token: u64, result: Result<GraphPayload, PlotError>) -> Result<GraphOutcome, PlotError> {
        let drawn = result.and_then(|payload| {
            self.surface.clear();
            self.renderer.draw(&self.surface, &payload)
        });

        match drawn {
            Ok(()) => {
                self.state().status = GraphStatus::Rendered;
                info!(token, "Graph rendered");
                Ok(GraphOutcome::Rendered { token })
            }
            Err(e) => {
                self.state().status = GraphStatus::Failed(e.kind());
                warn!(token, "Graph request failed: {}", e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::surface::SurfaceContent;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::time::Duration;
    use tokio::sync::oneshot;

    struct FakeTime {
        replies: Mutex<VecDeque<Result<f64, PlotError>>>,
        calls: AtomicU64,
    }

    impl FakeTime {
        fn new(replies: Vec<Result<f64, PlotError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                calls: AtomicU64::new(0),
            })
        }
    }

    #[async_trait]
    impl TimeSource for FakeTime {
        async fn fetch_time(&self) -> Result<f64, PlotError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(PlotError::NetworkFailure("no reply queued".into())))
        }
    }

    /// Each call waits on the next queued receiver and records what the surface showed
    struct FakeRpc {
        surface: RenderSurface,
        pending: Mutex<VecDeque<oneshot::Receiver<Result<GraphPayload, PlotError>>>>,
        seen: Mutex<Vec<(String, SurfaceContent)>>,
    }

    impl FakeRpc {
        fn new(surface: RenderSurface, count: usize) -> (Arc<Self>, Vec<oneshot::Sender<Result<GraphPayload, PlotError>>>) {
            let (senders, receivers): (Vec<_>, VecDeque<_>) = (0..count).map(|_| oneshot::channel()).unzip();
            let rpc = Arc::new(Self {
                surface,
                pending: Mutex::new(receivers),
                seen: Mutex::new(Vec::new()),
            });
            (rpc, senders)
        }
    }

    #[async_trait]
    impl RpcCaller for FakeRpc {
        async fn call(&self, name: &str) -> Result<GraphPayload, PlotError> {
            self.seen.lock().unwrap().push((name.to_string(), self.surface.content()));
            let rx = self.pending.lock().unwrap().pop_front().expect("unexpected rpc call");
            rx.await.unwrap_or_else(|_| Err(PlotError::RpcFailure("sender dropped".into())))
        }
    }

    #[derive(Default)]
    struct FakeRenderer {
        draws: Mutex<Vec<GraphPayload>>,
    }

    impl FakeRenderer {
        fn draw_count(&self) -> usize {
            self.draws.lock().unwrap().len()
        }
    }

    impl Renderer for FakeRenderer {
        fn draw(&self, target: &RenderSurface, payload: &GraphPayload) -> Result<(), PlotError> {
            self.draws.lock().unwrap().push(payload.clone());
            target.set_svg(payload.as_value().to_string());
            Ok(())
        }
    }

    struct FailingRenderer;

    impl Renderer for FailingRenderer {
        fn draw(&self, _target: &RenderSurface, _payload: &GraphPayload) -> Result<(), PlotError> {
            Err(PlotError::RenderFailure("cannot draw".into()))
        }
    }

    fn payload(id: u64) -> GraphPayload {
        GraphPayload::new(json!({ "id": id }))
    }

    #[tokio::test]
    async fn test_time_starts_at_zero_and_loads_once() {
        let time = FakeTime::new(vec![Ok(42.0), Ok(99.0)]);
        let surface = RenderSurface::new();
        let (rpc, _senders) = FakeRpc::new(surface.clone(), 0);
        let controller = PlotRequestController::new(time.clone(), rpc, FakeRenderer::default(), surface);

        assert_eq!(controller.current_time(), CurrentTime::default());
        let loaded = controller.load_current_time().await.unwrap();
        assert_eq!(loaded, TimeLoad::Loaded(CurrentTime::new(42.0).unwrap()));
        assert_eq!(controller.current_time().to_string(), "42");

        assert_eq!(controller.load_current_time().await.unwrap(), TimeLoad::AlreadyRequested);
        assert_eq!(controller.current_time().to_string(), "42");
        assert_eq!(time.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_time_keeps_previous_value() {
        let time = FakeTime::new(vec![Err(PlotError::NetworkFailure("down".into()))]);
        let surface = RenderSurface::new();
        let (rpc, _senders) = FakeRpc::new(surface.clone(), 0);
        let controller = PlotRequestController::new(time, rpc, FakeRenderer::default(), surface);

        let err = controller.load_current_time().await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::Network);
        assert_eq!(controller.current_time(), CurrentTime::default());
    }

    #[tokio::test]
    async fn test_non_finite_time_is_rejected() {
        let time = FakeTime::new(vec![Ok(f64::NAN)]);
        let surface = RenderSurface::new();
        let (rpc, _senders) = FakeRpc::new(surface.clone(), 0);
        let controller = PlotRequestController::new(time, rpc, FakeRenderer::default(), surface);

        assert!(controller.load_current_time().await.is_err());
        assert_eq!(controller.current_time(), CurrentTime::default());
    }

    #[tokio::test]
    async fn test_surface_reset_before_rpc_and_render_once() {
        let surface = RenderSurface::new();
        surface.set_svg("<svg>old</svg>".to_string());
        let (rpc, mut senders) = FakeRpc::new(surface.clone(), 1);
        let renderer = Arc::new(FakeRenderer::default());
        let controller = PlotRequestController::new(FakeTime::new(vec![]), rpc.clone(), renderer.clone(), surface.clone());

        senders.remove(0).send(Ok(payload(7))).unwrap();
        let outcome = controller.request_and_render_graph().await.unwrap();

        assert_eq!(outcome, GraphOutcome::Rendered { token: 1 });
        let seen = rpc.seen.lock().unwrap().clone();
        assert_eq!(seen, vec![(SHOWGRAPH_RPC.to_string(), SurfaceContent::Placeholder(PLACEHOLDER_TEXT.to_string()))]);
        assert_eq!(*renderer.draws.lock().unwrap(), vec![payload(7)]);
        assert_eq!(controller.status(), GraphStatus::Rendered);
        assert_eq!(controller.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_rejected_rpc_does_not_render() {
        let surface = RenderSurface::new();
        let (rpc, mut senders) = FakeRpc::new(surface.clone(), 1);
        let renderer = Arc::new(FakeRenderer::default());
        let controller = PlotRequestController::new(FakeTime::new(vec![]), rpc, renderer.clone(), surface.clone());

        senders.remove(0).send(Err(PlotError::RpcFailure("boom".into()))).unwrap();
        let err = controller.request_and_render_graph().await.unwrap_err();

        assert_eq!(err, PlotError::RpcFailure("boom".into()));
        assert_eq!(renderer.draw_count(), 0);
        assert_eq!(controller.status(), GraphStatus::Failed(FailureKind::Rpc));
        assert_eq!(surface.content(), SurfaceContent::Placeholder(PLACEHOLDER_TEXT.to_string()));
    }

    #[tokio::test]
    async fn test_render_failure_is_reported() {
        let surface = RenderSurface::new();
        let (rpc, mut senders) = FakeRpc::new(surface.clone(), 1);
        let controller = PlotRequestController::new(FakeTime::new(vec![]), rpc, FailingRenderer, surface);

        senders.remove(0).send(Ok(payload(1))).unwrap();
        let err = controller.request_and_render_graph().await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::Render);
        assert_eq!(controller.status(), GraphStatus::Failed(FailureKind::Render));
    }

    #[tokio::test]
    async fn test_cancelled_request_is_not_left_in_flight() {
        let surface = RenderSurface::new();
        let (rpc, _senders) = FakeRpc::new(surface.clone(), 1);
        let controller = PlotRequestController::new(FakeTime::new(vec![]), rpc, FakeRenderer::default(), surface);

        let timed_out = tokio::time::timeout(Duration::from_millis(20), controller.request_and_render_graph()).await;
        assert!(timed_out.is_err());
        assert_eq!(controller.in_flight(), 0);
        assert_eq!(controller.status(), GraphStatus::Idle);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(GraphStatus::Rendered.to_string(), "rendered");
        assert_eq!(GraphStatus::Failed(FailureKind::Rpc).to_string(), "failed (rpc)");
    }

    type TestController = PlotRequestController<Arc<FakeTime>, Arc<FakeRpc>, Arc<FakeRenderer>>;

    struct Race {
        controller: TestController,
        renderer: Arc<FakeRenderer>,
        first: Result<GraphOutcome, PlotError>,
        second: Result<GraphOutcome, PlotError>,
    }

    /// Issue two requests, resolve the second with `payload(2)`, then the first with `first_reply`.
    async fn race(ordering: RenderOrdering, first_reply: Result<GraphPayload, PlotError>) -> Race {
        let surface = RenderSurface::new();
        let (rpc, senders) = FakeRpc::new(surface.clone(), 2);
        let renderer = Arc::new(FakeRenderer::default());
        let controller = PlotRequestController::new(FakeTime::new(vec![]), rpc, renderer.clone(), surface)
            .with_ordering(ordering);

        let mut senders = senders.into_iter();
        let first_tx = senders.next().unwrap();
        let second_tx = senders.next().unwrap();

        let driver = async {
            while controller.in_flight() < 2 {
                tokio::task::yield_now().await;
            }
            second_tx.send(Ok(payload(2))).unwrap();
            while controller.in_flight() > 1 {
                tokio::task::yield_now().await;
            }
            first_tx.send(first_reply).unwrap();
        };

        let (first, second, ()) = tokio::join!(
            controller.request_and_render_graph(),
            controller.request_and_render_graph(),
            driver,
        );
        Race { controller, renderer, first, second }
    }

    #[tokio::test]
    async fn test_latest_issued_discards_stale_response() {
        let race = race(RenderOrdering::LatestIssued, Ok(payload(1))).await;

        assert_eq!(race.first, Ok(GraphOutcome::Stale { token: 1, latest: 2 }));
        assert_eq!(race.second, Ok(GraphOutcome::Rendered { token: 2 }));
        assert_eq!(*race.renderer.draws.lock().unwrap(), vec![payload(2)]);
        assert_eq!(race.controller.surface().content(), SurfaceContent::Svg(payload(2).as_value().to_string()));
        assert_eq!(race.controller.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_stale_failure_keeps_newer_status() {
        let race = race(RenderOrdering::LatestIssued, Err(PlotError::RpcFailure("late".into()))).await;

        assert_eq!(race.first, Ok(GraphOutcome::Stale { token: 1, latest: 2 }));
        assert_eq!(race.second, Ok(GraphOutcome::Rendered { token: 2 }));
        assert_eq!(race.controller.status(), GraphStatus::Rendered);
        assert_eq!(*race.renderer.draws.lock().unwrap(), vec![payload(2)]);
        assert_eq!(race.controller.surface().content(), SurfaceContent::Svg(payload(2).as_value().to_string()));
    }

    #[tokio::test]
    async fn test_last_resolved_lets_late_response_win() {
        let race = race(RenderOrdering::LastResolved, Ok(payload(1))).await;

        assert_eq!(race.first, Ok(GraphOutcome::Rendered { token: 1 }));
        assert_eq!(race.second, Ok(GraphOutcome::Rendered { token: 2 }));
        assert_eq!(*race.renderer.draws.lock().unwrap(), vec![payload(2), payload(1)]);
        assert_eq!(race.controller.surface().content(), SurfaceContent::Svg(payload(1).as_value().to_string()));
    }
}
