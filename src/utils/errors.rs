use thiserror::Error;

/// Failures surfaced by the plot controller. Each maps to a visible view state.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PlotError {
    /// Time endpoint unreachable, non-OK or returned an unusable body
    #[error("Network failure: {0}")]
    NetworkFailure(String),
    /// The `showgraph` call was rejected
    #[error("RPC failure: {0}")]
    RpcFailure(String),
    /// The renderer could not draw the payload
    #[error("Render failure: {0}")]
    RenderFailure(String),
}

/// Coarse failure category kept in the view state after a failed graph request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Network,
    Rpc,
    Render,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::Network => write!(f, "network"),
            FailureKind::Rpc => write!(f, "rpc"),
            FailureKind::Render => write!(f, "render"),
        }
    }
}

impl PlotError {
    pub fn kind(&self) -> FailureKind {
        match self {
            PlotError::NetworkFailure(_) => FailureKind::Network,
            PlotError::RpcFailure(_) => FailureKind::Rpc,
            PlotError::RenderFailure(_) => FailureKind::Render,
        }
    }
}

/// Extract clean error message from server exception replies
///
/// Drops the traceback the server appends after the first blank line:
/// "division by zero\n\nException details:\n..."
///
/// Returns only the meaningful error message:
/// "division by zero"
pub fn extract_clean_error(error_msg: &str) -> String {
    if let Some(idx) = error_msg.find("\n\nException details:") {
        error_msg[..idx].trim().to_string()
    } else {
        error_msg.trim().to_string()
    }
}
