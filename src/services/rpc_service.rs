use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::LoggingMode;

/// Registry and dispatch errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RpcError {
    #[error("Invalid RPC - must be a string ({0})")]
    InvalidName(String),
    #[error("Could not find requested RPC \"{0}\"")]
    NotFound(String),
    #[error("RPC \"{0}\" is disabled")]
    Disabled(String),
    #[error("Attempt to override previous version of {0}")]
    Duplicate(String),
    /// The handler declined the call; reported to the caller as `{"error": ..}`
    #[error("{0}")]
    Rejected(String),
    /// The handler failed; reported to the caller as a 500 exception
    #[error("{0}")]
    Failed(String),
}

/// Who may call an RPC. Without user accounts the only restriction is switching an RPC off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Validation {
    #[default]
    None,
    /// Calls are answered with 403
    Disabled,
}

/// Arguments of a single call
#[derive(Debug, Clone, Default)]
pub struct RpcArgs {
    pub args: Vec<Value>,
    pub kwargs: Map<String, Value>,
}

impl RpcArgs {
    /// Look up a parameter by keyword, falling back to its positional slot
    pub fn get(&self, name: &str, position: usize) -> Option<&Value> {
        self.kwargs.get(name).or_else(|| self.args.get(position))
    }
}

pub type RpcHandler = Arc<dyn Fn(&RpcArgs) -> Result<Option<Value>, RpcError> + Send + Sync>;

/// A named remote procedure
#[derive(Clone)]
pub struct Rpc {
    pub name: String,
    pub validation: Validation,
    pub override_existing: bool,
    handler: RpcHandler,
}

impl fmt::Debug for Rpc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rpc")
            .field("name", &self.name)
            .field("validation", &self.validation)
            .field("override_existing", &self.override_existing)
            .finish_non_exhaustive()
    }
}

impl Rpc {
    pub fn new<F>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&RpcArgs) -> Result<Option<Value>, RpcError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            validation: Validation::None,
            override_existing: false,
            handler: Arc::new(handler),
        }
    }

    pub fn with_validation(mut self, validation: Validation) -> Self {
        self.validation = validation;
        self
    }

    pub fn overriding(mut self) -> Self {
        self.override_existing = true;
        self
    }
}

/// What the dispatcher tells the HTTP layer to send back
#[derive(Debug, Clone, PartialEq)]
pub enum RpcReply {
    /// 200 with the handler's JSON result
    Json(Value),
    /// 200 with an empty body; the handler returned nothing
    Empty,
    /// 200 with `{"error": ..}`
    Error(String),
    /// 500 with `{"exception": ..}`
    Exception(String),
    /// 403
    Forbidden,
}

#[derive(Debug, Default, Clone)]
pub struct RpcRegistry {
    rpcs: HashMap<String, Rpc>,
}

impl RpcRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an RPC. An existing name is only replaced when the new RPC is marked as overriding.
    pub fn register(&mut self, rpc: Rpc) -> Result<(), RpcError> {
        if self.rpcs.contains_key(&rpc.name) {
            if !rpc.override_existing {
                error!("Attempt to override previous version of RPC '{}'", rpc.name);
                return Err(RpcError::Duplicate(rpc.name));
            }
            warn!("Overriding previous version of RPC '{}'", rpc.name);
        }
        debug!("Registered RPC '{}' ({:?})", rpc.name, rpc.validation);
        self.rpcs.insert(rpc.name.clone(), rpc);
        Ok(())
    }

    /// Register many RPCs, stopping at the first rejected one
    pub fn register_all(&mut self, rpcs: impl IntoIterator<Item = Rpc>) -> Result<(), RpcError> {
        rpcs.into_iter().try_for_each(|rpc| self.register(rpc))
    }

    pub fn get(&self, name: &str) -> Option<&Rpc> {
        self.rpcs.get(name)
    }

    pub fn len(&self) -> usize {
        self.rpcs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rpcs.is_empty()
    }

    /// Switch off a registered RPC; later calls get a 403
    pub fn disable(&mut self, name: &str) -> Result<(), RpcError> {
        let rpc = self.get(name).cloned().ok_or_else(|| RpcError::NotFound(name.to_string()))?;
        self.register(rpc.with_validation(Validation::Disabled).overriding())
    }

    /// Resolve a request body `{funcname, args, kwargs}` to a registered RPC and its arguments
    fn resolve(&self, body: &Value) -> Result<(Rpc, RpcArgs), RpcError> {
        let name = match body.get("funcname") {
            Some(Value::String(name)) => name,
            Some(other) => return Err(RpcError::InvalidName(other.to_string())),
            None => return Err(RpcError::InvalidName("None".to_string())),
        };

        let rpc = self.get(name).ok_or_else(|| RpcError::NotFound(name.clone()))?;

        // User accounts are not supported, so only the disabled level is enforced
        if rpc.validation == Validation::Disabled {
            return Err(RpcError::Disabled(name.clone()));
        }

        let args = match body.get("args") {
            Some(Value::Array(args)) => args.clone(),
            _ => Vec::new(),
        };
        let kwargs = match body.get("kwargs") {
            Some(Value::Object(kwargs)) => kwargs.clone(),
            _ => Map::new(),
        };

        Ok((rpc.clone(), RpcArgs { args, kwargs }))
    }

    /// Run the RPC named in `body` on the blocking pool and build the reply
    pub async fn dispatch(&self, body: &Value, logging_mode: LoggingMode) -> RpcReply {
        let (rpc, args) = match self.resolve(body) {
            Ok(found) => found,
            Err(RpcError::Disabled(name)) => {
                debug!("RPC '{}' is disabled", name);
                return RpcReply::Forbidden;
            }
            Err(e) => return RpcReply::Error(e.to_string()),
        };

        let call_id = Uuid::new_v4();
        let verbose = logging_mode == LoggingMode::Full;
        if verbose {
            info!(%call_id, "RPC called: \"{}\"", rpc.name);
        }

        let started = Instant::now();
        let handler = Arc::clone(&rpc.handler);
        let joined = tokio::task::spawn_blocking(move || (handler.as_ref())(&args)).await;

        let result = match joined {
            Ok(result) => result,
            Err(e) => Err(RpcError::Failed(format!("RPC handler panicked: {}", e))),
        };

        match result {
            Ok(Some(value)) => {
                // A handler may report failure by returning an object with an `error` key
                if let Some(error) = value.get("error") {
                    let msg = match error {
                        Value::String(msg) => msg.clone(),
                        other => other.to_string(),
                    };
                    warn!(%call_id, "RPC \"{}\" returned an error: {}", rpc.name, msg);
                    return RpcReply::Error(msg);
                }
                if verbose {
                    info!(%call_id, "RPC finished in {:.2} s: \"{}\"", started.elapsed().as_secs_f64(), rpc.name);
                }
                RpcReply::Json(value)
            }
            Ok(None) => {
                if verbose {
                    info!(%call_id, "RPC finished in {:.2} s, returning nothing: \"{}\"", started.elapsed().as_secs_f64(), rpc.name);
                }
                RpcReply::Empty
            }
            Err(RpcError::Rejected(msg)) => {
                warn!(%call_id, "RPC \"{}\" rejected the call: {}", rpc.name, msg);
                RpcReply::Error(msg)
            }
            Err(e) => {
                let details = format!(
                    "[{}] <{}> Exception during RPC \"{}\"\nRequest: {}",
                    chrono::Utc::now().format("%Y-%m-%d %H:%M:%S"),
                    call_id,
                    rpc.name,
                    body
                );
                error!(%call_id, "{}\n{}", e, details);
                RpcReply::Exception(format!("{}\n\nException details:\n{}", e, details))
            }
        }
    }
}
