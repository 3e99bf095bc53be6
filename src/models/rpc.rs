//! RPC wire models

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Body of `POST /api/rpcs`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    pub funcname: String,
    #[serde(default)]
    pub args: Vec<Value>,
    #[serde(default)]
    pub kwargs: Map<String, Value>,
}

impl RpcRequest {
    pub fn new(funcname: impl Into<String>) -> Self {
        Self {
            funcname: funcname.into(),
            args: Vec::new(),
            kwargs: Map::new(),
        }
    }
}

/// Error body returned with status 200 when a call could not be served
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcErrorReply {
    pub error: String,
}

/// Body returned with status 500 when the handler itself failed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcExceptionReply {
    pub exception: String,
}
