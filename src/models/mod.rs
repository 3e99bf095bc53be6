//! Data models shared by the server, the API client and the controller

pub mod graph;
pub mod rpc;
pub mod time;

pub use graph::{Figure, GraphPayload, ScatterPoint};
pub use rpc::{RpcErrorReply, RpcExceptionReply, RpcRequest};
pub use time::{CurrentTime, TimeResponse};
