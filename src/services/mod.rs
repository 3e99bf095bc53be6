pub mod graph_service;
pub mod rpc_service;
pub mod time_service;
