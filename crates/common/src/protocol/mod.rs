pub mod api;
pub mod jsonrpc;
pub mod rpc_methods;
pub mod wire;
