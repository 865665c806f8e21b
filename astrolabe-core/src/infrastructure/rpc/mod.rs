pub mod types;

pub use types::{Inbound, RpcError, RpcNotification, RpcRequest, RpcResponse};
