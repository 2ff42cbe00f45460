//! Transport layer
//!
//! Delivers one request to one provider and returns the correlated
//! response, over either a line-delimited stdio channel or HTTP.

mod envelope;
mod error;
mod http;
mod pending;
mod stdio;

use async_trait::async_trait;
use serde_json::Value;

pub use envelope::{effective_method, encode_request, RpcRequest, RpcResponse, DEFAULT_LIST_METHOD};
pub use error::{TransportError, TransportResult};
pub use http::{HttpChannel, RetryPolicy};
pub use pending::PendingTable;
pub use stdio::StdioChannel;

/// Something that answers JSON-RPC requests
///
/// Implemented by [`StdioChannel`]; discovery probes and stdio tool
/// invocation are written against this trait so they can be tested with
/// scripted peers.
#[async_trait]
pub trait RpcPeer: Send + Sync {
    /// Name of the provider on the other end
    fn server(&self) -> &str;

    /// Send one request and wait for its response
    async fn request(&self, method: &str, params: Value) -> TransportResult<Value>;
}
