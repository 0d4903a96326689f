use jsonrpsee::server::{ServerBuilder, ServerHandle};
use tower_http::validate_request::ValidateRequestHeaderLayer;

use super::handlers::{TesseraRpcImpl, TesseraRpcServer};
use crate::error::NodeError;

/// Start the JSON-RPC HTTP server. When an auth token is configured, every
/// request must carry `Authorization: Bearer <token>`; the check runs as
/// HTTP middleware before the JSON-RPC layer.
pub async fn start_rpc_server(
    addr: &str,
    rpc: TesseraRpcImpl,
    auth_token: Option<String>,
) -> Result<ServerHandle, NodeError> {
    let middleware = tower::ServiceBuilder::new()
        .option_layer(auth_token.map(|token| ValidateRequestHeaderLayer::bearer(&token)));

    let server = ServerBuilder::default()
        .set_http_middleware(middleware)
        .build(addr)
        .await
        .map_err(|e| NodeError::Rpc {
            reason: format!("failed to build RPC server on {}: {}", addr, e),
        })?;

    let handle = server.start(rpc.into_rpc());
    tracing::info!(addr = %addr, "RPC server started");
    Ok(handle)
}
