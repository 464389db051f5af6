use thiserror::Error;

use crate::rpc::external::server::ServerKind;
use crate::rpc::utils::cors::CorsOriginError;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("{0} failed to start: {1}")]
    Bind(ServerKind, #[source] std::io::Error),

    #[error(transparent)]
    Cors(#[from] CorsOriginError),

    #[error("failed to register RPC method: {0}")]
    Register(#[from] jsonrpsee::core::RegisterMethodError),

    #[error("{0}")]
    Custom(String),
}
