pub mod auction;

use std::net::SocketAddr;

use jsonrpsee::{
    core::server::Methods,
    server::{Server, ServerBuilder, ServerHandle},
};
use tower::{
    layer::util::{Identity, Stack},
    ServiceBuilder,
};
use tower_http::cors::CorsLayer;

use crate::rpc::{errors::RpcError, utils::create_cors_layer};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ServerKind {
    Http(SocketAddr),
    Ws(SocketAddr),
}

impl std::fmt::Display for ServerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerKind::Http(addr) => write!(f, "{} (HTTP-RPC server)", addr),
            ServerKind::Ws(addr) => write!(f, "{} (WS-RPC server)", addr),
        }
    }
}

/// A server built either with or without CORS middleware. The middleware
/// changes the server's type, hence the two variants.
enum ServerVariant {
    Plain(Server),
    WithCors(Server<Stack<CorsLayer, Identity>>),
}

impl ServerVariant {
    async fn build(
        builder: ServerBuilder<Identity, Identity>,
        socket_addr: SocketAddr,
        cors_origins: Option<&str>,
        server_kind: ServerKind,
    ) -> Result<Self, RpcError> {
        match cors_origins {
            Some(origins) => {
                let cors = create_cors_layer(origins)?;
                let server = builder
                    .set_http_middleware(ServiceBuilder::new().layer(cors))
                    .build(socket_addr)
                    .await
                    .map_err(|err| RpcError::Bind(server_kind, err))?;
                Ok(ServerVariant::WithCors(server))
            }
            None => {
                let server = builder
                    .build(socket_addr)
                    .await
                    .map_err(|err| RpcError::Bind(server_kind, err))?;
                Ok(ServerVariant::Plain(server))
            }
        }
    }

    fn local_addr(&self) -> Result<SocketAddr, RpcError> {
        match self {
            ServerVariant::Plain(server) => server.local_addr(),
            ServerVariant::WithCors(server) => server.local_addr(),
        }
        .map_err(|e| RpcError::Custom(e.to_string()))
    }

    fn start(self, methods: Methods) -> ServerHandle {
        match self {
            ServerVariant::Plain(server) => server.start(methods),
            ServerVariant::WithCors(server) => server.start(methods),
        }
    }
}

/// Builder for the JSON-RPC surface: one HTTP server and one WS server,
/// optionally behind CORS.
#[derive(Default)]
pub struct RpcServerConfig {
    http_addr: Option<SocketAddr>,
    ws_addr: Option<SocketAddr>,
    cors_origins: Option<String>,
}

impl RpcServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_http_addr(mut self, addr: SocketAddr) -> Self {
        self.http_addr = Some(addr);
        self
    }

    pub fn with_ws_addr(mut self, addr: SocketAddr) -> Self {
        self.ws_addr = Some(addr);
        self
    }

    /// Allowed CORS origins: `*`, or a comma-separated list of origins.
    pub fn with_cors_origins(mut self, origins: impl Into<String>) -> Self {
        self.cors_origins = Some(origins.into());
        self
    }

    pub async fn build(self) -> Result<RpcServer, RpcError> {
        let http_addr = self
            .http_addr
            .ok_or_else(|| RpcError::Custom("HTTP address not set in configuration".to_string()))?;
        let ws_addr = self
            .ws_addr
            .ok_or_else(|| RpcError::Custom("WS address not set in configuration".to_string()))?;

        let http_server = ServerVariant::build(
            ServerBuilder::default().http_only(),
            http_addr,
            self.cors_origins.as_deref(),
            ServerKind::Http(http_addr),
        )
        .await?;
        let ws_server = ServerVariant::build(
            ServerBuilder::default().ws_only(),
            ws_addr,
            self.cors_origins.as_deref(),
            ServerKind::Ws(ws_addr),
        )
        .await?;

        Ok(RpcServer {
            http_server,
            ws_server,
        })
    }
}

pub struct RpcServer {
    http_server: ServerVariant,
    ws_server: ServerVariant,
}

impl RpcServer {
    pub fn http_addr(&self) -> Result<SocketAddr, RpcError> {
        self.http_server.local_addr()
    }

    pub fn ws_addr(&self) -> Result<SocketAddr, RpcError> {
        self.ws_server.local_addr()
    }

    /// Starts both servers with the provided methods and returns a handle
    /// for stopping them.
    pub async fn start(self, methods: impl Into<Methods>) -> Result<RpcServerHandle, RpcError> {
        let methods = methods.into();
        let http_handle = self.http_server.start(methods.clone());
        let ws_handle = self.ws_server.start(methods);
        Ok(RpcServerHandle {
            http: Some(http_handle),
            ws: Some(ws_handle),
        })
    }
}

pub struct RpcServerHandle {
    pub http: Option<ServerHandle>,
    pub ws: Option<ServerHandle>,
}

impl RpcServerHandle {
    /// Stops both the HTTP and WS servers.
    pub fn stop(&self) -> Result<(), RpcError> {
        if let Some(handle) = &self.http {
            handle.stop().map_err(|e| RpcError::Custom(e.to_string()))?;
        }
        if let Some(handle) = &self.ws {
            handle.stop().map_err(|e| RpcError::Custom(e.to_string()))?;
        }
        Ok(())
    }
}

impl Drop for RpcServerHandle {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
