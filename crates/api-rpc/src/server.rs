//! JSON-RPC Server
//!
//! JSON-RPC 2.0 over TCP, bound to localhost by default.

use crate::handler::RpcHandler;
use crate::types::{JobRequest, StatusRequest, SubmitRequest};
use groupq_core::application::DispatchService;
use groupq_core::error::{AppError, Result};
use groupq_core::port::TimeProvider;
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::types::ErrorObjectOwned;
use jsonrpsee::RpcModule;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

pub const DEFAULT_RPC_HOST: &str = "127.0.0.1";
pub const DEFAULT_RPC_PORT: u16 = 9630;

/// RPC Server Configuration
#[derive(Debug, Clone)]
pub struct RpcServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for RpcServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_RPC_HOST.to_string(),
            port: DEFAULT_RPC_PORT,
        }
    }
}

/// RPC Server
pub struct RpcServer {
    config: RpcServerConfig,
    handler: Arc<RpcHandler>,
}

impl RpcServer {
    pub fn new(
        config: RpcServerConfig,
        dispatch: Arc<DispatchService>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            config,
            handler: Arc::new(RpcHandler::new(dispatch, time_provider)),
        }
    }

    /// Bind and start serving; returns the bound address (port 0 picks a free one)
    pub async fn start(self) -> Result<(SocketAddr, ServerHandle)> {
        let addr = format!("{}:{}", self.config.host, self.config.port);

        let server = Server::builder().build(&addr).await.map_err(|e| {
            AppError::Internal(format!("Failed to build RPC server on {}: {}", addr, e))
        })?;
        let local_addr = server.local_addr()?;

        let mut module = RpcModule::new(());

        let handler = self.handler.clone();
        module
            .register_async_method("queue.submit.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: SubmitRequest = params.parse()?;
                    handler.submit(req).await
                }
            })
            .map_err(register_error)?;

        let handler = self.handler.clone();
        module
            .register_async_method("queue.status.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: StatusRequest = params.parse()?;
                    handler.status(req).await
                }
            })
            .map_err(register_error)?;

        let handler = self.handler.clone();
        module
            .register_async_method("queue.status_all.v1", move |_, _, _| {
                let handler = handler.clone();
                async move { handler.status_all().await }
            })
            .map_err(register_error)?;

        let handler = self.handler.clone();
        module
            .register_method("queue.handlers.v1", move |_, _, _| {
                Ok::<_, ErrorObjectOwned>(handler.handlers())
            })
            .map_err(register_error)?;

        let handler = self.handler.clone();
        module
            .register_async_method("queue.job.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: JobRequest = params.parse()?;
                    handler.job(req).await
                }
            })
            .map_err(register_error)?;

        let handle = server.start(module);

        info!(addr = %local_addr, "JSON-RPC server started");

        Ok((local_addr, handle))
    }
}

fn register_error(e: impl std::fmt::Display) -> AppError {
    AppError::Internal(format!("RPC method registration failed: {}", e))
}
