//! # fib-server
//!
//! Axum gateway for the federated identity bridge.
//!
//! - SAML endpoints per identity provider under `/auth/{provider}/…`
//! - Citizen and employee integrations backed by the identity service
//! - An optional form login for development
//!
//! ## Usage
//!
//! ```ignore
//! use fib_server::{Server, ServerConfig};
//!
//! let config = ServerConfig::from_env()?;
//! Server::new(config)?.run().await?;
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod config;
pub mod cookie;
pub mod dev_login;
pub mod identity_service;
pub mod integrations;
pub mod login;
pub mod router;
pub mod saml_handlers;
pub mod state;

pub use config::ServerConfig;
pub use router::create_router;
pub use state::AppState;

use std::future::Future;
use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;

/// The gateway server.
pub struct Server {
    state: AppState,
}

impl Server {
    /// Creates a server, resolving every provider's trust.
    ///
    /// # Errors
    ///
    /// Returns an error if a certificate or key cannot be resolved.
    pub fn new(config: ServerConfig) -> anyhow::Result<Self> {
        let state = AppState::from_config(config)?;
        Ok(Self { state })
    }

    /// Creates a server over an already wired state.
    #[must_use]
    pub const fn from_state(state: AppState) -> Self {
        Self { state }
    }

    /// Serves until a shutdown signal arrives.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn run(self) -> anyhow::Result<()> {
        let config = self.state.config();
        let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener, shutdown_signal()).await
    }

    /// Serves on `listener` until `shutdown` completes.
    ///
    /// # Errors
    ///
    /// Returns an error if serving fails.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tracing::info!(
            addr = %listener.local_addr()?,
            base_url = %self.state.config().base_url,
            "server listening"
        );

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("server shutdown complete");
        Ok(())
    }

    /// The router without a listener, for tests.
    #[must_use]
    pub fn router(&self) -> Router {
        create_router(self.state.clone())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "cannot listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
