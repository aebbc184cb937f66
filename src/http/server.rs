//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the COPY / OPTIONS handler on every path
//! - Wire up middleware (request ID, tracing, body limit)
//! - Bind server to a plain or TLS listener
//! - Run COPY requests on the blocking pool
//! - Apply hot-reloaded transfer settings
//! - Stop on the shutdown broadcast

use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use arc_swap::ArcSwap;
use axum_server::tls_rustls::RustlsConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::config::validation::validate_transfer;
use crate::config::{TpcConfig, TransferConfig};
use crate::http::request::{copy_request, propagate_request_id_layer, request_id, set_request_id_layer};
use crate::http::response::{method_not_allowed, options_response};
use crate::tpc::{CopyService, LocalResponse};

/// COPY and OPTIONS carry no payload worth reading.
const MAX_REQUEST_BODY: usize = 64 * 1024;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<CopyService>,
}

/// HTTP front end of the copy service.
pub struct HttpServer {
    router: Router,
    config: TpcConfig,
    transfer: Arc<ArcSwap<TransferConfig>>,
}

impl HttpServer {
    /// Create a server around `service`; `transfer` is the snapshot the service reads.
    pub fn new(config: TpcConfig, service: CopyService, transfer: Arc<ArcSwap<TransferConfig>>) -> Self {
        let state = AppState {
            service: Arc::new(service),
        };
        let router = Self::build_router(state);
        Self {
            router,
            config,
            transfer,
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(tpc_handler))
            .route("/", any(tpc_handler))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(set_request_id_layer())
                    .layer(TraceLayer::new_for_http())
                    .layer(propagate_request_id_layer())
                    .layer(RequestBodyLimitLayer::new(MAX_REQUEST_BODY)),
            )
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        config_updates: mpsc::UnboundedReceiver<TransferConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        tokio::spawn(apply_updates(
            Arc::clone(&self.transfer),
            config_updates,
            shutdown.resubscribe(),
        ));

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Run the server over TLS on `addr`.
    pub async fn run_tls(
        self,
        addr: SocketAddr,
        tls: RustlsConfig,
        config_updates: mpsc::UnboundedReceiver<TransferConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        tracing::info!(address = %addr, "HTTPS server starting");

        tokio::spawn(apply_updates(
            Arc::clone(&self.transfer),
            config_updates,
            shutdown.resubscribe(),
        ));

        let handle = axum_server::Handle::new();
        let stopper = handle.clone();
        tokio::spawn(async move {
            let _ = shutdown.recv().await;
            tracing::info!("Shutdown signal received");
            stopper.graceful_shutdown(None);
        });

        axum_server::bind_rustls(addr, tls)
            .handle(handle)
            .serve(self.router.into_make_service())
            .await?;

        tracing::info!("HTTPS server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &TpcConfig {
        &self.config
    }
}

/// Swap in reloaded transfer settings until shutdown or the sender goes away.
async fn apply_updates(
    transfer: Arc<ArcSwap<TransferConfig>>,
    mut updates: mpsc::UnboundedReceiver<TransferConfig>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            update = updates.recv() => {
                let Some(update) = update else { break };
                let errors = validate_transfer(&update);
                if !errors.is_empty() {
                    for error in errors {
                        tracing::error!(%error, "Rejected transfer settings");
                    }
                    continue;
                }
                tracing::info!(
                    stall_retries = update.stall_retries,
                    max_redirects = update.max_redirects,
                    dest_https = update.dest_https,
                    "Transfer settings reloaded"
                );
                transfer.store(Arc::new(update));
            }
            _ = shutdown.recv() => break,
        }
    }
}

/// COPY runs a transfer, OPTIONS advertises capabilities, everything else is refused.
async fn tpc_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let request_id = request_id(&request);
    let method = request.method().clone();

    match method.as_str() {
        "COPY" => {
            let copy = copy_request(request.uri().path(), request.headers(), request_id.clone());
            let service = Arc::clone(&state.service);
            match tokio::task::spawn_blocking(move || service.process(&copy)).await {
                Ok(response) => response.into_response(),
                Err(e) => {
                    tracing::error!(request_id = %request_id, error = %e, "Transfer task failed");
                    LocalResponse::new(500, "Unknown internal transfer failure").into_response()
                }
            }
        }
        "OPTIONS" => options_response(),
        _ => {
            tracing::debug!(request_id = %request_id, method = %method, "Unsupported method");
            method_not_allowed()
        }
    }
}
