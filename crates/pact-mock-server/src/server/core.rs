//! Core MockServer struct: one bound listener serving one contract.

use super::handler::handle_request;
use super::types::{
    MatchOutcome, MetricsSnapshot, MismatchReport, MockServerMetrics, RecordedInteraction,
    ServerState,
};
use crate::config::MockServerConfig;
use crate::error::MockServerError;
use crate::model::{Contract, Request};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

/// Runtime state of a mock server
pub struct MockServer {
    contract: Contract,
    config: MockServerConfig,
    address: SocketAddr,
    state: RwLock<ServerState>,
    /// Received requests in arrival order
    recorded: RwLock<Vec<RecordedInteraction>>,
    metrics: MockServerMetrics,
    shutdown_tx: broadcast::Sender<()>,
}

impl MockServer {
    /// Bind `addr` and start serving `contract`.
    ///
    /// Returns the server and the task running its accept loop; the task
    /// completes once the server has shut down and drained its connections.
    pub async fn start(
        contract: Contract,
        addr: SocketAddr,
        config: MockServerConfig,
    ) -> Result<(Arc<MockServer>, JoinHandle<()>), MockServerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| MockServerError::Bind(addr, e.to_string()))?;
        MockServer::from_listener(listener, contract, config)
    }

    /// Start serving on an already bound listener. Must be called from within
    /// a tokio runtime.
    pub fn from_listener(
        listener: TcpListener,
        contract: Contract,
        config: MockServerConfig,
    ) -> Result<(Arc<MockServer>, JoinHandle<()>), MockServerError> {
        let address = listener
            .local_addr()
            .map_err(|e| MockServerError::Runtime(e.to_string()))?;
        let (shutdown_tx, _) = broadcast::channel(1);

        let server = Arc::new(MockServer {
            contract,
            config,
            address,
            state: RwLock::new(ServerState::Starting),
            recorded: RwLock::new(Vec::new()),
            metrics: MockServerMetrics::default(),
            shutdown_tx,
        });

        let shutdown_rx = server.shutdown_tx.subscribe();
        *server.state.write() = ServerState::Running;
        let task = tokio::spawn(accept_loop(Arc::clone(&server), listener, shutdown_rx));

        info!(
            "Mock server for {} -> {} listening on {} ({} interaction(s))",
            server.contract.consumer.name,
            server.contract.provider.name,
            address,
            server.contract.interactions.len()
        );
        Ok((server, task))
    }

    pub fn port(&self) -> u16 {
        self.address.port()
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }

    pub fn contract(&self) -> &Contract {
        &self.contract
    }

    pub fn config(&self) -> &MockServerConfig {
        &self.config
    }

    pub fn state(&self) -> ServerState {
        *self.state.read()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub(crate) fn count_request(&self, path: &str) {
        self.metrics.record(path);
    }

    pub(crate) fn record(&self, request_from: SocketAddr, request: Request, outcome: MatchOutcome) {
        let entry = RecordedInteraction {
            request_from: request_from.to_string(),
            request,
            outcome,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        self.recorded.write().push(entry);
    }

    /// A snapshot of every request received so far.
    pub fn recorded_interactions(&self) -> Vec<RecordedInteraction> {
        self.recorded.read().clone()
    }

    /// Unmatched requests, then interactions never exercised.
    pub fn mismatches(&self) -> Vec<MismatchReport> {
        let recorded = self.recorded.read();
        let mut reports = Vec::new();
        let mut attributed = HashSet::new();

        for entry in recorded.iter() {
            if let Some(index) = entry.outcome.interaction_index() {
                attributed.insert(index);
            }
            match &entry.outcome {
                MatchOutcome::Matched(_) => {}
                MatchOutcome::Mismatched { index, mismatches } => {
                    reports.push(MismatchReport::RequestMismatch {
                        method: entry.request.method.clone(),
                        path: entry.request.path.clone(),
                        interaction: self
                            .contract
                            .interactions
                            .get(*index)
                            .map(|i| i.description.clone())
                            .unwrap_or_default(),
                        mismatches: mismatches.clone(),
                    });
                }
                MatchOutcome::NotFound => {
                    reports.push(MismatchReport::RequestNotFound {
                        method: entry.request.method.clone(),
                        path: entry.request.path.clone(),
                        request: entry.request.to_json(),
                    });
                }
            }
        }

        for (index, interaction) in self.contract.interactions.iter().enumerate() {
            if !attributed.contains(&index) {
                reports.push(MismatchReport::MissingRequest {
                    method: interaction.request.method.clone(),
                    path: interaction.request.path.clone(),
                    interaction: interaction.description.clone(),
                });
            }
        }
        reports
    }

    /// True when every request matched and every interaction was exercised.
    pub fn matched(&self) -> bool {
        self.mismatches().is_empty()
    }

    /// Signal the accept loop to stop. Returns false if it was not running.
    pub fn shutdown(&self) -> bool {
        if self.state() != ServerState::Running {
            return false;
        }
        debug!("Shutdown requested for mock server on port {}", self.port());
        let _ = self.shutdown_tx.send(());
        true
    }
}

async fn accept_loop(
    server: Arc<MockServer>,
    listener: TcpListener,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let port = server.port();
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, peer)) => {
                        let server = Arc::clone(&server);
                        let mut connection_shutdown = server.shutdown_tx.subscribe();
                        connections.spawn(async move {
                            let io = TokioIo::new(stream);
                            let service = service_fn(move |req| {
                                let server = Arc::clone(&server);
                                async move { handle_request(req, server, peer).await }
                            });
                            let connection = http1::Builder::new().serve_connection(io, service);
                            tokio::pin!(connection);
                            tokio::select! {
                                result = connection.as_mut() => {
                                    if let Err(e) = result {
                                        debug!("Connection error on port {}: {}", port, e);
                                    }
                                }
                                _ = connection_shutdown.recv() => {
                                    connection.as_mut().graceful_shutdown();
                                    if let Err(e) = connection.await {
                                        debug!("Connection error on port {} during shutdown: {}", port, e);
                                    }
                                }
                            }
                        });
                    }
                    Err(e) => {
                        error!("Accept error on port {}: {}", port, e);
                    }
                }
            }
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
            _ = shutdown_rx.recv() => {
                info!("Mock server on port {} shutting down", port);
                break;
            }
        }
    }
    drop(listener);

    let drain_timeout = server.config.drain_timeout();
    let drained = tokio::time::timeout(drain_timeout, async {
        while connections.join_next().await.is_some() {}
    })
    .await;
    if drained.is_err() {
        warn!(
            "Mock server on port {}: {} connection(s) still open after {:?}, aborting",
            port,
            connections.len(),
            drain_timeout
        );
        connections.shutdown().await;
    }

    *server.state.write() = ServerState::Stopped;
    info!("Mock server on port {} stopped", port);
}
