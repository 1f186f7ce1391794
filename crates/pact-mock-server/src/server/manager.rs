//! ServerManager - the process-wide registry of running mock servers.
//!
//! Servers are keyed by their bound port, which doubles as the handle given
//! to callers. The manager owns a dedicated tokio runtime so it can be driven
//! from synchronous code, including foreign callers.

use super::core::MockServer;
use super::types::MismatchReport;
use crate::config::MockServerConfig;
use crate::error::MockServerError;
use crate::model::Contract;
use crate::pact_file;
use once_cell::sync::OnceCell;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::runtime::Runtime;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

static GLOBAL: OnceCell<ServerManager> = OnceCell::new();

/// Outcome of a cleanup request for a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cleanup {
    /// The server was running and has now stopped
    Stopped,
    /// The server had already been cleaned up
    AlreadyStopped,
}

struct Entry {
    server: Arc<MockServer>,
    task: JoinHandle<()>,
}

/// Manages the lifecycle of multiple mock servers
pub struct ServerManager {
    runtime: Option<Runtime>,
    /// Running servers by port
    servers: RwLock<HashMap<u16, Entry>>,
    /// Ports cleaned up since they were last registered. Only locked while
    /// `servers` is write-locked.
    stopped: Mutex<HashSet<u16>>,
}

impl ServerManager {
    /// Create a manager with its own runtime.
    pub fn new(worker_threads: usize) -> Result<Self, MockServerError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(worker_threads.max(1))
            .thread_name("pact-mock-server")
            .enable_all()
            .build()
            .map_err(|e| MockServerError::Runtime(e.to_string()))?;
        Ok(ServerManager {
            runtime: Some(runtime),
            servers: RwLock::new(HashMap::new()),
            stopped: Mutex::new(HashSet::new()),
        })
    }

    /// The process-wide manager, created on first use with the worker count
    /// from the environment config.
    pub fn global() -> Result<&'static ServerManager, MockServerError> {
        GLOBAL.get_or_try_init(|| {
            let config = MockServerConfig::from_env().unwrap_or_else(|e| {
                warn!("Ignoring invalid mock server environment config: {:#}", e);
                MockServerConfig::default()
            });
            ServerManager::new(config.worker_threads)
        })
    }

    fn runtime(&self) -> Result<&Runtime, MockServerError> {
        self.runtime
            .as_ref()
            .ok_or_else(|| MockServerError::Runtime("runtime has been shut down".to_string()))
    }

    /// Parse `contract_json` and start a server for it on `addr`.
    /// Returns the bound port.
    pub fn start_mock_server(
        &self,
        contract_json: &str,
        addr: &str,
        config: MockServerConfig,
    ) -> Result<u16, MockServerError> {
        let contract = Contract::from_json_str(contract_json)?;
        self.start_mock_server_for_contract(contract, addr, config)
    }

    /// Start a server for an already parsed contract. Returns the bound port.
    pub fn start_mock_server_for_contract(
        &self,
        contract: Contract,
        addr: &str,
        config: MockServerConfig,
    ) -> Result<u16, MockServerError> {
        let addr = resolve_address(addr)?;
        let listener =
            std::net::TcpListener::bind(addr).map_err(|e| MockServerError::Bind(addr, e.to_string()))?;
        listener
            .set_nonblocking(true)
            .map_err(|e| MockServerError::Bind(addr, e.to_string()))?;
        let port = listener
            .local_addr()
            .map_err(|e| MockServerError::Bind(addr, e.to_string()))?
            .port();

        if self.servers.read().contains_key(&port) {
            return Err(MockServerError::PortInUse(port));
        }

        let (server, task) = {
            let _guard = self.runtime()?.enter();
            let listener = tokio::net::TcpListener::from_std(listener)
                .map_err(|e| MockServerError::Runtime(e.to_string()))?;
            MockServer::from_listener(listener, contract, config)?
        };

        {
            let mut servers = self.servers.write();
            if servers.contains_key(&port) {
                server.shutdown();
                return Err(MockServerError::PortInUse(port));
            }
            servers.insert(port, Entry { server, task });
            self.stopped.lock().remove(&port);
        }

        info!("Registered mock server on port {}", port);
        Ok(port)
    }

    pub fn find_mock_server(&self, port: u16) -> Option<Arc<MockServer>> {
        self.servers
            .read()
            .get(&port)
            .map(|entry| Arc::clone(&entry.server))
    }

    pub fn matched(&self, port: u16) -> Result<bool, MockServerError> {
        self.find_mock_server(port)
            .map(|server| server.matched())
            .ok_or(MockServerError::NotFound(port))
    }

    pub fn mismatches(&self, port: u16) -> Result<Vec<MismatchReport>, MockServerError> {
        self.find_mock_server(port)
            .map(|server| server.mismatches())
            .ok_or(MockServerError::NotFound(port))
    }

    /// Write the contract served on `port` as a pact file in `directory`
    /// (the working directory when `None`), merging with an existing file
    /// unless `overwrite` is set.
    pub fn write_pact_file(
        &self,
        port: u16,
        directory: Option<&Path>,
        overwrite: bool,
    ) -> Result<PathBuf, MockServerError> {
        let server = self
            .find_mock_server(port)
            .ok_or(MockServerError::NotFound(port))?;
        pact_file::write_pact_file(
            server.contract(),
            directory.unwrap_or_else(|| Path::new(".")),
            overwrite,
        )
    }

    /// Ports of all running servers, ascending.
    pub fn ports(&self) -> Vec<u16> {
        let mut ports: Vec<u16> = self.servers.read().keys().copied().collect();
        ports.sort_unstable();
        ports
    }

    /// Stop the server on `port` and wait for it to drain.
    ///
    /// Cleaning up a port twice reports [`Cleanup::AlreadyStopped`], also
    /// while the first cleanup is still draining; a port that never had a
    /// server is an error.
    pub fn shutdown_mock_server(&self, port: u16) -> Result<Cleanup, MockServerError> {
        // Removal and the stopped marker change together under the write lock
        let entry = {
            let mut servers = self.servers.write();
            let mut stopped = self.stopped.lock();
            match servers.remove(&port) {
                Some(entry) => {
                    stopped.insert(port);
                    entry
                }
                None if stopped.contains(&port) => {
                    debug!("Mock server on port {} was already stopped", port);
                    return Ok(Cleanup::AlreadyStopped);
                }
                None => return Err(MockServerError::NotFound(port)),
            }
        };

        entry.server.shutdown();
        if let Err(e) = futures::executor::block_on(entry.task) {
            error!("Mock server task on port {} failed: {}", port, e);
        }
        info!("Mock server on port {} cleaned up", port);
        Ok(Cleanup::Stopped)
    }

    /// Stop every running server. Returns the ports that were stopped.
    pub fn shutdown_all(&self) -> Vec<u16> {
        self.ports()
            .into_iter()
            .filter(|port| matches!(self.shutdown_mock_server(*port), Ok(Cleanup::Stopped)))
            .collect()
    }
}

impl Drop for ServerManager {
    fn drop(&mut self) {
        for entry in self.servers.get_mut().values() {
            entry.server.shutdown();
        }
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

/// Resolve `host:port` to the first matching socket address.
fn resolve_address(addr: &str) -> Result<SocketAddr, MockServerError> {
    if let Ok(parsed) = addr.parse::<SocketAddr>() {
        return Ok(parsed);
    }
    addr.to_socket_addrs()
        .ok()
        .and_then(|mut addrs| addrs.next())
        .ok_or_else(|| MockServerError::InvalidAddress(addr.to_string()))
}
