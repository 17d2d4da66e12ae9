//! Shared application state.

use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use tracing::info;

use crate::config::ServerConfig;
use crate::core::catalog::{Catalog, InMemoryCatalog};
use crate::core::realtime::create_connector;
use crate::core::session::{SeedResolver, SessionServices};
use crate::errors::AppResult;

/// Why a websocket connection slot was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionLimitError {
    GlobalLimitReached,
    PerIpLimitReached,
}

/// State shared by every request handler.
pub struct AppState {
    pub config: ServerConfig,
    pub catalog: Arc<dyn Catalog>,
    /// Collaborators handed to each chat session
    pub services: SessionServices,
    ws_connections: AtomicUsize,
    ip_connections: DashMap<IpAddr, u32>,
}

impl AppState {
    /// Build the state from configuration: loads the catalog file (if any)
    /// and creates the configured upstream connector.
    pub async fn new(config: ServerConfig) -> AppResult<Arc<Self>> {
        let catalog: Arc<dyn Catalog> = match &config.catalog_path {
            Some(path) => {
                let catalog = InMemoryCatalog::from_file(path)?;
                info!(
                    path = %path.display(),
                    recipes = catalog.recipe_count(),
                    "Recipe catalog loaded"
                );
                Arc::new(catalog)
            }
            None => {
                info!("No catalog configured, starting with an empty catalog");
                Arc::new(InMemoryCatalog::new())
            }
        };

        let connector = create_connector(&config)?;
        info!(provider = connector.provider_name(), "Realtime provider configured");

        let services = SessionServices {
            connector,
            resolver: Arc::new(SeedResolver::new(catalog.clone())),
            relay_tool_calls: config.relay_tool_calls,
        };

        Ok(Self::with_services(config, catalog, services))
    }

    /// Build the state from already constructed collaborators.
    pub fn with_services(
        config: ServerConfig,
        catalog: Arc<dyn Catalog>,
        services: SessionServices,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            catalog,
            services,
            ws_connections: AtomicUsize::new(0),
            ip_connections: DashMap::new(),
        })
    }

    /// Reserve a websocket slot for `ip`, honouring the global and per-IP limits.
    pub fn try_acquire_connection(&self, ip: IpAddr) -> Result<(), ConnectionLimitError> {
        if let Some(max) = self.config.max_websocket_connections {
            let reserved = self
                .ws_connections
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                    (current < max).then_some(current + 1)
                });
            if reserved.is_err() {
                return Err(ConnectionLimitError::GlobalLimitReached);
            }
        } else {
            self.ws_connections.fetch_add(1, Ordering::AcqRel);
        }

        let mut per_ip = self.ip_connections.entry(ip).or_insert(0);
        if *per_ip >= self.config.max_connections_per_ip {
            drop(per_ip);
            self.ws_connections.fetch_sub(1, Ordering::AcqRel);
            return Err(ConnectionLimitError::PerIpLimitReached);
        }
        *per_ip += 1;
        Ok(())
    }

    /// Return a slot taken by [`try_acquire_connection`](Self::try_acquire_connection).
    pub fn release_connection(&self, ip: IpAddr) {
        let _ = self
            .ws_connections
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                current.checked_sub(1)
            });
        self.ip_connections.remove_if_mut(&ip, |_, count| {
            *count = count.saturating_sub(1);
            *count == 0
        });
    }

    pub fn ws_connection_count(&self) -> usize {
        self.ws_connections.load(Ordering::Acquire)
    }

    pub fn ip_connection_count(&self, ip: &IpAddr) -> u32 {
        self.ip_connections.get(ip).map(|count| *count).unwrap_or(0)
    }
}
