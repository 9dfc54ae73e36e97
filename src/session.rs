//! ==============================================================================
//! session.rs - kiosk session context and the refresh cycle
//! ==============================================================================
//!
//! purpose:
//!     everything one cycle touches lives here instead of in globals:
//!     the identity resolver, the current directory location, the fetcher
//!     and the renderer.
//!
//! cycle:
//!     resolve identity -> fetch directory -> look up this device -> render
//!
//!     every failure ends in a status message on the kiosk and the cycle
//!     returns normally, so the scheduler always re-arms.
//!
//! relationships:
//!     - used by: scheduler.rs (run_cycle), controller.rs (configure, identify),
//!       server.rs (snapshot)
//!     - uses: identity.rs, directory.rs, render.rs, location.rs
//!
//! ==============================================================================

use crate::directory::DirectorySource;
use crate::domain::DeviceIdentity;
use crate::error::KioskError;
use crate::identity::IdentityResolver;
use crate::location::ConfigSource;
use crate::render::{RenderOutcome, RenderSnapshot, Renderer};
use crate::store::KeyValueStore;

use serde::Serialize;
use std::sync::{Arc, RwLock};
use tracing::{debug, error, info, warn};

/// how a single cycle ended
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CycleOutcome {
    Rendered(RenderOutcome),
    FetchFailed(String),
    NotFound(DeviceIdentity),
}

#[derive(Clone, Debug, Serialize)]
pub struct SessionSnapshot {
    pub device_id: Option<DeviceIdentity>,
    pub location: Option<String>,
    #[serde(flatten)]
    pub render: RenderSnapshot,
}

pub struct KioskSession {
    resolver: IdentityResolver,
    directory: Arc<dyn DirectorySource>,
    source: ConfigSource,
    store: Arc<dyn KeyValueStore>,
    renderer: Renderer,
    identity: RwLock<Option<DeviceIdentity>>,
    location: RwLock<Option<String>>,
}

impl KioskSession {
    pub fn new(
        resolver: IdentityResolver,
        directory: Arc<dyn DirectorySource>,
        source: ConfigSource,
        store: Arc<dyn KeyValueStore>,
        renderer: Renderer,
    ) -> Self {
        Self {
            resolver,
            directory,
            source,
            store,
            renderer,
            identity: RwLock::new(None),
            location: RwLock::new(None),
        }
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn identity(&self) -> Option<DeviceIdentity> {
        self.identity.read().ok().and_then(|g| g.clone())
    }

    pub fn location(&self) -> Option<String> {
        self.location.read().ok().and_then(|g| g.clone())
    }

    /// resolve the directory location; `explicit` is a session identifier
    /// from the command line or the shell query
    pub async fn configure(&self, explicit: Option<&str>) -> Result<String, KioskError> {
        match self.source.resolve(explicit, self.store.as_ref()) {
            Ok(location) => {
                if let Ok(mut current) = self.location.write() {
                    if current.as_deref() != Some(location.as_str()) {
                        info!(location = %location, "Directory location set");
                    }
                    *current = Some(location.clone());
                }
                Ok(location)
            }
            Err(e) => {
                error!(error = %e, "Directory location could not be resolved");
                self.renderer.show_error(format!("Error: {}", e)).await;
                Err(e)
            }
        }
    }

    /// resolve the identity and show it; replaces whatever status was up
    pub async fn identify(&self) -> DeviceIdentity {
        self.renderer.show_status("Identifying device...").await;
        let id = self.resolve_identity();
        info!(device_id = %id, "Identified device");
        self.renderer
            .show_status(format!("Identified device: {}. Loading content...", id))
            .await;
        id
    }

    fn resolve_identity(&self) -> DeviceIdentity {
        let id = self.resolver.resolve();
        if let Ok(mut current) = self.identity.write() {
            if let Some(previous) = current.as_ref() {
                if previous != &id {
                    warn!(from = %previous, to = %id, "Device id changed");
                }
            }
            *current = Some(id.clone());
        }
        id
    }

    /// one full pass: identity -> directory -> lookup -> render
    pub async fn run_cycle(&self) -> CycleOutcome {
        let device = self.resolve_identity();

        let location = match self.location() {
            Some(location) => location,
            None => {
                let message = "Error fetching device list. No directory location is configured.";
                self.renderer.show_error(message).await;
                return CycleOutcome::FetchFailed(message.to_string());
            }
        };

        let directory = match self.directory.fetch(&location).await {
            Ok(directory) => directory,
            Err(e) => {
                warn!(error = %e, location = %location, "Error fetching directory");
                self.renderer
                    .show_error(format!(
                        "Error fetching device list. Please check network or file path. {}",
                        e
                    ))
                    .await;
                return CycleOutcome::FetchFailed(e.to_string());
            }
        };

        let url = match directory.lookup(&device) {
            Some(url) => url.to_string(),
            None => {
                let err = KioskError::Lookup(device.to_string());
                warn!(device_id = %device, entries = directory.len(), "Device not in directory");
                self.renderer
                    .show_error(format!(
                        "Error: {}. Please check your CSV file and ensure this ID is mapped.",
                        err
                    ))
                    .await;
                return CycleOutcome::NotFound(device);
            }
        };

        let outcome = self.renderer.render(&url).await;
        debug!(?outcome, device_id = %device, "Cycle finished");
        CycleOutcome::Rendered(outcome)
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            device_id: self.identity(),
            location: self.location(),
            render: self.renderer.snapshot().await,
        }
    }
}
