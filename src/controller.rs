//! ==============================================================================
//! controller.rs - kiosk lifecycle
//! ==============================================================================
//!
//! purpose:
//!     ties the session to its refresh scheduler so both main.rs and the web
//!     shell can drive it.
//!
//! lifecycle:
//!     startup  -> configure -> identify -> first cycle -> arm scheduler
//!     halted   -> configuration error on screen, no scheduler armed
//!     resumed  -> a valid session id from the shell while halted runs the
//!                 remaining startup steps
//!     shutdown -> scheduler stopped, renderer closed
//!
//! relationships:
//!     - uses: session.rs, scheduler.rs
//!     - used by: main.rs, server.rs
//!
//! ==============================================================================

use crate::error::KioskError;
use crate::scheduler::RefreshScheduler;
use crate::session::KioskSession;

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};

pub struct KioskController {
    session: Arc<KioskSession>,
    scheduler: Mutex<RefreshScheduler>,
    interval: Duration,
}

impl KioskController {
    pub fn new(session: Arc<KioskSession>, interval: Duration) -> Self {
        Self {
            scheduler: Mutex::new(RefreshScheduler::new(session.clone())),
            session,
            interval,
        }
    }

    pub fn session(&self) -> &Arc<KioskSession> {
        &self.session
    }

    /// configure with the command line session (or the remembered one), then
    /// identify, render once and arm the scheduler. a configuration error
    /// leaves the kiosk halted with the error on screen.
    pub async fn startup(&self, explicit_session: Option<&str>) -> Result<(), KioskError> {
        if let Err(e) = self.session.configure(explicit_session).await {
            warn!(error = %e, fatal = e.is_fatal(), "Startup halted; waiting for a session id from the shell");
            return Err(e);
        }
        let mut scheduler = self.scheduler.lock().await;
        self.arm(&mut scheduler).await;
        Ok(())
    }

    /// session id submitted by the shell. a running kiosk picks it up on the
    /// next cycle; a halted one resumes immediately.
    pub async fn switch_session(&self, id: &str) -> Result<String, KioskError> {
        let mut scheduler = self.scheduler.lock().await;
        let before = self.session.location();
        let location = self.session.configure(Some(id)).await?;

        if scheduler.is_running() {
            if before.as_deref() != Some(location.as_str()) {
                info!(session_id = %id, "Session switched from shell, applies from next cycle");
            }
        } else {
            info!(session_id = %id, "Session id received, resuming kiosk");
            self.arm(&mut scheduler).await;
        }
        Ok(location)
    }

    pub async fn is_running(&self) -> bool {
        self.scheduler.lock().await.is_running()
    }

    pub async fn shutdown(&self) {
        self.scheduler.lock().await.stop();
        self.session.renderer().close().await;
    }

    async fn arm(&self, scheduler: &mut RefreshScheduler) {
        self.session.identify().await;
        self.session.run_cycle().await;
        scheduler.start(self.interval);
    }
}
