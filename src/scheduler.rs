//! ==============================================================================
//! scheduler.rs - refresh scheduler
//! ==============================================================================
//!
//! purpose:
//!     re-runs the kiosk cycle forever on a fixed interval so directory
//!     changes show up on screen without anyone touching the device.
//!
//! model:
//!     one spawned task per start(): wait interval, run one cycle, repeat.
//!     the wait is the only cancellable point. stop() cancels a pending wait;
//!     a cycle already in flight finishes and the task exits afterwards.
//!     start() always stops the previous chain first, so at most one is armed.
//!
//! relationships:
//!     - uses: session.rs (run_cycle)
//!     - used by: controller.rs
//!
//! ==============================================================================

use crate::session::{CycleOutcome, KioskSession};

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

struct Pending {
    cancel: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

pub struct RefreshScheduler {
    session: Arc<KioskSession>,
    pending: Option<Pending>,
}

impl RefreshScheduler {
    pub fn new(session: Arc<KioskSession>) -> Self {
        Self { session, pending: None }
    }

    /// arm the repeating cycle; replaces any chain that is already armed
    pub fn start(&mut self, interval: Duration) {
        self.stop();

        let (cancel, mut cancelled) = watch::channel(false);
        let session = self.session.clone();

        let handle = tokio::spawn(async move {
            info!(interval_secs = interval.as_secs(), "Refresh scheduler started");
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = cancelled.changed() => break,
                }

                debug!("Polling for URL change...");
                match session.run_cycle().await {
                    CycleOutcome::Rendered(outcome) => debug!(?outcome, "Cycle rendered"),
                    other => warn!(outcome = ?other, "Cycle did not render, retrying next interval"),
                }

                if *cancelled.borrow() {
                    break;
                }
            }
            info!("Refresh scheduler stopped");
        });

        self.pending = Some(Pending { cancel, handle });
    }

    /// cancel the pending cycle, if any
    pub fn stop(&mut self) {
        if let Some(pending) = self.pending.take() {
            let _ = pending.cancel.send(true);
        }
    }

    pub fn is_running(&self) -> bool {
        self.pending
            .as_ref()
            .map(|p| !p.handle.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::KioskError;
    use crate::render::IndicatorKind;
    use crate::session::tests::{directory, session_with, ScriptedDirectory};

    const INTERVAL: Duration = Duration::from_secs(15 * 60);

    async fn configured(scripted: Arc<ScriptedDirectory>) -> Arc<KioskSession> {
        let session = Arc::new(session_with("kiosk-1", scripted));
        session.configure(None).await.unwrap();
        session
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_once_per_interval() {
        let scripted = Arc::new(ScriptedDirectory::new(vec![Ok(directory(&[("kiosk-1", "https://a")]))]));
        let mut scheduler = RefreshScheduler::new(configured(scripted.clone()).await);

        scheduler.start(INTERVAL);
        tokio::time::sleep(INTERVAL / 2).await;
        assert_eq!(scripted.calls(), 0);

        tokio::time::sleep(INTERVAL).await;
        assert_eq!(scripted.calls(), 1);

        tokio::time::sleep(INTERVAL * 2).await;
        assert_eq!(scripted.calls(), 3);
        assert!(scheduler.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_http_404_still_rearms() {
        let scripted = Arc::new(ScriptedDirectory::new(vec![Err(KioskError::HttpStatus(404))]));
        let session = configured(scripted.clone()).await;
        let mut scheduler = RefreshScheduler::new(session.clone());

        scheduler.start(INTERVAL);
        tokio::time::sleep(INTERVAL + Duration::from_secs(1)).await;
        assert_eq!(scripted.calls(), 1);
        let indicator = session.snapshot().await.render.indicator;
        assert_eq!(indicator.kind, IndicatorKind::Error);
        assert!(indicator.message.contains("404"));

        tokio::time::sleep(INTERVAL).await;
        assert_eq!(scripted.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_failed_cycle() {
        let scripted = Arc::new(ScriptedDirectory::new(vec![
            Err(KioskError::Network("connection reset".into())),
            Ok(directory(&[("kiosk-1", "https://a")])),
        ]));
        let session = configured(scripted.clone()).await;
        let mut scheduler = RefreshScheduler::new(session.clone());

        scheduler.start(INTERVAL);
        tokio::time::sleep(INTERVAL * 2 + Duration::from_secs(1)).await;
        assert_eq!(scripted.calls(), 2);
        assert_eq!(session.snapshot().await.render.frame.unwrap().url, "https://a");
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_pending_cycle() {
        let scripted = Arc::new(ScriptedDirectory::new(vec![Ok(directory(&[("kiosk-1", "https://a")]))]));
        let mut scheduler = RefreshScheduler::new(configured(scripted.clone()).await);

        scheduler.start(INTERVAL);
        tokio::time::sleep(INTERVAL / 2).await;
        scheduler.stop();
        tokio::time::sleep(INTERVAL * 4).await;

        assert_eq!(scripted.calls(), 0);
        assert!(!scheduler.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_keeps_single_chain() {
        let scripted = Arc::new(ScriptedDirectory::new(vec![Ok(directory(&[("kiosk-1", "https://a")]))]));
        let mut scheduler = RefreshScheduler::new(configured(scripted.clone()).await);

        scheduler.start(INTERVAL);
        scheduler.start(INTERVAL);
        scheduler.start(INTERVAL);
        tokio::time::sleep(INTERVAL + Duration::from_secs(1)).await;
        assert_eq!(scripted.calls(), 1);
    }
}
