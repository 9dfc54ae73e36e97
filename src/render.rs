//! ==============================================================================
//! render.rs - presentation renderer
//! ==============================================================================
//!
//! purpose:
//!     owns what the kiosk screen should show: the embedded presentation
//!     frame and the status indicator on top of it.
//!
//!     the host decides, the shell page (assets/app.js) obeys: it polls the
//!     snapshot, mounts a new iframe whenever the frame id changes and reports
//!     load/error for that frame id back through the web api.
//!
//! invariants:
//!     - rendering the url that is already mounted keeps the same frame id
//!       (no reload, no flicker)
//!     - a different url tears the old frame down and mounts exactly one new one
//!     - callbacks for frames that are no longer mounted are ignored
//!     - after close(), nothing changes any more
//!
//! ==============================================================================

use crate::error::KioskError;

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FrameId(u64);

impl FrameId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameState {
    Loading,
    Loaded,
}

#[derive(Clone, Debug, Serialize)]
pub struct Frame {
    pub id: FrameId,
    pub url: String,
    pub state: FrameState,
    pub allow_fullscreen: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IndicatorKind {
    Info,
    Error,
}

/// the loading screen
#[derive(Clone, Debug, Serialize)]
pub struct Indicator {
    pub visible: bool,
    pub kind: IndicatorKind,
    pub message: String,
    pub spinner: bool,
}

/// what render() did
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderOutcome {
    /// same url already mounted; frame kept as is
    Unchanged(FrameId),
    /// old frame (if any) removed, new one mounted
    Mounted { replaced: Option<FrameId>, frame: FrameId },
    /// renderer closed; nothing done
    Ignored,
}

/// serializable view for the shell page
#[derive(Clone, Debug, Serialize)]
pub struct RenderSnapshot {
    pub frame: Option<Frame>,
    pub frame_visible: bool,
    pub indicator: Indicator,
}

struct RenderState {
    frame: Option<Frame>,
    frame_visible: bool,
    indicator: Indicator,
    next_frame: u64,
    closed: bool,
}

#[derive(Clone)]
pub struct Renderer {
    state: Arc<RwLock<RenderState>>,
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(RenderState {
                frame: None,
                frame_visible: false,
                indicator: Indicator {
                    visible: true,
                    kind: IndicatorKind::Info,
                    message: "Identifying device...".to_string(),
                    spinner: true,
                },
                next_frame: 1,
                closed: false,
            })),
        }
    }

    /// show the presentation for `url`, reusing the mounted frame when possible
    pub async fn render(&self, url: &str) -> RenderOutcome {
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        if state.closed {
            return RenderOutcome::Ignored;
        }

        if let Some(frame) = &state.frame {
            if frame.url == url {
                let id = frame.id;
                let loaded = frame.state == FrameState::Loaded;
                debug!(frame = id.value(), "URL has not changed, keeping current presentation");
                if loaded {
                    state.indicator.visible = false;
                    state.frame_visible = true;
                }
                return RenderOutcome::Unchanged(id);
            }
        }

        let replaced = state.frame.take().map(|f| f.id);
        let id = FrameId(state.next_frame);
        state.next_frame += 1;
        state.frame = Some(Frame {
            id,
            url: url.to_string(),
            state: FrameState::Loading,
            allow_fullscreen: true,
        });
        state.frame_visible = false;
        state.indicator = Indicator {
            visible: true,
            kind: IndicatorKind::Info,
            message: "Loading presentation...".to_string(),
            spinner: true,
        };
        info!(frame = id.value(), replaced = ?replaced.map(FrameId::value), url, "Mounted presentation frame");
        RenderOutcome::Mounted { replaced, frame: id }
    }

    /// the shell finished loading frame `id`
    pub async fn frame_loaded(&self, id: FrameId) -> bool {
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        if state.closed {
            return false;
        }
        match state.frame.as_mut() {
            Some(frame) if frame.id == id => {
                frame.state = FrameState::Loaded;
                state.indicator.visible = false;
                state.frame_visible = true;
                info!(frame = id.value(), "Presentation loaded");
                true
            }
            _ => {
                debug!(frame = id.value(), "Ignoring load event for stale frame");
                false
            }
        }
    }

    /// the shell failed to load frame `id`; the frame is dropped so the next
    /// cycle mounts it again
    pub async fn frame_failed(&self, id: FrameId, message: &str) -> bool {
        let mut state = self.state.write().await;
        if state.closed {
            return false;
        }
        if state.frame.as_ref().map(|f| f.id) != Some(id) {
            return false;
        }

        state.frame = None;
        state.frame_visible = false;
        let detail = if message.trim().is_empty() { "Unknown error" } else { message };
        let err = KioskError::Render(detail.to_string());
        warn!(frame = id.value(), error = %err, "Presentation failed to load");
        state.indicator = Indicator {
            visible: true,
            kind: IndicatorKind::Error,
            message: format!("{}. Check URL or network.", err),
            spinner: false,
        };
        true
    }

    /// progress message on the loading screen; the frame stays as it is
    pub async fn show_status(&self, message: impl Into<String>) {
        let mut state = self.state.write().await;
        if state.closed {
            return;
        }
        state.indicator = Indicator {
            visible: true,
            kind: IndicatorKind::Info,
            message: message.into(),
            spinner: true,
        };
    }

    /// error on the loading screen; the presentation is hidden but stays mounted
    pub async fn show_error(&self, message: impl Into<String>) {
        let mut state = self.state.write().await;
        if state.closed {
            return;
        }
        state.frame_visible = false;
        state.indicator = Indicator {
            visible: true,
            kind: IndicatorKind::Error,
            message: message.into(),
            spinner: false,
        };
    }

    pub async fn close(&self) {
        self.state.write().await.closed = true;
    }

    pub async fn snapshot(&self) -> RenderSnapshot {
        let state = self.state.read().await;
        RenderSnapshot {
            frame: state.frame.clone(),
            frame_visible: state.frame_visible,
            indicator: state.indicator.clone(),
        }
    }
}
