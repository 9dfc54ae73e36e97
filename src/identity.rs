//! ==============================================================================
//! identity.rs - device identity resolver
//! ==============================================================================
//!
//! purpose:
//!     gives the kiosk a stable id to look itself up in the directory.
//!     prefers the board's hardware serial; without one, generates a
//!     fallback token (prefix + 10 random digits) once and keeps reusing it.
//!
//! sources:
//!     - HardwareSerialSource: firmware/cpu/dmi serial read from sysfs/procfs
//!     - GeneratedSource: no hardware capability on this machine
//!     detect_source() picks one at startup by reading the configured paths.
//!
//! relationships:
//!     - uses: store.rs (DEVICE_ID_KEY)
//!     - used by: session.rs (every cycle), main.rs (startup)
//!
//! ==============================================================================

use crate::config::IdentityConfig;
use crate::domain::DeviceIdentity;
use crate::error::{KioskError, Result};
use crate::store::{KeyValueStore, DEVICE_ID_KEY};

use rand::Rng;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

const FALLBACK_DIGITS: usize = 10;

// ==============================================================================
// identity sources
// ==============================================================================

pub trait IdentitySource: Send + Sync {
    fn name(&self) -> &'static str;

    /// read the capability; Ok(None) means "available but nothing to report"
    fn serial_number(&self) -> Result<Option<String>>;
}

/// reads the hardware serial from the first path that yields one
pub struct HardwareSerialSource {
    paths: Vec<PathBuf>,
}

impl HardwareSerialSource {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }
}

impl IdentitySource for HardwareSerialSource {
    fn name(&self) -> &'static str {
        "hardware-serial"
    }

    fn serial_number(&self) -> Result<Option<String>> {
        let mut last_error = None;
        for path in &self.paths {
            match std::fs::read(path) {
                Ok(raw) => {
                    let text = String::from_utf8_lossy(&raw);
                    let serial = if is_cpuinfo(path) {
                        parse_cpuinfo_serial(&text)
                    } else {
                        clean_serial(&text)
                    };
                    if let Some(serial) = serial {
                        debug!(path = %path.display(), "Hardware serial found");
                        return Ok(Some(serial));
                    }
                }
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "Serial path unreadable");
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            // nothing readable at all: the capability went away
            Some(e) if self.paths.iter().all(|p| !p.exists()) => {
                Err(KioskError::Identity(format!("no serial source readable: {}", e)))
            }
            _ => Ok(None),
        }
    }
}

/// no hardware capability; the resolver generates a fallback token instead
pub struct GeneratedSource;

impl IdentitySource for GeneratedSource {
    fn name(&self) -> &'static str {
        "generated"
    }

    fn serial_number(&self) -> Result<Option<String>> {
        Ok(None)
    }
}

/// pick the identity source by capability detection: hardware only when one
/// of the configured paths actually yields a serial
pub fn detect_source(config: &IdentityConfig) -> Box<dyn IdentitySource> {
    let available: Vec<PathBuf> = config
        .serial_paths
        .iter()
        .map(PathBuf::from)
        .filter(|p| p.exists())
        .collect();

    let hardware = HardwareSerialSource::new(available);
    match hardware.serial_number() {
        Ok(Some(_)) => Box::new(hardware),
        Ok(None) => {
            warn!("Hardware serial capability is not available");
            Box::new(GeneratedSource)
        }
        Err(e) => {
            warn!(error = %e, "Hardware serial capability is not available");
            Box::new(GeneratedSource)
        }
    }
}

fn is_cpuinfo(path: &Path) -> bool {
    path.file_name().map(|n| n == "cpuinfo").unwrap_or(false)
}

/// `Serial\t\t: 10000000abcdef01` on raspberry pi kernels
fn parse_cpuinfo_serial(text: &str) -> Option<String> {
    text.lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("serial"))
        .and_then(|(_, value)| clean_serial(value))
}

/// firmware filler values that many unrelated machines share
const PLACEHOLDER_SERIALS: &[&str] = &[
    "to be filled by o.e.m.",
    "default string",
    "not specified",
    "not applicable",
    "system serial number",
    "none",
    "0123456789",
];

fn clean_serial(raw: &str) -> Option<String> {
    let serial = raw.trim_matches(|c: char| c == '\0' || c.is_whitespace());
    if serial.is_empty()
        || serial.chars().all(|c| c == '0')
        || PLACEHOLDER_SERIALS.iter().any(|p| serial.eq_ignore_ascii_case(p))
    {
        return None;
    }
    Some(serial.to_string())
}

/// prefix followed by 10 independently drawn decimal digits
pub fn generate_fallback_token(prefix: &str) -> String {
    let mut rng = rand::thread_rng();
    let digits: String = (0..FALLBACK_DIGITS)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect();
    format!("{}{}", prefix, digits)
}

// ==============================================================================
// resolver
// ==============================================================================

pub struct IdentityResolver {
    store: Arc<dyn KeyValueStore>,
    source: Box<dyn IdentitySource>,
    prefix: String,
    /// identity the store refused to take; keeps the id stable until a write succeeds
    unsaved: Mutex<Option<DeviceIdentity>>,
}

impl IdentityResolver {
    pub fn new(store: Arc<dyn KeyValueStore>, source: Box<dyn IdentitySource>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            source,
            prefix: prefix.into(),
            unsaved: Mutex::new(None),
        }
    }

    /// resolve the device identity, persisting only on adoption or synthesis.
    /// never fails: a store that cannot be written only costs persistence
    pub fn resolve(&self) -> DeviceIdentity {
        let cached = self
            .store
            .get(DEVICE_ID_KEY)
            .map(DeviceIdentity::new)
            .or_else(|| self.unsaved.lock().ok().and_then(|u| u.clone()));

        if let Some(id) = &cached {
            if !id.is_fallback(&self.prefix) {
                debug!(device_id = %id, "Using persistent hardware device id");
                return id.clone();
            }
        }

        // absent or fallback: try to upgrade to the hardware serial
        let serial = match self.source.serial_number() {
            Ok(serial) => serial,
            Err(e) => {
                warn!(source = self.source.name(), error = %e, "Could not retrieve serial number");
                None
            }
        };

        if let Some(serial) = serial {
            let id = DeviceIdentity::new(serial);
            self.remember(&id);
            info!(device_id = %id, "Using serial-based device id");
            return id;
        }

        if let Some(id) = cached {
            debug!(device_id = %id, "Using existing cached device id");
            return id;
        }

        let id = DeviceIdentity::new(generate_fallback_token(&self.prefix));
        self.remember(&id);
        info!(device_id = %id, "Generated new device id");
        id
    }

    fn remember(&self, id: &DeviceIdentity) {
        let saved = match self.store.set(DEVICE_ID_KEY, id.as_str()) {
            Ok(()) => None,
            Err(e) => {
                warn!(device_id = %id, error = %e, "Could not persist device id, keeping it in memory");
                Some(id.clone())
            }
        };
        if let Ok(mut unsaved) = self.unsaved.lock() {
            *unsaved = saved;
        }
    }
}
