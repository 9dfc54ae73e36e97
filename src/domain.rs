use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// the token a kiosk is known by in the directory
///
/// either a hardware serial (authoritative) or a generated fallback token
/// carrying the reserved prefix.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct DeviceIdentity(String);

impl DeviceIdentity {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// true when this is a generated token rather than a hardware serial
    pub fn is_fallback(&self, prefix: &str) -> bool {
        self.0.starts_with(prefix)
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// one accepted row of the directory csv
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub device_id: String,
    pub presentation_url: String,
}

/// device id -> presentation url, rebuilt from scratch on every fetch
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Directory {
    entries: HashMap<String, String>,
}

impl Directory {
    /// later entries overwrite earlier ones with the same device id
    pub fn insert(&mut self, entry: DirectoryEntry) {
        self.entries.insert(entry.device_id, entry.presentation_url);
    }

    pub fn lookup(&self, device: &DeviceIdentity) -> Option<&str> {
        self.entries.get(device.as_str()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<DirectoryEntry> for Directory {
    fn from_iter<I: IntoIterator<Item = DirectoryEntry>>(iter: I) -> Self {
        let mut directory = Directory::default();
        for entry in iter {
            directory.insert(entry);
        }
        directory
    }
}
