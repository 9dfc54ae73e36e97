//! ==============================================================================
//! directory.rs - device directory fetcher
//! ==============================================================================
//!
//! purpose:
//!     downloads the published csv that maps device ids to presentation urls
//!     and parses it into a Directory.
//!
//! format:
//!     first row is a header naming at least `device_id` and
//!     `presentation_url`; other columns are ignored. rows are split on
//!     plain commas, so quoted fields containing commas are not supported.
//!
//! relationships:
//!     - used by: session.rs (once per cycle)
//!     - produces: domain.rs (Directory)
//!
//! ==============================================================================

use crate::domain::{Directory, DirectoryEntry};
use crate::error::{KioskError, Result};

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};

const DEVICE_ID_COLUMN: &str = "device_id";
const URL_COLUMN: &str = "presentation_url";

#[async_trait]
pub trait DirectorySource: Send + Sync {
    /// one attempt, no retries; the refresh loop is the retry
    async fn fetch(&self, location: &str) -> Result<Directory>;
}

pub struct HttpDirectoryFetcher {
    client: reqwest::Client,
}

impl HttpDirectoryFetcher {
    pub fn new(timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| KioskError::Network(format!("failed to build http client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl DirectorySource for HttpDirectoryFetcher {
    async fn fetch(&self, location: &str) -> Result<Directory> {
        debug!(location, "Fetching device directory");
        let response = self.client.get(location).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(KioskError::HttpStatus(status.as_u16()));
        }

        let text = response.text().await?;
        let directory = parse_directory(&text);
        if directory.is_empty() {
            warn!(location, "Device directory has no usable rows");
        } else {
            debug!(entries = directory.len(), "Parsed device directory");
        }
        Ok(directory)
    }
}

/// parse the directory csv; malformed rows are skipped, never an error
pub fn parse_directory(text: &str) -> Directory {
    let mut lines = text.trim().split('\n');

    let headers: Vec<&str> = match lines.next() {
        Some(header) => header.split(',').map(str::trim).collect(),
        None => return Directory::default(),
    };

    let id_index = headers.iter().position(|h| *h == DEVICE_ID_COLUMN);
    let url_index = headers.iter().position(|h| *h == URL_COLUMN);
    let (id_index, url_index) = match (id_index, url_index) {
        (Some(id), Some(url)) => (id, url),
        _ => {
            warn!(?headers, "Directory header lacks device_id/presentation_url columns");
            return Directory::default();
        }
    };

    lines
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let values: Vec<&str> = line.split(',').map(str::trim).collect();
            if values.len() != headers.len() {
                debug!(fields = values.len(), expected = headers.len(), "Skipping malformed directory row");
                return None;
            }
            Some(DirectoryEntry {
                device_id: values[id_index].to_string(),
                presentation_url: values[url_index].to_string(),
            })
        })
        .collect()
}
