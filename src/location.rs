//! ==============================================================================
//! location.rs - where the directory csv lives
//! ==============================================================================
//!
//! purpose:
//!     turns configuration into the network location of the directory.
//!     either a fixed url, or a session identifier substituted into a
//!     template. the session identifier comes from the command line or the
//!     shell's `?session=` query and is remembered in the local store.
//!
//! ==============================================================================

use crate::config::DirectoryConfig;
use crate::error::{KioskError, Result};
use crate::store::{KeyValueStore, SESSION_ID_KEY};

use regex::Regex;
use std::sync::OnceLock;
use tracing::info;

const PLACEHOLDER: &str = "{session}";

fn session_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("static pattern"))
}

pub fn is_valid_session_id(id: &str) -> bool {
    session_pattern().is_match(id)
}

/// fixed prefix and suffix around the session identifier
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocationTemplate {
    prefix: String,
    suffix: String,
}

impl LocationTemplate {
    pub fn parse(template: &str) -> Result<Self> {
        let (prefix, suffix) = template.split_once(PLACEHOLDER).ok_or_else(|| {
            KioskError::Configuration(format!("directory template has no {} placeholder", PLACEHOLDER))
        })?;
        if suffix.contains(PLACEHOLDER) {
            return Err(KioskError::Configuration(format!(
                "directory template has more than one {} placeholder",
                PLACEHOLDER
            )));
        }
        Ok(Self { prefix: prefix.to_string(), suffix: suffix.to_string() })
    }

    /// None for anything outside the allow-list (including empty input)
    pub fn build_location(&self, session_id: &str) -> Option<String> {
        if !is_valid_session_id(session_id) {
            return None;
        }
        Some(format!("{}{}{}", self.prefix, session_id, self.suffix))
    }
}

/// where the directory comes from for this run
#[derive(Clone, Debug)]
pub enum ConfigSource {
    Fixed(String),
    Session(LocationTemplate),
}

impl ConfigSource {
    pub fn from_config(config: &DirectoryConfig) -> Result<Self> {
        match config.url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => Ok(ConfigSource::Fixed(url.to_string())),
            _ => Ok(ConfigSource::Session(LocationTemplate::parse(&config.template)?)),
        }
    }

    /// resolve the directory location
    ///
    /// for the session variant an explicit id wins over the remembered one;
    /// the id that is used gets remembered for the next start.
    pub fn resolve(&self, explicit: Option<&str>, store: &dyn KeyValueStore) -> Result<String> {
        let template = match self {
            ConfigSource::Fixed(url) => return Ok(url.clone()),
            ConfigSource::Session(template) => template,
        };

        let session_id = match explicit {
            Some(id) => id.to_string(),
            None => store.get(SESSION_ID_KEY).ok_or_else(|| {
                KioskError::Configuration("Sheet ID is missing. Provide one with ?session= or --session.".to_string())
            })?,
        };

        let location = template.build_location(&session_id).ok_or_else(|| {
            KioskError::Configuration(format!("Invalid Sheet ID \"{}\"", session_id))
        })?;

        if store.get(SESSION_ID_KEY).as_deref() != Some(session_id.as_str()) {
            store.set(SESSION_ID_KEY, &session_id)?;
            info!(session_id = %session_id, "Remembered session identifier");
        }
        Ok(location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn template() -> LocationTemplate {
        LocationTemplate::parse("https://sheets.example/d/{session}/pub?output=csv").unwrap()
    }

    #[test]
    fn test_valid_ids_are_substituted_verbatim() {
        for id in ["abc", "A-1_b", "2PACX-1vTkKbt_JN9", "-", "_"] {
            let location = template().build_location(id).unwrap();
            assert_eq!(location, format!("https://sheets.example/d/{}/pub?output=csv", id));
        }
    }

    #[test]
    fn test_invalid_ids_yield_nothing() {
        for id in ["", " ", "   ", "a b", "a/b", "a?b=c", "ä", "id\n", "../etc"] {
            assert_eq!(template().build_location(id), None, "{:?}", id);
        }
    }

    #[test]
    fn test_template_needs_placeholder() {
        assert!(LocationTemplate::parse("https://sheets.example/pub").is_err());
        assert!(LocationTemplate::parse("{session}/{session}").is_err());
    }

    #[test]
    fn test_fixed_url_wins() {
        let config = DirectoryConfig {
            url: Some("https://example.com/devices.csv".into()),
            ..DirectoryConfig::default()
        };
        let store = MemoryStore::default();
        let source = ConfigSource::from_config(&config).unwrap();
        assert_eq!(source.resolve(Some("ignored"), &store).unwrap(), "https://example.com/devices.csv");
        assert_eq!(store.get(SESSION_ID_KEY), None);
    }

    #[test]
    fn test_session_id_is_remembered() {
        let store = MemoryStore::default();
        let source = ConfigSource::Session(template());

        let first = source.resolve(Some("lobby"), &store).unwrap();
        assert_eq!(store.get(SESSION_ID_KEY).as_deref(), Some("lobby"));

        let again = source.resolve(None, &store).unwrap();
        assert_eq!(first, again);
        assert_eq!(store.write_count(), 1);
    }

    #[test]
    fn test_missing_or_invalid_session_is_configuration_error() {
        let store = MemoryStore::default();
        let source = ConfigSource::Session(template());

        assert!(matches!(source.resolve(None, &store), Err(KioskError::Configuration(_))));
        assert!(matches!(source.resolve(Some("bad id"), &store), Err(KioskError::Configuration(_))));
        assert_eq!(store.get(SESSION_ID_KEY), None);
    }
}
