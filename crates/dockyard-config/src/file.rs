//! `dockyard.kdl` parsing.
//!
//! ```kdl
//! POSTGRES_NETWORK "phoenix-postgres"
//! REGISTRY_PORT 5000
//! SECRET_KEY_BASE "..." secret=#true
//! ```

use kdl::{KdlDocument, KdlNode, KdlValue};
use regex::Regex;
use std::sync::LazyLock;

use crate::{ConfigError, ConfigResult};

/// Default file name looked up in the working directory.
pub const DEFAULT_FILE: &str = "dockyard.kdl";

static KEY_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z_][A-Z0-9_]*$").expect("key pattern is valid"));

/// One `KEY value` node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingEntry {
    pub key: String,
    pub value: String,
    pub secret: bool,
}

/// Parse settings from KDL text. Later nodes for the same key win.
pub fn parse_settings(kdl: &str) -> ConfigResult<Vec<SettingEntry>> {
    let doc: KdlDocument = kdl.parse()?;

    doc.nodes().iter().map(parse_entry).collect()
}

fn parse_entry(node: &KdlNode) -> ConfigResult<SettingEntry> {
    let key = node.name().value().to_string();
    validate_key(&key)?;

    let value = get_first_arg(node).ok_or_else(|| ConfigError::InvalidValue {
        key: key.clone(),
        message: "expected a value argument".to_string(),
    })?;
    let value = scalar_text(&key, value)?;

    let secret = match node.get("secret") {
        None => false,
        Some(v) => v.as_bool().ok_or_else(|| ConfigError::InvalidValue {
            key: key.clone(),
            message: "secret must be #true or #false".to_string(),
        })?,
    };

    Ok(SettingEntry { key, value, secret })
}

pub(crate) fn validate_key(key: &str) -> ConfigResult<()> {
    if KEY_REGEX.is_match(key) {
        Ok(())
    } else {
        Err(ConfigError::InvalidKey(key.to_string()))
    }
}

// Helper functions for extracting values from KDL nodes

fn get_first_arg(node: &KdlNode) -> Option<&KdlValue> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .map(|e| e.value())
}

fn scalar_text(key: &str, value: &KdlValue) -> ConfigResult<String> {
    if let Some(s) = value.as_string() {
        return Ok(s.to_string());
    }
    if let Some(n) = value.as_integer() {
        return Ok(n.to_string());
    }
    Err(ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("expected a string or integer, found {}", value),
    })
}
