//! The immutable settings table.

use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::process::Command;
use tracing::{debug, info};

use dockyard_core::EnvOverlay;

use crate::file::{self, DEFAULT_FILE};
use crate::variables;
use crate::{ConfigError, ConfigResult};

/// Key holding the short commit hash of the working tree.
pub const GIT_COMMIT: &str = "GIT_COMMIT";

const MASK: &str = "***";

/// Built-in values, overridden by the config file and `--set`.
const DEFAULTS: &[(&str, &str)] = &[
    ("POSTGRES_NETWORK", "phoenix-postgres"),
    ("POSTGRES_VOLUME", "phoenix-postgres"),
    ("GITHUB_OWNER", "rallinator7"),
    ("APP_NAME", "chatter"),
    ("INIT_NAME", "phoenix-init"),
    ("DATABASE_URL", "ecto://phoenix:phoenix@db:5432/phoenix"),
    (
        "SECRET_KEY_BASE",
        "JhhLO9oACpINDgzWo9xBWw+qKCrh7C6tzUhBo4rMGCbB51ssgPzZpkL812d12fL1",
    ),
    ("DEV_CLUSTER", "dev-cluster"),
    ("REGISTRY_NAME", "kind-registry"),
    ("REGISTRY_PORT", "5000"),
    ("SERVER_CONTAINER", "chatter_server"),
    ("SERVER_PORT", "4000"),
    ("REGISTRY_IMAGE", "registry:2"),
    ("KIND_NETWORK", "kind"),
    ("REMOTE_REGISTRY", "ghcr.io"),
    ("HELM_RELEASE", "postgres"),
    ("COMPOSE_DIR", "docker/postgres"),
    ("KUBE_DIR", "kubernetes"),
    ("CHART_DIR", "kubernetes/postgres"),
    ("CLUSTER_CONFIG", "cluster.yaml"),
    ("SERVER_DOCKERFILE", "./docker/server/Dockerfile"),
    ("INIT_DOCKERFILE", "./docker/init/Dockerfile"),
];

const DEFAULT_SECRETS: &[&str] = &["SECRET_KEY_BASE"];

/// Key/value settings fixed for the whole run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    values: BTreeMap<String, String>,
    secrets: BTreeSet<String>,
}

impl Settings {
    pub fn builder() -> SettingsBuilder {
        SettingsBuilder::new()
    }

    /// Defaults, then `config` (or `dockyard.kdl` if present), then
    /// `KEY=VALUE` overrides. Discovers `GIT_COMMIT` if still unset.
    pub fn load(config: Option<&Path>, overrides: &[String]) -> ConfigResult<Self> {
        let builder = match config {
            Some(path) => Self::builder().with_file(path)?,
            None => Self::builder().with_file_if_exists(Path::new(DEFAULT_FILE))?,
        };
        overrides
            .iter()
            .try_fold(builder, |b, o| b.with_override(o))?
            .build()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn is_secret(&self, key: &str) -> bool {
        self.secrets.contains(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Replace `${KEY}` placeholders with setting values.
    pub fn interpolate(&self, template: &str) -> String {
        variables::interpolate(template, |key| self.get(key))
    }

    pub fn interpolate_all(&self, templates: &[&str]) -> Vec<String> {
        variables::interpolate_vec(templates, |key| self.get(key))
    }

    /// Placeholders in `template` with no matching setting.
    pub fn unresolved(&self, template: &str) -> Vec<String> {
        variables::placeholders(template)
            .into_iter()
            .filter(|key| !self.values.contains_key(key))
            .collect()
    }

    /// Every setting as an environment overlay, secrets flagged.
    pub fn env_overlay(&self) -> EnvOverlay {
        let mut env = EnvOverlay::new();
        for (key, value) in self.iter() {
            if self.is_secret(key) {
                env.set_secret(key, value);
            } else {
                env.set(key, value);
            }
        }
        env
    }

    /// All settings with secret values replaced by a mask.
    pub fn masked(&self) -> BTreeMap<&str, &str> {
        self.iter()
            .map(|(k, v)| (k, if self.is_secret(k) { MASK } else { v }))
            .collect()
    }
}

/// Serializes the masked view; secret values never leave the process.
impl Serialize for Settings {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let masked = self.masked();
        let mut map = serializer.serialize_map(Some(masked.len()))?;
        for (key, value) in masked {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Builder for [`Settings`]. Each call layers over the previous ones.
#[derive(Debug, Clone)]
pub struct SettingsBuilder {
    values: BTreeMap<String, String>,
    secrets: BTreeSet<String>,
}

impl SettingsBuilder {
    /// Starts from the built-in defaults.
    pub fn new() -> Self {
        Self {
            values: DEFAULTS
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            secrets: DEFAULT_SECRETS.iter().map(|k| k.to_string()).collect(),
        }
    }

    /// Starts from nothing.
    pub fn empty() -> Self {
        Self {
            values: BTreeMap::new(),
            secrets: BTreeSet::new(),
        }
    }

    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn with_secret(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        self.secrets.insert(key.clone());
        self.values.insert(key, value.into());
        self
    }

    /// Layer settings parsed from KDL text.
    pub fn with_kdl(mut self, kdl: &str) -> ConfigResult<Self> {
        for entry in file::parse_settings(kdl)? {
            if entry.secret {
                self.secrets.insert(entry.key.clone());
            }
            self.values.insert(entry.key, entry.value);
        }
        Ok(self)
    }

    /// Layer settings from a KDL file that must exist.
    pub fn with_file(self, path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::MissingFile(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path)?;
        info!(path = %path.display(), "loaded settings file");
        self.with_kdl(&text)
    }

    /// Layer settings from a KDL file if there is one.
    pub fn with_file_if_exists(self, path: &Path) -> ConfigResult<Self> {
        if path.exists() {
            self.with_file(path)
        } else {
            debug!(path = %path.display(), "no settings file");
            Ok(self)
        }
    }

    /// Apply a `KEY=VALUE` override. Keys keep their secret flag.
    pub fn with_override(self, assignment: &str) -> ConfigResult<Self> {
        let (key, value) = assignment
            .split_once('=')
            .ok_or_else(|| ConfigError::InvalidOverride(assignment.to_string()))?;
        let key = key.trim();
        file::validate_key(key)?;
        Ok(self.with_value(key, value))
    }

    /// Finish, discovering `GIT_COMMIT` from the working tree if unset.
    pub fn build(self) -> ConfigResult<Settings> {
        if self.values.contains_key(GIT_COMMIT) {
            return Ok(self.finish());
        }
        let commit = discover_git_commit(Path::new("."))?;
        Ok(self.with_value(GIT_COMMIT, commit).finish())
    }

    /// Finish without touching git.
    pub fn finish(self) -> Settings {
        Settings {
            values: self.values,
            secrets: self.secrets,
        }
    }
}

impl Default for SettingsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Short hash of `HEAD` in the repository containing `dir`.
pub fn discover_git_commit(dir: &Path) -> ConfigResult<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .current_dir(dir)
        .output()
        .map_err(|e| ConfigError::GitCommit(format!("failed to run git: {}", e)))?;

    if !output.status.success() {
        return Err(ConfigError::GitCommit(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }

    let commit = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if commit.is_empty() {
        return Err(ConfigError::GitCommit("git printed no commit".to_string()));
    }
    debug!(commit = %commit, "discovered git commit");
    Ok(commit)
}
