//! Remote storage capability.
//!
//! Concrete network backends live outside this crate; they plug in by
//! implementing [`RemoteBackend`]. [`MemoryBackend`] serves fixed listings.

use crate::error::{Result, TreefenceError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A remote tree root written as `protocol://path`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteLocation {
    pub protocol: String,
    /// Slash-separated path inside the remote store, empty for its root
    pub path: String,
}

impl FromStr for RemoteLocation {
    type Err = TreefenceError;

    fn from_str(s: &str) -> Result<Self> {
        let (protocol, path) = s.split_once("://").ok_or_else(|| {
            TreefenceError::config("source", format!("`{s}` is not a `protocol://path` location"))
        })?;
        if protocol.is_empty() || !protocol.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(TreefenceError::config(
                "source",
                format!("invalid protocol `{protocol}` in `{s}`"),
            ));
        }
        Ok(Self {
            protocol: protocol.to_ascii_lowercase(),
            path: path.trim_matches('/').to_string(),
        })
    }
}

impl fmt::Display for RemoteLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.protocol, self.path)
    }
}

/// Backend-specific parameters such as `org`, `repo` or `token`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StorageOptions(BTreeMap<String, String>);

impl StorageOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Looks up a non-empty option, failing with an access error naming `target`
    ///
    /// # Errors
    ///
    /// `TreefenceError::Access` if the option is missing or blank.
    pub fn require(&self, key: &str, target: &RemoteLocation) -> Result<&str> {
        match self.get(key) {
            Some(value) if !value.trim().is_empty() => Ok(value),
            _ => Err(TreefenceError::access(
                target.to_string(),
                format!("missing storage option `{key}`"),
            )),
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for StorageOptions {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Options a protocol cannot work without
#[must_use]
pub fn required_options(protocol: &str) -> &'static [&'static str] {
    match protocol {
        "github" | "gitlab" => &["org", "repo"],
        _ => &[],
    }
}

/// One listed entry, its path relative to the store root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEntry {
    pub path: String,
    #[serde(default)]
    pub is_dir: bool,
}

impl RemoteEntry {
    #[must_use]
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            is_dir: false,
        }
    }

    #[must_use]
    pub fn dir(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            is_dir: true,
        }
    }
}

/// Lists the entries of a remote store.
///
/// Implementations return the full recursive listing of the store the
/// options select; callers narrow it to the location path.
pub trait RemoteBackend: fmt::Debug + Send + Sync {
    /// Whether this backend serves `protocol`
    fn supports(&self, protocol: &str) -> bool;

    /// # Errors
    ///
    /// `TreefenceError::Access` if the store is unreachable or the options
    /// are rejected.
    fn list(&self, location: &RemoteLocation, options: &StorageOptions)
    -> Result<Vec<RemoteEntry>>;
}

/// Backend serving a fixed listing for one protocol
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    protocol: String,
    entries: Vec<RemoteEntry>,
    credential: Option<(String, String)>,
}

impl MemoryBackend {
    #[must_use]
    pub fn new(protocol: impl Into<String>, entries: Vec<RemoteEntry>) -> Self {
        Self {
            protocol: protocol.into(),
            entries,
            credential: None,
        }
    }

    /// Rejects listings unless storage option `key` equals `value`
    #[must_use]
    pub fn with_credential(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.credential = Some((key.into(), value.into()));
        self
    }
}

impl RemoteBackend for MemoryBackend {
    fn supports(&self, protocol: &str) -> bool {
        self.protocol == protocol
    }

    fn list(
        &self,
        location: &RemoteLocation,
        options: &StorageOptions,
    ) -> Result<Vec<RemoteEntry>> {
        if let Some((key, expected)) = &self.credential
            && options.get(key) != Some(expected.as_str())
        {
            return Err(TreefenceError::access(
                location.to_string(),
                format!("invalid credentials in storage option `{key}`"),
            ));
        }
        Ok(self.entries.clone())
    }
}
