//! Repository identity.
//!
//! A `StoreKey` names one content repository as
//! `packageType:storeType:name` (e.g. `maven:hosted:releases`). The legacy
//! two-part form `storeType:name` is still accepted on input and is what
//! older rule-set patterns were written against.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Package type assumed when parsing the legacy two-part key form.
pub const DEFAULT_PACKAGE_TYPE: &str = "maven";

/// Errors parsing a store key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreKeyError {
    #[error("invalid store key '{0}': expected packageType:storeType:name")]
    Malformed(String),

    #[error("invalid store type '{0}': expected hosted, group or remote")]
    UnknownStoreType(String),
}

/// Kind of repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StoreType {
    Hosted,
    Group,
    Remote,
}

impl StoreType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreType::Hosted => "hosted",
            StoreType::Group => "group",
            StoreType::Remote => "remote",
        }
    }
}

impl fmt::Display for StoreType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreType {
    type Err = StoreKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hosted" => Ok(StoreType::Hosted),
            "group" => Ok(StoreType::Group),
            "remote" => Ok(StoreType::Remote),
            _ => Err(StoreKeyError::UnknownStoreType(s.to_string())),
        }
    }
}

/// Identity of a repository. Immutable value type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StoreKey {
    package_type: String,
    store_type: StoreType,
    name: String,
}

impl StoreKey {
    pub fn new(
        package_type: impl Into<String>,
        store_type: StoreType,
        name: impl Into<String>,
    ) -> Self {
        Self {
            package_type: package_type.into(),
            store_type,
            name: name.into(),
        }
    }

    pub fn hosted(package_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(package_type, StoreType::Hosted, name)
    }

    pub fn group(package_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(package_type, StoreType::Group, name)
    }

    pub fn remote(package_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(package_type, StoreType::Remote, name)
    }

    pub fn package_type(&self) -> &str {
        &self.package_type
    }

    pub fn store_type(&self) -> StoreType {
        self.store_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_remote(&self) -> bool {
        self.store_type == StoreType::Remote
    }

    /// Canonical `packageType:storeType:name` form.
    pub fn canonical(&self) -> String {
        format!("{}:{}:{}", self.package_type, self.store_type, self.name)
    }

    /// Legacy `storeType:name` form, used for backward-compatible pattern matching.
    pub fn legacy(&self) -> String {
        format!("{}:{}", self.store_type, self.name)
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.package_type, self.store_type, self.name)
    }
}

impl FromStr for StoreKey {
    type Err = StoreKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        let (package_type, store_type, name) = match parts.as_slice() {
            [package_type, store_type, name] => (*package_type, *store_type, *name),
            [store_type, name] => (DEFAULT_PACKAGE_TYPE, *store_type, *name),
            _ => return Err(StoreKeyError::Malformed(s.to_string())),
        };
        if package_type.is_empty() || name.is_empty() {
            return Err(StoreKeyError::Malformed(s.to_string()));
        }
        Ok(Self::new(package_type, store_type.parse()?, name))
    }
}

impl TryFrom<String> for StoreKey {
    type Error = StoreKeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<StoreKey> for String {
    fn from(key: StoreKey) -> Self {
        key.canonical()
    }
}
