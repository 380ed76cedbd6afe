//! Canonical `namespace/name` resource keys.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Separator between namespace and name in a canonical key.
pub const KEY_SEPARATOR: char = '/';

/// Identifies a namespaced resource.
///
/// Neither half may be empty or contain [`KEY_SEPARATOR`], so the canonical
/// string form round-trips without ambiguity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceKey {
    namespace: String,
    name: String,
}

impl ResourceKey {
    /// Build a key from its parts.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidKey`] if either part is empty or contains the
    /// separator.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Result<Self> {
        let namespace = namespace.into();
        let name = name.into();
        let rendered = format!("{namespace}{KEY_SEPARATOR}{name}");

        validate_part(&rendered, "namespace", &namespace)?;
        validate_part(&rendered, "name", &name)?;

        Ok(Self { namespace, name })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

fn validate_part(key: &str, what: &str, part: &str) -> Result<()> {
    if part.is_empty() {
        return Err(Error::invalid_key(key, format!("{what} is empty")));
    }
    if part.contains(KEY_SEPARATOR) {
        return Err(Error::invalid_key(
            key,
            format!("{what} contains '{KEY_SEPARATOR}'"),
        ));
    }
    Ok(())
}

impl FromStr for ResourceKey {
    type Err = Error;

    /// Parse a canonical key. Exactly one separator is required; cluster-scoped
    /// keys without a namespace are rejected.
    fn from_str(key: &str) -> Result<Self> {
        match key.split_once(KEY_SEPARATOR) {
            Some((namespace, name)) if !name.contains(KEY_SEPARATOR) => {
                Self::new(namespace, name)
            }
            Some(_) => Err(Error::invalid_key(key, "unexpected key format")),
            None => Err(Error::invalid_key(key, "missing namespace separator")),
        }
    }
}

impl TryFrom<String> for ResourceKey {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ResourceKey> for String {
    fn from(key: ResourceKey) -> Self {
        key.to_string()
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{KEY_SEPARATOR}{}", self.namespace, self.name)
    }
}
