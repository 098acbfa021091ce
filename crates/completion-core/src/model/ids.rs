use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of a completable item or completion context.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ntiid(String);

impl Ntiid {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Normalized form used as a container key.
    #[must_use]
    pub fn key(&self) -> String {
        container_key(&self.0)
    }
}

impl fmt::Display for Ntiid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Ntiid {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Ntiid {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Stable identifier of a principal (user) that completes items.
///
/// Equality is exact; use [`PrincipalId::matches`] for the case-insensitive
/// comparison the containers apply.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(String);

impl PrincipalId {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-insensitive identity check, matching container key semantics.
    #[must_use]
    pub fn matches(&self, other: &Self) -> bool {
        container_key(&self.0) == container_key(&other.0)
    }

    #[must_use]
    pub fn key(&self) -> String {
        container_key(&self.0)
    }
}

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PrincipalId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for PrincipalId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Maps an opaque host identity (session, user object) to a principal id.
pub trait PrincipalResolver {
    fn principal_id(&self) -> PrincipalId;
}

impl PrincipalResolver for PrincipalId {
    fn principal_id(&self) -> PrincipalId {
        self.clone()
    }
}

impl PrincipalResolver for str {
    fn principal_id(&self) -> PrincipalId {
        PrincipalId::new(self)
    }
}

impl PrincipalResolver for String {
    fn principal_id(&self) -> PrincipalId {
        PrincipalId::new(self.as_str())
    }
}

/// Anything that can be reduced to an item key.
///
/// Containers accept raw ids and full item objects interchangeably; both are
/// normalized here before touching storage.
pub trait ItemKey {
    fn item_ntiid(&self) -> &str;

    fn item_key(&self) -> String {
        container_key(self.item_ntiid())
    }
}

impl ItemKey for str {
    fn item_ntiid(&self) -> &str {
        self
    }
}

impl ItemKey for String {
    fn item_ntiid(&self) -> &str {
        self
    }
}

impl ItemKey for Ntiid {
    fn item_ntiid(&self) -> &str {
        &self.0
    }
}

impl<T: ItemKey + ?Sized> ItemKey for &T {
    fn item_ntiid(&self) -> &str {
        (**self).item_ntiid()
    }
}

/// Case-insensitive key normalization shared by every container.
#[must_use]
pub fn container_key(raw: &str) -> String {
    raw.to_lowercase()
}
