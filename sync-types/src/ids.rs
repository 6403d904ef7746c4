//! Identity and ordering types for SyncPad.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::WireError;

/// Key identifying a tracked document.
///
/// Backslashes are normalised to `/` and `file://` URIs are reduced to their
/// path; after that, equality is exact and case-sensitive. Any other URI
/// scheme is a non-local resource and cannot be tracked.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocPath(String);

impl DocPath {
    /// Parse a path or `file://` URI into a document key.
    pub fn new(raw: &str) -> Result<Self, WireError> {
        let path = match raw.split_once("://") {
            Some((scheme, rest)) if scheme.eq_ignore_ascii_case("file") => {
                // file://host/path -> /path
                match rest.find('/') {
                    Some(idx) => &rest[idx..],
                    None => return Err(WireError::UntrackablePath(raw.to_string())),
                }
            }
            Some(_) => return Err(WireError::UntrackablePath(raw.to_string())),
            None => raw,
        };

        if path.is_empty() {
            return Err(WireError::UntrackablePath(raw.to_string()));
        }

        Ok(Self(path.replace('\\', "/")))
    }

    /// The normalised path string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last path segment, used for user-facing messages.
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').find(|s| !s.is_empty()).unwrap_or(&self.0)
    }
}

impl TryFrom<String> for DocPath {
    type Error = WireError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<DocPath> for String {
    fn from(path: DocPath) -> Self {
        path.0
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DocPath({})", self.0)
    }
}

/// A monotonically increasing per-file version.
///
/// Starts at 0 when a file is first tracked and advances exactly once per
/// flush or refresh. Never decremented.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Version(u64);

impl Version {
    /// Create a new Version with the given value.
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the numeric value of this Version.
    pub fn value(&self) -> u64 {
        self.0
    }

    /// The version of a freshly tracked file.
    pub fn zero() -> Self {
        Self(0)
    }

    /// Increment the version by one.
    pub fn next(&self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// Check whether `other` directly follows this version.
    pub fn is_followed_by(&self, other: Version) -> bool {
        self.0.checked_add(1) == Some(other.0)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Version({})", self.0)
    }
}

/// Host-assigned identifier for one viewer connection.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Create a ConnectionId from its raw value.
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the raw value.
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

impl fmt::Debug for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConnectionId({})", self.0)
    }
}
