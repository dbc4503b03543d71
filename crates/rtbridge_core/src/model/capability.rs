//! Capability names used as registry keys.
//!
//! # Responsibility
//! - Normalize and validate capability identifiers supplied by the host.
//! - Publish the well-known capability names used by builtin modules.
//!
//! # Invariants
//! - A `CapabilityName` is never empty and always matches the canonical form.
//! - Validation is case-sensitive; uppercase variants are rejected, not folded.

use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Borrow;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Capability consumed by `kubeutil.get_connection_info`.
pub const CAPABILITY_CONNECTION_INFO: &str = "connection-info";
/// Capability consumed by `tagger.tag` and `tagger.get_tags`.
pub const CAPABILITY_TAGS: &str = "tags";

static CAPABILITY_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9]+(?:[._-][a-z0-9]+)*$").expect("valid capability name regex")
});

/// Validated capability identifier, e.g. `connection-info`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CapabilityName(String);

impl CapabilityName {
    /// Parses one capability name from host input.
    ///
    /// Surrounding whitespace is trimmed before validation.
    pub fn parse(value: &str) -> Result<Self, CapabilityNameError> {
        let normalized = value.trim();
        if normalized.is_empty() {
            return Err(CapabilityNameError::Empty);
        }
        if !CAPABILITY_NAME_RE.is_match(normalized) {
            return Err(CapabilityNameError::Invalid(normalized.to_string()));
        }
        Ok(Self(normalized.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for CapabilityName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for CapabilityName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for CapabilityName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Capability name parse errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapabilityNameError {
    Empty,
    Invalid(String),
}

impl Display for CapabilityNameError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "capability name must not be empty"),
            Self::Invalid(value) => write!(
                f,
                "capability name is invalid: {value} (expected lowercase [a-z0-9] segments joined by . _ -)"
            ),
        }
    }
}

impl Error for CapabilityNameError {}
