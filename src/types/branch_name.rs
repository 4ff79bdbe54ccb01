// ABOUTME: Validated git branch and environment names.
// ABOUTME: Rejects names git would refuse before any repository is touched.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NameError {
    #[error("name cannot be empty")]
    Empty,

    #[error("name cannot start with '{0}'")]
    BadStart(char),

    #[error("name cannot end with '{0}'")]
    BadEnd(String),

    #[error("name cannot contain '..'")]
    DoubleDot,

    #[error("invalid character in name: '{0}'")]
    InvalidChar(char),
}

/// A branch name git will accept as `refs/heads/<name>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BranchName(String);

impl BranchName {
    pub fn new(value: &str) -> Result<Self, NameError> {
        if value.is_empty() {
            return Err(NameError::Empty);
        }

        if let Some(c) = value.chars().next()
            && (c == '-' || c == '/' || c == '.')
        {
            return Err(NameError::BadStart(c));
        }

        for suffix in ["/", ".lock", "."] {
            if value.ends_with(suffix) {
                return Err(NameError::BadEnd(suffix.to_string()));
            }
        }

        if value.contains("..") {
            return Err(NameError::DoubleDot);
        }

        for c in value.chars() {
            if c.is_whitespace() || c.is_control() || "~^:?*[\\".contains(c) {
                return Err(NameError::InvalidChar(c));
            }
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Fully qualified local ref, e.g. `refs/heads/int/uat-42`.
    pub fn local_ref(&self) -> String {
        format!("refs/heads/{}", self.0)
    }
}

impl fmt::Display for BranchName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for BranchName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for BranchName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        BranchName::new(&s).map_err(serde::de::Error::custom)
    }
}

/// Environment names double as file names in the state directory, so they
/// are restricted to lowercase alphanumerics, `-` and `_`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EnvironmentName(String);

impl EnvironmentName {
    pub fn new(value: &str) -> Result<Self, NameError> {
        if value.is_empty() {
            return Err(NameError::Empty);
        }

        if let Some(c) = value.chars().next()
            && (c == '-' || c == '_')
        {
            return Err(NameError::BadStart(c));
        }

        for c in value.chars() {
            if !c.is_ascii_lowercase() && !c.is_ascii_digit() && c != '-' && c != '_' {
                return Err(NameError::InvalidChar(c));
            }
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EnvironmentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for EnvironmentName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for EnvironmentName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        EnvironmentName::new(&s).map_err(serde::de::Error::custom)
    }
}
