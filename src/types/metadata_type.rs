// ABOUTME: Metadata type names normalized to the remote API's PascalCase convention.
// ABOUTME: Accepts snake_case input ("apex_class") as well as canonical names ("ApexClass").

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use super::NameError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MetadataType(String);

impl MetadataType {
    pub fn new(value: &str) -> Result<Self, NameError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(NameError::Empty);
        }

        for c in trimmed.chars() {
            if !c.is_ascii_alphanumeric() && c != '_' {
                return Err(NameError::InvalidChar(c));
            }
        }

        Ok(Self(normalize(trimmed)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// `apex_class` -> `ApexClass`, `ApexClass` -> `ApexClass`, `layout` -> `Layout`.
fn normalize(name: &str) -> String {
    if name.contains('_') || name.chars().all(|c| !c.is_ascii_uppercase()) {
        name.split('_')
            .filter(|part| !part.is_empty())
            .map(capitalize)
            .collect()
    } else {
        capitalize(name)
    }
}

fn capitalize(part: &str) -> String {
    let mut chars = part.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

impl fmt::Display for MetadataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for MetadataType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for MetadataType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        MetadataType::new(&s).map_err(serde::de::Error::custom)
    }
}
