// ABOUTME: Groups metadata identifiers by type for deploy and retrieve payloads.
// ABOUTME: Renders the package.xml document the metadata API consumes.

use serde::Serialize;
use std::collections::BTreeMap;

use super::object::{ObjectKey, SfObject};
use crate::types::{MetadataType, NameError};

/// Anything that names a metadata component.
pub trait ManifestEntry {
    fn object_type(&self) -> &str;
    fn full_name(&self) -> &str;
}

impl ManifestEntry for SfObject {
    fn object_type(&self) -> &str {
        self.object_type.as_str()
    }

    fn full_name(&self) -> &str {
        &self.full_name
    }
}

impl ManifestEntry for ObjectKey {
    fn object_type(&self) -> &str {
        self.object_type.as_str()
    }

    fn full_name(&self) -> &str {
        &self.full_name
    }
}

impl ManifestEntry for (&str, &str) {
    fn object_type(&self) -> &str {
        self.0
    }

    fn full_name(&self) -> &str {
        self.1
    }
}

/// Type-grouped component names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Manifest {
    types: BTreeMap<MetadataType, Vec<String>>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a manifest, normalizing each entry's type name.
    ///
    /// # Errors
    ///
    /// Returns `NameError` if a type name cannot be normalized.
    pub fn from_entries<'a, I, E>(entries: I) -> Result<Self, NameError>
    where
        I: IntoIterator<Item = &'a E>,
        E: ManifestEntry + 'a,
    {
        let mut manifest = Manifest::new();
        for entry in entries {
            let object_type = MetadataType::new(entry.object_type())?;
            manifest.push(object_type, entry.full_name());
        }
        Ok(manifest)
    }

    /// Build a manifest from identities whose types are already normalized.
    pub fn from_keys<'a, I>(keys: I) -> Self
    where
        I: IntoIterator<Item = &'a ObjectKey>,
    {
        let mut manifest = Manifest::new();
        for key in keys {
            manifest.push(key.object_type.clone(), &key.full_name);
        }
        manifest
    }

    pub fn push(&mut self, object_type: MetadataType, full_name: &str) {
        let names = self.types.entry(object_type).or_default();
        if !names.iter().any(|n| n == full_name) {
            names.push(full_name.to_string());
        }
    }

    pub fn get(&self, object_type: &str) -> Option<&[String]> {
        let key = MetadataType::new(object_type).ok()?;
        self.types.get(&key).map(Vec::as_slice)
    }

    pub fn types(&self) -> impl Iterator<Item = (&MetadataType, &[String])> {
        self.types.iter().map(|(t, names)| (t, names.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Total number of component names across all types.
    pub fn len(&self) -> usize {
        self.types.values().map(Vec::len).sum()
    }

    /// Render as a `package.xml` document.
    pub fn to_package_xml(&self, api_version: &str) -> String {
        let mut xml = String::from(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <Package xmlns=\"http://soap.sforce.com/2006/04/metadata\">\n",
        );
        for (object_type, names) in &self.types {
            xml.push_str("    <types>\n");
            for name in names {
                xml.push_str(&format!("        <members>{}</members>\n", escape_xml(name)));
            }
            xml.push_str(&format!("        <name>{}</name>\n", object_type));
            xml.push_str("    </types>\n");
        }
        xml.push_str(&format!("    <version>{}</version>\n", escape_xml(api_version)));
        xml.push_str("</Package>\n");
        xml
    }
}

fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
