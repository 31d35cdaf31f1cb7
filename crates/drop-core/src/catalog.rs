//! # Download Catalog
//!
//! Maps a purchased price id to the asset it unlocks.
//! Loaded once at startup from `config/catalog.toml`:
//!
//! ```toml
//! [[items]]
//! price_id = "price_1Sxj250dru4mSFELaaA5gkTb"
//! name = "human voice (vol. 1)"
//! resource_key = "samples/human-voice-vol-1.zip"
//! size = "~484 MB"
//!
//! # Optional: issued once when a paid session maps to no item
//! [fallback]
//! name = "human voice (vol. 1)"
//! resource_key = "samples/human-voice-vol-1.zip"
//! size = "~484 MB"
//! ```

use crate::error::{DropError, DropResult};
use crate::link::FIELD_SEPARATOR;
use serde::{Deserialize, Serialize};

/// A downloadable asset in the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Payment provider price id (e.g., "price_1Sxj...").
    /// Empty for the fallback entry.
    #[serde(default)]
    pub price_id: String,

    /// Display name
    pub name: String,

    /// Storage key of the asset (e.g., "samples/human-voice-vol-1.zip")
    pub resource_key: String,

    /// Human-readable size (e.g., "~484 MB")
    pub size: String,
}

impl CatalogEntry {
    pub fn new(
        price_id: impl Into<String>,
        name: impl Into<String>,
        resource_key: impl Into<String>,
        size: impl Into<String>,
    ) -> Self {
        Self {
            price_id: price_id.into(),
            name: name.into(),
            resource_key: resource_key.into(),
            size: size.into(),
        }
    }
}

/// Static catalog of downloadable assets
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DownloadCatalog {
    #[serde(default)]
    pub items: Vec<CatalogEntry>,

    /// Issued when a paid purchase maps to no catalog item
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<CatalogEntry>,
}

impl DownloadCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry to the catalog
    pub fn add(&mut self, entry: CatalogEntry) {
        self.items.push(entry);
    }

    /// Builder: add an entry
    pub fn with_entry(mut self, entry: CatalogEntry) -> Self {
        self.add(entry);
        self
    }

    /// Builder: set the fallback entry
    pub fn with_fallback(mut self, entry: CatalogEntry) -> Self {
        self.fallback = Some(entry);
        self
    }

    /// Find the entry for a price id
    pub fn get(&self, price_id: &str) -> Option<&CatalogEntry> {
        self.items.iter().find(|e| e.price_id == price_id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Load and validate a catalog from a TOML string
    pub fn from_toml(toml_str: &str) -> DropResult<Self> {
        let catalog: Self = toml::from_str(toml_str)
            .map_err(|e| DropError::Configuration(format!("Invalid catalog: {}", e)))?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Enforce the key conventions download links rely on.
    ///
    /// Resource keys must be non-empty, relative and free of the link field
    /// separator; price ids must be unique.
    pub fn validate(&self) -> DropResult<()> {
        let mut seen = std::collections::HashSet::new();

        for entry in self.items.iter().chain(self.fallback.iter()) {
            validate_resource_key(&entry.resource_key)?;
        }

        for entry in &self.items {
            if entry.price_id.is_empty() {
                return Err(DropError::Configuration(format!(
                    "Catalog item '{}' has no price_id",
                    entry.name
                )));
            }
            if !seen.insert(entry.price_id.as_str()) {
                return Err(DropError::Configuration(format!(
                    "Duplicate price_id in catalog: {}",
                    entry.price_id
                )));
            }
        }

        Ok(())
    }
}

fn validate_resource_key(key: &str) -> DropResult<()> {
    let problem = if key.is_empty() {
        Some("is empty")
    } else if key.contains(FIELD_SEPARATOR) {
        Some("contains ':'")
    } else if key.starts_with('/') || key.split('/').any(|seg| seg == "..") {
        Some("must be a relative path without '..'")
    } else {
        None
    };

    match problem {
        Some(problem) => Err(DropError::Configuration(format!(
            "Resource key '{}' {}",
            key, problem
        ))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"
[[items]]
price_id = "price_voice"
name = "human voice (vol. 1)"
resource_key = "samples/human-voice-vol-1.zip"
size = "~484 MB"

[[items]]
price_id = "price_drums"
name = "drums"
resource_key = "samples/drums.zip"
size = "~120 MB"

[fallback]
name = "human voice (vol. 1)"
resource_key = "samples/human-voice-vol-1.zip"
size = "~484 MB"
"#;

    #[test]
    fn test_from_toml() {
        let catalog = DownloadCatalog::from_toml(CATALOG).unwrap();

        assert_eq!(catalog.len(), 2);
        assert_eq!(
            catalog.get("price_drums").map(|e| e.resource_key.as_str()),
            Some("samples/drums.zip")
        );
        assert!(catalog.get("price_unknown").is_none());
        assert_eq!(catalog.fallback.as_ref().map(|f| f.price_id.as_str()), Some(""));
    }

    #[test]
    fn test_fallback_is_optional() {
        let catalog = DownloadCatalog::from_toml(
            r#"
[[items]]
price_id = "p"
name = "n"
resource_key = "k.zip"
size = "1 MB"
"#,
        )
        .unwrap();
        assert!(catalog.fallback.is_none());
        assert!(DownloadCatalog::from_toml("").unwrap().is_empty());
    }

    #[test]
    fn test_rejects_separator_in_key() {
        let catalog = DownloadCatalog::new().with_entry(CatalogEntry::new(
            "price_x",
            "bad",
            "samples/a:b.zip",
            "1 MB",
        ));
        assert!(matches!(
            catalog.validate(),
            Err(DropError::Configuration(msg)) if msg.contains("':'")
        ));
    }

    #[test]
    fn test_rejects_traversal_and_absolute_keys() {
        for key in ["../secret.zip", "/etc/passwd", "samples/../../x", ""] {
            let catalog =
                DownloadCatalog::new().with_entry(CatalogEntry::new("p", "n", key, "1 MB"));
            assert!(catalog.validate().is_err(), "accepted {key:?}");
        }
    }

    #[test]
    fn test_rejects_duplicate_price_ids() {
        let catalog = DownloadCatalog::new()
            .with_entry(CatalogEntry::new("p", "a", "a.zip", "1 MB"))
            .with_entry(CatalogEntry::new("p", "b", "b.zip", "1 MB"));
        assert!(catalog.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_fallback_key() {
        let catalog = DownloadCatalog::new()
            .with_fallback(CatalogEntry::new("", "fallback", "x:y.zip", "1 MB"));
        assert!(catalog.validate().is_err());
    }
}
