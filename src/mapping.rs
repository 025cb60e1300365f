//! Field mappings
//!
//! A field mapping tells the extractor which element on the page holds each
//! field. It is an ordered map of `field name -> CSS selector` with one
//! reserved key, `container`, locating the repeating element each record is
//! read from.
//!
//! ```yaml
//! container: .product-item
//! titulo: h3.product-title
//! precio: .price
//! descripcion: .product-desc
//! ```

use crate::record::{POSITION_FIELD, SYSTEM_FIELDS, TIMESTAMP_FIELD};

use eyre::{Context, Result};
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

/// Reserved mapping key for the container selector
pub const CONTAINER_KEY: &str = "container";

/// Container selector used when a mapping doesn't name one
pub const DEFAULT_CONTAINER: &str = "div";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldMapping {
    container: String,
    fields: Vec<(String, String)>,
}

impl FieldMapping {
    /// Build a validated mapping from a container selector and ordered fields
    pub fn new<I, K, V>(container: impl Into<String>, fields: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mapping = Self {
            container: container.into(),
            fields: fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        };
        mapping.validate()?;
        Ok(mapping)
    }

    /// Build a mapping from raw ordered pairs, picking out the reserved
    /// `container` key.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut container = None;
        let mut fields = Vec::new();
        for (key, value) in pairs {
            let key = key.into();
            if key == CONTAINER_KEY {
                container = Some(value.into());
            } else {
                fields.push((key, value.into()));
            }
        }
        Self::new(
            container.unwrap_or_else(|| DEFAULT_CONTAINER.to_string()),
            fields,
        )
    }

    /// Read a mapping file. `.json`/`.json5` files are parsed as JSON5,
    /// everything else as YAML.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read field mapping: {}", path.display()))?;

        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json") || e.eq_ignore_ascii_case("json5"));

        let mapping: Self = if is_json {
            json5::from_str(&content)
                .with_context(|| format!("Failed to parse field mapping: {}", path.display()))?
        } else {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse field mapping: {}", path.display()))?
        };

        log::debug!(
            "Loaded field mapping from {} ({} field(s), container '{}')",
            path.display(),
            mapping.fields.len(),
            mapping.container
        );
        Ok(mapping)
    }

    /// Check the mapping at the boundary, before it reaches the extractor
    pub fn validate(&self) -> Result<()> {
        if self.container.trim().is_empty() {
            eyre::bail!("Container selector must not be empty");
        }

        let mut seen = HashSet::new();
        for (name, selector) in &self.fields {
            if name.trim().is_empty() {
                eyre::bail!("Field names must not be empty");
            }
            if selector.trim().is_empty() {
                eyre::bail!("Field '{}' has an empty selector", name);
            }
            if SYSTEM_FIELDS.contains(&name.as_str()) {
                eyre::bail!(
                    "Field '{}' collides with a field the scraper fills in itself",
                    name
                );
            }
            if !seen.insert(name.as_str()) {
                eyre::bail!("Field '{}' is mapped more than once", name);
            }
        }
        Ok(())
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    /// Ordered `(field, selector)` pairs, container excluded
    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Columns a structured-mode record carries, in order
    pub fn header(&self) -> Vec<String> {
        [TIMESTAMP_FIELD, POSITION_FIELD]
            .into_iter()
            .chain(self.field_names())
            .map(str::to_string)
            .collect()
    }
}

impl<'de> Deserialize<'de> for FieldMapping {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OrderedVisitor;

        impl<'de> Visitor<'de> for OrderedVisitor {
            type Value = FieldMapping;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of field names to CSS selectors")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut pairs: Vec<(String, String)> = Vec::new();
                while let Some((key, value)) = map.next_entry::<String, String>()? {
                    pairs.push((key, value));
                }
                FieldMapping::from_pairs(pairs).map_err(serde::de::Error::custom)
            }
        }

        deserializer.deserialize_map(OrderedVisitor)
    }
}
