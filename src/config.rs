//! Codec-level settings shared by the serializer and parser.

use std::sync::Arc;

use serde::Deserialize;

use crate::convert::ConversionRegistry;
use crate::types::{CollectionFormat, Format};

/// Settings applied when a schema node leaves them unspecified.
///
/// Deserializes from `{"format": "uon", "collectionFormat": "pipes"}`; the
/// conversion registry is always supplied in code.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PartConfig {
    /// Format used when a node's format is `none`.
    pub format: Format,
    /// Collection format used when a node's collection format is `none`.
    pub collection_format: CollectionFormat,
    #[serde(skip)]
    registry: Arc<ConversionRegistry>,
}

impl PartConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    pub fn collection_format(mut self, collection_format: CollectionFormat) -> Self {
        self.collection_format = collection_format;
        self
    }

    /// Use a shared conversion registry (e.g. one with custom constructors).
    pub fn registry(mut self, registry: Arc<ConversionRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn conversions(&self) -> &ConversionRegistry {
        &self.registry
    }

    /// Resolve a node's format against the configured default.
    pub(crate) fn effective_format(&self, declared: Format) -> Format {
        if declared == Format::None {
            self.format
        } else {
            declared
        }
    }

    /// Resolve a node's collection format against the configured default.
    pub(crate) fn effective_collection_format(
        &self,
        declared: CollectionFormat,
    ) -> CollectionFormat {
        if declared == CollectionFormat::None {
            self.collection_format
        } else {
            declared
        }
    }
}
