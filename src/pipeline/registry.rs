//! Maps a detected product category to the vendor that can resolve it.
//!
//! Classification is a case-insensitive substring test of the vendor name
//! against the category text. The extractor's vocabulary never contains a
//! vendor name, so in practice only hand-built requests reach a vendor.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::config::RunConfig;
use crate::error::ConfigError;
use crate::vendors::{HpeResolver, LenovoResolver, PartResolver, VendorKind};

/// Vendors in classification order.
const CLASSIFICATION_ORDER: [VendorKind; 2] = [VendorKind::Lenovo, VendorKind::Hpe];

/// Vendor classification plus the resolver registered for each vendor.
pub struct VendorRegistry {
    resolvers: HashMap<VendorKind, Arc<dyn PartResolver>>,
}

impl VendorRegistry {
    /// A registry with no resolvers registered.
    pub fn empty() -> Self {
        Self {
            resolvers: HashMap::new(),
        }
    }

    /// Registry with the HTTP resolvers for every supported vendor.
    pub fn with_default_resolvers(config: &RunConfig) -> Result<Self, ConfigError> {
        let mut registry = Self::empty();
        registry.register(Arc::new(LenovoResolver::new(config)?));
        registry.register(Arc::new(HpeResolver::new(config)?));
        Ok(registry)
    }

    /// Register (or replace) the resolver for its vendor.
    pub fn register(&mut self, resolver: Arc<dyn PartResolver>) {
        let vendor = resolver.vendor();
        debug!(vendor = %vendor, "Registered part resolver");
        self.resolvers.insert(vendor, resolver);
    }

    /// Classify a category: Lenovo first, then HPE.
    pub fn resolver_for(&self, category: &str) -> Option<VendorKind> {
        let category = category.to_lowercase();
        CLASSIFICATION_ORDER
            .into_iter()
            .find(|vendor| category.contains(vendor.name()))
    }

    /// The resolver registered for `vendor`.
    pub fn resolver(&self, vendor: VendorKind) -> Option<Arc<dyn PartResolver>> {
        self.resolvers.get(&vendor).cloned()
    }
}
