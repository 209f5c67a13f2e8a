use ingest_api::{IngestError, Product, SupportingLanguage};

use crate::config::RoutingConfig;

// ═══════════════════════════════════════════════════════════════
//  CatalogTopic — закрытый набор распознаваемых topic'ов
// ═══════════════════════════════════════════════════════════════

pub const PRODUCTS_TOPIC: &str = "create.products";
pub const PRODUCT_LANGUAGES_TOPIC: &str = "create.productsLanguage";

/// Topic, для которого есть decode + persist. Всё остальное —
/// «topic not found»: запись коммитится без вставки.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CatalogTopic {
    Products,
    ProductLanguages,
}

impl CatalogTopic {
    pub fn from_name(topic: &str) -> Option<Self> {
        match topic {
            PRODUCTS_TOPIC => Some(CatalogTopic::Products),
            PRODUCT_LANGUAGES_TOPIC => Some(CatalogTopic::ProductLanguages),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CatalogTopic::Products => PRODUCTS_TOPIC,
            CatalogTopic::ProductLanguages => PRODUCT_LANGUAGES_TOPIC,
        }
    }

    /// Декодировать payload в типизированный документ и вернуть его
    /// в виде JSON для store.
    pub fn decode(&self, payload: &[u8]) -> Result<serde_json::Value, IngestError> {
        match self {
            CatalogTopic::Products => {
                let product: Product = serde_json::from_slice(payload)?;
                Ok(serde_json::to_value(product)?)
            }
            CatalogTopic::ProductLanguages => {
                let language: SupportingLanguage = serde_json::from_slice(payload)?;
                Ok(serde_json::to_value(language)?)
            }
        }
    }
}

impl std::fmt::Display for CatalogTopic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ═══════════════════════════════════════════════════════════════
//  Routing — topic → collection
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct Routing {
    products_collection: String,
    languages_collection: String,
}

impl Routing {
    pub fn new(config: &RoutingConfig) -> Self {
        Self {
            products_collection: config.products_collection.clone(),
            languages_collection: config.languages_collection.clone(),
        }
    }

    pub fn collection(&self, topic: CatalogTopic) -> &str {
        match topic {
            CatalogTopic::Products => &self.products_collection,
            CatalogTopic::ProductLanguages => &self.languages_collection,
        }
    }
}

impl Default for Routing {
    fn default() -> Self {
        Self::new(&RoutingConfig::default())
    }
}
