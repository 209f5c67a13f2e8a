use serde::Deserialize;

// ═══════════════════════════════════════════════════════════════
//  Coordinator Config
// ═══════════════════════════════════════════════════════════════

/// Параметры worker loop'а координатора.
#[derive(Debug, Clone, Deserialize)]
pub struct CoordinatorConfig {
    /// Retry policy при ошибках join/consume.
    #[serde(default)]
    pub backoff: BackoffConfig,
    /// Сколько ждать worker при shutdown, прежде чем прервать его.
    /// None = ждать без ограничения.
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: Option<u64>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            backoff: BackoffConfig::default(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
        }
    }
}

fn default_shutdown_grace_ms() -> Option<u64> {
    Some(30_000)
}

// ═══════════════════════════════════════════════════════════════
//  Backoff Config
// ═══════════════════════════════════════════════════════════════

/// Capped exponential backoff: initial, initial*m, initial*m², ... ≤ max.
#[derive(Debug, Clone, Deserialize)]
pub struct BackoffConfig {
    #[serde(default = "default_backoff_initial_ms")]
    pub initial_ms: u64,
    #[serde(default = "default_backoff_max_ms")]
    pub max_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub multiplier: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_ms: default_backoff_initial_ms(),
            max_ms: default_backoff_max_ms(),
            multiplier: default_backoff_multiplier(),
        }
    }
}

fn default_backoff_initial_ms() -> u64 {
    500
}
fn default_backoff_max_ms() -> u64 {
    30_000
}
fn default_backoff_multiplier() -> f64 {
    2.0
}

// ═══════════════════════════════════════════════════════════════
//  Routing Config
// ═══════════════════════════════════════════════════════════════

/// Имена коллекций, в которые пишутся распознанные topic'и.
#[derive(Debug, Clone, Deserialize)]
pub struct RoutingConfig {
    #[serde(default = "default_products_collection")]
    pub products_collection: String,
    #[serde(default = "default_languages_collection")]
    pub languages_collection: String,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            products_collection: default_products_collection(),
            languages_collection: default_languages_collection(),
        }
    }
}

fn default_products_collection() -> String {
    "products".into()
}
fn default_languages_collection() -> String {
    "product_languages".into()
}
