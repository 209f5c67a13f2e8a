use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Deserialize;

use broker_kafka::{BrokerVersion, KafkaGroupConfig};
use catalog_api_server::ApiConfig;
use consumer_engine::{CoordinatorConfig, RoutingConfig};

use crate::error::ServerError;

#[derive(Parser)]
#[command(name = "ingest-server", about = "Загрузка каталога из Kafka в document store")]
pub struct Cli {
    /// Формат логов
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text, env = "LOG_FORMAT")]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Запустить consumer и read API
    Serve(ServeArgs),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Args, Clone, Debug, Default)]
pub struct ServeArgs {
    /// Путь к TOML конфиг файлу
    #[arg(long, default_value = "config.toml", env = "CONFIG_PATH")]
    pub config: String,

    /// Kafka brokers через запятую
    #[arg(long, env = "KAFKA_BROKERS")]
    pub brokers: Option<String>,

    /// Topics через запятую
    #[arg(long, env = "KAFKA_TOPICS")]
    pub topics: Option<String>,

    /// Consumer group id
    #[arg(long, env = "KAFKA_GROUP")]
    pub group: Option<String>,

    /// Connection string MongoDB; включает backend mongo
    #[arg(long, env = "MONGO_URL")]
    pub mongo_url: Option<String>,
}

// ═══════════════════════════════════════════════════════════════
//  Config file (TOML)
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub kafka: KafkaGroupConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub coordinator: CoordinatorConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Mongo,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    pub url: Option<String>,
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default = "default_max_documents")]
    pub max_documents: usize,
    #[serde(flatten)]
    pub routing: RoutingConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            url: None,
            database: default_database(),
            max_documents: default_max_documents(),
            routing: RoutingConfig::default(),
        }
    }
}

fn default_database() -> String {
    "products".into()
}
fn default_max_documents() -> usize {
    100_000
}

pub fn load_config(path: &str) -> Result<FileConfig, ServerError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| ServerError::Config { context: "read", detail: format!("'{path}': {e}") })?;
    parse_config(&content).map_err(|e| match e {
        ServerError::Config { context, detail } => ServerError::Config { context, detail: format!("'{path}': {detail}") },
        other => other,
    })
}

pub fn parse_config(content: &str) -> Result<FileConfig, ServerError> {
    toml::from_str(content).map_err(|e| ServerError::Config { context: "parse", detail: e.to_string() })
}

// ═══════════════════════════════════════════════════════════════
//  Effective — merged config
// ═══════════════════════════════════════════════════════════════

/// Итоговая конфигурация: config.toml < env/CLI.
#[derive(Debug)]
pub struct Effective {
    pub kafka: KafkaGroupConfig,
    pub version: BrokerVersion,
    pub store: StoreConfig,
    pub coordinator: CoordinatorConfig,
    pub api: ApiConfig,
}

impl Effective {
    pub fn new(args: &ServeArgs) -> Result<Self, ServerError> {
        let file = match load_config(&args.config) {
            Ok(c) => c,
            Err(e) => {
                if std::path::Path::new(&args.config).exists() {
                    return Err(e);
                }
                FileConfig::default()
            }
        };
        Self::merge(file, args)
    }

    pub fn merge(file: FileConfig, args: &ServeArgs) -> Result<Self, ServerError> {
        let mut kafka = file.kafka;
        if let Some(brokers) = &args.brokers {
            kafka.brokers = ingest_api::split_list(brokers);
        }
        if let Some(topics) = &args.topics {
            kafka.topics = ingest_api::split_list(topics);
        }
        if let Some(group) = &args.group {
            kafka.group = group.clone();
        }

        let mut store = file.store;
        if let Some(url) = &args.mongo_url {
            store.url = Some(url.clone());
            store.backend = StoreBackend::Mongo;
        }
        if store.backend == StoreBackend::Mongo && store.url.as_deref().is_none_or(|u| u.trim().is_empty()) {
            return Err(ServerError::Config { context: "store", detail: "mongo backend requires url".into() });
        }

        let version = kafka
            .validate()
            .map_err(|e| ServerError::Config { context: "kafka", detail: e.message().to_string() })?;

        Ok(Self {
            kafka,
            version,
            store,
            coordinator: file.coordinator,
            api: file.api,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [kafka]
        brokers = ["kafka-1:9092"]
        topics = ["create.products", "create.productsLanguage"]
        group = "catalog"
        version = "2.8.1"

        [store]
        backend = "mongo"
        url = "mongodb://mongo:27017"
        products_collection = "items"

        [coordinator]
        shutdown_grace_ms = 5000

        [coordinator.backoff]
        initial_ms = 100

        [api]
        port = 9000
    "#;

    fn args() -> ServeArgs {
        ServeArgs { config: "missing-config.toml".into(), ..Default::default() }
    }

    #[test]
    fn test_parse_full_config() {
        let cfg = parse_config(SAMPLE).unwrap();
        assert_eq!(cfg.kafka.group, "catalog");
        assert_eq!(cfg.kafka.channel_buffer, 256);
        assert_eq!(cfg.store.backend, StoreBackend::Mongo);
        assert_eq!(cfg.store.routing.products_collection, "items");
        assert_eq!(cfg.store.routing.languages_collection, "product_languages");
        assert_eq!(cfg.coordinator.shutdown_grace_ms, Some(5000));
        assert_eq!(cfg.coordinator.backoff.initial_ms, 100);
        assert_eq!(cfg.coordinator.backoff.max_ms, 30_000);
        assert_eq!(cfg.api.port, 9000);
        assert!(cfg.api.enabled);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let cfg = parse_config("").unwrap();
        assert_eq!(cfg.store.backend, StoreBackend::Memory);
        assert_eq!(cfg.api.port, 8080);
        assert_eq!(cfg.api.request_timeout_ms, 15_000);
        assert!(cfg.kafka.brokers.is_empty());
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = parse_config("[kafka\nbrokers = 1").err().unwrap();
        assert!(matches!(err, ServerError::Config { context: "parse", .. }));
    }

    #[test]
    fn test_cli_overrides_file() {
        let args = ServeArgs {
            brokers: Some("a:9092, b:9092".into()),
            topics: Some("create.products".into()),
            group: Some("override".into()),
            ..args()
        };
        let eff = Effective::merge(parse_config(SAMPLE).unwrap(), &args).unwrap();
        assert_eq!(eff.kafka.brokers, vec!["a:9092", "b:9092"]);
        assert_eq!(eff.kafka.topics, vec!["create.products"]);
        assert_eq!(eff.kafka.group, "override");
        assert_eq!(eff.version.to_string(), "2.8.1");
    }

    #[test]
    fn test_missing_brokers_is_fatal() {
        let err = Effective::merge(parse_config("").unwrap(), &args()).err().unwrap();
        assert!(matches!(err, ServerError::Config { context: "kafka", .. }));
    }

    #[test]
    fn test_bad_version_is_fatal() {
        let cfg = parse_config("[kafka]\nbrokers = [\"k:9092\"]\ntopics = [\"t\"]\nversion = \"2.x\"").unwrap();
        let err = Effective::merge(cfg, &args()).err().unwrap();
        assert!(err.to_string().contains("2.x"));
    }

    #[test]
    fn test_mongo_url_switches_backend() {
        let args = ServeArgs {
            brokers: Some("k:9092".into()),
            topics: Some("t".into()),
            mongo_url: Some("mongodb://m:27017".into()),
            ..args()
        };
        let eff = Effective::merge(FileConfig::default(), &args).unwrap();
        assert_eq!(eff.store.backend, StoreBackend::Mongo);
        assert_eq!(eff.store.url.as_deref(), Some("mongodb://m:27017"));
    }

    #[test]
    fn test_mongo_without_url_is_fatal() {
        let cfg = parse_config("[kafka]\nbrokers = [\"k\"]\ntopics = [\"t\"]\n[store]\nbackend = \"mongo\"").unwrap();
        let err = Effective::merge(cfg, &args()).err().unwrap();
        assert!(matches!(err, ServerError::Config { context: "store", .. }));
    }

    #[test]
    fn test_missing_file_allowed_but_broken_file_fatal() {
        let args = ServeArgs {
            brokers: Some("k:9092".into()),
            topics: Some("t".into()),
            ..args()
        };
        assert!(Effective::new(&args).is_ok());

        let path = std::env::temp_dir().join(format!("ingest-server-broken-{}.toml", std::process::id()));
        std::fs::write(&path, "not = [valid").unwrap();
        let broken = ServeArgs { config: path.to_string_lossy().into_owned(), ..args };
        let err = Effective::new(&broken).err().unwrap();
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(err, ServerError::Config { context: "parse", .. }));
    }
}
