use std::fmt;

use rdkafka::config::ClientConfig;
use serde::Deserialize;

use ingest_api::IngestError;

/// Стратегия распределения партиций; в группе фиксирована.
pub const ASSIGNOR: &str = "range";

/// Начальный offset для партиций без commit'а: самый старый.
pub const OFFSET_RESET: &str = "earliest";

fn default_group() -> String {
    "catalog-ingest".into()
}

fn default_client_id() -> String {
    "catalog-ingest".into()
}

fn default_version() -> String {
    "2.1.0".into()
}

fn default_session_timeout_ms() -> u64 {
    10_000
}

fn default_channel_buffer() -> usize {
    256
}

fn default_assignment_poll_ms() -> u64 {
    500
}

// ═══════════════════════════════════════════════════════════════
//  KafkaGroupConfig
// ═══════════════════════════════════════════════════════════════

/// Параметры подключения к consumer group.
#[derive(Debug, Clone, Deserialize)]
pub struct KafkaGroupConfig {
    #[serde(default)]
    pub brokers: Vec<String>,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default = "default_group")]
    pub group: String,
    #[serde(default = "default_client_id")]
    pub client_id: String,
    /// Версия протокола broker'а, `major.minor.patch`.
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_session_timeout_ms")]
    pub session_timeout_ms: u64,
    /// Ёмкость канала записей на одну claim.
    #[serde(default = "default_channel_buffer")]
    pub channel_buffer: usize,
    /// Период проверки assignment на rebalance.
    #[serde(default = "default_assignment_poll_ms")]
    pub assignment_poll_ms: u64,
}

impl Default for KafkaGroupConfig {
    fn default() -> Self {
        Self {
            brokers: Vec::new(),
            topics: Vec::new(),
            group: default_group(),
            client_id: default_client_id(),
            version: default_version(),
            session_timeout_ms: default_session_timeout_ms(),
            channel_buffer: default_channel_buffer(),
            assignment_poll_ms: default_assignment_poll_ms(),
        }
    }
}

impl KafkaGroupConfig {
    /// Проверить обязательные поля. Ошибки kind `Config` фатальны
    /// и должны прерывать запуск до старта worker'а.
    pub fn validate(&self) -> Result<BrokerVersion, IngestError> {
        if self.brokers.iter().all(|b| b.trim().is_empty()) {
            return Err(IngestError::config("no kafka brokers configured"));
        }
        if self.topics.iter().all(|t| t.trim().is_empty()) {
            return Err(IngestError::config("no kafka topics configured"));
        }
        if self.group.trim().is_empty() {
            return Err(IngestError::config("kafka group id is empty"));
        }
        if self.channel_buffer == 0 {
            return Err(IngestError::config("kafka channel_buffer must be > 0"));
        }
        BrokerVersion::parse(&self.version)
    }

    /// Собрать rdkafka `ClientConfig` для group consumer'а.
    pub fn client_config(&self, version: &BrokerVersion) -> ClientConfig {
        let mut cfg = ClientConfig::new();
        cfg.set("bootstrap.servers", self.brokers.join(","))
            .set("group.id", &self.group)
            .set("client.id", &self.client_id)
            .set("partition.assignment.strategy", ASSIGNOR)
            .set("auto.offset.reset", OFFSET_RESET)
            .set("enable.auto.commit", "true")
            .set("enable.auto.offset.store", "false")
            .set("session.timeout.ms", self.session_timeout_ms.to_string())
            .set("broker.version.fallback", version.to_string());
        cfg
    }
}

// ═══════════════════════════════════════════════════════════════
//  BrokerVersion
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct BrokerVersion {
    pub major: u16,
    pub minor: u16,
    pub patch: u16,
}

impl BrokerVersion {
    pub fn parse(s: &str) -> Result<Self, IngestError> {
        let invalid = || IngestError::config(format!("invalid kafka version '{s}', expected major.minor.patch"));
        let mut parts = s.trim().split('.');
        let mut next = || -> Result<u16, IngestError> {
            parts.next().ok_or_else(invalid)?.parse::<u16>().map_err(|_| invalid())
        };
        let version = Self {
            major: next()?,
            minor: next()?,
            patch: next()?,
        };
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(version)
    }
}

impl fmt::Display for BrokerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ingest_api::ErrorKind;

    fn valid() -> KafkaGroupConfig {
        KafkaGroupConfig {
            brokers: vec!["kafka-1:9092".into(), "kafka-2:9092".into()],
            topics: vec!["create.products".into()],
            ..Default::default()
        }
    }

    #[test]
    fn test_version_parse() {
        assert_eq!(
            BrokerVersion::parse("2.1.0").unwrap(),
            BrokerVersion { major: 2, minor: 1, patch: 0 }
        );
        assert_eq!(BrokerVersion::parse(" 3.6.1 ").unwrap().to_string(), "3.6.1");
        for bad in ["", "2.1", "2.1.0.4", "two.1.0", "2..0", "-1.0.0"] {
            assert_eq!(BrokerVersion::parse(bad).unwrap_err().kind(), ErrorKind::Config, "{bad}");
        }
    }

    #[test]
    fn test_validate_ok() {
        assert_eq!(valid().validate().unwrap().to_string(), "2.1.0");
    }

    #[test]
    fn test_validate_missing_brokers() {
        let cfg = KafkaGroupConfig { brokers: vec![" ".into()], ..valid() };
        let err = cfg.validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
        assert!(err.message().contains("brokers"));
    }

    #[test]
    fn test_validate_empty_topics() {
        let cfg = KafkaGroupConfig { topics: vec![], ..valid() };
        assert!(cfg.validate().unwrap_err().message().contains("topics"));
    }

    #[test]
    fn test_validate_bad_version() {
        let cfg = KafkaGroupConfig { version: "latest".into(), ..valid() };
        assert!(cfg.validate().unwrap_err().message().contains("latest"));
    }

    #[test]
    fn test_client_config_properties() {
        let cfg = valid();
        let version = cfg.validate().unwrap();
        let client = cfg.client_config(&version);
        assert_eq!(client.get("bootstrap.servers"), Some("kafka-1:9092,kafka-2:9092"));
        assert_eq!(client.get("group.id"), Some("catalog-ingest"));
        assert_eq!(client.get("partition.assignment.strategy"), Some("range"));
        assert_eq!(client.get("auto.offset.reset"), Some("earliest"));
        assert_eq!(client.get("enable.auto.offset.store"), Some("false"));
        assert_eq!(client.get("broker.version.fallback"), Some("2.1.0"));
    }

    #[test]
    fn test_deserialize_defaults() {
        let cfg: KafkaGroupConfig =
            serde_json::from_value(serde_json::json!({"brokers": ["b:9092"], "topics": ["t"]})).unwrap();
        assert_eq!(cfg.group, "catalog-ingest");
        assert_eq!(cfg.channel_buffer, 256);
        assert_eq!(cfg.assignment_poll_ms, 500);
    }
}
