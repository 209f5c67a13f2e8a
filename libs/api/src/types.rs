use std::collections::BTreeMap;

use serde::Serialize;

// ════════════════════════════════════════════════════════════════
//  BrokerRecord
// ════════════════════════════════════════════════════════════════

/// Заголовок записи в том виде, в каком его отдал broker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordHeader {
    pub key: String,
    pub value: Option<Vec<u8>>,
}

impl RecordHeader {
    pub fn new(key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self { key: key.into(), value: Some(value.into()) }
    }
}

/// Неизменяемая запись, прочитанная из партиции.
///
/// Offset монотонно растёт в пределах одной партиции. Создаётся
/// broker-адаптером, дальше только читается.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BrokerRecord {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<Vec<u8>>,
    pub value: Vec<u8>,
    /// Timestamp в миллисекундах (Unix epoch), если broker его передал.
    pub ts_ms: Option<i64>,
    pub headers: Vec<RecordHeader>,
}

impl BrokerRecord {
    pub fn new(topic: impl Into<String>, partition: i32, offset: i64, value: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            partition,
            offset,
            key: None,
            value: value.into(),
            ts_ms: None,
            headers: Vec::new(),
        }
    }

    pub fn with_key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.headers.push(RecordHeader::new(key, value));
        self
    }

    pub fn with_ts_ms(mut self, ts_ms: i64) -> Self {
        self.ts_ms = Some(ts_ms);
        self
    }
}

// ════════════════════════════════════════════════════════════════
//  RecordEnvelope
// ════════════════════════════════════════════════════════════════

/// Нормализованное представление записи для логирования.
///
/// Ключ и значение — lossy UTF-8, заголовки без пустых ключей/значений.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RecordEnvelope {
    pub partition: i32,
    pub offset: i64,
    pub key: String,
    pub value: String,
    pub ts_ms: Option<i64>,
    pub headers: BTreeMap<String, String>,
    pub topic: String,
    pub session_id: String,
    pub generation_id: i32,
}

impl RecordEnvelope {
    pub fn new(record: &BrokerRecord, session_id: impl Into<String>, generation_id: i32) -> Self {
        Self {
            partition: record.partition,
            offset: record.offset,
            key: record
                .key
                .as_deref()
                .map(|k| String::from_utf8_lossy(k).into_owned())
                .unwrap_or_default(),
            value: String::from_utf8_lossy(&record.value).into_owned(),
            ts_ms: record.ts_ms,
            headers: extract_headers(&record.headers),
            topic: record.topic.clone(),
            session_id: session_id.into(),
            generation_id,
        }
    }
}

/// Заголовки → map. Записи с пустым ключом или пустым значением
/// отбрасываются; при повторе ключа побеждает последний.
pub fn extract_headers(headers: &[RecordHeader]) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    for header in headers {
        if header.key.is_empty() {
            continue;
        }
        let value = match header.value.as_deref() {
            Some(v) if !v.is_empty() => String::from_utf8_lossy(v).into_owned(),
            _ => continue,
        };
        map.insert(header.key.clone(), value);
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_headers_drops_empty_entries() {
        let headers = vec![
            RecordHeader::new("trace-id", "abc"),
            RecordHeader::new("", "orphan"),
            RecordHeader::new("empty", ""),
            RecordHeader { key: "null".into(), value: None },
        ];
        let map = extract_headers(&headers);
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("trace-id").map(String::as_str), Some("abc"));
    }

    #[test]
    fn test_envelope_from_record() {
        let record = BrokerRecord::new("create.products", 2, 41, br#"{"id":"p1"}"#.to_vec())
            .with_key("p1")
            .with_ts_ms(1_700_000_000_000)
            .with_header("source", "node-service");

        let env = RecordEnvelope::new(&record, "member-1", 7);
        assert_eq!(env.partition, 2);
        assert_eq!(env.offset, 41);
        assert_eq!(env.key, "p1");
        assert_eq!(env.value, r#"{"id":"p1"}"#);
        assert_eq!(env.ts_ms, Some(1_700_000_000_000));
        assert_eq!(env.headers.get("source").map(String::as_str), Some("node-service"));
        assert_eq!(env.session_id, "member-1");
        assert_eq!(env.generation_id, 7);
    }

    #[test]
    fn test_envelope_without_key() {
        let record = BrokerRecord::new("t", 0, 0, vec![0xff, b'a']);
        let env = RecordEnvelope::new(&record, "m", 1);
        assert_eq!(env.key, "");
        assert_eq!(env.value, "\u{fffd}a");
    }
}
