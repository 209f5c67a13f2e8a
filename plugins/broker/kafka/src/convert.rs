use rdkafka::Message;
use rdkafka::message::Headers;

use ingest_api::{BrokerRecord, RecordHeader};

/// Скопировать сообщение rdkafka в `BrokerRecord`.
///
/// Пустой payload (tombstone) становится пустым value.
pub fn to_record<M: Message>(msg: &M) -> BrokerRecord {
    let headers = msg
        .headers()
        .map(|hs| {
            hs.iter()
                .map(|h| RecordHeader {
                    key: h.key.to_string(),
                    value: h.value.map(<[u8]>::to_vec),
                })
                .collect()
        })
        .unwrap_or_default();

    BrokerRecord {
        topic: msg.topic().to_string(),
        partition: msg.partition(),
        offset: msg.offset(),
        key: msg.key().map(<[u8]>::to_vec),
        value: msg.payload().map(<[u8]>::to_vec).unwrap_or_default(),
        ts_ms: msg.timestamp().to_millis(),
        headers,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rdkafka::Timestamp;
    use rdkafka::message::{Header, OwnedHeaders, OwnedMessage};

    #[test]
    fn test_to_record_copies_fields() {
        let headers = OwnedHeaders::new()
            .insert(Header { key: "trace", value: Some("abc") })
            .insert(Header { key: "empty", value: None::<&str> });
        let msg = OwnedMessage::new(
            Some(br#"{"id":"p1"}"#.to_vec()),
            Some(b"p1".to_vec()),
            "create.products".into(),
            Timestamp::CreateTime(1_700_000_000_000),
            3,
            42,
            Some(headers),
        );

        let record = to_record(&msg);
        assert_eq!(record.topic, "create.products");
        assert_eq!(record.partition, 3);
        assert_eq!(record.offset, 42);
        assert_eq!(record.key.as_deref(), Some(&b"p1"[..]));
        assert_eq!(record.value, br#"{"id":"p1"}"#.to_vec());
        assert_eq!(record.ts_ms, Some(1_700_000_000_000));
        assert_eq!(
            record.headers,
            vec![
                RecordHeader::new("trace", "abc"),
                RecordHeader { key: "empty".into(), value: None },
            ]
        );
    }

    #[test]
    fn test_to_record_tombstone_without_timestamp() {
        let msg = OwnedMessage::new(None, None, "t".into(), Timestamp::NotAvailable, 0, 7, None);
        let record = to_record(&msg);
        assert!(record.value.is_empty());
        assert!(record.key.is_none());
        assert!(record.ts_ms.is_none());
        assert!(record.headers.is_empty());
    }
}
