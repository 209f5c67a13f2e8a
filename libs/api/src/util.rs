/// Текущее Unix-время в миллисекундах.
pub fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// Разбить строку вида `"a, b,,c"` на непустые элементы.
///
/// Используется для списков brokers / topics из env и CLI.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Идентификатор session для логов: member id без префикса client id.
pub fn session_id(member_id: &str, client_id: &str) -> String {
    let prefix = format!("{client_id}-");
    member_id
        .strip_prefix(prefix.as_str())
        .unwrap_or(member_id)
        .to_string()
}
