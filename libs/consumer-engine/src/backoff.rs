use std::time::Duration;

use crate::config::BackoffConfig;

/// Верхняя граница множителя; бесконечность и NaN из конфига сюда не доходят.
const MAX_MULTIPLIER: f64 = 64.0;

/// Состояние retry policy worker loop'а.
#[derive(Debug)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    multiplier: f64,
    current: Option<Duration>,
}

impl Backoff {
    pub fn new(config: &BackoffConfig) -> Self {
        let initial = Duration::from_millis(config.initial_ms);
        let max = Duration::from_millis(config.max_ms.max(config.initial_ms));
        Self {
            initial,
            max,
            multiplier: if config.multiplier.is_nan() {
                1.0
            } else {
                config.multiplier.clamp(1.0, MAX_MULTIPLIER)
            },
            current: None,
        }
    }

    /// Следующая задержка; каждая следующая в `multiplier` раз длиннее,
    /// но не больше `max`.
    pub fn next_delay(&mut self) -> Duration {
        let next = match self.current {
            None => self.initial,
            Some(prev) => Duration::try_from_secs_f64(prev.as_secs_f64() * self.multiplier)
                .unwrap_or(self.max)
                .min(self.max),
        };
        self.current = Some(next);
        next
    }

    /// Сбросить после успешной итерации.
    pub fn reset(&mut self) {
        self.current = None;
    }
}
