/// Жизненный цикл координатора.
///
/// `Idle → Joining → Consuming → (Rebalancing → Joining → Consuming)* →
/// ShuttingDown → Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Idle,
    Joining,
    Consuming,
    Rebalancing,
    ShuttingDown,
    Stopped,
}

impl CoordinatorState {
    /// Завершающие состояния: после них worker уже не вернётся в группу.
    pub fn is_terminal(&self) -> bool {
        matches!(self, CoordinatorState::ShuttingDown | CoordinatorState::Stopped)
    }
}

impl std::fmt::Display for CoordinatorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CoordinatorState::Idle => f.write_str("idle"),
            CoordinatorState::Joining => f.write_str("joining"),
            CoordinatorState::Consuming => f.write_str("consuming"),
            CoordinatorState::Rebalancing => f.write_str("rebalancing"),
            CoordinatorState::ShuttingDown => f.write_str("shutting_down"),
            CoordinatorState::Stopped => f.write_str("stopped"),
        }
    }
}
