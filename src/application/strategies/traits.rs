use async_trait::async_trait;

use crate::config::PlaybookConfig;
use crate::domain::order::OrderAction;
use crate::domain::play::{Play, SlMode};

/// Why (and how) an open play's evaluator wants to close it.
#[derive(Debug, Clone)]
pub struct CloseConditions {
    pub should_close: bool,
    pub is_profit: bool,
    pub is_primary_loss: bool,
    pub is_contingency_loss: bool,
    pub is_time_exit: bool,
    pub exit_reason: String,
    pub sl_mode: Option<SlMode>,
}

impl CloseConditions {
    pub fn none() -> Self {
        CloseConditions {
            should_close: false,
            is_profit: false,
            is_primary_loss: false,
            is_contingency_loss: false,
            is_time_exit: false,
            exit_reason: String::new(),
            sl_mode: None,
        }
    }
}

/// The interface every strategy implementation satisfies. Mirrors the
/// optional-override surface of a `BaseStrategy`-style contract, re-expressed
/// as a trait with default methods instead of inheritance.
#[async_trait]
pub trait StrategyRunner: Send + Sync {
    /// A stable identifier; also the key under which the strategy's
    /// playbook-level config is looked up.
    fn name(&self) -> &str;

    /// Lower runs earlier. Defaults to 100, overridden per play by
    /// `playbook.priority` when set.
    fn priority(&self, config: &PlaybookConfig) -> i32 {
        config.priority.unwrap_or(100)
    }

    fn is_enabled(&self, config: &PlaybookConfig) -> bool {
        config.enabled
    }

    fn default_entry_action(&self) -> OrderAction {
        OrderAction::BuyToOpen
    }

    fn exit_action_for_play(&self, play: &Play) -> Result<OrderAction, crate::domain::errors::ValidationError> {
        play.exit_action()
    }

    async fn on_cycle_start(&self) {}

    async fn on_cycle_end(&self) {}

    /// Basic structural checks every play must satisfy before this strategy
    /// will act on it (non-empty symbol, matching strategy name, contracts > 0).
    fn validate_play(&self, play: &Play) -> bool {
        !play.symbol.is_empty() && play.strategy_name == self.name() && play.contracts > 0
    }

    /// Selects which of `candidates` (all in NEW) should have an entry order
    /// submitted this cycle.
    async fn evaluate_new_plays(&self, candidates: Vec<Play>, config: &PlaybookConfig) -> Vec<Play>;

    /// Selects which of `candidates` (all OPEN) should be closed this cycle,
    /// paired with the reason.
    async fn evaluate_open_plays(&self, candidates: Vec<Play>, config: &PlaybookConfig) -> Vec<(Play, CloseConditions)>;
}
