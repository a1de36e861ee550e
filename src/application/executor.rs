use std::sync::Arc;

use tracing::{info, warn};

use crate::domain::errors::{OrderError, StoreError};
use crate::domain::order::OrderType;
use crate::domain::ports::BrokerageClient;
use crate::domain::play::{Play, SlMode};
use crate::domain::quote::OptionQuote;

use super::lifecycle::LifecycleEngine;
use super::market_data::MarketDataManager;
use super::strategies::CloseConditions;

/// Resolves a limit price from the latest quote for the order type a play's
/// entry/exit leg requests, submits the order, and records the submission
/// through the lifecycle engine. Submission is idempotent: a play that
/// already carries a live order id for the leg being submitted is returned
/// unchanged rather than double-submitted.
pub struct OrderExecutor {
    market_data: Arc<MarketDataManager>,
    broker: Arc<dyn BrokerageClient>,
    lifecycle: Arc<LifecycleEngine>,
}

#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error(transparent)]
    Order(#[from] OrderError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Provider(#[from] crate::domain::errors::ProviderError),
}

fn limit_price_for(order_type: OrderType, quote: &OptionQuote) -> Option<rust_decimal::Decimal> {
    match order_type {
        OrderType::Market => None,
        OrderType::LimitAtBid => Some(quote.bid),
        OrderType::LimitAtAsk => Some(quote.ask),
        OrderType::LimitAtMid => {
            if quote.mid.is_zero() {
                Some(quote.last)
            } else {
                Some(quote.mid)
            }
        }
        OrderType::LimitAtLast => Some(quote.last),
    }
}

impl OrderExecutor {
    pub fn new(market_data: Arc<MarketDataManager>, broker: Arc<dyn BrokerageClient>, lifecycle: Arc<LifecycleEngine>) -> Self {
        OrderExecutor {
            market_data,
            broker,
            lifecycle,
        }
    }

    /// Submits a play's primary entry order and transitions it to
    /// `PENDING_OPENING`. A play that already has a primary order id is
    /// returned as-is.
    pub async fn submit_entry(&self, play: Play) -> Result<Play, ExecutionError> {
        if play.status.primary_order_id.is_some() {
            return Ok(play);
        }

        let quote = self.market_data.option_quote(&play.option_contract_symbol).await?;
        let order_type = play.entry_point.order_type.unwrap_or(OrderType::Market);
        let limit_price = limit_price_for(order_type, &quote);

        let order = self
            .broker
            .submit_order(&play.play_id, &play.option_contract_symbol, play.action, order_type, play.contracts, limit_price)
            .await?;

        info!(play_id = %play.play_id, order_id = %order.id, "entry order submitted");
        Ok(self.lifecycle.mark_entry_submitted(play, order.id)?)
    }

    /// Submits a play's exit order per the reason it is closing (profit,
    /// primary stop-loss, or time exit) and transitions it to
    /// `PENDING_CLOSING`. A play already mid-exit is returned as-is.
    pub async fn submit_exit(&self, play: Play, conditions: &CloseConditions) -> Result<Play, ExecutionError> {
        if play.status.closing_order_id.is_some() {
            return Ok(play);
        }

        let exit_action = play.exit_action().map_err(|e| OrderError::UnpairedAction { action: e.to_string() })?;

        let order_type = if conditions.is_profit {
            play.take_profit.order_type.unwrap_or(OrderType::Market)
        } else if conditions.is_primary_loss {
            play.stop_loss.order_type.unwrap_or(OrderType::Market)
        } else {
            OrderType::Market
        };

        let limit_price = if order_type == OrderType::Market {
            None
        } else {
            let quote = self.market_data.option_quote(&play.option_contract_symbol).await?;
            limit_price_for(order_type, &quote)
        };

        let order = self
            .broker
            .submit_order(&play.play_id, &play.option_contract_symbol, exit_action, order_type, play.contracts, limit_price)
            .await?;

        info!(play_id = %play.play_id, order_id = %order.id, reason = %conditions.exit_reason, "exit order submitted");
        Ok(self.lifecycle.mark_exit_submitted(play, order.id)?)
    }

    /// Checks a play sitting in `PENDING_CLOSING` whose primary exit order
    /// has terminally failed (rejected/canceled/expired) without filling. If
    /// the play's stop loss uses contingency mode, submits a backup market
    /// order using `contingency_order_type` in its place.
    pub async fn check_contingency(&self, play: Play) -> Result<Play, ExecutionError> {
        let Some(order_id) = play.status.closing_order_id.clone() else {
            return Ok(play);
        };
        if play.status.contingency_order_id.is_some() {
            return Ok(play);
        }
        if play.stop_loss.sl_mode != Some(SlMode::Contingency) {
            return Ok(play);
        }

        let order = self.broker.get_order_by_id(&order_id).await?;
        if !order.status.is_terminal_failure() {
            return Ok(play);
        }

        warn!(play_id = %play.play_id, order_id = %order_id, "primary exit order failed, submitting contingency order");
        let exit_action = play.exit_action().map_err(|e| OrderError::UnpairedAction { action: e.to_string() })?;
        let order_type = play.stop_loss.contingency_order_type.unwrap_or(OrderType::Market);

        let backup = self
            .broker
            .submit_order(&play.play_id, &play.option_contract_symbol, exit_action, order_type, play.contracts, None)
            .await?;

        Ok(self.lifecycle.mark_contingency_submitted(play, backup.id)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::store::PlayStore;
    use crate::domain::order::{OrderAction, TradeType};
    use crate::domain::play::{ConditionalPlays, EntryPoint, PlayLogging, PlayStatus, PlayStatusInfo, StopLoss, TakeProfit, TrailingState};
    use crate::infrastructure::mock::{MockBroker, MockProvider};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use tempfile::tempdir;

    fn play() -> Play {
        Play {
            play_id: "p1".into(),
            symbol: "SPY".into(),
            trade_type: TradeType::Call,
            option_contract_symbol: "SPY251212C00590000".into(),
            strike_price: dec!(590),
            expiration_date: NaiveDate::from_ymd_opt(2025, 12, 12).unwrap(),
            contracts: 1,
            action: OrderAction::BuyToOpen,
            strategy_name: "long_call".into(),
            playbook_name: "default".into(),
            entry_point: EntryPoint {
                target_stock_price: dec!(450),
                order_type: Some(OrderType::LimitAtAsk),
                entry_premium: None,
            },
            take_profit: TakeProfit::default(),
            stop_loss: StopLoss::default(),
            status: PlayStatusInfo::default(),
            trailing_state: TrailingState::default(),
            conditional_plays: ConditionalPlays::default(),
            logging: PlayLogging::default(),
            play_expiration_date: NaiveDate::from_ymd_opt(2025, 12, 12).unwrap(),
            creation_date: NaiveDate::from_ymd_opt(2025, 11, 1).unwrap(),
            creator: "test".into(),
        }
    }

    fn executor() -> (OrderExecutor, Arc<PlayStore>, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let store = Arc::new(PlayStore::new(dir.path()).unwrap());
        let broker = Arc::new(MockBroker::default());
        let provider = Arc::new(MockProvider::new("mock-vendor"));
        provider.set_option_quote(
            "SPY251212C00590000",
            OptionQuote {
                bid: dec!(1.95),
                ask: dec!(2.05),
                ..Default::default()
            },
        );
        let market_data = Arc::new(MarketDataManager::new(provider, Vec::new(), &crate::config::MarketDataConfig::default()));
        let lifecycle = Arc::new(LifecycleEngine::new(store.clone(), broker.clone()));
        (OrderExecutor::new(market_data, broker, lifecycle), store, dir)
    }

    #[test]
    fn limit_at_mid_falls_back_to_last_when_mid_is_zero() {
        let quote_without_spread = OptionQuote {
            bid: dec!(0),
            ask: dec!(0),
            mid: dec!(0),
            last: dec!(1.85),
            ..Default::default()
        };
        assert_eq!(limit_price_for(OrderType::LimitAtMid, &quote_without_spread), Some(dec!(1.85)));

        let quote_with_spread = OptionQuote {
            bid: dec!(1.95),
            ask: dec!(2.05),
            mid: dec!(2.00),
            last: dec!(1.85),
            ..Default::default()
        };
        assert_eq!(limit_price_for(OrderType::LimitAtMid, &quote_with_spread), Some(dec!(2.00)));
    }

    #[tokio::test]
    async fn submit_entry_transitions_to_pending_opening() {
        let (executor, store, _dir) = executor();
        let p = play();
        store.save(&p).unwrap();

        let pending = executor.submit_entry(p).await.unwrap();
        assert_eq!(pending.status.status, PlayStatus::PendingOpening);
        assert!(pending.status.primary_order_id.is_some());
    }

    #[tokio::test]
    async fn submit_entry_is_idempotent() {
        let (executor, store, _dir) = executor();
        let mut p = play();
        p.status.primary_order_id = Some("already-submitted".into());
        store.save(&p).unwrap();

        let result = executor.submit_entry(p.clone()).await.unwrap();
        assert_eq!(result.status.primary_order_id, Some("already-submitted".into()));
    }

    #[tokio::test]
    async fn submit_exit_transitions_to_pending_closing() {
        let (executor, store, _dir) = executor();
        let mut p = play();
        p.status.status = PlayStatus::Open;
        store.save(&p).unwrap();

        let conditions = CloseConditions {
            should_close: true,
            is_profit: true,
            exit_reason: "take profit reached".into(),
            ..CloseConditions::none()
        };
        let pending = executor.submit_exit(p, &conditions).await.unwrap();
        assert_eq!(pending.status.status, PlayStatus::PendingClosing);
    }
}
