use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use crate::application::market_data::MarketDataManager;
use crate::config::PlaybookConfig;
use crate::domain::play::Play;

use super::common::{dte_within_bounds, entry_price_within_buffer, short_sl_hit, short_tp_hit, DEFAULT_ENTRY_BUFFER};
use super::traits::{CloseConditions, StrategyRunner};

/// Cash-secured puts sold for premium (STO/BTC). Entry triggers when the
/// underlying trades within a buffer of the target strike-selection price;
/// positions are also forced closed inside `FORCED_CLOSE_DTE` days of
/// expiration regardless of profit/loss, to avoid assignment risk.
const FORCED_CLOSE_DTE: i64 = 21;

pub struct CashSecuredPutStrategy {
    name: String,
    market_data: Arc<MarketDataManager>,
}

impl CashSecuredPutStrategy {
    pub fn new(name: impl Into<String>, market_data: Arc<MarketDataManager>) -> Self {
        CashSecuredPutStrategy {
            name: name.into(),
            market_data,
        }
    }
}

#[async_trait]
impl StrategyRunner for CashSecuredPutStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    async fn evaluate_new_plays(&self, candidates: Vec<Play>, config: &PlaybookConfig) -> Vec<Play> {
        let today = Utc::now().date_naive();
        let mut ready = Vec::new();
        for play in candidates {
            if !self.validate_play(&play) || !dte_within_bounds(&play, today, config.dte_min, config.dte_max) {
                continue;
            }
            match self.market_data.stock_price(&play.symbol).await {
                Ok(price) => {
                    if entry_price_within_buffer(price, play.entry_point.target_stock_price, DEFAULT_ENTRY_BUFFER) {
                        ready.push(play);
                    }
                }
                Err(e) => debug!(play_id = %play.play_id, error = %e, "could not price underlying for entry check"),
            }
        }
        ready
    }

    async fn evaluate_open_plays(&self, candidates: Vec<Play>, _config: &PlaybookConfig) -> Vec<(Play, CloseConditions)> {
        let today = Utc::now().date_naive();
        let mut closing = Vec::new();
        for play in candidates {
            let dte = (play.expiration_date - today).num_days();
            if dte <= FORCED_CLOSE_DTE {
                closing.push((
                    play,
                    CloseConditions {
                        should_close: true,
                        is_time_exit: true,
                        exit_reason: format!("within {FORCED_CLOSE_DTE} DTE of expiration"),
                        ..CloseConditions::none()
                    },
                ));
                continue;
            }

            let Ok(quote) = self.market_data.option_quote(&play.option_contract_symbol).await else {
                continue;
            };
            let entry_premium = play.logging.premium_at_open.unwrap_or_default();

            if short_tp_hit(&play.take_profit, entry_premium, quote.last) {
                closing.push((
                    play,
                    CloseConditions {
                        should_close: true,
                        is_profit: true,
                        exit_reason: "take profit reached".into(),
                        ..CloseConditions::none()
                    },
                ));
                continue;
            }

            if short_sl_hit(&play.stop_loss, entry_premium, quote.last) {
                let sl_mode = play.stop_loss.sl_mode;
                closing.push((
                    play,
                    CloseConditions {
                        should_close: true,
                        is_primary_loss: true,
                        is_contingency_loss: matches!(sl_mode, Some(crate::domain::play::SlMode::Contingency)),
                        exit_reason: "stop loss reached".into(),
                        sl_mode,
                        ..CloseConditions::none()
                    },
                ));
            }
        }
        closing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::{OrderAction, TradeType};
    use crate::domain::play::{ConditionalPlays, EntryPoint, PlayLogging, PlayStatusInfo, StopLoss, TakeProfit, TrailingState};
    use crate::infrastructure::mock::MockProvider;
    use chrono::{Days, NaiveDate};
    use rust_decimal_macros::dec;

    fn make_play(expiration: NaiveDate) -> Play {
        Play {
            play_id: "p1".into(),
            symbol: "SPY".into(),
            trade_type: TradeType::Put,
            option_contract_symbol: format!("SPY{}P00430000", expiration.format("%y%m%d")),
            strike_price: dec!(430),
            expiration_date: expiration,
            contracts: 1,
            action: OrderAction::SellToOpen,
            strategy_name: "csp".into(),
            playbook_name: "default".into(),
            entry_point: EntryPoint {
                target_stock_price: dec!(450.00),
                order_type: None,
                entry_premium: None,
            },
            take_profit: TakeProfit {
                premium_pct: Some(dec!(50)),
                ..TakeProfit::default()
            },
            stop_loss: StopLoss::default(),
            status: PlayStatusInfo::default(),
            trailing_state: TrailingState::default(),
            conditional_plays: ConditionalPlays::default(),
            logging: PlayLogging {
                premium_at_open: Some(dec!(1.00)),
                stock_price_at_open: Some(dec!(450.00)),
                ..PlayLogging::default()
            },
            play_expiration_date: expiration,
            creation_date: NaiveDate::from_ymd_opt(2025, 11, 1).unwrap(),
            creator: "test".into(),
        }
    }

    fn manager() -> Arc<MarketDataManager> {
        let provider = Arc::new(MockProvider::new("mock-vendor"));
        provider.set_option_quote(
            "SPY251212P00430000",
            crate::domain::quote::OptionQuote {
                last: dec!(0.40),
                ..Default::default()
            },
        );
        Arc::new(MarketDataManager::new(provider, Vec::new(), &crate::config::MarketDataConfig::default()))
    }

    #[tokio::test]
    async fn forces_close_within_dte_window() {
        let strategy = CashSecuredPutStrategy::new("csp", manager());
        let near_expiration = Utc::now().date_naive().checked_add_days(Days::new(5)).unwrap();
        let play = make_play(near_expiration);
        let closing = strategy.evaluate_open_plays(vec![play], &PlaybookConfig::default()).await;
        assert_eq!(closing.len(), 1);
        assert!(closing[0].1.is_time_exit);
    }

    #[tokio::test]
    async fn take_profit_triggers_on_falling_premium() {
        let strategy = CashSecuredPutStrategy::new("csp", manager());
        let far_expiration = NaiveDate::from_ymd_opt(2025, 12, 12).unwrap();
        let play = make_play(far_expiration);
        let closing = strategy.evaluate_open_plays(vec![play], &PlaybookConfig::default()).await;
        assert_eq!(closing.len(), 1);
        assert!(closing[0].1.is_profit);
    }

    #[tokio::test]
    async fn entry_rejected_outside_dte_window() {
        let expiration = Utc::now().date_naive().checked_add_days(Days::new(2)).unwrap();
        let mut play = make_play(expiration);
        play.entry_point.target_stock_price = dec!(450.00);

        let provider = Arc::new(MockProvider::new("mock-vendor"));
        provider.set_stock_price("SPY", dec!(450.05));
        let market_data = Arc::new(MarketDataManager::new(provider, Vec::new(), &crate::config::MarketDataConfig::default()));
        let strategy = CashSecuredPutStrategy::new("csp", market_data);

        let playbook = PlaybookConfig {
            dte_min: Some(7),
            ..PlaybookConfig::default()
        };
        let ready = strategy.evaluate_new_plays(vec![play.clone()], &playbook).await;
        assert!(ready.is_empty(), "a 2 DTE play should be rejected by a dte_min of 7");

        let ready = strategy.evaluate_new_plays(vec![play], &PlaybookConfig::default()).await;
        assert_eq!(ready.len(), 1, "no dte bound configured should let it through");
    }
}
