use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use crate::application::market_data::MarketDataManager;
use crate::config::PlaybookConfig;
use crate::domain::play::Play;

use super::common::{dte_within_bounds, entry_price_within_buffer, long_sl_hit, long_tp_hit, DEFAULT_ENTRY_BUFFER};
use super::traits::{CloseConditions, StrategyRunner};

/// Long calls and long puts bought outright (BTO/STC). Entry triggers when
/// the underlying trades within a buffer of the play's target stock price;
/// exit triggers on either take-profit or stop-loss premium thresholds.
pub struct LongOptionStrategy {
    name: String,
    market_data: Arc<MarketDataManager>,
}

impl LongOptionStrategy {
    pub fn new(name: impl Into<String>, market_data: Arc<MarketDataManager>) -> Self {
        LongOptionStrategy {
            name: name.into(),
            market_data,
        }
    }
}

#[async_trait]
impl StrategyRunner for LongOptionStrategy {
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
        let mut closing = Vec::new();
        for play in candidates {
            let Ok(quote) = self.market_data.option_quote(&play.option_contract_symbol).await else {
                continue;
            };
            let Ok(stock_price) = self.market_data.stock_price(&play.symbol).await else {
                continue;
            };
            let entry_premium = play.logging.premium_at_open.unwrap_or_default();
            let entry_stock = play.logging.stock_price_at_open.unwrap_or_default();

            if long_tp_hit(&play.take_profit, entry_premium, quote.last, entry_stock, stock_price) {
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

            if long_sl_hit(&play.stop_loss, entry_premium, quote.last, entry_stock, stock_price) {
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
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn make_play() -> Play {
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
                premium_at_open: Some(dec!(2.00)),
                stock_price_at_open: Some(dec!(450.10)),
                ..PlayLogging::default()
            },
            play_expiration_date: NaiveDate::from_ymd_opt(2025, 12, 12).unwrap(),
            creation_date: NaiveDate::from_ymd_opt(2025, 11, 1).unwrap(),
            creator: "test".into(),
        }
    }

    fn manager_with_price(symbol: &str, price: rust_decimal::Decimal) -> Arc<MarketDataManager> {
        let provider = Arc::new(MockProvider::new("mock-vendor"));
        provider.set_stock_price(symbol, price);
        Arc::new(MarketDataManager::new(provider, Vec::new(), &crate::config::MarketDataConfig::default()))
    }

    #[tokio::test]
    async fn entry_triggers_within_buffer() {
        let market_data = manager_with_price("SPY", dec!(450.10));
        let strategy = LongOptionStrategy::new("long_call", market_data);
        let mut play = make_play();
        play.entry_point.target_stock_price = dec!(450.00);
        let ready = strategy.evaluate_new_plays(vec![play], &PlaybookConfig::default()).await;
        assert_eq!(ready.len(), 1);
    }

    #[tokio::test]
    async fn entry_does_not_trigger_outside_buffer() {
        let market_data = manager_with_price("SPY", dec!(460.00));
        let strategy = LongOptionStrategy::new("long_call", market_data);
        let play = make_play();
        let ready = strategy.evaluate_new_plays(vec![play], &PlaybookConfig::default()).await;
        assert!(ready.is_empty());
    }

    #[tokio::test]
    async fn entry_rejected_outside_dte_window() {
        let market_data = manager_with_price("SPY", dec!(450.10));
        let strategy = LongOptionStrategy::new("long_call", market_data);
        let mut play = make_play();
        play.entry_point.target_stock_price = dec!(450.00);
        play.expiration_date = Utc::now().date_naive() + chrono::Duration::days(2);
        play.play_expiration_date = play.expiration_date;

        let playbook = PlaybookConfig {
            dte_min: Some(7),
            ..PlaybookConfig::default()
        };
        let ready = strategy.evaluate_new_plays(vec![play], &playbook).await;
        assert!(ready.is_empty(), "a 2 DTE play should be rejected by a dte_min of 7");
    }
}
