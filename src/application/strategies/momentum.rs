use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, NaiveTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::debug;

use crate::application::market_data::MarketDataManager;
use crate::config::{GapTradeDirection, GapType, MomentumConfig, PlaybookConfig};
use crate::domain::order::TradeType;
use crate::domain::play::Play;

use super::common::dte_within_bounds;
use super::traits::{CloseConditions, StrategyRunner};

/// Trades the opening gap between a symbol's previous close and its current
/// price. Entry requires the gap to fall within a configured size window and
/// (optionally) a confirmation period after market open; `with_gap` trades
/// continue the gap's direction (buy calls on a gap up, puts on a gap down),
/// `fade_gap` trades bet on a reversal. Open plays are closed on a time basis
/// only (same-day exit near the close, or a maximum holding period) since the
/// gap itself has no ongoing profit/loss trigger of its own.
pub struct GapMomentumStrategy {
    name: String,
    market_data: Arc<MarketDataManager>,
    market_open: NaiveTime,
    market_close: NaiveTime,
}

impl GapMomentumStrategy {
    pub fn new(name: impl Into<String>, market_data: Arc<MarketDataManager>, market_open: NaiveTime, market_close: NaiveTime) -> Self {
        GapMomentumStrategy {
            name: name.into(),
            market_data,
            market_open,
            market_close,
        }
    }

    fn confirmation_period_elapsed(&self, momentum: &MomentumConfig) -> bool {
        let now = Utc::now().time();
        if now < self.market_open {
            return false;
        }
        (now - self.market_open) >= Duration::minutes(momentum.confirmation_period_minutes)
    }

    fn gap_within_bounds(&self, gap_pct: Decimal, momentum: &MomentumConfig) -> bool {
        let magnitude = gap_pct.abs();
        if magnitude < momentum.min_gap_pct {
            return false;
        }
        if let Some(max) = momentum.max_gap_pct {
            if magnitude > max {
                return false;
            }
        }
        match momentum.gap_type {
            Some(GapType::Up) => gap_pct > Decimal::ZERO,
            Some(GapType::Down) => gap_pct < Decimal::ZERO,
            None => true,
        }
    }

    /// Whether `trade_type` is the leg `direction` calls for on a gap of
    /// `gap_pct`: `with_gap` continues the gap (calls on a gap up, puts on a
    /// gap down), `fade_gap` takes the opposite side.
    fn trade_type_matches_direction(&self, trade_type: TradeType, gap_pct: Decimal, direction: GapTradeDirection) -> bool {
        let gapped_up = gap_pct > Decimal::ZERO;
        let wants_call = match direction {
            GapTradeDirection::WithGap => gapped_up,
            GapTradeDirection::FadeGap => !gapped_up,
        };
        match trade_type {
            TradeType::Call => wants_call,
            TradeType::Put => !wants_call,
        }
    }

    async fn gap_pct(&self, symbol: &str) -> Option<Decimal> {
        let current = self.market_data.stock_price(symbol).await.ok()?;
        let previous_close = self.market_data.previous_close(symbol).await.ok()?;
        if previous_close.is_zero() {
            return None;
        }
        Some((current - previous_close) / previous_close * dec!(100))
    }
}

#[async_trait]
impl StrategyRunner for GapMomentumStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    async fn evaluate_new_plays(&self, candidates: Vec<Play>, config: &PlaybookConfig) -> Vec<Play> {
        let today = Utc::now().date_naive();
        let momentum = &config.momentum;
        let mut ready = Vec::new();
        for play in candidates {
            if !self.validate_play(&play) || !dte_within_bounds(&play, today, config.dte_min, config.dte_max) {
                continue;
            }
            if momentum.wait_for_confirmation && !self.confirmation_period_elapsed(momentum) {
                continue;
            }
            let Some(gap_pct) = self.gap_pct(&play.symbol).await else {
                debug!(play_id = %play.play_id, "could not compute gap for entry check");
                continue;
            };
            if !self.gap_within_bounds(gap_pct, momentum) || !self.trade_type_matches_direction(play.trade_type, gap_pct, momentum.trade_direction) {
                continue;
            }
            ready.push(play);
        }
        ready
    }

    async fn evaluate_open_plays(&self, candidates: Vec<Play>, config: &PlaybookConfig) -> Vec<(Play, CloseConditions)> {
        let today = Utc::now().date_naive();
        let now_time = Utc::now().time();
        let momentum = &config.momentum;
        let mut closing = Vec::new();

        for play in candidates {
            let opened_on = play.logging.opened_at.map(|dt| dt.date_naive()).unwrap_or(play.creation_date);

            if let Some(max_hold) = momentum.max_hold_days {
                let held_days = (today - opened_on).num_days();
                if held_days >= max_hold {
                    closing.push((
                        play,
                        CloseConditions {
                            should_close: true,
                            is_time_exit: true,
                            exit_reason: format!("held {held_days} days, at or past max_hold_days of {max_hold}"),
                            ..CloseConditions::none()
                        },
                    ));
                    continue;
                }
            }

            if momentum.same_day_exit && opened_on == today {
                let due = now_time >= self.market_close || (self.market_close - now_time) <= Duration::minutes(momentum.exit_minutes_before_close);
                if due {
                    closing.push((
                        play,
                        CloseConditions {
                            should_close: true,
                            is_time_exit: true,
                            exit_reason: "same-day exit window before market close".into(),
                            ..CloseConditions::none()
                        },
                    ));
                }
            }
        }
        closing
    }
}
