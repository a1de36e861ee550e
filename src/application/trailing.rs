use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::info;

use crate::config::TrailingConfig;
use crate::domain::play::{ActivationThreshold, Play, TrailingBasis, TrailingHistoryEntry};

fn hundred() -> Decimal {
    Decimal::from(100)
}

/// Maintains the trailing TP1 (floor) / TP2 (ceiling) state machine for an
/// open play. One call to [`TrailingEngine::update`] advances a single play
/// by one cycle; there is no cross-play ordering.
#[derive(Clone, Copy)]
pub struct TrailingEngine;

impl TrailingEngine {
    pub fn new() -> Self {
        TrailingEngine
    }

    pub fn update(
        &self,
        play: &mut Play,
        config: &TrailingConfig,
        current_premium: Decimal,
        original_tp: Option<Decimal>,
        is_end_of_day: bool,
        today: NaiveDate,
    ) {
        if !config.enabled || !play.take_profit.trailing_enabled {
            return;
        }

        Self::update_high_water_mark(play, current_premium);

        if !play.trailing_state.activated {
            if self.activation_met(play, current_premium, config) {
                play.trailing_state.activated = true;
                self.init_on_activation(play, config, current_premium, original_tp, today);
                info!(play_id = %play.play_id, premium = %current_premium, "trailing stop activated");
            }
            return;
        }

        self.update_tp1(play, config, current_premium, is_end_of_day, today);
        self.update_tp2(play, config, current_premium, original_tp);
    }

    fn entry_premium(play: &Play) -> Decimal {
        play.logging
            .premium_at_open
            .or(play.entry_point.entry_premium)
            .unwrap_or_default()
    }

    fn update_high_water_mark(play: &mut Play, current_premium: Decimal) {
        let hwm = play.trailing_state.high_water_mark;
        let favorable = if play.is_long() {
            hwm.map_or(current_premium, |h| h.max(current_premium))
        } else {
            hwm.map_or(current_premium, |h| h.min(current_premium))
        };
        play.trailing_state.high_water_mark = Some(favorable);
    }

    fn activation_met(&self, play: &Play, current_premium: Decimal, config: &TrailingConfig) -> bool {
        let threshold = match &play.take_profit.trailing_activation_threshold_pct {
            Some(ActivationThreshold::Disabled) => return false,
            Some(ActivationThreshold::Explicit(pct)) => *pct,
            Some(ActivationThreshold::Default) | None => config.activation_threshold_pct,
        };
        let entry = Self::entry_premium(play);
        if entry.is_zero() {
            return false;
        }
        let gain_pct = if play.is_long() {
            (current_premium - entry) / entry * hundred()
        } else {
            (entry - current_premium) / entry * hundred()
        };
        gain_pct >= threshold
    }

    fn init_on_activation(
        &self,
        play: &mut Play,
        config: &TrailingConfig,
        current_premium: Decimal,
        original_tp: Option<Decimal>,
        today: NaiveDate,
    ) {
        let entry = Self::entry_premium(play);

        let tp1 = match config.tp1.basis {
            TrailingBasis::ProfitCapture => entry * (Decimal::ONE + config.tp1.start_capture_pct / hundred()),
            TrailingBasis::DistanceFromCurrent => current_premium * (Decimal::ONE - config.tp1.start_distance_below_pct / hundred()),
        };
        play.trailing_state.tp1_level = Some(tp1);
        play.trailing_state.last_eod_premium = Some(entry);
        play.trailing_state.last_ratchet_date = Some(today);

        let tp2 = if config.tp2.start_at_original_tp {
            original_tp.unwrap_or(current_premium)
        } else {
            match config.tp2.basis {
                TrailingBasis::ProfitCapture => entry * (Decimal::ONE + config.tp2.capture_pct / hundred()),
                TrailingBasis::DistanceFromCurrent => current_premium * (Decimal::ONE + config.tp2.distance_above_pct / hundred()),
            }
        };
        play.trailing_state.tp2_level = Some(tp2);
    }

    fn update_tp1(&self, play: &mut Play, config: &TrailingConfig, current_premium: Decimal, is_end_of_day: bool, today: NaiveDate) {
        match config.tp1.basis {
            TrailingBasis::DistanceFromCurrent => {
                let candidate = current_premium * (Decimal::ONE - config.tp1.start_distance_below_pct / hundred());
                let existing = play.trailing_state.tp1_level.unwrap_or(candidate);
                play.trailing_state.tp1_level = Some(existing.max(candidate));
            }
            TrailingBasis::ProfitCapture => {
                if is_end_of_day && play.trailing_state.last_ratchet_date != Some(today) {
                    self.ratchet_tp1(play, config, current_premium, today);
                }
            }
        }
    }

    /// End-of-day ratchet for the `profit_capture` basis (scenario 6).
    fn ratchet_tp1(&self, play: &mut Play, config: &TrailingConfig, current_premium: Decimal, today: NaiveDate) {
        let entry = Self::entry_premium(play);
        let reference = play.trailing_state.last_eod_premium.unwrap_or(entry);
        play.trailing_state.last_eod_premium = Some(current_premium);
        play.trailing_state.last_ratchet_date = Some(today);

        if reference.is_zero() {
            return;
        }
        let rise_pct = (current_premium - reference) / reference * hundred();
        if rise_pct < config.tp1.ratcheting.min_rise_since_last_pct {
            return;
        }

        let proposed_capture_pct = config.tp1.start_capture_pct + rise_pct * config.tp1.ratcheting.ratchet_factor;
        let proposed_level = entry * (Decimal::ONE + proposed_capture_pct / hundred());
        let gap_floor = current_premium * (Decimal::ONE - config.tp1.min_gap_below_current_pct / hundred());

        if proposed_level > gap_floor {
            return;
        }

        let existing = play.trailing_state.tp1_level;
        if existing.is_none_or(|e| proposed_level > e) {
            play.trailing_state.history.push(TrailingHistoryEntry {
                date: today,
                old_level: existing,
                new_level: proposed_level,
                reason: format!("eod ratchet: rise {rise_pct:.2}% since last check"),
            });
            play.trailing_state.tp1_level = Some(proposed_level);
        }
    }

    fn update_tp2(&self, play: &mut Play, config: &TrailingConfig, current_premium: Decimal, original_tp: Option<Decimal>) {
        let floor = original_tp.unwrap_or_default();
        let candidate = match config.tp2.basis {
            TrailingBasis::DistanceFromCurrent => current_premium * (Decimal::ONE + config.tp2.distance_above_pct / hundred()),
            TrailingBasis::ProfitCapture => {
                Self::entry_premium(play) * (Decimal::ONE + config.tp2.capture_pct / hundred())
            }
        };
        let existing = play.trailing_state.tp2_level.unwrap_or(candidate);
        play.trailing_state.tp2_level = Some(existing.max(candidate).max(floor));
    }
}

impl Default for TrailingEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RatchetConfig, Tp1Config, Tp2Config};
    use crate::domain::order::{OrderAction, TradeType};
    use crate::domain::play::{ConditionalPlays, EntryPoint, PlayLogging, PlayStatusInfo, StopLoss, TakeProfit, TrailingState};
    use rust_decimal_macros::dec;

    fn scenario_play() -> Play {
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
                order_type: None,
                entry_premium: Some(dec!(2.00)),
            },
            take_profit: TakeProfit {
                trailing_enabled: true,
                ..TakeProfit::default()
            },
            stop_loss: StopLoss::default(),
            status: PlayStatusInfo::default(),
            trailing_state: TrailingState {
                activated: true,
                tp1_level: Some(dec!(2.20)),
                last_eod_premium: Some(dec!(2.00)),
                ..TrailingState::default()
            },
            conditional_plays: ConditionalPlays::default(),
            logging: PlayLogging {
                premium_at_open: Some(dec!(2.00)),
                ..PlayLogging::default()
            },
            play_expiration_date: NaiveDate::from_ymd_opt(2025, 12, 12).unwrap(),
            creation_date: NaiveDate::from_ymd_opt(2025, 11, 1).unwrap(),
            creator: "test".into(),
        }
    }

    fn scenario_config() -> TrailingConfig {
        TrailingConfig {
            enabled: true,
            activation_threshold_pct: dec!(5),
            update_mode: crate::config::TrailingUpdateMode::EndOfDay,
            tp1: Tp1Config {
                basis: TrailingBasis::ProfitCapture,
                start_capture_pct: dec!(10),
                start_distance_below_pct: dec!(10),
                min_gap_below_current_pct: dec!(20),
                ratcheting: RatchetConfig {
                    min_rise_since_last_pct: dec!(30),
                    ratchet_factor: dec!(1.0),
                },
            },
            tp2: Tp2Config::default(),
        }
    }

    #[test]
    fn scenario_6_day1_ratchet_is_rejected_by_gap_check() {
        let mut play = scenario_play();
        let config = scenario_config();
        let engine = TrailingEngine::new();
        let day1 = NaiveDate::from_ymd_opt(2025, 11, 10).unwrap();

        engine.update(&mut play, &config, dec!(2.60), None, true, day1);

        assert_eq!(play.trailing_state.tp1_level, Some(dec!(2.20)));
        assert_eq!(play.trailing_state.last_eod_premium, Some(dec!(2.60)));
    }

    #[test]
    fn scenario_6_day2_ratchet_is_also_rejected_by_gap_check() {
        let mut play = scenario_play();
        let config = scenario_config();
        let engine = TrailingEngine::new();
        let day1 = NaiveDate::from_ymd_opt(2025, 11, 10).unwrap();
        let day2 = NaiveDate::from_ymd_opt(2025, 11, 11).unwrap();

        engine.update(&mut play, &config, dec!(2.60), None, true, day1);
        engine.update(&mut play, &config, dec!(3.50), None, true, day2);

        assert_eq!(play.trailing_state.tp1_level, Some(dec!(2.20)));
        assert_eq!(play.trailing_state.last_eod_premium, Some(dec!(3.50)));
    }

    fn lenient_ratchet_config() -> TrailingConfig {
        let mut config = scenario_config();
        config.tp1.start_capture_pct = dec!(0);
        config.tp1.min_gap_below_current_pct = dec!(0);
        config.tp1.ratcheting.min_rise_since_last_pct = dec!(10);
        config.tp1.ratcheting.ratchet_factor = dec!(0.3);
        config
    }

    #[test]
    fn ratchet_applies_when_gap_check_passes() {
        let mut play = scenario_play();
        let config = lenient_ratchet_config();
        let engine = TrailingEngine::new();
        let day1 = NaiveDate::from_ymd_opt(2025, 11, 10).unwrap();

        // rise = (3.00-2.00)/2.00 = 50% -> capture = 0 + 0.3*50 = 15% -> level = 2.30
        engine.update(&mut play, &config, dec!(3.00), None, true, day1);

        assert_eq!(play.trailing_state.tp1_level, Some(dec!(2.30)));
        assert_eq!(play.trailing_state.history.len(), 1);
    }

    #[test]
    fn tp1_level_never_decreases_across_cycles() {
        let mut play = scenario_play();
        let config = lenient_ratchet_config();
        let engine = TrailingEngine::new();
        let day1 = NaiveDate::from_ymd_opt(2025, 11, 10).unwrap();
        let day2 = NaiveDate::from_ymd_opt(2025, 11, 11).unwrap();

        engine.update(&mut play, &config, dec!(3.00), None, true, day1);
        let after_day1 = play.trailing_state.tp1_level.unwrap();
        engine.update(&mut play, &config, dec!(2.90), None, true, day2);
        assert!(play.trailing_state.tp1_level.unwrap() >= after_day1);
    }

    #[test]
    fn activation_is_gated_by_threshold() {
        let mut play = scenario_play();
        play.trailing_state = TrailingState::default();
        let config = scenario_config();
        let engine = TrailingEngine::new();
        let today = NaiveDate::from_ymd_opt(2025, 11, 10).unwrap();

        engine.update(&mut play, &config, dec!(2.05), None, false, today);
        assert!(!play.trailing_state.activated);

        engine.update(&mut play, &config, dec!(2.20), None, false, today);
        assert!(play.trailing_state.activated);
    }

    #[test]
    fn tp2_anchors_at_original_tp_when_configured() {
        let mut play = scenario_play();
        play.trailing_state = TrailingState::default();
        let mut config = scenario_config();
        config.tp2.start_at_original_tp = true;
        let engine = TrailingEngine::new();
        let today = NaiveDate::from_ymd_opt(2025, 11, 10).unwrap();

        engine.update(&mut play, &config, dec!(2.20), Some(dec!(3.00)), false, today);
        assert_eq!(play.trailing_state.tp2_level, Some(dec!(3.00)));
    }
}
