use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::domain::play::{Play, StopLoss, TakeProfit};

/// Default target-price entry buffer: a play's target stock price is
/// considered "reached" once the underlying trades within this distance.
pub const DEFAULT_ENTRY_BUFFER: Decimal = dec!(0.10);

pub fn entry_price_within_buffer(current: Decimal, target: Decimal, buffer: Decimal) -> bool {
    (current - target).abs() <= buffer
}

/// A playbook's `dte_min`/`dte_max` entry filter, evaluated against the
/// option contract's own days-to-expiration. Unset bounds don't filter.
pub fn dte_within_bounds(play: &Play, today: chrono::NaiveDate, dte_min: Option<i64>, dte_max: Option<i64>) -> bool {
    let dte = play.dte(today);
    if let Some(min) = dte_min {
        if dte < min {
            return false;
        }
    }
    if let Some(max) = dte_max {
        if dte > max {
            return false;
        }
    }
    true
}

/// Evaluates a long position's take-profit triggers (premium/underlying
/// rising favorably). Any populated field can independently trigger.
pub fn long_tp_hit(tp: &TakeProfit, entry_premium: Decimal, current_premium: Decimal, entry_stock: Decimal, current_stock: Decimal) -> bool {
    if let Some(abs) = tp.absolute_price {
        if current_premium >= abs {
            return true;
        }
    }
    if let Some(pct) = tp.premium_pct {
        if entry_premium > Decimal::ZERO && current_premium >= entry_premium * (Decimal::ONE + pct / Decimal::from(100)) {
            return true;
        }
    }
    if let Some(pct) = tp.stock_price_pct {
        if entry_stock > Decimal::ZERO && current_stock >= entry_stock * (Decimal::ONE + pct / Decimal::from(100)) {
            return true;
        }
    }
    false
}

pub fn long_sl_hit(sl: &StopLoss, entry_premium: Decimal, current_premium: Decimal, entry_stock: Decimal, current_stock: Decimal) -> bool {
    if let Some(abs) = sl.absolute_price {
        if current_premium <= abs {
            return true;
        }
    }
    if let Some(pct) = sl.premium_pct {
        if entry_premium > Decimal::ZERO && current_premium <= entry_premium * (Decimal::ONE - pct / Decimal::from(100)) {
            return true;
        }
    }
    if let Some(pct) = sl.stock_price_pct {
        if entry_stock > Decimal::ZERO && current_stock <= entry_stock * (Decimal::ONE - pct / Decimal::from(100)) {
            return true;
        }
    }
    false
}

/// Short-position mirror: take-profit is a *falling* premium (buy back
/// cheaper); stop-loss is a *rising* premium by the configured multiple.
pub fn short_tp_hit(tp: &TakeProfit, entry_premium: Decimal, current_premium: Decimal) -> bool {
    if let Some(abs) = tp.absolute_price {
        if current_premium <= abs {
            return true;
        }
    }
    if let Some(pct) = tp.premium_pct {
        if entry_premium > Decimal::ZERO && current_premium <= entry_premium * (Decimal::ONE - pct / Decimal::from(100)) {
            return true;
        }
    }
    false
}

pub fn short_sl_hit(sl: &StopLoss, entry_premium: Decimal, current_premium: Decimal) -> bool {
    if let Some(abs) = sl.absolute_price {
        if current_premium >= abs {
            return true;
        }
    }
    if let Some(pct) = sl.premium_pct {
        if entry_premium > Decimal::ZERO && current_premium >= entry_premium * (Decimal::ONE + pct / Decimal::from(100)) {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_tp_triggers_on_premium_pct() {
        let tp = TakeProfit {
            premium_pct: Some(dec!(50)),
            ..TakeProfit::default()
        };
        assert!(long_tp_hit(&tp, dec!(2.00), dec!(3.00), dec!(450), dec!(450)));
        assert!(!long_tp_hit(&tp, dec!(2.00), dec!(2.50), dec!(450), dec!(450)));
    }

    #[test]
    fn long_sl_triggers_on_absolute_price() {
        let sl = StopLoss {
            absolute_price: Some(dec!(1.00)),
            ..StopLoss::default()
        };
        assert!(long_sl_hit(&sl, dec!(2.00), dec!(0.90), dec!(450), dec!(440)));
        assert!(!long_sl_hit(&sl, dec!(2.00), dec!(1.50), dec!(450), dec!(440)));
    }

    #[test]
    fn short_tp_triggers_on_falling_premium() {
        let tp = TakeProfit {
            premium_pct: Some(dec!(50)),
            ..TakeProfit::default()
        };
        assert!(short_tp_hit(&tp, dec!(1.00), dec!(0.40)));
        assert!(!short_tp_hit(&tp, dec!(1.00), dec!(0.60)));
    }

    #[test]
    fn short_sl_triggers_on_rising_premium() {
        let sl = StopLoss {
            premium_pct: Some(dec!(200)),
            ..StopLoss::default()
        };
        assert!(short_sl_hit(&sl, dec!(1.00), dec!(3.05)));
        assert!(!short_sl_hit(&sl, dec!(1.00), dec!(2.50)));
    }

    #[test]
    fn entry_buffer_is_symmetric() {
        assert!(entry_price_within_buffer(dec!(450.10), dec!(450.00), DEFAULT_ENTRY_BUFFER));
        assert!(!entry_price_within_buffer(dec!(450.10), dec!(449.00), DEFAULT_ENTRY_BUFFER));
    }

    #[test]
    fn dte_bounds_reject_outside_the_window() {
        use crate::domain::order::{OrderAction, TradeType};
        use crate::domain::play::{ConditionalPlays, EntryPoint, PlayLogging, PlayStatusInfo, StopLoss, TakeProfit, TrailingState};
        use chrono::NaiveDate;

        let today = NaiveDate::from_ymd_opt(2025, 11, 1).unwrap();
        let play = Play {
            play_id: "p1".into(),
            symbol: "SPY".into(),
            trade_type: TradeType::Call,
            option_contract_symbol: "SPY251201C00590000".into(),
            strike_price: dec!(590),
            expiration_date: NaiveDate::from_ymd_opt(2025, 12, 1).unwrap(), // 30 DTE
            contracts: 1,
            action: OrderAction::BuyToOpen,
            strategy_name: "long_call".into(),
            playbook_name: "default".into(),
            entry_point: EntryPoint {
                target_stock_price: dec!(450),
                order_type: None,
                entry_premium: None,
            },
            take_profit: TakeProfit::default(),
            stop_loss: StopLoss::default(),
            status: PlayStatusInfo::default(),
            trailing_state: TrailingState::default(),
            conditional_plays: ConditionalPlays::default(),
            logging: PlayLogging::default(),
            play_expiration_date: NaiveDate::from_ymd_opt(2025, 12, 1).unwrap(),
            creation_date: today,
            creator: "test".into(),
        };

        assert!(dte_within_bounds(&play, today, Some(7), Some(45)));
        assert!(!dte_within_bounds(&play, today, Some(31), None));
        assert!(!dte_within_bounds(&play, today, None, Some(29)));
        assert!(dte_within_bounds(&play, today, None, None));
    }
}
