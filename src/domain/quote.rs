use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A standardized option quote row. Every provider adapter normalizes its
/// vendor-specific chain payload into this shape; numeric fields default to
/// zero and `mid` is only populated when both sides are quoted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OptionQuote {
    pub occ_symbol: String,
    pub bid: Decimal,
    pub ask: Decimal,
    pub last: Decimal,
    pub mid: Decimal,
    pub volume: u64,
    pub open_interest: u64,
    pub implied_volatility: Decimal,
    pub delta: Decimal,
    pub gamma: Decimal,
    pub theta: Decimal,
    pub vega: Decimal,
    pub rho: Decimal,
}

impl OptionQuote {
    /// Computes `mid` from `bid`/`ask` when both sides are positive, per the
    /// manager's canonical-quote contract; otherwise leaves `mid` at zero.
    pub fn with_computed_mid(mut self) -> Self {
        if self.bid > Decimal::ZERO && self.ask > Decimal::ZERO {
            self.mid = (self.bid + self.ask) / Decimal::TWO;
        }
        self
    }
}

/// A single OHLCV bar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: u64,
}

/// A single row of a standardized option chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainRow {
    pub symbol: String,
    pub strike: Decimal,
    pub trade_type: crate::domain::order::TradeType,
    pub expiration: NaiveDate,
    pub quote: OptionQuote,
}

/// A snapshot of account-level figures refreshed once per cycle by the
/// capital manager.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub buying_power: Decimal,
    pub options_buying_power: Option<Decimal>,
    pub equity: Decimal,
    pub portfolio_value: Decimal,
    pub loaded_ok: bool,
    pub snapshot_instant: Option<DateTime<Utc>>,
}

impl AccountSnapshot {
    /// Prefers the options-specific buying power figure when the brokerage
    /// supplies one, falling back to the general figure otherwise.
    pub fn effective_buying_power(&self) -> Decimal {
        self.options_buying_power.unwrap_or(self.buying_power)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn mid_computed_only_when_both_sides_quoted() {
        let q = OptionQuote {
            bid: dec!(2.00),
            ask: dec!(2.10),
            ..Default::default()
        }
        .with_computed_mid();
        assert_eq!(q.mid, dec!(2.05));

        let q2 = OptionQuote {
            bid: dec!(0),
            ask: dec!(2.10),
            ..Default::default()
        }
        .with_computed_mid();
        assert_eq!(q2.mid, Decimal::ZERO);
    }

    #[test]
    fn effective_buying_power_prefers_options_specific_figure() {
        let snap = AccountSnapshot {
            buying_power: dec!(100_000),
            options_buying_power: Some(dec!(40_000)),
            ..Default::default()
        };
        assert_eq!(snap.effective_buying_power(), dec!(40_000));

        let snap2 = AccountSnapshot {
            buying_power: dec!(100_000),
            options_buying_power: None,
            ..Default::default()
        };
        assert_eq!(snap2.effective_buying_power(), dec!(100_000));
    }
}
