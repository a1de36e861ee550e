use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use tokio::sync::Mutex;

use crate::config::{CapitalConfig, PlaybookConfig};
use crate::domain::errors::OrderError;
use crate::domain::play::{Play, PlayStatus};
use crate::domain::ports::BrokerageClient;
use crate::domain::quote::AccountSnapshot;

use super::store::PlayStore;

/// The estimated capital a play will consume once its entry fills. BTO
/// (long) cost is premium-based; STO (short, e.g. cash-secured put) cost is
/// the strike-based collateral proxy. Missing premium data costs 0 and lets
/// the broker be the final arbiter.
pub fn estimated_cost(play: &Play) -> Decimal {
    let contracts = Decimal::from(play.contracts);
    if play.action.is_long() {
        play.entry_point.entry_premium.unwrap_or_default() * contracts * Decimal::from(100)
    } else {
        play.strike_price * contracts * Decimal::from(100)
    }
}

#[derive(Debug, Clone, Default)]
struct CycleSnapshot {
    account: AccountSnapshot,
    total_open: u32,
    per_symbol: HashMap<String, u32>,
    per_playbook: HashMap<String, u32>,
    deployed_capital: Decimal,
}

/// A read-only diagnostic view of the capital manager's current state.
#[derive(Debug, Clone)]
pub struct CapitalSummary {
    pub enabled: bool,
    pub buying_power: Decimal,
    pub equity: Decimal,
    pub portfolio_value: Decimal,
    pub total_open_plays: u32,
}

/// Refreshed once per cycle from the brokerage account and the play store;
/// gates new trades against account-wide, per-symbol, per-playbook, and
/// per-trade limits.
pub struct CapitalManager {
    store: Arc<PlayStore>,
    broker: Arc<dyn BrokerageClient>,
    config: CapitalConfig,
    snapshot: Mutex<CycleSnapshot>,
}

impl CapitalManager {
    pub fn new(store: Arc<PlayStore>, broker: Arc<dyn BrokerageClient>, config: CapitalConfig) -> Self {
        CapitalManager {
            store,
            broker,
            config,
            snapshot: Mutex::new(CycleSnapshot::default()),
        }
    }

    /// Snapshots account figures and open-play counts once per cycle.
    pub async fn refresh(&self) -> Result<(), OrderError> {
        let account = self.broker.get_account().await?;
        let plays = self
            .store
            .list(PlayStatus::Open)
            .unwrap_or_default()
            .into_iter()
            .chain(self.store.list(PlayStatus::PendingOpening).unwrap_or_default())
            .collect::<Vec<Play>>();

        let mut per_symbol: HashMap<String, u32> = HashMap::new();
        let mut per_playbook: HashMap<String, u32> = HashMap::new();
        let mut deployed_capital = Decimal::ZERO;
        for play in &plays {
            *per_symbol.entry(play.symbol.clone()).or_insert(0) += 1;
            *per_playbook.entry(play.playbook_name.clone()).or_insert(0) += 1;
            deployed_capital += estimated_cost(play);
        }

        let mut snapshot = self.snapshot.lock().await;
        *snapshot = CycleSnapshot {
            account,
            total_open: plays.len() as u32,
            per_symbol,
            per_playbook,
            deployed_capital,
        };
        Ok(())
    }

    /// Runs the nine ordered gates against `play`; the first failing gate
    /// wins and its reason is returned (I4).
    pub async fn check_trade(&self, play: &Play, playbook: &PlaybookConfig) -> (bool, Option<String>) {
        if !self.config.enabled {
            return (true, None);
        }

        let snapshot = self.snapshot.lock().await;

        if let Some(limit) = self.config.max_total_open_positions {
            if snapshot.total_open >= limit {
                return (
                    false,
                    Some(format!("total open positions {} >= max_total_open_positions {limit}", snapshot.total_open)),
                );
            }
        }

        let per_symbol_limit = playbook.max_open_plays_per_symbol.or(self.config.per_symbol_max_open_positions);
        if let Some(limit) = per_symbol_limit {
            let current = snapshot.per_symbol.get(&play.symbol).copied().unwrap_or(0);
            if current >= limit {
                return (
                    false,
                    Some(format!("symbol {} open plays {current} >= per-symbol limit {limit}", play.symbol)),
                );
            }
        }

        if let Some(limit) = playbook.max_open_plays {
            let current = snapshot.per_playbook.get(&play.playbook_name).copied().unwrap_or(0);
            if current >= limit {
                return (
                    false,
                    Some(format!(
                        "playbook {} open plays {current} >= max_open_plays {limit}",
                        play.playbook_name
                    )),
                );
            }
        }

        if let Some(limit) = playbook.max_contracts_per_trade {
            if play.contracts > limit {
                return (false, Some(format!("contracts {} exceeds max_contracts_per_trade {limit}", play.contracts)));
            }
        }

        let cost = estimated_cost(play);

        if let Some(limit) = playbook.max_capital_per_trade_fixed {
            if cost > limit {
                return (
                    false,
                    Some(format!("estimated_cost=${cost:.2} exceeds max_capital_per_trade_fixed=${limit:.2}")),
                );
            }
        }

        if let Some(pct) = playbook.max_capital_per_trade_pct {
            if snapshot.account.equity > Decimal::ZERO {
                let trade_pct = cost / snapshot.account.equity * Decimal::from(100);
                if trade_pct > pct {
                    return (
                        false,
                        Some(format!("trade is {trade_pct:.2}% of equity, exceeds max_capital_per_trade_pct {pct}%")),
                    );
                }
            }
        }

        if let Some(max_pct) = self.config.max_capital_deployed_pct {
            if snapshot.account.equity > Decimal::ZERO {
                let projected = (snapshot.deployed_capital + cost) / snapshot.account.equity * Decimal::from(100);
                if projected >= max_pct {
                    return (
                        false,
                        Some(format!("projected deployed capital {projected:.2}% >= max_capital_deployed_pct {max_pct}%")),
                    );
                }
            }
        }

        let headroom = snapshot.account.effective_buying_power()
            * (Decimal::from(1) - self.config.buying_power_reserve_pct / Decimal::from(100));
        if cost > headroom {
            return (
                false,
                Some(format!("estimated_cost=${cost:.2} exceeds available buying power headroom=${headroom:.2}")),
            );
        }

        (true, None)
    }

    pub async fn summary(&self) -> CapitalSummary {
        let snapshot = self.snapshot.lock().await;
        CapitalSummary {
            enabled: self.config.enabled,
            buying_power: snapshot.account.effective_buying_power(),
            equity: snapshot.account.equity,
            portfolio_value: snapshot.account.portfolio_value,
            total_open_plays: snapshot.total_open,
        }
    }
}
