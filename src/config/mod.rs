use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::NaiveTime;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;

use crate::domain::errors::ConfigError;
use crate::domain::play::TrailingBasis;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    Sequential,
    Parallel,
}

impl FromStr for ExecutionMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sequential" => Ok(ExecutionMode::Sequential),
            "parallel" => Ok(ExecutionMode::Parallel),
            other => Err(ConfigError::Invalid {
                field: "strategy_orchestration.mode".into(),
                detail: format!("unknown mode '{other}'"),
            }),
        }
    }
}

impl Default for ExecutionMode {
    fn default() -> Self {
        ExecutionMode::Sequential
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OrchestrationConfig {
    pub enabled: bool,
    pub mode: ExecutionMode,
    pub max_parallel_workers: usize,
    pub dry_run: bool,
    pub max_cycles: Option<u64>,
    pub cycle_interval_secs: u64,
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        OrchestrationConfig {
            enabled: true,
            mode: ExecutionMode::Sequential,
            max_parallel_workers: 4,
            dry_run: false,
            max_cycles: None,
            cycle_interval_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub enabled: bool,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    pub enabled: bool,
    pub order: Vec<String>,
    pub max_attempts: usize,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        FallbackConfig {
            enabled: true,
            order: Vec::new(),
            max_attempts: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub max_items: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            enabled: true,
            max_items: 2048,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MarketDataConfig {
    pub primary_provider: String,
    pub providers: HashMap<String, ProviderConfig>,
    pub fallback: FallbackConfig,
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CapitalConfig {
    pub enabled: bool,
    pub max_total_open_positions: Option<u32>,
    pub per_symbol_max_open_positions: Option<u32>,
    pub max_capital_deployed_pct: Option<Decimal>,
    pub buying_power_reserve_pct: Decimal,
}

impl Default for CapitalConfig {
    fn default() -> Self {
        CapitalConfig {
            enabled: true,
            max_total_open_positions: None,
            per_symbol_max_open_positions: None,
            max_capital_deployed_pct: None,
            buying_power_reserve_pct: dec!(0),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RatchetConfig {
    pub min_rise_since_last_pct: Decimal,
    pub ratchet_factor: Decimal,
}

impl Default for RatchetConfig {
    fn default() -> Self {
        RatchetConfig {
            min_rise_since_last_pct: dec!(30),
            ratchet_factor: dec!(1.0),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Tp1Config {
    pub basis: TrailingBasis,
    pub start_capture_pct: Decimal,
    pub start_distance_below_pct: Decimal,
    pub min_gap_below_current_pct: Decimal,
    pub ratcheting: RatchetConfig,
}

impl Default for Tp1Config {
    fn default() -> Self {
        Tp1Config {
            basis: TrailingBasis::ProfitCapture,
            start_capture_pct: dec!(10),
            start_distance_below_pct: dec!(10),
            min_gap_below_current_pct: dec!(20),
            ratcheting: RatchetConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Tp2Config {
    pub basis: TrailingBasis,
    pub start_at_original_tp: bool,
    pub distance_above_pct: Decimal,
    pub capture_pct: Decimal,
}

impl Default for Tp2Config {
    fn default() -> Self {
        Tp2Config {
            basis: TrailingBasis::DistanceFromCurrent,
            start_at_original_tp: true,
            distance_above_pct: dec!(10),
            capture_pct: dec!(20),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrailingUpdateMode {
    EndOfDay,
    EveryCycle,
}

impl Default for TrailingUpdateMode {
    fn default() -> Self {
        TrailingUpdateMode::EndOfDay
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrailingConfig {
    pub enabled: bool,
    pub activation_threshold_pct: Decimal,
    pub update_mode: TrailingUpdateMode,
    pub tp1: Tp1Config,
    pub tp2: Tp2Config,
}

impl Default for TrailingConfig {
    fn default() -> Self {
        TrailingConfig {
            enabled: true,
            activation_threshold_pct: dec!(5),
            update_mode: TrailingUpdateMode::EndOfDay,
            tp1: Tp1Config::default(),
            tp2: Tp2Config::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl Default for SessionWindow {
    fn default() -> Self {
        SessionWindow {
            start: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
            end: NaiveTime::from_hms_opt(16, 0, 0).unwrap(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MarketHoursConfig {
    pub regular_hours: SessionWindow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapType {
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapTradeDirection {
    WithGap,
    FadeGap,
}

impl Default for GapTradeDirection {
    fn default() -> Self {
        GapTradeDirection::WithGap
    }
}

/// Playbook knobs specific to the gap-momentum strategy. Unused by any other
/// strategy.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MomentumConfig {
    pub min_gap_pct: Decimal,
    pub max_gap_pct: Option<Decimal>,
    pub gap_type: Option<GapType>,
    pub trade_direction: GapTradeDirection,
    pub wait_for_confirmation: bool,
    pub confirmation_period_minutes: i64,
    pub same_day_exit: bool,
    pub exit_minutes_before_close: i64,
    pub max_hold_days: Option<i64>,
}

impl Default for MomentumConfig {
    fn default() -> Self {
        MomentumConfig {
            min_gap_pct: dec!(1.0),
            max_gap_pct: None,
            gap_type: None,
            trade_direction: GapTradeDirection::WithGap,
            wait_for_confirmation: false,
            confirmation_period_minutes: 15,
            same_day_exit: false,
            exit_minutes_before_close: 15,
            max_hold_days: None,
        }
    }
}

/// Per-strategy / per-playbook parameter set.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PlaybookConfig {
    pub enabled: bool,
    pub max_open_plays: Option<u32>,
    pub max_open_plays_per_symbol: Option<u32>,
    pub max_contracts_per_trade: Option<u32>,
    pub max_capital_per_trade_fixed: Option<Decimal>,
    pub max_capital_per_trade_pct: Option<Decimal>,
    pub dte_min: Option<i64>,
    pub dte_max: Option<i64>,
    pub take_profit_pct: Option<Decimal>,
    pub stop_loss_pct: Option<Decimal>,
    pub priority: Option<i32>,
    pub momentum: MomentumConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub strategy_orchestration: OrchestrationConfig,
    pub market_data_providers: MarketDataConfig,
    pub capital_management: CapitalConfig,
    pub trailing: TrailingConfig,
    pub market_hours: MarketHoursConfig,
    pub strategies: HashMap<String, PlaybookConfig>,
    pub store_root: PathBuf,
}

impl Config {
    /// Reads and parses a TOML config file, applying `<PROVIDER>_API_KEY`
    /// environment overrides for any provider already named in the file.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let mut config: Config = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source: Box::new(source),
        })?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        for (name, provider) in self.market_data_providers.providers.iter_mut() {
            let env_key = format!("{}_API_KEY", name.to_uppercase());
            if let Ok(value) = std::env::var(&env_key) {
                provider.api_key = Some(value);
            }
        }
    }

    /// Cross-field checks the type system can't express on its own.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let provider_count = self.market_data_providers.providers.len();
        if self.market_data_providers.fallback.enabled
            && self.market_data_providers.fallback.max_attempts > provider_count.max(1)
        {
            return Err(ConfigError::Invalid {
                field: "market_data_providers.fallback.max_attempts".into(),
                detail: format!(
                    "max_attempts ({}) exceeds the number of configured providers ({provider_count})",
                    self.market_data_providers.fallback.max_attempts
                ),
            });
        }

        if let Some(pct) = self.capital_management.max_capital_deployed_pct {
            if pct < Decimal::ZERO || pct > dec!(100) {
                return Err(ConfigError::Invalid {
                    field: "capital_management.max_capital_deployed_pct".into(),
                    detail: format!("{pct} is outside [0, 100]"),
                });
            }
        }

        if self.capital_management.buying_power_reserve_pct < Decimal::ZERO
            || self.capital_management.buying_power_reserve_pct > dec!(100)
        {
            return Err(ConfigError::Invalid {
                field: "capital_management.buying_power_reserve_pct".into(),
                detail: format!("{} is outside [0, 100]", self.capital_management.buying_power_reserve_pct),
            });
        }

        Ok(())
    }
}
