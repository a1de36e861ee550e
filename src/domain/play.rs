use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::errors::ValidationError;
use crate::domain::occ::parse_occ;
use crate::domain::order::{OrderAction, OrderStatus, OrderType, TradeType};

/// The lifecycle states a play can occupy. `Temp` holds OTO children awaiting
/// their parent's fill; `Invalid` parks plays that fail OCC validation for
/// operator review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlayStatus {
    New,
    PendingOpening,
    Open,
    PendingClosing,
    Closed,
    Expired,
    Temp,
    Invalid,
}

impl PlayStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, PlayStatus::Closed | PlayStatus::Expired | PlayStatus::Invalid)
    }

    /// The directory/partition name the store uses for this status.
    pub fn partition_name(self) -> &'static str {
        match self {
            PlayStatus::New => "new",
            PlayStatus::PendingOpening => "pending-opening",
            PlayStatus::Open => "open",
            PlayStatus::PendingClosing => "pending-closing",
            PlayStatus::Closed => "closed",
            PlayStatus::Expired => "expired",
            PlayStatus::Temp => "temp",
            PlayStatus::Invalid => "invalid",
        }
    }

    pub const ALL: [PlayStatus; 8] = [
        PlayStatus::New,
        PlayStatus::PendingOpening,
        PlayStatus::Open,
        PlayStatus::PendingClosing,
        PlayStatus::Closed,
        PlayStatus::Expired,
        PlayStatus::Temp,
        PlayStatus::Invalid,
    ];
}

/// How a stop loss is enforced once triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SlMode {
    Stop,
    Limit,
    Contingency,
}

/// The basis a trailing TP1 floor is computed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrailingBasis {
    ProfitCapture,
    DistanceFromCurrent,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntryPoint {
    pub target_stock_price: Decimal,
    pub order_type: Option<OrderType>,
    pub entry_premium: Option<Decimal>,
}

/// A take-profit target expressed as any combination of absolute price,
/// underlying percentage move, or premium percentage move. Any populated
/// field independently triggers when crossed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TakeProfit {
    pub absolute_price: Option<Decimal>,
    pub stock_price_pct: Option<Decimal>,
    pub premium_pct: Option<Decimal>,
    pub order_type: Option<OrderType>,
    pub trailing_enabled: bool,
    pub trailing_activation_threshold_pct: Option<ActivationThreshold>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ActivationThreshold {
    Explicit(Decimal),
    Default,
    Disabled,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StopLoss {
    pub absolute_price: Option<Decimal>,
    pub stock_price_pct: Option<Decimal>,
    pub premium_pct: Option<Decimal>,
    pub sl_mode: Option<SlMode>,
    pub order_type: Option<OrderType>,
    pub contingency_order_type: Option<OrderType>,
}

/// Append-only record of a trailing-stop level change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrailingHistoryEntry {
    pub date: NaiveDate,
    pub old_level: Option<Decimal>,
    pub new_level: Decimal,
    pub reason: String,
}

/// Mutable trailing-stop state carried on an open play.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrailingState {
    pub activated: bool,
    pub high_water_mark: Option<Decimal>,
    pub tp1_level: Option<Decimal>,
    pub tp2_level: Option<Decimal>,
    pub last_ratchet_date: Option<NaiveDate>,
    /// The premium observed at the last end-of-day ratchet evaluation, used
    /// as the "since last" reference for the next day's rise percentage.
    pub last_eod_premium: Option<Decimal>,
    pub history: Vec<TrailingHistoryEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Greeks {
    pub delta: Decimal,
    pub gamma: Decimal,
    pub theta: Decimal,
    pub vega: Decimal,
    pub rho: Decimal,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlayLogging {
    pub opened_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub premium_at_open: Option<Decimal>,
    pub premium_at_close: Option<Decimal>,
    pub stock_price_at_open: Option<Decimal>,
    pub stock_price_at_close: Option<Decimal>,
    pub greeks_at_open: Option<Greeks>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConditionalPlays {
    pub oco_triggers: Vec<String>,
    pub oto_triggers: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayStatusInfo {
    pub status: PlayStatus,
    pub primary_order_id: Option<String>,
    pub primary_order_status: Option<OrderStatus>,
    pub closing_order_id: Option<String>,
    pub closing_order_status: Option<OrderStatus>,
    pub contingency_order_id: Option<String>,
    pub contingency_order_status: Option<OrderStatus>,
    pub position_exists: bool,
    pub conditionals_handled: bool,
}

impl Default for PlayStatusInfo {
    fn default() -> Self {
        PlayStatusInfo {
            status: PlayStatus::New,
            primary_order_id: None,
            primary_order_status: None,
            closing_order_id: None,
            closing_order_status: None,
            contingency_order_id: None,
            contingency_order_status: None,
            position_exists: false,
            conditionals_handled: false,
        }
    }
}

/// The system's primary unit of work: one option position, tracked from
/// creation through entry, management, and exit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Play {
    pub play_id: String,
    pub symbol: String,
    pub trade_type: TradeType,
    pub option_contract_symbol: String,
    pub strike_price: Decimal,
    pub expiration_date: NaiveDate,
    pub contracts: u32,
    pub action: OrderAction,
    pub strategy_name: String,
    pub playbook_name: String,
    pub entry_point: EntryPoint,
    pub take_profit: TakeProfit,
    pub stop_loss: StopLoss,
    pub status: PlayStatusInfo,
    pub trailing_state: TrailingState,
    pub conditional_plays: ConditionalPlays,
    pub logging: PlayLogging,
    pub play_expiration_date: NaiveDate,
    pub creation_date: NaiveDate,
    pub creator: String,
}

impl Play {
    /// True once the play's GTD date has passed; expired plays are moved to
    /// the `Expired` partition by the lifecycle engine regardless of status.
    pub fn is_past_gtd(&self, today: NaiveDate) -> bool {
        self.play_expiration_date < today
    }

    /// Days to expiration of the option contract itself, as of `today`.
    pub fn dte(&self, today: NaiveDate) -> i64 {
        (self.expiration_date - today).num_days()
    }

    /// Cross-checks `option_contract_symbol` against the play's own fields.
    /// Any disagreement is a validation failure (P2).
    pub fn validate_occ(&self) -> Result<(), ValidationError> {
        let parsed = parse_occ(&self.option_contract_symbol).map_err(|detail| ValidationError::OccMalformed {
            play_id: self.play_id.clone(),
            occ: self.option_contract_symbol.clone(),
            detail,
        })?;

        let agrees = parsed.root == self.symbol
            && parsed.expiration == self.expiration_date
            && parsed.trade_type == self.trade_type
            && parsed.strike == self.strike_price;

        if agrees {
            Ok(())
        } else {
            Err(ValidationError::OccMismatch {
                play_id: self.play_id.clone(),
                occ: self.option_contract_symbol.clone(),
                symbol: self.symbol.clone(),
                expiration: self.expiration_date.to_string(),
                trade_type: self.trade_type.to_string(),
                strike: self.strike_price.to_string(),
            })
        }
    }

    /// The exit action paired with this play's entry action (P3).
    pub fn exit_action(&self) -> Result<OrderAction, ValidationError> {
        self.action
            .closing_action()
            .map_err(|_| ValidationError::InvalidOpeningAction {
                play_id: self.play_id.clone(),
                action: self.action.to_string(),
            })
    }

    pub fn is_long(&self) -> bool {
        self.action.is_long()
    }
}
