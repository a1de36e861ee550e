use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::errors::OrderError;

/// Whether an option contract is a call or a put.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradeType {
    Call,
    Put,
}

impl fmt::Display for TradeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeType::Call => write!(f, "CALL"),
            TradeType::Put => write!(f, "PUT"),
        }
    }
}

/// The four order actions a play can carry. Entry actions (BTO, STO) open a
/// position; exit actions (STC, BTC) close one. Each entry action pairs with
/// exactly one exit action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderAction {
    BuyToOpen,
    SellToClose,
    SellToOpen,
    BuyToClose,
}

impl fmt::Display for OrderAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderAction::BuyToOpen => "BTO",
            OrderAction::SellToClose => "STC",
            OrderAction::SellToOpen => "STO",
            OrderAction::BuyToClose => "BTC",
        };
        write!(f, "{s}")
    }
}

impl OrderAction {
    pub fn is_buy(self) -> bool {
        matches!(self, OrderAction::BuyToOpen | OrderAction::BuyToClose)
    }

    pub fn is_sell(self) -> bool {
        !self.is_buy()
    }

    pub fn is_opening(self) -> bool {
        matches!(self, OrderAction::BuyToOpen | OrderAction::SellToOpen)
    }

    pub fn is_closing(self) -> bool {
        !self.is_opening()
    }

    /// True for plays resulting in a long (owned) position after the entry fills.
    pub fn is_long(self) -> bool {
        matches!(self, OrderAction::BuyToOpen | OrderAction::SellToClose)
    }

    pub fn is_short(self) -> bool {
        !self.is_long()
    }

    /// The exit action paired with this entry action. Errors if called on an
    /// action that is already a closing action.
    pub fn closing_action(self) -> Result<OrderAction, OrderError> {
        match self {
            OrderAction::BuyToOpen => Ok(OrderAction::SellToClose),
            OrderAction::SellToOpen => Ok(OrderAction::BuyToClose),
            other => Err(OrderError::UnpairedAction {
                action: other.to_string(),
            }),
        }
    }

    /// The entry action paired with this exit action. Errors if called on an
    /// action that is already an opening action.
    pub fn opening_action(self) -> Result<OrderAction, OrderError> {
        match self {
            OrderAction::SellToClose => Ok(OrderAction::BuyToOpen),
            OrderAction::BuyToClose => Ok(OrderAction::SellToOpen),
            other => Err(OrderError::UnpairedAction {
                action: other.to_string(),
            }),
        }
    }
}

/// Broker order type, governing how a limit price (if any) is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Market,
    LimitAtBid,
    LimitAtAsk,
    LimitAtMid,
    LimitAtLast,
}

/// Order status values consumed from the brokerage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    New,
    PendingNew,
    Accepted,
    PartiallyFilled,
    Filled,
    Canceled,
    Rejected,
    Expired,
}

impl OrderStatus {
    pub fn is_terminal_fill(self) -> bool {
        matches!(self, OrderStatus::Filled)
    }

    pub fn is_terminal_failure(self) -> bool {
        matches!(self, OrderStatus::Canceled | OrderStatus::Rejected | OrderStatus::Expired)
    }
}

/// A brokerage order, either in flight or reflecting a past fill.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub play_id: String,
    pub action: OrderAction,
    pub order_type: OrderType,
    pub quantity: u32,
    pub limit_price: Option<Decimal>,
    pub status: OrderStatus,
    pub filled_price: Option<Decimal>,
}

/// A fully specified option contract identity, independent of any play.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionContract {
    pub underlying: String,
    pub expiration: NaiveDate,
    pub trade_type: TradeType,
    pub strike: Decimal,
    pub occ_symbol: String,
}
