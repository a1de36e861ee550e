use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;

use crate::domain::errors::{OrderError, ProviderError};
use crate::domain::order::{Order, OrderAction, OrderType};
use crate::domain::quote::{AccountSnapshot, Candle, ChainRow, OptionQuote};

/// Abstract contract every market-data vendor adapter implements. The core
/// never depends on a concrete vendor; it depends only on this trait.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn stock_price(&self, symbol: &str) -> Result<Decimal, ProviderError>;

    async fn option_quote(&self, occ_symbol: &str) -> Result<OptionQuote, ProviderError>;

    async fn option_chain(&self, symbol: &str, expiration: Option<NaiveDate>) -> Result<Vec<ChainRow>, ProviderError>;

    async fn option_expirations(&self, symbol: &str) -> Result<Vec<NaiveDate>, ProviderError>;

    async fn historical_bars(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Candle>, ProviderError>;

    /// Optional capability; providers that don't support it return `Ok(None)`.
    async fn next_earnings_date(&self, _symbol: &str) -> Result<Option<NaiveDate>, ProviderError> {
        Ok(None)
    }
}

/// Abstract contract for order submission, account queries, and position
/// lookups against a brokerage.
#[async_trait]
pub trait BrokerageClient: Send + Sync {
    async fn get_account(&self) -> Result<AccountSnapshot, OrderError>;

    async fn submit_order(
        &self,
        play_id: &str,
        occ_symbol: &str,
        action: OrderAction,
        order_type: OrderType,
        quantity: u32,
        limit_price: Option<Decimal>,
    ) -> Result<Order, OrderError>;

    async fn get_order_by_id(&self, order_id: &str) -> Result<Order, OrderError>;

    async fn cancel_order_by_id(&self, order_id: &str) -> Result<(), OrderError>;

    async fn close_position(&self, symbol: &str) -> Result<Order, OrderError>;

    async fn get_open_position_quantity(&self, occ_symbol: &str) -> Result<u32, OrderError>;
}
