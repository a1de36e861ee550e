use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use crate::domain::errors::{OrderError, ProviderError};
use crate::domain::order::{Order, OrderAction, OrderStatus, OrderType};
use crate::domain::ports::{BrokerageClient, MarketDataProvider};
use crate::domain::quote::{AccountSnapshot, Candle, ChainRow, OptionQuote};

/// An in-memory market-data provider for tests and dry runs. Quotes and
/// prices are seeded explicitly; lookups against unseeded symbols fail with
/// [`ProviderError::QuoteNotFound`].
#[derive(Default)]
pub struct MockProvider {
    pub name: String,
    stock_prices: Mutex<HashMap<String, Decimal>>,
    option_quotes: Mutex<HashMap<String, OptionQuote>>,
    bars: Mutex<HashMap<String, Vec<Candle>>>,
    pub fail_next: Mutex<bool>,
}

impl MockProvider {
    pub fn new(name: impl Into<String>) -> Self {
        MockProvider {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn set_stock_price(&self, symbol: &str, price: Decimal) {
        self.stock_prices.lock().unwrap().insert(symbol.to_string(), price);
    }

    pub fn set_option_quote(&self, occ_symbol: &str, quote: OptionQuote) {
        self.option_quotes.lock().unwrap().insert(occ_symbol.to_string(), quote);
    }

    pub fn set_bars(&self, symbol: &str, bars: Vec<Candle>) {
        self.bars.lock().unwrap().insert(symbol.to_string(), bars);
    }

    pub fn force_next_call_to_fail(&self) {
        *self.fail_next.lock().unwrap() = true;
    }

    fn take_forced_failure(&self) -> bool {
        let mut guard = self.fail_next.lock().unwrap();
        if *guard {
            *guard = false;
            true
        } else {
            false
        }
    }
}

#[async_trait]
impl MarketDataProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn stock_price(&self, symbol: &str) -> Result<Decimal, ProviderError> {
        if self.take_forced_failure() {
            return Err(ProviderError::Connection {
                provider: self.name.clone(),
                detail: "forced failure".into(),
            });
        }
        self.stock_prices
            .lock()
            .unwrap()
            .get(symbol)
            .copied()
            .ok_or_else(|| ProviderError::QuoteNotFound {
                provider: self.name.clone(),
                symbol: symbol.to_string(),
            })
    }

    async fn option_quote(&self, occ_symbol: &str) -> Result<OptionQuote, ProviderError> {
        if self.take_forced_failure() {
            return Err(ProviderError::Connection {
                provider: self.name.clone(),
                detail: "forced failure".into(),
            });
        }
        self.option_quotes
            .lock()
            .unwrap()
            .get(occ_symbol)
            .cloned()
            .ok_or_else(|| ProviderError::QuoteNotFound {
                provider: self.name.clone(),
                symbol: occ_symbol.to_string(),
            })
    }

    async fn option_chain(&self, _symbol: &str, _expiration: Option<NaiveDate>) -> Result<Vec<ChainRow>, ProviderError> {
        Ok(Vec::new())
    }

    async fn option_expirations(&self, _symbol: &str) -> Result<Vec<NaiveDate>, ProviderError> {
        Ok(Vec::new())
    }

    async fn historical_bars(
        &self,
        symbol: &str,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> Result<Vec<Candle>, ProviderError> {
        Ok(self.bars.lock().unwrap().get(symbol).cloned().unwrap_or_default())
    }
}

/// An in-memory brokerage for tests and dry runs. Orders fill immediately at
/// their limit price (or a seeded market price) unless `reject_next` is set.
#[derive(Default)]
pub struct MockBroker {
    pub account: Mutex<AccountSnapshot>,
    orders: Mutex<HashMap<String, Order>>,
    positions: Mutex<HashMap<String, u32>>,
    pub reject_next: Mutex<bool>,
    pub fill_immediately: Mutex<bool>,
}

impl MockBroker {
    pub fn new(account: AccountSnapshot) -> Self {
        MockBroker {
            account: Mutex::new(account),
            fill_immediately: Mutex::new(true),
            ..Default::default()
        }
    }

    pub fn set_account(&self, snapshot: AccountSnapshot) {
        *self.account.lock().unwrap() = snapshot;
    }

    pub fn reject_next_order(&self) {
        *self.reject_next.lock().unwrap() = true;
    }

    pub fn set_fill_immediately(&self, value: bool) {
        *self.fill_immediately.lock().unwrap() = value;
    }

    pub fn set_order_status(&self, order_id: &str, status: OrderStatus) {
        if let Some(order) = self.orders.lock().unwrap().get_mut(order_id) {
            order.status = status;
        }
    }
}

#[async_trait]
impl BrokerageClient for MockBroker {
    async fn get_account(&self) -> Result<AccountSnapshot, OrderError> {
        Ok(self.account.lock().unwrap().clone())
    }

    async fn submit_order(
        &self,
        play_id: &str,
        occ_symbol: &str,
        action: OrderAction,
        order_type: OrderType,
        quantity: u32,
        limit_price: Option<Decimal>,
    ) -> Result<Order, OrderError> {
        let mut reject = self.reject_next.lock().unwrap();
        if *reject {
            *reject = false;
            return Err(OrderError::Rejected {
                play_id: play_id.to_string(),
                reason: "mock broker rejected the order".into(),
            });
        }
        drop(reject);

        let fill_immediately = *self.fill_immediately.lock().unwrap();
        let status = if fill_immediately { OrderStatus::Filled } else { OrderStatus::Accepted };
        let filled_price = if fill_immediately {
            Some(limit_price.unwrap_or(dec!(0)))
        } else {
            None
        };

        let order = Order {
            id: Uuid::new_v4().to_string(),
            play_id: play_id.to_string(),
            action,
            order_type,
            quantity,
            limit_price,
            status,
            filled_price,
        };
        self.orders.lock().unwrap().insert(order.id.clone(), order.clone());
        if fill_immediately && action.is_long() {
            *self.positions.lock().unwrap().entry(occ_symbol.to_string()).or_insert(0) += quantity;
        }
        Ok(order)
    }

    async fn get_order_by_id(&self, order_id: &str) -> Result<Order, OrderError> {
        self.orders
            .lock()
            .unwrap()
            .get(order_id)
            .cloned()
            .ok_or_else(|| OrderError::Brokerage {
                play_id: order_id.to_string(),
                detail: "unknown order id".into(),
            })
    }

    async fn cancel_order_by_id(&self, order_id: &str) -> Result<(), OrderError> {
        if let Some(order) = self.orders.lock().unwrap().get_mut(order_id) {
            order.status = OrderStatus::Canceled;
        }
        Ok(())
    }

    async fn close_position(&self, symbol: &str) -> Result<Order, OrderError> {
        self.positions.lock().unwrap().remove(symbol);
        Ok(Order {
            id: Uuid::new_v4().to_string(),
            play_id: symbol.to_string(),
            action: OrderAction::SellToClose,
            order_type: OrderType::Market,
            quantity: 0,
            limit_price: None,
            status: OrderStatus::Filled,
            filled_price: None,
        })
    }

    async fn get_open_position_quantity(&self, occ_symbol: &str) -> Result<u32, OrderError> {
        Ok(self.positions.lock().unwrap().get(occ_symbol).copied().unwrap_or(0))
    }
}
