//! End-to-end scenarios driven against the in-memory mock provider/broker,
//! exercising the store, lifecycle engine, capital manager, and executor
//! together the way a real cycle would.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal_macros::dec;
use tempfile::tempdir;

use strikecore::application::capital::CapitalManager;
use strikecore::application::executor::OrderExecutor;
use strikecore::application::lifecycle::LifecycleEngine;
use strikecore::application::market_data::MarketDataManager;
use strikecore::application::store::PlayStore;
use strikecore::config::{CapitalConfig, MarketDataConfig, PlaybookConfig};
use strikecore::domain::order::{OrderAction, OrderStatus, OrderType, TradeType};
use strikecore::domain::play::{
    ConditionalPlays, EntryPoint, Play, PlayLogging, PlayStatus, PlayStatusInfo, SlMode, StopLoss, TakeProfit, TrailingState,
};
use strikecore::domain::ports::BrokerageClient;
use strikecore::domain::quote::{AccountSnapshot, OptionQuote};
use strikecore::infrastructure::mock::{MockBroker, MockProvider};

fn account(buying_power: rust_decimal::Decimal) -> AccountSnapshot {
    AccountSnapshot {
        buying_power,
        options_buying_power: None,
        equity: buying_power,
        portfolio_value: buying_power,
        loaded_ok: true,
        snapshot_instant: None,
    }
}

fn long_call_play(id: &str) -> Play {
    Play {
        play_id: id.into(),
        symbol: "SPY".into(),
        trade_type: TradeType::Call,
        option_contract_symbol: "SPY251211C00590000".into(),
        strike_price: dec!(590),
        expiration_date: NaiveDate::from_ymd_opt(2025, 12, 11).unwrap(),
        contracts: 1,
        action: OrderAction::BuyToOpen,
        strategy_name: "long_call".into(),
        playbook_name: "default".into(),
        entry_point: EntryPoint {
            target_stock_price: dec!(450.00),
            order_type: Some(strikecore::domain::order::OrderType::LimitAtBid),
            entry_premium: None,
        },
        take_profit: TakeProfit::default(),
        stop_loss: StopLoss::default(),
        status: PlayStatusInfo::default(),
        trailing_state: TrailingState::default(),
        conditional_plays: ConditionalPlays::default(),
        logging: PlayLogging::default(),
        play_expiration_date: NaiveDate::from_ymd_opt(2025, 12, 11).unwrap(),
        creation_date: NaiveDate::from_ymd_opt(2025, 11, 1).unwrap(),
        creator: "test".into(),
    }
}

/// Scenario 1: a ready NEW play gets a limit-at-bid entry order, moves to
/// PENDING_OPENING, then OPEN once the broker reports a fill.
#[tokio::test]
async fn scenario_1_happy_path_long_call_entry() {
    let dir = tempdir().unwrap();
    let store = Arc::new(PlayStore::new(dir.path()).unwrap());
    let play = long_call_play("p1");
    store.save(&play).unwrap();

    let broker = Arc::new(MockBroker::new(account(dec!(100_000))));
    let provider = Arc::new(MockProvider::new("mock-vendor"));
    provider.set_option_quote(
        "SPY251211C00590000",
        OptionQuote {
            bid: dec!(2.00),
            ask: dec!(2.10),
            ..Default::default()
        },
    );
    let market_data = Arc::new(MarketDataManager::new(provider, Vec::new(), &MarketDataConfig::default()));
    let lifecycle = Arc::new(LifecycleEngine::new(store.clone(), broker.clone()));
    let executor = OrderExecutor::new(market_data, broker.clone(), lifecycle.clone());

    let pending = executor.submit_entry(play).await.unwrap();
    assert_eq!(pending.status.status, PlayStatus::PendingOpening);
    let order_id = pending.status.primary_order_id.clone().unwrap();

    let order = broker.get_order_by_id(&order_id).await.unwrap();
    assert_eq!(order.status, OrderStatus::Filled);
    assert_eq!(order.filled_price, Some(dec!(2.00)));

    let opened = lifecycle
        .handle_entry_fill(pending, order.filled_price.unwrap(), dec!(450.10), None, Utc::now())
        .unwrap();
    assert_eq!(opened.status.status, PlayStatus::Open);
    assert_eq!(opened.logging.premium_at_open, Some(dec!(2.00)));
}

/// Scenario 2: a fixed per-trade capital cap below the estimated cost blocks
/// the entry entirely; the play never leaves NEW.
#[tokio::test]
async fn scenario_2_capital_gate_rejection() {
    let dir = tempdir().unwrap();
    let store = Arc::new(PlayStore::new(dir.path()).unwrap());
    let play = long_call_play("p2");
    store.save(&play).unwrap();

    let broker = Arc::new(MockBroker::new(account(dec!(100_000))));
    let capital = CapitalManager::new(store.clone(), broker, CapitalConfig::default());
    capital.refresh().await.unwrap();

    let playbook = PlaybookConfig {
        enabled: true,
        max_capital_per_trade_fixed: Some(dec!(150)),
        ..Default::default()
    };

    // estimated_cost = entry_premium * contracts * 100 = 2.00 * 1 * 100 = $200
    let mut priced = play.clone();
    priced.entry_point.entry_premium = Some(dec!(2.00));
    let (allowed, reason) = capital.check_trade(&priced, &playbook).await;

    assert!(!allowed);
    let reason = reason.unwrap();
    assert!(reason.contains("200"), "reason should cite the estimated cost: {reason}");
    assert!(reason.contains("150"), "reason should cite the configured cap: {reason}");
    assert_eq!(store.list(PlayStatus::New).unwrap().len(), 1);
}

/// Scenario 3: an OCC symbol that disagrees with the play's own fields is
/// parked as INVALID rather than allowed to proceed.
#[tokio::test]
async fn scenario_3_occ_validation_failure_parks_as_invalid() {
    let dir = tempdir().unwrap();
    let store = Arc::new(PlayStore::new(dir.path()).unwrap());
    let mut play = long_call_play("p3");
    play.option_contract_symbol = "SPY251212C00590000".into(); // wrong expiration
    store.save(&play).unwrap();

    let broker = Arc::new(MockBroker::new(account(dec!(100_000))));
    let lifecycle = LifecycleEngine::new(store.clone(), broker);

    let result = lifecycle.validate_or_park(play).unwrap();
    assert!(result.is_err());
    assert!(store.list(PlayStatus::New).unwrap().is_empty());
    assert_eq!(store.list(PlayStatus::Invalid).unwrap().len(), 1);
}

/// Scenario 4: once one OCO member opens, its sibling is canceled (if it had
/// reached PENDING_OPENING) and expired, in the same cycle.
#[tokio::test]
async fn scenario_4_oco_cancel_expires_the_sibling() {
    let dir = tempdir().unwrap();
    let store = Arc::new(PlayStore::new(dir.path()).unwrap());

    let mut a = long_call_play("a");
    a.status.status = PlayStatus::Open;
    a.conditional_plays.oco_triggers = vec!["b".into()];

    let mut b = long_call_play("b");
    b.option_contract_symbol = "SPY251211C00595000".into();
    b.strike_price = dec!(595);
    b.status.status = PlayStatus::PendingOpening;
    b.status.primary_order_id = Some("order-b".into());
    b.conditional_plays.oco_triggers = vec!["a".into()];
    store.save(&b).unwrap();

    let broker = Arc::new(MockBroker::new(account(dec!(100_000))));
    let lifecycle = LifecycleEngine::new(store.clone(), broker.clone());

    lifecycle.fan_out_oco(&a).await.unwrap();

    assert!(store.list(PlayStatus::PendingOpening).unwrap().is_empty());
    let expired = store.list(PlayStatus::Expired).unwrap();
    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].play_id, "b");
}

/// Scenario 5: a contingency-mode stop loss whose primary exit order fails
/// terminally falls back to a backup market order.
#[tokio::test]
async fn scenario_5_contingency_stop_loss_falls_back_to_market_order() {
    let dir = tempdir().unwrap();
    let store = Arc::new(PlayStore::new(dir.path()).unwrap());

    let mut play = long_call_play("p5");
    play.trade_type = TradeType::Put;
    play.option_contract_symbol = "SPY251211P00430000".into();
    play.strike_price = dec!(430);
    play.action = OrderAction::SellToOpen;
    play.status.status = PlayStatus::PendingClosing;
    play.stop_loss = StopLoss {
        sl_mode: Some(SlMode::Contingency),
        contingency_order_type: Some(strikecore::domain::order::OrderType::Market),
        ..StopLoss::default()
    };

    let broker = Arc::new(MockBroker::new(account(dec!(100_000))));
    broker.set_fill_immediately(false);
    // The primary limit exit never fills and the brokerage reports it
    // expired after the wait window.
    let primary = broker
        .submit_order(&play.play_id, &play.option_contract_symbol, OrderAction::BuyToClose, strikecore::domain::order::OrderType::LimitAtBid, 1, Some(dec!(2.95)))
        .await
        .unwrap();
    broker.set_order_status(&primary.id, OrderStatus::Expired);
    play.status.closing_order_id = Some(primary.id.clone());
    broker.set_fill_immediately(true);

    let provider = Arc::new(MockProvider::new("mock-vendor"));
    provider.set_option_quote(
        "SPY251211P00430000",
        OptionQuote {
            ask: dec!(3.05),
            ..Default::default()
        },
    );
    let market_data = Arc::new(MarketDataManager::new(provider, Vec::new(), &MarketDataConfig::default()));
    let lifecycle = Arc::new(LifecycleEngine::new(store.clone(), broker.clone()));
    let executor = OrderExecutor::new(market_data, broker.clone(), lifecycle);

    let result = executor.check_contingency(play).await.unwrap();
    assert!(result.status.contingency_order_id.is_some());
}
