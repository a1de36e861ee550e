use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::domain::play::{Play, PlayStatus};

use super::capital::CapitalManager;
use super::executor::OrderExecutor;
use super::lifecycle::LifecycleEngine;
use super::market_data::MarketDataManager;
use super::store::PlayStore;
use super::strategies::StrategyRegistry;
use super::trailing::TrailingEngine;

/// One strategy's fault, recorded but never allowed to abort the cycle for
/// the other strategies (supplements the distilled spec's silence on
/// per-cycle error handling).
#[derive(Debug, Clone)]
pub struct StrategyFailure {
    pub strategy: String,
    pub detail: String,
}

/// A summary of one completed cycle: how many plays moved through each leg,
/// and which strategies faulted along the way.
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub cycle_id: u64,
    pub entries_submitted: usize,
    pub exits_submitted: usize,
    pub expired: usize,
    pub parked_invalid: usize,
    pub failures: Vec<StrategyFailure>,
}

/// Drives the system through one cycle at a time: refresh capital state, run
/// every enabled strategy over its candidate plays, submit orders, and fan
/// out OCO/OTO/trailing bookkeeping. Owns no polling loop itself; the binary
/// entrypoint decides cadence and shutdown.
pub struct Orchestrator {
    store: Arc<PlayStore>,
    market_data: Arc<MarketDataManager>,
    capital: Arc<CapitalManager>,
    lifecycle: Arc<LifecycleEngine>,
    executor: Arc<OrderExecutor>,
    registry: StrategyRegistry,
    config: Config,
    last_report: std::sync::Mutex<Option<CycleReport>>,
}

impl Orchestrator {
    pub fn new(
        store: Arc<PlayStore>,
        market_data: Arc<MarketDataManager>,
        capital: Arc<CapitalManager>,
        lifecycle: Arc<LifecycleEngine>,
        executor: Arc<OrderExecutor>,
        registry: StrategyRegistry,
        config: Config,
    ) -> Self {
        Orchestrator {
            store,
            market_data,
            capital,
            lifecycle,
            executor,
            registry,
            config,
            last_report: std::sync::Mutex::new(None),
        }
    }

    /// The most recently completed cycle's report, for inspection by
    /// operators or a status endpoint. `None` until the first cycle finishes.
    pub fn last_report(&self) -> Option<CycleReport> {
        self.last_report.lock().expect("last_report mutex poisoned").clone()
    }

    /// Runs exactly one cycle: a cache refresh, a capital snapshot, then
    /// every enabled strategy processing its NEW and OPEN candidates in
    /// priority order (or concurrently, per `strategy_orchestration.mode`).
    pub async fn run_cycle(&self) -> CycleReport {
        self.market_data.start_new_cycle().await;
        let cycle_id = self.market_data.cycle_id().await;

        if let Err(e) = self.capital.refresh().await {
            warn!(error = %e, "capital refresh failed, proceeding with stale snapshot");
        }

        let today = Utc::now().date_naive();
        let mut report = CycleReport {
            cycle_id,
            ..CycleReport::default()
        };
        self.expire_and_park(today, &mut report);
        self.force_close_expired_open_plays(today, &mut report).await;
        self.clone_handles().process_pending_fills().await;

        let strategies = self.registry.enabled_in_priority_order(&self.config);
        let outcomes = match self.config.strategy_orchestration.mode {
            crate::config::ExecutionMode::Sequential => {
                let mut outcomes = Vec::with_capacity(strategies.len());
                for strategy in strategies {
                    outcomes.push(self.run_strategy(strategy, today).await);
                }
                outcomes
            }
            crate::config::ExecutionMode::Parallel => {
                let permits = self.config.strategy_orchestration.max_parallel_workers.max(1);
                let semaphore = Arc::new(Semaphore::new(permits));
                let mut handles = Vec::with_capacity(strategies.len());
                for strategy in strategies {
                    let semaphore = semaphore.clone();
                    let this = self.clone_handles();
                    let config = self.config.clone();
                    handles.push(tokio::spawn(async move {
                        let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
                        this.run_strategy_inner(strategy, &config, today).await
                    }));
                }
                let mut outcomes = Vec::with_capacity(handles.len());
                for handle in handles {
                    match handle.await {
                        Ok(outcome) => outcomes.push(outcome),
                        Err(e) => error!(error = %e, "strategy task panicked"),
                    }
                }
                outcomes
            }
        };

        for (name, entries, exits, failure) in outcomes {
            report.entries_submitted += entries;
            report.exits_submitted += exits;
            if let Some(detail) = failure {
                report.failures.push(StrategyFailure { strategy: name, detail });
            }
        }

        info!(
            cycle_id,
            entries = report.entries_submitted,
            exits = report.exits_submitted,
            expired = report.expired,
            parked_invalid = report.parked_invalid,
            failures = report.failures.len(),
            "cycle complete"
        );
        *self.last_report.lock().expect("last_report mutex poisoned") = Some(report.clone());
        report
    }

    /// A cheap struct of `Arc` clones so a spawned task can run a strategy
    /// without borrowing `self`.
    fn clone_handles(&self) -> OrchestratorHandles {
        OrchestratorHandles {
            store: self.store.clone(),
            market_data: self.market_data.clone(),
            capital: self.capital.clone(),
            lifecycle: self.lifecycle.clone(),
            executor: self.executor.clone(),
            trailing: TrailingEngine::new(),
            dry_run: self.config.strategy_orchestration.dry_run,
        }
    }

    async fn run_strategy(&self, strategy: Arc<dyn super::strategies::StrategyRunner>, today: chrono::NaiveDate) -> (String, usize, usize, Option<String>) {
        self.clone_handles().run_strategy_inner(strategy, &self.config, today).await
    }

    /// Validates every NEW play's OCC symbol, parking mismatches as
    /// `Invalid`, then expires whatever remains past its GTD.
    fn expire_and_park(&self, today: chrono::NaiveDate, report: &mut CycleReport) {
        let Ok(new_plays) = self.store.list(PlayStatus::New) else {
            return;
        };
        for play in new_plays {
            let play = match self.lifecycle.validate_or_park(play) {
                Ok(Ok(play)) => play,
                Ok(Err(_)) => {
                    report.parked_invalid += 1;
                    continue;
                }
                Err(e) => {
                    warn!(error = %e, "failed to validate play");
                    continue;
                }
            };
            match self.lifecycle.expire_new_if_past_gtd(play, today) {
                Ok(Some(_)) => report.expired += 1,
                Ok(None) => {}
                Err(e) => warn!(error = %e, "failed to check play GTD expiry"),
            }
        }
    }

    /// Every `OPEN` play whose GTD has passed is force-closed with a market
    /// exit order, independent of whatever profit/loss condition its
    /// strategy would otherwise require.
    async fn force_close_expired_open_plays(&self, today: chrono::NaiveDate, report: &mut CycleReport) {
        let Ok(open_plays) = self.store.list(PlayStatus::Open) else {
            return;
        };
        for play in open_plays {
            if !self.lifecycle.force_close_open_if_past_gtd(&play, today) {
                continue;
            }
            let play_id = play.play_id.clone();
            let conditions = super::strategies::CloseConditions {
                should_close: true,
                is_time_exit: true,
                exit_reason: "play expiration date reached, forcing close".into(),
                ..super::strategies::CloseConditions::none()
            };
            match self.executor.submit_exit(play, &conditions).await {
                Ok(_) => report.expired += 1,
                Err(e) => warn!(play_id = %play_id, error = %e, "forced close submission failed"),
            }
        }
    }
}

/// The subset of an orchestrator's collaborators a spawned strategy task
/// needs; cloning this is cheap (every field is an `Arc`).
#[derive(Clone)]
struct OrchestratorHandles {
    store: Arc<PlayStore>,
    market_data: Arc<MarketDataManager>,
    capital: Arc<CapitalManager>,
    lifecycle: Arc<LifecycleEngine>,
    executor: Arc<OrderExecutor>,
    trailing: TrailingEngine,
    dry_run: bool,
}

impl OrchestratorHandles {
    /// Polls the brokerage for every play sitting in `PENDING_OPENING` or
    /// `PENDING_CLOSING` and advances it on a terminal order state: a fill
    /// moves the play onward (and fans out OTO children / OCO siblings), a
    /// terminal failure either reopens the entry leg or falls back to a
    /// contingency exit order.
    async fn process_pending_fills(&self) {
        self.process_pending_entries().await;
        self.process_pending_exits().await;
    }

    async fn process_pending_entries(&self) {
        let Ok(pending) = self.store.list(crate::domain::play::PlayStatus::PendingOpening) else {
            return;
        };
        for play in pending {
            let Some(order_id) = play.status.primary_order_id.clone() else { continue };
            let order = match self.lifecycle.order_status(&order_id).await {
                Ok(order) => order,
                Err(e) => {
                    warn!(play_id = %play.play_id, error = %e, "failed to poll entry order");
                    continue;
                }
            };

            if order.status.is_terminal_fill() {
                let stock_price = self.market_data.stock_price(&play.symbol).await.unwrap_or(play.entry_point.target_stock_price);
                let fill_price = order.filled_price.unwrap_or_default();
                let play_id = play.play_id.clone();
                match self.lifecycle.handle_entry_fill(play, fill_price, stock_price, None, Utc::now()) {
                    Ok(opened) => {
                        if let Err(e) = self.lifecycle.fan_out_oto(opened) {
                            warn!(play_id = %play_id, error = %e, "OTO fan-out failed");
                        }
                    }
                    Err(e) => warn!(play_id = %play_id, error = %e, "failed to record entry fill"),
                }
            } else if order.status.is_terminal_failure() {
                let play_id = play.play_id.clone();
                if let Err(e) = self.lifecycle.handle_entry_rejection(play) {
                    warn!(play_id = %play_id, error = %e, "failed to record entry rejection");
                }
            }
        }
    }

    async fn process_pending_exits(&self) {
        let Ok(pending) = self.store.list(crate::domain::play::PlayStatus::PendingClosing) else {
            return;
        };
        for play in pending {
            let Some(order_id) = play.status.closing_order_id.clone() else { continue };
            let order = match self.lifecycle.order_status(&order_id).await {
                Ok(order) => order,
                Err(e) => {
                    warn!(play_id = %play.play_id, error = %e, "failed to poll exit order");
                    continue;
                }
            };

            if order.status.is_terminal_fill() {
                let fill_price = order.filled_price.unwrap_or_default();
                let play_id = play.play_id.clone();
                match self.lifecycle.handle_exit_fill(play, fill_price, Utc::now()) {
                    Ok(closed) => {
                        if let Err(e) = self.lifecycle.fan_out_oco(&closed).await {
                            warn!(play_id = %play_id, error = %e, "OCO fan-out failed");
                        }
                    }
                    Err(e) => warn!(play_id = %play_id, error = %e, "failed to record exit fill"),
                }
            } else if order.status.is_terminal_failure() {
                let play_id = play.play_id.clone();
                if let Err(e) = self.executor.check_contingency(play).await {
                    warn!(play_id = %play_id, error = %e, "contingency exit submission failed");
                }
            }
        }
    }

    async fn run_strategy_inner(
        &self,
        strategy: Arc<dyn super::strategies::StrategyRunner>,
        config: &Config,
        today: chrono::NaiveDate,
    ) -> (String, usize, usize, Option<String>) {
        strategy.on_cycle_start().await;
        let name = strategy.name().to_string();
        let playbook = config.strategies.get(&name).cloned().unwrap_or_default();

        let entries = match self.process_new_plays(&strategy, &name, &playbook).await {
            Ok(n) => n,
            Err(e) => {
                strategy.on_cycle_end().await;
                return (name, 0, 0, Some(e));
            }
        };

        let exits = match self.process_open_plays(&strategy, &name, &playbook, config, today).await {
            Ok(n) => n,
            Err(e) => {
                strategy.on_cycle_end().await;
                return (name, entries, 0, Some(e));
            }
        };

        strategy.on_cycle_end().await;
        (name, entries, exits, None)
    }

    async fn process_new_plays(
        &self,
        strategy: &Arc<dyn super::strategies::StrategyRunner>,
        name: &str,
        playbook: &crate::config::PlaybookConfig,
    ) -> Result<usize, String> {
        let candidates: Vec<Play> = self
            .store
            .list(PlayStatus::New)
            .map_err(|e| e.to_string())?
            .into_iter()
            .filter(|p| p.strategy_name == name)
            .collect();
        if candidates.is_empty() {
            return Ok(0);
        }

        let ready = strategy.evaluate_new_plays(candidates, playbook).await;
        let mut submitted = 0;
        for play in ready {
            if self.dry_run {
                info!(play_id = %play.play_id, "dry run: entry would be submitted");
                continue;
            }
            let (allowed, reason) = self.capital.check_trade(&play, playbook).await;
            if !allowed {
                info!(play_id = %play.play_id, reason = reason.unwrap_or_default(), "entry rejected by capital gate");
                continue;
            }
            match self.executor.submit_entry(play).await {
                Ok(_) => submitted += 1,
                Err(e) => warn!(error = %e, "entry submission failed"),
            }
        }
        Ok(submitted)
    }

    async fn process_open_plays(
        &self,
        strategy: &Arc<dyn super::strategies::StrategyRunner>,
        name: &str,
        playbook: &crate::config::PlaybookConfig,
        config: &Config,
        today: chrono::NaiveDate,
    ) -> Result<usize, String> {
        let candidates: Vec<Play> = self
            .store
            .list(PlayStatus::Open)
            .map_err(|e| e.to_string())?
            .into_iter()
            .filter(|p| p.strategy_name == name)
            .collect();
        if candidates.is_empty() {
            return Ok(0);
        }

        let is_end_of_day = config.trailing.update_mode == crate::config::TrailingUpdateMode::EveryCycle
            || Utc::now().time() >= config.market_hours.regular_hours.end;

        let closing = strategy.evaluate_open_plays(candidates.clone(), playbook).await;
        let closing_ids: std::collections::HashSet<String> = closing.iter().map(|(p, _)| p.play_id.clone()).collect();

        let mut submitted = 0;
        for (play, conditions) in closing {
            if !conditions.should_close {
                continue;
            }
            if self.dry_run {
                info!(play_id = %play.play_id, "dry run: exit would be submitted");
                continue;
            }
            let play_id = play.play_id.clone();
            match self.executor.submit_exit(play, &conditions).await {
                Ok(_) => submitted += 1,
                Err(e) => warn!(play_id = %play_id, error = %e, "exit submission failed"),
            }
        }

        for mut play in candidates {
            if closing_ids.contains(play.play_id.as_str()) || !play.take_profit.trailing_enabled {
                continue;
            }
            let Ok(quote) = self.market_data.option_quote(&play.option_contract_symbol).await else {
                continue;
            };
            let original_tp = play.take_profit.absolute_price;
            self.trailing.update(&mut play, &config.trailing, quote.last, original_tp, is_end_of_day, today);
            if let Err(e) = self.store.save(&play) {
                warn!(play_id = %play.play_id, error = %e, "failed to persist trailing state");
            }
        }

        Ok(submitted)
    }
}
