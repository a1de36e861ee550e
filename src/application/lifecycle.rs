use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::domain::errors::{OrderError, StoreError, ValidationError};
use crate::domain::order::Order;
use crate::domain::play::{Greeks, Play, PlayStatus};
use crate::domain::ports::BrokerageClient;

use super::store::PlayStore;

/// Enforces play status transitions and conditional (OCO/OTO) linkage over a
/// [`PlayStore`]. Every public method either returns the play in its new
/// state or leaves the store untouched.
pub struct LifecycleEngine {
    store: Arc<PlayStore>,
    broker: Arc<dyn BrokerageClient>,
}

impl LifecycleEngine {
    pub fn new(store: Arc<PlayStore>, broker: Arc<dyn BrokerageClient>) -> Self {
        LifecycleEngine { store, broker }
    }

    /// A thin passthrough so callers that only need order status don't need
    /// their own handle on the brokerage client.
    pub async fn order_status(&self, order_id: &str) -> Result<Order, OrderError> {
        self.broker.get_order_by_id(order_id).await
    }

    /// Cross-checks the OCC symbol; on failure parks the play in `Invalid`
    /// rather than letting it participate in any further transition.
    pub fn validate_or_park(&self, play: Play) -> Result<Result<Play, ValidationError>, StoreError> {
        if let Err(e) = play.validate_occ() {
            warn!(play_id = %play.play_id, error = %e, "play failed OCC validation, parking as invalid");
            self.store.transition(play, PlayStatus::Invalid)?;
            return Ok(Err(e));
        }
        Ok(Ok(play))
    }

    /// A `NEW` play whose GTD has passed is moved straight to `Expired`.
    pub fn expire_new_if_past_gtd(&self, play: Play, today: NaiveDate) -> Result<Option<Play>, StoreError> {
        if play.status.status == PlayStatus::New && play.is_past_gtd(today) {
            let moved = self.store.transition(play, PlayStatus::Expired)?;
            info!(play_id = %moved.play_id, "new play expired before entry");
            return Ok(Some(moved));
        }
        Ok(None)
    }

    /// True once an `OPEN` play's GTD has passed: it must be force-closed
    /// with a market exit regardless of whatever profit/loss condition its
    /// strategy would otherwise require. The actual exit order submission
    /// (and the resulting `OPEN -> PENDING_CLOSING` transition) goes through
    /// the order executor, which needs a live quote this engine doesn't have.
    pub fn force_close_open_if_past_gtd(&self, play: &Play, today: NaiveDate) -> bool {
        play.status.status == PlayStatus::Open && play.is_past_gtd(today)
    }

    /// `NEW -> PENDING_OPENING`, recording the submitted entry order id.
    pub fn mark_entry_submitted(&self, mut play: Play, order_id: String) -> Result<Play, StoreError> {
        play.status.primary_order_id = Some(order_id);
        self.store.transition(play, PlayStatus::PendingOpening)
    }

    /// `PENDING_OPENING -> OPEN` on a reported fill.
    pub fn handle_entry_fill(
        &self,
        mut play: Play,
        fill_price: Decimal,
        stock_price: Decimal,
        greeks: Option<Greeks>,
        now: DateTime<Utc>,
    ) -> Result<Play, StoreError> {
        play.status.position_exists = true;
        play.logging.opened_at = Some(now);
        play.logging.premium_at_open = Some(fill_price);
        play.logging.stock_price_at_open = Some(stock_price);
        play.logging.greeks_at_open = greeks;
        play.entry_point.entry_premium = Some(fill_price);
        self.store.transition(play, PlayStatus::Open)
    }

    /// `PENDING_OPENING -> NEW` when the broker rejects or cancels the entry.
    pub fn handle_entry_rejection(&self, mut play: Play) -> Result<Play, StoreError> {
        play.status.primary_order_id = None;
        play.status.primary_order_status = None;
        self.store.transition(play, PlayStatus::New)
    }

    /// `OPEN -> PENDING_CLOSING`, recording the submitted exit order id.
    pub fn mark_exit_submitted(&self, mut play: Play, order_id: String) -> Result<Play, StoreError> {
        play.status.closing_order_id = Some(order_id);
        self.store.transition(play, PlayStatus::PendingClosing)
    }

    /// `PENDING_CLOSING -> CLOSED` on a reported fill.
    pub fn handle_exit_fill(
        &self,
        mut play: Play,
        fill_price: Decimal,
        now: DateTime<Utc>,
    ) -> Result<Play, StoreError> {
        play.status.position_exists = false;
        play.logging.closed_at = Some(now);
        play.logging.premium_at_close = Some(fill_price);
        self.store.transition(play, PlayStatus::Closed)
    }

    /// Records that the primary contingency exit timed out and a backup
    /// market order was submitted in its place.
    pub fn mark_contingency_submitted(&self, mut play: Play, order_id: String) -> Result<Play, StoreError> {
        play.status.contingency_order_id = Some(order_id);
        self.store.save(&play)?;
        Ok(play)
    }

    /// When `trigger` reaches OPEN or CLOSED, every OCO sibling still in NEW
    /// or PENDING_OPENING is canceled and expired (I8).
    pub async fn fan_out_oco(&self, trigger: &Play) -> Result<(), StoreError> {
        if !matches!(trigger.status.status, PlayStatus::Open | PlayStatus::Closed) {
            return Ok(());
        }
        for peer_id in &trigger.conditional_plays.oco_triggers {
            let peer = self
                .store
                .load(PlayStatus::New, peer_id)
                .or_else(|_| self.store.load(PlayStatus::PendingOpening, peer_id));
            let Ok(peer) = peer else { continue };

            if let Some(order_id) = peer.status.primary_order_id.clone() {
                if let Err(e) = self.broker.cancel_order_by_id(&order_id).await {
                    warn!(play_id = %peer.play_id, error = %e, "failed to cancel OCO sibling order");
                }
            }
            self.store.transition(peer, PlayStatus::Expired)?;
            info!(play_id = %peer_id, triggered_by = %trigger.play_id, "OCO sibling expired");
        }
        Ok(())
    }

    /// When `parent` reaches OPEN for the first time, every declared OTO
    /// child is promoted `TEMP -> NEW` exactly once (I9).
    pub fn fan_out_oto(&self, mut parent: Play) -> Result<Play, StoreError> {
        if parent.status.status != PlayStatus::Open || parent.status.conditionals_handled {
            return Ok(parent);
        }
        for child_id in parent.conditional_plays.oto_triggers.clone() {
            match self.store.load(PlayStatus::Temp, &child_id) {
                Ok(child) => {
                    self.store.transition(child, PlayStatus::New)?;
                    info!(play_id = %child_id, parent = %parent.play_id, "OTO child promoted to new");
                }
                Err(e) => warn!(play_id = %child_id, error = %e, "OTO child not found in temp partition"),
            }
        }
        parent.status.conditionals_handled = true;
        self.store.save(&parent)?;
        Ok(parent)
    }
}
