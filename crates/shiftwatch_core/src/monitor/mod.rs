//! Periodic alert poll loop.
//!
//! # Responsibility
//! - Run evaluation passes on start, on identity change, and on a fixed
//!   interval inside the business-hours window.
//! - Publish each completed pass as one `AlertSnapshot`.
//! - Offer an explicit start/stop handle with a manual refresh entry point.
//!
//! # Invariants
//! - Non-business days publish an empty snapshot without touching the ledger.
//! - A failed fetch keeps the previous snapshot and only sets `last_error`.
//! - `is_loading` never outlives its pass, even when the pass is dropped.
//! - Passes are not mutually excluded; the last completed one wins.
//! - Dropping the handle cancels the loop, including during the first pass.

mod dedupe;
mod sink;

pub use sink::{ChannelSink, LogSink, NotificationSink};

use crate::alerts::catalog::AlertCatalog;
use crate::alerts::evaluator::{
    active_alerts, due_positions, partition_obligations, total_alert_count, AlertSnapshot,
};
use crate::calendar::is_business_day;
use crate::clock::Clock;
use crate::config::EngineSettings;
use crate::identity::{Identity, UserId};
use crate::ledger::ObligationLedger;
use crate::model::alert::{AlertDefinition, AlertFireEvent};
use chrono::{NaiveDateTime, Timelike};
use dedupe::FireDeduper;
use log::{debug, info, warn};
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Poll cadence and business-hours window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    pub poll_interval: Duration,
    /// First active hour, inclusive.
    pub active_start_hour: u32,
    /// Last active hour, inclusive.
    pub active_end_hour: u32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
            active_start_hour: 8,
            active_end_hour: 18,
        }
    }
}

impl MonitorConfig {
    pub fn from_settings(settings: &EngineSettings) -> Self {
        Self {
            poll_interval: Duration::from_secs(settings.poll_interval_seconds),
            active_start_hour: settings.active_window.start_hour,
            active_end_hour: settings.active_window.end_hour,
        }
    }

    /// Returns whether scheduled ticks should evaluate at `instant`.
    pub fn is_active_at(&self, instant: NaiveDateTime) -> bool {
        let hour = instant.hour();
        is_business_day(instant.date())
            && hour >= self.active_start_hour
            && hour <= self.active_end_hour
    }
}

/// Collaborators injected into the poll loop.
///
/// The loop stops once every clone of `identity` has been dropped, so the
/// owning context keeps one alive for as long as it wants alerts.
pub struct MonitorDeps {
    pub ledger: Arc<dyn ObligationLedger>,
    pub catalog: Arc<AlertCatalog>,
    pub identity: Identity,
    pub clock: Arc<dyn Clock>,
    pub sink: Arc<dyn NotificationSink>,
}

/// What an evaluation pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    Published,
    /// Today is a weekend; an empty snapshot was published.
    NonBusinessDay,
    /// Nobody is signed in; an empty snapshot was published.
    NoIdentity,
    /// Ledger fetch failed; previous snapshot kept with `last_error` set.
    FetchFailed,
}

struct PassContext {
    ledger: Arc<dyn ObligationLedger>,
    catalog: Arc<AlertCatalog>,
    identity: watch::Receiver<Option<UserId>>,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn NotificationSink>,
    state: watch::Sender<AlertSnapshot>,
    deduper: Mutex<FireDeduper>,
}

impl PassContext {
    async fn run_pass(&self, trigger: &'static str) -> PassOutcome {
        let started_at = Instant::now();
        let now = self.clock.now();
        let today = now.date();

        if !is_business_day(today) {
            self.publish_empty(now);
            debug!(
                "event=monitor_pass module=monitor status=skip trigger={trigger} reason=non_business_day"
            );
            return PassOutcome::NonBusinessDay;
        }

        let Some(user_id) = self.identity.borrow().clone() else {
            self.publish_empty(now);
            debug!(
                "event=monitor_pass module=monitor status=skip trigger={trigger} reason=signed_out"
            );
            return PassOutcome::NoIdentity;
        };

        self.state.send_modify(|snapshot| snapshot.is_loading = true);
        let _loading = LoadingGuard { state: &self.state };

        match self.ledger.query_unfulfilled(&user_id).await {
            Ok(obligations) => {
                let partition = partition_obligations(&obligations, &user_id, today);
                let definitions = self.catalog.list_all();
                let due = due_positions(&definitions, now);
                self.emit_fires(&definitions, &due, now);

                let daily_alerts_due = due
                    .iter()
                    .map(|index| definitions[*index].clone())
                    .collect::<Vec<_>>();
                info!(
                    "event=monitor_pass module=monitor status=ok trigger={trigger} duration_ms={} alerts_due={} due_today={} overdue={}",
                    started_at.elapsed().as_millis(),
                    daily_alerts_due.len(),
                    partition.due_today.len(),
                    partition.overdue.len()
                );
                self.state.send_replace(AlertSnapshot {
                    daily_alerts_due,
                    obligations_due_today: partition.due_today,
                    obligations_overdue: partition.overdue,
                    is_loading: false,
                    last_error: None,
                    evaluated_at: Some(now),
                });
                PassOutcome::Published
            }
            Err(err) => {
                warn!(
                    "event=monitor_pass module=monitor status=error trigger={trigger} duration_ms={} error={err}",
                    started_at.elapsed().as_millis()
                );
                let message = err.to_string();
                self.state.send_modify(|snapshot| {
                    snapshot.is_loading = false;
                    snapshot.last_error = Some(message);
                });
                PassOutcome::FetchFailed
            }
        }
    }

    /// Scheduled tick: evaluates only on business days inside the window.
    async fn run_tick(&self, config: &MonitorConfig) -> Option<PassOutcome> {
        let now = self.clock.now();
        if !config.is_active_at(now) {
            debug!(
                "event=monitor_tick module=monitor status=skip at={}",
                now.format("%Y-%m-%d %H:%M")
            );
            return None;
        }
        Some(self.run_pass("tick").await)
    }

    fn publish_empty(&self, now: NaiveDateTime) {
        self.state.send_replace(AlertSnapshot {
            evaluated_at: Some(now),
            ..AlertSnapshot::default()
        });
    }

    fn emit_fires(&self, definitions: &[AlertDefinition], due: &[usize], now: NaiveDateTime) {
        let mut deduper = self.deduper.lock().unwrap_or_else(PoisonError::into_inner);
        for index in due {
            if deduper.first_fire(*index, now) {
                self.sink
                    .emit(&AlertFireEvent::new(definitions[*index].clone(), now));
            }
        }
    }
}

/// Clears `is_loading` when a pass is dropped before it publishes.
struct LoadingGuard<'a> {
    state: &'a watch::Sender<AlertSnapshot>,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.state.send_if_modified(|snapshot| {
            let was_loading = snapshot.is_loading;
            snapshot.is_loading = false;
            was_loading
        });
    }
}

/// Entry point for the alert poll loop.
pub struct AlertMonitor;

impl AlertMonitor {
    /// Spawns the poll loop on the current tokio runtime.
    ///
    /// The first pass runs immediately; later passes follow identity changes
    /// and `config.poll_interval` ticks.
    ///
    /// # Panics
    /// - When called outside a tokio runtime.
    pub fn start(config: MonitorConfig, deps: MonitorDeps) -> MonitorHandle {
        let (state, state_rx) = watch::channel(AlertSnapshot::default());
        let identity_rx = deps.identity.subscribe();
        let ctx = Arc::new(PassContext {
            ledger: deps.ledger,
            catalog: deps.catalog,
            identity: identity_rx.clone(),
            clock: deps.clock,
            sink: deps.sink,
            state,
            deduper: Mutex::new(FireDeduper::default()),
        });
        let cancel = CancellationToken::new();

        let task = tokio::spawn(run_loop(
            Arc::clone(&ctx),
            config,
            identity_rx,
            cancel.clone(),
        ));

        MonitorHandle {
            ctx,
            cancel,
            task: Some(task),
            state_rx,
        }
    }
}

async fn run_loop(
    ctx: Arc<PassContext>,
    config: MonitorConfig,
    mut identity: watch::Receiver<Option<UserId>>,
    cancel: CancellationToken,
) {
    info!(
        "event=monitor_start module=monitor status=ok interval_secs={} window={}-{}",
        config.poll_interval.as_secs(),
        config.active_start_hour,
        config.active_end_hour
    );
    let period = config.poll_interval.max(Duration::from_millis(1));
    let mut ticker = interval_at(tokio::time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let reason = 'run: {
        if !until_cancelled(&cancel, ctx.run_pass("start")).await {
            break 'run "cancelled";
        }

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break 'run "cancelled",
                changed = identity.changed() => {
                    if changed.is_err() {
                        break 'run "identity_closed";
                    }
                    let signed_in = identity.borrow_and_update().is_some();
                    if !signed_in {
                        ctx.publish_empty(ctx.clock.now());
                        break 'run "signed_out";
                    }
                    if !until_cancelled(&cancel, ctx.run_pass("identity")).await {
                        break 'run "cancelled";
                    }
                }
                _ = ticker.tick() => {
                    if !until_cancelled(&cancel, ctx.run_tick(&config)).await {
                        break 'run "cancelled";
                    }
                }
            }
        }
    };

    info!("event=monitor_stop module=monitor status=ok reason={reason}");
}

/// Drives `future` unless `cancel` fires first. Returns `false` on cancel.
async fn until_cancelled<F>(cancel: &CancellationToken, future: F) -> bool
where
    F: Future,
{
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = future => true,
    }
}

/// Owning handle for a running poll loop.
///
/// Dropping the handle cancels the loop.
pub struct MonitorHandle {
    ctx: Arc<PassContext>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
    state_rx: watch::Receiver<AlertSnapshot>,
}

impl MonitorHandle {
    /// Receiver that observes every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<AlertSnapshot> {
        self.state_rx.clone()
    }

    pub fn snapshot(&self) -> AlertSnapshot {
        self.state_rx.borrow().clone()
    }

    /// Runs one pass now, ignoring the business-hours window.
    ///
    /// The business-day gate still applies.
    pub async fn refresh(&self) -> PassOutcome {
        self.ctx.run_pass("manual").await
    }

    /// Catalog alerts whose trigger already passed today; empty on
    /// non-business days.
    pub fn active_alerts(&self) -> Vec<AlertDefinition> {
        active_alerts(&self.ctx.catalog.list_all(), self.ctx.clock.now())
    }

    pub fn total_alert_count(&self) -> usize {
        total_alert_count(&self.state_rx.borrow())
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Cancels the loop and waits for it to exit.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                warn!("event=monitor_stop module=monitor status=error error={err}");
            }
        }
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
