use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use shiftwatch_core::{
    AlertCatalog, AlertDefinition, AlertFireEvent, AlertMonitor, FixedClock, Identity,
    LedgerError, LedgerResult, MonitorConfig, MonitorDeps, MonitorHandle, NotificationSink,
    Obligation, ObligationId, ObligationLedger, PassOutcome, TriggerTime,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

/// In-memory ledger that counts fetches and can be switched to failing.
#[derive(Default)]
struct FakeLedger {
    obligations: Mutex<Vec<Obligation>>,
    fetches: AtomicUsize,
    failing: AtomicBool,
    gate: Mutex<Option<Arc<Notify>>>,
}

impl FakeLedger {
    fn with(obligations: Vec<Obligation>) -> Self {
        Self {
            obligations: Mutex::new(obligations),
            ..Self::default()
        }
    }

    fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Makes the next fetch wait until the returned gate is notified.
    fn hold_next_fetch(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    fn pending_for(&self, owner_id: &str) -> Vec<Obligation> {
        self.obligations
            .lock()
            .unwrap()
            .iter()
            .filter(|obligation| obligation.owner_id == owner_id && obligation.is_pending())
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ObligationLedger for FakeLedger {
    async fn insert_obligation(
        &self,
        owner_id: &str,
        originated_on: NaiveDate,
        label: &str,
    ) -> LedgerResult<Obligation> {
        let expected = shiftwatch_core::resolve_expected_return(originated_on)?;
        let obligation = Obligation::new(owner_id, originated_on, label, expected, 0);
        self.obligations.lock().unwrap().push(obligation.clone());
        Ok(obligation)
    }

    async fn get_obligation(&self, id: ObligationId) -> LedgerResult<Option<Obligation>> {
        Ok(self
            .obligations
            .lock()
            .unwrap()
            .iter()
            .find(|obligation| obligation.id == id)
            .cloned())
    }

    async fn query_unfulfilled(&self, owner_id: &str) -> LedgerResult<Vec<Obligation>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(LedgerError::FetchFailed("store unreachable".to_string()));
        }
        Ok(self.pending_for(owner_id))
    }

    async fn query_unfulfilled_due_on(
        &self,
        owner_id: &str,
        date: NaiveDate,
    ) -> LedgerResult<Vec<Obligation>> {
        Ok(self
            .pending_for(owner_id)
            .into_iter()
            .filter(|obligation| obligation.expected_return_on == date)
            .collect())
    }

    async fn query_unfulfilled_before(
        &self,
        owner_id: &str,
        date: NaiveDate,
    ) -> LedgerResult<Vec<Obligation>> {
        Ok(self
            .pending_for(owner_id)
            .into_iter()
            .filter(|obligation| obligation.expected_return_on < date)
            .collect())
    }

    async fn mark_fulfilled(
        &self,
        id: ObligationId,
        fulfilled_on: NaiveDate,
        notes: Option<String>,
    ) -> LedgerResult<Obligation> {
        let mut obligations = self.obligations.lock().unwrap();
        let obligation = obligations
            .iter_mut()
            .find(|obligation| obligation.id == id)
            .ok_or_else(|| LedgerError::FetchFailed(format!("missing {id}")))?;
        obligation.fulfilled = true;
        obligation.fulfilled_on = Some(fulfilled_on);
        obligation.notes = notes;
        Ok(obligation.clone())
    }
}

#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<AlertFireEvent>>,
}

impl RecordingSink {
    fn titles(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|event| event.definition.title.clone())
            .collect()
    }
}

impl NotificationSink for RecordingSink {
    fn emit(&self, event: &AlertFireEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

struct Fixture {
    ledger: Arc<FakeLedger>,
    catalog: Arc<AlertCatalog>,
    identity: Identity,
    clock: Arc<FixedClock>,
    sink: Arc<RecordingSink>,
}

impl Fixture {
    fn new(now: NaiveDateTime, obligations: Vec<Obligation>) -> Self {
        let catalog = AlertCatalog::new();
        catalog
            .register(
                AlertDefinition::new(
                    "Bank return files",
                    "Confirm return files",
                    TriggerTime::new(9, 0).unwrap(),
                    "return_files",
                )
                .on_days(&[1, 2, 3, 4, 5])
                .checkable(),
            )
            .unwrap();
        catalog
            .register(AlertDefinition::new(
                "Shift wrap-up",
                "Close the checklist",
                TriggerTime::new(17, 45).unwrap(),
                "shift_closing",
            ))
            .unwrap();

        Self {
            ledger: Arc::new(FakeLedger::with(obligations)),
            catalog: Arc::new(catalog),
            identity: Identity::signed_in("op-1"),
            clock: Arc::new(FixedClock::new(now)),
            sink: Arc::new(RecordingSink::default()),
        }
    }

    fn start(&self) -> MonitorHandle {
        AlertMonitor::start(
            MonitorConfig::default(),
            MonitorDeps {
                ledger: self.ledger.clone(),
                catalog: self.catalog.clone(),
                identity: self.identity.clone(),
                clock: self.clock.clone(),
                sink: self.sink.clone(),
            },
        )
    }
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
}

fn at(d: u32, h: u32, m: u32) -> NaiveDateTime {
    day(d).and_hms_opt(h, m, 0).unwrap()
}

fn pending(owner: &str, expected: u32, created_at: i64) -> Obligation {
    let expected = day(expected);
    let originated = shiftwatch_core::previous_business_day(expected).unwrap();
    Obligation::new(owner, originated, format!("batch-{created_at}"), expected, created_at)
}

async fn wait_for_pass(handle: &MonitorHandle) {
    let mut rx = handle.subscribe();
    while rx.borrow_and_update().evaluated_at.is_none() {
        rx.changed().await.unwrap();
    }
}

#[tokio::test(start_paused = true)]
async fn initial_pass_partitions_obligations_and_fires_due_alerts() {
    // Wednesday 09:00.
    let fixture = Fixture::new(
        at(14, 9, 0),
        vec![pending("op-1", 13, 1), pending("op-1", 14, 2), pending("op-1", 15, 3)],
    );
    let handle = fixture.start();
    wait_for_pass(&handle).await;

    let snapshot = handle.snapshot();
    assert_eq!(snapshot.daily_alerts_due.len(), 1);
    assert_eq!(snapshot.daily_alerts_due[0].title, "Bank return files");
    assert_eq!(snapshot.obligations_due_today.len(), 1);
    assert_eq!(snapshot.obligations_due_today[0].expected_return_on, day(14));
    assert_eq!(snapshot.obligations_overdue.len(), 1);
    assert_eq!(snapshot.obligations_overdue[0].expected_return_on, day(13));
    assert!(!snapshot.is_loading);
    assert_eq!(snapshot.last_error, None);
    assert_eq!(handle.total_alert_count(), 3);
    assert_eq!(fixture.sink.titles(), vec!["Bank return files"]);

    handle.stop().await;
}

#[tokio::test(start_paused = true)]
async fn non_business_day_suppresses_everything() {
    // Saturday 17:45; "Shift wrap-up" has no weekday restriction.
    let fixture = Fixture::new(at(17, 17, 45), vec![pending("op-1", 16, 1)]);
    let handle = fixture.start();
    wait_for_pass(&handle).await;

    let snapshot = handle.snapshot();
    assert!(snapshot.daily_alerts_due.is_empty());
    assert!(snapshot.obligations_due_today.is_empty());
    assert!(snapshot.obligations_overdue.is_empty());
    assert_eq!(fixture.ledger.fetches(), 0);
    assert!(fixture.sink.titles().is_empty());

    assert_eq!(handle.refresh().await, PassOutcome::NonBusinessDay);
    assert_eq!(fixture.ledger.fetches(), 0);
}

#[tokio::test(start_paused = true)]
async fn ticks_outside_active_window_do_not_fetch() {
    let fixture = Fixture::new(at(14, 19, 30), vec![pending("op-1", 14, 1)]);
    let handle = fixture.start();
    wait_for_pass(&handle).await;
    assert_eq!(fixture.ledger.fetches(), 1);

    tokio::time::sleep(Duration::from_secs(95)).await;
    assert_eq!(fixture.ledger.fetches(), 1);

    // Manual refresh ignores the hours gate.
    assert_eq!(handle.refresh().await, PassOutcome::Published);
    assert_eq!(fixture.ledger.fetches(), 2);

    fixture.clock.set(at(14, 10, 0));
    tokio::time::sleep(Duration::from_secs(31)).await;
    assert!(fixture.ledger.fetches() >= 3);
}

#[tokio::test(start_paused = true)]
async fn repeated_ticks_in_one_minute_fire_once() {
    let fixture = Fixture::new(at(14, 9, 0), Vec::new());
    let handle = fixture.start();
    wait_for_pass(&handle).await;

    // Two more ticks land inside 09:00 because the fixed clock does not move.
    tokio::time::sleep(Duration::from_secs(61)).await;
    assert!(fixture.ledger.fetches() >= 3);
    assert_eq!(handle.snapshot().daily_alerts_due.len(), 1);
    assert_eq!(fixture.sink.titles(), vec!["Bank return files"]);
}

#[tokio::test(start_paused = true)]
async fn failed_fetch_keeps_previous_state_until_next_success() {
    let fixture = Fixture::new(at(14, 10, 0), vec![pending("op-1", 14, 1)]);
    let handle = fixture.start();
    wait_for_pass(&handle).await;
    let before = handle.snapshot();
    assert_eq!(before.obligations_due_today.len(), 1);

    fixture.ledger.set_failing(true);
    assert_eq!(handle.refresh().await, PassOutcome::FetchFailed);
    let failed = handle.snapshot();
    assert_eq!(failed.obligations_due_today, before.obligations_due_today);
    assert_eq!(failed.evaluated_at, before.evaluated_at);
    assert!(!failed.is_loading);
    assert!(failed
        .last_error
        .as_deref()
        .is_some_and(|message| message.contains("store unreachable")));

    fixture.ledger.set_failing(false);
    fixture
        .ledger
        .insert_obligation("op-1", day(13), "second-batch")
        .await
        .unwrap();
    fixture.clock.set(at(14, 10, 5));
    assert_eq!(handle.refresh().await, PassOutcome::Published);

    let recovered = handle.snapshot();
    assert_eq!(recovered.last_error, None);
    assert_eq!(recovered.obligations_due_today.len(), 2);
    assert_eq!(recovered.evaluated_at, Some(at(14, 10, 5)));
}

#[tokio::test(start_paused = true)]
async fn identity_change_reevaluates_and_sign_out_stops_loop() {
    let fixture = Fixture::new(
        at(14, 11, 0),
        vec![pending("op-1", 14, 1), pending("op-2", 13, 2)],
    );
    let handle = fixture.start();
    wait_for_pass(&handle).await;
    assert_eq!(handle.snapshot().obligations_due_today.len(), 1);

    let mut rx = handle.subscribe();
    fixture.identity.sign_in("op-2");
    while rx.borrow_and_update().obligations_overdue.is_empty() {
        rx.changed().await.unwrap();
    }
    let snapshot = handle.snapshot();
    assert!(snapshot.obligations_due_today.is_empty());
    assert_eq!(snapshot.obligations_overdue[0].owner_id, "op-2");

    fixture.identity.sign_out();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(!handle.is_running());
    assert_eq!(handle.total_alert_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn dropping_handle_cancels_loop() {
    let fixture = Fixture::new(at(14, 10, 0), Vec::new());
    let handle = fixture.start();
    wait_for_pass(&handle).await;
    let fetches = fixture.ledger.fetches();

    drop(handle);
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(fixture.ledger.fetches(), fetches);
}

#[tokio::test(start_paused = true)]
async fn active_alerts_lists_passed_triggers() {
    let fixture = Fixture::new(at(14, 12, 0), Vec::new());
    let handle = fixture.start();

    let titles: Vec<String> = handle
        .active_alerts()
        .into_iter()
        .map(|definition| definition.title)
        .collect();
    assert_eq!(titles, vec!["Bank return files"]);

    fixture.clock.set(at(14, 18, 0));
    assert_eq!(handle.active_alerts().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn active_alerts_are_suppressed_on_weekends() {
    // Saturday 18:00; "Shift wrap-up" has no weekday restriction.
    let fixture = Fixture::new(at(17, 18, 0), Vec::new());
    let handle = fixture.start();
    wait_for_pass(&handle).await;

    assert_eq!(handle.total_alert_count(), 0);
    assert!(handle.active_alerts().is_empty());
}

#[tokio::test(start_paused = true)]
async fn scheduled_tick_recovers_from_failed_first_fetch() {
    let fixture = Fixture::new(at(14, 10, 0), vec![pending("op-1", 14, 1)]);
    fixture.ledger.set_failing(true);
    let handle = fixture.start();

    let mut rx = handle.subscribe();
    while rx.borrow_and_update().last_error.is_none() {
        rx.changed().await.unwrap();
    }
    let failed = handle.snapshot();
    assert!(failed.obligations_due_today.is_empty());
    assert_eq!(failed.evaluated_at, None);
    assert!(handle.is_running());

    fixture.ledger.set_failing(false);
    tokio::time::sleep(Duration::from_secs(31)).await;

    let recovered = handle.snapshot();
    assert_eq!(recovered.last_error, None);
    assert_eq!(recovered.obligations_due_today.len(), 1);
    assert_eq!(recovered.evaluated_at, Some(at(14, 10, 0)));
    assert_eq!(fixture.ledger.fetches(), 2);
}

#[tokio::test(start_paused = true)]
async fn snapshot_reports_loading_while_fetch_is_in_flight() {
    let fixture = Fixture::new(at(14, 10, 0), vec![pending("op-1", 14, 1)]);
    let gate = fixture.ledger.hold_next_fetch();
    let handle = fixture.start();

    let mut rx = handle.subscribe();
    while !rx.borrow_and_update().is_loading {
        rx.changed().await.unwrap();
    }
    assert_eq!(handle.snapshot().evaluated_at, None);

    gate.notify_one();
    wait_for_pass(&handle).await;
    let snapshot = handle.snapshot();
    assert!(!snapshot.is_loading);
    assert_eq!(snapshot.obligations_due_today.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn abandoned_refresh_clears_loading_flag() {
    // Outside the active window, so no tick can finish a pass for us.
    let fixture = Fixture::new(at(14, 19, 30), vec![pending("op-1", 14, 1)]);
    let handle = fixture.start();
    wait_for_pass(&handle).await;

    let _gate = fixture.ledger.hold_next_fetch();
    let abandoned = tokio::time::timeout(Duration::from_secs(1), handle.refresh()).await;
    assert!(abandoned.is_err());

    let snapshot = handle.snapshot();
    assert!(!snapshot.is_loading);
    assert_eq!(snapshot.obligations_due_today.len(), 1);
}
