//! Poll/sync loop against fake providers, clocks and links.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use serde_json::{Value, json};

use afval_core::{
    ClockState, Clock, Color, Credentials, DayColorSet, FetchWindow, Fetched, Heartbeat,
    LedDriver, LedState, Link, OutputPin, Phase, PollDates, PortError, ProviderKind, Scheduler,
    SchedulerSettings, WasteProvider, establish_link,
};

// ============================================================================
// Fakes
// ============================================================================

#[derive(Default)]
struct FakePin {
    level: AtomicBool,
}

impl OutputPin for FakePin {
    fn set_level(&self, high: bool) -> Result<(), PortError> {
        self.level.store(high, Ordering::SeqCst);
        Ok(())
    }

    fn level(&self) -> bool {
        self.level.load(Ordering::SeqCst)
    }
}

#[derive(Clone)]
struct FakeClock {
    now: Arc<Mutex<NaiveDateTime>>,
    sync_ok: bool,
    syncs: Arc<AtomicUsize>,
}

impl FakeClock {
    fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> Self {
        Self {
            now: Arc::new(Mutex::new(datetime(year, month, day, hour, minute))),
            sync_ok: true,
            syncs: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn set(&self, value: NaiveDateTime) {
        *self.now.lock().expect("clock lock") = value;
    }
}

#[async_trait]
impl Clock for FakeClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock().expect("clock lock")
    }

    async fn sync_from_network(&mut self, _host: &str) -> Result<(), PortError> {
        self.syncs.fetch_add(1, Ordering::SeqCst);
        if self.sync_ok {
            Ok(())
        } else {
            Err(PortError::Timeout)
        }
    }
}

#[derive(Clone)]
struct FakeLink {
    up: Arc<AtomicBool>,
    up_after_connect: bool,
    connects: Arc<AtomicUsize>,
}

impl FakeLink {
    fn up() -> Self {
        Self {
            up: Arc::new(AtomicBool::new(true)),
            up_after_connect: true,
            connects: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn down(up_after_connect: bool) -> Self {
        Self {
            up: Arc::new(AtomicBool::new(false)),
            up_after_connect,
            connects: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl Link for FakeLink {
    async fn is_up(&self) -> bool {
        self.up.load(Ordering::SeqCst)
    }

    async fn connect(&self, _ssid: &str, _password: &str) -> Result<(), PortError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.up_after_connect {
            self.up.store(true, Ordering::SeqCst);
        }
        Ok(())
    }
}

/// Provider whose payload lists colors directly, keyed by requested month.
#[derive(Clone)]
struct FakeProvider {
    lookahead: bool,
    months: Arc<Mutex<Vec<((i32, u32), Value)>>>,
    requests: Arc<Mutex<Vec<(i32, u32)>>>,
}

#[derive(Deserialize)]
struct FakePayload {
    days: Vec<(String, Color)>,
}

impl FakeProvider {
    fn new(lookahead: bool) -> Self {
        Self {
            lookahead,
            months: Arc::new(Mutex::new(Vec::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn with_month(self, year: i32, month: u32, payload: Value) -> Self {
        self.months
            .lock()
            .expect("months lock")
            .push(((year, month), payload));
        self
    }

    fn requests(&self) -> Vec<(i32, u32)> {
        self.requests.lock().expect("requests lock").clone()
    }
}

#[async_trait]
impl WasteProvider for FakeProvider {
    fn kind(&self) -> ProviderKind {
        if self.lookahead {
            ProviderKind::Rd4
        } else {
            ProviderKind::Twente
        }
    }

    fn wants_lookahead(&self) -> bool {
        self.lookahead
    }

    async fn fetch(&self, window: &FetchWindow) -> Fetched<Value> {
        let key = (window.year, window.month);
        self.requests.lock().expect("requests lock").push(key);
        self.months
            .lock()
            .expect("months lock")
            .iter()
            .find(|(month, _payload)| *month == key)
            .map_or(Fetched::Empty(PortError::MissingField("month")), |(_month, payload)| {
                Fetched::Data(payload.clone())
            })
    }

    fn normalize(&self, raw: &Value, today: &str, tomorrow: &str) -> Fetched<DayColorSet> {
        Fetched::from(
            serde_json::from_value::<FakePayload>(raw.clone())
                .map_err(PortError::from)
                .map(|payload| {
                    DayColorSet::from_events(
                        payload
                            .days
                            .into_iter()
                            .map(|(date, color)| afval_core::CollectionEvent { date, color }),
                        today,
                        tomorrow,
                    )
                }),
        )
    }
}

fn datetime(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|date| date.and_hms_opt(hour, minute, 0))
        .expect("valid test datetime")
}

struct Rig {
    scheduler: Scheduler,
    clock: FakeClock,
    link: FakeLink,
    provider: FakeProvider,
}

fn rig(provider: FakeProvider, clock: FakeClock, link: FakeLink) -> Rig {
    let leds = LedDriver::new(Color::CHANNELS.into_iter().map(|color| {
        let pin: Arc<dyn OutputPin> = Arc::new(FakePin::default());
        (color, pin)
    }));
    let heartbeat = Heartbeat::start(Arc::new(FakePin::default()));
    let settings = SchedulerSettings {
        time_host: "pool.ntp.org".to_owned(),
        credentials: Credentials::default(),
    };
    let scheduler = Scheduler::new(
        Box::new(provider.clone()),
        Box::new(clock.clone()),
        Box::new(link.clone()),
        leds,
        heartbeat,
        settings,
    );
    Rig {
        scheduler,
        clock,
        link,
        provider,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test(start_paused = true)]
async fn first_cycle_polls_regardless_of_hour() {
    let provider = FakeProvider::new(false).with_month(
        2025,
        6,
        json!({"days": [["2025-06-10", "Gray"], ["2025-06-11", "Blue"]]}),
    );
    let mut rig = rig(provider, FakeClock::at(2025, 6, 10, 13, 5), FakeLink::up());
    assert_eq!(rig.scheduler.phase(), Phase::Booting);

    let pause = rig.scheduler.run_cycle().await;

    assert_eq!(pause.as_secs(), 57 * 60);
    assert_eq!(rig.scheduler.phase(), Phase::Sleeping);
    assert_eq!(rig.clock.syncs.load(Ordering::SeqCst), 1);
    assert_eq!(rig.scheduler.clock_state(), ClockState::Synced);
    assert_eq!(rig.provider.requests(), vec![(2025, 6)]);
    assert_eq!(rig.scheduler.leds().state(Color::Gray), LedState::Solid);
    assert_eq!(rig.scheduler.leds().state(Color::Blue), LedState::Blinking { hz: 1 });
    assert_eq!(rig.scheduler.leds().state(Color::Green), LedState::Off);
}

#[tokio::test(start_paused = true)]
async fn later_hours_keep_leds_until_midnight() {
    let provider = FakeProvider::new(false)
        .with_month(2025, 6, json!({"days": [["2025-06-10", "Green"], ["2025-06-11", "Orange"]]}));
    let mut rig = rig(provider, FakeClock::at(2025, 6, 10, 13, 2), FakeLink::up());

    rig.scheduler.run_cycle().await;
    rig.clock.set(datetime(2025, 6, 10, 14, 2));
    rig.scheduler.run_cycle().await;

    assert_eq!(rig.provider.requests().len(), 1, "hour 14 must not poll");
    assert_eq!(rig.clock.syncs.load(Ordering::SeqCst), 1, "hour 14 must not resync");
    assert_eq!(rig.scheduler.leds().state(Color::Green), LedState::Solid);
    assert_eq!(rig.scheduler.leds().state(Color::Orange), LedState::Blinking { hz: 1 });

    rig.clock.set(datetime(2025, 6, 11, 0, 2));
    rig.scheduler.run_cycle().await;

    assert_eq!(rig.provider.requests().len(), 2, "hour 0 polls again");
    assert_eq!(rig.scheduler.leds().state(Color::Orange), LedState::Solid);
    assert_eq!(rig.scheduler.leds().state(Color::Green), LedState::Off);
}

#[tokio::test(start_paused = true)]
async fn last_day_of_month_fetches_next_month_for_tomorrow() {
    let provider = FakeProvider::new(true)
        .with_month(2025, 4, json!({"days": [["2025-04-30", "Green"], ["2025-04-29", "Red"]]}))
        .with_month(
            2025,
            5,
            json!({"days": [["2025-04-30", "Gray"], ["2025-05-01", "Blue"]]}),
        );
    let mut rig = rig(provider, FakeClock::at(2025, 4, 30, 0, 2), FakeLink::up());

    rig.scheduler.run_cycle().await;

    assert_eq!(rig.provider.requests(), vec![(2025, 4), (2025, 5)]);
    let leds = rig.scheduler.leds();
    assert_eq!(leds.state(Color::Green), LedState::Solid, "today from the first fetch");
    assert_eq!(leds.state(Color::Gray), LedState::Off, "today of the second fetch is dropped");
    assert_eq!(leds.state(Color::Blue), LedState::Blinking { hz: 1 });
}

#[tokio::test(start_paused = true)]
async fn lookahead_rolls_into_next_year() {
    let provider = FakeProvider::new(true)
        .with_month(2025, 12, json!({"days": []}))
        .with_month(2026, 1, json!({"days": [["2026-01-01", "Red"]]}));
    let rig = rig(provider, FakeClock::at(2025, 12, 31, 0, 2), FakeLink::up());

    let dates = PollDates::from_date(NaiveDate::from_ymd_opt(2025, 12, 31).expect("valid date"));
    let colors = rig.scheduler.poll(&dates).await;

    assert_eq!(rig.provider.requests(), vec![(2025, 12), (2026, 1)]);
    assert!(colors.today.is_empty());
    assert_eq!(colors.tomorrow.into_iter().collect::<Vec<_>>(), vec![Color::Red]);
}

#[tokio::test(start_paused = true)]
async fn providers_without_lookahead_fetch_once() {
    let provider = FakeProvider::new(false)
        .with_month(2025, 4, json!({"days": [["2025-05-01", "Blue"]]}));
    let rig = rig(provider, FakeClock::at(2025, 4, 30, 0, 2), FakeLink::up());

    let dates = PollDates::from_date(NaiveDate::from_ymd_opt(2025, 4, 30).expect("valid date"));
    let colors = rig.scheduler.poll(&dates).await;

    assert_eq!(rig.provider.requests(), vec![(2025, 4)]);
    assert!(colors.tomorrow.contains(&Color::Blue));
}

#[tokio::test(start_paused = true)]
async fn failed_sync_and_fetch_are_not_fatal() {
    let mut clock = FakeClock::at(2025, 6, 10, 0, 59);
    clock.sync_ok = false;
    let mut rig = rig(FakeProvider::new(false), clock, FakeLink::up());

    let pause = rig.scheduler.run_cycle().await;

    assert_eq!(pause.as_secs(), 3 * 60);
    assert_eq!(rig.scheduler.clock_state(), ClockState::Unsynced);
    assert_eq!(rig.provider.requests(), vec![(2025, 6)]);
    assert!(
        rig.scheduler
            .leds()
            .states()
            .iter()
            .all(|(_color, state)| *state == LedState::Off)
    );
}

#[tokio::test(start_paused = true)]
async fn malformed_payload_clears_leds() {
    let provider = FakeProvider::new(false).with_month(2025, 6, json!({"unexpected": true}));
    let mut rig = rig(provider, FakeClock::at(2025, 6, 10, 0, 2), FakeLink::up());

    rig.scheduler.run_cycle().await;

    assert!(
        rig.scheduler
            .leds()
            .states()
            .iter()
            .all(|(_color, state)| *state == LedState::Off)
    );
}

#[tokio::test(start_paused = true)]
async fn link_down_skips_poll_and_reconnects() {
    let provider = FakeProvider::new(false).with_month(2025, 6, json!({"days": []}));
    let mut rig = rig(provider, FakeClock::at(2025, 6, 10, 9, 30), FakeLink::down(true));

    rig.scheduler.run_cycle().await;

    assert!(rig.provider.requests().is_empty(), "no poll while the link is down");
    assert_eq!(rig.clock.syncs.load(Ordering::SeqCst), 0);
    assert_eq!(rig.link.connects.load(Ordering::SeqCst), 1);
    assert_eq!(rig.scheduler.clock_state(), ClockState::Booting);

    // still the first successful poll, so it runs at 10:02
    rig.clock.set(datetime(2025, 6, 10, 10, 2));
    rig.scheduler.run_cycle().await;
    assert_eq!(rig.provider.requests(), vec![(2025, 6)]);
}

#[tokio::test(start_paused = true)]
async fn first_poll_waits_for_the_link_then_runs_once() {
    let provider = FakeProvider::new(false).with_month(
        2025,
        6,
        json!({"days": [["2025-06-10", "Red"]]}),
    );
    let mut rig = rig(provider, FakeClock::at(2025, 6, 10, 9, 30), FakeLink::down(false));

    rig.scheduler.run_cycle().await;
    rig.clock.set(datetime(2025, 6, 10, 10, 2));
    rig.scheduler.run_cycle().await;
    assert!(rig.provider.requests().is_empty(), "no poll while the link stays down");
    assert_eq!(rig.scheduler.leds().state(Color::Red), LedState::Off);

    // link comes back mid-day: the pending first poll runs outside hour 0
    rig.link.up.store(true, Ordering::SeqCst);
    rig.clock.set(datetime(2025, 6, 10, 11, 2));
    rig.scheduler.run_cycle().await;
    assert_eq!(rig.provider.requests(), vec![(2025, 6)]);
    assert_eq!(rig.scheduler.clock_state(), ClockState::Synced);
    assert_eq!(rig.scheduler.leds().state(Color::Red), LedState::Solid);

    rig.clock.set(datetime(2025, 6, 10, 12, 2));
    rig.scheduler.run_cycle().await;
    assert_eq!(rig.provider.requests().len(), 1, "first poll is consumed");
}

#[tokio::test(start_paused = true)]
async fn reconnect_waits_at_most_ten_seconds() {
    let mut rig = rig(
        FakeProvider::new(false),
        FakeClock::at(2025, 6, 10, 9, 30),
        FakeLink::down(false),
    );

    let started = tokio::time::Instant::now();
    rig.scheduler.run_cycle().await;

    assert_eq!(rig.link.connects.load(Ordering::SeqCst), 1);
    assert_eq!(started.elapsed().as_secs(), 10);
}

#[tokio::test(start_paused = true)]
async fn startup_without_link_is_fatal() {
    let link = FakeLink::down(false);
    let result = establish_link(&link, &Credentials::default()).await;
    assert!(matches!(result, Err(PortError::LinkDown)));

    let link = FakeLink::down(true);
    assert!(establish_link(&link, &Credentials::default()).await.is_ok());
}
