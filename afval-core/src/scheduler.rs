//! Hourly loop deciding when to resync the clock, poll the provider and sleep.

use std::time::Duration;

use chrono::Timelike;

use crate::calendar::PollDates;
use crate::leds::{Heartbeat, LedDriver};
use crate::model::{ClockState, DayColorSet};
use crate::ports::{Clock, FetchWindow, Link, PortError, WasteProvider};

/// Minute past the hour the loop aims to wake up at.
pub const WAKE_MINUTE: i64 = 2;
/// Link checks while waiting for a (re)connect.
pub const LINK_POLLS: u32 = 10;
/// Pause between link checks.
pub const LINK_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Where the loop currently is.
pub enum Phase {
    /// Started, no cycle run yet.
    Booting,
    /// Resynchronizing the wall clock.
    SyncingTime,
    /// Fetching and normalizing the calendar.
    Polling,
    /// Waiting for the next cycle.
    Sleeping,
}

#[derive(Debug, Clone, Default)]
/// Network credentials handed to the link manager.
pub struct Credentials {
    /// Network name.
    pub ssid: String,
    /// Network password.
    pub password: String,
}

#[derive(Debug, Clone)]
/// Static settings of the loop.
pub struct SchedulerSettings {
    /// Time server used for resynchronization.
    pub time_host: String,
    /// Credentials used for reconnects.
    pub credentials: Credentials,
}

/// Minutes to sleep so the next cycle starts at [`WAKE_MINUTE`] past the hour.
#[must_use]
pub fn sleep_minutes(current_minute: u32) -> u32 {
    let minutes = 60 - (i64::from(current_minute) - WAKE_MINUTE);
    if minutes < 1 {
        return 2;
    }
    u32::try_from(minutes).unwrap_or(2)
}

/// Whether this cycle should resync the clock and poll the provider.
#[must_use]
pub fn should_poll(hour: u32, first_run: bool, link_up: bool) -> bool {
    (hour == 0 || first_run) && link_up
}

/// Check the link up to `polls` times, `interval` apart.
pub async fn wait_for_link(link: &dyn Link, polls: u32, interval: Duration) -> bool {
    for attempt in 1..=polls {
        if link.is_up().await {
            return true;
        }
        log::info!("waiting for connection... ({attempt}/{polls})");
        tokio::time::sleep(interval).await;
    }
    link.is_up().await
}

/// Bring the link up before the loop starts.
///
/// # Errors
///
/// Returns [`PortError::LinkDown`] when the link is still down after the
/// bounded wait, or the error of the connect request itself.
pub async fn establish_link(link: &dyn Link, credentials: &Credentials) -> Result<(), PortError> {
    link.connect(&credentials.ssid, &credentials.password).await?;
    if wait_for_link(link, LINK_POLLS, LINK_POLL_INTERVAL).await {
        log::info!("connected");
        Ok(())
    } else {
        Err(PortError::LinkDown)
    }
}

/// The poll/sync state machine.
pub struct Scheduler {
    provider: Box<dyn WasteProvider>,
    clock: Box<dyn Clock>,
    link: Box<dyn Link>,
    leds: LedDriver,
    heartbeat: Heartbeat,
    settings: SchedulerSettings,
    first_run: bool,
    phase: Phase,
}

impl Scheduler {
    /// Assemble the loop from its collaborators.
    #[must_use]
    pub fn new(
        provider: Box<dyn WasteProvider>,
        clock: Box<dyn Clock>,
        link: Box<dyn Link>,
        leds: LedDriver,
        heartbeat: Heartbeat,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            provider,
            clock,
            link,
            leds,
            heartbeat,
            settings,
            first_run: true,
            phase: Phase::Booting,
        }
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Container LEDs.
    #[must_use]
    pub fn leds(&self) -> &LedDriver {
        &self.leds
    }

    /// Clock state shown by the status LED.
    #[must_use]
    pub fn clock_state(&self) -> ClockState {
        self.heartbeat.clock_state()
    }

    /// Run cycles forever, sleeping in between.
    pub async fn run(&mut self) {
        loop {
            let pause = self.run_cycle().await;
            tokio::time::sleep(pause).await;
        }
    }

    /// Run one cycle and return how long to sleep before the next one.
    ///
    /// The clock is only resynced and the provider only polled on the first
    /// cycle and during hour 0, and only while the link is up. Otherwise the
    /// LEDs keep whatever the last poll set.
    pub async fn run_cycle(&mut self) -> Duration {
        let hour = self.clock.now().hour();
        let link_up = self.link.is_up().await;

        if should_poll(hour, self.first_run, link_up) {
            self.enter(Phase::SyncingTime);
            self.sync_time().await;

            self.enter(Phase::Polling);
            let dates = PollDates::from_date(self.clock.now().date());
            log::info!(
                "Polling {} for {} and {}",
                self.provider.kind(),
                dates.today,
                dates.tomorrow
            );
            let colors = self.poll(&dates).await;
            log::info!("Today {:?}, tomorrow {:?}", colors.today, colors.tomorrow);
            self.leds.apply(&colors);
            self.first_run = false;
        } else if link_up {
            log::debug!("Hour {hour}, keeping current LEDs");
        } else {
            log::warn!("Link down, skipping poll");
        }

        self.ensure_link().await;

        self.enter(Phase::Sleeping);
        let minutes = sleep_minutes(self.clock.now().minute());
        log::info!("Sleeping {minutes} minutes");
        Duration::from_secs(u64::from(minutes) * 60)
    }

    /// Fetch and normalize the calendar for `dates`.
    ///
    /// On the last day of a month a provider that wants a lookahead is asked
    /// for the next month too, and that answer replaces tomorrow's colors.
    pub async fn poll(&self, dates: &PollDates) -> DayColorSet {
        let window = FetchWindow::current(dates);
        let mut colors = self.fetch_colors(&window).await;

        if self.provider.wants_lookahead() && dates.is_last_day_of_month() {
            let next = window.next_month();
            log::info!("Last day of the month, also fetching {}-{:02}", next.year, next.month);
            colors.tomorrow = self.fetch_colors(&next).await.tomorrow;
        }

        colors
    }

    async fn fetch_colors(&self, window: &FetchWindow) -> DayColorSet {
        let fetched = self
            .provider
            .fetch(window)
            .await
            .and_then(|raw| self.provider.normalize(&raw, &window.today, &window.tomorrow));

        if let Some(err) = fetched.error() {
            log::warn!(
                "{} calendar for {}-{:02} unavailable: {err}",
                self.provider.kind(),
                window.year,
                window.month
            );
        }
        fetched.into_data()
    }

    async fn sync_time(&mut self) {
        match self.clock.sync_from_network(&self.settings.time_host).await {
            Ok(()) => {
                log::info!("Clock synced with {}: {}", self.settings.time_host, self.clock.now());
                self.heartbeat.set(ClockState::Synced);
            }
            Err(err) => {
                log::warn!("Clock sync with {} failed: {err}", self.settings.time_host);
                self.heartbeat.set(ClockState::Unsynced);
            }
        }
    }

    async fn ensure_link(&self) {
        if self.link.is_up().await {
            return;
        }

        log::warn!("trying to reconnect...");
        let credentials = &self.settings.credentials;
        if let Err(err) = self.link.connect(&credentials.ssid, &credentials.password).await {
            log::warn!("Reconnect request failed: {err}");
        }
        if wait_for_link(self.link.as_ref(), LINK_POLLS, LINK_POLL_INTERVAL).await {
            log::info!("link reconnected");
        } else {
            log::warn!("link reconnect failed");
        }
    }

    fn enter(&mut self, phase: Phase) {
        log::debug!("{:?} -> {phase:?}", self.phase);
        self.phase = phase;
    }
}
