//! Traits describing the external collaborators and shared helper types.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use reqwest::Error as ReqwestError;
use serde_json::{Error as JsonError, Value};

use crate::calendar::{PollDates, next_month};
use crate::model::{DayColorSet, ProviderKind};

#[derive(thiserror::Error, Debug)]
/// Errors raised by provider backends, the clock, the link and the pins.
pub enum PortError {
    /// Network layer failed.
    #[error("Network error: {0}")]
    Network(#[from] ReqwestError),
    /// Payload did not have the expected shape.
    #[error("Payload error: {0}")]
    Payload(#[from] JsonError),
    /// A required key was missing from the payload.
    #[error("Missing field: {0}")]
    MissingField(&'static str),
    /// Time server answered with something unusable.
    #[error("Time sync failed: {0}")]
    TimeSync(String),
    /// Operation did not finish in time.
    #[error("Timed out")]
    Timeout,
    /// The network link is not up.
    #[error("Link down")]
    LinkDown,
    /// Local I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// An output pin rejected a write.
    #[error("Pin error: {0}")]
    Pin(String),
}

#[derive(Debug)]
/// Outcome of a call that must never abort the poll loop.
///
/// Failures are kept as [`Fetched::Empty`] so callers can log them, while the
/// data view falls back to `T::default()`.
pub enum Fetched<T> {
    /// The call succeeded.
    Data(T),
    /// The call failed and contributes nothing.
    Empty(PortError),
}

impl<T> Fetched<T> {
    /// Whether the call produced data.
    #[must_use]
    pub fn is_data(&self) -> bool {
        matches!(self, Fetched::Data(_))
    }

    /// The data, if any.
    #[must_use]
    pub fn data(self) -> Option<T> {
        match self {
            Fetched::Data(data) => Some(data),
            Fetched::Empty(_) => None,
        }
    }

    /// The failure, if any.
    #[must_use]
    pub fn error(&self) -> Option<&PortError> {
        match self {
            Fetched::Data(_) => None,
            Fetched::Empty(err) => Some(err),
        }
    }

    /// Chain another fail-soft step onto successful data.
    pub fn and_then<U, F>(self, next: F) -> Fetched<U>
    where
        F: FnOnce(T) -> Fetched<U>,
    {
        match self {
            Fetched::Data(data) => next(data),
            Fetched::Empty(err) => Fetched::Empty(err),
        }
    }
}

impl<T: Default> Fetched<T> {
    /// The data, or the empty default on failure.
    #[must_use]
    pub fn into_data(self) -> T {
        self.data().unwrap_or_default()
    }
}

impl<T> From<Result<T, PortError>> for Fetched<T> {
    fn from(result: Result<T, PortError>) -> Self {
        match result {
            Ok(data) => Fetched::Data(data),
            Err(err) => Fetched::Empty(err),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Dates to normalize against plus the calendar month to request.
pub struct FetchWindow {
    /// Today as `YYYY-MM-DD`.
    pub today: String,
    /// Tomorrow as `YYYY-MM-DD`.
    pub tomorrow: String,
    /// Year of the requested month.
    pub year: i32,
    /// Requested month, 1-based.
    pub month: u32,
}

impl FetchWindow {
    /// Window covering the current month.
    #[must_use]
    pub fn current(dates: &PollDates) -> Self {
        Self {
            today: dates.today.clone(),
            tomorrow: dates.tomorrow.clone(),
            year: dates.year,
            month: dates.month,
        }
    }

    /// Same dates, requesting the following month.
    #[must_use]
    pub fn next_month(&self) -> Self {
        let (year, month) = next_month(self.year, self.month);
        Self {
            today: self.today.clone(),
            tomorrow: self.tomorrow.clone(),
            year,
            month,
        }
    }
}

#[async_trait]
/// Trait for provider-specific collection calendar backends.
pub trait WasteProvider: Send + Sync {
    /// Which upstream API this provider talks to.
    fn kind(&self) -> ProviderKind;

    /// Whether the provider only returns one calendar month per request, so the
    /// last day of a month needs a second request to see tomorrow.
    fn wants_lookahead(&self) -> bool {
        false
    }

    /// Request the raw calendar payload for the window.
    async fn fetch(&self, window: &FetchWindow) -> Fetched<Value>;

    /// Extract today's and tomorrow's colors from a raw payload.
    fn normalize(&self, raw: &Value, today: &str, tomorrow: &str) -> Fetched<DayColorSet>;
}

#[async_trait]
/// Wall clock with network resynchronization.
pub trait Clock: Send + Sync {
    /// Current local wall-clock reading.
    fn now(&self) -> NaiveDateTime;

    /// Resynchronize against a network time server.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the server cannot be reached or answers garbage.
    async fn sync_from_network(&mut self, host: &str) -> Result<(), PortError>;
}

#[async_trait]
/// Network link manager.
pub trait Link: Send + Sync {
    /// Whether the link is currently usable.
    async fn is_up(&self) -> bool;

    /// Start connecting to the given network. Does not wait for the link.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the connect request itself fails.
    async fn connect(&self, ssid: &str, password: &str) -> Result<(), PortError>;
}

/// Single digital output.
pub trait OutputPin: Send + Sync {
    /// Drive the pin high (`true`) or low.
    ///
    /// # Errors
    ///
    /// Returns [`PortError::Pin`] or [`PortError::Io`] when the write fails.
    fn set_level(&self, high: bool) -> Result<(), PortError>;

    /// Last level written.
    fn level(&self) -> bool;

    /// Invert the current level.
    ///
    /// # Errors
    ///
    /// See [`OutputPin::set_level`].
    fn toggle(&self) -> Result<(), PortError> {
        self.set_level(!self.level())
    }
}
