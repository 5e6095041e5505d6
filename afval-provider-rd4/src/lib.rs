//! Provider implementation for RD4 using the public waste calendar API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use afval_core::{
    colors::rd4_color,
    model::{CollectionEvent, DayColorSet, ProviderKind},
    ports::{FetchWindow, Fetched, PortError, WasteProvider},
};

const CALENDAR_URL: &str = "https://data.rd4.nl/api/v1/waste-calendar";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Calendar body, `{ items: [[...]] }`
#[derive(Debug, Deserialize)]
struct Calendar {
    items: Vec<Vec<CalendarItem>>,
}

/// Single pickup inside the first `items` list
#[derive(Debug, Deserialize)]
struct CalendarItem {
    date: String, // "YYYY-MM-DD"

    #[serde(rename = "type")]
    typ: String, // "residual_waste", "gft", ...
}

/// Calendar backend for an RD4 address.
pub struct Rd4Provider {
    client: Client,
    postal_code: String,
    house_number: String,
    house_number_extension: String,
}

impl Rd4Provider {
    /// Create a provider for the given postal address.
    #[must_use]
    pub fn new(
        client: Client,
        postal_code: impl Into<String>,
        house_number: impl Into<String>,
        house_number_extension: impl Into<String>,
    ) -> Self {
        Self {
            client,
            postal_code: postal_code.into(),
            house_number: house_number.into(),
            house_number_extension: house_number_extension.into(),
        }
    }

    async fn request(&self, window: &FetchWindow) -> Result<Value, PortError> {
        let year = window.year.to_string();
        let month = window.month.to_string();

        let req = self
            .client
            .get(CALENDAR_URL)
            .timeout(REQUEST_TIMEOUT)
            .query(&[
                ("postal_code", self.postal_code.as_str()),
                ("house_number", self.house_number.as_str()),
                ("house_number_extension", self.house_number_extension.as_str()),
                ("year", year.as_str()),
                ("month", month.as_str()),
            ]);

        let mut body = fetch_json::<Value>(req).await?;

        // the calendar sits in a `data` envelope next to `success`
        if let Some(data) = body.get_mut("data") {
            return Ok(data.take());
        }
        Ok(body)
    }
}

#[async_trait]
impl WasteProvider for Rd4Provider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Rd4
    }

    fn wants_lookahead(&self) -> bool {
        true
    }

    async fn fetch(&self, window: &FetchWindow) -> Fetched<Value> {
        Fetched::from(self.request(window).await)
    }

    fn normalize(&self, raw: &Value, today: &str, tomorrow: &str) -> Fetched<DayColorSet> {
        Fetched::from(
            pickup_events(raw).map(|events| DayColorSet::from_events(events, today, tomorrow)),
        )
    }
}

/// Build the boxed provider for the scheduler.
#[must_use]
pub fn provider(
    client: Client,
    postal_code: impl Into<String>,
    house_number: impl Into<String>,
    house_number_extension: impl Into<String>,
) -> Box<dyn WasteProvider> {
    Box::new(Rd4Provider::new(
        client,
        postal_code,
        house_number,
        house_number_extension,
    ))
}

/// Events of the first `items` list; later lists are ignored.
///
/// # Errors
///
/// Returns [`PortError::Payload`] when the payload has no `items` list of
/// `{date, type}` objects, or [`PortError::MissingField`] when it is empty.
pub fn pickup_events(raw: &Value) -> Result<Vec<CollectionEvent>, PortError> {
    let calendar = Calendar::deserialize(raw)?;
    let items = calendar
        .items
        .into_iter()
        .next()
        .ok_or(PortError::MissingField("items[0]"))?;

    Ok(items
        .into_iter()
        .map(|item| {
            let color = rd4_color(&item.typ);
            log::debug!("{} {} {color}", item.date, item.typ);
            CollectionEvent {
                date: item.date,
                color,
            }
        })
        .collect())
}

// Small helper to fetch and decode JSON with status handling.
async fn fetch_json<T: DeserializeOwned>(req: RequestBuilder) -> Result<T, PortError> {
    req.send()
        .await
        .map_err(PortError::from)?
        .error_for_status()
        .map_err(PortError::from)?
        .json()
        .await
        .map_err(PortError::from)
}
