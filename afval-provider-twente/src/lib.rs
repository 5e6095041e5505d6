//! Provider implementation for Twente Milieu using the Ximmio calendar API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use afval_core::{
    colors::twente_color,
    model::{CollectionEvent, DayColorSet, ProviderKind},
    ports::{FetchWindow, Fetched, PortError, WasteProvider},
};

const CALENDAR_URL: &str = "https://twentemilieuapi.ximmio.com/api/GetCalendar";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Pickup type entry from `GetCalendar`'s `dataList`
#[derive(Debug, Deserialize)]
struct PickupType {
    #[serde(rename = "pickupType")]
    type_number: i64,

    #[serde(rename = "_pickupTypeText", default)]
    type_text: Option<String>,

    #[serde(rename = "pickupDates")]
    dates: Vec<String>, // "2025-06-30T00:00:00"
}

/// Calendar backend for a Twente Milieu address.
pub struct TwenteProvider {
    client: Client,
    company_code: String,
    address_id: String,
}

impl TwenteProvider {
    /// Create a provider for the given company and address.
    #[must_use]
    pub fn new(
        client: Client,
        company_code: impl Into<String>,
        address_id: impl Into<String>,
    ) -> Self {
        Self {
            client,
            company_code: company_code.into(),
            address_id: address_id.into(),
        }
    }

    async fn request(&self, window: &FetchWindow) -> Result<Value, PortError> {
        let req = self
            .client
            .post(CALENDAR_URL)
            .timeout(REQUEST_TIMEOUT)
            .form(&[
                ("companyCode", self.company_code.as_str()),
                ("uniqueAddressID", self.address_id.as_str()),
                ("startDate", window.today.as_str()),
                ("endDate", window.tomorrow.as_str()),
            ]);

        let mut body = fetch_json::<Value>(req).await?;

        body.get_mut("dataList")
            .map(Value::take)
            .ok_or(PortError::MissingField("dataList"))
    }
}

#[async_trait]
impl WasteProvider for TwenteProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Twente
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
    company_code: impl Into<String>,
    address_id: impl Into<String>,
) -> Box<dyn WasteProvider> {
    Box::new(TwenteProvider::new(client, company_code, address_id))
}

/// Flatten a `dataList` payload into one event per pickup date.
///
/// # Errors
///
/// Returns [`PortError::Payload`] when the payload is not a list of pickup types.
pub fn pickup_events(raw: &Value) -> Result<Vec<CollectionEvent>, PortError> {
    let types = Vec::<PickupType>::deserialize(raw)?;

    let mut events = Vec::new();
    for pickup in types {
        let color = twente_color(pickup.type_number);
        log::debug!(
            "{} {} {color}",
            pickup.type_text.as_deref().unwrap_or("-"),
            pickup.type_number
        );

        for stamp in pickup.dates {
            // anything shorter can't hold YYYY-MM-DD
            if stamp.len() < 10 {
                continue;
            }
            let Some(date) = stamp.split('T').next() else {
                continue;
            };
            events.push(CollectionEvent {
                date: date.to_owned(),
                color,
            });
        }
    }

    Ok(events)
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
