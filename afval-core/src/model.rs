//! Domain data structures for colors, collection days and provider settings.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
/// Container color, one per LED channel.
pub enum Color {
    /// Residual waste bin.
    Gray,
    /// Organic waste bin.
    Green,
    /// Paper bin.
    Blue,
    /// Plastic/packaging bin.
    Orange,
    /// Christmas tree collection (Twente) or best bag (RD4).
    Red,
    /// Type code without a channel.
    Unknown,
}

impl Color {
    /// Colors that have an LED wired to them, in output order.
    pub const CHANNELS: [Color; 5] = [
        Color::Gray,
        Color::Green,
        Color::Blue,
        Color::Orange,
        Color::Red,
    ];

    /// Whether the color drives an LED.
    #[must_use]
    pub fn has_channel(self) -> bool {
        self != Color::Unknown
    }
}

impl fmt::Display for Color {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            Color::Gray => "GRAY",
            Color::Green => "GREEN",
            Color::Blue => "BLUE",
            Color::Orange => "ORANGE",
            Color::Red => "RED",
            Color::Unknown => "UNKNOWN",
        };
        write!(formatter, "{tag}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A single pickup on a given day, as extracted from a provider payload.
pub struct CollectionEvent {
    /// Pickup day as `YYYY-MM-DD`.
    pub date: String,
    /// Container color collected that day.
    pub color: Color,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Colors collected today and tomorrow. An empty set means no pickup.
pub struct DayColorSet {
    /// Colors picked up today (solid LEDs).
    pub today: BTreeSet<Color>,
    /// Colors picked up tomorrow (blinking LEDs).
    pub tomorrow: BTreeSet<Color>,
}

impl DayColorSet {
    /// Sort events into today/tomorrow by exact date-string equality.
    #[must_use]
    pub fn from_events<I>(events: I, today: &str, tomorrow: &str) -> Self
    where
        I: IntoIterator<Item = CollectionEvent>,
    {
        let mut set = Self::default();
        for event in events {
            if event.date == today {
                set.today.insert(event.color);
            }
            if event.date == tomorrow {
                set.tomorrow.insert(event.color);
            }
        }
        set
    }

    /// True when nothing is collected today or tomorrow.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.today.is_empty() && self.tomorrow.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// Upstream collection API.
pub enum ProviderKind {
    /// Twente Milieu (Ximmio calendar API).
    Twente,
    /// RD4 waste calendar.
    Rd4,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slug = match self {
            ProviderKind::Twente => "twente",
            ProviderKind::Rd4 => "rd4",
        };
        write!(formatter, "{slug}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "company", rename_all = "lowercase")]
/// Provider selection and address identifiers, loaded once at startup.
pub enum ProviderConfig {
    /// Twente Milieu address.
    Twente {
        /// Company code of the collecting company.
        company_code: String,
        /// Unique address id issued by the provider.
        address_id: String,
    },
    /// RD4 address.
    Rd4 {
        /// Dutch postal code, e.g. `6411AB`.
        postal_code: String,
        /// House number.
        house_number: String,
        /// Optional house number suffix.
        #[serde(default)]
        house_number_extension: String,
    },
}

impl ProviderConfig {
    /// Provider this configuration belongs to.
    #[must_use]
    pub fn kind(&self) -> ProviderKind {
        match self {
            ProviderConfig::Twente { .. } => ProviderKind::Twente,
            ProviderConfig::Rd4 { .. } => ProviderKind::Rd4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Whether the wall clock is known to be correct.
pub enum ClockState {
    /// No sync attempted yet.
    Booting,
    /// The most recent sync succeeded.
    Synced,
    /// The most recent sync failed.
    Unsynced,
}

impl ClockState {
    /// Status LED toggle rate for this state.
    #[must_use]
    pub fn heartbeat_hz(self) -> u32 {
        match self {
            ClockState::Booting => 10,
            ClockState::Synced => 1,
            ClockState::Unsynced => 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Output state of one LED channel.
pub enum LedState {
    /// Channel dark.
    Off,
    /// Channel lit continuously.
    Solid,
    /// Channel toggled `hz` times per second.
    Blinking {
        /// Toggles per second.
        hz: u32,
    },
}
