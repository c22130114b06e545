use std::{fmt, str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

/// Canonical catalog key for an item (the pricing service's type id).
pub type ItemId = String;

/// One loot row detected in pasted clipboard text.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LootLine {
    /// 1-based line number in the pasted text.
    pub line_no: usize,
    pub raw_text: String,
    /// Normalized name used for catalog lookups.
    pub item_name: String,
    pub quantity: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchStatus {
    Exact,
    Fuzzy,
    Unmatched,
}

impl MatchStatus {
    pub fn label(&self) -> &'static str {
        match self {
            MatchStatus::Exact => "exact",
            MatchStatus::Fuzzy => "fuzzy",
            MatchStatus::Unmatched => "unmatched",
        }
    }
}

/// Where the price of a resolved item came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PriceOrigin {
    /// Served from a fresh catalog entry without a request.
    Cached,
    /// Requested from the pricing service during this resolve.
    Fetched,
    /// Needed a fresh price but the batched request failed or timed out.
    FetchFailed,
    /// The service answered but nothing in the catalog matches the name.
    NotFound,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResolvedItem {
    pub item_id: Option<ItemId>,
    pub display_name: String,
    /// Name of the loot line this item was resolved from.
    pub source_name: String,
    pub quantity: u64,
    /// Lowest sell order; the price every value is computed from.
    pub unit_price: Option<f64>,
    /// Highest buy order, when the service reports one.
    #[serde(default)]
    pub buy_price: Option<f64>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub price_timestamp: Option<OffsetDateTime>,
    pub match_status: MatchStatus,
    /// Name similarity in `0.0..=1.0`; `1.0` for exact matches, `0.0` when unmatched.
    #[serde(default)]
    pub match_score: f64,
    pub price_origin: PriceOrigin,
}

impl ResolvedItem {
    /// An item nothing could be priced for. Always carries `unit_price = None`.
    pub fn unmatched(line: &LootLine, origin: PriceOrigin) -> Self {
        Self {
            item_id: None,
            display_name: line.item_name.clone(),
            source_name: line.item_name.clone(),
            quantity: line.quantity,
            unit_price: None,
            buy_price: None,
            price_timestamp: None,
            match_status: MatchStatus::Unmatched,
            match_score: 0.0,
            price_origin: origin,
        }
    }

    pub fn is_matched(&self) -> bool {
        self.match_status != MatchStatus::Unmatched
    }

    /// `quantity * unit_price`, or `None` when no price is known.
    pub fn value(&self) -> Option<f64> {
        self.unit_price.map(|price| price * self.quantity as f64)
    }

    /// What the item would fetch selling into buy orders.
    pub fn buy_value(&self) -> Option<f64> {
        self.buy_price.map(|price| price * self.quantity as f64)
    }
}

/// Display line with identical items folded together.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunLine {
    pub item_id: Option<ItemId>,
    pub display_name: String,
    pub quantity: u64,
    pub unit_price: Option<f64>,
    pub value: Option<f64>,
    pub match_status: MatchStatus,
}

/// Result of the batched price request made while resolving a run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PricingOutcome {
    /// Every name had a fresh catalog entry.
    NotNeeded,
    Fetched { requested: usize, received: usize },
    Failed { requested: usize, reason: String },
    TimedOut { requested: usize },
}

impl PricingOutcome {
    /// True when some names could not be priced because the service was unreachable.
    pub fn is_degraded(&self) -> bool {
        matches!(
            self,
            PricingOutcome::Failed { .. } | PricingOutcome::TimedOut { .. }
        )
    }
}

impl fmt::Display for PricingOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PricingOutcome::NotNeeded => write!(f, "all prices cached"),
            PricingOutcome::Fetched {
                requested,
                received,
            } => write!(f, "fetched {received}/{requested} prices"),
            PricingOutcome::Failed { requested, reason } => {
                write!(f, "price fetch for {requested} items failed: {reason}")
            }
            PricingOutcome::TimedOut { requested } => {
                write!(f, "price fetch for {requested} items timed out")
            }
        }
    }
}

/// One completed loot run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub ended_at: OffsetDateTime,
    #[serde(default)]
    pub site_type: Option<SiteType>,
    #[serde(default)]
    pub comment: Option<String>,
    /// Per-source items in paste order.
    pub items: Vec<ResolvedItem>,
    pub lines: Vec<RunLine>,
    /// Items used up during the run (inventory delta captures only).
    #[serde(default)]
    pub consumed: Vec<ResolvedItem>,
    pub total_value: f64,
    /// Looted items valued at buy orders; items without a buy price add nothing.
    #[serde(default)]
    pub buy_value: f64,
    #[serde(default)]
    pub consumed_value: f64,
    pub unmatched_count: usize,
    #[serde(default)]
    pub profit_per_hour: Option<f64>,
    #[serde(default)]
    pub discarded_lines: usize,
    pub pricing: PricingOutcome,
    #[serde(default)]
    pub source_digest: String,
}

impl Run {
    pub fn net_value(&self) -> f64 {
        self.total_value - self.consumed_value
    }

    pub fn pricing_degraded(&self) -> bool {
        self.pricing.is_degraded()
    }

    pub fn duration(&self) -> Option<Duration> {
        let elapsed = self.ended_at - self.started_at;
        if elapsed.is_positive() {
            Some(elapsed.unsigned_abs())
        } else {
            None
        }
    }
}

/// Context the surrounding application knows about a run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunMetadata {
    pub started_at: Option<OffsetDateTime>,
    pub elapsed: Option<Duration>,
    pub site_type: Option<SiteType>,
    pub comment: Option<String>,
}

impl RunMetadata {
    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = Some(elapsed);
        self
    }

    pub fn with_site(mut self, site_type: SiteType) -> Self {
        self.site_type = Some(site_type);
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Weather {
    Dark,
    Electrical,
    Exotic,
    Firestorm,
    Gamma,
}

impl Weather {
    pub const ALL: [Weather; 5] = [
        Weather::Dark,
        Weather::Electrical,
        Weather::Exotic,
        Weather::Firestorm,
        Weather::Gamma,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Weather::Dark => "Dark",
            Weather::Electrical => "Electrical",
            Weather::Exotic => "Exotic",
            Weather::Firestorm => "Firestorm",
            Weather::Gamma => "Gamma",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShipClass {
    Frigate,
    Destroyer,
    Cruiser,
}

impl ShipClass {
    pub const ALL: [ShipClass; 3] = [ShipClass::Frigate, ShipClass::Destroyer, ShipClass::Cruiser];

    pub fn name(&self) -> &'static str {
        match self {
            ShipClass::Frigate => "Frigate",
            ShipClass::Destroyer => "Destroyer",
            ShipClass::Cruiser => "Cruiser",
        }
    }

    /// Fleet size the filament allows for this hull class.
    pub fn max_ships(&self) -> u8 {
        match self {
            ShipClass::Frigate => 3,
            ShipClass::Destroyer => 2,
            ShipClass::Cruiser => 1,
        }
    }
}

pub const MAX_TIER: u8 = 6;

/// Abyssal site classification: filament tier, weather and fleet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SiteType {
    pub tier: u8,
    pub weather: Weather,
    pub ship: ShipClass,
    pub ship_count: u8,
}

impl SiteType {
    pub fn new(
        tier: u8,
        weather: Weather,
        ship: ShipClass,
        ship_count: u8,
    ) -> Result<Self, SiteTypeError> {
        if tier > MAX_TIER {
            return Err(SiteTypeError::Tier(tier));
        }
        if ship_count == 0 || ship_count > ship.max_ships() {
            return Err(SiteTypeError::ShipCount {
                ship: ship.name(),
                count: ship_count,
                max: ship.max_ships(),
            });
        }
        Ok(Self {
            tier,
            weather,
            ship,
            ship_count,
        })
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SiteTypeError {
    #[error("tier {0} is out of range (0..=6)")]
    Tier(u8),
    #[error("{ship} sites allow 1..={max} ships, got {count}")]
    ShipCount {
        ship: &'static str,
        count: u8,
        max: u8,
    },
    #[error("unrecognised site token '{0}'")]
    Token(String),
    #[error("site description is missing the {0}")]
    Missing(&'static str),
}

impl fmt::Display for SiteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "T{} {} {}x {}",
            self.tier,
            self.weather.name(),
            self.ship_count,
            self.ship.name()
        )
    }
}

/// Accepts descriptions such as `T5 Dark Cruiser` or `t3 gamma frigate x2`.
impl FromStr for SiteType {
    type Err = SiteTypeError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let mut tier = None;
        let mut weather = None;
        let mut ship = None;
        let mut count = None;

        for token in input.split_whitespace() {
            let lower = token.to_ascii_lowercase();
            if let Some(found) = Weather::ALL
                .iter()
                .find(|w| w.name().eq_ignore_ascii_case(&lower))
            {
                weather = Some(*found);
            } else if let Some(found) = ShipClass::ALL
                .iter()
                .find(|s| s.name().eq_ignore_ascii_case(&lower))
            {
                ship = Some(*found);
            } else if let Some(value) = lower.strip_prefix('t').and_then(|v| v.parse::<u8>().ok()) {
                tier = Some(value);
            } else if let Some(value) = lower
                .strip_prefix('x')
                .or_else(|| lower.strip_suffix('x'))
                .and_then(|v| v.parse::<u8>().ok())
            {
                count = Some(value);
            } else {
                return Err(SiteTypeError::Token(token.to_string()));
            }
        }

        SiteType::new(
            tier.ok_or(SiteTypeError::Missing("tier"))?,
            weather.ok_or(SiteTypeError::Missing("weather"))?,
            ship.ok_or(SiteTypeError::Missing("ship class"))?,
            count.unwrap_or(1),
        )
    }
}
