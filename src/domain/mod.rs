//! Pure loot parsing, matching and valuation logic lives here.

pub mod catalog;
pub mod entities;
pub mod evaluation;
pub mod inventory;
pub mod matching;
pub mod parser;

pub use catalog::{is_expired, CatalogEntry, PriceCatalog, PriceQuote, DEFAULT_PRICE_TTL};
pub use entities::{
    ItemId, LootLine, MatchStatus, PriceOrigin, PricingOutcome, ResolvedItem, Run, RunLine,
    RunMetadata, ShipClass, SiteType, SiteTypeError, Weather,
};
pub use evaluation::{summarize, summarize_at, summarize_delta};
pub use inventory::{diff, InventoryDelta};
pub use matching::DEFAULT_FUZZY_THRESHOLD;
pub use parser::{parse, parse_with, MalformedLine, NormalizationRules, ParsedLoot};
