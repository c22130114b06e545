//! In-memory price table with TTL expiry.

use std::{collections::HashMap, time::Duration};

use time::OffsetDateTime;

use super::{
    entities::{ItemId, MatchStatus},
    matching::best_match,
};

/// Default price TTL: 4 hours. Market prices for abyssal loot move slowly.
pub const DEFAULT_PRICE_TTL: Duration = Duration::from_secs(4 * 60 * 60);

/// A price reported by the pricing service.
#[derive(Clone, Debug, PartialEq)]
pub struct PriceQuote {
    pub item_id: ItemId,
    pub name: String,
    pub unit_price: f64,
    pub buy_price: Option<f64>,
    /// When the service says the price was observed, if it says so.
    pub quoted_at: Option<OffsetDateTime>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CatalogEntry {
    pub item_id: ItemId,
    pub name: String,
    pub unit_price: f64,
    pub buy_price: Option<f64>,
    pub quoted_at: OffsetDateTime,
    /// Local time the entry was stored; drives expiry.
    pub fetched_at: OffsetDateTime,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CatalogMatch<'a> {
    pub entry: &'a CatalogEntry,
    pub status: MatchStatus,
    pub score: f64,
}

/// True once an entry fetched at `fetched_at` is older than `ttl` at `now`.
/// Timestamps in the future never count as expired.
pub fn is_expired(now: OffsetDateTime, fetched_at: OffsetDateTime, ttl: Duration) -> bool {
    let age = now - fetched_at;
    age.is_positive() && age.unsigned_abs() > ttl
}

#[derive(Debug)]
pub struct PriceCatalog {
    entries: HashMap<ItemId, CatalogEntry>,
    names: HashMap<String, ItemId>,
    ttl: Duration,
}

impl Default for PriceCatalog {
    fn default() -> Self {
        Self::new(DEFAULT_PRICE_TTL)
    }
}

impl PriceCatalog {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            names: HashMap::new(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Stores a quote, replacing any older entry for the same item.
    /// Returns `false` for quotes with an unusable price.
    pub fn record(&mut self, quote: PriceQuote, fetched_at: OffsetDateTime) -> bool {
        if !quote.unit_price.is_finite() || quote.unit_price < 0.0 {
            return false;
        }

        if let Some(previous) = self.entries.get(&quote.item_id) {
            // The old name may already point at another item.
            if previous.name != quote.name
                && self.names.get(&previous.name) == Some(&quote.item_id)
            {
                self.names.remove(&previous.name);
            }
        }

        self.names.insert(quote.name.clone(), quote.item_id.clone());
        self.entries.insert(
            quote.item_id.clone(),
            CatalogEntry {
                item_id: quote.item_id,
                name: quote.name,
                unit_price: quote.unit_price,
                buy_price: quote.buy_price.filter(|price| price.is_finite() && *price >= 0.0),
                quoted_at: quote.quoted_at.unwrap_or(fetched_at),
                fetched_at,
            },
        );
        true
    }

    /// Entry whose name equals `name` exactly and has not expired.
    pub fn fresh_exact(&self, name: &str, now: OffsetDateTime) -> Option<&CatalogEntry> {
        self.names
            .get(name)
            .and_then(|id| self.entries.get(id))
            .filter(|entry| !is_expired(now, entry.fetched_at, self.ttl))
    }

    pub fn needs_refresh(&self, name: &str, now: OffsetDateTime) -> bool {
        self.fresh_exact(name, now).is_none()
    }

    /// Exact lookup first, then the single best fuzzy match among fresh entries.
    pub fn lookup(&self, name: &str, now: OffsetDateTime, threshold: f64) -> Option<CatalogMatch<'_>> {
        if let Some(entry) = self.fresh_exact(name, now) {
            return Some(CatalogMatch {
                entry,
                status: MatchStatus::Exact,
                score: 1.0,
            });
        }

        let fresh: Vec<&CatalogEntry> = self
            .entries
            .values()
            .filter(|entry| !is_expired(now, entry.fetched_at, self.ttl))
            .collect();

        best_match(name, fresh.iter().map(|entry| entry.name.as_str()), threshold).map(
            |(idx, score)| CatalogMatch {
                entry: fresh[idx],
                status: MatchStatus::Fuzzy,
                score,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn quote(id: &str, name: &str, price: f64) -> PriceQuote {
        PriceQuote {
            item_id: id.into(),
            name: name.into(),
            unit_price: price,
            buy_price: None,
            quoted_at: None,
        }
    }

    #[test]
    fn expiry_is_a_function_of_age_and_ttl() {
        let fetched = datetime!(2025-01-01 12:00 UTC);
        let ttl = Duration::from_secs(60 * 60);
        assert!(!is_expired(datetime!(2025-01-01 12:30 UTC), fetched, ttl));
        assert!(!is_expired(datetime!(2025-01-01 13:00 UTC), fetched, ttl));
        assert!(is_expired(datetime!(2025-01-01 13:00:01 UTC), fetched, ttl));
        assert!(!is_expired(datetime!(2025-01-01 11:00 UTC), fetched, ttl));
    }

    #[test]
    fn exact_lookup_returns_catalog_price() {
        let now = datetime!(2025-01-01 12:00 UTC);
        let mut catalog = PriceCatalog::default();
        catalog.record(quote("47956", "Gravid Core", 100.0), now);

        let found = catalog.lookup("Gravid Core", now, 0.85).unwrap();
        assert_eq!(found.status, MatchStatus::Exact);
        assert_eq!(found.entry.unit_price, 100.0);
        assert_eq!(found.entry.quoted_at, now);
    }

    #[test]
    fn fuzzy_lookup_ignores_case_and_expired_entries() {
        let fetched = datetime!(2025-01-01 12:00 UTC);
        let mut catalog = PriceCatalog::new(Duration::from_secs(600));
        catalog.record(quote("47956", "Gravid Core", 100.0), fetched);

        let found = catalog
            .lookup("gravid core", datetime!(2025-01-01 12:05 UTC), 0.85)
            .unwrap();
        assert_eq!(found.status, MatchStatus::Fuzzy);
        assert_eq!(found.entry.item_id, "47956");

        assert!(catalog
            .lookup("Gravid Core", datetime!(2025-01-01 13:00 UTC), 0.85)
            .is_none());
        assert!(catalog.needs_refresh("Gravid Core", datetime!(2025-01-01 13:00 UTC)));
    }

    #[test]
    fn renamed_items_drop_their_old_name() {
        let now = datetime!(2025-01-01 12:00 UTC);
        let mut catalog = PriceCatalog::default();
        catalog.record(quote("1", "Old Name", 5.0), now);
        catalog.record(quote("1", "New Name", 6.0), now);

        assert_eq!(catalog.len(), 1);
        assert!(catalog.fresh_exact("Old Name", now).is_none());
        assert_eq!(catalog.fresh_exact("New Name", now).unwrap().unit_price, 6.0);
    }

    #[test]
    fn renaming_keeps_a_name_taken_over_by_another_item() {
        let now = datetime!(2025-01-01 12:00 UTC);
        let mut catalog = PriceCatalog::default();
        catalog.record(quote("A", "Shared Name", 5.0), now);
        catalog.record(quote("B", "Shared Name", 7.0), now);
        catalog.record(quote("A", "Other Name", 6.0), now);

        let owner = catalog.fresh_exact("Shared Name", now).unwrap();
        assert_eq!(owner.item_id, "B");
        assert_eq!(catalog.fresh_exact("Other Name", now).unwrap().item_id, "A");
        assert!(!catalog.needs_refresh("Shared Name", now));
    }

    #[test]
    fn buy_prices_are_kept_when_usable() {
        let now = datetime!(2025-01-01 12:00 UTC);
        let mut catalog = PriceCatalog::default();
        catalog.record(
            PriceQuote {
                buy_price: Some(80.0),
                ..quote("1", "Gravid Core", 100.0)
            },
            now,
        );
        catalog.record(
            PriceQuote {
                buy_price: Some(f64::NAN),
                ..quote("2", "Tripped Data", 5.0)
            },
            now,
        );
        assert_eq!(catalog.fresh_exact("Gravid Core", now).unwrap().buy_price, Some(80.0));
        assert_eq!(catalog.fresh_exact("Tripped Data", now).unwrap().buy_price, None);
    }

    #[test]
    fn unusable_prices_are_rejected() {
        let now = datetime!(2025-01-01 12:00 UTC);
        let mut catalog = PriceCatalog::default();
        assert!(!catalog.record(quote("1", "Broken", f64::NAN), now));
        assert!(!catalog.record(quote("2", "Negative", -1.0), now));
        assert!(catalog.is_empty());
    }
}
