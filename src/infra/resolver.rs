//! Maps loot lines to catalog prices, refreshing stale names in one batch.

use std::{collections::HashSet, sync::Arc, time::Duration};

use time::OffsetDateTime;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::domain::{
    ItemId, LootLine, PriceCatalog, PriceOrigin, PricingOutcome, ResolvedItem,
    DEFAULT_FUZZY_THRESHOLD,
};
use crate::infra::pricing::PriceFeed;

const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Debug, PartialEq)]
pub struct Resolution {
    pub items: Vec<ResolvedItem>,
    pub pricing: PricingOutcome,
}

struct Refresh {
    outcome: PricingOutcome,
    requested: HashSet<String>,
    /// Items whose catalog entries this refresh stored.
    received: HashSet<ItemId>,
    failed: bool,
}

impl Refresh {
    fn not_needed() -> Self {
        Self {
            outcome: PricingOutcome::NotNeeded,
            requested: HashSet::new(),
            received: HashSet::new(),
            failed: false,
        }
    }
}

pub struct CatalogResolver {
    catalog: Mutex<PriceCatalog>,
    feed: Arc<dyn PriceFeed>,
    /// Held for the duration of a fetch so concurrent resolves share results.
    fetch_gate: Mutex<()>,
    fetch_timeout: Duration,
    fuzzy_threshold: f64,
}

impl CatalogResolver {
    pub fn new(feed: Arc<dyn PriceFeed>, catalog: PriceCatalog) -> Self {
        Self {
            catalog: Mutex::new(catalog),
            feed,
            fetch_gate: Mutex::new(()),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            fuzzy_threshold: DEFAULT_FUZZY_THRESHOLD,
        }
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_fuzzy_threshold(mut self, threshold: f64) -> Self {
        self.fuzzy_threshold = threshold;
        self
    }

    pub async fn resolve(&self, lines: &[LootLine]) -> Resolution {
        self.resolve_at(lines, OffsetDateTime::now_utc()).await
    }

    /// Resolves every line; never fails. Lines are not merged.
    pub async fn resolve_at(&self, lines: &[LootLine], now: OffsetDateTime) -> Resolution {
        let names = unique_names(lines);
        let refresh = if self.stale_names(&names, now).await.is_empty() {
            Refresh::not_needed()
        } else {
            self.refresh(&names, now).await
        };

        let catalog = self.catalog.lock().await;
        let items = lines
            .iter()
            .map(|line| {
                if refresh.failed && refresh.requested.contains(&line.item_name) {
                    return ResolvedItem::unmatched(line, PriceOrigin::FetchFailed);
                }

                match catalog.lookup(&line.item_name, now, self.fuzzy_threshold) {
                    Some(found) => ResolvedItem {
                        item_id: Some(found.entry.item_id.clone()),
                        display_name: found.entry.name.clone(),
                        source_name: line.item_name.clone(),
                        quantity: line.quantity,
                        unit_price: Some(found.entry.unit_price),
                        buy_price: found.entry.buy_price,
                        price_timestamp: Some(found.entry.quoted_at),
                        match_status: found.status,
                        match_score: found.score,
                        price_origin: if refresh.received.contains(&found.entry.item_id) {
                            PriceOrigin::Fetched
                        } else {
                            PriceOrigin::Cached
                        },
                    },
                    None => {
                        debug!(name = %line.item_name, "no catalog match");
                        ResolvedItem::unmatched(line, PriceOrigin::NotFound)
                    }
                }
            })
            .collect();

        Resolution {
            items,
            pricing: refresh.outcome,
        }
    }

    async fn stale_names(&self, names: &[String], now: OffsetDateTime) -> Vec<String> {
        let catalog = self.catalog.lock().await;
        names
            .iter()
            .filter(|name| catalog.needs_refresh(name, now))
            .cloned()
            .collect()
    }

    async fn refresh(&self, names: &[String], now: OffsetDateTime) -> Refresh {
        let _gate = self.fetch_gate.lock().await;

        // A concurrent resolve may have priced some of these while we waited.
        let missing = self.stale_names(names, now).await;
        if missing.is_empty() {
            return Refresh::not_needed();
        }

        let requested = missing.len();
        info!(requested, "fetching prices");

        let mut received = HashSet::new();
        let (outcome, failed) =
            match tokio::time::timeout(self.fetch_timeout, self.feed.fetch_prices(&missing)).await {
                Ok(Ok(quotes)) => {
                    let mut catalog = self.catalog.lock().await;
                    for quote in quotes {
                        let item_id = quote.item_id.clone();
                        if catalog.record(quote, now) {
                            received.insert(item_id);
                        }
                    }
                    info!(
                        requested,
                        received = received.len(),
                        cached = catalog.len(),
                        "prices updated"
                    );
                    (
                        PricingOutcome::Fetched {
                            requested,
                            received: received.len(),
                        },
                        false,
                    )
                }
                Ok(Err(err)) => {
                    warn!(%err, requested, "price fetch failed; using cached prices only");
                    (
                        PricingOutcome::Failed {
                            requested,
                            reason: err.to_string(),
                        },
                        true,
                    )
                }
                Err(_) => {
                    warn!(
                        requested,
                        timeout_secs = self.fetch_timeout.as_secs_f64(),
                        "price fetch timed out; using cached prices only"
                    );
                    (PricingOutcome::TimedOut { requested }, true)
                }
            };

        Refresh {
            outcome,
            requested: missing.into_iter().collect(),
            received,
            failed,
        }
    }
}

/// Distinct item names in first-seen order.
fn unique_names(lines: &[LootLine]) -> Vec<String> {
    let mut seen = HashSet::new();
    lines
        .iter()
        .filter(|line| seen.insert(line.item_name.as_str()))
        .map(|line| line.item_name.clone())
        .collect()
}
