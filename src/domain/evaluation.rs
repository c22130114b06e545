use std::{collections::HashMap, time::Duration};

use time::OffsetDateTime;
use uuid::Uuid;

use super::entities::{PricingOutcome, ResolvedItem, Run, RunLine, RunMetadata};

/// Builds a run summary from resolved loot, ending now.
pub fn summarize(resolved: Vec<ResolvedItem>, meta: &RunMetadata) -> Run {
    summarize_at(resolved, Vec::new(), meta, OffsetDateTime::now_utc())
}

/// Like [`summarize`], with items used up during the run deducted from profit.
pub fn summarize_delta(
    looted: Vec<ResolvedItem>,
    consumed: Vec<ResolvedItem>,
    meta: &RunMetadata,
) -> Run {
    summarize_at(looted, consumed, meta, OffsetDateTime::now_utc())
}

pub fn summarize_at(
    looted: Vec<ResolvedItem>,
    consumed: Vec<ResolvedItem>,
    meta: &RunMetadata,
    ended_at: OffsetDateTime,
) -> Run {
    let total_value = items_value(&looted);
    let buy_value = looted.iter().filter_map(ResolvedItem::buy_value).sum();
    let consumed_value = items_value(&consumed);
    let unmatched_count = looted
        .iter()
        .chain(consumed.iter())
        .filter(|item| !item.is_matched())
        .count();

    let (started_at, elapsed) = run_window(meta, ended_at);
    let profit_per_hour =
        elapsed.and_then(|elapsed| profit_per_hour(total_value - consumed_value, elapsed));

    Run {
        id: Uuid::new_v4(),
        started_at,
        ended_at,
        site_type: meta.site_type,
        comment: meta.comment.clone(),
        lines: aggregate_lines(&looted),
        items: looted,
        consumed,
        total_value,
        buy_value,
        consumed_value,
        unmatched_count,
        profit_per_hour,
        discarded_lines: 0,
        pricing: PricingOutcome::NotNeeded,
        source_digest: String::new(),
    }
}

/// Sum of `quantity * unit_price` over priced items; unpriced items add nothing.
pub fn items_value(items: &[ResolvedItem]) -> f64 {
    items.iter().filter_map(ResolvedItem::value).sum()
}

/// `None` for a zero-length run: no time recorded is not the same as no profit.
pub fn profit_per_hour(net_value: f64, elapsed: Duration) -> Option<f64> {
    if elapsed.is_zero() {
        return None;
    }
    Some(net_value * 3600.0 / elapsed.as_secs_f64())
}

/// Start time and elapsed time, from whichever of the two the caller supplied.
fn run_window(meta: &RunMetadata, ended_at: OffsetDateTime) -> (OffsetDateTime, Option<Duration>) {
    match (meta.started_at, meta.elapsed) {
        (Some(started_at), Some(elapsed)) => (started_at, Some(elapsed)),
        (Some(started_at), None) => {
            let span = ended_at - started_at;
            let elapsed = span.is_positive().then(|| span.unsigned_abs());
            (started_at, elapsed)
        }
        (None, Some(elapsed)) => {
            let started_at = time::Duration::try_from(elapsed)
                .ok()
                .and_then(|span| ended_at.checked_sub(span))
                .unwrap_or(ended_at);
            (started_at, Some(elapsed))
        }
        (None, None) => (ended_at, None),
    }
}

/// Folds items sharing an id (or, when unmatched, a name) into display lines.
pub fn aggregate_lines(items: &[ResolvedItem]) -> Vec<RunLine> {
    let mut lines: Vec<RunLine> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for item in items {
        let key = match &item.item_id {
            Some(id) => format!("id:{id}"),
            None => format!("name:{}", item.display_name),
        };

        match index.get(&key) {
            Some(&idx) => {
                let line = &mut lines[idx];
                line.quantity = line.quantity.saturating_add(item.quantity);
                line.value = match (line.value, item.value()) {
                    (Some(a), Some(b)) => Some(a + b),
                    (a, b) => a.or(b),
                };
            }
            None => {
                index.insert(key, lines.len());
                lines.push(RunLine {
                    item_id: item.item_id.clone(),
                    display_name: item.display_name.clone(),
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                    value: item.value(),
                    match_status: item.match_status,
                });
            }
        }
    }

    lines
}
