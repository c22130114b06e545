//! Differences between two pasted inventory snapshots.

use std::collections::HashMap;

use super::entities::LootLine;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InventoryDelta {
    /// Items whose quantity grew, in order of the later snapshot.
    pub looted: Vec<LootLine>,
    /// Items whose quantity shrank, in order of the earlier snapshot.
    pub consumed: Vec<LootLine>,
}

impl InventoryDelta {
    pub fn is_empty(&self) -> bool {
        self.looted.is_empty() && self.consumed.is_empty()
    }
}

/// Sums quantities per item name, keeping the first line seen for each name.
fn totals(lines: &[LootLine]) -> (Vec<&LootLine>, HashMap<&str, u64>) {
    let mut order = Vec::new();
    let mut quantities: HashMap<&str, u64> = HashMap::new();
    for line in lines {
        let quantity = quantities.entry(line.item_name.as_str()).or_insert_with(|| {
            order.push(line);
            0
        });
        *quantity = quantity.saturating_add(line.quantity);
    }
    (order, quantities)
}

/// `first` with its quantity replaced by the growth from `from` to `to`.
fn grown(first: &LootLine, from: &HashMap<&str, u64>, to: &HashMap<&str, u64>) -> Option<LootLine> {
    let name = first.item_name.as_str();
    let start = from.get(name).copied().unwrap_or(0);
    let end = to.get(name).copied().unwrap_or(0);
    (end > start).then(|| LootLine {
        quantity: end - start,
        ..first.clone()
    })
}

pub fn diff(before: &[LootLine], after: &[LootLine]) -> InventoryDelta {
    let (before_order, before_totals) = totals(before);
    let (after_order, after_totals) = totals(after);

    InventoryDelta {
        looted: after_order
            .into_iter()
            .filter_map(|line| grown(line, &before_totals, &after_totals))
            .collect(),
        consumed: before_order
            .into_iter()
            .filter_map(|line| grown(line, &after_totals, &before_totals))
            .collect(),
    }
}
