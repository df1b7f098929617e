//! Sell-order ranking.
//!
//! Items are ordered by classification tier (scored, then unknown, then
//! unsellable), then by descending score. Remaining ties fall through want
//! count, listing count, release id, title and folder, so the order is fully
//! determined by the inputs.

use std::cmp::Ordering;

use crate::collection::CatalogItem;
use crate::fetcher::SignalBundle;
use crate::scoring::{score_bundle, Classification, Liquidity};

/// A catalog item with its signals and score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredItem {
    pub item: CatalogItem,
    pub bundle: SignalBundle,
    pub liquidity: Liquidity,
}

impl ScoredItem {
    pub fn new(item: CatalogItem, bundle: SignalBundle) -> Self {
        let liquidity = score_bundle(&bundle);
        Self {
            item,
            bundle,
            liquidity,
        }
    }

    pub fn classification(&self) -> Classification {
        self.liquidity.classification
    }

    pub fn want_count(&self) -> u64 {
        self.bundle.demand.value().map(|d| d.want_count).unwrap_or(0)
    }

    pub fn active_listings(&self) -> u64 {
        self.bundle
            .marketplace
            .value()
            .map(|m| m.active_listings)
            .unwrap_or(0)
    }
}

/// A scored item at its place in the sell order.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedItem {
    /// 1-based.
    pub sell_order: usize,
    pub scored: ScoredItem,
}

fn compare(a: &ScoredItem, b: &ScoredItem) -> Ordering {
    a.classification()
        .tier()
        .cmp(&b.classification().tier())
        .then_with(|| b.liquidity.score.total_cmp(&a.liquidity.score))
        .then_with(|| b.want_count().cmp(&a.want_count()))
        .then_with(|| b.active_listings().cmp(&a.active_listings()))
        .then_with(|| a.item.release_id.cmp(&b.item.release_id))
        .then_with(|| {
            let a_title = a.item.title.as_deref().unwrap_or("");
            let b_title = b.item.title.as_deref().unwrap_or("");
            a_title.cmp(b_title)
        })
        .then_with(|| a.item.folder.cmp(&b.item.folder))
}

/// Order items for selling, best first.
pub fn rank(mut items: Vec<ScoredItem>) -> Vec<RankedItem> {
    items.sort_by(compare);
    items
        .into_iter()
        .enumerate()
        .map(|(idx, scored)| RankedItem {
            sell_order: idx + 1,
            scored,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discogs::{DemandSignal, MarketplaceSignal};
    use crate::fetcher::Resolved;

    fn unavailable<T>() -> Resolved<T> {
        Resolved::Unavailable {
            error: "503".to_string(),
            throttled: false,
        }
    }

    fn item(id: u64, demand: Option<DemandSignal>, listings: Option<u64>) -> ScoredItem {
        let bundle = SignalBundle {
            release_id: id,
            demand: demand.map(Resolved::Remote).unwrap_or_else(unavailable),
            marketplace: listings
                .map(|n| Resolved::Remote(MarketplaceSignal::new(n, None)))
                .unwrap_or_else(unavailable),
        };
        ScoredItem::new(CatalogItem::new(id, "selling"), bundle)
    }

    fn available(id: u64, want: u64, have: u64, listings: u64) -> ScoredItem {
        item(id, Some(DemandSignal::new(want, have)), Some(listings))
    }

    fn order(ranked: &[RankedItem]) -> Vec<u64> {
        ranked.iter().map(|r| r.scored.item.release_id).collect()
    }

    #[test]
    fn test_listed_ranks_above_unlisted() {
        let a = available(1, 50, 5, 3);
        let b = available(2, 50, 5, 0);
        assert_eq!(order(&rank(vec![b, a])), vec![1, 2]);
    }

    #[test]
    fn test_demand_pressure_decides() {
        let c = available(3, 10, 100, 2);
        let d = available(4, 100, 10, 2);
        assert_eq!(order(&rank(vec![c, d])), vec![4, 3]);
    }

    #[test]
    fn test_blocked_ranks_below_everything() {
        let e = item(5, Some(DemandSignal::new(1000, 0).blocked()), Some(50));
        let weakest = available(6, 0, 1_000_000, 0);
        let unknown = item(7, None, Some(1));

        let ranked = rank(vec![e, unknown, weakest]);
        assert_eq!(order(&ranked), vec![6, 7, 5]);
        assert_eq!(ranked[2].scored.classification(), Classification::Unsellable);
        assert_eq!(ranked[1].scored.classification(), Classification::Unknown);
    }

    #[test]
    fn test_sell_order_is_one_based() {
        let ranked = rank(vec![available(1, 1, 1, 1), available(2, 5, 1, 1)]);
        let orders: Vec<usize> = ranked.iter().map(|r| r.sell_order).collect();
        assert_eq!(orders, vec![1, 2]);
        assert_eq!(ranked[0].scored.item.release_id, 2);
    }

    #[test]
    fn test_ties_break_on_release_id_then_title() {
        let mut x = available(20, 5, 5, 1);
        let mut y = available(10, 5, 5, 1);
        x.item.title = Some("A".to_string());
        y.item.title = Some("Z".to_string());
        assert_eq!(order(&rank(vec![x.clone(), y.clone()])), vec![10, 20]);

        // same release in two folders
        let mut keepers = available(10, 5, 5, 1);
        keepers.item.folder = "keepers".to_string();
        let ranked = rank(vec![y, keepers]);
        assert_eq!(ranked[0].scored.item.folder, "keepers");
    }

    #[test]
    fn test_ranking_is_deterministic() {
        let items: Vec<ScoredItem> = (1..=40)
            .map(|id| match id % 4 {
                0 => available(id, id % 7, id % 3, id % 5),
                1 => item(id, None, Some(1)),
                2 => item(id, Some(DemandSignal::new(3, 1).blocked()), Some(2)),
                _ => available(id, 2, 2, 1),
            })
            .collect();

        let mut reversed = items.clone();
        reversed.reverse();

        let first = order(&rank(items.clone()));
        let second = order(&rank(items));
        let from_reversed = order(&rank(reversed));
        assert_eq!(first, second);
        assert_eq!(first, from_reversed);
    }
}
