//! # Collection metrics
//! Pure, testable aggregation of a fully fetched item collection into the
//! dashboard snapshot. No I/O, no shared state: every poll tick recomputes a
//! fresh [`AggregateSnapshot`] and replaces the previous one.
//!
//! Ranking ties keep first-seen order (stable sort over insertion order).
//! The median of an even-sized list is the upper middle element; the two
//! middle values are never averaged.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::normalize::normalize_price;
use crate::types::ItemRecord;

/// Length of the contributor/category rankings.
pub const TOP_N: usize = 5;
/// Trailing months covered by the trend series (current month included).
pub const TREND_MONTHS: u32 = 6;

const CONTRIBUTOR_SENTINELS: [&str; 3] = ["n/a", "desconhecido", "unknown"];
const CATEGORY_SENTINELS: [&str; 3] = ["n/a", "sem categoria", "uncategorized"];

/// Histogram breakpoints as `(label, upper bound inclusive)`; last is open.
const BUCKETS: [(&str, Option<f64>); 4] = [
    ("up to 1,000", Some(1_000.0)),
    ("1,001 - 10,000", Some(10_000.0)),
    ("10,001 - 100,000", Some(100_000.0)),
    ("above 100,000", None),
];

/// An item together with its normalized price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuedItem {
    pub item: ItemRecord,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankEntry {
    pub name: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramBucket {
    pub label: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub year: i32,
    pub month: u32,
    /// Short label such as `"Oct 26"`.
    pub label: String,
    pub item_count: usize,
    pub total_value: f64,
}

/// Derived view of the whole collection. Replaced wholesale on each refresh.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateSnapshot {
    pub item_count: usize,
    /// Items whose normalized price is above zero.
    pub valued_count: usize,
    pub most_valuable: Option<ValuedItem>,
    pub most_contested: Option<ItemRecord>,
    pub top_contributors: Vec<RankEntry>,
    pub top_categories: Vec<RankEntry>,
    pub category_distribution: Vec<RankEntry>,
    pub source_distribution: Vec<RankEntry>,
    pub value_histogram: Vec<HistogramBucket>,
    pub monthly_trend: Vec<TrendPoint>,
    pub mean_value: f64,
    pub median_value: f64,
    pub total_value: f64,
    pub bid_item_count: usize,
    /// Valued items priced strictly above the median.
    pub premium_count: usize,
    /// Percentage of all items that received at least one bid.
    pub bid_rate: f64,
}

/// Aggregate using the current UTC time as the trend reference.
pub fn aggregate(items: &[ItemRecord]) -> AggregateSnapshot {
    aggregate_at(items, Utc::now())
}

/// Aggregate with an explicit reference instant for the trailing trend window.
pub fn aggregate_at(items: &[ItemRecord], now: DateTime<Utc>) -> AggregateSnapshot {
    // 1) Normalize once; everything below reuses these values.
    let values: Vec<f64> = items
        .iter()
        .map(|it| normalize_price(it.price_text()))
        .collect();

    let valued: Vec<(&ItemRecord, f64)> = items
        .iter()
        .zip(values.iter().copied())
        .filter(|(_, v)| *v > 0.0)
        .collect();

    // 2) Extrema (strict `>` keeps the first occurrence on ties)
    let most_valuable = valued
        .iter()
        .fold(None::<(&ItemRecord, f64)>, |best, &(it, v)| match best {
            Some((_, bv)) if v <= bv => best,
            _ => Some((it, v)),
        })
        .map(|(it, v)| ValuedItem {
            item: it.clone(),
            value: v,
        });

    let most_contested = items
        .iter()
        .filter(|it| it.bids() > 0)
        .fold(None::<&ItemRecord>, |best, it| match best {
            Some(b) if it.bids() <= b.bids() => best,
            _ => Some(it),
        })
        .cloned();

    // 3) Rankings
    let contributors = count_in_order(
        items.iter().map(|it| it.artist.as_deref()),
        &CONTRIBUTOR_SENTINELS,
    );
    let categories = count_in_order(
        items.iter().map(|it| it.category.as_deref()),
        &CATEGORY_SENTINELS,
    );
    let sources = count_in_order(items.iter().map(|it| Some(it.source.as_str())), &["n/a"])
        .into_iter()
        .map(|e| RankEntry {
            name: e.name.to_uppercase(),
            count: e.count,
        })
        .collect();

    // 4) Scalar rollups over valued items
    let mut sorted: Vec<f64> = valued.iter().map(|(_, v)| *v).collect();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let total_value: f64 = sorted.iter().sum();
    let mean_value = if sorted.is_empty() {
        0.0
    } else {
        total_value / sorted.len() as f64
    };
    let median_value = sorted.get(sorted.len() / 2).copied().unwrap_or(0.0);
    let premium_count = sorted.iter().filter(|v| **v > median_value).count();

    let bid_item_count = items.iter().filter(|it| it.bids() > 0).count();
    let bid_rate = if items.is_empty() {
        0.0
    } else {
        bid_item_count as f64 / items.len() as f64 * 100.0
    };

    AggregateSnapshot {
        item_count: items.len(),
        valued_count: sorted.len(),
        most_valuable,
        most_contested,
        top_contributors: contributors.iter().take(TOP_N).cloned().collect(),
        top_categories: categories.iter().take(TOP_N).cloned().collect(),
        category_distribution: categories,
        source_distribution: sources,
        value_histogram: histogram(&sorted),
        monthly_trend: monthly_trend(items, &values, now),
        mean_value,
        median_value,
        total_value,
        bid_item_count,
        premium_count,
        bid_rate,
    }
}

/// Count labels by exact (trimmed) match, sorted descending; ties keep
/// first-seen order because the sort is stable over insertion order.
fn count_in_order<'a>(
    labels: impl Iterator<Item = Option<&'a str>>,
    sentinels: &[&str],
) -> Vec<RankEntry> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut out: Vec<RankEntry> = Vec::new();

    for label in labels.flatten() {
        let name = label.trim();
        if name.is_empty() || sentinels.iter().any(|s| name.eq_ignore_ascii_case(s)) {
            continue;
        }
        match index.get(name) {
            Some(&i) => out[i].count += 1,
            None => {
                index.insert(name, out.len());
                out.push(RankEntry {
                    name: name.to_string(),
                    count: 1,
                });
            }
        }
    }

    out.sort_by(|a, b| b.count.cmp(&a.count));
    out
}

fn histogram(values: &[f64]) -> Vec<HistogramBucket> {
    let mut counts = [0usize; BUCKETS.len()];
    for &v in values {
        let slot = BUCKETS
            .iter()
            .position(|(_, upper)| upper.map_or(true, |u| v <= u))
            .unwrap_or(BUCKETS.len() - 1);
        counts[slot] += 1;
    }
    BUCKETS
        .iter()
        .zip(counts)
        .map(|((label, _), count)| HistogramBucket {
            label: (*label).to_string(),
            count,
        })
        .collect()
}

fn monthly_trend(items: &[ItemRecord], values: &[f64], now: DateTime<Utc>) -> Vec<TrendPoint> {
    let current = now.year() * 12 + now.month0() as i32;

    (0..TREND_MONTHS as i32)
        .map(|i| {
            let idx = current - (TREND_MONTHS as i32 - 1 - i);
            let (year, month) = (idx.div_euclid(12), idx.rem_euclid(12) as u32 + 1);

            let (item_count, total_value) = items
                .iter()
                .zip(values)
                .filter(|(it, _)| {
                    it.collected_at
                        .is_some_and(|ts| ts.year() == year && ts.month() == month)
                })
                .fold((0usize, 0.0f64), |(n, sum), (_, v)| (n + 1, sum + v));

            let label = NaiveDate::from_ymd_opt(year, month, 1)
                .map(|d| d.format("%b %y").to_string())
                .unwrap_or_else(|| format!("{month:02}/{year}"));

            TrendPoint {
                year,
                month,
                label,
                item_count,
                total_value,
            }
        })
        .collect()
}
