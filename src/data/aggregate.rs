//! Grouped summaries over a [`FilteredView`].
//!
//! Every function here takes a non-empty view, so means and ratios never
//! divide by a zero row count. Groups come out in natural key order
//! (ascending year, lexicographic region); whenever a maximum or a ranking
//! has ties, the earlier entry in that order (or in the factor catalog)
//! wins.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Serialize, Serializer};

use super::filter::FilteredView;
use super::model::{DivorceDataset, Record};
use crate::error::QueryError;

/// Label of the bucket that collects every factor outside the top K.
pub const OTHER_LABEL: &str = "Other";

// ---------------------------------------------------------------------------
// Dimensions and measures
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Year,
    Region,
}

impl Dimension {
    fn key(self, record: &Record) -> GroupKey {
        match self {
            Dimension::Year => GroupKey::Year(record.year),
            Dimension::Region => GroupKey::Region(record.region.clone()),
        }
    }
}

/// A numeric column of the dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Measure {
    Marriages,
    DivorceTotal,
    /// Catalog position of a factor.
    Factor(usize),
}

impl Measure {
    /// Resolve a user-facing name: `marriages`, `total`, the total column's
    /// display name, or any factor name or source column.
    pub fn parse(dataset: &DivorceDataset, name: &str) -> Result<Measure, QueryError> {
        let lower = name.trim().to_lowercase();
        match lower.as_str() {
            "marriages" | "nikah" => return Ok(Measure::Marriages),
            "total" | "divorces" => return Ok(Measure::DivorceTotal),
            _ => {}
        }
        let schema = &dataset.schema;
        if name == schema.total_name || name == schema.total.name {
            return Ok(Measure::DivorceTotal);
        }
        if name == schema.marriages.name {
            return Ok(Measure::Marriages);
        }
        dataset
            .factor_index(name)
            .map(Measure::Factor)
            .ok_or_else(|| QueryError::UnknownMeasure(name.to_string()))
    }

    pub fn value(self, record: &Record) -> u64 {
        match self {
            Measure::Marriages => record.marriages,
            Measure::DivorceTotal => record.divorce_total,
            Measure::Factor(p) => record.factors[p],
        }
    }

    pub fn label(self, dataset: &DivorceDataset) -> String {
        match self {
            Measure::Marriages => dataset.schema.marriages.name.clone(),
            Measure::DivorceTotal => dataset.schema.total_name.clone(),
            Measure::Factor(p) => dataset.schema.factors[p].name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(untagged)]
pub enum GroupKey {
    Year(i32),
    Region(String),
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupKey::Year(y) => write!(f, "{y}"),
            GroupKey::Region(r) => write!(f, "{r}"),
        }
    }
}

/// One row of an aggregate table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupValue<T> {
    pub key: GroupKey,
    pub value: T,
}

// ---------------------------------------------------------------------------
// Grouped sum / mean / argmax
// ---------------------------------------------------------------------------

fn accumulate(
    view: &FilteredView<'_>,
    dim: Dimension,
    measure: Measure,
) -> BTreeMap<GroupKey, (u64, usize)> {
    let mut groups: BTreeMap<GroupKey, (u64, usize)> = BTreeMap::new();
    for record in view.records() {
        let entry = groups.entry(dim.key(record)).or_default();
        entry.0 = entry.0.saturating_add(measure.value(record));
        entry.1 += 1;
    }
    groups
}

/// Sum `measure` per group.
pub fn group_sum(
    view: &FilteredView<'_>,
    dim: Dimension,
    measure: Measure,
) -> Vec<GroupValue<u64>> {
    accumulate(view, dim, measure)
        .into_iter()
        .map(|(key, (sum, _))| GroupValue { key, value: sum })
        .collect()
}

/// Average `measure` per group. Every group holds at least one row.
pub fn group_mean(
    view: &FilteredView<'_>,
    dim: Dimension,
    measure: Measure,
) -> Vec<GroupValue<f64>> {
    accumulate(view, dim, measure)
        .into_iter()
        .map(|(key, (sum, count))| GroupValue {
            key,
            value: sum as f64 / count as f64,
        })
        .collect()
}

/// The group with the largest value; on ties, the first in key order.
pub fn argmax<T: PartialOrd>(groups: &[GroupValue<T>]) -> Option<&GroupValue<T>> {
    groups.iter().fold(None, |best, g| match best {
        Some(b) if b.value >= g.value => Some(b),
        _ => Some(g),
    })
}

/// The `n` groups with the largest sums, descending. Ties keep key order.
pub fn top_groups(
    view: &FilteredView<'_>,
    dim: Dimension,
    measure: Measure,
    n: usize,
) -> Vec<GroupValue<u64>> {
    let mut groups = group_sum(view, dim, measure);
    groups.sort_by(|a, b| b.value.cmp(&a.value));
    groups.truncate(n);
    groups
}

// ---------------------------------------------------------------------------
// Factor totals, ranking, dominant factor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FactorTotal {
    pub name: String,
    pub total: u64,
}

/// (catalog position, total) for every participating factor, in catalog order.
fn position_totals(view: &FilteredView<'_>) -> Vec<(usize, u64)> {
    view.factor_positions()
        .iter()
        .map(|&p| {
            let total = view
                .records()
                .fold(0u64, |acc, r| acc.saturating_add(r.factors[p]));
            (p, total)
        })
        .collect()
}

/// Stable descending sort: equal totals keep catalog order.
fn rank_positions(mut totals: Vec<(usize, u64)>) -> Vec<(usize, u64)> {
    totals.sort_by(|a, b| b.1.cmp(&a.1));
    totals
}

/// Sum of each participating factor, in catalog order.
pub fn factor_totals(view: &FilteredView<'_>) -> Vec<FactorTotal> {
    position_totals(view)
        .into_iter()
        .map(|(p, total)| FactorTotal {
            name: view.factor_name(p).to_string(),
            total,
        })
        .collect()
}

/// Factor totals, largest first. Equal totals keep catalog order.
pub fn rank_factors(view: &FilteredView<'_>) -> Vec<FactorTotal> {
    rank_positions(position_totals(view))
        .into_iter()
        .map(|(p, total)| FactorTotal {
            name: view.factor_name(p).to_string(),
            total,
        })
        .collect()
}

/// The factor with the largest total, or `None` when every participating
/// factor sums to zero (or none participates).
pub fn dominant_factor(view: &FilteredView<'_>) -> Option<FactorTotal> {
    rank_factors(view).into_iter().next().filter(|f| f.total > 0)
}

// ---------------------------------------------------------------------------
// Top-K + remainder
// ---------------------------------------------------------------------------

/// The K largest factors and everything else folded into one bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Breakdown {
    pub top: Vec<FactorTotal>,
    /// Sum of all factors outside `top`. Zero when K covers every factor.
    pub other: u64,
}

impl Breakdown {
    /// Grand total; always equals the sum of the input totals.
    pub fn total(&self) -> u64 {
        self.top
            .iter()
            .fold(self.other, |acc, f| acc.saturating_add(f.total))
    }

    /// `top` followed by the [`OTHER_LABEL`] bucket.
    pub fn rows(&self) -> Vec<FactorTotal> {
        let mut rows = self.top.clone();
        rows.push(FactorTotal {
            name: OTHER_LABEL.to_string(),
            total: self.other,
        });
        rows
    }
}

/// Keep the `k` largest of `totals` and fold the rest into `other`.
/// `totals` need not be sorted; ties keep their input order.
pub fn collapse_top_k(totals: &[FactorTotal], k: usize) -> Breakdown {
    let mut ranked = totals.to_vec();
    ranked.sort_by(|a, b| b.total.cmp(&a.total));
    let rest = ranked.split_off(k.min(ranked.len()));
    Breakdown {
        top: ranked,
        other: rest.iter().fold(0u64, |acc, f| acc.saturating_add(f.total)),
    }
}

/// Top-K breakdown of the view's participating factors.
pub fn factor_breakdown(view: &FilteredView<'_>, k: usize) -> Breakdown {
    collapse_top_k(&factor_totals(view), k)
}

// ---------------------------------------------------------------------------
// Trend
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrendPoint {
    pub year: i32,
    /// One value per member, aligned with [`FactorTrend::members`].
    pub values: Vec<u64>,
    pub other: u64,
}

/// Per-year top-K breakdown with a fixed membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FactorTrend {
    /// The K factors with the largest totals over the whole view.
    pub members: Vec<String>,
    pub points: Vec<TrendPoint>,
}

/// Choose the top-K factors once from the view's overall totals, then
/// re-aggregate every year with that same membership so categories stay
/// stable across the series.
pub fn factor_trend(view: &FilteredView<'_>, k: usize) -> FactorTrend {
    let mut ranked = rank_positions(position_totals(view));
    ranked.truncate(k);
    let members: Vec<usize> = ranked.into_iter().map(|(p, _)| p).collect();

    let mut by_year: BTreeMap<i32, TrendPoint> = BTreeMap::new();
    for record in view.records() {
        let point = by_year.entry(record.year).or_insert_with(|| TrendPoint {
            year: record.year,
            values: vec![0; members.len()],
            other: 0,
        });
        for &p in view.factor_positions() {
            let count = record.factors[p];
            match members.iter().position(|&m| m == p) {
                Some(slot) => point.values[slot] = point.values[slot].saturating_add(count),
                None => point.other = point.other.saturating_add(count),
            }
        }
    }

    FactorTrend {
        members: members
            .iter()
            .map(|&p| view.factor_name(p).to_string())
            .collect(),
        points: by_year.into_values().collect(),
    }
}

// ---------------------------------------------------------------------------
// Ratio
// ---------------------------------------------------------------------------

/// Divorces per 100 marriages.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Ratio {
    Percent(f64),
    /// No marriages recorded; the ratio is undefined.
    NotApplicable,
}

impl Ratio {
    pub fn compute(divorces: u64, marriages: u64) -> Ratio {
        if marriages == 0 {
            Ratio::NotApplicable
        } else {
            Ratio::Percent(divorces as f64 / marriages as f64 * 100.0)
        }
    }

    pub fn percent(self) -> Option<f64> {
        match self {
            Ratio::Percent(p) => Some(p),
            Ratio::NotApplicable => None,
        }
    }
}

impl fmt::Display for Ratio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ratio::Percent(p) => write!(f, "{p:.2}%"),
            Ratio::NotApplicable => write!(f, "n/a"),
        }
    }
}

// `null` for not applicable.
impl Serialize for Ratio {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.percent().serialize(serializer)
    }
}

/// Ratio of summed divorce totals to summed marriages over the whole view.
pub fn overall_ratio(view: &FilteredView<'_>) -> Ratio {
    let (divorces, marriages) = view.records().fold((0u64, 0u64), |(d, m), r| {
        (d.saturating_add(r.divorce_total), m.saturating_add(r.marriages))
    });
    Ratio::compute(divorces, marriages)
}

/// Ratio per group.
pub fn ratio_by(view: &FilteredView<'_>, dim: Dimension) -> Vec<GroupValue<Ratio>> {
    let divorces = group_sum(view, dim, Measure::DivorceTotal);
    let marriages = group_sum(view, dim, Measure::Marriages);
    divorces
        .into_iter()
        .zip(marriages)
        .map(|(d, m)| GroupValue {
            key: d.key,
            value: Ratio::compute(d.value, m.value),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Headline figures and scatter series
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Kpis {
    pub rows: usize,
    pub total_divorces: u64,
    /// Mean of the total column over the selected rows.
    pub mean_divorces_per_row: f64,
    pub total_marriages: u64,
    pub ratio: Ratio,
    pub dominant_factor: Option<FactorTotal>,
}

pub fn kpis(view: &FilteredView<'_>) -> Kpis {
    let (total_divorces, total_marriages) = view.records().fold((0u64, 0u64), |(d, m), r| {
        (d.saturating_add(r.divorce_total), m.saturating_add(r.marriages))
    });
    Kpis {
        rows: view.len(),
        total_divorces,
        mean_divorces_per_row: total_divorces as f64 / view.len() as f64,
        total_marriages,
        ratio: Ratio::compute(total_divorces, total_marriages),
        dominant_factor: dominant_factor(view),
    }
}

/// One row plotted as factor `x` against factor `y`, sized by its total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScatterPoint {
    pub region: String,
    pub year: i32,
    pub x: u64,
    pub y: u64,
    pub size: u64,
}

pub fn scatter(
    view: &FilteredView<'_>,
    x: &str,
    y: &str,
) -> Result<Vec<ScatterPoint>, QueryError> {
    let dataset = view.dataset();
    let lookup = |name: &str| {
        dataset
            .factor_index(name)
            .ok_or_else(|| QueryError::UnknownFactor(name.to_string()))
    };
    let (xp, yp) = (lookup(x)?, lookup(y)?);
    Ok(view
        .records()
        .map(|r| ScatterPoint {
            region: r.region.clone(),
            year: r.year,
            x: r.factors[xp],
            y: r.factors[yp],
            size: r.divorce_total,
        })
        .collect())
}
