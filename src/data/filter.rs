use std::collections::BTreeSet;

use super::model::{DivorceDataset, Record};
use crate::error::QueryError;

// ---------------------------------------------------------------------------
// Selection – which years, regions and factors are selected
// ---------------------------------------------------------------------------

/// The three independent predicates of a query.
///
/// An empty `years` or `regions` set matches nothing. `factors` only limits
/// which factor columns take part in aggregation; `None` means all of them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub years: BTreeSet<i32>,
    pub regions: BTreeSet<String>,
    pub factors: Option<BTreeSet<String>>,
}

impl Selection {
    /// Select every year, every region and every factor (i.e., show everything).
    pub fn all(dataset: &DivorceDataset) -> Self {
        Selection {
            years: dataset.years.clone(),
            regions: dataset.regions.clone(),
            factors: None,
        }
    }

    fn matches(&self, record: &Record) -> bool {
        self.years.contains(&record.year) && self.regions.contains(&record.region)
    }
}

/// Return indices of records that pass the year and region predicates,
/// in original row order.
pub fn filtered_indices(dataset: &DivorceDataset, selection: &Selection) -> Vec<usize> {
    dataset
        .records
        .iter()
        .enumerate()
        .filter(|(_, r)| selection.matches(r))
        .map(|(i, _)| i)
        .collect()
}

/// Resolve the selected factor names to catalog positions, in catalog order.
pub fn selected_factors(
    dataset: &DivorceDataset,
    selection: &Selection,
) -> Result<Vec<usize>, QueryError> {
    match &selection.factors {
        None => Ok((0..dataset.schema.factors.len()).collect()),
        Some(names) => {
            let mut positions = names
                .iter()
                .map(|name| {
                    dataset
                        .factor_index(name)
                        .ok_or_else(|| QueryError::UnknownFactor(name.clone()))
                })
                .collect::<Result<Vec<_>, _>>()?;
            positions.sort_unstable();
            positions.dedup();
            Ok(positions)
        }
    }
}

// ---------------------------------------------------------------------------
// FilteredView – read-only subset handed to the aggregator
// ---------------------------------------------------------------------------

/// The rows and factor columns that survive a [`Selection`].
#[derive(Debug, Clone)]
pub struct FilteredView<'a> {
    dataset: &'a DivorceDataset,
    indices: Vec<usize>,
    factors: Vec<usize>,
}

impl<'a> FilteredView<'a> {
    /// Apply `selection`. Fails with [`QueryError::EmptySelection`] when no
    /// row matches, so callers never aggregate over zero rows.
    pub fn new(dataset: &'a DivorceDataset, selection: &Selection) -> Result<Self, QueryError> {
        let factors = selected_factors(dataset, selection)?;
        let indices = filtered_indices(dataset, selection);
        if indices.is_empty() {
            return Err(QueryError::EmptySelection);
        }
        Ok(FilteredView {
            dataset,
            indices,
            factors,
        })
    }

    pub fn dataset(&self) -> &'a DivorceDataset {
        self.dataset
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// Matching records, in original row order.
    pub fn records(&self) -> impl Iterator<Item = &'a Record> + '_ {
        let dataset = self.dataset;
        self.indices.iter().map(move |&i| &dataset.records[i])
    }

    /// Catalog positions of the participating factors.
    pub fn factor_positions(&self) -> &[usize] {
        &self.factors
    }

    pub fn factor_name(&self, position: usize) -> &'a str {
        &self.dataset.schema.factors[position].name
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Always false: an empty view cannot be constructed.
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::testing::sample_dataset;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_full_domain_is_identity() {
        let ds = sample_dataset();
        let view = FilteredView::new(&ds, &Selection::all(&ds)).unwrap();
        assert_eq!(view.indices(), (0..ds.len()).collect::<Vec<_>>().as_slice());
        assert_eq!(view.factor_positions().len(), ds.schema.factors.len());
    }

    #[test]
    fn test_filter_by_year_preserves_order() {
        let ds = sample_dataset();
        let selection = Selection {
            years: BTreeSet::from([2023]),
            ..Selection::all(&ds)
        };
        let view = FilteredView::new(&ds, &selection).unwrap();
        assert!(view.records().all(|r| r.year == 2023));
        let idx = view.indices().to_vec();
        let mut sorted = idx.clone();
        sorted.sort();
        assert_eq!(idx, sorted);
    }

    #[test]
    fn test_unknown_region_is_empty_selection() {
        let ds = sample_dataset();
        let selection = Selection {
            regions: BTreeSet::from(["Atlantis".to_string()]),
            ..Selection::all(&ds)
        };
        let err = FilteredView::new(&ds, &selection).unwrap_err();
        assert_eq!(err, QueryError::EmptySelection);
        assert!(filtered_indices(&ds, &selection).is_empty());
    }

    #[test]
    fn test_empty_sets_match_nothing() {
        let ds = sample_dataset();
        let no_years = Selection {
            years: BTreeSet::new(),
            ..Selection::all(&ds)
        };
        assert!(filtered_indices(&ds, &no_years).is_empty());

        let no_regions = Selection {
            regions: BTreeSet::new(),
            ..Selection::all(&ds)
        };
        assert!(filtered_indices(&ds, &no_regions).is_empty());
    }

    #[test]
    fn test_factors_do_not_affect_rows() {
        let ds = sample_dataset();
        let selection = Selection {
            factors: Some(BTreeSet::from(["Judi".to_string(), "Ekonomi".to_string()])),
            ..Selection::all(&ds)
        };
        let view = FilteredView::new(&ds, &selection).unwrap();
        assert_eq!(view.len(), ds.len());
        let names: Vec<&str> = view
            .factor_positions()
            .iter()
            .map(|&p| view.factor_name(p))
            .collect();
        // catalog order, not selection order
        assert_eq!(names, vec!["Judi", "Ekonomi"]);
    }

    #[test]
    fn test_unknown_factor() {
        let ds = sample_dataset();
        let selection = Selection {
            factors: Some(BTreeSet::from(["Astrologi".to_string()])),
            ..Selection::all(&ds)
        };
        let err = FilteredView::new(&ds, &selection).unwrap_err();
        assert_eq!(err, QueryError::UnknownFactor("Astrologi".to_string()));
    }
}
