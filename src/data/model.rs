use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

use super::schema::ResolvedSchema;

// ---------------------------------------------------------------------------
// Record – one row of the source table
// ---------------------------------------------------------------------------

/// One regency/city for one year.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub region: String,
    pub year: i32,
    pub marriages: u64,
    /// Cause-of-divorce counts, aligned with the dataset's factor catalog.
    pub factors: Vec<u64>,
    /// Total divorces as reported by the source. Not reconciled with `factors`.
    pub divorce_total: u64,
    /// Source cells as read, in header order. Used for verbatim export.
    pub raw: Vec<String>,
}

impl Record {
    /// Sum of the itemised factor counts.
    pub fn factor_sum(&self) -> u64 {
        self.factors
            .iter()
            .fold(0u64, |acc, &n| acc.saturating_add(n))
    }
}

// ---------------------------------------------------------------------------
// LoadReport – what happened while building the dataset
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    /// Data rows seen in the source (header excluded).
    pub total_rows: usize,
    pub kept_rows: usize,
    pub dropped_missing_region: usize,
    pub dropped_invalid_year: usize,
    /// Kept rows whose total column differs from the sum of their factor columns.
    pub mismatched_totals: usize,
}

impl fmt::Display for LoadReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of {} rows kept ({} without region, {} with invalid year, {} with total != factor sum)",
            self.kept_rows,
            self.total_rows,
            self.dropped_missing_region,
            self.dropped_invalid_year,
            self.mismatched_totals
        )
    }
}

// ---------------------------------------------------------------------------
// DivorceDataset – the complete loaded dataset
// ---------------------------------------------------------------------------

/// The full parsed dataset with pre-computed year/region domains.
#[derive(Debug, Clone)]
pub struct DivorceDataset {
    pub schema: ResolvedSchema,
    /// Source headers (trimmed), in file order.
    pub headers: Vec<String>,
    pub records: Vec<Record>,
    /// Distinct years present, ascending.
    pub years: BTreeSet<i32>,
    /// Distinct regions present, sorted.
    pub regions: BTreeSet<String>,
    pub report: LoadReport,
}

impl DivorceDataset {
    /// Build the year/region domains from the loaded records.
    pub fn from_records(
        schema: ResolvedSchema,
        headers: Vec<String>,
        records: Vec<Record>,
        report: LoadReport,
    ) -> Self {
        let years = records.iter().map(|r| r.year).collect();
        let regions = records.iter().map(|r| r.region.clone()).collect();
        DivorceDataset {
            schema,
            headers,
            records,
            years,
            regions,
            report,
        }
    }

    /// Display names of the factor catalog, in catalog order.
    pub fn factor_names(&self) -> impl Iterator<Item = &str> {
        self.schema.factors.iter().map(|f| f.name.as_str())
    }

    /// Catalog position of a factor, looked up by display name or source column.
    pub fn factor_index(&self, name: &str) -> Option<usize> {
        self.schema
            .factors
            .iter()
            .position(|f| f.name == name || f.column == name)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
