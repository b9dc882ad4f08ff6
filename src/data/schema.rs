use std::collections::BTreeMap;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::LoadError;

/// Header prefix used by the East Java statistics tables (sic).
pub const DEFAULT_FACTOR_PREFIX: &str = "Fakor Perceraian";
pub const DEFAULT_TOTAL_LABEL: &str = "Jumlah";

// ---------------------------------------------------------------------------
// SchemaConfig – what the caller tells us about the source layout
// ---------------------------------------------------------------------------

/// An explicitly named factor column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactorColumn {
    /// Header in the source file.
    pub column: String,
    /// Short display name.
    pub name: String,
}

/// Source layout. Every field has a default matching the published tables,
/// so an empty `[schema]` section is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    pub region_column: String,
    pub year_column: String,
    pub marriages_column: String,
    /// Prefix shared by every cause-of-divorce header: `<prefix> - <cause>`.
    pub factor_prefix: String,
    /// Cause label of the total column: `<prefix> - <total_label>`.
    pub total_label: String,
    /// Overrides the `<prefix> - <total_label>` convention.
    pub total_column: Option<String>,
    /// Explicit factor catalog. When set, prefix matching is skipped.
    pub factors: Option<Vec<FactorColumn>>,
    /// Cause label → short display name.
    pub aliases: BTreeMap<String, String>,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            region_column: "Kabupaten/Kota".to_string(),
            year_column: "Tahun".to_string(),
            marriages_column: "Nikah".to_string(),
            factor_prefix: DEFAULT_FACTOR_PREFIX.to_string(),
            total_label: DEFAULT_TOTAL_LABEL.to_string(),
            total_column: None,
            factors: None,
            aliases: default_aliases(),
        }
    }
}

/// Short names used by the dashboards for the longer cause labels.
pub fn default_aliases() -> BTreeMap<String, String> {
    [
        ("Meninggalkan Salah satu Pihak", "Ditinggal Pasangan"),
        ("Dihukum Penjara", "Dipenjara"),
        ("Kekerasan Dalam Rumah Tangga", "KDRT"),
        (
            "Perselisihan dan Pertengkaran Terus Menerus",
            "Pertengkaran Terus Menerus",
        ),
        ("Jumlah", "Total Kasus"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

// ---------------------------------------------------------------------------
// ResolvedSchema – config bound to the actual header row
// ---------------------------------------------------------------------------

/// A named column and its position in the header row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnRef {
    pub name: String,
    pub index: usize,
}

/// A factor of the catalog bound to its header position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedFactor {
    pub column: String,
    pub name: String,
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedSchema {
    pub region: ColumnRef,
    pub year: ColumnRef,
    pub marriages: ColumnRef,
    pub total: ColumnRef,
    /// Display name of the total column.
    pub total_name: String,
    /// Factor catalog, in source (or configured) order. Never contains the total.
    pub factors: Vec<ResolvedFactor>,
}

impl SchemaConfig {
    fn total_column_name(&self) -> String {
        self.total_column
            .clone()
            .unwrap_or_else(|| format!("{} - {}", self.factor_prefix, self.total_label))
    }

    fn display_name(&self, cause: &str) -> String {
        self.aliases
            .get(cause)
            .cloned()
            .unwrap_or_else(|| cause.to_string())
    }

    /// Bind this layout to a (trimmed) header row.
    pub fn resolve(&self, headers: &[String]) -> Result<ResolvedSchema, LoadError> {
        let total_column = self.total_column_name();
        let total = find_column(headers, &total_column)?;

        let factors = match &self.factors {
            Some(explicit) => self.resolve_explicit(headers, explicit, &total_column)?,
            None => self.infer_factors(headers),
        };
        if factors.is_empty() {
            return Err(LoadError::NoFactorColumns(self.factor_prefix.clone()));
        }
        debug!(
            "factor catalog: {:?}",
            factors.iter().map(|f| f.name.as_str()).collect::<Vec<_>>()
        );

        Ok(ResolvedSchema {
            region: find_column(headers, &self.region_column)?,
            year: find_column(headers, &self.year_column)?,
            marriages: find_column(headers, &self.marriages_column)?,
            total,
            total_name: self.display_name(&self.total_label),
            factors,
        })
    }

    fn resolve_explicit(
        &self,
        headers: &[String],
        explicit: &[FactorColumn],
        total_column: &str,
    ) -> Result<Vec<ResolvedFactor>, LoadError> {
        let mut factors = Vec::with_capacity(explicit.len());
        for fc in explicit {
            if fc.column.trim() == total_column {
                warn!("ignoring total column '{}' listed as a factor", fc.column);
                continue;
            }
            let col = find_column(headers, &fc.column)?;
            factors.push(ResolvedFactor {
                column: col.name,
                name: fc.name.clone(),
                index: col.index,
            });
        }
        Ok(factors)
    }

    /// Prefix adapter: every `<prefix> - <cause>` header except the total.
    fn infer_factors(&self, headers: &[String]) -> Vec<ResolvedFactor> {
        headers
            .iter()
            .enumerate()
            .filter_map(|(index, header)| {
                let (prefix, cause) = header.split_once(" - ")?;
                let cause = cause.trim();
                if prefix.trim() != self.factor_prefix || cause == self.total_label {
                    return None;
                }
                Some(ResolvedFactor {
                    column: header.clone(),
                    name: self.display_name(cause),
                    index,
                })
            })
            .collect()
    }
}

fn find_column(headers: &[String], name: &str) -> Result<ColumnRef, LoadError> {
    let name = name.trim();
    headers
        .iter()
        .position(|h| h == name)
        .map(|index| ColumnRef {
            name: name.to_string(),
            index,
        })
        .ok_or_else(|| LoadError::MissingColumn(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn standard_headers() -> Vec<String> {
        headers(&[
            "Kabupaten/Kota",
            "Fakor Perceraian - Zina",
            "Fakor Perceraian - Kekerasan Dalam Rumah Tangga",
            "Fakor Perceraian - Ekonomi",
            "Fakor Perceraian - Jumlah",
            "Nikah",
            "Tahun",
        ])
    }

    #[test]
    fn test_infer_factors_excludes_total_and_keeps_order() {
        let schema = SchemaConfig::default().resolve(&standard_headers()).unwrap();

        let names: Vec<&str> = schema.factors.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["Zina", "KDRT", "Ekonomi"]);
        assert_eq!(schema.total.index, 4);
        assert_eq!(schema.total_name, "Total Kasus");
        assert_eq!(schema.region.index, 0);
        assert_eq!(schema.year.index, 6);
        assert_eq!(schema.marriages.index, 5);
    }

    #[test]
    fn test_missing_required_column() {
        let hdrs = headers(&["Kabupaten/Kota", "Fakor Perceraian - Zina", "Fakor Perceraian - Jumlah", "Tahun"]);
        let err = SchemaConfig::default().resolve(&hdrs).unwrap_err();
        assert!(matches!(err, LoadError::MissingColumn(ref c) if c == "Nikah"));
    }

    #[test]
    fn test_missing_total_column() {
        let hdrs = headers(&["Kabupaten/Kota", "Fakor Perceraian - Zina", "Nikah", "Tahun"]);
        let err = SchemaConfig::default().resolve(&hdrs).unwrap_err();
        assert!(matches!(err, LoadError::MissingColumn(ref c) if c == "Fakor Perceraian - Jumlah"));
    }

    #[test]
    fn test_no_factor_columns() {
        let hdrs = headers(&["Kabupaten/Kota", "Fakor Perceraian - Jumlah", "Nikah", "Tahun"]);
        let err = SchemaConfig::default().resolve(&hdrs).unwrap_err();
        assert!(matches!(err, LoadError::NoFactorColumns(_)));
    }

    #[test]
    fn test_explicit_factors_skip_total() {
        let config = SchemaConfig {
            factors: Some(vec![
                FactorColumn {
                    column: "Fakor Perceraian - Ekonomi".into(),
                    name: "Economy".into(),
                },
                FactorColumn {
                    column: "Fakor Perceraian - Jumlah".into(),
                    name: "Total".into(),
                },
            ]),
            ..SchemaConfig::default()
        };
        let schema = config.resolve(&standard_headers()).unwrap();
        assert_eq!(
            schema.factors,
            vec![ResolvedFactor {
                column: "Fakor Perceraian - Ekonomi".into(),
                name: "Economy".into(),
                index: 3,
            }]
        );
    }

    #[test]
    fn test_explicit_factor_must_exist() {
        let config = SchemaConfig {
            factors: Some(vec![FactorColumn {
                column: "Judi".into(),
                name: "Judi".into(),
            }]),
            ..SchemaConfig::default()
        };
        let err = config.resolve(&standard_headers()).unwrap_err();
        assert!(matches!(err, LoadError::MissingColumn(ref c) if c == "Judi"));
    }

    #[test]
    fn test_other_prefix() {
        let hdrs = headers(&["Kabupaten/Kota", "Cause - A", "Cause - B", "Cause - Total", "Nikah", "Tahun"]);
        let config = SchemaConfig {
            factor_prefix: "Cause".into(),
            total_label: "Total".into(),
            ..SchemaConfig::default()
        };
        let schema = config.resolve(&hdrs).unwrap();
        assert_eq!(schema.factors.len(), 2);
        assert_eq!(schema.total_name, "Total");
    }
}
