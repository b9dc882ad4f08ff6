//! Presentation of aggregate tables: the dashboard report and its text/JSON
//! renderings. Text tables are rendered through Arrow's pretty printer.

use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, StringArray, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use arrow::util::pretty::pretty_format_batches;
use serde::{Deserialize, Serialize};

use crate::data::aggregate::{
    factor_breakdown, factor_trend, group_mean, group_sum, kpis, overall_ratio, rank_factors,
    ratio_by, top_groups, Breakdown, Dimension, FactorTotal, FactorTrend, GroupValue, Kpis,
    Measure, Ratio, ScatterPoint, OTHER_LABEL,
};
use crate::data::filter::FilteredView;
use crate::data::model::{DivorceDataset, LoadReport};
use crate::error::RenderError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Sizes of the collapsed breakdowns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportSettings {
    /// Factors kept before folding the rest into "Other".
    pub top_k: usize,
    /// Regions listed in the top-regions table.
    pub top_regions: usize,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            top_k: 5,
            top_regions: 10,
        }
    }
}

// ---------------------------------------------------------------------------
// DashboardReport
// ---------------------------------------------------------------------------

/// Everything a dashboard page shows for one selection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardReport {
    pub kpis: Kpis,
    pub top_regions: Vec<GroupValue<u64>>,
    pub factor_ranking: Vec<FactorTotal>,
    pub breakdown: Breakdown,
    pub trend: FactorTrend,
    pub ratio_by_year: Vec<GroupValue<Ratio>>,
}

pub fn build_report(view: &FilteredView<'_>, settings: &ReportSettings) -> DashboardReport {
    DashboardReport {
        kpis: kpis(view),
        top_regions: top_groups(
            view,
            Dimension::Region,
            Measure::DivorceTotal,
            settings.top_regions,
        ),
        factor_ranking: rank_factors(view),
        breakdown: factor_breakdown(view, settings.top_k),
        trend: factor_trend(view, settings.top_k),
        ratio_by_year: ratio_by(view, Dimension::Year),
    }
}

// ---------------------------------------------------------------------------
// Table – column-wise builder rendered via Arrow
// ---------------------------------------------------------------------------

enum Column {
    Text(Vec<String>),
    Count(Vec<u64>),
    Decimal(Vec<Option<f64>>),
}

/// A small column-oriented table for terminal output.
#[derive(Default)]
pub struct Table {
    columns: Vec<(String, Column)>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, values: Vec<String>) -> Self {
        self.columns.push((name.to_string(), Column::Text(values)));
        self
    }

    pub fn count(mut self, name: &str, values: Vec<u64>) -> Self {
        self.columns.push((name.to_string(), Column::Count(values)));
        self
    }

    /// Decimal column rounded to two places; `None` prints as blank.
    pub fn decimal(mut self, name: &str, values: Vec<Option<f64>>) -> Self {
        let rounded = values
            .into_iter()
            .map(|v| v.map(|x| (x * 100.0).round() / 100.0))
            .collect();
        self.columns.push((name.to_string(), Column::Decimal(rounded)));
        self
    }

    pub fn render(self) -> Result<String, RenderError> {
        let mut fields = Vec::with_capacity(self.columns.len());
        let mut arrays: Vec<ArrayRef> = Vec::with_capacity(self.columns.len());
        for (name, column) in self.columns {
            let (data_type, array): (DataType, ArrayRef) = match column {
                Column::Text(v) => (DataType::Utf8, Arc::new(StringArray::from(v))),
                Column::Count(v) => (DataType::UInt64, Arc::new(UInt64Array::from(v))),
                Column::Decimal(v) => (DataType::Float64, Arc::new(Float64Array::from(v))),
            };
            fields.push(Field::new(name, data_type, true));
            arrays.push(array);
        }
        let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?;
        Ok(pretty_format_batches(&[batch])?.to_string())
    }
}

// ---------------------------------------------------------------------------
// Renderers
// ---------------------------------------------------------------------------

fn json<T: Serialize + ?Sized>(value: &T) -> Result<String, RenderError> {
    Ok(serde_json::to_string_pretty(value)?)
}

fn factor_table(rows: &[FactorTotal]) -> Table {
    Table::new()
        .text("Factor", rows.iter().map(|f| f.name.clone()).collect())
        .count("Cases", rows.iter().map(|f| f.total).collect())
}

fn dimension_label(dim: Dimension, dataset: &DivorceDataset) -> String {
    match dim {
        Dimension::Year => dataset.schema.year.name.clone(),
        Dimension::Region => dataset.schema.region.name.clone(),
    }
}

pub fn render_report(
    report: &DashboardReport,
    dataset: &DivorceDataset,
    format: OutputFormat,
) -> Result<String, RenderError> {
    if format == OutputFormat::Json {
        return json(report);
    }
    let k = &report.kpis;
    let dominant = k
        .dominant_factor
        .as_ref()
        .map_or_else(|| "-".to_string(), |f| format!("{} ({})", f.name, f.total));

    let schema = &dataset.schema;

    let mut out = String::new();
    out.push_str(&format!("{:<22}{}\n", "Rows selected:", k.rows));
    out.push_str(&format!("{:<22}{}\n", format!("{}:", schema.total_name), k.total_divorces));
    out.push_str(&format!("{:<22}{:.0}\n", "Mean per row:", k.mean_divorces_per_row));
    out.push_str(&format!("{:<22}{}\n", "Marriages:", k.total_marriages));
    out.push_str(&format!("{:<22}{}\n", "Divorce ratio:", k.ratio));
    out.push_str(&format!("{:<22}{dominant}\n", "Dominant factor:"));

    out.push_str(&format!("\nTop {} regions\n", report.top_regions.len()));
    out.push_str(
        &group_table(&report.top_regions, &schema.region.name, &schema.total_name).render()?,
    );

    out.push_str("\n\nFactor ranking\n");
    out.push_str(&factor_table(&report.factor_ranking).render()?);

    let top = report.breakdown.top.len();
    out.push_str(&format!("\n\nTop {top} factors + {OTHER_LABEL}\n"));
    out.push_str(&factor_table(&report.breakdown.rows()).render()?);

    out.push_str("\n\nTrend\n");
    out.push_str(&trend_table(&report.trend, &schema.year.name).render()?);

    out.push_str("\n\nRatio by year\n");
    out.push_str(&ratio_table(&report.ratio_by_year, &dataset.schema.year.name).render()?);
    out.push('\n');
    Ok(out)
}

fn group_table(groups: &[GroupValue<u64>], key: &str, value: &str) -> Table {
    Table::new()
        .text(key, groups.iter().map(|g| g.key.to_string()).collect())
        .count(value, groups.iter().map(|g| g.value).collect())
}

fn ratio_table(groups: &[GroupValue<Ratio>], key: &str) -> Table {
    Table::new()
        .text(key, groups.iter().map(|g| g.key.to_string()).collect())
        .decimal("Ratio %", groups.iter().map(|g| g.value.percent()).collect())
}

fn trend_table(trend: &FactorTrend, year_label: &str) -> Table {
    let mut table = Table::new().text(
        year_label,
        trend.points.iter().map(|p| p.year.to_string()).collect(),
    );
    for (slot, member) in trend.members.iter().enumerate() {
        table = table.count(member, trend.points.iter().map(|p| p.values[slot]).collect());
    }
    table.count(
        OTHER_LABEL,
        trend.points.iter().map(|p| p.other).collect(),
    )
}

/// Grouped sum (or mean) of one measure.
pub fn render_group(
    view: &FilteredView<'_>,
    dim: Dimension,
    measure: Measure,
    mean: bool,
    format: OutputFormat,
) -> Result<String, RenderError> {
    let dataset = view.dataset();
    let key = dimension_label(dim, dataset);
    let label = measure.label(dataset);
    if mean {
        let groups = group_mean(view, dim, measure);
        return match format {
            OutputFormat::Json => json(&groups),
            OutputFormat::Text => Table::new()
                .text(&key, groups.iter().map(|g| g.key.to_string()).collect())
                .decimal(
                    &format!("Mean {label}"),
                    groups.iter().map(|g| Some(g.value)).collect(),
                )
                .render(),
        };
    }
    let groups = group_sum(view, dim, measure);
    match format {
        OutputFormat::Json => json(&groups),
        OutputFormat::Text => group_table(&groups, &key, &label).render(),
    }
}

/// Factor ranking, collapsed to top K + Other when `top_k` is given.
pub fn render_factors(
    view: &FilteredView<'_>,
    top_k: Option<usize>,
    format: OutputFormat,
) -> Result<String, RenderError> {
    match (top_k, format) {
        (Some(k), OutputFormat::Json) => json(&factor_breakdown(view, k)),
        (Some(k), OutputFormat::Text) => {
            factor_table(&factor_breakdown(view, k).rows()).render()
        }
        (None, OutputFormat::Json) => json(&rank_factors(view)),
        (None, OutputFormat::Text) => factor_table(&rank_factors(view)).render(),
    }
}

pub fn render_trend(
    view: &FilteredView<'_>,
    top_k: usize,
    format: OutputFormat,
) -> Result<String, RenderError> {
    let trend = factor_trend(view, top_k);
    match format {
        OutputFormat::Json => json(&trend),
        OutputFormat::Text => trend_table(&trend, &view.dataset().schema.year.name).render(),
    }
}

/// Overall ratio, or one ratio per group.
pub fn render_ratio(
    view: &FilteredView<'_>,
    by: Option<Dimension>,
    format: OutputFormat,
) -> Result<String, RenderError> {
    let Some(dim) = by else {
        let ratio = overall_ratio(view);
        return match format {
            OutputFormat::Json => json(&ratio),
            OutputFormat::Text => Ok(format!("Divorce ratio: {ratio}\n")),
        };
    };
    let groups = ratio_by(view, dim);
    match format {
        OutputFormat::Json => json(&groups),
        OutputFormat::Text => ratio_table(&groups, &dimension_label(dim, view.dataset())).render(),
    }
}

pub fn render_scatter(
    dataset: &DivorceDataset,
    points: &[ScatterPoint],
    x: &str,
    y: &str,
    format: OutputFormat,
) -> Result<String, RenderError> {
    let schema = &dataset.schema;
    match format {
        OutputFormat::Json => json(points),
        OutputFormat::Text => Table::new()
            .text(
                &schema.region.name,
                points.iter().map(|p| p.region.clone()).collect(),
            )
            .text(
                &schema.year.name,
                points.iter().map(|p| p.year.to_string()).collect(),
            )
            .count(x, points.iter().map(|p| p.x).collect())
            .count(y, points.iter().map(|p| p.y).collect())
            .count(&schema.total_name, points.iter().map(|p| p.size).collect())
            .render(),
    }
}

/// Years, regions and factors available for selection, plus the load report.
pub fn render_domains(
    dataset: &DivorceDataset,
    format: OutputFormat,
) -> Result<String, RenderError> {
    #[derive(Serialize)]
    struct Domains<'a> {
        years: Vec<i32>,
        regions: Vec<&'a str>,
        factors: Vec<&'a str>,
        load_report: &'a LoadReport,
    }
    let domains = Domains {
        years: dataset.years.iter().copied().collect(),
        regions: dataset.regions.iter().map(String::as_str).collect(),
        factors: dataset.factor_names().collect(),
        load_report: &dataset.report,
    };
    match format {
        OutputFormat::Json => json(&domains),
        OutputFormat::Text => {
            let years: Vec<String> = domains.years.iter().map(i32::to_string).collect();
            Ok(format!(
                "Years:   {}\nRegions: {}\nFactors: {}\nLoad:    {}\n",
                years.join(", "),
                domains.regions.join(", "),
                domains.factors.join(", "),
                dataset.report
            ))
        }
    }
}
