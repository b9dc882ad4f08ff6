//! Marriage and divorce statistics for regencies and cities.
//!
//! Loads a published statistics table (CSV, spreadsheet, Parquet or JSON),
//! cleans its free-text counts, filters it by year, region and
//! cause-of-divorce factor, and computes the summary tables a dashboard
//! shows: totals, means, the dominant factor, top-K breakdowns with an
//! "Other" bucket, per-year trends and divorce-to-marriage ratios.
//!
//! ```rust,ignore
//! use divorce_stats::data::aggregate::{dominant_factor, factor_breakdown};
//! use divorce_stats::data::filter::{FilteredView, Selection};
//! use divorce_stats::data::loader::{load_file, LoadOptions};
//!
//! let dataset = load_file("data.csv".as_ref(), &LoadOptions::default())?;
//! let view = FilteredView::new(&dataset, &Selection::all(&dataset))?;
//! println!("{:?}", dominant_factor(&view));
//! println!("{:?}", factor_breakdown(&view, 5));
//! ```

pub mod config;
pub mod data;
pub mod error;
pub mod report;
pub mod shell;
pub mod state;

pub use config::Config;
pub use data::filter::{FilteredView, Selection};
pub use data::model::{DivorceDataset, Record};
pub use error::{ExportError, LoadError, QueryError, RenderError};
pub use state::{DashboardState, DatasetCache};
