/// Data layer: schema, loading, cleaning, filtering, aggregation.
///
/// Architecture:
/// ```text
///  .csv / .xlsx / .parquet / .json
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → RawTable → (schema + cleaner) → DivorceDataset
///   └──────────┘
///        │
///        ▼
///   ┌────────────────┐
///   │ DivorceDataset  │  Vec<Record>, factor catalog, year/region domains
///   └────────────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  Selection → FilteredView (row indices + factor positions)
///   └──────────┘
///        │
///        ├──────────────▶ export     (verbatim CSV of the view)
///        ▼
///   ┌───────────┐
///   │ aggregate  │  sums, means, argmax, top-K + Other, trend, ratio
///   └───────────┘
/// ```

pub mod aggregate;
pub mod cleaner;
pub mod export;
pub mod filter;
pub mod loader;
pub mod model;
pub mod schema;

#[cfg(test)]
pub(crate) mod testing;
