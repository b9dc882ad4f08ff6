use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{info, warn};

use crate::data::filter::{filtered_indices, FilteredView, Selection};
use crate::data::loader::{load_file, LoadOptions};
use crate::data::model::DivorceDataset;
use crate::error::{LoadError, QueryError};

// ---------------------------------------------------------------------------
// Dataset cache
// ---------------------------------------------------------------------------

/// Holds the parsed dataset of one source file. Loads on first use and
/// keeps the result until invalidated. The dataset is immutable once
/// loaded, so it is shared as an `Arc`.
#[derive(Debug)]
pub struct DatasetCache {
    source: PathBuf,
    options: LoadOptions,
    dataset: Option<Arc<DivorceDataset>>,
    loads: usize,
}

impl DatasetCache {
    pub fn new(source: impl Into<PathBuf>, options: LoadOptions) -> Self {
        Self {
            source: source.into(),
            options,
            dataset: None,
            loads: 0,
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    /// The cached dataset, loading it if necessary.
    pub fn get(&mut self) -> Result<Arc<DivorceDataset>, LoadError> {
        if let Some(ds) = &self.dataset {
            return Ok(Arc::clone(ds));
        }
        self.load()
    }

    /// Drop the cached dataset; the next [`get`](Self::get) reads the file again.
    pub fn invalidate(&mut self) {
        self.dataset = None;
    }

    /// Read the file again. On failure the previously cached dataset, if
    /// any, stays in place.
    pub fn reload(&mut self) -> Result<Arc<DivorceDataset>, LoadError> {
        self.load()
    }

    pub fn is_loaded(&self) -> bool {
        self.dataset.is_some()
    }

    /// How many times the source file has been read successfully.
    pub fn load_count(&self) -> usize {
        self.loads
    }

    fn load(&mut self) -> Result<Arc<DivorceDataset>, LoadError> {
        let ds = Arc::new(load_file(&self.source, &self.options)?);
        self.loads += 1;
        info!("loaded {} records from {}", ds.len(), self.source.display());
        self.dataset = Some(Arc::clone(&ds));
        Ok(ds)
    }
}

// ---------------------------------------------------------------------------
// Dashboard state
// ---------------------------------------------------------------------------

/// The full query state, independent of rendering.
#[derive(Debug)]
pub struct DashboardState {
    pub cache: DatasetCache,

    /// Dataset the selection refers to (None until loaded).
    pub dataset: Option<Arc<DivorceDataset>>,

    pub selection: Selection,

    /// Indices of records passing the current selection (cached).
    pub visible_indices: Vec<usize>,

    /// Status / error message for the user.
    pub status_message: Option<String>,
}

impl DashboardState {
    pub fn new(cache: DatasetCache) -> Self {
        Self {
            cache,
            dataset: None,
            selection: Selection::default(),
            visible_indices: Vec::new(),
            status_message: None,
        }
    }

    /// Load (or fetch from the cache) and select everything.
    pub fn load(&mut self) -> Result<(), LoadError> {
        match self.cache.get() {
            Ok(ds) => {
                self.set_dataset(ds);
                Ok(())
            }
            Err(e) => {
                self.status_message = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Force a fresh read of the source file and reset the selection.
    pub fn reload(&mut self) -> Result<(), LoadError> {
        match self.cache.reload() {
            Ok(ds) => {
                self.set_dataset(ds);
                Ok(())
            }
            Err(e) => {
                warn!("reload failed, keeping previous data: {e}");
                self.status_message = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Ingest a newly loaded dataset, selecting every year, region and factor.
    pub fn set_dataset(&mut self, dataset: Arc<DivorceDataset>) {
        self.selection = Selection::all(&dataset);
        self.visible_indices = (0..dataset.len()).collect();
        self.dataset = Some(dataset);
        self.status_message = None;
    }

    /// Replace the whole selection.
    pub fn set_selection(&mut self, selection: Selection) {
        self.selection = selection;
        self.refilter();
    }

    /// Recompute `visible_indices` after a selection change.
    pub fn refilter(&mut self) {
        if let Some(ds) = &self.dataset {
            self.visible_indices = filtered_indices(ds, &self.selection);
            self.status_message = self
                .visible_indices
                .is_empty()
                .then(|| QueryError::EmptySelection.to_string());
        }
    }

    /// A view over the current selection.
    pub fn view(&self) -> Result<FilteredView<'_>, QueryError> {
        let ds = self.dataset.as_deref().ok_or(QueryError::NoDataLoaded)?;
        FilteredView::new(ds, &self.selection)
    }

    pub fn toggle_year(&mut self, year: i32) {
        if !self.selection.years.remove(&year) {
            self.selection.years.insert(year);
        }
        self.refilter();
    }

    pub fn toggle_region(&mut self, region: &str) {
        if !self.selection.regions.remove(region) {
            self.selection.regions.insert(region.to_string());
        }
        self.refilter();
    }

    /// Toggle one factor. Starting from "all factors", this deselects it.
    pub fn toggle_factor(&mut self, factor: &str) -> Result<(), QueryError> {
        let ds = self.dataset.as_deref().ok_or(QueryError::NoDataLoaded)?;
        let position = ds
            .factor_index(factor)
            .ok_or_else(|| QueryError::UnknownFactor(factor.to_string()))?;
        let name = ds.schema.factors[position].name.clone();

        let selected = self
            .selection
            .factors
            .get_or_insert_with(|| ds.factor_names().map(str::to_string).collect());
        if !selected.remove(&name) {
            selected.insert(name);
        }
        Ok(())
    }

    pub fn select_all_years(&mut self) {
        if let Some(ds) = &self.dataset {
            self.selection.years = ds.years.clone();
            self.refilter();
        }
    }

    pub fn select_no_years(&mut self) {
        self.selection.years.clear();
        self.refilter();
    }

    pub fn select_all_regions(&mut self) {
        if let Some(ds) = &self.dataset {
            self.selection.regions = ds.regions.clone();
            self.refilter();
        }
    }

    pub fn select_no_regions(&mut self) {
        self.selection.regions.clear();
        self.refilter();
    }

    pub fn select_all_factors(&mut self) {
        self.selection.factors = None;
    }

    pub fn select_no_factors(&mut self) {
        self.selection.factors = Some(Default::default());
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::data::testing::SAMPLE_CSV;

    fn write_sample(dir: &tempfile::TempDir) -> PathBuf {
        let path = dir.path().join("data.csv");
        std::fs::write(&path, SAMPLE_CSV).unwrap();
        path
    }

    #[test]
    fn test_cache_loads_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = DatasetCache::new(write_sample(&dir), LoadOptions::default());
        assert!(!cache.is_loaded());

        let a = cache.get().unwrap();
        let b = cache.get().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.load_count(), 1);
    }

    #[test]
    fn test_cache_invalidate_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_sample(&dir);
        let mut cache = DatasetCache::new(&path, LoadOptions::default());
        assert_eq!(cache.get().unwrap().len(), 5);

        let header = SAMPLE_CSV.lines().next().unwrap();
        std::fs::write(&path, format!("{header}\nKota Kediri,2024,10,0,0,0,1,1,2\n")).unwrap();
        // still cached
        assert_eq!(cache.get().unwrap().len(), 5);

        cache.invalidate();
        assert!(!cache.is_loaded());
        assert_eq!(cache.get().unwrap().len(), 1);
        assert_eq!(cache.load_count(), 2);

        std::fs::write(&path, SAMPLE_CSV).unwrap();
        assert_eq!(cache.reload().unwrap().len(), 5);
        assert_eq!(cache.load_count(), 3);
    }

    #[test]
    fn test_failed_reload_keeps_previous_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_sample(&dir);
        let mut cache = DatasetCache::new(&path, LoadOptions::default());
        cache.get().unwrap();

        std::fs::remove_file(&path).unwrap();
        assert!(matches!(cache.reload(), Err(LoadError::Io { .. })));
        assert!(cache.is_loaded());
        assert_eq!(cache.get().unwrap().len(), 5);
    }

    #[test]
    fn test_missing_file_sets_status() {
        let cache = DatasetCache::new("/nonexistent/data.csv", LoadOptions::default());
        let mut state = DashboardState::new(cache);
        assert!(state.load().is_err());
        assert!(state.status_message.is_some());
        assert_eq!(state.view().unwrap_err(), QueryError::NoDataLoaded);
    }

    #[test]
    fn test_toggles_and_empty_selection() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = DashboardState::new(DatasetCache::new(write_sample(&dir), LoadOptions::default()));
        state.load().unwrap();
        assert_eq!(state.visible_indices.len(), 5);

        state.toggle_year(2022);
        assert_eq!(state.visible_indices, vec![2, 3, 4]);

        state.toggle_region("Kota Malang");
        assert_eq!(state.visible_indices, vec![3, 4]);

        state.select_no_regions();
        assert!(state.visible_indices.is_empty());
        assert!(state.status_message.is_some());
        assert_eq!(state.view().unwrap_err(), QueryError::EmptySelection);

        state.select_all_regions();
        state.select_all_years();
        assert_eq!(state.visible_indices.len(), 5);
        assert!(state.status_message.is_none());
    }

    #[test]
    fn test_toggle_factor() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = DashboardState::new(DatasetCache::new(write_sample(&dir), LoadOptions::default()));
        state.load().unwrap();

        state.toggle_factor("Zina").unwrap();
        let selected = state.selection.factors.clone().unwrap();
        assert_eq!(selected.len(), 4);
        assert!(!selected.contains("Zina"));

        state.toggle_factor("Fakor Perceraian - Zina").unwrap();
        assert_eq!(state.selection.factors.as_ref().unwrap().len(), 5);

        assert_eq!(
            state.toggle_factor("Astrologi").unwrap_err(),
            QueryError::UnknownFactor("Astrologi".to_string())
        );

        state.select_no_factors();
        assert_eq!(state.selection.factors, Some(BTreeSet::new()));
        state.select_all_factors();
        assert_eq!(state.selection.factors, None);
    }
}
