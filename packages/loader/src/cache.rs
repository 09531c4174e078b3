//! Per-dataset memoization of loaded layers.
//!
//! Loading reprojects every geometry, so repeated requests against the
//! same dataset reuse one shared [`Layers`] value. Entries are keyed by
//! dataset id and data directory and never invalidated implicitly; call
//! [`LayerCache::clear`] after the files on disk change.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use deforest_map_property_models::DatasetDefinition;

use crate::{Layers, LoaderError, load};

/// Identity of a loaded dataset.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct DatasetKey {
    pub dataset_id: String,
    pub data_dir: PathBuf,
}

/// One dataset's entry. `loading` serializes loads of this dataset only.
#[derive(Debug, Default)]
struct Slot {
    layers: OnceLock<Arc<Layers>>,
    loading: Mutex<()>,
}

/// Thread-safe cache of loaded datasets.
///
/// The map lock is only held to find a dataset's slot, so a cold load of
/// one dataset never blocks hits on another.
#[derive(Debug, Default)]
pub struct LayerCache {
    entries: Mutex<BTreeMap<DatasetKey, Arc<Slot>>>,
}

impl LayerCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached layers for `definition`, loading them on first
    /// use. Concurrent callers for the same dataset wait for a single load.
    ///
    /// # Errors
    ///
    /// Returns [`LoaderError`] if the dataset fails to load. Failures are
    /// not cached.
    pub fn get_or_load(
        &self,
        definition: &DatasetDefinition,
        data_dir: &Path,
    ) -> Result<Arc<Layers>, LoaderError> {
        let key = DatasetKey {
            dataset_id: definition.id.clone(),
            data_dir: data_dir.to_path_buf(),
        };

        let slot = Arc::clone(
            self.entries
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .entry(key)
                .or_default(),
        );

        if let Some(layers) = slot.layers.get() {
            log::debug!("Layer cache hit for '{}'", definition.id);
            return Ok(Arc::clone(layers));
        }

        let _loading = slot.loading.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(layers) = slot.layers.get() {
            return Ok(Arc::clone(layers));
        }

        let layers = Arc::new(load(definition, data_dir)?);
        Ok(Arc::clone(slot.layers.get_or_init(|| layers)))
    }

    /// Number of loaded datasets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|slot| slot.layers.get().is_some())
            .count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every cached dataset.
    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
