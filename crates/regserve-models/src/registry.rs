//! The in-memory model registry and its synchronisation with the store.
//!
//! Every id is in one of three states: absent, persisted only (a file exists
//! but the model is not in memory), or in memory. A single mutex guards the
//! map of in-memory models together with the set of ids whose fit is in
//! flight. Fitting, the artificial post-fit delay and serialisation happen
//! outside the lock. Writing a model file and registering it happen under the
//! lock, as does `remove_all`, so memory and disk never disagree.
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use crate::config::ModelConfig;
use crate::dataset;
use crate::error::{RegistryError, StoreError};
use crate::models::factory::build_model;
use crate::models::regressor_trait::RegressionModel;
use crate::models::Model;
use crate::store::ModelStore;

/// Ids double as file names, so they are kept short and path-safe.
pub const MAX_ID_LEN: usize = 128;

/// Delay applied after each fit unless configured otherwise.
pub const DEFAULT_FIT_DELAY: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    AlreadyLoaded,
    Loaded,
}

#[derive(Default)]
struct RegistryState {
    models: HashMap<String, Arc<Model>>,
    pending: HashSet<String>,
    /// Bumped by every `remove_all`.
    generation: u64,
}

pub struct ModelRegistry {
    state: Mutex<RegistryState>,
    store: ModelStore,
    fit_delay: Duration,
}

/// Claim on an id whose fit is in flight. Dropping it without committing
/// releases the id again, including when the fit panics.
struct Reservation<'a> {
    registry: &'a ModelRegistry,
    id: &'a str,
    committed: bool,
}

impl Reservation<'_> {
    /// Persist the encoded model and register it in one critical section.
    fn commit(mut self, bytes: &[u8], model: Model) -> Result<PathBuf, StoreError> {
        let mut state = self.registry.lock();
        let path = self.registry.store.write(self.id, bytes)?;
        state.pending.remove(self.id);
        state.models.insert(self.id.to_string(), Arc::new(model));
        self.committed = true;
        Ok(path)
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.registry.lock().pending.remove(self.id);
        }
    }
}

/// Check that `id` is usable as a registry key and file stem.
pub fn validate_id(id: &str) -> Result<(), RegistryError> {
    let reason = if id.is_empty() {
        Some("must not be empty")
    } else if id.len() > MAX_ID_LEN {
        Some("must be at most 128 bytes")
    } else if id.starts_with('.') {
        Some("must not start with '.'")
    } else if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
    {
        Some("may only contain ASCII letters, digits, '_', '-' and '.'")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(RegistryError::InvalidModelId {
            id: id.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

impl ModelRegistry {
    pub fn new(store: ModelStore) -> Self {
        ModelRegistry {
            state: Mutex::new(RegistryState::default()),
            store,
            fit_delay: DEFAULT_FIT_DELAY,
        }
    }

    /// Override the pause inserted between fitting and registering a model.
    pub fn with_fit_delay(mut self, fit_delay: Duration) -> Self {
        self.fit_delay = fit_delay;
        self
    }

    pub fn store(&self) -> &ModelStore {
        &self.store
    }

    pub fn fit_delay(&self) -> Duration {
        self.fit_delay
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn reserve<'a>(&'a self, id: &'a str) -> Result<Reservation<'a>, RegistryError> {
        let mut state = self.lock();
        if state.models.contains_key(id) || !state.pending.insert(id.to_string()) {
            return Err(RegistryError::DuplicateId(id.to_string()));
        }
        Ok(Reservation {
            registry: self,
            id,
            committed: false,
        })
    }

    /// Fit a new model, persist it and register it under `config.id`.
    ///
    /// Blocks for the duration of the fit plus the configured delay.
    pub fn fit(&self, config: &ModelConfig, x: &[Vec<f64>], y: &[f64]) -> Result<(), RegistryError> {
        validate_id(&config.id)?;
        let reservation = self.reserve(&config.id)?;

        let result = self
            .fit_and_encode(config, x, y)
            .and_then(|(model, bytes)| {
                reservation
                    .commit(&bytes, model)
                    .map_err(RegistryError::from)
            });
        if let Err(e) = result {
            log::warn!("Fitting model '{}' failed: {}", config.id, e);
            return Err(e);
        }

        log::info!(
            "Model '{}' ({}) trained and saved",
            config.id,
            config.model_type.name()
        );
        Ok(())
    }

    fn fit_and_encode(
        &self,
        config: &ModelConfig,
        x: &[Vec<f64>],
        y: &[f64],
    ) -> Result<(Model, Vec<u8>), RegistryError> {
        let records = dataset::records(x)?;
        let targets = dataset::targets(y, records.nrows())?;

        let mut model = build_model(&config.model_type);
        model.fit(&records, &targets)?;
        log::debug!(
            "Fitted '{}' on {} rows x {} features",
            config.id,
            records.nrows(),
            records.ncols()
        );

        if !self.fit_delay.is_zero() {
            thread::sleep(self.fit_delay);
        }

        let bytes = self.store.encode(&config.id, &model)?;
        Ok((model, bytes))
    }

    /// Bring a persisted model into memory. A model already in memory is
    /// left untouched.
    pub fn load(&self, id: &str) -> Result<LoadOutcome, RegistryError> {
        validate_id(id)?;
        let generation = {
            let state = self.lock();
            if state.models.contains_key(id) {
                return Ok(LoadOutcome::AlreadyLoaded);
            }
            state.generation
        };

        let model = self
            .store
            .load(id)?
            .ok_or_else(|| RegistryError::ModelNotFound(id.to_string()))?;

        let mut state = self.lock();
        if state.models.contains_key(id) {
            return Ok(LoadOutcome::AlreadyLoaded);
        }
        // A remove_all ran while the file was being read; the file is gone.
        if state.generation != generation {
            return Err(RegistryError::ModelNotFound(id.to_string()));
        }
        state.models.insert(id.to_string(), Arc::new(model));
        log::info!("Model '{}' loaded from {}", id, self.store.path_for(id).display());
        Ok(LoadOutcome::Loaded)
    }

    /// Predict with an in-memory model. Never loads from disk.
    pub fn predict(&self, id: &str, x: &[Vec<f64>]) -> Result<Vec<f64>, RegistryError> {
        let model = self
            .lock()
            .models
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::ModelNotLoaded(id.to_string()))?;

        let records = dataset::records(x)?;
        let predictions = model.predict(&records)?;
        Ok(predictions.to_vec())
    }

    pub fn is_loaded(&self, id: &str) -> bool {
        self.lock().models.contains_key(id)
    }

    /// Ids of the in-memory models, sorted.
    pub fn list_models(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.lock().models.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Ids that could be loaded from the store.
    pub fn persisted_ids(&self) -> Result<Vec<String>, StoreError> {
        self.store.persisted_ids()
    }

    /// Drop every in-memory model and delete every persisted model file.
    /// Returns the number of files deleted.
    pub fn remove_all(&self) -> Result<usize, RegistryError> {
        let mut state = self.lock();
        let in_memory = state.models.len();
        state.models.clear();
        state.generation = state.generation.wrapping_add(1);
        let removed = self.store.remove_all()?;
        log::info!(
            "Removed {} in-memory models and {} model files",
            in_memory,
            removed
        );
        Ok(removed)
    }
}
