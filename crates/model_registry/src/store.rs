use crate::envelope::CombinedModelFile;
use crate::kv::ArtifactStore;
use crate::{RegistryError, RegistryResult};
use burn::tensor::backend::Backend;
use data_contracts::{ArtifactKind, ArtifactMetrics, ModelArtifact, ARTIFACT_SCHEMA_VERSION};
use models::{model_from_bytes, model_to_bytes, ArchitectureDescriptor, MarkerRegressor, MemoryLedger, TensorScope};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

pub const INDEX_KEY: &str = "registry/index.json";
const FRAMEWORK_VERSION: &str = "burn-0.20";

/// Persisted artifact list. Ids are never reused.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistryIndex {
    pub schema_version: u32,
    pub next_id: u64,
    #[serde(default)]
    pub active_id: Option<u64>,
    pub artifacts: Vec<ModelArtifact>,
}

/// A model resident on the device, accounted in the ledger while alive.
#[derive(Debug)]
pub struct LoadedModel<B: Backend> {
    pub artifact: ModelArtifact,
    pub model: MarkerRegressor<B>,
    _scope: TensorScope,
}

/// Shared handle on the single active-model slot.
///
/// Detection locks the slot for the duration of a forward pass, so a switch
/// or delete waits for in-flight inference and vice versa.
pub struct ActiveModel<B: Backend>(Arc<Mutex<Option<LoadedModel<B>>>>);

impl<B: Backend> Clone for ActiveModel<B> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<B: Backend> Default for ActiveModel<B> {
    fn default() -> Self {
        Self(Arc::new(Mutex::new(None)))
    }
}

impl<B: Backend> ActiveModel<B> {
    pub fn lock(&self) -> MutexGuard<'_, Option<LoadedModel<B>>> {
        match self.0.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn artifact(&self) -> Option<ModelArtifact> {
        self.lock().as_ref().map(|m| m.artifact.clone())
    }

    pub fn is_loaded(&self) -> bool {
        self.lock().is_some()
    }
}

pub struct ModelStore<B: Backend> {
    store: Arc<dyn ArtifactStore>,
    device: B::Device,
    ledger: Arc<MemoryLedger>,
    index: Mutex<RegistryIndex>,
    active: ActiveModel<B>,
    /// Held for the whole of register, switch and delete.
    mutation: Mutex<()>,
}

impl<B: Backend> ModelStore<B> {
    /// Open the registry, reading the index if one exists.
    pub fn open(store: Arc<dyn ArtifactStore>, device: B::Device, ledger: Arc<MemoryLedger>) -> RegistryResult<Self> {
        let index = match store.get(INDEX_KEY)? {
            Some(bytes) => serde_json::from_slice(&bytes)?,
            None => RegistryIndex {
                schema_version: ARTIFACT_SCHEMA_VERSION,
                next_id: 1,
                ..Default::default()
            },
        };
        Ok(Self {
            store,
            device,
            ledger,
            index: Mutex::new(index),
            active: ActiveModel::default(),
            mutation: Mutex::new(()),
        })
    }

    pub fn ledger(&self) -> &Arc<MemoryLedger> {
        &self.ledger
    }

    pub fn device(&self) -> &B::Device {
        &self.device
    }

    /// Handle for detectors that run the active model.
    pub fn active_handle(&self) -> ActiveModel<B> {
        self.active.clone()
    }

    fn index(&self) -> MutexGuard<'_, RegistryIndex> {
        match self.index.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn mutation(&self) -> MutexGuard<'_, ()> {
        match self.mutation.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn persist(&self, index: &RegistryIndex) -> RegistryResult<()> {
        self.store.put(INDEX_KEY, &serde_json::to_vec_pretty(index)?)
    }

    pub fn list(&self) -> Vec<ModelArtifact> {
        self.index().artifacts.clone()
    }

    pub fn get(&self, id: u64) -> RegistryResult<ModelArtifact> {
        self.index()
            .artifacts
            .iter()
            .find(|a| a.id == id)
            .cloned()
            .ok_or(RegistryError::NotFound { id })
    }

    /// Currently loaded artifact, if any.
    pub fn active(&self) -> Option<ModelArtifact> {
        self.active.artifact()
    }

    /// Id the index recorded as active (may not be loaded in this process yet).
    pub fn persisted_active_id(&self) -> Option<u64> {
        self.index().active_id
    }

    pub fn save(&self, model: &MarkerRegressor<B>, name: &str, description: &str) -> RegistryResult<ModelArtifact> {
        self.save_trained(model, name, description, None)
    }

    pub fn save_trained(
        &self,
        model: &MarkerRegressor<B>,
        name: &str,
        description: &str,
        metrics: Option<ArtifactMetrics>,
    ) -> RegistryResult<ModelArtifact> {
        let descriptor = ArchitectureDescriptor::new(*model.config);
        let weights = model_to_bytes(model)?;
        self.register(descriptor, &weights, name, description, ArtifactKind::Trained, metrics)
    }

    /// Import a model from disk: a descriptor plus weights, or one combined file.
    pub fn upload(&self, architecture_file: &Path, weights_file: Option<&Path>, name: &str) -> RegistryResult<ModelArtifact> {
        let arch_bytes = fs::read(architecture_file).map_err(|e| RegistryError::io(architecture_file, e))?;
        let (descriptor, weights) = match weights_file {
            Some(path) => {
                let weights = fs::read(path).map_err(|e| RegistryError::io(path, e))?;
                (ArchitectureDescriptor::from_json(&arch_bytes)?, weights)
            }
            None => {
                let combined = CombinedModelFile::from_json(&arch_bytes)?;
                let weights = combined.weight_bytes()?;
                combined.descriptor.config.validate()?;
                (combined.descriptor, weights)
            }
        };
        // Refuse weights that do not fit the declared architecture.
        model_from_bytes::<B>(&descriptor, &weights, &self.device)?;
        let description = format!("uploaded from {}", architecture_file.display());
        self.register(descriptor, &weights, name, &description, ArtifactKind::Uploaded, None)
    }

    fn register(
        &self,
        descriptor: ArchitectureDescriptor,
        weights: &[u8],
        name: &str,
        description: &str,
        kind: ArtifactKind,
        metrics: Option<ArtifactMetrics>,
    ) -> RegistryResult<ModelArtifact> {
        let _mutation = self.mutation();
        let mut index = self.index();
        let id = index.next_id.max(1);
        let artifact = ModelArtifact {
            id,
            name: name.to_string(),
            description: description.to_string(),
            created_at_ms: now_ms(),
            storage_path: format!("models/{id}"),
            kind,
            version: ARTIFACT_SCHEMA_VERSION,
            framework_version: FRAMEWORK_VERSION.to_string(),
            metrics,
        };
        let mut next = index.clone();
        next.next_id = id + 1;
        next.artifacts.push(artifact.clone());
        let written = self
            .store
            .put(&artifact.descriptor_key(), &descriptor.to_json()?)
            .and_then(|_| self.store.put(&artifact.weights_key(), weights))
            .and_then(|_| self.persist(&next));
        if let Err(err) = written {
            // Blobs without an index entry would never be listed or removed.
            self.remove_blobs(&artifact);
            return Err(err);
        }
        *index = next;
        info!(id, name, kind = ?kind, "model artifact saved");
        Ok(artifact)
    }

    /// Make `id` the active model. The previous model is released first.
    ///
    /// When the replacement fails to load, no model is active afterwards and
    /// the persisted active id is cleared to match.
    pub fn switch(&self, id: u64) -> RegistryResult<ModelArtifact> {
        let _mutation = self.mutation();
        let artifact = self.get(id)?;
        let mut slot = self.active.lock();
        if let Some(old) = slot.take() {
            info!(id = old.artifact.id, "released active model");
            drop(old);
        }

        let model = match self.load_model(&artifact) {
            Ok(model) => model,
            Err(err) => {
                drop(slot);
                warn!(id, error = %err, "active model failed to load");
                self.set_active_id(None)?;
                return Err(err);
            }
        };
        let mut scope = self.ledger.scope("active-model");
        scope.track_raw(1, model.param_bytes());
        *slot = Some(LoadedModel {
            artifact: artifact.clone(),
            model,
            _scope: scope,
        });
        drop(slot);

        self.set_active_id(Some(id))?;
        info!(id, name = %artifact.name, "switched active model");
        Ok(artifact)
    }

    fn load_model(&self, artifact: &ModelArtifact) -> RegistryResult<MarkerRegressor<B>> {
        let id = artifact.id;
        let descriptor_bytes = self
            .store
            .get(&artifact.descriptor_key())?
            .ok_or_else(|| models::ModelError::MissingWeights(format!("descriptor for model {id}")))?;
        let weights = self
            .store
            .get(&artifact.weights_key())?
            .ok_or_else(|| models::ModelError::MissingWeights(format!("weights for model {id}")))?;
        let descriptor = ArchitectureDescriptor::from_json(&descriptor_bytes)?;
        Ok(model_from_bytes::<B>(&descriptor, &weights, &self.device)?)
    }

    fn set_active_id(&self, id: Option<u64>) -> RegistryResult<()> {
        let mut index = self.index();
        if index.active_id == id {
            return Ok(());
        }
        let mut next = index.clone();
        next.active_id = id;
        self.persist(&next)?;
        *index = next;
        Ok(())
    }

    fn remove_blobs(&self, artifact: &ModelArtifact) {
        for key in [artifact.descriptor_key(), artifact.weights_key()] {
            if let Err(err) = self.store.delete(&key) {
                warn!(key, error = %err, "failed to remove artifact blob");
            }
        }
    }

    /// Load whatever the index recorded as active, if it still exists.
    pub fn restore_active(&self) -> RegistryResult<Option<ModelArtifact>> {
        match self.persisted_active_id() {
            Some(id) => match self.switch(id) {
                Ok(a) => Ok(Some(a)),
                Err(RegistryError::NotFound { .. }) => {
                    warn!(id, "persisted active model no longer exists");
                    Ok(None)
                }
                Err(e) => Err(e),
            },
            None => Ok(None),
        }
    }

    /// Remove an artifact; clears the active slot when it was the active one.
    pub fn delete(&self, id: u64) -> RegistryResult<()> {
        let _mutation = self.mutation();
        let artifact = self.get(id)?;
        {
            let mut slot = self.active.lock();
            if slot.as_ref().is_some_and(|m| m.artifact.id == id) {
                *slot = None;
                info!(id, "cleared active model");
            }
        }
        let mut index = self.index();
        let mut next = index.clone();
        next.artifacts.retain(|a| a.id != id);
        if next.active_id == Some(id) {
            next.active_id = None;
        }
        self.persist(&next)?;
        *index = next;
        drop(index);

        self.store.delete(&artifact.descriptor_key())?;
        self.store.delete(&artifact.weights_key())?;
        info!(id, name = %artifact.name, "model artifact deleted");
        Ok(())
    }

    /// Write `model.json` and `weights.bin` for `id` into `dir`.
    pub fn export(&self, id: u64, dir: &Path) -> RegistryResult<(PathBuf, PathBuf)> {
        let artifact = self.get(id)?;
        let descriptor = self
            .store
            .get(&artifact.descriptor_key())?
            .ok_or_else(|| models::ModelError::MissingWeights(format!("descriptor for model {id}")))?;
        let weights = self
            .store
            .get(&artifact.weights_key())?
            .ok_or_else(|| models::ModelError::MissingWeights(format!("weights for model {id}")))?;
        fs::create_dir_all(dir).map_err(|e| RegistryError::io(dir, e))?;
        let model_path = dir.join("model.json");
        let weights_path = dir.join("weights.bin");
        fs::write(&model_path, descriptor).map_err(|e| RegistryError::io(&model_path, e))?;
        fs::write(&weights_path, weights).map_err(|e| RegistryError::io(&weights_path, e))?;
        info!(id, dir = %dir.display(), "model exported");
        Ok((model_path, weights_path))
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
