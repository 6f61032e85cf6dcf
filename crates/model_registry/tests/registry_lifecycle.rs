use burn::backend::NdArray;
use data_contracts::ArtifactKind;
use model_registry::{
    ArtifactStore, CombinedModelFile, FsArtifactStore, MemoryArtifactStore, ModelStore, RegistryError, RegistryResult,
    INDEX_KEY,
};
use models::{model_to_bytes, ArchitectureDescriptor, MarkerRegressor, MarkerRegressorConfig, MemoryLedger};
use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

type B = NdArray<f32>;

fn tiny_model(output_dim: usize) -> MarkerRegressor<B> {
    MarkerRegressor::new(MarkerRegressorConfig::new(16, 16, output_dim), &Default::default()).unwrap()
}

fn memory_store() -> (ModelStore<B>, Arc<MemoryLedger>) {
    let ledger = MemoryLedger::new();
    let store = ModelStore::<B>::open(Arc::new(MemoryArtifactStore::new()), Default::default(), ledger.clone()).unwrap();
    (store, ledger)
}

#[test]
fn ids_are_monotonic_and_never_reused() -> anyhow::Result<()> {
    let (store, _) = memory_store();
    let a = store.save(&tiny_model(4), "a", "first")?;
    let b = store.save(&tiny_model(4), "b", "second")?;
    assert_eq!((a.id, b.id), (1, 2));
    store.delete(b.id)?;
    let c = store.save(&tiny_model(4), "c", "third")?;
    assert_eq!(c.id, 3);
    assert_eq!(store.list().iter().map(|m| m.id).collect::<Vec<_>>(), vec![1, 3]);
    assert_eq!(c.kind, ArtifactKind::Trained);
    Ok(())
}

#[test]
fn repeated_switching_does_not_grow_the_ledger() -> anyhow::Result<()> {
    let (store, ledger) = memory_store();
    let a = store.save(&tiny_model(4), "a", "")?;
    let b = store.save(&tiny_model(10), "b", "")?;

    store.switch(a.id)?;
    let after_first = ledger.snapshot();
    assert_eq!(after_first.tensors, 1);

    for i in 0..20 {
        store.switch(if i % 2 == 0 { b.id } else { a.id })?;
        assert_eq!(ledger.snapshot().tensors, 1);
    }
    // The 20th switch lands on `a` again.
    assert_eq!(ledger.snapshot(), after_first);
    assert_eq!(store.active().map(|m| m.id), Some(a.id));
    // Never two models at once.
    assert!(ledger.peak_bytes() <= after_first.bytes.max(tiny_model(10).param_bytes()));
    Ok(())
}

#[test]
fn deleting_active_clears_slot() -> anyhow::Result<()> {
    let (store, ledger) = memory_store();
    let a = store.save(&tiny_model(4), "a", "")?;
    let handle = store.active_handle();
    store.switch(a.id)?;
    assert!(handle.is_loaded());
    store.delete(a.id)?;
    assert!(!handle.is_loaded());
    assert!(store.active().is_none());
    assert_eq!(ledger.snapshot().tensors, 0);
    assert!(matches!(store.switch(a.id), Err(RegistryError::NotFound { id: 1 })));
    Ok(())
}

#[test]
fn upload_two_part_and_combined() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let (store, _) = memory_store();
    let model = tiny_model(4);
    let desc = ArchitectureDescriptor::new(*model.config);
    let weights = model_to_bytes(&model)?;

    let arch = tmp.path().join("model.json");
    let bin = tmp.path().join("weights.bin");
    fs::write(&arch, desc.to_json()?)?;
    fs::write(&bin, &weights)?;
    let two_part = store.upload(&arch, Some(&bin), "two-part")?;
    assert_eq!(two_part.kind, ArtifactKind::Uploaded);

    let combined = tmp.path().join("combined.json");
    fs::write(&combined, CombinedModelFile::new(desc.clone(), &weights).to_json()?)?;
    let single = store.upload(&combined, None, "combined")?;
    store.switch(single.id)?;

    // Weights for a different head width are refused.
    let wrong = tmp.path().join("wrong.bin");
    fs::write(&wrong, model_to_bytes(&tiny_model(10))?)?;
    assert!(store.upload(&arch, Some(&wrong), "bad").is_err());
    assert_eq!(store.list().len(), 2);
    Ok(())
}

#[test]
fn fs_registry_survives_reopen_and_exports() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let backend: Arc<dyn ArtifactStore> = Arc::new(FsArtifactStore::new(tmp.path().join("models")));
    let id = {
        let store = ModelStore::<B>::open(backend.clone(), Default::default(), MemoryLedger::new())?;
        let a = store.save(&tiny_model(4), "persisted", "kept on disk")?;
        store.switch(a.id)?;
        a.id
    };

    let store = ModelStore::<B>::open(backend, Default::default(), MemoryLedger::new())?;
    assert_eq!(store.list()[0].name, "persisted");
    assert_eq!(store.persisted_active_id(), Some(id));
    assert!(store.active().is_none());
    assert_eq!(store.restore_active()?.map(|a| a.id), Some(id));

    let (model_json, weights_bin) = store.export(id, &tmp.path().join("export"))?;
    let desc = ArchitectureDescriptor::from_json(&fs::read(model_json)?)?;
    assert_eq!(desc.config.output_dim, 4);
    assert!(fs::metadata(weights_bin)?.len() > 0);
    Ok(())
}

/// Memory store whose index writes can be made to fail.
#[derive(Default)]
struct FlakyIndexStore {
    inner: MemoryArtifactStore,
    fail_index: AtomicBool,
}

impl ArtifactStore for FlakyIndexStore {
    fn get(&self, key: &str) -> RegistryResult<Option<Vec<u8>>> {
        self.inner.get(key)
    }

    fn put(&self, key: &str, value: &[u8]) -> RegistryResult<()> {
        if key == INDEX_KEY && self.fail_index.load(Ordering::SeqCst) {
            return Err(RegistryError::InvalidKey(format!("{key} (read-only)")));
        }
        self.inner.put(key, value)
    }

    fn delete(&self, key: &str) -> RegistryResult<()> {
        self.inner.delete(key)
    }

    fn keys(&self, prefix: &str) -> RegistryResult<Vec<String>> {
        self.inner.keys(prefix)
    }
}

#[test]
fn failed_index_write_leaves_no_orphan_blobs() -> anyhow::Result<()> {
    let backend = Arc::new(FlakyIndexStore::default());
    let store = ModelStore::<B>::open(backend.clone(), Default::default(), MemoryLedger::new())?;
    backend.fail_index.store(true, Ordering::SeqCst);

    assert!(store.save(&tiny_model(4), "lost", "").is_err());
    assert!(backend.keys("models/")?.is_empty());
    assert!(store.list().is_empty());

    backend.fail_index.store(false, Ordering::SeqCst);
    let kept = store.save(&tiny_model(4), "kept", "")?;
    assert_eq!(backend.keys("models/")?.len(), 2);
    assert_eq!(store.list()[0].id, kept.id);
    Ok(())
}

#[test]
fn failed_switch_clears_persisted_active_id() -> anyhow::Result<()> {
    let backend = Arc::new(MemoryArtifactStore::new());
    let ledger = MemoryLedger::new();
    let store = ModelStore::<B>::open(backend.clone(), Default::default(), ledger.clone())?;
    let a = store.save(&tiny_model(4), "a", "")?;
    let b = store.save(&tiny_model(4), "b", "")?;
    store.switch(a.id)?;
    assert_eq!(store.persisted_active_id(), Some(a.id));

    backend.put(&b.weights_key(), b"not a burn record")?;
    assert!(store.switch(b.id).is_err());

    assert!(store.active().is_none());
    assert_eq!(store.persisted_active_id(), None);
    assert_eq!(ledger.snapshot().tensors, 0);
    Ok(())
}

#[test]
fn concurrent_switch_and_delete_stay_consistent() -> anyhow::Result<()> {
    for _ in 0..16 {
        let (store, _) = memory_store();
        let a = store.save(&tiny_model(4), "a", "")?;
        let b = store.save(&tiny_model(4), "b", "")?;
        store.switch(a.id)?;

        std::thread::scope(|s| {
            s.spawn(|| {
                let _ = store.switch(b.id);
            });
            s.spawn(|| {
                let _ = store.delete(b.id);
            });
        });

        let active = store.active().map(|m| m.id);
        assert_eq!(active, store.persisted_active_id());
        if let Some(id) = active {
            assert!(store.list().iter().any(|m| m.id == id), "active model {id} was deleted");
        }
        assert!(store.get(b.id).is_err());
    }
    Ok(())
}
