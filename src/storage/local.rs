//! Local filesystem checkpoint implementation.
//!
//! ## Save sequence
//!
//! 1. Serialize the three artifacts to `<name>.tmp` siblings.
//! 2. Rename each temp file to its generation-suffixed name.
//! 3. Write the new manifest to a temp file and rename it over `manifest.json`.
//! 4. Delete the artifacts of the superseded generation.
//!
//! Only step 3 changes what `load` sees.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::{AggregateStore, AggregationState, ProcessedInputRegistry};
use crate::storage::{
    FORMAT_VERSION, GEOGRAPHIC_STEM, MANIFEST_FILE, Manifest, POLITICAL_STEM, REGISTRY_STEM,
    SaveMetadata, StateStorage,
};

/// Checkpoint store rooted at a local directory.
#[derive(Debug, Clone)]
pub struct CheckpointManager {
    root_dir: PathBuf,
}

impl CheckpointManager {
    /// Create a CheckpointManager rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Get the full path for a file name.
    fn path(&self, name: &str) -> PathBuf {
        self.root_dir.join(name)
    }

    fn temp_path(&self, name: &str) -> PathBuf {
        self.root_dir.join(format!("{name}.tmp"))
    }

    /// Write bytes to `path`, flushed to disk.
    async fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
        let mut file = tokio::fs::File::create(path).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        file.sync_all().await?;
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_atomic(&self, name: &str, bytes: &[u8]) -> Result<()> {
        let tmp = self.temp_path(name);
        if let Err(e) = Self::write_file(&tmp, bytes).await {
            remove_quietly(&tmp).await;
            return Err(e);
        }
        tokio::fs::rename(&tmp, self.path(name)).await?;
        Ok(())
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, name: &str) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(self.path(name)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Read an artifact the manifest refers to. Missing or unparsable is corruption.
    async fn read_artifact<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let path = self.path(name);
        let bytes = self
            .read_bytes(name)
            .await?
            .ok_or_else(|| AppError::checkpoint(&path, "artifact listed in manifest is missing"))?;
        serde_json::from_slice(&bytes).map_err(|e| AppError::checkpoint(&path, e))
    }

    /// Stage every artifact, then publish them under their final names.
    async fn write_generation(&self, manifest: &Manifest, state: &AggregationState) -> Result<()> {
        let staged = [
            (&manifest.political, serde_json::to_vec(&state.political)?),
            (&manifest.geographic, serde_json::to_vec(&state.geographic)?),
            (&manifest.registry, serde_json::to_vec(&state.registry)?),
        ];

        let mut temps = Vec::with_capacity(staged.len());
        for (name, bytes) in &staged {
            let tmp = self.temp_path(name);
            let written = Self::write_file(&tmp, bytes).await;
            temps.push(tmp);
            if let Err(e) = written {
                for tmp in &temps {
                    remove_quietly(tmp).await;
                }
                return Err(e);
            }
        }

        for ((name, _), tmp) in staged.iter().zip(&temps) {
            tokio::fs::rename(tmp, self.path(name)).await?;
        }
        Ok(())
    }

    /// Best-effort removal of a superseded generation.
    async fn remove_generation(&self, previous: &Manifest, current: &Manifest) {
        for name in previous.artifacts() {
            if current.artifacts().contains(&name) {
                continue;
            }
            if let Err(e) = tokio::fs::remove_file(self.path(name)).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    log::debug!("Could not remove old checkpoint artifact {}: {}", name, e);
                }
            }
        }
    }
}

#[async_trait]
impl StateStorage for CheckpointManager {
    async fn save(&self, state: &AggregationState) -> Result<SaveMetadata> {
        tokio::fs::create_dir_all(&self.root_dir).await?;

        let previous = match self.manifest().await {
            Ok(manifest) => manifest,
            Err(e) => {
                log::warn!("Ignoring unreadable manifest while saving: {}", e);
                None
            }
        };
        let generation = previous.as_ref().map_or(1, |m| m.generation + 1);
        let manifest = Manifest::for_state(state, generation);

        self.write_generation(&manifest, state).await?;
        self.write_atomic(MANIFEST_FILE, &serde_json::to_vec_pretty(&manifest)?)
            .await?;

        if let Some(previous) = &previous {
            self.remove_generation(previous, &manifest).await;
        }

        log::debug!(
            "Checkpoint generation {} saved to {}",
            generation,
            self.root_dir.display()
        );
        Ok(SaveMetadata::from(&manifest))
    }

    async fn load(&self) -> Result<Option<AggregationState>> {
        let Some(manifest) = self.manifest().await? else {
            return Ok(None);
        };

        let political: AggregateStore = self.read_artifact(&manifest.political).await?;
        let geographic: AggregateStore = self.read_artifact(&manifest.geographic).await?;
        let registry: ProcessedInputRegistry = self.read_artifact(&manifest.registry).await?;

        Ok(Some(AggregationState::from_parts(
            manifest.seed,
            political,
            geographic,
            registry,
        )))
    }

    async fn clear(&self) -> Result<()> {
        // Manifest first: once it is gone nothing else is reachable.
        remove_quietly(&self.path(MANIFEST_FILE)).await;

        let mut entries = match tokio::fs::read_dir(&self.root_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(AppError::Io(e)),
        };

        let stems = [POLITICAL_STEM, GEOGRAPHIC_STEM, REGISTRY_STEM, MANIFEST_FILE];
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if stems.iter().any(|stem| name.starts_with(stem)) {
                tokio::fs::remove_file(entry.path()).await?;
            }
        }

        log::info!("Checkpoint cleared at {}", self.root_dir.display());
        Ok(())
    }

    async fn manifest(&self) -> Result<Option<Manifest>> {
        let path = self.path(MANIFEST_FILE);
        let Some(bytes) = self.read_bytes(MANIFEST_FILE).await? else {
            return Ok(None);
        };
        let manifest: Manifest =
            serde_json::from_slice(&bytes).map_err(|e| AppError::checkpoint(&path, e))?;
        if manifest.version != FORMAT_VERSION {
            return Err(AppError::checkpoint(
                &path,
                format!("unsupported format version {}", manifest.version),
            ));
        }
        Ok(Some(manifest))
    }
}

/// Remove a file, ignoring errors. Used on abandoned temp paths.
pub(crate) async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            log::debug!("Could not remove {}: {}", path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::artifact_name;
    use tempfile::TempDir;

    fn sample_state() -> AggregationState {
        let mut state = AggregationState::new();
        let key = state.hasher().pair_key("2013", "USA", "CHN");
        state.political.upsert(key, "2013", "USA", "CHN", 6.0);
        let key = state.hasher().pair_key("2013", "US", "US");
        state.geographic.upsert(key, "2013", "US", "US", -3.5);
        state.registry.insert("20130401.export.CSV");
        state
    }

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let tmp = TempDir::new().unwrap();
        let manager = CheckpointManager::new(tmp.path().join("checkpoint"));
        let state = sample_state();

        let meta = manager.save(&state).await.unwrap();
        assert_eq!(meta.generation, 1);
        assert_eq!(meta.processed_files, 1);

        let loaded = manager.load().await.unwrap().unwrap();
        assert_eq!(loaded, state);
        assert_eq!(loaded.seed(), state.seed());
    }

    #[tokio::test]
    async fn test_load_without_checkpoint() {
        let tmp = TempDir::new().unwrap();
        let manager = CheckpointManager::new(tmp.path());

        assert!(manager.load().await.unwrap().is_none());
        let state = manager.load_or_reset().await.unwrap();
        assert!(state.registry.is_empty());
        assert!(state.political.is_empty());
    }

    #[tokio::test]
    async fn test_generations_replace_previous_files() {
        let tmp = TempDir::new().unwrap();
        let manager = CheckpointManager::new(tmp.path());
        let mut state = sample_state();

        manager.save(&state).await.unwrap();
        state.registry.insert("20130402.export.CSV");
        let meta = manager.save(&state).await.unwrap();

        assert_eq!(meta.generation, 2);
        assert!(!tmp.path().join(artifact_name(POLITICAL_STEM, 1)).exists());
        assert!(tmp.path().join(artifact_name(POLITICAL_STEM, 2)).exists());
        assert_eq!(manager.load().await.unwrap().unwrap().registry.len(), 2);
    }

    #[tokio::test]
    async fn test_interrupted_save_keeps_previous_generation() {
        let tmp = TempDir::new().unwrap();
        let manager = CheckpointManager::new(tmp.path());
        let state = sample_state();
        manager.save(&state).await.unwrap();

        // A crash after staging and partly publishing generation 2
        std::fs::write(tmp.path().join("political.2.json.tmp"), b"{\"trunc").unwrap();
        std::fs::write(tmp.path().join(artifact_name(GEOGRAPHIC_STEM, 2)), b"{}").unwrap();

        let loaded = manager.load().await.unwrap().unwrap();
        assert_eq!(loaded, state);
    }

    #[tokio::test]
    async fn test_corrupt_manifest_is_reset() {
        let tmp = TempDir::new().unwrap();
        let manager = CheckpointManager::new(tmp.path());
        manager.save(&sample_state()).await.unwrap();

        std::fs::write(tmp.path().join(MANIFEST_FILE), b"not json").unwrap();

        assert!(manager.load().await.unwrap_err().is_corruption());
        let state = manager.load_or_reset().await.unwrap();
        assert!(state.registry.is_empty());
        assert!(!tmp.path().join(MANIFEST_FILE).exists());
        assert!(!tmp.path().join(artifact_name(REGISTRY_STEM, 1)).exists());
    }

    #[tokio::test]
    async fn test_missing_artifact_is_corruption() {
        let tmp = TempDir::new().unwrap();
        let manager = CheckpointManager::new(tmp.path());
        manager.save(&sample_state()).await.unwrap();

        std::fs::remove_file(tmp.path().join(artifact_name(REGISTRY_STEM, 1))).unwrap();

        let err = manager.load().await.unwrap_err();
        assert!(matches!(err, AppError::Checkpoint { .. }));
    }

    #[tokio::test]
    async fn test_clear_removes_only_checkpoint_files() {
        let tmp = TempDir::new().unwrap();
        let manager = CheckpointManager::new(tmp.path());
        manager.save(&sample_state()).await.unwrap();
        std::fs::write(tmp.path().join("notes.txt"), b"keep").unwrap();

        manager.clear().await.unwrap();

        assert!(manager.manifest().await.unwrap().is_none());
        assert!(tmp.path().join("notes.txt").exists());
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 1);
    }
}
