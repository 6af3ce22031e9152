//! Model bundle persistence
//!
//! A bundle is one JSON envelope holding the serialized model set and a
//! SHA-256 checksum of it. Files are replaced with a single atomic rename so
//! models and encoders are always written together.

use super::orchestrator::TrainedModelSet;
use crate::error::BundleError;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

pub const BUNDLE_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct BundleEnvelope {
    format_version: u32,
    checksum: String,
    payload: String,
}

/// Storage collaborator for the trained model set
pub trait BundleStore: Send + Sync {
    fn save(&self, bundle: &TrainedModelSet) -> Result<(), BundleError>;

    /// `Ok(None)` when nothing has been saved yet
    fn load(&self) -> Result<Option<TrainedModelSet>, BundleError>;
}

/// Serialize a model set into its checksummed envelope
pub fn encode_bundle(bundle: &TrainedModelSet) -> Result<String, BundleError> {
    let payload = serde_json::to_string(bundle)
        .map_err(|e| BundleError::Corrupt(format!("failed to serialize bundle: {}", e)))?;
    let envelope = BundleEnvelope {
        format_version: BUNDLE_FORMAT_VERSION,
        checksum: compute_checksum(payload.as_bytes()),
        payload,
    };
    serde_json::to_string(&envelope)
        .map_err(|e| BundleError::Corrupt(format!("failed to serialize envelope: {}", e)))
}

/// Verify and deserialize an envelope
pub fn decode_bundle(text: &str) -> Result<TrainedModelSet, BundleError> {
    let envelope: BundleEnvelope =
        serde_json::from_str(text).map_err(|e| BundleError::Corrupt(e.to_string()))?;
    if envelope.format_version != BUNDLE_FORMAT_VERSION {
        return Err(BundleError::UnsupportedVersion(envelope.format_version));
    }

    let actual = compute_checksum(envelope.payload.as_bytes());
    if actual != envelope.checksum {
        return Err(BundleError::ChecksumMismatch {
            expected: envelope.checksum,
            actual,
        });
    }

    serde_json::from_str(&envelope.payload).map_err(|e| BundleError::Corrupt(e.to_string()))
}

fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Bundle persisted as one file on disk
pub struct FileBundleStore {
    path: PathBuf,
}

impl FileBundleStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BundleStore for FileBundleStore {
    fn save(&self, bundle: &TrainedModelSet) -> Result<(), BundleError> {
        let text = encode_bundle(bundle)?;
        write_atomic(&self.path, text.as_bytes()).map_err(BundleError::Io)?;
        info!(
            path = %self.path.display(),
            version = bundle.version,
            bytes = text.len(),
            "Model bundle saved"
        );
        Ok(())
    }

    fn load(&self) -> Result<Option<TrainedModelSet>, BundleError> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "No model bundle on disk");
            return Ok(None);
        }
        let text = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read bundle {:?}", self.path))
            .map_err(BundleError::Io)?;
        decode_bundle(&text).map(Some)
    }
}

/// Write to a temp file, fsync, then rename over the target
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {:?}", parent))?;
    }

    let temp_path = path.with_extension("tmp");
    let mut file = File::create(&temp_path)
        .with_context(|| format!("Failed to create temp file {:?}", temp_path))?;
    file.write_all(bytes).context("Failed to write temp file")?;
    file.sync_all().context("Failed to sync temp file")?;

    fs::rename(&temp_path, path)
        .with_context(|| format!("Failed to rename {:?} to {:?}", temp_path, path))?;
    Ok(())
}

/// In-memory bundle store, keeping the encoded envelope
#[derive(Default)]
pub struct MemoryBundleStore {
    slot: Mutex<Option<String>>,
}

impl MemoryBundleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BundleStore for MemoryBundleStore {
    fn save(&self, bundle: &TrainedModelSet) -> Result<(), BundleError> {
        let text = encode_bundle(bundle)?;
        let mut slot = self
            .slot
            .lock()
            .map_err(|e| BundleError::Io(anyhow::anyhow!("Lock poisoned: {}", e)))?;
        *slot = Some(text);
        Ok(())
    }

    fn load(&self) -> Result<Option<TrainedModelSet>, BundleError> {
        let slot = self
            .slot
            .lock()
            .map_err(|e| BundleError::Io(anyhow::anyhow!("Lock poisoned: {}", e)))?;
        slot.as_deref().map(decode_bundle).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_bundle() -> TrainedModelSet {
        TrainedModelSet {
            version: 4,
            is_trained: true,
            ..TrainedModelSet::empty()
        }
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempdir().unwrap();
        let store = FileBundleStore::new(dir.path().join("nested").join("models.json"));

        assert!(store.load().unwrap().is_none());
        store.save(&sample_bundle()).unwrap();
        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded, sample_bundle());
        assert!(!store.path().with_extension("tmp").exists());
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("models.json");
        fs::write(&path, "{ not json").unwrap();
        let err = FileBundleStore::new(&path).load().unwrap_err();
        assert!(matches!(err, BundleError::Corrupt(_)));
    }

    #[test]
    fn test_tampered_payload_fails_checksum() {
        let text = encode_bundle(&sample_bundle()).unwrap();
        let tampered = text.replace(r#"\"version\":4"#, r#"\"version\":5"#);
        assert_ne!(text, tampered);
        let err = decode_bundle(&tampered).unwrap_err();
        assert!(matches!(err, BundleError::ChecksumMismatch { .. }));
    }

    #[test]
    fn test_unknown_format_version_is_rejected() {
        let envelope = r#"{"format_version": 99, "checksum": "", "payload": ""}"#;
        assert!(matches!(
            decode_bundle(envelope).unwrap_err(),
            BundleError::UnsupportedVersion(99)
        ));
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryBundleStore::new();
        assert!(store.load().unwrap().is_none());
        store.save(&sample_bundle()).unwrap();
        assert_eq!(store.load().unwrap().unwrap().version, 4);
    }
}
