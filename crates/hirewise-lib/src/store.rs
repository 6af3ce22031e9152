//! Canonical record storage
//!
//! Uploads are stored whole, keyed by id and fingerprint. Reads fall back to
//! the most recent upload containing the requested sheet kind, and an empty
//! store answers every read with an empty result.

use crate::models::{CanonicalRecord, SheetKind, Upload, UploadId, UploadSummary};
use crate::training::write_atomic;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::{debug, info, warn};

/// Storage collaborator for normalized uploads
pub trait RecordStore: Send + Sync {
    /// Id the next inserted upload should carry
    fn next_id(&self) -> Result<UploadId>;

    fn insert_upload(&self, upload: Upload) -> Result<()>;

    fn find_by_fingerprint(&self, fingerprint: &str) -> Result<Option<UploadId>>;

    /// Records of one kind from a specific upload, or from the latest upload
    /// containing that kind when `upload_id` is `None`
    fn records(&self, kind: SheetKind, upload_id: Option<UploadId>) -> Result<Vec<CanonicalRecord>>;

    /// Every record of one kind across all uploads, oldest first
    fn all_records(&self, kind: SheetKind) -> Result<Vec<CanonicalRecord>>;

    fn list_uploads(&self) -> Result<Vec<UploadSummary>>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreState {
    uploads: Vec<Upload>,
}

impl StoreState {
    fn next_id(&self) -> UploadId {
        self.uploads.iter().map(|u| u.id).max().unwrap_or(0) + 1
    }

    fn find_by_fingerprint(&self, fingerprint: &str) -> Option<UploadId> {
        self.uploads
            .iter()
            .find(|u| u.fingerprint == fingerprint)
            .map(|u| u.id)
    }

    fn records(&self, kind: SheetKind, upload_id: Option<UploadId>) -> Vec<CanonicalRecord> {
        let upload = match upload_id {
            Some(id) => self.uploads.iter().find(|u| u.id == id),
            None => self.uploads.iter().rev().find(|u| u.has_kind(kind)),
        };
        upload
            .and_then(|u| u.batch(kind))
            .map(|b| b.records.clone())
            .unwrap_or_default()
    }

    fn all_records(&self, kind: SheetKind) -> Vec<CanonicalRecord> {
        self.uploads
            .iter()
            .filter_map(|u| u.batch(kind))
            .flat_map(|b| b.records.iter().cloned())
            .collect()
    }

    fn summaries(&self) -> Vec<UploadSummary> {
        self.uploads.iter().map(UploadSummary::from).collect()
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> anyhow::Error {
    anyhow::anyhow!("Record store lock poisoned: {}", e)
}

/// Record store held entirely in memory
#[derive(Default)]
pub struct MemoryRecordStore {
    state: RwLock<StoreState>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStore for MemoryRecordStore {
    fn next_id(&self) -> Result<UploadId> {
        Ok(self.state.read().map_err(poisoned)?.next_id())
    }

    fn insert_upload(&self, upload: Upload) -> Result<()> {
        self.state.write().map_err(poisoned)?.uploads.push(upload);
        Ok(())
    }

    fn find_by_fingerprint(&self, fingerprint: &str) -> Result<Option<UploadId>> {
        Ok(self.state.read().map_err(poisoned)?.find_by_fingerprint(fingerprint))
    }

    fn records(&self, kind: SheetKind, upload_id: Option<UploadId>) -> Result<Vec<CanonicalRecord>> {
        Ok(self.state.read().map_err(poisoned)?.records(kind, upload_id))
    }

    fn all_records(&self, kind: SheetKind) -> Result<Vec<CanonicalRecord>> {
        Ok(self.state.read().map_err(poisoned)?.all_records(kind))
    }

    fn list_uploads(&self) -> Result<Vec<UploadSummary>> {
        Ok(self.state.read().map_err(poisoned)?.summaries())
    }
}

/// Record store persisted as a single JSON document
///
/// The document is rewritten atomically on every insert. An unreadable
/// document at open time is an error rather than silently discarded data.
pub struct JsonRecordStore {
    path: PathBuf,
    state: RwLock<StoreState>,
}

impl JsonRecordStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let state = if path.exists() {
            let text = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read record store {:?}", path))?;
            let state: StoreState = serde_json::from_str(&text)
                .with_context(|| format!("Failed to parse record store {:?}", path))?;
            info!(
                path = %path.display(),
                uploads = state.uploads.len(),
                "Loaded record store"
            );
            state
        } else {
            debug!(path = %path.display(), "No record store on disk, starting empty");
            StoreState::default()
        };

        Ok(Self {
            path,
            state: RwLock::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, state: &StoreState) -> Result<()> {
        let text = serde_json::to_vec(state).context("Failed to serialize record store")?;
        write_atomic(&self.path, &text)
    }
}

impl RecordStore for JsonRecordStore {
    fn next_id(&self) -> Result<UploadId> {
        Ok(self.state.read().map_err(poisoned)?.next_id())
    }

    fn insert_upload(&self, upload: Upload) -> Result<()> {
        let mut state = self.state.write().map_err(poisoned)?;
        let id = upload.id;
        state.uploads.push(upload);
        if let Err(e) = self.persist(&state) {
            // Keep memory and disk in agreement
            state.uploads.pop();
            warn!(upload_id = id, error = %e, "Failed to persist upload");
            return Err(e);
        }
        Ok(())
    }

    fn find_by_fingerprint(&self, fingerprint: &str) -> Result<Option<UploadId>> {
        Ok(self.state.read().map_err(poisoned)?.find_by_fingerprint(fingerprint))
    }

    fn records(&self, kind: SheetKind, upload_id: Option<UploadId>) -> Result<Vec<CanonicalRecord>> {
        Ok(self.state.read().map_err(poisoned)?.records(kind, upload_id))
    }

    fn all_records(&self, kind: SheetKind) -> Result<Vec<CanonicalRecord>> {
        Ok(self.state.read().map_err(poisoned)?.all_records(kind))
    }

    fn list_uploads(&self) -> Result<Vec<UploadSummary>> {
        Ok(self.state.read().map_err(poisoned)?.summaries())
    }
}
