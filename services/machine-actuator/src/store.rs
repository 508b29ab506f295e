//! Persistence of machine status back to the resource store.

use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use capg_api::Machine;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The stored machine is not the one being written.
    #[error("conflict: {0}")]
    Conflict(String),
}

/// Where machine status updates are written.
#[async_trait]
pub trait MachineStore: Send + Sync {
    /// Persist the status of `machine`.
    async fn update_status(&self, machine: &Machine) -> Result<(), StoreError>;
}

/// Machines held in memory, keyed by `(namespace, name)`.
#[derive(Debug, Default)]
pub struct InMemoryMachineStore {
    machines: Mutex<BTreeMap<(String, String), Machine>>,
    writes: Mutex<usize>,
}

impl InMemoryMachineStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, namespace: &str, name: &str) -> Option<Machine> {
        self.machines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    /// Number of status writes so far.
    pub fn write_count(&self) -> usize {
        *self.writes.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl MachineStore for InMemoryMachineStore {
    async fn update_status(&self, machine: &Machine) -> Result<(), StoreError> {
        self.machines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                (machine.namespace().to_string(), machine.name().to_string()),
                machine.clone(),
            );
        *self.writes.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        Ok(())
    }
}

/// A single machine manifest stored as a JSON file.
///
/// Writes go to a temp file that is then renamed over the manifest.
#[derive(Debug, Clone)]
pub struct FileMachineStore {
    path: PathBuf,
}

impl FileMachineStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub async fn load(&self) -> Result<Machine, StoreError> {
        let content = tokio::fs::read(&self.path).await?;
        Ok(serde_json::from_slice(&content)?)
    }
}

#[async_trait]
impl MachineStore for FileMachineStore {
    async fn update_status(&self, machine: &Machine) -> Result<(), StoreError> {
        let mut stored = self.load().await?;
        if stored.metadata != machine.metadata {
            return Err(StoreError::Conflict(format!(
                "{} holds machine {}/{}, not {}/{}",
                self.path.display(),
                stored.namespace(),
                stored.name(),
                machine.namespace(),
                machine.name()
            )));
        }
        stored.status = machine.status.clone();

        let tmp_path = self.path.with_extension("tmp");
        let content = serde_json::to_vec_pretty(&stored)?;
        tokio::fs::write(&tmp_path, &content).await?;
        tokio::fs::rename(&tmp_path, &self.path).await?;

        debug!(path = %self.path.display(), machine = %machine.name(), "Persisted machine status");
        Ok(())
    }
}
