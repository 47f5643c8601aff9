use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use tilt_core::PeerId;
use tokio::sync::OnceCell;
use tracing::info;

use crate::session::SessionError;

/// Source of the local peer id. The first read generates and persists one;
/// every later read returns the same id.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn peer_id(&self) -> Result<PeerId, SessionError>;
}

/// Keeps the id for the lifetime of the process only.
#[derive(Default)]
pub struct MemoryIdentityStore {
    id: OnceCell<PeerId>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(id: PeerId) -> Self {
        Self {
            id: OnceCell::new_with(Some(id)),
        }
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn peer_id(&self) -> Result<PeerId, SessionError> {
        Ok(self
            .id
            .get_or_init(|| async { PeerId::generate() })
            .await
            .clone())
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredIdentity {
    peer_id: PeerId,
}

/// Persists the id as a one-key JSON document.
pub struct FileIdentityStore {
    path: PathBuf,
    id: OnceCell<PeerId>,
}

impl FileIdentityStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            id: OnceCell::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load_or_create(&self) -> Result<PeerId, SessionError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => {
                let stored: StoredIdentity = serde_json::from_str(&text).map_err(|e| {
                    SessionError::Identity(format!("{}: {e}", self.path.display()))
                })?;
                Ok(stored.peer_id)
            }
            Err(e) if e.kind() == IoErrorKind::NotFound => {
                let peer_id = PeerId::generate();
                self.persist(&peer_id).await?;
                info!("Generated local peer id {}", peer_id);
                Ok(peer_id)
            }
            Err(e) => Err(SessionError::Identity(format!(
                "{}: {e}",
                self.path.display()
            ))),
        }
    }

    async fn persist(&self, peer_id: &PeerId) -> Result<(), SessionError> {
        let io_err = |e: std::io::Error| SessionError::Identity(format!("{}: {e}", self.path.display()));

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        let json = serde_json::to_string(&StoredIdentity {
            peer_id: peer_id.clone(),
        })
        .map_err(|e| SessionError::Identity(e.to_string()))?;
        tokio::fs::write(&self.path, json).await.map_err(io_err)
    }
}

#[async_trait]
impl IdentityStore for FileIdentityStore {
    async fn peer_id(&self) -> Result<PeerId, SessionError> {
        self.id
            .get_or_try_init(|| self.load_or_create())
            .await
            .cloned()
    }
}
