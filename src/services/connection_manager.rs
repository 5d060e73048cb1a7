use crate::api::middleware::AppError;
use crate::services::remote::{self, mask_credentials, RemoteSource};
use crate::storage::LocalStore;

/// Owns the two long-lived connections: the remote source and the local store.
///
/// The local store is created with the manager; the remote session is opened
/// on demand, at most once, and both are released together by [`close`].
///
/// [`close`]: ConnectionManager::close
pub struct ConnectionManager {
    descriptor: String,
    remote: Option<Box<dyn RemoteSource>>,
    local: Option<LocalStore>,
}

impl ConnectionManager {
    /// Create the manager and its empty local store
    pub fn new(descriptor: impl Into<String>) -> Result<Self, AppError> {
        let local = LocalStore::open_in_memory().map_err(|e| {
            tracing::error!("Failed to initialize local store: {}", e);
            AppError::Connection(format!("Failed to initialize local store: {}", e))
        })?;

        Ok(Self {
            descriptor: descriptor.into(),
            remote: None,
            local: Some(local),
        })
    }

    /// Create a manager around a remote session that is already open
    pub fn with_remote(remote: Box<dyn RemoteSource>) -> Result<Self, AppError> {
        let mut manager = Self::new(format!("{}:attached", remote.source_type()))?;
        manager.remote = Some(remote);
        Ok(manager)
    }

    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }

    /// Open the remote session unless it is already open.
    ///
    /// May block while the driver authenticates. On failure nothing is kept.
    pub async fn open_remote(&mut self) -> Result<(), AppError> {
        if self.remote.is_some() {
            tracing::debug!("Remote connection already open");
            return Ok(());
        }

        tracing::info!(
            "Attempting to open remote connection: {}",
            mask_credentials(&self.descriptor)
        );
        match remote::connect(&self.descriptor).await {
            Ok(source) => {
                tracing::info!("Remote connection opened ({})", source.source_type());
                self.remote = Some(source);
                Ok(())
            }
            Err(e) => {
                tracing::error!("Failed to open remote connection: {}", e);
                self.remote = None;
                Err(match e {
                    AppError::Connection(_) => e,
                    other => AppError::Connection(other.message().to_string()),
                })
            }
        }
    }

    pub fn is_remote_open(&self) -> bool {
        self.remote.is_some()
    }

    pub fn is_local_open(&self) -> bool {
        self.local.is_some()
    }

    pub fn remote(&self) -> Result<&dyn RemoteSource, AppError> {
        self.remote
            .as_deref()
            .ok_or_else(|| AppError::Connection("Remote connection is not open".to_string()))
    }

    pub fn local(&self) -> Result<&LocalStore, AppError> {
        self.local
            .as_ref()
            .ok_or_else(|| AppError::Connection("Local store is not open".to_string()))
    }

    pub fn local_mut(&mut self) -> Result<&mut LocalStore, AppError> {
        self.local
            .as_mut()
            .ok_or_else(|| AppError::Connection("Local store is not open".to_string()))
    }

    /// Both handles at once, for work that reads remotely and writes locally
    pub fn both(&mut self) -> Result<(&dyn RemoteSource, &mut LocalStore), AppError> {
        let remote = self
            .remote
            .as_deref()
            .ok_or_else(|| AppError::Connection("Remote connection is not open".to_string()))?;
        let local = self
            .local
            .as_mut()
            .ok_or_else(|| AppError::Connection("Local store is not open".to_string()))?;
        Ok((remote, local))
    }

    /// Close and release both connections; safe to call any number of times
    pub async fn close(&mut self) {
        if let Some(remote) = self.remote.take() {
            match remote.close().await {
                Ok(()) => tracing::info!("Remote connection closed"),
                Err(e) => tracing::warn!("Error closing remote connection: {}", e),
            }
        }

        if let Some(local) = self.local.take() {
            match local.close() {
                Ok(()) => tracing::info!("Local store closed"),
                Err(e) => tracing::warn!("Error closing local store: {}", e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_local_store_opens_with_manager() {
        let manager = ConnectionManager::new("sqlite:unused.db").unwrap();
        assert!(manager.is_local_open());
        assert!(!manager.is_remote_open());
        assert!(matches!(manager.remote(), Err(AppError::Connection(_))));
    }

    #[tokio::test]
    async fn test_open_remote_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("remote.db");
        Connection::open(&path).unwrap().execute_batch("CREATE TABLE t (x INTEGER);").unwrap();

        let mut manager = ConnectionManager::new(format!("sqlite:{}", path.display())).unwrap();
        manager.open_remote().await.unwrap();
        assert!(manager.is_remote_open());
        manager.open_remote().await.unwrap();
        assert!(manager.is_remote_open());
    }

    #[tokio::test]
    async fn test_open_remote_failure_leaves_nothing_open() {
        let dir = tempdir().unwrap();
        let descriptor = format!("sqlite:{}", dir.path().join("missing.db").display());
        let mut manager = ConnectionManager::new(descriptor).unwrap();

        assert!(matches!(manager.open_remote().await, Err(AppError::Connection(_))));
        assert!(!manager.is_remote_open());
        assert!(manager.both().is_err());
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let mut manager = ConnectionManager::new("sqlite:never-opened.db").unwrap();
        manager.close().await;
        manager.close().await;
        assert!(!manager.is_local_open());
        assert!(matches!(manager.local(), Err(AppError::Connection(_))));
    }
}
