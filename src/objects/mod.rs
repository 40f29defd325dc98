//! Code object materialization
//!
//! Before a stub can reference an uploaded code object, the object has to be
//! present on local disk. The gateway calls [`ObjectMaterializer::materialize`]
//! exactly once per registration attempt.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ObjectError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait ObjectMaterializer: Send + Sync {
    async fn materialize(&self, object_id: &str, workspace_name: &str) -> Result<(), ObjectError>;
}

/// Materializer over a local object directory laid out as
/// `<root>/<workspace>/<object id>`.
///
/// Each archive gets a sibling `<object id>.d` directory that the runtime
/// extracts into.
#[derive(Debug, Clone)]
pub struct FsObjectMaterializer {
    root: PathBuf,
}

impl FsObjectMaterializer {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of an object's archive
    pub fn archive_path(&self, object_id: &str, workspace_name: &str) -> PathBuf {
        self.root.join(workspace_name).join(object_id)
    }

    /// Path of the directory an object is extracted into
    pub fn extract_path(&self, object_id: &str, workspace_name: &str) -> PathBuf {
        self.root
            .join(workspace_name)
            .join(format!("{}.d", object_id))
    }
}

#[async_trait]
impl ObjectMaterializer for FsObjectMaterializer {
    async fn materialize(&self, object_id: &str, workspace_name: &str) -> Result<(), ObjectError> {
        let archive = self.archive_path(object_id, workspace_name);
        if !tokio::fs::try_exists(&archive).await? {
            return Err(ObjectError::NotFound(archive.display().to_string()));
        }

        let target = self.extract_path(object_id, workspace_name);
        tokio::fs::create_dir_all(&target).await?;
        debug!("Materialized object {} into {}", object_id, target.display());
        Ok(())
    }
}
