//! Concrete storage backends and backend selection.

pub mod filesystem;
pub mod memory;
pub mod s3;

use std::sync::Arc;

use quire_core::{SiteConfig, StorageTarget};

use crate::backend::StorageBackend;
use crate::error::PublishError;

pub use filesystem::FilesystemBackend;
pub use memory::MemoryBackend;
pub use s3::S3Backend;

/// Backend for a configuration: a bucket selects S3, otherwise the local
/// mirror at `out_dir`.
pub async fn from_config(config: &SiteConfig) -> Result<Arc<dyn StorageBackend>, PublishError> {
    match config.storage_target()? {
        StorageTarget::S3 {
            bucket,
            region,
            endpoint,
            prefix,
            access_key_id,
            secret_access_key,
            force_path_style,
        } => {
            let credentials = access_key_id.zip(secret_access_key);
            let backend = S3Backend::new(
                &bucket,
                &region,
                endpoint,
                prefix,
                credentials,
                force_path_style,
                config.publish.call_timeout(),
            )
            .await
            .map_err(PublishError::Backend)?;
            tracing::info!(bucket = %bucket, region = %region, "publishing to S3");
            Ok(Arc::new(backend))
        }
        StorageTarget::Filesystem { out_dir } => {
            tracing::info!(out_dir = %out_dir.display(), "publishing to local directory");
            Ok(Arc::new(FilesystemBackend::new(out_dir)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[tokio::test]
    async fn no_bucket_selects_filesystem() {
        let config = SiteConfig {
            out_dir: Some(PathBuf::from("public")),
            publish: Default::default(),
            ..SiteConfig::default()
        };
        let backend = from_config(&config).await.unwrap();
        assert_eq!(backend.name(), "filesystem");
    }

    #[tokio::test]
    async fn invalid_config_is_rejected() {
        let config = SiteConfig::default();
        assert!(matches!(
            from_config(&config).await,
            Err(PublishError::Config(_))
        ));
    }
}
