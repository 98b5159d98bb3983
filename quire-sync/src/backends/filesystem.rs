//! Local directory mirror.
//!
//! Writes every object below `out_dir`, creating parent directories. Each
//! write goes to `<path>.quire.tmp` first and is renamed into place, so a
//! reader never sees a half-written page. The directory keeps no content
//! tags, so every run rewrites everything.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::instrument;

use quire_core::DestinationKey;

use crate::backend::{ObjectWritten, StorageBackend, TagSupport};
use crate::error::{io_err, StorageError};
use crate::fingerprint::Fingerprint;

pub struct FilesystemBackend {
    root: PathBuf,
}

impl FilesystemBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path of `key` below the root. Only plain segments are accepted.
    fn key_path(&self, key: &DestinationKey) -> Result<PathBuf, StorageError> {
        for component in Path::new(key.as_str()).components() {
            if !matches!(component, Component::Normal(_)) {
                return Err(StorageError::InvalidKey(format!(
                    "unsafe path component in {key}"
                )));
            }
        }
        Ok(self.root.join(key.as_str()))
    }

    async fn ensure_parent(path: &Path) -> Result<(), StorageError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| io_err(parent, e))?;
        }
        Ok(())
    }

    /// Write `bytes` to `path` via a sibling temp file and a rename.
    async fn atomic_write(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
        Self::ensure_parent(path).await?;
        let tmp = tmp_path(path);
        if let Err(e) = fs::write(&tmp, bytes).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(io_err(&tmp, e));
        }
        if let Err(e) = fs::rename(&tmp, path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(io_err(path, e));
        }
        Ok(())
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    PathBuf::from(format!("{}.quire.tmp", path.display()))
}

/// Static stand-in for a store-side redirect.
fn redirect_page(location: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html><head><meta http-equiv=\"refresh\" content=\"0; url={location}\">\
         <link rel=\"canonical\" href=\"{location}\"></head><body></body></html>\n"
    )
}

#[async_trait]
impl StorageBackend for FilesystemBackend {
    fn name(&self) -> &'static str {
        "filesystem"
    }

    fn tag_support(&self) -> TagSupport {
        TagSupport::Unsupported
    }

    async fn lookup_tag(&self, _key: &DestinationKey) -> Result<Option<Fingerprint>, StorageError> {
        Ok(None)
    }

    #[instrument(skip(self, body), fields(backend = "filesystem"))]
    async fn put_text(
        &self,
        key: &DestinationKey,
        body: &str,
        content_type: &str,
    ) -> Result<ObjectWritten, StorageError> {
        let path = self.key_path(key)?;
        Self::atomic_write(&path, body.as_bytes()).await?;
        tracing::debug!("wrote: {}", path.display());
        Ok(ObjectWritten {
            key: key.clone(),
            content_type: content_type.to_string(),
            bytes: body.len() as u64,
        })
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn put_file(
        &self,
        key: &DestinationKey,
        source: &Path,
        content_type: &str,
    ) -> Result<ObjectWritten, StorageError> {
        let path = self.key_path(key)?;
        Self::ensure_parent(&path).await?;
        let tmp = tmp_path(&path);
        let bytes = match fs::copy(source, &tmp).await {
            Ok(n) => n,
            Err(e) => {
                let _ = fs::remove_file(&tmp).await;
                return Err(io_err(source, e));
            }
        };
        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(io_err(&path, e));
        }
        tracing::debug!("wrote: {}", path.display());
        Ok(ObjectWritten {
            key: key.clone(),
            content_type: content_type.to_string(),
            bytes,
        })
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn put_redirect(
        &self,
        key: &DestinationKey,
        location: &str,
    ) -> Result<ObjectWritten, StorageError> {
        let path = self.key_path(key)?;
        let page = redirect_page(location);
        Self::atomic_write(&path, page.as_bytes()).await?;
        Ok(ObjectWritten {
            key: key.clone(),
            content_type: quire_core::types::TEXT_HTML.to_string(),
            bytes: page.len() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn key(s: &str) -> DestinationKey {
        DestinationKey::parse(s).unwrap()
    }

    #[tokio::test]
    async fn text_is_written_below_root_with_parents() {
        let dir = TempDir::new().unwrap();
        let backend = FilesystemBackend::new(dir.path());
        let w = backend
            .put_text(&key("posts/a.html"), "<p>a</p>", "text/html")
            .await
            .unwrap();
        assert_eq!(w.bytes, 8);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("posts/a.html")).unwrap(),
            "<p>a</p>"
        );
        assert!(!dir.path().join("posts/a.html.quire.tmp").exists());
    }

    #[tokio::test]
    async fn overwrite_replaces_content() {
        let dir = TempDir::new().unwrap();
        let backend = FilesystemBackend::new(dir.path());
        backend.put_text(&key("index.html"), "one", "text/html").await.unwrap();
        backend.put_text(&key("index.html"), "two", "text/html").await.unwrap();
        assert_eq!(std::fs::read_to_string(dir.path().join("index.html")).unwrap(), "two");
    }

    #[tokio::test]
    async fn file_is_copied_byte_for_byte() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src.png");
        std::fs::write(&src, [0u8, 159, 146, 150]).unwrap();
        let out = dir.path().join("out");
        let backend = FilesystemBackend::new(&out);
        let w = backend.put_file(&key("css/x.png"), &src, "image/png").await.unwrap();
        assert_eq!(w.bytes, 4);
        assert_eq!(std::fs::read(out.join("css/x.png")).unwrap(), vec![0u8, 159, 146, 150]);
    }

    #[tokio::test]
    async fn redirect_is_a_refresh_page() {
        let dir = TempDir::new().unwrap();
        let backend = FilesystemBackend::new(dir.path());
        backend
            .put_redirect(&key("t/posts/a.html"), "/posts/a.html")
            .await
            .unwrap();
        let page = std::fs::read_to_string(dir.path().join("t/posts/a.html")).unwrap();
        assert!(page.contains("url=/posts/a.html"));
    }

    #[tokio::test]
    async fn never_reports_a_tag() {
        let dir = TempDir::new().unwrap();
        let backend = FilesystemBackend::new(dir.path());
        backend.put_text(&key("index.html"), "x", "text/html").await.unwrap();
        assert_eq!(backend.lookup_tag(&key("index.html")).await.unwrap(), None);
        assert_eq!(backend.tag_support(), TagSupport::Unsupported);
    }
}
