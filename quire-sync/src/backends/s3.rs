//! S3-compatible object store backend.
//!
//! Objects are written publicly readable with their content type. Bodies
//! above the multipart threshold are uploaded in parts of
//! [`MultipartPolicy::STANDARD`]'s part size, so the stored ETag equals the
//! local multipart fingerprint. Redirect aliases are empty objects carrying
//! `x-amz-website-redirect-location`.
//!
//! Every request is bounded by the backend's request timeout. A multipart
//! upload that fails, times out or is dropped mid-flight is aborted.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart, ObjectCannedAcl};
use aws_sdk_s3::Client;
use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::instrument;

use quire_core::types::TEXT_HTML;
use quire_core::DestinationKey;

use crate::backend::{ObjectWritten, StorageBackend, TagSupport};
use crate::error::{io_err, StorageError};
use crate::fingerprint::{Fingerprint, MultipartPolicy};

/// Status codes worth another attempt.
fn status_is_transient(status: u16) -> bool {
    status == 408 || status == 429 || status >= 500
}

fn map_sdk_error<E>(err: SdkError<E>, key: &str) -> StorageError
where
    E: std::error::Error + Send + Sync + 'static,
{
    let transient = match &err {
        SdkError::ServiceError(service_err) => {
            let status = service_err.raw().status().as_u16();
            if status == 404 {
                return StorageError::NotFound(key.to_string());
            }
            status_is_transient(status)
        }
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => true,
        _ => false,
    };
    StorageError::Remote {
        message: format!("{key}: {}", DisplayErrorContext(&err)),
        transient,
    }
}

/// One SDK request, bounded by `limit`.
async fn bounded<T, E, Fut>(limit: Duration, key: &str, request: Fut) -> Result<T, StorageError>
where
    Fut: Future<Output = Result<T, SdkError<E>>>,
    E: std::error::Error + Send + Sync + 'static,
{
    match tokio::time::timeout(limit, request).await {
        Ok(result) => result.map_err(|e| map_sdk_error(e, key)),
        Err(_) => Err(StorageError::Timeout(limit)),
    }
}

type AbortFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Aborts a multipart upload unless disarmed.
///
/// Dropped while armed (the upload future was cancelled or timed out), it
/// spawns the abort on the current runtime.
struct AbortGuard {
    abort: Option<AbortFuture>,
}

impl AbortGuard {
    fn new(abort: impl Future<Output = ()> + Send + 'static) -> Self {
        Self {
            abort: Some(Box::pin(abort)),
        }
    }

    fn disarm(&mut self) {
        self.abort = None;
    }

    async fn abort_now(mut self) {
        if let Some(abort) = self.abort.take() {
            abort.await;
        }
    }
}

impl Drop for AbortGuard {
    fn drop(&mut self) {
        let Some(abort) = self.abort.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(abort);
            }
            Err(_) => {
                tracing::warn!("no runtime to abort multipart upload; orphaned parts may remain");
            }
        }
    }
}

fn normalize_prefix(prefix: Option<String>) -> Option<String> {
    prefix
        .map(|p| p.trim_matches('/').to_string())
        .filter(|p| !p.is_empty())
}

/// Object key in the bucket, with the configured prefix.
fn object_key(prefix: Option<&str>, key: &DestinationKey) -> String {
    match prefix {
        Some(prefix) => format!("{prefix}/{key}"),
        None => key.to_string(),
    }
}

pub struct S3Backend {
    client: Client,
    bucket: String,
    prefix: Option<String>,
    policy: MultipartPolicy,
    request_timeout: Duration,
}

impl std::fmt::Debug for S3Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Backend")
            .field("bucket", &self.bucket)
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

impl S3Backend {
    /// Build a client for `bucket`.
    ///
    /// Explicit credentials must come as a pair; without them the ambient AWS
    /// credential chain is used. `force_path_style` is needed by MinIO and
    /// similar stores. `request_timeout` bounds each request, including each
    /// part of a multipart upload.
    pub async fn new(
        bucket: &str,
        region: &str,
        endpoint: Option<String>,
        prefix: Option<String>,
        credentials: Option<(String, String)>,
        force_path_style: bool,
        request_timeout: Duration,
    ) -> Result<Self, StorageError> {
        let region = aws_config::Region::new(region.to_string());
        let mut builder = match credentials {
            Some((key_id, secret)) => aws_sdk_s3::config::Builder::new()
                .behavior_version(BehaviorVersion::latest())
                .region(region)
                .credentials_provider(aws_sdk_s3::config::Credentials::new(
                    key_id,
                    secret,
                    None,
                    None,
                    "quire-config",
                )),
            None => {
                let shared = aws_config::defaults(BehaviorVersion::latest())
                    .region(region)
                    .load()
                    .await;
                aws_sdk_s3::config::Builder::from(&shared)
            }
        };

        if let Some(endpoint) = endpoint {
            let lower = endpoint.to_ascii_lowercase();
            let url = if lower.starts_with("http://") || lower.starts_with("https://") {
                endpoint
            } else {
                format!("http://{endpoint}")
            };
            builder = builder.endpoint_url(url);
        }
        if force_path_style {
            builder = builder.force_path_style(true);
        }

        Ok(Self {
            client: Client::from_conf(builder.build()),
            bucket: bucket.to_string(),
            prefix: normalize_prefix(prefix),
            policy: MultipartPolicy::STANDARD,
            request_timeout,
        })
    }

    fn full_key(&self, key: &DestinationKey) -> String {
        object_key(self.prefix.as_deref(), key)
    }

    async fn put_single(
        &self,
        full_key: &str,
        body: ByteStream,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(full_key)
            .acl(ObjectCannedAcl::PublicRead)
            .content_type(content_type)
            .body(body)
            .send();
        bounded(self.request_timeout, full_key, request).await?;
        Ok(())
    }

    fn abort_guard(&self, full_key: &str, upload_id: &str) -> AbortGuard {
        let client = self.client.clone();
        let bucket = self.bucket.clone();
        let key = full_key.to_string();
        let upload_id = upload_id.to_string();
        let limit = self.request_timeout;
        AbortGuard::new(async move {
            let request = client
                .abort_multipart_upload()
                .bucket(&bucket)
                .key(&key)
                .upload_id(&upload_id)
                .send();
            match bounded(limit, &key, request).await {
                Ok(_) => tracing::debug!(key = %key, upload_id = %upload_id, "multipart upload aborted"),
                Err(err) => tracing::warn!(
                    key = %key,
                    upload_id = %upload_id,
                    error = %err,
                    "failed to abort multipart upload; orphaned parts may remain"
                ),
            }
        })
    }

    /// Multipart upload from `reader`. A failure aborts the upload at once; a
    /// drop mid-flight aborts it in the background.
    async fn put_multipart<R>(
        &self,
        full_key: &str,
        reader: R,
        content_type: &str,
    ) -> Result<u64, StorageError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let request = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(full_key)
            .acl(ObjectCannedAcl::PublicRead)
            .content_type(content_type)
            .send();
        let created = bounded(self.request_timeout, full_key, request).await?;
        let upload_id = created
            .upload_id()
            .ok_or_else(|| StorageError::Remote {
                message: format!("{full_key}: store returned no upload id"),
                transient: false,
            })?
            .to_string();

        let mut guard = self.abort_guard(full_key, &upload_id);
        match self.upload_parts(full_key, &upload_id, reader).await {
            Ok(total) => {
                guard.disarm();
                Ok(total)
            }
            Err(err) => {
                guard.abort_now().await;
                Err(err)
            }
        }
    }

    async fn upload_parts<R>(
        &self,
        full_key: &str,
        upload_id: &str,
        mut reader: R,
    ) -> Result<u64, StorageError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let part_size = self.policy.part_size as usize;
        let mut parts = Vec::new();
        let mut total = 0u64;
        let mut part_number = 1;

        loop {
            let mut buf = Vec::with_capacity(part_size);
            (&mut reader)
                .take(part_size as u64)
                .read_to_end(&mut buf)
                .await
                .map_err(|e| io_err(full_key, e))?;
            if buf.is_empty() {
                break;
            }
            let filled = buf.len();
            total += filled as u64;

            let request = self
                .client
                .upload_part()
                .bucket(&self.bucket)
                .key(full_key)
                .upload_id(upload_id)
                .part_number(part_number)
                .body(ByteStream::from(Bytes::from(buf)))
                .send();
            let uploaded = bounded(self.request_timeout, full_key, request).await?;
            parts.push(
                CompletedPart::builder()
                    .e_tag(uploaded.e_tag().unwrap_or_default())
                    .part_number(part_number)
                    .build(),
            );
            part_number += 1;

            if filled < part_size {
                break;
            }
        }

        let request = self
            .client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(full_key)
            .upload_id(upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(parts))
                    .build(),
            )
            .send();
        bounded(self.request_timeout, full_key, request).await?;
        Ok(total)
    }
}

#[async_trait]
impl StorageBackend for S3Backend {
    fn name(&self) -> &'static str {
        "s3"
    }

    fn tag_support(&self) -> TagSupport {
        TagSupport::Supported
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn lookup_tag(&self, key: &DestinationKey) -> Result<Option<Fingerprint>, StorageError> {
        let full_key = self.full_key(key);
        let request = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(&full_key)
            .send();
        match bounded(self.request_timeout, &full_key, request).await {
            Ok(head) => match head.e_tag() {
                Some(etag) => Ok(Some(Fingerprint::from_etag(etag))),
                None => Err(StorageError::Remote {
                    message: format!("{full_key}: object has no ETag"),
                    transient: false,
                }),
            },
            Err(StorageError::NotFound(_)) => Ok(None),
            Err(other) => Err(other),
        }
    }

    #[instrument(skip(self, body), fields(backend = "s3", size = body.len()))]
    async fn put_text(
        &self,
        key: &DestinationKey,
        body: &str,
        content_type: &str,
    ) -> Result<ObjectWritten, StorageError> {
        let full_key = self.full_key(key);
        let len = body.len() as u64;
        if self.policy.is_multipart(len) {
            self.put_multipart(&full_key, body.as_bytes(), content_type)
                .await?;
        } else {
            let bytes = Bytes::copy_from_slice(body.as_bytes());
            self.put_single(&full_key, ByteStream::from(bytes), content_type)
                .await?;
        }
        Ok(ObjectWritten {
            key: key.clone(),
            content_type: content_type.to_string(),
            bytes: len,
        })
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn put_file(
        &self,
        key: &DestinationKey,
        path: &Path,
        content_type: &str,
    ) -> Result<ObjectWritten, StorageError> {
        let full_key = self.full_key(key);
        let len = tokio::fs::metadata(path)
            .await
            .map_err(|e| io_err(path, e))?
            .len();

        let bytes = if self.policy.is_multipart(len) {
            let file = tokio::fs::File::open(path)
                .await
                .map_err(|e| io_err(path, e))?;
            self.put_multipart(&full_key, file, content_type).await?
        } else {
            let body = ByteStream::from_path(path).await.map_err(|e| StorageError::Remote {
                message: format!("{}: {e}", path.display()),
                transient: false,
            })?;
            self.put_single(&full_key, body, content_type).await?;
            len
        };
        Ok(ObjectWritten {
            key: key.clone(),
            content_type: content_type.to_string(),
            bytes,
        })
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn put_redirect(
        &self,
        key: &DestinationKey,
        location: &str,
    ) -> Result<ObjectWritten, StorageError> {
        let full_key = self.full_key(key);
        let request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(&full_key)
            .acl(ObjectCannedAcl::PublicRead)
            .content_type(TEXT_HTML)
            .website_redirect_location(location)
            .body(ByteStream::from(Bytes::new()))
            .send();
        bounded(self.request_timeout, &full_key, request).await?;
        Ok(ObjectWritten {
            key: key.clone(),
            content_type: TEXT_HTML.to_string(),
            bytes: 0,
        })
    }
}
