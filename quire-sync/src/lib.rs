//! # quire-sync
//!
//! Incremental publishing of a rendered site to an object store.
//!
//! Each item's content is fingerprinted the way the store computes its ETag
//! (plain MD5, or the multipart form above 20 MiB), compared with the stored
//! tag, and only uploaded when they differ. The RSS feed is rebuilt only when
//! at least one item was uploaded.
//!
//! Entry point: [`pipeline::publish`] with a backend from
//! [`backends::from_config`].

pub mod backend;
pub mod backends;
pub mod cancel;
pub mod detector;
pub mod enumerate;
pub mod error;
pub mod executor;
pub mod fingerprint;
pub mod lookup;
pub mod pipeline;
pub mod report;
pub mod retry;

pub use backend::{ObjectWritten, RemoteTag, StorageBackend, TagSupport};
pub use cancel::{cancel_pair, CancelHandle, CancelSignal};
pub use detector::{ChangeDetector, ChangeReason, ChangeRecord, Decision};
pub use enumerate::{plan_site, PublishPlan};
pub use error::{PublishError, StorageError, SyncError};
pub use executor::{UploadExecutor, UploadOutcome};
pub use fingerprint::{fingerprint_bytes, fingerprint_file, Fingerprint, MultipartPolicy};
pub use pipeline::{publish, PublishOptions, FEED_KEY};
pub use report::{FeedOutcome, ItemReport, ItemStatus, PublishReport};
pub use retry::RetryPolicy;
