//! Content fingerprints that match the object store's ETag.
//!
//! The store tags a single-request upload with the hex MD5 of its body. An
//! object uploaded in parts instead gets the hex MD5 of the concatenated raw
//! part digests, suffixed with `-<part count>`. We upload anything above
//! [`MultipartPolicy::STANDARD`]'s threshold in parts of its part size, so
//! the same policy must drive the local fingerprint.
//!
//! Changing [`PART_SIZE`] makes every fingerprint of a large object differ
//! from the tag stored by earlier runs; the next run re-uploads all of them.

use std::fmt;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};

use md5::{Digest, Md5};

use crate::error::SyncError;

const MIB: u64 = 1024 * 1024;

/// Bodies strictly larger than this are uploaded in parts.
pub const MULTIPART_THRESHOLD: u64 = 20 * MIB;

/// Size of every part except possibly the last.
pub const PART_SIZE: u64 = 6 * MIB;

const READ_CHUNK: usize = 64 * 1024;

/// When and how a body is split into parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MultipartPolicy {
    pub threshold: u64,
    pub part_size: u64,
}

impl MultipartPolicy {
    /// The policy shared by the fingerprint engine and the S3 uploader.
    pub const STANDARD: MultipartPolicy = MultipartPolicy {
        threshold: MULTIPART_THRESHOLD,
        part_size: PART_SIZE,
    };

    pub fn is_multipart(&self, len: u64) -> bool {
        len > self.threshold
    }

    pub fn part_count(&self, len: u64) -> u64 {
        len.div_ceil(self.part_size)
    }
}

impl Default for MultipartPolicy {
    fn default() -> Self {
        Self::STANDARD
    }
}

/// Content identity token, comparable with a stored ETag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Normalise a raw ETag header value: surrounding quotes and a weak
    /// validator prefix are dropped.
    pub fn from_etag(raw: &str) -> Self {
        let raw = raw.trim();
        let raw = raw.strip_prefix("W/").unwrap_or(raw);
        Self(raw.trim_matches('"').to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number of parts for a multipart fingerprint, `None` for a plain digest.
    pub fn part_count(&self) -> Option<u64> {
        let (_, count) = self.0.rsplit_once('-')?;
        count.parse().ok()
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Single-pass incremental fingerprint.
///
/// Keeps the whole-body digest and the per-part digests side by side and
/// picks one form in [`Fingerprinter::finish`] once the length is known.
pub struct Fingerprinter {
    policy: MultipartPolicy,
    whole: Md5,
    part: Md5,
    part_filled: u64,
    part_digests: Vec<u8>,
    parts: u64,
    total: u64,
}

impl Fingerprinter {
    pub fn new(policy: MultipartPolicy) -> Self {
        Self {
            policy,
            whole: Md5::new(),
            part: Md5::new(),
            part_filled: 0,
            part_digests: Vec::new(),
            parts: 0,
            total: 0,
        }
    }

    pub fn update(&mut self, mut data: &[u8]) {
        self.whole.update(data);
        self.total += data.len() as u64;

        while !data.is_empty() {
            let room = (self.policy.part_size - self.part_filled) as usize;
            let take = room.min(data.len());
            self.part.update(&data[..take]);
            self.part_filled += take as u64;
            data = &data[take..];
            if self.part_filled == self.policy.part_size {
                self.close_part();
            }
        }
    }

    fn close_part(&mut self) {
        let digest = std::mem::replace(&mut self.part, Md5::new()).finalize();
        self.part_digests.extend_from_slice(&digest);
        self.parts += 1;
        self.part_filled = 0;
    }

    /// Bytes seen so far.
    pub fn len(&self) -> u64 {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    pub fn finish(mut self) -> Fingerprint {
        if !self.policy.is_multipart(self.total) {
            return Fingerprint(hex::encode(self.whole.finalize()));
        }
        if self.part_filled > 0 {
            self.close_part();
        }
        let combined = Md5::digest(&self.part_digests);
        Fingerprint(format!("{}-{}", hex::encode(combined), self.parts))
    }
}

/// Fingerprint an in-memory body with the standard policy.
pub fn fingerprint_bytes(bytes: &[u8]) -> Fingerprint {
    fingerprint_bytes_with(bytes, MultipartPolicy::STANDARD)
}

pub fn fingerprint_bytes_with(bytes: &[u8], policy: MultipartPolicy) -> Fingerprint {
    let mut fp = Fingerprinter::new(policy);
    fp.update(bytes);
    fp.finish()
}

/// Fingerprint a byte stream without holding it in memory.
pub fn fingerprint_reader<R: Read>(mut reader: R, policy: MultipartPolicy) -> std::io::Result<Fingerprint> {
    let mut fp = Fingerprinter::new(policy);
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        fp.update(&buf[..n]);
    }
    Ok(fp.finish())
}

/// Fingerprint a file on a blocking worker thread.
pub async fn fingerprint_file(path: &Path, policy: MultipartPolicy) -> Result<Fingerprint, SyncError> {
    let owned: PathBuf = path.to_path_buf();
    let result = tokio::task::spawn_blocking(move || {
        let file = std::fs::File::open(&owned)?;
        fingerprint_reader(file, policy)
    })
    .await
    .map_err(|e| SyncError::Io {
        path: path.to_path_buf(),
        source: std::io::Error::other(format!("fingerprint worker failed: {e}")),
    })?;
    result.map_err(|source| SyncError::Io {
        path: path.to_path_buf(),
        source,
    })
}
