//! Site configuration.
//!
//! Loaded from a single YAML document. JSON is a YAML subset, so a
//! `config.json` works unchanged.
//!
//! ```yaml
//! bucket: my-blog            # presence selects the S3 backend
//! region: eu-central-1
//! out_dir: public            # filesystem backend, used when `bucket` is absent
//! suffix_to_type: { ".css": "text/css" }
//! rss: { url: "https://blog.example/", posts_dir: "posts/", title: "Blog" }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::OCTET_STREAM;

pub const DEFAULT_REGION: &str = "us-east-1";

/// Root of the site configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Target bucket. Its presence selects the remote backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Access key id; requires `secret`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    /// Endpoint of an S3-compatible store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub force_path_style: bool,
    /// Key prefix applied to every object in the bucket.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,

    /// Output directory of the filesystem backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out_dir: Option<PathBuf>,

    /// File suffix (with leading dot) to MIME type.
    #[serde(default)]
    pub suffix_to_type: BTreeMap<String, String>,

    /// Directories copied shallowly next to the posts.
    #[serde(default = "default_asset_dirs")]
    pub asset_dirs: Vec<String>,

    #[serde(default)]
    pub rss: FeedConfig,

    #[serde(default)]
    pub publish: PublishTuning,
}

fn default_asset_dirs() -> Vec<String> {
    vec!["css".to_string(), "404".to_string()]
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            bucket: None,
            region: None,
            key: None,
            secret: None,
            endpoint: None,
            force_path_style: false,
            prefix: None,
            out_dir: None,
            suffix_to_type: BTreeMap::new(),
            asset_dirs: default_asset_dirs(),
            rss: FeedConfig::default(),
            publish: PublishTuning::default(),
        }
    }
}

/// Feed channel metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Base URL of the site, with trailing slash.
    #[serde(default)]
    pub url: String,
    /// Posts path appended to `url`, e.g. `posts/`.
    #[serde(default)]
    pub posts_dir: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_lang")]
    pub lang: String,
    /// Used for articles whose front matter names no author.
    #[serde(default)]
    pub author: String,
}

fn default_lang() -> String {
    "en".to_string()
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            posts_dir: String::new(),
            title: String::new(),
            description: String::new(),
            lang: default_lang(),
            author: String::new(),
        }
    }
}

/// Worker pool and backend call hardening knobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishTuning {
    pub concurrency: usize,
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub call_timeout_secs: u64,
}

impl Default for PublishTuning {
    fn default() -> Self {
        Self {
            concurrency: 4,
            max_attempts: 3,
            initial_backoff_ms: 200,
            max_backoff_ms: 5_000,
            call_timeout_secs: 30,
        }
    }
}

impl PublishTuning {
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

/// Where a publish run writes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageTarget {
    S3 {
        bucket: String,
        region: String,
        endpoint: Option<String>,
        prefix: Option<String>,
        access_key_id: Option<String>,
        secret_access_key: Option<String>,
        force_path_style: bool,
    },
    Filesystem {
        out_dir: PathBuf,
    },
}

impl SiteConfig {
    /// Check cross-field rules that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.key.is_some() != self.secret.is_some() {
            return Err(ConfigError::Invalid(
                "`key` and `secret` must be set together".to_string(),
            ));
        }
        match &self.bucket {
            Some(bucket) if bucket.trim().is_empty() => {
                return Err(ConfigError::Invalid("`bucket` must not be empty".to_string()));
            }
            Some(_) => {}
            None => {
                if self.out_dir.is_none() {
                    return Err(ConfigError::Invalid(
                        "`out_dir` is required when no `bucket` is configured".to_string(),
                    ));
                }
            }
        }
        if self.publish.concurrency == 0 {
            return Err(ConfigError::Invalid("`publish.concurrency` must be >= 1".to_string()));
        }
        if self.publish.max_attempts == 0 {
            return Err(ConfigError::Invalid("`publish.max_attempts` must be >= 1".to_string()));
        }
        if self.publish.call_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "`publish.call_timeout_secs` must be >= 1".to_string(),
            ));
        }
        for suffix in self.suffix_to_type.keys() {
            if !suffix.starts_with('.') {
                return Err(ConfigError::Invalid(format!(
                    "suffix_to_type key '{suffix}' must start with '.'"
                )));
            }
        }
        Ok(())
    }

    /// Backend selection: a bucket means S3, otherwise the local mirror.
    pub fn storage_target(&self) -> Result<StorageTarget, ConfigError> {
        self.validate()?;
        if let Some(bucket) = &self.bucket {
            return Ok(StorageTarget::S3 {
                bucket: bucket.clone(),
                region: self
                    .region
                    .clone()
                    .unwrap_or_else(|| DEFAULT_REGION.to_string()),
                endpoint: self.endpoint.clone(),
                prefix: self.prefix.clone(),
                access_key_id: self.key.clone(),
                secret_access_key: self.secret.clone(),
                force_path_style: self.force_path_style,
            });
        }
        let out_dir = self.out_dir.clone().ok_or_else(|| {
            ConfigError::Invalid("`out_dir` is required when no `bucket` is configured".to_string())
        })?;
        Ok(StorageTarget::Filesystem { out_dir })
    }

    /// True when publishing to the local mirror.
    pub fn is_local(&self) -> bool {
        self.bucket.is_none()
    }

    /// Extension appended to article keys. Buckets serve extensionless keys as
    /// `text/html`; a plain directory mirror needs `.html` to be browsable.
    pub fn page_extension(&self) -> &'static str {
        if self.is_local() {
            ".html"
        } else {
            ""
        }
    }

    /// Content type of a static file, from its suffix.
    pub fn content_type_for(&self, path: &Path) -> String {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| self.suffix_to_type.get(&format!(".{ext}")))
            .cloned()
            .unwrap_or_else(|| OCTET_STREAM.to_string())
    }
}

/// Load and validate the configuration at `path`.
pub fn load_at(path: &Path) -> Result<SiteConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let config: SiteConfig = serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local() -> SiteConfig {
        SiteConfig {
            out_dir: Some(PathBuf::from("public")),
            ..SiteConfig::default()
        }
    }

    #[test]
    fn default_matches_an_empty_document() {
        let parsed: SiteConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(parsed, SiteConfig::default());
        assert_eq!(parsed.rss.lang, "en");
        assert_eq!(parsed.asset_dirs, vec!["css".to_string(), "404".to_string()]);
    }

    #[test]
    fn filesystem_target_without_bucket() {
        let target = local().storage_target().unwrap();
        assert_eq!(
            target,
            StorageTarget::Filesystem {
                out_dir: PathBuf::from("public")
            }
        );
    }

    #[test]
    fn bucket_selects_s3_with_default_region() {
        let cfg = SiteConfig {
            bucket: Some("blog".to_string()),
            ..local()
        };
        match cfg.storage_target().unwrap() {
            StorageTarget::S3 { bucket, region, .. } => {
                assert_eq!(bucket, "blog");
                assert_eq!(region, DEFAULT_REGION);
            }
            other => panic!("unexpected target: {other:?}"),
        }
    }

    #[test]
    fn partial_credentials_rejected() {
        let cfg = SiteConfig {
            bucket: Some("blog".to_string()),
            key: Some("AKIA".to_string()),
            ..local()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn missing_out_dir_without_bucket_rejected() {
        let cfg = SiteConfig {
            out_dir: None,
            ..local()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn zero_concurrency_rejected() {
        let mut cfg = local();
        cfg.publish.concurrency = 0;
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn zero_call_timeout_rejected() {
        let mut cfg = local();
        cfg.publish.call_timeout_secs = 0;
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn content_type_uses_suffix_table_with_fallback() {
        let mut cfg = local();
        cfg.suffix_to_type
            .insert(".css".to_string(), "text/css".to_string());
        assert_eq!(cfg.content_type_for(Path::new("css/site.css")), "text/css");
        assert_eq!(
            cfg.content_type_for(Path::new("css/font.woff2")),
            "application/octet-stream"
        );
        assert_eq!(
            cfg.content_type_for(Path::new("README")),
            "application/octet-stream"
        );
    }

    #[test]
    fn page_extension_depends_on_backend() {
        assert_eq!(local().page_extension(), ".html");
        let remote = SiteConfig {
            bucket: Some("b".to_string()),
            ..local()
        };
        assert_eq!(remote.page_extension(), "");
    }
}
