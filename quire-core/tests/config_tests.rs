//! Config loading: file formats, error messages, defaults.

use assert_fs::prelude::*;
use predicates::prelude::predicate;
use quire_core::{config, ConfigError, StorageTarget};
use rstest::rstest;

// ---------------------------------------------------------------------------
// 1. Formats
// ---------------------------------------------------------------------------

#[test]
fn loads_legacy_json_config() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("config.json");
    file.write_str(
        r#"{
  "bucket": "my-blog",
  "region": "eu-central-1",
  "suffix_to_type": { ".css": "text/css", ".png": "image/png" },
  "rss": {
    "url": "https://blog.example/",
    "posts_dir": "posts/",
    "title": "Blog",
    "description": "Notes",
    "lang": "pl"
  }
}"#,
    )
    .expect("write");

    let cfg = config::load_at(file.path()).expect("load");
    assert_eq!(cfg.bucket.as_deref(), Some("my-blog"));
    assert_eq!(cfg.rss.lang, "pl");
    assert_eq!(cfg.suffix_to_type.len(), 2);
    assert!(matches!(
        cfg.storage_target().expect("target"),
        StorageTarget::S3 { .. }
    ));
}

#[test]
fn loads_yaml_with_defaults() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("quire.yaml");
    file.write_str("out_dir: public\n").expect("write");

    let cfg = config::load_at(file.path()).expect("load");
    assert_eq!(cfg.asset_dirs, vec!["css".to_string(), "404".to_string()]);
    assert_eq!(cfg.rss.lang, "en");
    assert_eq!(cfg.rss.title, "");
    assert_eq!(cfg.publish.concurrency, 4);
    assert_eq!(cfg.publish.max_attempts, 3);
    dir.child("quire.yaml").assert(predicate::path::exists());
}

// ---------------------------------------------------------------------------
// 2. Errors
// ---------------------------------------------------------------------------

#[test]
fn missing_file_reports_path() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let err = config::load_at(&dir.path().join("nope.yaml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }), "got: {err}");
    assert!(err.to_string().contains("nope.yaml"));
}

#[test]
fn corrupt_yaml_reports_parse_error_with_path() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("quire.yaml");
    file.write_str(": : corrupt : yaml : !!!\n  - broken: [unclosed")
        .expect("write");

    let err = config::load_at(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "got: {err}");
    assert!(err.to_string().contains("quire.yaml"));
}

#[rstest]
#[case::no_target("rss: { title: x }\n")]
#[case::key_without_secret("bucket: b\nkey: AKIA\n")]
#[case::zero_attempts("out_dir: o\npublish: { max_attempts: 0 }\n")]
#[case::zero_call_timeout("out_dir: o\npublish: { call_timeout_secs: 0 }\n")]
#[case::suffix_without_dot("out_dir: o\nsuffix_to_type: { css: text/css }\n")]
fn invalid_configs_rejected(#[case] body: &str) {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("quire.yaml");
    file.write_str(body).expect("write");

    let err = config::load_at(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)), "got: {err}");
}
