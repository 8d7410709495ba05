//! Tests for configuration loading and root folder resolution
//!
//! Tests that touch LIFELINE_ROOT_FOLDER are marked #[serial] so they do not
//! race on the process environment.

use lifeline_common::config::{
    CompiledDefaults, RootFolderInitializer, RootFolderResolver, TomlConfig, DATABASE_FILE,
    ROOT_FOLDER_ENV,
};
use serial_test::serial;
use std::env;
use std::path::PathBuf;

#[test]
fn test_compiled_defaults_for_current_platform() {
    let defaults = CompiledDefaults::for_current_platform();
    assert!(!defaults.root_folder.as_os_str().is_empty());
    assert!(defaults.root_folder.ends_with("lifeline") || defaults.root_folder.ends_with("lifeline_data"));
    assert_eq!(defaults.log_level, "info");
}

#[test]
#[serial]
fn test_resolver_with_no_overrides_uses_default() {
    env::remove_var(ROOT_FOLDER_ENV);

    let root = RootFolderResolver::new().resolve();
    assert_eq!(root, CompiledDefaults::for_current_platform().root_folder);
}

#[test]
#[serial]
fn test_resolver_env_overrides_toml() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/lifeline-env-root");

    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/lifeline-toml-root")),
        ..TomlConfig::default()
    };
    let root = RootFolderResolver::new().with_toml(&config).resolve();
    assert_eq!(root, PathBuf::from("/tmp/lifeline-env-root"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_resolver_cli_takes_precedence() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/lifeline-env-root");

    let root = RootFolderResolver::new()
        .with_cli_arg(Some(PathBuf::from("/tmp/lifeline-cli-root")))
        .resolve();
    assert_eq!(root, PathBuf::from("/tmp/lifeline-cli-root"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_resolver_uses_toml_when_env_unset() {
    env::remove_var(ROOT_FOLDER_ENV);

    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/lifeline-toml-root")),
        ..TomlConfig::default()
    };
    let root = RootFolderResolver::new().with_toml(&config).resolve();
    assert_eq!(root, PathBuf::from("/tmp/lifeline-toml-root"));
}

#[test]
fn test_initializer_creates_directory_idempotently() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("nested").join("root");
    let initializer = RootFolderInitializer::new(root.clone());

    initializer.ensure_directory_exists().expect("first create");
    initializer.ensure_directory_exists().expect("second create");

    assert!(root.is_dir());
    assert_eq!(initializer.database_path(), root.join(DATABASE_FILE));
    assert!(!initializer.database_exists());
}

#[test]
fn test_toml_partial_file_takes_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "port = 6000\n[logging]\nlevel = \"debug\"\n").unwrap();

    let config = TomlConfig::load(&path).unwrap();
    assert_eq!(config.port, 6000);
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.bind_address, "127.0.0.1");
    assert_eq!(config.event_capacity, 1000);
    assert_eq!(config.session_idle_secs, 300);
    assert!(config.canonical_questions.is_none());
}

#[test]
fn test_toml_canonical_questions() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        "canonical_questions = [\"Are you safe?\", \"Who can you call?\"]\n",
    )
    .unwrap();

    let config = TomlConfig::load(&path).unwrap();
    assert_eq!(
        config.canonical_questions,
        Some(vec!["Are you safe?".to_string(), "Who can you call?".to_string()])
    );
}

#[test]
fn test_toml_malformed_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "port = \"not a number\"").unwrap();

    let err = TomlConfig::load(&path).unwrap_err();
    assert!(matches!(err, lifeline_common::Error::Config(_)));
}

#[test]
fn test_explicit_missing_config_is_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");
    assert!(TomlConfig::load_or_default(Some(&path)).is_err());
}
