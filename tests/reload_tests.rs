//! Integration tests for configuration loading, reload and file watching.

use settings_tree::config::{ConfigPaths, ResolverConfig};
use settings_tree::error::ErrorCode;
use settings_tree::reload::SettingsHandle;
use settings_tree::runner::settings_template;
use settings_tree::settings::Value;
use settings_tree::sources::{ExplicitOverrideSource, SourceKind};
use settings_tree::watcher::{SettingsChangeEvent, WatchPaths, WatcherConfig, start_settings_watcher};
use std::time::Duration;
use tempfile::TempDir;

fn config_in(temp: &TempDir, yaml: &str) -> ResolverConfig {
    let file = temp.path().join("settings-tree.yaml");
    std::fs::write(&file, yaml).unwrap();
    ResolverConfig::load_with_paths(&ConfigPaths::explicit(&file), |_| None)
        .unwrap()
        .config
}

#[test]
fn config_file_drives_resolver_sources() {
    let temp = TempDir::new().unwrap();
    let env_file = temp.path().join("app.env");
    let secrets = temp.path().join("secrets");
    std::fs::create_dir(&secrets).unwrap();
    std::fs::write(&env_file, "APP_RUNNER_PROCESS_LIMIT=7\n").unwrap();
    std::fs::write(secrets.join("APP_RUNNER_PROCESS_LIMIT"), "9").unwrap();
    std::fs::write(secrets.join("APP_RUNNER_SERVER_HOST"), "0.0.0.0").unwrap();

    let config = config_in(
        &temp,
        &format!(
            "prefix: APP\nprecedence: [secrets, dotenv]\nenv_file: {}\nsecrets_dir: {}\n",
            env_file.display(),
            secrets.display()
        ),
    );
    let resolved = config
        .build_resolver()
        .resolve(&settings_template().unwrap())
        .unwrap();

    assert_eq!(resolved.get_i64("runner.process_limit"), Some(9));
    assert_eq!(resolved.get_str("runner.server.host"), Some("0.0.0.0"));
    assert_eq!(
        resolved.lookup("runner.process_limit").unwrap().provenance.key,
        "APP_RUNNER_PROCESS_LIMIT"
    );
}

#[test]
fn required_env_file_missing_is_source_unavailable() {
    let temp = TempDir::new().unwrap();
    let config = config_in(
        &temp,
        &format!(
            "precedence: [dotenv]\nenv_file: {}\nenv_file_required: true\n",
            temp.path().join("missing.env").display()
        ),
    );

    let err = config
        .build_resolver()
        .resolve(&settings_template().unwrap())
        .unwrap_err();
    assert!(err.has_code(ErrorCode::SourceUnavailable));
}

#[test]
fn explicit_rank_follows_configured_precedence() {
    let temp = TempDir::new().unwrap();
    let env_file = temp.path().join(".env");
    std::fs::write(&env_file, "PREFECT_RUNNER_POLL_FREQUENCY=40\n").unwrap();
    let config = config_in(
        &temp,
        &format!(
            "precedence: [dotenv, explicit]\nenv_file: {}\n",
            env_file.display()
        ),
    );

    let overrides = ExplicitOverrideSource::new()
        .with_path(["runner", "poll_frequency"], Value::Integer(50))
        .with_path(["runner", "process_limit"], Value::Integer(6));
    let resolved = config
        .build_resolver_with(Some(overrides))
        .resolve(&settings_template().unwrap())
        .unwrap();

    assert_eq!(resolved.get_i64("runner.poll_frequency"), Some(40));
    assert_eq!(resolved.get_i64("runner.process_limit"), Some(6));
    assert_eq!(
        resolved.lookup("runner.process_limit").unwrap().provenance.kind,
        SourceKind::Explicit
    );
}

#[test]
fn reload_swaps_only_on_success() {
    let temp = TempDir::new().unwrap();
    let secrets = temp.path().join("secrets");
    std::fs::create_dir(&secrets).unwrap();
    let config = ResolverConfig {
        precedence: vec![SourceKind::Secrets],
        env_file: None,
        secrets_dir: Some(secrets.clone()),
        ..ResolverConfig::default()
    };
    let handle = SettingsHandle::new(config.build_resolver(), settings_template().unwrap()).unwrap();
    assert_eq!(handle.current().get_i64("runner.server.port"), Some(8080));

    std::fs::write(secrets.join("PREFECT_RUNNER_SERVER_PORT"), "9000").unwrap();
    let changes = handle.reload().unwrap();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].path, "runner.server.port");
    assert_eq!(handle.current().get_i64("runner.server.port"), Some(9000));

    std::fs::write(secrets.join("PREFECT_RUNNER_SERVER_LOG_LEVEL"), "LOUD").unwrap();
    let err = handle.reload().unwrap_err();
    assert_eq!(err.keys(), vec!["PREFECT_RUNNER_SERVER_LOG_LEVEL"]);
    assert_eq!(handle.current().get_i64("runner.server.port"), Some(9000));
    assert_eq!(handle.current().get_str("runner.server.log_level"), Some("ERROR"));

    std::fs::remove_file(secrets.join("PREFECT_RUNNER_SERVER_LOG_LEVEL")).unwrap();
    std::fs::remove_file(secrets.join("PREFECT_RUNNER_SERVER_PORT")).unwrap();
    let changes = handle.reload().unwrap();
    assert_eq!(changes[0].old, Some(Value::Integer(9000)));
    assert_eq!(changes[0].new, Some(Value::Integer(8080)));
}

#[tokio::test(flavor = "multi_thread")]
async fn watcher_reports_dotenv_changes() {
    let temp = TempDir::new().unwrap();
    let env_file = temp.path().join(".env");
    let reported = temp.path().canonicalize().unwrap().join(".env");
    std::fs::write(&env_file, "PREFECT_RUNNER_POLL_FREQUENCY=10\n").unwrap();

    let mut watcher = start_settings_watcher(
        WatchPaths {
            env_file: Some(env_file.clone()),
            secrets_dir: None,
        },
        WatcherConfig {
            debounce_duration: Duration::from_millis(50),
        },
    )
    .unwrap();

    // Give the backend a moment to register the watch.
    tokio::time::sleep(Duration::from_millis(200)).await;
    std::fs::write(&env_file, "PREFECT_RUNNER_POLL_FREQUENCY=20\n").unwrap();

    let event = tokio::time::timeout(Duration::from_secs(10), watcher.wait_for_change())
        .await
        .expect("no change event within timeout");
    match event {
        Some(SettingsChangeEvent::DotEnvChanged(path)) => assert_eq!(path, reported),
        Some(SettingsChangeEvent::BatchChange(paths)) => assert!(paths.contains(&reported)),
        other => panic!("unexpected event: {:?}", other),
    }
}
