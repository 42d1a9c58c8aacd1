//! Integration tests for resolving settings trees against ranked sources.
//!
//! Environment-dependent behaviour goes through `EnvironmentSource::from_vars`
//! so tests never mutate the process environment.

use settings_tree::error::{ErrorCode, FieldError, TreeShapeError};
use settings_tree::resolver::Resolver;
use settings_tree::runner::{LogLevel, Settings, settings_template};
use settings_tree::settings::{Constraint, FieldSpec, FieldType, SettingsNode, Value};
use settings_tree::sources::{
    DotEnvFileSource, EnvironmentSource, ExplicitOverrideSource, SecretsDirectorySource,
    SourceKind,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use tempfile::TempDir;

fn env(vars: &[(&str, &str)]) -> EnvironmentSource {
    EnvironmentSource::from_vars(vars.iter().map(|(k, v)| (k.to_string(), v.to_string())))
}

/// `runner.poll_frequency` plus the nested `runner.server.port`.
fn small_tree() -> SettingsNode {
    let server = SettingsNode::builder("server")
        .field("port", FieldSpec::integer().default_value(8080))
        .field("enable", FieldSpec::bool().default_value(false))
        .build()
        .unwrap();
    let runner = SettingsNode::builder("runner")
        .field("poll_frequency", FieldSpec::integer().default_value(10))
        .node(server)
        .build()
        .unwrap();
    SettingsNode::root().node(runner).build().unwrap()
}

#[test]
fn runner_scenario_defaults_then_env_override() {
    let tree = small_tree();

    let resolved = Resolver::defaults_only("PREFECT").resolve(&tree).unwrap();
    assert_eq!(resolved.get_i64("runner.poll_frequency"), Some(10));
    assert_eq!(resolved.get_i64("runner.server.port"), Some(8080));

    let resolver = Resolver::builder("PREFECT")
        .source(env(&[("PREFECT_RUNNER_SERVER_PORT", "9090")]))
        .build();
    let resolved = resolver.resolve(&tree).unwrap();
    assert_eq!(resolved.get_i64("runner.poll_frequency"), Some(10));
    assert_eq!(resolved.get_i64("runner.server.port"), Some(9090));
    assert_eq!(resolved.get_bool("runner.server.enable"), Some(false));
}

#[test]
fn env_removed_falls_back_to_default() {
    let tree = small_tree();
    let with = Resolver::builder("PREFECT")
        .source(env(&[("PREFECT_RUNNER_POLL_FREQUENCY", "30")]))
        .build();
    let without = Resolver::builder("PREFECT").source(env(&[])).build();

    assert_eq!(with.resolve(&tree).unwrap().get_i64("runner.poll_frequency"), Some(30));
    let resolved = without.resolve(&tree).unwrap();
    assert_eq!(resolved.get_i64("runner.poll_frequency"), Some(10));
    assert_eq!(
        resolved.lookup("runner.poll_frequency").unwrap().provenance.kind,
        SourceKind::Defaults
    );
}

#[test]
fn explicit_beats_environment_at_every_depth() {
    let tree = small_tree();
    let resolver = Resolver::builder("PREFECT")
        .source(
            ExplicitOverrideSource::new()
                .with_path(["runner", "poll_frequency"], Value::Integer(1))
                .with_path(["runner", "server", "port"], Value::Integer(2)),
        )
        .source(env(&[
            ("PREFECT_RUNNER_POLL_FREQUENCY", "100"),
            ("PREFECT_RUNNER_SERVER_PORT", "200"),
        ]))
        .build();

    let resolved = resolver.resolve(&tree).unwrap();
    assert_eq!(resolved.get_i64("runner.poll_frequency"), Some(1));
    assert_eq!(resolved.get_i64("runner.server.port"), Some(2));
    assert_eq!(
        resolved.lookup("runner.server.port").unwrap().provenance.kind,
        SourceKind::Explicit
    );
}

#[test]
fn env_beats_dotenv_beats_secrets() {
    let temp = TempDir::new().unwrap();
    let env_file = temp.path().join(".env");
    std::fs::write(
        &env_file,
        "PREFECT_RUNNER_POLL_FREQUENCY=20\nPREFECT_RUNNER_SERVER_PORT=7000\n",
    )
    .unwrap();
    let secrets = temp.path().join("secrets");
    std::fs::create_dir(&secrets).unwrap();
    std::fs::write(secrets.join("PREFECT_RUNNER_SERVER_PORT"), "6000\n").unwrap();
    std::fs::write(secrets.join("PREFECT_RUNNER_SERVER_ENABLE"), "yes\n").unwrap();

    let resolver = Resolver::builder("PREFECT")
        .source(env(&[("PREFECT_RUNNER_POLL_FREQUENCY", "30")]))
        .source(DotEnvFileSource::new(&env_file))
        .source(SecretsDirectorySource::new(&secrets))
        .build();
    let resolved = resolver.resolve(&small_tree()).unwrap();

    assert_eq!(resolved.get_i64("runner.poll_frequency"), Some(30));
    assert_eq!(resolved.get_i64("runner.server.port"), Some(7000));
    assert_eq!(resolved.get_bool("runner.server.enable"), Some(true));
    assert_eq!(
        resolved.lookup("runner.server.enable").unwrap().provenance.kind,
        SourceKind::Secrets
    );
}

#[test]
fn nested_override_leaves_siblings_at_defaults() {
    let resolver = Resolver::builder("PREFECT")
        .source(env(&[("PREFECT_RUNNER_SERVER_PORT", "9090")]))
        .build();
    let resolved = resolver.resolve(&settings_template().unwrap()).unwrap();
    let settings = Settings::from_resolved(&resolved).unwrap();

    assert_eq!(settings.runner.server.port, 9090);
    assert!(!settings.runner.server.enable);
    assert_eq!(settings.runner.server.host, "localhost");
    assert_eq!(settings.runner.server.log_level, LogLevel::Error);
    assert_eq!(settings.runner.server.missed_polls_tolerance, 2);
    assert_eq!(settings.runner.process_limit, 5);
    assert_eq!(settings.runner.heartbeat_frequency, None);
}

#[test]
fn heartbeat_minimum_is_enforced() {
    let tree = settings_template().unwrap();

    let rejected = Resolver::builder("PREFECT")
        .source(env(&[("PREFECT_RUNNER_HEARTBEAT_FREQUENCY", "29")]))
        .build()
        .resolve(&tree)
        .unwrap_err();
    assert_eq!(rejected.errors().len(), 1);
    assert_eq!(rejected.errors()[0].code(), ErrorCode::Constraint);
    assert_eq!(rejected.keys(), vec!["PREFECT_RUNNER_HEARTBEAT_FREQUENCY"]);

    let accepted = Resolver::builder("PREFECT")
        .source(env(&[("PREFECT_RUNNER_HEARTBEAT_FREQUENCY", "30")]))
        .build()
        .resolve(&tree)
        .unwrap();
    assert_eq!(accepted.get_i64("runner.heartbeat_frequency"), Some(30));
}

#[test]
fn bool_vocabulary() {
    let tree = small_tree();
    for (raw, expected) in [("true", true), ("False", false), ("1", true), ("no", false)] {
        let resolved = Resolver::builder("PREFECT")
            .source(env(&[("PREFECT_RUNNER_SERVER_ENABLE", raw)]))
            .build()
            .resolve(&tree)
            .unwrap();
        assert_eq!(resolved.get_bool("runner.server.enable"), Some(expected), "{}", raw);
    }

    let err = Resolver::builder("PREFECT")
        .source(env(&[("PREFECT_RUNNER_SERVER_ENABLE", "maybe")]))
        .build()
        .resolve(&tree)
        .unwrap_err();
    assert!(matches!(
        &err.errors()[0],
        FieldError::Coercion { key, raw, .. }
            if key == "PREFECT_RUNNER_SERVER_ENABLE" && raw == "maybe"
    ));
}

#[test]
fn enum_matches_case_insensitively() {
    let resolved = Resolver::builder("PREFECT")
        .source(env(&[("PREFECT_RUNNER_SERVER_LOG_LEVEL", "debug")]))
        .build()
        .resolve(&settings_template().unwrap())
        .unwrap();
    assert_eq!(resolved.get_str("runner.server.log_level"), Some("DEBUG"));
}

#[test]
fn required_field_missing_then_satisfied() {
    let tree = SettingsNode::builder("api")
        .field("key", FieldSpec::string().required())
        .field("url", FieldSpec::string().default_value("http://localhost:4200"))
        .build()
        .unwrap();

    let err = Resolver::defaults_only("PREFECT").resolve(&tree).unwrap_err();
    assert_eq!(err.errors(), &[FieldError::missing("PREFECT_API_KEY")]);

    let overrides = ExplicitOverrideSource::new().with_key("PREFECT_API_KEY", "secret");
    let resolved = Resolver::defaults_only("PREFECT")
        .resolve_with_overrides(&tree, &overrides)
        .unwrap();
    assert_eq!(resolved.get_str("key"), Some("secret"));
}

#[test]
fn errors_aggregate_across_the_tree() {
    let tree = SettingsNode::builder("runner")
        .field("token", FieldSpec::string().required())
        .field("process_limit", FieldSpec::integer().default_value(5))
        .node_from(|| {
            SettingsNode::builder("server")
                .field("port", FieldSpec::integer().maximum(65535).default_value(8080))
                .build()
        })
        .build()
        .unwrap();

    let err = Resolver::builder("PREFECT")
        .source(env(&[
            ("PREFECT_RUNNER_PROCESS_LIMIT", "five"),
            ("PREFECT_RUNNER_SERVER_PORT", "70000"),
        ]))
        .build()
        .resolve(&tree)
        .unwrap_err();

    assert_eq!(
        err.errors().iter().map(FieldError::code).collect::<Vec<_>>(),
        vec![ErrorCode::MissingRequired, ErrorCode::Coercion, ErrorCode::Constraint]
    );
    let message = err.to_string();
    assert!(message.contains("PREFECT_RUNNER_TOKEN"));
    assert!(message.contains("PREFECT_RUNNER_PROCESS_LIMIT"));
    assert!(message.contains("PREFECT_RUNNER_SERVER_PORT"));
}

#[test]
fn dotenv_edits_are_observed_between_calls() {
    let temp = TempDir::new().unwrap();
    let env_file = temp.path().join(".env");
    let tree = small_tree();
    let resolver = Resolver::builder("PREFECT").dotenv(&env_file).build();

    // Missing optional file is a miss, not an error.
    assert_eq!(resolver.resolve(&tree).unwrap().get_i64("runner.server.port"), Some(8080));

    std::fs::write(&env_file, "PREFECT_RUNNER_SERVER_PORT=1111\n").unwrap();
    assert_eq!(resolver.resolve(&tree).unwrap().get_i64("runner.server.port"), Some(1111));

    std::fs::write(&env_file, "export PREFECT_RUNNER_SERVER_PORT = 2222\n").unwrap();
    assert_eq!(resolver.resolve(&tree).unwrap().get_i64("runner.server.port"), Some(2222));
}

#[test]
fn unreadable_source_is_reported_with_other_errors() {
    let temp = TempDir::new().unwrap();
    // A directory where a dotenv file is expected cannot be read.
    let env_dir = temp.path().join(".env");
    std::fs::create_dir(&env_dir).unwrap();

    let err = Resolver::builder("PREFECT")
        .dotenv(&env_dir)
        .source(env(&[("PREFECT_RUNNER_SERVER_PORT", "not-a-port")]))
        .build()
        .resolve(&small_tree())
        .unwrap_err();

    assert!(err.has_code(ErrorCode::SourceUnavailable));
    assert!(err.has_code(ErrorCode::Coercion));
    assert_eq!(err.errors().len(), 2);
}

#[test]
fn unreadable_secret_fails_only_its_own_field() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("PREFECT_RUNNER_SERVER_PORT"), [0xff, 0xfe]).unwrap();
    std::fs::write(temp.path().join("PREFECT_RUNNER_POLL_FREQUENCY"), "45").unwrap();
    std::fs::write(temp.path().join("PREFECT_UNUSED_TOKEN"), [0xff]).unwrap();
    let tree = small_tree();

    let err = Resolver::builder("PREFECT")
        .secrets_dir(temp.path())
        .build()
        .resolve(&tree)
        .unwrap_err();
    assert_eq!(err.errors().len(), 1);
    match &err.errors()[0] {
        FieldError::SourceUnavailable { path, .. } => {
            assert_eq!(path.as_deref(), Some(temp.path().join("PREFECT_RUNNER_SERVER_PORT").as_path()))
        }
        other => panic!("unexpected error: {:?}", other),
    }

    // A higher-ranked source still shadows the unreadable secret.
    let resolved = Resolver::builder("PREFECT")
        .source(env(&[("PREFECT_RUNNER_SERVER_PORT", "9090")]))
        .secrets_dir(temp.path())
        .build()
        .resolve(&tree)
        .unwrap();
    assert_eq!(resolved.get_i64("runner.server.port"), Some(9090));
    assert_eq!(resolved.get_i64("runner.poll_frequency"), Some(45));
}

#[test]
fn factory_defaults_are_produced_per_resolution() {
    let counter = Arc::new(AtomicI64::new(0));
    let next = Arc::clone(&counter);
    let tree = SettingsNode::builder("worker")
        .field(
            "seed",
            FieldSpec::integer().default_factory(move || {
                Value::Integer(next.fetch_add(1, Ordering::SeqCst) + 100)
            }),
        )
        .build()
        .unwrap();

    let resolver = Resolver::defaults_only("PREFECT");
    let first = resolver.resolve(&tree).unwrap().get_i64("seed").unwrap();
    let second = resolver.resolve(&tree).unwrap().get_i64("seed").unwrap();
    assert!(first >= 100);
    assert_eq!(second, first + 1);
}

#[test]
fn concurrent_resolution_produces_equal_snapshots() {
    let tree = settings_template().unwrap();
    let resolver = Resolver::builder("PREFECT")
        .source(env(&[("PREFECT_RUNNER_PROCESS_LIMIT", "12")]))
        .build();
    let expected = resolver.resolve(&tree).unwrap();

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| scope.spawn(|| resolver.resolve(&tree).unwrap()))
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), expected);
        }
    });
}

#[test]
fn tree_shape_errors_at_build_time() {
    let duplicate = SettingsNode::builder("runner")
        .field("port", FieldSpec::integer().default_value(1))
        .field("port", FieldSpec::integer().default_value(2))
        .build();
    assert!(matches!(duplicate, Err(TreeShapeError::DuplicateName { .. })));

    let collision = SettingsNode::builder("a")
        .field("b_c", FieldSpec::integer().default_value(1))
        .node_from(|| {
            SettingsNode::builder("b")
                .field("c", FieldSpec::integer().default_value(2))
                .build()
        })
        .build();
    assert!(matches!(collision, Err(TreeShapeError::KeyCollision { .. })));

    let bad_default = SettingsNode::builder("runner")
        .field("heartbeat", FieldSpec::integer().minimum(30).default_value(10))
        .build();
    assert!(matches!(
        bad_default,
        Err(TreeShapeError::DefaultViolatesConstraint { .. })
    ));

    let bad_constraint = SettingsNode::builder("runner")
        .field(
            "name",
            FieldSpec::bool()
                .constraint(Constraint::MinLength(3))
                .default_value(true),
        )
        .build();
    assert!(matches!(
        bad_constraint,
        Err(TreeShapeError::InvalidConstraint { .. })
    ));

    let no_default = SettingsNode::builder("runner")
        .field("limit", FieldSpec::new(FieldType::Integer))
        .build();
    assert!(matches!(no_default, Err(TreeShapeError::MissingDefault { .. })));
}
