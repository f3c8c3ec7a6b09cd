// tests/settings_loader.rs

mod common;
use crate::common::TEST_SECRET;

use std::error::Error;
use std::io::Write;
use std::time::Duration;

use stackctl::config::{load_raw, SettingsLoader};
use stackctl::errors::StackError;

type TestResult = Result<(), Box<dyn Error>>;

fn base_env() -> Vec<(&'static str, &'static str)> {
    vec![("APP_SECRET_KEY", TEST_SECRET)]
}

#[test]
fn defaults_apply_when_only_secret_is_set() -> TestResult {
    let loader = SettingsLoader::from_source(base_env());
    let settings = loader.get()?;

    assert_eq!(settings.server.command, "uvicorn");
    assert_eq!(settings.server.host, "0.0.0.0");
    assert_eq!(settings.server.port, 8000);
    assert_eq!(settings.server.keepalive, Duration::from_secs(65));
    assert_eq!(settings.server.reload, None);
    assert_eq!(settings.server.reload_dirs, vec!["src".to_string()]);
    assert_eq!(settings.server.http_workers, None);
    assert!(settings.server.app_loc_is_factory);
    assert_eq!(settings.app.environment, "prod");
    assert!(!settings.app.dev_mode);
    assert_eq!(settings.app.asset_run_command, "npm run dev");
    assert_eq!(settings.log.level, tracing::Level::INFO);
    assert_eq!(settings.log.worker_event, "Worker");
    assert_eq!(settings.log.asset_event, "Vite");
    assert_eq!(settings.worker.concurrency, 10);
    assert_eq!(settings.supervisor.terminate_timeout, Duration::from_secs(10));
    assert_eq!(settings.redis.socket_connect_timeout, Duration::from_secs(5));
    assert_eq!(settings.app.secret_key.expose(), TEST_SECRET);
    Ok(())
}

#[test]
fn missing_secret_is_a_configuration_error() {
    let loader = SettingsLoader::from_source(Vec::<(String, String)>::new());
    let err = loader.get().expect_err("secret is required");

    assert!(matches!(err, StackError::Configuration(_)), "got {err:?}");
    assert_eq!(err.exit_code(), 2);
    assert!(err.to_string().contains("APP_SECRET_KEY"));
}

#[test]
fn blank_secret_is_rejected() {
    let loader = SettingsLoader::from_source([("APP_SECRET_KEY", "   ")]);
    assert!(matches!(loader.get(), Err(StackError::Configuration(_))));
}

#[test]
fn typed_values_are_parsed_from_strings() -> TestResult {
    let mut env = base_env();
    env.extend([
        ("SERVER_PORT", "9001"),
        ("SERVER_RELOAD", "true"),
        ("SERVER_RELOAD_DIRS", "src,templates"),
        ("SERVER_HTTP_WORKERS", "3"),
        ("APP_DEV_MODE", "true"),
        ("APP_NAME", "Billing Portal"),
        ("LOG_LEVEL", "10"),
        ("WORKER_CONCURRENCY", "4"),
    ]);
    let loader = SettingsLoader::from_source(env);
    let settings = loader.get()?;

    assert_eq!(settings.server.port, 9001);
    assert_eq!(settings.server.reload, Some(true));
    assert_eq!(
        settings.server.reload_dirs,
        vec!["src".to_string(), "templates".to_string()]
    );
    assert_eq!(settings.server.http_workers, Some(3));
    assert!(settings.app.dev_mode);
    assert_eq!(settings.app_slug(), "billing-portal");
    assert_eq!(settings.log.level, tracing::Level::DEBUG);
    assert_eq!(settings.worker.concurrency, 4);
    Ok(())
}

#[test]
fn numeric_looking_strings_are_kept_verbatim() -> TestResult {
    let loader = SettingsLoader::from_source([
        ("APP_SECRET_KEY", "0012345678901234567890123"),
        ("APP_BUILD_NUMBER", "0042"),
        ("APP_NAME", "1.10"),
        ("APP_ENVIRONMENT", "True"),
        ("LOG_WORKER_EVENT", "inf"),
    ]);
    let settings = loader.get()?;

    assert_eq!(
        settings.app.secret_key.expose(),
        "0012345678901234567890123"
    );
    assert_eq!(settings.app.build_number, "0042");
    assert_eq!(settings.app.name, "1.10");
    assert_eq!(settings.app.environment, "True");
    assert_eq!(settings.log.worker_event, "inf");
    Ok(())
}

#[test]
fn every_validation_problem_is_reported() {
    let loader = SettingsLoader::from_source([
        ("SERVER_PORT", "0"),
        ("WORKER_CONCURRENCY", "0"),
        ("DB_URL", "not a url"),
    ]);
    let Err(StackError::Configuration(message)) = loader.get() else {
        panic!("expected a configuration error");
    };

    for key in ["APP_SECRET_KEY", "SERVER_PORT", "WORKER_CONCURRENCY", "DB_URL"] {
        assert!(message.contains(key), "'{key}' missing from: {message}");
    }
}

#[test]
fn empty_values_count_as_unset() -> TestResult {
    let mut env = base_env();
    env.push(("SERVER_PORT", ""));
    let raw = load_raw(Some(
        env.into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    ))?;
    assert_eq!(raw.server_port, 8000);
    Ok(())
}

#[test]
fn invalid_values_are_configuration_errors() {
    let cases = [
        ("SERVER_PORT", "0"),
        ("SERVER_PORT", "not-a-port"),
        ("SERVER_HTTP_WORKERS", "0"),
        ("WORKER_CONCURRENCY", "0"),
        ("LOG_LEVEL", "15"),
        ("DB_URL", "not a url"),
        ("REDIS_URL", "unix:/tmp/redis.sock"),
    ];

    for (key, value) in cases {
        let mut env = base_env();
        env.push((key, value));
        let loader = SettingsLoader::from_source(env);
        match loader.get() {
            Err(StackError::Configuration(_)) => {}
            other => panic!("{key}={value}: expected configuration error, got {other:?}"),
        }
    }
}

#[test]
fn env_file_fills_missing_keys_but_never_overrides() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join(".env");
    let mut file = std::fs::File::create(&path)?;
    writeln!(file, "# local development")?;
    writeln!(file, "APP_SECRET_KEY=from-dotenv")?;
    writeln!(file, "SERVER_PORT=7000")?;
    writeln!(file, "APP_NAME=\"Dotenv App\"")?;
    drop(file);

    let loader = SettingsLoader::from_source([("SERVER_PORT", "9000")]).with_env_file(&path);
    let settings = loader.get()?;

    assert_eq!(settings.app.secret_key.expose(), "from-dotenv");
    assert_eq!(settings.server.port, 9000, "existing value must win over .env");
    assert_eq!(settings.app.name, "Dotenv App");
    Ok(())
}

#[test]
fn missing_env_file_is_not_an_error() -> TestResult {
    let dir = tempfile::tempdir()?;
    let loader = SettingsLoader::from_source(base_env()).with_env_file(dir.path().join(".env"));
    assert!(loader.get().is_ok());
    Ok(())
}

#[test]
fn malformed_env_file_is_a_configuration_error() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join(".env");
    std::fs::write(&path, "APP_SECRET_KEY='unterminated\n")?;

    let loader = SettingsLoader::from_source(Vec::<(String, String)>::new()).with_env_file(&path);
    assert!(matches!(loader.get(), Err(StackError::Configuration(_))));
    Ok(())
}

#[test]
fn loader_caches_the_first_result() -> TestResult {
    let loader = SettingsLoader::from_source(base_env());
    let first = loader.get()?;
    let second = loader.get()?;
    assert!(std::ptr::eq(first, second));
    Ok(())
}

#[test]
fn secret_is_redacted_in_debug_output() -> TestResult {
    let loader = SettingsLoader::from_source(base_env());
    let rendered = format!("{:?}", loader.get()?);
    assert!(!rendered.contains(TEST_SECRET));
    Ok(())
}
