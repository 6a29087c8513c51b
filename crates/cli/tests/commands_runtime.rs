use std::env;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

use aura_cli::commands::{ask, follow_ups, leads, migrate, seed};
use serde_json::Value;

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(&[("AURA_DATABASE_URL", "sqlite::memory:")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
        assert_eq!(payload["error_class"], Value::Null);
    });
}

#[test]
fn migrate_returns_config_failure_for_bad_override() {
    with_env(&[("AURA_LOGGING_FORMAT", "yaml")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn seed_is_idempotent_across_runs() {
    let database = TempDatabase::new("seed-idempotent");
    with_env(&[("AURA_DATABASE_URL", database.url().as_str())], || {
        let first = seed::run();
        assert_eq!(first.exit_code, 0, "expected first seed invocation success");
        let first_payload = parse_payload(&first.output);
        assert_eq!(first_payload["command"], "seed");
        assert_eq!(first_payload["status"], "ok");

        let second = seed::run();
        assert_eq!(second.exit_code, 0, "expected second seed invocation success");
        let second_payload = parse_payload(&second.output);
        assert_eq!(first_payload["message"], second_payload["message"]);
    });
}

#[test]
fn leads_ranks_seeded_contacts() {
    let database = TempDatabase::new("leads");
    with_env(&[("AURA_DATABASE_URL", database.url().as_str())], || {
        assert_eq!(seed::run().exit_code, 0);

        let result = leads::run(true);
        assert_eq!(result.exit_code, 0, "expected lead scoring success");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "leads");
        let message = payload["message"].as_str().unwrap_or_default();
        assert!(message.starts_with("scored 3 contacts (persisted):"), "{message}");
        assert!(message.contains("1. "));
    });
}

#[test]
fn follow_ups_on_empty_database_reports_nothing_due() {
    with_env(
        &[("AURA_DATABASE_URL", "sqlite::memory:"), ("AURA_DATABASE_MAX_CONNECTIONS", "1")],
        || {
            let result = follow_ups::run();
            assert_eq!(result.exit_code, 0);

            let payload = parse_payload(&result.output);
            assert_eq!(payload["command"], "follow-ups");
            assert_eq!(payload["message"], "no follow-ups due");
        },
    );
}

#[test]
fn ask_answers_owner_question_offline() {
    let database = TempDatabase::new("ask");
    with_env(
        &[("AURA_DATABASE_URL", database.url().as_str()), ("AURA_LLM_PROVIDER", "offline")],
        || {
            assert_eq!(seed::run().exit_code, 0);

            let result = ask::run("Who owns The Palm Tower 3401?");
            assert_eq!(result.exit_code, 0, "expected an answered reply: {}", result.output);

            let payload = parse_payload(&result.output);
            assert_eq!(payload["command"], "ask");
            assert!(payload["message"].as_str().unwrap_or_default().contains("John Smith"));
        },
    );
}

#[test]
fn ask_reports_generation_unavailable_offline() {
    with_env(
        &[("AURA_DATABASE_URL", "sqlite::memory:"), ("AURA_LLM_PROVIDER", "offline")],
        || {
            let result = ask::run("what's the weather like");
            assert_eq!(result.exit_code, 8);

            let payload = parse_payload(&result.output);
            assert_eq!(payload["status"], "error");
            assert_eq!(payload["error_class"], "generation_unavailable");
        },
    );
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

/// File-backed database so consecutive commands see the same rows.
struct TempDatabase {
    path: PathBuf,
}

impl TempDatabase {
    fn new(label: &str) -> Self {
        let path = env::temp_dir().join(format!("aura-cli-{label}-{}.db", std::process::id()));
        remove_database_files(&path);
        Self { path }
    }

    fn url(&self) -> String {
        format!("sqlite://{}?mode=rwc", self.path.display())
    }
}

impl Drop for TempDatabase {
    fn drop(&mut self) {
        remove_database_files(&self.path);
    }
}

fn remove_database_files(path: &Path) {
    for suffix in ["", "-wal", "-shm"] {
        let _ = std::fs::remove_file(format!("{}{suffix}", path.display()));
    }
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard = ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());

    let keys = [
        "AURA_DATABASE_URL",
        "AURA_DATABASE_MAX_CONNECTIONS",
        "AURA_DATABASE_TIMEOUT_SECS",
        "AURA_LLM_PROVIDER",
        "AURA_LLM_API_KEY",
        "AURA_LLM_BASE_URL",
        "AURA_LLM_MODEL",
        "AURA_LLM_TIMEOUT_SECS",
        "AURA_LLM_MAX_RETRIES",
        "AURA_ROUTER_HISTORY_WINDOW",
        "AURA_ROUTER_CLASSIFY_TIMEOUT_MS",
        "AURA_ROUTER_GENERATE_TIMEOUT_MS",
        "AURA_ROUTER_FAST_PATH_ENABLED",
        "AURA_KNOWLEDGE_PATH",
        "AURA_SERVER_BIND_ADDRESS",
        "AURA_SERVER_PORT",
        "AURA_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "AURA_LOGGING_LEVEL",
        "AURA_LOGGING_FORMAT",
        "AURA_LOG_LEVEL",
        "AURA_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
