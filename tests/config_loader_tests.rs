use billing::config::{ConfigError, ConfigLoader};
use std::{
    env, fs,
    path::PathBuf,
    sync::{Mutex, MutexGuard, OnceLock},
};
use tempfile::TempDir;

const VARS: &[&str] = &[
    "BILLING_PROFILE",
    "BILLING_API_BIND_ADDR",
    "BILLING_LOG_LEVEL",
    "BILLING_LOG_FORMAT",
    "BILLING_OPERATOR_TOKEN",
    "BILLING_OPERATOR_TOKENS",
    "BILLING_API_KEY_HASH_SECRET",
    "BILLING_DB_AUTO_MIGRATE",
    "BILLING_INVOICE_NUMBER_PREFIX",
    "BILLING_INVOICE_DUE_DAYS",
    "BILLING_WALLET_CREDIT_PAGE_SIZE",
];

fn env_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

fn env_guard() -> MutexGuard<'static, ()> {
    env_lock()
        .lock()
        .unwrap_or_else(|poison| poison.into_inner())
}

fn clear_env() {
    for var in VARS {
        unsafe {
            env::remove_var(var);
        }
    }
}

fn write_env_file(dir: &TempDir, name: &str, contents: &str) {
    let path = dir.path().join(name);
    fs::write(path, contents).unwrap();
}

fn loader(dir: &TempDir) -> ConfigLoader {
    ConfigLoader::with_base_dir(PathBuf::from(dir.path()))
}

#[test]
fn loads_defaults_when_only_a_token_is_present() {
    let _guard = env_guard();
    clear_env();
    let temp_dir = TempDir::new().unwrap();
    unsafe {
        env::set_var("BILLING_OPERATOR_TOKEN", "local-token");
    }

    let cfg = loader(&temp_dir).load().expect("config loads with defaults");

    assert_eq!(cfg.profile, "local");
    assert_eq!(cfg.api_bind_addr, "0.0.0.0:8080");
    assert_eq!(cfg.log_level, "info");
    assert_eq!(cfg.log_format, "json");
    assert_eq!(cfg.operator_tokens, vec!["local-token"]);
    assert!(cfg.db_auto_migrate);
    assert_eq!(cfg.billing.invoice_number_prefix, "INV");
    assert_eq!(cfg.billing.invoice_due_days, 1);
    assert_eq!(cfg.billing.wallet_credit_page_size, 100);
    cfg.bind_addr().expect("default bind addr parses");
    clear_env();
}

#[test]
fn missing_operator_token_fails() {
    let _guard = env_guard();
    clear_env();
    let temp_dir = TempDir::new().unwrap();

    let err = loader(&temp_dir).load().expect_err("a token is required");
    assert!(matches!(err, ConfigError::MissingOperatorTokens));
}

#[test]
fn layered_env_files_apply_in_order() {
    let _guard = env_guard();
    clear_env();

    let temp_dir = TempDir::new().unwrap();
    write_env_file(&temp_dir, ".env", "BILLING_API_BIND_ADDR=127.0.0.1:3000\n");
    write_env_file(
        &temp_dir,
        ".env.test",
        "BILLING_API_BIND_ADDR=192.168.0.10:5000\nBILLING_INVOICE_DUE_DAYS=30\n",
    );
    write_env_file(
        &temp_dir,
        ".env.test.local",
        "BILLING_API_BIND_ADDR=10.0.0.5:6000\n",
    );

    // Select profile via .env.local before profile-specific files load.
    write_env_file(
        &temp_dir,
        ".env.local",
        "BILLING_PROFILE=test\nBILLING_API_BIND_ADDR=127.0.0.1:4000\nBILLING_OPERATOR_TOKENS=\"first, second ,\"\n",
    );

    let cfg = loader(&temp_dir)
        .load()
        .expect("config loads with layered env files");

    assert_eq!(cfg.profile, "test");
    assert_eq!(cfg.api_bind_addr, "10.0.0.5:6000");
    assert_eq!(cfg.billing.invoice_due_days, 30);
    assert_eq!(cfg.operator_tokens, vec!["first", "second"]);
    clear_env();
}

#[test]
fn os_environment_has_highest_precedence() {
    let _guard = env_guard();
    clear_env();

    let temp_dir = TempDir::new().unwrap();
    write_env_file(
        &temp_dir,
        ".env",
        "BILLING_API_BIND_ADDR=127.0.0.1:3000\nBILLING_OPERATOR_TOKEN=file-token\nBILLING_DB_AUTO_MIGRATE=true\n",
    );

    unsafe {
        env::set_var("BILLING_API_BIND_ADDR", "0.0.0.0:9090");
        env::set_var("BILLING_DB_AUTO_MIGRATE", "off");
    }

    let cfg = loader(&temp_dir).load().expect("config loads with env override");
    assert_eq!(cfg.api_bind_addr, "0.0.0.0:9090");
    assert!(!cfg.db_auto_migrate);
    assert_eq!(cfg.operator_tokens, vec!["file-token"]);

    clear_env();
}

#[test]
fn production_requires_a_hash_secret() {
    let _guard = env_guard();
    clear_env();

    let temp_dir = TempDir::new().unwrap();
    write_env_file(
        &temp_dir,
        ".env",
        "BILLING_PROFILE=production\nBILLING_OPERATOR_TOKEN=prod-token\n",
    );

    let err = loader(&temp_dir).load().expect_err("hash secret is required");
    assert!(matches!(err, ConfigError::MissingApiKeyHashSecret));

    unsafe {
        env::set_var("BILLING_API_KEY_HASH_SECRET", "prod-secret");
    }
    let cfg = loader(&temp_dir).load().expect("production config loads");
    assert_eq!(cfg.api_key_secret(), "prod-secret");
    assert!(!cfg.redacted_json().unwrap().contains("prod-secret"));

    clear_env();
}

#[test]
fn invalid_values_are_rejected() {
    let _guard = env_guard();
    clear_env();
    let temp_dir = TempDir::new().unwrap();

    unsafe {
        env::set_var("BILLING_OPERATOR_TOKEN", "token");
        env::set_var("BILLING_LOG_FORMAT", "xml");
    }
    let err = loader(&temp_dir).load().expect_err("unknown log format");
    assert!(matches!(err, ConfigError::InvalidLogFormat { .. }));

    unsafe {
        env::remove_var("BILLING_LOG_FORMAT");
        env::set_var("BILLING_INVOICE_NUMBER_PREFIX", "inv");
    }
    let err = loader(&temp_dir).load().expect_err("lowercase prefix");
    assert!(matches!(err, ConfigError::InvalidInvoicePrefix { .. }));

    unsafe {
        env::remove_var("BILLING_INVOICE_NUMBER_PREFIX");
        env::set_var("BILLING_API_BIND_ADDR", "not-an-addr");
    }
    let err = loader(&temp_dir).load().expect_err("invalid bind addr should fail");
    assert!(format!("{}", err).contains("invalid api bind address"));

    clear_env();
}
