use clap::Parser;
use quay::config::{self, CliArgs};
use serial_test::serial;

const ENV_KEYS: [&str; 3] = [
    "QUAY__CACHE__GENERATION",
    "QUAY__CACHE__EXCLUDED_HOSTS",
    "QUAY__SERVER__PORT",
];

fn clear_env() {
    for key in ENV_KEYS {
        // SAFETY: every test touching these variables is serialized.
        unsafe { std::env::remove_var(key) };
    }
}

fn set_env(key: &str, value: &str) {
    // SAFETY: every test touching these variables is serialized.
    unsafe { std::env::set_var(key, value) };
}

#[test]
#[serial]
fn bundled_defaults_load() {
    clear_env();
    let args = CliArgs::try_parse_from(["quay"]).expect("cli args");

    let settings = config::load(&args).expect("settings");

    assert_eq!(settings.cache.generation.as_str(), "gemini-pwa-cache-v2");
    assert_eq!(settings.cache.precache.len(), 5);
    assert_eq!(
        settings.cache.excluded_hosts,
        vec!["generativelanguage.googleapis.com".to_string()]
    );
    assert_eq!(settings.control.prefix, "/_quay");
}

#[test]
#[serial]
fn environment_overrides_file() {
    clear_env();
    set_env("QUAY__CACHE__GENERATION", "app-cache-v3");
    set_env("QUAY__CACHE__EXCLUDED_HOSTS", "api.example.com,cdn.example.com");
    set_env("QUAY__SERVER__PORT", "9090");
    let args = CliArgs::try_parse_from(["quay"]).expect("cli args");

    let settings = config::load(&args);
    clear_env();
    let settings = settings.expect("settings");

    assert_eq!(settings.cache.generation.as_str(), "app-cache-v3");
    assert_eq!(
        settings.cache.excluded_hosts,
        vec!["api.example.com".to_string(), "cdn.example.com".to_string()]
    );
    assert_eq!(settings.server.addr.port(), 9090);
}

#[test]
#[serial]
fn cli_overrides_environment() {
    clear_env();
    set_env("QUAY__CACHE__GENERATION", "from-env");
    let args = CliArgs::try_parse_from(["quay", "--cache-generation", "from-cli"])
        .expect("cli args");

    let settings = config::load(&args);
    clear_env();

    assert_eq!(
        settings.expect("settings").cache.generation.as_str(),
        "from-cli"
    );
}
