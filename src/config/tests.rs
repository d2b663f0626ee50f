use super::*;

#[test]
fn defaults_are_valid() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.server.addr.port(), DEFAULT_PORT);
    assert_eq!(settings.logging.level, LevelFilter::INFO);
    assert!(matches!(settings.logging.format, LogFormat::Compact));
    assert_eq!(settings.origin.url.as_str(), DEFAULT_ORIGIN_URL);
    assert_eq!(settings.cache.generation.as_str(), DEFAULT_GENERATION);
    assert!(settings.cache.precache.is_empty());
    assert_eq!(settings.cache.match_mode, MatchMode::Exact);
    assert_eq!(settings.cache.default_document, "index.html");
    assert_eq!(settings.control.prefix, DEFAULT_CONTROL_PREFIX);
}

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.server.port = Some(4000);
    raw.logging.level = Some("info".to_string());
    raw.cache.generation = Some("from-file".to_string());

    let overrides = ServeOverrides {
        server_port: Some(4321),
        log_level: Some("debug".to_string()),
        cache_generation: Some("from-cli".to_string()),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    assert_eq!(settings.cache.generation.as_str(), "from-cli");
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    let overrides = ServeOverrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn zero_port_is_rejected() {
    let mut raw = RawSettings::default();
    raw.server.port = Some(0);
    let err = Settings::from_raw(raw).expect_err("zero port");
    assert!(matches!(err, LoadError::Invalid { key: "server.port", .. }));
}

#[test]
fn blank_generation_is_rejected() {
    let mut raw = RawSettings::default();
    raw.cache.generation = Some("   ".to_string());
    let err = Settings::from_raw(raw).expect_err("blank generation");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "cache.generation",
            ..
        }
    ));
}

#[test]
fn origin_gains_trailing_slash() {
    let mut raw = RawSettings::default();
    raw.origin.url = Some("https://app.example.com/pwa".to_string());
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.origin.url.as_str(), "https://app.example.com/pwa/");
}

#[test]
fn unparsable_origin_is_rejected() {
    let mut raw = RawSettings::default();
    raw.origin.url = Some("not a url".to_string());
    let err = Settings::from_raw(raw).expect_err("bad origin");
    assert!(matches!(err, LoadError::Invalid { key: "origin.url", .. }));

    let mut raw = RawSettings::default();
    raw.origin.url = Some("ftp://files.example.com/".to_string());
    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn match_mode_accepts_suffix_and_rejects_unknown() {
    let mut raw = RawSettings::default();
    raw.cache.match_mode = Some("suffix".to_string());
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.cache.match_mode, MatchMode::Suffix);

    let mut raw = RawSettings::default();
    raw.cache.match_mode = Some("prefix".to_string());
    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn control_prefix_must_be_rooted() {
    let mut raw = RawSettings::default();
    raw.control.prefix = Some("quay".to_string());
    let err = Settings::from_raw(raw).expect_err("relative prefix");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "control.prefix",
            ..
        }
    ));

    let mut raw = RawSettings::default();
    raw.control.prefix = Some("/ops/".to_string());
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.control.prefix, "/ops");
}

#[test]
fn parse_serve_overrides() {
    let args = CliArgs::try_parse_from([
        "quay",
        "--server-port",
        "9090",
        "--origin-url",
        "https://app.example.com/",
        "--cache-precache",
        "./,./index.html,./app.js",
        "--cache-excluded-hosts",
        "generativelanguage.googleapis.com",
        "--log-json",
        "true",
    ])
    .expect("parse serve overrides");

    assert_eq!(args.overrides.server_port, Some(9090));
    assert_eq!(
        args.overrides.cache_precache,
        Some(vec![
            "./".to_string(),
            "./index.html".to_string(),
            "./app.js".to_string(),
        ])
    );
    assert_eq!(
        args.overrides.cache_excluded_hosts,
        Some(vec!["generativelanguage.googleapis.com".to_string()])
    );
    assert_eq!(args.overrides.log_json, Some(true));

    let mut raw = RawSettings::default();
    raw.apply_serve_overrides(&args.overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.cache.precache.len(), 3);
}
