use std::io::Write;

use serial_test::serial;
use tempfile::NamedTempFile;

use super::*;

fn resolve(raw: RawSettings) -> Settings {
    Settings::from_raw(raw).expect("valid settings")
}

#[test]
fn defaults_match_documented_values() {
    let settings = resolve(RawSettings::default());

    assert_eq!(settings.app.environment, AppEnvironment::Production);
    assert_eq!(settings.server.addr, "127.0.0.1:3000".parse().expect("addr"));
    assert_eq!(settings.logging.level, LevelFilter::INFO);
    assert!(matches!(settings.logging.format, LogFormat::Compact));
    assert!(settings.kv.url.is_none());
    assert!(settings.kv.seed_development_data);
    assert_eq!(settings.weather.latitude, 33.749);
    assert_eq!(settings.weather.longitude, -84.388);
    assert_eq!(settings.weather.city, "Atlanta");
    assert_eq!(settings.weather.timeout, Duration::from_millis(4_000));
    assert!(settings.feed.url.is_none());
    assert_eq!(settings.feed.count, 5);
    assert_eq!(
        settings.music.token_url.as_str(),
        "https://accounts.spotify.com/api/token"
    );
    assert_eq!(settings.blurb.model, "gpt-4-turbo");
    assert_eq!(settings.blurb.timeout, Duration::from_secs(12));
    assert_eq!(settings.blurb.owner_name, "Jason");
    assert_eq!(settings.blurb.timezone, chrono_tz::America::New_York);
    assert_eq!(settings.profile.ttl, Duration::from_secs(172_800));
    assert_eq!(settings.profile.provider_timeout, Duration::from_secs(5));
    assert_eq!(settings.profile.dev_cache, Duration::from_secs(900));
    assert_eq!(settings.profile.response_cache, Duration::from_secs(60));
    assert!(settings.cron.secret.is_none());
    assert!(!settings.cron.enabled);
    assert_eq!(settings.revalidate.paths, vec!["/".to_string()]);
}

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.server.port = Some(4000);
    raw.logging.level = Some("info".to_string());

    let overrides = ServeOverrides {
        server_port: Some(4321),
        runtime: RuntimeOverrides {
            log_level: Some("debug".to_string()),
            environment: Some("development".to_string()),
            ..Default::default()
        },
        cron_enabled: Some(true),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = resolve(raw);

    assert_eq!(settings.server.addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    assert!(settings.app.environment.is_development());
    assert!(settings.cron.enabled);
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    raw.apply_runtime_overrides(&RuntimeOverrides {
        log_json: Some(true),
        ..Default::default()
    });

    assert!(matches!(resolve(raw).logging.format, LogFormat::Json));
}

#[test]
fn blank_secrets_are_treated_as_unset() {
    let mut raw = RawSettings::default();
    raw.cron.secret = Some("   ".to_string());
    raw.kv.token = Some(String::new());

    let settings = resolve(raw);
    assert!(settings.cron.secret.is_none());
    assert!(settings.kv.token.is_none());
}

#[test]
fn zero_durations_are_rejected() {
    let mut raw = RawSettings::default();
    raw.profile.ttl_seconds = Some(0);

    let err = Settings::from_raw(raw).expect_err("zero ttl");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "profile.ttl_seconds",
            ..
        }
    ));
}

#[test]
fn response_cache_never_outlives_profile_ttl() {
    let mut raw = RawSettings::default();
    raw.profile.ttl_seconds = Some(30);
    raw.profile.response_cache_seconds = Some(600);

    let settings = resolve(raw);
    assert_eq!(settings.profile.response_cache, Duration::from_secs(30));
}

#[test]
fn out_of_range_coordinates_are_rejected() {
    let mut raw = RawSettings::default();
    raw.weather.latitude = Some(91.0);
    assert!(matches!(
        Settings::from_raw(raw),
        Err(LoadError::Invalid {
            key: "weather.latitude",
            ..
        })
    ));

    let mut raw = RawSettings::default();
    raw.weather.longitude = Some(-180.5);
    assert!(matches!(
        Settings::from_raw(raw),
        Err(LoadError::Invalid {
            key: "weather.longitude",
            ..
        })
    ));
}

#[test]
fn invalid_values_name_their_key() {
    let cases: Vec<(&'static str, Box<dyn Fn(&mut RawSettings)>)> = vec![
        (
            "logging.level",
            Box::new(|raw| raw.logging.level = Some("loud".to_string())),
        ),
        (
            "cron.schedule",
            Box::new(|raw| raw.cron.schedule = Some("every hour".to_string())),
        ),
        (
            "blurb.timezone",
            Box::new(|raw| raw.blurb.timezone = Some("Mars/Olympus".to_string())),
        ),
        (
            "feed.url",
            Box::new(|raw| raw.feed.url = Some("not a url".to_string())),
        ),
        (
            "app.environment",
            Box::new(|raw| raw.app.environment = Some("staging".to_string())),
        ),
        (
            "feed.count",
            Box::new(|raw| raw.feed.count = Some(0)),
        ),
    ];

    for (expected, mutate) in cases {
        let mut raw = RawSettings::default();
        mutate(&mut raw);
        match Settings::from_raw(raw) {
            Err(LoadError::Invalid { key, .. }) => assert_eq!(key, expected),
            other => panic!("expected {expected} to be rejected, got {other:?}"),
        }
    }
}

#[test]
fn revalidate_url_requires_token_and_rooted_paths() {
    let mut raw = RawSettings::default();
    raw.revalidate.url = Some("https://site.example.com/api/revalidate".to_string());
    assert!(matches!(
        Settings::from_raw(raw.clone()),
        Err(LoadError::Invalid {
            key: "revalidate.token",
            ..
        })
    ));

    raw.revalidate.token = Some("shh".to_string());
    raw.revalidate.paths = Some(vec!["/".to_string(), "about".to_string()]);
    assert!(matches!(
        Settings::from_raw(raw),
        Err(LoadError::Invalid {
            key: "revalidate.paths",
            ..
        })
    ));
}

#[test]
fn default_to_serve_command() {
    let args = CliArgs::parse_from(["folio"]);
    let command = args
        .command
        .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
    assert!(matches!(command, Command::Serve(_)));
}

#[test]
fn parse_serve_overrides() {
    let args = CliArgs::parse_from([
        "folio",
        "serve",
        "--server-host",
        "0.0.0.0",
        "--cron-enabled",
        "true",
        "--kv-url",
        "https://kv.example.com",
    ]);

    match args.command.expect("serve command") {
        Command::Serve(serve) => {
            assert_eq!(serve.overrides.server_host.as_deref(), Some("0.0.0.0"));
            assert_eq!(serve.overrides.cron_enabled, Some(true));
            assert_eq!(
                serve.overrides.runtime.kv_url.as_deref(),
                Some("https://kv.example.com")
            );
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_refresh_arguments() {
    let args = CliArgs::parse_from(["folio", "refresh", "--pretty", "--log-level", "warn"]);

    match args.command.expect("refresh command") {
        Command::Refresh(refresh) => {
            assert!(refresh.pretty);
            assert_eq!(refresh.overrides.log_level.as_deref(), Some("warn"));
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
#[serial]
fn file_then_environment_precedence() {
    let mut file = NamedTempFile::with_suffix(".toml").expect("temp file");
    writeln!(
        file,
        "[weather]\ncity = \"Savannah\"\nlatitude = 32.08\n\n[feed]\ncount = 7\n"
    )
    .expect("write config");

    // SAFETY: serialized with every other test touching the process environment.
    unsafe { std::env::set_var("FOLIO__FEED__COUNT", "9") };
    let args = CliArgs::parse_from([
        "folio",
        "--config-file",
        file.path().to_str().expect("utf8 path"),
        "refresh",
    ]);
    let loaded = load(&args);
    unsafe { std::env::remove_var("FOLIO__FEED__COUNT") };

    let settings = loaded.expect("settings load");
    assert_eq!(settings.weather.city, "Savannah");
    assert_eq!(settings.weather.latitude, 32.08);
    assert_eq!(settings.feed.count, 9);
}
