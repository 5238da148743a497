use std::io::Write;

use keel::config::Config;

// Tests touching process env vars share one test so they cannot race.
#[test]
fn test_config_load_from_env() {
    unsafe {
        std::env::remove_var("LISTEN");
        std::env::remove_var("KEEL_CONFIG");
    }
    let cfg = Config::load().unwrap();
    assert_eq!(cfg.server.listen_addr, "127.0.0.1:8080");

    unsafe {
        std::env::set_var("LISTEN", "0.0.0.0:3000");
    }
    let cfg = Config::load().unwrap();
    assert_eq!(cfg.server.listen_addr, "0.0.0.0:3000");

    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "server:\n  listen_addr: \"127.0.0.1:9000\"\napp:\n  debug: true").unwrap();
    unsafe {
        std::env::set_var("KEEL_CONFIG", file.path());
    }
    let cfg = Config::load().unwrap();
    // LISTEN still wins over the file
    assert_eq!(cfg.server.listen_addr, "0.0.0.0:3000");
    assert!(cfg.app.debug);

    unsafe {
        std::env::remove_var("LISTEN");
    }
    let cfg = Config::load().unwrap();
    assert_eq!(cfg.server.listen_addr, "127.0.0.1:9000");

    unsafe {
        std::env::set_var("KEEL_CONFIG", "/definitely/not/here.yaml");
    }
    assert!(Config::load().is_err());

    unsafe {
        std::env::remove_var("KEEL_CONFIG");
    }
}

#[test]
fn test_config_defaults() {
    let cfg = Config::default();

    assert!(!cfg.app.debug);
    assert_eq!(cfg.database.url, None);
    assert_eq!(cfg.session.cookie_name, "keel_session");
    assert!(!cfg.session.advisory_lock);
    assert_eq!(cfg.session.max_age().as_secs(), 7200);
    assert_eq!(cfg.log.level, "info");
}

#[test]
fn test_config_partial_yaml() {
    let cfg = Config::from_yaml_str(
        r#"
database:
  url: "sqlite://sessions.db"
session:
  advisory_lock: true
  gc_interval_secs: 0
"#,
    )
    .unwrap();

    assert_eq!(cfg.database.url.as_deref(), Some("sqlite://sessions.db"));
    assert!(cfg.session.advisory_lock);
    assert_eq!(cfg.session.cookie_name, "keel_session");
    assert_eq!(cfg.session.gc_interval().as_secs(), 1);
    assert_eq!(cfg.server.listen_addr, "127.0.0.1:8080");
}

#[test]
fn test_config_empty_yaml_is_default() {
    let cfg = Config::from_yaml_str("  \n").unwrap();
    assert_eq!(cfg.server.listen_addr, "127.0.0.1:8080");
}

#[test]
fn test_config_invalid_yaml() {
    let err = Config::from_yaml_str("session: [1, 2").unwrap_err();
    assert!(matches!(err, keel::Error::Config(_)));
}

#[test]
fn test_config_clone() {
    let cfg1 = Config::from_yaml_str("app:\n  admin_user: root").unwrap();
    let cfg2 = cfg1.clone();
    assert_eq!(cfg1.app.admin_user, cfg2.app.admin_user);
}
