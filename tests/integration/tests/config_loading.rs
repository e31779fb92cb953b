//! Config file loading integration tests.

use serverwamp_core::config::Config;
use serverwamp_gateway::GatewayConfig;
use std::path::Path;
use tempfile::TempDir;

#[test]
fn test_config_written_and_reloaded() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("serverwamp.json5");

    let mut config = Config::default();
    config.server.port = 9090;
    config.server.agent_name = "roundtrip".to_string();
    std::fs::write(&path, config.to_json5().unwrap()).unwrap();

    let loaded = Config::load(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_json5_features_accepted() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("serverwamp.json5");
    std::fs::write(
        &path,
        r#"{
            // comments and trailing commas are fine
            server: { path: '/wamp', max_connections: 16, },
            logging: { json: true },
        }"#,
    )
    .unwrap();

    let loaded = Config::load(&path).unwrap();
    assert!(loaded.validate().is_ok());

    let gateway = GatewayConfig::from(&loaded.server);
    assert_eq!(gateway.path, "/wamp");
    assert_eq!(gateway.max_connections, 16);
    assert_eq!(gateway.port, 8080);
    assert!(loaded.logging.json);
}

#[test]
fn test_cli_loader_uses_explicit_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("custom.json5");
    std::fs::write(&path, "{ server: { agent_name: 'from-file' } }").unwrap();

    let config = serverwamp_cli::load_config(Some(&path)).unwrap();
    assert_eq!(config.server.agent_name, "from-file");
}

// The only test in this binary that touches HOME.
#[test]
fn test_broken_default_config_is_reported() {
    let home = TempDir::new().unwrap();
    let config_dir = home.path().join(".serverwamp");
    std::fs::create_dir_all(&config_dir).unwrap();
    std::env::set_var("HOME", home.path());

    let missing = serverwamp_cli::load_config(None).unwrap();
    assert_eq!(missing.server.agent_name, "serverwamp");

    std::fs::write(
        config_dir.join("serverwamp.json5"),
        r#"{ server: { port: "not a number" "#,
    )
    .unwrap();
    let err = serverwamp_cli::load_config(None).unwrap_err();
    assert!(
        format!("{:#}", err).contains("Parse error"),
        "unexpected error: {:#}",
        err
    );
}

#[test]
fn test_config_load_nonexistent() {
    assert!(Config::load(Path::new("/nonexistent/serverwamp.json5")).is_err());
}

#[test]
fn test_config_parse_invalid() {
    assert!(Config::parse("not valid json").is_err());
}
