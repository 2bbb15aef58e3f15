use crate::config::models::{AppConfig, KeySourceKind};
use std::io::Write;

#[test]
fn test_default_config() {
    let config = AppConfig::default();
    assert!(config.validate().is_ok());

    // 验证默认值
    assert_eq!(config.database.max_connections, 10);
    assert_eq!(config.auth.max_skew_seconds, 300);
    assert_eq!(config.agent.key_source, KeySourceKind::Environment);
    assert_eq!(config.agent.key_env_var, "FLEET_SVC_KEY");
    assert_eq!(config.observability.log_format, "pretty");
}

#[test]
fn test_config_from_toml() {
    let toml_content = r#"
[database]
url = "sqlite://test.db"
max_connections = 15
min_connections = 2
connection_timeout_seconds = 30
idle_timeout_seconds = 600
operation_timeout_seconds = 5

[auth]
max_skew_seconds = 60
service_name = "edge-agent"

[agent]
key_source = "ephemeral"
key_env_var = "FLEET_SVC_KEY"
poll_interval_seconds = 2
primary_ip = "10.0.0.5"
machine_uuid = "4c4c4544-0037"
"#;

    let config = AppConfig::from_toml(toml_content).unwrap();
    assert_eq!(config.database.max_connections, 15);
    assert_eq!(config.database.operation_timeout_seconds, 5);
    assert_eq!(config.auth.max_skew_seconds, 60);
    assert_eq!(config.auth.service_name, "edge-agent");
    assert_eq!(config.agent.key_source, KeySourceKind::Ephemeral);
    assert_eq!(config.agent.machine_uuid.as_deref(), Some("4c4c4544-0037"));
    // 未出现的段落使用默认值
    assert_eq!(config.observability.log_level, "info");
}

#[test]
fn test_config_toml_round_trip() {
    let config = AppConfig::default();
    let toml_str = config.to_toml().unwrap();
    let parsed = AppConfig::from_toml(&toml_str).unwrap();
    assert_eq!(parsed.database.url, config.database.url);
    assert_eq!(parsed.agent.poll_interval_seconds, config.agent.poll_interval_seconds);
}

#[test]
fn test_config_validation_rejects_bad_values() {
    let mut config = AppConfig::default();
    config.database.url = "postgresql://localhost/fleet".to_string();
    assert!(config.validate().is_err());

    let mut config = AppConfig::default();
    config.database.min_connections = 20;
    assert!(config.validate().is_err());

    let mut config = AppConfig::default();
    config.auth.max_skew_seconds = 0;
    assert!(config.validate().is_err());

    let mut config = AppConfig::default();
    config.agent.key_source = KeySourceKind::Provided;
    config.agent.key = None;
    assert!(config.validate().is_err());

    let mut config = AppConfig::default();
    config.observability.log_format = "xml".to_string();
    assert!(config.validate().is_err());
}

#[test]
fn test_load_from_file() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(
        file,
        r#"
[database]
url = "sqlite://from-file.db"
max_connections = 3
min_connections = 1
connection_timeout_seconds = 10
idle_timeout_seconds = 60
operation_timeout_seconds = 2
"#
    )
    .unwrap();

    let config = AppConfig::load(file.path().to_str()).unwrap();
    assert_eq!(config.database.url, "sqlite://from-file.db");
    assert_eq!(config.database.max_connections, 3);
    assert_eq!(config.auth.service_name, "fleet-agent");
}

#[test]
fn test_load_missing_file_fails() {
    let result = AppConfig::load(Some("/nonexistent/fleet.toml"));
    assert!(result.is_err());
}
