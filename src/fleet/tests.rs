//! Unit tests for fleet and auth configuration parsing.

use std::time::Duration;

use rstest::rstest;

use super::*;

const FLEET: &str = r#"
[DEFAULT]
ConcurrentWorkers = 4
SaveTimeoutMinutes = 120
RetainImageMinutes = 1440
Region = "DFW"
Enabled = false

["server1.example.com"]
Enabled = true

["server2.example.com"]
Enabled = true
Region = "IAD"
RetainImageMinutes = 2880
ConcurrentWorkers = 99

["server3.example.com"]
"#;

fn parse(text: &str) -> FleetConfig {
    FleetConfig::parse(text, None)
        .unwrap_or_else(|err| panic!("fleet config should parse: {err}"))
}

#[rstest]
fn server_sections_inherit_defaults() {
    let config = parse(FLEET);

    assert_eq!(config.concurrent_workers.get(), 4);
    assert_eq!(config.servers.len(), 3);

    let first = &config.servers[0];
    assert_eq!(first.name, "server1.example.com");
    assert_eq!(first.region, "DFW");
    assert!(first.enabled);
    assert_eq!(first.save_timeout, Duration::from_secs(120 * 60));
    assert_eq!(first.retain_window, Duration::from_secs(1440 * 60));

    let second = &config.servers[1];
    assert_eq!(second.region, "IAD");
    assert_eq!(second.retain_window, Duration::from_secs(2880 * 60));
}

#[rstest]
fn enabled_defaults_to_false() {
    let config = parse(FLEET);
    let enabled: Vec<&str> = config
        .servers
        .iter()
        .filter(|server| server.enabled)
        .map(|server| server.name.as_str())
        .collect();
    assert_eq!(enabled, ["server1.example.com", "server2.example.com"]);
}

#[rstest]
fn select_enables_disabled_server() {
    let config = FleetConfig::parse(FLEET, Some("server3.example.com"))
        .unwrap_or_else(|err| panic!("server3 is configured: {err}"));

    assert_eq!(config.servers.len(), 1);
    assert_eq!(config.servers[0].name, "server3.example.com");
    assert_eq!(config.servers[0].region, "DFW");
    assert!(config.servers[0].enabled);
}

#[rstest]
#[case::among_servers(FLEET)]
#[case::without_servers("[DEFAULT]\nConcurrentWorkers = 1\n")]
fn select_rejects_unknown_server(#[case] text: &str) {
    let err = FleetConfig::parse(text, Some("invalid.example.com"))
        .expect_err("server is not configured");
    assert_eq!(
        err.to_string(),
        "The specified server is not configured: invalid.example.com"
    );
}

#[rstest]
fn selected_server_still_needs_workers() {
    let err = FleetConfig::parse("[\"a\"]\nRegion = \"DFW\"\n", Some("a"))
        .expect_err("ConcurrentWorkers is missing");
    assert_eq!(err.to_string(), "Config must contain ConcurrentWorkers");
}

#[rstest]
#[case::no_workers(
    "[DEFAULT]\nRegion = \"DFW\"\n[\"a\"]\n",
    "Config must contain ConcurrentWorkers"
)]
#[case::zero_workers(
    "[DEFAULT]\nConcurrentWorkers = 0\n[\"a\"]\n",
    "Concurrent workers must be greater than 0"
)]
#[case::negative_workers(
    "[DEFAULT]\nConcurrentWorkers = -2\n[\"a\"]\n",
    "Concurrent workers must be greater than 0"
)]
#[case::no_servers(
    "[DEFAULT]\nConcurrentWorkers = 1\n",
    "You must configure at least one server"
)]
#[case::no_save_timeout(
    "[DEFAULT]\nConcurrentWorkers = 1\n[\"a\"]\nRetainImageMinutes = 5\nRegion = \"DFW\"\n",
    "Server Config for a is missing SaveTimeoutMinutes"
)]
#[case::no_retention(
    "[DEFAULT]\nConcurrentWorkers = 1\n[\"a\"]\nSaveTimeoutMinutes = 5\nRegion = \"DFW\"\n",
    "Server Config for a is missing RetainImageMinutes"
)]
#[case::blank_region(
    "[DEFAULT]\nConcurrentWorkers = 1\nSaveTimeoutMinutes = 5\nRetainImageMinutes = 5\n[\"a\"]\nRegion = \"  \"\n",
    "Server Config for a is missing Region"
)]
fn invalid_fleet_reports_original_messages(#[case] text: &str, #[case] expected: &str) {
    let err = FleetConfig::parse(text, None).expect_err("configuration is invalid");
    assert_eq!(err.to_string(), expected);
}

#[rstest]
fn malformed_toml_is_a_parse_error() {
    let err = FleetConfig::parse("[DEFAULT\n", None).expect_err("not TOML");
    assert!(matches!(err, FleetConfigError::Parse(_)), "got {err:?}");
}

#[rstest]
fn auth_config_reads_credentials() {
    let auth = AuthConfig::parse("[AUTH]\nApiUser = \"ops\"\nApiKey = \" key-1 \"\n")
        .unwrap_or_else(|err| panic!("auth config should parse: {err}"));

    assert_eq!(auth.credentials().username, "ops");
    assert_eq!(auth.credentials().api_key, "key-1");
}

#[rstest]
#[case::no_section("[OTHER]\nApiUser = \"ops\"\n", "AuthConfig must contain [AUTH]")]
#[case::no_user("[AUTH]\nApiKey = \"k\"\n", "AuthConfig must contain ApiUser")]
#[case::blank_key("[AUTH]\nApiUser = \"ops\"\nApiKey = \"\"\n", "AuthConfig must contain ApiKey")]
fn invalid_auth_reports_original_messages(#[case] text: &str, #[case] expected: &str) {
    let err = AuthConfig::parse(text).expect_err("auth config is invalid");
    assert_eq!(err.to_string(), expected);
}
