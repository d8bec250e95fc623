use super::*;

use std::{
    env,
    time::{SystemTime, UNIX_EPOCH},
};

fn env_of(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn defaults_point_at_local_server() {
    let config = ClientConfig::from_sources(None, &HashMap::new()).expect("defaults");
    assert_eq!(config.server_url.as_str(), "http://localhost:9000/");
    assert_eq!(config.request_timeout, Duration::from_secs(120));
    assert_eq!(config.chat, ChatConfig::default());
    assert_eq!(config.chat.greeting.as_deref(), Some(DEFAULT_GREETING));
    assert_eq!(config.chat.canned_reply_delay, Duration::from_millis(500));
}

#[test]
fn file_values_override_defaults() {
    let raw = r#"
server_url = "https://study.example.edu"
request_timeout_secs = 30
show_greeting = false
canned_reply_delay_ms = 0
"#;
    let config = ClientConfig::from_sources(Some((Path::new("study_client.toml"), raw)), &HashMap::new())
        .expect("config");

    assert_eq!(config.server_url.as_str(), "https://study.example.edu/");
    assert_eq!(config.request_timeout, Duration::from_secs(30));
    assert_eq!(config.chat.greeting, None);
    assert_eq!(config.chat.canned_reply_delay, Duration::ZERO);
}

#[test]
fn env_overrides_file_and_app_prefix_wins() {
    let raw = r#"server_url = "http://file.example:9000""#;
    let env = env_of(&[
        ("STUDY_SERVER_URL", "http://plain.example:1"),
        ("APP__SERVER_URL", "http://app.example:2"),
        ("APP__REQUEST_TIMEOUT_SECS", "5"),
    ]);

    let config =
        ClientConfig::from_sources(Some((Path::new("study_client.toml"), raw)), &env).expect("config");

    assert_eq!(config.server_url.as_str(), "http://app.example:2/");
    assert_eq!(config.request_timeout, Duration::from_secs(5));
}

#[test]
fn non_numeric_env_values_are_ignored() {
    let env = env_of(&[
        ("APP__REQUEST_TIMEOUT_SECS", "soon"),
        ("APP__CANNED_REPLY_DELAY_MS", "-1"),
    ]);
    let config = ClientConfig::from_sources(None, &env).expect("config");
    assert_eq!(config.request_timeout, Duration::from_secs(120));
    assert_eq!(config.chat.canned_reply_delay, Duration::from_millis(500));
}

#[test]
fn rejects_non_http_server_urls() {
    let env = env_of(&[("STUDY_SERVER_URL", "ftp://files.example")]);
    let err = ClientConfig::from_sources(None, &env).expect_err("ftp");
    assert!(matches!(err, ConfigError::InvalidServerUrl { .. }));

    let err = ClientConfig::default()
        .with_server_url("localhost:9000/chat")
        .expect_err("no scheme");
    assert!(matches!(err, ConfigError::InvalidServerUrl { .. }));
}

#[test]
fn malformed_file_is_a_parse_error() {
    let err = ClientConfig::from_sources(
        Some((Path::new("broken.toml"), "server_url = [")),
        &HashMap::new(),
    )
    .expect_err("parse");
    assert!(matches!(err, ConfigError::Parse { .. }));
}

#[test]
fn explicit_missing_file_is_an_error() {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let path = env::temp_dir().join(format!("study_client_missing_{suffix}.toml"));

    let err = load_config(Some(&path)).expect_err("missing");
    assert!(matches!(err, ConfigError::Read { .. }));
}

#[test]
fn explicit_file_is_loaded_from_disk() {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let temp_root = env::temp_dir().join(format!("study_client_config_test_{suffix}"));
    fs::create_dir_all(&temp_root).expect("temp root");
    let path = temp_root.join("client.toml");
    fs::write(&path, "greeting = \"Welcome back\"\n").expect("write config");

    let config = load_config(Some(&path)).expect("load");
    assert_eq!(config.chat.greeting.as_deref(), Some("Welcome back"));

    fs::remove_dir_all(temp_root).expect("cleanup");
}

#[test]
fn show_greeting_false_wins_over_file_greeting() {
    let raw = r#"
greeting = "Welcome back"
show_greeting = false
"#;
    let config = ClientConfig::from_sources(Some((Path::new("study_client.toml"), raw)), &HashMap::new())
        .expect("config");
    assert_eq!(config.chat.greeting, None);
}
