use std::fs;

use taskview::config::{Config, CONFIG_FILE};
use taskview::error::Error;
use taskview::search::SearchSettings;

#[test]
fn load_from_dir_defaults_on_wrong_types() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join(CONFIG_FILE), "[search]\nlimit = \"many\"").expect("write config");

    let cfg = Config::load_from_dir(dir.path());
    assert_eq!(cfg.search.limit, 50);
    assert_eq!(cfg.user.id, "local");
}

#[test]
fn blank_user_id_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join(CONFIG_FILE);
    fs::write(&path, "[user]\nid = \"   \"").expect("write config");

    match Config::load(&path) {
        Err(Error::InvalidConfig(message)) => assert!(message.contains("user.id")),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn search_settings_follow_config() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join(CONFIG_FILE);
    fs::write(&path, "[search]\ndebounce_ms = 200\nmin_query_len = 4\nhistory_len = 2")
        .expect("write config");

    let cfg = Config::load(&path).expect("load config");
    let settings = SearchSettings::from(&cfg.search);
    assert_eq!(settings.debounce.as_millis(), 200);
    assert_eq!(settings.min_query_len, 4);
    assert_eq!(settings.history_len, 2);
}
