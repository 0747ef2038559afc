use super::{build_settings, normalize_database_url, prepare_database_url, Settings};
use config::{File, FileFormat};

#[test]
fn normalizes_plain_file_path_to_sqlite_url() {
    assert_eq!(
        normalize_database_url("./data/test.db"),
        "sqlite://./data/test.db"
    );
}

#[test]
fn creates_parent_dir_for_relative_sqlite_url() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let db_path = temp_root.path().join("data").join("test.db");

    prepare_database_url(db_path.to_string_lossy().as_ref()).expect("prepare db url");
    assert!(temp_root.path().join("data").exists());
}

#[test]
fn keeps_windows_absolute_path_with_single_sqlite_colon() {
    assert_eq!(
        normalize_database_url("sqlite:C:\\Users\\alice\\test.db"),
        "sqlite:C:/Users/alice/test.db"
    );
}

#[test]
fn normalizes_windows_plain_path_with_single_sqlite_colon() {
    assert_eq!(
        normalize_database_url("C:\\Users\\alice\\test.db"),
        "sqlite:C:/Users/alice/test.db"
    );
}

#[test]
fn converts_sqlite_double_slash_windows_path() {
    assert_eq!(
        normalize_database_url("sqlite://C:/Users/alice/test.db"),
        "sqlite:C:/Users/alice/test.db"
    );
}

#[tokio::test]
async fn prepared_database_url_creates_openable_sqlite_file() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let db_path = temp_root.path().join("nested").join("lms.db");

    let prepared = prepare_database_url(db_path.to_string_lossy().as_ref()).expect("prepare");
    let storage = storage::Storage::new(&prepared).await.expect("open sqlite");
    drop(storage);

    assert!(
        db_path.exists(),
        "database file should be created: {}",
        db_path.display()
    );
}

fn settings_from_toml(raw: &str) -> anyhow::Result<Settings> {
    build_settings(File::from_str(raw, FileFormat::Toml))
}

#[test]
fn empty_file_keeps_defaults() {
    let settings = settings_from_toml("").expect("settings");
    let defaults = Settings::default();
    assert_eq!(settings.bind_addr, defaults.bind_addr);
    assert_eq!(settings.staff_code, "DBBLMS");
    assert_eq!(settings.session_ttl_seconds, 12 * 3600);
}

#[test]
fn file_values_override_defaults() {
    let mut table = toml::Table::new();
    table.insert("bind_addr".into(), toml::Value::String("0.0.0.0:9000".into()));
    table.insert("staff_code".into(), toml::Value::String("CAMPUS".into()));
    table.insert("session_ttl_seconds".into(), toml::Value::Integer(600));
    let raw = toml::to_string(&table).expect("toml");

    let settings = settings_from_toml(&raw).expect("settings");
    assert_eq!(settings.bind_addr, "0.0.0.0:9000");
    assert_eq!(settings.staff_code, "CAMPUS");
    assert_eq!(settings.session_ttl_seconds, 600);
    assert_eq!(settings.database_url, Settings::default().database_url);
}

#[test]
fn non_positive_session_ttl_is_rejected() {
    let err = settings_from_toml("session_ttl_seconds = 0").expect_err("should fail");
    assert!(err.to_string().contains("session_ttl_seconds"));
}
