use std::fs;
use std::path::Path;

use loaddata::LoaddataError;
use loaddata::charset::Charset;
use loaddata::persist::PersistenceMode;
use loaddata::settings::{Environment, LoadContext, Settings};
use tempfile::tempdir;

#[test]
fn defaults_apply_without_a_file() {
    let dir = tempdir().unwrap();
    let settings = Settings::from_file(&dir.path().join("missing.toml")).unwrap();
    assert_eq!(settings.app_id, "app");
    assert_eq!(settings.charset().unwrap(), Charset::Utf8);
    assert_eq!(settings.environment, Environment::Live);
    assert_eq!(settings.initial_data, "initial_data.json");
    assert_eq!(
        settings.persistence_mode(),
        PersistenceMode::File(Path::new(".").join("app.datastore.sqlite").to_string_lossy().into_owned())
    );
}

#[test]
fn file_overrides_defaults() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("loaddata.toml");
    fs::write(
        &file,
        r#"
app_id = "library"
default_charset = "latin-1"
datastore_dir = "/var/lib/library"
log_filter = "loaddata=debug"
initial_data = "fixtures/seed.json"
"#,
    )
    .unwrap();
    let settings = Settings::from_file(&file).unwrap();
    assert_eq!(settings.log_filter, "loaddata=debug");
    assert_eq!(settings.initial_data, "fixtures/seed.json");
    assert_eq!(
        settings.persistence_mode(),
        PersistenceMode::File(
            Path::new("/var/lib/library")
                .join("library.datastore.sqlite")
                .to_string_lossy()
                .into_owned()
        )
    );
    assert_eq!(
        settings.context().unwrap(),
        LoadContext {
            app_id: Some("library".to_string()),
            default_charset: Charset::Latin1,
        }
    );
}

#[test]
fn test_environment_uses_memory() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("loaddata.toml");
    fs::write(&file, "environment = \"test\"\n").unwrap();
    let settings = Settings::from_file(&file).unwrap();
    assert_eq!(settings.environment, Environment::Test);
    assert_eq!(settings.persistence_mode(), PersistenceMode::InMemory);
}

#[test]
fn unknown_charset_is_a_config_error() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("loaddata.toml");
    fs::write(&file, "default_charset = \"ebcdic\"\n").unwrap();
    assert!(matches!(Settings::from_file(&file), Err(LoaddataError::Config(_))));
}

#[test]
fn charset_names_and_aliases() {
    assert_eq!("UTF8".parse::<Charset>().unwrap(), Charset::Utf8);
    assert_eq!("ISO-8859-1".parse::<Charset>().unwrap(), Charset::Latin1);
    assert_eq!("us-ascii".parse::<Charset>().unwrap(), Charset::Ascii);
    assert_eq!(Charset::Latin1.to_string(), "iso-8859-1");
    assert!(Charset::Ascii.decode(b"caf\xe9").is_err());
    assert_eq!(Charset::Latin1.decode(b"caf\xe9").unwrap(), "café");
}
