//! File-backed loading of fleet and auth configuration.

use camino::Utf8PathBuf;
use imageroller::{AuthConfig, FleetConfig, FleetConfigError};
use rstest::{fixture, rstest};
use tempfile::TempDir;

#[fixture]
fn tmp() -> TempDir {
    TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"))
}

fn write_file(dir: &TempDir, name: &str, contents: &str) -> Utf8PathBuf {
    let path = Utf8PathBuf::from_path_buf(dir.path().join(name))
        .unwrap_or_else(|path| panic!("non UTF-8 temp path: {}", path.display()));
    std::fs::write(&path, contents).unwrap_or_else(|err| panic!("write {path}: {err}"));
    path
}

#[rstest]
fn loads_fleet_from_disk(tmp: TempDir) {
    let path = write_file(
        &tmp,
        "fleet.toml",
        concat!(
            "[DEFAULT]\nConcurrentWorkers = 3\nSaveTimeoutMinutes = 60\n",
            "RetainImageMinutes = 720\nRegion = \"ORD\"\n",
            "[\"db1.example.com\"]\nEnabled = true\n",
        ),
    );

    let fleet = FleetConfig::load(&path, None).unwrap_or_else(|err| panic!("load fleet: {err}"));

    assert_eq!(fleet.concurrent_workers.get(), 3);
    let names: Vec<&str> = fleet
        .servers
        .iter()
        .filter(|server| server.enabled)
        .map(|server| server.name.as_str())
        .collect();
    assert_eq!(names, ["db1.example.com"]);
}

#[rstest]
fn missing_fleet_file_reports_path(tmp: TempDir) {
    let path = Utf8PathBuf::from_path_buf(tmp.path().join("absent.toml"))
        .unwrap_or_else(|path| panic!("non UTF-8 temp path: {}", path.display()));

    let err = FleetConfig::load(&path, None).expect_err("file is missing");

    let FleetConfigError::Io { path: reported, .. } = &err else {
        panic!("expected Io error, got {err:?}");
    };
    assert_eq!(reported, &path);
}

#[rstest]
fn loads_credentials_from_disk(tmp: TempDir) {
    let path = write_file(&tmp, "auth.toml", "[AUTH]\nApiUser = \"ops\"\nApiKey = \"k3y\"\n");

    let auth = AuthConfig::load(&path).unwrap_or_else(|err| panic!("load auth: {err}"));

    assert_eq!(auth.credentials().username, "ops");
    assert_eq!(auth.credentials().api_key, "k3y");
}
