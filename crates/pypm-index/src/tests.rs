use super::*;

use std::io::{Read, Write};
use std::net::TcpListener;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use pypm_core::{CoreError, Environment, MirrorConfig, OutdatedRecord, PackageRecord};
use pypm_installer::{IndexVersions, Installer, InstallerError, InstallerOutput};

use crate::client::project_exists_for_status;
use crate::mirrors::parse_mirror_state_file;

#[derive(Default)]
struct QueryInstaller {
    outdated: Vec<OutdatedRecord>,
    versions: Option<IndexVersions>,
    failure: Option<InstallerError>,
    mirrors_seen: Mutex<Vec<String>>,
}

impl Installer for QueryInstaller {
    fn list_installed(&self, _: &Environment) -> Result<Vec<PackageRecord>, InstallerError> {
        Ok(Vec::new())
    }

    fn list_outdated(
        &self,
        _: &Environment,
        mirror: &MirrorConfig,
    ) -> Result<Vec<OutdatedRecord>, InstallerError> {
        self.mirrors_seen
            .lock()
            .expect("mirror log lock")
            .push(mirror.name.clone());
        match &self.failure {
            Some(err) => Err(err.clone()),
            None => Ok(self.outdated.clone()),
        }
    }

    fn index_versions(
        &self,
        _: &Environment,
        _: &str,
        mirror: &MirrorConfig,
    ) -> Result<Option<IndexVersions>, InstallerError> {
        self.mirrors_seen
            .lock()
            .expect("mirror log lock")
            .push(mirror.name.clone());
        match &self.failure {
            Some(err) => Err(err.clone()),
            None => Ok(self.versions.clone()),
        }
    }

    fn install(
        &self,
        _: &Environment,
        _: &str,
        _: &MirrorConfig,
    ) -> Result<InstallerOutput, InstallerError> {
        unreachable!("index client never installs")
    }

    fn upgrade(
        &self,
        _: &Environment,
        _: &str,
        _: &MirrorConfig,
    ) -> Result<InstallerOutput, InstallerError> {
        unreachable!("index client never upgrades")
    }

    fn uninstall(&self, _: &Environment, _: &str) -> Result<InstallerOutput, InstallerError> {
        unreachable!("index client never uninstalls")
    }
}

fn client_for(base: &str, installer: Arc<dyn Installer>) -> PypiIndexClient {
    PypiIndexClient::new(
        installer,
        IndexClientOptions {
            project_base: base.to_string(),
            timeout: Some(Duration::from_secs(5)),
        },
    )
    .expect("client must build")
}

/// Answers exactly one request with `status_line`, handing back the request
/// head it received.
fn serve_status_once(status_line: &'static str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("must bind stub index");
    let addr = listener.local_addr().expect("stub index must have address");
    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("must accept probe");
        let mut buffer = [0_u8; 4096];
        let read = stream.read(&mut buffer).unwrap_or(0);
        let response =
            format!("HTTP/1.1 {status_line}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
        let _ = stream.write_all(response.as_bytes());
        String::from_utf8_lossy(&buffer[..read]).into_owned()
    });
    (format!("http://{addr}"), handle)
}

fn closed_port_base() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("must bind");
    let addr = listener.local_addr().expect("must have address");
    drop(listener);
    format!("http://{addr}")
}

fn test_env() -> Environment {
    Environment::new("Python312", "/opt/Python312/python")
}

#[test]
fn exists_is_true_for_success_and_probes_project_page() {
    let (base, server) = serve_status_once("200 OK");
    let client = client_for(&base, Arc::new(QueryInstaller::default()));
    assert!(client.exists("requests").expect("probe must complete"));

    let request = server.join().expect("stub server must finish");
    assert!(
        request.starts_with("GET /project/requests/ HTTP/1.1"),
        "unexpected request: {request}"
    );
}

#[test]
fn exists_is_false_for_not_found() {
    let (base, server) = serve_status_once("404 Not Found");
    let client = client_for(&base, Arc::new(QueryInstaller::default()));
    assert!(!client
        .exists("nonexistent-xyz-pkg")
        .expect("probe must complete"));
    server.join().expect("stub server must finish");
}

#[test]
fn exists_fails_open_on_server_error() {
    let (base, server) = serve_status_once("500 Internal Server Error");
    let client = client_for(&base, Arc::new(QueryInstaller::default()));
    assert!(client.exists("requests").expect("probe must complete"));
    server.join().expect("stub server must finish");
}

#[test]
fn exists_reports_unreachable_index_on_transport_failure() {
    let client = client_for(&closed_port_base(), Arc::new(QueryInstaller::default()));
    let err = client
        .exists("requests")
        .expect_err("closed port must not look like a missing package");
    assert!(matches!(err, CoreError::IndexUnreachable { .. }));
}

#[test]
fn status_classification_only_treats_missing_resources_as_absent() {
    use reqwest::StatusCode;

    assert!(project_exists_for_status(StatusCode::OK));
    assert!(project_exists_for_status(StatusCode::FORBIDDEN));
    assert!(project_exists_for_status(StatusCode::TOO_MANY_REQUESTS));
    assert!(project_exists_for_status(StatusCode::SERVICE_UNAVAILABLE));
    assert!(!project_exists_for_status(StatusCode::NOT_FOUND));
    assert!(!project_exists_for_status(StatusCode::GONE));
}

#[test]
fn project_url_trims_trailing_slash_from_base() {
    let client = client_for("https://pypi.org/", Arc::new(QueryInstaller::default()));
    assert_eq!(
        client.project_url("requests"),
        "https://pypi.org/project/requests/"
    );
}

#[test]
fn outdated_maps_names_to_latest_versions_on_selected_mirror() {
    let installer = Arc::new(QueryInstaller {
        outdated: vec![
            OutdatedRecord {
                name: "requests".to_string(),
                version: "2.31.0".to_string(),
                latest_version: "2.32.3".to_string(),
            },
            OutdatedRecord {
                name: "pip".to_string(),
                version: "23.0".to_string(),
                latest_version: "24.2".to_string(),
            },
        ],
        ..QueryInstaller::default()
    });
    let client = client_for(DEFAULT_PROJECT_BASE, installer.clone());
    let mirror = MirrorConfig::new("tsinghua", "https://pypi.tuna.tsinghua.edu.cn/simple");

    let outdated = client
        .outdated(&test_env(), &mirror)
        .expect("outdated query must succeed");
    assert_eq!(outdated.len(), 2);
    assert_eq!(outdated.get("requests").map(String::as_str), Some("2.32.3"));
    assert_eq!(
        *installer.mirrors_seen.lock().expect("mirror log lock"),
        vec!["tsinghua".to_string()]
    );
}

#[test]
fn outdated_surfaces_unreachable_mirror() {
    let installer = Arc::new(QueryInstaller {
        failure: Some(InstallerError::IndexUnreachable {
            operation: pypm_core::Operation::ListOutdated,
            diagnostic: "Failed to establish a new connection".to_string(),
        }),
        ..QueryInstaller::default()
    });
    let client = client_for(DEFAULT_PROJECT_BASE, installer);
    let err = client
        .outdated(&test_env(), &MirrorConfig::pypi())
        .expect_err("must fail");
    assert!(matches!(err, CoreError::IndexUnreachable { .. }));
}

#[test]
fn outdated_failure_names_the_environment() {
    let installer = Arc::new(QueryInstaller {
        failure: Some(InstallerError::Failed {
            operation: pypm_core::Operation::ListOutdated,
            diagnostic: "ERROR: pip is broken".to_string(),
        }),
        ..QueryInstaller::default()
    });
    let client = client_for(DEFAULT_PROJECT_BASE, installer);
    let err = client
        .outdated(&test_env(), &MirrorConfig::pypi())
        .expect_err("must fail");
    assert_eq!(
        err,
        CoreError::OperationFailed {
            operation: pypm_core::Operation::ListOutdated,
            name: test_env().to_string(),
            diagnostic: "ERROR: pip is broken".to_string(),
        }
    );
    assert_eq!(
        err.to_string(),
        "check-updates 'Python312 (/opt/Python312/python)' failed: ERROR: pip is broken"
    );
}

#[test]
fn available_versions_reports_missing_package_on_mirror() {
    let client = client_for(DEFAULT_PROJECT_BASE, Arc::new(QueryInstaller::default()));
    let err = client
        .available_versions(&test_env(), &MirrorConfig::pypi(), "nonexistent-xyz-pkg")
        .expect_err("mirror without package must fail");
    assert_eq!(
        err,
        CoreError::PackageNotFound {
            name: "nonexistent-xyz-pkg".to_string()
        }
    );

    let versions = IndexVersions {
        name: "requests".to_string(),
        latest: "2.32.3".to_string(),
        versions: vec!["2.32.3".to_string(), "2.32.2".to_string()],
    };
    let client = client_for(
        DEFAULT_PROJECT_BASE,
        Arc::new(QueryInstaller {
            versions: Some(versions.clone()),
            ..QueryInstaller::default()
        }),
    );
    assert_eq!(
        client
            .available_versions(&test_env(), &MirrorConfig::pypi(), "requests")
            .expect("must list versions"),
        versions
    );
}

fn test_config_root() -> PathBuf {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let mut path = std::env::temp_dir();
    path.push(format!(
        "pypm-index-tests-{}-{}",
        std::process::id(),
        COUNTER.fetch_add(1, Ordering::SeqCst)
    ));
    let _ = std::fs::remove_dir_all(&path);
    path
}

#[test]
fn missing_config_yields_builtin_catalog() {
    let root = test_config_root();
    let store = MirrorStore::new(&root);
    let catalog = store.load_catalog().expect("must load builtin catalog");
    assert_eq!(catalog, MirrorCatalog::builtin());
    assert_eq!(catalog.default_mirror().name, "pypi");
}

#[test]
fn added_mirror_round_trips_through_config_file() {
    let root = test_config_root();
    let store = MirrorStore::new(&root);
    store
        .add_mirror(MirrorConfig::new("corp", "https://pypi.corp.example/simple"))
        .expect("must add mirror");
    store.set_default(Some("CORP")).expect("must set default");

    let catalog = store.load_catalog().expect("must load catalog");
    let corp = catalog.find("corp").expect("corp mirror must be listed");
    assert_eq!(corp.index_url, "https://pypi.corp.example/simple");
    assert_eq!(catalog.default_mirror().name, "corp");
    assert_eq!(catalog.mirrors().len(), 5);

    let raw = std::fs::read_to_string(store.config_path()).expect("must write config");
    assert!(raw.contains("default = \"corp\""));

    store.remove_mirror("corp").expect("must remove mirror");
    let catalog = store.load_catalog().expect("must reload catalog");
    assert!(catalog.find("corp").is_err());
    assert_eq!(catalog.default_mirror().name, "pypi");

    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn builtin_mirrors_cannot_be_shadowed_or_removed() {
    let root = test_config_root();
    let store = MirrorStore::new(&root);
    assert!(store
        .add_mirror(MirrorConfig::new("Tsinghua", "https://example.test/simple"))
        .is_err());
    assert!(store.remove_mirror("pypi").is_err());
    assert!(store.remove_mirror("unknown").is_err());
    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn duplicate_user_mirror_is_rejected() {
    let root = test_config_root();
    let store = MirrorStore::new(&root);
    store
        .add_mirror(MirrorConfig::new("corp", "https://pypi.corp.example/simple"))
        .expect("must add mirror");
    assert!(store
        .add_mirror(MirrorConfig::new("Corp", "https://other.example/simple"))
        .is_err());
    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn config_parser_validates_entries() {
    let valid = "version = 1\ndefault = \"ustc\"\n[[mirrors]]\nname = \"corp\"\nindex_url = \"https://pypi.corp.example/simple\"\n";
    let state = parse_mirror_state_file(valid).expect("must parse");
    assert_eq!(state.mirrors.len(), 1);

    for invalid in [
        "version = 2\n",
        "[[mirrors]]\nname = \"corp\"\nindex_url = \"ftp://example.test\"\n",
        "[[mirrors]]\nname = \"aliyun\"\nindex_url = \"https://example.test/simple\"\n",
        "[[mirrors]]\nname = \"a\"\nindex_url = \"https://a.test\"\n[[mirrors]]\nname = \"A\"\nindex_url = \"https://b.test\"\n",
        "[[mirrors]]\nname = \"corp\"\n",
    ] {
        assert!(
            parse_mirror_state_file(invalid).is_err(),
            "must reject {invalid:?}"
        );
    }
}

#[test]
fn unknown_default_in_config_is_an_error() {
    let root = test_config_root();
    std::fs::create_dir_all(&root).expect("must create root");
    let store = MirrorStore::new(&root);
    std::fs::write(store.config_path(), "version = 1\ndefault = \"nowhere\"\n")
        .expect("must write config");
    assert!(store.load_catalog().is_err());
    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn config_root_prefers_environment_override() {
    // Only checks the shape of the default; the override is exercised by the CLI.
    if std::env::var_os("PYPM_HOME").is_none() && std::env::var_os("HOME").is_some() {
        let root = default_config_root().expect("must resolve");
        if !cfg!(windows) {
            assert!(root.ends_with(".pypm"));
        }
    }
}
