//! End-to-end pipeline tests against a local HTTP server.

#![cfg(unix)]

use std::fs;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use flate2::Compression;
use flate2::write::GzEncoder;
use semver::Version;
use sha2::{Digest, Sha256};
use spry_core::io::download::Fetcher;
use spry_core::{
    Catalog, Config, InstallError, Installer, Pipeline, Reporter, Stage, Verification,
};
use spry_schema::{Arch, Host, Os, PackageName};
use tempfile::TempDir;

fn tar(path: &str, data: &[u8]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    let mut header = tar::Header::new_gnu();
    header.set_size(data.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder.append_data(&mut header, path, data).unwrap();
    builder.into_inner().unwrap()
}

fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// A minimal `.deb` carrying one executable under `usr/bin`.
fn deb(binary: &str, script: &str) -> Vec<u8> {
    let data = gzip(&tar(&format!("./usr/bin/{binary}"), script.as_bytes()));
    let control = gzip(&tar("./control", format!("Package: {binary}\n").as_bytes()));
    let mut builder = ar::Builder::new(Vec::new());
    for (name, body) in [
        ("debian-binary", b"2.0\n".to_vec()),
        ("control.tar.gz", control),
        ("data.tar.gz", data),
    ] {
        let header = ar::Header::new(name.as_bytes().to_vec(), body.len() as u64);
        builder.append(&header, body.as_slice()).unwrap();
    }
    builder.into_inner().unwrap()
}

fn sha256(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn probe_script(banner: &str, code: i32) -> String {
    format!("#!/bin/sh\necho \"{banner}\"\nexit {code}\n")
}

#[derive(Default)]
struct RecordingReporter {
    events: Mutex<Vec<String>>,
}

impl RecordingReporter {
    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }

    fn events_for(&self, name: &str) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| e.strip_prefix(&format!("{name}:")).map(str::to_string))
            .collect()
    }
}

impl Reporter for RecordingReporter {
    fn resolved(&self, name: &PackageName, _: &Version, platform: &str, _: &str) {
        self.push(format!("{name}:resolved {platform}"));
    }
    fn downloading(&self, _: &PackageName, _: &Version, _: u64, _: Option<u64>) {}
    fn installing(&self, name: &PackageName, _: &Version) {
        self.push(format!("{name}:installing"));
    }
    fn verifying(&self, name: &PackageName, _: &Version) {
        self.push(format!("{name}:verifying"));
    }
    fn done(&self, name: &PackageName, _: &Version, detail: &str) {
        self.push(format!("{name}:done {detail}"));
    }
    fn failed(&self, name: &PackageName, _: &Version, _: &str) {
        self.push(format!("{name}:failed"));
    }
    fn info(&self, _: &str) {}
    fn warning(&self, msg: &str) {
        self.push(format!("warning:{msg}"));
    }
}

struct Harness {
    work: TempDir,
    bin_dir: std::path::PathBuf,
    reporter: Arc<RecordingReporter>,
    pipeline: Pipeline,
}

impl Harness {
    fn new(catalog: &str) -> Self {
        let work = TempDir::new().unwrap();
        let bin_dir = work.path().join("bin");
        let config = Config {
            bin_dir: bin_dir.clone(),
            max_attempts: 2,
            probe_timeout_secs: 10,
            jobs: 4,
            ..Config::default()
        };
        let reporter = Arc::new(RecordingReporter::default());
        let fetcher = Fetcher::from_config(&config)
            .unwrap()
            .with_retry_base(Duration::from_millis(1))
            .with_scratch_dir(work.path().join("fetch"));
        let pipeline = Pipeline::new(
            Catalog::from_toml_str(catalog).unwrap(),
            &config,
            reporter.clone(),
        )
        .unwrap()
        .with_host(Host::new(Os::Linux, Arch::Amd64))
        .with_fetcher(fetcher)
        .with_installer(Installer::new(&bin_dir).with_scratch_dir(work.path().join("unpack")));

        Self {
            work,
            bin_dir,
            reporter,
            pipeline,
        }
    }

    fn scratch_is_empty(&self) -> bool {
        ["fetch", "unpack"].iter().all(|d| {
            let dir = self.work.path().join(d);
            !dir.exists() || fs::read_dir(dir).unwrap().next().is_none()
        })
    }
}

fn package_toml(name: &str, version: &str, url: &str, digest: &str, format: &str) -> String {
    format!(
        r#"
[[package]]
name = "{name}"
version = "{version}"

[[package.artifact]]
os = "linux"
url = "{url}"
sha256 = "{digest}"
format = "{format}"
binary = "{name}"
"#
    )
}

fn assert_executable(path: &Path) {
    let mode = fs::metadata(path).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o755, "{}", path.display());
}

#[tokio::test]
async fn sqlpage_deb_installs_and_verifies() {
    let mut server = mockito::Server::new_async().await;
    let artifact = deb("spry-sqlpage", &probe_script("spry-sqlpage 0.1.0", 0));
    let mock = server
        .mock("GET", "/v0.1.0/spry-sqlpage_0.1.0_amd64.deb")
        .with_body(&artifact)
        .expect(1)
        .create_async()
        .await;

    let url = format!("{}/v0.1.0/spry-sqlpage_0.1.0_amd64.deb", server.url());
    let h = Harness::new(&package_toml(
        "spry-sqlpage",
        "0.1.0",
        &url,
        &sha256(&artifact),
        "debian-package",
    ));

    let report = h.pipeline.install_package("spry-sqlpage").await.unwrap();
    mock.assert_async().await;

    assert_eq!(report.path, h.bin_dir.join("spry-sqlpage"));
    assert_eq!(report.platform, "linux/any");
    assert_eq!(report.url, url);
    assert!(!report.replaced);
    assert_eq!(
        report.verification,
        Verification::Passed("spry-sqlpage 0.1.0".to_string())
    );
    assert_executable(&report.path);
    assert!(h.scratch_is_empty());

    assert_eq!(
        h.reporter.events_for("spry-sqlpage"),
        vec![
            "resolved linux/any",
            "installing",
            "verifying",
            "done spry-sqlpage 0.1.0",
        ]
    );

    // Already installed: the verify command path probes the same binary.
    let banner = h.pipeline.verify_package("spry-sqlpage").await.unwrap();
    assert_eq!(banner, "spry-sqlpage 0.1.0");
}

#[tokio::test]
async fn concurrent_installs_share_one_bin_dir() {
    let mut server = mockito::Server::new_async().await;
    let sqlpage = deb("spry-sqlpage", &probe_script("sqlpage", 0));
    let runbook = gzip(&tar("spry-runbook", probe_script("runbook", 0).as_bytes()));
    let _sqlpage_mock = server
        .mock("GET", "/sqlpage.deb")
        .with_body(&sqlpage)
        .create_async()
        .await;
    let _runbook_mock = server
        .mock("GET", "/runbook.tar.gz")
        .with_body(&runbook)
        .create_async()
        .await;

    let catalog = format!(
        "{}{}",
        package_toml(
            "spry-sqlpage",
            "0.1.0",
            &format!("{}/sqlpage.deb", server.url()),
            &sha256(&sqlpage),
            "debian-package",
        ),
        package_toml(
            "spry-runbook",
            "0.1.1",
            &format!("{}/runbook.tar.gz", server.url()),
            &sha256(&runbook),
            "tarball",
        ),
    );
    let h = Harness::new(&catalog);

    let results = h
        .pipeline
        .install_many(&["spry-sqlpage", "spry-runbook"])
        .await;
    assert_eq!(results.len(), 2);

    let first = results[0].as_ref().unwrap();
    let second = results[1].as_ref().unwrap();
    assert_eq!(first.package, "spry-sqlpage");
    assert_eq!(second.package, "spry-runbook");
    assert!(first.verification.passed() && second.verification.passed());

    assert_executable(&h.bin_dir.join("spry-sqlpage"));
    assert_executable(&h.bin_dir.join("spry-runbook"));
    let mut entries: Vec<_> = fs::read_dir(&h.bin_dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    entries.sort();
    assert_eq!(entries, ["spry-runbook", "spry-sqlpage"]);
}

#[tokio::test]
async fn failing_probe_keeps_binary_with_warning() {
    let mut server = mockito::Server::new_async().await;
    let artifact = deb("spry-runbook", &probe_script("broken", 2));
    let _mock = server
        .mock("GET", "/runbook.deb")
        .with_body(&artifact)
        .create_async()
        .await;

    let h = Harness::new(&package_toml(
        "spry-runbook",
        "0.1.1",
        &format!("{}/runbook.deb", server.url()),
        &sha256(&artifact),
        "debian-package",
    ));

    let report = h.pipeline.install_package("spry-runbook").await.unwrap();
    assert!(!report.verification.passed());
    assert!(report.path.exists());

    let warnings = h.reporter.events_for("warning");
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("verification failed"), "{warnings:?}");

    let failure = h.pipeline.verify_package("spry-runbook").await.unwrap_err();
    assert_eq!(failure.stage(), Stage::Verify);
}

#[tokio::test]
async fn digest_mismatch_leaves_nothing_behind() {
    let mut server = mockito::Server::new_async().await;
    let artifact = deb("spry-sqlpage", &probe_script("x", 0));
    let _mock = server
        .mock("GET", "/tampered.deb")
        .with_body(b"tampered bytes")
        .expect(1)
        .create_async()
        .await;

    let h = Harness::new(&package_toml(
        "spry-sqlpage",
        "0.1.0",
        &format!("{}/tampered.deb", server.url()),
        &sha256(&artifact),
        "debian-package",
    ));

    let failure = h.pipeline.install_package("spry-sqlpage").await.unwrap_err();
    assert_eq!(failure.stage(), Stage::Fetch);
    assert!(matches!(failure.error, InstallError::ChecksumMismatch { .. }));
    assert!(!h.bin_dir.join("spry-sqlpage").exists());
    assert!(h.scratch_is_empty());
    let events = h.reporter.events_for("spry-sqlpage");
    assert_eq!(events.last().unwrap(), "failed");
    assert_eq!(events.iter().filter(|e| *e == "failed").count(), 1, "{events:?}");
}

#[tokio::test]
async fn unlaunchable_binary_is_rolled_back() {
    let mut server = mockito::Server::new_async().await;
    // Executable bit set, but neither a native binary nor a script.
    let artifact = deb("spry-runbook", "\u{0}\u{1}not a program");
    let _mock = server
        .mock("GET", "/runbook.deb")
        .with_body(&artifact)
        .create_async()
        .await;

    let h = Harness::new(&package_toml(
        "spry-runbook",
        "0.1.1",
        &format!("{}/runbook.deb", server.url()),
        &sha256(&artifact),
        "debian-package",
    ));
    let target = h.bin_dir.join("spry-runbook");

    // Fresh install: the placed file is removed again.
    let failure = h.pipeline.install_package("spry-runbook").await.unwrap_err();
    assert_eq!(failure.stage(), Stage::Verify);
    assert!(matches!(failure.error, InstallError::ExecutionError { .. }), "{failure}");
    assert!(!target.exists());

    // Upgrade: the previous binary comes back untouched.
    fs::create_dir_all(&h.bin_dir).unwrap();
    fs::write(&target, probe_script("spry-runbook 0.1.0", 0)).unwrap();
    fs::set_permissions(&target, fs::Permissions::from_mode(0o755)).unwrap();

    let failure = h.pipeline.install_package("spry-runbook").await.unwrap_err();
    assert!(matches!(failure.error, InstallError::ExecutionError { .. }), "{failure}");
    assert_eq!(
        fs::read_to_string(&target).unwrap(),
        probe_script("spry-runbook 0.1.0", 0)
    );
    let entries: Vec<_> = fs::read_dir(&h.bin_dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    assert_eq!(entries, ["spry-runbook"]);
    assert_eq!(
        h.reporter.events_for("spry-runbook").last().unwrap(),
        "failed"
    );
}

#[tokio::test]
async fn deb_without_declared_binary_is_corrupt() {
    let mut server = mockito::Server::new_async().await;
    let artifact = deb("something-else", &probe_script("x", 0));
    let _mock = server
        .mock("GET", "/pkg.deb")
        .with_body(&artifact)
        .create_async()
        .await;

    let h = Harness::new(&package_toml(
        "spry-sqlpage",
        "0.1.0",
        &format!("{}/pkg.deb", server.url()),
        &sha256(&artifact),
        "debian-package",
    ));

    let failure = h.pipeline.install_package("spry-sqlpage").await.unwrap_err();
    assert_eq!(failure.stage(), Stage::Install);
    assert!(
        failure.to_string().contains("usr/bin/something-else"),
        "{failure}"
    );
    assert!(!h.bin_dir.exists() || fs::read_dir(&h.bin_dir).unwrap().next().is_none());
    assert!(h.scratch_is_empty());
}
