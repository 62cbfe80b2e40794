use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn help_describes_the_host() {
    Command::cargo_bin("deskrig")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("backend service"));
}

#[test]
fn doctor_fails_on_missing_packaged_service() {
    let dir = tempfile::tempdir().unwrap();
    Command::cargo_bin("deskrig")
        .unwrap()
        .args(["doctor", "--mode", "production"])
        .arg("--install-root")
        .arg(dir.path())
        .arg("--resources")
        .arg(dir.path().join("resources"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("check(s) failed"));
}

#[test]
fn doctor_passes_with_packaged_service_present() {
    let dir = tempfile::tempdir().unwrap();
    let resources = dir.path().join("resources");
    let service_dir = resources.join("python-service");
    std::fs::create_dir_all(&service_dir).unwrap();
    #[cfg(windows)]
    let binary = service_dir.join("python-service.exe");
    #[cfg(not(windows))]
    let binary = service_dir.join("python-service");
    std::fs::write(&binary, "").unwrap();

    Command::cargo_bin("deskrig")
        .unwrap()
        .args(["doctor", "--mode", "production"])
        .arg("--install-root")
        .arg(dir.path())
        .arg("--resources")
        .arg(&resources)
        .assert()
        .success()
        .stdout(predicate::str::contains("All checks passed"));
}
