//! End-to-end scenarios for the scan pipeline, driven against the
//! compiled binary with real temporary trees, using the bundled
//! `StubEngine` so they run deterministically without a signature
//! database (§10.4, §8).

use std::fs;
use std::process::{Command, Output};

use tempfile::tempdir;

const EICAR: &str = "X5O!P%@AP[4\\PZX54(P^)7CC)7}$EICAR-STANDARD-ANTIVIRUS-TEST-FILE!$H+H*";

fn vigilscan(args: &[&str]) -> Output {
    Command::new("cargo")
        .args(["run", "--package", "vigil-cli", "--quiet", "--"])
        .args(args)
        .output()
        .expect("failed to execute vigilscan")
}

#[test]
fn single_clean_file_prints_ok_and_summary() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("hello.txt");
    fs::write(&path, b"just some harmless bytes").unwrap();

    let output = vigilscan(&[path.to_str().unwrap()]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains(": OK"));
    assert!(stdout.contains("scanned: 1"));
    assert!(stdout.contains("infected: 0"));
    assert!(stdout.contains("errors: 0"));
}

#[test]
fn empty_directory_produces_no_file_lines() {
    let dir = tempdir().unwrap();

    let output = vigilscan(&[dir.path().to_str().unwrap()]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(!stdout.contains(": OK"));
    assert!(!stdout.contains("FOUND"));
    assert!(stdout.contains("scanned: 0"));
    assert!(stdout.contains("infected: 0"));
    assert!(stdout.contains("errors: 0"));
}

#[test]
fn mixed_tree_reports_clean_and_infected_files() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a.txt"), b"clean").unwrap();
    fs::create_dir(dir.path().join("sub")).unwrap();
    fs::write(dir.path().join("sub").join("b.txt"), b"clean too").unwrap();
    fs::write(dir.path().join("sub").join("c.bin"), EICAR.as_bytes()).unwrap();

    let output = vigilscan(&[dir.path().to_str().unwrap(), "4"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("a.txt: OK"));
    assert!(stdout.contains("b.txt: OK"));
    assert!(stdout.contains("c.bin: Eicar-Test-Signature FOUND"));
    // An infected file still counts toward `scanned` (result.rs's
    // `record_infected`): 2 clean + 1 infected = 3.
    assert!(stdout.contains("scanned: 3"));
    assert!(stdout.contains("infected: 1"));
    assert!(stdout.contains("errors: 0"));
}

#[test]
fn unreadable_subdirectory_is_skipped_but_run_still_succeeds() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("good.txt"), b"clean").unwrap();
    let denied = dir.path().join("denied");
    fs::create_dir(&denied).unwrap();

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&denied, fs::Permissions::from_mode(0o000)).unwrap();
    }

    let output = vigilscan(&[dir.path().to_str().unwrap()]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    // Restore permissions so the tempdir can clean itself up.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&denied, fs::Permissions::from_mode(0o755)).unwrap();
    }

    assert!(output.status.success());
    assert!(stdout.contains("good.txt: OK"));
    assert!(stdout.contains("scanned: 1"));
    assert!(stdout.contains("infected: 0"));
}

#[test]
fn quiet_flag_suppresses_clean_lines_but_keeps_summary() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a.txt"), b"clean").unwrap();
    fs::write(dir.path().join("b.bin"), EICAR.as_bytes()).unwrap();

    let output = vigilscan(&["--quiet", dir.path().to_str().unwrap()]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(!stdout.contains(": OK"));
    assert!(stdout.contains("b.bin: Eicar-Test-Signature FOUND"));
    // 1 clean + 1 infected = 2 scanned.
    assert!(stdout.contains("scanned: 2"));
    assert!(stdout.contains("infected: 1"));
}
