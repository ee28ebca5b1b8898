//! Integration tests for the evrtools CLI

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;

fn write_input(root: &Path) {
    for (chunk, type_dir, file, data) in [
        ("0", "10", "1", b"first file".as_slice()),
        ("0", "10", "2", b"second file".as_slice()),
        ("1", "beac1969cb7b8861", "3", b"texture".as_slice()),
    ] {
        let dir = root.join(chunk).join(type_dir);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(file), data).unwrap();
    }
}

fn build(input: &Path, output: &Path) {
    Command::cargo_bin("evrtools")
        .unwrap()
        .arg("build")
        .arg("--input")
        .arg(input)
        .arg("--output")
        .arg(output)
        .args(["--package", "pkg"])
        .assert()
        .success();
}

#[test]
fn test_help_command() {
    let mut cmd = Command::cargo_bin("evrtools").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Commands:"))
        .stdout(predicate::str::contains("extract"))
        .stdout(predicate::str::contains("build"));
}

#[test]
fn test_version_command() {
    let mut cmd = Command::cargo_bin("evrtools").unwrap();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("evrtools"));
}

#[test]
fn test_invalid_command() {
    let mut cmd = Command::cargo_bin("evrtools").unwrap();
    cmd.arg("invalid")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

#[test]
fn test_build_requires_output() {
    let input = tempfile::tempdir().unwrap();
    let mut cmd = Command::cargo_bin("evrtools").unwrap();
    cmd.arg("build")
        .arg("--input")
        .arg(input.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("--output"));
}

#[test]
fn test_build_then_extract() {
    let input = tempfile::tempdir().unwrap();
    write_input(input.path());
    let data = tempfile::tempdir().unwrap();
    build(input.path(), data.path());

    assert!(data.path().join("manifests/pkg").is_file());
    assert!(data.path().join("packages/pkg_0").is_file());

    let out = tempfile::tempdir().unwrap();
    Command::cargo_bin("evrtools")
        .unwrap()
        .arg("extract")
        .arg("--data")
        .arg(data.path())
        .args(["--package", "pkg"])
        .arg("--output")
        .arg(out.path())
        .assert()
        .success();

    assert_eq!(fs::read(out.path().join("10/1")).unwrap(), b"first file");
    assert_eq!(fs::read(out.path().join("10/2")).unwrap(), b"second file");
    assert_eq!(
        fs::read(out.path().join("beac1969cb7b8861/3")).unwrap(),
        b"texture"
    );
}

#[test]
fn test_extract_textures_only() {
    let input = tempfile::tempdir().unwrap();
    write_input(input.path());
    let data = tempfile::tempdir().unwrap();
    build(input.path(), data.path());

    let out = tempfile::tempdir().unwrap();
    Command::cargo_bin("evrtools")
        .unwrap()
        .arg("extract")
        .arg("--data")
        .arg(data.path())
        .args(["--package", "pkg", "--preserve-groups", "--export", "textures"])
        .arg("--output")
        .arg(out.path())
        .assert()
        .success();

    assert!(out.path().join("1/beac1969cb7b8861/3").is_file());
    assert!(!out.path().join("0").exists());
}

#[test]
fn test_non_empty_output_needs_force() {
    let input = tempfile::tempdir().unwrap();
    write_input(input.path());
    let output = tempfile::tempdir().unwrap();
    fs::write(output.path().join("existing"), b"x").unwrap();

    let mut cmd = Command::cargo_bin("evrtools").unwrap();
    cmd.arg("build")
        .arg("--input")
        .arg(input.path())
        .arg("--output")
        .arg(output.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("not empty"));

    let mut cmd = Command::cargo_bin("evrtools").unwrap();
    cmd.arg("build")
        .arg("--input")
        .arg(input.path())
        .arg("--output")
        .arg(output.path())
        .arg("--force")
        .assert()
        .success();
}

#[test]
fn test_quick_repack_in_place() {
    let input = tempfile::tempdir().unwrap();
    write_input(input.path());
    let data = tempfile::tempdir().unwrap();
    build(input.path(), data.path());

    let modified = tempfile::tempdir().unwrap();
    let dir = modified.path().join("0/10");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("2"), b"patched second file").unwrap();

    Command::cargo_bin("evrtools")
        .unwrap()
        .arg("build")
        .arg("--input")
        .arg(modified.path())
        .arg("--data")
        .arg(data.path())
        .args(["--package", "pkg", "--quick"])
        .assert()
        .success();

    assert!(data.path().join("manifests/pkg.bak").is_file());
    assert!(data.path().join("packages/pkg_1").is_file());

    let out = tempfile::tempdir().unwrap();
    Command::cargo_bin("evrtools")
        .unwrap()
        .arg("extract")
        .arg("--data")
        .arg(data.path())
        .args(["--package", "pkg"])
        .arg("--output")
        .arg(out.path())
        .assert()
        .success();
    assert_eq!(
        fs::read(out.path().join("10/2")).unwrap(),
        b"patched second file"
    );
    assert_eq!(fs::read(out.path().join("10/1")).unwrap(), b"first file");
}

#[test]
fn test_full_repack_to_new_directory() {
    let input = tempfile::tempdir().unwrap();
    write_input(input.path());
    let data = tempfile::tempdir().unwrap();
    build(input.path(), data.path());

    let modified = tempfile::tempdir().unwrap();
    let dir = modified.path().join("1/beac1969cb7b8861");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("3"), b"new texture bytes").unwrap();

    let output = tempfile::tempdir().unwrap();
    Command::cargo_bin("evrtools")
        .unwrap()
        .arg("build")
        .arg("--input")
        .arg(modified.path())
        .arg("--data")
        .arg(data.path())
        .arg("--output")
        .arg(output.path())
        .args(["--package", "pkg"])
        .assert()
        .success();

    let out = tempfile::tempdir().unwrap();
    Command::cargo_bin("evrtools")
        .unwrap()
        .arg("extract")
        .arg("--data")
        .arg(output.path())
        .args(["--package", "pkg", "--type", "0xBEAC1969CB7B8861"])
        .arg("--output")
        .arg(out.path())
        .assert()
        .success();
    assert_eq!(
        fs::read(out.path().join("beac1969cb7b8861/3")).unwrap(),
        b"new texture bytes"
    );
    assert!(!out.path().join("10").exists());
}
