//! Integration tests for narkeep

mod cli_tests {
    use assert_cmd::Command;
    use predicates::prelude::*;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    const A: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    const B: &str = "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

    fn narkeep() -> Command {
        Command::cargo_bin("narkeep").unwrap()
    }

    fn write_record(dir: &Path, hash: &str, url: &str, deriver: Option<&str>) {
        let mut text = format!(
            "StorePath: /nix/store/{hash}-pkg\nURL: {url}\nNarHash: sha256:{hash}\nNarSize: 9\nCompression: none\n"
        );
        if let Some(deriver) = deriver {
            text.push_str(&format!("Deriver: {deriver}\n"));
        }
        fs::write(dir.join(format!("{hash}.narinfo")), text).unwrap();
    }

    /// Store with A (payload present) and B (payload missing)
    fn scaffold_store() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("nar")).unwrap();
        write_record(dir.path(), A, &format!("nar/{A}.nar"), None);
        write_record(
            dir.path(),
            B,
            &format!("nar/{B}.nar"),
            Some(&format!("/nix/store/{A}-pkg.drv")),
        );
        fs::write(dir.path().join(format!("nar/{A}.nar")), b"payload a").unwrap();
        dir
    }

    #[test]
    fn help_displays() {
        narkeep()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("maintain Nix NAR binary caches"));
    }

    #[test]
    fn version_displays() {
        narkeep()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("narkeep"));
    }

    #[test]
    fn rejects_missing_store_dir() {
        narkeep()
            .args(["/does/not/exist", "check"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Not a NAR store directory"));
    }

    #[test]
    fn invalid_hash_flag_fails_with_hint() {
        let store = scaffold_store();
        narkeep()
            .args([store.path().to_str().unwrap(), "check", "--hash", "nope"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Error:"))
            .stderr(predicate::str::contains("Hint:"));
    }

    #[test]
    fn check_reports_missing_payloads() {
        let store = scaffold_store();
        narkeep()
            .args([store.path().to_str().unwrap(), "check"])
            .assert()
            .success()
            .stdout(predicate::str::contains(format!("{B}.narinfo")))
            .stdout(predicate::str::contains(format!("{A}.narinfo")).not());
    }

    #[test]
    fn get_lists_hashes() {
        let store = scaffold_store();
        narkeep()
            .args([store.path().to_str().unwrap(), "get", "--listhashes"])
            .assert()
            .success()
            .stdout(predicate::str::contains(A))
            .stdout(predicate::str::contains(B));
    }

    #[test]
    fn get_lists_relative_files() {
        let store = scaffold_store();
        narkeep()
            .args([store.path().to_str().unwrap(), "get", "--relative"])
            .assert()
            .success()
            .stdout(predicate::str::contains(format!("{A}.narinfo")))
            .stdout(predicate::str::contains(format!("nar/{A}.nar")));
    }

    #[test]
    fn drvs_lists_derivers() {
        let store = scaffold_store();
        narkeep()
            .args([store.path().to_str().unwrap(), "drvs"])
            .assert()
            .success()
            .stdout(predicate::str::contains(format!("/nix/store/{A}-pkg.drv")));
    }

    #[test]
    fn orphans_lists_stray_payloads() {
        let store = scaffold_store();
        fs::write(store.path().join("nar/stray.nar"), b"unreferenced").unwrap();
        narkeep()
            .args([store.path().to_str().unwrap(), "orphans"])
            .assert()
            .success()
            .stdout(predicate::str::contains("stray.nar"))
            .stdout(predicate::str::contains(format!("{A}.nar")).not());
    }

    #[test]
    fn cache_probes_local_mirror() {
        let store = scaffold_store();
        let mirror = TempDir::new().unwrap();
        write_record(mirror.path(), A, &format!("nar/{A}.nar"), None);

        narkeep()
            .args([
                store.path().to_str().unwrap(),
                "cache",
                "--caches",
                mirror.path().to_str().unwrap(),
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains(A))
            .stdout(predicate::str::contains(B).not());
    }

    #[test]
    fn fetch_from_local_mirror() {
        let mirror = TempDir::new().unwrap();
        fs::create_dir(mirror.path().join("nar")).unwrap();
        write_record(mirror.path(), A, &format!("nar/{A}.nar"), None);
        fs::write(mirror.path().join(format!("nar/{A}.nar")), b"mirrored").unwrap();

        let store = TempDir::new().unwrap();
        let input = store.path().join("hashes.txt");
        fs::write(&input, format!("{A}\n")).unwrap();

        narkeep()
            .args([
                store.path().to_str().unwrap(),
                "fetch",
                "--caches",
                mirror.path().to_str().unwrap(),
                "--input",
                input.to_str().unwrap(),
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains("fetched 1 of 1"));

        assert!(store.path().join(format!("{A}.narinfo")).is_file());
        assert_eq!(
            fs::read(store.path().join(format!("nar/{A}.nar"))).unwrap(),
            b"mirrored"
        );
    }

    #[test]
    fn compress_reports_size_totals() {
        let store = scaffold_store();
        let input = store.path().join("hashes.txt");
        fs::write(&input, format!("{A}\n")).unwrap();

        narkeep()
            .args([
                store.path().to_str().unwrap(),
                "compress",
                "--compression",
                "none",
                "--input",
                input.to_str().unwrap(),
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains("Old size:"))
            .stdout(predicate::str::contains("New size:"));
    }

    #[test]
    fn compress_rejects_unknown_target() {
        let store = scaffold_store();
        let input = store.path().join("hashes.txt");
        fs::write(&input, format!("{A}\n")).unwrap();

        narkeep()
            .args([
                store.path().to_str().unwrap(),
                "compress",
                "--compression",
                "bzip2",
                "--input",
                input.to_str().unwrap(),
            ])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Unsupported compression"));
    }

    #[test]
    fn config_file_overrides_nar_dir() {
        let store = TempDir::new().unwrap();
        fs::create_dir(store.path().join("payloads")).unwrap();
        fs::write(store.path().join("payloads/stray.nar"), b"x").unwrap();

        let config = store.path().join("config.toml");
        fs::write(&config, "[store]\nnar_dir = \"payloads\"\n").unwrap();

        narkeep()
            .env("NARKEEP_CONFIG", config.to_str().unwrap())
            .args([store.path().to_str().unwrap(), "orphans"])
            .assert()
            .success()
            .stdout(predicate::str::contains("stray.nar"));
    }
}
