//! Behavioural smoke tests for the `imgcull` binary.

use std::path::Path;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::str::contains;
use tempfile::TempDir;

fn isolated_cmd(home: &Path) -> Command {
    let mut cmd = cargo_bin_cmd!("imgcull");
    cmd.current_dir(home)
        .env("HOME", home)
        .env("XDG_CONFIG_HOME", home)
        .env_remove("IMGCULL_CONFIG_PATH")
        .env_remove("IMGCULL_RETAIN_COUNT")
        .env_remove("IMGCULL_RETAIN_DAYS")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn cli_requires_retention_settings() {
    let home = TempDir::new().expect("temp home");

    isolated_cmd(home.path())
        .assert()
        .failure()
        .code(1)
        .stdout("")
        .stderr(contains("IMGCULL_RETAIN_COUNT"));
}

#[test]
fn cli_reports_unavailable_scw_binary() {
    let home = TempDir::new().expect("temp home");
    let missing = home.path().join("no-such-scw");

    isolated_cmd(home.path())
        .args(["--retain-count", "1", "--retain-days", "30", "--scw-bin"])
        .arg(&missing)
        .assert()
        .failure()
        .code(1)
        .stderr(contains("failed to list owned images"));
}

#[cfg(unix)]
mod fake_scw {
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};

    use imgcull::test_support::{json_image, json_images};
    use predicates::str::contains;
    use tempfile::TempDir;

    use super::isolated_cmd;

    const SCRIPT: &str = r#"#!/bin/sh
echo "$*" >> "$FAKE_SCW_LOG"
case "$*" in
  *"image list"*)
    cat "$FAKE_SCW_IMAGES"
    ;;
  *"delete $FAKE_SCW_FAIL_ID "*)
    echo "resource is in use" >&2
    exit 1
    ;;
esac
exit 0
"#;

    struct FakeScw {
        dir: TempDir,
        bin: PathBuf,
        log: PathBuf,
        images: PathBuf,
    }

    impl FakeScw {
        fn new() -> Self {
            let dir = TempDir::new().expect("temp dir");
            let bin = dir.path().join("scw");
            fs::write(&bin, SCRIPT).expect("write fake scw");
            fs::set_permissions(&bin, fs::Permissions::from_mode(0o755))
                .expect("make fake scw executable");

            let images = dir.path().join("images.json");
            fs::write(
                &images,
                json_images(&[
                    json_image(
                        "app-1",
                        "app.v1",
                        "2020-01-01T00:00:00.000000+00:00",
                        Some("snap-1"),
                        &[],
                    ),
                    json_image(
                        "app-2",
                        "app.v2",
                        "2020-02-01T00:00:00.000000+00:00",
                        Some("snap-2"),
                        &["snap-2b"],
                    ),
                    json_image(
                        "app-3",
                        "app.v3",
                        "2020-03-01T00:00:00.000000+00:00",
                        Some("snap-3"),
                        &[],
                    ),
                ]),
            )
            .expect("write image listing");

            let log = dir.path().join("scw.log");
            Self {
                dir,
                bin,
                log,
                images,
            }
        }

        fn home(&self) -> &Path {
            self.dir.path()
        }

        fn cmd(&self, fail_id: &str) -> assert_cmd::Command {
            let mut cmd = isolated_cmd(self.home());
            cmd.env("FAKE_SCW_LOG", &self.log)
                .env("FAKE_SCW_IMAGES", &self.images)
                .env("FAKE_SCW_FAIL_ID", fail_id)
                .args(["--retain-count", "1", "--retain-days", "30", "--scw-bin"])
                .arg(&self.bin);
            cmd
        }

        fn log(&self) -> String {
            fs::read_to_string(&self.log).expect("read fake scw log")
        }
    }

    #[test]
    fn cli_deletes_aged_images_and_snapshots() {
        let scw = FakeScw::new();

        scw.cmd("none")
            .assert()
            .success()
            .stdout(contains("deleted app.v1"))
            .stdout(contains("deleted app.v2"))
            .stdout(contains("cleanup complete: deleted_images=2, failed_images=0"));

        let log = scw.log();
        assert!(log.contains("instance image list public=false zone=fr-par-1 -o json"));
        assert!(log.contains("instance image delete app-1 zone=fr-par-1"));
        assert!(log.contains("instance snapshot delete snap-2b zone=fr-par-1"));
        assert!(!log.contains("app-3"), "retained image must not be touched");
    }

    #[test]
    fn cli_signals_incomplete_cleanup() {
        let scw = FakeScw::new();

        scw.cmd("app-2")
            .assert()
            .code(2)
            .stdout(contains("deleted app.v1"))
            .stdout(contains("failed_images=1"))
            .stderr(contains("1 of 2 images were not fully deleted: app.v2"));

        let log = scw.log();
        assert!(
            !log.contains("snapshot delete snap-2"),
            "snapshots of an image that failed to deregister must be kept"
        );
    }
}
