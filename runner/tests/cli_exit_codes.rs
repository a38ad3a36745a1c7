//! CLI tests for process exit codes.
//!
//! Spawns the runner binary against a private `PATH` holding a fake
//! `fastlane` script so no Ruby toolchain is needed.

use std::process::Command;

use fastlane_runner::exit_codes;

fn runner() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_fastlane-runner"));
    for key in [
        "lane",
        "work_dir",
        "update_fastlane",
        "use_bundler",
        "enable_cache",
        "verbose_log",
        "apple_id",
        "password",
        "app_password",
        "fastlane_session",
        "api_key_path",
        "FASTLANE_RUNNER_SETTINGS",
    ] {
        cmd.env_remove(key);
    }
    cmd
}

#[test]
fn missing_lane_exits_with_failure() {
    let temp = tempfile::tempdir().expect("tempdir");
    let status = runner()
        .arg("--work-dir")
        .arg(temp.path())
        .status()
        .expect("run fastlane-runner");
    assert_eq!(status.code(), Some(exit_codes::FAILURE));
}

#[test]
fn unknown_flag_exits_with_failure() {
    let status = runner()
        .args(["--lane", "beta", "--no-such-flag"])
        .status()
        .expect("run fastlane-runner");
    assert_eq!(status.code(), Some(exit_codes::FAILURE));
}

#[test]
fn help_exits_ok() {
    let output = runner().arg("--help").output().expect("run fastlane-runner");
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert!(String::from_utf8_lossy(&output.stdout).contains("--lane"));
}

#[cfg(unix)]
mod fake_fastlane {
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;

    use super::{exit_codes, runner};

    const RECORD_ARGS_AND_USER: &str = "\
printf '%s\\n' \"$*\" > \"$RECORD_FILE\"
printf '%s\\n' \"$FASTLANE_USER\" >> \"$RECORD_FILE\"
echo lane output
";

    const RECORD_API_KEY: &str = "\
printf '%s\\n' \"$APP_STORE_CONNECT_API_KEY_PATH\" > \"$RECORD_FILE\"
if [ -f \"$APP_STORE_CONNECT_API_KEY_PATH\" ]; then echo present >> \"$RECORD_FILE\"; fi
";

    fn install_script(bin: &Path, body: &str, exit_code: i32) {
        fs::create_dir_all(bin).expect("create bin dir");
        let script = format!("#!/bin/sh\n{body}exit {exit_code}\n");
        let path = bin.join("fastlane");
        fs::write(&path, script).expect("write fake fastlane");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod");
    }

    #[test]
    fn successful_lane_exits_ok_and_receives_credentials() {
        let temp = tempfile::tempdir().expect("tempdir");
        let bin = temp.path().join("bin");
        let work = temp.path().join("app");
        fs::create_dir_all(&work).expect("create work dir");
        install_script(&bin, RECORD_ARGS_AND_USER, 0);
        let record = temp.path().join("record.txt");

        let output = runner()
            .env("PATH", &bin)
            .env("RECORD_FILE", &record)
            .args(["--lane", "ios beta", "--apple-id", "ci@example.com", "--work-dir"])
            .arg(&work)
            .args(["--", "skip_upload:true"])
            .output()
            .expect("run fastlane-runner");

        assert_eq!(output.status.code(), Some(exit_codes::OK));
        assert!(String::from_utf8_lossy(&output.stdout).contains("lane output"));
        let recorded = fs::read_to_string(&record).expect("read record");
        assert_eq!(recorded, "ios beta skip_upload:true\nci@example.com\n");
        assert!(!String::from_utf8_lossy(&output.stderr).contains("ci@example.com"));
    }

    #[test]
    fn failing_lane_exits_with_failure() {
        let temp = tempfile::tempdir().expect("tempdir");
        let bin = temp.path().join("bin");
        install_script(&bin, RECORD_ARGS_AND_USER, 3);
        let record = temp.path().join("record.txt");

        let status = runner()
            .env("PATH", &bin)
            .env("RECORD_FILE", &record)
            .arg("--lane")
            .arg("beta")
            .arg("--work-dir")
            .arg(temp.path())
            .status()
            .expect("run fastlane-runner");

        assert_eq!(status.code(), Some(exit_codes::FAILURE));
        assert!(record.exists(), "lane ran exactly once");
    }

    #[test]
    fn relative_api_key_path_resolves_from_invocation_dir() {
        let temp = tempfile::tempdir().expect("tempdir");
        let bin = temp.path().join("bin");
        let work = temp.path().join("app");
        fs::create_dir_all(&work).expect("create work dir");
        fs::write(temp.path().join("key.json"), "{}").expect("write key");
        install_script(&bin, RECORD_API_KEY, 0);
        let record = temp.path().join("record.txt");

        let status = runner()
            .current_dir(temp.path())
            .env("PATH", &bin)
            .env("RECORD_FILE", &record)
            .args(["--lane", "beta", "--api-key-path", "key.json", "--work-dir", "app"])
            .status()
            .expect("run fastlane-runner");

        assert_eq!(status.code(), Some(exit_codes::OK));
        let recorded = fs::read_to_string(&record).expect("read record");
        let mut lines = recorded.lines();
        let key_path = lines.next().expect("key path line");
        assert!(Path::new(key_path).is_absolute(), "{key_path}");
        assert_eq!(lines.next(), Some("present"));
    }
}
