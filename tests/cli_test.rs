//! Binary Interface Tests
//!
//! Drives the compiled `consignr` binary through its command line.
//!
//! ## Test Coverage
//!
//! - Help and version output
//! - Startup fails cleanly when the config file is missing or unparseable

#[cfg(test)]
mod tests {
    use assert_cmd::Command;
    use predicates::prelude::*;
    use std::io::Write;

    #[test]
    fn test_help_describes_the_broker() {
        Command::cargo_bin("consignr")
            .unwrap()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("direct-to-S3 upload broker"))
            .stdout(predicate::str::contains("--config"))
            .stdout(predicate::str::contains("--log-level"));
    }

    #[test]
    fn test_version_names_the_binary() {
        Command::cargo_bin("consignr")
            .unwrap()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("consignr"));
    }

    #[test]
    fn test_missing_config_file_fails_with_a_readable_error() {
        Command::cargo_bin("consignr")
            .unwrap()
            .args(["--config", "/nonexistent/consignr.yaml"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Failed to read config file"));
    }

    #[test]
    fn test_unparseable_config_file_fails_with_a_readable_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"storage: [not, a, mapping").unwrap();
        file.flush().unwrap();

        Command::cargo_bin("consignr")
            .unwrap()
            .arg("--config")
            .arg(file.path())
            .assert()
            .failure()
            .stderr(predicate::str::contains("Failed to parse config"));
    }
}
