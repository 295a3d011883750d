use anyhow::Result;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;
use tempfile::TempDir;

/// Isolated environment: empty env, empty working dir (no stray .env).
struct CliEnv {
    dir: TempDir,
}

impl CliEnv {
    fn new() -> Result<Self> {
        Ok(Self {
            dir: tempfile::tempdir()?,
        })
    }

    fn moodlesync(&self) -> Command {
        let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("moodlesync"));
        cmd.env_clear().current_dir(self.dir.path());
        cmd
    }

    fn write_key(&self) -> Result<std::path::PathBuf> {
        let path = self.dir.path().join("service-account.json");
        std::fs::write(
            &path,
            r#"{"type":"service_account","client_email":"sync-bot@demo.iam.gserviceaccount.com","private_key":"unused"}"#,
        )?;
        Ok(path)
    }

    fn configured(&self) -> Result<Command> {
        let key = self.write_key()?;
        let mut cmd = self.moodlesync();
        cmd.env("MOODLE_BASE_URL", "https://campus.example.org")
            .env("MOODLE_USERNAME", "tutor")
            .env("MOODLE_PASSWORD", "secret")
            .env("COURSE_ID", "42")
            .env("SPREADSHEET_NAME", "Seguimiento")
            .env("WORKSHEET_NAME", "Datos")
            .env("GOOGLE_CREDENTIALS_FILE", key);
        Ok(cmd)
    }
}

#[test]
fn test_help_lists_commands() -> Result<()> {
    let env = CliEnv::new()?;
    env.moodlesync()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("preview"))
        .stdout(predicate::str::contains("check"));
    Ok(())
}

#[test]
fn test_check_accepts_valid_configuration() -> Result<()> {
    let env = CliEnv::new()?;
    env.configured()?
        .env("SOURCE_IDS", "101,102")
        .env("SOURCE_LABELS", "Inicio,Cierre")
        .arg("check")
        .assert()
        .success()
        .stdout(predicate::str::contains("Inicio"))
        .stdout(predicate::str::contains("Cierre"))
        .stdout(predicate::str::contains("sync-bot@demo.iam.gserviceaccount.com"))
        .stdout(predicate::str::contains("Configuration OK"));
    Ok(())
}

#[test]
fn test_check_rejects_mismatched_sources() -> Result<()> {
    let env = CliEnv::new()?;
    env.configured()?
        .env("SOURCE_IDS", "101,102")
        .env("SOURCE_LABELS", "Inicio")
        .arg("check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("2 id(s) vs 1 label(s)"));
    Ok(())
}

#[test]
fn test_check_rejects_duplicate_labels() -> Result<()> {
    let env = CliEnv::new()?;
    env.configured()?
        .args(["check", "--source-ids", "1,2", "--source-labels", "Q,Q"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Label 'Q'"));
    Ok(())
}

#[test]
fn test_check_requires_a_spreadsheet() -> Result<()> {
    let env = CliEnv::new()?;
    env.configured()?
        .env_remove("SPREADSHEET_NAME")
        .args(["check", "--source-ids", "1", "--source-labels", "Q1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("SPREADSHEET_NAME or SPREADSHEET_ID"));
    Ok(())
}

#[test]
fn test_preview_fails_without_sources_before_any_request() -> Result<()> {
    let env = CliEnv::new()?;
    // The Moodle URL is unroutable: reaching the network would hang or fail differently.
    env.moodlesync()
        .env("MOODLE_BASE_URL", "http://10.255.255.1")
        .env("MOODLE_USERNAME", "tutor")
        .env("MOODLE_PASSWORD", "secret")
        .env("COURSE_ID", "42")
        .arg("preview")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No source configured"));
    Ok(())
}

#[test]
fn test_missing_moodle_credentials_are_reported() -> Result<()> {
    let env = CliEnv::new()?;
    env.moodlesync()
        .args(["preview", "--source-ids", "1", "--source-labels", "Q1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("MOODLE_USERNAME is required"));
    Ok(())
}
