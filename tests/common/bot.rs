//! Test bot management.
//!
//! Each [`TestBot`] owns a temporary directory holding its config file and
//! SQLite database, so consecutive runs share state.

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

pub const OWNER_ID: i64 = 7;

/// A bot installation in a temporary directory.
pub struct TestBot {
    dir: TempDir,
    env: Vec<(String, String)>,
}

/// Captured result of one run.
pub struct BotRun {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl BotRun {
    fn from_output(output: Output) -> Self {
        Self {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }

    /// Reply lines without their `[chat]` prefix.
    pub fn replies(&self) -> Vec<&str> {
        self.stdout
            .lines()
            .filter_map(|l| l.split_once("] ").map(|(_, rest)| rest))
            .collect()
    }

    pub fn said(&self, text: &str) -> bool {
        self.stdout.contains(text)
    }
}

impl TestBot {
    /// A bot with a valid identity, text-only rank cards and a config file.
    pub fn new() -> anyhow::Result<Self> {
        let dir = tempfile::tempdir()?;
        let config = format!(
            r#"
[bot]
name = "testbot"
prefix = "/"
app_token = "test-token"
owner_user_id = {OWNER_ID}
owner_user_name = "boss"
metrics_port = 0

[database]
path = "{}"

[rank_card]
url = ""
"#,
            dir.path().join("bot.db").display()
        );
        std::fs::write(dir.path().join("config.toml"), config)?;

        Ok(Self {
            dir,
            env: vec![("RUST_LOG".into(), "warn".into())],
        })
    }

    /// Override or add an environment variable for subsequent runs.
    #[allow(dead_code)]
    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.path().join("config.toml")
    }

    /// Feed `lines` to the console and wait for the bot to exit at EOF.
    pub fn run(&self, lines: &[&str]) -> anyhow::Result<BotRun> {
        self.run_with(Some(self.config_path()), lines)
    }

    /// Like [`run`](Self::run) but without a config file argument.
    #[allow(dead_code)]
    pub fn run_without_config(&self, lines: &[&str]) -> anyhow::Result<BotRun> {
        self.run_with(None, lines)
    }

    fn run_with(&self, config: Option<PathBuf>, lines: &[&str]) -> anyhow::Result<BotRun> {
        let mut command = Command::new(env!("CARGO_BIN_EXE_rankbot"));
        command
            .env_clear()
            .envs(self.env.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(config) = config {
            command.arg(config);
        }

        let mut child = command.spawn()?;
        if let Some(mut stdin) = child.stdin.take() {
            for line in lines {
                writeln!(stdin, "{line}")?;
            }
            // Dropping stdin closes it; the bot exits once in-flight commands finish.
        }

        Ok(BotRun::from_output(child.wait_with_output()?))
    }
}
