//! Generator backed by an external shell command.
//!
//! The command receives the outstanding paths on stdin, one per line, and
//! reports each produced path on its own stdout line.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use log::{debug, warn};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::{GenerationRequest, Generator, GeneratorError, ProducedReport};

/// Configuration for a command generator
#[derive(Debug, Clone)]
pub struct CommandGeneratorConfig {
    /// Shell command, run with `sh -c`
    pub command: String,
    /// Extra environment variables
    pub env: Vec<(String, String)>,
    /// Working directory (defaults to the current directory)
    pub working_dir: Option<PathBuf>,
    /// Whether to include stderr in failure messages
    pub capture_stderr: bool,
}

impl Default for CommandGeneratorConfig {
    fn default() -> Self {
        Self {
            command: String::new(),
            env: Vec::new(),
            working_dir: None,
            capture_stderr: true,
        }
    }
}

impl CommandGeneratorConfig {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Default::default()
        }
    }

    /// Add an environment variable
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn capture_stderr(mut self, capture: bool) -> Self {
        self.capture_stderr = capture;
        self
    }
}

/// Generator that shells out once per iteration
pub struct CommandGenerator {
    config: CommandGeneratorConfig,
}

impl CommandGenerator {
    pub fn new(config: CommandGeneratorConfig) -> Self {
        Self { config }
    }

    /// Create a command generator with defaults
    pub fn simple(command: impl Into<String>) -> Self {
        Self::new(CommandGeneratorConfig::new(command))
    }

    pub fn command(&self) -> &str {
        &self.config.command
    }

    async fn execute(&self, request: &GenerationRequest) -> std::io::Result<std::process::Output> {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(&self.config.command);
        if let Some(dir) = &self.config.working_dir {
            cmd.current_dir(dir);
        }

        cmd.env("CONVERGR_ITERATION", request.iteration.to_string());
        cmd.env("CONVERGR_OUTSTANDING_COUNT", request.outstanding.len().to_string());
        for (key, value) in &self.config.env {
            cmd.env(key, value);
        }

        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn()?;
        let stdin = child.stdin.take();

        let mut input = request.outstanding.join("\n");
        input.push('\n');

        let feed = async move {
            if let Some(mut stdin) = stdin {
                // The command may exit without reading its input.
                match stdin.write_all(input.as_bytes()).await {
                    Err(e) if e.kind() != std::io::ErrorKind::BrokenPipe => return Err(e),
                    _ => {}
                }
            }
            Ok(())
        };

        let (fed, output) = tokio::join!(feed, child.wait_with_output());
        fed?;
        output
    }
}

/// Parse command stdout into reports: one path per non-empty, non-comment line.
pub(crate) fn parse_reports(stdout: &str, iteration: u32) -> Vec<ProducedReport> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| ProducedReport::new(line, iteration))
        .collect()
}

#[async_trait]
impl Generator for CommandGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<Vec<ProducedReport>, GeneratorError> {
        debug!(
            "Running generator command '{}' for {} outstanding paths",
            self.config.command,
            request.outstanding.len()
        );
        let output = self.execute(request).await?;

        if !output.status.success() {
            let mut message = format!(
                "command '{}' exited with code {:?}",
                self.config.command,
                output.status.code()
            );
            if self.config.capture_stderr {
                let stderr = String::from_utf8_lossy(&output.stderr);
                if !stderr.trim().is_empty() {
                    message.push_str(&format!(": {}", stderr.trim()));
                }
            }
            warn!("{}", message);
            return Err(GeneratorError::Failed(message));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(parse_reports(&stdout, request.iteration))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn request(paths: &[&str]) -> GenerationRequest {
        GenerationRequest {
            iteration: 1,
            outstanding: paths.iter().map(|p| p.to_string()).collect(),
        }
    }

    #[test]
    fn test_config_builder() {
        let config = CommandGeneratorConfig::new("make gen")
            .env("MODE", "fast")
            .working_dir("/tmp")
            .capture_stderr(false);
        assert_eq!(config.command, "make gen");
        assert_eq!(config.env, vec![("MODE".to_string(), "fast".to_string())]);
        assert_eq!(config.working_dir, Some(PathBuf::from("/tmp")));
        assert!(!config.capture_stderr);
    }

    #[test]
    fn test_parse_reports_skips_blank_and_comment_lines() {
        let reports = parse_reports("src/a.py\n\n  # progress note\n  src/b.py  \n", 3);
        assert_eq!(
            reports,
            vec![ProducedReport::new("src/a.py", 3), ProducedReport::new("src/b.py", 3)]
        );
    }

    #[tokio::test]
    async fn test_command_receives_outstanding_on_stdin() {
        let generator = CommandGenerator::simple("cat");
        let reports = generator.generate(&request(&["src/a.py", "src/b.py"])).await.unwrap();
        let paths: Vec<&str> = reports.iter().map(|r| r.raw_path.as_str()).collect();
        assert_eq!(paths, vec!["src/a.py", "src/b.py"]);
    }

    #[tokio::test]
    async fn test_command_sees_iteration_env() {
        let generator = CommandGenerator::simple("echo \"iter-$CONVERGR_ITERATION-$CONVERGR_OUTSTANDING_COUNT\"");
        let reports = generator.generate(&request(&["a", "b"])).await.unwrap();
        assert_eq!(reports[0].raw_path, "iter-1-2");
    }

    #[tokio::test]
    async fn test_command_ignoring_stdin_still_succeeds() {
        let generator = CommandGenerator::simple("echo done.txt");
        let reports = generator.generate(&request(&["a"])).await.unwrap();
        assert_eq!(reports, vec![ProducedReport::new("done.txt", 1)]);
    }

    #[tokio::test]
    async fn test_command_failure_includes_stderr() {
        let generator = CommandGenerator::simple("echo 'quota exceeded' >&2; exit 3");
        let err = generator.generate(&request(&["a"])).await.unwrap_err();
        let message = err.to_string();
        assert!(message.contains("Some(3)"));
        assert!(message.contains("quota exceeded"));
    }

    #[tokio::test]
    async fn test_command_runs_in_working_dir() -> std::io::Result<()> {
        let temp_dir = TempDir::new()?;
        std::fs::write(temp_dir.path().join("marker.txt"), "")?;
        let generator = CommandGenerator::new(CommandGeneratorConfig::new("ls").working_dir(temp_dir.path()));
        let reports = generator.generate(&request(&["a"])).await.unwrap();
        assert_eq!(reports, vec![ProducedReport::new("marker.txt", 1)]);
        Ok(())
    }
}
