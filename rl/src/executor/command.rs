//! Command executor - runs the worker as a child process

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::ExecutorError;

use super::{ClassificationPolicy, ExecutionOutcome, Executor, ProcessExit};

const SPEC_TOKEN: &str = "{spec}";
const ATTEMPT_TOKEN: &str = "{attempt}";

/// How to launch the external worker
#[derive(Debug, Clone)]
pub struct CommandSpec {
    /// Program to run
    pub program: String,

    /// Arguments; `{spec}` and `{attempt}` are substituted per invocation.
    /// If no argument mentions `{spec}`, the spec path is appended.
    pub args: Vec<String>,

    pub working_dir: Option<PathBuf>,

    /// Per-invocation limit; `None` lets the worker run as long as it likes
    pub timeout: Option<Duration>,
}

impl CommandSpec {
    /// Argument vector for one invocation
    pub fn render_args(&self, spec_path: &Path, attempt: u32) -> Vec<String> {
        let spec = spec_path.display().to_string();
        let attempt = attempt.to_string();

        let mut args: Vec<String> = self
            .args
            .iter()
            .map(|arg| arg.replace(SPEC_TOKEN, &spec).replace(ATTEMPT_TOKEN, &attempt))
            .collect();

        if !self.args.iter().any(|arg| arg.contains(SPEC_TOKEN)) {
            args.push(spec);
        }
        args
    }
}

/// Executor that spawns a process per attempt and classifies its exit
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    spec: CommandSpec,
    policy: ClassificationPolicy,
}

impl CommandExecutor {
    pub fn new(spec: CommandSpec, policy: ClassificationPolicy) -> Self {
        debug!(program = %spec.program, "CommandExecutor::new: called");
        Self { spec, policy }
    }

    /// Run the process once without classifying
    async fn run(&self, spec_path: &Path, attempt: u32) -> Result<ProcessExit, ExecutorError> {
        let args = self.spec.render_args(spec_path, attempt);
        debug!(program = %self.spec.program, ?args, attempt, "CommandExecutor::run: spawning");

        let mut command = tokio::process::Command::new(&self.spec.program);
        command
            .args(&args)
            .env("RALPHLOOP_ATTEMPT", attempt.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.spec.working_dir {
            command.current_dir(dir);
        }
        // Own process group: a terminal Ctrl-C reaches rl's handler, not the worker
        #[cfg(unix)]
        command.process_group(0);

        let start = Instant::now();
        let child = command.spawn().map_err(|source| ExecutorError::Spawn {
            command: self.spec.program.clone(),
            source,
        })?;

        let output = match self.spec.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
                Ok(result) => result?,
                Err(_) => {
                    debug!(timeout_ms = limit.as_millis() as u64, "CommandExecutor::run: timed out");
                    return Err(ExecutorError::Timeout(limit));
                }
            },
            None => child.wait_with_output().await?,
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        debug!(status = ?output.status, duration_ms, "CommandExecutor::run: completed");

        Ok(ProcessExit {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            duration_ms,
        })
    }
}

#[async_trait]
impl Executor for CommandExecutor {
    async fn invoke(&self, spec_path: &Path, attempt: u32) -> ExecutionOutcome {
        debug!(?spec_path, attempt, "CommandExecutor::invoke: called");
        info!("Invoking {} (attempt {})", self.spec.program, attempt);

        match self.run(spec_path, attempt).await {
            Ok(exit) => self.policy.classify_exit(&exit),
            Err(e) => self.policy.classify_error(&e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::Classification;
    use tempfile::tempdir;

    fn sh(script: &str) -> CommandSpec {
        CommandSpec {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string(), "worker".to_string(), SPEC_TOKEN.to_string()],
            working_dir: None,
            timeout: Some(Duration::from_secs(30)),
        }
    }

    #[test]
    fn test_render_args_substitutes_tokens() {
        let spec = CommandSpec {
            program: "worker".to_string(),
            args: vec!["--spec={spec}".to_string(), "--try".to_string(), "{attempt}".to_string()],
            working_dir: None,
            timeout: None,
        };

        let args = spec.render_args(Path::new("/tmp/spec.md"), 3);
        assert_eq!(args, vec!["--spec=/tmp/spec.md", "--try", "3"]);
    }

    #[test]
    fn test_render_args_appends_spec() {
        let spec = CommandSpec {
            program: "claude".to_string(),
            args: vec!["-p".to_string()],
            working_dir: None,
            timeout: None,
        };

        let args = spec.render_args(Path::new("PROMPT.md"), 1);
        assert_eq!(args, vec!["-p", "PROMPT.md"]);
    }

    #[tokio::test]
    async fn test_invoke_success() {
        let executor = CommandExecutor::new(sh("echo working on $1"), ClassificationPolicy::default());
        let outcome = executor.invoke(Path::new("spec.md"), 1).await;

        assert_eq!(outcome.classification, Classification::Success);
        assert!(outcome.detail.contains("working on spec.md"));
    }

    #[tokio::test]
    async fn test_invoke_retryable_exit() {
        let executor = CommandExecutor::new(sh("exit 75"), ClassificationPolicy::default());
        let outcome = executor.invoke(Path::new("spec.md"), 1).await;
        assert_eq!(outcome.classification, Classification::RetryableFailure);
    }

    #[tokio::test]
    async fn test_invoke_unclassified_exit_is_fatal() {
        let executor = CommandExecutor::new(sh("echo broken >&2; exit 3"), ClassificationPolicy::default());
        let outcome = executor.invoke(Path::new("spec.md"), 1).await;

        assert_eq!(outcome.classification, Classification::FatalFailure);
        assert!(outcome.detail.contains("exit code 3"));
        assert!(outcome.detail.contains("broken"));
    }

    #[tokio::test]
    async fn test_invoke_missing_program_is_fatal() {
        let spec = CommandSpec {
            program: "ralphloop-definitely-not-a-real-binary".to_string(),
            args: vec![],
            working_dir: None,
            timeout: None,
        };
        let executor = CommandExecutor::new(spec, ClassificationPolicy::default());
        let outcome = executor.invoke(Path::new("spec.md"), 1).await;

        assert_eq!(outcome.classification, Classification::FatalFailure);
        assert!(outcome.detail.contains("Failed to spawn"));
    }

    #[tokio::test]
    async fn test_invoke_timeout() {
        let mut spec = sh("sleep 10");
        spec.timeout = Some(Duration::from_millis(100));

        let fatal = CommandExecutor::new(spec.clone(), ClassificationPolicy::default());
        assert_eq!(
            fatal.invoke(Path::new("spec.md"), 1).await.classification,
            Classification::FatalFailure
        );

        let policy = ClassificationPolicy {
            retry_on_timeout: true,
            ..Default::default()
        };
        let retryable = CommandExecutor::new(spec, policy);
        assert_eq!(
            retryable.invoke(Path::new("spec.md"), 1).await.classification,
            Classification::RetryableFailure
        );
    }

    #[tokio::test]
    async fn test_invoke_uses_working_dir_and_attempt_env() {
        let temp = tempdir().unwrap();
        let mut spec = sh("pwd; echo attempt=$RALPHLOOP_ATTEMPT");
        spec.working_dir = Some(temp.path().to_path_buf());

        let executor = CommandExecutor::new(spec, ClassificationPolicy::default());
        let outcome = executor.invoke(Path::new("spec.md"), 4).await;

        assert_eq!(outcome.classification, Classification::Success);
        assert!(outcome.detail.contains("attempt=4"));
        let dir_name = temp.path().file_name().unwrap().to_string_lossy().to_string();
        assert!(outcome.detail.contains(&dir_name));
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_worker_runs_in_own_process_group() {
        // Fields 1 and 5 of /proc/<pid>/stat are the pid and the process group
        let script = r#"set -- $(cat /proc/$$/stat); if [ "$1" = "$5" ]; then echo group=own; else echo group=shared; fi"#;
        let executor = CommandExecutor::new(sh(script), ClassificationPolicy::default());
        let outcome = executor.invoke(Path::new("spec.md"), 1).await;

        assert_eq!(outcome.classification, Classification::Success);
        assert!(outcome.detail.contains("group=own"), "detail: {}", outcome.detail);
    }
}
