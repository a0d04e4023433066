//! ralphloop configuration types and loading

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::error::ConfigError;
use crate::executor::{ClassificationPolicy, CommandSpec};
use crate::r#loop::RunConfig;
use crate::timer::Backoff;

const LOCAL_CONFIG_FILE: &str = ".ralphloop.yml";

/// Main ralphloop configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,

    /// Iteration budget and pacing
    pub run: RunSettings,

    /// External worker invocation
    pub executor: ExecutorConfig,
}

impl Config {
    /// Load the configuration for this invocation
    ///
    /// An explicit `--config` path is used as is. Otherwise the first file that
    /// exists among `.ralphloop.yml` in the working directory and
    /// `ralphloop/ralphloop.yml` under the user config dir is loaded. A file
    /// that exists but does not load is an error, never a silent fallback.
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self, ConfigError> {
        debug!(?config_path, "Config::load: called");
        match config_path {
            Some(path) => Self::load_from_file(path),
            None => Self::load_first(Self::search_paths()),
        }
    }

    /// Implicit config locations, highest priority first
    fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(LOCAL_CONFIG_FILE)];
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("ralphloop").join("ralphloop.yml"));
        }
        paths
    }

    /// Load the first existing candidate, or defaults when none exists
    fn load_first(candidates: Vec<PathBuf>) -> Result<Self, ConfigError> {
        match candidates.into_iter().find(|path| path.exists()) {
            Some(path) => Self::load_from_file(&path),
            None => {
                tracing::info!("No ralphloop.yml found, running with built-in defaults");
                Ok(Self::default())
            }
        }
    }

    /// Read only the log level, before logging is set up
    ///
    /// Errors are swallowed; the full load reports them later.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        Self::load(config_path).ok().and_then(|c| c.log_level)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self = serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        tracing::info!("Loaded config from: {}", path.display());
        Ok(config)
    }

    /// Build the validated run configuration for a spec
    pub fn run_config(&self, spec_path: PathBuf) -> Result<RunConfig, ConfigError> {
        debug!(?spec_path, "Config::run_config: called");
        RunConfig::new(spec_path, self.run.max_iterations, self.run.backoff())
    }

    /// Command line for the worker
    pub fn command_spec(&self) -> Result<CommandSpec, ConfigError> {
        debug!(command = %self.executor.command, "Config::command_spec: called");
        // The command string is split on whitespace; extra arguments go in `args`
        let mut parts = self.executor.command.split_whitespace().map(str::to_string);
        let program = parts.next().ok_or(ConfigError::EmptyCommand)?;
        let args = parts.chain(self.executor.args.iter().cloned()).collect();

        Ok(CommandSpec {
            program,
            args,
            working_dir: self.executor.working_dir.clone(),
            timeout: self.executor.timeout_ms.map(Duration::from_millis),
        })
    }

    /// Outcome classification rules for the worker
    pub fn policy(&self) -> ClassificationPolicy {
        ClassificationPolicy {
            success_exit_code: self.executor.success_exit_code,
            retryable_exit_codes: self.executor.retryable_exit_codes.clone(),
            completion_marker: self.executor.completion_marker.clone(),
            retry_on_timeout: self.executor.retry_on_timeout,
            max_detail_chars: self.executor.max_detail_chars,
        }
    }
}

/// Iteration budget and pacing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    /// Maximum attempts before giving up
    #[serde(rename = "max-iterations")]
    pub max_iterations: u32,

    /// Delay between attempts in milliseconds
    #[serde(rename = "delay-ms")]
    pub delay_ms: u64,

    /// Growth factor applied to the delay after each attempt (1.0 = constant)
    #[serde(rename = "backoff-multiplier")]
    pub backoff_multiplier: f64,

    /// Ceiling for the delay in milliseconds
    #[serde(rename = "max-delay-ms")]
    pub max_delay_ms: u64,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            delay_ms: 2000,
            backoff_multiplier: 1.0,
            max_delay_ms: 300_000,
        }
    }
}

impl RunSettings {
    pub fn backoff(&self) -> Backoff {
        Backoff {
            base: Duration::from_millis(self.delay_ms),
            multiplier: self.backoff_multiplier,
            max: Duration::from_millis(self.max_delay_ms),
        }
    }
}

/// External worker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Program (and leading arguments) to run each attempt
    pub command: String,

    /// Extra arguments; `{spec}` and `{attempt}` are substituted
    pub args: Vec<String>,

    /// Directory to run the worker in
    #[serde(rename = "working-dir")]
    pub working_dir: Option<PathBuf>,

    /// Per-attempt timeout in milliseconds (none = unbounded)
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: Option<u64>,

    /// Exit code that means the unit of work succeeded
    #[serde(rename = "success-exit-code")]
    pub success_exit_code: i32,

    /// Exit codes the worker uses to ask for another attempt
    #[serde(rename = "retryable-exit-codes")]
    pub retryable_exit_codes: Vec<i32>,

    /// Text that must appear in stdout for a clean exit to count as success
    #[serde(rename = "completion-marker")]
    pub completion_marker: Option<String>,

    /// Treat a timed-out attempt as retryable instead of fatal
    #[serde(rename = "retry-on-timeout")]
    pub retry_on_timeout: bool,

    /// Characters of worker output kept for reporting
    #[serde(rename = "max-detail-chars")]
    pub max_detail_chars: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        let policy = ClassificationPolicy::default();
        Self {
            command: "claude -p".to_string(),
            args: Vec::new(),
            working_dir: None,
            timeout_ms: None,
            success_exit_code: policy.success_exit_code,
            retryable_exit_codes: policy.retryable_exit_codes,
            completion_marker: None,
            retry_on_timeout: false,
            max_detail_chars: policy.max_detail_chars,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert!(config.log_level.is_none());
        assert_eq!(config.run.max_iterations, 10);
        assert_eq!(config.run.delay_ms, 2000);
        assert_eq!(config.executor.command, "claude -p");
        assert_eq!(config.executor.retryable_exit_codes, vec![75]);
    }

    #[test]
    fn test_deserialize_config() {
        let yaml = r#"
log-level: debug

run:
  max-iterations: 25
  delay-ms: 500
  backoff-multiplier: 1.5
  max-delay-ms: 10000

executor:
  command: "my-agent --fast"
  args: ["--spec", "{spec}"]
  working-dir: /tmp/work
  timeout-ms: 60000
  success-exit-code: 0
  retryable-exit-codes: [1, 75]
  completion-marker: "DONE"
  retry-on-timeout: true
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert_eq!(config.run.max_iterations, 25);
        assert_eq!(config.run.backoff_multiplier, 1.5);
        assert_eq!(config.executor.timeout_ms, Some(60000));
        assert_eq!(config.executor.retryable_exit_codes, vec![1, 75]);
        assert!(config.executor.retry_on_timeout);

        let spec = config.command_spec().unwrap();
        assert_eq!(spec.program, "my-agent");
        assert_eq!(spec.args, vec!["--fast", "--spec", "{spec}"]);
        assert_eq!(spec.timeout, Some(Duration::from_secs(60)));
        assert_eq!(spec.working_dir, Some(PathBuf::from("/tmp/work")));

        let policy = config.policy();
        assert_eq!(policy.completion_marker.as_deref(), Some("DONE"));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let yaml = r#"
run:
  max-iterations: 3
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.run.max_iterations, 3);
        assert_eq!(config.run.delay_ms, 2000);
        assert_eq!(config.executor.command, "claude -p");
    }

    #[test]
    fn test_run_config_validation() {
        let mut config = Config::default();
        config.run.max_iterations = 0;

        let err = config.run_config(PathBuf::from("spec.md")).unwrap_err();
        assert!(matches!(err, ConfigError::MaxIterations(0)));
    }

    #[test]
    fn test_empty_command_rejected() {
        let mut config = Config::default();
        config.executor.command = "   ".to_string();

        assert!(matches!(config.command_spec(), Err(ConfigError::EmptyCommand)));
    }

    #[test]
    fn test_load_explicit_file() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("custom.yml");
        fs::write(&path, "run:\n  delay-ms: 0\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.run.delay_ms, 0);
    }

    #[test]
    fn test_load_explicit_file_errors() {
        let temp = tempdir().unwrap();

        let missing = temp.path().join("missing.yml");
        assert!(matches!(Config::load(Some(&missing)), Err(ConfigError::Read { .. })));

        let broken = temp.path().join("broken.yml");
        fs::write(&broken, "run: [not, a, map").unwrap();
        assert!(matches!(Config::load(Some(&broken)), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_load_first_prefers_earliest_existing() {
        let temp = tempdir().unwrap();
        let local = temp.path().join("local.yml");
        let user = temp.path().join("user.yml");
        fs::write(&local, "run:\n  max-iterations: 4\n").unwrap();
        fs::write(&user, "run:\n  max-iterations: 9\n").unwrap();

        let missing = temp.path().join("missing.yml");
        let config = Config::load_first(vec![missing, local, user]).unwrap();
        assert_eq!(config.run.max_iterations, 4);
    }

    #[test]
    fn test_load_first_without_files_uses_defaults() {
        let temp = tempdir().unwrap();
        let config = Config::load_first(vec![temp.path().join("a.yml"), temp.path().join("b.yml")]).unwrap();
        assert_eq!(config.run.max_iterations, 10);
    }

    #[test]
    fn test_load_first_broken_file_is_error() {
        let temp = tempdir().unwrap();
        let broken = temp.path().join("broken.yml");
        let user = temp.path().join("user.yml");
        fs::write(&broken, "run:\n  delay-ms: [oops\n").unwrap();
        fs::write(&user, "run:\n  max-iterations: 9\n").unwrap();

        let err = Config::load_first(vec![broken, user]).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
