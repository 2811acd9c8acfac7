//! External process execution.
//!
//! The converter and the merge strategies never spawn processes directly; they build an
//! [`Invocation`] and hand it to a [`ProcessRunner`], which keeps them testable with a
//! fake runner.

use std::env;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} timed out after {}s", .timeout.as_secs())]
    TimedOut { program: String, timeout: Duration },
}

/// Program, arguments and environment overrides for one external command.
#[derive(Debug, Clone, Default)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    /// Added on top of the inherited environment.
    pub envs: Vec<(OsString, OsString)>,
    pub current_dir: Option<PathBuf>,
}

impl Invocation {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, A>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Arguments as lossy strings, mostly for logging and assertions.
    pub fn display_args(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProcessOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ProcessOutput {
    /// Most useful diagnostic text: stderr, then stdout, then the exit code.
    pub fn failure_message(&self) -> String {
        let stderr = String::from_utf8_lossy(&self.stderr).trim().to_string();
        if !stderr.is_empty() {
            return stderr;
        }
        let stdout = String::from_utf8_lossy(&self.stdout).trim().to_string();
        if !stdout.is_empty() {
            return stdout;
        }
        match self.code {
            Some(code) => format!("exit status {}", code),
            None => "terminated by signal".to_string(),
        }
    }

    /// stdout and stderr joined, trimmed.
    pub fn combined(&self) -> String {
        let mut text = String::from_utf8_lossy(&self.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&self.stderr);
        let stderr = stderr.trim();
        if !stderr.is_empty() {
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str(stderr);
        }
        text
    }
}

#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Locate an executable by name on the search path.
    fn find(&self, name: &str) -> Option<PathBuf>;

    async fn run(&self, invocation: Invocation) -> Result<ProcessOutput, ProcessError>;
}

/// Runs real processes with `tokio::process`.
#[derive(Debug, Clone, Default)]
pub struct SystemProcessRunner {
    timeout: Option<Duration>,
}

impl SystemProcessRunner {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl ProcessRunner for SystemProcessRunner {
    fn find(&self, name: &str) -> Option<PathBuf> {
        find_executable(name, env::var_os("PATH").as_deref())
    }

    async fn run(&self, invocation: Invocation) -> Result<ProcessOutput, ProcessError> {
        let program = invocation.program.display().to_string();
        log::debug!("running {} {:?}", program, invocation.display_args());

        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .envs(invocation.envs.iter().map(|(k, v)| (k.as_os_str(), v.as_os_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &invocation.current_dir {
            command.current_dir(dir);
        }

        let child = command.spawn().map_err(|source| ProcessError::Spawn {
            program: program.clone(),
            source,
        })?;

        let output = match self.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, child.wait_with_output()).await {
                Ok(result) => result,
                // Dropping the future drops the child, which kills it.
                Err(_) => return Err(ProcessError::TimedOut { program, timeout }),
            },
            None => child.wait_with_output().await,
        }
        .map_err(|source| ProcessError::Spawn {
            program: program.clone(),
            source,
        })?;

        Ok(ProcessOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}

/// Search `path_var` for an executable called `name`.
///
/// A name containing a path separator is checked directly instead.
pub fn find_executable(name: &str, path_var: Option<&OsStr>) -> Option<PathBuf> {
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    let direct = Path::new(name);
    if direct.components().count() > 1 || direct.is_absolute() {
        return is_executable(direct).then(|| direct.to_path_buf());
    }

    env::split_paths(path_var?)
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
