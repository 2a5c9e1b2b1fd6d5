//! External process execution.
//!
//! [`Shell`] runs argument vectors with an overlay of scoped working
//! directories and environment variables. Scopes never touch the process
//! environment: they are applied to each spawned child only.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::consts::RETRY_DELAY_SECS;

#[derive(Debug, Error)]
pub enum ShellError {
  #[error("empty command")]
  EmptyCommand,

  #[error("failed to spawn {program}: {source}")]
  Spawn {
    program: String,
    #[source]
    source: std::io::Error,
  },

  #[error("command failed with exit code {code:?}: {command}")]
  CommandFailed { command: String, code: Option<i32> },
}

/// Per-invocation options for [`Shell::exec`].
#[derive(Debug, Clone)]
pub struct ExecOptions {
  /// Extra attempts after the first failure.
  pub retries: u32,
  /// Fail with [`ShellError::CommandFailed`] on a non-zero exit.
  pub check: bool,
  /// Capture stdout instead of inheriting it.
  pub capture: bool,
  /// Overrides the scoped working directory.
  pub working_dir: Option<PathBuf>,
}

impl Default for ExecOptions {
  fn default() -> Self {
    Self {
      retries: 0,
      check: true,
      capture: false,
      working_dir: None,
    }
  }
}

impl ExecOptions {
  pub fn retries(mut self, retries: u32) -> Self {
    self.retries = retries;
    self
  }

  pub fn check(mut self, check: bool) -> Self {
    self.check = check;
    self
  }

  pub fn capture(mut self) -> Self {
    self.capture = true;
    self
  }

  pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
    self.working_dir = Some(dir.into());
    self
  }
}

/// Result of a finished command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOutput {
  pub code: Option<i32>,
  /// Trimmed stdout when captured, otherwise empty.
  pub stdout: String,
}

impl ExecOutput {
  pub fn success(&self) -> bool {
    self.code == Some(0)
  }
}

#[derive(Debug, Default)]
struct Scope {
  dir: Option<PathBuf>,
  env: BTreeMap<String, String>,
}

#[derive(Debug)]
pub struct Shell {
  dry_run: bool,
  retry_delay: Duration,
  scopes: Vec<Scope>,
  history: Vec<Vec<String>>,
}

impl Default for Shell {
  fn default() -> Self {
    Self::new()
  }
}

impl AsMut<Shell> for Shell {
  fn as_mut(&mut self) -> &mut Shell {
    self
  }
}

/// Run `f` on `owner` with a scope open on its shell.
///
/// The scope is popped whatever `f` returns, so a failing phase cannot leak
/// its directory or environment into the next one.
pub fn in_scope<O: AsMut<Shell>, T>(
  owner: &mut O,
  dir: Option<&Path>,
  env: BTreeMap<String, String>,
  f: impl FnOnce(&mut O) -> T,
) -> T {
  owner.as_mut().push_scope(dir, env);
  let result = f(owner);
  owner.as_mut().pop_scope();
  result
}

impl Shell {
  pub fn new() -> Self {
    Self {
      dry_run: false,
      retry_delay: Duration::from_secs(RETRY_DELAY_SECS),
      scopes: Vec::new(),
      history: Vec::new(),
    }
  }

  /// Log commands instead of running them.
  pub fn with_dry_run(mut self, dry_run: bool) -> Self {
    self.dry_run = dry_run;
    self
  }

  pub fn with_retry_delay(mut self, delay: Duration) -> Self {
    self.retry_delay = delay;
    self
  }

  pub fn dry_run(&self) -> bool {
    self.dry_run
  }

  /// Every command executed (or logged, in dry-run mode), in order.
  pub fn history(&self) -> &[Vec<String>] {
    &self.history
  }

  /// The innermost scoped working directory.
  pub fn current_dir(&self) -> Option<&Path> {
    self.scopes.iter().rev().find_map(|scope| scope.dir.as_deref())
  }

  /// The environment overlay: all scopes, inner ones winning.
  pub fn env(&self) -> BTreeMap<String, String> {
    let mut env = BTreeMap::new();
    for scope in &self.scopes {
      env.extend(scope.env.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    env
  }

  pub fn depth(&self) -> usize {
    self.scopes.len()
  }

  /// Open a scope. Must be matched by [`Shell::pop_scope`].
  pub fn push_scope(&mut self, dir: Option<&Path>, env: BTreeMap<String, String>) {
    debug!(depth = self.scopes.len() + 1, dir = ?dir, vars = env.len(), "push scope");
    self.scopes.push(Scope {
      dir: dir.map(Path::to_path_buf),
      env,
    });
  }

  pub fn pop_scope(&mut self) {
    if self.scopes.pop().is_some() {
      debug!(depth = self.scopes.len(), "pop scope");
    }
  }

  /// Run `f` inside a scope, releasing it whatever `f` returns.
  pub fn scoped<T>(
    &mut self,
    dir: Option<&Path>,
    env: BTreeMap<String, String>,
    f: impl FnOnce(&mut Self) -> T,
  ) -> T {
    in_scope(self, dir, env, f)
  }

  /// Run `argv` with the current scopes applied.
  ///
  /// Failed attempts are retried `options.retries` times, waiting the retry
  /// delay in between. After the last attempt a failure is an error when
  /// `options.check` is set and is returned as an [`ExecOutput`] otherwise.
  pub fn exec(&mut self, argv: &[String], options: &ExecOptions) -> Result<ExecOutput, ShellError> {
    let (program, args) = argv.split_first().ok_or(ShellError::EmptyCommand)?;
    let command_line = argv.join(" ");
    let working_dir = options
      .working_dir
      .clone()
      .or_else(|| self.current_dir().map(Path::to_path_buf));

    self.history.push(argv.to_vec());
    if self.dry_run {
      info!(command = %command_line, dir = ?working_dir, "dry run");
      return Ok(ExecOutput {
        code: Some(0),
        stdout: String::new(),
      });
    }

    let env = self.env();
    let mut attempt = 0;
    loop {
      attempt += 1;
      info!(command = %command_line, attempt, "executing command");

      let output = run(program, args, working_dir.as_deref(), &env, options.capture)?;
      if output.success() {
        return Ok(output);
      }
      if attempt > options.retries {
        if options.check {
          return Err(ShellError::CommandFailed {
            command: command_line,
            code: output.code,
          });
        }
        return Ok(output);
      }

      warn!(command = %command_line, code = ?output.code, attempt, "command failed, retrying");
      std::thread::sleep(self.retry_delay);
    }
  }
}

fn run(
  program: &str,
  args: &[String],
  working_dir: Option<&Path>,
  env: &BTreeMap<String, String>,
  capture: bool,
) -> Result<ExecOutput, ShellError> {
  let mut command = Command::new(program);
  command.args(args).envs(env);
  if let Some(dir) = working_dir {
    command.current_dir(dir);
  }

  let spawn_error = |source: std::io::Error| ShellError::Spawn {
    program: program.to_string(),
    source,
  };

  if capture {
    let output = command.stderr(Stdio::inherit()).output().map_err(spawn_error)?;
    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if !stdout.is_empty() {
      debug!(stdout = %stdout, "command output");
    }
    Ok(ExecOutput {
      code: output.status.code(),
      stdout,
    })
  } else {
    let status = command.status().map_err(spawn_error)?;
    Ok(ExecOutput {
      code: status.code(),
      stdout: String::new(),
    })
  }
}
