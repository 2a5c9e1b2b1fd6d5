mod cmd;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use xbuild_lib::action::ActionError;
use xbuild_lib::consts::EXIT_NO_PROJECT;

use crate::output::print_error;

/// xbuild - build C/C++ projects and their dependencies across hosts and toolchains
#[derive(Parser, Debug)]
#[command(name = "xbuild")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Action to run (build, test, clean, print-config, ...)
  action: Option<String>,

  /// Configuration overrides as key=value; `!key` resets, `+key` appends
  overrides: Vec<String>,

  /// Project directory (default: current directory)
  #[arg(short, long)]
  project: Option<PathBuf>,

  /// Build spec: host-compiler-version-target-arch[-downstream]
  #[arg(short, long)]
  spec: Option<String>,

  /// Target OS, optionally with architecture (os-arch)
  #[arg(long)]
  target: Option<String>,

  /// Compiler, optionally with version (name-version)
  #[arg(long)]
  compiler: Option<String>,

  /// Variant of the root project to build
  #[arg(long)]
  variant: Option<String>,

  /// Additional directory to search for projects
  #[arg(long = "search-dir")]
  search_dirs: Vec<PathBuf>,

  /// Log commands instead of running them
  #[arg(short = 'n', long)]
  dry_run: bool,

  /// Enable verbose output
  #[arg(short, long)]
  verbose: bool,
}

fn main() -> ExitCode {
  let cli = Cli::parse();

  let filter = if cli.verbose {
    EnvFilter::new("debug")
  } else {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
  };
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let Some(action) = cli.action.as_deref() else {
    print_error("no action given (try `xbuild build`)");
    return exit_code(EXIT_NO_PROJECT);
  };

  let args = cmd::RunArgs {
    action,
    overrides: &cli.overrides,
    project: cli.project.as_deref(),
    spec: cli.spec.as_deref(),
    target: cli.target.as_deref(),
    compiler: cli.compiler.as_deref(),
    variant: cli.variant.as_deref(),
    search_dirs: &cli.search_dirs,
    dry_run: cli.dry_run,
  };

  match cmd::cmd_run(&args) {
    Ok(()) => ExitCode::SUCCESS,
    Err(err) => {
      print_error(&format!("{err:#}"));
      let code = err
        .downcast_ref::<ActionError>()
        .map(ActionError::exit_code)
        .unwrap_or(EXIT_NO_PROJECT);
      exit_code(code)
    }
  }
}

fn exit_code(code: i32) -> ExitCode {
  ExitCode::from(u8::try_from(code).unwrap_or(1))
}
