//! Crate-wide constants.

/// File name of a project descriptor.
pub const DESCRIPTOR_FILENAME: &str = "xbuild.json";

/// Environment variable listing extra project search directories.
pub const SEARCH_PATH_ENV: &str = "XBUILD_PATH";

/// Maximum nesting depth of `hosts`/`targets`/`compilers`/`architectures`
/// sections while collecting configuration sources.
pub const MAX_SOURCE_DEPTH: usize = 8;

/// Maximum passes when resolving variables that reference other variables.
pub const MAX_VARIABLE_PASSES: usize = 8;

/// Maximum nesting of actions spawned from other actions.
pub const MAX_ACTION_DEPTH: usize = 64;

/// Default number of extra attempts for package manager commands.
pub const PACKAGE_RETRIES: u32 = 3;

/// Seconds to wait between attempts of a retried command.
pub const RETRY_DELAY_SECS: u64 = 1;

// Process exit codes. The library never exits; these are surfaced through
// `ActionError::exit_code` for the binary to use.

/// No command given, no project found, or any configuration error.
pub const EXIT_NO_PROJECT: i32 = 1;

/// The command named on the command line is not a registered action.
pub const EXIT_ACTION_CLASS_NOT_FOUND: i32 = 2;

/// A script contained a step of an unsupported shape.
pub const EXIT_UNKNOWN_STEP: i32 = 4;

/// A shell command exited non-zero (after retries).
pub const EXIT_COMMAND_FAILED: i32 = 12;

/// An action referenced by name while running a step tree does not exist.
pub const EXIT_ACTION_NOT_FOUND: i32 = 13;
