//! xbuild-lib: configuration resolution, project graphs and build actions
//! for xbuild.
//!
//! - [`config`]: layered configuration merged for one [`spec::BuildSpec`]
//! - [`project`]: projects, the project cache and dependency graphs
//! - [`action`]: steps, actions and the build pipeline
//! - [`context`]: the session object actions run against

pub mod action;
pub mod config;
pub mod consts;
pub mod context;
pub mod data;
pub mod imports;
pub mod platform;
pub mod project;
pub mod shell;
pub mod spec;
pub mod util;
pub mod vars;
