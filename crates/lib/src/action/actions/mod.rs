//! Builtin actions.
//!
//! - [`build`] - the build pipeline: phases, dependencies and consumers
//! - [`packages`] - system package and compiler installation
//! - [`report`] - printing the resolved configuration and dependency list
//! - [`clean`] - removing the build directory

pub mod build;
pub mod clean;
pub mod packages;
pub mod report;

use std::rc::Rc;

use super::ActionRegistry;
use build::{Build, BuildConsumers, Phase, PhaseAction};

pub(crate) fn register_builtins(registry: &mut ActionRegistry) {
  registry.register("build", || Rc::new(Build));
  registry.register("build-consumers", || Rc::new(BuildConsumers));
  registry.register("pre-build", || Rc::new(PhaseAction(Phase::PreBuild)));
  registry.register("compile", || Rc::new(PhaseAction(Phase::Build)));
  registry.register("post-build", || Rc::new(PhaseAction(Phase::PostBuild)));
  registry.register("test", || Rc::new(PhaseAction(Phase::Test)));
  registry.register("install", || Rc::new(PhaseAction(Phase::Install)));
  registry.register("clean", || Rc::new(clean::Clean));
  registry.register("install-packages", || Rc::new(packages::InstallPackages));
  registry.register("install-compiler", || Rc::new(packages::InstallCompiler));
  registry.register("print-config", || Rc::new(report::PrintConfig));
  registry.register("print-deps", || Rc::new(report::PrintDeps));
}
