//! Lifecycle hooks.
//!
//! Callbacks are keyed by a closed set of stages and run synchronously, in
//! registration order, by the orchestrator. The first failing callback aborts
//! the build.

use std::collections::HashMap;
use std::fmt;

use super::context::BuildContext;
use super::types::BuildError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookStage {
  /// Configuration merged and options normalized.
  ConfigResolved,
  /// Entries normalized and externals inferred.
  EntriesResolved,
  BackendsBefore,
  BackendsDone,
  /// Manifest complete, before validation.
  ManifestReady,
  BuildDone,
}

impl fmt::Display for HookStage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      HookStage::ConfigResolved => "config:resolved",
      HookStage::EntriesResolved => "entries:resolved",
      HookStage::BackendsBefore => "backends:before",
      HookStage::BackendsDone => "backends:done",
      HookStage::ManifestReady => "manifest:ready",
      HookStage::BuildDone => "build:done",
    };
    write!(f, "{}", name)
  }
}

pub type HookFn = Box<dyn Fn(&mut BuildContext) -> Result<(), BuildError> + Send + Sync>;

#[derive(Default)]
pub struct HookRegistry {
  hooks: HashMap<HookStage, Vec<HookFn>>,
}

impl HookRegistry {
  pub fn register<F>(&mut self, stage: HookStage, hook: F)
  where
    F: Fn(&mut BuildContext) -> Result<(), BuildError> + Send + Sync + 'static,
  {
    self.hooks.entry(stage).or_default().push(Box::new(hook));
  }

  pub fn run(&self, stage: HookStage, ctx: &mut BuildContext) -> Result<(), BuildError> {
    let Some(hooks) = self.hooks.get(&stage) else {
      return Ok(());
    };
    tracing::debug!(stage = %stage, count = hooks.len(), "running hooks");
    for hook in hooks {
      hook(ctx)?;
    }
    Ok(())
  }
}

impl fmt::Debug for HookRegistry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let counts: HashMap<_, _> = self.hooks.iter().map(|(stage, hooks)| (*stage, hooks.len())).collect();
    f.debug_struct("HookRegistry").field("hooks", &counts).finish()
  }
}
