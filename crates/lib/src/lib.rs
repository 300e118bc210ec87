//! twinpack-lib: build and publish JavaScript/TypeScript packages for npm and JSR
//!
//! This crate provides the pieces of one build invocation:
//! - `config`: layered, typed build configuration
//! - `build`: the orchestrator dispatching entries to builder backends
//! - `transform`: the source-to-output transformer for directory trees
//! - `link`: the cross-package linker for multi-library builds
//! - `package`: `package.json` reading and registry manifest writing
//! - `publish`: handing built packages to the registries

pub mod build;
pub mod config;
pub mod consts;
pub mod link;
pub mod package;
pub mod publish;
pub mod rewrite;
pub mod scan;
pub mod transform;
