//! newt-build-lib: Bootstrap LLVM from source and drive cargo against it.
//!
//! This crate provides the pieces behind the `newt-build` command:
//! - `source`: downloads and safely unpacks the LLVM source archive
//! - `layout`: the source/build/install directory layout under the root
//! - `platform`: per-host toolchain environment, CMake generator and target triple
//! - `pipeline`: the idempotent configure and install stages
//! - `invoke`: the downstream cargo invocation
//! - `bootstrap`: the orchestrator tying them together for one run

pub mod bootstrap;
pub mod config;
pub mod consts;
pub mod exec;
pub mod invoke;
pub mod layout;
pub mod lock;
pub mod pipeline;
pub mod platform;
pub mod source;
pub mod state;
pub mod util;
