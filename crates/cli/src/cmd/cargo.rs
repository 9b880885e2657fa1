//! `newt-build build|run|fmt|clippy|clean|doc`: make sure LLVM is installed for
//! the host architecture, then run the matching cargo subcommand with
//! `LLVM_SYS_60_PREFIX` pointing at it.

use anyhow::Result;
use tracing::info;

use newt_build_lib::bootstrap::Bootstrap;
use newt_build_lib::config::{Action, BuildConfig};
use newt_build_lib::exec::SystemRunner;

use super::{GlobalOpts, Session};

pub fn cmd_cargo(opts: &GlobalOpts, action: Action, args: Vec<String>) -> Result<()> {
  let session = Session::open(opts)?;
  let config = BuildConfig::new(opts.host, opts.opt_level(), action, args);

  info!(
    action = action.cargo_subcommand(),
    arch = %config.arch,
    platform = session.platform.name(),
    root = %session.layout.root().display(),
    "starting"
  );

  let bootstrap = Bootstrap::new(&session.settings, session.layout.clone(), session.platform.as_ref());
  bootstrap.run(&config, &mut SystemRunner)?;

  Ok(())
}
