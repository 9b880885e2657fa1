//! `newt-build setup`: bootstrap LLVM without running cargo.

use std::path::Path;

use anyhow::Result;

use newt_build_lib::bootstrap::Bootstrap;
use newt_build_lib::exec::SystemRunner;
use newt_build_lib::pipeline::LazyEnvironment;

use super::{GlobalOpts, Session};
use crate::output::{print_info, print_success};

pub fn cmd_setup(opts: &GlobalOpts) -> Result<()> {
  let session = Session::open(opts)?;
  let bootstrap = Bootstrap::new(&session.settings, session.layout.clone(), session.platform.as_ref());

  let mut env = LazyEnvironment::new(opts.host);
  let prefix = bootstrap.prepare(opts.host, "setup", &mut env, &mut SystemRunner)?;

  print_success(&format!(
    "LLVM {} for {} installed at {}",
    session.settings.llvm.version,
    opts.host,
    prefix.display()
  ));
  print_info("To build llvm-sys crates against it, set:");
  println!();
  for (shell, line) in export_lines(&session.settings.cargo.prefix_env_var, &prefix) {
    println!("  {:<11}{}", format!("{}:", shell), line);
  }

  Ok(())
}

/// How to set `var` to `prefix` in each supported shell.
fn export_lines(var: &str, prefix: &Path) -> [(&'static str, String); 3] {
  let prefix = prefix.display();
  [
    ("bash", format!("export {}=\"{}\"", var, prefix)),
    ("batch", format!("set \"{}={}\"", var, prefix)),
    ("powershell", format!("$env:{} = \"{}\"", var, prefix)),
  ]
}
