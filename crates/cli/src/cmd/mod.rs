mod cargo;
mod setup;

use std::path::PathBuf;

use anyhow::{Context, Result};

use newt_build_lib::config::{OptLevel, Settings};
use newt_build_lib::layout::Layout;
use newt_build_lib::platform::arch::Arch;
use newt_build_lib::platform::{self, HostPlatform};

pub use cargo::cmd_cargo;
pub use setup::cmd_setup;

/// Options shared by every subcommand.
pub struct GlobalOpts {
  pub host: Arch,
  pub release: bool,
  pub root: Option<PathBuf>,
  pub config: Option<PathBuf>,
}

impl GlobalOpts {
  pub fn opt_level(&self) -> OptLevel {
    if self.release { OptLevel::Release } else { OptLevel::Debug }
  }
}

/// Everything a command needs before it can touch the bootstrap root.
struct Session {
  settings: Settings,
  layout: Layout,
  platform: Box<dyn HostPlatform>,
}

impl Session {
  /// Settings come from the config file, then the environment, then `--root`.
  fn open(opts: &GlobalOpts) -> Result<Self> {
    let mut settings = Settings::load(opts.config.as_deref()).context("Failed to load settings")?;
    if let Some(root) = &opts.root {
      settings.root = Some(root.clone());
    }

    let cwd = std::env::current_dir().context("Failed to determine working directory")?;
    let layout = settings.layout(&cwd);
    let platform = platform::detect(&settings)?;

    Ok(Self {
      settings,
      layout,
      platform,
    })
  }
}
