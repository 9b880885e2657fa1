use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Host architectures LLVM can be built for.
///
/// The string form doubles as the install directory name under the root,
/// so it must stay stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
  X64,
  X86,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown architecture '{0}' (expected one of: x64, x86)")]
pub struct ParseArchError(pub String);

impl Arch {
  pub const ALL: [Arch; 2] = [Arch::X64, Arch::X86];

  /// Returns the lowercase string identifier for this architecture
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::X64 => "x64",
      Self::X86 => "x86",
    }
  }
}

impl fmt::Display for Arch {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

impl FromStr for Arch {
  type Err = ParseArchError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Arch::ALL
      .into_iter()
      .find(|arch| arch.as_str() == s)
      .ok_or_else(|| ParseArchError(s.to_string()))
  }
}
