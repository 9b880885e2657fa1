pub const APP_NAME: &str = "newt-build";

/// Default config file looked up in the working directory.
pub const CONFIG_FILENAME: &str = "newt-build.toml";

pub const LLVM_VERSION: &str = "6.0.1";

/// Variable llvm-sys reads to locate an LLVM 6.0 installation.
pub const LLVM_PREFIX_ENV_VAR: &str = "LLVM_SYS_60_PREFIX";

/// Root directory name used when no root is configured.
pub const DEFAULT_ROOT_DIR: &str = "llvm";

pub const ROOT_ENV_VAR: &str = "NEWT_BUILD_ROOT";
pub const MSVC_INSTALL_ENV_VAR: &str = "NEWT_MSVC_INSTALL";

/// Top-level directory inside the LLVM source tarball for a given version.
pub fn llvm_archive_root(version: &str) -> String {
  format!("llvm-{}.src", version)
}

/// Release URL of the LLVM source tarball for a given version.
pub fn llvm_source_url(version: &str) -> String {
  format!(
    "https://releases.llvm.org/{}/{}.tar.xz",
    version,
    llvm_archive_root(version)
  )
}
