//! Environment maps handed to spawned compiler and build processes.
//!
//! Toolchain initialization scripts report their environment as a plain text
//! dump. That text is untrusted: only lines matching the `NAME=VALUE` grammar
//! below become entries, everything else (banners, blank lines, warnings) is
//! dropped.

use std::collections::BTreeMap;
use std::collections::btree_map;

/// An immutable, name-ordered set of environment variables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvironmentMap {
  vars: BTreeMap<String, String>,
}

impl EnvironmentMap {
  /// Snapshot of the current process environment.
  ///
  /// Variables whose name or value is not valid unicode are skipped.
  pub fn inherited() -> Self {
    std::env::vars_os()
      .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
      .collect()
  }

  /// Parse an environment dump such as the output of `set` or `env`.
  ///
  /// A line is accepted when it has the form `NAME=VALUE` where `NAME` starts
  /// with an ASCII letter or `_` and continues with ASCII alphanumerics or any of
  /// `_ ( ) . - { }`. The value is the remainder of the line and may be empty or
  /// contain further `=`. Later duplicates replace earlier ones.
  pub fn parse(dump: &str) -> Self {
    dump.lines().filter_map(parse_line).collect()
  }

  /// Returns a new map where every entry of `overrides` replaces the captured one.
  pub fn with_overrides<'a, I>(&self, overrides: I) -> Self
  where
    I: IntoIterator<Item = (&'a String, &'a String)>,
  {
    let mut vars = self.vars.clone();
    for (key, value) in overrides {
      vars.insert(key.clone(), value.clone());
    }
    Self { vars }
  }

  pub fn get(&self, name: &str) -> Option<&str> {
    self.vars.get(name).map(String::as_str)
  }

  pub fn len(&self) -> usize {
    self.vars.len()
  }

  pub fn is_empty(&self) -> bool {
    self.vars.is_empty()
  }

  pub fn iter(&self) -> btree_map::Iter<'_, String, String> {
    self.vars.iter()
  }
}

impl FromIterator<(String, String)> for EnvironmentMap {
  fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
    Self {
      vars: iter.into_iter().collect(),
    }
  }
}

impl<'a> IntoIterator for &'a EnvironmentMap {
  type Item = (&'a String, &'a String);
  type IntoIter = btree_map::Iter<'a, String, String>;

  fn into_iter(self) -> Self::IntoIter {
    self.vars.iter()
  }
}

fn parse_line(line: &str) -> Option<(String, String)> {
  let line = line.strip_suffix('\r').unwrap_or(line);
  let (name, value) = line.split_once('=')?;
  is_valid_name(name).then(|| (name.to_string(), value.to_string()))
}

fn is_valid_name(name: &str) -> bool {
  let mut chars = name.chars();
  match chars.next() {
    Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
    _ => return false,
  }
  chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '(' | ')' | '.' | '-' | '{' | '}'))
}
