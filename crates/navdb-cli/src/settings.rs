//! Project settings: database path, geometry masks, and custom revisions.
//!
//! Loaded from a TOML file with a `NAVDB_`-prefixed environment overlay;
//! CLI flags override both.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use navdb_core::{geometry::GeometryConfig, revision::RevisionSchema};
use serde::Deserialize;

/// Shape of the `navdb.toml` settings file. Every section is optional.
#[derive(Debug, Deserialize)]
pub struct ProjectSettings {
  /// Path to the project SQLite database.
  #[serde(default = "default_database")]
  pub database: PathBuf,

  #[serde(default)]
  pub geometry: GeometryConfig,

  /// Custom revision layouts, looked up by name before the built-ins.
  #[serde(default)]
  pub revisions: Vec<RevisionSchema>,
}

fn default_database() -> PathBuf { PathBuf::from("project.sqlite3") }

impl Default for ProjectSettings {
  fn default() -> Self {
    Self {
      database:  default_database(),
      geometry:  GeometryConfig::default(),
      revisions: Vec::new(),
    }
  }
}

impl ProjectSettings {
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path.to_path_buf()).required(false))
      .add_source(config::Environment::with_prefix("NAVDB"))
      .build()
      .context("failed to read settings")?;

    settings
      .try_deserialize()
      .context("failed to deserialise settings")
  }

  /// Resolve a revision by name: settings-defined layouts first, then the
  /// built-in SPS revisions.
  pub fn resolve_revision(&self, name: &str) -> Option<RevisionSchema> {
    self
      .revisions
      .iter()
      .find(|r| r.name.eq_ignore_ascii_case(name))
      .cloned()
      .or_else(|| builtin_revision(name))
  }
}

fn builtin_revision(name: &str) -> Option<RevisionSchema> {
  match name.to_ascii_lowercase().as_str() {
    "rev0" | "rev01" | "rev1" => Some(RevisionSchema::rev_0()),
    "rev2.1" | "rev21" => Some(RevisionSchema::rev_2_1()),
    _ => None,
  }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn builtin_revisions_resolve_case_insensitively() {
    let settings = ProjectSettings::default();
    assert!(settings.resolve_revision("Rev2.1").is_some());
    assert!(settings.resolve_revision("REV0").is_some());
    assert!(settings.resolve_revision("Rev9").is_none());
  }

  #[test]
  fn custom_revision_shadows_builtin() {
    let mut custom = RevisionSchema::rev_0();
    custom.name = "Rev2.1".to_string();
    custom.line = navdb_core::revision::FieldSpan::new(1, 5);

    let settings = ProjectSettings {
      revisions: vec![custom],
      ..Default::default()
    };
    let resolved = settings.resolve_revision("rev2.1").unwrap();
    assert_eq!(resolved.line.end, 5);
  }
}
