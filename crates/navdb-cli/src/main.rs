//! `navdb` — import and inspect survey positioning data.
//!
//! # Usage
//!
//! ```
//! navdb import swath_3.r01 --kind receiver --revision Rev2.1 --policy add
//! navdb lines --kind receiver
//! navdb stats --kind source --json
//! ```

mod settings;

use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use navdb_core::{
  point::PointKind,
  policy::DuplicatePolicy,
  store::{Durability, PointStore},
};
use navdb_import::{CancelFlag, ImportError, ImportOptions, Importer};
use navdb_sps::FieldDefaults;
use navdb_store_sqlite::SqliteStore;
use settings::ProjectSettings;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "navdb", about = "Import and inspect survey positioning data")]
struct Cli {
  /// Path to the TOML settings file.
  #[arg(short, long, default_value = "navdb.toml")]
  config: PathBuf,

  /// Database path (overrides the settings file).
  #[arg(long)]
  db: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Import a fixed-width positioning file.
  Import {
    file: PathBuf,

    #[arg(long, value_parser = parse_kind, default_value = "receiver")]
    kind: PointKind,

    /// Revision name (built-in: Rev0, Rev2.1; or defined in settings).
    #[arg(long, default_value = "Rev2.1")]
    revision: String,

    #[arg(long, value_parser = parse_policy, default_value = "add")]
    policy: DuplicatePolicy,

    /// Campaign/phase identifier (>= 1).
    #[arg(long, default_value_t = 1)]
    tier: i64,

    /// Nominal line bearing, stored verbatim on every point.
    #[arg(long, default_value_t = 0.0)]
    bearing: f64,

    #[arg(long, default_value_t = navdb_import::DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Trade crash safety for speed (journal and fsync off).
    #[arg(long)]
    aggressive: bool,

    /// Acquisition year for Julian-day timestamps.
    #[arg(long)]
    year: Option<i32>,

    /// Fallback for blank or unparsable integer fields.
    #[arg(long)]
    default_int: Option<i64>,

    /// Fallback for blank or unparsable float fields.
    #[arg(long)]
    default_float: Option<f64>,

    /// Text encoding chosen by the upstream detection step.
    #[arg(long, default_value = "utf-8")]
    encoding: String,

    /// Emit the run summary as JSON.
    #[arg(long)]
    json: bool,
  },

  /// List lines with their maintained aggregates.
  Lines {
    #[arg(long, value_parser = parse_kind, default_value = "receiver")]
    kind: PointKind,
    #[arg(long)]
    json: bool,
  },

  /// List the points of one line.
  Points {
    #[arg(long, value_parser = parse_kind, default_value = "receiver")]
    kind: PointKind,
    #[arg(long)]
    tier_line: i64,
    #[arg(long)]
    json: bool,
  },

  /// Whole-survey totals.
  Stats {
    #[arg(long, value_parser = parse_kind, default_value = "receiver")]
    kind: PointKind,
    #[arg(long)]
    json: bool,
  },

  /// Delete lines (and, via cascade, their points) by tier-line key.
  DeleteLines {
    #[arg(long, value_parser = parse_kind, default_value = "receiver")]
    kind: PointKind,
    /// Composite tier-line keys to delete.
    tier_lines: Vec<i64>,
  },

  /// Recompute every line's aggregates from its stored points.
  Rebuild {
    #[arg(long, value_parser = parse_kind, default_value = "receiver")]
    kind: PointKind,
  },
}

fn parse_kind(s: &str) -> Result<PointKind, String> {
  s.parse().map_err(|e: navdb_core::Error| e.to_string())
}

fn parse_policy(s: &str) -> Result<DuplicatePolicy, String> {
  s.parse().map_err(|e: navdb_core::Error| e.to_string())
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let settings = ProjectSettings::load(&cli.config)?;
  let db_path = cli.db.unwrap_or_else(|| settings.database.clone());

  let store = SqliteStore::open(&db_path)
    .await
    .with_context(|| format!("failed to open store at {db_path:?}"))?;

  match cli.command {
    Command::Import {
      file,
      kind,
      revision,
      policy,
      tier,
      bearing,
      batch_size,
      aggressive,
      year,
      default_int,
      default_float,
      encoding,
      json,
    } => {
      let schema = settings
        .resolve_revision(&revision)
        .with_context(|| format!("unknown revision {revision:?}"))?;

      let mut options =
        ImportOptions::new(schema, settings.geometry.mask_for(kind).clone(), kind, policy);
      options.sail_line_mask =
        settings.geometry.sail_line_mask_for(kind).cloned();
      options.tier = tier;
      options.line_bearing = bearing;
      options.batch_size = batch_size;
      options.defaults =
        FieldDefaults { integer: default_int, float: default_float };
      options.durability = if aggressive {
        Durability::Aggressive
      } else {
        Durability::Safe
      };
      options.year = year;

      let importer = Importer::new(store, options)?;
      let records = read_records(&file, &encoding)?;

      // Ctrl-C drains buffered records and reports partial completion.
      let cancel = CancelFlag::new();
      let flag = cancel.clone();
      tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
          tracing::warn!("cancellation requested, draining current batch");
          flag.cancel();
        }
      });

      let file_name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.display().to_string());

      match importer.run(&file_name, records, &cancel).await {
        Ok(summary) => {
          if json {
            println!("{}", serde_json::to_string_pretty(&summary)?);
          } else {
            println!(
              "Imported {} of {} records into {} lines ({} skipped){}",
              summary.records_imported,
              summary.records_seen,
              summary.distinct_lines,
              summary.records_skipped,
              if summary.cancelled { " — cancelled" } else { "" },
            );
          }
        }
        Err(ImportError::Store { source, partial }) => {
          eprintln!(
            "import failed; {} records across {} lines were committed \
             before the failure",
            partial.records_imported, partial.distinct_lines,
          );
          return Err(source.into());
        }
        Err(err) => return Err(err.into()),
      }
    }

    Command::Lines { kind, json } => {
      let lines = store.line_summaries(kind).await?;
      if json {
        println!("{}", serde_json::to_string_pretty(&lines)?);
      } else {
        println!(
          "{:>4} {:>9} {:>12} {:>7} {:>9} {:>9} {:>12} {:>8}",
          "Tier", "Line", "TierLine", "Points", "First", "Last", "Length",
          "Bearing"
        );
        for l in lines {
          println!(
            "{:>4} {:>9} {:>12} {:>7} {:>9} {:>9} {:>12.1} {:>8.1}",
            l.tier,
            l.line,
            l.tier_line,
            l.point_count,
            opt(l.first_point),
            opt(l.last_point),
            l.length,
            l.bearing,
          );
        }
      }
    }

    Command::Points { kind, tier_line, json } => {
      let points = store.line_points(kind, tier_line).await?;
      if json {
        println!("{}", serde_json::to_string_pretty(&points)?);
      } else {
        println!(
          "{:>9} {:>9} {:>4} {:>12} {:>12} {:>8} {:>6}",
          "Line", "Point", "Idx", "X", "Y", "Z", "Code"
        );
        for p in points {
          println!(
            "{:>9} {:>9} {:>4} {:>12.1} {:>12.1} {:>8.1} {:>6}",
            p.line, p.point, p.point_index, p.x, p.y, p.z, p.point_code,
          );
        }
      }
    }

    Command::Stats { kind, json } => {
      let totals = store.survey_totals(kind).await?;
      if json {
        println!("{}", serde_json::to_string_pretty(&totals)?);
      } else {
        println!(
          "{} lines, {} points, {:.1} m total length",
          totals.lines, totals.points, totals.total_length,
        );
      }
    }

    Command::DeleteLines { kind, tier_lines } => {
      anyhow::ensure!(!tier_lines.is_empty(), "no lines selected for delete");
      let deleted = store.delete_lines(kind, tier_lines).await?;
      println!("Deleted {deleted} lines");
    }

    Command::Rebuild { kind } => {
      store.rebuild_line_aggregates(kind).await?;
      println!("Line aggregates rebuilt from stored points");
    }
  }

  Ok(())
}

// ─── Helpers ──────────────────────────────────────────────────────────────────

/// Read the input as a vector of record lines. The encoding label comes
/// from the upstream detection step; anything non-UTF-8 is read with
/// replacement so a stray byte costs one field, not the file.
fn read_records(
  path:     &std::path::Path,
  encoding: &str,
) -> anyhow::Result<Vec<String>> {
  let bytes = std::fs::read(path)
    .with_context(|| format!("failed to read {}", path.display()))?;

  let known_utf8 =
    matches!(encoding.to_ascii_lowercase().as_str(), "utf-8" | "utf8" | "ascii" | "utf-8-sig");
  if !known_utf8 {
    tracing::warn!(
      encoding,
      "encoding not natively supported; reading as UTF-8 with replacement"
    );
  }

  let text = String::from_utf8_lossy(&bytes);
  Ok(text.lines().map(str::to_string).collect())
}

fn opt(v: Option<i64>) -> String {
  v.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}
