//! SQL schema for the navdb SQLite store.
//!
//! Executed once at connection startup; idempotent thanks to
//! `CREATE TABLE IF NOT EXISTS`. Future migrations will be gated on
//! `PRAGMA user_version`.
//!
//! Each point kind (receiver / source / QC fix) owns an identical pair of
//! tables: a line table holding the per-line aggregates and a point table
//! holding one row per physical observation. The natural point key
//! `(tier, line, point, point_index)` is unique; whether a conflict is an
//! error, an ignore, or an overwrite is the import policy's decision, not
//! the schema's.

use navdb_core::point::PointKind;

const HEADER: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS import_files (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    file_name  TEXT NOT NULL UNIQUE,
    loaded_at  TEXT NOT NULL    -- ISO 8601 UTC
);
";

/// Line and point table names for a kind.
pub fn table_names(kind: PointKind) -> (&'static str, &'static str) {
  match kind {
    PointKind::Receiver => ("receiver_lines", "receiver_points"),
    PointKind::Source => ("source_lines", "source_points"),
    PointKind::QcFix => ("qc_fix_lines", "qc_fix_points"),
  }
}

fn kind_ddl(line_table: &str, point_table: &str) -> String {
  format!(
    "
CREATE TABLE IF NOT EXISTS {line_table} (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    tier_line    INTEGER NOT NULL UNIQUE,
    line         INTEGER NOT NULL,
    tier         INTEGER NOT NULL,
    file_fk      INTEGER REFERENCES import_files(id),
    point_count  INTEGER NOT NULL DEFAULT 0,
    first_point  INTEGER,
    last_point   INTEGER,
    start_x      REAL,
    start_y      REAL,
    end_x        REAL,
    end_y        REAL,
    line_length  REAL NOT NULL DEFAULT 0.0,
    line_bearing REAL NOT NULL DEFAULT 0.0
);

CREATE TABLE IF NOT EXISTS {point_table} (
    id                    INTEGER PRIMARY KEY AUTOINCREMENT,
    tier                  INTEGER NOT NULL,
    line                  INTEGER NOT NULL,
    point                 INTEGER NOT NULL,
    point_index           INTEGER NOT NULL,
    line_fk               INTEGER NOT NULL
                          REFERENCES {line_table}(id) ON DELETE CASCADE,
    file_fk               INTEGER NOT NULL REFERENCES import_files(id),
    x                     REAL NOT NULL,
    y                     REAL NOT NULL,
    z                     REAL NOT NULL,
    water_depth           REAL NOT NULL DEFAULT 0.0,
    point_code            TEXT NOT NULL DEFAULT '',
    attempt               TEXT,
    sequence              INTEGER,
    acquired_at           TEXT,
    line_point            INTEGER NOT NULL,
    line_point_index      INTEGER NOT NULL,
    tier_line             INTEGER NOT NULL,
    tier_line_point       INTEGER NOT NULL,
    tier_line_point_index INTEGER NOT NULL,
    line_bearing          REAL NOT NULL DEFAULT 0.0,
    UNIQUE (tier, line, point, point_index)
);

CREATE INDEX IF NOT EXISTS {point_table}_line_fk_idx
    ON {point_table}(line_fk);
CREATE INDEX IF NOT EXISTS {point_table}_tier_line_idx
    ON {point_table}(tier_line);
"
  )
}

/// The full DDL executed at startup.
pub fn full_schema() -> String {
  let mut sql = String::from(HEADER);
  for kind in [PointKind::Receiver, PointKind::Source, PointKind::QcFix] {
    let (line_table, point_table) = table_names(kind);
    sql.push_str(&kind_ddl(line_table, point_table));
  }
  sql.push_str("\nPRAGMA user_version = 1;\n");
  sql
}
