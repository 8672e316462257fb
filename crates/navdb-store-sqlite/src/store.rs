//! [`SqliteStore`] — the SQLite implementation of [`PointStore`].

use std::{collections::HashMap, path::Path};

use chrono::Utc;
use rusqlite::{TransactionBehavior, params, params_from_iter};

use navdb_core::{
  aggregate::{LineAggregateRow, bearing_degrees},
  point::{DecodedPoint, PointKind},
  policy::{DuplicatePolicy, NaturalKey},
  store::{
    Durability, LineSummary, NewLine, PointStore, StoredPoint, SurveyTotals,
  },
};

use crate::{
  Error, Result,
  encode::{POINT_COLUMNS, POINT_PLACEHOLDERS, RawStoredPoint, encode_dt},
  schema::{full_schema, table_names},
};

// SQLite caps bound parameters per statement; 300 triple keys stay well
// under the limit.
const MAX_INDEX_CHUNK: usize = 300;
const SELECT_CHUNK: usize = 500;

// ─── Store ───────────────────────────────────────────────────────────────────

/// A navdb store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone, Debug)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(&full_schema())?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── PointStore impl ─────────────────────────────────────────────────────────

impl PointStore for SqliteStore {
  type Error = Error;

  // ── Import-run bracket ────────────────────────────────────────────────

  async fn register_file(&self, file_name: &str) -> Result<i64> {
    let name = file_name.to_owned();
    let loaded_at = Utc::now().to_rfc3339();

    let id = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR IGNORE INTO import_files (file_name, loaded_at)
           VALUES (?1, ?2)",
          params![name, loaded_at],
        )?;
        let id: i64 = conn.query_row(
          "SELECT id FROM import_files WHERE file_name = ?1",
          params![name],
          |row| row.get(0),
        )?;
        Ok(id)
      })
      .await?;

    Ok(id)
  }

  async fn prepare_import(&self, durability: Durability) -> Result<()> {
    tracing::debug!(?durability, "applying bulk-import pragmas");
    self
      .conn
      .call(move |conn| {
        conn.execute_batch(
          "PRAGMA busy_timeout = 30000;
           PRAGMA temp_store = MEMORY;
           PRAGMA cache_size = -200000;
           PRAGMA foreign_keys = OFF;",
        )?;
        match durability {
          Durability::Safe => conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
          )?,
          Durability::Aggressive => conn.execute_batch(
            "PRAGMA journal_mode = OFF;
             PRAGMA synchronous = OFF;",
          )?,
        }
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn finish_import(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Batch writes ──────────────────────────────────────────────────────

  async fn ensure_lines(
    &self,
    kind: PointKind,
    lines: Vec<NewLine>,
    file_fk: i64,
  ) -> Result<HashMap<i64, i64>> {
    if lines.is_empty() {
      return Ok(HashMap::new());
    }
    let (line_table, _) = table_names(kind);

    let map = self
      .conn
      .call(move |conn| {
        let tx =
          conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        {
          let mut insert = tx.prepare(&format!(
            "INSERT OR IGNORE INTO {line_table}
               (tier_line, line, tier, file_fk)
             VALUES (?1, ?2, ?3, ?4)"
          ))?;
          for l in &lines {
            insert.execute(params![l.tier_line, l.line, l.tier, file_fk])?;
          }
        }

        let mut map = HashMap::with_capacity(lines.len());
        let tier_lines: Vec<i64> = lines.iter().map(|l| l.tier_line).collect();
        for chunk in tier_lines.chunks(SELECT_CHUNK) {
          let placeholders = vec!["?"; chunk.len()].join(",");
          let mut select = tx.prepare(&format!(
            "SELECT id, tier_line FROM {line_table}
             WHERE tier_line IN ({placeholders})"
          ))?;
          let rows = select.query_map(
            params_from_iter(chunk.iter()),
            |row| Ok((row.get::<_, i64>(1)?, row.get::<_, i64>(0)?)),
          )?;
          for row in rows {
            let (tier_line, id) = row?;
            map.insert(tier_line, id);
          }
        }

        tx.commit()?;
        Ok(map)
      })
      .await?;

    Ok(map)
  }

  async fn max_point_index(
    &self,
    kind: PointKind,
    keys: Vec<NaturalKey>,
  ) -> Result<HashMap<NaturalKey, i64>> {
    if keys.is_empty() {
      return Ok(HashMap::new());
    }
    let (_, point_table) = table_names(kind);

    let map = self
      .conn
      .call(move |conn| {
        let mut map = HashMap::with_capacity(keys.len());
        for chunk in keys.chunks(MAX_INDEX_CHUNK) {
          let placeholders = vec!["(?, ?, ?)"; chunk.len()].join(",");
          let mut stmt = conn.prepare(&format!(
            "SELECT tier, line, point, MAX(point_index)
             FROM {point_table}
             WHERE (tier, line, point) IN ({placeholders})
             GROUP BY tier, line, point"
          ))?;

          let mut bound: Vec<i64> = Vec::with_capacity(chunk.len() * 3);
          for (tier, line, point) in chunk {
            bound.extend([*tier, *line, *point]);
          }

          let rows = stmt.query_map(params_from_iter(bound), |row| {
            Ok((
              (
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
              ),
              row.get::<_, i64>(3)?,
            ))
          })?;
          for row in rows {
            let (key, max) = row?;
            map.insert(key, max);
          }
        }
        Ok(map)
      })
      .await?;

    Ok(map)
  }

  async fn insert_points(
    &self,
    kind: PointKind,
    rows: Vec<DecodedPoint>,
    policy: DuplicatePolicy,
    file_fk: i64,
  ) -> Result<()> {
    if rows.is_empty() {
      return Ok(());
    }
    let (_, point_table) = table_names(kind);
    let count = rows.len();

    self
      .conn
      .call(move |conn| {
        let tx =
          conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        {
          let sql = match policy {
            DuplicatePolicy::Add => format!(
              "INSERT INTO {point_table} ({POINT_COLUMNS})
               VALUES ({POINT_PLACEHOLDERS})"
            ),
            DuplicatePolicy::KeepFirst => format!(
              "INSERT OR IGNORE INTO {point_table} ({POINT_COLUMNS})
               VALUES ({POINT_PLACEHOLDERS})"
            ),
            DuplicatePolicy::KeepLast => format!(
              "INSERT INTO {point_table} ({POINT_COLUMNS})
               VALUES ({POINT_PLACEHOLDERS})
               ON CONFLICT(tier, line, point, point_index) DO UPDATE SET
                 line_fk = excluded.line_fk,
                 file_fk = excluded.file_fk,
                 x = excluded.x,
                 y = excluded.y,
                 z = excluded.z,
                 water_depth = excluded.water_depth,
                 point_code = excluded.point_code,
                 attempt = excluded.attempt,
                 sequence = excluded.sequence,
                 acquired_at = excluded.acquired_at,
                 line_point = excluded.line_point,
                 line_point_index = excluded.line_point_index,
                 tier_line = excluded.tier_line,
                 tier_line_point = excluded.tier_line_point,
                 tier_line_point_index = excluded.tier_line_point_index,
                 line_bearing = excluded.line_bearing"
            ),
          };

          let mut stmt = tx.prepare(&sql)?;
          for p in &rows {
            stmt.execute(params![
              p.tier,
              p.line,
              p.point,
              p.point_index,
              p.line_fk,
              file_fk,
              p.easting,
              p.northing,
              p.elevation,
              p.water_depth,
              p.point_code,
              p.attempt,
              p.sequence,
              p.acquired_at.map(encode_dt),
              p.keys.line_point,
              p.keys.line_point_index,
              p.keys.tier_line,
              p.keys.tier_line_point,
              p.keys.tier_line_point_index,
              p.line_bearing,
            ])?;
          }
        }
        tx.commit()?;
        Ok(())
      })
      .await?;

    tracing::debug!(count, policy = %policy, "point batch flushed");
    Ok(())
  }

  async fn update_line_aggregates(
    &self,
    kind: PointKind,
    rows: Vec<LineAggregateRow>,
    file_fk: i64,
  ) -> Result<()> {
    if rows.is_empty() {
      return Ok(());
    }
    let (line_table, _) = table_names(kind);

    self
      .conn
      .call(move |conn| {
        let tx =
          conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        {
          let mut stmt = tx.prepare(&format!(
            "UPDATE {line_table} SET
               point_count = ?1,
               first_point = ?2,
               last_point  = ?3,
               start_x     = ?4,
               start_y     = ?5,
               end_x       = ?6,
               end_y       = ?7,
               line_length = ?8,
               line_bearing = ?9
             WHERE tier_line = ?10 AND file_fk = ?11"
          ))?;
          for r in &rows {
            stmt.execute(params![
              r.point_count,
              r.first_point,
              r.last_point,
              r.start_x,
              r.start_y,
              r.end_x,
              r.end_y,
              r.length,
              r.bearing,
              r.tier_line,
              file_fk,
            ])?;
          }
        }
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Reads ─────────────────────────────────────────────────────────────

  async fn line_summaries(&self, kind: PointKind) -> Result<Vec<LineSummary>> {
    let (line_table, _) = table_names(kind);

    let rows = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT id, tier, line, tier_line, point_count,
                  first_point, last_point,
                  start_x, start_y, end_x, end_y,
                  line_length, line_bearing
           FROM {line_table}
           ORDER BY tier ASC, tier_line ASC"
        ))?;
        let rows = stmt
          .query_map([], |row| {
            Ok(LineSummary {
              id:          row.get(0)?,
              tier:        row.get(1)?,
              line:        row.get(2)?,
              tier_line:   row.get(3)?,
              point_count: row.get(4)?,
              first_point: row.get(5)?,
              last_point:  row.get(6)?,
              start_x:     row.get(7)?,
              start_y:     row.get(8)?,
              end_x:       row.get(9)?,
              end_y:       row.get(10)?,
              length:      row.get(11)?,
              bearing:     row.get(12)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(rows)
  }

  async fn line_points(
    &self,
    kind: PointKind,
    tier_line: i64,
  ) -> Result<Vec<StoredPoint>> {
    let (_, point_table) = table_names(kind);

    let raws = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT tier, line, point, point_index, line_fk, file_fk,
                  x, y, z, water_depth, point_code, attempt, sequence,
                  acquired_at, line_point, line_point_index, tier_line,
                  tier_line_point, tier_line_point_index, line_bearing
           FROM {point_table}
           WHERE tier_line = ?1
           ORDER BY point ASC, point_index ASC"
        ))?;
        let rows = stmt
          .query_map(params![tier_line], |row| {
            Ok(RawStoredPoint {
              tier:        row.get(0)?,
              line:        row.get(1)?,
              point:       row.get(2)?,
              point_index: row.get(3)?,
              line_fk:     row.get(4)?,
              file_fk:     row.get(5)?,
              x:           row.get(6)?,
              y:           row.get(7)?,
              z:           row.get(8)?,
              water_depth: row.get(9)?,
              point_code:  row.get(10)?,
              attempt:     row.get(11)?,
              sequence:    row.get(12)?,
              acquired_at: row.get(13)?,
              line_point:            row.get(14)?,
              line_point_index:      row.get(15)?,
              tier_line:             row.get(16)?,
              tier_line_point:       row.get(17)?,
              tier_line_point_index: row.get(18)?,
              line_bearing: row.get(19)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawStoredPoint::into_stored).collect()
  }

  async fn survey_totals(&self, kind: PointKind) -> Result<SurveyTotals> {
    let (line_table, _) = table_names(kind);

    let totals = self
      .conn
      .call(move |conn| {
        let totals = conn.query_row(
          &format!(
            "SELECT COUNT(DISTINCT tier_line),
                    COALESCE(SUM(point_count), 0),
                    COALESCE(SUM(line_length), 0.0)
             FROM {line_table}"
          ),
          [],
          |row| {
            Ok(SurveyTotals {
              lines:        row.get(0)?,
              points:       row.get(1)?,
              total_length: row.get(2)?,
            })
          },
        )?;
        Ok(totals)
      })
      .await?;

    Ok(totals)
  }

  // ── Maintenance ───────────────────────────────────────────────────────

  async fn delete_lines(
    &self,
    kind: PointKind,
    tier_lines: Vec<i64>,
  ) -> Result<usize> {
    if tier_lines.is_empty() {
      return Ok(0);
    }
    let (line_table, _) = table_names(kind);

    let deleted = self
      .conn
      .call(move |conn| {
        let tx =
          conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut deleted = 0usize;
        {
          let mut stmt = tx.prepare(&format!(
            "DELETE FROM {line_table} WHERE tier_line = ?1"
          ))?;
          for tier_line in &tier_lines {
            deleted += stmt.execute(params![tier_line])?;
          }
        }
        tx.commit()?;
        Ok(deleted)
      })
      .await?;

    tracing::info!(deleted, kind = %kind, "lines deleted");
    Ok(deleted)
  }

  async fn rebuild_line_aggregates(&self, kind: PointKind) -> Result<()> {
    let (line_table, point_table) = table_names(kind);

    self
      .conn
      .call(move |conn| {
        let tx =
          conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let lines: Vec<(i64, i64, i64, i64)> = {
          let mut stmt = tx.prepare(&format!(
            "SELECT line_fk, MIN(point), MAX(point), COUNT(*)
             FROM {point_table}
             GROUP BY line_fk"
          ))?;
          let rows = stmt
            .query_map([], |row| {
              Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
          rows
        };

        for (line_fk, first_point, last_point, point_count) in lines {
          let (start_x, start_y): (f64, f64) = tx.query_row(
            &format!(
              "SELECT x, y FROM {point_table} WHERE line_fk = ?1
               ORDER BY point ASC, point_index ASC LIMIT 1"
            ),
            params![line_fk],
            |row| Ok((row.get(0)?, row.get(1)?)),
          )?;
          let (end_x, end_y): (f64, f64) = tx.query_row(
            &format!(
              "SELECT x, y FROM {point_table} WHERE line_fk = ?1
               ORDER BY point DESC, point_index DESC LIMIT 1"
            ),
            params![line_fk],
            |row| Ok((row.get(0)?, row.get(1)?)),
          )?;

          let dx = end_x - start_x;
          let dy = end_y - start_y;

          tx.execute(
            &format!(
              "UPDATE {line_table} SET
                 point_count = ?1,
                 first_point = ?2,
                 last_point  = ?3,
                 start_x     = ?4,
                 start_y     = ?5,
                 end_x       = ?6,
                 end_y       = ?7,
                 line_length = ?8,
                 line_bearing = ?9
               WHERE id = ?10"
            ),
            params![
              point_count,
              first_point,
              last_point,
              start_x,
              start_y,
              end_x,
              end_y,
              dx.hypot(dy),
              bearing_degrees(dx, dy),
              line_fk,
            ],
          )?;
        }

        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}
