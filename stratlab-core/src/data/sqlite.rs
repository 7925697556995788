//! SQLite bar source behind an r2d2 connection pool.
//!
//! The pool is the resource manager: `acquire` checks a connection out and
//! dropping the guard releases it. Pool timeouts and busy/locked databases are
//! transient; everything else is permanent.

use super::source::{BarSource, StorageError, SymbolRange};
use crate::domain::Bar;
use chrono::{DateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, ErrorCode};
use std::path::Path;

pub struct SqliteBarSource {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteBarSource {
    pub fn open(path: impl AsRef<Path>, pool_size: u32) -> Result<Self, StorageError> {
        let manager = SqliteConnectionManager::file(path.as_ref());
        let pool = Pool::builder()
            .max_size(pool_size.max(1))
            .build(manager)
            .map_err(|e: r2d2::Error| StorageError::Permanent(e.to_string()))?;
        Ok(Self { pool })
    }

    /// Check a connection out of the pool.
    pub fn acquire(&self) -> Result<PooledConnection<SqliteConnectionManager>, StorageError> {
        self.pool
            .get()
            .map_err(|e: r2d2::Error| StorageError::Transient(e.to_string()))
    }

    pub fn initialize_schema(&self) -> Result<(), StorageError> {
        let conn = self.acquire()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS bars (
                symbol TEXT NOT NULL,
                time INTEGER NOT NULL,
                open REAL NOT NULL,
                high REAL NOT NULL,
                low REAL NOT NULL,
                close REAL NOT NULL,
                volume INTEGER NOT NULL,
                vwap REAL,
                PRIMARY KEY (symbol, time)
            );
            CREATE INDEX IF NOT EXISTS idx_bars_time ON bars(time);",
        )
        .map_err(map_sql_error)
    }

    /// Upsert a series. Used to seed fixtures; ingestion proper lives elsewhere.
    pub fn insert_bars(&self, symbol: &str, bars: &[Bar]) -> Result<(), StorageError> {
        let mut conn = self.acquire()?;
        let tx = conn.transaction().map_err(map_sql_error)?;
        for bar in bars {
            tx.execute(
                "INSERT OR REPLACE INTO bars (symbol, time, open, high, low, close, volume, vwap)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    symbol,
                    bar.time.timestamp(),
                    bar.open,
                    bar.high,
                    bar.low,
                    bar.close,
                    bar.volume as i64,
                    bar.vwap
                ],
            )
            .map_err(map_sql_error)?;
        }
        tx.commit().map_err(map_sql_error)
    }
}

fn map_sql_error(e: rusqlite::Error) -> StorageError {
    match e.sqlite_error_code() {
        Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => {
            StorageError::Transient(e.to_string())
        }
        _ => StorageError::Permanent(e.to_string()),
    }
}

fn to_time(secs: i64) -> Result<DateTime<Utc>, StorageError> {
    DateTime::<Utc>::from_timestamp(secs, 0)
        .ok_or_else(|| StorageError::Permanent(format!("timestamp out of range: {secs}")))
}

impl BarSource for SqliteBarSource {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn query(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Bar>, StorageError> {
        let conn = self.acquire()?;
        let mut stmt = conn
            .prepare(
                "SELECT time, open, high, low, close, volume, vwap
                 FROM bars
                 WHERE symbol = ?1 AND time >= ?2 AND time <= ?3
                 ORDER BY time ASC",
            )
            .map_err(map_sql_error)?;

        let rows = stmt
            .query_map(params![symbol, start.timestamp(), end.timestamp()], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, f64>(1)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, f64>(3)?,
                    row.get::<_, f64>(4)?,
                    row.get::<_, i64>(5)?,
                    row.get::<_, Option<f64>>(6)?,
                ))
            })
            .map_err(map_sql_error)?;

        let mut bars = Vec::new();
        for row in rows {
            let (time, open, high, low, close, volume, vwap) = row.map_err(map_sql_error)?;
            let volume = u64::try_from(volume).map_err(|_| {
                StorageError::Permanent(format!("negative volume {volume} for {symbol} at {time}"))
            })?;
            bars.push(Bar {
                time: to_time(time)?,
                open,
                high,
                low,
                close,
                volume,
                vwap,
            });
        }
        Ok(bars)
    }

    fn available_symbols(&self) -> Result<Vec<String>, StorageError> {
        let conn = self.acquire()?;
        let mut stmt = conn
            .prepare("SELECT DISTINCT symbol FROM bars ORDER BY symbol")
            .map_err(map_sql_error)?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(map_sql_error)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(map_sql_error)
    }

    fn date_range(&self, symbol: &str) -> Result<Option<SymbolRange>, StorageError> {
        let conn = self.acquire()?;
        let (first, last, count) = conn
            .query_row(
                "SELECT MIN(time), MAX(time), COUNT(*) FROM bars WHERE symbol = ?1",
                params![symbol],
                |row| {
                    Ok((
                        row.get::<_, Option<i64>>(0)?,
                        row.get::<_, Option<i64>>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                },
            )
            .map_err(map_sql_error)?;
        match (first, last) {
            (Some(first), Some(last)) => Ok(Some(SymbolRange {
                first: to_time(first)?,
                last: to_time(last)?,
                bars: count as usize,
            })),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::test_bars;

    fn seeded(dir: &Path) -> (SqliteBarSource, Vec<Bar>) {
        let src = SqliteBarSource::open(dir.join("bars.db"), 2).unwrap();
        src.initialize_schema().unwrap();
        let mut bars = test_bars(&[100.0, 101.0, 102.0, 103.0]);
        bars[2].vwap = Some(101.7);
        src.insert_bars("SPY", &bars).unwrap();
        src.insert_bars("QQQ", &bars[..1]).unwrap();
        (src, bars)
    }

    #[test]
    fn query_returns_ordered_range() {
        let dir = tempfile::tempdir().unwrap();
        let (src, bars) = seeded(dir.path());
        let rows = src.query("SPY", bars[1].time, bars[3].time).unwrap();
        assert_eq!(rows, bars[1..].to_vec());
    }

    #[test]
    fn symbols_and_range() {
        let dir = tempfile::tempdir().unwrap();
        let (src, bars) = seeded(dir.path());
        assert_eq!(src.available_symbols().unwrap(), vec!["QQQ", "SPY"]);
        let range = src.date_range("SPY").unwrap().unwrap();
        assert_eq!(range.first, bars[0].time);
        assert_eq!(range.last, bars[3].time);
        assert_eq!(range.bars, 4);
        assert_eq!(src.date_range("NOPE").unwrap(), None);
    }

    #[test]
    fn missing_table_is_permanent() {
        let dir = tempfile::tempdir().unwrap();
        let src = SqliteBarSource::open(dir.path().join("empty.db"), 1).unwrap();
        let bars = test_bars(&[1.0]);
        let err = src.query("SPY", bars[0].time, bars[0].time).unwrap_err();
        assert!(matches!(err, StorageError::Permanent(_)), "{err:?}");
    }
}
