//! SQLite storage for OHLCV bars, trade outcomes and the weight vector.

use crate::domain::error::TurbotraderError;
use crate::domain::normalizer::NormalizedScores;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::outcome::TradeOutcome;
use crate::domain::timeframe::Timeframe;
use crate::domain::weights::WeightVector;
use crate::ports::config_port::ConfigPort;
use crate::ports::market_data_port::MarketDataPort;
use crate::ports::outcome_archive_port::OutcomeArchive;
use crate::ports::weight_repository_port::WeightRepository;
use chrono::{DateTime, NaiveDateTime};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{OptionalExtension, params};

fn storage_err(e: impl std::fmt::Display) -> TurbotraderError {
    TurbotraderError::Storage {
        reason: e.to_string(),
    }
}

fn to_epoch(ts: &NaiveDateTime) -> i64 {
    ts.and_utc().timestamp()
}

fn from_epoch(secs: i64) -> rusqlite::Result<NaiveDateTime> {
    DateTime::from_timestamp(secs, 0)
        .map(|dt| dt.naive_utc())
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(0, secs))
}

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, TurbotraderError> {
        let db_path =
            config
                .get_string("sqlite", "path")
                .ok_or_else(|| TurbotraderError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;

        let pool_size = config.get_int("sqlite", "pool_size", 4).max(1) as u32;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(storage_err)?;

        let adapter = Self { pool };
        adapter.initialize_schema()?;
        Ok(adapter)
    }

    pub fn in_memory() -> Result<Self, TurbotraderError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(storage_err)?;

        let adapter = Self { pool };
        adapter.initialize_schema()?;
        Ok(adapter)
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, TurbotraderError> {
        self.pool.get().map_err(storage_err)
    }

    pub fn initialize_schema(&self) -> Result<(), TurbotraderError> {
        self.conn()?
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS ohlcv (
                    asset TEXT NOT NULL,
                    timeframe TEXT NOT NULL,
                    ts INTEGER NOT NULL,
                    open REAL NOT NULL,
                    high REAL NOT NULL,
                    low REAL NOT NULL,
                    close REAL NOT NULL,
                    volume REAL NOT NULL,
                    PRIMARY KEY (asset, timeframe, ts)
                );
                CREATE TABLE IF NOT EXISTS outcomes (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    asset TEXT NOT NULL,
                    entry_ts INTEGER NOT NULL,
                    exit_ts INTEGER NOT NULL,
                    entry_score REAL NOT NULL,
                    exit_score REAL NOT NULL,
                    entry_price REAL NOT NULL,
                    exit_price REAL NOT NULL,
                    quantity REAL NOT NULL,
                    pnl REAL NOT NULL,
                    win INTEGER NOT NULL,
                    momentum REAL NOT NULL,
                    volume_delta REAL NOT NULL,
                    rsi REAL NOT NULL,
                    volatility REAL NOT NULL
                );
                CREATE TABLE IF NOT EXISTS weights (
                    id INTEGER PRIMARY KEY CHECK (id = 1),
                    price REAL NOT NULL,
                    volume REAL NOT NULL,
                    rsi REAL NOT NULL,
                    volatility REAL NOT NULL
                );",
            )
            .map_err(storage_err)
    }

    pub fn insert_bars(
        &self,
        asset: &str,
        timeframe: Timeframe,
        bars: &[OhlcvBar],
    ) -> Result<(), TurbotraderError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(storage_err)?;

        for bar in bars {
            tx.execute(
                "INSERT OR REPLACE INTO ohlcv (asset, timeframe, ts, open, high, low, close, volume)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    asset,
                    timeframe.as_str(),
                    to_epoch(&bar.timestamp),
                    bar.open,
                    bar.high,
                    bar.low,
                    bar.close,
                    bar.volume
                ],
            )
            .map_err(storage_err)?;
        }

        tx.commit().map_err(storage_err)
    }

    pub fn list_assets(&self, timeframe: Timeframe) -> Result<Vec<String>, TurbotraderError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT DISTINCT asset FROM ohlcv WHERE timeframe = ?1 ORDER BY asset")
            .map_err(storage_err)?;
        let rows = stmt
            .query_map(params![timeframe.as_str()], |row| row.get::<_, String>(0))
            .map_err(storage_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(storage_err)
    }
}

impl MarketDataPort for SqliteAdapter {
    fn fetch_ohlcv(
        &self,
        asset: &str,
        timeframe: Timeframe,
        lookback: usize,
    ) -> Result<Vec<OhlcvBar>, TurbotraderError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT ts, open, high, low, close, volume
                 FROM ohlcv
                 WHERE asset = ?1 AND timeframe = ?2
                 ORDER BY ts DESC
                 LIMIT ?3",
            )
            .map_err(storage_err)?;

        let limit = i64::try_from(lookback).unwrap_or(i64::MAX);
        let rows = stmt
            .query_map(params![asset, timeframe.as_str(), limit], |row| {
                Ok(OhlcvBar {
                    timestamp: from_epoch(row.get(0)?)?,
                    open: row.get(1)?,
                    high: row.get(2)?,
                    low: row.get(3)?,
                    close: row.get(4)?,
                    volume: row.get(5)?,
                })
            })
            .map_err(storage_err)?;

        let mut bars = rows.collect::<Result<Vec<_>, _>>().map_err(storage_err)?;
        if bars.is_empty() {
            return Err(TurbotraderError::DataUnavailable {
                asset: asset.to_string(),
                timeframe: timeframe.to_string(),
                reason: "no rows in ohlcv".into(),
            });
        }
        bars.reverse();
        Ok(bars)
    }
}

impl OutcomeArchive for SqliteAdapter {
    fn append(&self, outcome: &TradeOutcome) -> Result<(), TurbotraderError> {
        let f = &outcome.entry_features;
        self.conn()?
            .execute(
                "INSERT INTO outcomes (asset, entry_ts, exit_ts, entry_score, exit_score,
                     entry_price, exit_price, quantity, pnl, win,
                     momentum, volume_delta, rsi, volatility)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                params![
                    outcome.asset,
                    to_epoch(&outcome.entry_timestamp),
                    to_epoch(&outcome.timestamp),
                    outcome.entry_score,
                    outcome.exit_score,
                    outcome.entry_price,
                    outcome.exit_price,
                    outcome.quantity,
                    outcome.pnl,
                    outcome.win,
                    f.momentum,
                    f.volume_delta,
                    f.rsi,
                    f.volatility
                ],
            )
            .map_err(storage_err)?;
        Ok(())
    }

    fn read_all(&self) -> Result<Vec<TradeOutcome>, TurbotraderError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT asset, entry_ts, exit_ts, entry_score, exit_score, entry_price,
                        exit_price, quantity, pnl, win, momentum, volume_delta, rsi, volatility
                 FROM outcomes ORDER BY id ASC",
            )
            .map_err(storage_err)?;

        let rows = stmt
            .query_map([], |row| {
                Ok(TradeOutcome {
                    asset: row.get(0)?,
                    entry_timestamp: from_epoch(row.get(1)?)?,
                    timestamp: from_epoch(row.get(2)?)?,
                    entry_score: row.get(3)?,
                    exit_score: row.get(4)?,
                    entry_price: row.get(5)?,
                    exit_price: row.get(6)?,
                    quantity: row.get(7)?,
                    pnl: row.get(8)?,
                    win: row.get(9)?,
                    entry_features: NormalizedScores {
                        momentum: row.get(10)?,
                        volume_delta: row.get(11)?,
                        rsi: row.get(12)?,
                        volatility: row.get(13)?,
                    },
                })
            })
            .map_err(storage_err)?;

        rows.collect::<Result<Vec<_>, _>>().map_err(storage_err)
    }
}

impl WeightRepository for SqliteAdapter {
    fn load(&self) -> Result<Option<WeightVector>, TurbotraderError> {
        let weights = self
            .conn()?
            .query_row(
                "SELECT price, volume, rsi, volatility FROM weights WHERE id = 1",
                [],
                |row| {
                    Ok(WeightVector {
                        price: row.get(0)?,
                        volume: row.get(1)?,
                        rsi: row.get(2)?,
                        volatility: row.get(3)?,
                    })
                },
            )
            .optional()
            .map_err(storage_err)?;
        if let Some(w) = &weights {
            w.validate()?;
        }
        Ok(weights)
    }

    fn save(&self, weights: &WeightVector) -> Result<(), TurbotraderError> {
        weights.validate()?;
        self.conn()?
            .execute(
                "INSERT OR REPLACE INTO weights (id, price, volume, rsi, volatility)
                 VALUES (1, ?1, ?2, ?3, ?4)",
                params![weights.price, weights.volume, weights.rsi, weights.volatility],
            )
            .map_err(storage_err)?;
        Ok(())
    }
}
