//! Benchmark dataset sources.
//!
//! A dataset is a table of practice records keyed by province. Sources only
//! read and decode rows; validating them is left to the benchmark
//! aggregation.

use ordered_float::OrderedFloat;
use rusqlite::{Connection, OpenFlags};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;
use valuation_core::config::{DatasetConfig, DatasetKind};
use valuation_core::{Error, PracticeRecord, Result};

/// A tabular source of practice records.
pub trait DatasetSource: Send + Sync {
    /// Load every record currently in the source.
    fn load(&self) -> Result<Vec<PracticeRecord>>;

    /// Human-readable description for logs.
    fn describe(&self) -> String;
}

/// Build the source described by the configuration.
pub fn source_from_config(config: &DatasetConfig) -> Result<Box<dyn DatasetSource>> {
    match config.kind {
        DatasetKind::Json => Ok(Box::new(JsonFileSource::new(&config.path))),
        DatasetKind::Sqlite => Ok(Box::new(SqliteSource::new(&config.path, &config.table)?)),
    }
}

/// JSON array of records stored in a file.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    /// Create a source reading from `path`.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl DatasetSource for JsonFileSource {
    fn load(&self) -> Result<Vec<PracticeRecord>> {
        let raw = std::fs::read_to_string(&self.path)?;
        let records: Vec<PracticeRecord> = serde_json::from_str(&raw)?;
        debug!(path = %self.path.display(), records = records.len(), "loaded json dataset");
        Ok(records)
    }

    fn describe(&self) -> String {
        format!("json:{}", self.path.display())
    }
}

/// Table of records in a SQLite database, opened read-only on each load.
#[derive(Debug, Clone)]
pub struct SqliteSource {
    path: PathBuf,
    table: String,
}

impl SqliteSource {
    /// Create a source reading `table` from the database at `path`.
    ///
    /// The table name is interpolated into SQL, so only identifiers made of
    /// ASCII alphanumerics and underscores are accepted.
    pub fn new(path: impl AsRef<Path>, table: &str) -> Result<Self> {
        let valid = !table.is_empty()
            && table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
            && !table.starts_with(|c: char| c.is_ascii_digit());
        if !valid {
            return Err(Error::config(format!("invalid dataset table name '{table}'")));
        }
        Ok(Self {
            path: path.as_ref().to_path_buf(),
            table: table.to_string(),
        })
    }
}

impl DatasetSource for SqliteSource {
    fn load(&self) -> Result<Vec<PracticeRecord>> {
        let conn = Connection::open_with_flags(&self.path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .map_err(|e| Error::dataset(format!("open {}: {e}", self.path.display())))?;

        let sql = format!(
            "SELECT province, collections, ebitda_or_sde, equipped_ops, sqft, asking_price, appraised_value FROM {}",
            self.table
        );
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| Error::dataset(format!("prepare: {e}")))?;

        let rows = stmt
            .query_map([], |row| {
                Ok(PracticeRecord {
                    province: row.get::<_, Option<String>>(0)?.unwrap_or_default(),
                    collections: row.get(1)?,
                    ebitda_or_sde: row.get(2)?,
                    equipped_ops: row.get(3)?,
                    sqft: row.get(4)?,
                    asking_price: row.get(5)?,
                    appraised_value: row.get(6)?,
                })
            })
            .map_err(|e| Error::dataset(format!("query: {e}")))?;

        let records = rows
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::dataset(format!("decode row: {e}")))?;

        debug!(table = %self.table, records = records.len(), "loaded sqlite dataset");
        Ok(records)
    }

    fn describe(&self) -> String {
        format!("sqlite:{}#{}", self.path.display(), self.table)
    }
}

/// Fixed in-memory record list.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    records: Vec<PracticeRecord>,
}

impl StaticSource {
    pub fn new(records: Vec<PracticeRecord>) -> Self {
        Self { records }
    }
}

impl DatasetSource for StaticSource {
    fn load(&self) -> Result<Vec<PracticeRecord>> {
        Ok(self.records.clone())
    }

    fn describe(&self) -> String {
        format!("static:{} records", self.records.len())
    }
}

/// Statistics about a cleaning pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleaningStats {
    /// Records received.
    pub input_records: usize,
    /// Records dropped because every numeric column was missing.
    pub dropped_empty: usize,
    /// Records dropped as duplicates of a later record.
    pub dropped_duplicates: usize,
}

impl CleaningStats {
    /// Records surviving the pass.
    pub fn kept(&self) -> usize {
        self.input_records - self.dropped_empty - self.dropped_duplicates
    }
}

type RecordKey = (String, [Option<OrderedFloat<f64>>; 5]);

fn record_key(record: &PracticeRecord) -> RecordKey {
    let key = |v: Option<f64>| v.map(OrderedFloat);
    (
        record.province.trim().to_ascii_uppercase(),
        [
            key(record.collections),
            key(record.ebitda_or_sde),
            key(record.equipped_ops),
            key(record.sqft),
            key(record.appraised_value),
        ],
    )
}

/// Drop empty rows and de-duplicate the rest.
///
/// Duplicates share province and the collections, earnings, operatories,
/// area and appraisal columns. The last occurrence wins but keeps the
/// position of the first.
pub fn clean_records(records: Vec<PracticeRecord>) -> (Vec<PracticeRecord>, CleaningStats) {
    let mut stats = CleaningStats {
        input_records: records.len(),
        ..Default::default()
    };

    let mut slots: HashMap<RecordKey, usize> = HashMap::with_capacity(records.len());
    let mut kept: Vec<PracticeRecord> = Vec::with_capacity(records.len());

    for record in records {
        if record.is_empty() {
            stats.dropped_empty += 1;
            continue;
        }
        match slots.get(&record_key(&record)) {
            Some(&slot) => {
                kept[slot] = record;
                stats.dropped_duplicates += 1;
            }
            None => {
                slots.insert(record_key(&record), kept.len());
                kept.push(record);
            }
        }
    }

    (kept, stats)
}
