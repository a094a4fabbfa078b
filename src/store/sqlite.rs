//! SQLite pattern store
//!
//! Patterns and cascades live in two tables. Cascades reference both
//! endpoints with `ON DELETE CASCADE`, so deleting a pattern removes its
//! edges in the same statement.
//!
//! Enum columns are stored as their canonical strings and decoded at this
//! boundary: a row with an unknown pattern type is skipped (and counted in
//! [`StoreStats::skipped_rows`]), and a stored category that disagrees with
//! the type is repaired from the type.

use crate::store::codec::{decode_factors, decode_list, encode_factors, encode_list};
use crate::store::error::{StoreError, StoreResult};
use crate::store::repository::PatternRepository;
use crate::store::types::{
    CascadeId, CascadeLinks, ExtractedPattern, PatternCascade, PatternFilter, PatternId,
    PatternSort, StoreStats,
};
use crate::taxonomy::PatternType;
use async_trait::async_trait;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OpenFlags, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS patterns (
        id TEXT PRIMARY KEY,
        pattern_type TEXT NOT NULL,
        category TEXT NOT NULL,
        intensity INTEGER NOT NULL DEFAULT 0,
        confidence REAL NOT NULL DEFAULT 1.0,
        timestamp INTEGER NOT NULL,
        details TEXT,
        duration_minutes INTEGER,
        triggers TEXT,
        coping_strategies TEXT,
        contributing_factors TEXT,
        source_entry_id TEXT
    );
    CREATE INDEX IF NOT EXISTS idx_patterns_timestamp ON patterns(timestamp);
    CREATE INDEX IF NOT EXISTS idx_patterns_type ON patterns(pattern_type);
    CREATE INDEX IF NOT EXISTS idx_patterns_entry ON patterns(source_entry_id);

    CREATE TABLE IF NOT EXISTS cascades (
        id TEXT PRIMARY KEY,
        from_pattern TEXT NOT NULL REFERENCES patterns(id) ON DELETE CASCADE,
        to_pattern TEXT NOT NULL REFERENCES patterns(id) ON DELETE CASCADE,
        confidence REAL NOT NULL,
        description TEXT,
        timestamp INTEGER NOT NULL,
        CHECK (from_pattern <> to_pattern)
    );
    CREATE INDEX IF NOT EXISTS idx_cascades_from ON cascades(from_pattern);
    CREATE INDEX IF NOT EXISTS idx_cascades_to ON cascades(to_pattern);
";

const PATTERN_COLUMNS: &str = "id, pattern_type, category, intensity, confidence, timestamp, \
     details, duration_minutes, triggers, coping_strategies, contributing_factors, source_entry_id";

const CASCADE_COLUMNS: &str = "id, from_pattern, to_pattern, confidence, description, timestamp";

/// A pattern row as stored, before validation
struct PatternRow {
    id: String,
    pattern_type: String,
    category: String,
    intensity: i64,
    confidence: f64,
    timestamp: i64,
    details: Option<String>,
    duration_minutes: Option<i64>,
    triggers: Option<String>,
    coping_strategies: Option<String>,
    contributing_factors: Option<String>,
    source_entry_id: Option<String>,
}

impl PatternRow {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            pattern_type: row.get(1)?,
            category: row.get(2)?,
            intensity: row.get(3)?,
            confidence: row.get(4)?,
            timestamp: row.get(5)?,
            details: row.get(6)?,
            duration_minutes: row.get(7)?,
            triggers: row.get(8)?,
            coping_strategies: row.get(9)?,
            contributing_factors: row.get(10)?,
            source_entry_id: row.get(11)?,
        })
    }

    /// Validate and convert; `None` if the row cannot be interpreted
    fn decode(self) -> Option<ExtractedPattern> {
        let id: PatternId = match self.id.parse() {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!(id = %self.id, error = %e, "Skipping pattern row with invalid id");
                return None;
            }
        };

        let pattern_type: PatternType = match self.pattern_type.parse() {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(pattern_id = %id, error = %e, "Skipping pattern row");
                return None;
            }
        };

        if self.category != pattern_type.category().as_str() {
            tracing::warn!(
                pattern_id = %id,
                stored = %self.category,
                expected = %pattern_type.category(),
                "Repairing stored category from pattern type"
            );
        }

        let mut pattern = ExtractedPattern::restore(id, pattern_type, self.timestamp);
        pattern.set_intensity(self.intensity);
        pattern.set_confidence(self.confidence);
        pattern.details = self.details;
        pattern.duration_minutes = self
            .duration_minutes
            .and_then(|m| u32::try_from(m).ok())
            .filter(|_| pattern_type.has_duration());
        pattern.triggers = decode_list(self.triggers.as_deref());
        pattern.coping_strategies = decode_list(self.coping_strategies.as_deref());
        pattern.contributing_factors = decode_factors(self.contributing_factors.as_deref());
        pattern.source_entry_id = self.source_entry_id;
        Some(pattern)
    }
}

/// A cascade row as stored, before validation
struct CascadeRow {
    id: String,
    from_pattern: String,
    to_pattern: String,
    confidence: f64,
    description: Option<String>,
    timestamp: i64,
}

impl CascadeRow {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            from_pattern: row.get(1)?,
            to_pattern: row.get(2)?,
            confidence: row.get(3)?,
            description: row.get(4)?,
            timestamp: row.get(5)?,
        })
    }

    fn decode(self) -> Option<PatternCascade> {
        let parsed = (
            self.id.parse::<CascadeId>(),
            self.from_pattern.parse::<PatternId>(),
            self.to_pattern.parse::<PatternId>(),
        );
        let (id, from, to) = match parsed {
            (Ok(id), Ok(from), Ok(to)) => (id, from, to),
            _ => {
                tracing::warn!(id = %self.id, "Skipping cascade row with invalid ids");
                return None;
            }
        };

        match PatternCascade::new(from, to, self.confidence, self.timestamp) {
            Ok(mut cascade) => {
                cascade.id = id;
                cascade.description = self.description;
                Some(cascade)
            }
            Err(e) => {
                tracing::warn!(cascade_id = %id, error = %e, "Skipping cascade row");
                None
            }
        }
    }
}

/// Pattern store backed by a SQLite database file
pub struct SqliteStore {
    /// std Mutex because a SQLite connection is not `Sync`
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
    skipped_rows: AtomicU64,
}

impl SqliteStore {
    /// Create or open a store at `path`
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            ",
        )?;

        let store = Self::with_connection(conn, Some(path.to_path_buf()))?;
        tracing::debug!(path = ?path, "Opened SQLite pattern store");
        Ok(store)
    }

    /// Open a private in-memory database
    pub fn in_memory() -> StoreResult<Self> {
        Self::with_connection(Connection::open_in_memory()?, None)
    }

    fn with_connection(conn: Connection, path: Option<PathBuf>) -> StoreResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
            path,
            skipped_rows: AtomicU64::new(0),
        })
    }

    /// Database file, if not in memory
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Lock(format!("SQLite connection poisoned: {}", e)))
    }

    fn keep_decoded<T>(&self, decoded: Option<T>) -> Option<T> {
        if decoded.is_none() {
            self.skipped_rows.fetch_add(1, Ordering::Relaxed);
        }
        decoded
    }

    fn query_cascades(
        &self,
        conn: &Connection,
        where_clause: &str,
        args: &[&dyn rusqlite::ToSql],
    ) -> StoreResult<Vec<PatternCascade>> {
        let sql = format!(
            "SELECT {} FROM cascades {} ORDER BY timestamp, id",
            CASCADE_COLUMNS, where_clause
        );
        let mut stmt = conn.prepare_cached(&sql)?;
        let rows = stmt.query_map(args, CascadeRow::from_row)?;

        let mut cascades = Vec::new();
        for row in rows {
            if let Some(cascade) = self.keep_decoded(row?.decode()) {
                cascades.push(cascade);
            }
        }
        Ok(cascades)
    }

    fn pattern_exists(conn: &Connection, id: PatternId) -> StoreResult<bool> {
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM patterns WHERE id = ?",
                params![id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }
}

#[async_trait]
impl PatternRepository for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn create_pattern(&self, pattern: &ExtractedPattern) -> StoreResult<()> {
        let conn = self.lock()?;
        if Self::pattern_exists(&conn, pattern.id())? {
            return Err(StoreError::Conflict(pattern.id().to_string()));
        }

        conn.execute(
            &format!(
                "INSERT INTO patterns ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                PATTERN_COLUMNS
            ),
            params![
                pattern.id().to_string(),
                pattern.pattern_type().as_str(),
                pattern.category().as_str(),
                pattern.intensity(),
                pattern.confidence(),
                pattern.timestamp(),
                pattern.details,
                pattern.duration_minutes,
                encode_list(&pattern.triggers),
                encode_list(&pattern.coping_strategies),
                encode_factors(&pattern.contributing_factors),
                pattern.source_entry_id,
            ],
        )?;

        tracing::debug!(
            pattern_id = %pattern.id(),
            pattern_type = %pattern.pattern_type(),
            "Stored pattern"
        );
        Ok(())
    }

    async fn get_pattern(&self, id: PatternId) -> StoreResult<Option<ExtractedPattern>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                &format!("SELECT {} FROM patterns WHERE id = ?", PATTERN_COLUMNS),
                params![id.to_string()],
                PatternRow::from_row,
            )
            .optional()?;

        Ok(row.and_then(|r| self.keep_decoded(r.decode())))
    }

    async fn update_pattern(&self, pattern: &ExtractedPattern) -> StoreResult<()> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE patterns SET
                intensity = ?, confidence = ?, details = ?, duration_minutes = ?,
                triggers = ?, coping_strategies = ?, contributing_factors = ?,
                source_entry_id = ?
             WHERE id = ?",
            params![
                pattern.intensity(),
                pattern.confidence(),
                pattern.details,
                pattern.duration_minutes,
                encode_list(&pattern.triggers),
                encode_list(&pattern.coping_strategies),
                encode_factors(&pattern.contributing_factors),
                pattern.source_entry_id,
                pattern.id().to_string(),
            ],
        )?;

        if changed == 0 {
            return Err(StoreError::PatternNotFound(pattern.id()));
        }
        Ok(())
    }

    async fn delete_pattern(&self, id: PatternId) -> StoreResult<Vec<CascadeId>> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let removed: Vec<CascadeId> = {
            let mut stmt = tx.prepare_cached(
                "SELECT id FROM cascades WHERE from_pattern = ?1 OR to_pattern = ?1",
            )?;
            let ids = stmt
                .query_map(params![id.to_string()], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            ids.into_iter()
                .filter_map(|raw| match raw.parse() {
                    Ok(cascade_id) => Some(cascade_id),
                    Err(_) => {
                        tracing::warn!(cascade_id = %raw, "Skipping cascade with invalid id");
                        self.skipped_rows.fetch_add(1, Ordering::Relaxed);
                        None
                    }
                })
                .collect()
        };

        let deleted = tx.execute("DELETE FROM patterns WHERE id = ?", params![id.to_string()])?;
        if deleted == 0 {
            return Err(StoreError::PatternNotFound(id));
        }
        tx.commit()?;

        tracing::debug!(pattern_id = %id, cascades = removed.len(), "Deleted pattern");
        Ok(removed)
    }

    async fn create_cascade(&self, cascade: &PatternCascade) -> StoreResult<()> {
        let conn = self.lock()?;
        for endpoint in [cascade.from_pattern, cascade.to_pattern] {
            if !Self::pattern_exists(&conn, endpoint)? {
                return Err(StoreError::PatternNotFound(endpoint));
            }
        }

        let existing: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM cascades WHERE id = ?",
                params![cascade.id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        if existing.is_some() {
            return Err(StoreError::Conflict(cascade.id.to_string()));
        }

        conn.execute(
            &format!(
                "INSERT INTO cascades ({}) VALUES (?, ?, ?, ?, ?, ?)",
                CASCADE_COLUMNS
            ),
            params![
                cascade.id.to_string(),
                cascade.from_pattern.to_string(),
                cascade.to_pattern.to_string(),
                cascade.confidence,
                cascade.description,
                cascade.timestamp,
            ],
        )?;

        tracing::debug!(
            cascade_id = %cascade.id,
            from = %cascade.from_pattern,
            to = %cascade.to_pattern,
            "Stored cascade"
        );
        Ok(())
    }

    async fn get_cascade(&self, id: CascadeId) -> StoreResult<Option<PatternCascade>> {
        let conn = self.lock()?;
        let mut found = self.query_cascades(&conn, "WHERE id = ?", &[&id.to_string()])?;
        Ok(found.pop())
    }

    async fn delete_cascade(&self, id: CascadeId) -> StoreResult<bool> {
        let conn = self.lock()?;
        let deleted = conn.execute("DELETE FROM cascades WHERE id = ?", params![id.to_string()])?;
        Ok(deleted > 0)
    }

    async fn list_patterns(
        &self,
        filter: &PatternFilter,
        sort: PatternSort,
    ) -> StoreResult<Vec<ExtractedPattern>> {
        // Push the indexed predicates into SQL; the rest is checked in Rust
        let mut clauses = Vec::new();
        let mut args: Vec<Value> = Vec::new();

        if let Some(t) = filter.pattern_type {
            clauses.push("pattern_type = ?");
            args.push(Value::Text(t.as_str().to_string()));
        }
        if let Some(range) = filter.time_range {
            clauses.push("timestamp >= ? AND timestamp < ?");
            args.push(Value::Integer(range.start));
            args.push(Value::Integer(range.end));
        }
        if let Some(entry) = &filter.source_entry_id {
            clauses.push("source_entry_id = ?");
            args.push(Value::Text(entry.clone()));
        }

        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };

        let conn = self.lock()?;
        let sql = format!("SELECT {} FROM patterns {}", PATTERN_COLUMNS, where_clause);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(args.iter()), PatternRow::from_row)?;

        let mut patterns = Vec::new();
        for row in rows {
            if let Some(pattern) = self.keep_decoded(row?.decode()) {
                if filter.matches(&pattern) {
                    patterns.push(pattern);
                }
            }
        }

        sort.apply(&mut patterns);
        Ok(patterns)
    }

    async fn list_cascades(&self, pattern_id: PatternId) -> StoreResult<CascadeLinks> {
        let conn = self.lock()?;
        let id = pattern_id.to_string();
        Ok(CascadeLinks {
            incoming: self.query_cascades(&conn, "WHERE to_pattern = ?", &[&id])?,
            outgoing: self.query_cascades(&conn, "WHERE from_pattern = ?", &[&id])?,
        })
    }

    async fn all_cascades(&self) -> StoreResult<Vec<PatternCascade>> {
        let conn = self.lock()?;
        self.query_cascades(&conn, "", &[])
    }

    async fn stats(&self) -> StoreResult<StoreStats> {
        let conn = self.lock()?;
        let patterns: i64 = conn.query_row("SELECT COUNT(*) FROM patterns", [], |r| r.get(0))?;
        let cascades: i64 = conn.query_row("SELECT COUNT(*) FROM cascades", [], |r| r.get(0))?;

        Ok(StoreStats {
            patterns: patterns as u64,
            cascades: cascades as u64,
            skipped_rows: self.skipped_rows.load(Ordering::Relaxed),
        })
    }
}
