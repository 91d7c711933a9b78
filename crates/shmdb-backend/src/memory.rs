//! Reference backend holding every table in memory.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use shmdb_types::{KvPair, Record, ResultSet, Table};

use crate::backend::Backend;
use crate::error::{BackendError, BackendResult};

/// Column values of one row, indexed like [`MemTable::columns`]. `None`
/// marks a column that was never written.
type Row = Vec<Option<String>>;

#[derive(Debug, Default)]
struct MemTable {
    columns: Vec<String>,
    rows: BTreeMap<String, Row>,
}

impl MemTable {
    fn column_index(&self, table: &str, column: &str) -> BackendResult<usize> {
        self.columns
            .iter()
            .position(|c| c == column)
            .ok_or_else(|| BackendError::UnknownColumn {
                table: table.to_string(),
                column: column.to_string(),
            })
    }

    fn apply(&self, table: &str, row: &mut Row, values: &[KvPair]) -> BackendResult<()> {
        // Resolve every column before touching the row so a bad field
        // leaves it unchanged.
        let indices = values
            .iter()
            .map(|kv| self.column_index(table, &kv.field))
            .collect::<BackendResult<Vec<_>>>()?;
        for (idx, kv) in indices.into_iter().zip(values) {
            row[idx] = Some(kv.value.clone());
        }
        Ok(())
    }

    /// Projects a row in column order. Unknown requested fields are skipped.
    fn project(&self, row: &Row, fields: &[String]) -> Record {
        self.columns
            .iter()
            .zip(row)
            .filter(|(column, _)| fields.is_empty() || fields.contains(column))
            .filter_map(|(column, value)| {
                value
                    .as_ref()
                    .map(|value| KvPair::new(column.clone(), value.clone()))
            })
            .collect()
    }
}

/// Per-session counters for [`MemoryBackend`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MemoryContext {
    pub session: u64,
    pub reads: u64,
    pub scans: u64,
    pub writes: u64,
}

/// A thread-safe in-memory store: one ordered map per table behind a single
/// reader/writer lock.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    tables: RwLock<HashMap<String, MemTable>>,
    next_session: AtomicU64,
    closed_sessions: AtomicU64,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently stored in `table`.
    pub fn record_count(&self, table: &str) -> Option<usize> {
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(table)
            .map(|t| t.rows.len())
    }

    /// Number of contexts handed back through `close`.
    pub fn closed_sessions(&self) -> u64 {
        self.closed_sessions.load(Ordering::Relaxed)
    }

    fn with_table<T>(
        &self,
        table: &str,
        f: impl FnOnce(&MemTable) -> BackendResult<T>,
    ) -> BackendResult<T> {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        let t = tables
            .get(table)
            .ok_or_else(|| BackendError::UnknownTable(table.to_string()))?;
        f(t)
    }

    fn with_table_mut<T>(
        &self,
        table: &str,
        f: impl FnOnce(&mut MemTable) -> BackendResult<T>,
    ) -> BackendResult<T> {
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        let t = tables
            .get_mut(table)
            .ok_or_else(|| BackendError::UnknownTable(table.to_string()))?;
        f(t)
    }
}

impl Backend for MemoryBackend {
    type Context = MemoryContext;

    fn name(&self) -> &'static str {
        "memory"
    }

    fn create_schema(&self, tables: &[Table]) -> BackendResult<()> {
        let mut current = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = tables.iter().find(|t| current.contains_key(&t.name)) {
            return Err(BackendError::TableExists(existing.name.clone()));
        }
        for table in tables {
            current.insert(
                table.name.clone(),
                MemTable {
                    columns: table.columns.clone(),
                    rows: BTreeMap::new(),
                },
            );
        }
        tracing::debug!(tables = tables.len(), "memory backend schema created");
        Ok(())
    }

    fn init(&self) -> BackendResult<MemoryContext> {
        Ok(MemoryContext {
            session: self.next_session.fetch_add(1, Ordering::Relaxed),
            ..MemoryContext::default()
        })
    }

    fn close(&self, ctx: MemoryContext) -> BackendResult<()> {
        self.closed_sessions.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(
            session = ctx.session,
            reads = ctx.reads,
            scans = ctx.scans,
            writes = ctx.writes,
            "memory backend context closed"
        );
        Ok(())
    }

    fn read(
        &self,
        ctx: &mut MemoryContext,
        table: &str,
        key: &str,
        fields: &[String],
    ) -> BackendResult<Record> {
        ctx.reads += 1;
        self.with_table(table, |t| {
            t.rows
                .get(key)
                .map(|row| t.project(row, fields))
                .ok_or(BackendError::NotFound)
        })
    }

    fn scan(
        &self,
        ctx: &mut MemoryContext,
        table: &str,
        start_key: &str,
        count: u64,
        fields: &[String],
    ) -> BackendResult<ResultSet> {
        ctx.scans += 1;
        let limit = usize::try_from(count).unwrap_or(usize::MAX);
        let rows = self.with_table(table, |t| {
            Ok(t.rows
                .range::<str, _>((Bound::Included(start_key), Bound::Unbounded))
                .take(limit)
                .map(|(_, row)| t.project(row, fields))
                .collect::<ResultSet>())
        })?;
        if rows.is_empty() {
            return Err(BackendError::NotFound);
        }
        Ok(rows)
    }

    fn update(
        &self,
        ctx: &mut MemoryContext,
        table: &str,
        key: &str,
        values: &[KvPair],
    ) -> BackendResult<()> {
        ctx.writes += 1;
        self.with_table_mut(table, |t| {
            let mut row = t.rows.get(key).cloned().ok_or(BackendError::NotFound)?;
            t.apply(table, &mut row, values)?;
            t.rows.insert(key.to_string(), row);
            Ok(())
        })
    }

    fn insert(
        &self,
        ctx: &mut MemoryContext,
        table: &str,
        key: &str,
        values: &[KvPair],
    ) -> BackendResult<()> {
        ctx.writes += 1;
        self.with_table_mut(table, |t| {
            if t.rows.contains_key(key) {
                return Err(BackendError::conflict(format!("duplicate key {key}")));
            }
            let mut row = vec![None; t.columns.len()];
            t.apply(table, &mut row, values)?;
            t.rows.insert(key.to_string(), row);
            Ok(())
        })
    }

    fn delete(&self, ctx: &mut MemoryContext, table: &str, key: &str) -> BackendResult<()> {
        ctx.writes += 1;
        self.with_table_mut(table, |t| {
            t.rows.remove(key).map(drop).ok_or(BackendError::NotFound)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shmdb_types::record;
    use test_case::test_case;

    fn backend() -> (MemoryBackend, MemoryContext) {
        let backend = MemoryBackend::new();
        backend
            .create_schema(&[Table::new("usertable", ["field0", "field1", "field2"])])
            .unwrap();
        let ctx = backend.init().unwrap();
        (backend, ctx)
    }

    fn fields(names: &[&str]) -> Vec<String> {
        names.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn insert_then_read_all_fields() {
        let (db, mut ctx) = backend();
        db.insert(
            &mut ctx,
            "usertable",
            "user1",
            &record([("field1", "B"), ("field0", "A")]),
        )
        .unwrap();

        let row = db.read(&mut ctx, "usertable", "user1", &[]).unwrap();
        assert_eq!(row, record([("field0", "A"), ("field1", "B")]));
        assert_eq!(ctx.reads, 1);
        assert_eq!(ctx.writes, 1);
    }

    #[test_case(&["field1"], &[("field1", "B")] ; "subset")]
    #[test_case(&["field2", "field0"], &[("field0", "A"), ("field2", "C")] ; "column order wins")]
    #[test_case(&["nope"], &[] ; "unknown field skipped")]
    fn read_projects_fields(requested: &[&str], expected: &[(&str, &str)]) {
        let (db, mut ctx) = backend();
        db.insert(
            &mut ctx,
            "usertable",
            "k",
            &record([("field0", "A"), ("field1", "B"), ("field2", "C")]),
        )
        .unwrap();

        let row = db.read(&mut ctx, "usertable", "k", &fields(requested)).unwrap();
        assert_eq!(row, record(expected.iter().copied()));
    }

    #[test]
    fn duplicate_insert_conflicts() {
        let (db, mut ctx) = backend();
        let values = record([("field0", "A")]);
        db.insert(&mut ctx, "usertable", "k", &values).unwrap();

        let err = db.insert(&mut ctx, "usertable", "k", &values).unwrap_err();
        assert!(err.is_conflict());
    }

    #[test]
    fn update_overwrites_only_given_fields() {
        let (db, mut ctx) = backend();
        db.insert(&mut ctx, "usertable", "k", &record([("field0", "A"), ("field1", "B")]))
            .unwrap();
        db.update(&mut ctx, "usertable", "k", &record([("field1", "Z")]))
            .unwrap();

        let row = db.read(&mut ctx, "usertable", "k", &[]).unwrap();
        assert_eq!(row, record([("field0", "A"), ("field1", "Z")]));
    }

    #[test]
    fn missing_keys_are_not_found() {
        let (db, mut ctx) = backend();
        assert!(db.read(&mut ctx, "usertable", "x", &[]).unwrap_err().is_not_found());
        assert!(db
            .update(&mut ctx, "usertable", "x", &record([("field0", "A")]))
            .unwrap_err()
            .is_not_found());
        assert!(db.delete(&mut ctx, "usertable", "x").unwrap_err().is_not_found());
        assert!(db.scan(&mut ctx, "usertable", "", 10, &[]).unwrap_err().is_not_found());
    }

    #[test]
    fn unknown_column_leaves_row_untouched() {
        let (db, mut ctx) = backend();
        db.insert(&mut ctx, "usertable", "k", &record([("field0", "A")]))
            .unwrap();

        let err = db
            .update(&mut ctx, "usertable", "k", &record([("field0", "B"), ("bogus", "C")]))
            .unwrap_err();
        assert!(matches!(err, BackendError::UnknownColumn { .. }));

        let row = db.read(&mut ctx, "usertable", "k", &[]).unwrap();
        assert_eq!(row, record([("field0", "A")]));
    }

    #[test]
    fn unknown_table() {
        let (db, mut ctx) = backend();
        assert_eq!(
            db.read(&mut ctx, "other", "k", &[]).unwrap_err(),
            BackendError::UnknownTable("other".into())
        );
    }

    #[test]
    fn scan_returns_range_in_key_order() {
        let (db, mut ctx) = backend();
        for key in ["user3", "user1", "user2", "user0"] {
            db.insert(&mut ctx, "usertable", key, &record([("field0", key)]))
                .unwrap();
        }

        let rows = db.scan(&mut ctx, "usertable", "user1", 2, &[]).unwrap();
        assert_eq!(
            rows,
            vec![record([("field0", "user1")]), record([("field0", "user2")])]
        );

        let rows = db.scan(&mut ctx, "usertable", "user2", 100, &[]).unwrap();
        assert_eq!(rows.len(), 2);

        assert!(db.scan(&mut ctx, "usertable", "user1", 0, &[]).unwrap_err().is_not_found());
    }

    #[test]
    fn schema_tables_are_created_once() {
        let (db, _) = backend();
        let err = db
            .create_schema(&[Table::new("usertable", ["field0"])])
            .unwrap_err();
        assert_eq!(err, BackendError::TableExists("usertable".into()));
        assert_eq!(db.record_count("usertable"), Some(0));
    }

    #[test]
    fn contexts_are_distinct() {
        let (db, first) = backend();
        let second = db.init().unwrap();
        assert_ne!(first.session, second.session);

        db.close(first).unwrap();
        db.close(second).unwrap();
        assert_eq!(db.closed_sessions(), 2);
    }
}
