//! The backend adapter contract.

use shmdb_types::{KvPair, Record, ResultSet, Table};

use crate::error::BackendResult;

/// Storage engine driven by sessions.
///
/// A single backend instance is shared by every session, while each session
/// obtains its own [`Context`](Self::Context) from [`init`](Self::init) on
/// its own thread and hands it back to [`close`](Self::close) on the same
/// thread. Contexts are never shared or moved between sessions, so
/// per-connection state such as statement caches can live there without
/// synchronization.
///
/// For [`read`](Self::read) and [`scan`](Self::scan), an empty `fields`
/// slice selects every column.
pub trait Backend: Send + Sync + 'static {
    /// Per-session state.
    type Context;

    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Creates every table of the schema. Called once, before any session
    /// exists.
    fn create_schema(&self, tables: &[Table]) -> BackendResult<()>;

    /// Creates the per-session context.
    fn init(&self) -> BackendResult<Self::Context>;

    /// Disposes of a per-session context.
    fn close(&self, ctx: Self::Context) -> BackendResult<()>;

    fn read(
        &self,
        ctx: &mut Self::Context,
        table: &str,
        key: &str,
        fields: &[String],
    ) -> BackendResult<Record>;

    /// Returns up to `count` records whose key is `>= start_key`, in key
    /// order. An empty result is `NotFound`.
    fn scan(
        &self,
        ctx: &mut Self::Context,
        table: &str,
        start_key: &str,
        count: u64,
        fields: &[String],
    ) -> BackendResult<ResultSet>;

    /// Overwrites the given fields of an existing record.
    fn update(
        &self,
        ctx: &mut Self::Context,
        table: &str,
        key: &str,
        values: &[KvPair],
    ) -> BackendResult<()>;

    /// Creates a new record.
    fn insert(
        &self,
        ctx: &mut Self::Context,
        table: &str,
        key: &str,
        values: &[KvPair],
    ) -> BackendResult<()>;

    fn delete(&self, ctx: &mut Self::Context, table: &str, key: &str) -> BackendResult<()>;
}
