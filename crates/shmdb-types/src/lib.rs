//! # shmdb-types: Core types for `shmdb`
//!
//! Shared data model used by every layer of the system:
//! - Schema description ([`Table`], [`Schema`])
//! - Row data ([`KvPair`], [`Record`], [`ResultSet`])
//! - Session identity ([`SessionId`])
//! - Transport constants ([`DEFAULT_REGION_CAPACITY`], [`HEADER_LEN`])

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

// ============================================================================
// Transport constants
// ============================================================================

/// Default capacity of a shared region in bytes (1 MiB).
///
/// Both ends of a channel must agree on the capacity out of band; it is
/// never negotiated on the wire.
pub const DEFAULT_REGION_CAPACITY: usize = 1 << 20;

/// Number of bytes reserved at the start of every region for the
/// synchronization/opcode flag.
pub const HEADER_LEN: usize = 1;

// ============================================================================
// Session identity
// ============================================================================

/// Identifier assigned to a session by the connection manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionId(u64);

impl SessionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session#{}", self.0)
    }
}

impl From<u64> for SessionId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<SessionId> for u64 {
    fn from(id: SessionId) -> Self {
        id.0
    }
}

// ============================================================================
// Schema
// ============================================================================

/// A table definition.
///
/// `columns` lists the data columns in declaration order and never includes
/// the implicit primary key column. Tables are immutable once installed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub columns: Vec<String>,
}

impl Table {
    pub fn new<N, I, C>(name: N, columns: I) -> Self
    where
        N: Into<String>,
        I: IntoIterator<Item = C>,
        C: Into<String>,
    {
        Self {
            name: name.into(),
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns true if `column` is one of this table's data columns.
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// Returns the position of `column` in declaration order.
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }
}

/// The full schema of a database instance: its tables plus the storage
/// location identifier (e.g. a file name, or `":memory:"`).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Schema {
    pub tables: Vec<Table>,
    pub location: String,
}

impl Schema {
    pub fn new(tables: Vec<Table>, location: impl Into<String>) -> Self {
        Self {
            tables,
            location: location.into(),
        }
    }

    /// Looks up a table by name.
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name == name)
    }
}

// ============================================================================
// Row data
// ============================================================================

/// A single `(field, value)` pair of a row.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct KvPair {
    pub field: String,
    pub value: String,
}

impl KvPair {
    pub fn new(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }
}

impl<F: Into<String>, V: Into<String>> From<(F, V)> for KvPair {
    fn from((field, value): (F, V)) -> Self {
        Self::new(field, value)
    }
}

impl Display for KvPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.field, self.value)
    }
}

/// One row's fields in the order the producer emitted them.
///
/// No ordering invariant holds across calls; compare records as sets when
/// the producer is allowed to canonicalize.
pub type Record = Vec<KvPair>;

/// Rows returned by a scan, in key order.
pub type ResultSet = Vec<Record>;

/// Builds a [`Record`] from `(field, value)` tuples.
pub fn record<F, V>(pairs: impl IntoIterator<Item = (F, V)>) -> Record
where
    F: Into<String>,
    V: Into<String>,
{
    pairs.into_iter().map(KvPair::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn table_column_lookup() {
        let table = Table::new("usertable", ["field0", "field1"]);
        assert!(table.has_column("field1"));
        assert!(!table.has_column("YCSB_KEY"));
        assert_eq!(table.column_index("field1"), Some(1));
        assert_eq!(table.column_index("missing"), None);
    }

    #[test]
    fn schema_finds_tables_by_name() {
        let schema = Schema::new(
            vec![Table::new("a", ["x"]), Table::new("b", ["y", "z"])],
            ":memory:",
        );
        assert_eq!(schema.table("b").map(|t| t.columns.len()), Some(2));
        assert!(schema.table("c").is_none());
    }

    #[test_case(0 ; "zero")]
    #[test_case(42 ; "small")]
    #[test_case(u64::MAX ; "max")]
    fn session_id_roundtrips_through_u64(raw: u64) {
        let id = SessionId::from(raw);
        assert_eq!(u64::from(id), raw);
        assert_eq!(id.to_string(), format!("session#{raw}"));
    }

    #[test]
    fn record_builder_preserves_order() {
        let r = record([("field1", "B"), ("field0", "A")]);
        assert_eq!(r[0], KvPair::new("field1", "B"));
        assert_eq!(r[1].to_string(), "field0=A");
    }

    #[test]
    fn table_serde_roundtrip() {
        let table = Table::new("usertable", ["field0", "field1"]);
        let json = serde_json::to_string(&table).unwrap();
        let back: Table = serde_json::from_str(&json).unwrap();
        assert_eq!(back, table);
    }
}
