//! Per-operation payload layouts.
//!
//! | Opcode | Request payload | Response payload |
//! |--------|-----------------|------------------|
//! | Read | table, key, `seq<string>` fields | `seq<KvPair>` |
//! | Scan | table, start key, `u64` count, `seq<string>` fields | `seq<seq<KvPair>>` |
//! | Insert / Update | table, key, `seq<KvPair>` values | none |
//! | Delete | table, key | none |
//! | Close | none | none |
//!
//! A [`Status::Failed`](crate::Status::Failed) response carries a single
//! message string regardless of the opcode.

use shmdb_types::{KvPair, Record, ResultSet};

use crate::codec::{Decoder, Encode, Encoder};
use crate::error::WireResult;
use crate::opcode::Opcode;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReadRequest {
    pub table: String,
    pub key: String,
    /// Empty means every column.
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScanRequest {
    pub table: String,
    pub start_key: String,
    pub count: u64,
    /// Empty means every column.
    pub fields: Vec<String>,
}

/// Payload shared by Insert and Update.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WriteRequest {
    pub table: String,
    pub key: String,
    pub values: Vec<KvPair>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeleteRequest {
    pub table: String,
    pub key: String,
}

/// A decoded request, tagged by its opcode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Read(ReadRequest),
    Scan(ScanRequest),
    Insert(WriteRequest),
    Update(WriteRequest),
    Delete(DeleteRequest),
    Close,
}

impl Request {
    pub fn opcode(&self) -> Opcode {
        match self {
            Request::Read(_) => Opcode::Read,
            Request::Scan(_) => Opcode::Scan,
            Request::Insert(_) => Opcode::Insert,
            Request::Update(_) => Opcode::Update,
            Request::Delete(_) => Opcode::Delete,
            Request::Close => Opcode::Close,
        }
    }

    /// Writes the payload (everything after the flag byte).
    pub fn encode_payload(&self, enc: &mut Encoder<'_>) -> WireResult<()> {
        match self {
            Request::Read(r) => {
                enc.put_str(&r.table)?;
                enc.put_str(&r.key)?;
                enc.put_seq(&r.fields)
            }
            Request::Scan(s) => {
                enc.put_str(&s.table)?;
                enc.put_str(&s.start_key)?;
                enc.put_u64(s.count)?;
                enc.put_seq(&s.fields)
            }
            Request::Insert(w) | Request::Update(w) => {
                enc.put_str(&w.table)?;
                enc.put_str(&w.key)?;
                enc.put_seq(&w.values)
            }
            Request::Delete(d) => {
                enc.put_str(&d.table)?;
                enc.put_str(&d.key)
            }
            Request::Close => Ok(()),
        }
    }

    /// Reads the payload that follows `opcode`.
    pub fn decode(opcode: Opcode, dec: &mut Decoder<'_>) -> WireResult<Self> {
        let request = match opcode {
            Opcode::Read => Request::Read(ReadRequest {
                table: dec.take_string()?,
                key: dec.take_string()?,
                fields: dec.take_seq()?,
            }),
            Opcode::Scan => Request::Scan(ScanRequest {
                table: dec.take_string()?,
                start_key: dec.take_string()?,
                count: dec.take_u64()?,
                fields: dec.take_seq()?,
            }),
            Opcode::Insert => Request::Insert(decode_write(dec)?),
            Opcode::Update => Request::Update(decode_write(dec)?),
            Opcode::Delete => Request::Delete(DeleteRequest {
                table: dec.take_string()?,
                key: dec.take_string()?,
            }),
            Opcode::Close => Request::Close,
        };
        Ok(request)
    }
}

fn decode_write(dec: &mut Decoder<'_>) -> WireResult<WriteRequest> {
    Ok(WriteRequest {
        table: dec.take_string()?,
        key: dec.take_string()?,
        values: dec.take_seq()?,
    })
}

/// Result payload written by the session after a successful operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Record(Record),
    Rows(ResultSet),
    /// Flag only; nothing follows byte 0.
    Empty,
}

impl Reply {
    pub fn encode_payload(&self, enc: &mut Encoder<'_>) -> WireResult<()> {
        match self {
            Reply::Record(record) => enc.put_seq(record),
            Reply::Rows(rows) => enc.put_seq(rows),
            Reply::Empty => Ok(()),
        }
    }

    pub fn encoded_len(&self) -> usize {
        match self {
            Reply::Record(record) => record.encoded_len(),
            Reply::Rows(rows) => rows.encoded_len(),
            Reply::Empty => 0,
        }
    }
}
