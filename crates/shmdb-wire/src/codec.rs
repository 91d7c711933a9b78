//! Cursor-based codec over a flat byte buffer.
//!
//! # Encoding
//!
//! | Value | Layout |
//! |-------|--------|
//! | `u64` | 8 bytes, little-endian |
//! | string | `u64` byte length, then the raw UTF-8 bytes |
//! | sequence | `u64` element count, then each element in order |
//! | [`Table`] | name string, then column sequence |
//! | [`KvPair`] | field string, then value string |
//! | [`Schema`] | table sequence, then location string |
//!
//! Encoders check the remaining capacity before every write and fail with
//! [`WireError::BufferOverflow`]; decoders check before every read and fail
//! with [`WireError::Truncated`]. Neither ever touches memory outside the
//! slice they were given.

use bytes::{Buf, BufMut};
use shmdb_types::{KvPair, Schema, Table};

use crate::error::{WireError, WireResult};

/// Width of every integer and length prefix on the wire.
pub const U64_LEN: usize = 8;

// ============================================================================
// Encoder
// ============================================================================

/// Writes values into a fixed-capacity buffer.
pub struct Encoder<'a> {
    dst: &'a mut [u8],
    written: usize,
}

impl<'a> Encoder<'a> {
    pub fn new(dst: &'a mut [u8]) -> Self {
        Self { dst, written: 0 }
    }

    /// Number of bytes written so far.
    pub fn position(&self) -> usize {
        self.written
    }

    /// Number of bytes that can still be written.
    pub fn remaining(&self) -> usize {
        self.dst.remaining_mut()
    }

    fn ensure(&self, needed: usize) -> WireResult<()> {
        let remaining = self.remaining();
        if remaining < needed {
            return Err(WireError::BufferOverflow { needed, remaining });
        }
        Ok(())
    }

    pub fn put_u64(&mut self, n: u64) -> WireResult<()> {
        self.ensure(U64_LEN)?;
        self.dst.put_u64_le(n);
        self.written += U64_LEN;
        Ok(())
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) -> WireResult<()> {
        self.ensure(bytes.len())?;
        self.dst.put_slice(bytes);
        self.written += bytes.len();
        Ok(())
    }

    /// Writes a length-prefixed string.
    pub fn put_str(&mut self, s: &str) -> WireResult<()> {
        // Check the whole string up front so an oversized value fails before
        // its length prefix is written.
        self.ensure(U64_LEN + s.len())?;
        self.put_u64(s.len() as u64)?;
        self.put_bytes(s.as_bytes())
    }

    /// Writes any encodable value.
    pub fn put<T: Encode + ?Sized>(&mut self, value: &T) -> WireResult<()> {
        value.encode(self)
    }

    /// Writes a count-prefixed sequence.
    pub fn put_seq<T: Encode>(&mut self, items: &[T]) -> WireResult<()> {
        self.put_u64(items.len() as u64)?;
        for item in items {
            item.encode(self)?;
        }
        Ok(())
    }
}

// ============================================================================
// Decoder
// ============================================================================

/// Reads values from a buffer produced by a matching [`Encoder`].
pub struct Decoder<'a> {
    src: &'a [u8],
    consumed: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(src: &'a [u8]) -> Self {
        Self { src, consumed: 0 }
    }

    /// Number of bytes consumed so far.
    pub fn position(&self) -> usize {
        self.consumed
    }

    /// Number of bytes left in the buffer.
    pub fn remaining(&self) -> usize {
        self.src.remaining()
    }

    fn need(&self, needed: usize) -> WireResult<()> {
        let remaining = self.remaining();
        if remaining < needed {
            return Err(WireError::Truncated { needed, remaining });
        }
        Ok(())
    }

    pub fn take_u64(&mut self) -> WireResult<u64> {
        self.need(U64_LEN)?;
        self.consumed += U64_LEN;
        Ok(self.src.get_u64_le())
    }

    fn take_len(&mut self) -> WireResult<usize> {
        let raw = self.take_u64()?;
        usize::try_from(raw).map_err(|_| WireError::LengthOverflow(raw))
    }

    /// Reads a length-prefixed string.
    pub fn take_string(&mut self) -> WireResult<String> {
        let len = self.take_len()?;
        self.need(len)?;
        let bytes = self.src[..len].to_vec();
        self.src.advance(len);
        self.consumed += len;
        String::from_utf8(bytes).map_err(|_| WireError::InvalidUtf8)
    }

    /// Reads any decodable value.
    pub fn take<T: Decode>(&mut self) -> WireResult<T> {
        T::decode(self)
    }

    /// Reads a count-prefixed sequence.
    ///
    /// Capacity is reserved from the decoded count, bounded by how many
    /// elements could possibly fit in the remaining bytes so a corrupted
    /// count cannot trigger a huge allocation.
    pub fn take_seq<T: Decode>(&mut self) -> WireResult<Vec<T>> {
        let count = self.take_len()?;
        let fits = self.remaining() / T::MIN_ENCODED_LEN.max(1);
        let mut items = Vec::with_capacity(count.min(fits));
        for _ in 0..count {
            items.push(T::decode(self)?);
        }
        Ok(items)
    }
}

// ============================================================================
// Traits
// ============================================================================

/// A value with a wire representation.
pub trait Encode {
    fn encode(&self, enc: &mut Encoder<'_>) -> WireResult<()>;

    /// Exact number of bytes [`Encode::encode`] writes.
    fn encoded_len(&self) -> usize;
}

/// A value that can be read back from its wire representation.
pub trait Decode: Sized {
    /// Smallest possible encoding of this type, used to bound allocations.
    const MIN_ENCODED_LEN: usize;

    fn decode(dec: &mut Decoder<'_>) -> WireResult<Self>;
}

impl Encode for u64 {
    fn encode(&self, enc: &mut Encoder<'_>) -> WireResult<()> {
        enc.put_u64(*self)
    }

    fn encoded_len(&self) -> usize {
        U64_LEN
    }
}

impl Decode for u64 {
    const MIN_ENCODED_LEN: usize = U64_LEN;

    fn decode(dec: &mut Decoder<'_>) -> WireResult<Self> {
        dec.take_u64()
    }
}

impl Encode for str {
    fn encode(&self, enc: &mut Encoder<'_>) -> WireResult<()> {
        enc.put_str(self)
    }

    fn encoded_len(&self) -> usize {
        U64_LEN + self.len()
    }
}

impl Encode for String {
    fn encode(&self, enc: &mut Encoder<'_>) -> WireResult<()> {
        enc.put_str(self)
    }

    fn encoded_len(&self) -> usize {
        self.as_str().encoded_len()
    }
}

impl Decode for String {
    const MIN_ENCODED_LEN: usize = U64_LEN;

    fn decode(dec: &mut Decoder<'_>) -> WireResult<Self> {
        dec.take_string()
    }
}

impl<T: Encode> Encode for [T] {
    fn encode(&self, enc: &mut Encoder<'_>) -> WireResult<()> {
        enc.put_seq(self)
    }

    fn encoded_len(&self) -> usize {
        U64_LEN + self.iter().map(Encode::encoded_len).sum::<usize>()
    }
}

impl<T: Encode> Encode for Vec<T> {
    fn encode(&self, enc: &mut Encoder<'_>) -> WireResult<()> {
        enc.put_seq(self)
    }

    fn encoded_len(&self) -> usize {
        self.as_slice().encoded_len()
    }
}

impl<T: Decode> Decode for Vec<T> {
    const MIN_ENCODED_LEN: usize = U64_LEN;

    fn decode(dec: &mut Decoder<'_>) -> WireResult<Self> {
        dec.take_seq()
    }
}

impl Encode for Table {
    fn encode(&self, enc: &mut Encoder<'_>) -> WireResult<()> {
        enc.put_str(&self.name)?;
        enc.put_seq(&self.columns)
    }

    fn encoded_len(&self) -> usize {
        self.name.encoded_len() + self.columns.encoded_len()
    }
}

impl Decode for Table {
    const MIN_ENCODED_LEN: usize = 2 * U64_LEN;

    fn decode(dec: &mut Decoder<'_>) -> WireResult<Self> {
        let name = dec.take_string()?;
        let columns = dec.take_seq()?;
        Ok(Self { name, columns })
    }
}

impl Encode for KvPair {
    fn encode(&self, enc: &mut Encoder<'_>) -> WireResult<()> {
        enc.put_str(&self.field)?;
        enc.put_str(&self.value)
    }

    fn encoded_len(&self) -> usize {
        self.field.encoded_len() + self.value.encoded_len()
    }
}

impl Decode for KvPair {
    const MIN_ENCODED_LEN: usize = 2 * U64_LEN;

    fn decode(dec: &mut Decoder<'_>) -> WireResult<Self> {
        let field = dec.take_string()?;
        let value = dec.take_string()?;
        Ok(Self { field, value })
    }
}

impl Encode for Schema {
    fn encode(&self, enc: &mut Encoder<'_>) -> WireResult<()> {
        enc.put_seq(&self.tables)?;
        enc.put_str(&self.location)
    }

    fn encoded_len(&self) -> usize {
        self.tables.encoded_len() + self.location.encoded_len()
    }
}

impl Decode for Schema {
    const MIN_ENCODED_LEN: usize = 2 * U64_LEN;

    fn decode(dec: &mut Decoder<'_>) -> WireResult<Self> {
        let tables = dec.take_seq()?;
        let location = dec.take_string()?;
        Ok(Self { tables, location })
    }
}
