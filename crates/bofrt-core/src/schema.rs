//! Typed field schemas shared by packer and unpacker.
//!
//! A schema is a string of field-kind letters (`i` int, `s` short, `b` blob,
//! `z` string, `Z` wide string). Decoding through a [`SchemaCursor`] turns a
//! reader that disagrees with the packer into a [`DecodeError::SchemaMismatch`]
//! instead of silently misreading the buffer.

use std::fmt;

use crate::builder::FormatBuilder;
use crate::cursor::BufferCursor;
use crate::error::{DecodeError, SchemaError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Int,
    Short,
    Blob,
    Str,
    WideStr,
}

impl FieldKind {
    pub fn code(self) -> char {
        match self {
            FieldKind::Int => 'i',
            FieldKind::Short => 's',
            FieldKind::Blob => 'b',
            FieldKind::Str => 'z',
            FieldKind::WideStr => 'Z',
        }
    }

    pub fn from_code(ch: char) -> Option<Self> {
        match ch {
            'i' => Some(FieldKind::Int),
            's' => Some(FieldKind::Short),
            'b' => Some(FieldKind::Blob),
            'z' => Some(FieldKind::Str),
            'Z' => Some(FieldKind::WideStr),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FieldKind::Int => "int",
            FieldKind::Short => "short",
            FieldKind::Blob => "blob",
            FieldKind::Str => "str",
            FieldKind::WideStr => "wstr",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Schema {
    kinds: Vec<FieldKind>,
}

/// A decoded field. Variable-length fields borrow the argument buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Field<'a> {
    Int(i32),
    Short(i16),
    Blob(&'a [u8]),
    Str(&'a [u8]),
    /// UTF-16LE bytes with the terminator removed.
    WideStr(&'a [u8]),
}

impl Field<'_> {
    pub fn kind(&self) -> FieldKind {
        match self {
            Field::Int(_) => FieldKind::Int,
            Field::Short(_) => FieldKind::Short,
            Field::Blob(_) => FieldKind::Blob,
            Field::Str(_) => FieldKind::Str,
            Field::WideStr(_) => FieldKind::WideStr,
        }
    }
}

/// An owned value for packing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PackValue {
    Int(i32),
    Short(i16),
    Blob(Vec<u8>),
    Str(String),
    WideStr(String),
}

impl PackValue {
    pub fn kind(&self) -> FieldKind {
        match self {
            PackValue::Int(_) => FieldKind::Int,
            PackValue::Short(_) => FieldKind::Short,
            PackValue::Blob(_) => FieldKind::Blob,
            PackValue::Str(_) => FieldKind::Str,
            PackValue::WideStr(_) => FieldKind::WideStr,
        }
    }
}

impl Schema {
    pub fn new(kinds: Vec<FieldKind>) -> Self {
        Self { kinds }
    }

    pub fn parse(s: &str) -> Result<Self, SchemaError> {
        let kinds = s
            .chars()
            .enumerate()
            .map(|(pos, ch)| FieldKind::from_code(ch).ok_or(SchemaError::UnknownKind { ch, pos }))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { kinds })
    }

    pub fn kinds(&self) -> &[FieldKind] {
        &self.kinds
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    pub fn cursor<'s, 'a>(&'s self, buffer: &'a [u8]) -> SchemaCursor<'s, 'a> {
        SchemaCursor {
            schema: self,
            inner: BufferCursor::parse(buffer),
            next: 0,
        }
    }

    /// Decodes every field and requires the buffer to end with the last one.
    pub fn decode<'a>(&self, buffer: &'a [u8]) -> Result<Vec<Field<'a>>, DecodeError> {
        let mut cursor = self.cursor(buffer);
        let mut out = Vec::with_capacity(self.kinds.len());
        for &kind in &self.kinds {
            out.push(cursor.read(kind)?);
        }
        cursor.finish()?;
        Ok(out)
    }

    pub fn pack(&self, values: &[PackValue]) -> Result<Vec<u8>, SchemaError> {
        if values.len() != self.kinds.len() {
            return Err(SchemaError::ArityMismatch {
                expected: self.kinds.len(),
                got: values.len(),
            });
        }
        let mut out = FormatBuilder::allocate(packed_size_hint(values));
        for (index, (&expected, value)) in self.kinds.iter().zip(values).enumerate() {
            if value.kind() != expected {
                return Err(SchemaError::KindMismatch {
                    index,
                    expected,
                    got: value.kind(),
                });
            }
            match value {
                PackValue::Int(v) => out.append_int(*v),
                PackValue::Short(v) => out.append_short(*v),
                PackValue::Blob(v) => out.append_blob(v)?,
                PackValue::Str(v) => out.append_str(v)?,
                PackValue::WideStr(v) => out.append_wstr(v)?,
            }
        }
        Ok(out.into_vec())
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for kind in &self.kinds {
            write!(f, "{}", kind.code())?;
        }
        Ok(())
    }
}

fn packed_size_hint(values: &[PackValue]) -> usize {
    values
        .iter()
        .map(|v| match v {
            PackValue::Int(_) => 4,
            PackValue::Short(_) => 2,
            PackValue::Blob(b) => 4 + b.len(),
            PackValue::Str(s) => 5 + s.len(),
            PackValue::WideStr(s) => 6 + s.len() * 2,
        })
        .sum()
}

/// A [`BufferCursor`] that checks each read against the next schema field.
#[derive(Clone, Debug)]
pub struct SchemaCursor<'s, 'a> {
    schema: &'s Schema,
    inner: BufferCursor<'a>,
    next: usize,
}

impl<'s, 'a> SchemaCursor<'s, 'a> {
    pub fn position(&self) -> usize {
        self.next
    }

    pub fn remaining_length(&self) -> usize {
        self.inner.remaining_length()
    }

    pub fn read_int(&mut self) -> Result<i32, DecodeError> {
        self.expect(FieldKind::Int)?;
        self.inner.read_int()
    }

    pub fn read_short(&mut self) -> Result<i16, DecodeError> {
        self.expect(FieldKind::Short)?;
        self.inner.read_short()
    }

    pub fn extract_blob(&mut self) -> Result<&'a [u8], DecodeError> {
        self.expect(FieldKind::Blob)?;
        self.inner.extract_blob()
    }

    pub fn extract_str(&mut self) -> Result<&'a [u8], DecodeError> {
        self.expect(FieldKind::Str)?;
        self.inner.extract_str()
    }

    pub fn extract_wstr(&mut self) -> Result<&'a [u8], DecodeError> {
        self.expect(FieldKind::WideStr)?;
        let raw = self.inner.extract_blob()?;
        Ok(raw.strip_suffix(&[0, 0]).unwrap_or(raw))
    }

    pub fn read(&mut self, kind: FieldKind) -> Result<Field<'a>, DecodeError> {
        Ok(match kind {
            FieldKind::Int => Field::Int(self.read_int()?),
            FieldKind::Short => Field::Short(self.read_short()?),
            FieldKind::Blob => Field::Blob(self.extract_blob()?),
            FieldKind::Str => Field::Str(self.extract_str()?),
            FieldKind::WideStr => Field::WideStr(self.extract_wstr()?),
        })
    }

    /// Succeeds only when every schema field was read and no bytes remain.
    pub fn finish(&self) -> Result<(), DecodeError> {
        if self.next != self.schema.len() {
            return Err(DecodeError::SchemaIncomplete {
                decoded: self.next,
                len: self.schema.len(),
            });
        }
        self.inner.finish()
    }

    fn expect(&mut self, requested: FieldKind) -> Result<(), DecodeError> {
        let Some(&expected) = self.schema.kinds.get(self.next) else {
            return Err(DecodeError::SchemaExhausted {
                len: self.schema.len(),
                requested,
            });
        };
        if expected != requested {
            log::debug!(
                "schema {} field {}: expected {expected}, read {requested}",
                self.schema,
                self.next
            );
            return Err(DecodeError::SchemaMismatch {
                index: self.next,
                expected,
                requested,
            });
        }
        self.next += 1;
        Ok(())
    }
}

/// Decodes UTF-16LE bytes into a `String`, replacing invalid sequences.
pub fn wide_to_string(raw: &[u8]) -> String {
    let units: Vec<u16> = raw
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect();
    String::from_utf16_lossy(&units)
}
