//! Low-level wire primitives.
//!
//! All integers are big-endian. Strings are `len:u32 | utf8 bytes`.

use crate::error::{FormatError, Result};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Cursor, Write};

/// Append-only payload builder
#[derive(Debug, Default)]
pub(crate) struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub(crate) fn put_u16(&mut self, value: u16) -> Result<()> {
        self.buf.write_u16::<BigEndian>(value)?;
        Ok(())
    }

    pub(crate) fn put_u32(&mut self, value: u32) -> Result<()> {
        self.buf.write_u32::<BigEndian>(value)?;
        Ok(())
    }

    /// Length as a u32 prefix, failing for anything that does not fit
    pub(crate) fn put_len(&mut self, len: usize) -> Result<()> {
        let len = u32::try_from(len).map_err(|_| FormatError::ValueTooLarge(len))?;
        self.put_u32(len)
    }

    pub(crate) fn put_str(&mut self, value: &str) -> Result<()> {
        self.put_len(value.len())?;
        self.put_bytes(value.as_bytes())
    }

    pub(crate) fn put_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.buf.write_all(bytes)?;
        Ok(())
    }

    pub(crate) fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Cursor over a received payload
#[derive(Debug)]
pub(crate) struct Reader<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(buf),
        }
    }

    fn position(&self) -> usize {
        self.cursor.position() as usize
    }

    pub(crate) fn remaining(&self) -> usize {
        self.cursor.get_ref().len().saturating_sub(self.position())
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let remaining = self.remaining();
        if n > remaining {
            return Err(FormatError::Truncated {
                needed: n,
                remaining,
            });
        }
        let buf: &'a [u8] = *self.cursor.get_ref();
        let start = self.position();
        self.cursor.set_position((start + n) as u64);
        Ok(&buf[start..start + n])
    }

    pub(crate) fn read_u16(&mut self) -> Result<u16> {
        let remaining = self.remaining();
        self.cursor
            .read_u16::<BigEndian>()
            .map_err(|e| short_read(e, 2, remaining))
    }

    pub(crate) fn read_u32(&mut self) -> Result<u32> {
        let remaining = self.remaining();
        self.cursor
            .read_u32::<BigEndian>()
            .map_err(|e| short_read(e, 4, remaining))
    }

    pub(crate) fn read_string(&mut self) -> Result<String> {
        let declared = self.read_u32()? as usize;
        if declared > self.remaining() {
            return Err(FormatError::LengthOverrun {
                declared,
                remaining: self.remaining(),
            });
        }
        let bytes = self.take(declared)?;
        Ok(String::from_utf8(bytes.to_vec())?)
    }

    /// Everything not consumed yet
    pub(crate) fn rest(&mut self) -> &'a [u8] {
        let buf: &'a [u8] = *self.cursor.get_ref();
        let start = self.position().min(buf.len());
        self.cursor.set_position(buf.len() as u64);
        &buf[start..]
    }

    /// Fail if anything is left over
    pub(crate) fn finish(self) -> Result<()> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(FormatError::TrailingBytes(n)),
        }
    }
}

/// An end-of-input read is a truncated payload; anything else is passed on
fn short_read(err: io::Error, needed: usize, remaining: usize) -> FormatError {
    match err.kind() {
        io::ErrorKind::UnexpectedEof => FormatError::Truncated { needed, remaining },
        _ => FormatError::from(err),
    }
}
