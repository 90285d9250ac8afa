//! Binary cursors for story saves
//!
//! Story saves are little-endian. From format 1.4 on, every serialized
//! string (including its NUL terminator) is XORed with a scramble byte;
//! numeric fields are never scrambled. The cursors also carry the format
//! version and the flattened type-alias map, which value deserialization
//! consults.

use std::collections::HashMap;
use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{Error, Result};
use crate::story::version;

/// Scramble byte applied to strings from format 1.4 on.
pub const STRING_SCRAMBLE: u8 = 0xAD;

/// Reading cursor over a story save stream.
pub struct OsiReader<R: Read> {
    inner: R,
    /// XOR byte applied to strings; 0 disables scrambling.
    pub scramble: u8,
    /// Header major version.
    pub major: u8,
    /// Header minor version.
    pub minor: u8,
    /// Custom type id -> fully resolved builtin alias target.
    pub type_aliases: HashMap<u32, u32>,
    /// Bytes consumed so far, for diagnostics.
    pub position: u64,
}

impl<R: Read> OsiReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            scramble: 0,
            major: 0,
            minor: 0,
            type_aliases: HashMap::new(),
            position: 0,
        }
    }

    /// Packed format version for gate comparisons.
    #[must_use]
    pub fn ver(&self) -> u32 {
        version::pack(self.major, self.minor)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        let value = self.inner.read_u8()?;
        self.position += 1;
        Ok(value)
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        let value = self.inner.read_i8()?;
        self.position += 1;
        Ok(value)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let value = self.inner.read_u32::<LittleEndian>()?;
        self.position += 4;
        Ok(value)
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        let value = self.inner.read_i32::<LittleEndian>()?;
        self.position += 4;
        Ok(value)
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        let value = self.inner.read_i64::<LittleEndian>()?;
        self.position += 8;
        Ok(value)
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        let value = self.inner.read_f32::<LittleEndian>()?;
        self.position += 4;
        Ok(value)
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.inner.read_exact(&mut buf)?;
        self.position += len as u64;
        Ok(buf)
    }

    /// Reads a serialized boolean, rejecting anything but 0 or 1.
    pub fn read_bool(&mut self) -> Result<bool> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(Error::InvalidBoolean(other)),
        }
    }

    /// Consumes the cursor, returning the underlying stream.
    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Reads a NUL-terminated, possibly scrambled UTF-8 string.
    pub fn read_string(&mut self) -> Result<String> {
        let mut bytes = Vec::new();
        loop {
            let b = self.inner.read_u8()? ^ self.scramble;
            self.position += 1;
            if b == 0 {
                break;
            }
            bytes.push(b);
        }
        Ok(String::from_utf8(bytes)?)
    }
}

/// Writing cursor over a story save stream.
pub struct OsiWriter<W: Write> {
    inner: W,
    /// XOR byte applied to strings; 0 disables scrambling.
    pub scramble: u8,
    /// Header major version.
    pub major: u8,
    /// Header minor version.
    pub minor: u8,
    /// Custom type id -> fully resolved builtin alias target.
    pub type_aliases: HashMap<u32, u32>,
}

impl<W: Write> OsiWriter<W> {
    pub fn new(inner: W, major: u8, minor: u8) -> Self {
        Self {
            inner,
            scramble: 0,
            major,
            minor,
            type_aliases: HashMap::new(),
        }
    }

    /// Packed format version for gate comparisons.
    #[must_use]
    pub fn ver(&self) -> u32 {
        version::pack(self.major, self.minor)
    }

    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        Ok(self.inner.write_u8(value)?)
    }

    pub fn write_i8(&mut self, value: i8) -> Result<()> {
        Ok(self.inner.write_i8(value)?)
    }

    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        Ok(self.inner.write_u32::<LittleEndian>(value)?)
    }

    pub fn write_i32(&mut self, value: i32) -> Result<()> {
        Ok(self.inner.write_i32::<LittleEndian>(value)?)
    }

    pub fn write_i64(&mut self, value: i64) -> Result<()> {
        Ok(self.inner.write_i64::<LittleEndian>(value)?)
    }

    pub fn write_f32(&mut self, value: f32) -> Result<()> {
        Ok(self.inner.write_f32::<LittleEndian>(value)?)
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        Ok(self.inner.write_all(bytes)?)
    }

    pub fn write_bool(&mut self, value: bool) -> Result<()> {
        self.write_u8(u8::from(value))
    }

    /// Consumes the cursor, returning the underlying stream.
    pub fn into_inner(self) -> W {
        self.inner
    }

    /// Writes a NUL-terminated string, scrambling bytes and terminator alike.
    pub fn write_string(&mut self, value: &str) -> Result<()> {
        for &b in value.as_bytes() {
            self.inner.write_u8(b ^ self.scramble)?;
        }
        Ok(self.inner.write_u8(self.scramble)?)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn scrambled_string_round_trip() {
        let mut writer = OsiWriter::new(Vec::new(), 1, 8);
        writer.scramble = STRING_SCRAMBLE;
        writer.write_string("TestGoal").unwrap();
        let buf = writer.into_inner();

        // No plaintext on the wire, terminator scrambled too.
        assert!(!buf.windows(4).any(|w| w == b"Test"));
        assert_eq!(*buf.last().unwrap(), STRING_SCRAMBLE);

        let mut reader = OsiReader::new(Cursor::new(buf));
        reader.scramble = STRING_SCRAMBLE;
        assert_eq!(reader.read_string().unwrap(), "TestGoal");
    }

    #[test]
    fn plain_string_round_trip() {
        let mut writer = OsiWriter::new(Vec::new(), 1, 3);
        writer.write_string("Unscrambled").unwrap();
        let buf = writer.into_inner();
        assert!(buf.starts_with(b"Unscrambled\0"));

        let mut reader = OsiReader::new(Cursor::new(buf));
        assert_eq!(reader.read_string().unwrap(), "Unscrambled");
    }

    #[test]
    fn strict_boolean() {
        let mut reader = OsiReader::new(Cursor::new(vec![0u8, 1, 2]));
        assert!(!reader.read_bool().unwrap());
        assert!(reader.read_bool().unwrap());
        assert!(matches!(reader.read_bool(), Err(Error::InvalidBoolean(2))));
    }
}
