//! Hashed name table for LSF files
//!
//! Names are stored in a bucketed hash table: node and attribute records
//! reference them with a packed u32 holding the bucket index in the upper
//! 16 bits and the position within the bucket chain in the lower 16 bits.

#![allow(clippy::cast_possible_truncation)]

use std::collections::HashMap;
use std::io::{Cursor, Read};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{Error, Result};

const BUCKET_COUNT: u32 = 0x200;

#[derive(Debug, Clone)]
pub struct StringTable {
    buckets: Vec<Vec<String>>,
    refs: HashMap<String, u32>,
}

impl StringTable {
    #[must_use]
    pub fn new() -> Self {
        StringTable {
            buckets: vec![Vec::new(); BUCKET_COUNT as usize],
            refs: HashMap::new(),
        }
    }

    /// Adds a string and returns its packed reference, deduplicating
    /// repeated names.
    pub fn add(&mut self, s: &str) -> u32 {
        if let Some(&packed) = self.refs.get(s) {
            return packed;
        }
        let bucket = bucket_of(s);
        let offset = self.buckets[bucket].len() as u32;
        self.buckets[bucket].push(s.to_owned());
        let packed = ((bucket as u32) << 16) | offset;
        self.refs.insert(s.to_owned(), packed);
        packed
    }

    /// Resolves a packed name reference.
    ///
    /// # Errors
    /// Returns an error if the reference points outside the table.
    pub fn get(&self, packed: u32) -> Result<&str> {
        let bucket = (packed >> 16) as usize;
        let offset = (packed & 0xffff) as usize;
        self.buckets
            .get(bucket)
            .and_then(|chain| chain.get(offset))
            .map(String::as_str)
            .ok_or_else(|| Error::InvalidStringIndex(format!("{bucket}:{offset}")))
    }

    /// Parses the string section of an LSF file.
    ///
    /// # Errors
    /// Returns an error if the section is truncated.
    pub fn from_section(data: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(data);
        let bucket_count = cursor.read_u32::<LittleEndian>()? as usize;
        let mut buckets = Vec::with_capacity(bucket_count);
        let mut refs = HashMap::new();
        for bucket in 0..bucket_count {
            let chain_len = cursor.read_u16::<LittleEndian>()? as usize;
            let mut chain = Vec::with_capacity(chain_len);
            for offset in 0..chain_len {
                let len = cursor.read_u16::<LittleEndian>()? as usize;
                let mut bytes = vec![0u8; len];
                cursor.read_exact(&mut bytes)?;
                let s = String::from_utf8(bytes)?;
                refs.insert(s.clone(), ((bucket as u32) << 16) | offset as u32);
                chain.push(s);
            }
            buckets.push(chain);
        }
        Ok(StringTable { buckets, refs })
    }

    /// Serializes the table into the on-disk string section.
    ///
    /// # Errors
    /// Returns an error on I/O failure only; writes to memory cannot fail.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        buffer.write_u32::<LittleEndian>(self.buckets.len() as u32)?;
        for chain in &self.buckets {
            buffer.write_u16::<LittleEndian>(chain.len() as u16)?;
            for s in chain {
                buffer.write_u16::<LittleEndian>(s.len() as u16)?;
                buffer.extend_from_slice(s.as_bytes());
            }
        }
        Ok(buffer)
    }
}

impl Default for StringTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Folds a 32-bit FNV-1a hash into a 9-bit bucket index.
fn bucket_of(s: &str) -> usize {
    let mut hash: u32 = 0x811c_9dc5;
    for byte in s.bytes() {
        hash ^= u32::from(byte);
        hash = hash.wrapping_mul(0x0100_0193);
    }
    ((hash & 0x1ff) ^ ((hash >> 9) & 0x1ff) ^ ((hash >> 18) & 0x1ff) ^ ((hash >> 27) & 0x1ff))
        as usize
}
