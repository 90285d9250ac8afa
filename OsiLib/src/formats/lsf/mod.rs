//! LSF binary resource format
//!
//! Compact serialized node trees with a hashed name table and per-section
//! compression. Format versions 1 through 7 are read; versions 1 through 6
//! are written.

pub mod document;
pub mod reader;
pub mod string_table;
pub mod writer;

pub use document::{
    AttributeValue, NodeAttribute, PackedVersion, Resource, ResourceNode, TranslatedFSString,
    TranslatedFSStringArgument, TranslatedString, TypeId,
};
pub use reader::{parse_lsf_bytes, read_lsf};
pub use writer::{WriteOptions, lsf_to_vec, write_lsf};

pub const LSF_MAGIC: [u8; 4] = *b"LSOF";

/// First format version.
pub const VER_INITIAL: u32 = 1;
/// Record sections switch to chunked compression.
pub const VER_CHUNKED_COMPRESS: u32 = 2;
/// Extended node records with sibling links become available.
pub const VER_EXTENDED_NODES: u32 = 3;
/// BG3 layout; translated strings carry a numeric version field.
pub const VER_BG3: u32 = 4;
/// BG3 header with a 64-bit engine version.
pub const VER_BG3_EXTENDED_HEADER: u32 = 5;
/// Newest version accepted by the reader.
pub const VER_MAX_READ: u32 = 7;
/// Newest version produced by the writer.
pub const VER_MAX_WRITE: u32 = 6;
