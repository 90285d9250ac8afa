//! Error types for `OsiLib`

use lz4_flex::frame::Error as Lz4FrameError;
use thiserror::Error;

/// The error type for `OsiLib` operations.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Error {
    // ==================== IO Errors ====================
    /// IO error from file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// UTF-8 conversion error.
    #[error("UTF-8 conversion error: {0}")]
    Utf8Error(#[from] std::string::FromUtf8Error),

    // ==================== Story Format Errors ====================
    /// The story save version is outside the supported window.
    #[error("unsupported story version: {major}.{minor} (supported: 1.0-1.11)")]
    UnsupportedStoryVersion {
        /// Major version byte from the header.
        major: u8,
        /// Minor version byte from the header.
        minor: u8,
    },

    /// A serialized boolean held a value other than 0 or 1.
    #[error("invalid boolean value: {0} (expected 0 or 1)")]
    InvalidBoolean(u8),

    /// Unknown node type tag in the node table.
    #[error("unrecognized node type: {0}")]
    UnrecognizedNodeType(u8),

    /// Unknown discriminator byte at the start of a serialized value.
    #[error("unrecognized value type: {0}")]
    UnrecognizedValueType(u8),

    /// A rule variable list entry was not tagged as a variable.
    #[error("illegal value type in rule variable list: {0}")]
    IllegalRuleVariableType(u8),

    /// Unknown function type byte in the function table.
    #[error("unrecognized function type: {0}")]
    UnrecognizedFunctionType(u8),

    /// Unknown relational operator in a RelOp node.
    #[error("unrecognized relational operator: {0}")]
    UnrecognizedRelOp(i32),

    /// Unknown entry point selector in a node entry item.
    #[error("unrecognized entry point: {0}")]
    UnrecognizedEntryPoint(u32),

    /// A custom type's alias chain loops back on itself.
    #[error("type alias cycle detected at type {type_id}")]
    TypeAliasCycle {
        /// The type id where the cycle was detected.
        type_id: u32,
    },

    /// A value with an unknown type cannot be rendered to script text.
    #[error("script cannot contain unknown values")]
    ScriptUnknownValue,

    // ==================== Story Referential Integrity Errors ====================
    /// A node reference points at a node that does not exist.
    #[error("dangling node reference: {0}")]
    DanglingNodeRef(u32),

    /// An adapter reference points at an adapter that does not exist.
    #[error("dangling adapter reference: {0}")]
    DanglingAdapterRef(u32),

    /// A database reference points at a database that does not exist.
    #[error("dangling database reference: {0}")]
    DanglingDatabaseRef(u32),

    /// A goal reference points at a goal that does not exist.
    #[error("dangling goal reference: {0}")]
    DanglingGoalRef(u32),

    /// An adapter cannot be assigned to multiple join/rel nodes.
    #[error("an adapter cannot be assigned to multiple join/rel nodes (adapter {adapter})")]
    AdapterAlreadyOwned {
        /// The doubly-claimed adapter id.
        adapter: u32,
    },

    /// A database cannot be assigned to multiple database nodes.
    #[error("a database cannot be assigned to multiple database nodes (database {database})")]
    DatabaseAlreadyOwned {
        /// The doubly-claimed database id.
        database: u32,
    },

    /// An adapter's stored logical column index is absent from the input tuple.
    #[error("logical column index {index} does not exist in tuple")]
    LogicalColumnMissing {
        /// The logical column index the adapter asked for.
        index: i8,
    },

    /// A rule's root node is neither a database nor a proc node.
    #[error("could not classify rule: root node {node} is neither a database nor a proc node")]
    UnclassifiableRule {
        /// The root node id.
        node: u32,
    },

    // ==================== LSF Format Errors ====================
    /// The file is not a valid LSF file (missing LSOF magic).
    #[error("invalid LSF magic: expected LSOF, found {0:?}")]
    InvalidLsfMagic([u8; 4]),

    /// The LSF version is not supported for reading.
    #[error("unsupported LSF version: {version} (supported: 1-7)")]
    UnsupportedLsfVersion {
        /// The version number found in the file.
        version: u32,
    },

    /// The LSF version is not supported for writing.
    #[error("unsupported LSF write version: {version} (supported: 1-6)")]
    UnsupportedLsfWriteVersion {
        /// The requested output version.
        version: u32,
    },

    /// Invalid string table reference in LSF file.
    #[error("invalid string index: {0}")]
    InvalidStringIndex(String),

    /// Invalid node index in LSF file.
    #[error("invalid node index: {0}")]
    InvalidNodeIndex(i32),

    /// Invalid attribute index in LSF file.
    #[error("invalid attribute index: {0}")]
    InvalidAttributeIndex(i32),

    /// Invalid attribute type in LSF file.
    #[error("invalid attribute type: {0}")]
    InvalidAttributeType(u32),

    /// A length-prefixed string was not terminated by a NUL byte.
    #[error("string is not null-terminated")]
    StringNotNullTerminated,

    // ==================== Compression/Decompression Errors ====================
    /// LZ4 block decompression failed.
    #[error("LZ4 decompression failed: {message}")]
    Lz4DecompressionFailed {
        /// The error message.
        message: String,
    },

    /// LZ4 frame error.
    #[error("LZ4 frame error: {0}")]
    Lz4FrameError(#[from] Lz4FrameError),

    /// Zlib decompression failed.
    #[error("Zlib decompression failed: {message}")]
    ZlibDecompressionFailed {
        /// The error message.
        message: String,
    },

    /// Unsupported compression method.
    #[error("unsupported compression method: {method}")]
    UnsupportedCompressionMethod {
        /// The compression method identifier.
        method: u8,
    },

    /// Decompressed section did not match its declared size.
    #[error("decompressed size mismatch: expected {expected}, got {actual}")]
    DecompressedSizeMismatch {
        /// The size declared in the metadata.
        expected: usize,
        /// The size actually produced.
        actual: usize,
    },
}

/// A specialized Result type for `OsiLib` operations.
pub type Result<T> = std::result::Result<T, Error>;
