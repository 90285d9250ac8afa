//! Story save format version gates
//!
//! Versions pack as `major << 8 | minor`, so ordinary integer comparison
//! orders them correctly.

/// Initial version of the story save format.
pub const VER_INITIAL: u32 = 0x0100;

/// Goal init/exit calls were added to the goal definition.
pub const VER_ADD_INIT_EXIT_CALLS: u32 = 0x0101;

/// The header gained a 0x80-byte version string buffer.
pub const VER_ADD_VERSION_STRING: u32 = 0x0102;

/// The header gained a 32-bit debug flags field.
pub const VER_ADD_DEBUG_FLAGS: u32 = 0x0103;

/// Everything after the version header is scrambled with XOR 0xAD.
pub const VER_SCRAMBLE: u32 = 0x0104;

/// A custom type table follows the header.
pub const VER_ADD_TYPE_MAP: u32 = 0x0105;

/// Rule nodes carry a query flag.
pub const VER_ADD_QUERY: u32 = 0x0106;

/// Custom types can alias another type.
pub const VER_TYPE_ALIASES: u32 = 0x0109;

/// Builtin types 2-5 became INTEGER64/REAL/STRING/GUIDSTRING.
pub const VER_ENHANCED_TYPES: u32 = 0x010a;

/// An external string table follows the type table, and the header text
/// changed.
pub const VER_EXTERNAL_STRING_TABLE: u32 = 0x010b;

/// Newest version this library reads and writes.
pub const VER_LAST_SUPPORTED: u32 = 0x010b;

/// Packs header major/minor bytes into a comparable version word.
#[must_use]
pub fn pack(major: u8, minor: u8) -> u32 {
    (u32::from(major) << 8) | u32::from(minor)
}

/// Whether a header version falls inside the supported window.
#[must_use]
pub fn is_supported(major: u8, minor: u8) -> bool {
    let ver = pack(major, minor);
    (VER_INITIAL..=VER_LAST_SUPPORTED).contains(&ver)
}
