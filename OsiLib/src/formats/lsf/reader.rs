//! LSF resource reader

#![allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_possible_wrap)]

use std::fs::File;
use std::io::{Cursor, Read};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt};
use tracing::debug;

use crate::compression;
use crate::error::{Error, Result};
use crate::formats::lsf::document::{
    AttributeValue, NodeAttribute, PackedVersion, Resource, ResourceNode, TranslatedFSString,
    TranslatedFSStringArgument, TranslatedString, TypeId,
};
use crate::formats::lsf::string_table::StringTable;
use crate::formats::lsf::{
    LSF_MAGIC, VER_BG3, VER_BG3_EXTENDED_HEADER, VER_CHUNKED_COMPRESS, VER_EXTENDED_NODES,
    VER_INITIAL, VER_MAX_READ, document,
};

/// Reads an LSF resource from a file.
///
/// # Errors
/// Returns an error if the file cannot be read or is not a valid LSF
/// resource.
pub fn read_lsf<P: AsRef<Path>>(path: P) -> Result<Resource> {
    let mut file = File::open(path)?;
    let mut buffer = Vec::new();
    file.read_to_end(&mut buffer)?;
    parse_lsf_bytes(&buffer)
}

/// Section sizes and format flags following the header.
struct Metadata {
    strings_uncompressed: usize,
    strings_on_disk: usize,
    nodes_uncompressed: usize,
    nodes_on_disk: usize,
    attributes_uncompressed: usize,
    attributes_on_disk: usize,
    values_uncompressed: usize,
    values_on_disk: usize,
    compression_flags: u8,
    has_sibling_data: bool,
}

struct NodeEntry {
    name: u32,
    parent: i32,
    first_attribute: i32,
}

struct AttributeEntry {
    name: u32,
    type_id: TypeId,
    length: usize,
    next_attribute: i32,
    offset: usize,
}

/// Parses an LSF resource from an in-memory buffer.
///
/// # Errors
/// Returns an error if the data is not a valid LSF resource.
pub fn parse_lsf_bytes(data: &[u8]) -> Result<Resource> {
    let mut cursor = Cursor::new(data);

    let mut magic = [0u8; 4];
    cursor.read_exact(&mut magic)?;
    if magic != LSF_MAGIC {
        return Err(Error::InvalidLsfMagic(magic));
    }

    let version = cursor.read_u32::<LittleEndian>()?;
    if !(VER_INITIAL..=VER_MAX_READ).contains(&version) {
        return Err(Error::UnsupportedLsfVersion { version });
    }

    let engine_version = if version >= VER_BG3_EXTENDED_HEADER {
        PackedVersion::from_i64(cursor.read_i64::<LittleEndian>()?)
    } else {
        PackedVersion::from_i32(cursor.read_i32::<LittleEndian>()?)
    };

    let metadata = read_metadata(&mut cursor)?;
    debug!(
        version,
        major = engine_version.major,
        minor = engine_version.minor,
        "reading LSF resource"
    );

    // Sections appear in file order: strings, nodes, attributes, values.
    // Only the record sections use chunked compression, and only from V2 on.
    let chunked = version >= VER_CHUNKED_COMPRESS;
    let strings_data = read_section(
        &mut cursor,
        metadata.strings_uncompressed,
        metadata.strings_on_disk,
        metadata.compression_flags,
        false,
    )?;
    let nodes_data = read_section(
        &mut cursor,
        metadata.nodes_uncompressed,
        metadata.nodes_on_disk,
        metadata.compression_flags,
        chunked,
    )?;
    let attributes_data = read_section(
        &mut cursor,
        metadata.attributes_uncompressed,
        metadata.attributes_on_disk,
        metadata.compression_flags,
        chunked,
    )?;
    let values_data = read_section(
        &mut cursor,
        metadata.values_uncompressed,
        metadata.values_on_disk,
        metadata.compression_flags,
        chunked,
    )?;

    let strings = StringTable::from_section(&strings_data)?;
    let extended = version >= VER_EXTENDED_NODES && metadata.has_sibling_data;
    let node_entries = parse_node_entries(&nodes_data, extended)?;
    let attribute_entries = parse_attribute_entries(&attributes_data, extended)?;

    build_resource(
        version,
        engine_version,
        &strings,
        &node_entries,
        &attribute_entries,
        &values_data,
    )
}

fn read_metadata<R: Read>(reader: &mut R) -> Result<Metadata> {
    let strings_uncompressed = reader.read_u32::<LittleEndian>()? as usize;
    let strings_on_disk = reader.read_u32::<LittleEndian>()? as usize;
    let nodes_uncompressed = reader.read_u32::<LittleEndian>()? as usize;
    let nodes_on_disk = reader.read_u32::<LittleEndian>()? as usize;
    let attributes_uncompressed = reader.read_u32::<LittleEndian>()? as usize;
    let attributes_on_disk = reader.read_u32::<LittleEndian>()? as usize;
    let values_uncompressed = reader.read_u32::<LittleEndian>()? as usize;
    let values_on_disk = reader.read_u32::<LittleEndian>()? as usize;
    let compression_flags = reader.read_u8()?;
    let _unknown2 = reader.read_u8()?;
    let _unknown3 = reader.read_u16::<LittleEndian>()?;
    let has_sibling_data = reader.read_u32::<LittleEndian>()? == 1;
    Ok(Metadata {
        strings_uncompressed,
        strings_on_disk,
        nodes_uncompressed,
        nodes_on_disk,
        attributes_uncompressed,
        attributes_on_disk,
        values_uncompressed,
        values_on_disk,
        compression_flags,
        has_sibling_data,
    })
}

fn read_section<R: Read>(
    reader: &mut R,
    uncompressed_size: usize,
    on_disk_size: usize,
    flags: u8,
    chunked: bool,
) -> Result<Vec<u8>> {
    if on_disk_size == 0 {
        // A zero on-disk size means the section is stored raw.
        if uncompressed_size == 0 {
            return Ok(Vec::new());
        }
        let mut buffer = vec![0u8; uncompressed_size];
        reader.read_exact(&mut buffer)?;
        return Ok(buffer);
    }
    let mut buffer = vec![0u8; on_disk_size];
    reader.read_exact(&mut buffer)?;
    compression::decompress(&buffer, uncompressed_size, flags, chunked)
}

fn parse_node_entries(data: &[u8], extended: bool) -> Result<Vec<NodeEntry>> {
    let entry_size = if extended { 16 } else { 12 };
    let count = data.len() / entry_size;
    let mut cursor = Cursor::new(data);
    let mut entries = Vec::with_capacity(count);
    for _ in 0..count {
        let name = cursor.read_u32::<LittleEndian>()?;
        let entry = if extended {
            let parent = cursor.read_i32::<LittleEndian>()?;
            let _next_sibling = cursor.read_i32::<LittleEndian>()?;
            let first_attribute = cursor.read_i32::<LittleEndian>()?;
            NodeEntry {
                name,
                parent,
                first_attribute,
            }
        } else {
            let first_attribute = cursor.read_i32::<LittleEndian>()?;
            let parent = cursor.read_i32::<LittleEndian>()?;
            NodeEntry {
                name,
                parent,
                first_attribute,
            }
        };
        entries.push(entry);
    }
    Ok(entries)
}

fn parse_attribute_entries(data: &[u8], extended: bool) -> Result<Vec<AttributeEntry>> {
    let entry_size = if extended { 16 } else { 12 };
    let count = data.len() / entry_size;
    let mut cursor = Cursor::new(data);
    let mut entries = Vec::with_capacity(count);

    if extended {
        for _ in 0..count {
            let name = cursor.read_u32::<LittleEndian>()?;
            let type_and_length = cursor.read_u32::<LittleEndian>()?;
            let next_attribute = cursor.read_i32::<LittleEndian>()?;
            let offset = cursor.read_u32::<LittleEndian>()? as usize;
            entries.push(AttributeEntry {
                name,
                type_id: type_and_length & 0x3f,
                length: (type_and_length >> 6) as usize,
                next_attribute,
                offset,
            });
        }
        return Ok(entries);
    }

    // Compact records carry the owning node instead of a chain link and no
    // value offset; offsets are the running sum of value lengths, and chains
    // are rebuilt by linking each node's records in file order.
    let mut owners = Vec::with_capacity(count);
    let mut offset = 0usize;
    for _ in 0..count {
        let name = cursor.read_u32::<LittleEndian>()?;
        let type_and_length = cursor.read_u32::<LittleEndian>()?;
        let node_index = cursor.read_i32::<LittleEndian>()?;
        let length = (type_and_length >> 6) as usize;
        entries.push(AttributeEntry {
            name,
            type_id: type_and_length & 0x3f,
            length,
            next_attribute: -1,
            offset,
        });
        owners.push(node_index);
        offset += length;
    }
    let mut last_of_node: std::collections::HashMap<i32, usize> = std::collections::HashMap::new();
    for index in 0..count {
        if let Some(&previous) = last_of_node.get(&owners[index]) {
            entries[previous].next_attribute = index as i32;
        }
        last_of_node.insert(owners[index], index);
    }
    Ok(entries)
}

fn build_resource(
    version: u32,
    engine_version: PackedVersion,
    strings: &StringTable,
    node_entries: &[NodeEntry],
    attribute_entries: &[AttributeEntry],
    values: &[u8],
) -> Result<Resource> {
    let mut resource = Resource {
        version,
        engine_version,
        ..Resource::default()
    };

    for (index, entry) in node_entries.iter().enumerate() {
        let mut node = ResourceNode {
            name: strings.get(entry.name)?.to_owned(),
            ..ResourceNode::default()
        };
        if entry.parent >= 0 {
            let parent = entry.parent as usize;
            if parent >= index {
                return Err(Error::InvalidNodeIndex(entry.parent));
            }
            node.parent = Some(parent);
        }

        let mut attribute = entry.first_attribute;
        while attribute >= 0 {
            let attr_entry = attribute_entries
                .get(attribute as usize)
                .ok_or(Error::InvalidAttributeIndex(attribute))?;
            let name = strings.get(attr_entry.name)?.to_owned();
            let value = read_attribute_value(
                values,
                attr_entry,
                version,
                engine_version,
            )?;
            node.attributes.insert(
                name,
                NodeAttribute::new(attr_entry.type_id, value),
            );
            attribute = attr_entry.next_attribute;
        }

        resource.nodes.push(node);
        if entry.parent < 0 {
            resource.regions.push(index);
        } else {
            resource.nodes[entry.parent as usize].children.push(index);
        }
    }

    debug!(
        nodes = resource.nodes.len(),
        regions = resource.regions.len(),
        "LSF resource read"
    );
    Ok(resource)
}

fn read_attribute_value(
    values: &[u8],
    entry: &AttributeEntry,
    version: u32,
    engine_version: PackedVersion,
) -> Result<AttributeValue> {
    let end = entry.offset + entry.length;
    let slice = values.get(entry.offset..end).ok_or_else(|| {
        Error::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "attribute value lies outside the value section",
        ))
    })?;
    let mut cursor = Cursor::new(slice);
    decode_value(&mut cursor, entry.type_id, entry.length, version, engine_version)
}

fn decode_value(
    cursor: &mut Cursor<&[u8]>,
    type_id: TypeId,
    length: usize,
    version: u32,
    engine_version: PackedVersion,
) -> Result<AttributeValue> {
    let value = match type_id {
        document::TYPE_NONE => AttributeValue::None,
        document::TYPE_UINT8 => AttributeValue::Byte(cursor.read_u8()?),
        document::TYPE_INT16 => AttributeValue::Short(cursor.read_i16::<LittleEndian>()?),
        document::TYPE_UINT16 => AttributeValue::UShort(cursor.read_u16::<LittleEndian>()?),
        document::TYPE_INT32 => AttributeValue::Int(cursor.read_i32::<LittleEndian>()?),
        document::TYPE_UINT32 => AttributeValue::UInt(cursor.read_u32::<LittleEndian>()?),
        document::TYPE_FLOAT => AttributeValue::Float(cursor.read_f32::<LittleEndian>()?),
        document::TYPE_DOUBLE => AttributeValue::Double(cursor.read_f64::<LittleEndian>()?),
        document::TYPE_IVEC2 | document::TYPE_IVEC3 | document::TYPE_IVEC4 => {
            let columns = document::type_columns(type_id).unwrap_or_default();
            let mut items = Vec::with_capacity(columns);
            for _ in 0..columns {
                items.push(cursor.read_i32::<LittleEndian>()?);
            }
            AttributeValue::IVec(items)
        }
        document::TYPE_FVEC2
        | document::TYPE_FVEC3
        | document::TYPE_FVEC4
        | document::TYPE_MAT2X2
        | document::TYPE_MAT3X3
        | document::TYPE_MAT3X4
        | document::TYPE_MAT4X3
        | document::TYPE_MAT4X4 => {
            let columns = document::type_columns(type_id).unwrap_or_default();
            let rows = document::type_rows(type_id).unwrap_or_default();
            let mut items = Vec::with_capacity(columns * rows);
            for _ in 0..columns * rows {
                items.push(cursor.read_f32::<LittleEndian>()?);
            }
            AttributeValue::FVec(items)
        }
        document::TYPE_BOOL => AttributeValue::Bool(cursor.read_u8()? != 0),
        document::TYPE_STRING
        | document::TYPE_PATH
        | document::TYPE_FIXEDSTRING
        | document::TYPE_LSSTRING
        | document::TYPE_WSTRING
        | document::TYPE_LSWSTRING => AttributeValue::String(read_fixed_string(cursor, length)?),
        document::TYPE_UINT64 => AttributeValue::ULongLong(cursor.read_u64::<LittleEndian>()?),
        document::TYPE_SCRATCHBUFFER => {
            let mut buffer = vec![0u8; length];
            cursor.read_exact(&mut buffer)?;
            AttributeValue::ScratchBuffer(buffer)
        }
        document::TYPE_OLD_INT64 | document::TYPE_INT64 => {
            AttributeValue::Long(cursor.read_i64::<LittleEndian>()?)
        }
        document::TYPE_INT8 => AttributeValue::Int8(cursor.read_i8()?),
        document::TYPE_TRANSLATEDSTRING => AttributeValue::TranslatedString(
            read_translated_string(cursor, version, engine_version)?,
        ),
        document::TYPE_GUID => {
            let mut bytes = [0u8; 16];
            cursor.read_exact(&mut bytes)?;
            AttributeValue::Uuid(bytes)
        }
        document::TYPE_TRANSLATEDFSSTRING => {
            AttributeValue::TranslatedFSString(read_translated_fs_string(cursor, version)?)
        }
        other => return Err(Error::InvalidAttributeType(other)),
    };
    Ok(value)
}

/// Reads a NUL-terminated string of a known total length, trimming any
/// trailing padding zeros.
fn read_fixed_string(cursor: &mut Cursor<&[u8]>, length: usize) -> Result<String> {
    if length == 0 {
        return Err(Error::StringNotNullTerminated);
    }
    let mut bytes = vec![0u8; length];
    cursor.read_exact(&mut bytes)?;
    if bytes[length - 1] != 0 {
        return Err(Error::StringNotNullTerminated);
    }
    while bytes.last() == Some(&0) {
        bytes.pop();
    }
    Ok(String::from_utf8(bytes)?)
}

fn read_length_prefixed_string(cursor: &mut Cursor<&[u8]>) -> Result<String> {
    let length = cursor.read_i32::<LittleEndian>()?;
    read_fixed_string(cursor, length as usize)
}

fn read_translated_string(
    cursor: &mut Cursor<&[u8]>,
    version: u32,
    engine_version: PackedVersion,
) -> Result<TranslatedString> {
    let mut string = TranslatedString::default();
    if version >= VER_BG3 || engine_version.has_translated_string_version() {
        string.version = cursor.read_u16::<LittleEndian>()?;
    } else {
        string.value = Some(read_length_prefixed_string(cursor)?);
    }
    string.handle = read_length_prefixed_string(cursor)?;
    Ok(string)
}

fn read_translated_fs_string(
    cursor: &mut Cursor<&[u8]>,
    version: u32,
) -> Result<TranslatedFSString> {
    let mut string = TranslatedFSString::default();
    if version >= VER_BG3 {
        string.version = cursor.read_u16::<LittleEndian>()?;
    } else {
        string.value = Some(read_length_prefixed_string(cursor)?);
    }
    string.handle = read_length_prefixed_string(cursor)?;

    let argument_count = cursor.read_i32::<LittleEndian>()?;
    for _ in 0..argument_count {
        let key = read_length_prefixed_string(cursor)?;
        let nested = read_translated_fs_string(cursor, version)?;
        let value = read_length_prefixed_string(cursor)?;
        string.arguments.push(TranslatedFSStringArgument {
            key,
            string: nested,
            value,
        });
    }
    Ok(string)
}

#[cfg(test)]
mod tests {
    use byteorder::WriteBytesExt;
    use pretty_assertions::assert_eq;

    use super::*;

    fn raw_v1_file(strings: &[u8], nodes: &[u8], attributes: &[u8], values: &[u8]) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(b"LSOF");
        data.write_u32::<LittleEndian>(1).unwrap();
        data.write_i32::<LittleEndian>(
            PackedVersion {
                major: 3,
                minor: 0,
                revision: 0,
                build: 0,
            }
            .to_i32(),
        )
        .unwrap();
        for section in [strings, nodes, attributes, values] {
            data.write_u32::<LittleEndian>(section.len() as u32).unwrap();
            data.write_u32::<LittleEndian>(0).unwrap();
        }
        data.write_u8(0).unwrap();
        data.write_u8(0).unwrap();
        data.write_u16::<LittleEndian>(0).unwrap();
        data.write_u32::<LittleEndian>(0).unwrap();
        for section in [strings, nodes, attributes, values] {
            data.extend_from_slice(section);
        }
        data
    }

    #[test]
    fn rejects_bad_magic() {
        let err = parse_lsf_bytes(b"LSOX\x01\x00\x00\x00").unwrap_err();
        assert!(matches!(err, Error::InvalidLsfMagic(_)));
    }

    #[test]
    fn rejects_unsupported_version() {
        let mut data = b"LSOF".to_vec();
        data.write_u32::<LittleEndian>(8).unwrap();
        let err = parse_lsf_bytes(&data).unwrap_err();
        assert!(matches!(err, Error::UnsupportedLsfVersion { version: 8 }));
    }

    #[test]
    fn reads_raw_compact_file_and_rebuilds_attribute_chains() {
        let mut strings = StringTable::new();
        let root_ref = strings.add("root");
        let child_ref = strings.add("child");
        let flags_ref = strings.add("Flags");
        let level_ref = strings.add("Level");

        // Two nodes; the root owns attribute records 0 and 2, the child
        // owns record 1, so chain rebuilding has to skip over it.
        let mut nodes = Vec::new();
        nodes.write_u32::<LittleEndian>(root_ref).unwrap();
        nodes.write_i32::<LittleEndian>(0).unwrap();
        nodes.write_i32::<LittleEndian>(-1).unwrap();
        nodes.write_u32::<LittleEndian>(child_ref).unwrap();
        nodes.write_i32::<LittleEndian>(1).unwrap();
        nodes.write_i32::<LittleEndian>(0).unwrap();

        let mut attributes = Vec::new();
        for (name_ref, node_index) in [(flags_ref, 0i32), (flags_ref, 1), (level_ref, 0)] {
            attributes.write_u32::<LittleEndian>(name_ref).unwrap();
            attributes
                .write_u32::<LittleEndian>(document::TYPE_INT32 | (4 << 6))
                .unwrap();
            attributes.write_i32::<LittleEndian>(node_index).unwrap();
        }

        let mut values = Vec::new();
        for value in [10i32, 20, 30] {
            values.write_i32::<LittleEndian>(value).unwrap();
        }

        let data = raw_v1_file(&strings.to_bytes().unwrap(), &nodes, &attributes, &values);
        let resource = parse_lsf_bytes(&data).unwrap();

        assert_eq!(resource.regions, vec![0]);
        assert_eq!(resource.nodes[0].children, vec![1]);
        assert_eq!(
            resource.nodes[0].attribute("Flags").unwrap().value,
            AttributeValue::Int(10)
        );
        assert_eq!(
            resource.nodes[0].attribute("Level").unwrap().value,
            AttributeValue::Int(30)
        );
        assert_eq!(
            resource.nodes[1].attribute("Flags").unwrap().value,
            AttributeValue::Int(20)
        );
    }

    #[test]
    fn fixed_strings_require_terminator() {
        let data: &[u8] = b"abc";
        let mut cursor = Cursor::new(data);
        let err = read_fixed_string(&mut cursor, 3).unwrap_err();
        assert!(matches!(err, Error::StringNotNullTerminated));

        let data: &[u8] = b"abc\0\0\0";
        let mut cursor = Cursor::new(data);
        assert_eq!(read_fixed_string(&mut cursor, 6).unwrap(), "abc");
    }
}
