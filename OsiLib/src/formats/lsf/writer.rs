//! LSF resource writer

#![allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use byteorder::{LittleEndian, WriteBytesExt};
use tracing::debug;

use crate::compression::{self, CompressionLevel, CompressionMethod};
use crate::error::{Error, Result};
use crate::formats::lsf::document::{AttributeValue, NodeAttribute, Resource, TranslatedFSString};
use crate::formats::lsf::string_table::StringTable;
use crate::formats::lsf::{
    LSF_MAGIC, VER_BG3, VER_BG3_EXTENDED_HEADER, VER_CHUNKED_COMPRESS, VER_EXTENDED_NODES,
    VER_INITIAL, VER_MAX_WRITE,
};

/// Output settings for the LSF writer.
#[derive(Debug, Clone, Copy)]
pub struct WriteOptions {
    pub version: u32,
    pub compression: CompressionMethod,
    pub level: CompressionLevel,
    /// Emit extended node records with sibling links. Only takes effect from
    /// format version 3 on.
    pub sibling_data: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        WriteOptions {
            version: VER_MAX_WRITE,
            compression: CompressionMethod::Lz4,
            level: CompressionLevel::Default,
            sibling_data: false,
        }
    }
}

/// Writes an LSF resource to a file.
///
/// # Errors
/// Returns an error if the requested version is unsupported or the file
/// cannot be written.
pub fn write_lsf<P: AsRef<Path>>(
    resource: &Resource,
    path: P,
    options: &WriteOptions,
) -> Result<()> {
    let data = lsf_to_vec(resource, options)?;
    let mut file = BufWriter::new(File::create(path)?);
    file.write_all(&data)?;
    Ok(())
}

/// Serializes an LSF resource into a byte buffer.
///
/// # Errors
/// Returns an error if the requested version is unsupported.
pub fn lsf_to_vec(resource: &Resource, options: &WriteOptions) -> Result<Vec<u8>> {
    if !(VER_INITIAL..=VER_MAX_WRITE).contains(&options.version) {
        return Err(Error::UnsupportedLsfWriteVersion {
            version: options.version,
        });
    }
    let extended = options.version >= VER_EXTENDED_NODES && options.sibling_data;
    debug!(version = options.version, extended, "writing LSF resource");

    let write_order = depth_first_order(resource);
    let mut write_index = vec![0usize; resource.nodes.len()];
    for (index, &node) in write_order.iter().enumerate() {
        write_index[node] = index;
    }
    let next_sibling = sibling_links(resource, &write_index);

    let mut strings = StringTable::new();
    let mut nodes_data = Vec::new();
    let mut attributes_data = Vec::new();
    let mut values_data = Vec::new();
    let mut attribute_counter = 0i32;

    for &arena_index in &write_order {
        let node = &resource.nodes[arena_index];
        let name_ref = strings.add(&node.name);
        let first_attribute = if node.attributes.is_empty() {
            -1
        } else {
            attribute_counter
        };
        let parent = node.parent.map_or(-1, |p| write_index[p] as i32);

        nodes_data.write_u32::<LittleEndian>(name_ref)?;
        if extended {
            nodes_data.write_i32::<LittleEndian>(parent)?;
            nodes_data.write_i32::<LittleEndian>(next_sibling[write_index[arena_index]])?;
            nodes_data.write_i32::<LittleEndian>(first_attribute)?;
        } else {
            nodes_data.write_i32::<LittleEndian>(first_attribute)?;
            nodes_data.write_i32::<LittleEndian>(parent)?;
        }

        let attribute_count = node.attributes.len();
        for (position, (name, attribute)) in node.attributes.iter().enumerate() {
            let name_ref = strings.add(name);
            let offset = values_data.len();
            encode_value(&mut values_data, attribute, options.version, resource)?;
            let length = (values_data.len() - offset) as u32;

            attributes_data.write_u32::<LittleEndian>(name_ref)?;
            attributes_data.write_u32::<LittleEndian>(attribute.type_id | (length << 6))?;
            attribute_counter += 1;
            if extended {
                let next = if position + 1 < attribute_count {
                    attribute_counter
                } else {
                    -1
                };
                attributes_data.write_i32::<LittleEndian>(next)?;
                attributes_data.write_u32::<LittleEndian>(offset as u32)?;
            } else {
                attributes_data.write_i32::<LittleEndian>(write_index[arena_index] as i32)?;
            }
        }
    }

    let strings_data = strings.to_bytes()?;
    let chunked = options.version >= VER_CHUNKED_COMPRESS;

    let mut output = Vec::new();
    output.extend_from_slice(&LSF_MAGIC);
    output.write_u32::<LittleEndian>(options.version)?;
    if options.version >= VER_BG3_EXTENDED_HEADER {
        output.write_i64::<LittleEndian>(resource.engine_version.to_i64())?;
    } else {
        output.write_i32::<LittleEndian>(resource.engine_version.to_i32())?;
    }

    let sections = [
        (strings_data, false),
        (nodes_data, chunked),
        (attributes_data, chunked),
        (values_data, chunked),
    ];
    let mut packed_sections = Vec::with_capacity(sections.len());
    for (data, section_chunked) in &sections {
        let packed = compression::compress(data, options.compression, options.level, *section_chunked)?;
        // Raw sections record a zero on-disk size.
        let on_disk = if options.compression == CompressionMethod::None {
            0
        } else {
            packed.len() as u32
        };
        output.write_u32::<LittleEndian>(data.len() as u32)?;
        output.write_u32::<LittleEndian>(on_disk)?;
        packed_sections.push(packed);
    }

    output.write_u8(compression::make_flags(options.compression, options.level))?;
    output.write_u8(0)?;
    output.write_u16::<LittleEndian>(0)?;
    output.write_u32::<LittleEndian>(u32::from(extended))?;

    for packed in &packed_sections {
        output.extend_from_slice(packed);
    }
    Ok(output)
}

/// Node arena indices in serialization order: each region followed by its
/// subtree, depth first.
fn depth_first_order(resource: &Resource) -> Vec<usize> {
    fn visit(resource: &Resource, node: usize, order: &mut Vec<usize>) {
        order.push(node);
        for &child in &resource.nodes[node].children {
            visit(resource, child, order);
        }
    }
    let mut order = Vec::with_capacity(resource.nodes.len());
    for &region in &resource.regions {
        visit(resource, region, &mut order);
    }
    order
}

/// Next-sibling link per write index, for extended node records.
fn sibling_links(resource: &Resource, write_index: &[usize]) -> Vec<i32> {
    let mut links = vec![-1i32; resource.nodes.len()];
    let mut chain = |nodes: &[usize]| {
        for pair in nodes.windows(2) {
            links[write_index[pair[0]]] = write_index[pair[1]] as i32;
        }
    };
    chain(&resource.regions);
    for node in &resource.nodes {
        chain(&node.children);
    }
    links
}

fn encode_value(
    buffer: &mut Vec<u8>,
    attribute: &NodeAttribute,
    version: u32,
    resource: &Resource,
) -> Result<()> {
    match &attribute.value {
        AttributeValue::None => {}
        AttributeValue::Byte(v) => buffer.write_u8(*v)?,
        AttributeValue::Short(v) => buffer.write_i16::<LittleEndian>(*v)?,
        AttributeValue::UShort(v) => buffer.write_u16::<LittleEndian>(*v)?,
        AttributeValue::Int(v) => buffer.write_i32::<LittleEndian>(*v)?,
        AttributeValue::UInt(v) => buffer.write_u32::<LittleEndian>(*v)?,
        AttributeValue::Float(v) => buffer.write_f32::<LittleEndian>(*v)?,
        AttributeValue::Double(v) => buffer.write_f64::<LittleEndian>(*v)?,
        AttributeValue::IVec(items) => {
            for item in items {
                buffer.write_i32::<LittleEndian>(*item)?;
            }
        }
        AttributeValue::FVec(items) => {
            for item in items {
                buffer.write_f32::<LittleEndian>(*item)?;
            }
        }
        AttributeValue::Bool(v) => buffer.write_u8(u8::from(*v))?,
        AttributeValue::String(v) => {
            buffer.extend_from_slice(v.as_bytes());
            buffer.push(0);
        }
        AttributeValue::ULongLong(v) => buffer.write_u64::<LittleEndian>(*v)?,
        AttributeValue::ScratchBuffer(v) => buffer.extend_from_slice(v),
        AttributeValue::Long(v) => buffer.write_i64::<LittleEndian>(*v)?,
        AttributeValue::Int8(v) => buffer.write_i8(*v)?,
        AttributeValue::Uuid(v) => buffer.extend_from_slice(v),
        AttributeValue::TranslatedString(v) => {
            if version >= VER_BG3 || resource.engine_version.has_translated_string_version() {
                buffer.write_u16::<LittleEndian>(v.version)?;
            } else {
                write_length_prefixed_string(buffer, v.value.as_deref().unwrap_or(""))?;
            }
            write_length_prefixed_string(buffer, &v.handle)?;
        }
        AttributeValue::TranslatedFSString(v) => {
            encode_translated_fs_string(buffer, v, version)?;
        }
    }
    Ok(())
}

fn encode_translated_fs_string(
    buffer: &mut Vec<u8>,
    string: &TranslatedFSString,
    version: u32,
) -> Result<()> {
    if version >= VER_BG3 {
        buffer.write_u16::<LittleEndian>(string.version)?;
    } else {
        write_length_prefixed_string(buffer, string.value.as_deref().unwrap_or(""))?;
    }
    write_length_prefixed_string(buffer, &string.handle)?;
    buffer.write_i32::<LittleEndian>(string.arguments.len() as i32)?;
    for argument in &string.arguments {
        write_length_prefixed_string(buffer, &argument.key)?;
        encode_translated_fs_string(buffer, &argument.string, version)?;
        write_length_prefixed_string(buffer, &argument.value)?;
    }
    Ok(())
}

/// Writes an i32 length (including the terminator) followed by the string
/// bytes and a NUL.
fn write_length_prefixed_string(buffer: &mut Vec<u8>, s: &str) -> Result<()> {
    buffer.write_i32::<LittleEndian>(s.len() as i32 + 1)?;
    buffer.extend_from_slice(s.as_bytes());
    buffer.push(0);
    Ok(())
}
