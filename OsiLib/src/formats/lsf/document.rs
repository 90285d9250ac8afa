//! LSF resource document model
//!
//! A resource is a tree of named nodes with typed attributes. Nodes are
//! stored in a flat arena; parents and children reference each other by
//! arena index, and top-level nodes are the regions of the file.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use indexmap::IndexMap;

pub type TypeId = u32;

pub const TYPE_NONE: TypeId = 0;
pub const TYPE_UINT8: TypeId = 1;
pub const TYPE_INT16: TypeId = 2;
pub const TYPE_UINT16: TypeId = 3;
pub const TYPE_INT32: TypeId = 4;
pub const TYPE_UINT32: TypeId = 5;
pub const TYPE_FLOAT: TypeId = 6;
pub const TYPE_DOUBLE: TypeId = 7;
pub const TYPE_IVEC2: TypeId = 8;
pub const TYPE_IVEC3: TypeId = 9;
pub const TYPE_IVEC4: TypeId = 10;
pub const TYPE_FVEC2: TypeId = 11;
pub const TYPE_FVEC3: TypeId = 12;
pub const TYPE_FVEC4: TypeId = 13;
pub const TYPE_MAT2X2: TypeId = 14;
pub const TYPE_MAT3X3: TypeId = 15;
pub const TYPE_MAT3X4: TypeId = 16;
pub const TYPE_MAT4X3: TypeId = 17;
pub const TYPE_MAT4X4: TypeId = 18;
pub const TYPE_BOOL: TypeId = 19;
pub const TYPE_STRING: TypeId = 20;
pub const TYPE_PATH: TypeId = 21;
pub const TYPE_FIXEDSTRING: TypeId = 22;
pub const TYPE_LSSTRING: TypeId = 23;
pub const TYPE_UINT64: TypeId = 24;
pub const TYPE_SCRATCHBUFFER: TypeId = 25;
pub const TYPE_OLD_INT64: TypeId = 26;
pub const TYPE_INT8: TypeId = 27;
pub const TYPE_TRANSLATEDSTRING: TypeId = 28;
pub const TYPE_WSTRING: TypeId = 29;
pub const TYPE_LSWSTRING: TypeId = 30;
pub const TYPE_GUID: TypeId = 31;
pub const TYPE_INT64: TypeId = 32;
pub const TYPE_TRANSLATEDFSSTRING: TypeId = 33;

/// Human-readable name for an attribute type id.
#[must_use]
pub fn type_name(type_id: TypeId) -> &'static str {
    match type_id {
        TYPE_NONE => "None",
        TYPE_UINT8 => "uint8",
        TYPE_INT16 => "int16",
        TYPE_UINT16 => "uint16",
        TYPE_INT32 => "int32",
        TYPE_UINT32 => "uint32",
        TYPE_FLOAT => "float",
        TYPE_DOUBLE => "double",
        TYPE_IVEC2 => "ivec2",
        TYPE_IVEC3 => "ivec3",
        TYPE_IVEC4 => "ivec4",
        TYPE_FVEC2 => "fvec2",
        TYPE_FVEC3 => "fvec3",
        TYPE_FVEC4 => "fvec4",
        TYPE_MAT2X2 => "mat2x2",
        TYPE_MAT3X3 => "mat3x3",
        TYPE_MAT3X4 => "mat3x4",
        TYPE_MAT4X3 => "mat4x3",
        TYPE_MAT4X4 => "mat4x4",
        TYPE_BOOL => "bool",
        TYPE_STRING => "string",
        TYPE_PATH => "path",
        TYPE_FIXEDSTRING => "FixedString",
        TYPE_LSSTRING => "LSString",
        TYPE_UINT64 => "uint64",
        TYPE_SCRATCHBUFFER => "ScratchBuffer",
        TYPE_OLD_INT64 => "old_int64",
        TYPE_INT8 => "int8",
        TYPE_TRANSLATEDSTRING => "TranslatedString",
        TYPE_WSTRING => "WString",
        TYPE_LSWSTRING => "LSWString",
        TYPE_GUID => "guid",
        TYPE_INT64 => "int64",
        TYPE_TRANSLATEDFSSTRING => "TranslatedFSString",
        _ => "Unknown",
    }
}

/// Number of columns for vector and matrix types.
#[must_use]
pub fn type_columns(type_id: TypeId) -> Option<usize> {
    match type_id {
        TYPE_IVEC2 | TYPE_FVEC2 | TYPE_MAT2X2 => Some(2),
        TYPE_IVEC3 | TYPE_FVEC3 | TYPE_MAT3X3 | TYPE_MAT4X3 => Some(3),
        TYPE_IVEC4 | TYPE_FVEC4 | TYPE_MAT3X4 | TYPE_MAT4X4 => Some(4),
        _ => None,
    }
}

/// Number of rows for vector and matrix types.
#[must_use]
pub fn type_rows(type_id: TypeId) -> Option<usize> {
    match type_id {
        TYPE_IVEC2 | TYPE_IVEC3 | TYPE_IVEC4 | TYPE_FVEC2 | TYPE_FVEC3 | TYPE_FVEC4 => Some(1),
        TYPE_MAT2X2 => Some(2),
        TYPE_MAT3X3 | TYPE_MAT3X4 => Some(3),
        TYPE_MAT4X3 | TYPE_MAT4X4 => Some(4),
        _ => None,
    }
}

/// Engine version packed into the LSF header.
///
/// Headers before format version 5 pack it into 32 bits with 4/4/8/16-bit
/// fields; newer headers use 64 bits with 7/8/16/31-bit fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PackedVersion {
    pub major: u32,
    pub minor: u32,
    pub revision: u32,
    pub build: u32,
}

impl PackedVersion {
    #[must_use]
    pub fn from_i32(packed: i32) -> Self {
        let packed = packed as u32;
        PackedVersion {
            major: (packed >> 28) & 0x0f,
            minor: (packed >> 24) & 0x0f,
            revision: (packed >> 16) & 0xff,
            build: packed & 0xffff,
        }
    }

    #[must_use]
    pub fn from_i64(packed: i64) -> Self {
        let packed = packed as u64;
        PackedVersion {
            major: ((packed >> 55) & 0x7f) as u32,
            minor: ((packed >> 47) & 0xff) as u32,
            revision: ((packed >> 31) & 0xffff) as u32,
            build: (packed & 0x7fff_ffff) as u32,
        }
    }

    #[must_use]
    pub fn to_i32(self) -> i32 {
        (((self.major & 0x0f) << 28)
            | ((self.minor & 0x0f) << 24)
            | ((self.revision & 0xff) << 16)
            | (self.build & 0xffff)) as i32
    }

    #[must_use]
    pub fn to_i64(self) -> i64 {
        ((u64::from(self.major & 0x7f) << 55)
            | (u64::from(self.minor & 0xff) << 47)
            | (u64::from(self.revision & 0xffff) << 31)
            | u64::from(self.build & 0x7fff_ffff)) as i64
    }

    /// Whether translated strings of this engine generation carry a numeric
    /// version field instead of an inline text value.
    #[must_use]
    pub fn has_translated_string_version(self) -> bool {
        self.major > 4
            || (self.major == 4 && self.revision > 0)
            || (self.major == 4 && self.revision == 0 && self.build >= 0x1a)
    }
}

/// Localized string referencing an entry in the translation tables.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TranslatedString {
    pub version: u16,
    /// Inline text, present in older engine generations only.
    pub value: Option<String>,
    pub handle: String,
}

/// Localized format string with substitution arguments.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TranslatedFSString {
    pub version: u16,
    pub value: Option<String>,
    pub handle: String,
    pub arguments: Vec<TranslatedFSStringArgument>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TranslatedFSStringArgument {
    pub key: String,
    pub string: TranslatedFSString,
    pub value: String,
}

/// A decoded attribute value.
///
/// Vectors and matrices are stored flattened in file order (matrices
/// column by column); the type id determines their shape.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    None,
    Byte(u8),
    Short(i16),
    UShort(u16),
    Int(i32),
    UInt(u32),
    Float(f32),
    Double(f64),
    IVec(Vec<i32>),
    FVec(Vec<f32>),
    Bool(bool),
    String(String),
    ULongLong(u64),
    ScratchBuffer(Vec<u8>),
    Long(i64),
    Int8(i8),
    Uuid([u8; 16]),
    TranslatedString(TranslatedString),
    TranslatedFSString(TranslatedFSString),
}

/// An attribute attached to a resource node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeAttribute {
    pub type_id: TypeId,
    pub value: AttributeValue,
}

impl NodeAttribute {
    #[must_use]
    pub fn new(type_id: TypeId, value: AttributeValue) -> Self {
        NodeAttribute { type_id, value }
    }

    /// Text rendering of the value, matching the form used in XML exports.
    #[must_use]
    pub fn display_value(&self) -> String {
        match &self.value {
            AttributeValue::None => String::new(),
            AttributeValue::Byte(v) => v.to_string(),
            AttributeValue::Short(v) => v.to_string(),
            AttributeValue::UShort(v) => v.to_string(),
            AttributeValue::Int(v) => v.to_string(),
            AttributeValue::UInt(v) => v.to_string(),
            AttributeValue::Float(v) => v.to_string(),
            AttributeValue::Double(v) => v.to_string(),
            AttributeValue::IVec(v) => {
                let parts: Vec<String> = v.iter().map(ToString::to_string).collect();
                parts.join(" ")
            }
            AttributeValue::FVec(v) => {
                let parts: Vec<String> = v.iter().map(ToString::to_string).collect();
                parts.join(" ")
            }
            AttributeValue::Bool(v) => v.to_string(),
            AttributeValue::String(v) => v.clone(),
            AttributeValue::ULongLong(v) => v.to_string(),
            AttributeValue::ScratchBuffer(v) => BASE64.encode(v),
            AttributeValue::Long(v) => v.to_string(),
            AttributeValue::Int8(v) => v.to_string(),
            AttributeValue::Uuid(v) => format_uuid(v),
            AttributeValue::TranslatedString(v) => {
                v.value.clone().unwrap_or_else(|| v.handle.clone())
            }
            AttributeValue::TranslatedFSString(v) => {
                v.value.clone().unwrap_or_else(|| v.handle.clone())
            }
        }
    }
}

/// Formats 16 raw bytes in mixed-endian GUID text form.
#[must_use]
pub fn format_uuid(bytes: &[u8; 16]) -> String {
    format!(
        "{:02x}{:02x}{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
        bytes[3], bytes[2], bytes[1], bytes[0],
        bytes[5], bytes[4],
        bytes[7], bytes[6],
        bytes[8], bytes[9],
        bytes[10], bytes[11], bytes[12], bytes[13], bytes[14], bytes[15],
    )
}

/// A node in the resource tree.
#[derive(Debug, Clone, Default)]
pub struct ResourceNode {
    pub name: String,
    pub parent: Option<usize>,
    pub attributes: IndexMap<String, NodeAttribute>,
    pub children: Vec<usize>,
}

impl ResourceNode {
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&NodeAttribute> {
        self.attributes.get(name)
    }
}

/// A parsed LSF resource.
#[derive(Debug, Clone, Default)]
pub struct Resource {
    /// Format version the file was read with.
    pub version: u32,
    pub engine_version: PackedVersion,
    /// Node arena; `regions` and `children` index into it.
    pub nodes: Vec<ResourceNode>,
    pub regions: Vec<usize>,
}

impl Resource {
    #[must_use]
    pub fn new() -> Self {
        Resource::default()
    }

    /// Appends a top-level region node and returns its arena index.
    pub fn add_region(&mut self, name: &str) -> usize {
        let index = self.nodes.len();
        self.nodes.push(ResourceNode {
            name: name.to_owned(),
            ..ResourceNode::default()
        });
        self.regions.push(index);
        index
    }

    /// Appends a child node under `parent` and returns its arena index.
    pub fn add_child(&mut self, parent: usize, name: &str) -> usize {
        let index = self.nodes.len();
        self.nodes.push(ResourceNode {
            name: name.to_owned(),
            parent: Some(parent),
            ..ResourceNode::default()
        });
        self.nodes[parent].children.push(index);
        index
    }

    pub fn set_attribute(&mut self, node: usize, name: &str, attribute: NodeAttribute) {
        self.nodes[node].attributes.insert(name.to_owned(), attribute);
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn tree_building_wires_parents_and_children() {
        let mut resource = Resource::new();
        let region = resource.add_region("Templates");
        let child = resource.add_child(region, "GameObjects");
        resource.set_attribute(
            child,
            "Name",
            NodeAttribute::new(TYPE_FIXEDSTRING, AttributeValue::String("chest".into())),
        );

        assert_eq!(resource.regions, vec![region]);
        assert_eq!(resource.nodes[region].children, vec![child]);
        assert_eq!(resource.nodes[child].parent, Some(region));
        assert_eq!(
            resource.nodes[child].attribute("Name").unwrap().display_value(),
            "chest"
        );
    }

    #[test]
    fn packed_version_i64_round_trip() {
        let version = PackedVersion {
            major: 4,
            minor: 1,
            revision: 1,
            build: 400,
        };
        assert_eq!(PackedVersion::from_i64(version.to_i64()), version);
        assert!(version.has_translated_string_version());
    }

    #[test]
    fn packed_version_i32_round_trip() {
        let version = PackedVersion {
            major: 3,
            minor: 6,
            revision: 4,
            build: 1234,
        };
        assert_eq!(PackedVersion::from_i32(version.to_i32()), version);
        assert!(!version.has_translated_string_version());
    }

    #[test]
    fn uuid_text_form_swaps_leading_groups() {
        let bytes = [
            0x78, 0x56, 0x34, 0x12, 0xcd, 0xab, 0xf1, 0xde, 0x01, 0x23, 0x45, 0x67, 0x89, 0xab,
            0xcd, 0xef,
        ];
        assert_eq!(format_uuid(&bytes), "12345678-abcd-def1-0123-456789abcdef");
    }
}
