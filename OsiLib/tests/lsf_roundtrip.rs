use pretty_assertions::assert_eq;
use tempfile::tempdir;

use osilib::compression::{CompressionLevel, CompressionMethod};
use osilib::formats::lsf::document::{
    TYPE_BOOL, TYPE_FIXEDSTRING, TYPE_GUID, TYPE_INT8, TYPE_INT32, TYPE_INT64, TYPE_MAT3X3,
    TYPE_SCRATCHBUFFER, TYPE_TRANSLATEDFSSTRING, TYPE_TRANSLATEDSTRING, TYPE_UINT16, TYPE_UINT64,
    TYPE_FLOAT,
};
use osilib::formats::lsf::{
    AttributeValue, NodeAttribute, PackedVersion, Resource, TranslatedFSString,
    TranslatedFSStringArgument, TranslatedString, WriteOptions, lsf_to_vec, parse_lsf_bytes,
    read_lsf, write_lsf,
};

fn attr(type_id: u32, value: AttributeValue) -> NodeAttribute {
    NodeAttribute::new(type_id, value)
}

/// Two regions with a nested child and most of the attribute zoo. The
/// translated string takes the inline-value form for pre-BG3 targets and
/// the numeric-version form otherwise.
fn fixture(engine_version: PackedVersion, numeric_translations: bool) -> Resource {
    let translated = if numeric_translations {
        TranslatedString {
            version: 1,
            value: None,
            handle: "h0abc1234".into(),
        }
    } else {
        TranslatedString {
            version: 0,
            value: Some("Longsword".into()),
            handle: "h0abc1234".into(),
        }
    };

    let mut resource = Resource::new();
    resource.engine_version = engine_version;

    let templates = resource.add_region("Templates");
    let object = resource.add_child(templates, "GameObjects");
    resource.set_attribute(
        object,
        "Name",
        attr(TYPE_FIXEDSTRING, AttributeValue::String("WPN_Longsword".into())),
    );
    resource.set_attribute(object, "Level", attr(TYPE_INT32, AttributeValue::Int(9)));
    resource.set_attribute(object, "Weight", attr(TYPE_FLOAT, AttributeValue::Float(1.5)));
    resource.set_attribute(object, "Stackable", attr(TYPE_BOOL, AttributeValue::Bool(false)));
    resource.set_attribute(
        object,
        "MapKey",
        attr(
            TYPE_GUID,
            AttributeValue::Uuid([
                0x78, 0x56, 0x34, 0x12, 0xcd, 0xab, 0xf1, 0xde, 0x01, 0x23, 0x45, 0x67, 0x89,
                0xab, 0xcd, 0xef,
            ]),
        ),
    );
    resource.set_attribute(
        object,
        "DisplayName",
        attr(TYPE_TRANSLATEDSTRING, AttributeValue::TranslatedString(translated)),
    );
    resource.set_attribute(
        object,
        "Data",
        attr(TYPE_SCRATCHBUFFER, AttributeValue::ScratchBuffer(vec![1, 2, 3, 4])),
    );
    resource.set_attribute(
        object,
        "Rotate",
        attr(
            TYPE_MAT3X3,
            AttributeValue::FVec(vec![1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]),
        ),
    );
    resource.set_attribute(
        object,
        "Handle",
        attr(TYPE_UINT64, AttributeValue::ULongLong(0xdead_beef_0000_0001)),
    );
    resource.set_attribute(object, "Seed", attr(TYPE_INT64, AttributeValue::Long(-5)));
    resource.set_attribute(object, "Priority", attr(TYPE_INT8, AttributeValue::Int8(-2)));

    let stats = resource.add_child(object, "Stats");
    resource.set_attribute(stats, "Slot", attr(TYPE_UINT16, AttributeValue::UShort(3)));

    let metadata = resource.add_region("Metadata");
    resource.set_attribute(metadata, "Slot", attr(TYPE_UINT16, AttributeValue::UShort(1)));

    resource
}

fn assert_node_eq(left: &Resource, left_index: usize, right: &Resource, right_index: usize) {
    let left_node = &left.nodes[left_index];
    let right_node = &right.nodes[right_index];
    assert_eq!(left_node.name, right_node.name);
    assert!(left_node.attributes.keys().eq(right_node.attributes.keys()));
    assert_eq!(left_node.attributes, right_node.attributes);
    assert_eq!(left_node.children.len(), right_node.children.len());
    for (&left_child, &right_child) in left_node.children.iter().zip(&right_node.children) {
        assert_node_eq(left, left_child, right, right_child);
    }
}

fn assert_tree_eq(left: &Resource, right: &Resource) {
    assert_eq!(left.regions.len(), right.regions.len());
    for (&left_region, &right_region) in left.regions.iter().zip(&right.regions) {
        assert_node_eq(left, left_region, right, right_region);
    }
}

#[test]
fn v6_lz4_round_trip() {
    let engine = PackedVersion {
        major: 4,
        minor: 1,
        revision: 1,
        build: 500,
    };
    let mut resource = fixture(engine, true);

    // A format string with a nested substitution argument.
    resource.set_attribute(
        resource.regions[0],
        "Description",
        attr(
            TYPE_TRANSLATEDFSSTRING,
            AttributeValue::TranslatedFSString(TranslatedFSString {
                version: 1,
                value: None,
                handle: "hfs001".into(),
                arguments: vec![TranslatedFSStringArgument {
                    key: "Item".into(),
                    string: TranslatedFSString {
                        version: 1,
                        value: None,
                        handle: "hfs002".into(),
                        arguments: Vec::new(),
                    },
                    value: "Sword".into(),
                }],
            }),
        ),
    );

    let data = lsf_to_vec(&resource, &WriteOptions::default()).unwrap();
    let parsed = parse_lsf_bytes(&data).unwrap();
    assert_eq!(parsed.version, 6);
    assert_eq!(parsed.engine_version, engine);
    assert_tree_eq(&resource, &parsed);
}

#[test]
fn v3_extended_records_round_trip() {
    let engine = PackedVersion {
        major: 3,
        minor: 6,
        revision: 4,
        build: 100,
    };
    let resource = fixture(engine, false);
    let options = WriteOptions {
        version: 3,
        compression: CompressionMethod::None,
        level: CompressionLevel::Default,
        sibling_data: true,
    };

    let data = lsf_to_vec(&resource, &options).unwrap();
    let parsed = parse_lsf_bytes(&data).unwrap();
    assert_eq!(parsed.version, 3);
    assert_eq!(parsed.engine_version, engine);
    assert_tree_eq(&resource, &parsed);
}

#[test]
fn v2_zlib_round_trip() {
    let engine = PackedVersion {
        major: 3,
        minor: 0,
        revision: 0,
        build: 0,
    };
    let resource = fixture(engine, false);
    let options = WriteOptions {
        version: 2,
        compression: CompressionMethod::Zlib,
        level: CompressionLevel::Max,
        sibling_data: false,
    };

    let data = lsf_to_vec(&resource, &options).unwrap();
    let parsed = parse_lsf_bytes(&data).unwrap();
    assert_tree_eq(&resource, &parsed);
}

#[test]
fn extended_and_compact_records_coexist_per_flag() {
    let engine = PackedVersion {
        major: 3,
        minor: 6,
        revision: 4,
        build: 100,
    };
    // From version 4 on translated strings always take the numeric form.
    let resource = fixture(engine, true);

    // Same version, opposite sibling flags; the reader must dispatch on the
    // header flag, not the version.
    for sibling_data in [false, true] {
        let options = WriteOptions {
            version: 4,
            compression: CompressionMethod::Lz4,
            level: CompressionLevel::Fast,
            sibling_data,
        };
        let data = lsf_to_vec(&resource, &options).unwrap();
        let parsed = parse_lsf_bytes(&data).unwrap();
        assert_tree_eq(&resource, &parsed);
    }
}

#[test]
fn file_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("meta.lsf");
    let engine = PackedVersion {
        major: 4,
        minor: 0,
        revision: 0,
        build: 0x1a,
    };
    let resource = fixture(engine, true);

    write_lsf(&resource, &path, &WriteOptions::default()).unwrap();
    let parsed = read_lsf(&path).unwrap();
    assert_tree_eq(&resource, &parsed);
}
