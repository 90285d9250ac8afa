//! Runtime values, typed values, rule variables and tuples
//!
//! Values carry the type id they were serialized with plus a payload picked
//! by the alias-resolved builtin type. Saves older than 1.10 use the
//! original four-type scheme (None/Integer/Float/String) and are mapped to
//! the enhanced scheme on read.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::io::{Read, Write};

use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::story::cursor::{OsiReader, OsiWriter};
use crate::story::core::Story;
use crate::story::version::VER_ENHANCED_TYPES;

/// Builtin type ids of the enhanced (1.10+) scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinTypeId {
    None,
    Integer,
    Integer64,
    Real,
    String,
    GuidString,
}

impl BuiltinTypeId {
    #[must_use]
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::None),
            1 => Some(Self::Integer),
            2 => Some(Self::Integer64),
            3 => Some(Self::Real),
            4 => Some(Self::String),
            5 => Some(Self::GuidString),
            _ => None,
        }
    }
}

/// Maps an original-scheme builtin type id to the enhanced scheme.
///
/// The original scheme is None=0, Integer=1, Float=2, String=3; custom ids
/// pass through untouched.
#[must_use]
pub fn os1_to_os2_type(type_id: u32) -> u32 {
    match type_id {
        2 => 3,
        3 => 4,
        other => other,
    }
}

/// Resolves a serialized type id through the alias map.
///
/// Returns the resolved id plus whether the original four-type string
/// carve-out applies (aliased custom type in a pre-1.10 save).
#[must_use]
pub fn resolve_value_type(type_id: u32, aliases: &HashMap<u32, u32>, ver: u32) -> (u32, bool) {
    let mut dos1_alias = false;
    let mut resolved = type_id;
    if let Some(&alias) = aliases.get(&type_id) {
        if ver < VER_ENHANCED_TYPES {
            dos1_alias = true;
        }
        resolved = alias;
    }
    if ver < VER_ENHANCED_TYPES {
        resolved = os1_to_os2_type(resolved);
    }
    (resolved, dos1_alias)
}

/// Typed payload of a serialized value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ValuePayload {
    #[default]
    None,
    Int(i32),
    Int64(i64),
    Float(f32),
    String(Option<String>),
}

/// A plain runtime value.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Value {
    pub type_id: u32,
    pub payload: ValuePayload,
}

impl Value {
    pub fn read<R: Read>(reader: &mut OsiReader<R>) -> Result<Self> {
        match reader.read_u8()? {
            b'1' => {
                let type_id = reader.read_u32()?;
                let payload = ValuePayload::Int(reader.read_i32()?);
                Ok(Self { type_id, payload })
            }
            b'0' => {
                let type_id = reader.read_u32()?;
                let (resolved, dos1_alias) =
                    resolve_value_type(type_id, &reader.type_aliases, reader.ver());
                let payload = match BuiltinTypeId::from_u32(resolved) {
                    Some(BuiltinTypeId::None) => ValuePayload::None,
                    Some(BuiltinTypeId::Integer) => ValuePayload::Int(reader.read_i32()?),
                    Some(BuiltinTypeId::Integer64) => ValuePayload::Int64(reader.read_i64()?),
                    Some(BuiltinTypeId::Real) => ValuePayload::Float(reader.read_f32()?),
                    Some(BuiltinTypeId::String | BuiltinTypeId::GuidString) => {
                        if dos1_alias {
                            // Aliased strings in old saves have no presence flag.
                            ValuePayload::String(Some(reader.read_string()?))
                        } else if reader.read_u8()? > 0 {
                            ValuePayload::String(Some(reader.read_string()?))
                        } else {
                            ValuePayload::String(None)
                        }
                    }
                    None => ValuePayload::String(Some(reader.read_string()?)),
                };
                Ok(Self { type_id, payload })
            }
            tag => Err(Error::UnrecognizedValueType(tag)),
        }
    }

    pub fn write<W: Write>(&self, writer: &mut OsiWriter<W>) -> Result<()> {
        writer.write_u8(b'0')?;
        writer.write_u32(self.type_id)?;
        let (resolved, dos1_alias) =
            resolve_value_type(self.type_id, &writer.type_aliases, writer.ver());
        match BuiltinTypeId::from_u32(resolved) {
            Some(BuiltinTypeId::None) => Ok(()),
            Some(BuiltinTypeId::Integer) => {
                let v = match self.payload {
                    ValuePayload::Int(v) => v,
                    _ => 0,
                };
                writer.write_i32(v)
            }
            Some(BuiltinTypeId::Integer64) => {
                let v = match self.payload {
                    ValuePayload::Int64(v) => v,
                    ValuePayload::Int(v) => i64::from(v),
                    _ => 0,
                };
                if writer.ver() >= VER_ENHANCED_TYPES {
                    writer.write_i64(v)
                } else {
                    writer.write_i32(v as i32)
                }
            }
            Some(BuiltinTypeId::Real) => {
                let v = match self.payload {
                    ValuePayload::Float(v) => v,
                    _ => 0.0,
                };
                writer.write_f32(v)
            }
            Some(BuiltinTypeId::String | BuiltinTypeId::GuidString) => {
                let string = match &self.payload {
                    ValuePayload::String(s) => s.as_deref(),
                    _ => None,
                };
                if !dos1_alias {
                    writer.write_u8(u8::from(string.is_some()))?;
                }
                match string {
                    Some(s) => writer.write_string(s),
                    // No presence flag on the wire, so keep the framing.
                    None if dos1_alias => writer.write_string(""),
                    None => Ok(()),
                }
            }
            None => {
                let string = match &self.payload {
                    ValuePayload::String(Some(s)) => s.as_str(),
                    _ => "",
                };
                writer.write_string(string)
            }
        }
    }

    /// Renders the value as script source text.
    pub fn make_script(&self, out: &mut String, story: &Story) -> Result<()> {
        match BuiltinTypeId::from_u32(story.resolved_builtin(self.type_id)?) {
            Some(BuiltinTypeId::None) | None => Err(Error::ScriptUnknownValue),
            Some(BuiltinTypeId::Integer) => {
                let _ = write!(out, "{}", self.int_value());
                Ok(())
            }
            Some(BuiltinTypeId::Integer64) => {
                // Historical quirk: prints the 32-bit field.
                let _ = write!(out, "{}", self.int_value());
                Ok(())
            }
            Some(BuiltinTypeId::Real) => {
                let _ = write!(out, "{}", self.float_value());
                Ok(())
            }
            Some(BuiltinTypeId::String) => {
                let _ = write!(out, "\"{}\"", self.string_value().unwrap_or(""));
                Ok(())
            }
            Some(BuiltinTypeId::GuidString) => {
                out.push_str(self.string_value().unwrap_or(""));
                Ok(())
            }
        }
    }

    /// Renders the value for diagnostic dumps.
    pub fn debug_dump(&self, out: &mut String, story: &Story) {
        match story
            .resolved_builtin(self.type_id)
            .ok()
            .and_then(BuiltinTypeId::from_u32)
        {
            Some(BuiltinTypeId::None) | None => out.push_str("<unknown>"),
            Some(BuiltinTypeId::Integer) => {
                let _ = write!(out, "{}", self.int_value());
            }
            Some(BuiltinTypeId::Integer64) => {
                let _ = write!(out, "{}", self.int64_value());
            }
            Some(BuiltinTypeId::Real) => {
                let _ = write!(out, "{}", self.float_value());
            }
            Some(BuiltinTypeId::String) => {
                let _ = write!(out, "'{}'", self.string_value().unwrap_or(""));
            }
            Some(BuiltinTypeId::GuidString) => {
                out.push_str(self.string_value().unwrap_or(""));
            }
        }
    }

    #[must_use]
    pub fn int_value(&self) -> i32 {
        match self.payload {
            ValuePayload::Int(v) => v,
            _ => 0,
        }
    }

    #[must_use]
    pub fn int64_value(&self) -> i64 {
        match self.payload {
            ValuePayload::Int64(v) => v,
            ValuePayload::Int(v) => i64::from(v),
            _ => 0,
        }
    }

    #[must_use]
    pub fn float_value(&self) -> f32 {
        match self.payload {
            ValuePayload::Float(v) => v,
            _ => 0.0,
        }
    }

    #[must_use]
    pub fn string_value(&self) -> Option<&str> {
        match &self.payload {
            ValuePayload::String(s) => s.as_deref(),
            _ => None,
        }
    }
}

/// A value with parameter metadata, as used in call argument lists.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TypedValue {
    pub value: Value,
    pub is_valid: bool,
    pub out_param: bool,
    pub is_a_type: bool,
}

impl TypedValue {
    pub fn read<R: Read>(reader: &mut OsiReader<R>) -> Result<Self> {
        let value = Value::read(reader)?;
        let is_valid = reader.read_bool()?;
        let out_param = reader.read_bool()?;
        let is_a_type = reader.read_bool()?;
        Ok(Self { value, is_valid, out_param, is_a_type })
    }

    pub fn write<W: Write>(&self, writer: &mut OsiWriter<W>) -> Result<()> {
        self.value.write(writer)?;
        writer.write_bool(self.is_valid)?;
        writer.write_bool(self.out_param)?;
        writer.write_bool(self.is_a_type)
    }

    pub fn make_script(&self, out: &mut String, story: &Story) -> Result<()> {
        self.value.make_script(out, story)
    }

    pub fn debug_dump(&self, out: &mut String, story: &Story) {
        if self.is_valid {
            self.value.debug_dump(out, story);
        } else {
            let name = story
                .types
                .get(&self.value.type_id)
                .map_or("unknown", |t| t.name.as_str());
            let _ = write!(out, "<{name}>");
        }
    }
}

/// A rule variable slot.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Variable {
    pub value: TypedValue,
    /// Logical column this variable binds in the rule tuple.
    pub index: i8,
    pub unused: bool,
    pub adapted: bool,
    /// Display name assigned after load; not serialized.
    pub variable_name: String,
}

impl Variable {
    pub fn read<R: Read>(reader: &mut OsiReader<R>) -> Result<Self> {
        let value = TypedValue::read(reader)?;
        let index = reader.read_i8()?;
        let unused = reader.read_bool()?;
        let adapted = reader.read_bool()?;
        Ok(Self { value, index, unused, adapted, variable_name: String::new() })
    }

    pub fn write<W: Write>(&self, writer: &mut OsiWriter<W>) -> Result<()> {
        self.value.write(writer)?;
        writer.write_i8(self.index)?;
        writer.write_bool(self.unused)?;
        writer.write_bool(self.adapted)
    }

    pub fn make_script(
        &self,
        out: &mut String,
        story: &Story,
        tuple: Option<&Tuple>,
        print_types: bool,
    ) -> Result<()> {
        if self.unused {
            self.write_type_prefix(out, story, print_types);
            out.push('_');
            Ok(())
        } else if self.adapted {
            if self.variable_name.is_empty() {
                match tuple.and_then(|t| t.logical_item(self.index as u8)) {
                    Some(item) => item.make_script(out, story, None, false),
                    None => Err(Error::LogicalColumnMissing { index: self.index }),
                }
            } else {
                self.write_type_prefix(out, story, print_types);
                out.push_str(&self.variable_name);
                Ok(())
            }
        } else {
            self.value.make_script(out, story)
        }
    }

    fn write_type_prefix(&self, out: &mut String, story: &Story, print_types: bool) {
        if print_types && self.value.value.type_id > 0 {
            if let Some(ty) = story.types.get(&self.value.value.type_id) {
                let _ = write!(out, "({})", ty.name);
            }
        }
    }

    pub fn debug_dump(&self, out: &mut String, story: &Story) {
        let _ = write!(out, "#{}", self.index);
        if !self.variable_name.is_empty() {
            let _ = write!(out, " '{}'", self.variable_name);
        }
        if self.unused {
            out.push_str(" unused");
        }
        if self.adapted {
            out.push_str(" adapted");
        }
        out.push_str(" = ");
        self.value.debug_dump(out, story);
    }
}

/// Either slot of a tuple column: a constant or a rule variable.
#[derive(Debug, Clone, PartialEq)]
pub enum TupleItem {
    Value(Value),
    Variable(Variable),
}

impl TupleItem {
    pub fn make_script(
        &self,
        out: &mut String,
        story: &Story,
        tuple: Option<&Tuple>,
        print_types: bool,
    ) -> Result<()> {
        match self {
            Self::Value(v) => v.make_script(out, story),
            Self::Variable(v) => v.make_script(out, story, tuple, print_types),
        }
    }

    pub fn debug_dump(&self, out: &mut String, story: &Story) {
        match self {
            Self::Value(v) => v.debug_dump(out, story),
            Self::Variable(v) => v.debug_dump(out, story),
        }
    }
}

/// A fact or join tuple: columns in physical order plus a logical view.
///
/// The logical map stores indices into `physical`, so aliased columns stay
/// shared after adapter application.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Tuple {
    pub physical: Vec<TupleItem>,
    pub logical: IndexMap<u8, usize>,
}

impl Tuple {
    pub fn read<R: Read>(reader: &mut OsiReader<R>) -> Result<Self> {
        let mut tuple = Self::default();
        let count = reader.read_u8()?;
        for _ in 0..count {
            let index = reader.read_u8()?;
            let value = Value::read(reader)?;
            tuple.logical.insert(index, tuple.physical.len());
            tuple.physical.push(TupleItem::Value(value));
        }
        Ok(tuple)
    }

    pub fn write<W: Write>(&self, writer: &mut OsiWriter<W>) -> Result<()> {
        writer.write_u8(self.logical.len() as u8)?;
        for (&index, &slot) in &self.logical {
            writer.write_u8(index)?;
            match &self.physical[slot] {
                TupleItem::Value(v) => v.write(writer)?,
                TupleItem::Variable(v) => v.write(writer)?,
            }
        }
        Ok(())
    }

    /// Looks up the item bound to a logical column.
    #[must_use]
    pub fn logical_item(&self, index: u8) -> Option<&TupleItem> {
        self.logical.get(&index).map(|&slot| &self.physical[slot])
    }

    /// Renders the physical columns as a comma-separated argument list.
    pub fn make_script(&self, out: &mut String, story: &Story, print_types: bool) -> Result<()> {
        for (i, item) in self.physical.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            item.make_script(out, story, Some(self), print_types)?;
        }
        Ok(())
    }

    pub fn debug_dump(&self, out: &mut String, story: &Story) {
        out.push('(');
        for (i, (&index, &slot)) in self.logical.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            let _ = write!(out, "{index}: ");
            self.physical[slot].debug_dump(out, story);
        }
        out.push(')');
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use pretty_assertions::assert_eq;

    use super::*;

    fn round_trip(value: &Value, ver_minor: u8) -> Value {
        let mut writer = OsiWriter::new(Vec::new(), 1, ver_minor);
        value.write(&mut writer).unwrap();
        let mut reader = OsiReader::new(Cursor::new(writer.into_inner()));
        reader.major = 1;
        reader.minor = ver_minor;
        Value::read(&mut reader).unwrap()
    }

    #[test]
    fn integer_round_trip() {
        let value = Value { type_id: 1, payload: ValuePayload::Int(-42) };
        assert_eq!(round_trip(&value, 11), value);
    }

    #[test]
    fn integer64_round_trip() {
        let value = Value { type_id: 2, payload: ValuePayload::Int64(1 << 40) };
        assert_eq!(round_trip(&value, 11), value);
    }

    #[test]
    fn string_with_presence_flag() {
        let value = Value {
            type_id: 4,
            payload: ValuePayload::String(Some("Hello".into())),
        };
        assert_eq!(round_trip(&value, 11), value);

        let absent = Value { type_id: 4, payload: ValuePayload::String(None) };
        assert_eq!(round_trip(&absent, 11), absent);
    }

    #[test]
    fn old_format_float_maps_to_real() {
        // Type 2 means FLOAT below 1.10.
        let value = Value { type_id: 2, payload: ValuePayload::Float(1.5) };
        assert_eq!(round_trip(&value, 8), value);
    }

    #[test]
    fn old_format_aliased_string_has_no_flag() {
        let mut writer = OsiWriter::new(Vec::new(), 1, 8);
        writer.type_aliases.insert(100, 3);
        let value = Value {
            type_id: 100,
            payload: ValuePayload::String(Some("Guid".into())),
        };
        value.write(&mut writer).unwrap();
        let buf = writer.into_inner();
        // Tag, type id, then string bytes directly (no presence byte).
        assert_eq!(buf[5], b'G');

        let mut reader = OsiReader::new(Cursor::new(buf));
        reader.major = 1;
        reader.minor = 8;
        reader.type_aliases.insert(100, 3);
        assert_eq!(Value::read(&mut reader).unwrap(), value);
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let mut reader = OsiReader::new(Cursor::new(vec![b'2']));
        assert!(matches!(Value::read(&mut reader), Err(Error::UnrecognizedValueType(0x32))));
    }

    #[test]
    fn tuple_round_trip() {
        let mut tuple = Tuple::default();
        for (i, v) in [3, 7].into_iter().enumerate() {
            tuple.logical.insert(i as u8, tuple.physical.len());
            tuple.physical.push(TupleItem::Value(Value {
                type_id: 1,
                payload: ValuePayload::Int(v),
            }));
        }

        let mut writer = OsiWriter::new(Vec::new(), 1, 11);
        tuple.write(&mut writer).unwrap();
        let mut reader = OsiReader::new(Cursor::new(writer.into_inner()));
        reader.major = 1;
        reader.minor = 11;
        let read = Tuple::read(&mut reader).unwrap();
        assert_eq!(read, tuple);
    }
}
