//! Custom type table and builtin type synthesis
//!
//! The serialized table only carries custom types; builtins are implied by
//! the format version and inserted after load. Custom types may alias
//! another type, and alias chains are flattened into the cursor's alias map
//! so value deserialization can resolve them in one lookup.

use std::io::{Read, Write};

use indexmap::IndexMap;
use tracing::debug;

use crate::error::{Error, Result};
use crate::story::cursor::{OsiReader, OsiWriter};
use crate::story::version::{VER_ADD_TYPE_MAP, VER_ENHANCED_TYPES, VER_TYPE_ALIASES};

/// An entry of the story type table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OsirisType {
    pub name: String,
    /// Type id; doubles as the table key.
    pub index: u8,
    /// Type id this one aliases, 0 for none.
    pub alias: u8,
    /// Synthesized builtin types are never serialized back.
    pub is_builtin: bool,
}

impl OsirisType {
    #[must_use]
    pub fn make_builtin(index: u8, name: &str) -> Self {
        Self {
            name: name.to_owned(),
            index,
            alias: 0,
            is_builtin: true,
        }
    }

    pub fn read<R: Read>(reader: &mut OsiReader<R>) -> Result<Self> {
        let name = reader.read_string()?;
        let index = reader.read_u8()?;
        let alias = if reader.ver() >= VER_TYPE_ALIASES {
            reader.read_u8()?
        } else {
            // Custom types implicitly alias the original-scheme string type.
            3
        };
        Ok(Self { name, index, alias, is_builtin: false })
    }

    pub fn write<W: Write>(&self, writer: &mut OsiWriter<W>) -> Result<()> {
        writer.write_string(&self.name)?;
        writer.write_u8(self.index)?;
        if writer.ver() >= VER_TYPE_ALIASES {
            writer.write_u8(self.alias)?;
        }
        Ok(())
    }
}

/// Reads the custom type table and flattens alias chains into the cursor.
pub fn read_type_table<R: Read>(
    reader: &mut OsiReader<R>,
) -> Result<IndexMap<u32, OsirisType>> {
    let mut types = IndexMap::new();
    if reader.ver() < VER_ADD_TYPE_MAP {
        return Ok(types);
    }

    let count = reader.read_u32()?;
    for _ in 0..count {
        let ty = OsirisType::read(reader)?;
        types.insert(u32::from(ty.index), ty);
    }
    debug!(types = types.len(), "read custom type table");

    for ty in types.values() {
        if ty.alias == 0 {
            continue;
        }
        let mut alias_id = u32::from(ty.alias);
        let mut steps = 0usize;
        while alias_id != 0
            && types.get(&alias_id).is_some_and(|t| t.alias != 0)
        {
            alias_id = u32::from(types[&alias_id].alias);
            steps += 1;
            if steps > types.len() {
                return Err(Error::TypeAliasCycle { type_id: u32::from(ty.index) });
            }
        }
        reader.type_aliases.insert(u32::from(ty.index), alias_id);
    }
    Ok(types)
}

/// Writes the custom (non-builtin) types and registers their aliases on the
/// cursor for value serialization.
pub fn write_type_table<W: Write>(
    writer: &mut OsiWriter<W>,
    types: &IndexMap<u32, OsirisType>,
) -> Result<()> {
    if writer.ver() < VER_ADD_TYPE_MAP {
        return Ok(());
    }

    let customs: Vec<&OsirisType> = types.values().filter(|t| !t.is_builtin).collect();
    writer.write_u32(customs.len() as u32)?;
    for ty in customs {
        ty.write(writer)?;
        if ty.alias != 0 {
            let resolved = find_builtin_type_id(types, u32::from(ty.index))?;
            writer.type_aliases.insert(u32::from(ty.index), resolved);
        }
    }
    Ok(())
}

/// Walks a type's alias chain down to the builtin it bottoms out at.
pub fn find_builtin_type_id(types: &IndexMap<u32, OsirisType>, type_id: u32) -> Result<u32> {
    let mut alias_id = type_id;
    let mut steps = 0usize;
    while type_id != 0 && types.get(&alias_id).is_some_and(|t| t.alias != 0) {
        alias_id = u32::from(types[&alias_id].alias);
        steps += 1;
        if steps > types.len() {
            return Err(Error::TypeAliasCycle { type_id });
        }
    }
    Ok(alias_id)
}

/// Inserts the builtin types implied by the format version.
///
/// Runs after the custom type table (and external strings) have been read.
pub fn synthesize_builtins<R: Read>(
    reader: &mut OsiReader<R>,
    types: &mut IndexMap<u32, OsirisType>,
) {
    types.insert(0, OsirisType::make_builtin(0, "UNKNOWN"));
    types.insert(1, OsirisType::make_builtin(1, "INTEGER"));
    if reader.ver() >= VER_ENHANCED_TYPES {
        types.insert(2, OsirisType::make_builtin(2, "INTEGER64"));
        types.insert(3, OsirisType::make_builtin(3, "REAL"));
        types.insert(4, OsirisType::make_builtin(4, "STRING"));
        // BG3 saves declare GUIDSTRING in the custom table themselves.
        if !types.contains_key(&5) {
            types.insert(5, OsirisType::make_builtin(5, "GUIDSTRING"));
        }
    } else {
        types.insert(2, OsirisType::make_builtin(2, "FLOAT"));
        types.insert(3, OsirisType::make_builtin(3, "STRING"));
        if reader.ver() < VER_ADD_TYPE_MAP {
            // Old saves have fixed guid-string types 4..17 aliasing STRING.
            for index in 4u8..=17 {
                let mut ty = OsirisType::make_builtin(index, &format!("TYPE{index}"));
                ty.alias = 3;
                types.insert(u32::from(index), ty);
                reader.type_aliases.insert(u32::from(index), 3);
            }
        }
    }
}
