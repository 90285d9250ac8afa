//! Function table, signatures and DIV engine objects

use std::fmt::Write as _;
use std::io::{Read, Write};

use crate::error::{Error, Result};
use crate::story::core::Story;
use crate::story::cursor::{OsiReader, OsiWriter};
use crate::story::refs::NodeRef;

/// What kind of callable a function table entry describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionType {
    Event,
    Query,
    Call,
    Database,
    Proc,
    SysQuery,
    SysCall,
    UserQuery,
}

impl FunctionType {
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            1 => Ok(Self::Event),
            2 => Ok(Self::Query),
            3 => Ok(Self::Call),
            4 => Ok(Self::Database),
            5 => Ok(Self::Proc),
            6 => Ok(Self::SysQuery),
            7 => Ok(Self::SysCall),
            8 => Ok(Self::UserQuery),
            other => Err(Error::UnrecognizedFunctionType(other)),
        }
    }

    #[must_use]
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Event => 1,
            Self::Query => 2,
            Self::Call => 3,
            Self::Database => 4,
            Self::Proc => 5,
            Self::SysQuery => 6,
            Self::SysCall => 7,
            Self::UserQuery => 8,
        }
    }
}

/// Parameter type ids, prefixed by a byte count on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParameterList {
    pub types: Vec<u32>,
}

impl ParameterList {
    pub fn read<R: Read>(reader: &mut OsiReader<R>) -> Result<Self> {
        let count = reader.read_u8()?;
        let mut types = Vec::with_capacity(usize::from(count));
        for _ in 0..count {
            types.push(reader.read_u32()?);
        }
        Ok(Self { types })
    }

    pub fn write<W: Write>(&self, writer: &mut OsiWriter<W>) -> Result<()> {
        writer.write_u8(self.types.len() as u8)?;
        for &ty in &self.types {
            writer.write_u32(ty)?;
        }
        Ok(())
    }
}

/// Function name plus its out-parameter mask and parameter types.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FunctionSignature {
    pub name: String,
    /// Bitmask bytes flagging which parameters are outputs.
    pub out_param_mask: Vec<u8>,
    pub parameters: ParameterList,
}

impl FunctionSignature {
    pub fn read<R: Read>(reader: &mut OsiReader<R>) -> Result<Self> {
        let name = reader.read_string()?;
        let count = reader.read_u32()?;
        let mut out_param_mask = Vec::with_capacity(count as usize);
        for _ in 0..count {
            out_param_mask.push(reader.read_u8()?);
        }
        let parameters = ParameterList::read(reader)?;
        Ok(Self { name, out_param_mask, parameters })
    }

    pub fn write<W: Write>(&self, writer: &mut OsiWriter<W>) -> Result<()> {
        writer.write_string(&self.name)?;
        writer.write_u32(self.out_param_mask.len() as u32)?;
        for &mask in &self.out_param_mask {
            writer.write_u8(mask)?;
        }
        self.parameters.write(writer)
    }
}

/// An entry of the story function table.
#[derive(Debug, Clone)]
pub struct Function {
    pub line: u32,
    pub condition_references: u32,
    pub action_references: u32,
    pub node_ref: NodeRef,
    pub function_type: FunctionType,
    /// Engine-side metadata; opaque to the save format.
    pub meta1: u32,
    pub meta2: u32,
    pub meta3: u32,
    pub meta4: u32,
    pub signature: FunctionSignature,
}

impl Function {
    pub fn read<R: Read>(reader: &mut OsiReader<R>) -> Result<Self> {
        let line = reader.read_u32()?;
        let condition_references = reader.read_u32()?;
        let action_references = reader.read_u32()?;
        let node_ref = NodeRef::read(reader)?;
        let function_type = FunctionType::from_u8(reader.read_u8()?)?;
        let meta1 = reader.read_u32()?;
        let meta2 = reader.read_u32()?;
        let meta3 = reader.read_u32()?;
        let meta4 = reader.read_u32()?;
        let signature = FunctionSignature::read(reader)?;
        Ok(Self {
            line,
            condition_references,
            action_references,
            node_ref,
            function_type,
            meta1,
            meta2,
            meta3,
            meta4,
            signature,
        })
    }

    pub fn write<W: Write>(&self, writer: &mut OsiWriter<W>) -> Result<()> {
        writer.write_u32(self.line)?;
        writer.write_u32(self.condition_references)?;
        writer.write_u32(self.action_references)?;
        self.node_ref.write(writer)?;
        writer.write_u8(self.function_type.as_u8())?;
        writer.write_u32(self.meta1)?;
        writer.write_u32(self.meta2)?;
        writer.write_u32(self.meta3)?;
        writer.write_u32(self.meta4)?;
        self.signature.write(writer)
    }

    pub fn debug_dump(&self, out: &mut String, story: &Story) {
        let _ = write!(out, "{:?} {}(", self.function_type, self.signature.name);
        for (i, &ty) in self.signature.parameters.types.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            match story.types.get(&ty) {
                Some(t) => out.push_str(&t.name),
                None => {
                    let _ = write!(out, "type#{ty}");
                }
            }
        }
        let _ = write!(out, ") @ {}:{}", self.node_ref.0, self.line);
    }
}

/// An engine object entry from the DIV side of the story.
#[derive(Debug, Clone, Default)]
pub struct OsirisDivObject {
    pub name: String,
    pub object_type: u8,
    pub key1: u32,
    pub key2: u32,
    pub key3: u32,
    pub key4: u32,
}

impl OsirisDivObject {
    pub fn read<R: Read>(reader: &mut OsiReader<R>) -> Result<Self> {
        let name = reader.read_string()?;
        let object_type = reader.read_u8()?;
        let key1 = reader.read_u32()?;
        let key2 = reader.read_u32()?;
        let key3 = reader.read_u32()?;
        let key4 = reader.read_u32()?;
        Ok(Self { name, object_type, key1, key2, key3, key4 })
    }

    pub fn write<W: Write>(&self, writer: &mut OsiWriter<W>) -> Result<()> {
        writer.write_string(&self.name)?;
        writer.write_u8(self.object_type)?;
        writer.write_u32(self.key1)?;
        writer.write_u32(self.key2)?;
        writer.write_u32(self.key3)?;
        writer.write_u32(self.key4)
    }
}
