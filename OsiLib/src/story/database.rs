//! Databases and their fact tuples

use std::fmt::Write as _;
use std::io::{Read, Write};

use crate::error::Result;
use crate::story::core::Story;
use crate::story::cursor::{OsiReader, OsiWriter};
use crate::story::function::ParameterList;
use crate::story::value::Value;

/// A single row of a database.
///
/// Unlike adapter tuples, facts carry no logical indices; columns are
/// serialized in physical order only.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Fact {
    pub columns: Vec<Value>,
}

impl Fact {
    pub fn read<R: Read>(reader: &mut OsiReader<R>) -> Result<Self> {
        let count = reader.read_u8()?;
        let mut columns = Vec::with_capacity(usize::from(count));
        for _ in 0..count {
            columns.push(Value::read(reader)?);
        }
        Ok(Self { columns })
    }

    pub fn write<W: Write>(&self, writer: &mut OsiWriter<W>) -> Result<()> {
        writer.write_u8(self.columns.len() as u8)?;
        for column in &self.columns {
            column.write(writer)?;
        }
        Ok(())
    }

    pub fn make_script(&self, out: &mut String, story: &Story) -> Result<()> {
        for (i, column) in self.columns.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            column.make_script(out, story)?;
        }
        Ok(())
    }

    pub fn debug_dump(&self, out: &mut String, story: &Story) {
        out.push('(');
        for (i, column) in self.columns.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            column.debug_dump(out, story);
        }
        out.push(')');
    }
}

/// A fact store owned by at most one database node.
#[derive(Debug, Clone, Default)]
pub struct Database {
    /// Table key; not part of the serialized body.
    pub index: u32,
    pub parameters: ParameterList,
    pub facts: Vec<Fact>,
    /// Stream offset where the fact list started; diagnostic only.
    pub facts_position: u64,
    /// Database node owning this store; set after load.
    pub owner_node: Option<u32>,
}

impl Database {
    pub fn read<R: Read>(reader: &mut OsiReader<R>) -> Result<Self> {
        let parameters = ParameterList::read(reader)?;
        let facts_position = reader.position;
        let count = reader.read_u32()?;
        let mut facts = Vec::with_capacity(count as usize);
        for _ in 0..count {
            facts.push(Fact::read(reader)?);
        }
        Ok(Self {
            index: 0,
            parameters,
            facts,
            facts_position,
            owner_node: None,
        })
    }

    pub fn write<W: Write>(&self, writer: &mut OsiWriter<W>) -> Result<()> {
        self.parameters.write(writer)?;
        writer.write_u32(self.facts.len() as u32)?;
        for fact in &self.facts {
            fact.write(writer)?;
        }
        Ok(())
    }

    pub fn debug_dump(&self, out: &mut String, story: &Story) {
        let _ = write!(out, "{} facts", self.facts.len());
        if let Some(owner) = self.owner_node {
            let _ = write!(out, ", owned by node {owner}");
        }
        out.push('\n');
        for fact in &self.facts {
            out.push_str("    ");
            fact.debug_dump(out, story);
            out.push('\n');
        }
    }
}
