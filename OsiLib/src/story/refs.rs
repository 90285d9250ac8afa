//! Typed references between story entities
//!
//! Entities reference each other by 32-bit id, with 0 meaning "no target".
//! References resolve against the [`Story`](crate::story::Story) tables;
//! a nonzero id with no table entry is a referential integrity error.

use std::io::{Read, Write};

use crate::error::{Error, Result};
use crate::story::cursor::{OsiReader, OsiWriter};

macro_rules! entity_ref {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
        pub struct $name(pub u32);

        impl $name {
            /// The null reference.
            pub const NULL: Self = Self(0);

            #[must_use]
            pub fn is_null(self) -> bool {
                self.0 == 0
            }

            #[must_use]
            pub fn is_valid(self) -> bool {
                self.0 != 0
            }

            pub fn read<R: Read>(reader: &mut OsiReader<R>) -> Result<Self> {
                Ok(Self(reader.read_u32()?))
            }

            pub fn write<W: Write>(self, writer: &mut OsiWriter<W>) -> Result<()> {
                writer.write_u32(self.0)
            }
        }
    };
}

entity_ref!(
    /// Reference into the node table.
    NodeRef
);
entity_ref!(
    /// Reference into the adapter table.
    AdapterRef
);
entity_ref!(
    /// Reference into the database table.
    DatabaseRef
);
entity_ref!(
    /// Reference into the goal table.
    GoalRef
);

/// Which input of a join a back-edge enters through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EntryPoint {
    #[default]
    None,
    Left,
    Right,
}

impl EntryPoint {
    pub fn from_u32(value: u32) -> Result<Self> {
        match value {
            0 => Ok(Self::None),
            1 => Ok(Self::Left),
            2 => Ok(Self::Right),
            other => Err(Error::UnrecognizedEntryPoint(other)),
        }
    }

    #[must_use]
    pub fn as_u32(self) -> u32 {
        match self {
            Self::None => 0,
            Self::Left => 1,
            Self::Right => 2,
        }
    }
}

/// A back-edge entry in a node's reference list.
#[derive(Debug, Clone, Default)]
pub struct NodeEntryItem {
    pub node: NodeRef,
    pub entry_point: EntryPoint,
    pub goal: GoalRef,
}

impl NodeEntryItem {
    pub fn read<R: Read>(reader: &mut OsiReader<R>) -> Result<Self> {
        let node = NodeRef::read(reader)?;
        let entry_point = EntryPoint::from_u32(reader.read_u32()?)?;
        let goal = GoalRef::read(reader)?;
        Ok(Self { node, entry_point, goal })
    }

    pub fn write<W: Write>(&self, writer: &mut OsiWriter<W>) -> Result<()> {
        self.node.write(writer)?;
        writer.write_u32(self.entry_point.as_u32())?;
        self.goal.write(writer)
    }
}
