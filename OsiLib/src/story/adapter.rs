//! Column adapters
//!
//! An adapter rewrites the tuple flowing out of one node into the column
//! layout its consumer expects: each output column is either copied from an
//! input logical column, or filled from the adapter's constant tuple. A
//! second mapping rebuilds the logical view over the produced physical
//! columns.

use std::io::{Read, Write};

use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::story::cursor::{OsiReader, OsiWriter};
use crate::story::value::{Tuple, TupleItem, Variable};

#[derive(Debug, Clone, Default)]
pub struct Adapter {
    /// Table key; not part of the serialized body.
    pub index: u32,
    pub constants: Tuple,
    /// Per output column: input logical column to copy, or -1 for a constant.
    pub logical_indices: Vec<i8>,
    /// Logical column -> physical output slot.
    pub logical_to_physical: IndexMap<u8, u8>,
    /// Join/rel node this adapter belongs to; set after load.
    pub owner_node: Option<u32>,
}

impl Adapter {
    pub fn read<R: Read>(reader: &mut OsiReader<R>) -> Result<Self> {
        let constants = Tuple::read(reader)?;

        let count = reader.read_u8()?;
        let mut logical_indices = Vec::with_capacity(usize::from(count));
        for _ in 0..count {
            logical_indices.push(reader.read_i8()?);
        }

        let count = reader.read_u8()?;
        let mut logical_to_physical = IndexMap::with_capacity(usize::from(count));
        for _ in 0..count {
            let key = reader.read_u8()?;
            let value = reader.read_u8()?;
            logical_to_physical.insert(key, value);
        }

        Ok(Self {
            index: 0,
            constants,
            logical_indices,
            logical_to_physical,
            owner_node: None,
        })
    }

    pub fn write<W: Write>(&self, writer: &mut OsiWriter<W>) -> Result<()> {
        self.constants.write(writer)?;

        writer.write_u8(self.logical_indices.len() as u8)?;
        for &index in &self.logical_indices {
            writer.write_i8(index)?;
        }

        writer.write_u8(self.logical_to_physical.len() as u8)?;
        for (&key, &value) in &self.logical_to_physical {
            writer.write_u8(key)?;
            writer.write_u8(value)?;
        }
        Ok(())
    }

    /// Applies the adapter to an input tuple.
    ///
    /// # Errors
    /// Returns an error if a referenced logical column is missing from the
    /// input. A stored index of 0 is exempt: old compilers used it to pad
    /// columns that have no source, and it yields an unused placeholder.
    pub fn adapt(&self, input: &Tuple) -> Result<Tuple> {
        let mut result = Tuple::default();
        for (position, &index) in self.logical_indices.iter().enumerate() {
            let item = if index == -1 {
                self.constants
                    .logical_item(position as u8)
                    .cloned()
                    .unwrap_or_else(null_item)
            } else if let Some(item) = input.logical_item(index as u8) {
                item.clone()
            } else if index == 0 {
                null_item()
            } else {
                return Err(Error::LogicalColumnMissing { index });
            };
            result.physical.push(item);
        }

        for (&logical, &physical) in &self.logical_to_physical {
            if usize::from(physical) >= result.physical.len() {
                return Err(Error::LogicalColumnMissing { index: physical as i8 });
            }
            result.logical.insert(logical, usize::from(physical));
        }
        Ok(result)
    }
}

fn null_item() -> TupleItem {
    TupleItem::Variable(Variable {
        unused: true,
        ..Variable::default()
    })
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use pretty_assertions::assert_eq;

    use crate::story::value::{Value, ValuePayload};

    use super::*;

    fn int_item(v: i32) -> TupleItem {
        TupleItem::Value(Value { type_id: 1, payload: ValuePayload::Int(v) })
    }

    fn input_tuple(values: &[(u8, i32)]) -> Tuple {
        let mut tuple = Tuple::default();
        for &(index, v) in values {
            tuple.logical.insert(index, tuple.physical.len());
            tuple.physical.push(int_item(v));
        }
        tuple
    }

    #[test]
    fn identity_mapping_preserves_columns() {
        let adapter = Adapter {
            logical_indices: vec![0, 1, 2],
            logical_to_physical: IndexMap::from([(0u8, 0u8), (1, 1), (2, 2)]),
            ..Adapter::default()
        };
        let input = input_tuple(&[(0, 10), (1, 20), (2, 30)]);
        let result = adapter.adapt(&input).unwrap();
        assert_eq!(result.physical, input.physical);
        assert_eq!(result.logical_item(1), Some(&int_item(20)));
    }

    #[test]
    fn constant_columns_come_from_the_adapter() {
        let mut constants = Tuple::default();
        constants.logical.insert(1, 0);
        constants.physical.push(int_item(99));

        let adapter = Adapter {
            constants,
            logical_indices: vec![0, -1],
            logical_to_physical: IndexMap::from([(0u8, 0u8), (1, 1)]),
            ..Adapter::default()
        };
        let input = input_tuple(&[(0, 7)]);
        let result = adapter.adapt(&input).unwrap();
        assert_eq!(result.physical, vec![int_item(7), int_item(99)]);
    }

    #[test]
    fn zero_index_pads_with_unused_variable() {
        let adapter = Adapter {
            logical_indices: vec![0],
            ..Adapter::default()
        };
        let result = adapter.adapt(&Tuple::default()).unwrap();
        match &result.physical[0] {
            TupleItem::Variable(v) => assert!(v.unused),
            TupleItem::Value(_) => panic!("expected placeholder variable"),
        }
    }

    #[test]
    fn missing_nonzero_index_is_an_error() {
        let adapter = Adapter {
            logical_indices: vec![5],
            ..Adapter::default()
        };
        assert!(matches!(
            adapter.adapt(&Tuple::default()),
            Err(Error::LogicalColumnMissing { index: 5 })
        ));
    }

    #[test]
    fn body_round_trip() {
        let mut constants = Tuple::default();
        constants.logical.insert(0, 0);
        constants.physical.push(int_item(4));
        let adapter = Adapter {
            constants,
            logical_indices: vec![-1, 0, 3],
            logical_to_physical: IndexMap::from([(0u8, 1u8), (1, 0)]),
            ..Adapter::default()
        };

        let mut writer = OsiWriter::new(Vec::new(), 1, 11);
        adapter.write(&mut writer).unwrap();
        let mut reader = OsiReader::new(Cursor::new(writer.into_inner()));
        reader.major = 1;
        reader.minor = 11;
        let read = Adapter::read(&mut reader).unwrap();
        assert_eq!(read.logical_indices, adapter.logical_indices);
        assert_eq!(read.logical_to_physical, adapter.logical_to_physical);
        assert_eq!(read.constants, adapter.constants);
    }
}
