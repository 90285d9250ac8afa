//! Story graph nodes
//!
//! The node table is a tag-dispatched union: databases and procs store
//! back-references, joins and rels thread parent/adapter links, and rules
//! carry the action list of a compiled script rule. The set of node kinds
//! is closed, so it is modeled as one enum over per-kind payload structs.

use std::io::{Read, Write};

use crate::error::{Error, Result};
use crate::story::call::Call;
use crate::story::cursor::{OsiReader, OsiWriter};
use crate::story::refs::{AdapterRef, DatabaseRef, GoalRef, NodeEntryItem, NodeRef};
use crate::story::value::{Value, Variable};
use crate::story::version::VER_ADD_QUERY;

/// Comparison operator of a RelOp node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelOpType {
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    Equal,
    NotEqual,
}

impl RelOpType {
    pub fn from_i32(value: i32) -> Result<Self> {
        match value {
            0 => Ok(Self::Less),
            1 => Ok(Self::LessOrEqual),
            2 => Ok(Self::Greater),
            3 => Ok(Self::GreaterOrEqual),
            4 => Ok(Self::Equal),
            5 => Ok(Self::NotEqual),
            other => Err(Error::UnrecognizedRelOp(other)),
        }
    }

    #[must_use]
    pub fn as_i32(self) -> i32 {
        match self {
            Self::Less => 0,
            Self::LessOrEqual => 1,
            Self::Greater => 2,
            Self::GreaterOrEqual => 3,
            Self::Equal => 4,
            Self::NotEqual => 5,
        }
    }

    /// Infix operator as it appears in script text.
    #[must_use]
    pub fn script_operator(self) -> &'static str {
        match self {
            Self::Less => " < ",
            Self::LessOrEqual => " <= ",
            Self::Greater => " > ",
            Self::GreaterOrEqual => " >= ",
            Self::Equal => " == ",
            Self::NotEqual => " != ",
        }
    }
}

/// Payload of database and proc nodes.
#[derive(Debug, Clone, Default)]
pub struct DataNodeData {
    /// Nodes that consume tuples from this one.
    pub referenced_by: Vec<NodeEntryItem>,
}

/// Payload of And/NotAnd join nodes.
#[derive(Debug, Clone, Default)]
pub struct JoinNodeData {
    pub next: NodeEntryItem,
    pub left_parent: NodeRef,
    pub right_parent: NodeRef,
    pub left_adapter: AdapterRef,
    pub right_adapter: AdapterRef,
    pub left_database_node: NodeRef,
    pub left_database_join: NodeEntryItem,
    pub left_database_indirection: u8,
    pub right_database_node: NodeRef,
    pub right_database_join: NodeEntryItem,
    pub right_database_indirection: u8,
}

/// Common payload of RelOp and Rule nodes.
#[derive(Debug, Clone, Default)]
pub struct RelNodeData {
    pub next: NodeEntryItem,
    pub parent: NodeRef,
    pub adapter: AdapterRef,
    pub rel_database_node: NodeRef,
    pub rel_database_join: NodeEntryItem,
    pub rel_database_indirection: u8,
}

/// Payload of RelOp filter nodes.
#[derive(Debug, Clone)]
pub struct RelOpNodeData {
    pub rel: RelNodeData,
    /// Logical column of the left operand, or -1 for the inline value.
    pub left_value_index: i8,
    /// Logical column of the right operand, or -1 for the inline value.
    pub right_value_index: i8,
    pub left_value: Value,
    pub right_value: Value,
    pub op: RelOpType,
}

/// Payload of rule nodes.
#[derive(Debug, Clone, Default)]
pub struct RuleNodeData {
    pub rel: RelNodeData,
    pub calls: Vec<Call>,
    pub variables: Vec<Variable>,
    /// Source line of the rule in its goal script.
    pub line: u32,
    pub is_query: bool,
    /// Goal this rule belongs to; derived after load, not serialized.
    pub derived_goal: GoalRef,
}

/// Per-kind node payload; the discriminant is the on-disk type tag.
#[derive(Debug, Clone)]
pub enum NodeKind {
    Database(DataNodeData),
    Proc(DataNodeData),
    DivQuery,
    And(JoinNodeData),
    NotAnd(JoinNodeData),
    RelOp(RelOpNodeData),
    Rule(RuleNodeData),
    InternalQuery,
    UserQuery,
}

impl NodeKind {
    /// On-disk type tag.
    #[must_use]
    pub fn type_tag(&self) -> u8 {
        match self {
            Self::Database(_) => 1,
            Self::Proc(_) => 2,
            Self::DivQuery => 3,
            Self::And(_) => 4,
            Self::NotAnd(_) => 5,
            Self::RelOp(_) => 6,
            Self::Rule(_) => 7,
            Self::InternalQuery => 8,
            Self::UserQuery => 9,
        }
    }
}

/// One entry of the story node table.
#[derive(Debug, Clone)]
pub struct Node {
    /// Table key; serialized next to the type tag.
    pub index: u32,
    pub database_ref: DatabaseRef,
    pub name: String,
    pub num_params: u8,
    pub kind: NodeKind,
}

impl Node {
    /// Reads a node body after its type tag and id have been consumed.
    pub fn read<R: Read>(reader: &mut OsiReader<R>, type_tag: u8, index: u32) -> Result<Self> {
        let database_ref = DatabaseRef::read(reader)?;
        let name = reader.read_string()?;
        let num_params = if name.is_empty() { 0 } else { reader.read_u8()? };

        let kind = match type_tag {
            1 => NodeKind::Database(read_data_node(reader)?),
            2 => NodeKind::Proc(read_data_node(reader)?),
            3 => NodeKind::DivQuery,
            4 => NodeKind::And(read_join_node(reader)?),
            5 => NodeKind::NotAnd(read_join_node(reader)?),
            6 => NodeKind::RelOp(read_rel_op_node(reader)?),
            7 => NodeKind::Rule(read_rule_node(reader)?),
            8 => NodeKind::InternalQuery,
            9 => NodeKind::UserQuery,
            tag => return Err(Error::UnrecognizedNodeType(tag)),
        };

        Ok(Self { index, database_ref, name, num_params, kind })
    }

    /// Writes the node body; the caller emits the type tag and id.
    pub fn write<W: Write>(&self, writer: &mut OsiWriter<W>) -> Result<()> {
        self.database_ref.write(writer)?;
        writer.write_string(&self.name)?;
        if !self.name.is_empty() {
            writer.write_u8(self.num_params)?;
        }

        match &self.kind {
            NodeKind::Database(data) | NodeKind::Proc(data) => write_data_node(writer, data),
            NodeKind::DivQuery | NodeKind::InternalQuery | NodeKind::UserQuery => Ok(()),
            NodeKind::And(data) | NodeKind::NotAnd(data) => write_join_node(writer, data),
            NodeKind::RelOp(data) => write_rel_op_node(writer, data),
            NodeKind::Rule(data) => write_rule_node(writer, data),
        }
    }

    /// The tuple entry linking this node into its consumer, if it has one.
    #[must_use]
    pub fn next_entry(&self) -> Option<&NodeEntryItem> {
        match &self.kind {
            NodeKind::And(data) | NodeKind::NotAnd(data) => Some(&data.next),
            NodeKind::RelOp(data) => Some(&data.rel.next),
            NodeKind::Rule(data) => Some(&data.rel.next),
            _ => None,
        }
    }
}

fn read_data_node<R: Read>(reader: &mut OsiReader<R>) -> Result<DataNodeData> {
    let count = reader.read_u32()?;
    let mut referenced_by = Vec::with_capacity(count as usize);
    for _ in 0..count {
        referenced_by.push(NodeEntryItem::read(reader)?);
    }
    Ok(DataNodeData { referenced_by })
}

fn write_data_node<W: Write>(writer: &mut OsiWriter<W>, data: &DataNodeData) -> Result<()> {
    writer.write_u32(data.referenced_by.len() as u32)?;
    for entry in &data.referenced_by {
        entry.write(writer)?;
    }
    Ok(())
}

fn read_join_node<R: Read>(reader: &mut OsiReader<R>) -> Result<JoinNodeData> {
    let next = NodeEntryItem::read(reader)?;
    let left_parent = NodeRef::read(reader)?;
    let right_parent = NodeRef::read(reader)?;
    let left_adapter = AdapterRef::read(reader)?;
    let right_adapter = AdapterRef::read(reader)?;
    let left_database_node = NodeRef::read(reader)?;
    let left_database_join = NodeEntryItem::read(reader)?;
    let left_database_indirection = reader.read_u8()?;
    let right_database_node = NodeRef::read(reader)?;
    let right_database_join = NodeEntryItem::read(reader)?;
    let right_database_indirection = reader.read_u8()?;
    Ok(JoinNodeData {
        next,
        left_parent,
        right_parent,
        left_adapter,
        right_adapter,
        left_database_node,
        left_database_join,
        left_database_indirection,
        right_database_node,
        right_database_join,
        right_database_indirection,
    })
}

fn write_join_node<W: Write>(writer: &mut OsiWriter<W>, data: &JoinNodeData) -> Result<()> {
    data.next.write(writer)?;
    data.left_parent.write(writer)?;
    data.right_parent.write(writer)?;
    data.left_adapter.write(writer)?;
    data.right_adapter.write(writer)?;
    data.left_database_node.write(writer)?;
    data.left_database_join.write(writer)?;
    writer.write_u8(data.left_database_indirection)?;
    data.right_database_node.write(writer)?;
    data.right_database_join.write(writer)?;
    writer.write_u8(data.right_database_indirection)
}

fn read_rel_node<R: Read>(reader: &mut OsiReader<R>) -> Result<RelNodeData> {
    let next = NodeEntryItem::read(reader)?;
    let parent = NodeRef::read(reader)?;
    let adapter = AdapterRef::read(reader)?;
    let rel_database_node = NodeRef::read(reader)?;
    let rel_database_join = NodeEntryItem::read(reader)?;
    let rel_database_indirection = reader.read_u8()?;
    Ok(RelNodeData {
        next,
        parent,
        adapter,
        rel_database_node,
        rel_database_join,
        rel_database_indirection,
    })
}

fn write_rel_node<W: Write>(writer: &mut OsiWriter<W>, data: &RelNodeData) -> Result<()> {
    data.next.write(writer)?;
    data.parent.write(writer)?;
    data.adapter.write(writer)?;
    data.rel_database_node.write(writer)?;
    data.rel_database_join.write(writer)?;
    writer.write_u8(data.rel_database_indirection)
}

fn read_rel_op_node<R: Read>(reader: &mut OsiReader<R>) -> Result<RelOpNodeData> {
    let rel = read_rel_node(reader)?;
    let left_value_index = reader.read_i8()?;
    let right_value_index = reader.read_i8()?;
    let left_value = Value::read(reader)?;
    let right_value = Value::read(reader)?;
    let op = RelOpType::from_i32(reader.read_i32()?)?;
    Ok(RelOpNodeData {
        rel,
        left_value_index,
        right_value_index,
        left_value,
        right_value,
        op,
    })
}

fn write_rel_op_node<W: Write>(writer: &mut OsiWriter<W>, data: &RelOpNodeData) -> Result<()> {
    write_rel_node(writer, &data.rel)?;
    writer.write_i8(data.left_value_index)?;
    writer.write_i8(data.right_value_index)?;
    data.left_value.write(writer)?;
    data.right_value.write(writer)?;
    writer.write_i32(data.op.as_i32())
}

fn read_rule_node<R: Read>(reader: &mut OsiReader<R>) -> Result<RuleNodeData> {
    let rel = read_rel_node(reader)?;

    let count = reader.read_u32()?;
    let mut calls = Vec::with_capacity(count as usize);
    for _ in 0..count {
        calls.push(Call::read(reader)?);
    }

    let count = reader.read_u8()?;
    let mut variables: Vec<Variable> = Vec::with_capacity(usize::from(count));
    for _ in 0..count {
        let tag = reader.read_u8()?;
        if tag != 1 {
            return Err(Error::IllegalRuleVariableType(tag));
        }
        let mut variable = Variable::read(reader)?;
        if variable.adapted {
            variable.variable_name = format!("_Var{}", variables.len() + 1);
        }
        variables.push(variable);
    }

    let line = reader.read_u32()?;
    let is_query = if reader.ver() >= VER_ADD_QUERY {
        reader.read_bool()?
    } else {
        false
    };

    Ok(RuleNodeData {
        rel,
        calls,
        variables,
        line,
        is_query,
        derived_goal: GoalRef::NULL,
    })
}

fn write_rule_node<W: Write>(writer: &mut OsiWriter<W>, data: &RuleNodeData) -> Result<()> {
    write_rel_node(writer, &data.rel)?;

    writer.write_u32(data.calls.len() as u32)?;
    for call in &data.calls {
        call.write(writer)?;
    }

    writer.write_u8(data.variables.len() as u8)?;
    for variable in &data.variables {
        writer.write_u8(1)?;
        variable.write(writer)?;
    }

    writer.write_u32(data.line)?;
    if writer.ver() >= VER_ADD_QUERY {
        writer.write_bool(data.is_query)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use pretty_assertions::assert_eq;

    use crate::story::refs::EntryPoint;

    use super::*;

    fn round_trip(node: &Node) -> Node {
        let mut writer = OsiWriter::new(Vec::new(), 1, 11);
        node.write(&mut writer).unwrap();
        let mut reader = OsiReader::new(Cursor::new(writer.into_inner()));
        reader.major = 1;
        reader.minor = 11;
        Node::read(&mut reader, node.kind.type_tag(), node.index).unwrap()
    }

    #[test]
    fn database_node_round_trip() {
        let node = Node {
            index: 3,
            database_ref: DatabaseRef(1),
            name: "DB_IsPlayer".into(),
            num_params: 1,
            kind: NodeKind::Database(DataNodeData {
                referenced_by: vec![NodeEntryItem {
                    node: NodeRef(9),
                    entry_point: EntryPoint::Left,
                    goal: GoalRef(2),
                }],
            }),
        };
        let read = round_trip(&node);
        assert_eq!(read.name, node.name);
        assert_eq!(read.num_params, 1);
        match read.kind {
            NodeKind::Database(data) => {
                assert_eq!(data.referenced_by.len(), 1);
                assert_eq!(data.referenced_by[0].node, NodeRef(9));
                assert_eq!(data.referenced_by[0].entry_point, EntryPoint::Left);
            }
            _ => panic!("expected database node"),
        }
    }

    #[test]
    fn anonymous_node_has_no_param_count() {
        let node = Node {
            index: 5,
            database_ref: DatabaseRef::NULL,
            name: String::new(),
            num_params: 0,
            kind: NodeKind::And(JoinNodeData::default()),
        };
        let mut writer = OsiWriter::new(Vec::new(), 1, 11);
        node.write(&mut writer).unwrap();
        let buf = writer.into_inner();
        // db ref + empty name terminator, then straight into the join body.
        assert_eq!(buf[4], 0);
        let read = round_trip(&node);
        assert_eq!(read.num_params, 0);
    }

    #[test]
    fn rule_variables_get_placeholder_names() {
        let rule = Node {
            index: 11,
            database_ref: DatabaseRef::NULL,
            name: String::new(),
            num_params: 0,
            kind: NodeKind::Rule(RuleNodeData {
                variables: vec![
                    Variable { adapted: true, index: 0, ..Variable::default() },
                    Variable { adapted: false, index: 1, ..Variable::default() },
                    Variable { adapted: true, index: 2, ..Variable::default() },
                ],
                line: 42,
                is_query: true,
                ..RuleNodeData::default()
            }),
        };
        let read = round_trip(&rule);
        match read.kind {
            NodeKind::Rule(data) => {
                assert_eq!(data.variables[0].variable_name, "_Var1");
                assert_eq!(data.variables[1].variable_name, "");
                assert_eq!(data.variables[2].variable_name, "_Var3");
                assert_eq!(data.line, 42);
                assert!(data.is_query);
            }
            _ => panic!("expected rule node"),
        }
    }

    #[test]
    fn bad_rule_variable_tag_is_fatal() {
        // Rel body for an empty rule, then a variable tagged 2.
        let mut writer = OsiWriter::new(Vec::new(), 1, 11);
        write_rel_node(&mut writer, &RelNodeData::default()).unwrap();
        writer.write_u32(0).unwrap(); // no calls
        writer.write_u8(1).unwrap(); // one variable
        writer.write_u8(2).unwrap(); // bad tag
        let mut reader = OsiReader::new(Cursor::new(writer.into_inner()));
        reader.major = 1;
        reader.minor = 11;
        assert!(matches!(
            read_rule_node(&mut reader),
            Err(Error::IllegalRuleVariableType(2))
        ));
    }

    #[test]
    fn unknown_node_tag_is_fatal() {
        let mut writer = OsiWriter::new(Vec::new(), 1, 11);
        DatabaseRef::NULL.write(&mut writer).unwrap();
        writer.write_string("").unwrap();
        let mut reader = OsiReader::new(Cursor::new(writer.into_inner()));
        reader.major = 1;
        reader.minor = 11;
        assert!(matches!(
            Node::read(&mut reader, 10, 1),
            Err(Error::UnrecognizedNodeType(10))
        ));
    }

    #[test]
    fn rel_op_round_trip() {
        let node = Node {
            index: 8,
            database_ref: DatabaseRef::NULL,
            name: String::new(),
            num_params: 0,
            kind: NodeKind::RelOp(RelOpNodeData {
                rel: RelNodeData {
                    parent: NodeRef(3),
                    adapter: AdapterRef(2),
                    ..RelNodeData::default()
                },
                left_value_index: 0,
                right_value_index: -1,
                left_value: Value::default(),
                right_value: Value {
                    type_id: 1,
                    payload: crate::story::value::ValuePayload::Int(5),
                },
                op: RelOpType::GreaterOrEqual,
            }),
        };
        let read = round_trip(&node);
        match read.kind {
            NodeKind::RelOp(data) => {
                assert_eq!(data.op, RelOpType::GreaterOrEqual);
                assert_eq!(data.left_value_index, 0);
                assert_eq!(data.right_value_index, -1);
                assert_eq!(data.rel.parent, NodeRef(3));
            }
            _ => panic!("expected relop node"),
        }
    }
}
