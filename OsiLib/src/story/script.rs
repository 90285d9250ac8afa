//! Goal script emission
//!
//! Reconstructs script source text from the compiled node graph. A rule's
//! condition chain is walked from its root data node down through
//! joins and filters, threading tuples through the adapters the compiler
//! attached along the way.

use std::fmt::Write as _;

use crate::error::{Error, Result};
use crate::story::call::Call;
use crate::story::core::Story;
use crate::story::node::{Node, NodeKind, RelOpNodeData, RuleNodeData};
use crate::story::refs::NodeRef;
use crate::story::value::{Tuple, TupleItem};

/// How a rule appears in script source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleType {
    /// `IF` rule fed by a database root.
    Rule,
    /// `PROC` definition fed by a proc root.
    Proc,
    /// `QRY` definition fed by a proc root flagged as a query.
    Query,
}

/// Walks parent links up to the root node of a rule's condition chain.
pub fn get_root<'a>(story: &'a Story, node: &'a Node) -> Result<&'a Node> {
    let mut current = node;
    loop {
        let parent = match &current.kind {
            NodeKind::RelOp(data) => data.rel.parent,
            NodeKind::Rule(data) => data.rel.parent,
            NodeKind::And(data) | NodeKind::NotAnd(data) => data.left_parent,
            _ => NodeRef::NULL,
        };
        if parent.is_valid() {
            current = story.node(parent)?;
        } else {
            return Ok(current);
        }
    }
}

/// Classifies a rule by the shape of its condition chain root.
pub fn classify_rule(story: &Story, node: &Node, data: &RuleNodeData) -> Result<RuleType> {
    let root = get_root(story, node)?;
    match &root.kind {
        NodeKind::Database(_) => Ok(RuleType::Rule),
        NodeKind::Proc(_) => {
            if data.is_query {
                Ok(RuleType::Query)
            } else {
                Ok(RuleType::Proc)
            }
        }
        _ => Err(Error::UnclassifiableRule { node: root.index }),
    }
}

/// Emits the full script text of one goal.
pub fn make_goal_script(story: &Story, goal_index: u32) -> Result<String> {
    let goal = story
        .goals
        .get(&goal_index)
        .ok_or(Error::DanglingGoalRef(goal_index))?;

    let mut out = String::new();
    out.push_str("Version 1\n");
    out.push_str("SubGoalCombiner SGC_AND\n");
    out.push('\n');

    out.push_str("INITSECTION\n");
    make_call_section(story, &goal.init_calls, &mut out)?;
    out.push('\n');

    out.push_str("KBSECTION\n");
    for node in story.nodes.values() {
        if let NodeKind::Rule(data) = &node.kind {
            if data.derived_goal.is_valid() && data.derived_goal.0 == goal_index {
                make_rule_script(story, node, data, &mut out)?;
                out.push('\n');
            }
        }
    }
    out.push('\n');

    out.push_str("EXITSECTION\n");
    make_call_section(story, &goal.exit_calls, &mut out)?;
    out.push_str("ENDEXITSECTION\n");
    out.push('\n');

    for parent in &goal.parent_goals {
        let parent_goal = story.goal(*parent)?;
        let _ = writeln!(out, "ParentTargetEdge \"{}\"", parent_goal.name);
    }
    Ok(out)
}

fn make_call_section(story: &Story, calls: &[Call], out: &mut String) -> Result<()> {
    for call in calls {
        call.make_script(out, story, None)?;
        out.push_str(";\n");
    }
    Ok(())
}

/// Emits one rule (`IF`/`PROC`/`QRY` block) of a goal's knowledge base.
pub fn make_rule_script(
    story: &Story,
    node: &Node,
    data: &RuleNodeData,
    out: &mut String,
) -> Result<()> {
    let rule_type = classify_rule(story, node, data)?;
    out.push_str(match rule_type {
        RuleType::Proc => "PROC\n",
        RuleType::Query => "QRY\n",
        RuleType::Rule => "IF\n",
    });

    let mut tuple = make_initial_tuple(data);
    if data.rel.adapter.is_valid() {
        tuple = story.adapter(data.rel.adapter)?.adapt(&tuple)?;
    }
    let print_types = rule_type != RuleType::Rule;

    let parent = story.node(data.rel.parent)?;
    make_node_script(story, parent, &tuple, print_types, out)?;

    out.push_str("THEN\n");
    for call in &data.calls {
        call.make_script(out, story, Some(&tuple))?;
        out.push_str(";\n");
    }
    Ok(())
}

/// Binds each rule variable to its tuple position.
fn make_initial_tuple(data: &RuleNodeData) -> Tuple {
    let mut tuple = Tuple::default();
    for (position, variable) in data.variables.iter().enumerate() {
        tuple.logical.insert(position as u8, tuple.physical.len());
        tuple.physical.push(TupleItem::Variable(variable.clone()));
    }
    tuple
}

fn make_node_script(
    story: &Story,
    node: &Node,
    tuple: &Tuple,
    print_types: bool,
    out: &mut String,
) -> Result<()> {
    match &node.kind {
        NodeKind::Database(_) => make_fact_line(story, node, tuple, print_types, out),
        NodeKind::Proc(_) => make_fact_line(story, node, tuple, true, out),
        NodeKind::DivQuery | NodeKind::InternalQuery | NodeKind::UserQuery => {
            make_fact_line(story, node, tuple, print_types, out)
        }
        NodeKind::And(data) | NodeKind::NotAnd(data) => {
            let left_tuple = story.adapter(data.left_adapter)?.adapt(tuple)?;
            let left_parent = story.node(data.left_parent)?;
            make_node_script(story, left_parent, &left_tuple, print_types, out)?;

            out.push_str(if matches!(node.kind, NodeKind::And(_)) {
                "AND\n"
            } else {
                "AND NOT\n"
            });

            let right_tuple = story.adapter(data.right_adapter)?.adapt(tuple)?;
            let right_parent = story.node(data.right_parent)?;
            make_node_script(story, right_parent, &right_tuple, false, out)
        }
        NodeKind::RelOp(data) => make_rel_op_script(story, data, tuple, print_types, out),
        NodeKind::Rule(_) => {
            // Rules terminate chains; they never appear as parents.
            Err(Error::UnclassifiableRule { node: node.index })
        }
    }
}

fn make_fact_line(
    story: &Story,
    node: &Node,
    tuple: &Tuple,
    print_types: bool,
    out: &mut String,
) -> Result<()> {
    let _ = write!(out, "{}(", node.name);
    tuple.make_script(out, story, print_types)?;
    out.push_str(")\n");
    Ok(())
}

fn make_rel_op_script(
    story: &Story,
    data: &RelOpNodeData,
    tuple: &Tuple,
    print_types: bool,
    out: &mut String,
) -> Result<()> {
    let adapted = story.adapter(data.rel.adapter)?.adapt(tuple)?;
    let parent = story.node(data.rel.parent)?;
    make_node_script(story, parent, &adapted, print_types, out)?;
    out.push_str("AND\n");

    make_rel_op_operand(story, data.left_value_index, &data.left_value, &adapted, out)?;
    out.push_str(data.op.script_operator());
    make_rel_op_operand(story, data.right_value_index, &data.right_value, &adapted, out)?;
    out.push('\n');
    Ok(())
}

fn make_rel_op_operand(
    story: &Story,
    value_index: i8,
    inline_value: &crate::story::value::Value,
    adapted: &Tuple,
    out: &mut String,
) -> Result<()> {
    if value_index == -1 {
        inline_value.make_script(out, story)
    } else {
        match adapted.logical_item(value_index as u8) {
            Some(item) => item.make_script(out, story, Some(adapted), false),
            None => Err(Error::LogicalColumnMissing { index: value_index }),
        }
    }
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;
    use pretty_assertions::assert_eq;

    use crate::story::adapter::Adapter;
    use crate::story::call::{Call, CallParam};
    use crate::story::database::Database;
    use crate::story::function::ParameterList;
    use crate::story::goal::Goal;
    use crate::story::node::{DataNodeData, RelNodeData};
    use crate::story::refs::{AdapterRef, DatabaseRef, EntryPoint, GoalRef, NodeEntryItem};
    use crate::story::types::OsirisType;
    use crate::story::value::{TypedValue, Value, ValuePayload, Variable};

    use super::*;

    fn builtin_types() -> IndexMap<u32, OsirisType> {
        let mut types = IndexMap::new();
        types.insert(0, OsirisType::make_builtin(0, "UNKNOWN"));
        types.insert(1, OsirisType::make_builtin(1, "INTEGER"));
        types.insert(2, OsirisType::make_builtin(2, "INTEGER64"));
        types.insert(3, OsirisType::make_builtin(3, "REAL"));
        types.insert(4, OsirisType::make_builtin(4, "STRING"));
        types.insert(5, OsirisType::make_builtin(5, "GUIDSTRING"));
        types
    }

    fn rule_variable(name: &str, type_id: u32, index: i8) -> Variable {
        Variable {
            value: TypedValue {
                value: Value { type_id, ..Value::default() },
                ..TypedValue::default()
            },
            index,
            unused: false,
            adapted: true,
            variable_name: name.into(),
        }
    }

    fn identity_adapter(index: u32, columns: u8) -> Adapter {
        Adapter {
            index,
            logical_indices: (0..columns).map(|i| i as i8).collect(),
            logical_to_physical: (0..columns).map(|i| (i, i)).collect(),
            ..Adapter::default()
        }
    }

    fn fixture() -> Story {
        let mut story = Story::default();
        story.header.major = 1;
        story.header.minor = 11;
        story.types = builtin_types();

        story.databases.insert(
            1,
            Database {
                index: 1,
                parameters: ParameterList { types: vec![5] },
                owner_node: Some(10),
                ..Database::default()
            },
        );
        story.adapters.insert(1, identity_adapter(1, 1));

        story.nodes.insert(
            10,
            Node {
                index: 10,
                database_ref: DatabaseRef(1),
                name: "DB_Test".into(),
                num_params: 1,
                kind: NodeKind::Database(DataNodeData {
                    referenced_by: vec![NodeEntryItem {
                        node: NodeRef(20),
                        entry_point: EntryPoint::None,
                        goal: GoalRef(1),
                    }],
                }),
            },
        );

        story.nodes.insert(
            20,
            Node {
                index: 20,
                database_ref: DatabaseRef::NULL,
                name: String::new(),
                num_params: 0,
                kind: NodeKind::Rule(RuleNodeData {
                    rel: RelNodeData {
                        parent: NodeRef(10),
                        adapter: AdapterRef(1),
                        ..RelNodeData::default()
                    },
                    calls: vec![Call {
                        name: "DB_Marked".into(),
                        parameters: vec![CallParam::Variable(rule_variable("_Var1", 5, 0))],
                        ..Call::default()
                    }],
                    variables: vec![rule_variable("_Var1", 5, 0)],
                    line: 3,
                    is_query: false,
                    derived_goal: GoalRef(1),
                }),
            },
        );

        story.goals.insert(
            1,
            Goal {
                index: 1,
                name: "TestGoal".into(),
                ..Goal::default()
            },
        );
        story
    }

    #[test]
    fn database_rooted_rule_classifies_as_rule() {
        let story = fixture();
        let node = &story.nodes[&20];
        match &node.kind {
            NodeKind::Rule(data) => {
                assert_eq!(classify_rule(&story, node, data).unwrap(), RuleType::Rule);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn proc_rooted_rule_classifies_by_query_flag() {
        let mut story = fixture();
        let node = story.nodes.get_mut(&10).unwrap();
        node.kind = NodeKind::Proc(DataNodeData::default());
        node.name = "PROC_Test".into();

        let node = &story.nodes[&20];
        match &node.kind {
            NodeKind::Rule(data) => {
                assert_eq!(classify_rule(&story, node, data).unwrap(), RuleType::Proc);
                let mut query_data = data.clone();
                query_data.is_query = true;
                assert_eq!(
                    classify_rule(&story, node, &query_data).unwrap(),
                    RuleType::Query
                );
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn goal_script_golden() {
        let story = fixture();
        let script = story.goal_script(1).unwrap();
        let expected = "\
Version 1
SubGoalCombiner SGC_AND

INITSECTION

KBSECTION
IF
DB_Test(_Var1)
THEN
DB_Marked(_Var1);


EXITSECTION
ENDEXITSECTION

";
        assert_eq!(script, expected);
    }

    #[test]
    fn parent_goals_emit_target_edges() {
        let mut story = fixture();
        story.goals.insert(
            2,
            Goal { index: 2, name: "ChildGoal".into(), parent_goals: vec![GoalRef(1)], ..Goal::default() },
        );
        let script = story.goal_script(2).unwrap();
        assert!(script.ends_with("ParentTargetEdge \"TestGoal\"\n"));
    }
}
