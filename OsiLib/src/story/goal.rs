//! Goals

use std::fmt::Write as _;
use std::io::{Read, Write};

use crate::error::Result;
use crate::story::call::Call;
use crate::story::core::Story;
use crate::story::cursor::{OsiReader, OsiWriter};
use crate::story::refs::GoalRef;
use crate::story::version::VER_ADD_INIT_EXIT_CALLS;

/// A goal: a named group of rules with init/exit call sections.
///
/// Unlike the other tables, a goal serializes its own id as the first field
/// of its body.
#[derive(Debug, Clone, Default)]
pub struct Goal {
    pub index: u32,
    pub name: String,
    pub sub_goal_combination: u8,
    pub parent_goals: Vec<GoalRef>,
    pub sub_goals: Vec<GoalRef>,
    pub flags: u8,
    pub init_calls: Vec<Call>,
    pub exit_calls: Vec<Call>,
}

impl Goal {
    pub fn read<R: Read>(reader: &mut OsiReader<R>) -> Result<Self> {
        let index = reader.read_u32()?;
        let name = reader.read_string()?;
        let sub_goal_combination = reader.read_u8()?;
        let parent_goals = read_goal_refs(reader)?;
        let sub_goals = read_goal_refs(reader)?;
        let flags = reader.read_u8()?;

        let mut init_calls = Vec::new();
        let mut exit_calls = Vec::new();
        if reader.ver() >= VER_ADD_INIT_EXIT_CALLS {
            init_calls = read_calls(reader)?;
            exit_calls = read_calls(reader)?;
        }

        Ok(Self {
            index,
            name,
            sub_goal_combination,
            parent_goals,
            sub_goals,
            flags,
            init_calls,
            exit_calls,
        })
    }

    pub fn write<W: Write>(&self, writer: &mut OsiWriter<W>) -> Result<()> {
        writer.write_u32(self.index)?;
        writer.write_string(&self.name)?;
        writer.write_u8(self.sub_goal_combination)?;
        write_goal_refs(writer, &self.parent_goals)?;
        write_goal_refs(writer, &self.sub_goals)?;
        writer.write_u8(self.flags)?;

        if writer.ver() >= VER_ADD_INIT_EXIT_CALLS {
            write_calls(writer, &self.init_calls)?;
            write_calls(writer, &self.exit_calls)?;
        }
        Ok(())
    }

    pub fn debug_dump(&self, out: &mut String, story: &Story) {
        let _ = writeln!(
            out,
            "{}: '{}' (combiner {}, flags {:#04x})",
            self.index, self.name, self.sub_goal_combination, self.flags
        );
        if !self.parent_goals.is_empty() {
            out.push_str("    parents:");
            for parent in &self.parent_goals {
                let _ = write!(out, " {}", parent.0);
            }
            out.push('\n');
        }
        for (label, calls) in [("init", &self.init_calls), ("exit", &self.exit_calls)] {
            for call in calls {
                let _ = write!(out, "    {label}: ");
                call.debug_dump(out, story);
                out.push('\n');
            }
        }
    }
}

fn read_goal_refs<R: Read>(reader: &mut OsiReader<R>) -> Result<Vec<GoalRef>> {
    let count = reader.read_u32()?;
    let mut refs = Vec::with_capacity(count as usize);
    for _ in 0..count {
        refs.push(GoalRef::read(reader)?);
    }
    Ok(refs)
}

fn write_goal_refs<W: Write>(writer: &mut OsiWriter<W>, refs: &[GoalRef]) -> Result<()> {
    writer.write_u32(refs.len() as u32)?;
    for goal_ref in refs {
        goal_ref.write(writer)?;
    }
    Ok(())
}

fn read_calls<R: Read>(reader: &mut OsiReader<R>) -> Result<Vec<Call>> {
    let count = reader.read_u32()?;
    let mut calls = Vec::with_capacity(count as usize);
    for _ in 0..count {
        calls.push(Call::read(reader)?);
    }
    Ok(calls)
}

fn write_calls<W: Write>(writer: &mut OsiWriter<W>, calls: &[Call]) -> Result<()> {
    writer.write_u32(calls.len() as u32)?;
    for call in calls {
        call.write(writer)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn goal_round_trip() {
        let goal = Goal {
            index: 4,
            name: "GLO_Hirelings".into(),
            sub_goal_combination: 1,
            parent_goals: vec![GoalRef(1)],
            sub_goals: vec![GoalRef(7), GoalRef(9)],
            flags: 2,
            init_calls: vec![Call {
                name: "DB_Origins".into(),
                ..Call::default()
            }],
            exit_calls: Vec::new(),
        };

        let mut writer = OsiWriter::new(Vec::new(), 1, 11);
        goal.write(&mut writer).unwrap();
        let mut reader = OsiReader::new(Cursor::new(writer.into_inner()));
        reader.major = 1;
        reader.minor = 11;
        let read = Goal::read(&mut reader).unwrap();
        assert_eq!(read.index, 4);
        assert_eq!(read.name, goal.name);
        assert_eq!(read.parent_goals, goal.parent_goals);
        assert_eq!(read.sub_goals, goal.sub_goals);
        assert_eq!(read.init_calls.len(), 1);
    }

    #[test]
    fn pre_call_versions_skip_call_sections() {
        let goal = Goal {
            index: 2,
            name: "Old".into(),
            init_calls: vec![Call { name: "ShouldNotSerialize".into(), ..Call::default() }],
            ..Goal::default()
        };
        let mut writer = OsiWriter::new(Vec::new(), 1, 0);
        goal.write(&mut writer).unwrap();
        let mut reader = OsiReader::new(Cursor::new(writer.into_inner()));
        reader.major = 1;
        reader.minor = 0;
        let read = Goal::read(&mut reader).unwrap();
        assert!(read.init_calls.is_empty());
    }
}
