//! Calls in goal init/exit sections and rule action lists

use std::fmt::Write as _;
use std::io::{Read, Write};

use crate::error::Result;
use crate::story::core::Story;
use crate::story::cursor::{OsiReader, OsiWriter};
use crate::story::value::{Tuple, TypedValue, Variable};

/// A call argument: a constant or a rule variable slot.
#[derive(Debug, Clone, PartialEq)]
pub enum CallParam {
    Value(TypedValue),
    Variable(Variable),
}

/// A single call statement.
#[derive(Debug, Clone, Default)]
pub struct Call {
    pub name: String,
    /// List presence is not tracked separately from emptiness: a save
    /// encoding a present-but-empty list reserializes as list absent.
    pub parameters: Vec<CallParam>,
    pub negate: bool,
    /// Goal id for goal-completion calls, or a debug hook id.
    pub goal_id_or_debug_hook: i32,
}

impl Call {
    pub fn read<R: Read>(reader: &mut OsiReader<R>) -> Result<Self> {
        let name = reader.read_string()?;
        let mut parameters = Vec::new();
        let mut negate = false;
        if !name.is_empty() {
            let has_params = reader.read_u8()?;
            if has_params > 0 {
                let count = reader.read_u8()?;
                for _ in 0..count {
                    let tag = reader.read_u8()?;
                    let param = if tag == 1 {
                        CallParam::Variable(Variable::read(reader)?)
                    } else {
                        CallParam::Value(TypedValue::read(reader)?)
                    };
                    parameters.push(param);
                }
            }
            negate = reader.read_bool()?;
        }
        let goal_id_or_debug_hook = reader.read_i32()?;
        Ok(Self { name, parameters, negate, goal_id_or_debug_hook })
    }

    pub fn write<W: Write>(&self, writer: &mut OsiWriter<W>) -> Result<()> {
        writer.write_string(&self.name)?;
        if !self.name.is_empty() {
            // Canonicalizes a present-but-empty list to list absent.
            writer.write_u8(u8::from(!self.parameters.is_empty()))?;
            if !self.parameters.is_empty() {
                writer.write_u8(self.parameters.len() as u8)?;
                for param in &self.parameters {
                    match param {
                        CallParam::Variable(v) => {
                            writer.write_u8(1)?;
                            v.write(writer)?;
                        }
                        CallParam::Value(v) => {
                            writer.write_u8(0)?;
                            v.write(writer)?;
                        }
                    }
                }
            }
            writer.write_bool(self.negate)?;
        }
        writer.write_i32(self.goal_id_or_debug_hook)
    }

    /// Renders the call as a script statement (without the terminator).
    pub fn make_script(
        &self,
        out: &mut String,
        story: &Story,
        tuple: Option<&Tuple>,
    ) -> Result<()> {
        if !self.name.is_empty() {
            if self.negate {
                out.push_str("NOT ");
            }
            let _ = write!(out, "{}(", self.name);
            for (i, param) in self.parameters.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                match param {
                    CallParam::Value(v) => v.make_script(out, story)?,
                    CallParam::Variable(v) => v.make_script(out, story, tuple, false)?,
                }
            }
            out.push(')');
        }

        // A positive hook id marks goal completion, even after a named call.
        if self.goal_id_or_debug_hook > 0 {
            out.push_str("GoalCompleted");
        }
        Ok(())
    }

    pub fn debug_dump(&self, out: &mut String, story: &Story) {
        if self.negate {
            out.push('!');
        }
        let _ = write!(out, "{}(", self.name);
        for (i, param) in self.parameters.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            match param {
                CallParam::Value(v) => v.debug_dump(out, story),
                CallParam::Variable(v) => v.debug_dump(out, story),
            }
        }
        out.push(')');
        if self.goal_id_or_debug_hook != 0 {
            let _ = write!(out, " [goal {}]", self.goal_id_or_debug_hook);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use pretty_assertions::assert_eq;

    use crate::story::value::{Value, ValuePayload};

    use super::*;

    #[test]
    fn call_round_trip() {
        let call = Call {
            name: "DB_IsPlayer".into(),
            parameters: vec![
                CallParam::Value(TypedValue {
                    value: Value {
                        type_id: 4,
                        payload: ValuePayload::String(Some("Ifan".into())),
                    },
                    is_valid: true,
                    ..TypedValue::default()
                }),
                CallParam::Variable(Variable {
                    index: 0,
                    adapted: true,
                    ..Variable::default()
                }),
            ],
            negate: true,
            goal_id_or_debug_hook: 0,
        };

        let mut writer = OsiWriter::new(Vec::new(), 1, 11);
        call.write(&mut writer).unwrap();
        let mut reader = OsiReader::new(Cursor::new(writer.into_inner()));
        reader.major = 1;
        reader.minor = 11;
        let read = Call::read(&mut reader).unwrap();
        assert_eq!(read.name, call.name);
        assert_eq!(read.negate, call.negate);
        assert_eq!(read.parameters.len(), 2);
        assert!(matches!(read.parameters[1], CallParam::Variable(_)));
    }

    #[test]
    fn nameless_call_is_just_the_hook_id() {
        let call = Call {
            goal_id_or_debug_hook: 7,
            ..Call::default()
        };
        let mut writer = OsiWriter::new(Vec::new(), 1, 11);
        call.write(&mut writer).unwrap();
        let buf = writer.into_inner();
        // NUL terminator + i32 hook id.
        assert_eq!(buf.len(), 5);

        let mut reader = OsiReader::new(Cursor::new(buf));
        reader.major = 1;
        reader.minor = 11;
        let read = Call::read(&mut reader).unwrap();
        assert_eq!(read.goal_id_or_debug_hook, 7);
    }

    #[test]
    fn goal_completion_follows_named_calls() {
        let story = Story::default();
        let call = Call {
            name: "ProcQuestDone".into(),
            goal_id_or_debug_hook: 3,
            ..Call::default()
        };
        let mut out = String::new();
        call.make_script(&mut out, &story, None).unwrap();
        assert_eq!(out, "ProcQuestDone()GoalCompleted");

        let bare = Call { goal_id_or_debug_hook: 3, ..Call::default() };
        let mut out = String::new();
        bare.make_script(&mut out, &story, None).unwrap();
        assert_eq!(out, "GoalCompleted");

        let plain = Call { name: "ProcQuestDone".into(), ..Call::default() };
        let mut out = String::new();
        plain.make_script(&mut out, &story, None).unwrap();
        assert_eq!(out, "ProcQuestDone()");
    }

    #[test]
    fn empty_parameter_list_canonicalizes_to_absent() {
        // Name, has-params 1 with count 0, negate, hook id.
        let mut bytes = b"Foo\0".to_vec();
        bytes.extend_from_slice(&[1, 0, 0]);
        bytes.extend_from_slice(&0i32.to_le_bytes());

        let mut reader = OsiReader::new(Cursor::new(bytes));
        reader.major = 1;
        reader.minor = 0;
        let read = Call::read(&mut reader).unwrap();
        assert!(read.parameters.is_empty());

        let mut writer = OsiWriter::new(Vec::new(), 1, 0);
        read.write(&mut writer).unwrap();
        let mut canonical = b"Foo\0".to_vec();
        canonical.extend_from_slice(&[0, 0]);
        canonical.extend_from_slice(&0i32.to_le_bytes());
        assert_eq!(writer.into_inner(), canonical);
    }
}
