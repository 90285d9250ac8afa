//! Story save reader

use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::Path;

use tracing::debug;

use crate::error::{Error, Result};
use crate::story::adapter::Adapter;
use crate::story::call::Call;
use crate::story::core::{Story, StoryHeader};
use crate::story::cursor::{OsiReader, STRING_SCRAMBLE};
use crate::story::database::Database;
use crate::story::function::{Function, OsirisDivObject};
use crate::story::goal::Goal;
use crate::story::node::Node;
use crate::story::types;
use crate::story::version::{self, VER_EXTERNAL_STRING_TABLE, VER_SCRAMBLE};

/// Reads a story save from a file.
///
/// # Errors
/// Returns an error if the file cannot be read or is not a supported story
/// save.
pub fn read_story<P: AsRef<Path>>(path: P) -> Result<Story> {
    let file = File::open(path)?;
    parse_story(BufReader::new(file))
}

/// Reads a story save from an in-memory buffer.
pub fn parse_story_bytes(data: &[u8]) -> Result<Story> {
    parse_story(Cursor::new(data))
}

/// Reads a story save from any stream.
pub fn parse_story<R: Read>(stream: R) -> Result<Story> {
    let mut reader = OsiReader::new(stream);
    let header = StoryHeader::read(&mut reader)?;
    if !version::is_supported(header.major, header.minor) {
        return Err(Error::UnsupportedStoryVersion {
            major: header.major,
            minor: header.minor,
        });
    }
    reader.major = header.major;
    reader.minor = header.minor;
    if reader.ver() >= VER_SCRAMBLE {
        reader.scramble = STRING_SCRAMBLE;
    }
    debug!(major = header.major, minor = header.minor, "reading story save");

    let mut story = Story {
        header,
        ..Story::default()
    };

    story.types = types::read_type_table(&mut reader)?;
    if reader.ver() >= VER_EXTERNAL_STRING_TABLE {
        story.external_strings = read_string_table(&mut reader)?;
    }
    types::synthesize_builtins(&mut reader, &mut story.types);

    let count = reader.read_u32()?;
    for _ in 0..count {
        story.div_objects.push(OsirisDivObject::read(&mut reader)?);
    }
    debug!(div_objects = story.div_objects.len(), "read div object table");

    let count = reader.read_u32()?;
    for _ in 0..count {
        story.functions.push(Function::read(&mut reader)?);
    }
    debug!(functions = story.functions.len(), "read function table");

    let count = reader.read_u32()?;
    for _ in 0..count {
        let tag = reader.read_u8()?;
        let id = reader.read_u32()?;
        let node = Node::read(&mut reader, tag, id)?;
        story.nodes.insert(id, node);
    }
    debug!(nodes = story.nodes.len(), "read node table");

    let count = reader.read_u32()?;
    for _ in 0..count {
        let id = reader.read_u32()?;
        let mut adapter = Adapter::read(&mut reader)?;
        adapter.index = id;
        story.adapters.insert(id, adapter);
    }

    let count = reader.read_u32()?;
    for _ in 0..count {
        let id = reader.read_u32()?;
        let mut database = Database::read(&mut reader)?;
        database.index = id;
        story.databases.insert(id, database);
    }

    let count = reader.read_u32()?;
    for _ in 0..count {
        let goal = Goal::read(&mut reader)?;
        story.goals.insert(goal.index, goal);
    }
    debug!(
        adapters = story.adapters.len(),
        databases = story.databases.len(),
        goals = story.goals.len(),
        "read adapter/database/goal tables"
    );

    let count = reader.read_u32()?;
    for _ in 0..count {
        story.global_actions.push(Call::read(&mut reader)?);
    }

    story.post_load()?;
    Ok(story)
}

fn read_string_table<R: Read>(reader: &mut OsiReader<R>) -> Result<Vec<String>> {
    let count = reader.read_u32()?;
    let mut strings = Vec::with_capacity(count as usize);
    for _ in 0..count {
        strings.push(reader.read_string()?);
    }
    Ok(strings)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_bytes(major: u8, minor: u8) -> Vec<u8> {
        // Unused byte, version text, major, minor, endian flag, unused,
        // then the fixed version buffer and debug flags newer headers carry.
        let mut data = vec![0u8];
        data.extend_from_slice(b"Osiris save file\0");
        data.extend_from_slice(&[major, minor, 0, 0]);
        data.extend_from_slice(&[0u8; 0x84]);
        data
    }

    #[test]
    fn future_versions_are_rejected() {
        let err = parse_story_bytes(&header_bytes(2, 0)).unwrap_err();
        assert!(matches!(
            err,
            Error::UnsupportedStoryVersion { major: 2, minor: 0 }
        ));
    }

    #[test]
    fn version_1_12_is_rejected() {
        let err = parse_story_bytes(&header_bytes(1, 12)).unwrap_err();
        assert!(matches!(
            err,
            Error::UnsupportedStoryVersion { major: 1, minor: 12 }
        ));
    }
}
