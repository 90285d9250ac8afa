//! Story save writer

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::debug;

use crate::error::{Error, Result};
use crate::story::core::{DEBUG_FLAGS, HEADER_TEXT_NEW, HEADER_TEXT_OLD, Story};
use crate::story::cursor::{OsiWriter, STRING_SCRAMBLE};
use crate::story::types;
use crate::story::version::{
    self, VER_ADD_TYPE_MAP, VER_EXTERNAL_STRING_TABLE, VER_SCRAMBLE,
};

/// Writes a story save to a file.
///
/// # Errors
/// Returns an error if the story's version is unsupported or the file
/// cannot be written.
pub fn save_story<P: AsRef<Path>>(story: &mut Story, path: P) -> Result<()> {
    let file = File::create(path)?;
    write_story(story, BufWriter::new(file))
}

/// Serializes a story save into a byte buffer.
pub fn story_to_vec(story: &mut Story) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    write_story(story, &mut buf)?;
    Ok(buf)
}

/// Writes a story save to any stream.
///
/// Takes the story mutably: node names are rewritten to their on-disk form
/// for the duration of the write and restored afterwards.
pub fn write_story<W: Write>(story: &mut Story, stream: W) -> Result<()> {
    if !version::is_supported(story.header.major, story.header.minor) {
        return Err(Error::UnsupportedStoryVersion {
            major: story.header.major,
            minor: story.header.minor,
        });
    }

    story.pre_save()?;
    let result = write_story_inner(story, stream);
    result.and(story.post_save())
}

fn write_story_inner<W: Write>(story: &mut Story, stream: W) -> Result<()> {
    let mut writer = OsiWriter::new(stream, story.header.major, story.header.minor);
    debug!(
        major = story.header.major,
        minor = story.header.minor,
        "writing story save"
    );

    story.header.version = if writer.ver() >= VER_EXTERNAL_STRING_TABLE {
        HEADER_TEXT_NEW.to_owned()
    } else {
        HEADER_TEXT_OLD.to_owned()
    };
    story.header.debug_flags = DEBUG_FLAGS;
    story.header.write(&mut writer)?;

    if writer.ver() >= VER_SCRAMBLE {
        writer.scramble = STRING_SCRAMBLE;
    }

    // Register alias resolutions up front; saves older than the type table
    // still carry implicitly aliased guid-string types.
    for ty in story.types.values() {
        if ty.alias != 0 {
            let resolved = types::find_builtin_type_id(&story.types, u32::from(ty.index))?;
            writer.type_aliases.insert(u32::from(ty.index), resolved);
        }
    }

    if writer.ver() >= VER_ADD_TYPE_MAP {
        types::write_type_table(&mut writer, &story.types)?;
    }
    if writer.ver() >= VER_EXTERNAL_STRING_TABLE {
        writer.write_u32(story.external_strings.len() as u32)?;
        for string in &story.external_strings {
            writer.write_string(string)?;
        }
    }

    writer.write_u32(story.div_objects.len() as u32)?;
    for object in &story.div_objects {
        object.write(&mut writer)?;
    }

    writer.write_u32(story.functions.len() as u32)?;
    for function in &story.functions {
        function.write(&mut writer)?;
    }

    writer.write_u32(story.nodes.len() as u32)?;
    for (&id, node) in &story.nodes {
        writer.write_u8(node.kind.type_tag())?;
        writer.write_u32(id)?;
        node.write(&mut writer)?;
    }

    writer.write_u32(story.adapters.len() as u32)?;
    for (&id, adapter) in &story.adapters {
        writer.write_u32(id)?;
        adapter.write(&mut writer)?;
    }

    writer.write_u32(story.databases.len() as u32)?;
    for (&id, database) in &story.databases {
        writer.write_u32(id)?;
        database.write(&mut writer)?;
    }

    writer.write_u32(story.goals.len() as u32)?;
    for goal in story.goals.values() {
        goal.write(&mut writer)?;
    }

    writer.write_u32(story.global_actions.len() as u32)?;
    for call in &story.global_actions {
        call.write(&mut writer)?;
    }

    debug!(
        nodes = story.nodes.len(),
        goals = story.goals.len(),
        "story save written"
    );
    Ok(())
}
