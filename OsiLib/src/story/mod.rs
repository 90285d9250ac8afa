//! Osiris story save format (.osi)
//!
//! Compiled story databases as shipped with Divinity: Original Sin and
//! Baldur's Gate 3: the node graph of the rule engine, its adapters,
//! databases and goals, plus script text reconstruction.

pub mod adapter;
pub mod call;
pub mod core;
pub mod cursor;
pub mod database;
pub mod function;
pub mod goal;
pub mod node;
pub mod reader;
pub mod refs;
pub mod script;
pub mod types;
pub mod value;
pub mod version;
pub mod writer;

pub use self::core::{Story, StoryHeader};
pub use self::reader::{parse_story, parse_story_bytes, read_story};
pub use self::script::RuleType;
pub use self::writer::{save_story, story_to_vec, write_story};
