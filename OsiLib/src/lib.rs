//! # OsiLib
//!
//! A pure-Rust library for working with Osiris story saves and Larian
//! Studios resource files.
//!
//! ## Supported Formats
//!
//! - **Story saves** - Compiled Osiris rule databases (versions 1.0-1.11),
//!   including script text reconstruction per goal
//! - **LSF** - Binary serialized resource documents
//!
//! ## Quick Start
//!
//! ### Reading a Story Save
//!
//! ```no_run
//! use osilib::story::read_story;
//!
//! let story = read_story("story.div.osi")?;
//! for (id, goal) in &story.goals {
//!     println!("goal {id}: {}", goal.name);
//! }
//!
//! // Reconstruct the script text of a goal
//! let script = story.goal_script(1)?;
//! # Ok::<(), osilib::Error>(())
//! ```
//!
//! ### Reading an LSF Resource
//!
//! ```no_run
//! use osilib::formats::lsf::read_lsf;
//!
//! let resource = read_lsf("meta.lsf")?;
//! for &region in &resource.regions {
//!     println!("region: {}", resource.nodes[region].name);
//! }
//! # Ok::<(), osilib::Error>(())
//! ```

pub mod compression;
pub mod error;
pub mod formats;
pub mod story;

// Re-exports for convenience
pub use error::{Error, Result};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::compression::{CompressionLevel, CompressionMethod};
    pub use crate::error::{Error, Result};
    pub use crate::formats::lsf::{
        AttributeValue, NodeAttribute, Resource, ResourceNode, WriteOptions, lsf_to_vec,
        parse_lsf_bytes, read_lsf, write_lsf,
    };
    pub use crate::story::{
        Story, StoryHeader, parse_story_bytes, read_story, save_story, story_to_vec,
    };
}

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
