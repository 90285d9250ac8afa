//! The story aggregate
//!
//! A [`Story`] holds the id-keyed entity tables of a compiled story save
//! plus the header it was loaded with. Cross-table wiring (adapter and
//! database ownership, derived goal back-references, query name postfix
//! stripping) runs as a post-load pass over the whole aggregate, since the
//! serialized form only stores forward references.

use std::fmt::Write as _;
use std::io::{Read, Write};

use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::story::adapter::Adapter;
use crate::story::call::Call;
use crate::story::cursor::{OsiReader, OsiWriter};
use crate::story::database::Database;
use crate::story::function::{Function, OsirisDivObject};
use crate::story::goal::Goal;
use crate::story::node::{Node, NodeKind};
use crate::story::refs::{AdapterRef, DatabaseRef, GoalRef, NodeRef};
use crate::story::types::{self, OsirisType};
use crate::story::value::os1_to_os2_type;
use crate::story::version::{
    self, VER_ADD_DEBUG_FLAGS, VER_ADD_VERSION_STRING, VER_ENHANCED_TYPES,
};

/// Name postfix marking a query definition node in the save.
pub const QUERY_POSTFIX: &str = "__DEF__";

/// Debug flags written by the compiler on every save.
pub const DEBUG_FLAGS: u32 = 0x000C10A0;

/// Header version text used from format 1.11 on.
pub const HEADER_TEXT_NEW: &str = "Osiris save file dd. 03/30/17 07:28:20. Version 1.8.";

/// Header version text used below format 1.11.
pub const HEADER_TEXT_OLD: &str = "Osiris save file dd. 02/10/15 12:44:13. Version 1.5.";

/// Story save header.
#[derive(Debug, Clone, Default)]
pub struct StoryHeader {
    /// Free-form version text.
    pub version: String,
    pub major: u8,
    pub minor: u8,
    pub big_endian: bool,
    pub unused: u8,
    pub debug_flags: u32,
}

impl StoryHeader {
    /// Reads the header. The cursor's version and scramble are not set up
    /// yet at this point, so gates use the just-read bytes.
    pub fn read<R: Read>(reader: &mut OsiReader<R>) -> Result<Self> {
        reader.read_u8()?;
        let version = reader.read_string()?;
        let major = reader.read_u8()?;
        let minor = reader.read_u8()?;
        let big_endian = reader.read_bool()?;
        let unused = reader.read_u8()?;

        let ver = version::pack(major, minor);
        if ver >= VER_ADD_VERSION_STRING {
            // Fixed-size printable copy of the version; ignored on read.
            reader.read_bytes(0x80)?;
        }
        let debug_flags = if ver >= VER_ADD_DEBUG_FLAGS {
            reader.read_u32()?
        } else {
            0
        };

        Ok(Self { version, major, minor, big_endian, unused, debug_flags })
    }

    pub fn write<W: Write>(&self, writer: &mut OsiWriter<W>) -> Result<()> {
        writer.write_u8(0)?;
        writer.write_string(&self.version)?;
        writer.write_u8(self.major)?;
        writer.write_u8(self.minor)?;
        writer.write_bool(self.big_endian)?;
        writer.write_u8(self.unused)?;

        let ver = version::pack(self.major, self.minor);
        if ver >= VER_ADD_VERSION_STRING {
            let mut buf = [0u8; 0x80];
            let text = format!("{}.{}", self.major, self.minor);
            buf[..text.len()].copy_from_slice(text.as_bytes());
            writer.write_bytes(&buf)?;
        }
        if ver >= VER_ADD_DEBUG_FLAGS {
            writer.write_u32(self.debug_flags)?;
        }
        Ok(())
    }
}

/// A fully loaded story database.
#[derive(Debug, Clone, Default)]
pub struct Story {
    pub header: StoryHeader,
    pub types: IndexMap<u32, OsirisType>,
    pub div_objects: Vec<OsirisDivObject>,
    pub functions: Vec<Function>,
    pub nodes: IndexMap<u32, Node>,
    pub adapters: IndexMap<u32, Adapter>,
    pub databases: IndexMap<u32, Database>,
    pub goals: IndexMap<u32, Goal>,
    pub global_actions: Vec<Call>,
    /// Shared string table; only present from format 1.11 on.
    pub external_strings: Vec<String>,
}

impl Story {
    /// Packed format version of the loaded save.
    #[must_use]
    pub fn ver(&self) -> u32 {
        version::pack(self.header.major, self.header.minor)
    }

    pub fn node(&self, node_ref: NodeRef) -> Result<&Node> {
        self.nodes
            .get(&node_ref.0)
            .ok_or(Error::DanglingNodeRef(node_ref.0))
    }

    pub fn adapter(&self, adapter_ref: AdapterRef) -> Result<&Adapter> {
        self.adapters
            .get(&adapter_ref.0)
            .ok_or(Error::DanglingAdapterRef(adapter_ref.0))
    }

    pub fn database(&self, database_ref: DatabaseRef) -> Result<&Database> {
        self.databases
            .get(&database_ref.0)
            .ok_or(Error::DanglingDatabaseRef(database_ref.0))
    }

    pub fn goal(&self, goal_ref: GoalRef) -> Result<&Goal> {
        self.goals
            .get(&goal_ref.0)
            .ok_or(Error::DanglingGoalRef(goal_ref.0))
    }

    /// Resolves a type id down to its builtin, mapping the original
    /// four-type scheme to the enhanced one for old saves.
    pub fn resolved_builtin(&self, type_id: u32) -> Result<u32> {
        let resolved = types::find_builtin_type_id(&self.types, type_id)?;
        if self.ver() < VER_ENHANCED_TYPES {
            Ok(os1_to_os2_type(resolved))
        } else {
            Ok(resolved)
        }
    }

    /// Wires up cross-table state after all tables have been read.
    ///
    /// # Errors
    /// Returns an error if an adapter or database is claimed by two nodes,
    /// or a reference dangles.
    pub fn post_load(&mut self) -> Result<()> {
        for root in self.query_rule_roots()? {
            if let Some(node) = self.nodes.get_mut(&root) {
                strip_query_postfix(&mut node.name);
            }
        }

        let mut database_owners: Vec<(u32, u32)> = Vec::new();
        let mut adapter_owners: Vec<(u32, u32)> = Vec::new();
        let mut derived_goals: Vec<(u32, GoalRef)> = Vec::new();

        for (&id, node) in &self.nodes {
            if node.database_ref.is_valid() {
                database_owners.push((node.database_ref.0, id));
            }
            match &node.kind {
                NodeKind::Database(data) | NodeKind::Proc(data) => {
                    for entry in &data.referenced_by {
                        if entry.node.is_valid() && entry.goal.is_valid() {
                            let target = self.node(entry.node)?;
                            if matches!(target.kind, NodeKind::Rule(_)) {
                                derived_goals.push((entry.node.0, entry.goal));
                            }
                        }
                    }
                }
                NodeKind::And(data) | NodeKind::NotAnd(data) => {
                    for adapter in [data.left_adapter, data.right_adapter] {
                        if adapter.is_valid() {
                            adapter_owners.push((adapter.0, id));
                        }
                    }
                    self.collect_derived_goal(&data.next, &mut derived_goals)?;
                }
                NodeKind::RelOp(data) => {
                    if data.rel.adapter.is_valid() {
                        adapter_owners.push((data.rel.adapter.0, id));
                    }
                    self.collect_derived_goal(&data.rel.next, &mut derived_goals)?;
                }
                NodeKind::Rule(data) => {
                    if data.rel.adapter.is_valid() {
                        adapter_owners.push((data.rel.adapter.0, id));
                    }
                    self.collect_derived_goal(&data.rel.next, &mut derived_goals)?;
                }
                NodeKind::DivQuery | NodeKind::InternalQuery | NodeKind::UserQuery => {}
            }
        }

        for (database, node_id) in database_owners {
            let entry = self
                .databases
                .get_mut(&database)
                .ok_or(Error::DanglingDatabaseRef(database))?;
            if entry.owner_node.is_some() {
                return Err(Error::DatabaseAlreadyOwned { database });
            }
            entry.owner_node = Some(node_id);
        }

        for (adapter, node_id) in adapter_owners {
            let entry = self
                .adapters
                .get_mut(&adapter)
                .ok_or(Error::DanglingAdapterRef(adapter))?;
            if entry.owner_node.is_some() {
                return Err(Error::AdapterAlreadyOwned { adapter });
            }
            entry.owner_node = Some(node_id);
        }

        for (node_id, goal) in derived_goals {
            if !self.goals.contains_key(&goal.0) {
                return Err(Error::DanglingGoalRef(goal.0));
            }
            if let Some(node) = self.nodes.get_mut(&node_id) {
                if let NodeKind::Rule(data) = &mut node.kind {
                    data.derived_goal = goal;
                }
            }
        }
        Ok(())
    }

    fn collect_derived_goal(
        &self,
        next: &crate::story::refs::NodeEntryItem,
        derived_goals: &mut Vec<(u32, GoalRef)>,
    ) -> Result<()> {
        if next.node.is_valid() && next.goal.is_valid() {
            let target = self.node(next.node)?;
            if matches!(target.kind, NodeKind::Rule(_)) {
                derived_goals.push((next.node.0, next.goal));
            }
        }
        Ok(())
    }

    /// Root nodes of all query rules. These carry the query definition
    /// postfix on disk but not in memory.
    fn query_rule_roots(&self) -> Result<Vec<u32>> {
        let mut roots = Vec::new();
        for node in self.nodes.values() {
            if let NodeKind::Rule(data) = &node.kind {
                if data.is_query {
                    roots.push(crate::story::script::get_root(self, node)?.index);
                }
            }
        }
        Ok(roots)
    }

    /// Restores on-disk naming before serialization.
    pub fn pre_save(&mut self) -> Result<()> {
        for root in self.query_rule_roots()? {
            if let Some(node) = self.nodes.get_mut(&root) {
                if !node.name.ends_with(QUERY_POSTFIX) {
                    node.name.push_str(QUERY_POSTFIX);
                }
            }
        }
        Ok(())
    }

    /// Undoes [`Self::pre_save`] renaming after serialization.
    pub fn post_save(&mut self) -> Result<()> {
        for root in self.query_rule_roots()? {
            if let Some(node) = self.nodes.get_mut(&root) {
                strip_query_postfix(&mut node.name);
            }
        }
        Ok(())
    }

    /// Emits the script text of one goal.
    pub fn goal_script(&self, goal_index: u32) -> Result<String> {
        crate::story::script::make_goal_script(self, goal_index)
    }

    /// Renders a sectioned diagnostic dump of the whole story.
    pub fn debug_dump(&self) -> Result<String> {
        let mut out = String::new();

        out.push_str("=== TYPES ===\n");
        for ty in self.types.values() {
            let _ = write!(out, "{}: {}", ty.index, ty.name);
            if ty.alias != 0 {
                let _ = write!(out, " (alias {})", ty.alias);
            }
            if ty.is_builtin {
                out.push_str(" [builtin]");
            }
            out.push('\n');
        }

        out.push_str("=== DIV OBJECTS ===\n");
        for object in &self.div_objects {
            let _ = writeln!(
                out,
                "{} (type {}, keys {}/{}/{}/{})",
                object.name, object.object_type, object.key1, object.key2, object.key3,
                object.key4
            );
        }

        out.push_str("=== FUNCTIONS ===\n");
        for function in &self.functions {
            function.debug_dump(&mut out, self);
            out.push('\n');
        }

        out.push_str("=== NODES ===\n");
        for (id, node) in &self.nodes {
            let _ = write!(out, "{}: tag {} '{}'", id, node.kind.type_tag(), node.name);
            if let NodeKind::Rule(data) = &node.kind {
                let _ = write!(out, " (line {}, goal {})", data.line, data.derived_goal.0);
            }
            out.push('\n');
        }

        out.push_str("=== ADAPTERS ===\n");
        for (id, adapter) in &self.adapters {
            let _ = write!(out, "{id}: {} columns", adapter.logical_indices.len());
            if let Some(owner) = adapter.owner_node {
                let _ = write!(out, ", owned by node {owner}");
            }
            out.push('\n');
        }

        out.push_str("=== DATABASES ===\n");
        for (id, database) in &self.databases {
            let _ = write!(out, "{id}: ");
            database.debug_dump(&mut out, self);
        }

        out.push_str("=== GOALS ===\n");
        for goal in self.goals.values() {
            goal.debug_dump(&mut out, self);
        }

        out.push_str("=== GLOBAL ACTIONS ===\n");
        for call in &self.global_actions {
            call.debug_dump(&mut out, self);
            out.push('\n');
        }

        Ok(out)
    }
}

/// Strips a trailing query definition postfix in place.
pub fn strip_query_postfix(name: &mut String) {
    if name.len() > QUERY_POSTFIX.len() && name.ends_with(QUERY_POSTFIX) {
        name.truncate(name.len() - QUERY_POSTFIX.len());
    }
}
