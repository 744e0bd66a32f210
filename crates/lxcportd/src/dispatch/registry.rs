//! The command table.
//!
//! Commands are addressed by a numeric id on the wire. The table is built once
//! at startup and checked for duplicate ids and names; after that it never
//! changes.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::collections::HashSet;
use std::fmt;

use thiserror::Error;

use crate::handlers::{self, Handler};

/// One dispatchable command.
#[derive(Clone, Copy)]
pub struct Command {
    id: u32,
    name: &'static str,
    arity: usize,
    handler: Handler,
}

impl Command {
    /// Describes a command.
    #[must_use]
    pub const fn new(id: u32, name: &'static str, arity: usize, handler: Handler) -> Self {
        Self {
            id,
            name,
            arity,
            handler,
        }
    }

    /// Wire id.
    #[must_use]
    pub const fn id(&self) -> u32 {
        self.id
    }

    /// Command name used in diagnostics.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Exact number of arguments the command takes.
    #[must_use]
    pub const fn arity(&self) -> usize {
        self.arity
    }

    /// The handler invoked for well-shaped requests.
    #[must_use]
    pub const fn handler(&self) -> Handler {
        self.handler
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish_non_exhaustive()
    }
}

/// Errors raised while building a command table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Two commands share a wire id.
    #[error("command id {id} is used by both {first} and {second}")]
    DuplicateId {
        /// The shared id.
        id: u32,
        /// Command registered first.
        first: &'static str,
        /// Command that collided.
        second: &'static str,
    },
    /// Two commands share a name.
    #[error("command name {name} is registered twice")]
    DuplicateName {
        /// The shared name.
        name: &'static str,
    },
}

/// Commands served by the port, in wire id order.
pub const STANDARD_COMMANDS: &[Command] = &[
    Command::new(0, "list_active_containers", 1, handlers::list_active_containers),
    Command::new(1, "list_all_containers", 1, handlers::list_all_containers),
    Command::new(2, "list_defined_containers", 1, handlers::list_defined_containers),
    Command::new(3, "argv", 1, handlers::argv),
    Command::new(4, "name", 0, handlers::name),
    Command::new(5, "defined", 0, handlers::defined),
    Command::new(6, "running", 0, handlers::running),
    Command::new(7, "create", 5, handlers::create),
    Command::new(8, "destroy", 0, handlers::destroy),
    Command::new(9, "start", 2, handlers::start),
    Command::new(10, "stop", 0, handlers::stop),
    Command::new(11, "shutdown", 1, handlers::shutdown),
    Command::new(12, "init_pid", 0, handlers::init_pid),
    Command::new(13, "load_config", 1, handlers::load_config),
    Command::new(14, "get_keys", 1, handlers::get_keys),
    Command::new(15, "config_file_name", 0, handlers::config_file_name),
    Command::new(16, "clear_config", 0, handlers::clear_config),
    Command::new(17, "clear_config_item", 1, handlers::clear_config_item),
    Command::new(18, "get_config_item", 1, handlers::get_config_item),
    Command::new(19, "set_config_item", 2, handlers::set_config_item),
    Command::new(20, "get_config_path", 0, handlers::get_config_path),
    Command::new(21, "set_config_path", 1, handlers::set_config_path),
];

/// Immutable id-to-command lookup.
#[derive(Debug, Clone)]
pub struct CommandTable {
    commands: BTreeMap<u32, Command>,
}

impl CommandTable {
    /// Builds a table, rejecting duplicate ids and names.
    ///
    /// # Errors
    ///
    /// Returns the first [`RegistryError`] found, in input order.
    pub fn new(commands: impl IntoIterator<Item = Command>) -> Result<Self, RegistryError> {
        let mut table = BTreeMap::new();
        let mut names = HashSet::new();
        for command in commands {
            if !names.insert(command.name) {
                return Err(RegistryError::DuplicateName { name: command.name });
            }
            match table.entry(command.id) {
                Entry::Occupied(existing) => {
                    let first: &Command = existing.get();
                    return Err(RegistryError::DuplicateId {
                        id: command.id,
                        first: first.name,
                        second: command.name,
                    });
                }
                Entry::Vacant(slot) => {
                    slot.insert(command);
                }
            }
        }
        Ok(Self { commands: table })
    }

    /// The table of [`STANDARD_COMMANDS`].
    ///
    /// # Errors
    ///
    /// Fails only if the built-in table is itself inconsistent.
    pub fn standard() -> Result<Self, RegistryError> {
        Self::new(STANDARD_COMMANDS.iter().copied())
    }

    /// Looks up a command by wire id.
    #[must_use]
    pub fn get(&self, id: u32) -> Option<&Command> {
        self.commands.get(&id)
    }

    /// Number of registered commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Returns `true` when no command is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Commands in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Command> {
        self.commands.values()
    }
}
