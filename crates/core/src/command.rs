//! Outgoing commands
//!
//! A command is a name followed by its argument map, serialized as one line.

use std::fmt;

use crate::wire::WireMap;

/// Named command with wire arguments
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Command {
    name: String,
    args: WireMap,
}

impl Command {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into().trim().to_string(),
            args: WireMap::new(),
        }
    }

    /// Build from a name and a prepared argument map
    pub fn with_args(name: impl Into<String>, args: WireMap) -> Self {
        Self {
            name: name.into().trim().to_string(),
            args,
        }
    }

    /// Append a value argument
    pub fn arg(mut self, key: &str, value: &str) -> Self {
        self.args.add(key, value);
        self
    }

    /// Append an integer argument
    pub fn arg_int(mut self, key: &str, value: i64) -> Self {
        self.args.add_int(key, value);
        self
    }

    /// Append a switch
    pub fn switch(mut self, key: &str) -> Self {
        self.args.add_switch(key);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &WireMap {
        &self.args
    }

    pub fn args_mut(&mut self) -> &mut WireMap {
        &mut self.args
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if !self.args.is_empty() {
            write!(f, " {}", self.args)?;
        }
        Ok(())
    }
}
