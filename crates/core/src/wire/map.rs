//! Key/value argument maps
//!
//! Wire syntax, space separated:
//! - `key=value` for a single value
//! - `key=v1|key=v2` for a list
//! - `-key` for a switch

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use super::escape::{escape, unescape};

/// Data associated with a key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireValue {
    /// Key present without a value (`-key`)
    Switch,
    /// Exactly one value
    Single(String),
    /// Two or more values, in wire order
    List(Vec<String>),
}

impl WireValue {
    /// Build a value from collected strings. `None` when there are no values.
    fn from_values(mut values: Vec<String>) -> Option<Self> {
        match values.len() {
            0 => None,
            1 => values.pop().map(WireValue::Single),
            _ => Some(WireValue::List(values)),
        }
    }

    /// First value, `None` for a switch
    pub fn first(&self) -> Option<&str> {
        match self {
            WireValue::Switch => None,
            WireValue::Single(v) => Some(v),
            WireValue::List(values) => values.first().map(String::as_str),
        }
    }

    /// All values in order; empty for a switch
    pub fn values(&self) -> Vec<&str> {
        match self {
            WireValue::Switch => Vec::new(),
            WireValue::Single(v) => vec![v.as_str()],
            WireValue::List(values) => values.iter().map(String::as_str).collect(),
        }
    }

    fn push(&mut self, value: String) {
        *self = match std::mem::replace(self, WireValue::Switch) {
            WireValue::Switch => WireValue::Single(value),
            WireValue::Single(first) => WireValue::List(vec![first, value]),
            WireValue::List(mut values) => {
                values.push(value);
                WireValue::List(values)
            }
        };
    }
}

/// Mapping of argument keys to wire values
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WireMap {
    entries: BTreeMap<String, WireValue>,
}

impl WireMap {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a whitespace-delimited token stream.
    ///
    /// Malformed tokens are skipped. A key repeated as separate tokens keeps
    /// its last occurrence.
    pub fn parse(line: &str) -> Self {
        let mut map = Self::new();
        for token in line.split_whitespace() {
            if let Some((key, value)) = parse_entry(token) {
                map.entries.insert(key, value);
            }
        }
        map
    }

    /// Value for `key`
    pub fn value(&self, key: &str) -> Option<&WireValue> {
        self.entries.get(key)
    }

    /// First value for `key`; `None` if absent or a switch
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).and_then(WireValue::first)
    }

    /// First value for `key` parsed as `T`
    pub fn get_as<T: FromStr>(&self, key: &str) -> Option<T> {
        self.get(key).and_then(|v| v.parse().ok())
    }

    /// First value for `key` as an integer
    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.get_as(key)
    }

    /// All values for `key`; `None` if absent, empty for a switch
    pub fn get_list(&self, key: &str) -> Option<Vec<&str>> {
        self.entries.get(key).map(WireValue::values)
    }

    /// All integer values for `key`, skipping non-numeric ones.
    /// `None` if nothing numeric remains.
    pub fn get_int_list(&self, key: &str) -> Option<Vec<i64>> {
        let ints: Vec<i64> = self
            .get_list(key)?
            .into_iter()
            .filter_map(|v| v.parse().ok())
            .collect();
        if ints.is_empty() {
            None
        } else {
            Some(ints)
        }
    }

    /// True if `key` holds two or more values
    pub fn is_list(&self, key: &str) -> bool {
        matches!(self.entries.get(key), Some(WireValue::List(_)))
    }

    /// True if the first value of `key` is an integer
    pub fn is_int(&self, key: &str) -> bool {
        self.get_int(key).is_some()
    }

    /// True if `key` is present as a switch
    pub fn is_switch(&self, key: &str) -> bool {
        matches!(self.entries.get(key), Some(WireValue::Switch))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add a value under `key`, appending if the key already has values.
    ///
    /// Key and value are trimmed; returns false if either ends up empty.
    /// A switch under the same key is replaced.
    pub fn add(&mut self, key: &str, value: &str) -> bool {
        let key = key.trim();
        let value = value.trim();
        if key.is_empty() || value.is_empty() {
            return false;
        }

        match self.entries.get_mut(key) {
            Some(existing) => existing.push(value.to_string()),
            None => {
                self.entries
                    .insert(key.to_string(), WireValue::Single(value.to_string()));
            }
        }
        true
    }

    /// Add an integer value under `key`
    pub fn add_int(&mut self, key: &str, value: i64) -> bool {
        self.add(key, &value.to_string())
    }

    /// Add `key` as a switch. Fails if the key already carries values.
    pub fn add_switch(&mut self, key: &str) -> bool {
        let key = key.trim();
        if key.is_empty() {
            return false;
        }
        match self.entries.get(key) {
            Some(WireValue::Switch) => true,
            Some(_) => false,
            None => {
                self.entries.insert(key.to_string(), WireValue::Switch);
                true
            }
        }
    }

    /// Remove `key`, returning its value
    pub fn remove(&mut self, key: &str) -> Option<WireValue> {
        self.entries.remove(key)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &WireValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Parse one token into a key and its value.
///
/// Only the key of the first `key=value` sub-pair is used: in `a=1|b=2` the
/// result is `a` with values `1` and `2`.
pub fn parse_entry(token: &str) -> Option<(String, WireValue)> {
    let token = token.trim();
    if token.is_empty() {
        return None;
    }

    if let Some(name) = token.strip_prefix('-') {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        return Some((name.to_string(), WireValue::Switch));
    }

    let mut key: Option<&str> = None;
    let mut values = Vec::new();
    for pair in token.split('|').filter(|p| !p.is_empty()) {
        let Some((name, value)) = pair.split_once('=') else {
            continue;
        };
        if key.is_none() {
            key = Some(name.trim());
        }
        values.push(unescape(value));
    }

    let key = key.filter(|k| !k.is_empty())?;
    WireValue::from_values(values).map(|value| (key.to_string(), value))
}

fn write_entry(f: &mut fmt::Formatter<'_>, key: &str, value: &WireValue) -> fmt::Result {
    match value {
        WireValue::Switch => write!(f, "-{}", key),
        WireValue::Single(v) => write!(f, "{}={}", key, escape(v)),
        WireValue::List(values) => {
            for (i, v) in values.iter().enumerate() {
                if i > 0 {
                    f.write_str("|")?;
                }
                write!(f, "{}={}", key, escape(v))?;
            }
            Ok(())
        }
    }
}

impl fmt::Display for WireMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write_entry(f, key, value)?;
        }
        Ok(())
    }
}

impl FromStr for WireMap {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}
