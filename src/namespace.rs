//! Host variable environment.
//!
//! The notebook host owns the variables; noteql reads them for templating,
//! writes assign-form results back, and asks for session bindings through
//! [`Namespace::sessions`] instead of inspecting value types itself.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::db::Value;
use crate::frame::Frame;
use crate::session::Session;

/// A value bound to a name in the host environment.
#[derive(Debug, Clone, PartialEq)]
pub enum Variable {
    /// Plain data (strings, numbers, lists, records...).
    Value(Value),
    /// A whole result frame (`DF`).
    Frame(Frame),
    /// A database session.
    Session(Session),
}

impl Variable {
    /// Kind name used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Variable::Value(_) => "value",
            Variable::Frame(_) => "frame",
            Variable::Session(_) => "session",
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Variable::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_frame(&self) -> Option<&Frame> {
        match self {
            Variable::Frame(frame) => Some(frame),
            _ => None,
        }
    }

    pub fn as_session(&self) -> Option<&Session> {
        match self {
            Variable::Session(session) => Some(session),
            _ => None,
        }
    }
}

impl From<Value> for Variable {
    fn from(value: Value) -> Self {
        Variable::Value(value)
    }
}

impl From<Frame> for Variable {
    fn from(frame: Frame) -> Self {
        Variable::Frame(frame)
    }
}

impl From<Session> for Variable {
    fn from(session: Session) -> Self {
        Variable::Session(session)
    }
}

/// Read/write access to the host's variables.
pub trait Namespace {
    /// Looks up a variable by name.
    fn get(&self, name: &str) -> Option<&Variable>;

    /// Mutable lookup, used to record session activation.
    fn get_mut(&mut self, name: &str) -> Option<&mut Variable>;

    /// Binds `name`, replacing any previous binding.
    fn set(&mut self, name: &str, value: Variable);

    /// Every session binding, as `(name, session)` pairs.
    fn sessions(&self) -> Vec<(&str, &Session)>;
}

/// In-memory namespace, ordered by name.
#[derive(Debug, Clone, Default)]
pub struct Variables {
    vars: BTreeMap<String, Variable>,
}

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `name` to anything convertible into a [`Variable`].
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Variable>) {
        self.vars.insert(name.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Variable)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Data variables (values and frames) as a JSON-ready map.
    pub fn snapshot(&self) -> BTreeMap<&str, Snapshot<'_>> {
        self.vars
            .iter()
            .filter_map(|(name, var)| {
                let snap = match var {
                    Variable::Value(value) => Snapshot::Value(value),
                    Variable::Frame(frame) => Snapshot::Frame(frame),
                    Variable::Session(_) => return None,
                };
                Some((name.as_str(), snap))
            })
            .collect()
    }
}

/// Serializable view of one data variable.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Snapshot<'a> {
    Value(&'a Value),
    Frame(&'a Frame),
}

impl Namespace for Variables {
    fn get(&self, name: &str) -> Option<&Variable> {
        self.vars.get(name)
    }

    fn get_mut(&mut self, name: &str) -> Option<&mut Variable> {
        self.vars.get_mut(name)
    }

    fn set(&mut self, name: &str, value: Variable) {
        self.vars.insert(name.to_string(), value);
    }

    fn sessions(&self) -> Vec<(&str, &Session)> {
        self.vars
            .iter()
            .filter_map(|(name, var)| var.as_session().map(|s| (name.as_str(), s)))
            .collect()
    }
}
