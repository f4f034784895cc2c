//! Loosely-typed behavior arguments exchanged with authoring tools and the save
//! format. The factory checks them against a registered shape before any
//! typed `Trigger` or `Action` is built.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::actor::ActorId;
use super::attributes::AttributeKind;
use super::trigger::KeyCode;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum BehaviorArg {
    Actor(ActorId),
    Attribute(AttributeKind),
    Int(i32),
    Number(f64),
    Text(String),
    Key(KeyCode),
}

impl BehaviorArg {
    pub fn arg_type(&self) -> ArgType {
        match self {
            Self::Actor(_) => ArgType::Actor,
            Self::Attribute(_) => ArgType::Attribute,
            Self::Int(_) => ArgType::Int,
            Self::Number(_) => ArgType::Number,
            Self::Text(_) => ArgType::Text,
            Self::Key(_) => ArgType::Key,
        }
    }

    /// Whether this value can fill a parameter slot of `expected` type.
    /// Integers widen into number slots; nothing else converts.
    pub fn fits(&self, expected: ArgType) -> bool {
        matches!(
            (self, expected),
            (Self::Actor(_), ArgType::Actor)
                | (Self::Attribute(_), ArgType::Attribute)
                | (Self::Int(_), ArgType::Int)
                | (Self::Int(_), ArgType::Number)
                | (Self::Number(_), ArgType::Number)
                | (Self::Text(_), ArgType::Text)
                | (Self::Key(_), ArgType::Key)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgType {
    Actor,
    Attribute,
    Int,
    Number,
    Text,
    Key,
}

impl ArgType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Actor => "actor",
            Self::Attribute => "attribute",
            Self::Int => "int",
            Self::Number => "number",
            Self::Text => "text",
            Self::Key => "key",
        }
    }

    pub fn from_token(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "actor" => Some(Self::Actor),
            "attribute" => Some(Self::Attribute),
            "int" => Some(Self::Int),
            "number" => Some(Self::Number),
            "text" => Some(Self::Text),
            "key" => Some(Self::Key),
            _ => None,
        }
    }
}

impl fmt::Display for ArgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A declarative behavior: registered name plus positional arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorSpec {
    pub name: String,
    #[serde(default)]
    pub args: Vec<BehaviorArg>,
}

impl BehaviorSpec {
    pub fn new(name: impl Into<String>, args: Vec<BehaviorArg>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }
}

pub(crate) fn describe_arg_types(args: &[BehaviorArg]) -> String {
    let types = args
        .iter()
        .map(|arg| arg.arg_type().as_str())
        .collect::<Vec<_>>();
    format!("({})", types.join(", "))
}

pub(crate) fn describe_shape(params: &[ArgType]) -> String {
    let types = params.iter().map(|param| param.as_str()).collect::<Vec<_>>();
    format!("({})", types.join(", "))
}
