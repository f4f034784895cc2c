use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AttributeKind {
    Health,
    Points,
}

impl AttributeKind {
    pub const ALL: [AttributeKind; 2] = [AttributeKind::Health, AttributeKind::Points];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Health => "Health",
            Self::Points => "Points",
        }
    }
}

impl fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttributeKind {
    type Err = AttributeError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "health" => Ok(Self::Health),
            "points" => Ok(Self::Points),
            _ => Err(AttributeError::UnknownKind {
                name: raw.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttributeError {
    #[error("unknown attribute kind '{name}'; allowed values: Health, Points")]
    UnknownKind { name: String },
    #[error("attribute {kind} bounds are inverted: min {min} > max {max}")]
    InvertedBounds { kind: AttributeKind, min: i32, max: i32 },
    #[error("attribute {kind} value {value} is outside [{min}, {max}]")]
    OutOfBounds {
        kind: AttributeKind,
        value: i32,
        min: i32,
        max: i32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeValue {
    pub current: i32,
    pub min: i32,
    pub max: i32,
}

impl AttributeValue {
    pub const fn unbounded(current: i32) -> Self {
        Self {
            current,
            min: i32::MIN,
            max: i32::MAX,
        }
    }
}

/// Notification produced by a value-changing update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeChange {
    pub kind: AttributeKind,
    pub before: i32,
    pub after: i32,
}

impl AttributeChange {
    /// True when the move from `before` to `after` lands on or passes `threshold`.
    pub fn crosses(&self, threshold: i32) -> bool {
        if self.after < self.before {
            self.after <= threshold && threshold < self.before
        } else if self.after > self.before {
            self.before < threshold && threshold <= self.after
        } else {
            false
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeStore {
    values: BTreeMap<AttributeKind, AttributeValue>,
}

impl AttributeStore {
    pub fn define(
        &mut self,
        kind: AttributeKind,
        current: i32,
        min: i32,
        max: i32,
    ) -> Result<(), AttributeError> {
        if min > max {
            return Err(AttributeError::InvertedBounds { kind, min, max });
        }
        if current < min || current > max {
            return Err(AttributeError::OutOfBounds {
                kind,
                value: current,
                min,
                max,
            });
        }
        self.values.insert(kind, AttributeValue { current, min, max });
        Ok(())
    }

    pub fn get(&self, kind: AttributeKind) -> Option<i32> {
        self.values.get(&kind).map(|value| value.current)
    }

    pub fn value(&self, kind: AttributeKind) -> Option<&AttributeValue> {
        self.values.get(&kind)
    }

    /// Applies `delta` clamped into the attribute's bounds. Undefined kinds start
    /// unbounded at zero. Returns `None` when the stored value did not move.
    pub fn change(&mut self, kind: AttributeKind, delta: i32) -> Option<AttributeChange> {
        let value = self
            .values
            .entry(kind)
            .or_insert(AttributeValue::unbounded(0));
        let before = value.current;
        let after = before.saturating_add(delta).clamp(value.min, value.max);
        if after == before {
            return None;
        }
        value.current = after;
        Some(AttributeChange {
            kind,
            before,
            after,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (AttributeKind, &AttributeValue)> {
        self.values.iter().map(|(kind, value)| (*kind, value))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
