use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::actor::ActorId;
use super::attributes::AttributeKind;
use super::behavior::BehaviorArg;

/// Input key name, normalized to upper case (`"space"` and `"SPACE"` are equal).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct KeyCode(String);

impl KeyCode {
    pub fn new(raw: &str) -> Self {
        Self(raw.trim().to_ascii_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for KeyCode {
    fn from(raw: String) -> Self {
        Self::new(&raw)
    }
}

impl From<KeyCode> for String {
    fn from(key: KeyCode) -> Self {
        key.0
    }
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which part of the `main` actor a collision touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CollisionSide {
    Top,
    Bottom,
    Left,
    Right,
    /// Left or right.
    Side,
    Any,
}

impl CollisionSide {
    pub fn opposite(self) -> Self {
        match self {
            Self::Top => Self::Bottom,
            Self::Bottom => Self::Top,
            Self::Left => Self::Right,
            Self::Right => Self::Left,
            Self::Side => Self::Side,
            Self::Any => Self::Any,
        }
    }

    pub fn is_horizontal(self) -> bool {
        matches!(self, Self::Left | Self::Right)
    }

    pub fn category(self) -> TriggerCategory {
        match self {
            Self::Top => TriggerCategory::TopCollision,
            Self::Bottom => TriggerCategory::BottomCollision,
            Self::Left => TriggerCategory::LeftCollision,
            Self::Right => TriggerCategory::RightCollision,
            Self::Side => TriggerCategory::SideCollision,
            Self::Any => TriggerCategory::Collision,
        }
    }
}

/// Dispatch key used by the level's trigger index and the actor rule map.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TriggerCategory {
    Key(KeyCode),
    TopCollision,
    BottomCollision,
    LeftCollision,
    RightCollision,
    SideCollision,
    Collision,
    AttributeReached(AttributeKind),
}

const KEY_PREFIX: &str = "Key:";
const ATTRIBUTE_PREFIX: &str = "AttributeReached:";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown trigger category '{name}'")]
pub struct UnknownCategory {
    pub name: String,
}

impl TriggerCategory {
    pub fn name(&self) -> String {
        match self {
            Self::Key(key) => format!("{KEY_PREFIX}{key}"),
            Self::TopCollision => "TopCollision".to_string(),
            Self::BottomCollision => "BottomCollision".to_string(),
            Self::LeftCollision => "LeftCollision".to_string(),
            Self::RightCollision => "RightCollision".to_string(),
            Self::SideCollision => "SideCollision".to_string(),
            Self::Collision => "Collision".to_string(),
            Self::AttributeReached(kind) => format!("{ATTRIBUTE_PREFIX}{kind}"),
        }
    }
}

impl fmt::Display for TriggerCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl FromStr for TriggerCategory {
    type Err = UnknownCategory;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        let unknown = || UnknownCategory {
            name: raw.to_string(),
        };
        if let Some(key) = raw.strip_prefix(KEY_PREFIX) {
            if key.trim().is_empty() {
                return Err(unknown());
            }
            return Ok(Self::Key(KeyCode::new(key)));
        }
        if let Some(kind) = raw.strip_prefix(ATTRIBUTE_PREFIX) {
            return kind
                .parse::<AttributeKind>()
                .map(Self::AttributeReached)
                .map_err(|_| unknown());
        }
        match raw {
            "TopCollision" => Ok(Self::TopCollision),
            "BottomCollision" => Ok(Self::BottomCollision),
            "LeftCollision" => Ok(Self::LeftCollision),
            "RightCollision" => Ok(Self::RightCollision),
            "SideCollision" => Ok(Self::SideCollision),
            "Collision" => Ok(Self::Collision),
            _ => Err(unknown()),
        }
    }
}

/// Immutable predicate owned by a rule, or a candidate event synthesized by
/// the simulation. A stored trigger fires when it is structurally equal to
/// the candidate.
#[derive(Debug, Clone, PartialEq)]
pub enum Trigger {
    KeyPressed {
        key: KeyCode,
    },
    Collision {
        side: CollisionSide,
        main: ActorId,
        other: ActorId,
    },
    AttributeReached {
        actor: ActorId,
        attribute: AttributeKind,
        threshold: i32,
    },
}

impl Trigger {
    pub fn key(raw: &str) -> Self {
        Self::KeyPressed {
            key: KeyCode::new(raw),
        }
    }

    pub fn collision(side: CollisionSide, main: ActorId, other: ActorId) -> Self {
        Self::Collision { side, main, other }
    }

    pub fn category(&self) -> TriggerCategory {
        match self {
            Self::KeyPressed { key } => TriggerCategory::Key(key.clone()),
            Self::Collision { side, .. } => side.category(),
            Self::AttributeReached { attribute, .. } => {
                TriggerCategory::AttributeReached(*attribute)
            }
        }
    }

    pub fn evaluate(&self, candidate: &Trigger) -> bool {
        self == candidate
    }

    pub fn behavior_name(&self) -> &'static str {
        match self {
            Self::KeyPressed { .. } => "KeyPressed",
            Self::Collision { side, .. } => match side {
                CollisionSide::Top => "TopCollision",
                CollisionSide::Bottom => "BottomCollision",
                CollisionSide::Left => "LeftCollision",
                CollisionSide::Right => "RightCollision",
                CollisionSide::Side => "SideCollision",
                CollisionSide::Any => "Collision",
            },
            Self::AttributeReached { .. } => "AttributeReached",
        }
    }

    /// Constructor arguments in the order the factory expects them.
    pub fn parameters(&self) -> Vec<BehaviorArg> {
        match self {
            Self::KeyPressed { key } => vec![BehaviorArg::Key(key.clone())],
            Self::Collision { main, other, .. } => {
                vec![BehaviorArg::Actor(*main), BehaviorArg::Actor(*other)]
            }
            Self::AttributeReached {
                actor,
                attribute,
                threshold,
            } => vec![
                BehaviorArg::Actor(*actor),
                BehaviorArg::Attribute(*attribute),
                BehaviorArg::Int(*threshold),
            ],
        }
    }

    pub fn references(&self, id: ActorId) -> bool {
        match self {
            Self::KeyPressed { .. } => false,
            Self::Collision { main, other, .. } => *main == id || *other == id,
            Self::AttributeReached { actor, .. } => *actor == id,
        }
    }

    pub fn remap(&mut self, from: ActorId, to: ActorId) {
        let swap = |id: &mut ActorId| {
            if *id == from {
                *id = to;
            }
        };
        match self {
            Self::KeyPressed { .. } => {}
            Self::Collision { main, other, .. } => {
                swap(main);
                swap(other);
            }
            Self::AttributeReached { actor, .. } => swap(actor),
        }
    }
}
