mod action;
mod actor;
mod attributes;
mod behavior;
mod geometry;
mod rule;
mod trigger;

pub use action::{Action, ActionContext, ActionKind, ActionOutcome, SpawnPlacement};
pub use actor::{Actor, ActorId, DEFAULT_ACTOR_SIZE};
pub use attributes::{AttributeChange, AttributeError, AttributeKind, AttributeStore, AttributeValue};
pub use behavior::{ArgType, BehaviorArg, BehaviorSpec};
pub(crate) use behavior::{describe_arg_types, describe_shape};
pub use geometry::{Aabb, Vec2};
pub use rule::Rule;
pub use trigger::{CollisionSide, KeyCode, Trigger, TriggerCategory, UnknownCategory};
