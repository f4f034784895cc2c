use rand::rngs::StdRng;
use rand::Rng;
use tracing::debug;

use super::actor::ActorId;
use super::attributes::AttributeKind;
use super::behavior::BehaviorArg;
use super::geometry::Vec2;
use crate::sim::{Level, PhysicsEngine, SimEvent, SimEvents};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpawnPlacement {
    Fixed { x: f64, y: f64 },
    Random {
        min_x: f64,
        max_x: f64,
        min_y: f64,
        max_y: f64,
    },
}

impl SpawnPlacement {
    pub fn resolve(&self, rng: &mut StdRng) -> Vec2 {
        match *self {
            Self::Fixed { x, y } => Vec2::new(x, y),
            Self::Random {
                min_x,
                max_x,
                min_y,
                max_y,
            } => Vec2::new(
                sample_between(rng, min_x, max_x),
                sample_between(rng, min_y, max_y),
            ),
        }
    }
}

fn sample_between(rng: &mut StdRng, a: f64, b: f64) -> f64 {
    let (low, high) = if a <= b { (a, b) } else { (b, a) };
    if low == high || !(high - low).is_finite() {
        return low;
    }
    rng.random_range(low..=high)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    ChangeAttribute,
    MoveByHeading,
    Jump,
    ApplyImpulse,
    HorizontalBounce,
    VerticalBounce,
    HorizontalStop,
    VerticalStop,
    CreateActor,
    Destroy,
    PlaySound,
    ShiftScene,
    NextLevel,
}

/// Effect performed when a rule's trigger fires. Targets are arena handles;
/// an action whose target has left the level is skipped.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    ChangeAttribute {
        target: ActorId,
        attribute: AttributeKind,
        delta: i32,
    },
    MoveByHeading {
        target: ActorId,
        heading_degrees: f64,
        distance: f64,
    },
    Jump {
        target: ActorId,
    },
    ApplyImpulse {
        target: ActorId,
        dx: f64,
        dy: f64,
    },
    HorizontalBounce {
        target: ActorId,
    },
    VerticalBounce {
        target: ActorId,
    },
    HorizontalStop {
        target: ActorId,
    },
    VerticalStop {
        target: ActorId,
    },
    CreateActor {
        source: ActorId,
        template: ActorId,
        placement: SpawnPlacement,
    },
    Destroy {
        target: ActorId,
    },
    PlaySound {
        source: ActorId,
        sound: String,
    },
    ShiftScene {
        source: ActorId,
        direction: String,
        speed: f64,
    },
    NextLevel {
        source: ActorId,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    Applied,
    SkippedMissingTarget(ActorId),
}

/// Per-dispatch collaborators handed to every performed action.
pub struct ActionContext<'a> {
    pub physics: &'a PhysicsEngine,
    pub events: &'a mut SimEvents,
    pub rng: &'a mut StdRng,
    pub level_advance_requested: bool,
    pub actions_performed: u32,
    pub spawned: u32,
}

impl<'a> ActionContext<'a> {
    pub fn new(physics: &'a PhysicsEngine, events: &'a mut SimEvents, rng: &'a mut StdRng) -> Self {
        Self {
            physics,
            events,
            rng,
            level_advance_requested: false,
            actions_performed: 0,
            spawned: 0,
        }
    }
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::ChangeAttribute { .. } => ActionKind::ChangeAttribute,
            Self::MoveByHeading { .. } => ActionKind::MoveByHeading,
            Self::Jump { .. } => ActionKind::Jump,
            Self::ApplyImpulse { .. } => ActionKind::ApplyImpulse,
            Self::HorizontalBounce { .. } => ActionKind::HorizontalBounce,
            Self::VerticalBounce { .. } => ActionKind::VerticalBounce,
            Self::HorizontalStop { .. } => ActionKind::HorizontalStop,
            Self::VerticalStop { .. } => ActionKind::VerticalStop,
            Self::CreateActor { .. } => ActionKind::CreateActor,
            Self::Destroy { .. } => ActionKind::Destroy,
            Self::PlaySound { .. } => ActionKind::PlaySound,
            Self::ShiftScene { .. } => ActionKind::ShiftScene,
            Self::NextLevel { .. } => ActionKind::NextLevel,
        }
    }

    /// Canonical factory name; `create_action(behavior_name(), parameters())`
    /// rebuilds an equal action.
    pub fn behavior_name(&self) -> &'static str {
        match self {
            Self::ChangeAttribute { .. } => "ChangeAttribute",
            Self::MoveByHeading { .. } => "MoveByHeading",
            Self::Jump { .. } => "Jump",
            Self::ApplyImpulse { .. } => "ApplyImpulse",
            Self::HorizontalBounce { .. } => "HorizontalBounceCollision",
            Self::VerticalBounce { .. } => "VerticalBounceCollision",
            Self::HorizontalStop { .. } => "HorizontalStaticCollision",
            Self::VerticalStop { .. } => "VerticalStaticCollision",
            Self::CreateActor { .. } => "CreateActor",
            Self::Destroy { .. } => "Destroy",
            Self::PlaySound { .. } => "PlaySound",
            Self::ShiftScene { .. } => "ShiftScene",
            Self::NextLevel { .. } => "NextLevel",
        }
    }

    pub fn parameters(&self) -> Vec<BehaviorArg> {
        match self {
            Self::ChangeAttribute {
                target,
                attribute,
                delta,
            } => vec![
                BehaviorArg::Actor(*target),
                BehaviorArg::Attribute(*attribute),
                BehaviorArg::Int(*delta),
            ],
            Self::MoveByHeading {
                target,
                heading_degrees,
                distance,
            } => vec![
                BehaviorArg::Actor(*target),
                BehaviorArg::Number(*heading_degrees),
                BehaviorArg::Number(*distance),
            ],
            Self::ApplyImpulse { target, dx, dy } => vec![
                BehaviorArg::Actor(*target),
                BehaviorArg::Number(*dx),
                BehaviorArg::Number(*dy),
            ],
            Self::Jump { target }
            | Self::HorizontalBounce { target }
            | Self::VerticalBounce { target }
            | Self::HorizontalStop { target }
            | Self::VerticalStop { target }
            | Self::Destroy { target } => vec![BehaviorArg::Actor(*target)],
            Self::CreateActor {
                source,
                template,
                placement,
            } => {
                let mut args = vec![BehaviorArg::Actor(*source), BehaviorArg::Actor(*template)];
                match *placement {
                    SpawnPlacement::Fixed { x, y } => {
                        args.extend([BehaviorArg::Number(x), BehaviorArg::Number(y)]);
                    }
                    SpawnPlacement::Random {
                        min_x,
                        max_x,
                        min_y,
                        max_y,
                    } => {
                        args.extend([
                            BehaviorArg::Number(min_x),
                            BehaviorArg::Number(max_x),
                            BehaviorArg::Number(min_y),
                            BehaviorArg::Number(max_y),
                        ]);
                    }
                }
                args
            }
            Self::PlaySound { source, sound } => {
                vec![BehaviorArg::Actor(*source), BehaviorArg::Text(sound.clone())]
            }
            Self::ShiftScene {
                source,
                direction,
                speed,
            } => vec![
                BehaviorArg::Actor(*source),
                BehaviorArg::Text(direction.clone()),
                BehaviorArg::Number(*speed),
            ],
            Self::NextLevel { source } => vec![BehaviorArg::Actor(*source)],
        }
    }

    pub fn remap(&mut self, from: ActorId, to: ActorId) {
        let swap = |id: &mut ActorId| {
            if *id == from {
                *id = to;
            }
        };
        match self {
            Self::ChangeAttribute { target, .. }
            | Self::MoveByHeading { target, .. }
            | Self::Jump { target }
            | Self::ApplyImpulse { target, .. }
            | Self::HorizontalBounce { target }
            | Self::VerticalBounce { target }
            | Self::HorizontalStop { target }
            | Self::VerticalStop { target }
            | Self::Destroy { target } => swap(target),
            // The template keeps pointing at the original so copies breed copies of it.
            Self::CreateActor { source, .. } => swap(source),
            Self::PlaySound { source, .. }
            | Self::ShiftScene { source, .. }
            | Self::NextLevel { source } => swap(source),
        }
    }

    pub fn perform(&self, level: &mut Level, ctx: &mut ActionContext<'_>) -> ActionOutcome {
        let outcome = self.apply(level, ctx);
        match outcome {
            ActionOutcome::Applied => ctx.actions_performed = ctx.actions_performed.saturating_add(1),
            ActionOutcome::SkippedMissingTarget(id) => {
                debug!(action = self.behavior_name(), actor_id = id.0, "action_target_missing");
            }
        }
        outcome
    }

    fn apply(&self, level: &mut Level, ctx: &mut ActionContext<'_>) -> ActionOutcome {
        match self {
            Self::ChangeAttribute {
                target,
                attribute,
                delta,
            } => {
                if level.change_attribute(*target, *attribute, *delta, ctx.events) {
                    ActionOutcome::Applied
                } else {
                    ActionOutcome::SkippedMissingTarget(*target)
                }
            }
            Self::MoveByHeading {
                target,
                heading_degrees,
                distance,
            } => with_actor(level, *target, |actor| {
                actor.position += Vec2::from_heading_degrees(*heading_degrees).scaled(*distance);
                actor.heading_degrees = *heading_degrees;
            }),
            Self::Jump { target } => {
                let physics = ctx.physics;
                with_actor(level, *target, |actor| physics.jump(actor))
            }
            Self::ApplyImpulse { target, dx, dy } => with_actor(level, *target, |actor| {
                actor.velocity += Vec2::new(*dx, *dy);
            }),
            Self::HorizontalBounce { target } => with_actor(level, *target, |actor| {
                actor.velocity.x = -actor.velocity.x;
            }),
            Self::VerticalBounce { target } => with_actor(level, *target, |actor| {
                actor.velocity.y = -actor.velocity.y;
            }),
            Self::HorizontalStop { target } => with_actor(level, *target, |actor| {
                actor.velocity.x = 0.0;
            }),
            Self::VerticalStop { target } => with_actor(level, *target, |actor| {
                actor.velocity.y = 0.0;
            }),
            Self::CreateActor {
                template,
                placement,
                ..
            } => {
                let position = placement.resolve(ctx.rng);
                match level.spawn_from_template(*template, position, ctx.events) {
                    Some(_) => {
                        ctx.spawned = ctx.spawned.saturating_add(1);
                        ActionOutcome::Applied
                    }
                    None => ActionOutcome::SkippedMissingTarget(*template),
                }
            }
            Self::Destroy { target } => with_actor(level, *target, |actor| actor.mark_dead()),
            Self::PlaySound { source, sound } => {
                ctx.events.push(SimEvent::PlaySound {
                    source: *source,
                    sound: sound.clone(),
                });
                ActionOutcome::Applied
            }
            Self::ShiftScene {
                source,
                direction,
                speed,
            } => {
                ctx.events.push(SimEvent::SceneShift {
                    source: *source,
                    direction: direction.clone(),
                    speed: *speed,
                });
                ActionOutcome::Applied
            }
            Self::NextLevel { .. } => {
                ctx.level_advance_requested = true;
                ActionOutcome::Applied
            }
        }
    }
}

fn with_actor(
    level: &mut Level,
    id: ActorId,
    apply: impl FnOnce(&mut super::actor::Actor),
) -> ActionOutcome {
    match level.actor_mut(id) {
        Some(actor) => {
            apply(actor);
            ActionOutcome::Applied
        }
        None => ActionOutcome::SkippedMissingTarget(id),
    }
}
