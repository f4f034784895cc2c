//! Name-based construction of triggers and actions from loosely typed
//! arguments. Every registered name maps to one or more parameter shapes; the
//! first shape the arguments fit is used.

use thiserror::Error;

use crate::model::{
    describe_arg_types, describe_shape, Action, ActorId, ArgType, AttributeKind, BehaviorArg,
    BehaviorSpec, CollisionSide, KeyCode, Rule, SpawnPlacement, Trigger,
};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FactoryError {
    #[error("unknown behavior '{name}'")]
    UnknownBehavior { name: String },
    #[error("behavior '{name}' expects {expected} but got {actual}")]
    ArgumentMismatch {
        name: String,
        expected: String,
        actual: String,
    },
    #[error("behavior '{name}' rejected its arguments: {reason}")]
    InvalidArgument { name: String, reason: String },
}

type Build<T> = fn(&[BehaviorArg]) -> Result<T, String>;

struct Shape<T> {
    name: &'static str,
    params: &'static [ArgType],
    build: Build<T>,
}

const ACTOR: &[ArgType] = &[ArgType::Actor];
const ACTOR_PAIR: &[ArgType] = &[ArgType::Actor, ArgType::Actor];
const ACTOR_INT: &[ArgType] = &[ArgType::Actor, ArgType::Int];
const ACTOR_NUMBER: &[ArgType] = &[ArgType::Actor, ArgType::Number];
const ACTOR_NUMBER_PAIR: &[ArgType] = &[ArgType::Actor, ArgType::Number, ArgType::Number];
const ACTOR_ATTRIBUTE_INT: &[ArgType] = &[ArgType::Actor, ArgType::Attribute, ArgType::Int];
const SPAWN_FIXED: &[ArgType] = &[
    ArgType::Actor,
    ArgType::Actor,
    ArgType::Number,
    ArgType::Number,
];
const SPAWN_RANDOM: &[ArgType] = &[
    ArgType::Actor,
    ArgType::Actor,
    ArgType::Number,
    ArgType::Number,
    ArgType::Number,
    ArgType::Number,
];

static TRIGGERS: &[Shape<Trigger>] = &[
    Shape {
        name: "KeyPressed",
        params: &[ArgType::Key],
        build: key_pressed,
    },
    Shape {
        name: "TopCollision",
        params: ACTOR_PAIR,
        build: top_collision,
    },
    Shape {
        name: "BottomCollision",
        params: ACTOR_PAIR,
        build: bottom_collision,
    },
    Shape {
        name: "LeftCollision",
        params: ACTOR_PAIR,
        build: left_collision,
    },
    Shape {
        name: "RightCollision",
        params: ACTOR_PAIR,
        build: right_collision,
    },
    Shape {
        name: "SideCollision",
        params: ACTOR_PAIR,
        build: side_collision,
    },
    Shape {
        name: "Collision",
        params: ACTOR_PAIR,
        build: any_collision,
    },
    Shape {
        name: "AttributeReached",
        params: ACTOR_ATTRIBUTE_INT,
        build: attribute_reached,
    },
    Shape {
        name: "HealthReached",
        params: ACTOR_INT,
        build: health_reached,
    },
    Shape {
        name: "PointsReached",
        params: ACTOR_INT,
        build: points_reached,
    },
];

static ACTIONS: &[Shape<Action>] = &[
    Shape {
        name: "ChangeAttribute",
        params: ACTOR_ATTRIBUTE_INT,
        build: change_attribute,
    },
    Shape {
        name: "GainHealth",
        params: ACTOR,
        build: gain_health,
    },
    Shape {
        name: "LoseHealth",
        params: ACTOR,
        build: lose_health,
    },
    Shape {
        name: "GainPoints",
        params: ACTOR,
        build: gain_points,
    },
    Shape {
        name: "LosePoints",
        params: ACTOR,
        build: lose_points,
    },
    Shape {
        name: "MoveByHeading",
        params: ACTOR_NUMBER_PAIR,
        build: move_by_heading,
    },
    Shape {
        name: "MoveLeft",
        params: ACTOR_NUMBER,
        build: move_left,
    },
    Shape {
        name: "MoveRight",
        params: ACTOR_NUMBER,
        build: move_right,
    },
    Shape {
        name: "MoveUp",
        params: ACTOR_NUMBER,
        build: move_up,
    },
    Shape {
        name: "MoveDown",
        params: ACTOR_NUMBER,
        build: move_down,
    },
    Shape {
        name: "Jump",
        params: ACTOR,
        build: jump,
    },
    Shape {
        name: "ApplyImpulse",
        params: ACTOR_NUMBER_PAIR,
        build: apply_impulse,
    },
    Shape {
        name: "HorizontalBounceCollision",
        params: ACTOR,
        build: horizontal_bounce,
    },
    Shape {
        name: "VerticalBounceCollision",
        params: ACTOR,
        build: vertical_bounce,
    },
    Shape {
        name: "HorizontalStaticCollision",
        params: ACTOR,
        build: horizontal_stop,
    },
    Shape {
        name: "VerticalStaticCollision",
        params: ACTOR,
        build: vertical_stop,
    },
    Shape {
        name: "CreateActor",
        params: SPAWN_FIXED,
        build: create_actor_fixed,
    },
    Shape {
        name: "CreateActor",
        params: SPAWN_RANDOM,
        build: create_actor_random,
    },
    Shape {
        name: "Destroy",
        params: ACTOR,
        build: destroy,
    },
    Shape {
        name: "PlaySound",
        params: &[ArgType::Actor, ArgType::Text],
        build: play_sound,
    },
    Shape {
        name: "ShiftScene",
        params: &[ArgType::Actor, ArgType::Text, ArgType::Number],
        build: shift_scene,
    },
    Shape {
        name: "NextLevel",
        params: ACTOR,
        build: next_level,
    },
];

pub fn create_trigger(name: &str, args: &[BehaviorArg]) -> Result<Trigger, FactoryError> {
    create(TRIGGERS, name, args)
}

pub fn create_action(name: &str, args: &[BehaviorArg]) -> Result<Action, FactoryError> {
    create(ACTIONS, name, args)
}

pub fn create_rule(trigger: &BehaviorSpec, action: &BehaviorSpec) -> Result<Rule, FactoryError> {
    Ok(Rule::new(
        create_trigger(&trigger.name, &trigger.args)?,
        create_action(&action.name, &action.args)?,
    ))
}

pub fn trigger_spec(trigger: &Trigger) -> BehaviorSpec {
    BehaviorSpec::new(trigger.behavior_name(), trigger.parameters())
}

pub fn action_spec(action: &Action) -> BehaviorSpec {
    BehaviorSpec::new(action.behavior_name(), action.parameters())
}

fn create<T>(shapes: &[Shape<T>], name: &str, args: &[BehaviorArg]) -> Result<T, FactoryError> {
    let name = name.trim();
    let mut candidates = shapes.iter().filter(|shape| shape.name == name).peekable();
    if candidates.peek().is_none() {
        return Err(FactoryError::UnknownBehavior {
            name: name.to_string(),
        });
    }

    let mut expected = Vec::new();
    for shape in candidates {
        let fits = shape.params.len() == args.len()
            && shape
                .params
                .iter()
                .zip(args)
                .all(|(param, arg)| arg.fits(*param));
        if fits {
            return (shape.build)(args).map_err(|reason| FactoryError::InvalidArgument {
                name: name.to_string(),
                reason,
            });
        }
        expected.push(describe_shape(shape.params));
    }
    Err(FactoryError::ArgumentMismatch {
        name: name.to_string(),
        expected: expected.join(" or "),
        actual: describe_arg_types(args),
    })
}

fn actor_at(args: &[BehaviorArg], index: usize) -> Result<ActorId, String> {
    match args.get(index) {
        Some(BehaviorArg::Actor(id)) => Ok(*id),
        _ => Err(format!("argument {index} must be an actor")),
    }
}

fn attribute_at(args: &[BehaviorArg], index: usize) -> Result<AttributeKind, String> {
    match args.get(index) {
        Some(BehaviorArg::Attribute(kind)) => Ok(*kind),
        _ => Err(format!("argument {index} must be an attribute")),
    }
}

fn int_at(args: &[BehaviorArg], index: usize) -> Result<i32, String> {
    match args.get(index) {
        Some(BehaviorArg::Int(value)) => Ok(*value),
        _ => Err(format!("argument {index} must be an int")),
    }
}

fn number_at(args: &[BehaviorArg], index: usize) -> Result<f64, String> {
    let value = match args.get(index) {
        Some(BehaviorArg::Number(value)) => *value,
        Some(BehaviorArg::Int(value)) => f64::from(*value),
        _ => return Err(format!("argument {index} must be a number")),
    };
    if !value.is_finite() {
        return Err(format!("argument {index} must be finite, got {value}"));
    }
    Ok(value)
}

fn text_at(args: &[BehaviorArg], index: usize) -> Result<String, String> {
    match args.get(index) {
        Some(BehaviorArg::Text(value)) => Ok(value.clone()),
        _ => Err(format!("argument {index} must be text")),
    }
}

fn key_pressed(args: &[BehaviorArg]) -> Result<Trigger, String> {
    match args.first() {
        Some(BehaviorArg::Key(key)) if !key.as_str().is_empty() => {
            Ok(Trigger::KeyPressed { key: key.clone() })
        }
        Some(BehaviorArg::Key(_)) => Err("key must not be empty".to_string()),
        _ => Err("argument 0 must be a key".to_string()),
    }
}

fn collision(side: CollisionSide, args: &[BehaviorArg]) -> Result<Trigger, String> {
    Ok(Trigger::collision(side, actor_at(args, 0)?, actor_at(args, 1)?))
}

fn top_collision(args: &[BehaviorArg]) -> Result<Trigger, String> {
    collision(CollisionSide::Top, args)
}

fn bottom_collision(args: &[BehaviorArg]) -> Result<Trigger, String> {
    collision(CollisionSide::Bottom, args)
}

fn left_collision(args: &[BehaviorArg]) -> Result<Trigger, String> {
    collision(CollisionSide::Left, args)
}

fn right_collision(args: &[BehaviorArg]) -> Result<Trigger, String> {
    collision(CollisionSide::Right, args)
}

fn side_collision(args: &[BehaviorArg]) -> Result<Trigger, String> {
    collision(CollisionSide::Side, args)
}

fn any_collision(args: &[BehaviorArg]) -> Result<Trigger, String> {
    collision(CollisionSide::Any, args)
}

fn attribute_reached(args: &[BehaviorArg]) -> Result<Trigger, String> {
    Ok(Trigger::AttributeReached {
        actor: actor_at(args, 0)?,
        attribute: attribute_at(args, 1)?,
        threshold: int_at(args, 2)?,
    })
}

fn reached(attribute: AttributeKind, args: &[BehaviorArg]) -> Result<Trigger, String> {
    Ok(Trigger::AttributeReached {
        actor: actor_at(args, 0)?,
        attribute,
        threshold: int_at(args, 1)?,
    })
}

fn health_reached(args: &[BehaviorArg]) -> Result<Trigger, String> {
    reached(AttributeKind::Health, args)
}

fn points_reached(args: &[BehaviorArg]) -> Result<Trigger, String> {
    reached(AttributeKind::Points, args)
}

fn change_attribute(args: &[BehaviorArg]) -> Result<Action, String> {
    Ok(Action::ChangeAttribute {
        target: actor_at(args, 0)?,
        attribute: attribute_at(args, 1)?,
        delta: int_at(args, 2)?,
    })
}

fn step_attribute(attribute: AttributeKind, delta: i32, args: &[BehaviorArg]) -> Result<Action, String> {
    Ok(Action::ChangeAttribute {
        target: actor_at(args, 0)?,
        attribute,
        delta,
    })
}

fn gain_health(args: &[BehaviorArg]) -> Result<Action, String> {
    step_attribute(AttributeKind::Health, 1, args)
}

fn lose_health(args: &[BehaviorArg]) -> Result<Action, String> {
    step_attribute(AttributeKind::Health, -1, args)
}

fn gain_points(args: &[BehaviorArg]) -> Result<Action, String> {
    step_attribute(AttributeKind::Points, 1, args)
}

fn lose_points(args: &[BehaviorArg]) -> Result<Action, String> {
    step_attribute(AttributeKind::Points, -1, args)
}

fn move_by_heading(args: &[BehaviorArg]) -> Result<Action, String> {
    Ok(Action::MoveByHeading {
        target: actor_at(args, 0)?,
        heading_degrees: number_at(args, 1)?,
        distance: number_at(args, 2)?,
    })
}

fn move_towards(heading_degrees: f64, args: &[BehaviorArg]) -> Result<Action, String> {
    Ok(Action::MoveByHeading {
        target: actor_at(args, 0)?,
        heading_degrees,
        distance: number_at(args, 1)?,
    })
}

fn move_left(args: &[BehaviorArg]) -> Result<Action, String> {
    move_towards(180.0, args)
}

fn move_right(args: &[BehaviorArg]) -> Result<Action, String> {
    move_towards(0.0, args)
}

fn move_up(args: &[BehaviorArg]) -> Result<Action, String> {
    move_towards(90.0, args)
}

fn move_down(args: &[BehaviorArg]) -> Result<Action, String> {
    move_towards(270.0, args)
}

fn jump(args: &[BehaviorArg]) -> Result<Action, String> {
    Ok(Action::Jump {
        target: actor_at(args, 0)?,
    })
}

fn apply_impulse(args: &[BehaviorArg]) -> Result<Action, String> {
    Ok(Action::ApplyImpulse {
        target: actor_at(args, 0)?,
        dx: number_at(args, 1)?,
        dy: number_at(args, 2)?,
    })
}

fn horizontal_bounce(args: &[BehaviorArg]) -> Result<Action, String> {
    Ok(Action::HorizontalBounce {
        target: actor_at(args, 0)?,
    })
}

fn vertical_bounce(args: &[BehaviorArg]) -> Result<Action, String> {
    Ok(Action::VerticalBounce {
        target: actor_at(args, 0)?,
    })
}

fn horizontal_stop(args: &[BehaviorArg]) -> Result<Action, String> {
    Ok(Action::HorizontalStop {
        target: actor_at(args, 0)?,
    })
}

fn vertical_stop(args: &[BehaviorArg]) -> Result<Action, String> {
    Ok(Action::VerticalStop {
        target: actor_at(args, 0)?,
    })
}

fn create_actor_fixed(args: &[BehaviorArg]) -> Result<Action, String> {
    Ok(Action::CreateActor {
        source: actor_at(args, 0)?,
        template: actor_at(args, 1)?,
        placement: SpawnPlacement::Fixed {
            x: number_at(args, 2)?,
            y: number_at(args, 3)?,
        },
    })
}

fn create_actor_random(args: &[BehaviorArg]) -> Result<Action, String> {
    let (min_x, max_x) = (number_at(args, 2)?, number_at(args, 3)?);
    let (min_y, max_y) = (number_at(args, 4)?, number_at(args, 5)?);
    if min_x > max_x {
        return Err(format!("random x range is inverted: {min_x} > {max_x}"));
    }
    if min_y > max_y {
        return Err(format!("random y range is inverted: {min_y} > {max_y}"));
    }
    for (axis, min, max) in [("x", min_x, max_x), ("y", min_y, max_y)] {
        if !(max - min).is_finite() {
            return Err(format!("random {axis} range is too wide: {min}..{max}"));
        }
    }
    Ok(Action::CreateActor {
        source: actor_at(args, 0)?,
        template: actor_at(args, 1)?,
        placement: SpawnPlacement::Random {
            min_x,
            max_x,
            min_y,
            max_y,
        },
    })
}

fn destroy(args: &[BehaviorArg]) -> Result<Action, String> {
    Ok(Action::Destroy {
        target: actor_at(args, 0)?,
    })
}

fn play_sound(args: &[BehaviorArg]) -> Result<Action, String> {
    Ok(Action::PlaySound {
        source: actor_at(args, 0)?,
        sound: text_at(args, 1)?,
    })
}

fn shift_scene(args: &[BehaviorArg]) -> Result<Action, String> {
    Ok(Action::ShiftScene {
        source: actor_at(args, 0)?,
        direction: text_at(args, 1)?,
        speed: number_at(args, 2)?,
    })
}

fn next_level(args: &[BehaviorArg]) -> Result<Action, String> {
    Ok(Action::NextLevel {
        source: actor_at(args, 0)?,
    })
}

/// Normalizes a loosely typed key argument coming from authoring text.
pub fn key_arg(raw: &str) -> BehaviorArg {
    BehaviorArg::Key(KeyCode::new(raw))
}
