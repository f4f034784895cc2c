use serde::{Deserialize, Serialize};

use crate::model::{Actor, Vec2};

/// Per-tick kinematics constants. Units are pixels and ticks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    pub gravity: f64,
    pub jump_velocity: f64,
    pub max_fall_speed: f64,
    pub clamp_to_level: bool,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: 0.5,
            jump_velocity: 8.0,
            max_fall_speed: 12.0,
            clamp_to_level: true,
        }
    }
}

/// Level edges the clamp leaves open so actors can travel out to the
/// boundary actors placed beyond them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpenEdges {
    pub left: bool,
    pub right: bool,
    pub top: bool,
    pub bottom: bool,
}

#[derive(Debug, Clone, Default)]
pub struct PhysicsEngine {
    config: PhysicsConfig,
}

impl PhysicsEngine {
    pub fn new(config: PhysicsConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    /// Advances one actor by one tick. `level_size` is the level's width and
    /// height; non-positive dimensions disable clamping on that axis, and
    /// `open` edges are never clamped.
    pub fn tick(&self, actor: &mut Actor, level_size: Vec2, open: OpenEdges) {
        if actor.is_static || actor.is_dead() {
            return;
        }

        actor.velocity.y = (actor.velocity.y + self.config.gravity).min(self.config.max_fall_speed);
        actor.position += actor.velocity;

        if self.config.clamp_to_level {
            clamp_axis(
                &mut actor.position.x,
                &mut actor.velocity.x,
                actor.size.x,
                level_size.x,
                (open.left, open.right),
            );
            clamp_axis(
                &mut actor.position.y,
                &mut actor.velocity.y,
                actor.size.y,
                level_size.y,
                (open.top, open.bottom),
            );
        }
    }

    pub fn jump(&self, actor: &mut Actor) {
        actor.velocity.y = -self.config.jump_velocity;
    }
}

fn clamp_axis(
    position: &mut f64,
    velocity: &mut f64,
    extent: f64,
    limit: f64,
    (open_low, open_high): (bool, bool),
) {
    if limit <= 0.0 {
        return;
    }
    let max_position = (limit - extent).max(0.0);
    if *position < 0.0 && !open_low {
        *position = 0.0;
        *velocity = 0.0;
    } else if *position > max_position && !open_high {
        *position = max_position;
        *velocity = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ActorId;

    const OPEN_LEVEL: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    #[test]
    fn gravity_accumulates_then_integrates() {
        let engine = PhysicsEngine::new(PhysicsConfig {
            gravity: 1.0,
            ..PhysicsConfig::default()
        });
        let mut actor = Actor::new(ActorId(1), "ball").with_velocity(2.0, 0.0);

        engine.tick(&mut actor, OPEN_LEVEL, OpenEdges::default());
        assert_eq!(actor.velocity, Vec2::new(2.0, 1.0));
        assert_eq!(actor.position, Vec2::new(2.0, 1.0));

        engine.tick(&mut actor, OPEN_LEVEL, OpenEdges::default());
        assert_eq!(actor.position, Vec2::new(4.0, 3.0));
    }

    #[test]
    fn fall_speed_is_capped() {
        let engine = PhysicsEngine::new(PhysicsConfig {
            gravity: 5.0,
            max_fall_speed: 6.0,
            ..PhysicsConfig::default()
        });
        let mut actor = Actor::new(ActorId(1), "rock").with_velocity(0.0, 4.0);
        engine.tick(&mut actor, OPEN_LEVEL, OpenEdges::default());
        assert_eq!(actor.velocity.y, 6.0);
    }

    #[test]
    fn static_actors_do_not_move() {
        let engine = PhysicsEngine::default();
        let mut wall = Actor::new(ActorId(1), "wall")
            .with_static(true)
            .with_velocity(3.0, 3.0);
        engine.tick(&mut wall, OPEN_LEVEL, OpenEdges::default());
        assert_eq!(wall.position, Vec2::ZERO);
    }

    #[test]
    fn clamping_stops_at_level_edge() {
        let engine = PhysicsEngine::new(PhysicsConfig {
            gravity: 0.0,
            ..PhysicsConfig::default()
        });
        let mut actor = Actor::new(ActorId(1), "hero")
            .with_size(10.0, 10.0)
            .with_position(85.0, 5.0)
            .with_velocity(10.0, -8.0);
        engine.tick(&mut actor, Vec2::new(100.0, 100.0), OpenEdges::default());
        assert_eq!(actor.position, Vec2::new(90.0, 0.0));
        assert_eq!(actor.velocity, Vec2::ZERO);
    }

    #[test]
    fn open_edges_let_actors_leave() {
        let engine = PhysicsEngine::new(PhysicsConfig {
            gravity: 0.0,
            ..PhysicsConfig::default()
        });
        let open = OpenEdges {
            bottom: true,
            ..OpenEdges::default()
        };
        let mut actor = Actor::new(ActorId(1), "crate")
            .with_size(10.0, 10.0)
            .with_position(-4.0, 88.0)
            .with_velocity(0.0, 6.0);
        engine.tick(&mut actor, Vec2::new(100.0, 100.0), open);
        assert_eq!(actor.position, Vec2::new(0.0, 94.0));
        assert_eq!(actor.velocity.y, 6.0);
    }

    #[test]
    fn jump_sets_upward_velocity() {
        let engine = PhysicsEngine::default();
        let mut actor = Actor::new(ActorId(1), "hero").with_velocity(1.0, 5.0);
        engine.jump(&mut actor);
        assert_eq!(actor.velocity, Vec2::new(1.0, -8.0));
    }

    #[test]
    fn config_fields_default_when_missing() {
        let config: PhysicsConfig = serde_json::from_str(r#"{"gravity": 0.25}"#).expect("parse");
        assert_eq!(config.gravity, 0.25);
        assert_eq!(config.jump_velocity, 8.0);
        assert!(config.clamp_to_level);
    }
}
