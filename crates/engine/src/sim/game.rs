use std::collections::VecDeque;
use std::fmt;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::model::{ActionContext, ActorId, KeyCode, Trigger};

use super::collision::CollisionDetector;
use super::events::{SimEvent, SimEvents};
use super::level::{Level, LevelError};
use super::physics::{PhysicsConfig, PhysicsEngine};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameInfo {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameState {
    Stopped,
    Running,
    Finished,
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Stopped => "stopped",
            Self::Running => "running",
            Self::Finished => "finished",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub physics: PhysicsConfig,
    pub seed: u64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            physics: PhysicsConfig::default(),
            seed: 0x5eed,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub tick: u64,
    pub triggers_dispatched: u32,
    pub actions_performed: u32,
    pub reaped: u32,
    pub spawned: u32,
    pub level_advanced: bool,
}

#[derive(Debug, Error)]
pub enum GameError {
    #[error("cannot {operation} while the game is {state}")]
    InvalidState {
        operation: &'static str,
        state: GameState,
    },
    #[error("game has no levels to play")]
    NoLevels,
    #[error(transparent)]
    Level(#[from] LevelError),
}

/// Ordered levels plus the fixed-step simulation that drives the current one.
#[derive(Debug)]
pub struct Game {
    pub info: GameInfo,
    levels: Vec<Level>,
    current: usize,
    state: GameState,
    live: Vec<ActorId>,
    physics: PhysicsEngine,
    collisions: CollisionDetector,
    events: SimEvents,
    key_presses: VecDeque<KeyCode>,
    rng: StdRng,
    config: GameConfig,
    tick: u64,
    advance_requested: bool,
}

impl Game {
    pub fn new(info: GameInfo, levels: Vec<Level>, config: GameConfig) -> Self {
        Self {
            info,
            levels,
            current: 0,
            state: GameState::Stopped,
            live: Vec::new(),
            physics: PhysicsEngine::new(config.physics),
            collisions: CollisionDetector::new(),
            events: SimEvents::default(),
            key_presses: VecDeque::new(),
            rng: StdRng::seed_from_u64(config.seed),
            config,
            tick: 0,
            advance_requested: false,
        }
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    pub fn level_mut(&mut self, index: usize) -> Option<&mut Level> {
        self.levels.get_mut(index)
    }

    pub fn add_level(&mut self, level: Level) {
        self.levels.push(level);
    }

    pub fn current_level_index(&self) -> usize {
        self.current
    }

    pub fn current_level(&self) -> Option<&Level> {
        self.levels.get(self.current)
    }

    /// Actors that took part in the last physics pass.
    pub fn live_actors(&self) -> &[ActorId] {
        &self.live
    }

    /// Restores the level cursor and tick counter of a saved session.
    pub(crate) fn restore_progress(&mut self, current: usize, tick: u64) {
        self.current = current;
        self.tick = tick;
        if current >= self.levels.len() && !self.levels.is_empty() {
            self.state = GameState::Finished;
        }
    }

    pub fn start_game(&mut self) -> Result<(), GameError> {
        if self.state != GameState::Stopped {
            return Err(GameError::InvalidState {
                operation: "start",
                state: self.state,
            });
        }
        let Some(level) = self.levels.get(self.current) else {
            return Err(GameError::NoLevels);
        };

        self.live = live_ids(level);
        for id in &self.live {
            if let Some(actor) = level.actor(*id) {
                debug!(actor_id = id.0, name = %actor.name, is_static = actor.is_static, "physics_participant");
            }
        }
        info!(
            game = %self.info.name,
            level = %level.info.name,
            level_index = self.current,
            actor_count = self.live.len(),
            "game_started"
        );
        self.state = GameState::Running;
        Ok(())
    }

    pub fn pause(&mut self) -> Result<(), GameError> {
        if self.state != GameState::Running {
            return Err(GameError::InvalidState {
                operation: "pause",
                state: self.state,
            });
        }
        self.state = GameState::Stopped;
        info!(tick = self.tick, "game_paused");
        Ok(())
    }

    pub fn resume(&mut self) -> Result<(), GameError> {
        self.start_game()
    }

    /// Key presses waiting for the next `step`, oldest first.
    pub fn queued_key_presses(&self) -> impl Iterator<Item = &KeyCode> {
        self.key_presses.iter()
    }

    /// Queues a key press; it is dispatched during the next `step`.
    pub fn press_key(&mut self, key: &str) {
        self.key_presses.push_back(KeyCode::new(key));
    }

    /// Dispatches a trigger into the current level right away. Deaths are
    /// reaped and level advance happens at the end of the next `step`.
    pub fn handle_trigger(&mut self, trigger: &Trigger) -> Result<u32, GameError> {
        if self.state == GameState::Finished {
            return Err(GameError::InvalidState {
                operation: "dispatch a trigger",
                state: self.state,
            });
        }
        let Some(level) = self.levels.get_mut(self.current) else {
            return Err(GameError::NoLevels);
        };
        let mut ctx = ActionContext::new(&self.physics, &mut self.events, &mut self.rng);
        let performed = level.handle_trigger(trigger, &mut ctx);
        self.advance_requested |= ctx.level_advance_requested;
        Ok(performed)
    }

    /// Runs one fixed tick: physics, collisions, queued key presses, reaping,
    /// then a requested level advance.
    pub fn step(&mut self) -> Result<TickReport, GameError> {
        if self.state != GameState::Running {
            return Err(GameError::InvalidState {
                operation: "step",
                state: self.state,
            });
        }
        let Some(level) = self.levels.get_mut(self.current) else {
            return Err(GameError::NoLevels);
        };
        self.tick += 1;
        let mut report = TickReport {
            tick: self.tick,
            ..TickReport::default()
        };

        let size = level.size();
        let open = level.open_edges();
        for id in &self.live {
            if let Some(actor) = level.actor_mut(*id) {
                self.physics.tick(actor, size, open);
            }
        }

        let mut ctx = ActionContext::new(&self.physics, &mut self.events, &mut self.rng);
        let pass = self.collisions.run(level, &mut ctx);
        report.triggers_dispatched = pass.triggers;
        while let Some(key) = self.key_presses.pop_front() {
            level.handle_trigger(&Trigger::KeyPressed { key }, &mut ctx);
            report.triggers_dispatched += 1;
        }
        report.actions_performed = ctx.actions_performed;
        report.spawned = ctx.spawned;
        let advance = ctx.level_advance_requested || std::mem::take(&mut self.advance_requested);

        let dead = level.dead_actor_ids();
        if !dead.is_empty() {
            for actor in level.remove_actors(&dead) {
                debug!(actor_id = actor.id().0, name = %actor.name, "actor_reaped");
                self.events.push(SimEvent::ActorDestroyed {
                    actor_id: actor.id(),
                    name: actor.name,
                });
                report.reaped += 1;
            }
        }
        self.live = live_ids(level);

        if advance {
            self.next_level()?;
            report.level_advanced = true;
        }
        Ok(report)
    }

    /// Stops the game on the following level, or finishes it after the last.
    pub fn next_level(&mut self) -> Result<(), GameError> {
        if self.state == GameState::Finished {
            return Err(GameError::InvalidState {
                operation: "advance the level",
                state: self.state,
            });
        }
        let from = self.current;
        self.key_presses.clear();
        self.advance_requested = false;
        self.current = from + 1;
        match self.levels.get(self.current) {
            Some(level) => {
                self.state = GameState::Stopped;
                self.live = live_ids(level);
                self.events.push(SimEvent::LevelAdvanced {
                    from,
                    to: self.current,
                });
                info!(from, to = self.current, level = %level.info.name, "level_advanced");
            }
            None => {
                self.state = GameState::Finished;
                self.live.clear();
                self.events.push(SimEvent::GameCompleted);
                info!(game = %self.info.name, tick = self.tick, "game_completed");
            }
        }
        Ok(())
    }

    pub fn drain_events(&mut self) -> Vec<SimEvent> {
        self.events.drain()
    }
}

fn live_ids(level: &Level) -> Vec<ActorId> {
    level
        .actors()
        .iter()
        .filter(|actor| !actor.is_dead())
        .map(|actor| actor.id())
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::model::{Action, Actor, CollisionSide, Rule, SpawnPlacement, Vec2};
    use crate::sim::{BoundarySide, LevelInfo};

    fn flat_physics() -> GameConfig {
        GameConfig {
            physics: PhysicsConfig {
                gravity: 0.0,
                clamp_to_level: false,
                ..PhysicsConfig::default()
            },
            seed: 11,
        }
    }

    fn level_named(name: &str, actors: Vec<Actor>) -> Level {
        let mut level = Level::new(LevelInfo {
            name: name.to_string(),
            width: 500.0,
            height: 300.0,
            ..LevelInfo::default()
        });
        for actor in actors {
            level.add_actor(actor).expect("add actor");
        }
        level
    }

    #[test]
    fn start_requires_levels_and_stopped_state() {
        let mut empty = Game::new(GameInfo::default(), Vec::new(), GameConfig::default());
        assert!(matches!(empty.start_game(), Err(GameError::NoLevels)));

        let mut game = Game::new(
            GameInfo::default(),
            vec![level_named("one", vec![Actor::new(ActorId(1), "hero")])],
            flat_physics(),
        );
        assert!(matches!(game.step(), Err(GameError::InvalidState { .. })));
        game.start_game().expect("start");
        assert_eq!(game.live_actors(), &[ActorId(1)]);
        assert!(game.start_game().is_err());
        game.pause().expect("pause");
        assert_eq!(game.state(), GameState::Stopped);
        game.resume().expect("resume");
        assert_eq!(game.step().expect("step").tick, 1);
    }

    #[test]
    fn dead_actors_are_reaped_at_end_of_tick() {
        let mut hero = Actor::new(ActorId(1), "hero");
        hero.add_rule(Rule::new(Trigger::key("k"), Action::Destroy { target: ActorId(1) }));
        let bystander = Actor::new(ActorId(2), "bystander").with_position(200.0, 0.0);
        let mut game = Game::new(
            GameInfo::default(),
            vec![level_named("one", vec![hero, bystander])],
            flat_physics(),
        );
        game.start_game().expect("start");

        game.press_key("K");
        let report = game.step().expect("step");
        assert_eq!(report.reaped, 1);
        assert_eq!(report.actions_performed, 1);

        let level = game.current_level().expect("level");
        assert!(level.actor(ActorId(1)).is_none());
        assert!(level.registered(&Trigger::key("k").category()).is_empty());
        assert_eq!(game.live_actors(), &[ActorId(2)]);
        assert_eq!(
            game.drain_events(),
            vec![SimEvent::ActorDestroyed {
                actor_id: ActorId(1),
                name: "hero".into()
            }]
        );
    }

    #[test]
    fn horizontal_bounce_reverses_velocity_on_contact() {
        let mut mover = Actor::new(ActorId(1), "mover")
            .with_size(10.0, 10.0)
            .with_velocity(5.0, 0.0);
        mover.add_rule(Rule::new(
            Trigger::collision(CollisionSide::Right, ActorId(1), ActorId(2)),
            Action::HorizontalBounce { target: ActorId(1) },
        ));
        let wall = Actor::new(ActorId(2), "wall")
            .with_size(10.0, 10.0)
            .with_position(12.0, 0.0)
            .with_static(true);
        let mut game = Game::new(
            GameInfo::default(),
            vec![level_named("one", vec![mover, wall])],
            flat_physics(),
        );
        game.start_game().expect("start");

        let report = game.step().expect("step");
        assert_eq!(report.triggers_dispatched, 6);
        assert_eq!(report.actions_performed, 1);
        let mover = game
            .current_level()
            .and_then(|level| level.actor(ActorId(1)))
            .expect("mover");
        assert_eq!(mover.position, Vec2::new(5.0, 0.0));
        assert_eq!(mover.velocity.x, -5.0);
    }

    #[test]
    fn random_spawns_stay_in_bounds_with_fresh_ids() {
        let mut spawner = Actor::new(ActorId(1), "spawner").with_static(true);
        spawner.add_rule(Rule::new(
            Trigger::key("spawn"),
            Action::CreateActor {
                source: ActorId(1),
                template: ActorId(2),
                placement: SpawnPlacement::Random {
                    min_x: 0.0,
                    max_x: 500.0,
                    min_y: 0.0,
                    max_y: 300.0,
                },
            },
        ));
        let mut level = level_named("one", vec![spawner]);
        level
            .add_template(Actor::new(ActorId(2), "drop"))
            .expect("template");
        let mut game = Game::new(GameInfo::default(), vec![level], flat_physics());

        for _ in 0..10_000 {
            assert_eq!(game.handle_trigger(&Trigger::key("spawn")).expect("spawn"), 1);
        }

        let level = game.current_level().expect("level");
        let mut seen = HashSet::new();
        for actor in level.actors().iter().filter(|actor| actor.name == "drop") {
            assert!((0.0..=500.0).contains(&actor.position.x));
            assert!((0.0..=300.0).contains(&actor.position.y));
            assert!(actor.id() != ActorId(1) && actor.id() != ActorId(2));
            assert!(seen.insert(actor.id()));
        }
        assert_eq!(seen.len(), 10_000);
        let added = game
            .drain_events()
            .into_iter()
            .filter(|event| matches!(event, SimEvent::ActorAdded { .. }))
            .count();
        assert_eq!(added, 10_000);
    }

    #[test]
    fn garbage_collector_reaps_actor_leaving_through_open_edge() {
        let faller = Actor::new(ActorId(1), "faller")
            .with_size(10.0, 10.0)
            .with_position(0.0, 80.0)
            .with_velocity(0.0, 10.0);
        let mut level = Level::new(LevelInfo {
            name: "pit".into(),
            width: 100.0,
            height: 100.0,
            ..LevelInfo::default()
        });
        level.add_actor(faller).expect("add faller");
        level.set_garbage_collectors(&[BoundarySide::Bottom]);
        let config = GameConfig {
            physics: PhysicsConfig {
                gravity: 0.0,
                ..PhysicsConfig::default()
            },
            seed: 1,
        };
        let mut game = Game::new(GameInfo::default(), vec![level], config);
        game.start_game().expect("start");

        assert_eq!(game.step().expect("tick one").reaped, 0);
        let report = game.step().expect("tick two");
        assert_eq!(report.reaped, 1);
        let level = game.current_level().expect("level");
        assert!(level.actor(ActorId(1)).is_none());
        assert_eq!(level.actors().len(), 1);
    }

    #[test]
    fn next_level_action_advances_then_finishes() {
        let mut door = Actor::new(ActorId(1), "door");
        door.add_rule(Rule::new(
            Trigger::key("enter"),
            Action::NextLevel { source: ActorId(1) },
        ));
        let mut game = Game::new(
            GameInfo::default(),
            vec![
                level_named("one", vec![door]),
                level_named("two", vec![Actor::new(ActorId(1), "hero")]),
            ],
            flat_physics(),
        );
        game.start_game().expect("start");
        game.press_key("enter");
        let report = game.step().expect("step");
        assert!(report.level_advanced);
        assert_eq!(game.state(), GameState::Stopped);
        assert_eq!(game.current_level_index(), 1);
        assert_eq!(
            game.drain_events(),
            vec![SimEvent::LevelAdvanced { from: 0, to: 1 }]
        );

        game.start_game().expect("start level two");
        game.next_level().expect("finish");
        assert_eq!(game.state(), GameState::Finished);
        assert_eq!(game.drain_events(), vec![SimEvent::GameCompleted]);
        assert!(game.start_game().is_err());
        assert!(game.next_level().is_err());
        assert!(game.handle_trigger(&Trigger::key("enter")).is_err());
    }
}
