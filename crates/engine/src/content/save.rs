use std::collections::HashMap;
use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::model::{Actor, ActorId, AttributeKind, BehaviorSpec, KeyCode, Vec2};
use crate::sim::{
    BoundarySide, Game, GameConfig, GameInfo, Level, LevelError, LevelInfo, PhysicsConfig,
};

use super::atomic_io::write_text_atomic;
use super::factory::{action_spec, create_rule, trigger_spec, FactoryError};

pub const SAVE_VERSION: u32 = 1;

/// A whole session on disk. The RNG is not captured: a restored game reseeds
/// from `seed`, so random spawns after a load differ from an uninterrupted
/// run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveGame {
    pub save_version: u32,
    pub info: GameInfo,
    pub current_level: usize,
    pub tick: u64,
    pub seed: u64,
    #[serde(default)]
    pub physics: PhysicsConfig,
    /// Presses queued for the next tick when the save was taken.
    #[serde(default)]
    pub queued_keys: Vec<KeyCode>,
    pub levels: Vec<SavedLevel>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedLevel {
    pub info: LevelInfo,
    pub next_id: u64,
    #[serde(default)]
    pub garbage_collectors: Vec<SavedCollector>,
    pub actors: Vec<SavedActor>,
    #[serde(default)]
    pub templates: Vec<SavedActor>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedCollector {
    pub side: BoundarySide,
    pub id: ActorId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedActor {
    pub id: ActorId,
    pub name: String,
    #[serde(default)]
    pub sprite: String,
    pub position: Vec2,
    #[serde(default)]
    pub velocity: Vec2,
    pub size: Vec2,
    #[serde(default)]
    pub heading_degrees: f64,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub dead: bool,
    #[serde(default)]
    pub attributes: Vec<SavedAttribute>,
    #[serde(default)]
    pub rules: Vec<SavedRule>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedAttribute {
    pub kind: AttributeKind,
    pub current: i32,
    pub min: i32,
    pub max: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedRule {
    pub trigger: BehaviorSpec,
    pub action: BehaviorSpec,
}

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("read save '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("write save '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("encode save json: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("parse save json at {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("validation failed at {path}: {message}")]
    Invalid { path: String, message: String },
    #[error("rebuild rule at {path}: {source}")]
    Rule {
        path: String,
        #[source]
        source: FactoryError,
    },
    #[error("restore level: {0}")]
    Level(#[from] LevelError),
}

pub fn snapshot_game(game: &Game) -> SaveGame {
    SaveGame {
        save_version: SAVE_VERSION,
        info: game.info.clone(),
        current_level: game.current_level_index(),
        tick: game.tick(),
        seed: game.config().seed,
        physics: game.config().physics,
        queued_keys: game.queued_key_presses().cloned().collect(),
        levels: game.levels().iter().map(snapshot_level).collect(),
    }
}

fn snapshot_level(level: &Level) -> SavedLevel {
    SavedLevel {
        info: level.info.clone(),
        next_id: level.next_id(),
        garbage_collectors: level
            .garbage_collectors()
            .map(|(side, id)| SavedCollector { side, id })
            .collect(),
        actors: level
            .actors()
            .iter()
            .filter(|actor| !level.is_garbage_collector(actor.id()))
            .map(snapshot_actor)
            .collect(),
        templates: level.templates().iter().map(snapshot_actor).collect(),
    }
}

fn snapshot_actor(actor: &Actor) -> SavedActor {
    SavedActor {
        id: actor.id(),
        name: actor.name.clone(),
        sprite: actor.sprite.clone(),
        position: actor.position,
        velocity: actor.velocity,
        size: actor.size,
        heading_degrees: actor.heading_degrees,
        is_static: actor.is_static,
        dead: actor.is_dead(),
        attributes: actor
            .attributes
            .iter()
            .map(|(kind, value)| SavedAttribute {
                kind,
                current: value.current,
                min: value.min,
                max: value.max,
            })
            .collect(),
        rules: actor
            .rules()
            .map(|rule| SavedRule {
                trigger: trigger_spec(rule.trigger()),
                action: action_spec(rule.action()),
            })
            .collect(),
    }
}

pub fn encode_save_json(save: &SaveGame) -> Result<String, PersistError> {
    serde_json::to_string_pretty(save).map_err(PersistError::Encode)
}

pub fn parse_save_json(raw: &str) -> Result<SaveGame, PersistError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    serde_path_to_error::deserialize::<_, SaveGame>(&mut deserializer).map_err(|error| {
        let path = error.path().to_string();
        PersistError::Parse {
            path: if path.is_empty() { ".".to_string() } else { path },
            source: error.into_inner(),
        }
    })
}

fn validation_err(path: impl Into<String>, message: impl Into<String>) -> PersistError {
    PersistError::Invalid {
        path: path.into(),
        message: message.into(),
    }
}

fn expected_actual(path: impl Into<String>, expected: impl Display, actual: impl Display) -> PersistError {
    validation_err(path, format!("expected {expected}, got {actual}"))
}

pub fn validate_save(save: &SaveGame) -> Result<(), PersistError> {
    if save.save_version != SAVE_VERSION {
        return Err(expected_actual("save_version", SAVE_VERSION, save.save_version));
    }
    if save.current_level > save.levels.len() {
        return Err(expected_actual(
            "current_level",
            format!("at most {}", save.levels.len()),
            save.current_level,
        ));
    }

    for (level_index, level) in save.levels.iter().enumerate() {
        let level_path = format!("levels[{level_index}]");
        for (name, value) in [("width", level.info.width), ("height", level.info.height)] {
            if !value.is_finite() || value < 0.0 {
                return Err(expected_actual(
                    format!("{level_path}.info.{name}"),
                    "finite number >= 0",
                    value,
                ));
            }
        }

        let mut known_ids = HashMap::<ActorId, String>::new();
        let actors = level
            .actors
            .iter()
            .enumerate()
            .map(|(index, actor)| (format!("{level_path}.actors[{index}]"), actor.id));
        let templates = level
            .templates
            .iter()
            .enumerate()
            .map(|(index, actor)| (format!("{level_path}.templates[{index}]"), actor.id));
        let collectors = level
            .garbage_collectors
            .iter()
            .enumerate()
            .map(|(index, collector)| (format!("{level_path}.garbage_collectors[{index}]"), collector.id));
        let mut max_id = None;
        for (path, id) in actors.chain(templates).chain(collectors) {
            if let Some(first) = known_ids.get(&id) {
                return Err(validation_err(
                    format!("{path}.id"),
                    format!("duplicate actor id {} (first seen at {first}.id)", id.0),
                ));
            }
            max_id = max_id.max(Some(id.0));
            known_ids.insert(id, path);
        }
        if let Some(max_id) = max_id {
            if level.next_id <= max_id {
                return Err(expected_actual(
                    format!("{level_path}.next_id"),
                    format!("greater than max used id {max_id}"),
                    level.next_id,
                ));
            }
        }

        for (kind, saved) in [("actors", &level.actors), ("templates", &level.templates)] {
            for (index, actor) in saved.iter().enumerate() {
                validate_actor(&format!("{level_path}.{kind}[{index}]"), actor)?;
            }
        }
    }
    Ok(())
}

fn validate_actor(path: &str, actor: &SavedActor) -> Result<(), PersistError> {
    let vectors = [
        ("position", actor.position),
        ("velocity", actor.velocity),
        ("size", actor.size),
    ];
    for (name, value) in vectors {
        if !value.x.is_finite() || !value.y.is_finite() {
            return Err(expected_actual(
                format!("{path}.{name}"),
                "finite vector",
                format!("({}, {})", value.x, value.y),
            ));
        }
    }
    if !actor.heading_degrees.is_finite() {
        return Err(expected_actual(
            format!("{path}.heading_degrees"),
            "finite number",
            actor.heading_degrees,
        ));
    }
    Ok(())
}

/// Validates the save and builds a brand-new `Game` from it. Nothing is
/// shared with any running game, so a failure leaves callers' state intact.
pub fn restore_game(save: &SaveGame) -> Result<Game, PersistError> {
    validate_save(save)?;

    let mut levels = Vec::with_capacity(save.levels.len());
    for (level_index, saved) in save.levels.iter().enumerate() {
        levels.push(restore_level(&format!("levels[{level_index}]"), saved)?);
    }

    let mut game = Game::new(
        save.info.clone(),
        levels,
        GameConfig {
            physics: save.physics,
            seed: save.seed,
        },
    );
    game.restore_progress(save.current_level, save.tick);
    for key in &save.queued_keys {
        game.press_key(key.as_str());
    }
    Ok(game)
}

fn restore_level(path: &str, saved: &SavedLevel) -> Result<Level, PersistError> {
    let mut level = Level::new(saved.info.clone());
    for (index, template) in saved.templates.iter().enumerate() {
        level.add_template(restore_actor(&format!("{path}.templates[{index}]"), template)?)?;
    }
    for (index, actor) in saved.actors.iter().enumerate() {
        level.add_actor(restore_actor(&format!("{path}.actors[{index}]"), actor)?)?;
    }
    for collector in &saved.garbage_collectors {
        level.place_garbage_collector(collector.side, collector.id)?;
    }
    level.set_next_id(saved.next_id);
    Ok(level)
}

fn restore_actor(path: &str, saved: &SavedActor) -> Result<Actor, PersistError> {
    let mut actor = Actor::new(saved.id, saved.name.clone())
        .with_position(saved.position.x, saved.position.y)
        .with_velocity(saved.velocity.x, saved.velocity.y)
        .with_size(saved.size.x, saved.size.y)
        .with_static(saved.is_static);
    actor.sprite = saved.sprite.clone();
    actor.heading_degrees = saved.heading_degrees;
    if saved.dead {
        actor.mark_dead();
    }

    for (index, attribute) in saved.attributes.iter().enumerate() {
        actor
            .attributes
            .define(attribute.kind, attribute.current, attribute.min, attribute.max)
            .map_err(|error| validation_err(format!("{path}.attributes[{index}]"), error.to_string()))?;
    }
    for (index, rule) in saved.rules.iter().enumerate() {
        let rule = create_rule(&rule.trigger, &rule.action).map_err(|source| PersistError::Rule {
            path: format!("{path}.rules[{index}]"),
            source,
        })?;
        actor.add_rule(rule);
    }
    Ok(actor)
}

pub fn save_game(game: &Game, path: &Path) -> Result<(), PersistError> {
    let json = encode_save_json(&snapshot_game(game))?;
    write_text_atomic(path, &json).map_err(|source| PersistError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), tick = game.tick(), "game_saved");
    Ok(())
}

pub fn load_game(path: &Path) -> Result<Game, PersistError> {
    let raw = fs::read_to_string(path).map_err(|source| PersistError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let game = restore_game(&parse_save_json(&raw)?)?;
    info!(path = %path.display(), level_count = game.levels().len(), "game_loaded");
    Ok(game)
}
