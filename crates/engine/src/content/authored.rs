use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::model::{Actor, ActorId, AttributeKind, BehaviorSpec, Rule, TriggerCategory};
use crate::sim::{BoundarySide, Game, GameConfig, GameInfo, Level, LevelInfo};

use super::factory::{create_rule, create_trigger};

/// Declarative game description produced by an authoring front-end or the
/// XML compiler.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthoredGame {
    pub info: GameInfo,
    pub levels: Vec<AuthoredLevel>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthoredLevel {
    pub info: LevelInfo,
    pub actors: Vec<AuthoredActor>,
    pub templates: Vec<AuthoredActor>,
    pub garbage_collectors: Vec<BoundarySide>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthoredActor {
    pub id: ActorId,
    pub name: String,
    pub sprite: String,
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    pub width: f64,
    pub height: f64,
    pub is_static: bool,
    pub attributes: Vec<AuthoredAttribute>,
    /// Keyed by category name (`"Key:SPACE"`, `"Collision"`, ...).
    pub rules: BTreeMap<String, Vec<AuthoredRule>>,
}

impl Default for AuthoredActor {
    fn default() -> Self {
        let size = crate::model::DEFAULT_ACTOR_SIZE;
        Self {
            id: ActorId(0),
            name: String::new(),
            sprite: String::new(),
            x: 0.0,
            y: 0.0,
            vx: 0.0,
            vy: 0.0,
            width: size.x,
            height: size.y,
            is_static: false,
            attributes: Vec::new(),
            rules: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthoredAttribute {
    pub kind: AttributeKind,
    pub value: i32,
    #[serde(default = "unbounded_min")]
    pub min: i32,
    #[serde(default = "unbounded_max")]
    pub max: i32,
}

fn unbounded_min() -> i32 {
    i32::MIN
}

fn unbounded_max() -> i32 {
    i32::MAX
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthoredRule {
    pub trigger: BehaviorSpec,
    pub action: BehaviorSpec,
}

/// Non-fatal authoring problem. The offending piece is skipped and the build
/// carries on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthoringAlert {
    pub level: String,
    pub actor: Option<ActorId>,
    pub message: String,
}

impl fmt::Display for AuthoringAlert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.actor {
            Some(actor) => write!(f, "level '{}', actor {}: {}", self.level, actor, self.message),
            None => write!(f, "level '{}': {}", self.level, self.message),
        }
    }
}

#[derive(Debug)]
pub struct BuiltGame {
    pub game: Game,
    pub alerts: Vec<AuthoringAlert>,
}

pub fn build_game(authored: &AuthoredGame, config: GameConfig) -> BuiltGame {
    let mut alerts = Vec::new();
    let levels: Vec<Level> = authored
        .levels
        .iter()
        .map(|level| build_level(level, &mut alerts))
        .collect();
    info!(
        game = %authored.info.name,
        level_count = levels.len(),
        alert_count = alerts.len(),
        "authored_game_built"
    );
    BuiltGame {
        game: Game::new(authored.info.clone(), levels, config),
        alerts,
    }
}

pub fn build_level(authored: &AuthoredLevel, alerts: &mut Vec<AuthoringAlert>) -> Level {
    let mut level = Level::new(authored.info.clone());
    let mut alert = |actor: Option<ActorId>, message: String| {
        warn!(level = %authored.info.name, actor_id = actor.map(|id| id.0), detail = %message, "authoring_alert");
        alerts.push(AuthoringAlert {
            level: authored.info.name.clone(),
            actor,
            message,
        });
    };

    for template in &authored.templates {
        let built = build_actor(template, &mut alert);
        if let Err(error) = level.add_template(built) {
            alert(Some(template.id), error.to_string());
        }
    }
    for actor in &authored.actors {
        let built = build_actor(actor, &mut alert);
        if let Err(error) = level.add_actor(built) {
            alert(Some(actor.id), error.to_string());
        }
    }
    level.set_garbage_collectors(&authored.garbage_collectors);
    level
}

fn build_actor(authored: &AuthoredActor, alert: &mut impl FnMut(Option<ActorId>, String)) -> Actor {
    let mut actor = Actor::new(authored.id, authored.name.clone())
        .with_position(authored.x, authored.y)
        .with_velocity(authored.vx, authored.vy)
        .with_size(authored.width, authored.height)
        .with_static(authored.is_static);
    actor.sprite = authored.sprite.clone();

    for attribute in &authored.attributes {
        if let Err(error) =
            actor
                .attributes
                .define(attribute.kind, attribute.value, attribute.min, attribute.max)
        {
            alert(Some(authored.id), error.to_string());
        }
    }

    for (category_name, rules) in &authored.rules {
        let category = match category_name.parse::<TriggerCategory>() {
            Ok(category) => category,
            Err(error) => {
                alert(Some(authored.id), error.to_string());
                continue;
            }
        };
        for rule in rules {
            match build_rule(&category, rule) {
                Ok(rule) => actor.add_rule(rule),
                Err(message) => alert(Some(authored.id), message),
            }
        }
    }
    actor
}

fn build_rule(category: &TriggerCategory, authored: &AuthoredRule) -> Result<Rule, String> {
    let rule = create_rule(&authored.trigger, &authored.action).map_err(|error| error.to_string())?;
    if &rule.category() != category {
        return Err(format!(
            "rule trigger '{}' belongs to category {} but was filed under {}",
            authored.trigger.name,
            rule.category(),
            category
        ));
    }
    Ok(rule)
}

impl AuthoredActor {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id: ActorId(id),
            name: name.into(),
            ..Self::default()
        }
    }

    /// Files a rule under the category its trigger name implies. Unknown
    /// trigger names land under the raw name so the build reports them.
    pub fn with_rule(mut self, trigger: BehaviorSpec, action: BehaviorSpec) -> Self {
        self.push_rule(AuthoredRule { trigger, action });
        self
    }

    pub fn push_rule(&mut self, rule: AuthoredRule) {
        let category = match create_trigger(&rule.trigger.name, &rule.trigger.args) {
            Ok(built) => built.category().name(),
            Err(_) => rule.trigger.name.clone(),
        };
        self.rules.entry(category).or_default().push(rule);
    }
}
